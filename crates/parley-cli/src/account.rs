use std::io;
use std::io::Write;

use anyhow::bail;
use anyhow::Result;
use parley_client::ClientError;
use parley_client::SessionStore;
use parley_core::domain::models::ActiveSessionStore;
use parley_core::domain::models::CredentialStore;
use parley_core::SessionEntry;

use crate::backend::Backend;

/// Reads a password from stdin when it was not passed as a flag or env var.
pub fn read_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("A password is required");
    }
    Ok(password)
}

pub async fn login(backend: &Backend, email: &str, password: &str) -> Result<()> {
    let session = backend.client.login(email, password).await?;
    backend.credentials.save(&session.credential).await?;

    let name = session
        .user
        .as_ref()
        .and_then(|user| user.username.clone())
        .unwrap_or_else(|| email.to_string());
    log::info!("logged in as {}", email);
    println!("Logged in as {name}.");

    Ok(())
}

pub async fn signup(
    backend: &Backend,
    email: &str,
    password: &str,
    username: Option<&str>,
) -> Result<()> {
    let response = backend.client.signup(email, password, username).await?;
    println!("{}", response.message);

    login(backend, email, password).await
}

pub async fn forgot_password(backend: &Backend, email: &str) -> Result<()> {
    let response = backend.client.forgot_password(email).await?;
    println!("{}", response.message);

    Ok(())
}

pub async fn reset_password(backend: &Backend, token: &str, new_password: &str) -> Result<()> {
    let response = backend.client.reset_password(token, new_password).await?;
    println!("{}", response.message);

    Ok(())
}

pub async fn logout(backend: &Backend) -> Result<()> {
    backend.credentials.clear().await?;
    backend.active_session.clear_active_session_id().await?;
    println!("Logged out.");

    Ok(())
}

pub async fn list_sessions(backend: &Backend) -> Result<()> {
    let Some(credential) = backend.credentials.load().await? else {
        return Err(ClientError::AuthMissing.into());
    };
    let active = backend.active_session.get_active_session_id().await?;

    let sessions = backend
        .client
        .list_sessions(&credential)
        .await?
        .into_iter()
        .map(SessionEntry::from)
        .collect::<Vec<_>>();

    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }

    for (index, session) in sessions.iter().enumerate() {
        let marker = if active.as_deref() == Some(session.id.as_str()) {
            "*"
        } else {
            " "
        };
        let created = session
            .created_at
            .map(|created| created.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{marker} {:>2}. {:<40} {:<16} {}",
            index + 1,
            session.title,
            created,
            session.id
        );
    }

    Ok(())
}
