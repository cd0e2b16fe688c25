mod active_session;
mod credentials;

pub use active_session::*;
pub use credentials::*;

use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use tokio::fs;
#[cfg(unix)]
use tokio::io::AsyncWriteExt;

// Missing files and blank contents both read as `None`.
async fn read_value(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(contents) => {
            let value = contents.trim();
            if value.is_empty() {
                return Ok(None);
            }
            Ok(Some(value.to_string()))
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

async fn write_value(path: &Path, value: &str) -> Result<()> {
    create_parent(path).await?;

    fs::write(path, value)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

// Same as `write_value`, but the file is owner-only from the moment it exists.
#[cfg(unix)]
async fn write_private(path: &Path, value: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    create_parent(path).await?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    // `mode` only applies on creation, an older file may be wider.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .await
        .with_context(|| format!("failed to restrict {}", path.display()))?;
    file.write_all(value.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.flush().await?;

    Ok(())
}

#[cfg(not(unix))]
async fn write_private(path: &Path, value: &str) -> Result<()> {
    write_value(path, value).await
}

async fn create_parent(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("failed to create {}", parent.display()))
}

async fn remove_value(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}
