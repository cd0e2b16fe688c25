use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use parley_client::Credential;

use super::read_value;
use super::remove_value;
use super::write_private;
use crate::domain::models::CredentialStore;

pub const CREDENTIALS_FILE: &str = "credentials";

/// Keeps the bearer token in a file only the current user can read.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(state_dir: &Path) -> Self {
        FileCredentialStore {
            path: state_dir.join(CREDENTIALS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        Ok(read_value(&self.path).await?.and_then(Credential::new))
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        write_private(&self.path, credential.token()).await
    }

    async fn clear(&self) -> Result<()> {
        remove_value(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());

        store.save(&Credential::new("tok-1").unwrap()).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().token(), "tok-1");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_credentials_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        store.save(&Credential::new("tok-1").unwrap()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_overwriting_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        std::fs::write(store.path(), "old").unwrap();
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&Credential::new("tok-2").unwrap()).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load().await.unwrap().unwrap().token(), "tok-2");
    }
}
