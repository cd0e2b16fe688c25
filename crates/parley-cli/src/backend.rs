use std::sync::Arc;

use parley_client::ClientFactory;
use parley_client::http_client::HttpBackendClient;
use parley_core::Config;
use parley_core::ConfigKey;
use parley_core::ControllerProps;
use parley_core::FileActiveSessionStore;
use parley_core::FileCredentialStore;

/// Backend client and local stores, wired from the loaded config.
pub struct Backend {
    pub client: Arc<HttpBackendClient>,
    pub credentials: Arc<FileCredentialStore>,
    pub active_session: Arc<FileActiveSessionStore>,
    pub page_size: usize,
}

impl Backend {
    pub fn from_config() -> Backend {
        let client = ClientFactory::create_http_client(Config::get(ConfigKey::BackendURL))
            .with_timeout(Config::timeout());
        let state_dir = Config::state_dir();

        log::debug!(
            "backend {} with state in {}",
            client.base_url(),
            state_dir.display()
        );

        Backend {
            client: Arc::new(client),
            credentials: Arc::new(FileCredentialStore::new(&state_dir)),
            active_session: Arc::new(FileActiveSessionStore::new(&state_dir)),
            page_size: Config::page_size(),
        }
    }

    pub fn controller_props(&self) -> ControllerProps {
        ControllerProps {
            sessions: self.client.clone(),
            transport: self.client.clone(),
            active_session: self.active_session.clone(),
            credentials: self.credentials.clone(),
            page_size: self.page_size,
        }
    }
}
