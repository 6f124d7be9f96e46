//! Terminal manager: server-side listing, creation and shutdown

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::EventBus;
use super::protocol::{normalize_base_url, ws_url_from_base};
use super::registry::SessionRegistry;
use super::rest::TerminalRestClient;
use super::session::{TerminalSession, create_session};
use super::types::{
    DEFAULT_BASE_URL, RequestSettings, Result, SessionOptions, TerminalError, TerminalModel,
};

/// Options used to initialize a terminal manager
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub settings: Option<RequestSettings>,
}

/// Tracks the terminals running on a server
pub struct TerminalManager {
    base_url: String,
    ws_url: String,
    settings: RequestSettings,
    rest: TerminalRestClient,
    registry: SessionRegistry,
    running: Mutex<Vec<TerminalModel>>,
    running_changed: EventBus<Vec<TerminalModel>>,
    disposed: AtomicBool,
}

impl TerminalManager {
    pub fn new(options: ManagerOptions, registry: SessionRegistry) -> Self {
        let base_url = normalize_base_url(options.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        let ws_url = match options.ws_url.as_deref() {
            Some(ws_url) => normalize_base_url(ws_url),
            None => ws_url_from_base(&base_url),
        };
        let settings = options.settings.unwrap_or_default();

        info!("Creating terminal manager for {}", base_url);

        Self {
            rest: TerminalRestClient::new(base_url.clone(), settings.clone()),
            base_url,
            ws_url,
            settings,
            registry,
            running: Mutex::new(Vec::new()),
            running_changed: EventBus::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Last fetched list of running terminals
    pub fn running(&self) -> Vec<TerminalModel> {
        self.running.lock().clone()
    }

    /// Subscribe to changes of the running list
    pub fn running_changed(&self) -> mpsc::UnboundedReceiver<Vec<TerminalModel>> {
        self.running_changed.subscribe()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Create a new terminal or connect to an existing one.
    ///
    /// Options left empty take the manager's URLs and request settings.
    pub async fn create(&self, options: SessionOptions) -> Result<Arc<TerminalSession>> {
        self.ensure_active()?;

        let options = SessionOptions {
            base_url: options.base_url.or_else(|| Some(self.base_url.clone())),
            ws_url: options.ws_url.or_else(|| Some(self.ws_url.clone())),
            settings: options.settings.or_else(|| Some(self.settings.clone())),
            ..options
        };
        let session = create_session(options, &self.registry).await?;

        self.refresh_running().await;
        Ok(session)
    }

    /// Shut down a terminal by name
    pub async fn shutdown(&self, name: &str) -> Result<()> {
        self.ensure_active()?;

        self.rest.delete_terminal(name).await?;
        if let Some(pending) = self.registry.get(name) {
            debug!("Disposing local session for terminal {}", name);
            pending.session().dispose();
        }

        self.refresh_running().await;
        Ok(())
    }

    /// Fetch the running terminals and notify if the list changed
    pub async fn list_running(&self) -> Result<Vec<TerminalModel>> {
        self.ensure_active()?;

        let data = self.rest.list_terminals().await?;

        let mut running = self.running.lock();
        if self.is_disposed() {
            return Ok(data);
        }
        if *running != data {
            info!(
                "Running terminals changed: {} -> {}",
                running.len(),
                data.len()
            );
            *running = data.clone();
            self.running_changed.emit(data.clone());
        }
        Ok(data)
    }

    /// Clear cached state and subscribers; idempotent
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.lock().clear();
        self.running_changed.close();
        info!("Disposed terminal manager for {}", self.base_url);
    }

    async fn refresh_running(&self) {
        if let Err(e) = self.list_running().await {
            warn!("Failed to refresh running terminals: {}", e);
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(TerminalError::Usage("terminal manager is disposed".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for TerminalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalManager")
            .field("base_url", &self.base_url)
            .field("ws_url", &self.ws_url)
            .field("running", &self.running())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
