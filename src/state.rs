use std::sync::Arc;

use crate::api::ApiClient;
use crate::comments::CommentThreadController;
use crate::compose::PostComposer;
use crate::config::Config;
use crate::error::ClientResult;
use crate::feed::FeedSynchronizer;
use crate::geolocation::{GeolocationGate, LocationError};
use crate::models::{Position, PostId, Session};
use crate::session::{FileSessionStore, MemorySessionStore, SessionHandle, SessionManager, SessionStore};

/// Everything a signed-in view needs, wired once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub api: ApiClient,
    pub sessions: Arc<SessionManager>,
    pub gate: Arc<GeolocationGate>,
    pub media_base: url::Url,
}

/// Result of signing in: the session, plus whatever the gate reported.
/// A missing fix does not undo the session.
#[derive(Debug)]
pub struct SignIn {
    pub session: Session,
    pub location: Result<Position, LocationError>,
}

impl AppState {
    pub fn new(
        config: Config,
        http: reqwest::Client,
        store: Arc<dyn SessionStore>,
        gate: GeolocationGate,
    ) -> anyhow::Result<Self> {
        let media_base = config.media_base()?;
        let handle = SessionHandle::new();
        let api = ApiClient::new(http, config.api.base_url.clone(), handle.clone());
        let sessions = Arc::new(SessionManager::new(api.clone(), handle, store));

        Ok(Self {
            config,
            api,
            sessions,
            gate: Arc::new(gate),
            media_base,
        })
    }

    /// Build from config: file-backed session store and the configured provider.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("locallens/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let gate = GeolocationGate::from_config(&config.location, http.clone())?;
        let store: Arc<dyn SessionStore> = match config.session_path() {
            Some(path) => Arc::new(FileSessionStore::new(path)),
            None => Arc::new(MemorySessionStore::default()),
        };
        Self::new(config, http, store, gate)
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> ClientResult<SignIn> {
        let session = self.sessions.login(username, password).await?;
        Ok(self.after_authentication(session).await)
    }

    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> ClientResult<SignIn> {
        let session = self.sessions.register(username, email, password).await?;
        Ok(self.after_authentication(session).await)
    }

    async fn after_authentication(&self, session: Session) -> SignIn {
        let location = self.gate.acquire().await;
        if let Err(ref e) = location {
            tracing::warn!("Signed in without a position fix: {}", e);
        }
        SignIn { session, location }
    }

    pub fn feed(&self) -> FeedSynchronizer {
        FeedSynchronizer::new(self.api.clone(), self.gate.clone())
    }

    pub fn comments(&self, post_id: PostId) -> CommentThreadController {
        CommentThreadController::new(post_id, self.api.clone())
    }

    pub fn composer(&self) -> PostComposer {
        PostComposer::new(self.api.clone(), self.gate.clone())
    }
}
