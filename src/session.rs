//! Session lifecycle: login, registration, logout and restore.
//!
//! [`SessionHandle`] is the shared, read-mostly view every component gets.
//! Only [`SessionManager`] writes through it.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, Session, SessionToken};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    pub async fn token(&self) -> Option<SessionToken> {
        self.inner
            .read()
            .await
            .as_ref()
            .filter(|s| s.is_authenticated)
            .map(|s| s.token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token().await.is_some()
    }

    pub(crate) async fn replace(&self, session: Option<Session>) {
        *self.inner.write().await = session;
    }
}

/// Where a session survives between runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<Session>>;
    async fn save(&self, session: &Session) -> anyhow::Result<()>;
    async fn clear(&self) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> anyhow::Result<Option<Session>> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        *self.session.lock().await = None;
        Ok(())
    }
}

/// Persists the session as pretty JSON at a fixed path.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> anyhow::Result<Option<Session>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&self.path).await?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn save(&self, session: &Session) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(session)?).await?;
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn validate_login(username: &str, password: &str) -> ClientResult<()> {
    if username.is_empty() || password.is_empty() {
        return Err(ClientError::validation("Please fill in all fields"));
    }
    Ok(())
}

pub fn validate_registration(username: &str, email: &str, password: &str) -> ClientResult<()> {
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ClientError::validation("Please fill in all fields"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub struct SessionManager {
    api: ApiClient,
    handle: SessionHandle,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(api: ApiClient, handle: SessionHandle, store: Arc<dyn SessionStore>) -> Self {
        Self { api, handle, store }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.handle.current().await
    }

    /// Load a previously persisted session, if any.
    pub async fn restore(&self) -> Option<Session> {
        match self.store.load().await {
            Ok(Some(session)) if session.is_authenticated => {
                tracing::info!(
                    "Restored session for {}",
                    session.username().unwrap_or("unknown user")
                );
                self.handle.replace(Some(session.clone())).await;
                Some(session)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Could not read stored session: {}", e);
                None
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Session> {
        validate_login(username, password)?;

        let response = self
            .api
            .login(&LoginRequest { username, password })
            .await
            .map_err(|e| {
                tracing::warn!("Login failed for {}: {}", username, e);
                e
            })?;
        Ok(self.establish(response).await)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> ClientResult<Session> {
        validate_registration(username, email, password)?;

        let response = self
            .api
            .register(&RegisterRequest {
                username,
                email,
                password,
            })
            .await
            .map_err(|e| {
                tracing::warn!("Registration failed for {}: {}", username, e);
                e
            })?;
        Ok(self.establish(response).await)
    }

    pub async fn logout(&self) {
        self.drop_session().await;
        tracing::info!("Logged out");
    }

    /// Drop a session the server no longer accepts.
    pub async fn invalidate(&self) {
        self.drop_session().await;
        tracing::info!("Session invalidated");
    }

    async fn establish(&self, response: AuthResponse) -> Session {
        let session = Session::authenticated(response.access_token, response.user);
        self.handle.replace(Some(session.clone())).await;
        if let Err(e) = self.store.save(&session).await {
            tracing::warn!("Could not persist session: {}", e);
        }
        tracing::info!(
            "Session established for {}",
            session.username().unwrap_or("unknown user")
        );
        session
    }

    async fn drop_session(&self) {
        self.handle.replace(None).await;
        if let Err(e) = self.store.clear().await {
            tracing::warn!("Could not clear stored session: {}", e);
        }
    }
}
