//! Single-shot position acquisition.
//!
//! The gate wraps a [`LocationProvider`] in one awaitable call with a bounded
//! wait and maps every provider failure onto [`LocationError`]. It never
//! caches a previous fix and never retries; callers decide what to do next.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{LocationConfig, ProviderKind};
use crate::models::Position;

/// Provider codes, mirroring the platform geolocation API.
pub const CODE_PERMISSION_DENIED: u16 = 1;
pub const CODE_POSITION_UNAVAILABLE: u16 = 2;
pub const CODE_TIMEOUT: u16 = 3;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location access is required to use LocalLens. Please enable location in your settings.")]
    PermissionDenied,

    #[error("Unable to determine your location. Please check your device settings.")]
    PositionUnavailable,

    #[error("Location request timed out. Please try again.")]
    Timeout,

    #[error("Geolocation is not supported on this device")]
    Unsupported,
}

impl LocationError {
    pub fn from_code(code: u16) -> Self {
        match code {
            CODE_PERMISSION_DENIED => Self::PermissionDenied,
            CODE_TIMEOUT => Self::Timeout,
            _ => Self::PositionUnavailable,
        }
    }

    /// Failures a plain retry might clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::PositionUnavailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Always zero from the gate: every call wants a fresh reading.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: DEFAULT_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: u16,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider error {}: {}", self.code, self.message)
    }
}

/// The platform location service.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Whether the platform has any location capability at all.
    fn is_supported(&self) -> bool {
        true
    }

    async fn current_position(&self, options: &PositionOptions) -> Result<Position, ProviderError>;
}

pub struct GeolocationGate {
    provider: Arc<dyn LocationProvider>,
    options: PositionOptions,
}

impl GeolocationGate {
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self {
            provider,
            options: PositionOptions::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn with_high_accuracy(mut self, enabled: bool) -> Self {
        self.options.enable_high_accuracy = enabled;
        self
    }

    pub fn from_config(config: &LocationConfig, http: reqwest::Client) -> anyhow::Result<Self> {
        let provider: Arc<dyn LocationProvider> = match config.provider {
            ProviderKind::Fixed => match (config.latitude, config.longitude) {
                (Some(lat), Some(lon)) => Arc::new(FixedLocationProvider::new(Position::new(lat, lon))),
                _ => {
                    tracing::warn!("Fixed location provider selected without coordinates");
                    Arc::new(UnsupportedLocationProvider)
                }
            },
            ProviderKind::Http => {
                let url = config
                    .lookup_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("location.lookup_url is required for the http provider"))?;
                Arc::new(HttpLocationProvider::new(http, url::Url::parse(url)?))
            }
            ProviderKind::None => Arc::new(UnsupportedLocationProvider),
        };

        Ok(Self::new(provider)
            .with_timeout(Duration::from_millis(config.timeout_ms))
            .with_high_accuracy(config.high_accuracy))
    }

    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    /// Acquire one fresh position fix.
    pub async fn acquire(&self) -> Result<Position, LocationError> {
        if !self.provider.is_supported() {
            tracing::warn!("Location capability unavailable");
            return Err(LocationError::Unsupported);
        }

        let request = self.provider.current_position(&self.options);
        match tokio::time::timeout(self.options.timeout, request).await {
            Ok(Ok(position)) => {
                tracing::debug!("Position fix acquired: {}", position);
                Ok(position)
            }
            Ok(Err(e)) => {
                tracing::warn!("Location request failed: {}", e);
                Err(LocationError::from_code(e.code))
            }
            Err(_) => {
                tracing::warn!("Location request exceeded {:?}", self.options.timeout);
                Err(LocationError::Timeout)
            }
        }
    }
}

/// Reports a fixed position, e.g. coordinates given on the command line.
pub struct FixedLocationProvider {
    position: Position,
}

impl FixedLocationProvider {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Position, ProviderError> {
        if !self.position.is_valid() {
            return Err(ProviderError::new(
                CODE_POSITION_UNAVAILABLE,
                format!("coordinates out of range: {}", self.position),
            ));
        }
        Ok(self.position)
    }
}

pub struct UnsupportedLocationProvider;

#[async_trait]
impl LocationProvider for UnsupportedLocationProvider {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<Position, ProviderError> {
        Err(ProviderError::new(
            CODE_POSITION_UNAVAILABLE,
            "no location capability",
        ))
    }
}

/// Looks the position up from an HTTP endpoint answering
/// `{"latitude": .., "longitude": ..}`.
pub struct HttpLocationProvider {
    http: reqwest::Client,
    url: url::Url,
}

#[derive(Deserialize)]
struct LookupResponse {
    latitude: f64,
    longitude: f64,
}

impl HttpLocationProvider {
    pub fn new(http: reqwest::Client, url: url::Url) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl LocationProvider for HttpLocationProvider {
    async fn current_position(&self, options: &PositionOptions) -> Result<Position, ProviderError> {
        let response = self
            .http
            .get(self.url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                let code = if e.is_timeout() {
                    CODE_TIMEOUT
                } else {
                    CODE_POSITION_UNAVAILABLE
                };
                ProviderError::new(code, e.to_string())
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::new(CODE_PERMISSION_DENIED, status.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::new(CODE_POSITION_UNAVAILABLE, status.to_string()));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(CODE_POSITION_UNAVAILABLE, e.to_string()))?;
        let position = Position::new(body.latitude, body.longitude);
        if !position.is_valid() {
            return Err(ProviderError::new(
                CODE_POSITION_UNAVAILABLE,
                format!("lookup returned {}", position),
            ));
        }
        Ok(position)
    }
}
