use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

use crate::models::PostId;

#[derive(Parser, Debug)]
#[command(name = "locallens", about = "Browse and share photos from your neighborhood")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to data directory (session and config live here)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// API base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Latitude to report instead of asking the location provider
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Longitude to report instead of asking the location provider
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and check location access
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the current session
    Whoami,
    /// Show posts near the current position
    Feed,
    /// Toggle your like on a post
    Like { post_id: PostId },
    /// List comments on a post
    Comments { post_id: PostId },
    /// Add a comment to a post
    Comment { post_id: PostId, text: String },
    /// Share a photo taken at the current position
    Post {
        image: PathBuf,
        #[arg(long, default_value = "")]
        caption: String,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub location: LocationConfig,
    pub feed: FeedConfig,
    pub session: SessionConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub media_base_url: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Fixed,
    Http,
    None,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LocationConfig {
    pub provider: ProviderKind,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub lookup_url: Option<String>,
    pub timeout_ms: u64,
    pub high_accuracy: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub radius_miles: f64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://locallens-fuzr.onrender.com/api".to_string(),
            media_base_url: "http://localhost:3000/".to_string(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Fixed,
            latitude: None,
            longitude: None,
            lookup_url: None,
            timeout_ms: 5000,
            high_accuracy: true,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { radius_miles: 5.0 }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref api_url) = cli.api_url {
            config.api.base_url = api_url.clone();
        }
        if let (Some(lat), Some(lon)) = (cli.lat, cli.lon) {
            config.location.provider = ProviderKind::Fixed;
            config.location.latitude = Some(lat);
            config.location.longitude = Some(lon);
        }

        if config.session.path.is_none() {
            config.session.path = Some(data_dir.join("session.json"));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match cli.data_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".locallens")),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("invalid api.base_url: {}", self.api.base_url))?;
        self.media_base()?;
        Ok(())
    }

    /// Media base as a URL that always ends in `/`, so joins keep its path.
    pub fn media_base(&self) -> anyhow::Result<url::Url> {
        let mut raw = self.api.media_base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        url::Url::parse(&raw).with_context(|| format!("invalid api.media_base_url: {}", raw))
    }

    pub fn session_path(&self) -> Option<&PathBuf> {
        self.session.path.as_ref()
    }
}
