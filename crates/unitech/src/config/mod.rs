use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::portal::api::DEFAULT_API_NAME;
use crate::portal::session::Session;
use crate::portal::storage::DEFAULT_LINK_EXPIRY_SECS;

/// Distinguishes runtime behavior for different stages of the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the portal client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub api: ApiConfig,
    pub storage: Option<StorageConfig>,
    pub session: SessionConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let default_api =
            env::var("UNITECH_API_NAME").unwrap_or_else(|_| DEFAULT_API_NAME.to_string());
        let mut endpoints = match env::var("UNITECH_API_ENDPOINTS") {
            Ok(raw) => parse_endpoints(&raw)?,
            Err(_) => BTreeMap::new(),
        };
        if let Some(url) = non_empty_var("UNITECH_API_URL") {
            endpoints.insert(default_api.clone(), url);
        }

        let storage = match non_empty_var("UNITECH_STORAGE_BUCKET") {
            Some(bucket) => {
                let link_expiry_secs = env::var("UNITECH_LINK_EXPIRY_SECS")
                    .unwrap_or_else(|_| DEFAULT_LINK_EXPIRY_SECS.to_string())
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidLinkExpiry)?;
                Some(StorageConfig {
                    bucket,
                    region: non_empty_var("UNITECH_STORAGE_REGION"),
                    endpoint_url: non_empty_var("UNITECH_STORAGE_ENDPOINT"),
                    link_expiry: Duration::from_secs(link_expiry_secs),
                })
            }
            None => None,
        };

        let session = SessionConfig {
            username: non_empty_var("UNITECH_USERNAME"),
            identity_id: non_empty_var("UNITECH_IDENTITY_ID"),
            access_token: non_empty_var("UNITECH_ACCESS_TOKEN"),
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            api: ApiConfig {
                default_api,
                endpoints,
            },
            storage,
            session,
            telemetry: TelemetryConfig { log_level },
        })
    }

    pub fn require_storage(&self) -> Result<&StorageConfig, ConfigError> {
        self.storage.as_ref().ok_or(ConfigError::Missing {
            var: "UNITECH_STORAGE_BUCKET",
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses `name=url` pairs separated by commas.
fn parse_endpoints(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut endpoints = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (name, url) = entry
            .split_once('=')
            .map(|(name, url)| (name.trim(), url.trim()))
            .filter(|(name, url)| !name.is_empty() && !url.is_empty())
            .ok_or_else(|| ConfigError::InvalidEndpoint {
                entry: entry.to_string(),
            })?;
        endpoints.insert(name.to_string(), url.to_string());
    }
    Ok(endpoints)
}

/// Named REST APIs the portal may call.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    pub default_api: String,
    pub endpoints: BTreeMap<String, String>,
}

impl ApiConfig {
    pub fn endpoint(&self, api_name: &str) -> Option<&str> {
        self.endpoints.get(api_name).map(String::as_str)
    }

    /// Base URL for a request addressed to `api_name`.
    ///
    /// Requests built with the stock API name reach whatever API is configured
    /// as the default when that name is not registered itself.
    pub fn resolve(&self, api_name: &str) -> Option<&str> {
        self.endpoint(api_name).or_else(|| {
            if api_name == DEFAULT_API_NAME {
                self.endpoint(&self.default_api)
            } else {
                None
            }
        })
    }
}

/// Object storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: Option<String>,
    /// S3-compatible endpoint; addressed path-style when set.
    pub endpoint_url: Option<String>,
    pub link_expiry: Duration,
}

/// Identity of the signed-in user as handed over by the auth wrapper.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub username: Option<String>,
    pub identity_id: Option<String>,
    pub access_token: Option<String>,
}

impl SessionConfig {
    pub fn session(&self, username_override: Option<String>) -> Result<Session, ConfigError> {
        let username = username_override
            .or_else(|| self.username.clone())
            .ok_or(ConfigError::Missing {
                var: "UNITECH_USERNAME",
            })?;

        let mut session = Session::new(username);
        session.identity_id = self.identity_id.clone();
        session.access_token = self.access_token.clone();
        Ok(session)
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidLinkExpiry,
    InvalidEndpoint { entry: String },
    Missing { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidLinkExpiry => {
                write!(f, "UNITECH_LINK_EXPIRY_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidEndpoint { entry } => write!(
                f,
                "UNITECH_API_ENDPOINTS entry '{entry}' must look like name=url"
            ),
            ConfigError::Missing { var } => write!(f, "{var} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {}
