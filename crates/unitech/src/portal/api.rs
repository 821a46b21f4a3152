//! Named REST API helpers.
//!
//! Requests are addressed by API name and endpoint path; the base URL for each
//! name comes from [`ApiConfig`]. Failures are returned to the caller as-is:
//! there are no retries, no caching and no client-side timeout.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ApiConfig;

pub const DEFAULT_API_NAME: &str = "UnitechAWS";
pub const CREATE_APPLICATION_ENDPOINT: &str = "/create/application";

/// Universities selected by the placeholder application sent on mount.
pub const DEMO_UNIVERSITIES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];
/// Applicant values sent with the placeholder application.
pub const DEMO_APPLICANT_VALUES: [(&str, &str); 2] = [("test", "event"), ("event", "event")];

/// Extra request options; the query-string slot is filled by [`set_parameters`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    #[serde(default)]
    pub query_string_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Wraps a mapping into the query-string slot of [`RequestParams`].
pub fn set_parameters(parameters: BTreeMap<String, String>) -> RequestParams {
    RequestParams {
        query_string_parameters: parameters,
        headers: BTreeMap::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub api_name: String,
    pub endpoint: String,
    pub additional_params: RequestParams,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            api_name: DEFAULT_API_NAME.to_string(),
            endpoint: "/".to_string(),
            additional_params: RequestParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostRequest {
    pub api_name: String,
    pub endpoint: String,
    pub body: Value,
}

impl Default for PostRequest {
    fn default() -> Self {
        Self {
            api_name: DEFAULT_API_NAME.to_string(),
            endpoint: "/".to_string(),
            body: Value::Object(serde_json::Map::new()),
        }
    }
}

impl PostRequest {
    pub fn create_application(record: &ApplicationRecord) -> Result<Self, ApiError> {
        Ok(Self {
            endpoint: CREATE_APPLICATION_ENDPOINT.to_string(),
            body: serde_json::to_value(record)?,
            ..Self::default()
        })
    }
}

/// Application payload accepted by `POST /create/application`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ApplicationRecord {
    pub selected_universities: BTreeSet<String>,
    pub applicant_values: BTreeMap<String, String>,
}

impl ApplicationRecord {
    /// Placeholder payload until the form collects real applicant input.
    pub fn demo() -> Self {
        Self {
            selected_universities: DEMO_UNIVERSITIES.iter().map(|u| u.to_string()).collect(),
            applicant_values: DEMO_APPLICANT_VALUES
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no endpoint configured for API '{0}'")]
    UnknownApi(String),
    #[error("invalid URL for API '{api_name}': {source}")]
    InvalidUrl {
        api_name: String,
        source: reqwest::Error,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Remote calls the upload view issues against the REST API.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn fetch_data(&self, request: FetchRequest) -> Result<Value, ApiError>;
    async fn post_data(&self, request: PostRequest) -> Result<Value, ApiError>;
}

/// `reqwest`-backed client for the configured REST APIs.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: ApiConfig) -> Self {
        Self {
            http,
            config,
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    fn request(
        &self,
        method: Method,
        api_name: &str,
        endpoint: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let base = self
            .config
            .resolve(api_name)
            .ok_or_else(|| ApiError::UnknownApi(api_name.to_string()))?;
        let url = join_url(base, endpoint);

        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.access_token {
            builder = builder.header(AUTHORIZATION, token);
        }
        Ok(builder)
    }

    async fn send(&self, api_name: &str, builder: RequestBuilder) -> Result<Value, ApiError> {
        let request = builder.build().map_err(|source| {
            if source.is_builder() {
                ApiError::InvalidUrl {
                    api_name: api_name.to_string(),
                    source,
                }
            } else {
                ApiError::Transport(source)
            }
        })?;
        debug!(method = %request.method(), url = %request.url(), "calling portal API");

        let response = self.http.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(parse_body(&text))
    }
}

#[async_trait]
impl ApiGateway for ApiClient {
    async fn fetch_data(&self, request: FetchRequest) -> Result<Value, ApiError> {
        let FetchRequest {
            api_name,
            endpoint,
            additional_params,
        } = request;

        let mut builder = self.request(Method::GET, &api_name, &endpoint)?;
        if !additional_params.query_string_parameters.is_empty() {
            builder = builder.query(&additional_params.query_string_parameters);
        }
        for (name, value) in &additional_params.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        self.send(&api_name, builder).await
    }

    async fn post_data(&self, request: PostRequest) -> Result<Value, ApiError> {
        let PostRequest {
            api_name,
            endpoint,
            body,
        } = request;

        debug!(%endpoint, %body, "posting to portal API");
        let builder = self.request(Method::POST, &api_name, &endpoint)?.json(&body);
        self.send(&api_name, builder).await
    }
}

fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = endpoint.trim_start_matches('/');
    if path.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{path}")
    }
}

/// JSON when possible, raw text otherwise, `null` for an empty body.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
