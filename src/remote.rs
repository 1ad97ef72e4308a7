use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_USERS_API_URL: &str = "https://jsonplaceholder.typicode.com";
pub const USERS_API_URL_ENV: &str = "FORMKIT_USERS_API_URL";
pub const USERS_API_TIMEOUT_ENV: &str = "FORMKIT_USERS_API_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteCheckError {
    #[error("availability request failed: {0}")]
    Request(String),
    #[error("availability service answered with status {0}")]
    Status(u16),
    #[error("availability response could not be decoded: {0}")]
    Decode(String),
    #[error("invalid availability service configuration: {0}")]
    Config(String),
}

/// Answers whether a value is still free in some remote record store.
pub trait AvailabilityCheck: Send + Sync + 'static {
    fn is_available(&self, value: String) -> BoxFuture<'static, Result<bool, RemoteCheckError>>;
}

impl<C> AvailabilityCheck for Arc<C>
where
    C: AvailabilityCheck + ?Sized,
{
    fn is_available(&self, value: String) -> BoxFuture<'static, Result<bool, RemoteCheckError>> {
        (**self).is_available(value)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UsersApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for UsersApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_USERS_API_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl UsersApiConfig {
    pub fn from_env() -> Result<Self, RemoteCheckError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RemoteCheckError> {
        let mut config = Self::default();
        if let Some(url) = lookup(USERS_API_URL_ENV).filter(|url| !url.trim().is_empty()) {
            config.base_url = url.trim().to_owned();
        }
        if let Some(secs) = lookup(USERS_API_TIMEOUT_ENV) {
            let secs = secs.trim().parse::<u64>().map_err(|error| {
                RemoteCheckError::Config(format!("{USERS_API_TIMEOUT_ENV}: {error}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn users_endpoint(&self) -> String {
        format!("{}/users", self.base_url.trim_end_matches('/'))
    }
}

/// `GET {base}/users?email=<value>`; the value is available iff the JSON
/// array in the response is empty.
#[derive(Clone, Debug)]
pub struct UsersApi {
    client: reqwest::Client,
    endpoint: String,
}

impl UsersApi {
    pub fn new(config: &UsersApiConfig) -> Result<Self, RemoteCheckError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| RemoteCheckError::Config(error.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.users_endpoint(),
        })
    }

    pub async fn email_available(&self, email: &str) -> Result<bool, RemoteCheckError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("email", email)])
            .send()
            .await
            .map_err(|error| RemoteCheckError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteCheckError::Status(status.as_u16()));
        }

        let records = response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|error| RemoteCheckError::Decode(error.to_string()))?;
        debug!(endpoint = %self.endpoint, matches = records.len(), "availability lookup finished");
        Ok(records.is_empty())
    }
}

impl AvailabilityCheck for UsersApi {
    fn is_available(&self, value: String) -> BoxFuture<'static, Result<bool, RemoteCheckError>> {
        let api = self.clone();
        Box::pin(async move { api.email_available(&value).await })
    }
}
