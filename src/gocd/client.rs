//! Authenticated HTTP transport for the GoCD pipeline API.

use std::sync::Arc;

use log::debug;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::{GoDashError, Result};

/// HTTP client for a single GoCD server, carrying basic-auth credentials.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct GoCdClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl GoCdClient {
    /// Creates a client for the given server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(server: &str, username: &str, password: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("godash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GoDashError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base_url = Url::parse(server)
            .map_err(|e| GoDashError::Config(format!("Invalid server URL '{server}': {e}")))?;

        // Endpoint paths are appended directly, so the base must end in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Base server URL, used for link construction only.
    pub fn server(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn history_url(&self, name: &str) -> String {
        format!("{}go/api/pipelines/{name}/history.json", self.base_url)
    }

    pub fn instance_url(&self, name: &str, counter: u32) -> String {
        format!(
            "{}go/api/pipelines/{name}/instance/{counter}.json",
            self.base_url
        )
    }

    /// Issues an authenticated GET and returns the parsed JSON body.
    pub async fn get_json(&self, url: &str) -> Result<Arc<Value>> {
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| GoDashError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GoDashError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            GoDashError::Parse(format!("undecodable response body from {url}: {e}"))
        })?;

        Ok(Arc::new(body))
    }
}
