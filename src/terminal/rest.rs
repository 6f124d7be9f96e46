//! Terminal REST API client implementation

use reqwest::{Method, StatusCode, Url};
use tracing::{debug, info};

use super::protocol::{TERMINAL_SERVICE_PATH, normalize_base_url, url_path_join};
use super::types::{RequestSettings, Result, TerminalError, TerminalModel};

/// Stateless client for the `api/terminals` collection
#[derive(Debug, Clone)]
pub struct TerminalRestClient {
    base_url: String,
    settings: RequestSettings,
    client: reqwest::Client,
}

impl TerminalRestClient {
    pub fn new(base_url: impl Into<String>, settings: RequestSettings) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            settings,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the server to start a new terminal
    pub async fn create_terminal(&self) -> Result<TerminalModel> {
        let url = url_path_join(&self.base_url, TERMINAL_SERVICE_PATH, None)?;
        let response = self.request(Method::POST, url).await?;
        expect_status(&response, StatusCode::OK)?;

        let model: TerminalModel = response
            .json()
            .await
            .map_err(|e| TerminalError::Protocol(format!("Invalid terminal model: {}", e)))?;

        info!("Server created terminal {}", model.name);
        Ok(model)
    }

    /// Fetch the terminals running on the server
    pub async fn list_terminals(&self) -> Result<Vec<TerminalModel>> {
        let url = url_path_join(&self.base_url, TERMINAL_SERVICE_PATH, None)?;
        let response = self.request(Method::GET, url).await?;
        expect_status(&response, StatusCode::OK)?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TerminalError::Protocol(format!("Failed to parse terminal list: {}", e)))?;
        if !data.is_array() {
            return Err(TerminalError::Protocol("Invalid terminal data".to_string()));
        }

        let models: Vec<TerminalModel> = serde_json::from_value(data)
            .map_err(|e| TerminalError::Protocol(format!("Invalid terminal data: {}", e)))?;

        debug!("Server reports {} running terminals", models.len());
        Ok(models)
    }

    /// Shut down a terminal by name
    pub async fn delete_terminal(&self, name: &str) -> Result<()> {
        let url = url_path_join(&self.base_url, TERMINAL_SERVICE_PATH, Some(name))?;
        let response = self.request(Method::DELETE, url).await?;
        expect_status(&response, StatusCode::NO_CONTENT)?;

        info!("Server shut down terminal {}", name);
        Ok(())
    }

    async fn request(&self, method: Method, url: Url) -> Result<reqwest::Response> {
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, url)
            .timeout(self.settings.timeout());
        for (name, value) in self.settings.header_pairs() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .send()
            .await
            .map_err(|e| TerminalError::HttpRequest(format!("Failed to send HTTP request: {}", e)))
    }
}

fn expect_status(response: &reqwest::Response, expected: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected {
        debug!("Unexpected status {} from {}", status, response.url());
        return Err(TerminalError::HttpStatus(status.as_u16()));
    }
    Ok(())
}
