//! HTTP client for the Penpot RPC API.
//!
//! Commands are posted to `{api_url}/api/rpc/command/<name>` with a JSON
//! body whose keys are rewritten to kebab-case, which is the spelling the
//! backend expects.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{DocumentService, RemoteError, UpdateFileRequest};
use crate::config::Config;
use crate::document::keys::kebab_case_keys;
use crate::document::Document;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Authenticated client for one Penpot instance.
pub struct PenpotClient {
    http: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl PenpotClient {
    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        if config.accept_invalid_certs {
            warn!("TLS certificate validation is disabled");
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(RemoteError::ClientBuild)?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().unwrap_or_default(),
        })
    }

    fn command_url(&self, command: &str) -> String {
        format!("{}/api/rpc/command/{command}", self.api_url)
    }

    /// Posts an RPC command and returns the decoded response body.
    async fn command(&self, command: &str, body: Value) -> Result<Value, RemoteError> {
        debug!(command, "Calling RPC command");

        let response = self
            .http
            .post(self.command_url(command))
            .header("Authorization", format!("Token {}", self.access_token))
            .header("Accept", "application/json")
            .json(&kebab_case_keys(body))
            .send()
            .await
            .map_err(|source| RemoteError::Http {
                command: command.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| RemoteError::Http {
            command: command.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                command: command.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|source| RemoteError::Decode {
            command: command.to_string(),
            source,
        })
    }
}

#[async_trait]
impl DocumentService for PenpotClient {
    async fn get_file(&self, file_id: &str) -> Result<Document, RemoteError> {
        let body = match self.command("get-file", json!({ "id": file_id })).await {
            Err(RemoteError::Status { status: 404, .. }) => {
                return Err(RemoteError::FileNotFound {
                    file_id: file_id.to_string(),
                });
            }
            other => other?,
        };
        Ok(Document::from_value(&body)?)
    }

    async fn update_file(&self, request: &UpdateFileRequest) -> Result<Value, RemoteError> {
        let body = serde_json::to_value(request).map_err(|source| RemoteError::Decode {
            command: "update-file".to_string(),
            source,
        })?;
        self.command("update-file", body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> Config {
        let mut config = Config::default();
        config.api_url = url.to_string();
        config.access_token = Some("secret".into());
        config
    }

    #[test]
    fn command_url_strips_trailing_slash() {
        let client = PenpotClient::new(&config("https://penpot.example.com/")).unwrap();
        assert_eq!(
            client.command_url("get-file"),
            "https://penpot.example.com/api/rpc/command/get-file"
        );
    }

    #[test]
    fn update_request_body_is_kebab_cased() {
        let request = UpdateFileRequest {
            id: "f".into(),
            session_id: "s".into(),
            revn: 3,
            vern: 0,
            changes: vec![crate::document::Change::del_obj("p", "x")],
        };
        let body = kebab_case_keys(serde_json::to_value(&request).unwrap());
        assert_eq!(body["session-id"], "s");
        assert_eq!(body["revn"], 3);
        assert_eq!(body["vern"], 0);
        assert_eq!(body["changes"][0]["page-id"], "p");
        assert_eq!(body["changes"][0]["type"], "del-obj");
    }
}
