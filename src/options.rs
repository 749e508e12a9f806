//! Client for the hub's options form endpoint.
//!
//! The hub knows the partitions, projects and reservations available to the
//! user. Anything that goes wrong while asking it is logged and answered
//! with an empty form so the local part of the response still goes out.

use std::time::Duration;

use serde_json::{Map, Value};

pub type Form = Map<String, Value>;

/// Build `{api_url}/users/{user}/servers/{server}/optionsform`.
/// Unset identity values render as `None`, the same placeholder the hub
/// receives from a spawner without a named server.
pub fn form_url(api_url: &str, user: Option<&str>, server: Option<&str>) -> String {
    format!(
        "{}/users/{}/servers/{}/optionsform",
        api_url.trim_end_matches('/'),
        user.unwrap_or("None"),
        server.unwrap_or("None")
    )
}

#[derive(Clone)]
pub struct OptionsClient {
    client: reqwest::Client,
}

impl OptionsClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        // The hub is commonly reached through an internal address with a
        // self-signed certificate.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch_form(&self, url: &str, authorization: Option<&str>) -> Form {
        log::debug!("fetching options form from {}", url);

        match self.try_fetch_form(url, authorization).await {
            Ok(form) => form,
            Err(err) => {
                log::error!("Slurmel: Could not receive OptionsForm information: {}", err);
                Form::new()
            }
        }
    }

    async fn try_fetch_form(
        &self,
        url: &str,
        authorization: Option<&str>,
    ) -> Result<Form, Box<dyn std::error::Error + Send + Sync>> {
        let mut request = self.client.get(url);
        if let Some(authorization) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }

        let response = request.send().await?.error_for_status()?;
        let body = response.bytes().await?;

        if body.is_empty() {
            return Ok(Form::new());
        }

        match serde_json::from_str::<Value>(&String::from_utf8_lossy(&body))? {
            Value::Object(form) => Ok(form),
            other => Err(format!("expected a JSON object, got {}", other).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_url() {
        assert_eq!(
            form_url("https://hub.example/hub/api/", Some("alice"), Some("gpu")),
            "https://hub.example/hub/api/users/alice/servers/gpu/optionsform"
        );
        assert_eq!(
            form_url("http://localhost/hub/api", None, None),
            "http://localhost/hub/api/users/None/servers/None/optionsform"
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_empty_form() {
        let client = OptionsClient::new().unwrap();
        let form = client
            .fetch_form("http://127.0.0.1:1/hub/api/users/a/servers/b/optionsform", None)
            .await;
        assert!(form.is_empty());
    }
}
