//! Hub (channel directory) registration.
//!
//! One `POST /channels` at startup. Failures are logged, never retried.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use relay_core::{
    config::Config, errors::Error, security::AUTH_SCHEME, utils::truncate_text, Result,
};

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChannelRegistration {
    pub name: String,
    pub endpoint: String,
    pub authkey: String,
    pub type_of_service: String,
}

impl ChannelRegistration {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            name: cfg.channel_name.clone(),
            endpoint: cfg.channel_endpoint.clone(),
            authkey: cfg.channel_secret.clone(),
            type_of_service: cfg.type_of_service.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HubClient {
    base_url: String,
    secret: String,
    http: reqwest::Client,
}

impl HubClient {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
            http,
        })
    }

    /// `None` when no hub is configured.
    pub fn from_config(cfg: &Config) -> Result<Option<Self>> {
        cfg.hub_url
            .as_deref()
            .map(|url| Self::new(url, cfg.hub_secret.clone()))
            .transpose()
    }

    pub fn channels_url(&self) -> String {
        format!("{}/channels", self.base_url)
    }

    pub async fn register(&self, registration: &ChannelRegistration) -> Result<()> {
        let resp = self
            .http
            .post(self.channels_url())
            .header(reqwest::header::AUTHORIZATION, format!("{AUTH_SCHEME}{}", self.secret))
            .json(registration)
            .send()
            .await
            .map_err(|e| Error::External(format!("hub request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "hub registration failed: {status} {}",
                truncate_text(&body, 200)
            )));
        }
        Ok(())
    }
}

/// Register the configured channel, logging the outcome.
pub async fn register_channel(cfg: &Config) -> Result<()> {
    let Some(hub) = HubClient::from_config(cfg)? else {
        info!("no hub configured; skipping registration");
        return Ok(());
    };

    let registration = ChannelRegistration::from_config(cfg);
    match hub.register(&registration).await {
        Ok(()) => {
            info!(hub = %hub.channels_url(), channel = %registration.name, "registered with hub");
            Ok(())
        }
        Err(e) => {
            error!(hub = %hub.channels_url(), "error creating channel: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registration_payload_matches_hub_contract() {
        let mut cfg = Config::new("Chat", "abc", "/tmp/unused.json");
        cfg.channel_endpoint = "http://10.0.0.2:5001".to_string();

        let v = serde_json::to_value(ChannelRegistration::from_config(&cfg)).unwrap();
        assert_eq!(
            v,
            json!({
                "name": "Chat",
                "endpoint": "http://10.0.0.2:5001",
                "authkey": "abc",
                "type_of_service": "aiweb24:chat",
            })
        );
    }

    #[test]
    fn hub_url_is_normalized() {
        let hub = HubClient::new("http://127.0.0.1:5555/", "k").unwrap();
        assert_eq!(hub.channels_url(), "http://127.0.0.1:5555/channels");
    }

    #[test]
    fn no_hub_url_means_no_client() {
        let mut cfg = Config::new("Chat", "abc", "/tmp/unused.json");
        cfg.hub_url = None;
        assert!(HubClient::from_config(&cfg).unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_hub_is_reported_not_fatal() {
        let mut cfg = Config::new("Chat", "abc", "/tmp/unused.json");
        cfg.hub_url = Some("http://127.0.0.1:9".to_string());
        let err = register_channel(&cfg).await.unwrap_err();
        assert!(err.is_external());
    }
}
