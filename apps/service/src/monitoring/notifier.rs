use std::time::Duration;

use anyhow::{Result, anyhow};

/// Delivers an SMS notification through a gateway trigger URL
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &str) -> Result<()>;
}

/// Gateway reached with a plain HTTP GET on the trigger URL
pub struct HttpNotifier {
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("no trigger URL configured"));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("SMS gateway request failed: {}", e))?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(anyhow!("SMS gateway answered with status code: {}", status.as_u16()))
        }
    }
}
