//! Component N: the HTTP sink client. One `reqwest::Client` shared process-wide,
//! created lazily on first use.

use anyhow::{Context, Result};
use collector_core::sink::SinkRecord;
use once_cell::sync::OnceCell;
use reqwest::Client;

use crate::config::HttpConfig;

pub struct HttpSink {
    endpoint: Option<String>,
    client: OnceCell<Client>,
    connect_timeout: std::time::Duration,
    request_timeout: std::time::Duration,
}

impl HttpSink {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            client: OnceCell::new(),
            connect_timeout: config.connect_timeout,
            request_timeout: config.timeout,
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client.get_or_try_init(|| {
            Client::builder()
                .connect_timeout(self.connect_timeout)
                .timeout(self.request_timeout)
                .build()
                .context("constructing HTTP client")
        })
    }
}

#[async_trait::async_trait]
impl super::Sink for HttpSink {
    async fn enqueue(&self, record: &SinkRecord) -> Result<()> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };
        let client = self.client()?;
        let response = client
            .post(endpoint)
            .json(&record.clone().into_value())
            .send()
            .await
            .context("sending HTTP sink record")?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP sink responded with {}", response.status());
        }
        Ok(())
    }
}
