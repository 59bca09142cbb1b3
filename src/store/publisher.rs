use super::{EmailSend, Publisher};
use crate::APP_USER_AGENT;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

/// Local dev publisher that logs the message instead of queueing it.
///
/// Only the envelope is logged; bodies carry reset passwords and live links.
#[derive(Clone, Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, message: &EmailSend) -> Result<()> {
        info!(
            subject = %message.subject,
            usernames = ?message.usernames,
            emails = ?message.emails,
            content_len = message.content.len(),
            "email publish stub"
        );
        Ok(())
    }
}

/// Posts each message as JSON to an email queue endpoint.
#[derive(Clone, Debug)]
pub struct HttpPublisher {
    client: Client,
    url: Url,
}

impl HttpPublisher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build email publisher client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    #[instrument(skip_all, fields(subject = %message.subject))]
    async fn publish(&self, message: &EmailSend) -> Result<()> {
        let response = self
            .client
            .post(self.url.as_str())
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} - {}, {}", self.url, status, body));
        }

        debug!("email message queued");
        Ok(())
    }
}
