//! # Mail
//!
//! Outgoing mail goes through a relay that accepts `{to, subject, text}` JSON.
//! Without `MAIL_RELAY_URL` messages are only logged, which is enough for local runs.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Relay request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Relay rejected message with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), MailError>;
}

pub struct HttpMailer {
    client: Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: &str) -> Result<Self, MailError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            relay_url: relay_url.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let response = self.client.post(&self.relay_url).json(mail).send().await?;

        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }

        debug!("Relayed mail to {}", mail.to);
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        info!("Mail to {} [{}]: {}", mail.to, mail.subject, mail.text);

        Ok(())
    }
}

/// Keeps every message in memory. Lets API tests read mailed OTP codes.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().clone()
    }

    pub fn last_to(&self, to: &str) -> Option<Mail> {
        self.sent.lock().iter().rev().find(|mail| mail.to == to).cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        self.sent.lock().push(mail.clone());

        Ok(())
    }
}

pub fn init_mailer(config: &Config) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.mail_relay_url {
        Some(url) => {
            info!("Sending mail through {url}");
            Ok(Arc::new(HttpMailer::new(url)?))
        }
        None => {
            info!("MAIL_RELAY_URL not set, mail will be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str, text: &str) -> Mail {
        Mail {
            to: to.to_string(),
            subject: "Subject".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_recording_mailer_keeps_order() {
        let mailer = RecordingMailer::new();
        mailer.send(&mail("a@test.com", "first")).await.unwrap();
        mailer.send(&mail("b@test.com", "other")).await.unwrap();
        mailer.send(&mail("a@test.com", "second")).await.unwrap();

        assert_eq!(mailer.sent().len(), 3);
        assert_eq!(mailer.last_to("a@test.com").unwrap().text, "second");
        assert!(mailer.last_to("c@test.com").is_none());
    }

    #[test]
    fn test_mail_wire_shape() {
        let json = serde_json::to_value(mail("a@test.com", "hi")).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"to": "a@test.com", "subject": "Subject", "text": "hi"})
        );
    }

    #[test]
    fn test_init_without_relay_logs() {
        let config = Config::with_secret("secret");

        assert!(init_mailer(&config).is_ok());
    }
}
