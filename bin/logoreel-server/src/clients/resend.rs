//! Resend email delivery.

use async_trait::async_trait;
use tracing::{debug, info};

use super::mail::{Email, MailError, Mailer};

const RESEND_URL: &str = "https://api.resend.com/emails";

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
}

impl ResendMailer {
    pub fn new(client: reqwest::Client, api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, email: Email) -> Result<(), MailError> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!(subject = %email.subject, "mailer not configured; skipping send");
            return Ok(());
        };

        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [email.to],
                "subject": email.subject,
                "html": email.html,
            }))
            .send()
            .await
            .map_err(|e| MailError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Upstream(format!("{status}: {body}")));
        }
        info!(subject = %email.subject, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clients::mail::welcome_email;

    #[tokio::test]
    async fn unconfigured_mailer_skips_quietly() {
        let mailer = ResendMailer::new(reqwest::Client::new(), None, "x <x@y.z>");
        assert!(!mailer.is_configured());
        assert!(mailer.send(welcome_email("a@b.c", "http://localhost")).await.is_ok());
    }
}
