//! Transactional email seam.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider request failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Send one message. Unconfigured mailers return `Ok(())` without sending.
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Welcome message sent the first time a user signs in.
pub fn welcome_email(to: &str, app_url: &str) -> Email {
    Email {
        to: to.to_owned(),
        subject: "Welcome to logoreel".to_owned(),
        html: format!(
            "<p>Thanks for signing up!</p>\
             <p>Start a creative-direction session to turn your logo into a short animation: \
             <a href=\"{app_url}\">{app_url}</a></p>"
        ),
    }
}

/// Receipt sent after a credit pack purchase is fulfilled.
pub fn credits_purchased_email(to: &str, credits: i64) -> Email {
    Email {
        to: to.to_owned(),
        subject: format!("{credits} credits added to your account"),
        html: format!("<p>Your purchase went through and {credits} credits are ready to use.</p>"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn welcome_email_links_to_app() {
        let email = welcome_email("a@b.c", "https://app.example");
        assert_eq!(email.to, "a@b.c");
        assert!(email.html.contains("https://app.example"));
    }

    #[test]
    fn receipt_mentions_credit_count() {
        assert!(credits_purchased_email("a@b.c", 25).subject.starts_with("25 credits"));
    }
}
