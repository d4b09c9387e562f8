use anyhow::Result;
use tracing::info;
use uuid::Uuid;

/// Message handed to the mail collaborator after signup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationEmail {
    pub to: String,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub link: String,
}

pub trait EmailSender: Send + Sync {
    /// # Errors
    /// Returns an error if the message could not be handed off.
    fn send(&self, message: &VerificationEmail) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &VerificationEmail) -> Result<()> {
        info!(
            to_email = %message.to,
            link = %message.link,
            "verification email send stub"
        );
        Ok(())
    }
}

/// `<base>/auth/verify?token=<id>`
#[must_use]
pub fn build_verify_url(public_base_url: &str, token_id: Uuid) -> String {
    format!(
        "{}/auth/verify?token={token_id}",
        public_base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_url_strips_trailing_slash() {
        let id = Uuid::nil();
        assert_eq!(
            build_verify_url("https://gw.example.com/", id),
            "https://gw.example.com/auth/verify?token=00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            build_verify_url("http://localhost:8080", id),
            "http://localhost:8080/auth/verify?token=00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn log_sender_accepts_messages() {
        let message = VerificationEmail {
            to: "a@example.com".to_string(),
            name: None,
            last_name: None,
            link: "http://localhost/auth/verify?token=x".to_string(),
        };
        assert!(LogEmailSender.send(&message).is_ok());
    }
}
