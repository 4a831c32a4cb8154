//! Mail transports.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use crate::config::{MailTransport, SmtpConfig};
use crate::error::{NotifyError, NotifyResult};
use crate::template::RenderedEmail;

/// Delivers rendered e-mails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to_email: &str, to_name: &str, email: &RenderedEmail) -> NotifyResult<()>;

    /// Check that the transport is reachable.
    async fn check(&self) -> NotifyResult<()> {
        Ok(())
    }
}

/// Build the mailer selected by the configuration.
pub fn from_config(config: &SmtpConfig) -> NotifyResult<Box<dyn Mailer>> {
    match config.transport {
        MailTransport::Smtp => Ok(Box::new(SmtpMailer::new(config)?)),
        MailTransport::Log => Ok(Box::new(LogMailer)),
    }
}

fn parse_address(address: &str) -> NotifyResult<Address> {
    address
        .parse::<Address>()
        .map_err(|e| NotifyError::invalid_address(address, e.to_string()))
}

/// SMTP mailer over `lettre`'s tokio transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> NotifyResult<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotifyError::config(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = Mailbox::new(
            Some(config.from_name.clone()),
            parse_address(&config.from_email)?,
        );

        info!(host = %config.host, port = config.port, "SMTP mailer configured");

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, to_email: &str, to_name: &str, email: &RenderedEmail) -> NotifyResult<Message> {
        let name = (!to_name.is_empty()).then(|| to_name.to_string());
        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(name, parse_address(to_email)?))
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to_email: &str, to_name: &str, email: &RenderedEmail) -> NotifyResult<()> {
        let message = self.build_message(to_email, to_name, email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::transport(e.to_string()))?;
        debug!(to = to_email, subject = %email.subject, "E-mail accepted by SMTP server");
        Ok(())
    }

    async fn check(&self) -> NotifyResult<()> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(NotifyError::transport("SMTP server refused the connection test")),
            Err(e) => Err(NotifyError::transport(e.to_string())),
        }
    }
}

/// Mailer that only logs, for local runs without an SMTP server.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to_email: &str, _to_name: &str, email: &RenderedEmail) -> NotifyResult<()> {
        parse_address(to_email)?;
        info!(
            to = to_email,
            subject = %email.subject,
            body_len = email.html.len(),
            "E-mail logged instead of sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> RenderedEmail {
        RenderedEmail {
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_mailer_validates_address() {
        assert!(LogMailer.send("ana@example.com", "Ana", &email()).await.is_ok());
        let err = LogMailer.send("not-an-address", "", &email()).await.unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_smtp_message_building() {
        let config = SmtpConfig {
            starttls: false,
            ..SmtpConfig::default()
        };
        let mailer = SmtpMailer::new(&config).unwrap();
        let message = mailer.build_message("ana@example.com", "Ana", &email()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("ana@example.com"));
    }
}
