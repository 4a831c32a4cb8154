//! Mail configuration.

use std::time::Duration;

use crate::error::{NotifyError, NotifyResult};

/// Which mail transport the dispatcher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    Smtp,
    /// Log messages instead of sending them (local runs)
    Log,
}

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub transport: MailTransport,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upgrade the connection with STARTTLS
    pub starttls: bool,
    pub from_email: String,
    pub from_name: String,
    pub timeout: Duration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::Smtp,
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            starttls: true,
            from_email: "noreply@framex.local".to_string(),
            from_name: "FrameX Video Processing".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl SmtpConfig {
    /// Create config from environment variables.
    pub fn from_env() -> NotifyResult<Self> {
        let defaults = Self::default();
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let transport = match std::env::var("MAIL_TRANSPORT").as_deref() {
            Ok("log") => MailTransport::Log,
            Ok("smtp") | Err(_) => MailTransport::Smtp,
            Ok(other) => return Err(NotifyError::config(format!("unknown MAIL_TRANSPORT '{}'", other))),
        };

        let config = Self {
            transport,
            host: non_empty("SMTP_HOST").unwrap_or(defaults.host),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            username: non_empty("SMTP_USERNAME"),
            password: non_empty("SMTP_PASSWORD"),
            starttls: std::env::var("SMTP_STARTTLS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.starttls),
            from_email: non_empty("FROM_EMAIL").unwrap_or(defaults.from_email),
            from_name: non_empty("FROM_NAME").unwrap_or(defaults.from_name),
            timeout: Duration::from_secs(
                std::env::var("SMTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NotifyResult<()> {
        if self.transport == MailTransport::Log {
            return Ok(());
        }
        if self.host.trim().is_empty() {
            return Err(NotifyError::config("SMTP_HOST is empty"));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(NotifyError::config(
                "SMTP_USERNAME and SMTP_PASSWORD must be set together",
            ));
        }
        if !self.from_email.contains('@') {
            return Err(NotifyError::config("FROM_EMAIL is not an e-mail address"));
        }
        Ok(())
    }
}
