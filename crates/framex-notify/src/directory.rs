//! Recipient lookup.

use async_trait::async_trait;
use framex_models::Recipient;

/// Resolves a user ID to a mail recipient.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// `None` when the user has no reachable e-mail address.
    async fn resolve(&self, user_id: &str) -> Option<Recipient>;
}

/// Directory returning one configured recipient for every user.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    recipient: Recipient,
}

impl StaticDirectory {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            recipient: Recipient {
                email: email.into(),
                name: name.into(),
            },
        }
    }

    /// Read `DEFAULT_USER_EMAIL` and `DEFAULT_USER_NAME`.
    ///
    /// An explicitly empty `DEFAULT_USER_EMAIL` disables notifications.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("DEFAULT_USER_EMAIL").unwrap_or_else(|_| "user@framex.local".to_string()),
            std::env::var("DEFAULT_USER_NAME").unwrap_or_else(|_| "FrameX User".to_string()),
        )
    }
}

#[async_trait]
impl RecipientDirectory for StaticDirectory {
    async fn resolve(&self, _user_id: &str) -> Option<Recipient> {
        if self.recipient.email.trim().is_empty() {
            return None;
        }
        Some(self.recipient.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticDirectory::new("ana@example.com", "Ana");
        let recipient = directory.resolve("u1").await.unwrap();
        assert_eq!(recipient.email, "ana@example.com");
        assert_eq!(recipient.name, "Ana");
    }

    #[tokio::test]
    async fn test_empty_email_resolves_to_none() {
        let directory = StaticDirectory::new("  ", "Ana");
        assert!(directory.resolve("u1").await.is_none());
    }
}
