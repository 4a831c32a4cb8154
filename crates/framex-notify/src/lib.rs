//! User notifications for the FrameX pipeline.
//!
//! - [`Template`] selection and HTML rendering
//! - [`Mailer`] transports (SMTP via `lettre`, log-only)
//! - [`RecipientDirectory`] lookup of a user's e-mail address

pub mod config;
pub mod directory;
pub mod error;
pub mod mailer;
pub mod template;

pub use config::{MailTransport, SmtpConfig};
pub use directory::{RecipientDirectory, StaticDirectory};
pub use error::{NotifyError, NotifyResult};
pub use mailer::{LogMailer, Mailer, SmtpMailer};
pub use template::{render, RenderedEmail, Template};
