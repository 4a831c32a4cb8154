//! E-mail templates.
//!
//! The template is chosen from the notification status; every value taken
//! from the message is HTML-escaped before it is placed in the body.

use framex_models::NotificationRequest;

/// Closed set of notification e-mails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Success,
    Error,
    Processing,
    Generic,
}

/// A rendered e-mail, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

impl Template {
    pub fn for_status(status: &str) -> Self {
        match status {
            "completed" => Template::Success,
            "failed" | "error" => Template::Error,
            "processing" => Template::Processing,
            _ => Template::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Template::Success => "success",
            Template::Error => "error",
            Template::Processing => "processing",
            Template::Generic => "generic",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Template::Success => "Your video was processed successfully",
            Template::Error => "Your video could not be processed",
            Template::Processing => "Your video is being processed",
            Template::Generic => "An update about your video",
        }
    }

    fn accent(&self) -> &'static str {
        match self {
            Template::Success => "#28a745",
            Template::Error => "#dc3545",
            Template::Processing => "#ffc107",
            Template::Generic => "#007bff",
        }
    }

    fn headline(&self) -> &'static str {
        match self {
            Template::Success => "Video processed",
            Template::Error => "Processing failed",
            Template::Processing => "Processing started",
            Template::Generic => "Video update",
        }
    }

    pub fn render(&self, msg: &NotificationRequest) -> RenderedEmail {
        let mut details = vec![
            ("Video", escape_html(&msg.video_title)),
            ("ID", escape_html(msg.video_id.as_str())),
            ("Status", escape_html(&msg.status)),
        ];

        let message = match self {
            Template::Success => {
                details.push(("Processed at", msg.processed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
                "Your video has been processed. The extracted frames are ready to download from the platform.".to_string()
            }
            Template::Error => {
                let reason = msg.error_message.as_deref().unwrap_or("unknown error");
                details.push(("Error", escape_html(reason)));
                "We could not process your video. You can upload it again or contact support if the problem persists.".to_string()
            }
            Template::Processing => {
                "Your video is in the queue and frame extraction has started. We will e-mail you again when it is done.".to_string()
            }
            Template::Generic => "There is an update about your video.".to_string(),
        };

        let items: String = details
            .iter()
            .map(|(label, value)| format!("<li><strong>{}:</strong> {}</li>", label, value))
            .collect();

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{headline}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
<div style="max-width: 600px; margin: 0 auto;">
<div style="background: {accent}; color: white; padding: 20px; text-align: center;"><h1>{headline}</h1></div>
<div style="padding: 20px; background: #f8f9fa;">
<p>Hello <strong>{name}</strong>,</p>
<p>{message}</p>
<ul>{items}</ul>
</div>
</div>
</body>
</html>"#,
            headline = self.headline(),
            accent = self.accent(),
            name = escape_html(&msg.user_name),
            message = message,
            items = items,
        );

        RenderedEmail {
            subject: self.subject().to_string(),
            html,
        }
    }
}

/// Render the template selected by the message status.
pub fn render(msg: &NotificationRequest) -> RenderedEmail {
    Template::for_status(&msg.status).render(msg)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
