use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("invalid content type: {0}")]
    ContentType(&'static str),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: from.parse()?,
        })
    }
}

fn build_message(from: Mailbox, email: Email) -> Result<Message, MailError> {
    let alternative = MultiPart::alternative()
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(email.text),
        )
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(email.html),
        );

    let mut mixed = MultiPart::mixed().multipart(alternative);
    for attachment in email.attachments {
        let content_type = ContentType::parse(attachment.content_type)
            .map_err(|_| MailError::ContentType(attachment.content_type))?;
        mixed = mixed.singlepart(Attachment::new(attachment.filename).body(attachment.bytes, content_type));
    }

    Ok(Message::builder()
        .from(from)
        .to(email.to.parse()?)
        .subject(email.subject)
        .multipart(mixed)?)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let to = email.to.clone();
        let message = build_message(self.from.clone(), email)?;
        self.transport.send(message).await?;
        tracing::info!(to = %to, "Email sent");
        Ok(())
    }
}

/// Logs messages instead of delivering them; used when no SMTP host is
/// configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "Email not sent (no SMTP configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message_with_attachment() {
        let email = Email {
            to: "guest@example.com".into(),
            subject: "Hello".into(),
            text: "Hi".into(),
            html: "<p>Hi</p>".into(),
            attachments: vec![EmailAttachment {
                filename: "qr.png".into(),
                content_type: "image/png",
                bytes: vec![1, 2, 3],
            }],
        };
        let from: Mailbox = "EventDesk <no-reply@eventdesk.local>".parse().unwrap();
        let message = build_message(from, email).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("qr.png"));
    }

    #[test]
    fn test_bad_recipient_is_an_error() {
        let email = Email {
            to: "not an address".into(),
            subject: "x".into(),
            text: String::new(),
            html: String::new(),
            attachments: vec![],
        };
        let from: Mailbox = "no-reply@eventdesk.local".parse().unwrap();
        assert!(matches!(build_message(from, email), Err(MailError::Address(_))));
    }
}
