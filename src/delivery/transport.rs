use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::core::error::bounded;
use crate::core::{DeliveryConfigError, DeliveryTransportError, SmtpSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A fully addressed message, ready for a [`MailTransport`].
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub body: String,
    pub attachment: Option<MailAttachment>,
}

impl OutgoingMail {
    pub fn to_message(&self) -> Result<Message, DeliveryTransportError> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        if let Some(attachment) = &self.attachment {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| DeliveryTransportError::Message(bounded(&e.to_string())))?;
            parts = parts.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.bytes.clone(), content_type),
            );
        }

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.subject.clone())
            .multipart(parts)
            .map_err(|e| DeliveryTransportError::Message(bounded(&e.to_string())))
    }
}

/// Sends one message. Implementations are blocking and must not retry.
pub trait MailTransport: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryTransportError>;
}

/// SMTP submission over a STARTTLS-upgraded session.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// Builds the transport. No connection is opened until the first send.
    pub fn new(
        settings: &SmtpSettings,
        username: &str,
        password: &str,
    ) -> Result<Self, DeliveryConfigError> {
        let transport = SmtpTransport::starttls_relay(&settings.host)
            .map_err(|e| DeliveryConfigError::InvalidHost {
                host: settings.host.clone(),
                reason: bounded(&e.to_string()),
            })?
            .port(settings.port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .timeout(Some(Duration::from_secs(settings.timeout_secs)))
            .build();
        Ok(Self { transport })
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryTransportError> {
        let message = mail.to_message()?;
        self.transport
            .send(&message)
            .map(|_| ())
            .map_err(classify_smtp_error)
    }
}

/// 530, 534 and 535 are the authentication replies; everything else is a
/// transport problem.
fn classify_smtp_error(err: lettre::transport::smtp::Error) -> DeliveryTransportError {
    let message = bounded(&err.to_string());
    match err.status() {
        Some(code) if code.to_string().starts_with("53") => {
            DeliveryTransportError::Authentication(message)
        }
        _ => DeliveryTransportError::Transport(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(attachment: Option<MailAttachment>) -> OutgoingMail {
        OutgoingMail {
            from: "reports@example.com".parse().unwrap(),
            to: "client@example.com".parse().unwrap(),
            subject: "Your Document Analysis Report".to_string(),
            body: "Dear client,".to_string(),
            attachment,
        }
    }

    #[test]
    fn message_carries_attachment() {
        let message = mail(Some(MailAttachment {
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.3".to_vec(),
        }))
        .to_message()
        .unwrap();
        let formatted = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(formatted.contains("Subject: Your Document Analysis Report"));
        assert!(formatted.contains("filename=\"report.pdf\""));
        assert!(formatted.contains("application/pdf"));
    }

    #[test]
    fn message_without_attachment_is_plain_body_only() {
        let message = mail(None).to_message().unwrap();
        let formatted = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(formatted.contains("Dear client,"));
        assert!(!formatted.contains("attachment"));
    }

    #[test]
    fn bad_content_type_is_a_message_error() {
        let err = mail(Some(MailAttachment {
            filename: "report.pdf".to_string(),
            content_type: "not a mime type".to_string(),
            bytes: Vec::new(),
        }))
        .to_message()
        .unwrap_err();
        assert!(matches!(err, DeliveryTransportError::Message(_)));
    }

    #[test]
    fn building_the_mailer_does_not_connect() {
        let settings = SmtpSettings {
            host: "smtp.invalid".to_string(),
            ..SmtpSettings::default()
        };
        assert!(SmtpMailer::new(&settings, "user", "secret").is_ok());
    }
}
