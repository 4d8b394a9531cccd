use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use lettre::message::Mailbox;
use serde::Serialize;
use tracing::{info, warn};

use super::transport::{MailAttachment, MailTransport, OutgoingMail, SmtpMailer};
use crate::core::error::bounded;
use crate::core::{DeliveryConfigError, DeliveryTransportError, SmtpSettings};
use crate::report::Report;

/// What to send and to whom. The attachment is referenced by path and read
/// at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment: PathBuf,
}

impl DeliveryRequest {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        attachment: impl Into<PathBuf>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            attachment: attachment.into(),
        }
    }

    pub fn for_report(
        report: &Report,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(recipient, subject, body, report.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Sent,
    SentWithoutAttachment,
    Failed,
}

/// Terminal state of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    /// The artifact was missing; the message went out without it.
    SentWithoutAttachment { warning: String },
    Failed(DeliveryTransportError),
}

impl DeliveryOutcome {
    pub fn status(&self) -> DeliveryStatus {
        match self {
            DeliveryOutcome::Sent => DeliveryStatus::Sent,
            DeliveryOutcome::SentWithoutAttachment { .. } => DeliveryStatus::SentWithoutAttachment,
            DeliveryOutcome::Failed(_) => DeliveryStatus::Failed,
        }
    }

    pub fn error(&self) -> Option<&DeliveryTransportError> {
        match self {
            DeliveryOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_sent(&self) -> bool {
        !matches!(self, DeliveryOutcome::Failed(_))
    }
}

/// Mails report artifacts.
///
/// Without an injected transport a lettre SMTP transport is built from the
/// settings for each delivery.
pub struct DeliveryService {
    settings: SmtpSettings,
    transport: Option<Box<dyn MailTransport>>,
}

impl DeliveryService {
    pub fn new(settings: SmtpSettings) -> Self {
        Self {
            settings,
            transport: None,
        }
    }

    pub fn with_transport(settings: SmtpSettings, transport: impl MailTransport + 'static) -> Self {
        Self {
            settings,
            transport: Some(Box::new(transport)),
        }
    }

    pub fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    /// Configuration problems are returned as `Err` before any transport is
    /// touched. Everything after that ends in a [`DeliveryOutcome`].
    pub fn deliver(
        &self,
        request: &DeliveryRequest,
    ) -> Result<DeliveryOutcome, DeliveryConfigError> {
        let (username, password) = self
            .settings
            .credentials()
            .ok_or(DeliveryConfigError::MissingCredentials)?;
        let sender = self.settings.sender().unwrap_or(username);
        let from: Mailbox = sender
            .parse()
            .map_err(|_| DeliveryConfigError::InvalidSender(sender.to_string()))?;

        let smtp;
        let transport: &dyn MailTransport = match &self.transport {
            Some(transport) => transport.as_ref(),
            None => {
                smtp = SmtpMailer::new(&self.settings, username, password)?;
                &smtp
            }
        };

        let to: Mailbox = match request.recipient.trim().parse() {
            Ok(to) => to,
            Err(e) => {
                return Ok(DeliveryOutcome::Failed(DeliveryTransportError::Message(
                    bounded(&format!("invalid recipient {:?}: {e}", request.recipient)),
                )))
            }
        };

        let (attachment, warning) = match read_attachment(&request.attachment) {
            Ok(attachment) => (Some(attachment), None),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let warning = format!(
                    "attachment {} not found; sending without it",
                    request.attachment.display()
                );
                warn!(recipient = %request.recipient, "{warning}");
                (None, Some(warning))
            }
            Err(e) => {
                return Ok(DeliveryOutcome::Failed(DeliveryTransportError::Attachment(
                    bounded(&format!("{}: {e}", request.attachment.display())),
                )))
            }
        };

        let mail = OutgoingMail {
            from,
            to,
            subject: request.subject.clone(),
            body: request.body.clone(),
            attachment,
        };

        match transport.send(&mail) {
            Ok(()) => {
                info!(recipient = %request.recipient, attached = warning.is_none(), "report mailed");
                Ok(match warning {
                    None => DeliveryOutcome::Sent,
                    Some(warning) => DeliveryOutcome::SentWithoutAttachment { warning },
                })
            }
            Err(err) => {
                warn!(recipient = %request.recipient, error = %err, "report delivery failed");
                Ok(DeliveryOutcome::Failed(err))
            }
        }
    }
}

fn read_attachment(path: &Path) -> std::io::Result<MailAttachment> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".to_string());
    let content_type = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
        _ => "application/octet-stream",
    };
    Ok(MailAttachment {
        filename,
        content_type: content_type.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingTransport {
        calls: Arc<AtomicUsize>,
        sent: Arc<Mutex<Vec<OutgoingMail>>>,
        fail_with: Option<DeliveryTransportError>,
    }

    impl MailTransport for RecordingTransport {
        fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryTransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().push(mail.clone());
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    fn configured() -> SmtpSettings {
        SmtpSettings {
            username: Some("reports@example.com".to_string()),
            password: Some("app-password".to_string()),
            ..SmtpSettings::default()
        }
    }

    fn request(attachment: &Path) -> DeliveryRequest {
        DeliveryRequest::new("client@example.com", "Your report", "Dear client,", attachment)
    }

    #[test]
    fn sends_with_attachment() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = tmp.path().join("report.pdf");
        std::fs::write(&artifact, b"%PDF-1.3 test").unwrap();

        let transport = RecordingTransport::default();
        let service = DeliveryService::with_transport(configured(), transport.clone());
        let outcome = service.deliver(&request(&artifact)).unwrap();

        assert_eq!(outcome, DeliveryOutcome::Sent);
        let sent = transport.sent.lock().unwrap();
        let attachment = sent[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.filename, "report.pdf");
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.bytes, b"%PDF-1.3 test");
        assert_eq!(sent[0].from.email.to_string(), "reports@example.com");
    }

    #[test]
    fn missing_artifact_degrades_to_sent_without_attachment() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = RecordingTransport::default();
        let service = DeliveryService::with_transport(configured(), transport.clone());

        let outcome = service
            .deliver(&request(&tmp.path().join("gone.pdf")))
            .unwrap();

        assert_eq!(outcome.status(), DeliveryStatus::SentWithoutAttachment);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(transport.sent.lock().unwrap()[0].attachment.is_none());
    }

    #[test]
    fn missing_credentials_fail_before_any_transport_call() {
        let transport = RecordingTransport::default();
        let service = DeliveryService::with_transport(SmtpSettings::default(), transport.clone());

        let err = service
            .deliver(&request(Path::new("report.pdf")))
            .unwrap_err();

        assert_eq!(err, DeliveryConfigError::MissingCredentials);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_credentials_fail_without_injected_transport() {
        let service = DeliveryService::new(SmtpSettings::default());
        assert_eq!(
            service.deliver(&request(Path::new("report.pdf"))),
            Err(DeliveryConfigError::MissingCredentials)
        );
    }

    #[test]
    fn invalid_sender_is_a_configuration_error() {
        let mut settings = configured();
        settings.from = Some("not an address".to_string());
        let transport = RecordingTransport::default();
        let service = DeliveryService::with_transport(settings, transport.clone());

        let err = service
            .deliver(&request(Path::new("report.pdf")))
            .unwrap_err();
        assert!(matches!(err, DeliveryConfigError::InvalidSender(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_recipient_fails_without_sending() {
        let transport = RecordingTransport::default();
        let service = DeliveryService::with_transport(configured(), transport.clone());
        let mut req = request(Path::new("report.pdf"));
        req.recipient = "nobody".to_string();

        let outcome = service.deliver(&req).unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed(DeliveryTransportError::Message(_))
        ));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transport_errors_are_reported_not_raised() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = tmp.path().join("report.pdf");
        std::fs::write(&artifact, b"%PDF").unwrap();

        for err in [
            DeliveryTransportError::Authentication("535 bad credentials".to_string()),
            DeliveryTransportError::Transport("connection refused".to_string()),
        ] {
            let transport = RecordingTransport {
                fail_with: Some(err.clone()),
                ..RecordingTransport::default()
            };
            let service = DeliveryService::with_transport(configured(), transport.clone());
            let outcome = service.deliver(&request(&artifact)).unwrap();
            assert_eq!(outcome.status(), DeliveryStatus::Failed);
            assert_eq!(outcome.error(), Some(&err));
            assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn unreadable_attachment_fails_the_delivery() {
        let tmp = tempfile::tempdir().unwrap();
        // a directory exists but cannot be read as a file
        let transport = RecordingTransport::default();
        let service = DeliveryService::with_transport(configured(), transport.clone());

        let outcome = service.deliver(&request(tmp.path())).unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed(DeliveryTransportError::Attachment(_))
        ));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
