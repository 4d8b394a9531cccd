//! Optional mail delivery of report artifacts.
//!
//! [`DeliveryService::deliver`] separates permanent configuration problems
//! (returned as `Err(DeliveryConfigError)` before any network activity) from
//! the outcome of an actual attempt ([`DeliveryOutcome`]). A missing artifact
//! degrades to sending the message without it.

pub mod service;
pub mod transport;

pub use service::{DeliveryOutcome, DeliveryRequest, DeliveryService, DeliveryStatus};
pub use transport::{MailAttachment, MailTransport, OutgoingMail, SmtpMailer};
