//! Outbound email and SMS notifications.
//!
//! The [`Notifier`] trait is the collaborator the portal service talks to. Transport
//! is owned by the host; [`OutboxNotifier`] records every message it accepts so the
//! API binary and tests can inspect what would have been delivered.

pub mod sms;
pub mod templates;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::NotificationConfig;
pub use sms::{Carrier, SmsError, SmsMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    General,
    Welcome,
    PasswordReset,
    Receipt,
    FeedbackResponse,
    InstructorMessage,
    Sms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub kind: MessageKind,
}

impl From<SmsMessage> for EmailMessage {
    fn from(sms: SmsMessage) -> Self {
        Self {
            to: sms.gateway_address,
            subject: String::new(),
            body: sms.body,
            kind: MessageKind::Sms,
        }
    }
}

/// A message accepted by the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailRecord {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub content: String,
    pub sent_at: NaiveDateTime,
    pub kind: MessageKind,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error(transparent)]
    Sms(#[from] SmsError),
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound messaging collaborator. Implementations own their sent-message counter.
pub trait Notifier: Send + Sync {
    fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError>;

    fn sent_count(&self) -> u64;

    fn send_sms(&self, phone_number: &str, body: &str) -> Result<(), NotificationError> {
        let sms = SmsMessage::for_number(phone_number, body)?;
        self.send_email(sms.into())
    }

    fn send_welcome(&self, to: &str, student_name: &str) -> Result<(), NotificationError> {
        self.send_email(templates::welcome(to, student_name))
    }

    fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<(), NotificationError> {
        self.send_email(templates::password_reset(to, reset_link))
    }

    fn send_receipt(
        &self,
        to: &str,
        student_name: &str,
        package_name: &str,
        amount: u32,
        receipt_number: &str,
    ) -> Result<(), NotificationError> {
        self.send_email(templates::receipt(
            to,
            student_name,
            package_name,
            amount,
            receipt_number,
        ))
    }
}

/// In-process notifier that keeps every accepted message.
#[derive(Debug)]
pub struct OutboxNotifier {
    sender: String,
    outbox: Mutex<Vec<EmailRecord>>,
    sent: AtomicU64,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl Default for OutboxNotifier {
    fn default() -> Self {
        Self::new(&NotificationConfig::default())
    }
}

impl OutboxNotifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            sender: format!("{} <{}>", config.sender_name, config.sender_address),
            outbox: Mutex::new(Vec::new()),
            sent: AtomicU64::new(0),
            clock: local_now,
        }
    }

    /// Stamp records with `clock` instead of the wall clock.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn outbox(&self) -> Vec<EmailRecord> {
        match self.outbox.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for OutboxNotifier {
    fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        let record = EmailRecord {
            from: self.sender.clone(),
            to: message.to,
            subject: message.subject,
            content: message.body,
            sent_at: (self.clock)(),
            kind: message.kind,
        };

        self.outbox
            .lock()
            .map_err(|_| NotificationError::Transport("outbox lock poisoned".to_string()))?
            .push(record.clone());
        let sent = self.sent.fetch_add(1, Ordering::Relaxed) + 1;

        info!(to = %record.to, kind = ?record.kind, sent, "notification queued");
        Ok(())
    }

    fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_belongs_to_each_notifier() {
        let first = OutboxNotifier::default();
        let second = OutboxNotifier::default();

        first
            .send_welcome("a@example.com", "Ayanda")
            .expect("welcome queued");
        first
            .send_password_reset("a@example.com", "https://drivehub.test/reset/abc")
            .expect("reset queued");

        assert_eq!(first.sent_count(), 2);
        assert_eq!(second.sent_count(), 0);
        assert_eq!(first.outbox()[1].kind, MessageKind::PasswordReset);
    }

    #[test]
    fn sms_goes_to_the_carrier_gateway() {
        let notifier = OutboxNotifier::default();
        notifier
            .send_sms("+27 83 555 0101", "Lesson tomorrow at 9")
            .expect("sms queued");

        let outbox = notifier.outbox();
        assert_eq!(outbox[0].to, "0835550101@sms.mtnnigeria.net");
        assert_eq!(outbox[0].kind, MessageKind::Sms);
        assert!(outbox[0].subject.is_empty());
    }

    #[test]
    fn unroutable_sms_is_not_counted() {
        let notifier = OutboxNotifier::default();
        let error = notifier
            .send_sms("0601234567", "hello")
            .expect_err("060 has no gateway");
        assert!(matches!(error, NotificationError::Sms(SmsError::UnknownCarrier(_))));
        assert_eq!(notifier.sent_count(), 0);
    }

    #[test]
    fn records_are_stamped_by_the_injected_clock() {
        fn fixed() -> NaiveDateTime {
            chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
                .and_then(|date| date.and_hms_opt(7, 45, 0))
                .expect("valid timestamp")
        }

        let notifier = OutboxNotifier::default().with_clock(fixed);
        notifier
            .send_welcome("b@example.com", "Bongani")
            .expect("welcome queued");
        assert_eq!(notifier.outbox()[0].sent_at, fixed());
    }

    #[test]
    fn sender_comes_from_config() {
        let notifier = OutboxNotifier::new(&NotificationConfig {
            sender_address: "school@example.com".to_string(),
            sender_name: "DriveHub".to_string(),
        });
        assert_eq!(notifier.sender(), "DriveHub <school@example.com>");
    }
}
