// ============================
// crates/backend-lib/src/mail.rs
// ============================
//! Outbound mail.
//!
//! Delivery is fire-and-forget: failures are logged and reported as `false`,
//! never retried.
use crate::config::MailSettings;
use crate::metrics::{MAIL_FAILED, MAIL_SENT};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use metrics::counter;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send a plain-text message. Returns whether the transport accepted it.
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool;
}

/// Transport used when no SMTP relay is configured. Logs the recipient and
/// subject and drops the message; bodies carry reset links and are not logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailTransport for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> bool {
        tracing::info!(to, subject, "mail not delivered (no SMTP relay configured)");
        counter!(MAIL_SENT).increment(1);
        true
    }
}

/// Most messages a [`RecordingMailer`] keeps; older ones are dropped
pub const RECORDING_CAPACITY: usize = 256;

/// A message captured by [`RecordingMailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Transport that keeps the most recent messages in memory, for tests
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    outbox: Arc<Mutex<VecDeque<SentMail>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages kept so far, oldest first
    pub fn sent(&self) -> Vec<SentMail> {
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        if outbox.len() == RECORDING_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        true
    }
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_settings(settings: &MailSettings) -> anyhow::Result<Self> {
        let host = settings
            .smtp_host
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("mail.smtp_host is required for SMTP delivery"))?;

        let mut builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        }
        .port(settings.smtp_port);

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from = format!("{} <{}>", settings.from_name, settings.from_address).parse()?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        let recipient: Mailbox = match to.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::error!(to, error = %e, "invalid recipient address");
                counter!(MAIL_FAILED).increment(1);
                return false;
            },
        };

        let message = match Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
        {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(to, error = %e, "failed to build mail");
                counter!(MAIL_FAILED).increment(1);
                return false;
            },
        };

        match self.transport.send(message).await {
            Ok(_) => {
                tracing::info!(to, subject, "mail sent");
                counter!(MAIL_SENT).increment(1);
                true
            },
            Err(e) => {
                tracing::error!(to, error = %e, "failed to send mail");
                counter!(MAIL_FAILED).increment(1);
                false
            },
        }
    }
}

/// Build the transport selected by configuration
pub fn transport_from_settings(settings: &MailSettings) -> anyhow::Result<Arc<dyn MailTransport>> {
    if settings.smtp_host.is_some() {
        Ok(Arc::new(SmtpMailer::from_settings(settings)?))
    } else {
        Ok(Arc::new(LogMailer::new()))
    }
}
