// Email alerts for an opened slot
// The SMTP transport is built per send and dropped on return, so no connection outlives the call

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::availability::AvailabilityStatus;
use crate::config::MailConfig;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

// Outbound alert, built only for an available date and discarded after sending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: String,
}

impl Notification {
    pub fn for_status(
        hut_name: &str,
        target_date: NaiveDate,
        status: AvailabilityStatus,
        from: &str,
        to: &str,
    ) -> Self {
        Self {
            subject: format!(
                "{} {}/{} 空きあり！",
                hut_name,
                target_date.month(),
                target_date.day()
            ),
            body: format!(
                "{} {} の予約状況: {}",
                hut_name,
                target_date.format("%Y/%m/%d"),
                status
            ),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn to_message(&self) -> Result<Message, NotifyError> {
        let from: Mailbox = self.from.parse()?;
        let to: Mailbox = self.to.parse()?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

// Delivers a notification somewhere
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

pub struct SmtpNotifier {
    config: MailConfig,
}

impl SmtpNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let credentials = Credentials::new(
            self.config.from_email.clone(),
            self.config.app_password.clone(),
        );

        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port)
                .timeout(Some(self.config.timeout))
                .credentials(credentials)
                .build(),
        )
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        // Build the message first so a bad address never opens a connection
        let message = notification.to_message()?;
        let mailer = self.transport()?;
        mailer.send(message).await?;

        tracing::info!(
            to = %notification.to,
            host = %self.config.smtp_host,
            "Notification email sent"
        );
        Ok(())
    }
}
