//! Notification service for payment outcome messages.
//!
//! Uses `lettre` for SMTP transport. Delivery is strictly fire-and-forget:
//! callers spawn these sends and never let a delivery failure affect a
//! ledger transition.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::warn;

use crate::config::NotificationConfig;

/// Notification service errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Failed to build the message.
    #[error("Failed to build message: {0}")]
    BuildError(String),
    /// Failed to send the message.
    #[error("Failed to send message: {0}")]
    SendError(String),
    /// Invalid recipient address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Notification service for payment outcome messages.
#[derive(Clone)]
pub struct NotificationService {
    config: NotificationConfig,
}

impl NotificationService {
    /// Creates a new notification service.
    #[must_use]
    pub const fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Creates an SMTP transport.
    fn create_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| NotifyError::SendError(e.to_string()))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        Ok(transport)
    }

    /// Notifies a user that a payment completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent.
    pub async fn send_payment_completed(
        &self,
        to_email: &str,
        kind: &str,
        amount: &str,
    ) -> Result<(), NotifyError> {
        let subject = format!("Your {kind} completed - Kavera");
        let body = format!(
            r"Hi,

Your {kind} of {amount} has completed.

Best regards,
The Kavera Team"
        );

        self.send(to_email, &subject, &body).await
    }

    /// Notifies a user that a payment failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent.
    pub async fn send_payment_failed(
        &self,
        to_email: &str,
        kind: &str,
        amount: &str,
        reason: &str,
    ) -> Result<(), NotifyError> {
        let subject = format!("Your {kind} could not be completed - Kavera");
        let body = format!(
            r"Hi,

Your {kind} of {amount} could not be completed: {reason}.

Any reserved funds have been returned to your wallet.

Best regards,
The Kavera Team"
        );

        self.send(to_email, &subject, &body).await
    }

    /// Sends a generic message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent.
    pub async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        if !self.config.enabled {
            warn!(to = %to_email, "notifications disabled, dropping message");
            return Ok(());
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let message = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| NotifyError::InvalidAddress(format!("{e}")))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| NotifyError::InvalidAddress(format!("{e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::BuildError(e.to_string()))?;

        let transport = self.create_transport()?;
        transport
            .send(message)
            .await
            .map_err(|e| NotifyError::SendError(e.to_string()))?;

        Ok(())
    }
}
