// PassGuard — Mail boundary
//
// Welcome mail for admin-created accounts goes through this trait so the
// delivery mechanism stays swappable. Delivery is best effort; callers log
// failures and carry on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// Outcome of a delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub success: bool,
    pub message_id: Option<String>,
}

pub trait Mailer {
    /// Send the welcome mail carrying the temporary password for a freshly
    /// provisioned account.
    fn send_welcome_email(
        &self,
        to: &str,
        full_name: &str,
        temporary_password: &str,
    ) -> Result<DeliveryReceipt, MailError>;
}

/// Default mailer: logs the event instead of speaking SMTP. Deployments
/// wire a real transport behind the same trait.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_welcome_email(
        &self,
        to: &str,
        full_name: &str,
        _temporary_password: &str,
    ) -> Result<DeliveryReceipt, MailError> {
        let message_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(%to, %full_name, %message_id, "Welcome email queued");
        Ok(DeliveryReceipt {
            success: true,
            message_id: Some(message_id),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_mailer_reports_success() {
        let receipt = LogMailer
            .send_welcome_email("new@example.test", "New User", "temp-pass")
            .unwrap();
        assert!(receipt.success);
        assert!(receipt.message_id.is_some());
    }
}
