//! Defines the notification trait used to announce processing outcomes and
//! report triggers to downstream consumers.

use crate::Error;

/// The kinds of notification the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// An occurrence of a recurring transaction was materialized.
    RecurringProcessed,
    /// An occurrence of a recurring transaction could not be materialized.
    RecurringFailed,
    /// The daily budget alert job fired.
    BudgetAlert,
    /// The weekly report job fired.
    WeeklyReport,
    /// The monthly report job fired.
    MonthlyReport,
}

impl NotificationKind {
    /// The stable string tag used in notification payloads and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::RecurringProcessed => "recurring_processed",
            NotificationKind::RecurringFailed => "recurring_failed",
            NotificationKind::BudgetAlert => "budget_alert",
            NotificationKind::WeeklyReport => "weekly_report",
            NotificationKind::MonthlyReport => "monthly_report",
        }
    }
}

/// Delivers notifications to a downstream consumer, e.g. a push gateway.
///
/// Delivery is fire-and-forget: callers log failures and carry on, a failed
/// notification never rolls back ledger or scheduling state.
pub trait Notifier {
    /// Deliver a notification of `kind` with a JSON `payload`.
    ///
    /// # Errors
    /// This function will return an [Error::NotificationFailure] if the
    /// downstream consumer rejected the notification.
    fn notify(&self, kind: NotificationKind, payload: serde_json::Value) -> Result<(), Error>;
}

/// A [Notifier] that writes notifications to the application log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotificationKind, payload: serde_json::Value) -> Result<(), Error> {
        tracing::info!(kind = kind.as_str(), %payload, "notification");

        Ok(())
    }
}
