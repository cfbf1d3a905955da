//! Implements the due-transaction processor, which materializes ledger
//! entries for recurring transactions that have come due and advances their
//! schedules.

use serde::Serialize;
use serde_json::json;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    clock::Clock,
    models::{DatabaseID, LedgerEntry, RecurringTransaction},
    notify::{NotificationKind, Notifier},
    stores::{LedgerStore, RecurringTransactionStore, ScheduleAdvance},
};

/// The suffix appended to the description of ledger entries materialized
/// from a recurring transaction.
pub const RECURRING_DESCRIPTION_SUFFIX: &str = " (recurring)";

/// A single materialized occurrence of a recurring transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedOccurrence {
    /// The recurring transaction the occurrence belongs to.
    pub recurring_transaction_id: DatabaseID,
    /// The ledger entry that records the occurrence.
    pub ledger_entry_id: DatabaseID,
    /// The due date the recurring transaction was advanced to.
    pub next_due_date: Date,
}

/// The outcome of one processing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingSummary {
    /// The occurrences materialized during the run, in processing order.
    pub processed: Vec<ProcessedOccurrence>,
}

impl ProcessingSummary {
    /// The number of occurrences materialized during the run.
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}

/// Materializes ledger entries for due recurring transactions.
///
/// Each due row is processed independently: a failure on one row is logged
/// and reported through the [Notifier], and the run carries on with the
/// remaining rows.
#[derive(Debug, Clone)]
pub struct DueTransactionProcessor<R, L, N, C> {
    recurring_store: R,
    ledger_store: L,
    notifier: N,
    clock: C,
}

impl<R, L, N, C> DueTransactionProcessor<R, L, N, C>
where
    R: RecurringTransactionStore,
    L: LedgerStore,
    N: Notifier,
    C: Clock,
{
    /// Create a processor over the given stores.
    pub fn new(recurring_store: R, ledger_store: L, notifier: N, clock: C) -> Self {
        Self {
            recurring_store,
            ledger_store,
            notifier,
            clock,
        }
    }

    /// Process every recurring transaction due on or before `as_of` (the
    /// clock's current time when `None`).
    ///
    /// For each due row the processor either:
    /// - deactivates it, when its occurrence cap is reached or its end date
    ///   has passed,
    /// - or materializes one ledger entry for the current occurrence and
    ///   advances the schedule cursor to the next due date.
    ///
    /// Materialization is idempotent per occurrence: a leftover entry from a
    /// previous partial run is reused rather than duplicated, and a row whose
    /// cursor was moved by a concurrent run is skipped.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if the due rows could
    /// not be listed. Failures on individual rows do not abort the run; they
    /// are logged and reported through the [Notifier].
    pub fn process_due_transactions(
        &mut self,
        as_of: Option<OffsetDateTime>,
    ) -> Result<ProcessingSummary, Error> {
        let now = as_of.unwrap_or_else(|| self.clock.now());
        let due = self.recurring_store.get_due(now.date())?;

        tracing::debug!(
            as_of = %now.date(),
            due_count = due.len(),
            "processing due recurring transactions"
        );

        let mut summary = ProcessingSummary::default();

        for row in due {
            match self.process_row(&row, now) {
                Ok(Some(outcome)) => {
                    tracing::info!(
                        recurring_transaction_id = outcome.recurring_transaction_id,
                        ledger_entry_id = outcome.ledger_entry_id,
                        next_due_date = %outcome.next_due_date,
                        "materialized recurring transaction"
                    );

                    self.notify(
                        NotificationKind::RecurringProcessed,
                        json!({
                            "recurring_transaction_id": outcome.recurring_transaction_id,
                            "ledger_entry_id": outcome.ledger_entry_id,
                            "user_id": row.user_id(),
                            "amount": row.amount(),
                            "description": row.description(),
                            "next_due_date": outcome.next_due_date.to_string(),
                        }),
                    );

                    summary.processed.push(outcome);
                }
                // The row terminated (cap reached or end date passed).
                Ok(None) => {}
                Err(Error::ScheduleConflict(id)) => {
                    tracing::warn!(
                        recurring_transaction_id = id,
                        "skipping recurring transaction modified by a concurrent run"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        recurring_transaction_id = row.id(),
                        "could not process recurring transaction: {error}"
                    );

                    self.notify(
                        NotificationKind::RecurringFailed,
                        json!({
                            "recurring_transaction_id": row.id(),
                            "user_id": row.user_id(),
                            "description": row.description(),
                            "error": error.to_string(),
                        }),
                    );
                }
            }
        }

        Ok(summary)
    }

    /// Process one due row.
    ///
    /// Returns `Ok(None)` when the row terminated instead of materializing.
    fn process_row(
        &mut self,
        row: &RecurringTransaction,
        now: OffsetDateTime,
    ) -> Result<Option<ProcessedOccurrence>, Error> {
        if let Some(cap) = row.total_occurrences()
            && row.current_occurrences() >= cap
        {
            tracing::info!(
                recurring_transaction_id = row.id(),
                "deactivating recurring transaction: occurrence cap reached"
            );
            self.recurring_store.deactivate(row.id())?;

            return Ok(None);
        }

        if let Some(end_date) = row.end_date()
            && now.date() > end_date
        {
            tracing::info!(
                recurring_transaction_id = row.id(),
                end_date = %end_date,
                "deactivating recurring transaction: end date passed"
            );
            self.recurring_store.deactivate(row.id())?;

            return Ok(None);
        }

        let occurrence = row.current_occurrences();

        let entry = match self.ledger_store.get_by_origin(row.id(), occurrence)? {
            // A previous run created the entry but did not get to advance
            // the schedule. Reuse it so the occurrence is recorded once.
            Some(existing) => {
                tracing::warn!(
                    recurring_transaction_id = row.id(),
                    occurrence,
                    ledger_entry_id = existing.id(),
                    "reusing ledger entry left over from an interrupted run"
                );
                existing
            }
            None => self.ledger_store.create(
                LedgerEntry::build(row.amount(), row.user_id(), row.kind())?
                    .date(now.date())
                    .description(format!(
                        "{}{}",
                        row.description(),
                        RECURRING_DESCRIPTION_SUFFIX
                    ))
                    .category(row.category_id())
                    .origin(row.id(), occurrence),
            )?,
        };

        let next_due_date = row.next_occurrence();

        self.recurring_store.advance_schedule(ScheduleAdvance {
            id: row.id(),
            expected_next_due_date: row.next_due_date(),
            next_due_date,
            processed_at: now,
        })?;

        Ok(Some(ProcessedOccurrence {
            recurring_transaction_id: row.id(),
            ledger_entry_id: entry.id(),
            next_due_date,
        }))
    }

    fn notify(&self, kind: NotificationKind, payload: serde_json::Value) {
        if let Err(error) = self.notifier.notify(kind, payload) {
            tracing::warn!(
                kind = kind.as_str(),
                "could not deliver notification: {error}"
            );
        }
    }
}
