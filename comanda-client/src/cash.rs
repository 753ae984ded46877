//! Cash Desk Controller
//!
//! Shift lifecycle and manual cash movements. The single-open-shift
//! invariant is validated locally against the shifts store before any
//! remote call; the collaborator's own consistency guarantees are the
//! cross-client backstop.

use std::sync::Arc;

use chrono::Utc;
use shared::models::{
    CashShift, CashShiftClose, CashShiftCreate, CashTransaction, CashTransactionCreate,
    ShiftStatus, TransactionType,
};
use shared::Collection;

use crate::error::{FlowError, FlowResult};
use crate::hub::StoreHub;
use crate::remote::DataService;
use crate::reports::{shift_summary, ShiftSummary};
use crate::store::Mutation;

pub struct CashDesk {
    service: Arc<dyn DataService>,
    hub: Arc<StoreHub>,
}

impl CashDesk {
    pub fn new(service: Arc<dyn DataService>, hub: Arc<StoreHub>) -> Self {
        Self { service, hub }
    }

    /// The open shift, if any
    pub fn current_shift(&self) -> Option<CashShift> {
        self.hub
            .shifts
            .snapshot()
            .into_iter()
            .find(|s| s.status == ShiftStatus::Open)
    }

    /// Open a shift with the counted drawer base
    pub async fn open_shift(&self, base_amount: f64, opened_by: &str) -> FlowResult<CashShift> {
        if base_amount < 0.0 {
            return Err(FlowError::Validation("base amount cannot be negative".into()));
        }
        if let Some(open) = self.current_shift() {
            return Err(FlowError::Validation(format!(
                "shift {} is already open",
                open.id
            )));
        }

        let create = CashShiftCreate {
            base_amount,
            opened_by: opened_by.to_string(),
            status: ShiftStatus::Open,
            opened_at: Utc::now(),
        };
        let inserted = self
            .service
            .insert(Collection::CashShifts, serde_json::to_value(&create)?)
            .await?;
        let shift: CashShift = serde_json::from_value(inserted)?;
        self.hub
            .shifts
            .apply_optimistic(Mutation::Insert(shift.clone()));

        tracing::info!(shift = %shift.id, base_amount, "cash shift opened");
        Ok(shift)
    }

    /// Close a shift against the counted cash
    ///
    /// Expected cash comes from [`shift_summary`] over current
    /// snapshots; the stored difference is real − expected.
    pub async fn close_shift(
        &self,
        shift_id: &str,
        final_cash_real: f64,
        notes: Option<String>,
        closed_by: &str,
    ) -> FlowResult<CashShift> {
        let shift = self
            .hub
            .shifts
            .get(shift_id)
            .ok_or_else(|| FlowError::Validation(format!("unknown shift: {shift_id}")))?;
        if shift.status != ShiftStatus::Open {
            return Err(FlowError::Validation(format!(
                "shift {shift_id} is not open"
            )));
        }

        let summary = self.summary(&shift);
        let expected = summary.expected_total;
        let close = CashShiftClose {
            status: ShiftStatus::Closed,
            closed_at: Utc::now(),
            closed_by: closed_by.to_string(),
            final_cash_expected: expected,
            final_cash_real,
            difference: final_cash_real - expected,
            notes,
        };

        let patch = serde_json::to_value(&close)?;
        let updated = self
            .service
            .update(Collection::CashShifts, shift_id, patch.clone())
            .await?;
        let closed: CashShift = serde_json::from_value(updated)?;
        self.hub.shifts.apply_optimistic(Mutation::Update {
            id: shift_id.to_string(),
            patch,
        });

        tracing::info!(
            shift = %shift_id,
            expected,
            real = final_cash_real,
            difference = close.difference,
            "cash shift closed"
        );
        Ok(closed)
    }

    /// Record a manual income or expense in an open shift
    pub async fn add_transaction(
        &self,
        shift_id: &str,
        tx_type: TransactionType,
        amount: f64,
        description: &str,
        user_id: &str,
    ) -> FlowResult<CashTransaction> {
        if amount <= 0.0 {
            return Err(FlowError::Validation("amount must be positive".into()));
        }
        let shift = self
            .hub
            .shifts
            .get(shift_id)
            .ok_or_else(|| FlowError::Validation(format!("unknown shift: {shift_id}")))?;
        if shift.status != ShiftStatus::Open {
            return Err(FlowError::Validation(format!(
                "shift {shift_id} is not open"
            )));
        }

        let create = CashTransactionCreate {
            shift_id: shift_id.to_string(),
            tx_type,
            amount,
            description: description.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        let inserted = self
            .service
            .insert(Collection::CashTransactions, serde_json::to_value(&create)?)
            .await?;
        let transaction: CashTransaction = serde_json::from_value(inserted)?;
        self.hub
            .transactions
            .apply_optimistic(Mutation::Insert(transaction.clone()));
        Ok(transaction)
    }

    /// Transactions of a shift, newest first
    pub fn shift_transactions(&self, shift_id: &str) -> Vec<CashTransaction> {
        let mut transactions: Vec<CashTransaction> = self
            .hub
            .transactions
            .snapshot()
            .into_iter()
            .filter(|t| t.shift_id == shift_id)
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions
    }

    /// Expected-cash breakdown for a shift from current snapshots
    pub fn summary(&self, shift: &CashShift) -> ShiftSummary {
        shift_summary(
            shift,
            &self.hub.transactions.snapshot(),
            &self.hub.orders.snapshot(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desk() -> (Arc<crate::remote::MemoryDataService>, Arc<StoreHub>, CashDesk) {
        let service = Arc::new(crate::remote::MemoryDataService::new());
        let hub = StoreHub::new();
        let desk = CashDesk::new(
            Arc::clone(&service) as Arc<dyn DataService>,
            Arc::clone(&hub),
        );
        (service, hub, desk)
    }

    #[tokio::test]
    async fn test_open_shift_and_single_open_invariant() {
        let (_service, hub, desk) = desk();

        let shift = desk.open_shift(150.0, "ana").await.unwrap();
        assert_eq!(shift.status, ShiftStatus::Open);
        assert_eq!(hub.shifts.len(), 1);

        let err = desk.open_shift(200.0, "luis").await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert_eq!(hub.shifts.len(), 1);
    }

    #[tokio::test]
    async fn test_negative_base_rejected_locally() {
        let (_service, hub, desk) = desk();
        let err = desk.open_shift(-5.0, "ana").await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert!(hub.shifts.is_empty());
    }

    #[tokio::test]
    async fn test_close_shift_computes_difference() {
        let (_service, _hub, desk) = desk();
        let shift = desk.open_shift(100.0, "ana").await.unwrap();

        desk.add_transaction(&shift.id, TransactionType::Income, 50.0, "tips", "ana")
            .await
            .unwrap();
        desk.add_transaction(&shift.id, TransactionType::Expense, 20.0, "ice", "ana")
            .await
            .unwrap();

        // expected = 100 + 0 + 50 - 20 = 130; counted 125 → short 5
        let closed = desk
            .close_shift(&shift.id, 125.0, Some("short".into()), "ana")
            .await
            .unwrap();
        assert_eq!(closed.status, ShiftStatus::Closed);
        assert_eq!(closed.final_cash_expected, Some(130.0));
        assert_eq!(closed.final_cash_real, Some(125.0));
        assert_eq!(closed.difference, Some(-5.0));
        assert!(closed.closed_at.is_some());
    }

    #[tokio::test]
    async fn test_transaction_requires_open_shift() {
        let (_service, _hub, desk) = desk();
        let shift = desk.open_shift(100.0, "ana").await.unwrap();
        desk.close_shift(&shift.id, 100.0, None, "ana").await.unwrap();

        let err = desk
            .add_transaction(&shift.id, TransactionType::Income, 10.0, "x", "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_transactions_sorted_newest_first() {
        let (_service, _hub, desk) = desk();
        let shift = desk.open_shift(0.0, "ana").await.unwrap();
        desk.add_transaction(&shift.id, TransactionType::Income, 1.0, "first", "ana")
            .await
            .unwrap();
        desk.add_transaction(&shift.id, TransactionType::Income, 2.0, "second", "ana")
            .await
            .unwrap();

        let transactions = desk.shift_transactions(&shift.id);
        assert_eq!(transactions.len(), 2);
        assert!(transactions[0].created_at >= transactions[1].created_at);
    }
}
