//! Balance calculation over a ledger snapshot.
//!
//! Balances are derived, never stored: re-running the calculation over the same rows
//! always yields the same answer, and completing a row twice cannot double-count it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::asset::Currency;
use crate::ledger::types::{Direction, Transaction, TransactionStatus};

/// A user's balance in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: Currency,
    /// Net of COMPLETED credits and debits.
    pub total: Decimal,
    pub available: Decimal,
    /// Net of PENDING and PROCESSING credits and debits.
    pub pending: Decimal,
}

impl Balance {
    pub fn zero(currency: Currency) -> Self {
        Self {
            currency,
            total: Decimal::ZERO,
            available: Decimal::ZERO,
            pending: Decimal::ZERO,
        }
    }
}

/// Compute the balance of `user_id` in `currency`. Untouched currencies return zeros.
pub fn calculate(transactions: &[Transaction], user_id: &str, currency: Currency) -> Balance {
    let mut balance = Balance::zero(currency);

    for tx in relevant(transactions, user_id, currency) {
        match tx.status {
            TransactionStatus::Completed => balance.total += tx.delta(),
            status if status.is_in_flight() => balance.pending += tx.delta(),
            _ => {}
        }
    }

    balance.available = balance.total;
    balance
}

/// Amount a new withdrawal may draw: completed funds minus debits still in flight.
///
/// In-flight credits are not spendable until they complete.
pub fn spendable(transactions: &[Transaction], user_id: &str, currency: Currency) -> Decimal {
    let mut total = Decimal::ZERO;
    let mut outgoing = Decimal::ZERO;

    for tx in relevant(transactions, user_id, currency) {
        match (tx.status, tx.kind.direction()) {
            (TransactionStatus::Completed, _) => total += tx.delta(),
            (status, Direction::Debit) if status.is_in_flight() => outgoing += tx.amount,
            _ => {}
        }
    }

    total - outgoing
}

fn relevant<'a>(
    transactions: &'a [Transaction],
    user_id: &'a str,
    currency: Currency,
) -> impl Iterator<Item = &'a Transaction> + 'a {
    transactions
        .iter()
        .filter(move |tx| tx.user_id == user_id && tx.currency == currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{NewTransaction, TransactionType};
    use chrono::Utc;
    use uuid::Uuid;

    fn row(user: &str, kind: TransactionType, amount: i64, currency: Currency, status: TransactionStatus) -> Transaction {
        NewTransaction::new(user, kind, Decimal::from(amount), currency)
            .with_status(status)
            .into_transaction(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_completed_deposit_and_processing_withdrawal() {
        let rows = vec![
            row("u1", TransactionType::Deposit, 100, Currency::UsdtEth, TransactionStatus::Completed),
            row("u1", TransactionType::Withdrawal, 50, Currency::UsdtEth, TransactionStatus::Processing),
        ];

        let balance = calculate(&rows, "u1", Currency::UsdtEth);
        assert_eq!(balance.total, Decimal::new(10000, 2));
        assert_eq!(balance.available, Decimal::from(100));
        assert_eq!(balance.pending, Decimal::from(-50));
        assert_eq!(spendable(&rows, "u1", Currency::UsdtEth), Decimal::from(50));
    }

    #[test]
    fn test_failed_and_cancelled_rows_ignored() {
        let rows = vec![
            row("u1", TransactionType::Deposit, 100, Currency::UsdtEth, TransactionStatus::Failed),
            row("u1", TransactionType::Deposit, 70, Currency::UsdtEth, TransactionStatus::Cancelled),
            row("u1", TransactionType::PrizeWin, 5, Currency::UsdtEth, TransactionStatus::Completed),
            row("u1", TransactionType::EntryFee, 2, Currency::UsdtEth, TransactionStatus::Completed),
        ];

        let balance = calculate(&rows, "u1", Currency::UsdtEth);
        assert_eq!(balance.total, Decimal::from(3));
        assert_eq!(balance.pending, Decimal::ZERO);
    }

    #[test]
    fn test_currencies_and_users_are_isolated() {
        let rows = vec![
            row("u1", TransactionType::Deposit, 100, Currency::UsdtEth, TransactionStatus::Completed),
            row("u1", TransactionType::Deposit, 40, Currency::UsdtTron, TransactionStatus::Completed),
            row("u2", TransactionType::Deposit, 9, Currency::UsdtEth, TransactionStatus::Completed),
        ];

        assert_eq!(calculate(&rows, "u1", Currency::UsdtEth).total, Decimal::from(100));
        assert_eq!(calculate(&rows, "u1", Currency::UsdtTron).total, Decimal::from(40));
        assert_eq!(calculate(&rows, "u1", Currency::Btc), Balance::zero(Currency::Btc));
    }

    #[test]
    fn test_repeated_calls_agree() {
        let rows = vec![
            row("u1", TransactionType::Deposit, 12, Currency::Eth, TransactionStatus::Completed),
            row("u1", TransactionType::Refund, 3, Currency::Eth, TransactionStatus::Pending),
        ];
        assert_eq!(calculate(&rows, "u1", Currency::Eth), calculate(&rows, "u1", Currency::Eth));
        // Pending credits are not spendable.
        assert_eq!(spendable(&rows, "u1", Currency::Eth), Decimal::from(12));
    }
}
