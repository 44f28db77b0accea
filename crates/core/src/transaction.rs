use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::{AccountId, PayeeId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        TransactionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger transaction as seen by the transfer engine.
///
/// `amount` is in minor currency units: negative for money leaving the
/// account, positive for money entering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account: AccountId,
    pub amount: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub imported_payee: Option<String>,
    #[serde(default)]
    pub payee: Option<PayeeId>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub transfer_id: Option<TransactionId>,
    #[serde(default)]
    pub is_parent: bool,
}

impl Transaction {
    pub fn is_outflow(&self) -> bool {
        self.amount < 0
    }

    pub fn is_inflow(&self) -> bool {
        self.amount > 0
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer_id.is_some()
    }

    /// Raw import description, or an empty string when the import carried none.
    pub fn imported_payee_text(&self) -> &str {
        self.imported_payee.as_deref().unwrap_or_default()
    }
}

/// Partial update for a single transaction. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee: Option<PayeeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<TransactionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.payee.is_none()
            && self.transfer_id.is_none()
            && self.date.is_none()
            && self.notes.is_none()
    }

    pub fn apply_to(&self, tx: &mut Transaction) {
        if let Some(payee) = &self.payee {
            tx.payee = Some(payee.clone());
        }
        if let Some(transfer_id) = &self.transfer_id {
            tx.transfer_id = Some(transfer_id.clone());
        }
        if let Some(date) = self.date {
            tx.date = date;
        }
        if let Some(notes) = &self.notes {
            tx.notes = Some(notes.clone());
        }
    }
}

/// Absolute number of calendar days between two dates.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days().abs()
}
