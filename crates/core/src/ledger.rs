use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;

use crate::account::{Account, Payee};
use crate::transaction::{Transaction, TransactionId, TransactionPatch};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),
    #[error("Ledger backend error: {0}")]
    Backend(String),
}

/// The single write primitive the transfer engine needs from a ledger store.
///
/// Implementations apply the fields present in `patch` to the transaction
/// `id` and leave every other field untouched.
pub trait LedgerWriter: Send + Sync {
    fn update_transaction(
        &self,
        id: &TransactionId,
        patch: &TransactionPatch,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

/// Everything the matcher and linker read from a ledger, in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub payees: Vec<Payee>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl LedgerSnapshot {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|t| &t.id == id)
    }
}

/// In-process ledger used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    transactions: Mutex<Vec<Transaction>>,
    failing: Mutex<HashSet<TransactionId>>,
}

impl MemoryLedger {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make every subsequent update of `id` fail with a backend error.
    pub fn fail_updates_for(&self, id: &TransactionId) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(id.clone());
        }
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions
            .lock()
            .map(|txs| txs.clone())
            .unwrap_or_default()
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<Transaction> {
        self.transactions().into_iter().find(|t| &t.id == id)
    }

    fn apply(&self, id: &TransactionId, patch: &TransactionPatch) -> Result<(), LedgerError> {
        let failing = self
            .failing
            .lock()
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        if failing.contains(id) {
            return Err(LedgerError::Backend(format!("update of {id} refused")));
        }
        drop(failing);

        let mut txs = self
            .transactions
            .lock()
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        let tx = txs
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| LedgerError::TransactionNotFound(id.clone()))?;
        patch.apply_to(tx);
        Ok(())
    }
}

impl LedgerWriter for MemoryLedger {
    async fn update_transaction(
        &self,
        id: &TransactionId,
        patch: &TransactionPatch,
    ) -> Result<(), LedgerError> {
        self.apply(id, patch)
    }
}
