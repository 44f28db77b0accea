pub mod account;
pub mod ledger;
pub mod money;
pub mod transaction;

pub use account::{Account, AccountId, Payee, PayeeId};
pub use ledger::{LedgerError, LedgerSnapshot, LedgerWriter, MemoryLedger};
pub use money::Money;
pub use transaction::{days_between, Transaction, TransactionId, TransactionPatch};
