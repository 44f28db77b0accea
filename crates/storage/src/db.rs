use chrono::NaiveDate;
use paylink_core::{
    Account, AccountId, LedgerError, LedgerSnapshot, LedgerWriter, Payee, PayeeId, Transaction,
    TransactionId, TransactionPatch,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Transaction {id} has an invalid stored date: {value}")]
    InvalidDate { id: String, value: String },
}

type TransactionRow = (
    String,
    String,
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
);

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            offbudget INTEGER NOT NULL DEFAULT 0,
            closed INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payees (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            transfer_account_id TEXT,
            FOREIGN KEY (transfer_account_id) REFERENCES accounts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            date TEXT NOT NULL,
            imported_payee TEXT,
            payee_id TEXT,
            notes TEXT,
            transfer_id TEXT,
            is_parent INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (account_id) REFERENCES accounts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert every account, payee and transaction in the snapshot. Existing rows
/// keep their position so repeated imports do not reorder the ledger.
pub async fn import_snapshot(pool: &DbPool, snapshot: &LedgerSnapshot) -> Result<(), StorageError> {
    let mut db_tx = pool.begin().await?;

    for account in &snapshot.accounts {
        sqlx::query(
            "INSERT INTO accounts (id, name, offbudget, closed) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, offbudget = excluded.offbudget, closed = excluded.closed",
        )
        .bind(account.id.as_str())
        .bind(&account.name)
        .bind(account.offbudget as i64)
        .bind(account.closed as i64)
        .execute(&mut *db_tx)
        .await?;
    }

    for payee in &snapshot.payees {
        sqlx::query(
            "INSERT INTO payees (id, name, transfer_account_id) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, transfer_account_id = excluded.transfer_account_id",
        )
        .bind(payee.id.as_str())
        .bind(&payee.name)
        .bind(payee.transfer_account_id.as_ref().map(|a| a.as_str()))
        .execute(&mut *db_tx)
        .await?;
    }

    for tx in &snapshot.transactions {
        sqlx::query(
            "INSERT INTO transactions (id, account_id, amount, date, imported_payee, payee_id, notes, transfer_id, is_parent)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                amount = excluded.amount,
                date = excluded.date,
                imported_payee = excluded.imported_payee,
                payee_id = excluded.payee_id,
                notes = excluded.notes,
                transfer_id = excluded.transfer_id,
                is_parent = excluded.is_parent",
        )
        .bind(tx.id.as_str())
        .bind(tx.account.as_str())
        .bind(tx.amount)
        .bind(tx.date.format(DATE_FORMAT).to_string())
        .bind(tx.imported_payee.as_deref())
        .bind(tx.payee.as_ref().map(|p| p.as_str()))
        .bind(tx.notes.as_deref())
        .bind(tx.transfer_id.as_ref().map(|t| t.as_str()))
        .bind(tx.is_parent as i64)
        .execute(&mut *db_tx)
        .await?;
    }

    db_tx.commit().await?;
    tracing::info!(
        accounts = snapshot.accounts.len(),
        payees = snapshot.payees.len(),
        transactions = snapshot.transactions.len(),
        "snapshot imported"
    );
    Ok(())
}

pub async fn load_snapshot(pool: &DbPool) -> Result<LedgerSnapshot, StorageError> {
    let accounts = sqlx::query_as::<_, (String, String, i64, i64)>(
        "SELECT id, name, offbudget, closed FROM accounts ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| Account {
        id: AccountId(r.0),
        name: r.1,
        offbudget: r.2 != 0,
        closed: r.3 != 0,
    })
    .collect();

    let payees = sqlx::query_as::<_, (String, String, Option<String>)>(
        "SELECT id, name, transfer_account_id FROM payees ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| Payee {
        id: PayeeId(r.0),
        name: r.1,
        transfer_account_id: r.2.map(AccountId),
    })
    .collect();

    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, account_id, amount, date, imported_payee, payee_id, notes, transfer_id, is_parent FROM transactions ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;
    let transactions = rows
        .into_iter()
        .map(transaction_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LedgerSnapshot {
        accounts,
        payees,
        transactions,
    })
}

pub async fn get_transaction(pool: &DbPool, id: &TransactionId) -> Result<Option<Transaction>, StorageError> {
    let row = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, account_id, amount, date, imported_payee, payee_id, notes, transfer_id, is_parent FROM transactions WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(transaction_from_row).transpose()
}

fn transaction_from_row(r: TransactionRow) -> Result<Transaction, StorageError> {
    let date = NaiveDate::parse_from_str(&r.3, DATE_FORMAT).map_err(|_| StorageError::InvalidDate {
        id: r.0.clone(),
        value: r.3.clone(),
    })?;
    Ok(Transaction {
        id: TransactionId(r.0),
        account: AccountId(r.1),
        amount: r.2,
        date,
        imported_payee: r.4,
        payee: r.5.map(PayeeId),
        notes: r.6,
        transfer_id: r.7.map(TransactionId),
        is_parent: r.8 != 0,
    })
}

/// SQLite-backed ledger store accepting partial transaction updates.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: DbPool,
}

impl SqliteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl LedgerWriter for SqliteLedger {
    async fn update_transaction(
        &self,
        id: &TransactionId,
        patch: &TransactionPatch,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE transactions SET
                payee_id = COALESCE(?, payee_id),
                transfer_id = COALESCE(?, transfer_id),
                date = COALESCE(?, date),
                notes = COALESCE(?, notes)
             WHERE id = ?",
        )
        .bind(patch.payee.as_ref().map(|p| p.as_str()))
        .bind(patch.transfer_id.as_ref().map(|t| t.as_str()))
        .bind(patch.date.map(|d| d.format(DATE_FORMAT).to_string()))
        .bind(patch.notes.as_deref())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::TransactionNotFound(id.clone()));
        }
        tracing::debug!(transaction = %id, "transaction updated");
        Ok(())
    }
}
