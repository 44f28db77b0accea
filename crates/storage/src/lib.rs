pub mod db;

pub use db::{
    create_db, get_transaction, import_snapshot, load_snapshot, DbPool, SqliteLedger, StorageError,
};
