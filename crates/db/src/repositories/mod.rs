//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the
//! application. `LedgerEntryRepository` is also the storage backend the
//! settlement core runs against.

pub mod ledger_entry;
pub mod wallet;

pub use ledger_entry::LedgerEntryRepository;
pub use wallet::WalletRepository;
