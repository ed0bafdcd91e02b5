//! # FilingWatch Store
//! SQLite persistence for filings. The external scraper inserts rows; the
//! dispatcher claims them through a single conditional update so that two
//! process instances sharing one database never both send the same filing.

pub mod sqlite;

pub use sqlite::SqliteFilingStore;
