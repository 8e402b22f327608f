//! Store implementations backing the [`ChatStore`] contract
//!
//! [`PgStore`] is the production Postgres store; [`MemoryStore`] keeps
//! everything in process memory and backs the test suite.
//!
//! [`ChatStore`]: helplink_shared::ChatStore

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;
