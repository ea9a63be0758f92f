//! Identity and state store for Briefing.
//!
//! Records source documents idempotently, gives artifacts their durable id
//! and slug, and enforces the status lifecycle on every write. Backed by
//! SQLite through `sqlx`; slug counters sit behind the [`AtomicCounter`]
//! trait so they can live in the database or in a standalone file.

mod codec;
mod counter;
mod store;

pub use counter::{AtomicCounter, FileCounter, SqliteCounter};
pub use store::IdentityStore;
