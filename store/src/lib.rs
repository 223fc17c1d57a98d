//! Tally store — the single source of truth for vote counts.
//!
//! Each contestant owns an independent slot guarded by its own lock, so
//! increments for different contestants never contend. The store is the only
//! component that mutates counts; everything downstream works on
//! [`TallyView`] copies.
//!
//! Persistence is abstracted behind [`TallyPersistence`]; whatever backend
//! implements it must never lower a stored total.

pub mod dedup;
pub mod error;
pub mod persistence;
pub mod tally_store;
pub mod view;

pub use dedup::{IdempotencyWindow, DEFAULT_IDEMPOTENCY_WINDOW};
pub use error::StoreError;
pub use persistence::TallyPersistence;
pub use tally_store::{ApplyOutcome, TallyStore};
pub use view::TallyView;
