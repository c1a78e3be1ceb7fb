//! Storage engine and domain logic for ZETA
//!
//! The `Store` is a narrow interface of single-statement operations over
//! the `events`, `event_data` and `event_permissions` tables; every ticket
//! state transition is one compare-and-set update. Domain modules (event,
//! ticket, permissions) sit on top of it.

pub mod event;
pub mod permissions;
pub mod postgres;
pub mod store;
pub mod ticket;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use postgres::{DatabaseCreds, PgStore};
pub use store::Store;
pub use ticket::Ticket;
