//! # Ticketing Queue Core
//!
//! Shared identifiers, domain entities and the error taxonomy used by every
//! other crate in the workspace. This crate owns no I/O: it is the
//! vocabulary the ledger, store, queue and web crates all speak.

pub mod clock;
pub mod domain;
pub mod error;
pub mod ids;

pub use clock::{Clock, SystemClock};
pub use domain::{
    Event, QueueEntry, QueueStatus, Reservation, ReservationCounts, ReservationStatus, Role, User,
};
pub use error::{ErrorBody, Result, TicketingError};
pub use ids::{EventId, QueueEntryId, ReservationId, UserId};
