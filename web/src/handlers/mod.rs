pub mod auth;
pub mod events;
pub mod queue;
pub mod reservations;
