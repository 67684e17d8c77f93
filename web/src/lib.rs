//! Axum HTTP and WebSocket surface: request/response DTOs, the route table,
//! and the `TicketingError -> AppError -> JSON` mapping shared by every
//! handler.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod websocket;

pub use error::AppError;
pub use router::build;
pub use state::AppState;
