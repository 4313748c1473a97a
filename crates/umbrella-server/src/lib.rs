//! HTTP and WebSocket front end for the umbrella lending desk.
//!
//! The binary wires one [`ReaderController`](umbrella_reader::ReaderController)
//! and one [`UmbrellaService`](umbrella_storage::UmbrellaService) into an
//! axum [`Router`](axum::Router):
//!
//! ```text
//! kiosk ──HTTP──▶ routes ──▶ controller / service
//!   ▲                             │
//!   └────WebSocket /ws ◀── NotificationBus
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::{LogFormat, ServerConfig, StoreKind};
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
