//! HTTP adapter: exposes a [`relay_core::service::ChannelService`] as the
//! channel endpoint front-ends talk to, and registers it with the hub.

pub mod auth;
pub mod handlers;
pub mod hub;
pub mod router;

pub use router::{build_router, serve, AppState};
