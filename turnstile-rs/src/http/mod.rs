//! HTTP layer: Axum router, auth gateways, handlers, and responses.
//!
//! Route groups: `/login` and `/health` are open, `/` and `/verify` sit
//! behind the bearer gateway, the `/admin` console behind the basic gateway.

mod error;
mod gateway;
mod handlers;
mod responses;
mod state;

#[cfg(test)]
mod tests;

pub use handlers::router;
pub use state::AppState;
