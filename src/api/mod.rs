//! Facility API router.
//!
//! Exposes the lifecycle engine as HTTP endpoints for the facility's
//! dashboards and front-of-house tooling. Routes are nested under `/api/`
//! and carry an explicit caller scope (tenant, facility, optional staff
//! session) extracted from headers by middleware — no ambient session state.
//!
//! The router is composable — `facility_api_router()` returns a `Router`
//! that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;

pub use router::facility_api_router;
pub use types::ApiContext;
