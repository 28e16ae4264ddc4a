//! Careflow — the encounter lifecycle engine of a multi-tenant clinical
//! operations platform.
//!
//! An encounter moves through ordered care stages (reception → triage →
//! consultation → diagnostics → pharmacy → discharge). Transitions are
//! role-authorized, certain stages are gated on payment and advanced
//! automatically when the gate clears, every transition lands in an
//! append-only ledger, and denormalized queue rows keep the floor dashboards
//! close to live.

pub mod access;
pub mod api;
pub mod autoadvance;
pub mod billing;
pub mod catalog;
pub mod config;
pub mod db;
pub mod models;
pub mod projection;
pub mod registration;
pub mod routing;
pub mod transition;
pub mod triage;

pub use access::CareContext;
pub use billing::{add_line_item, settle_line_item};
pub use projection::{encounters_awaiting_routing, get_queue};
pub use registration::register_encounter;
pub use transition::{advance_stage, TransitionError, TransitionOutcome};
