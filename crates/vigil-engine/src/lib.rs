//! The synchronization engine.
//!
//! Startup flow: [`registry::resolve_channels`] once, then
//! [`sync::Engine::run`] backfills first-run channels and drives the
//! configured strategy (event, poll, or hybrid) for the process lifetime.
//! Every observed message flows through the [`materialize::Materializer`]
//! into the store's idempotent upsert.

pub mod backfill;
pub mod config;
pub mod materialize;
pub mod registry;
pub mod sync;

pub use config::{EngineConfig, SyncMode};
pub use materialize::Materializer;
pub use registry::resolve_channels;
pub use sync::Engine;
