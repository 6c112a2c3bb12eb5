//! Goosebin - content-addressed ephemeral paste service
//!
//! Library exposing the router and wiring for tests and reuse. Storage lives
//! in `pastekv`, configuration in `gooseconf`.

pub mod app;
pub mod pages;
pub mod telemetry;
pub mod web;

pub use app::BackendKind;
pub use web::{router, AppState};
