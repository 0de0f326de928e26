//! # Forecourt - fuel pump kiosk controller for Raspberry Pi
//!
//! Drives a forecourt pump display: litres and price accumulate while the
//! pump trigger is held, the customer pays by tapping a contactless card on
//! an MFRC522 reader, and the pump resets for the next sale.
//!
//! ## Features
//!
//! - **GPIO trigger** with an automatic keyboard fallback when no pin is available
//! - **Card payments** through an MFRC522 reader, or manual-only when none is found
//! - **Deferred transitions** that a manual reset always supersedes
//! - **Web Interface**: JSON/SSE API and static files for the kiosk browser
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `pricing`: Per-session price rolls
//! - `display`: Seven-segment style readouts and labels
//! - `session`: Pump session data
//! - `machine`: Pump state machine
//! - `input`: Trigger sources and keyboard debounce
//! - `card`: Card reader sources and startup probe
//! - `scheduler`: Trigger and card polling loops
//! - `kiosk`: Orchestration, commands and shutdown
//! - `web`: HTTP server and REST/SSE API

pub mod card;
pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod kiosk;
pub mod logging;
pub mod machine;
pub mod pricing;
pub mod scheduler;
pub mod session;
pub mod web;

#[cfg(test)]
mod web_tests;

// Re-export commonly used types
pub use config::Config;
pub use error::{ForecourtError, Result};
pub use kiosk::{Kiosk, KioskCommand, KioskHandle};
pub use machine::{PumpSnapshot, PumpStateMachine};
pub use session::PumpState;
