//! # scapekit - Scape client boundary for game-engine plugin hosts
//!
//! Native side of the Scape positioning plugin. Provides:
//! - A [`Client`] that runs measurement cycles on its own session thread
//! - Push callbacks for results and errors, pull callbacks for sensor state
//! - A [`DebugSession`] for log routing, mock GPS and frame capture
//! - S2 cell and local-frame geo helpers
//! - The `citf_` C ABI for C#/Unity and other hosts
//!
//! ## Quick Start
//! ```no_run
//! use scapekit::{Client, ClientConfig, LumaFrame, SessionCallbacks, SessionEvent};
//! use std::time::Duration;
//!
//! let client = Client::new(ClientConfig::new("my-api-key")).unwrap();
//! let (callbacks, events) = SessionCallbacks::channel(16);
//! client.set_session_callbacks(callbacks);
//!
//! client.set_frame(Some(LumaFrame::new(640, 480, vec![0; 640 * 480]).unwrap()));
//! client.request_measurements();
//! match events.recv_timeout(Duration::from_secs(1)).unwrap() {
//!     SessionEvent::MeasurementsUpdated(m) => println!("at {:?}", m.lat_lng),
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod error;
pub mod types;
pub mod device_info;
pub mod frame;
pub mod callbacks;
pub mod engine;
mod session;
pub mod client;
pub mod debug;
pub mod logging;
pub mod config;
pub mod geo;
pub mod ffi;

pub use error::ScapeError;
pub use types::*;
pub use device_info::{DeviceInfo, FixedText, SmallString};
pub use frame::LumaFrame;
pub use callbacks::{FnStateProvider, SessionCallbacks, SessionEvent, SessionEvents, StateProvider};
pub use engine::{MeasurementEngine, MeasurementInput, MockEngine, PassthroughEngine};
pub use client::{Client, ClientBuilder, Lifecycle};
pub use debug::DebugSession;
pub use config::ClientConfig;

/// Result type alias for scapekit operations.
pub type Result<T> = std::result::Result<T, ScapeError>;
