mod auth;
mod client;
mod diff;
mod error;
mod logger;
mod mapper;
mod poller;
mod shadow;
mod sigv4;
mod types;

pub use auth::ValidationFailure;
pub use client::{TclClient, TclClientBuilder};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use mapper::{MAX_TARGET_C, MIN_TARGET_C, TARGET_STEP_C, to_climate_state, to_patch};
pub use poller::{AcMonitor, AcMonitorBuilder, DEFAULT_POLL_INTERVAL};
pub use shadow::{ShadowDocument, ShadowState};
pub use types::*;
