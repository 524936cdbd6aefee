//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - Configuration loading and the per-run forecast request
//! - The HTTP forecast fetcher and its error classification
//! - The on-disk snapshot store used when the network is unavailable
//! - Live-versus-cached response selection
//! - Normalization of the hourly time series into display rows
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod error_reason;
pub mod fetcher;
pub mod model;
pub mod normalize;
pub mod selector;
pub mod store;

pub use config::{Config, HourlyFields};
pub use error::{FetchError, ForecastError, StoreError};
pub use fetcher::{ForecastFetcher, ForecastSource};
pub use model::{ExtraValue, ForecastRequest, ForecastResponse};
pub use normalize::{Column, DisplayRow, ForecastTable, normalize};
pub use selector::{FallbackReason, ResponseSelector, Selection};
pub use store::{SaveOutcome, Snapshot, SnapshotId, SnapshotStore};
