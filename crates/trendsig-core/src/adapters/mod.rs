//! Upstream source adapters.
//!
//! Each adapter supports a real HTTP mode and a deterministic fixture mode,
//! selected by whether the injected transport is a mock.

mod chart;
mod fred;

pub use chart::ChartAdapter;
pub use fred::FredAdapter;
