//! Domain types shared across the cache and the classifier.

mod series;
mod window;

pub use series::{Series, SeriesId, SeriesKind, SeriesPoint};
pub use window::FetchWindow;
