//! Analytics over stored events
//!
//! - [`heatmap`]: the day×hour matrix and actor ranking
//! - [`summary`]: hourly profile, source mix, peak hour and streaks
//! - [`digest`]: daily counts by source for the external AI collaborator

pub mod digest;
pub mod heatmap;
pub mod summary;

pub use digest::{digest_window, Digest};
pub use heatmap::{aggregate, aggregate_window, rank_actors};
pub use summary::{ActivitySummary, SourceCount};
