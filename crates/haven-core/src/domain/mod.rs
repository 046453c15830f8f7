//! # Domain Models
//!
//! Canonical types shared by every stage of the trend pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AssetId`] | Fixed set of chartable assets with labels and aliases |
//! | [`YearMonth`] | Calendar month, the time axis of every series |
//! | [`DateWindow`] | Inclusive month range for a request |
//! | [`SeriesPoint`] | One month/value observation |
//! | [`AssetSeries`] | Ordered monthly series for one asset |
//! | [`ComparisonRow`] | One month of a multi-asset comparison |
//! | [`SourceCitation`] | Citation attached to grounded answers |
//! | [`DataOrigin`] | `real` or `simulated` marker |
//! | [`Scale`] | Absolute or percent-rebased display |

mod asset;
mod month;
mod series;

pub use asset::AssetId;
pub use month::{DateWindow, YearMonth};
pub use series::{AssetSeries, ComparisonRow, DataOrigin, Scale, SeriesPoint, SourceCitation};
pub(crate) use series::validate_positive;
