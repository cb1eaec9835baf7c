//! Filtering and aggregation engine for spreadsheet-backed dashboards.
//!
//! A page view is a pure chain: load a sheet once, list filter options from
//! it, narrow it with a [`FilterSpec`](data::filter::FilterSpec), then
//! aggregate the remaining rows for charts.

pub mod config;
pub mod data;
pub mod error;
pub mod page;
pub mod report;

pub use config::{ChartSpec, DashboardConfig, PageConfig};
pub use data::aggregate::{AggregateTable, Category, ProgressTally};
pub use data::filter::{ColumnKind, DateRange, FilterColumn, FilterSpec, ALL};
pub use data::model::{Dataset, Record, Value};
pub use data::options::OptionList;
pub use error::DashError;
pub use page::{ChartView, PageView};
