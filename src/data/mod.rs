/// Data layer: loading, filter options, filtering and aggregation.
///
/// Architecture:
/// ```text
///  .xlsx / .ods / sheet directory (.csv, .json, .parquet)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  read named sheet → Dataset
///   └──────────┘
///        │
///        ├────────────────────┐
///        ▼                    ▼
///   ┌──────────┐        ┌──────────┐
///   │  filter   │        │ options  │  distinct values of the *unfiltered* sheet
///   └──────────┘        └──────────┘
///        │  FilterSpec → filtered Dataset
///        ▼
///   ┌───────────┐
///   │ aggregate  │  value counts, group-by counts, progress tallies
///   └───────────┘
/// ```

pub mod aggregate;
pub mod filter;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod options;
