// Pipeline processing: normalization, join, matching, classification, filtering

pub mod classify;
pub mod filter;
pub mod join;
pub mod matching;
pub mod normalize;

pub use classify::{assign_groups, classify, classify_full, classify_inside_only};
pub use filter::{apply_filters, FilterStage, StageCount};
pub use join::join_sales_to_properties;
pub use matching::{match_sales, HousingIndex};
