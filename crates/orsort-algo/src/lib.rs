pub mod compact;
pub mod merge;
pub mod partition;
pub mod pipeline;
pub mod select;
mod shared;
pub mod shuffle;

// Re-export primary entry points for convenience
pub use compact::or_compact;
pub use merge::merge_sort;
pub use partition::sample_partition;
pub use pipeline::{SortContext, SortVariant, local_share, shuffle_sort, sort};
pub use select::distributed_quickselect;
pub use shuffle::{assign_orp_ids, or_shuffle};
