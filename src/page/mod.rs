pub mod entry;
pub mod probe;

pub use entry::{NavigationTiming, PageFeatures, PerformanceEntry, ResourceEntry, RouterMode};
pub use probe::{EntryStream, PageConnector, PageProbe};
