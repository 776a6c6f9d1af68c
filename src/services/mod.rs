pub mod duration;
pub mod metadata;
pub mod orchestrator;
pub mod registry;

pub use duration::{DurationProber, ProbeError, ProbeSummary, ProbeTarget};
pub use metadata::{Enrichment, MetadataProvider, MetadataService, MetadataSettings};
pub use orchestrator::{CatalogError, Orchestrator, RefreshSummary, SourceSettings};
pub use registry::SourceRegistry;
