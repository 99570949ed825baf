// Pagination engine: measured blocks in, page-by-page placement plan out.
// The paginator is pure and synchronous; callers on the async runtime run it inside
// tokio::task::spawn_blocking.

pub mod block;
pub mod catalog;
pub mod geometry;
pub mod materialize;
pub mod paginator;
pub mod plan;

// Re-export the public API consumed by the preview service and handlers.
pub use catalog::{FlowBlock, FlowCatalog};
pub use geometry::{default_geometry, PageFormat, PageGeometry};
pub use materialize::{materialize_plan, CancelToken, MaterializedPage};
pub use paginator::{paginate, ConfigurationError};
pub use plan::PlacementPlan;
