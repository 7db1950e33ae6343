//! Entity Repository boundary: read access to users, places, stories and
//! comments, plus the transactional writes that pair a content row with its
//! activity event.

pub mod memory;
pub mod repository;
pub mod store;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use memory::MemoryEntities;
pub use repository::{ContentWriter, EntityRepository, PlaceWithFeatured, Posted};
pub use store::PgEntities;
