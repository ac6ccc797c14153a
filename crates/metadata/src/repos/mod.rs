//! Repository traits for metadata operations.

pub mod chain;
pub mod entities;
pub mod files;
pub mod latest;
pub mod revisions;

pub use chain::{ChainRepo, DeletionSummary, NewRevision, PersistOutcome, RelatedCounts};
pub use entities::EntityRepo;
pub use files::FileRepo;
pub use latest::LatestRepo;
pub use revisions::RevisionRepo;
