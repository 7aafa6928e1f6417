//! blockfs: in-memory coordination for content-addressed filesystems
//!
//! Two subsystems sit between a virtual file-system tree and a
//! content-addressed block store:
//!
//! - [`tree::NodeCache`] keeps the live, reference-counted view of a folder's
//!   node tree and rebuilds paths on demand across renames and unlinks.
//! - [`retrieval::BlockRetrievalQueue`] coalesces concurrent fetches of the
//!   same block and dispatches them to a bounded pool of workers by priority.

pub mod config;
pub mod error;
pub mod logging;
pub mod retrieval;
pub mod store;
pub mod tree;
pub mod types;

pub use error::{ApiError, CacheError, RetrievalError};
pub use types::{BlockId, BlockPointer, BranchName, Priority, TlfId};
