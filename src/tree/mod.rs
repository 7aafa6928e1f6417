//! Live node tree
//!
//! The node cache and the handle and path types it hands out.

pub mod cache;
pub mod node;
pub mod path;

pub use cache::NodeCache;
pub use node::Node;
pub use path::{Path, PathNode};
