//! Integration tests for the node cache and block retrieval queue

mod node_cache;
mod retrieval;
