//! Container and collection discovery
//!
//! The scanner finds container files under the root; the resolver lists
//! the collections a validator cares about inside one container.

mod resolver;
mod scanner;

pub use resolver::{resolve, ResolvedCollection};
pub use scanner::{scan_containers, CONTAINER_EXTENSION};
