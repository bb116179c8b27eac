pub mod dependencies;
pub mod graph;
pub mod metadata;
pub mod types;

pub use dependencies::*;
pub use graph::*;
pub use metadata::*;
pub use types::*;
