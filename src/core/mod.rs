pub mod node;
pub mod store;

pub use node::{DependencyNode, ModuleId, NodeKind, TraversalState};
pub use store::GraphStore;
