//! AST visitors used to collect imports from parsed Python sources.

mod import_discovery;

pub use import_discovery::{DiscoveredImport, ImportDiscoveryVisitor};
