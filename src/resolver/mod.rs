//! Discovery of every artifact reachable from a playbook or role

pub mod children;
pub mod context;
pub mod error;
pub mod graph;
pub mod paths;

pub use children::{find_children, SKIP_TAG};
pub use context::{ModuleSearchPath, ResolutionContext};
pub use error::ResolveError;
pub use graph::{resolve_all, DependencyGraph};
pub use paths::path_dwim;
