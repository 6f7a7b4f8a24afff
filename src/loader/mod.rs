//! Annotated structural loader for playbook, role and task files

pub mod error;
pub mod lines;
pub mod node;
pub mod yaml;

pub use error::LoaderError;
pub use lines::{strip_comments_and_markers, StripOptions};
pub use node::{Mapping, Node, SourceLocation};
pub use yaml::{load_file, parse, TagHandler, TagHandlers, YamlLoader};
