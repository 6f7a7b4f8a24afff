//! Rustle Later - playbook and role resolution for static review
//!
//! This crate resolves a playbook or role into every artifact it reaches and
//! turns each declared task into one normalized, line-addressable action.

pub mod cli;
pub mod collector;
pub mod config;
pub mod loader;
pub mod resolver;
pub mod tasks;
pub mod template;
pub mod types;

pub use collector::{ActionCollector, Report};
pub use config::Config;
pub use resolver::{find_children, resolve_all, ResolutionContext};
pub use tasks::{extract_actions, normalize_task, Action};
pub use types::*;
