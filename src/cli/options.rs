use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::types::ArtifactRef;

/// Resolve playbooks and roles into a flat, line-addressable list of actions
#[derive(Parser, Debug)]
#[command(name = "rustle-later")]
#[command(about = "Resolve playbooks and roles into normalized, line-addressable actions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct RustleLaterCli {
    /// Playbook files, or role directories with --role
    #[arg(required = true)]
    pub entries: Vec<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Treat entries as role directories
    #[arg(long)]
    pub role: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl RustleLaterCli {
    pub fn entry_refs(&self) -> Vec<ArtifactRef> {
        self.entries
            .iter()
            .map(|path| {
                if self.role {
                    ArtifactRef::role(path)
                } else {
                    ArtifactRef::playbook(path)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactKind;

    #[test]
    fn test_parse_arguments() {
        let cli = RustleLaterCli::try_parse_from([
            "rustle-later",
            "--role",
            "--format",
            "json",
            "roles/web",
            "roles/db",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        let refs = cli.entry_refs();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.kind == ArtifactKind::Role));
    }

    #[test]
    fn test_entries_required() {
        assert!(RustleLaterCli::try_parse_from(["rustle-later"]).is_err());
    }
}
