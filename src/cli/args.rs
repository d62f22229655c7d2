//! CLI argument definitions using clap
//!
//! Commands:
//! - commitguard check --model <path>
//! - commitguard explain --model <path> --entity <name> [--attribute <attr>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// commitguard - commit-time conflict, tenant and deletion policies
#[derive(Parser, Debug)]
#[command(name = "commitguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate a model file or directory
    Check {
        /// Model JSON file, or a directory of entity JSON files
        #[arg(long, default_value = "./model.json")]
        model: PathBuf,
    },

    /// Show the policies that apply to an entity type or one attribute
    Explain {
        /// Model JSON file, or a directory of entity JSON files
        #[arg(long, default_value = "./model.json")]
        model: PathBuf,

        /// Entity type name
        #[arg(long)]
        entity: String,

        /// Attribute to resolve (attribute policy first, entity policy as fallback)
        #[arg(long)]
        attribute: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_explain() {
        let cli = Cli::try_parse_from([
            "commitguard",
            "explain",
            "--model",
            "m.json",
            "--entity",
            "account",
            "--attribute",
            "balance",
        ])
        .unwrap();
        match cli.command {
            Command::Explain { entity, attribute, .. } => {
                assert_eq!(entity, "account");
                assert_eq!(attribute.as_deref(), Some("balance"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_explain_requires_entity() {
        assert!(Cli::try_parse_from(["commitguard", "explain", "--model", "m.json"]).is_err());
    }
}
