//! CLI interface for storybible.

pub mod handlers;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use output::OutputMode;

/// storybible - continuity tracking for fiction manuscripts
#[derive(Parser)]
#[command(name = "storybible", version, about, long_about = None)]
pub struct Cli {
    /// Override data directory (default: ~/.storybible)
    #[arg(long, env = "STORYBIBLE_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// Registry file (default: {data_path}/registry.yaml)
    #[arg(long, env = "STORYBIBLE_REGISTRY", global = true)]
    pub registry: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan one scene file and update the bible
    Scan {
        /// Scene file
        file: PathBuf,
        /// Manuscript root; the scene id is the file path relative to it
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Scan every scene under a manuscript directory as one batch
    ScanAll {
        /// Manuscript directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// List conflicts (active only unless --all)
    Conflicts {
        /// Only conflicts for this entity
        #[arg(long)]
        entity: Option<String>,
        /// Include dismissed conflicts
        #[arg(long)]
        all: bool,
    },

    /// Dismiss a conflict, keeping the established value
    Dismiss {
        entity: String,
        attribute: String,
        /// Scene that introduced the contradicting value
        scene: String,
        /// Reason recorded with the dismissal
        #[arg(long)]
        note: Option<String>,
    },

    /// Accept a conflict's new value as canon
    Accept {
        entity: String,
        attribute: String,
        /// Scene that introduced the new value
        scene: String,
    },

    /// Show everything known about an entity
    Show {
        /// Entity name or alias
        entity: String,
    },

    /// Pin an attribute value, or remove a pin with --clear
    Override {
        entity: String,
        attribute: String,
        /// Value to pin (omit with --clear)
        #[arg(required_unless_present = "clear")]
        value: Option<String>,
        /// Remove the override instead of setting one
        #[arg(long, conflicts_with = "value")]
        clear: bool,
    },
}

/// Execute a CLI command.
pub async fn execute(
    command: &Commands,
    ctx: &crate::init::AppContext,
    mode: OutputMode,
) -> anyhow::Result<()> {
    match command {
        Commands::Scan { file, root } => handlers::scan::handle_scan(ctx, file, root, mode).await?,
        Commands::ScanAll { dir } => handlers::scan::handle_scan_all(ctx, dir, mode).await?,
        Commands::Conflicts { entity, all } => {
            handlers::conflict::list_conflicts(ctx, entity.as_deref(), *all, mode).await?
        }
        Commands::Dismiss {
            entity,
            attribute,
            scene,
            note,
        } => {
            handlers::conflict::dismiss(ctx, entity, attribute, scene, note.clone(), mode).await?
        }
        Commands::Accept {
            entity,
            attribute,
            scene,
        } => handlers::conflict::accept(ctx, entity, attribute, scene, mode).await?,
        Commands::Show { entity } => handlers::record::show(ctx, entity, mode).await?,
        Commands::Override {
            entity,
            attribute,
            value,
            clear,
        } => {
            if *clear {
                handlers::record::clear_override(ctx, entity, attribute, mode).await?
            } else {
                let value = value.as_deref().unwrap_or_default();
                handlers::record::set_override(ctx, entity, attribute, value, mode).await?
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_override_requires_value_unless_clearing() {
        assert!(Cli::try_parse_from(["storybible", "override", "Elena", "eyes"]).is_err());
        let cli =
            Cli::try_parse_from(["storybible", "override", "--clear", "Elena", "eyes"]).unwrap();
        assert!(matches!(cli.command, Commands::Override { clear: true, .. }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["storybible", "conflicts", "--all", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Conflicts { all: true, entity: None }));
    }
}
