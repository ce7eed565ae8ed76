//! The `thumbnailer config` command.
//!
//! `show` prints what a `run` with the same flags would use, including the
//! directories it resolves to. `init` seeds a config file and never writes
//! one that would fail to load.

use anyhow::Context;
use clap::{Args, Subcommand};
use std::fmt::Write as _;
use std::path::Path;
use thumbnailer_core::Config;

use super::run::PipelineOverrides;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration and resolved directories
    Show {
        #[command(flatten)]
        overrides: PipelineOverrides,
    },

    /// Show config file path
    Path,

    /// Write a config file from defaults plus the given settings
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        overrides: PipelineOverrides,
    },
}

/// Execute the config command against the config loaded at startup.
pub async fn execute(args: ConfigArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { overrides } => {
            let config = overrides.apply(config);
            if let Err(e) = config.validate() {
                tracing::warn!("A run with these settings would be rejected: {e}");
            }
            print!("{}", render_effective(&config)?);
        }

        ConfigCommand::Path => {
            println!("{}", Config::default_path().display());
        }

        ConfigCommand::Init { force, overrides } => {
            let path = Config::default_path();
            write_config(&path, &overrides.apply(Config::default()), force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// The config as TOML, followed by the directories a run would touch.
fn render_effective(config: &Config) -> anyhow::Result<String> {
    let mut out = config.to_toml()?;
    let _ = writeln!(out, "\n# Resolved directories");
    let _ = writeln!(out, "# scratch = {:?}", config.input_dir());
    let _ = writeln!(out, "# output = {:?}", config.output_dir());
    Ok(out)
}

fn write_config(path: &Path, config: &Config, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }
    config
        .validate()
        .context("Refusing to write an invalid config")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_toml()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use thumbnailer_core::PipelineMode;

    use crate::cli::run::ModeArg;

    #[test]
    fn test_show_reflects_overrides_and_resolved_dirs() {
        let overrides = PipelineOverrides {
            home: Some(PathBuf::from("/srv/thumbs")),
            mode: Some(ModeArg::Batch),
            ..PipelineOverrides::default()
        };

        let rendered = render_effective(&overrides.apply(Config::default())).unwrap();

        assert!(rendered.contains("mode = \"batch\""));
        assert!(rendered.contains("# scratch = \"/srv/thumbs/incoming\""));
        assert!(rendered.contains("# output = \"/srv/thumbs/outgoing\""));
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let overrides = PipelineOverrides {
            download_workers: Some(9),
            ..PipelineOverrides::default()
        };

        write_config(&path, &overrides.apply(Config::default()), false).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.pipeline.download_concurrency, 9);
        assert_eq!(loaded.pipeline.mode, PipelineMode::Streaming);
    }

    #[test]
    fn test_init_refuses_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let overrides = PipelineOverrides {
            resize_workers: Some(0),
            ..PipelineOverrides::default()
        };

        let err = write_config(&path, &overrides.apply(Config::default()), false).unwrap_err();

        assert!(err.to_string().contains("invalid config"));
        assert!(!path.exists());
    }

    #[test]
    fn test_init_keeps_existing_file_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# hand-edited\n").unwrap();

        assert!(write_config(&path, &Config::default(), false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hand-edited\n");

        write_config(&path, &Config::default(), true).unwrap();
        assert!(Config::load_from(&path).is_ok());
    }
}
