//! pii-shield command-line interface

mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pii_shield_core::{AnonymizeResponse, Config, DeanonymizeResponse, PiiService, StoreBackend};
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "info", help = "Log level (error, warn, info, debug, trace)")]
    pub log_level: String,

    #[arg(long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        #[arg(long, help = "Override the bind address from the configuration")]
        bind: Option<String>,
    },
    /// Replace PII in text with tokens (reads stdin when --text is absent)
    Anonymize {
        #[arg(long)]
        text: Option<String>,
    },
    /// Restore original values in tokenized text (reads stdin when --text is absent)
    Deanonymize {
        #[arg(long)]
        text: Option<String>,
    },
    /// Preview what would be detected without storing anything
    Detect {
        #[arg(long)]
        text: Option<String>,
    },
    /// Print mapping store statistics
    Stats,
    /// Delete every stored mapping
    Purge,
    /// Write a default configuration file
    InitConfig {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

impl Args {
    pub fn parse_log_level(&self) -> tracing::Level {
        self.log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', defaulting to 'info'", self.log_level);
            tracing::Level::INFO
        })
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::get_default_config_path()?),
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.as_ref() {
        Some(config_path) => {
            info!("Loading configuration from: {}", config_path.display());
            Config::from_file(config_path)?
        }
        None => match Config::get_default_config_path() {
            Ok(default_path) if default_path.exists() => {
                info!("Loading configuration from default location: {}", default_path.display());
                Config::from_file(&default_path)?
            }
            Ok(default_path) => {
                info!("Creating default configuration at: {}", default_path.display());
                let mut config = Config::default();
                config.resolve_paths()?;
                config.to_file(&default_path)?;
                config
            }
            Err(_) => {
                info!("Using default configuration (could not determine config directory)");
                let mut config = Config::default();
                config.resolve_paths()?;
                config
            }
        },
    };

    config.apply_env();
    config.validate()?;
    info!("Configuration validated successfully");
    Ok(config)
}

fn read_text(text: Option<String>) -> Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_config(args: &Args, force: bool) -> Result<()> {
    let path = args.config_path()?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let mut config = Config::default();
    config.resolve_paths()?;
    config.to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    println!(
        "Set {} before anonymizing in keyed mode",
        pii_shield_core::config::SECRET_ENV_VAR
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.parse_log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Command::InitConfig { force } = args.command {
        return init_config(&args, force);
    }

    let mut config = load_config(&args)?;

    match &args.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind.clone();
            }
            info!("Starting pii-shield server");
            server::serve(&config).await
        }
        Command::Anonymize { text } => {
            let text = read_text(text.clone())?;
            let service = PiiService::from_config(&config)?;
            if config.mapping.backend == StoreBackend::Memory {
                warn!("Memory backend: mappings are lost when this process exits");
            }
            let response = AnonymizeResponse::from_result(&service.anonymize(&text));
            print_json(&response)?;
            if !response.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Deanonymize { text } => {
            let text = read_text(text.clone())?;
            let service = PiiService::from_config(&config)?;
            let response = DeanonymizeResponse::from_result(&service.deanonymize(&text));
            print_json(&response)?;
            if !response.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Detect { text } => {
            let text = read_text(text.clone())?;
            let service = PiiService::from_config(&config)?;
            print_json(&service.detect(&text))
        }
        Command::Stats => {
            let service = PiiService::from_config(&config)?;
            print_json(&service.statistics()?)
        }
        Command::Purge => {
            let service = PiiService::from_config(&config)?;
            let removed = service.clear_mappings()?;
            info!("Purged {} mappings", removed);
            println!("Removed {} mappings", removed);
            Ok(())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_subcommands() {
        let args = Args::try_parse_from(["pii-shield", "anonymize", "--text", "hola"]).unwrap();
        assert_eq!(
            args.command,
            Command::Anonymize {
                text: Some("hola".to_string())
            }
        );
        assert_eq!(args.log_level, "info");

        let args = Args::try_parse_from(["pii-shield", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        assert_eq!(
            args.command,
            Command::Serve {
                bind: Some("0.0.0.0:9000".to_string())
            }
        );

        assert!(Args::try_parse_from(["pii-shield"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["pii-shield", "stats", "--log-level", "debug", "--config", "x.toml"])
                .unwrap();
        assert_eq!(args.command, Command::Stats);
        assert_eq!(args.parse_log_level(), tracing::Level::DEBUG);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_invalid_log_level_defaults_to_info() {
        let args = Args::try_parse_from(["pii-shield", "purge", "--log-level", "loud"]).unwrap();
        assert_eq!(args.parse_log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_init_config_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pii-shield.toml");
        let path_arg = path.to_str().unwrap();

        let args = Args::try_parse_from(["pii-shield", "init-config", "--config", path_arg]).unwrap();
        init_config(&args, false).unwrap();
        assert!(path.exists());
        assert!(init_config(&args, false).is_err());
        init_config(&args, true).unwrap();

        let args = Args::try_parse_from(["pii-shield", "stats", "--config", path_arg]).unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.mapping.backend, StoreBackend::Sqlite);
        assert!(config.mapping.database_path.is_absolute());
    }
}
