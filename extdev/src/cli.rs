use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use extdev_core::{Browser, LogLevel};

use crate::commands::{self, dev::DevArgs};
use crate::config::DevOverrides;

/// extdev - Browser extension development sessions with live reload
#[derive(Parser)]
#[command(name = "extdev")]
#[command(version, disable_version_flag = true)]
#[command(about = "extdev - Browser extension development sessions with live reload")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show version
    #[arg(long, global = true)]
    pub version: bool,

    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a development session with live reload
    Dev {
        /// Extension project directory (defaults to current directory)
        #[arg(value_name = "PROJECT")]
        project: Option<PathBuf>,

        /// Browser to target (chrome, edge, firefox, chromium-based, gecko-based)
        #[arg(short, long, env = "EXTDEV_BROWSER")]
        browser: Option<Browser>,

        /// Preferred HTTP port; falls back to automatic allocation when taken
        #[arg(short, long)]
        port: Option<u16>,

        /// Minimum level of forwarded browser logs
        #[arg(long, value_name = "LEVEL")]
        log_level: Option<LogLevel>,

        /// Only forward logs from these contexts ("all" for every context)
        #[arg(long = "log-context", value_name = "CONTEXT")]
        log_contexts: Vec<String>,

        /// Only forward logs whose page URL contains this text
        #[arg(long, value_name = "TEXT")]
        log_url: Option<String>,

        /// Only forward logs from this tab
        #[arg(long, value_name = "ID")]
        log_tab: Option<i64>,

        /// Directory replacing the built-in companion extension templates
        #[arg(long, env = "EXTDEV_TEMPLATES", value_name = "DIR")]
        templates: Option<PathBuf>,

        /// Remote debugging port to install add-ons through (Firefox family)
        #[arg(long, value_name = "PORT")]
        rdp_port: Option<u16>,

        /// Open dev tools for the first installed add-on
        #[arg(long)]
        devtools: bool,
    },

    /// List development instances
    #[command(visible_alias = "ls")]
    Instances {
        /// Include terminated and failed instances
        #[arg(short, long)]
        all: bool,
    },

    /// Remove orphaned instances and their generated companion extensions
    Cleanup,

    /// Install temporary add-ons through a browser's remote debugging port
    InstallAddon {
        /// Remote debugging port
        #[arg(long)]
        port: u16,

        /// Open dev tools for the first add-on
        #[arg(long)]
        devtools: bool,

        /// Add-on directories
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
}

impl Cli {
    pub fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        if self.version {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let Some(command) = self.command else {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        };

        match command {
            Commands::Dev {
                project,
                browser,
                port,
                log_level,
                log_contexts,
                log_url,
                log_tab,
                templates,
                rdp_port,
                devtools,
            } => {
                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(commands::dev::run(DevArgs {
                    project,
                    overrides: DevOverrides {
                        browser,
                        port,
                        log_level,
                        log_contexts,
                        log_url,
                        log_tab,
                    },
                    templates,
                    rdp_port,
                    devtools,
                }))
            }
            Commands::Instances { all } => commands::instances::run(all),
            Commands::Cleanup => commands::cleanup::run(),
            Commands::InstallAddon {
                port,
                devtools,
                paths,
            } => {
                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(commands::install_addon::run(port, paths, devtools))
            }
        }
    }
}
