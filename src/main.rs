//! Addonkit - addon lifecycle manager for a host web application.
//!
//! Installs, removes, enables and disables addon packages, keeping the
//! shared application tree and its derived artifacts in sync.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use addonkit::addon::{AddonError, AddonService, LocalSource, ModuleRegistry};
use addonkit::Config;

/// Addon lifecycle manager
#[derive(Parser)]
#[command(name = "addonkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, env = "ADDONKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results and errors as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and install an addon
    Install {
        /// Addon name
        name: String,

        /// Replace an existing install and overwrite conflicting files
        #[arg(short, long)]
        force: bool,

        /// Install from a local package instead of the remote endpoint
        #[arg(short, long)]
        archive: Option<PathBuf>,
    },

    /// Remove an addon
    Uninstall {
        /// Addon name
        name: String,

        /// Also delete the addon's files from the shared tree
        #[arg(short, long)]
        force: bool,
    },

    /// Publish a disabled addon
    Enable {
        /// Addon name
        name: String,

        /// Overwrite conflicting files
        #[arg(short, long)]
        force: bool,
    },

    /// Retract an enabled addon
    Disable {
        /// Addon name
        name: String,

        /// Also delete the addon's files from the shared tree
        #[arg(short, long)]
        force: bool,
    },

    /// List installed addons
    List,

    /// Show addon information
    Info {
        /// Addon name
        name: String,
    },

    /// Show the files an addon places into the shared tree
    Files {
        /// Addon name
        name: String,

        /// Only show files that would conflict
        #[arg(long)]
        conflicts: bool,
    },

    /// Validate an installed addon
    Check {
        /// Addon name
        name: String,
    },

    /// Regenerate the bootstrap registry and autoload manifest
    Refresh,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, cli.json);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let mut service = AddonService::from_config(config, ModuleRegistry::new())?;

    match &cli.command {
        Commands::Install { name, force, archive } => {
            if let Some(archive) = archive {
                service = service.with_source(Box::new(LocalSource::File(archive.clone())));
            }
            service.install(name, *force)?;
            print_done(cli.json, &format!("Installed addon '{name}'"));
        }
        Commands::Uninstall { name, force } => {
            service.uninstall(name, *force)?;
            print_done(cli.json, &format!("Uninstalled addon '{name}'"));
        }
        Commands::Enable { name, force } => {
            service.enable(name, *force)?;
            print_done(cli.json, &format!("Enabled addon '{name}'"));
        }
        Commands::Disable { name, force } => {
            service.disable(name, *force)?;
            print_done(cli.json, &format!("Disabled addon '{name}'"));
        }
        Commands::List => cmd_list(&service, cli.json)?,
        Commands::Info { name } => cmd_info(&service, name, cli.json)?,
        Commands::Files { name, conflicts } => {
            let files = service.global_files(name, *conflicts)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in &files {
                    println!("{file}");
                }
            }
        }
        Commands::Check { name } => {
            service.check(name)?;
            service.no_conflict(name)?;
            print_done(cli.json, &format!("Addon '{name}' is valid"));
        }
        Commands::Refresh => {
            service.refresh()?;
            print_done(cli.json, "Refreshed addon registry");
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn cmd_list(service: &AddonService, json: bool) -> Result<()> {
    let addons = service.list()?;

    if json {
        let infos: Vec<_> = addons.iter().map(|a| &a.info).collect();
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    if addons.is_empty() {
        println!("No addons installed.");
        println!("\nInstall addons with:");
        println!("  addonkit install <name>");
        println!("  addonkit install <name> --archive ./package.zip");
        return Ok(());
    }

    println!("Installed addons:\n");
    for addon in &addons {
        let state_icon = if addon.info.state.is_enabled() { "✓" } else { "○" };
        println!(
            "  {} v{} [{} {}]",
            addon.name,
            addon.info.version,
            state_icon,
            addon.info.state.display_name()
        );
        if !addon.info.title.is_empty() {
            println!("      {}", addon.info.title);
        }
    }
    println!("\nTotal: {} addon(s)", addons.len());

    Ok(())
}

fn cmd_info(service: &AddonService, name: &str, json: bool) -> Result<()> {
    let addon = service.info(name)?;
    let info = &addon.info;

    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    println!("{} v{} [{}]", info.name, info.version, info.state.display_name());
    println!();
    if !info.title.is_empty() {
        println!("Title:   {}", info.title);
    }
    if !info.intro.is_empty() {
        println!("Intro:   {}", info.intro);
    }
    if !info.author.is_empty() {
        println!("Author:  {}", info.author);
    }
    if let Some(ref website) = info.website {
        println!("Website: {website}");
    }
    println!("Path:    {}", addon.dir.display());
    if !info.hooks.is_empty() {
        println!("Hooks:   {}", info.hooks.join(", "));
    }

    Ok(())
}

/// Print shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "addonkit", &mut io::stdout());
}

fn print_done(json: bool, message: &str) {
    if json {
        println!("{}", json!({ "code": 1, "msg": message, "data": Value::Null }));
    } else {
        println!("{message}");
    }
}

fn report_error(err: &anyhow::Error, json: bool) {
    let addon_err = err.downcast_ref::<AddonError>();

    if json {
        let envelope = match addon_err {
            Some(e) => e.to_envelope(),
            None => json!({ "code": 0, "msg": err.to_string(), "data": Value::Null }),
        };
        println!("{envelope}");
        return;
    }

    eprintln!("Error: {err:#}");
    if let Some(files) = addon_err.and_then(AddonError::conflicts) {
        for file in files {
            eprintln!("  {file}");
        }
    }
}
