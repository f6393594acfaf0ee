use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;
use crate::console::{Console, ConsoleError, StdinLines};
use crate::executor::{SessionState, Val};
use crate::io::Output;
use crate::resolver::pack_directory;

#[derive(Parser)]
#[command(name = "rhythm-console")]
#[command(about = "Interactive Flow console that installs missing modules on demand", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Package install directory (overrides config file and env vars)
    #[arg(long, global = true)]
    pub install_dir: Option<PathBuf>,

    /// Package index base URL (overrides config file and env vars)
    #[arg(long, global = true)]
    pub index_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive console (the default)
    Repl {
        /// Do not print the banner
        #[arg(long)]
        quiet: bool,
    },

    /// Run a Flow file, installing missing modules as needed
    Run {
        /// File to run
        file: PathBuf,

        /// Arguments exposed to the script as `argv`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Install packages without starting the console
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Build a package archive from a module directory or file
    Pack {
        /// Directory holding mod.flow, or a single .flow file
        path: PathBuf,

        #[arg(long)]
        name: String,

        #[arg(long)]
        version: String,

        /// Archive to write (default: <name>-<version>.zip)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

/// Resolve configuration from files, environment and global flags
pub fn load_config(cli: &Cli) -> Result<Config> {
    Config::builder()
        .config_path(cli.config.clone())
        .install_dir(cli.install_dir.clone())
        .index_url(cli.index_url.clone())
        .build()
}

/// Run one command; returns the process exit status.
///
/// Must be called inside a `LocalSet`.
pub async fn run_cli(cli: Cli, config: Config) -> Result<i32> {
    match cli.command.unwrap_or(Commands::Repl { quiet: false }) {
        Commands::Repl { quiet } => {
            let mut console = Console::builder().config(config).build();
            watch_interrupts(console.session().clone());

            let mut input = StdinLines::new(Output::stdout());
            finish(console.interact(&mut input, !quiet).await)
        }

        Commands::Run { file, args } => {
            let source = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let filename = file.display().to_string();

            let mut console = Console::builder().config(config).shell(false).build();
            watch_interrupts(console.session().clone());

            let argv = std::iter::once(filename.clone())
                .chain(args)
                .map(Val::Str)
                .collect();
            console.namespace().set("argv", Val::List(argv));

            match console.run_source(&source, &filename).await {
                Ok(()) if console.errors_reported() > 0 => Ok(1),
                result => finish(result),
            }
        }

        Commands::Install { packages } => {
            let console = Console::builder().config(config).shell(false).build();
            let resolver = console
                .resolver()
                .context("package resolution is disabled")?;

            let mut failed = 0;
            for package in &packages {
                match resolver.install(package).await {
                    Ok(report) => println!(
                        "Installed {} {} into {} ({} files)",
                        report.manifest.name,
                        report.manifest.version,
                        report.install_dir.display(),
                        report.files
                    ),
                    Err(e) => {
                        eprintln!("{}: {}", package, e);
                        failed += 1;
                    }
                }
            }
            Ok(if failed > 0 { 1 } else { 0 })
        }

        Commands::Pack {
            path,
            name,
            version,
            output,
        } => {
            let output =
                output.unwrap_or_else(|| PathBuf::from(format!("{}-{}.zip", name, version)));
            let manifest = pack_directory(&path, &name, &version, &output)
                .with_context(|| format!("failed to pack {}", path.display()))?;
            println!(
                "Wrote {} ({} {})",
                output.display(),
                manifest.name,
                manifest.version
            );
            Ok(0)
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(0)
        }
    }
}

fn finish(result: Result<(), ConsoleError>) -> Result<i32> {
    match result {
        Ok(()) => Ok(0),
        Err(ConsoleError::Io(e)) => Err(e).context("console input failed"),
        Err(e) => {
            debug!(error = %e, "console session ended");
            Ok(e.exit_code())
        }
    }
}

/// Turn Ctrl-C into the interrupt flag polled by running loops
fn watch_interrupts(session: SessionState) {
    tokio::task::spawn_local(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            session.interrupt();
        }
    });
}
