mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_RESOLVE_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pinfold",
    version,
    about = "Deterministic build manifest generator for sandboxed editor builds"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve every upstream input and write the pinned manifest.
    Generate {
        /// Path to a TOML configuration overriding upstream endpoints.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use an existing source checkout instead of cloning.
        #[arg(long)]
        source_tree: Option<PathBuf>,
        /// Directory for clones and scratch state (a temp dir if omitted).
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Output file (defaults to `<app-id>.json`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the pinned source records extracted from lockfiles.
    LockfileSources {
        /// Lockfile paths to resolve.
        #[arg(required = true)]
        lockfiles: Vec<PathBuf>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PINFOLD_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let result = match cli.command {
        Commands::Generate {
            config,
            source_tree,
            workdir,
            output,
        } => commands::generate::run(&commands::generate::GenerateArgs {
            config: config.as_deref(),
            source_tree: source_tree.as_deref(),
            workdir: workdir.as_deref(),
            output: output.as_deref(),
            json: json_output,
        }),
        Commands::LockfileSources { lockfiles } => commands::lockfile_sources::run(&lockfiles),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("config error:") || msg.starts_with("manifest error:") {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("resolve error:") {
                EXIT_RESOLVE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
