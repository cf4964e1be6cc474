//! luabind CLI
//!
//! Runs Lua scripts or source text against a session that has a small demo
//! surface registered: the `hello` module and a `host_version()` global.

use clap::{Parser as ClapParser, Subcommand};
use luabind::{Module, Session, SessionConfig, adapt};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "luabind")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run Lua scripts with host functions bound in", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Lua script file
    Run {
        /// Script to run
        script: PathBuf,

        /// Session configuration (TOML)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Do not open the standard libraries
        #[arg(long)]
        no_libs: bool,
    },

    /// Run Lua source text given on the command line
    Eval {
        /// Source text to run
        code: String,

        /// Session configuration (TOML)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Do not open the standard libraries
        #[arg(long)]
        no_libs: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("luabind=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            script,
            config,
            no_libs,
        } => open_session(config.as_deref(), no_libs).and_then(|session| {
            info!(script = %script.display(), "running script");
            session
                .run_file(&script)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }),
        Commands::Eval {
            code,
            config,
            no_libs,
        } => open_session(config.as_deref(), no_libs).and_then(|session| {
            session
                .run_source(&code)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Build the session and register the demo host surface
fn open_session(config: Option<&Path>, no_libs: bool) -> Result<Session, String> {
    let mut session_config = match config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
            SessionConfig::from_toml(&content)?
        }
        None => SessionConfig::default(),
    };
    if no_libs {
        session_config = session_config.with_open_libs(false);
    }

    let session = Session::with_config(session_config).map_err(|e| e.to_string())?;
    let hello = Module::new("hello").function("say_hello", adapt!(|| "hello world!"));
    session
        .load_module(&hello)
        .set_global("host_version", &adapt!(|| env!("CARGO_PKG_VERSION")));
    Ok(session)
}
