//! presence-bridge: publishes what you are doing in your notes vault to the
//! local chat client's rich presence.
//!
//! ## Subcommands
//!
//! - `run`: Long-running bridge, reads host events from stdin
//! - `preview`: Prints the activity that would be sent for a file
//! - `settings`: Prints the effective settings after merging defaults

mod host;
mod logging;

use chrono::Utc;
use clap::{Parser, Subcommand};
use presence_core::{
    application_id, get_settings_path, load_settings, load_settings_or_default, synthesize,
    EditorContext, FixedViewMode, IpcTransportFactory, NoteFile, PresenceError, PresenceService,
    SharedViewMode,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "presence-bridge")]
#[command(about = "Vault rich presence bridge")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (reads host events as JSON lines from stdin)
    Run {
        /// Display name of the open vault
        #[arg(long, default_value = "Vault")]
        vault: String,

        /// Start disconnected and wait for a `connect` message
        #[arg(long)]
        no_connect: bool,
    },

    /// Print the activity payload for a file without connecting
    Preview {
        /// Vault-relative path of the open file
        #[arg(long)]
        file: Option<String>,

        /// Synthesize as if the view is in reading mode
        #[arg(long)]
        reading: bool,

        /// Display name of the vault
        #[arg(long, default_value = "Vault")]
        vault: String,
    },

    /// Print the effective settings
    Settings,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { vault, no_connect } => run(&vault, no_connect),
        Commands::Preview {
            file,
            reading,
            vault,
        } => preview(file, reading, &vault),
        Commands::Settings => print_settings(),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "presence-bridge failed");
        eprintln!("presence-bridge: {}", e);
        std::process::exit(1);
    }
}

fn run(vault: &str, no_connect: bool) -> Result<(), PresenceError> {
    let settings_path = get_settings_path()?;
    let settings = load_settings_or_default(&settings_path);
    let view_mode = SharedViewMode::new();

    let mut service = PresenceService::new(
        settings,
        vault,
        Arc::new(view_mode.clone()),
        Box::new(IpcTransportFactory::new()),
        application_id(),
        Arc::new(host::LineNotifier::stdout()),
    );

    let adapter = host::HostAdapter::new(view_mode, settings_path);
    // The reader stays blocked on stdin; it is not joined.
    let _reader = host::spawn_stdin_reader(adapter, service.sender()).map_err(|source| {
        PresenceError::Io {
            context: "spawning host reader".to_string(),
            source,
        }
    })?;

    tracing::info!(vault, no_connect, "presence-bridge started");
    if !no_connect {
        service.connect();
    }
    service.run();
    Ok(())
}

fn preview(file: Option<String>, reading: bool, vault: &str) -> Result<(), PresenceError> {
    let settings = load_settings_or_default(&get_settings_path()?);
    let mut context = EditorContext::new(vault, Utc::now());
    context.open_file(file.map(NoteFile::new), Utc::now());

    let payload = synthesize(&settings, &context, &FixedViewMode(reading));
    let json = serde_json::to_string_pretty(&payload).map_err(|source| PresenceError::Json {
        context: "serializing activity".to_string(),
        source,
    })?;
    println!("{}", json);
    Ok(())
}

fn print_settings() -> Result<(), PresenceError> {
    let settings = load_settings(&get_settings_path()?)?;
    let json = serde_json::to_string_pretty(&settings).map_err(|source| PresenceError::Json {
        context: "serializing settings".to_string(),
        source,
    })?;
    println!("{}", json);
    Ok(())
}
