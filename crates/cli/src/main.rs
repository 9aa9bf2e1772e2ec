use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use dockzoom::commands::{resolve_command, settings_command, signatures_command, simulate_command};
use tracing::Level;

/// Dock-style magnification for taskbar icons: inspection and replay tools.
///
/// This CLI is a thin wrapper around `dockzoom-core` (exposed in code as
/// `dockzoom_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused by the in-process host glue.
#[derive(Parser, Debug)]
#[command(
    name = "dockzoom",
    version,
    about = "Dock-style magnification for taskbar icons",
    long_about = None
)]
struct Cli {
    /// Log to stderr: -v for info, -vv for debug, -vvv for trace.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the stored settings and the values that will actually be applied.
    ///
    /// Out-of-range numbers and malformed frame classes fall back to defaults.
    Settings {
        /// Settings JSON file. Defaults are used when omitted.
        #[arg(long)]
        config: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the handler signatures the hooks will look up.
    Signatures {
        #[arg(long)]
        config: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Resolve the pointer handler signatures in a module on disk.
    ///
    /// Exits with an error if either handler cannot be found. Only symbols
    /// stored in the module itself are read: PE exports, ELF symbol tables
    /// and the Mach-O symbol table. Debug databases (PDB) are not consulted,
    /// so the undecorated handler signatures of a shipped Windows module
    /// are reported as not found.
    Resolve {
        /// Path to the module (PE, ELF or Mach-O).
        #[arg(long)]
        module: String,

        #[arg(long)]
        config: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Replay pointer events over an in-memory icon row.
    ///
    /// The layout is a YAML description of the icons; events come from a
    /// YAML trace or from repeated `--pointer` values.
    Simulate {
        /// YAML layout of the taskbar frame and its icons.
        #[arg(long)]
        layout: String,

        /// YAML list of `move`, `exit` and `settings` events.
        #[arg(long, conflicts_with = "pointer")]
        trace: Option<String>,

        /// Pointer X positions to move to, in order.
        #[arg(long, allow_negative_numbers = true)]
        pointer: Vec<f64>,

        #[arg(long)]
        config: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Settings { config, json } => settings_command(config.as_deref(), json)?,
        Command::Signatures { config, json } => signatures_command(config.as_deref(), json)?,
        Command::Resolve { module, config, json } => {
            resolve_command(&module, config.as_deref(), json)?
        }
        Command::Simulate { layout, trace, pointer, config, json } => {
            simulate_command(&layout, trace.as_deref(), &pointer, config.as_deref(), json)?
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
