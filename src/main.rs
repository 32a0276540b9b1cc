use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use discover_now::{config, error, server, utils};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve(ServeOptions),

    /// Print freshly generated values for the secret environment variables
    Keygen,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone, Default)]
pub struct ServeOptions {
    /// Port to listen on (overrides $PORT)
    #[clap(long)]
    port: Option<u16>,

    /// Directory served under /static (overrides $STATIC_DIR)
    #[clap(long)]
    static_dir: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(ServeOptions::default())) {
        Command::Serve(opt) => serve(opt).await,
        Command::Keygen => keygen(),
        Command::Completions(opt) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}

async fn serve(opt: ServeOptions) {
    config::load_env();

    let mut settings = match config::Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => error!("Invalid configuration: {}", e),
    };
    if let Some(port) = opt.port {
        settings.port = port;
    }
    if let Some(static_dir) = opt.static_dir {
        settings.static_dir = static_dir;
    }

    if let Err(e) = server::start_api_server(settings).await {
        error!("Server failed: {}", e);
    }
}

fn keygen() {
    for var in ["DISCOVER_HASH", "DISCOVER_AUTH", "DISCOVER_CRYPT"] {
        match utils::random_hex(utils::SECRET_BYTES) {
            Ok(secret) => println!("{var}={secret}"),
            Err(e) => error!("Cannot read from the system random source: {}", e),
        }
    }
}
