use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::commands;
use crate::config::ClientArgs;

/// Pangolin - bring the olm tunnel client up and down
#[derive(Parser)]
#[command(name = "pangolin")]
#[command(version, disable_version_flag = true)]
#[command(about = "Pangolin - bring the olm tunnel client up and down")]
pub struct Cli {
    /// Show version
    #[arg(long)]
    pub version: bool,

    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a client (same as `up client`)
    Up(UpArgs),

    /// Stop a running client
    Down(DownArgs),

    /// Show client status
    Status(StatusArgs),

    /// View client logs
    Logs(LogsArgs),
}

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct UpArgs {
    #[command(subcommand)]
    pub command: Option<UpCommands>,

    #[command(flatten)]
    pub client: ClientArgs,
}

#[derive(Debug, Subcommand)]
pub enum UpCommands {
    /// Start a client connection
    Client(ClientArgs),
}

impl UpArgs {
    pub fn client_args(&self) -> &ClientArgs {
        match &self.command {
            Some(UpCommands::Client(args)) => args,
            None => &self.client,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct SocketArgs {
    /// Control socket path (default: /var/run/olm.sock)
    #[arg(long)]
    pub socket_path: Option<PathBuf>,
}

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct DownArgs {
    #[command(subcommand)]
    pub command: Option<DownCommands>,

    #[command(flatten)]
    pub socket: SocketArgs,
}

#[derive(Debug, Subcommand)]
pub enum DownCommands {
    /// Stop the running client
    Client(SocketArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct StatusOptions {
    #[command(flatten)]
    pub socket: SocketArgs,

    /// Print raw JSON response
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct StatusArgs {
    #[command(subcommand)]
    pub command: Option<StatusCommands>,

    #[command(flatten)]
    pub options: StatusOptions,
}

#[derive(Debug, Subcommand)]
pub enum StatusCommands {
    /// Show client status and peers
    Client(StatusOptions),
}

#[derive(Debug, Clone, Args)]
pub struct LogsOptions {
    /// Number of lines to show
    #[arg(short = 'n', long, default_value_t = 50)]
    pub lines: usize,

    /// Keep printing new lines as they are written
    #[arg(short = 'f', long)]
    pub follow: bool,

    /// Path to log file (default: ~/.pangolin/logs/client.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub command: Option<LogsCommands>,

    #[command(flatten)]
    pub options: LogsOptions,
}

#[derive(Debug, Subcommand)]
pub enum LogsCommands {
    /// View client logs
    Client(LogsOptions),
}

impl Cli {
    /// Client flags of an `up` run that stays attached to this process.
    pub fn foreground_client(&self) -> Option<&ClientArgs> {
        match &self.command {
            Some(Commands::Up(up)) => Some(up.client_args()).filter(|args| !args.detached),
            _ => None,
        }
    }

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
            Commands::Up(up) => {
                let args = match up.command {
                    Some(UpCommands::Client(args)) => args,
                    None => up.client,
                };
                commands::up::run(args)
            }
            Commands::Down(down) => {
                let socket = match down.command {
                    Some(DownCommands::Client(socket)) => socket,
                    None => down.socket,
                };
                commands::down::run(socket.socket_path.as_ref())
            }
            Commands::Status(status) => {
                let options = match status.command {
                    Some(StatusCommands::Client(options)) => options,
                    None => status.options,
                };
                commands::status::run(options.socket.socket_path.as_ref(), options.json)
            }
            Commands::Logs(logs) => {
                let options = match logs.command {
                    Some(LogsCommands::Client(options)) => options,
                    None => logs.options,
                };
                commands::logs::run(options.log_file.as_ref(), options.lines, options.follow)
            }
        }
    }
}
