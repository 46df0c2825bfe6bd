use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use queuecall::cli::{Cli, Commands, ConfigAction};
use queuecall::config::{Config, SpeechEngine};
use queuecall::ipc::client::send_command;
use queuecall::ipc::protocol::{Command, Response, TerminalStatus};
use queuecall::ipc::server::IpcServer;
use queuecall::logging;
use queuecall::sequencer::SequencerPhase;
use queuecall::terminal;
use std::path::{Path, PathBuf};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let level = logging::effective_level(&config.logging.level, cli.quiet, cli.verbose);
    logging::init_logging(&level, &config.logging.format);

    match cli.command {
        Commands::Run {
            socket,
            address,
            room,
            cooldown,
            silent,
        } => {
            let mut config = config;
            if let Some(address) = address {
                config.channel.address = address;
            }
            if let Some(room) = room {
                config.channel.room = room;
            }
            if let Some(cooldown) = cooldown {
                config.speech.cooldown_ms = cooldown.as_millis() as u64;
            }
            if silent {
                config.speech.engine = SpeechEngine::Silent;
            }
            terminal::run_terminal(config, socket, cli.quiet).await?;
        }
        Commands::Status { socket, json } => {
            let response = request(socket, Command::Status).await;
            match response {
                Response::Status(status) if json => {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                }
                Response::Status(status) => print_status(&status),
                other => report(other),
            }
        }
        Commands::AutoScroll { state, socket } => {
            let response = request(
                socket,
                Command::AutoScroll {
                    enabled: state.enabled(),
                },
            )
            .await;
            report(response);
        }
        Commands::Shutdown { socket } => {
            report(request(socket, Command::Shutdown).await);
        }
        Commands::Say { text } => {
            let speech = terminal::speech_from_config(&config);
            let text = text.join(" ");
            speech
                .speak(&text)
                .await
                .with_context(|| format!("speech engine '{}' failed", speech.engine_name()))?;
        }
        Commands::Config { action } => {
            handle_config_command(action, &config, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "queuecall", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/queuecall/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

fn handle_config_command(
    action: ConfigAction,
    config: &Config,
    custom_path: Option<&Path>,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let text = toml::to_string(config).context("failed to serialize configuration")?;
            print!("{}", text);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Send a command to the running terminal. Exits on connection failure.
async fn request(socket: Option<PathBuf>, command: Command) -> Response {
    let socket_path = socket.unwrap_or_else(IpcServer::default_socket_path);

    match send_command(&socket_path, command).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!(
                "{}",
                format!("Failed to communicate with terminal: {}", e).red()
            );
            eprintln!("Is the terminal running? Start it with: queuecall run");
            std::process::exit(1);
        }
    }
}

fn report(response: Response) {
    match response {
        Response::Ok => println!("{}", "OK".green()),
        Response::Status(status) => print_status(&status),
        Response::Error { message } => {
            eprintln!("{}", format!("Error: {}", message).red());
            std::process::exit(1);
        }
    }
}

fn print_status(status: &TerminalStatus) {
    println!("Status:");
    let connection = if status.connection.is_live() {
        status.connection.to_string().green().to_string()
    } else {
        status.connection.to_string().yellow().to_string()
    };
    println!("  {}  {}", "Channel:".dimmed(), connection);
    println!(
        "  {}  {} received, {} malformed, {} sessions",
        "Pushes:".dimmed(),
        status.channel.received,
        status.channel.malformed,
        status.channel.sessions
    );

    let phase = match &status.phase {
        SequencerPhase::Idle => "idle".to_string(),
        SequencerPhase::Speaking { source, identifier } => {
            format!("speaking {} {}", source, identifier)
        }
        SequencerPhase::Cooldown => "cooldown".to_string(),
    };
    println!("  {}   {}", "Speech:".dimmed(), phase);
    println!(
        "  {}   {} queued, {} announced, {} failed",
        "Queue:".dimmed(),
        status.queued,
        status.announced,
        status.failed
    );

    match &status.display.current {
        Some(current) => println!(
            "  {}     {} {}",
            "Now:".dimmed(),
            current.identifier.bold(),
            current.subject_name
        ),
        None => println!("  {}     -", "Now:".dimmed()),
    }
    println!(
        "  {} {} waiting, {} in history",
        "Display:".dimmed(),
        status.display.waiting.len(),
        status.display.history.len()
    );

    if let Some(board) = &status.board {
        let serving = board
            .status
            .as_ref()
            .and_then(|s| s.serving())
            .unwrap_or("-");
        println!(
            "  {}  serving {}, {} on roster",
            "Clinic:".dimmed(),
            serving,
            board.roster.len()
        );
        if let Some(err) = &board.last_error {
            println!("  {}  {}", "Poll:".dimmed(), err.red());
        }
    }
    if let Some(enabled) = status.auto_scroll {
        println!(
            "  {}  {}",
            "Scroll:".dimmed(),
            if enabled { "auto" } else { "manual" }
        );
    }
}
