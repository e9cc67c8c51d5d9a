//! psession - run PowerShell commands from the command line
//!
//! Starts one PowerShell session and either runs the commands given with
//! `-c`, or reads commands line by line from standard input.
//!
//! # Quick Start
//!
//! ```text
//! psession -c "Get-Date"            # Run one command
//! psession -7 -c "echo a" -c "echo b"
//! psession --codepage 932           # REPL with Shift_JIS, no detection
//! ```

use std::env;
use std::io::{self, BufRead, Write};

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use psession::config::{self, Config as FileConfig};
use psession::{Session, ShellCommand, ShellError};

/// Command line settings
#[derive(Debug, Default, PartialEq)]
struct Config {
    /// Shell program, overrides config.toml
    shell: Option<String>,
    /// Code page, overrides config.toml
    codepage: Option<u32>,
    /// Commands to run instead of the REPL
    commands: Vec<String>,
    /// Debug logging
    verbose: bool,
}

#[derive(Debug, PartialEq)]
enum Invocation {
    Run(Config),
    Help,
    Version,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("psession {} - serial command execution in a PowerShell session", VERSION);
    eprintln!();
    eprintln!("Usage: psession [OPTIONS]");
    eprintln!();
    eprintln!("Shell options:");
    eprintln!("  (default)             From config.toml or Windows PowerShell");
    eprintln!("  -p, --powershell      Windows PowerShell (powershell.exe)");
    eprintln!("  -7, --pwsh            PowerShell 7 (pwsh.exe)");
    eprintln!("  -s, --shell <CMD>     Custom shell program");
    eprintln!();
    eprintln!("Encoding options:");
    eprintln!("  (default)             Detect with chcp");
    eprintln!("  --codepage <N>        Use code page N (65001, 932, 936, 949, 950)");
    eprintln!();
    eprintln!("Execution options:");
    eprintln!("  (default)             Read commands from standard input");
    eprintln!("  -c, --command <CMD>   Run CMD (repeatable) and exit");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  --verbose             Debug logging");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.psession/config.toml");
    eprintln!("Log file:      ~/.psession/psession.log");
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut config = Config::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-v" | "--version" => return Ok(Invocation::Version),
            // Shell selection
            "-p" | "--powershell" => {
                config.shell = Some(ShellCommand::powershell().program);
            }
            "-7" | "--pwsh" => {
                config.shell = Some(ShellCommand::pwsh().program);
            }
            "-s" | "--shell" => {
                i += 1;
                let shell = args.get(i).ok_or("Missing shell argument")?;
                config.shell = Some(shell.clone());
            }
            // Encoding
            "--codepage" => {
                i += 1;
                let cp = args.get(i).ok_or("Missing codepage argument")?;
                let cp = cp
                    .parse()
                    .map_err(|_| format!("Invalid codepage: {}", cp))?;
                config.codepage = Some(cp);
            }
            // Execution
            "-c" | "--command" => {
                i += 1;
                let command = args.get(i).ok_or("Missing command argument")?;
                config.commands.push(command.clone());
            }
            "--verbose" => {
                config.verbose = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(Invocation::Run(config))
}

/// Log to ~/.psession/psession.log; RUST_LOG overrides the level
fn init_logging(verbose: bool) {
    let log_path = config::config_dir()
        .map(|dir| dir.join("psession.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("psession.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let default_level = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Run one command, printing its output. Returns false on a command error.
fn run_command(session: &mut Session, command: &str) -> anyhow::Result<bool> {
    match session.exec(command) {
        Ok(out) => {
            print!("{}", out);
            Ok(true)
        }
        Err(ShellError::Command { stderr, stdout }) => {
            print!("{}", stdout);
            eprint!("{}", stderr);
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to run {:?}", command)),
    }
}

/// Read commands from stdin until EOF or `exit`
fn run_repl(session: &mut Session) -> anyhow::Result<bool> {
    let stdin = io::stdin();
    let mut all_ok = true;

    loop {
        print!("PS> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "exit" {
            break;
        }
        all_ok &= run_command(session, command)?;
    }

    Ok(all_ok)
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = match parse_args(&args) {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            eprintln!("psession {}", VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_logging(config.verbose);
    info!("psession starting...");

    // Merge config: command line args override config file
    let file_config = FileConfig::load();
    file_config.register_encodings()?;
    let mut options = file_config.session_options();
    if let Some(shell) = config.shell {
        options.shell = ShellCommand::new(shell, options.shell.args);
    }
    if config.codepage.is_some() {
        options.code_page = config.codepage;
    }
    info!("Shell: {} {:?}", options.shell.program, options.shell.args);

    let mut session = match Session::with_options(options) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start session: {}", e);
            return Err(e).context("Failed to start session");
        }
    };
    info!(
        "Code page: {} ({})",
        session.code_page(),
        session.encoding_name()
    );

    let all_ok = if config.commands.is_empty() {
        run_repl(&mut session)?
    } else {
        let mut all_ok = true;
        for command in &config.commands {
            all_ok &= run_command(&mut session, command)?;
        }
        all_ok
    };

    session.exit()?;
    info!("Session ended");

    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}
