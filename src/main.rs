//! Relay bot entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once (stderr, or the configured log file)
//!   5. Validate credentials (fatal when missing)
//!   6. Build the relay (persona, provider, cooldown gates)
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Run comms channels until shutdown or all channels exit

use std::io::Write as _;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_bot::config::{self, Config};
use relay_bot::error::AppError;
use relay_bot::logger;
use relay_bot::relay::Relay;
use relay_bot::subsystems::comms;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let mut config = config::load(args.config_path.as_deref())?;

    // Without -i the console stays closed (daemon-safe default).
    if !args.interactive {
        config.comms.pty.enabled = false;
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some(), config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        interactive = args.interactive,
        log_file = ?config.log_file,
        "config loaded"
    );

    config.validate()?;

    let relay = Relay::from_config(&config).map_err(|e| AppError::Config(e.to_string()))?;
    let relay = Arc::new(relay);

    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config, relay.client().model(), args.interactive);

    let channels = comms::start(&config, relay, shutdown.clone());
    let result = channels.join().await;

    // Channels may all exit on their own (stdin EOF); stop everything else too.
    shutdown.cancel();

    if args.interactive {
        println!("\nBye :) ...");
        let _ = std::io::stdout().flush();
    }
    let _ = std::io::stderr().flush();

    result
}

fn print_startup_summary(config: &Config, model: &str, interactive: bool) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        if text.chars().count() >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let channels = comms::planned_channels(config);
    let channel_line = if channels.is_empty() { "none".to_string() } else { channels.join(", ") };
    let user_cooldown = match config.relay.user_cooldown {
        Some(d) => format!("{}s", d.as_secs_f64()),
        None => "off".to_string(),
    };

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ Relay Bot Status                                             ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ {}   ║", fit(format!("bot: {}", config.bot_name)));
    println!("║ {}   ║", fit(format!("pid: {}", std::process::id())));
    println!("║ {}   ║", fit(format!("mode: {}", if interactive { "interactive" } else { "daemon" })));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ {}   ║", fit(format!("channels: {channel_line}")));
    println!("║ {}   ║", fit(format!("llm: provider={} model={model}", config.llm.provider)));
    println!(
        "║ {}   ║",
        fit(format!(
            "cooldown: channel={}s user={user_cooldown} ceiling={}",
            config.relay.cooldown.as_secs_f64(),
            config.relay.reply_ceiling
        ))
    );
    println!("╚══════════════════════════════════════════════════════════════╝");
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: relay-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Run in interactive mode (enables PTY console)");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug  (gate decisions, prompt sizes)
    //   -vvvv+  → trace  (cooldown evictions)
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, config_path }
}
