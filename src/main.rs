//! GeoScout CLI
//!
//! Usage:
//!   geoscout                                  # Interactive identification (default)
//!   geoscout --offline                        # Interactive, local engine only
//!   geoscout --serve                          # HTTP API server
//!   geoscout --infer "Glassy,Transparent"     # One-shot local inference
//!   geoscout --json                           # JSON frames instead of text

use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use geoscout::config::Config;
use geoscout::core::{
    infer, run_server, AppState, Identifier, OpenAiCompatibleProvider, Orchestrator,
    RemoteDecisionClient, RemoteEngine,
};
use geoscout::types::{canonical_trait, Observation, ObservationSet, PresentationFrame, UiDirective};
use geoscout::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "geoscout",
    version = VERSION,
    about = "GeoScout - guided mineral identification field assistant",
    long_about = "GeoScout asks visual and physical observation questions and converges on\n\
                  an identified mineral.\n\n\
                  Decisions come from a remote reasoning service while it is reachable.\n\
                  After the first failure the session switches to the deterministic\n\
                  local engine for good (until reset).\n\n\
                  Modes:\n  \
                  --interactive  Terminal session (default)\n  \
                  --serve        HTTP API server\n  \
                  --infer        Score a trait list against the knowledge base"
)]
struct Args {
    /// Interactive terminal session
    #[arg(short, long)]
    interactive: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (overrides config)
    #[arg(long)]
    addr: Option<String>,

    /// Comma-separated traits for one-shot local inference
    #[arg(long)]
    infer: Option<String>,

    /// Never consult the remote engine
    #[arg(long)]
    offline: bool,

    /// Identify endpoint of a running geoscout server (overrides config)
    #[arg(long)]
    remote_url: Option<String>,

    /// Config file (default: ./geoscout.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Debug logging and decision reasons
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    if let Some(ref traits) = args.infer {
        run_infer(traits, &args);
    } else if args.serve && !args.interactive {
        run_serve(&args, &config).await;
    } else {
        run_interactive(&args, &config).await;
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "geoscout=debug" } else { "geoscout=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Identify endpoint to call instead of the in-process reasoning service
fn identify_url(args: &Args, config: &Config) -> Option<String> {
    if args.offline {
        return None;
    }
    args.remote_url.clone().or_else(|| config.remote.identify_url.clone())
}

/// Engine consulted by a session, in order of preference:
/// explicit identify URL, then the reasoning service in-process.
fn build_remote(args: &Args, config: &Config) -> Option<Arc<dyn RemoteEngine>> {
    if args.offline {
        return None;
    }
    if let Some(url) = identify_url(args, config) {
        info!(%url, "using remote identify endpoint");
        return Some(Arc::new(RemoteDecisionClient::new(url)) as Arc<dyn RemoteEngine>);
    }
    build_identifier(config).map(|id| Arc::new(id) as Arc<dyn RemoteEngine>)
}

fn build_identifier(config: &Config) -> Option<Identifier> {
    match OpenAiCompatibleProvider::from_env(&config.provider) {
        Some(provider) => Some(Identifier::new(Arc::new(provider))),
        None => {
            warn!(
                "{} not set, reasoning service disabled",
                config.provider.api_key_env
            );
            None
        }
    }
}

/// One-shot local inference
fn run_infer(traits: &str, args: &Args) {
    let mut observations = ObservationSet::new();
    for t in traits.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        observations.insert(t, Observation::selected(UiDirective::Observation));
    }

    let result = infer(&observations);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
        return;
    }
    match result {
        Some(m) => println!("{} {}", "Match:".green().bold(), m),
        None => println!("{}", "No qualifying mineral (insufficient evidence)".yellow()),
    }
}

/// Run HTTP API server
async fn run_serve(args: &Args, config: &Config) {
    let identifier = if args.offline { None } else { build_identifier(config) };
    let state = match (identifier, identify_url(args, config)) {
        (identifier, Some(url)) => {
            info!(%url, "sessions use remote identify endpoint");
            let remote: Arc<dyn RemoteEngine> = Arc::new(RemoteDecisionClient::new(url));
            AppState::new(identifier, Some(remote))
        }
        (Some(identifier), None) => AppState::with_identifier(identifier),
        (None, None) => AppState::offline(),
    };
    let state = state.with_session_ttl(Duration::from_secs(config.server.session_idle_secs));
    let addr = args.addr.clone().unwrap_or_else(|| config.server.addr.clone());

    println!();
    println!("{}", format!("💎 GeoScout API Server v{}", VERSION).bold());
    println!();

    if let Err(e) = run_server(&addr, state).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Run interactive terminal session
async fn run_interactive(args: &Args, config: &Config) {
    let mut orch = match build_remote(args, config) {
        Some(remote) => Orchestrator::new(remote),
        None => Orchestrator::offline(),
    };

    print_header(orch.has_remote());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        let frame = orch.frame();
        print_frame(&frame, args);

        print!("{} ", ">".bold());
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            println!("\nSession ended.");
            break;
        }
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("reset") {
            orch.reset();
            continue;
        }

        let result = if let Some(name) = line.strip_prefix('-') {
            orch.retract(resolve_trait(&frame, name.trim())).await.map(|_| ())
        } else {
            orch.select(resolve_option(&frame, line)).await.map(|_| ())
        };

        if let Err(e) = result {
            println!("{}", format!("⚠ {}", e).yellow());
        }
    }
}

/// Option by 1-based number, or the text as typed
fn resolve_option<'a>(frame: &'a PresentationFrame, input: &'a str) -> &'a str {
    input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| frame.options.get(i))
        .map(String::as_str)
        .unwrap_or(input)
}

/// Observed trait by 1-based number or name
fn resolve_trait<'a>(frame: &'a PresentationFrame, input: &'a str) -> &'a str {
    if let Some(t) = input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| frame.observed.get(i))
    {
        return &t.name;
    }
    let wanted = canonical_trait(input);
    frame
        .observed
        .iter()
        .find(|t| canonical_trait(&t.name) == wanted)
        .map(|t| t.name.as_str())
        .unwrap_or(input)
}

/// Print header
fn print_header(remote: bool) {
    println!("{}", "========================================".bold());
    println!("{}", format!("  GeoScout v{} - Field Assistant", VERSION).bold());
    println!("{}", "========================================".bold());
    if !remote {
        println!("{}", "No remote engine configured: deterministic local mode.".yellow());
    }
    println!("Pick an option by number. '-<n>' or '-<trait>' undoes a trait.");
    println!("'reset' starts a new sample, 'quit' exits.");
    println!();
}

/// Print a frame
fn print_frame(frame: &PresentationFrame, args: &Args) {
    if args.json {
        println!("{}", serde_json::to_string(frame).unwrap_or_default());
        return;
    }
    if args.no_color {
        println!("{}", frame.to_parseable_string());
    } else {
        println!("{}", frame.to_terminal_string());
    }
    if let Some(ref notice) = frame.notice {
        println!("  {}", notice.yellow());
    }
    if args.verbose {
        let engine = if frame.reason.is_local() { "local" } else { "remote" };
        println!("  {}", format!("[{}] {}", engine, frame.reason).dimmed());
    }

    if !frame.observed.is_empty() {
        let notes: Vec<String> = frame
            .observed
            .iter()
            .enumerate()
            .map(|(i, t)| format!("[-{}] {} ✕", i + 1, t.name))
            .collect();
        println!("  Field notes: {}", notes.join("  "));
    }

    if frame.ui_directive.is_terminal() {
        let mineral = frame.identified_mineral.as_deref().unwrap_or("Unknown");
        println!();
        println!("  {} {}", "Identification Complete:".green().bold(), mineral.bold());
        println!("  Type 'reset' to start a new sample.");
    } else {
        for (i, option) in frame.options.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, option);
        }
    }
    println!();
}
