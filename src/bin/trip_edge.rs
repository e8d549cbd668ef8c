//! trip-edge: page rendering bridge and trip generation API
//!
//! Usage:
//!   trip-edge serve [--bind <addr>]     Start the HTTP server
//!   trip-edge check-config              Print the resolved configuration
//!   trip-edge version                   Show version information

use anyhow::Context;
use trip_edge::{logging, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    match command {
        "serve" => cmd_serve(&args[2.min(args.len())..]).await,
        "check-config" => cmd_check_config(),
        "version" | "--version" | "-V" => {
            println!("trip-edge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"trip-edge: page rendering bridge and trip generation API

USAGE:
    trip-edge <COMMAND> [OPTIONS]

COMMANDS:
    serve [--bind <addr>]       Start the HTTP server (default command)
    check-config                Print the resolved configuration, secrets redacted
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    GEMINI_API_KEY              Key for the text model
    UNSPLASH_ACCESS_KEY         Key for image search
    APPWRITE_PROJECT_ID         Document store project (in-memory store when unset)
    SSR_UPSTREAM_URL            Render server page requests are forwarded to
    TRIP_EDGE_CONFIG            Optional YAML configuration file"#
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

async fn cmd_serve(args: &[String]) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(bind) = flag_value(args, "--bind") {
        config.server.bind_addr = bind.to_string();
    }
    logging::init(&config.server.log_filter);

    for name in config.secrets().missing() {
        tracing::warn!(secret = name, "secret not set; /api/create-trip will answer 500");
    }

    let state = AppState::from_config(&config).context("building clients")?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    trip_edge::server::serve(listener, state).await?;
    Ok(())
}

fn cmd_check_config() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    println!("{:#?}", config);
    let missing = config.secrets().missing();
    if missing.is_empty() {
        println!("secrets: ok");
    } else {
        println!("secrets missing: {}", missing.join(", "));
    }
    Ok(())
}
