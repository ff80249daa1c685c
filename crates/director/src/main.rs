//! director: Director Agent Main Binary
//!
//! Usage:
//!   director                    - Start the HTTP server
//!   director --query "<text>"   - Route one query and print the streamed answer
//!   director --help             - Show help

mod cli;

use director_core::a2a::A2aTransport;
use director_core::{Config, Director};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// HTTP server mode
    Server,
    /// One-shot query mode
    Query(String),
    /// Show help
    Help,
    /// Show version
    Version,
}

/// Parsed command line
#[derive(Debug)]
struct Options {
    mode: RunMode,
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    session: Option<String>,
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = parse_args(std::env::args().skip(1))?;

    match options.mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("director {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(options.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    if let Some(host) = options.host {
        config.server.host = host;
    }
    if let Some(port) = options.port {
        config.server.port = port;
    }

    tracing::info!("Starting director...");
    tracing::info!("Classifier: {:?} / {}", config.llm.provider, config.llm.model);

    let director = Director::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create director: {}", e))?;

    match options.mode {
        RunMode::Query(text) => cli::run_query(&director, text, options.session, options.token).await,
        RunMode::Server => run_server(config, director).await,
        _ => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options {
        mode: RunMode::Server,
        config: None,
        host: None,
        port: None,
        session: None,
        token: None,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| anyhow::anyhow!("{} requires a value", flag))
        };

        match arg.as_str() {
            "--help" | "-h" => options.mode = RunMode::Help,
            "--version" | "-v" => options.mode = RunMode::Version,
            "--config" | "-c" => options.config = Some(PathBuf::from(value(&arg)?)),
            "--host" => options.host = Some(value(&arg)?),
            "--port" | "-p" => {
                let raw = value(&arg)?;
                let port = raw
                    .parse::<u16>()
                    .map_err(|_| anyhow::anyhow!("invalid port: {}", raw))?;
                options.port = Some(port);
            }
            "--query" | "-q" => options.mode = RunMode::Query(value(&arg)?),
            "--session" => options.session = Some(value(&arg)?),
            "--token" => options.token = Some(value(&arg)?),
            other => anyhow::bail!("unknown argument: {} (see --help)", other),
        }

        if matches!(options.mode, RunMode::Help | RunMode::Version) {
            break;
        }
    }

    Ok(options)
}

/// Print help message
fn print_help() {
    println!("director - routes questions to specialised agents");
    println!();
    println!("Usage:");
    println!("  director                      Start the HTTP server");
    println!("  director --query <text>       Route one query and stream the answer");
    println!("  director --help               Show this help message");
    println!("  director --version            Show version");
    println!();
    println!("Options:");
    println!("  -c, --config <path>   Settings file (default: director.toml)");
    println!("      --host <host>     Listen host (default: localhost)");
    println!("  -p, --port <port>     Listen port (default: 10010)");
    println!("      --session <id>    Session id for --query");
    println!("      --token <value>   Authorization value forwarded downstream for --query");
    println!();
    println!("Environment Variables:");
    println!("  DIRECTOR_HOST         Listen host");
    println!("  DIRECTOR_PORT         Listen port");
    println!("  DIRECTOR_AGENTS       Agents as id=url,id=url");
    println!("  LLM_PROVIDER          Provider: openai or claude (default: openai)");
    println!("  LLM_MODEL             Classifier model (default: deepseek-r1:8b)");
    println!("  LLM_API_KEY           API key (optional for local providers)");
    println!("  LLM_BASE_URL          Provider endpoint (default: http://127.0.0.1:11434/v1)");
    println!("  RUST_LOG              Log filter (default: info)");
}

/// Run server mode
async fn run_server(config: Config, director: Director) -> anyhow::Result<()> {
    // Reachability only; a missing agent does not stop startup
    let probe = A2aTransport::new(&config.delegation)
        .map_err(|e| anyhow::anyhow!("Failed to create probe client: {}", e))?;
    probe.probe_agents(director.registry()).await;

    let mut handle = tokio::spawn(async move {
        if let Err(e) = director_api::start_server(&config, director).await {
            tracing::error!("HTTP API error: {}", e);
        }
    });

    tracing::info!("director initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down...");
            handle.abort();
        }
        _ = &mut handle => {
            tracing::warn!("HTTP API server stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Options> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_defaults_to_server() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.mode, RunMode::Server);
        assert!(options.config.is_none());
    }

    #[test]
    fn test_parse_server_flags() {
        let options = parse(&["--host", "0.0.0.0", "-p", "8080", "--config", "d.toml"]).unwrap();
        assert_eq!(options.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(options.port, Some(8080));
        assert_eq!(options.config, Some(PathBuf::from("d.toml")));
    }

    #[test]
    fn test_parse_query_mode() {
        let options = parse(&["-q", "What is widget 1?", "--token", "Bearer t"]).unwrap();
        assert_eq!(options.mode, RunMode::Query("What is widget 1?".to_string()));
        assert_eq!(options.token.as_deref(), Some("Bearer t"));
    }

    #[test]
    fn test_parse_help_short_circuits() {
        assert_eq!(parse(&["--help", "--bogus"]).unwrap().mode, RunMode::Help);
        assert_eq!(parse(&["-v"]).unwrap().mode, RunMode::Version);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["--port", "not-a-port"]).is_err());
        assert!(parse(&["--port"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
