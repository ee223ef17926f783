use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use token_dispenser::{
    build_app, build_state,
    config::DispenserConfig,
    github::GitHubAppClient,
    observability,
    rules::{self, RuleRepository},
};

/// CLI arguments for the token dispenser
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Exchanges CI OIDC tokens for repository-scoped GitHub App tokens",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(
        short,
        long,
        global = true,
        env = "DISPENSER_CONFIG",
        default_value = "token-dispenser.toml"
    )]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Validate the config file and authorization rules, then exit
    Check,
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Check) => run_check(&args.config).await,
        Some(Command::Schema { output }) => {
            #[cfg(feature = "json-schema")]
            run_schema_export(output);
            #[cfg(not(feature = "json-schema"))]
            {
                let _ = output;
                eprintln!("Error: JSON schema export requires the 'json-schema' feature");
                std::process::exit(1);
            }
        }
        Some(Command::Serve) | None => run_server(&args.config).await,
    }
}

fn load_config(path: &Path) -> DispenserConfig {
    match DispenserConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Load everything the server would load and print what was configured.
async fn run_check(config_path: &Path) {
    let config = load_config(config_path);

    if let Err(e) = GitHubAppClient::from_config(&config.github) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let book = match rules::from_config(&config.rules).await {
        Ok((_, book)) => book,
        Err(e) => {
            eprintln!("Error: invalid authorization rules: {e}");
            std::process::exit(1);
        }
    };

    println!("Config OK: {}", config_path.display());
    println!("  issuer: {}", config.oidc.issuer);
    println!("  github app: {}", config.github.app_id);
    println!(
        "  rules: {} across {} repositories",
        book.rule_count(),
        book.repository_count()
    );
    for (repository, count) in book.summary() {
        println!("    {repository}: {count}");
    }
}

#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<PathBuf>) {
    let content = match DispenserConfig::json_schema_string() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: failed to serialize config schema: {e}");
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &content) {
                eprintln!("Failed to write to {}: {}", path.display(), e);
                std::process::exit(1);
            }
            eprintln!("Config JSON schema written to {}", path.display());
        }
        None => println!("{content}"),
    }
}

async fn run_server(config_path: &Path) {
    let config = load_config(config_path);

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Warning: {e}");
    }

    let state = match build_state(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start");
            std::process::exit(1);
        }
    };

    spawn_reload_on_hangup(state.tokens.rules().clone());

    let app = build_app(state, &config.server);

    let bind_addr = config.server.socket_addr();
    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// Re-read the rule source on SIGHUP. A rejected file leaves the previous
/// rules in effect.
#[cfg(unix)]
fn spawn_reload_on_hangup(rules: Arc<dyn RuleRepository>) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to install SIGHUP handler; rule reload disabled"
                );
                return;
            }
        };

        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received, reloading authorization rules");
            match rules.reload().await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!("Inline rules cannot be reloaded; restart to apply changes")
                }
                // Logged by the repository
                Err(_) => {}
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_rules: Arc<dyn RuleRepository>) {}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}
