//! gatehouse - headless host for the session core.
//!
//! Restores the session before doing anything else, then resolves routes
//! and issues API requests the way the UI shell would.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gatehouse_core::api::{ApiClient, HttpSessionSource};
use gatehouse_core::auth::{
    AuthService, Bootstrap, DemoSessionSource, SessionPayload, SessionSource, SessionStore,
};
use gatehouse_core::config::Config;
use gatehouse_core::routing::{Navigation, Navigator, RouteTable};
use reqwest::Method;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file written when `--log-dir` is given
const LOG_FILE: &str = "gatehouse.log";

#[derive(Parser, Debug)]
#[command(name = "gatehouse", about = "Restore a session, then navigate routes and call the API")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "GATEHOUSE_BASE_URL")]
    base_url: Option<String>,

    /// Restore a built-in signed-in session instead of calling the backend
    #[arg(long, conflicts_with = "demo_guest")]
    demo: bool,

    /// Behave as if the backend reported no session
    #[arg(long)]
    demo_guest: bool,

    #[arg(long, env = "GATEHOUSE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show who is signed in
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Resolve routes, following guard redirects
    Navigate {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// GET one or more targets concurrently
    Fetch {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Log out, then re-check the given routes
    Logout { paths: Vec<String> },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }),
    };
    if let Some(ref url) = cli.base_url {
        config.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn demo_payload() -> SessionPayload {
    SessionPayload::new("demo-access-token", "user-123", "Cameron Young", &["user", "admin"])
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());
    info!("gatehouse starting");

    let config = load_config(&cli)?;
    debug!(base_url = %config.base_url, "Config loaded");

    let store = Arc::new(SessionStore::new());
    let api = ApiClient::new(&config, Arc::clone(&store))?;

    let source: Arc<dyn SessionSource> = if cli.demo {
        Arc::new(DemoSessionSource::signed_in(demo_payload()))
    } else if cli.demo_guest {
        Arc::new(DemoSessionSource::guest())
    } else {
        Arc::new(HttpSessionSource::new(api.clone(), config.refresh_path.clone()))
    };

    // Nothing below may run until the session is resolved
    let outcome = Bootstrap::new(source, config.bootstrap_timeout())
        .run(&store)
        .await;
    debug!(?outcome, "Bootstrap finished");

    let navigator = Navigator::new(
        RouteTable::portfolio(),
        Arc::clone(&store),
        config.public_route.clone(),
    );

    match cli.command {
        Command::Status { json } => print_status(&store, json)?,
        Command::Navigate { paths } => {
            for path in &paths {
                navigate(&navigator, path)?;
            }
        }
        Command::Fetch { targets } => fetch_all(&api, &targets).await,
        Command::Logout { paths } => {
            AuthService::new(Arc::clone(&store)).logout();
            print_status(&store, false)?;
            for path in &paths {
                navigate(&navigator, path)?;
            }
        }
    }

    info!("gatehouse shutting down");
    Ok(())
}

fn print_status(store: &SessionStore, json: bool) -> Result<()> {
    let Some(session) = store.snapshot() else {
        if json {
            println!("null");
        } else {
            println!("Not signed in (guest)");
        }
        return Ok(());
    };

    let identity = session.identity();
    if json {
        println!("{}", serde_json::to_string_pretty(identity)?);
        return Ok(());
    }

    println!("Signed in as {} ({})", identity.display_name(), identity.id());
    let roles: Vec<&str> = identity.roles().iter().map(String::as_str).collect();
    println!("Roles: {}", if roles.is_empty() { "-".to_string() } else { roles.join(", ") });
    println!(
        "Session established {}",
        session.established_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

fn navigate(navigator: &Navigator, path: &str) -> Result<()> {
    match navigator.navigate(path)? {
        Navigation::Granted { path, view } => println!("{} -> {}", path, view),
        Navigation::Denied {
            attempted,
            stage,
            redirect_to,
        } => {
            println!("{} denied ({:?}), redirecting to {}", attempted, stage, redirect_to);
            match navigator.navigate(&redirect_to)? {
                Navigation::Granted { path, view } => println!("{} -> {}", path, view),
                Navigation::Denied { .. } => bail!("Public route {} is itself guarded", redirect_to),
            }
        }
    }
    Ok(())
}

async fn fetch_all(api: &ApiClient, targets: &[String]) {
    let requests = targets.iter().map(|target| async move {
        let request = api.request(Method::GET, target)?;
        Ok::<_, anyhow::Error>(api.dispatch(request).await?)
    });
    let results = futures::future::join_all(requests).await;

    for (target, result) in targets.iter().zip(results) {
        match result {
            Ok(response) => println!("{}: {}", target, response.status()),
            Err(e) => println!("{}: error: {:#}", target, e),
        }
    }
}
