//! rolegate: drive the session controller from a terminal.
//!
//! Every command bootstraps a fresh controller from the stored credential,
//! the way an app launch would, then applies one event.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rolegate_core::{
    evaluate, Config, Credential, Gatekeeper, Navigator, Section, Session, SessionController,
};

const LOG_FILE_PREFIX: &str = "rolegate.log";

#[derive(Parser)]
#[command(name = "rolegate")]
#[command(about = "Session and role gating for the driver/shipper app")]
#[command(version)]
struct Cli {
    /// Resolve roles from mock token text instead of the backend
    #[arg(long, global = true)]
    mock: bool,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session and what each section would do
    Status,

    /// Sign in with a password or an existing token pair
    Login {
        #[arg(long, requires = "password", conflicts_with = "access_token")]
        email: Option<String>,

        #[arg(long, requires = "email")]
        password: Option<String>,

        #[arg(long, required_unless_present = "email")]
        access_token: Option<String>,

        #[arg(long, requires = "access_token")]
        refresh_token: Option<String>,
    },

    /// Clear the stored credential
    Logout,

    /// Mount a section and follow the session until it renders
    Open {
        /// auth, driverHome or shipperHome
        #[arg(value_name = "SECTION")]
        section: Section,
    },
}

/// Prints redirects instead of switching screens.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect_to(&self, section: Section) {
        info!(to = %section, "Navigator redirect");
        println!("-> {}", section);
    }
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
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

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    if cli.mock {
        config.mock_auth = true;
    }

    let mut controller = SessionController::from_config(&config)?;
    controller.bootstrap()?;

    match cli.command {
        Commands::Status => status(&mut controller).await,
        Commands::Login {
            email,
            password,
            access_token,
            refresh_token,
        } => {
            let settled = settle(&mut controller).await?;
            if settled != Session::Unauthenticated {
                bail!("Already signed in ({}); run `rolegate logout` first", settled);
            }
            match (email, password, access_token) {
                (Some(email), Some(password), _) => {
                    controller.login_with_password(&email, &password).await?
                }
                (_, _, Some(access)) => controller.login(Credential::new(access, refresh_token))?,
                _ => bail!("Provide --email and --password, or --access-token"),
            }
            let session = settle(&mut controller).await?;
            print_landing(&session);
            Ok(())
        }
        Commands::Logout => {
            let settled = settle(&mut controller).await?;
            if !settled.is_authenticated() {
                println!("Not signed in");
                return Ok(());
            }
            controller.logout()?;
            println!("Signed out");
            Ok(())
        }
        Commands::Open { section } => open(&mut controller, section).await,
    }
}

/// Wait for any in-flight role resolution, stopping on Ctrl-C.
async fn settle(controller: &mut SessionController) -> Result<Session> {
    tokio::select! {
        session = controller.wait_for_resolution() => Ok(session),
        _ = tokio::signal::ctrl_c() => bail!("Interrupted while resolving role"),
    }
}

async fn status(controller: &mut SessionController) -> Result<()> {
    let session = settle(controller).await?;
    println!("session: {}", session);
    for section in Section::ALL {
        println!("  {:<12} {:?}", section.name(), evaluate(section, &session));
    }
    Ok(())
}

fn print_landing(session: &Session) {
    match session.role() {
        Some(role) => println!("Signed in as {}, landing on {}", role, Section::for_role(role)),
        None => println!("Session: {}", session),
    }
}

async fn open(controller: &mut SessionController, section: Section) -> Result<()> {
    let mut rx = controller.subscribe();
    let mut keeper = Gatekeeper::new(section, TerminalNavigator);
    let mut gate = tokio::spawn(async move { keeper.run_until_render(&mut rx).await });

    if let Session::AuthenticatedPendingRole = controller.session() {
        println!("Resolving role...");
    }

    tokio::select! {
        rendered = &mut gate => {
            match rendered? {
                Some(section) => println!("Rendering {}", section),
                None => println!("Session closed"),
            }
            return Ok(());
        }
        _ = controller.wait_for_resolution() => {}
        _ = tokio::signal::ctrl_c() => {
            gate.abort();
            return Ok(());
        }
    }

    // Resolution settled; the gate either renders now or stays on loading
    tokio::select! {
        rendered = &mut gate => match rendered? {
            Some(section) => println!("Rendering {}", section),
            None => println!("Session closed"),
        },
        _ = tokio::signal::ctrl_c() => gate.abort(),
    }
    Ok(())
}
