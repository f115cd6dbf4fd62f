use std::path::PathBuf;
use std::sync::Arc;

// Error tracing
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use session::{Navigator, Resolution, SessionService, SessionServiceBuilder};
use shared::types::SessionState;

#[derive(Parser, Debug)]
#[command(name = "session", version, about = "Resolve and inspect the community site session")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "session.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the startup path and print the published state
    Status,
    /// Resolve the stored token
    Resolve {
        /// Skip the user and ban caches
        #[arg(long)]
        force: bool,
        /// Leave the loading flag untouched
        #[arg(long)]
        silent: bool,
    },
    /// Forced revalidation of the stored token
    Refresh {
        #[arg(long)]
        silent: bool,
    },
    /// Drop the token and both cache entries
    Logout,
    /// Print every state change until Ctrl-C
    Watch,
}

/// Tells the user where the site would send them.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn redirect(&self, destination: &str) {
        eprintln!("Redirecting to {}", destination);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = shared::config::load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let service = SessionServiceBuilder::from_config(&config)
        .context("Failed to build session service")?
        .navigator(Arc::new(PrintNavigator))
        .build();

    match cli.command {
        Command::Status => {
            let startup = service.initialize().await?;
            if let Some(background) = startup.background {
                // Show the authoritative answer rather than the cached ban.
                let _ = background.await.context("Background revalidation panicked")?;
            }
            print_state(&service.state())?;
        }
        Command::Resolve { force, silent } => {
            let resolution = service
                .resolve_session(service.token(), force, silent)
                .await?;
            report(&resolution);
            print_state(&service.state())?;
        }
        Command::Refresh { silent } => match service.refresh(silent).await? {
            Some(resolution) => {
                report(&resolution);
                print_state(&service.state())?;
            }
            None => eprintln!("No session token; nothing to refresh"),
        },
        Command::Logout => {
            service.logout();
            print_state(&service.state())?;
        }
        Command::Watch => watch(&service).await?,
    }

    Ok(())
}

async fn watch(service: &SessionService) -> Result<()> {
    let mut updates = service.subscribe();
    print_state(&updates.borrow_and_update())?;

    let startup = service.initialize().await?;
    report(&startup.resolution);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                print_state(&state)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn report(resolution: &Resolution) {
    match resolution {
        Resolution::Unauthenticated => eprintln!("Not signed in"),
        Resolution::Authenticated(user) => {
            let name = user.display_name().unwrap_or_else(|| "unknown member".into());
            let roles: Vec<&str> = user.roles.names().collect();
            eprintln!("Signed in as {} (roles: {})", name, roles.join(", "));
        }
        Resolution::Banned(record) => eprintln!("Account {}", record),
    }
}

fn print_state(state: &SessionState) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
    println!("{}", json);
    Ok(())
}
