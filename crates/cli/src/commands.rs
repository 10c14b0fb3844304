//! CLI commands

use anyhow::{Result, anyhow};
use clap::Subcommand;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use warden_core::{Credentials, FileStorage};
use warden_http::{ClientConfig, SessionController, SessionStatus};

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and persist the session
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the current user, refreshing the access token if needed
    Me,

    /// Clear the session locally and on the backend
    Logout,

    /// Show whether a session is persisted
    Status,

    /// Fire concurrent profile requests to exercise the shared refresh
    Burst {
        /// Number of concurrent requests
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },
}

impl Commands {
    pub async fn execute(self, config: ClientConfig, data_dir: PathBuf) -> Result<()> {
        let controller = open_session(&config, data_dir).await?;

        match self {
            Self::Login { email, password } => login(&controller, email, password).await,
            Self::Me => me(&controller).await,
            Self::Logout => {
                controller.logout().await;
                println!("Logged out");
                Ok(())
            }
            Self::Status => status(&controller).await,
            Self::Burst { count } => burst(&controller, count).await,
        }
    }
}

async fn open_session(config: &ClientConfig, data_dir: PathBuf) -> Result<SessionController> {
    let gateway = config.build_gateway()?;
    let storage = Arc::new(FileStorage::in_dir(data_dir));
    info!(session_file = %storage.path().display(), "Opening session");
    Ok(SessionController::start(gateway, storage).await?)
}

async fn login(controller: &SessionController, email: String, password: String) -> Result<()> {
    let user = controller
        .login(&Credentials::new(email, password))
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    println!("Logged in as {} <{}> ({})", user.name, user.email, user.role);
    Ok(())
}

async fn me(controller: &SessionController) -> Result<()> {
    let user = controller.fetch_profile().await?;
    println!("{}", serde_json::to_string_pretty(&user)?);
    Ok(())
}

async fn status(controller: &SessionController) -> Result<()> {
    let state = match controller.status() {
        SessionStatus::Authenticated => "authenticated",
        SessionStatus::Unauthenticated => "unauthenticated",
    };
    println!("Backend: {}", controller.gateway().kind());
    println!("Session: {state}");
    println!(
        "Refresh token persisted: {}",
        controller.has_persisted_session().await
    );
    Ok(())
}

async fn burst(controller: &SessionController, count: usize) -> Result<()> {
    if count == 0 {
        return Err(anyhow!("count must be at least 1"));
    }

    let results = join_all((0..count).map(|_| controller.fetch_profile())).await;
    let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    println!(
        "{} of {count} requests succeeded, {} refresh(es) performed",
        count - failures.len(),
        controller.coordinator().episodes()
    );

    match failures.first() {
        None => Ok(()),
        Some(first) => {
            warn!(failed = failures.len(), error = %first, "Burst had failures");
            Err(anyhow!("{} request(s) failed: {first}", failures.len()))
        }
    }
}
