//! Wyffle Admin
//!
//! Operator tasks that run outside the HTTP API: granting the first
//! administrator, managing admin claims, purging rejected applications and
//! minting development tokens.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use wf_common::logging::init_tracing;
use wf_platform::config::{AuthConfig, RetentionConfig};
use wf_platform::repository::MongoStore;
use wf_platform::service::{AuthService, ClaimService, RetentionService};

/// Wyffle operator CLI
#[derive(Parser, Debug)]
#[command(name = "wf-admin", version, about = "Wyffle platform operator tasks")]
struct Cli {
    /// MongoDB connection URL
    #[arg(long, env = "WF_MONGO_URL", default_value = "mongodb://localhost:27017", global = true)]
    mongo_url: String,

    /// MongoDB database name
    #[arg(long, env = "WF_MONGO_DB", default_value = "wyffle", global = true)]
    mongo_db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grant the admin claim, only if no administrator exists yet
    Bootstrap { uid: String },

    /// Grant the admin claim
    SetAdmin { uid: String },

    /// Revoke the admin claim
    RemoveAdmin { uid: String },

    /// Show an identity's custom claims
    CheckAdmin { uid: String },

    /// Delete one batch of expired rejected applications
    PurgeRejected,

    /// Mint an identity token signed with WF_AUTH_SECRET
    Token {
        uid: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        admin: bool,
        /// Lifetime in hours
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(false);

    let cli = Cli::parse();

    // The driver connects lazily, so `token` works without a reachable database
    let client = mongodb::Client::with_uri_str(&cli.mongo_url).await?;
    let db = client.database(&cli.mongo_db);
    let store = Arc::new(MongoStore::new(client, &db));
    let claims = ClaimService::new(store.clone(), store.clone(), store.clone());

    match cli.command {
        Command::Bootstrap { uid } => {
            if claims.bootstrap_admin(&uid).await? {
                println!("Granted admin claim to {}", uid);
            } else {
                println!("An administrator already exists, nothing changed");
            }
        }
        Command::SetAdmin { uid } => {
            claims.write_claim(&uid, true, "wf-admin").await?;
            println!("Admin claim set for user {}", uid);
        }
        Command::RemoveAdmin { uid } => {
            claims.write_claim(&uid, false, "wf-admin").await?;
            println!("Admin claim removed for user {}", uid);
        }
        Command::CheckAdmin { uid } => {
            let view = claims.lookup(&uid).await?;
            println!(
                "uid={} email={} admin={}",
                view.uid,
                view.email.as_deref().unwrap_or("-"),
                view.custom_claims.admin
            );
        }
        Command::PurgeRejected => {
            let retention = RetentionService::new(store, RetentionConfig::from_env());
            let deleted = retention.purge_rejected(chrono::Utc::now()).await?;
            info!(deleted, "Purge finished");
            println!("Deleted {} rejected application(s)", deleted);
        }
        Command::Token { uid, email, admin, ttl_hours } => {
            let auth = AuthService::new(&AuthConfig::from_env()?)?;
            let token = auth.issue_token(&uid, email.as_deref(), admin, chrono::Duration::hours(ttl_hours))?;
            println!("{}", token);
        }
    }

    Ok(())
}
