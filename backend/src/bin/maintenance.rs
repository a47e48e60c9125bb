use std::{env, sync::Arc};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use onboarding::{
    auth::jwt::JwtService,
    config::AppConfig,
    db,
    events::TracingEventSink,
    outbox,
    store::PgStore,
    LifecycleCoordinator,
};

const USAGE: &str = "Usage: maintenance <admin-token <subject> | expired-invitations | outbox>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("admin-token") => {
            let subject = args.next().context(USAGE)?;
            admin_token(&subject)?
        }
        Some("expired-invitations") => expired_invitations().await?,
        Some("outbox") => queued_outbox().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn admin_token(subject: &str) -> Result<()> {
    let config = AppConfig::from_env()?;
    let jwt = JwtService::from_config(&config)?;
    let token = jwt.generate_admin_token(subject)?;
    tracing::info!(
        component = "maintenance",
        subject,
        expiry_minutes = config.admin_token_expiry_minutes,
        "minted admin token"
    );
    println!("{token}");
    Ok(())
}

async fn expired_invitations() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    let pool = db::init_pool(&config.database_url)?;
    let store = Arc::new(PgStore::new(pool, config.store_timeout()));
    let jwt = JwtService::from_config(&config)?;
    let coordinator = LifecycleCoordinator::new(
        store,
        jwt,
        Arc::new(TracingEventSink),
        config.invitation_ttl(),
    );

    let lapsed = coordinator.expired_invitations().await?;
    if lapsed.is_empty() {
        println!("No expired invitations.");
        return Ok(());
    }

    println!("{} expired invitation(s):", lapsed.len());
    for record in &lapsed {
        let expired_at = record
            .token_expires_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        println!("{}\t{}\texpired {}", record.id, record.email, expired_at);
    }
    Ok(())
}

async fn queued_outbox() -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool(&config.database_url)?;
    let entries = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut conn = pool.get().context("failed to get database connection")?;
        Ok(outbox::queued_events(&mut conn, 100)?)
    })
    .await
    .context("outbox task panicked")??;

    if entries.is_empty() {
        println!("Outbox is empty.");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}\t{}\t{}",
            entry.id,
            entry.event_type,
            entry.created_at.to_rfc3339()
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
