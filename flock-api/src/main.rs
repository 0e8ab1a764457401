use flock_common::{snowflake::NodeId, util::PositiveDuration};
use flock_db::{Backend, DbClient, DbError, MemoryClient};
use serde::Deserialize;
use server::{ServerState, SessionTtl};
use sqlx::postgres::PgPoolOptions;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;
mod service;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("SESSION_TTL_HOURS is {0}, at most {MAX_SESSION_TTL_HOURS} are allowed")]
    SessionTtl(u32),
    #[error("Error connecting to the database: {0}")]
    DbConnect(sqlx::Error),
    #[error("Error migrating the database: {0}")]
    DbMigrate(DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_database_max_connections() -> u32 {
    5
}

/// Ten years.
const MAX_SESSION_TTL_HOURS: u32 = 24 * 365 * 10;

fn default_session_ttl_hours() -> u32 {
    24
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    /// `0` keeps sessions open until logout.
    #[serde(default = "default_session_ttl_hours")]
    session_ttl_hours: u32,
    #[serde(default)]
    node_id: NodeId,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "flock_api=debug,\
                flock_common=debug,\
                flock_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

fn session_ttl(env: &Env) -> Result<SessionTtl, InitError> {
    if env.session_ttl_hours > MAX_SESSION_TTL_HOURS {
        return Err(InitError::SessionTtl(env.session_ttl_hours));
    }

    Ok(SessionTtl(PositiveDuration::from_hours(env.session_ttl_hours)))
}

async fn connect_store(env: &Env) -> Result<Backend, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping all data in memory");
        return Ok(MemoryClient::new(env.node_id).into());
    };

    let pool = PgPoolOptions::new()
        .max_connections(env.database_max_connections)
        .connect(database_url)
        .await
        .map_err(InitError::DbConnect)?;
    let client = DbClient::new(pool, env.node_id);
    client.migrate().await.map_err(InitError::DbMigrate)?;
    info!("Connected to database and applied migrations");

    Ok(client.into())
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "Could not listen for ctrl-c");
            return;
        }
        info!("Shutting down");
        cancel.cancel();
    });

    token
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    let session_ttl = session_ttl(&env)?;

    let state = ServerState {
        store: Arc::new(connect_store(&env).await?),
        session_ttl,
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().with_state(state).layer(tracing_layer);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = shutdown_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
