use std::{net::SocketAddr, sync::Arc};

use baton::{
    jwa::{Algorithm, SigningKey},
    store::{InMemorySessionStore, RedisSessionStore, SessionStore},
    Email, Password, Principal, StaticPrincipalResolver, TokenConfig, TokenLifetimes,
    TokenService,
};
use baton_axum::{AuthState, RefreshCookie};
use baton_clock::DurationSecs;
use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

#[derive(Debug, Parser)]
#[command(about = "Issues and rotates tokens over HTTP")]
struct Opts {
    /// The deployment environment
    #[arg(long, env, value_enum, default_value = "development")]
    environment: Environment,

    /// The port to listen on
    #[arg(short, long, env, default_value_t = 8080)]
    port: u16,

    /// Redis URL for refresh sessions; sessions are kept in memory if unset
    #[arg(long, env)]
    redis_database_url: Option<String>,

    /// Shared secret used to sign access tokens
    #[arg(long, env, hide_env_values = true)]
    hmac_key: Option<String>,

    /// Lifetime of access tokens
    #[arg(long, env, default_value = "15m")]
    access_token_ttl: DurationSecs,

    /// Lifetime of refresh sessions
    #[arg(long, env, default_value = "24h")]
    refresh_token_ttl: DurationSecs,

    /// Email of the demonstration account
    #[arg(long, env, default_value = "test@example.com")]
    demo_email: Email,

    /// Password of the demonstration account
    #[arg(long, env, hide_env_values = true, default_value = "password")]
    demo_password: Password,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    if let Ok(environment) = std::env::var("ENVIRONMENT") {
        dotenvy::from_filename(format!(".env.{environment}")).ok();
    }
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let key = match opts.hmac_key {
        Some(key) => SigningKey::new(key.into_bytes()),
        None if opts.environment == Environment::Development => {
            tracing::warn!("HMAC_KEY not set; generating an ephemeral signing key");
            SigningKey::generate(Algorithm::HS256)?
        }
        None => color_eyre::eyre::bail!("HMAC_KEY is required outside development"),
    };

    let store: Arc<dyn SessionStore> = match opts.redis_database_url {
        Some(url) => Arc::new(RedisSessionStore::connect(&url).await?),
        None => {
            tracing::warn!("REDIS_DATABASE_URL not set; refresh sessions are kept in memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let resolver = StaticPrincipalResolver::new().with_account(
        opts.demo_email,
        opts.demo_password,
        Principal::new("1", "admin"),
    );

    let config = TokenConfig::new(key).with_lifetimes(TokenLifetimes {
        access: opts.access_token_ttl,
        refresh: opts.refresh_token_ttl,
    });
    let service = TokenService::new(&config, store, Arc::new(resolver));

    let cookie = if opts.environment == Environment::Development {
        RefreshCookie::default().insecure()
    } else {
        RefreshCookie::default()
    };

    let app = baton_axum::router(AuthState::new(Arc::new(service), cookie));

    let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?opts.environment, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "unable to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
