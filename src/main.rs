use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crawldeck::api::forms::CredentialsForm;
use crawldeck::auth::{MemoryRevocationStore, RedisRevocationStore, RevocationStore};
use crawldeck::directory::{MemoryDirectory, PgDirectory, UserDirectory};
use crawldeck::{api, config, jobs, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OTLP export only when an endpoint is configured; stdout logging otherwise.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "crawldeck"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "crawldeck=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { host, port }) => run_server(cfg, host, port).await,
        Some(cli::Commands::User { command }) => {
            let url = cfg
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set to manage users")?;
            let db = PgDirectory::connect(url).await?;
            db.migrate().await?;
            handle_user_command(&db, command).await
        }
        None => run_server(cfg, None, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(mut cfg: config::Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        cfg.host = host;
    }
    if let Some(port) = port {
        cfg.port = port;
    }

    let directory: Arc<dyn UserDirectory> = match cfg.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db = PgDirectory::connect(url).await?;
            tracing::info!("Running migrations...");
            db.migrate().await?;
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory user directory");
            Arc::new(MemoryDirectory::new())
        }
    };

    let revocations: Arc<dyn RevocationStore> = match cfg.redis_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to Redis for token revocation...");
            Arc::new(RedisRevocationStore::connect(url).await?)
        }
        None => Arc::new(MemoryRevocationStore::new()),
    };

    let sweep_every = Duration::from_secs(cfg.revocation_sweep_secs);
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cfg.host, cfg.port))?;
    let dashboard_origin = cfg.dashboard_origin.clone();

    let state = Arc::new(AppState::new(cfg, directory, revocations.clone())?);

    let app = api::router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(dashboard_origin))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    jobs::revocation_sweep::spawn(revocations, sweep_every);
    tracing::info!("Revocation sweep started (every {:?})", sweep_every);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("crawldeck listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM (container stop).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
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
    tracing::info!("shutdown signal received, draining connections");
}

fn cors_layer(dashboard_origin: String) -> CorsLayer {
    use axum::http::{header, Method};
    use tower_http::cors::AllowOrigin;

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == dashboard_origin
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers on every response. Token responses must not be cached.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");
    resp
}

async fn handle_user_command(db: &PgDirectory, cmd: cli::UserCommands) -> anyhow::Result<()> {
    match cmd {
        cli::UserCommands::Add {
            username,
            password,
            scope,
        } => {
            let creds = CredentialsForm {
                username: Some(username),
                password: Some(password),
            }
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

            let user = db.register(&creds.username, &creds.password, &scope).await?;
            println!(
                "User created:\n  ID:       {}\n  Username: {}\n  Scope:    {}",
                user.id, user.username, user.scope
            );
        }
        cli::UserCommands::List => {
            let users = db.list().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<8} {:<32} {:<10} {:<8}", "ID", "USERNAME", "SCOPE", "ACTIVE");
                for u in users {
                    println!("{:<8} {:<32} {:<10} {:<8}", u.id, u.username, u.scope, u.is_active);
                }
            }
        }
        cli::UserCommands::Deactivate { username } => {
            db.set_active(&username, false).await?;
            println!("User {} deactivated. Outstanding tokens are rejected on next use.", username);
        }
        cli::UserCommands::Activate { username } => {
            db.set_active(&username, true).await?;
            println!("User {} activated.", username);
        }
    }
    Ok(())
}
