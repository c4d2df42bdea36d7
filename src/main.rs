use anyhow::Context;
use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use like_counter::audit::AuditLog;
use like_counter::catalog::RemoteCatalog;
use like_counter::clock::{Clock, SystemClock};
use like_counter::config::Args;
use like_counter::handlers::router;
use like_counter::service::{LikeService, ServiceParts};
use like_counter::state::AppState;
use like_counter::store::JsonFileStore;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true);
    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    init_tracing();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (audit, _audit_writer) = AuditLog::spawn(args.log_file.clone());

    let store = Arc::new(JsonFileStore::new(args.data_file.clone(), clock.clone()));
    let catalog = Arc::new(RemoteCatalog::new(
        reqwest::Client::new(),
        args.catalog_config(),
        audit.clone(),
    ));

    let service = LikeService::new(ServiceParts {
        store,
        catalog,
        clock,
        audit,
        policy: args.rate_limit_policy(),
        hash_algorithm: args.hash_algorithm,
    });

    let state = Arc::new(AppState {
        service,
        trust_proxy_headers: args.trust_proxy_headers,
    });

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(%addr, "like counter listening");
    info!(data_file = %args.data_file.display(), log_file = %args.log_file.display(), "storage");
    info!(
        interval_secs = args.rate_limit,
        max_per_ip = args.max_likes_per_ip,
        "rate limit"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
