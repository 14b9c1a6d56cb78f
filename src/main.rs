//! Quake monitor backend: binary entrypoint.
//! Boots the Axum HTTP server on Shuttle, wiring config, cache, and routes.

use quake_monitor::{build_state, config::AppConfig, metrics::Metrics, router};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Local log output. Shuttle installs its own subscriber in deployed
/// environments, so this only activates when `QUAKE_DEV_LOG=1`.
/// `LOG_FORMAT=json` switches to JSON lines.
fn enable_dev_tracing() {
    let dev_flag = std::env::var("QUAKE_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");
    if !dev_flag {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quake_monitor=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = result {
        eprintln!("dev tracing not installed: {e}");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let cfg = AppConfig::from_env()?;
    let state = build_state(&cfg).await?;

    let mut app = router(state);
    match Metrics::init() {
        Ok(metrics) => app = app.merge(metrics.router()),
        Err(e) => tracing::warn!(error = %e, "prometheus recorder not installed; /metrics disabled"),
    }

    Ok(app.into())
}
