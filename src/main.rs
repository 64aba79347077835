use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradecalc::config::{Config, MonitorMode};
use tradecalc::services::{
    FeedConfig, FileKvStore, LogNotifier, ParameterStore, PriceFeed, QuoteGateway, QuoteStore,
    TradeSession,
};
use tradecalc::sources::FinnhubClient;
use tradecalc::{app, AppState, MonitorState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradecalc=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting TradeCalc server on {}:{}", config.host, config.port);

    // Quote gateway over Finnhub
    let store = Arc::new(QuoteStore::new(
        config.cache_ttl(),
        config.rate_limit_window(),
        config.rate_limit_max_requests,
    ));
    let source = Arc::new(FinnhubClient::with_base_url(config.finnhub_base_url.clone()));
    let gateway = Arc::new(QuoteGateway::new(source, store).with_timeout(config.upstream_timeout()));

    let monitor = start_monitor(&config, gateway.clone()).await;

    let state = AppState {
        config: config.clone(),
        gateway,
        monitor,
    };

    let app = app(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("TradeCalc server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Start the built-in trade session, if configured.
async fn start_monitor(config: &Config, gateway: Arc<QuoteGateway>) -> Option<MonitorState> {
    let monitor = &config.monitor;

    let params_store = monitor
        .params_file
        .as_ref()
        .map(|path| Arc::new(ParameterStore::new(FileKvStore::open(path))));
    let params = params_store
        .as_ref()
        .map(|store| store.load())
        .unwrap_or_default();

    let feed_config = match monitor.mode {
        MonitorMode::Off => {
            info!("Trade monitor disabled");
            return None;
        }
        MonitorMode::Demo => FeedConfig::simulated(monitor.base_price),
        MonitorMode::Live => {
            let Some(api_key) = config.finnhub_api_key.clone() else {
                warn!("MONITOR_MODE=live requires FINNHUB_API_KEY; trade monitor disabled");
                return None;
            };
            FeedConfig::live(monitor.symbol.clone(), api_key, gateway)
        }
    }
    .with_tick_interval(monitor.tick_interval())
    .with_history_limit(monitor.history_limit);

    let feed = Arc::new(PriceFeed::new());
    let session = TradeSession::new(params, Arc::new(LogNotifier));
    session.attach(&feed);

    if let Err(e) = feed.start(feed_config).await {
        // The session stays reachable so the error shows up in the feed status.
        error!("Price feed failed to start: {}", e);
    }

    Some(MonitorState {
        feed,
        session,
        params: params_store,
    })
}
