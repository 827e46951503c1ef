//! Clients server - Entry point.

use clients_server::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    config::{Config, LogConfig},
    Stores,
};
use mailer_client::MailerClient;
use registration_saga::{LogNotifier, Notifier, RegionDirectory, Registrar, RegistrationPolicy};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);

    if log.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log);

    info!("Starting clients server");

    let stores = match Stores::from_config(&config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize stores: {:#}", e);
            std::process::exit(1);
        }
    };

    // Regions are read once; a restart picks up changes.
    let regions = match RegionDirectory::load(stores.master.as_ref()).await {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to load regions: {}", e);
            std::process::exit(1);
        }
    };
    if regions.is_empty() {
        warn!("No regions configured, every registration will be rejected");
    }

    let notifier: Arc<dyn Notifier> = if config.mailer.enabled {
        match MailerClient::new(&config.mailer.url, config.mailer.timeout) {
            Ok(c) => {
                if !c.health_check().await {
                    warn!(url = %config.mailer.url, "Mail service not reachable at startup");
                }
                Arc::new(c)
            }
            Err(e) => {
                error!("Failed to create mail client: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("Mail service disabled, welcome emails are only logged");
        Arc::new(LogNotifier)
    };

    let registrar = Registrar::new(
        stores.master,
        stores.factory,
        Arc::new(regions),
        notifier,
        RegistrationPolicy::from(&config.registration),
    );

    let state = AppState::new(Arc::new(registrar), config.auth.api_key.expose_secret());
    let rate_limit = RateLimitState::new(config.rate_limit.per_minute);
    let app = create_router_with_rate_limit(state, rate_limit);

    // Bind to address
    let addr = SocketAddr::new(
        config.server.listen_addr.parse().unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
