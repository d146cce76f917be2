use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use liquidity_rail::{
    config::{Config, LoggingConfig},
    handlers,
    rates::RateEngine,
    security_middleware::ApiKeyAuth,
    services::QuoteService,
    store::{InMemoryQuoteStore, InMemoryTransactionStore},
    webhook::WebhookNotifier,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    init_tracing(&config.logging);

    info!(
        "Starting Liquidity Rail Provider on {}:{}",
        config.server.host, config.server.port
    );

    let quote_service = Arc::new(QuoteService::new(
        Arc::new(InMemoryQuoteStore::new()),
        Arc::new(InMemoryTransactionStore::new()),
        RateEngine::new(&config.rates),
        config.quote.clone(),
    ));

    let notifier = if config.webhook.is_configured() {
        info!("Webhook delivery enabled for {}", config.webhook.webhook_url);
        Some(Arc::new(
            WebhookNotifier::new(config.webhook.clone()).context("Failed to create webhook notifier")?,
        ))
    } else {
        warn!("MUDA_WEBHOOK_URL / MUDA_AUTH_URL not set, webhook delivery disabled");
        None
    };

    if !config.auth.is_enforced() {
        warn!("No API credentials configured, x-api-key / x-api-secret are not enforced");
    }

    let auth_config = config.auth.clone();
    let server_config = config.server.clone();

    HttpServer::new(move || {
        let cors = Cors::permissive();

        let mut app = App::new().app_data(web::Data::new(quote_service.clone()));
        if let Some(notifier) = &notifier {
            app = app.app_data(web::Data::new(notifier.clone()));
        }

        app.wrap(ApiKeyAuth::new(auth_config.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
            .default_service(web::to(handlers::not_found))
    })
    .workers(server_config.workers)
    .bind((server_config.host.as_str(), server_config.port))?
    .run()
    .await?;

    Ok(())
}
