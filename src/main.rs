use std::sync::Arc;

use axum::{ routing::{ delete, get, post }, Router };
use migration::MigratorTrait;
use smart_send::{ Config, Result };
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smart_send=debug,tower_http=info".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| smart_send::AppError::Config(e.to_string()))?;

    tracing::info!(
        chains = config.chain_configs.len(),
        "starting smart-send scheduler"
    );

    let db = sea_orm::Database::connect(&config.database_url).await
        .map_err(smart_send::AppError::Database)?;
    tracing::info!("database connected");

    migration::Migrator::up(&db, None).await.map_err(smart_send::AppError::Database)?;
    tracing::info!("migrations applied");

    let vault = Arc::new(smart_send::crypto::CredentialVault::new(&config.encryption_key)?);

    let schedules: Arc<dyn smart_send::db::ScheduleStore> = Arc::new(
        smart_send::db::ScheduleRepository::new(db.clone())
    );
    let rules: Arc<dyn smart_send::db::RuleStore> = Arc::new(
        smart_send::db::RuleRepository::new(db.clone())
    );
    let ledger: Arc<dyn smart_send::db::SavingsLedger> = Arc::new(
        smart_send::db::SavingsRepository::new(db)
    );

    let fees: Arc<dyn smart_send::fees::FeeQuoter> = Arc::new(
        smart_send::fees::FeeOracle::new(&config)
    );
    let prices = Arc::new(smart_send::services::PriceService::new());
    let router: Arc<dyn smart_send::chains::DispatchRoute> = Arc::new(
        smart_send::chains::ChainRouter::new(&config)
    );

    let notifier = config.notify_webhook_url
        .clone()
        .map(|url| {
            Arc::new(smart_send::services::WebhookNotifier::new(url)) as Arc<
                dyn smart_send::services::Notifier
            >
        });

    let savings = Arc::new(smart_send::services::SavingsService::new(ledger));
    let comparison = Arc::new(
        smart_send::services::ComparisonService::new(fees.clone(), prices.clone())
    );
    let recurrence = Arc::new(
        smart_send::services::RecurrenceGenerator::new(
            rules.clone(),
            schedules.clone(),
            fees.clone(),
            prices.clone()
        )
    );
    let executor = Arc::new(
        smart_send::executor::TickExecutor::new(
            schedules.clone(),
            savings.clone(),
            fees.clone(),
            prices.clone(),
            router,
            vault.clone(),
            notifier,
            config.scheduler.clone()
        )
    );

    let app_state = smart_send::api::AppState {
        executor,
        recurrence,
        comparison,
        savings,
        schedules,
        rules,
        vault,
        fees,
        prices,
        cron_secret: Arc::new(config.cron_secret.clone()),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/cron/execute", get(smart_send::api::cron::execute))
        .route("/api/smart-send/compare", get(smart_send::api::smart_send::compare))
        .route(
            "/api/smart-send/schedule",
            get(smart_send::api::smart_send::list_schedules).post(
                smart_send::api::smart_send::create_schedule
            )
        )
        .route(
            "/api/smart-send/schedule/{id}",
            delete(smart_send::api::smart_send::cancel_schedule)
        )
        .route(
            "/api/smart-send/schedule/{id}/auth",
            post(smart_send::api::smart_send::attach_auth)
        )
        .route(
            "/api/smart-send/recurring",
            get(smart_send::api::smart_send::list_recurring).post(
                smart_send::api::smart_send::create_recurring
            )
        )
        .route(
            "/api/smart-send/recurring/{id}",
            delete(smart_send::api::smart_send::cancel_recurring)
        )
        .route("/api/smart-send/savings", get(smart_send::api::smart_send::savings))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await
        .map_err(|e| smart_send::AppError::Internal(e.to_string()))?;

    axum::serve(listener, app).await.map_err(|e| smart_send::AppError::Internal(e.to_string()))?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
