//! # bridge-worker
//!
//! Assembles the content pipeline from the adapters selected by compile-time
//! features and configuration, then runs it until Ctrl-C.
//!
//! Without a database URL (or without `db-postgres`) the worker runs on the
//! in-memory store; without a Redis URL (or without `redis`) it uses the
//! in-process broker and job lock, which is only safe for a single instance.

use std::sync::Arc;
use std::time::Duration;

use analysis_adapters::{ClientOptions, HttpModerationAnalyzer, HttpTagExtractor, OllamaEmbeddingGenerator};
use api_adapters::ConnectionHub;
use configs::{AnalysisSettings, LogFormat, Settings};
use domains::{
    ContentStore, DomainEventSink, JobLock, MessageBroker, MessageHandler, NotificationStore, ProfileStore, Stage,
};
use prometheus_client::registry::Registry;
use secrecy::{ExposeSecret, SecretString};
use services::{
    notification_channel, stage_scan_jobs, ConsumerGroup, ContentScanner, DeliveryWorker, EmbeddingConsumer,
    ModerationConsumer, NotificationFacade, NotificationRetentionJob, PipelineMetrics, RetryPolicy, Scheduler,
    TaggingConsumer, UserInterestConsumer, UserInterestScanJob, VisibilityFinalizer,
};
use storage_adapters::{InMemoryBroker, InMemoryJobLock, InMemoryStore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// One backing store seen through each port it serves.
struct Stores {
    content: Arc<dyn ContentStore>,
    profiles: Arc<dyn ProfileStore>,
    notifications: Arc<dyn NotificationStore>,
}

impl Stores {
    fn shared<S>(store: Arc<S>) -> Self
    where
        S: ContentStore + ProfileStore + NotificationStore + 'static,
    {
        Self { content: store.clone(), profiles: store.clone(), notifications: store }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration, then logging in the configured format
    let settings = Settings::load()?;
    init_tracing(settings.telemetry.log_format);
    info!("bridge-worker starting");

    // 2. Storage
    let stores = connect_stores(&settings).await?;

    // 3. Broker and scheduler lock
    let (broker, lock) = connect_broker(&settings)?;

    // 4. Analysis collaborators
    let analyzer = Arc::new(HttpModerationAnalyzer::new(
        settings.analysis.moderation_url.clone(),
        client_options("moderation", &settings.analysis),
    )?);
    let extractor = Arc::new(HttpTagExtractor::new(
        settings.analysis.tagging_url.clone(),
        client_options("tagging", &settings.analysis),
    )?);
    let generator = Arc::new(OllamaEmbeddingGenerator::new(
        &settings.embedding.endpoint,
        settings.embedding.model.clone(),
        client_options("embedding", &settings.analysis),
    )?);

    // 5. Metrics
    let metrics = PipelineMetrics::new();
    let mut registry = Registry::default();
    metrics.register(&mut registry);
    let registry = Arc::new(registry);

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    // 6. Notifications: facade -> channel -> delivery worker -> hub
    let hub = Arc::new(ConnectionHub::new());
    let (sender, receiver) = notification_channel();
    let events: Arc<dyn DomainEventSink> = Arc::new(NotificationFacade::new(sender));
    let delivery = DeliveryWorker::new(receiver, stores.notifications.clone(), hub.clone(), metrics.clone());
    tasks.spawn(delivery.run(cancel.clone()));

    // 7. Consumer groups, one per topic
    let handlers: Vec<Arc<dyn MessageHandler>> = vec![
        Arc::new(ModerationConsumer::new(
            stores.content.clone(),
            analyzer,
            events.clone(),
            settings.moderation,
        )),
        Arc::new(TaggingConsumer::new(stores.content.clone(), extractor)),
        Arc::new(EmbeddingConsumer::new(
            stores.content.clone(),
            stores.profiles.clone(),
            generator.clone(),
            events.clone(),
            settings.embedding.dimensions,
            settings.notifications.job_match_max_distance,
        )),
        Arc::new(UserInterestConsumer::new(stores.profiles.clone(), generator, settings.embedding.dimensions)),
    ];
    let retry = RetryPolicy { retries: settings.broker.retry_count, interval: settings.broker.retry_interval() };
    for handler in handlers {
        let group = ConsumerGroup::new(broker.clone(), handler, settings.broker.concurrency, retry, metrics.clone());
        tasks.spawn(group.run(cancel.clone()));
    }

    // 8. Periodic jobs
    let schedule = &settings.scheduler;
    let scanner = Arc::new(ContentScanner::new(
        stores.content.clone(),
        broker.clone(),
        schedule.scan_concurrency,
        metrics.clone(),
    ));
    let mut scheduler = Scheduler::new(lock, schedule.start_delay(), cancel.clone());
    for job in stage_scan_jobs(
        &scanner,
        [
            (Stage::Moderation, secs(schedule.moderation_scan_secs)),
            (Stage::Tagging, secs(schedule.tagging_scan_secs)),
            (Stage::Embedding, secs(schedule.embedding_scan_secs)),
        ],
    ) {
        scheduler.spawn(job);
    }
    scheduler.spawn(Arc::new(UserInterestScanJob::new(
        secs(schedule.user_interest_scan_secs),
        stores.profiles.clone(),
        scanner,
    )));
    scheduler.spawn(Arc::new(VisibilityFinalizer::new(
        stores.content.clone(),
        secs(schedule.finalizer_secs),
        metrics.clone(),
    )));
    scheduler.spawn(Arc::new(NotificationRetentionJob::new(
        stores.notifications.clone(),
        secs(schedule.notification_retention_secs),
        settings.notifications.retention_days,
    )));
    info!(jobs = scheduler.len(), "scheduler started");
    tasks.spawn(scheduler.join());

    // 9. HTTP surface
    #[cfg(feature = "web-axum")]
    {
        let listener = tokio::net::TcpListener::bind(settings.server.bind).await?;
        let state = api_adapters::web::AppState { hub, registry, shutdown: cancel.clone() };
        tasks.spawn(async move {
            if let Err(err) = api_adapters::web::serve(listener, state).await {
                error!(error = %err, "http server failed");
            }
        });
    }
    #[cfg(not(feature = "web-axum"))]
    drop((hub, registry));

    // 10. Run until Ctrl-C, then let every task drain
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    cancel.cancel();
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            error!(error = %err, "task panicked during shutdown");
        }
    }
    info!("bridge-worker stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

fn client_options(name: &'static str, analysis: &AnalysisSettings) -> ClientOptions {
    ClientOptions {
        name,
        api_key: analysis.api_key.as_ref().map(|key| SecretString::from(key.expose_secret().to_owned())),
        requests_per_minute: analysis.requests_per_minute,
        timeout: Duration::from_secs(analysis.timeout_secs),
    }
}

async fn connect_stores(settings: &Settings) -> anyhow::Result<Stores> {
    #[cfg(feature = "db-postgres")]
    if let Some(url) = &settings.database.url {
        let store = storage_adapters::postgres::PostgresStore::connect(
            url.expose_secret(),
            settings.database.max_connections,
        )
        .await?;
        info!("using postgres store");
        return Ok(Stores::shared(Arc::new(store)));
    }

    if settings.database.url.is_some() {
        warn!("database url set but db-postgres is not compiled in");
    }
    warn!("no database configured, content lives in memory only");
    Ok(Stores::shared(Arc::new(InMemoryStore::new())))
}

fn connect_broker(settings: &Settings) -> anyhow::Result<(Arc<dyn MessageBroker>, Arc<dyn JobLock>)> {
    #[cfg(feature = "redis")]
    if let Some(url) = &settings.redis.url {
        let pool = storage_adapters::redis::create_pool(url.expose_secret())?;
        info!("using redis broker and job lock");
        return Ok((
            Arc::new(storage_adapters::redis::RedisBroker::new(pool.clone())),
            Arc::new(storage_adapters::redis::RedisJobLock::new(pool)),
        ));
    }

    if settings.redis.url.is_some() {
        warn!("redis url set but the redis feature is not compiled in");
    }
    warn!("no redis configured, using the in-process broker (single instance only)");
    Ok((Arc::new(InMemoryBroker::new()), Arc::new(InMemoryJobLock::new())))
}
