use actix::prelude::*;
use anyhow::Context as AnyhowContext;
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest_middleware::ClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use syncdb::{
    admin,
    engine::{SyncEngine, SyncOptions, SyncOutcome},
    poller::ChangePoller,
    queue,
    settings::{Settings, DEFAULT_IDLE_DELAY},
    storage::Storage,
    worker::{PollScheduler, QueueWorker},
    RateLimiter,
};
use syncdb_client::{ClientOptions, HttpCatalogClient};
use syncdb_types::catalog::CatalogClient;
use syncdb_types::job::JobQueue;
use tokio::signal;
use tokio_util::sync::CancellationToken;

static DEFAULT_ACCEPT_ENCODING: &str = "br;q=1.0, gzip;q=0.6, deflate;q=0.4, *;q=0.2";

#[derive(Parser, Debug)]
#[command(name = "syncdb", version, about = "SyncDB product catalog synchronization")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Synchronize a single SyncDB product immediately
    Sync {
        /// SyncDB product id
        product_id: String,
    },
    /// Queue every SyncDB product for synchronization
    EnqueueAll {
        /// Delete all local products, variations and price list items first
        #[arg(long, default_value_t = false)]
        delete_existing: bool,
    },
    /// Queue products modified since the last poll
    Poll,
    /// Delete all local products, variations and price list items
    DeleteAll,
    /// Publish variations whose SyncDB record is visible
    PublishAll,
    /// Run the queue worker and the poll scheduler until interrupted
    Work {
        /// Process the due jobs and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Create a price list used by price reconciliation
    SeedPriceList { name: String },
    /// Create a format attribute value
    SeedFormat { code: String },
}

#[actix::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => (),
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let storage = Storage::open(&settings.storage_path)
        .await
        .with_context(|| format!("Unable to open storage at {}", settings.storage_path))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept-Encoding",
        HeaderValue::from_static(DEFAULT_ACCEPT_ENCODING),
    );
    let client = reqwest::ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .use_rustls_tls()
        .default_headers(headers)
        .build()?;
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
    let client = ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(reqwest_ratelimit::all(RateLimiter::new(
            settings.requests_per_minute,
        )))
        .build();
    let client: Arc<dyn CatalogClient> = Arc::new(HttpCatalogClient::new(
        client,
        ClientOptions::new(
            &settings.api_url,
            settings.api_key.clone(),
            settings.log_api_calls,
        )?,
    ));

    let engine = Arc::new(SyncEngine::new(
        client.clone(),
        &storage,
        SyncOptions {
            log_level: settings.log_level,
            unresolved_price_list: settings.unresolved_price_list,
        },
    ));
    let poller = ChangePoller::new(
        client.clone(),
        storage.watermark.clone(),
        settings.log_level,
    );

    match cli.command {
        Commands::Sync { product_id } => match engine.sync_one(&product_id).await? {
            SyncOutcome::Saved => log::info!("Synchronized SyncDB product {product_id}"),
            SyncOutcome::Skipped(reason) => {
                log::warn!("Unable to import product with SyncDB ID {product_id}: {reason}")
            }
        },
        Commands::EnqueueAll { delete_existing } => {
            admin::enqueue_all(&storage, &engine, &poller, delete_existing).await?;
        }
        Commands::Poll => {
            let count = admin::poll_and_enqueue(&poller, storage.jobs.as_ref()).await?;
            log::info!("Queued {count} modified SyncDB products");
        }
        Commands::DeleteAll => admin::delete_all(&storage, &engine).await?,
        Commands::PublishAll => {
            admin::publish_all(&storage, client.as_ref(), settings.log_level).await?;
        }
        Commands::Work { once: true } => {
            storage.jobs.requeue_interrupted().await?;
            let processed = queue::drain(storage.jobs.as_ref(), &engine, settings.retry).await?;
            log::info!("Processed {processed} jobs");
        }
        Commands::Work { once: false } => {
            let token = CancellationToken::new();
            let worker = QueueWorker::new(
                storage.jobs.clone(),
                engine.clone(),
                settings.retry,
                DEFAULT_IDLE_DELAY,
                token.clone(),
            )
            .start();
            let _scheduler = PollScheduler::new(
                poller.clone(),
                storage.jobs.clone(),
                settings.poll_interval,
                token.clone(),
                Some(worker),
            )
            .start();
            match signal::ctrl_c().await {
                Ok(_) => log::info!("Shutting down"),
                Err(err) => log::error!("Unable to listen to shutdown: {err}"),
            }
            token.cancel();
            System::current().stop();
        }
        Commands::SeedPriceList { name } => {
            if admin::seed_price_list(&storage, &name).await? {
                log::info!("Created price list {name}");
            }
        }
        Commands::SeedFormat { code } => {
            if admin::seed_format(&storage, &code).await? {
                log::info!("Created format {code}");
            }
        }
    }
    Ok(())
}
