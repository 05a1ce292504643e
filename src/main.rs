use std::process::ExitCode;
use std::sync::Arc;

use bot::CommandDispatcher;
use cache::{Cache, RedisCache};
use config::MonitorConfig;
use monitor::{DurableSink, EventWatcher, NotificationGate, StatusQueryService};
use notify::TelegramBot;
use runtime::{ContainerRuntime, DockerRuntime};
use store::writer::CHANNEL_CAPACITY;
use store::{DeltaEventStore, EventStore, EventWriter};

mod bot;
mod cache;
mod cli;
mod config;
mod monitor;
mod notify;
mod runtime;
mod signals;
mod store;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenv::dotenv();
    // Initialize the logger
    env_logger::init();

    // Both deltalake and reqwest bring rustls, pin the provider once.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let args = cli::get_cli_args();
    let config = match MonitorConfig::try_init(&args.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Unable to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let docker = match DockerRuntime::connect() {
        Ok(docker) => docker,
        Err(e) => {
            log::error!("Unable to connect to Docker: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = docker.ping().await {
        // The watcher keeps retrying, so this is not fatal.
        log::warn!("Docker daemon is not responding yet: {e}");
    }
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);

    // Optional backends that fail their probe stay disabled for the
    // lifetime of the process.
    let store: Option<Arc<dyn EventStore>> = match &config.table_uri {
        Some(uri) => match DeltaEventStore::connect(uri).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                log::warn!("Event store unavailable, events will not be persisted: {e}");
                None
            }
        },
        None => None,
    };
    let cache: Option<Arc<dyn Cache>> = match &config.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                log::warn!("Cache unavailable, counters and status caching disabled: {e}");
                None
            }
        },
        None => None,
    };

    let (sink, writer) = match store {
        Some(store) => {
            let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
            let writer = EventWriter::new(store, rx, config.buffer_size)
                .with_flush_interval(config.flush_interval);
            (DurableSink::new(tx), Some(tokio::spawn(writer.run())))
        }
        None => (DurableSink::disabled(), None),
    };

    let bot = Arc::new(TelegramBot::new(&config.telegram_token));

    let gate = NotificationGate::new(bot.clone(), config.chat_id, cache.clone())
        .with_suppression(config.suppress_window);
    let watcher = EventWatcher::new(runtime.clone(), sink, gate)
        .with_backoff(config.reconnect_backoff);
    let watcher = tokio::spawn(watcher.run());

    let shutdown = match signals::handle_shutdown() {
        Ok(stop) => Some(stop),
        Err(e) => {
            log::warn!("Unable to install signal handlers: {e}");
            None
        }
    };

    let status = StatusQueryService::new(runtime, cache);
    let dispatcher = CommandDispatcher::new(bot.clone(), bot, config.chat_id, status);

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);
    tokio::select! {
        _ = dispatcher.run() => {}
        _ = async {
            match shutdown {
                Some(stop) => {
                    let _ = stop.await;
                }
                None => std::future::pending().await,
            }
        } => {}
    }

    // Dropping the watcher drops the last event sender, which lets the
    // writer flush its buffer and return.
    watcher.abort();
    let _ = watcher.await;
    if let Some(writer) = writer {
        if let Err(e) = writer.await {
            log::error!("Event writer failed: {e}");
        }
    }

    ExitCode::SUCCESS
}
