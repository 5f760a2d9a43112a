use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::spawn_watcher;
use super::Aggregator;
use super::DefaultFolder;
use super::StateFolder;
use super::StateStream;
use super::WatchStream;
use super::WatcherContext;
use crate::client::BlockingQueryClient;
use crate::client::HttpQueryClient;
use crate::events::EventSink;
use crate::events::TracingEventSink;
use crate::model::DependencySet;
use crate::model::KeyObservation;
use crate::model::KeyRecursiveObservation;
use crate::model::ServiceObservation;
use crate::model::WatchItem;
use crate::state::ConsulState;
use crate::ConsulWatchConfig;
use crate::Error;
use crate::Result;
use crate::RetryPolicy;
use crate::WatchConfig;

/// Entry point for watching services and key/value data.
///
/// Every `observe_*` call starts an independent session with its own tasks;
/// dropping the returned stream stops that session only. Sessions are spawned
/// on the ambient tokio runtime, so these methods must be called from within
/// one.
///
/// # Basic Usage
/// ```ignore
/// use consul_watch::{ConsulObserver, ConsulWatchConfig, DependencySet};
///
/// let config = ConsulWatchConfig::new()?.validate()?;
/// let observer = ConsulObserver::builder().with_config(config).build()?;
///
/// let deps = DependencySet::new()
///     .with_service("billing")
///     .with_key_prefix("apps/billing");
/// let state = observer.get_dependencies(deps).await?;
/// println!("{:?}", state.kv_store().get_tree("apps/billing"));
/// ```
#[derive(Clone)]
pub struct ConsulObserver {
    client: Arc<dyn BlockingQueryClient>,
    events: Arc<dyn EventSink>,
    folder: Arc<dyn StateFolder>,
    config: WatchConfig,
}

impl ConsulObserver {
    pub fn builder() -> ConsulObserverBuilder {
        ConsulObserverBuilder::new()
    }

    pub fn watch_config(&self) -> &WatchConfig {
        &self.config
    }

    /// Catalog entries of service `name`
    pub fn observe_service(
        &self,
        name: impl Into<String>,
    ) -> WatchStream<ServiceObservation> {
        self.observe_item(WatchItem::Service(name.into()))
    }

    /// A single key; a missing key is observed with no value
    pub fn observe_key(
        &self,
        key: impl Into<String>,
    ) -> WatchStream<KeyObservation> {
        self.observe_item(WatchItem::Key(key.into()))
    }

    /// Every key under `prefix`; a missing prefix is observed as an empty listing
    pub fn observe_key_recursive(
        &self,
        prefix: impl Into<String>,
    ) -> WatchStream<KeyRecursiveObservation> {
        self.observe_item(WatchItem::KeyPrefix(prefix.into()))
    }

    /// Merged snapshots covering `deps`.
    ///
    /// The first snapshot is published once every dependency has resolved;
    /// after that one snapshot is published per change. A fatal watch error
    /// is yielded as the last item and ends the session. Handler faults are
    /// logged and skipped.
    pub fn observe_dependencies(
        &self,
        deps: DependencySet,
    ) -> StateStream {
        self.start_session(deps, false)
    }

    /// First snapshot resolving every dependency in `deps`.
    ///
    /// The session started for this call is stopped as soon as the snapshot
    /// is available; other sessions are unaffected.
    ///
    /// # Errors
    /// - [`Error::Watch`] when a watched item failed before resolution
    /// - [`Error::Internal`] when folding an observation failed, or the
    ///   session ended without a snapshot
    pub async fn get_dependencies(
        &self,
        deps: DependencySet,
    ) -> Result<Arc<ConsulState>> {
        let mut stream = self.start_session(deps, true);
        match stream.next().await {
            Some(result) => result,
            None => Err(Error::Internal(
                "watch session ended before every dependency was resolved".to_string(),
            )),
        }
    }

    fn start_session(
        &self,
        deps: DependencySet,
        abort_on_fault: bool,
    ) -> StateStream {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::channel(self.config.output_buffer_size.max(1));

        let items = deps.watch_items();
        info!(items = items.len(), "starting dependency watch session");

        let ctx = self.watcher_context();
        for item in items {
            spawn_watcher(item, ctx.clone(), tx.clone(), token.child_token());
        }
        // Watchers hold the only senders, so the aggregator sees the channel
        // close once all of them have stopped.
        drop(tx);

        let mut aggregator = Aggregator::new(deps, Arc::clone(&self.folder), Arc::clone(&self.events));
        if abort_on_fault {
            aggregator = aggregator.abort_on_fault();
        }
        tokio::spawn(aggregator.run(rx, out_tx, token.clone()));

        StateStream::new(out_rx, token.drop_guard())
    }

    fn observe_item<T>(
        &self,
        item: WatchItem,
    ) -> WatchStream<T> {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        info!(%item, "starting item watch");
        spawn_watcher(item, self.watcher_context(), tx, token.clone());

        WatchStream::new(rx, token.drop_guard())
    }

    fn watcher_context(&self) -> WatcherContext {
        WatcherContext {
            client: Arc::clone(&self.client),
            events: Arc::clone(&self.events),
            max_wait: self.config.max_wait(),
            retry: self.config.retry,
        }
    }
}

/// Assembles a [`ConsulObserver`]
pub struct ConsulObserverBuilder {
    config: ConsulWatchConfig,
    client: Option<Arc<dyn BlockingQueryClient>>,
    events: Arc<dyn EventSink>,
    folder: Arc<dyn StateFolder>,
}

impl Default for ConsulObserverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsulObserverBuilder {
    pub fn new() -> Self {
        Self {
            config: ConsulWatchConfig::default(),
            client: None,
            events: Arc::new(TracingEventSink),
            folder: Arc::new(DefaultFolder),
        }
    }

    /// Completely replaces the configuration, including earlier
    /// [`max_wait`](Self::max_wait) and [`retry_policy`](Self::retry_policy) calls
    pub fn with_config(
        mut self,
        config: ConsulWatchConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Longest time the backend may hold one query (default: 5 minutes)
    pub fn max_wait(
        mut self,
        max_wait: Duration,
    ) -> Self {
        self.config.watch.max_wait_ms = u64::try_from(max_wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Reaction to server-side failures (default: retry after 5s)
    pub fn retry_policy(
        mut self,
        retry: RetryPolicy,
    ) -> Self {
        self.config.watch.retry = retry;
        self
    }

    /// Use `client` instead of an HTTP client built from the configuration
    pub fn with_client(
        mut self,
        client: Arc<dyn BlockingQueryClient>,
    ) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_event_sink(
        mut self,
        events: Arc<dyn EventSink>,
    ) -> Self {
        self.events = events;
        self
    }

    pub fn with_folder(
        mut self,
        folder: Arc<dyn StateFolder>,
    ) -> Self {
        self.folder = folder;
        self
    }

    /// Validate the configuration and build the observer
    pub fn build(self) -> Result<ConsulObserver> {
        let config = self.config.validate()?;

        let client: Arc<dyn BlockingQueryClient> = match self.client {
            Some(client) => client,
            None => Arc::new(HttpQueryClient::new(&config.consul)?),
        };

        Ok(ConsulObserver {
            client,
            events: self.events,
            folder: self.folder,
            config: config.watch,
        })
    }
}
