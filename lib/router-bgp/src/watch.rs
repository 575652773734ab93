//! Reflector-backed watches that feed the controller's signaler

use futures::{Stream, StreamExt};
use kube::{Api, Resource};
use kube_runtime::reflector::store::{Writer, WriterDropped};
use kube_runtime::reflector::{self, ObjectRef, Store};
use kube_runtime::{watcher, WatchStreamExt};
use router_core::{CoreError, Result, Signaler};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// ReflectedWatch keeps a local cache of one kind of object in sync with the
/// API server and raises a signal for every change it observes.
pub struct ReflectedWatch<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    kind: &'static str,
    api: Api<K>,
    config: watcher::Config,
    store: Store<K>,
    writer: Mutex<Option<Writer<K>>>,
    signaler: Signaler,
}

impl<K> ReflectedWatch<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    /// Watch every object of this kind
    pub fn all(kind: &'static str, api: Api<K>, signaler: Signaler) -> Self {
        Self::with_config(kind, api, watcher::Config::default(), signaler)
    }

    /// Watch only the object with the given name
    pub fn named(kind: &'static str, api: Api<K>, name: &str, signaler: Signaler) -> Self {
        let config = watcher::Config::default().fields(&format!("metadata.name={}", name));
        Self::with_config(kind, api, config, signaler)
    }

    fn with_config(
        kind: &'static str,
        api: Api<K>,
        config: watcher::Config,
        signaler: Signaler,
    ) -> Self {
        let (store, writer) = reflector::store();
        Self {
            kind,
            api,
            config,
            store,
            writer: Mutex::new(Some(writer)),
            signaler,
        }
    }

    /// Look up a cluster-scoped object in the local cache
    pub fn get(&self, name: &str) -> Option<Arc<K>> {
        self.store.get(&ObjectRef::new(name))
    }

    /// Every object currently in the local cache
    pub fn state(&self) -> Vec<Arc<K>> {
        self.store.state()
    }

    /// Wait until the first full listing has landed in the cache
    pub async fn wait_until_ready(&self) -> std::result::Result<(), WriterDropped> {
        self.store.wait_until_ready().await
    }

    /// Drive the watch until `shutdown` fires. Every applied, deleted or
    /// re-listed object raises a signal; watch errors are retried with
    /// backoff.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let events = watcher(self.api.clone(), self.config.clone()).default_backoff();
        self.consume(events, shutdown).await
    }

    /// Feed watch events into the cache until `shutdown` fires or the
    /// stream ends. The cache can only be fed by one stream.
    pub(crate) async fn consume<S>(&self, events: S, shutdown: CancellationToken) -> Result<()>
    where
        S: Stream<Item = watcher::Result<watcher::Event<K>>> + Send,
    {
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| CoreError::WatchRunning(self.kind.to_string()))?;

        let mut events = events.reflect(writer).boxed();

        info!("Starting {} watch", self.kind);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.next() => match event {
                    Some(Ok(_)) => {
                        debug!("{} changed, signalling controller", self.kind);
                        self.signaler.event();
                    }
                    Some(Err(e)) => warn!("{} watch error: {}", self.kind, e),
                    None => {
                        warn!("{} watch stream ended", self.kind);
                        break;
                    }
                },
            }
        }
        info!("Stopped {} watch", self.kind);

        Ok(())
    }
}
