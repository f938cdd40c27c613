use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::counter::RepCounter;
use crate::pose::{PoseDetector, RemotePoseDetector, SuppliedLandmarks};
use crate::store::{MemorySessionStore, SessionStore, SqliteSessionStore};

pub(crate) type CountingContext = Arc<Mutex<RepCounter>>;

pub struct Tracker {
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) detector: Arc<dyn PoseDetector>,
    contexts: Mutex<HashMap<String, CountingContext>>,
}

impl Tracker {
    pub fn new(store: Arc<dyn SessionStore>, detector: Arc<dyn PoseDetector>) -> Self {
        Self {
            store,
            detector,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the store and detector the configuration asks for.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn SessionStore> = if config.uses_memory_store() {
            info!("Using in-memory session store; workouts are not persisted");
            Arc::new(MemorySessionStore::new())
        } else {
            info!("Using SQLite session store at {}", config.database_url);
            Arc::new(SqliteSessionStore::open(&config.database_url)?)
        };

        let detector: Arc<dyn PoseDetector> = match &config.pose_service_url {
            Some(url) => {
                info!(
                    "Using remote pose detector at {} ({}ms timeout)",
                    url,
                    config.pose_timeout.as_millis()
                );
                Arc::new(RemotePoseDetector::new(url.clone(), config.pose_timeout)?)
            }
            None => {
                info!("No pose service configured; counting client-supplied landmarks");
                Arc::new(SuppliedLandmarks)
            }
        };

        Ok(Self::new(store, detector))
    }

    /// The user's counting context, created on first use.
    ///
    /// Holding its lock serializes all counting for that user.
    pub(crate) async fn context(&self, user_id: &str) -> CountingContext {
        let mut contexts = self.contexts.lock().await;
        contexts
            .entry(user_id.to_string())
            .or_insert_with(|| {
                debug!("New counting context for {}", user_id);
                Arc::new(Mutex::new(RepCounter::new()))
            })
            .clone()
    }

    /// Copy of the user's current counter state.
    pub async fn counter(&self, user_id: &str) -> RepCounter {
        let context = self.contexts.lock().await.get(user_id).cloned();
        match context {
            Some(context) => context.lock().await.clone(),
            None => RepCounter::new(),
        }
    }

    /// Drops the user's context once nothing else holds it.
    ///
    /// Clones are only handed out under the map lock, so a strong count of
    /// two (the map and `context`) means no frame is waiting on it.
    pub(crate) async fn release_context(&self, user_id: &str, context: CountingContext) {
        let mut contexts = self.contexts.lock().await;
        let idle = contexts
            .get(user_id)
            .is_some_and(|held| Arc::ptr_eq(held, &context) && Arc::strong_count(&context) == 2);
        if idle {
            contexts.remove(user_id);
            debug!("Released counting context for {}", user_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_users(&self) -> usize {
        self.contexts.lock().await.len()
    }
}
