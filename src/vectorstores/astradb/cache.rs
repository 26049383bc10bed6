use std::{
    collections::hash_map::DefaultHasher,
    future::Future,
    hash::{Hash, Hasher},
    sync::Arc,
};

use tokio::sync::Mutex;
use tracing::debug;

/// Hashes a configuration snapshot into a cache key.
pub fn config_key<H: Hash + ?Sized>(value: &H) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Holds one built value along with the key it was built for.
///
/// A lookup with the same key returns the cached value; a different key
/// rebuilds it. Failed builds leave the previous entry in place.
pub struct StoreCache<T> {
    slot: Mutex<Option<(u64, Arc<T>)>>,
}

impl<T> Default for StoreCache<T> {
    fn default() -> Self {
        Self { slot: Mutex::new(None) }
    }
}

impl<T> StoreCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_try_build<F, Fut, E>(&self, key: u64, build: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((cached_key, value)) = slot.as_ref() {
            if *cached_key == key {
                debug!(key, "Reusing cached vector store");
                return Ok(Arc::clone(value));
            }
        }

        let value = Arc::new(build().await?);
        *slot = Some((key, Arc::clone(&value)));
        Ok(value)
    }

    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    pub async fn cached_key(&self) -> Option<u64> {
        self.slot.lock().await.as_ref().map(|(key, _)| *key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn reuses_until_key_changes() {
        let cache = StoreCache::new();
        let counter = AtomicUsize::new(0);
        let builds = &counter;
        let build = move || async move {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("store")
        };

        let a = cache.get_or_try_build(1, build).await.unwrap();
        let b = cache.get_or_try_build(1, build).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        cache.get_or_try_build(2, build).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);

        cache.invalidate().await;
        assert_eq!(cache.cached_key().await, None);
        cache.get_or_try_build(2, build).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_builds_keep_previous_entry() {
        let cache = StoreCache::new();
        cache.get_or_try_build(1, || async { Ok::<_, String>(1) }).await.unwrap();
        let err = cache.get_or_try_build(2, || async { Err::<i32, _>("down".to_string()) }).await;
        assert_eq!(err.unwrap_err(), "down");
        assert_eq!(cache.cached_key().await, Some(1));
    }

    #[test]
    fn keys_follow_content() {
        assert_eq!(config_key(&("a", 1)), config_key(&("a", 1)));
        assert_ne!(config_key(&("a", 1)), config_key(&("a", 2)));
    }
}
