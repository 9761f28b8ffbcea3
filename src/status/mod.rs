//! Status client for the cluster manager that hosts feed infrastructure.
//!
//! [`StatusClient`] constructs its remote resource handle lazily and at most
//! once at a time. Callers only ever see `Option<Arc<_>>`: an unavailable
//! cluster manager is a degraded state, not an error.

mod cluster_manager;

pub use cluster_manager::*;

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

/// Attempts after which a stuck construction is abandoned.
pub const MAX_ATTEMPTS: u32 = 3;

/// Failures while building or using a status resource.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid status client configuration: {0}")]
    InvalidConfig(String),

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

/// Builds the resource a [`StatusClient`] hands out.
pub trait ResourceBuilder: Send + Sync {
    type Resource: Send + Sync;

    fn build(&self) -> impl Future<Output = Result<Self::Resource, StatusError>> + Send;
}

/// Lazily built, shared handle to a remote resource.
///
/// Only one construction runs at a time; callers arriving while one is in
/// flight get the cached value (usually `None`). A failed build clears the
/// in-flight flag. Every call made while no resource exists counts as an
/// attempt, and once [`MAX_ATTEMPTS`] is reached both the counter and the
/// flag are reset, so a construction that never finished cannot block
/// future builds.
pub struct StatusClient<B: ResourceBuilder> {
    builder: B,
    resource: RwLock<Option<Arc<B::Resource>>>,
    creating: AtomicBool,
    attempts: AtomicU32,
}

impl<B: ResourceBuilder> StatusClient<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            resource: RwLock::new(None),
            creating: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        }
    }

    /// The resource, building it first if needed.
    pub async fn get_resource(&self) -> Option<Arc<B::Resource>> {
        if self.cached().is_none() {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            if self
                .creating
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                match self.builder.build().await {
                    Ok(resource) => {
                        let mut slot = self.resource.write().unwrap_or_else(|poisoned| {
                            tracing::warn!("Status client cache lock poisoned; recovering");
                            poisoned.into_inner()
                        });
                        *slot = Some(Arc::new(resource));
                        tracing::info!("Created status client resource");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Unable to create status client resource");
                    }
                }
                self.creating.store(false, Ordering::Release);
            }
        }

        if self.attempts.load(Ordering::SeqCst) >= MAX_ATTEMPTS {
            self.attempts.store(0, Ordering::SeqCst);
            self.creating.store(false, Ordering::Release);
        }

        self.cached()
    }

    /// Calls counted since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Whether a construction is marked in flight.
    pub fn is_creating(&self) -> bool {
        self.creating.load(Ordering::Acquire)
    }

    fn cached(&self) -> Option<Arc<B::Resource>> {
        // the cache holds a single Option, so a poisoned lock still guards a whole value
        self.resource
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticBuilder;

    impl ResourceBuilder for StaticBuilder {
        type Resource = &'static str;

        fn build(&self) -> impl Future<Output = Result<&'static str, StatusError>> + Send {
            async { Ok("cluster") }
        }
    }

    #[tokio::test]
    async fn test_poisoned_cache_still_keeps_built_resource() {
        let client = Arc::new(StatusClient::new(StaticBuilder));
        let poisoner = client.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.resource.write();
            panic!("poison the cache lock");
        })
        .join();
        assert!(client.resource.is_poisoned());

        let resource = client.get_resource().await.expect("Resource missing");
        assert_eq!(*resource, "cluster");
        assert_eq!(client.get_resource().await.as_deref(), Some(&"cluster"));
    }
}
