//! Status client construction tests.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use feed_metadata::status::*;

/// Builder whose behavior is chosen per call number (starting at 1).
struct ScriptedBuilder {
    calls: Arc<AtomicU32>,
    script: fn(u32) -> Script,
}

#[derive(Clone, Copy)]
enum Script {
    Succeed,
    Fail,
    Slow,
    Hang,
}

impl ScriptedBuilder {
    /// The builder and a handle on its call counter.
    fn new(script: fn(u32) -> Script) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let builder = Self {
            calls: calls.clone(),
            script,
        };
        (builder, calls)
    }
}

impl ResourceBuilder for ScriptedBuilder {
    type Resource = String;

    fn build(&self) -> impl Future<Output = Result<String, StatusError>> + Send {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let script = (self.script)(call);
        async move {
            match script {
                Script::Succeed => Ok(format!("resource-{}", call)),
                Script::Fail => Err(StatusError::Unexpected("cluster manager down".into())),
                Script::Slow => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(format!("resource-{}", call))
                }
                Script::Hang => std::future::pending().await,
            }
        }
    }
}

#[tokio::test]
async fn test_builds_once_and_caches() {
    let (builder, calls) = ScriptedBuilder::new(|_| Script::Succeed);
    let client = StatusClient::new(builder);

    let first = client.get_resource().await.expect("Resource missing");
    let second = client.get_resource().await.expect("Resource missing");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.as_str(), "resource-1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_build_returns_none_and_allows_retry() {
    let (builder, calls) = ScriptedBuilder::new(|call| {
        if call == 1 {
            Script::Fail
        } else {
            Script::Succeed
        }
    });
    let client = StatusClient::new(builder);

    assert!(client.get_resource().await.is_none());
    assert!(!client.is_creating());

    let resource = client.get_resource().await.expect("Resource missing");
    assert_eq!(resource.as_str(), "resource-2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_build() {
    let (builder, calls) = ScriptedBuilder::new(|_| Script::Slow);
    let client = StatusClient::new(builder);

    let (first, second) = tokio::join!(client.get_resource(), client.get_resource());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.as_deref().map(String::as_str), Some("resource-1"));
    assert!(second.is_none());
    assert!(client.get_resource().await.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_attempt_counter_resets_after_three_attempts() {
    let (builder, calls) = ScriptedBuilder::new(|_| Script::Fail);
    let client = StatusClient::new(builder);

    assert!(client.get_resource().await.is_none());
    assert!(client.get_resource().await.is_none());
    assert_eq!(client.attempts(), 2);

    assert!(client.get_resource().await.is_none());
    assert_eq!(client.attempts(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_abandoned_build_is_retried_after_reset() {
    let (builder, calls) = ScriptedBuilder::new(|call| {
        if call == 1 {
            Script::Hang
        } else {
            Script::Succeed
        }
    });
    let client = StatusClient::new(builder);

    let abandoned = tokio::time::timeout(Duration::from_millis(20), client.get_resource()).await;
    assert!(abandoned.is_err());
    assert!(client.is_creating());

    // in-flight flag blocks new builds until the third attempt resets it
    assert!(client.get_resource().await.is_none());
    assert!(client.get_resource().await.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!client.is_creating());

    let resource = client.get_resource().await.expect("Resource missing");
    assert_eq!(resource.as_str(), "resource-2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unreachable_cluster_manager_yields_none() {
    let config = ClusterManagerConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        username: "admin".to_string(),
        password: "admin".to_string(),
    };
    let client = StatusClient::new(ClusterManagerBuilder::new(config));

    assert!(client.get_resource().await.is_none());
    assert!(!client.is_creating());
}
