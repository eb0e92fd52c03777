//! Integration tests for the announcer registry.

use async_trait::async_trait;
use herald_announcer::{AnnounceError, Announcer, Health};
use herald_agent::{
    AgentClient, Payload, Request, Response, Service, Transport, TransportError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport double that accepts everything and records the URLs it saw.
struct RecordingTransport {
    status: u16,
    seen: Mutex<Vec<String>>,
}

impl RecordingTransport {
    fn healthy() -> Arc<Self> {
        Arc::new(Self {
            status: 200,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            status: 500,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn request(&self, request: Request) -> Result<Response, TransportError> {
        self.seen.lock().unwrap().push(request.url.clone());
        Ok(Response {
            status: self.status,
            headers: Vec::new(),
            payload: Payload::Text(String::new()),
        })
    }
}

fn announcer(transport: Arc<RecordingTransport>) -> Announcer {
    Announcer::new(Arc::new(AgentClient::new("http://a", None, transport)))
}

/// Service without a check, so units stay quiet between lifecycle events.
fn service(id: &str, name: &str) -> Service {
    Service {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        ..Service::default()
    }
}

#[tokio::test]
async fn test_register_unregister_lifecycle() {
    let transport = RecordingTransport::healthy();
    let announcer = announcer(transport.clone());
    let foo = service("foo", "bar");

    announcer.register(foo.clone()).await.unwrap();
    // Registering the same announce key again is a no-op.
    announcer.register(foo.clone()).await.unwrap();
    assert_eq!(announcer.count().await, 1);

    assert!(announcer.whereis(&foo).await.is_some());

    announcer.unregister(&foo).await.unwrap();
    assert!(matches!(
        announcer.unregister(&foo).await,
        Err(AnnounceError::NotFound)
    ));
    assert!(announcer.whereis(&foo).await.is_none());
    assert_eq!(announcer.count().await, 0);

    // The unit deregistered at the agent on the way down.
    assert!(transport
        .urls()
        .contains(&"http://a/v1/agent/service/deregister/foo".to_string()));
}

#[tokio::test]
async fn test_unregister_unknown_service_errors() {
    let announcer = announcer(RecordingTransport::healthy());
    assert!(matches!(
        announcer.unregister(&service("never", "seen")).await,
        Err(AnnounceError::NotFound)
    ));
}

#[tokio::test]
async fn test_distinct_keys_get_distinct_units() {
    let announcer = announcer(RecordingTransport::healthy());

    announcer.register(service("a", "svc")).await.unwrap();
    announcer.register(service("b", "svc")).await.unwrap();
    assert_eq!(announcer.count().await, 2);

    announcer.killall().await;
}

#[tokio::test]
async fn test_same_key_different_tags_collides() {
    let announcer = announcer(RecordingTransport::healthy());

    let mut tagged = service("a", "svc");
    tagged.tags = vec!["v2".to_string()];

    announcer.register(service("a", "svc")).await.unwrap();
    announcer.register(tagged).await.unwrap();
    assert_eq!(announcer.count().await, 1);

    announcer.killall().await;
}

#[tokio::test]
async fn test_whereis_handle_reports_stat() {
    let transport = RecordingTransport::healthy();
    let announcer = announcer(transport);
    let svc = service("x", "x");

    announcer.register(svc.clone()).await.unwrap();

    let handle = announcer.whereis(&svc).await.unwrap();
    assert_eq!(handle.base_tick(), Duration::from_millis(300_000));
    let stat = handle.stat().await;
    assert_eq!(stat.service, Health::Ok);
    assert_eq!(stat.heartbeat, Health::Error);

    announcer.killall().await;
}

#[tokio::test]
async fn test_register_succeeds_even_when_agent_is_down() {
    let transport = RecordingTransport::failing();
    let announcer = announcer(transport);
    let svc = service("x", "x");

    // Structural success: the unit exists and is retrying on its own.
    announcer.register(svc.clone()).await.unwrap();
    assert_eq!(announcer.count().await, 1);

    let handle = announcer.whereis(&svc).await.unwrap();
    let stat = handle.stat().await;
    assert_eq!(stat.service, Health::Error);
    assert_eq!(stat.heartbeat, Health::Error);

    announcer.killall().await;
}

#[tokio::test]
async fn test_killall_clears_registry_and_deregisters() {
    let transport = RecordingTransport::healthy();
    let announcer = announcer(transport.clone());

    announcer.register(service("a", "a")).await.unwrap();
    announcer.register(service("b", "b")).await.unwrap();

    announcer.killall().await;
    assert_eq!(announcer.count().await, 0);

    let urls = transport.urls();
    assert!(urls.contains(&"http://a/v1/agent/service/deregister/a".to_string()));
    assert!(urls.contains(&"http://a/v1/agent/service/deregister/b".to_string()));
}

#[tokio::test]
async fn test_shutdown_cascades_to_all_units() {
    let transport = RecordingTransport::healthy();
    let announcer = announcer(transport.clone());

    announcer.register(service("a", "a")).await.unwrap();
    announcer.register(service("b", "b")).await.unwrap();

    announcer.shutdown().await;
    assert_eq!(announcer.count().await, 0);
    assert_eq!(
        transport
            .urls()
            .iter()
            .filter(|url| url.contains("/deregister/"))
            .count(),
        2
    );
}
