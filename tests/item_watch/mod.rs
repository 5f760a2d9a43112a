use std::time::Duration;

use consul_watch::KeyValueNode;
use consul_watch::WatchItem;
use futures::StreamExt;

use crate::common::observer;
use crate::common::FakeConsul;
use crate::enable_logger;

#[tokio::test]
async fn key_watch_retries_server_error_then_yields_value() {
    enable_logger();
    let backend = FakeConsul::new();
    let item = WatchItem::Key("apps/myapp/port".into());
    backend.push(item.clone(), 500, 0, None);
    backend.push_key("apps/myapp/port", 11, "v1");

    let mut stream = observer(&backend).observe_key("apps/myapp/port");
    let observation = stream.next().await.unwrap().unwrap();

    assert_eq!(observation.index, 11);
    assert_eq!(observation.value.and_then(|n| n.value).as_deref(), Some("v1"));

    // Exactly one observation: the failed round produced nothing.
    let next = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(next.is_err());
    assert_eq!(&backend.polls_for(&item)[..3], &[0, 0, 11]);
}

#[tokio::test]
async fn prefix_watch_reports_missing_then_children() {
    enable_logger();
    let backend = FakeConsul::new();
    backend.push(WatchItem::KeyPrefix("apps/myapp".into()), 404, 3, None);

    let mut stream = observer(&backend).observe_key_recursive("apps/myapp");
    let first = stream.next().await.unwrap().unwrap();
    assert!(first.is_empty());
    assert_eq!(first.index, 3);

    backend.push_tree(
        "apps/myapp",
        4,
        vec![KeyValueNode::new("apps/myapp/a", "1"), KeyValueNode::new("apps/myapp/b", "2")],
    );
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.nodes.len(), 2);
    assert_eq!(second.index, 4);
}

#[tokio::test]
async fn dropping_the_stream_stops_polling() {
    let backend = FakeConsul::new();
    let item = WatchItem::Service("web".into());
    backend.push_service("web", 1);

    let mut stream = observer(&backend).observe_service("web");
    stream.next().await.unwrap().unwrap();
    drop(stream);

    tokio::task::yield_now().await;
    backend.push_service("web", 2);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Any pending poll was abandoned, so the new response is never fetched.
    assert!(backend.polls_for(&item).len() <= 2);
    assert_eq!(backend.queued_for(&item), 1);
}
