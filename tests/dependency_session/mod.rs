use std::sync::Arc;
use std::time::Duration;

use consul_watch::ConsulState;
use consul_watch::DependencySet;
use consul_watch::Error;
use consul_watch::KeyValueNode;
use consul_watch::StateStream;
use consul_watch::WatchError;
use consul_watch::WatchItem;
use futures::StreamExt;

use crate::common::observer;
use crate::common::FakeConsul;
use crate::enable_logger;

fn deps() -> DependencySet {
    DependencySet::new()
        .with_service("svc1")
        .with_key("k1")
        .with_key_prefix("p1")
}

async fn next_within(
    stream: &mut StateStream,
    millis: u64,
) -> Option<Arc<ConsulState>> {
    tokio::time::timeout(Duration::from_millis(millis), stream.next())
        .await
        .ok()
        .flatten()
        .map(|r| r.expect("no watch error"))
}

const ARRIVAL_ORDERS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

fn resolve(
    backend: &FakeConsul,
    dependency: usize,
) {
    match dependency {
        0 => backend.push_service("svc1", 1),
        1 => backend.push_key("k1", 1, "v"),
        _ => backend.push(WatchItem::KeyPrefix("p1".into()), 404, 1, None),
    }
}

#[tokio::test]
async fn snapshot_is_withheld_until_third_dependency_resolves() {
    enable_logger();
    for order in ARRIVAL_ORDERS {
        let backend = FakeConsul::new();
        let mut stream = observer(&backend).observe_dependencies(deps());

        resolve(&backend, order[0]);
        assert!(next_within(&mut stream, 50).await.is_none(), "arrival order {:?}", order);
        resolve(&backend, order[1]);
        assert!(next_within(&mut stream, 50).await.is_none(), "arrival order {:?}", order);
        resolve(&backend, order[2]);
        let snapshot = next_within(&mut stream, 1000).await.unwrap();

        assert!(snapshot.service("svc1").is_some());
        assert_eq!(snapshot.kv_store().get_value("k1").and_then(|n| n.value()), Some("v"));
        assert!(snapshot.is_key_prefix_missing("p1"));

        // Exactly one emission for the three resolutions.
        assert!(next_within(&mut stream, 50).await.is_none(), "arrival order {:?}", order);
    }
}

#[tokio::test]
async fn not_found_key_does_not_stand_in_for_its_prefix() {
    let backend = FakeConsul::new();
    let deps = DependencySet::new().with_key("apps/x").with_key_prefix("apps");
    let mut stream = observer(&backend).observe_dependencies(deps);

    backend.push(WatchItem::Key("apps/x".into()), 404, 1, None);
    assert!(next_within(&mut stream, 50).await.is_none());

    backend.push_tree("apps", 1, vec![KeyValueNode::new("apps/y", "1")]);
    let snapshot = next_within(&mut stream, 1000).await.unwrap();
    assert_eq!(snapshot.kv_store().get_tree("apps"), vec![&KeyValueNode::new("apps/y", "1")]);
    assert!(next_within(&mut stream, 50).await.is_none());
}

#[tokio::test]
async fn missing_prefix_then_not_found_key_publishes_once() {
    let backend = FakeConsul::new();
    let deps = DependencySet::new().with_key("apps/x").with_key_prefix("apps");
    let mut stream = observer(&backend).observe_dependencies(deps);

    backend.push(WatchItem::KeyPrefix("apps".into()), 404, 1, None);
    assert!(next_within(&mut stream, 50).await.is_none());

    backend.push(WatchItem::Key("apps/x".into()), 404, 1, None);
    let snapshot = next_within(&mut stream, 1000).await.unwrap();
    assert!(snapshot.is_key_prefix_missing("apps"));
    assert!(snapshot.kv_store().get_tree("apps").is_empty());
}

#[tokio::test]
async fn each_genuine_change_is_published_once() {
    enable_logger();
    let backend = FakeConsul::new();
    let mut stream = observer(&backend).observe_dependencies(DependencySet::new().with_key("k1").with_key_prefix("p1"));

    backend.push_key("k1", 1, "v1");
    backend.push(WatchItem::KeyPrefix("p1".into()), 404, 1, None);
    let first = next_within(&mut stream, 1000).await.unwrap();
    assert!(first.kv_store().get_tree("p1").is_empty());

    // Same value at a newer index is not a change.
    backend.push_key("k1", 2, "v1");
    assert!(next_within(&mut stream, 50).await.is_none());

    backend.push_tree(
        "p1",
        2,
        vec![KeyValueNode::new("p1/a", "1"), KeyValueNode::new("p1/b", "2")],
    );
    let second = next_within(&mut stream, 1000).await.unwrap();
    assert_eq!(second.kv_store().get_children("p1").len(), 2);
    assert!(!second.is_key_prefix_missing("p1"));

    // A listing without p1/b deletes it.
    backend.push_tree("p1", 3, vec![KeyValueNode::new("p1/a", "1")]);
    let third = next_within(&mut stream, 1000).await.unwrap();
    assert!(third.kv_store().get_value("p1/b").is_none());

    // Earlier snapshots are untouched.
    assert_eq!(second.kv_store().get_children("p1").len(), 2);
}

#[tokio::test]
async fn fatal_error_ends_the_session() {
    let backend = FakeConsul::new();
    let mut stream = observer(&backend).observe_dependencies(deps());

    backend.push_service("svc1", 1);
    backend.push(WatchItem::Key("k1".into()), 403, 7, None);

    match stream.next().await {
        Some(Err(Error::Watch(WatchError::UnexpectedStatus { item, status, index, .. }))) => {
            assert_eq!(item, WatchItem::Key("k1".into()));
            assert_eq!(status, 403);
            assert_eq!(index, 7);
        }
        other => panic!("unexpected item {:?}", other.map(|r| r.map(|_| ()))),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn get_dependencies_returns_first_complete_snapshot() {
    let backend = FakeConsul::new();
    backend.push_service("svc1", 1);
    backend.push_key("k1", 1, "v");
    backend.push_tree("p1", 1, vec![KeyValueNode::new("p1/x", "1")]);

    let observer = observer(&backend);
    let state = tokio::time::timeout(Duration::from_secs(1), observer.get_dependencies(deps()))
        .await
        .expect("resolved in time")
        .unwrap();

    assert!(state.satisfies_all(&deps()));
    assert_eq!(state.kv_store().get_tree("p1").len(), 1);

    // The one-shot session is gone: later data is never polled for it.
    tokio::task::yield_now().await;
    backend.push_key("k1", 2, "w");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.queued_for(&WatchItem::Key("k1".into())), 1);
}
