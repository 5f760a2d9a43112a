use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use consul_watch::BlockingQueryClient;
use consul_watch::ClientError;
use consul_watch::ConsulObserver;
use consul_watch::KeyValueNode;
use consul_watch::QueryPayload;
use consul_watch::QueryResponse;
use consul_watch::RetryPolicy;
use consul_watch::WatchItem;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// In-memory backend: responses are queued per item and handed out in order.
///
/// A poll with nothing queued blocks until something is queued for its item,
/// the way a blocking query waits for a change.
#[derive(Default)]
pub struct FakeConsul {
    queues: Mutex<HashMap<WatchItem, VecDeque<QueryResponse>>>,
    polls: Mutex<Vec<(WatchItem, u64)>>,
    queued: Notify,
}

impl FakeConsul {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(
        &self,
        item: WatchItem,
        status: u16,
        index: u64,
        payload: Option<QueryPayload>,
    ) {
        self.queues
            .lock()
            .entry(item)
            .or_default()
            .push_back(QueryResponse::new(status, index, payload));
        self.queued.notify_waiters();
    }

    pub fn push_key(
        &self,
        key: &str,
        index: u64,
        value: &str,
    ) {
        self.push(
            WatchItem::Key(key.to_string()),
            200,
            index,
            Some(QueryPayload::Key(KeyValueNode::new(key, value))),
        );
    }

    pub fn push_tree(
        &self,
        prefix: &str,
        index: u64,
        nodes: Vec<KeyValueNode>,
    ) {
        self.push(
            WatchItem::KeyPrefix(prefix.to_string()),
            200,
            index,
            Some(QueryPayload::Tree(nodes)),
        );
    }

    pub fn push_service(
        &self,
        name: &str,
        index: u64,
    ) {
        self.push(
            WatchItem::Service(name.to_string()),
            200,
            index,
            Some(QueryPayload::Service(vec![])),
        );
    }

    pub fn polls_for(
        &self,
        item: &WatchItem,
    ) -> Vec<u64> {
        self.polls
            .lock()
            .iter()
            .filter(|(i, _)| i == item)
            .map(|(_, index)| *index)
            .collect()
    }

    /// Responses queued for `item` that no poll has consumed yet
    pub fn queued_for(
        &self,
        item: &WatchItem,
    ) -> usize {
        self.queues.lock().get(item).map(VecDeque::len).unwrap_or(0)
    }

    fn pop(
        &self,
        item: &WatchItem,
    ) -> Option<QueryResponse> {
        self.queues.lock().get_mut(item).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl BlockingQueryClient for FakeConsul {
    async fn poll(
        &self,
        item: &WatchItem,
        index: u64,
        _max_wait: Duration,
    ) -> Result<QueryResponse, ClientError> {
        self.polls.lock().push((item.clone(), index));
        loop {
            let notified = self.queued.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(response) = self.pop(item) {
                return Ok(response);
            }
            notified.await;
        }
    }
}

pub fn observer(backend: &Arc<FakeConsul>) -> ConsulObserver {
    ConsulObserver::builder()
        .with_client(backend.clone())
        .retry_policy(RetryPolicy::Immediate)
        .build()
        .expect("valid observer config")
}
