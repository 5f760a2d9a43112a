use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::BlockingQueryClient;
use crate::model::KeyValueNode;
use crate::model::QueryPayload;
use crate::model::QueryResponse;
use crate::model::ServiceNode;
use crate::model::WatchItem;
use crate::ClientError;

pub enum ScriptStep {
    Respond(QueryResponse),
    Fail(ClientError),
}

/// In-memory backend replaying a fixed sequence of responses per item.
///
/// Once an item's script is exhausted its polls never complete, like a
/// blocking query on data that does not change.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<WatchItem, VecDeque<ScriptStep>>>,
    calls: Mutex<Vec<(WatchItem, u64)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        item: WatchItem,
        step: ScriptStep,
    ) -> &Self {
        self.scripts.lock().entry(item).or_default().push_back(step);
        self
    }

    pub fn respond(
        &self,
        item: &WatchItem,
        status: u16,
        index: u64,
        payload: Option<QueryPayload>,
    ) -> &Self {
        self.push(item.clone(), ScriptStep::Respond(QueryResponse::new(status, index, payload)))
    }

    pub fn respond_service(
        &self,
        name: &str,
        index: u64,
        nodes: Vec<ServiceNode>,
    ) -> &Self {
        self.respond(
            &WatchItem::Service(name.to_string()),
            200,
            index,
            Some(QueryPayload::Service(nodes)),
        )
    }

    pub fn respond_key(
        &self,
        key: &str,
        index: u64,
        value: &str,
    ) -> &Self {
        self.respond(
            &WatchItem::Key(key.to_string()),
            200,
            index,
            Some(QueryPayload::Key(KeyValueNode::new(key, value))),
        )
    }

    pub fn respond_tree(
        &self,
        prefix: &str,
        index: u64,
        nodes: Vec<KeyValueNode>,
    ) -> &Self {
        self.respond(
            &WatchItem::KeyPrefix(prefix.to_string()),
            200,
            index,
            Some(QueryPayload::Tree(nodes)),
        )
    }

    pub fn fail(
        &self,
        item: &WatchItem,
        error: ClientError,
    ) -> &Self {
        self.push(item.clone(), ScriptStep::Fail(error))
    }

    /// Cursors sent for `item`, in poll order
    pub fn indexes_for(
        &self,
        item: &WatchItem,
    ) -> Vec<u64> {
        self.calls
            .lock()
            .iter()
            .filter(|(i, _)| i == item)
            .map(|(_, index)| *index)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn remaining(
        &self,
        item: &WatchItem,
    ) -> usize {
        self.scripts.lock().get(item).map(VecDeque::len).unwrap_or(0)
    }
}

#[async_trait]
impl BlockingQueryClient for ScriptedClient {
    async fn poll(
        &self,
        item: &WatchItem,
        index: u64,
        _max_wait: Duration,
    ) -> std::result::Result<QueryResponse, ClientError> {
        self.calls.lock().push((item.clone(), index));
        let step = self.scripts.lock().get_mut(item).and_then(VecDeque::pop_front);

        match step {
            Some(ScriptStep::Respond(response)) => Ok(response),
            Some(ScriptStep::Fail(error)) => Err(error),
            None => std::future::pending().await,
        }
    }
}
