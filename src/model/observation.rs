//! Typed results of one long-poll round
//!
//! Not-found responses are ordinary observations: an empty node list for a
//! service, an absent value for a key, an empty listing for a prefix.

use super::KeyValueNode;
use super::QueryPayload;
use super::QueryResponse;
use super::Service;
use super::ServiceNode;
use super::WatchItem;
use crate::WatchError;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceObservation {
    pub service_name: String,
    pub index: u64,
    pub nodes: Vec<ServiceNode>,
}

impl ServiceObservation {
    pub fn to_service(&self) -> Service {
        Service::new(self.service_name.clone(), self.nodes.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyObservation {
    pub key: String,
    pub index: u64,
    pub value: Option<KeyValueNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecursiveObservation {
    pub key_prefix: String,
    pub index: u64,
    pub nodes: Vec<KeyValueNode>,
}

impl KeyRecursiveObservation {
    /// An empty listing means the subtree is missing
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Service(ServiceObservation),
    Key(KeyObservation),
    KeyRecursive(KeyRecursiveObservation),
}

impl Observation {
    /// Build the observation for `item` out of a success or not-found response.
    ///
    /// A payload of the wrong shape for the item is a malformed response.
    pub fn from_response(
        item: &WatchItem,
        response: QueryResponse,
    ) -> std::result::Result<Self, WatchError> {
        let QueryResponse { status, index, payload } = response;
        let observation = match (item, payload) {
            (WatchItem::Service(name), Some(QueryPayload::Service(nodes))) => {
                Observation::Service(ServiceObservation {
                    service_name: name.clone(),
                    index,
                    nodes,
                })
            }
            (WatchItem::Service(name), None) => Observation::Service(ServiceObservation {
                service_name: name.clone(),
                index,
                nodes: Vec::new(),
            }),
            (WatchItem::Key(key), Some(QueryPayload::Key(node))) => Observation::Key(KeyObservation {
                key: key.clone(),
                index,
                value: Some(node),
            }),
            (WatchItem::Key(key), None) => Observation::Key(KeyObservation {
                key: key.clone(),
                index,
                value: None,
            }),
            (WatchItem::KeyPrefix(prefix), Some(QueryPayload::Tree(nodes))) => {
                Observation::KeyRecursive(KeyRecursiveObservation {
                    key_prefix: prefix.clone(),
                    index,
                    nodes,
                })
            }
            (WatchItem::KeyPrefix(prefix), None) => Observation::KeyRecursive(KeyRecursiveObservation {
                key_prefix: prefix.clone(),
                index,
                nodes: Vec::new(),
            }),
            (item, Some(other)) => {
                return Err(WatchError::MalformedResponse {
                    item: item.clone(),
                    status,
                    message: format!("payload {} does not match the watched item", payload_kind(&other)),
                });
            }
        };
        Ok(observation)
    }

    pub fn index(&self) -> u64 {
        match self {
            Observation::Service(o) => o.index,
            Observation::Key(o) => o.index,
            Observation::KeyRecursive(o) => o.index,
        }
    }

    pub fn item(&self) -> WatchItem {
        match self {
            Observation::Service(o) => WatchItem::Service(o.service_name.clone()),
            Observation::Key(o) => WatchItem::Key(o.key.clone()),
            Observation::KeyRecursive(o) => WatchItem::KeyPrefix(o.key_prefix.clone()),
        }
    }
}

fn payload_kind(payload: &QueryPayload) -> &'static str {
    match payload {
        QueryPayload::Service(_) => "service",
        QueryPayload::Key(_) => "key",
        QueryPayload::Tree(_) => "tree",
    }
}

impl TryFrom<Observation> for ServiceObservation {
    type Error = Observation;

    fn try_from(observation: Observation) -> std::result::Result<Self, Self::Error> {
        match observation {
            Observation::Service(o) => Ok(o),
            other => Err(other),
        }
    }
}

impl TryFrom<Observation> for KeyObservation {
    type Error = Observation;

    fn try_from(observation: Observation) -> std::result::Result<Self, Self::Error> {
        match observation {
            Observation::Key(o) => Ok(o),
            other => Err(other),
        }
    }
}

impl TryFrom<Observation> for KeyRecursiveObservation {
    type Error = Observation;

    fn try_from(observation: Observation) -> std::result::Result<Self, Self::Error> {
        match observation {
            Observation::KeyRecursive(o) => Ok(o),
            other => Err(other),
        }
    }
}
