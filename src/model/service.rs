use std::collections::BTreeMap;

/// One registered instance of a service
///
/// Equality is structural: `tags` compare as an ordered sequence and
/// `metadata` as an unordered map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceNode {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl ServiceNode {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(
        mut self,
        tags: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Aggregated catalog view of one service name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Node order is significant for equality
    pub nodes: Vec<ServiceNode>,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<ServiceNode>,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            nodes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
