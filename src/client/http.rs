use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use tracing::debug;
use tracing::trace;

use super::BlockingQueryClient;
use crate::constants::CATALOG_SERVICE_PATH;
use crate::constants::CONSUL_INDEX_HEADER;
use crate::constants::CONSUL_TOKEN_HEADER;
use crate::constants::KV_PATH;
use crate::model::KeyValueNode;
use crate::model::QueryPayload;
use crate::model::QueryResponse;
use crate::model::ServiceNode;
use crate::model::WatchItem;
use crate::model::KEY_DELIMITER;
use crate::ClientError;
use crate::ConsulConfig;

/// Entry of `/v1/catalog/service/<name>`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogServiceEntry {
    #[serde(default)]
    node: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    service_address: String,
    #[serde(default)]
    service_port: u16,
    #[serde(default)]
    service_tags: Option<Vec<String>>,
    #[serde(default)]
    service_meta: Option<BTreeMap<String, String>>,
}

impl From<CatalogServiceEntry> for ServiceNode {
    fn from(entry: CatalogServiceEntry) -> Self {
        // An empty service address means the service listens on the node address.
        let address = if entry.service_address.is_empty() {
            entry.address
        } else {
            entry.service_address
        };

        ServiceNode {
            name: entry.node,
            address,
            port: entry.service_port,
            tags: entry.service_tags.unwrap_or_default(),
            metadata: entry.service_meta.unwrap_or_default(),
        }
    }
}

/// Entry of `/v1/kv/<key>`; `Value` is base64 and null for folder markers
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KvEntry {
    key: String,
    #[serde(default)]
    value: Option<String>,
}

impl KvEntry {
    fn into_node(self) -> Result<KeyValueNode, String> {
        let value = match self.value {
            Some(encoded) => {
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| format!("invalid base64 value for key {}: {}", self.key, e))?;
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            None => None,
        };
        Ok(KeyValueNode {
            full_key: self.key,
            value,
        })
    }
}

pub(crate) fn decode_catalog(body: &[u8]) -> Result<Vec<ServiceNode>, String> {
    let entries: Option<Vec<CatalogServiceEntry>> = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    Ok(entries.unwrap_or_default().into_iter().map(ServiceNode::from).collect())
}

pub(crate) fn decode_kv(body: &[u8]) -> Result<Vec<KeyValueNode>, String> {
    let entries: Option<Vec<KvEntry>> = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    entries.unwrap_or_default().into_iter().map(KvEntry::into_node).collect()
}

// Folder entries are keys ending in the delimiter; they are not values.
fn is_folder_marker(node: &KeyValueNode) -> bool {
    node.full_key.ends_with(KEY_DELIMITER)
}

/// Decode a success body into the payload shape of `item`.
///
/// Folder markers are dropped from recursive listings, so a prefix holding
/// nothing but its folder entry decodes as an empty listing.
pub(crate) fn decode_payload(
    item: &WatchItem,
    body: &[u8],
) -> Result<Option<QueryPayload>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let payload = match item {
        WatchItem::Service(_) => Some(QueryPayload::Service(decode_catalog(body)?)),
        WatchItem::Key(_) => decode_kv(body)?.into_iter().next().map(QueryPayload::Key),
        WatchItem::KeyPrefix(_) => Some(QueryPayload::Tree(
            decode_kv(body)?
                .into_iter()
                .filter(|node| !is_folder_marker(node))
                .collect(),
        )),
    };
    Ok(payload)
}

/// reqwest-backed [`BlockingQueryClient`] for the Consul HTTP API
#[derive(Clone, Debug)]
pub struct HttpQueryClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    datacenter: Option<String>,
    config: ConsulConfig,
}

impl HttpQueryClient {
    pub fn new(config: &ConsulConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build().map_err(|e| ClientError::Transport {
            url: config.address.clone(),
            message: format!("Failed to create HTTP client: {}", e),
        })?;
        Self::with_http_client(config, http)
    }

    /// Reuse an existing reqwest client (connection pool, proxies, TLS roots)
    pub fn with_http_client(
        config: &ConsulConfig,
        http: reqwest::Client,
    ) -> Result<Self, ClientError> {
        let base_url = config.address.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| ClientError::InvalidAddress(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            http,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
            datacenter: config.datacenter.clone(),
            config: config.clone(),
        })
    }

    pub(crate) fn url_for(
        &self,
        item: &WatchItem,
    ) -> String {
        match item {
            WatchItem::Service(name) => format!("{}/{}/{}", self.base_url, CATALOG_SERVICE_PATH, name),
            WatchItem::Key(key) | WatchItem::KeyPrefix(key) => {
                format!("{}/{}/{}", self.base_url, KV_PATH, key.trim_start_matches('/'))
            }
        }
    }
}

#[async_trait]
impl BlockingQueryClient for HttpQueryClient {
    async fn poll(
        &self,
        item: &WatchItem,
        index: u64,
        max_wait: Duration,
    ) -> std::result::Result<QueryResponse, ClientError> {
        let url = self.url_for(item);

        let mut request = self
            .http
            .get(&url)
            .timeout(self.config.request_timeout(max_wait))
            .query(&[("wait", format!("{}ms", max_wait.as_millis()))]);
        if index > 0 {
            request = request.query(&[("index", index)]);
        }
        if matches!(item, WatchItem::KeyPrefix(_)) {
            request = request.query(&[("recurse", "true")]);
        }
        if let Some(dc) = &self.datacenter {
            request = request.query(&[("dc", dc)]);
        }
        if let Some(token) = &self.token {
            request = request.header(CONSUL_TOKEN_HEADER, token);
        }

        trace!(%item, index, %url, "issuing blocking query");
        let response = request.send().await.map_err(|e| ClientError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        // Missing or unparsable index header keeps the caller's cursor.
        let next_index = response
            .headers()
            .get(CONSUL_INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(index);

        if !response.status().is_success() {
            debug!(%item, status, "blocking query returned non-success status");
            return Ok(QueryResponse::new(status, next_index, None));
        }

        let body = response.bytes().await.map_err(|e| ClientError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let payload = decode_payload(item, &body).map_err(|message| ClientError::Decode { url, status, message })?;

        Ok(QueryResponse::new(status, next_index, payload))
    }
}
