// -
// Backend HTTP API

/// Response header carrying the blocking-query cursor
pub(crate) const CONSUL_INDEX_HEADER: &str = "X-Consul-Index";
/// Request header carrying the ACL token
pub(crate) const CONSUL_TOKEN_HEADER: &str = "X-Consul-Token";

pub(crate) const CATALOG_SERVICE_PATH: &str = "v1/catalog/service";
pub(crate) const KV_PATH: &str = "v1/kv";

// -
// Watch defaults

/// Unread notifications kept per change-tracking subscriber
pub(crate) const DEFAULT_CHANGE_NOTIFICATION_CAPACITY: usize = 64;

/// Environment variable prefix for configuration overrides
pub(crate) const CONFIG_ENV_PREFIX: &str = "CONSUL_WATCH";
