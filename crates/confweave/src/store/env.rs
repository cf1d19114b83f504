use tokio::sync::OnceCell;

use super::{Store, StoreFactory};
use crate::coerce;
use crate::decoder::DecoderRegistry;
use crate::document::Document;
use crate::error::{ConfigError, StoreError};

/// Exposes process environment variables as a flat document.
///
/// Options:
/// - `raw-data`: keep values as strings instead of coercing them.
/// - `keys`: only export these variables.
/// - `cache`: snapshot the environment on first fetch (default `true`).
pub struct EnvStore {
    raw_data: bool,
    keys: Option<Vec<String>>,
    cache: bool,
    snapshot: OnceCell<Vec<u8>>,
}

impl EnvStore {
    pub fn new(raw_data: bool, keys: Option<Vec<String>>, cache: bool) -> Self {
        Self {
            raw_data,
            keys,
            cache,
            snapshot: OnceCell::new(),
        }
    }

    fn collect(&self) -> Result<Vec<u8>, StoreError> {
        let document: Document = match &self.keys {
            Some(keys) => keys
                .iter()
                .filter_map(|key| std::env::var(key).ok().map(|value| (key.clone(), value)))
                .map(|(key, value)| (key, coerce::convert_with(&value, self.raw_data)))
                .collect(),
            None => std::env::vars()
                .map(|(key, value)| (key, coerce::convert_with(&value, self.raw_data)))
                .collect(),
        };
        Ok(document.to_json_bytes()?)
    }
}

#[async_trait::async_trait]
impl Store for EnvStore {
    async fn fetch(&self) -> Result<Vec<u8>, StoreError> {
        if !self.cache {
            return self.collect();
        }
        self.snapshot
            .get_or_try_init(|| async { self.collect() })
            .await
            .cloned()
    }
}

pub struct EnvStoreFactory;

impl StoreFactory for EnvStoreFactory {
    fn name(&self) -> &str {
        "env"
    }

    fn create(
        &self,
        options: &Document,
        _decoders: &DecoderRegistry,
    ) -> Result<Box<dyn Store>, ConfigError> {
        let keys = match options.get("keys") {
            None => None,
            Some(serde_json::Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| ConfigError::InvalidOption {
                            store: "env".to_string(),
                            option: "keys".to_string(),
                            reason: format!("expected a string, found {}", item),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(other) => {
                return Err(ConfigError::InvalidOption {
                    store: "env".to_string(),
                    option: "keys".to_string(),
                    reason: format!("expected an array of strings, found {}", other),
                })
            }
        };

        Ok(Box::new(EnvStore::new(
            options.get_bool("raw-data").unwrap_or(false),
            keys,
            options.get_bool("cache").unwrap_or(true),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    async fn fetch_doc(store: &dyn Store) -> Document {
        let bytes = store.fetch().await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn create(options: serde_json::Value) -> Box<dyn Store> {
        EnvStoreFactory
            .create(
                &Document::from_value(options).unwrap(),
                &DecoderRegistry::builtin(),
            )
            .unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_values_are_coerced() {
        std::env::set_var("CONFWEAVE_TEST_PORT", "8080");
        std::env::set_var("CONFWEAVE_TEST_FLAG", "TRUE");

        let store = create(json!({"keys": ["CONFWEAVE_TEST_PORT", "CONFWEAVE_TEST_FLAG"]}));
        let doc = fetch_doc(store.as_ref()).await;
        assert_eq!(
            doc.into_value(),
            json!({"CONFWEAVE_TEST_PORT": 8080, "CONFWEAVE_TEST_FLAG": true})
        );

        std::env::remove_var("CONFWEAVE_TEST_PORT");
        std::env::remove_var("CONFWEAVE_TEST_FLAG");
    }

    #[tokio::test]
    #[serial]
    async fn test_raw_data_keeps_strings() {
        std::env::set_var("CONFWEAVE_TEST_PORT", "8080");

        let store = create(json!({"raw-data": true, "keys": ["CONFWEAVE_TEST_PORT", "CONFWEAVE_TEST_UNSET"]}));
        let doc = fetch_doc(store.as_ref()).await;
        assert_eq!(doc.into_value(), json!({"CONFWEAVE_TEST_PORT": "8080"}));

        std::env::remove_var("CONFWEAVE_TEST_PORT");
    }

    #[tokio::test]
    #[serial]
    async fn test_cache_flag() {
        std::env::set_var("CONFWEAVE_TEST_VALUE", "first");

        let cached = create(json!({"keys": ["CONFWEAVE_TEST_VALUE"]}));
        let uncached = create(json!({"keys": ["CONFWEAVE_TEST_VALUE"], "cache": false}));
        assert_eq!(fetch_doc(cached.as_ref()).await.get_str("CONFWEAVE_TEST_VALUE"), Some("first"));
        assert_eq!(fetch_doc(uncached.as_ref()).await.get_str("CONFWEAVE_TEST_VALUE"), Some("first"));

        std::env::set_var("CONFWEAVE_TEST_VALUE", "second");
        assert_eq!(fetch_doc(cached.as_ref()).await.get_str("CONFWEAVE_TEST_VALUE"), Some("first"));
        assert_eq!(fetch_doc(uncached.as_ref()).await.get_str("CONFWEAVE_TEST_VALUE"), Some("second"));

        std::env::remove_var("CONFWEAVE_TEST_VALUE");
    }

    #[tokio::test]
    #[serial]
    async fn test_without_keys_exports_everything() {
        std::env::set_var("CONFWEAVE_TEST_ALL", "yes");
        let doc = fetch_doc(create(json!({})).as_ref()).await;
        assert_eq!(doc.get_str("CONFWEAVE_TEST_ALL"), Some("yes"));
        std::env::remove_var("CONFWEAVE_TEST_ALL");
    }

    #[test]
    fn test_invalid_keys_option() {
        let result = EnvStoreFactory.create(
            &Document::new().with("keys", "PATH"),
            &DecoderRegistry::builtin(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidOption { .. })));
    }
}
