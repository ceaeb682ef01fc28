//! Rune reference data.

use serde_json::Value;

use crate::cache::{CacheCascade, CacheKey, CacheTiers, DurableLookup, Namespace};

pub struct RuneService {
    cascade: CacheCascade<Value>,
}

impl RuneService {
    pub fn new(tiers: &CacheTiers) -> Self {
        Self {
            cascade: CacheCascade::new(Namespace::Runes, tiers),
        }
    }

    /// The `data` field of the `help/runes` document, as stored.
    pub async fn runes(&self) -> Option<Value> {
        self.cascade
            .read(&CacheKey::runes(), &DurableLookup::field("runes", "data"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DocumentStore;
    use crate::domain::testing::fixture;
    use serde_json::json;

    #[tokio::test]
    async fn test_runes_loaded_once_then_cached() {
        let f = fixture();
        assert!(f.services.runes.runes().await.is_none());

        f.docs
            .set("help", "runes", &json!({"data": [{"id": 8000, "key": "Precision"}]}))
            .await
            .unwrap();
        let runes = f.services.runes.runes().await.unwrap();
        assert_eq!(runes[0]["key"], "Precision");

        let reads = f.docs.reads();
        f.services.runes.runes().await.unwrap();
        assert_eq!(f.docs.reads(), reads);
    }
}
