//! External-id to item resolution
//!
//! Several statements can point at a knowledge-base item instead of an
//! unknown-value marker when exactly one item carries the platform's
//! external id. The resolver performs that lookup and memoizes it for
//! the lifetime of the run, so a creator appearing in hundreds of
//! records costs one query.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::error::{Error, Result};
use crate::wikidata::WikidataApi;

/// Outcome of an external-id lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No item carries the id.
    None,
    /// Exactly one item carries the id.
    One(String),
    /// More than one item carries the id; the value is unusable.
    Ambiguous,
}

/// Memoizing lookup of items by external id.
pub struct ItemResolver {
    api: Arc<dyn WikidataApi>,
    memo: Mutex<HashMap<String, Resolution>>,
}

impl ItemResolver {
    pub fn new(api: Arc<dyn WikidataApi>) -> Self {
        ItemResolver {
            api,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Full resolution for one id, memoized.
    pub async fn resolve(&self, property: &str, value: &str) -> Result<Resolution> {
        let key = format!("{}:{}", property, value);

        {
            let memo = self
                .memo
                .lock()
                .map_err(|_| Error::Internal("resolver memo lock poisoned".into()))?;
            if let Some(resolution) = memo.get(&key) {
                return Ok(resolution.clone());
            }
        }

        let items = self.api.items_with_external_id(property, value).await?;
        let resolution = match items.as_slice() {
            [] => Resolution::None,
            [item] => Resolution::One(item.clone()),
            _ => Resolution::Ambiguous,
        };

        let mut memo = self
            .memo
            .lock()
            .map_err(|_| Error::Internal("resolver memo lock poisoned".into()))?;
        memo.insert(key, resolution.clone());
        Ok(resolution)
    }

    /// The item for this id when it is unique, `None` otherwise. An
    /// ambiguous id is logged; the caller falls back to an unknown-value
    /// slot rather than guessing.
    pub async fn resolve_one(&self, property: &str, value: &str) -> Result<Option<String>> {
        match self.resolve(property, value).await? {
            Resolution::One(item) => Ok(Some(item)),
            Resolution::None => Ok(None),
            Resolution::Ambiguous => {
                warn!(property, value, "External id matches multiple items");
                Ok(None)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
