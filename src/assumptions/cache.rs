//! Rate set cache keyed by policy key
//!
//! Building a rate set walks every row of the three tables, so a set is built
//! at most once per distinct key and then handed out as a shared `Arc`.

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{RateSet, RateSetBuilder};
use crate::error::ProjectionError;
use crate::policy::PolicyKey;

#[derive(Debug)]
pub struct RateSetCache {
    builder: RateSetBuilder,
    sets: RwLock<HashMap<PolicyKey, Arc<RateSet>>>,
}

impl RateSetCache {
    pub fn new(builder: RateSetBuilder) -> Self {
        Self {
            builder,
            sets: RwLock::new(HashMap::new()),
        }
    }

    pub fn builder(&self) -> &RateSetBuilder {
        &self.builder
    }

    /// Cached rate set for `key`, building it on first request
    pub fn get_or_build(&self, key: &PolicyKey) -> Result<Arc<RateSet>, ProjectionError> {
        if let Some(rates) = self.sets.read().unwrap_or_else(PoisonError::into_inner).get(key) {
            return Ok(Arc::clone(rates));
        }

        // Built outside the lock; a concurrent build of the same key is discarded
        let built = Arc::new(self.builder.build_key(key)?);
        let mut sets = self.sets.write().unwrap_or_else(PoisonError::into_inner);
        let rates = sets.entry(*key).or_insert_with(|| {
            debug!("Cached rate set for {}", key);
            built
        });
        Ok(Arc::clone(rates))
    }

    /// Rate sets for every distinct key, built before any fan-out
    pub fn prepare<'a, I>(&self, keys: I) -> Result<HashMap<PolicyKey, Arc<RateSet>>, ProjectionError>
    where
        I: IntoIterator<Item = &'a PolicyKey>,
    {
        let mut prepared = HashMap::new();
        for key in keys {
            if !prepared.contains_key(key) {
                prepared.insert(*key, self.get_or_build(key)?);
            }
        }
        Ok(prepared)
    }

    /// Number of distinct keys built so far
    pub fn len(&self) -> usize {
        self.sets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
