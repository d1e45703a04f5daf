//! Lazily-populated per-source token bucket map (spec §4.4): each source
//! gets its own bucket so a slow source cannot starve the others.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::token_bucket::{TokenBucket, TokenBucketConfig};

pub struct SourceLimiters {
    config: TokenBucketConfig,
    buckets: RwLock<HashMap<String, Arc<TokenBucket>>>,
}

impl SourceLimiters {
    pub fn new(config: TokenBucketConfig) -> Self {
        SourceLimiters {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the bucket for `source`, creating it on first access.
    /// Double-checked locking: an optimistic read lock first, then a write
    /// lock re-checked before inserting, so concurrent callers racing to
    /// create the same source's bucket converge on one instance.
    pub fn bucket_for(&self, source: &str) -> Arc<TokenBucket> {
        if let Some(existing) = self.buckets.read().unwrap().get(source) {
            return Arc::clone(existing);
        }
        let mut buckets = self.buckets.write().unwrap();
        if let Some(existing) = buckets.get(source) {
            return Arc::clone(existing);
        }
        let bucket = Arc::new(TokenBucket::new(source, self.config));
        buckets.insert(source.to_string(), Arc::clone(&bucket));
        bucket
    }

    pub fn reset(&self) {
        self.buckets.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_sources_get_distinct_buckets() {
        let limiters = SourceLimiters::new(TokenBucketConfig::new(1.0, 1.0, 1.0));
        let a = limiters.bucket_for("source-a");
        let b = limiters.bucket_for("source-b");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn same_source_reuses_the_bucket() {
        let limiters = SourceLimiters::new(TokenBucketConfig::new(1.0, 1.0, 1.0));
        let a = limiters.bucket_for("source-a");
        let a2 = limiters.bucket_for("source-a");
        assert!(Arc::ptr_eq(&a, &a2));
    }

    #[test]
    fn a_slow_source_does_not_exhaust_another_sources_tokens() {
        let limiters = SourceLimiters::new(TokenBucketConfig::new(1.0, 0.001, 1.0));
        let slow = limiters.bucket_for("slow");
        assert!(slow.allow());
        assert!(!slow.allow());

        let other = limiters.bucket_for("fast");
        assert!(other.allow());
    }
}
