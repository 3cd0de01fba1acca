//! Dedup cache of user keys the consumer has already emitted an `index`
//! event for since the last reset.

use lru::LruCache;
use std::num::NonZeroUsize;

pub struct NoticeUsers(LruCache<String, ()>);

impl NoticeUsers {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or_else(|| NonZeroUsize::new(1).unwrap());
        Self(LruCache::new(cap))
    }

    /// Returns `true` iff `key` was already present (and therefore no
    /// `index` event is needed).
    pub fn notice(&mut self, key: &str) -> bool {
        if self.0.get(key).is_some() {
            return true;
        }
        self.0.put(key.to_owned(), ());
        false
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_is_idempotent() {
        let mut n = NoticeUsers::new(10);
        assert!(!n.notice("alice"));
        assert!(n.notice("alice"));
        assert!(n.notice("alice"));
    }

    #[test]
    fn clear_forgets_seen_keys() {
        let mut n = NoticeUsers::new(10);
        assert!(!n.notice("alice"));
        n.clear();
        assert!(!n.notice("alice"));
    }
}
