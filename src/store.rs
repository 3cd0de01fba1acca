//! The feature store: a concurrent, versioned repository of flags and
//! segments.

use crate::models::{Flag, Segment};
use arc_swap::ArcSwap;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, info};

/// Which of the two collections a store operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Flags,
    Segments,
}

/// A stored item: either live data or a versioned tombstone left behind by
/// a delete, so later out-of-order patches can still be compared by
/// version.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Flag(Flag),
    Segment(Segment),
    Tombstone { version: u64 },
}

impl Item {
    pub fn version(&self) -> u64 {
        match self {
            Item::Flag(f) => f.version,
            Item::Segment(s) => s.version,
            Item::Tombstone { version } => *version,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Item::Tombstone { .. })
    }

    pub fn as_flag(&self) -> Option<&Flag> {
        match self {
            Item::Flag(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Item::Segment(s) => Some(s),
            _ => None,
        }
    }
}

/// Contract implemented by the default in-memory store and any pluggable
/// external backend (Redis/Consul/DynamoDB); all must provide the same
/// version-checked compare-and-set semantics.
pub trait Store: Send + Sync {
    /// Atomically replaces the full contents of both collections. Readers
    /// never observe a half-applied init.
    fn init(&self, flags: HashMap<String, Item>, segments: HashMap<String, Item>);

    fn get(&self, kind: Kind, key: &str) -> Option<Item>;

    /// All non-deleted items of a kind.
    fn all(&self, kind: Kind) -> HashMap<String, Item>;

    /// Succeeds (returns true) only if there is no existing item for the
    /// key, or the existing item's version is strictly lower.
    fn upsert(&self, kind: Kind, key: &str, item: Item) -> bool;

    fn delete(&self, kind: Kind, key: &str, version: u64) -> bool {
        self.upsert(kind, key, Item::Tombstone { version })
    }

    fn initialized(&self) -> bool;

    /// Convenience used by the evaluator: fetch a flag by key, ignoring
    /// anything that isn't a live flag.
    fn flag(&self, key: &str) -> Option<Flag> {
        self.get(Kind::Flags, key).and_then(|i| match i {
            Item::Flag(f) => Some(f),
            _ => None,
        })
    }

    fn segment(&self, key: &str) -> Option<Segment> {
        self.get(Kind::Segments, key).and_then(|i| match i {
            Item::Segment(s) => Some(s),
            _ => None,
        })
    }
}

#[derive(Default)]
struct Snapshot {
    flags: HashMap<String, Item>,
    segments: HashMap<String, Item>,
}

/// Default in-memory [`Store`] implementation: an atomically-swapped
/// snapshot, the same `ArcSwap`-based approach the teacher used for its
/// (flags-only) map.
pub struct MemoryStore {
    snapshot: ArcSwap<Snapshot>,
    init: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(snap: &Snapshot, kind: Kind) -> &HashMap<String, Item> {
        match kind {
            Kind::Flags => &snap.flags,
            Kind::Segments => &snap.segments,
        }
    }

    /// Exported snapshot of non-deleted flags, for callers (e.g. `Client::export`)
    /// that want the whole current flag set.
    pub fn export_flags(&self) -> HashMap<String, Flag> {
        self.snapshot
            .load()
            .flags
            .iter()
            .filter_map(|(k, v)| v.as_flag().map(|f| (k.clone(), f.clone())))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            snapshot: ArcSwap::new(Arc::new(Snapshot::default())),
            init: AtomicBool::new(false),
        }
    }
}

impl Store for MemoryStore {
    fn init(&self, flags: HashMap<String, Item>, segments: HashMap<String, Item>) {
        info!(
            num_flags = flags.len(),
            num_segments = segments.len(),
            "replacing feature store contents"
        );
        self.snapshot.store(Arc::new(Snapshot { flags, segments }));
        self.init.store(true, Ordering::SeqCst);
    }

    fn get(&self, kind: Kind, key: &str) -> Option<Item> {
        let snap = self.snapshot.load();
        match Self::collection(&snap, kind).get(key) {
            Some(item) if item.is_tombstone() => None,
            Some(item) => Some(item.clone()),
            None => None,
        }
    }

    fn all(&self, kind: Kind) -> HashMap<String, Item> {
        let snap = self.snapshot.load();
        Self::collection(&snap, kind)
            .iter()
            .filter(|(_, v)| !v.is_tombstone())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn upsert(&self, kind: Kind, key: &str, item: Item) -> bool {
        loop {
            let current = self.snapshot.load();
            if let Some(existing) = Self::collection(&current, kind).get(key) {
                if existing.version() >= item.version() {
                    debug!(%key, "ignoring stale upsert, store already at a newer version");
                    return false;
                }
            }

            let mut next = Snapshot {
                flags: current.flags.clone(),
                segments: current.segments.clone(),
            };
            let map = match kind {
                Kind::Flags => &mut next.flags,
                Kind::Segments => &mut next.segments,
            };
            map.insert(key.to_owned(), item.clone());

            // ArcSwap has no native CAS on the inner value: re-check the
            // pointer we read against what's actually stored before
            // publishing, retrying if a concurrent writer won the race.
            let previous = self.snapshot.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&previous, &current) {
                return true;
            }
        }
    }

    fn initialized(&self) -> bool {
        self.init.load(Ordering::SeqCst)
    }
}
