//! Test doubles shared across this crate's unit tests: a builder for flags,
//! an in-memory store that skips version checks, and a data source that
//! never produces anything (useful for exercising offline-ish code paths).

use crate::{
    models::{
        Flag, Prerequisite, Rollout, Rule, Segment, Target, VariationOrRollout, WeightedVariation,
    },
    source::{DataSource, ReadySignal},
    store::{Item, Kind, Store},
};
use std::{collections::HashMap, sync::Arc};

pub struct MockStore {
    flags: HashMap<String, Flag>,
    segments: HashMap<String, Segment>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            flags: HashMap::new(),
            segments: HashMap::new(),
        }
    }

    pub fn add(&mut self, flag: Flag) {
        self.flags.insert(flag.key.clone(), flag);
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.insert(segment.key.clone(), segment);
    }
}

impl Store for MockStore {
    fn init(&self, _flags: HashMap<String, Item>, _segments: HashMap<String, Item>) {}

    fn get(&self, kind: Kind, key: &str) -> Option<Item> {
        match kind {
            Kind::Flags => self.flags.get(key).cloned().map(Item::Flag),
            Kind::Segments => self.segments.get(key).cloned().map(Item::Segment),
        }
    }

    fn all(&self, kind: Kind) -> HashMap<String, Item> {
        match kind {
            Kind::Flags => self
                .flags
                .iter()
                .map(|(k, v)| (k.clone(), Item::Flag(v.clone())))
                .collect(),
            Kind::Segments => self
                .segments
                .iter()
                .map(|(k, v)| (k.clone(), Item::Segment(v.clone())))
                .collect(),
        }
    }

    fn upsert(&self, _kind: Kind, _key: &str, _item: Item) -> bool {
        true
    }

    fn initialized(&self) -> bool {
        true
    }
}

/// A [`DataSource`] that never starts anything: used in tests that only
/// care about evaluation against a pre-populated store.
pub struct NullSource;

#[async_trait::async_trait]
impl DataSource for NullSource {
    async fn start(self: Arc<Self>) -> ReadySignal {
        ReadySignal::ready(true)
    }

    async fn stop(&self) {}

    fn initialized(&self) -> bool {
        true
    }
}

pub struct FlagBuilder(Flag);

impl Default for FlagBuilder {
    fn default() -> Self {
        Self(Flag {
            fallthrough: VariationOrRollout {
                variation: Some(0),
                rollout: None,
            },
            key: "my_test_flag".into(),
            off_variation: Some(0),
            on: true,
            salt: "test-salt".into(),
            variations: vec![false.into(), true.into()],
            ..Default::default()
        })
    }
}

#[allow(dead_code)]
impl FlagBuilder {
    pub fn off(mut self) -> Self {
        self.0.on = false;
        self
    }

    pub fn on(mut self) -> Self {
        self.0.on = true;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.0.key = key.into();
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.0.salt = salt.into();
        self
    }

    pub fn with_off_variation(mut self, idx: usize) -> Self {
        self.0.off_variation = Some(idx);
        self
    }

    pub fn with_variations<I, V>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        self.0.variations = iter.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallthrough_variation(mut self, idx: usize) -> Self {
        self.0.fallthrough = VariationOrRollout {
            variation: Some(idx),
            rollout: None,
        };
        self
    }

    pub fn with_fallthrough_rollout<I>(mut self, variations: I) -> Self
    where
        I: IntoIterator<Item = (usize, i64)>,
    {
        let variations = variations
            .into_iter()
            .map(|(variation, weight)| WeightedVariation { variation, weight })
            .collect();
        self.0.fallthrough = VariationOrRollout {
            variation: None,
            rollout: Some(Rollout {
                variations,
                bucket_by: None,
            }),
        };
        self
    }

    pub fn with_prerequisite(mut self, key: impl Into<String>, variation: usize) -> Self {
        self.0.prerequisites.push(Prerequisite {
            key: key.into(),
            variation,
        });
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.0.rules.push(rule);
        self
    }

    pub fn track_events(mut self) -> Self {
        self.0.track_events = true;
        self
    }

    pub fn debug_until(mut self, epoch_ms: i64) -> Self {
        self.0.debug_events_until_date = Some(epoch_ms);
        self
    }

    pub fn clear_targets(mut self) -> Self {
        self.0.targets = Default::default();
        self
    }

    pub fn add_target(mut self, variation: usize, value: impl Into<String>) -> Self {
        if let Some(target) = self.0.targets.iter_mut().find(|t| t.variation == variation) {
            target.values.push(value.into());
        } else {
            self.0.targets.push(Target {
                variation,
                values: vec![value.into()],
            });
        }
        self
    }

    pub fn into_inner(self) -> Flag {
        self.0
    }
}

#[allow(dead_code)]
pub fn version_bump(mut flag: Flag, version: u64) -> Flag {
    flag.version = version;
    flag
}
