//! Folds `feature` evaluations into per-flag counters between flushes.

use std::collections::HashMap;

#[derive(Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    variation: Option<usize>,
    version: Option<u64>,
    // serde_json::Value has no Hash impl; canonical string form keys the map.
    value: String,
}

struct Counter {
    value: serde_json::Value,
    count: u64,
}

#[derive(Default)]
struct FeatureCounters {
    default: serde_json::Value,
    counters: HashMap<CounterKey, Counter>,
}

/// A snapshot ready to be shipped as a `summary` wire event.
pub struct Summary {
    pub start_date: i64,
    pub end_date: i64,
    pub features: HashMap<String, FeatureSummary>,
}

pub struct FeatureSummary {
    pub default: serde_json::Value,
    pub counters: Vec<CounterRow>,
}

pub struct CounterRow {
    pub value: serde_json::Value,
    pub count: u64,
    pub variation: Option<usize>,
    pub version: Option<u64>,
}

#[derive(Default)]
pub struct Summarizer {
    start_date: Option<i64>,
    end_date: Option<i64>,
    features: HashMap<String, FeatureCounters>,
}

impl Summarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(
        &mut self,
        flag_key: &str,
        value: &serde_json::Value,
        variation: Option<usize>,
        version: Option<u64>,
        default: &serde_json::Value,
        timestamp_millis: i64,
    ) {
        self.start_date = Some(self.start_date.map_or(timestamp_millis, |d| d.min(timestamp_millis)));
        self.end_date = Some(self.end_date.map_or(timestamp_millis, |d| d.max(timestamp_millis)));

        let entry = self.features.entry(flag_key.to_owned()).or_insert_with(|| {
            FeatureCounters {
                default: default.clone(),
                counters: HashMap::new(),
            }
        });

        let key = CounterKey {
            variation,
            version,
            value: value.to_string(),
        };
        let counter = entry.counters.entry(key).or_insert_with(|| Counter {
            value: value.clone(),
            count: 0,
        });
        counter.count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Takes the accumulated counters and resets state for the next window.
    pub fn snapshot_and_reset(&mut self) -> Option<Summary> {
        if self.features.is_empty() {
            return None;
        }
        let start_date = self.start_date.take().unwrap_or(0);
        let end_date = self.end_date.take().unwrap_or(0);
        let features = std::mem::take(&mut self.features)
            .into_iter()
            .map(|(flag_key, counters)| {
                let rows = counters
                    .counters
                    .into_iter()
                    .map(|(key, c)| CounterRow {
                        value: c.value,
                        count: c.count,
                        variation: key.variation,
                        version: key.version,
                    })
                    .collect::<Vec<_>>();
                (
                    flag_key,
                    FeatureSummary {
                        default: counters.default,
                        counters: rows,
                    },
                )
            })
            .collect();
        Some(Summary {
            start_date,
            end_date,
            features,
        })
    }
}
