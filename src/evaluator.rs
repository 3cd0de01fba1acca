//! The flag evaluator: a pure function that interprets a flag's rule
//! structure against a user and returns a variation plus an explanatory
//! reason. No I/O, no locking beyond what the store exposes for reads.

use crate::{
    models::{AttributeValue, Clause, Flag, Operator, Rollout, Rule, Segment, SegmentRule},
    store::Store,
    user::User,
};
use hex::ToHex;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::ops::Div;
use tracing::warn;

const BUCKET_DIVIDER: f64 = 0xFFFFFFFFFFFFFFFu64 as f64;

/// Kind of internal evaluation error, surfaced to callers only wrapped in
/// [`Reason::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ClientNotReady,
    FlagNotFound,
    UserNotSpecified,
    MalformedFlag,
    Exception,
    WrongType,
}

/// Explains why an evaluation produced the value it did.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Reason {
    Off,
    Fallthrough,
    TargetMatch,
    RuleMatch {
        #[serde(rename = "ruleIndex")]
        rule_index: usize,
        #[serde(rename = "ruleId")]
        rule_id: Option<String>,
    },
    PrerequisiteFailed {
        key: String,
    },
    Error {
        #[serde(rename = "errorKind")]
        kind: ErrorKind,
    },
}

/// Internal-only error raised while walking a flag's rule structure.
/// Never escapes `evaluate`: the caller maps it onto [`Reason::Error`].
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("malformed flag: {0}")]
    MalformedFlag(&'static str),
}

impl From<&Error> for ErrorKind {
    fn from(e: &Error) -> Self {
        match e {
            Error::MalformedFlag(_) => ErrorKind::MalformedFlag,
        }
    }
}

/// Result of a single flag evaluation.
#[derive(Clone, Debug, Serialize)]
pub struct EvaluationDetail {
    pub value: serde_json::Value,
    #[serde(rename = "variationIndex")]
    pub variation_index: Option<usize>,
    pub reason: Reason,
}

impl EvaluationDetail {
    fn from_index(flag: &Flag, index: usize, reason: Reason) -> Self {
        match flag.variation_value(index) {
            Some(value) => Self {
                value: value.clone(),
                variation_index: Some(index),
                reason,
            },
            None => Self::error(serde_json::Value::Null, ErrorKind::MalformedFlag),
        }
    }

    fn error(default: serde_json::Value, kind: ErrorKind) -> Self {
        Self {
            value: default,
            variation_index: None,
            reason: Reason::Error { kind },
        }
    }
}

/// A synthetic `feature` event emitted for a prerequisite flag evaluated
/// along the way; the pipeline folds these into the summary exactly like a
/// top-level evaluation, tagged with the flag that required them.
#[derive(Clone, Debug)]
pub struct PrerequisiteEvent {
    pub flag_key: String,
    pub flag_version: u64,
    pub variation_index: Option<usize>,
    pub value: serde_json::Value,
    pub prereq_of: String,
    pub track_events: bool,
    pub debug_events_until_date: Option<i64>,
}

/// Evaluates `flag` for `user`, consulting `store` for prerequisites and
/// segments. Pure: no I/O beyond the store's (already in-memory) reads.
pub fn evaluate(
    flag: &Flag,
    user: Option<&User>,
    store: &dyn Store,
) -> (EvaluationDetail, Vec<PrerequisiteEvent>) {
    let user = match user.filter(|u| !u.key.is_empty()) {
        Some(u) => u,
        None => {
            return (
                EvaluationDetail::error(serde_json::Value::Null, ErrorKind::UserNotSpecified),
                Vec::new(),
            )
        }
    };

    let mut prereq_events = Vec::new();
    match evaluate_index(flag, user, store, &mut prereq_events) {
        Ok((index, reason)) => (
            EvaluationDetail::from_index(flag, index, reason),
            prereq_events,
        ),
        Err(e) => (
            EvaluationDetail::error(serde_json::Value::Null, ErrorKind::from(&e)),
            prereq_events,
        ),
    }
}

fn evaluate_index(
    flag: &Flag,
    user: &User,
    store: &dyn Store,
    prereq_events: &mut Vec<PrerequisiteEvent>,
) -> Result<(usize, Reason), Error> {
    if !flag.on {
        return match flag.off_variation {
            Some(idx) => Ok((idx, Reason::Off)),
            None => Err(Error::MalformedFlag("off with no offVariation")),
        };
    }

    if let Some(failed_key) = check_prerequisites(flag, user, store, prereq_events)? {
        return match flag.off_variation {
            Some(idx) => Ok((idx, Reason::PrerequisiteFailed { key: failed_key })),
            None => Err(Error::MalformedFlag(
                "prerequisite failed with no offVariation",
            )),
        };
    }

    if let Some(idx) = match_targets(flag, user) {
        return Ok((idx, Reason::TargetMatch));
    }

    if let Some((idx, rule_index, rule_id)) = match_rules(flag, user, store)? {
        return Ok((
            idx,
            Reason::RuleMatch {
                rule_index,
                rule_id,
            },
        ));
    }

    let idx = fallthrough(flag, user)?;
    Ok((idx, Reason::Fallthrough))
}

/// Returns `Some(key)` of the first failed prerequisite, or `None` if all
/// pass. Errors evaluating a prerequisite count as that prerequisite
/// failing, per spec.
fn check_prerequisites(
    flag: &Flag,
    user: &User,
    store: &dyn Store,
    prereq_events: &mut Vec<PrerequisiteEvent>,
) -> Result<Option<String>, Error> {
    for prereq in &flag.prerequisites {
        let prereq_flag = match store.flag(&prereq.key) {
            Some(f) => f,
            None => return Ok(Some(prereq.key.clone())),
        };

        let mut nested_events = Vec::new();
        let result = evaluate_index(&prereq_flag, user, store, &mut nested_events);
        prereq_events.extend(nested_events);

        let (matched, variation_index, value) = match &result {
            Ok((idx, _)) => (
                *idx == prereq.variation,
                Some(*idx),
                prereq_flag
                    .variation_value(*idx)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
            ),
            Err(_) => (false, None, serde_json::Value::Null),
        };

        prereq_events.push(PrerequisiteEvent {
            flag_key: prereq_flag.key.clone(),
            flag_version: prereq_flag.version,
            variation_index,
            value,
            prereq_of: flag.key.clone(),
            track_events: prereq_flag.track_events,
            debug_events_until_date: prereq_flag.debug_events_until_date,
        });

        if !prereq_flag.on || !matched {
            return Ok(Some(prereq.key.clone()));
        }
    }
    Ok(None)
}

fn match_targets(flag: &Flag, user: &User) -> Option<usize> {
    flag.targets
        .iter()
        .find(|t| t.values.iter().any(|v| v == &user.key))
        .map(|t| t.variation)
}

fn match_rules(
    flag: &Flag,
    user: &User,
    store: &dyn Store,
) -> Result<Option<(usize, usize, Option<String>)>, Error> {
    for (i, rule) in flag.rules.iter().enumerate() {
        if clauses_match(&rule.clauses, user, store) {
            let idx = select_variation(&rule.selector, &flag.key, &flag.salt, user)?;
            return Ok(Some((idx, i, rule.id.clone())));
        }
    }
    Ok(None)
}

fn fallthrough(flag: &Flag, user: &User) -> Result<usize, Error> {
    select_variation(&flag.fallthrough, &flag.key, &flag.salt, user)
}

fn select_variation(
    selector: &crate::models::VariationOrRollout,
    flag_key: &str,
    salt: &str,
    user: &User,
) -> Result<usize, Error> {
    if let Some(idx) = selector.variation {
        return Ok(idx);
    }
    let rollout = selector.rollout.as_ref().ok_or(Error::MalformedFlag(
        "selector has neither variation nor rollout",
    ))?;
    rollout_variation(rollout, flag_key, salt, user)
}

fn rollout_variation(
    rollout: &Rollout,
    flag_key: &str,
    salt: &str,
    user: &User,
) -> Result<usize, Error> {
    if rollout.variations.is_empty() {
        return Err(Error::MalformedFlag("rollout has no variations"));
    }

    let bucket_by = rollout.bucket_by.as_deref().unwrap_or("key");
    let bucket = compute_bucket(flag_key, salt, bucket_by, user);

    let mut sum = 0f64;
    for wv in &rollout.variations {
        sum += wv.weight as f64 / 100_000f64;
        if bucket < sum {
            return Ok(wv.variation);
        }
    }
    // malformed data (weights sum to < 1): fall back to the last variation
    Ok(rollout.variations.last().unwrap().variation)
}

/// Computes the deterministic [0,1) bucket for a user against a given
/// bucketing key/salt combination, used by both flag rollouts and
/// weighted segment rules.
fn compute_bucket(key: &str, salt: &str, bucket_by: &str, user: &User) -> f64 {
    let user_value = match user.attribute(bucket_by).and_then(|v| v.bucket_string()) {
        Some(s) => s,
        None => return 0.0,
    };

    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(b".");
    hasher.update(salt.as_bytes());
    hasher.update(b".");
    hasher.update(user_value.as_bytes());
    if let Some(secondary) = &user.secondary {
        hasher.update(b".");
        hasher.update(secondary.as_bytes());
    }
    let hash = hasher.finalize();

    let mut hex: String = hash.encode_hex();
    hex.truncate(15);
    let val = u64::from_str_radix(&hex, 16).unwrap_or(0) as f64;
    val.div(BUCKET_DIVIDER)
}

fn clauses_match(clauses: &[Clause], user: &User, store: &dyn Store) -> bool {
    clauses.iter().all(|c| clause_matches(c, user, store))
}

fn clause_matches(clause: &Clause, user: &User, store: &dyn Store) -> bool {
    if clause.op == Operator::SegmentMatch {
        let matched = clause
            .values
            .iter()
            .filter_map(|v| v.as_str())
            .any(|segment_key| segment_matches(segment_key, user, store));
        return matched != clause.negate;
    }

    let resolved = user.attribute(&clause.attribute);
    let matched = match resolved {
        None => false,
        Some(AttributeValue::Array(items)) => items.iter().any(|item| {
            clause
                .values
                .iter()
                .any(|lit| operator_matches(&clause.op, item, lit))
        }),
        Some(scalar) => clause
            .values
            .iter()
            .any(|lit| operator_matches(&clause.op, &scalar, lit)),
    };
    matched != clause.negate
}

fn segment_matches(segment_key: &str, user: &User, store: &dyn Store) -> bool {
    let segment = match store.segment(segment_key) {
        Some(s) => s,
        None => return false,
    };
    segment_matches_loaded(&segment, user, store)
}

fn segment_matches_loaded(segment: &Segment, user: &User, store: &dyn Store) -> bool {
    if segment.included.contains(&user.key) {
        return true;
    }
    if segment.excluded.contains(&user.key) {
        return false;
    }
    segment
        .rules
        .iter()
        .any(|rule| segment_rule_matches(rule, segment, user, store))
}

fn segment_rule_matches(
    rule: &SegmentRule,
    segment: &Segment,
    user: &User,
    store: &dyn Store,
) -> bool {
    if !clauses_match(&rule.clauses, user, store) {
        return false;
    }
    match rule.weight {
        None => true,
        Some(weight) => {
            let bucket_by = rule.bucket_by.as_deref().unwrap_or("key");
            let bucket = compute_bucket(&segment.key, &segment.salt, bucket_by, user);
            bucket < weight as f64 / 100_000f64
        }
    }
}

fn operator_matches(op: &Operator, a: &AttributeValue, b: &AttributeValue) -> bool {
    match op {
        Operator::In => a == b,
        Operator::StartsWith => str_op(a, b, |a, b| a.starts_with(b)),
        Operator::EndsWith => str_op(a, b, |a, b| a.ends_with(b)),
        Operator::Contains => str_op(a, b, |a, b| a.contains(b)),
        Operator::Matches => match (a.as_str(), b.as_str()) {
            (Some(a), Some(pattern)) => regex::Regex::new(pattern)
                .map(|re| re.is_match(a))
                .unwrap_or(false),
            _ => false,
        },
        Operator::LessThan => numeric_op(a, b, |a, b| a < b),
        Operator::LessThanOrEqual => numeric_op(a, b, |a, b| a <= b),
        Operator::GreaterThan => numeric_op(a, b, |a, b| a > b),
        Operator::GreaterThanOrEqual => numeric_op(a, b, |a, b| a >= b),
        Operator::Before => date_op(a, b, |a, b| a < b),
        Operator::After => date_op(a, b, |a, b| a > b),
        Operator::SemVerEqual => semver_op(a, b, std::cmp::Ordering::is_eq),
        Operator::SemVerLessThan => semver_op(a, b, std::cmp::Ordering::is_lt),
        Operator::SemVerGreaterThan => semver_op(a, b, std::cmp::Ordering::is_gt),
        Operator::SegmentMatch => false, // handled by the caller before reaching here
        Operator::Unknown => {
            warn!("unknown clause operator, treating clause as non-matching");
            false
        }
    }
}

fn str_op(a: &AttributeValue, b: &AttributeValue, f: impl Fn(&str, &str) -> bool) -> bool {
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn numeric_op(a: &AttributeValue, b: &AttributeValue, f: impl Fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn parse_millis(v: &AttributeValue) -> Option<i64> {
    match v {
        AttributeValue::Number(n) => Some(*n as i64),
        AttributeValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.timestamp_millis()),
        _ => None,
    }
}

fn date_op(a: &AttributeValue, b: &AttributeValue, f: impl Fn(i64, i64) -> bool) -> bool {
    match (parse_millis(a), parse_millis(b)) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

/// Parses a semver string, retrying up to twice with `.0` appended to fill
/// in a missing minor/patch component (e.g. `"2"` -> `"2.0"` -> `"2.0.0"`).
fn parse_semver(s: &str) -> Option<semver::Version> {
    let mut candidate = s.to_owned();
    for _ in 0..3 {
        if let Ok(v) = semver::Version::parse(&candidate) {
            return Some(v);
        }
        candidate.push_str(".0");
    }
    None
}

fn semver_op(a: &AttributeValue, b: &AttributeValue, f: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    match (a.as_str().and_then(parse_semver), b.as_str().and_then(parse_semver)) {
        (Some(a), Some(b)) => f(a.cmp(&b)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FlagBuilder, MockStore};

    #[test]
    fn target_match() {
        let store = MockStore::new();
        let flag = FlagBuilder::default()
            .on()
            .with_key("f")
            .add_target(1, "alice")
            .into_inner();
        let user = User::new("alice");
        let (detail, _) = evaluate(&flag, Some(&user), &store);
        assert_eq!(detail.value, serde_json::json!(true));
        assert_eq!(detail.reason, Reason::TargetMatch);
    }

    #[test]
    fn fallthrough_rollout_is_deterministic() {
        let store = MockStore::new();
        let flag = FlagBuilder::default()
            .on()
            .with_key("f")
            .with_salt("abc")
            .with_variations(vec!["a", "b"])
            .with_fallthrough_rollout(vec![(0, 50_000), (1, 50_000)])
            .into_inner();
        let user = User::new("userkey-1");
        let (d1, _) = evaluate(&flag, Some(&user), &store);
        let (d2, _) = evaluate(&flag, Some(&user), &store);
        assert_eq!(d1.value, d2.value);
        assert_eq!(d1.reason, Reason::Fallthrough);
    }

    #[test]
    fn prerequisite_failed_short_circuits_to_off_variation() {
        let mut store = MockStore::new();
        let prereq = FlagBuilder::default().off().with_key("B").into_inner();
        store.add(prereq);

        let flag = FlagBuilder::default()
            .on()
            .with_key("A")
            .with_prerequisite("B", 1)
            .into_inner();
        let user = User::new("anyone");
        let (detail, events) = evaluate(&flag, Some(&user), &store);
        assert_eq!(detail.variation_index, flag.off_variation);
        assert_eq!(
            detail.reason,
            Reason::PrerequisiteFailed { key: "B".into() }
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].flag_key, "B");
    }

    #[test]
    fn unknown_operator_does_not_abort_evaluation() {
        let store = MockStore::new();
        let mut flag = FlagBuilder::default().on().with_key("f").into_inner();
        flag.rules.push(Rule {
            id: Some("r0".into()),
            clauses: vec![Clause {
                attribute: "plan".into(),
                op: Operator::Unknown,
                values: vec![AttributeValue::String("gold".into())],
                negate: false,
            }],
            selector: crate::models::VariationOrRollout {
                variation: Some(0),
                rollout: None,
            },
            track_events: false,
        });
        flag.rules.push(Rule {
            id: Some("r1".into()),
            clauses: vec![Clause {
                attribute: "key".into(),
                op: Operator::In,
                values: vec![AttributeValue::String("match-me".into())],
                negate: false,
            }],
            selector: crate::models::VariationOrRollout {
                variation: Some(1),
                rollout: None,
            },
            track_events: false,
        });

        let user = User::new("match-me");
        let (detail, _) = evaluate(&flag, Some(&user), &store);
        assert_eq!(
            detail.reason,
            Reason::RuleMatch {
                rule_index: 1,
                rule_id: Some("r1".into())
            }
        );
    }

    #[test]
    fn missing_segment_in_segment_match_is_false_not_error() {
        let store = MockStore::new();
        let mut flag = FlagBuilder::default().on().with_key("f").into_inner();
        flag.rules.push(Rule {
            id: Some("r0".into()),
            clauses: vec![Clause {
                attribute: "".into(),
                op: Operator::SegmentMatch,
                values: vec![AttributeValue::String("missing-segment".into())],
                negate: false,
            }],
            selector: crate::models::VariationOrRollout {
                variation: Some(1),
                rollout: None,
            },
            track_events: false,
        });

        let user = User::new("anyone");
        let (detail, _) = evaluate(&flag, Some(&user), &store);
        assert_eq!(detail.reason, Reason::Fallthrough);
    }

    #[test]
    fn missing_user_key_is_an_error() {
        let store = MockStore::new();
        let flag = FlagBuilder::default().on().with_key("f").into_inner();
        let (detail, _) = evaluate(&flag, None, &store);
        assert_eq!(
            detail.reason,
            Reason::Error {
                kind: ErrorKind::UserNotSpecified
            }
        );
    }

    #[test]
    fn empty_variations_is_malformed() {
        let store = MockStore::new();
        let flag = FlagBuilder::default()
            .on()
            .with_key("f")
            .with_variations(Vec::<&str>::new())
            .into_inner();
        let user = User::new("anyone");
        let (detail, _) = evaluate(&flag, Some(&user), &store);
        assert_eq!(
            detail.reason,
            Reason::Error {
                kind: ErrorKind::MalformedFlag
            }
        );
    }

    #[test]
    fn rollout_weights_summing_to_100000_route_every_user() {
        let flag = FlagBuilder::default()
            .on()
            .with_key("f")
            .with_salt("abc")
            .with_variations(vec!["a", "b"])
            .with_fallthrough_rollout(vec![(1, 100_000)])
            .into_inner();
        let store = MockStore::new();
        for key in ["alice", "bob", "carol", "dave"] {
            let user = User::new(key);
            let (detail, _) = evaluate(&flag, Some(&user), &store);
            assert_eq!(detail.value, serde_json::json!("b"));
        }
    }

    #[test]
    fn segment_match_via_included_keys() {
        let mut store = MockStore::new();
        store.add_segment(Segment {
            key: "beta-testers".into(),
            version: 1,
            included: ["alice".to_owned()].into_iter().collect(),
            ..Default::default()
        });

        let mut flag = FlagBuilder::default().on().with_key("f").into_inner();
        flag.rules.push(Rule {
            id: Some("r0".into()),
            clauses: vec![Clause {
                attribute: String::new(),
                op: Operator::SegmentMatch,
                values: vec![AttributeValue::String("beta-testers".into())],
                negate: false,
            }],
            selector: crate::models::VariationOrRollout {
                variation: Some(1),
                rollout: None,
            },
            track_events: false,
        });

        let matched = User::new("alice");
        let (detail, _) = evaluate(&flag, Some(&matched), &store);
        assert_eq!(detail.reason, Reason::RuleMatch { rule_index: 0, rule_id: Some("r0".into()) });

        let unmatched = User::new("eve");
        let (detail, _) = evaluate(&flag, Some(&unmatched), &store);
        assert_eq!(detail.reason, Reason::Fallthrough);
    }

    #[test]
    fn segment_excluded_key_never_matches_even_if_rules_would() {
        let mut store = MockStore::new();
        store.add_segment(Segment {
            key: "everyone".into(),
            version: 1,
            excluded: ["eve".to_owned()].into_iter().collect(),
            rules: vec![SegmentRule {
                clauses: vec![Clause {
                    attribute: "key".into(),
                    op: Operator::In,
                    values: vec![AttributeValue::String("eve".into())],
                    negate: false,
                }],
                weight: None,
                bucket_by: None,
            }],
            ..Default::default()
        });

        assert!(!segment_matches("everyone", &User::new("eve"), &store));
    }

    #[test]
    fn weighted_segment_rule_buckets_deterministically() {
        let segment = Segment {
            key: "half".into(),
            version: 1,
            salt: "xyz".into(),
            rules: vec![SegmentRule {
                clauses: vec![],
                weight: Some(100_000),
                bucket_by: None,
            }],
            ..Default::default()
        };
        let store = MockStore::new();
        let user = User::new("whoever");
        // weight 100000 == 100%, every user matches
        assert!(segment_matches_loaded(&segment, &user, &store));
    }

    #[test]
    fn semver_operator_compares_after_zero_fill() {
        assert!(operator_matches(
            &Operator::SemVerLessThan,
            &AttributeValue::String("2".into()),
            &AttributeValue::String("2.1".into()),
        ));
        assert!(operator_matches(
            &Operator::SemVerEqual,
            &AttributeValue::String("2.0".into()),
            &AttributeValue::String("2.0.0".into()),
        ));
    }

    #[test]
    fn date_operator_compares_rfc3339_and_epoch_millis() {
        assert!(operator_matches(
            &Operator::Before,
            &AttributeValue::String("2020-01-01T00:00:00Z".into()),
            &AttributeValue::Number(1893456000000.0), // 2030-01-01
        ));
        assert!(operator_matches(
            &Operator::After,
            &AttributeValue::Number(1893456000000.0),
            &AttributeValue::String("2020-01-01T00:00:00Z".into()),
        ));
    }

    #[test]
    fn regex_failing_to_compile_does_not_match() {
        assert!(!operator_matches(
            &Operator::Matches,
            &AttributeValue::String("anything".into()),
            &AttributeValue::String("(unterminated".into()),
        ));
    }
}
