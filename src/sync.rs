//! Shared logic for applying a parsed [`Message`] onto a [`Store`], used by
//! both the polling and the streaming data source so the version-check
//! semantics live in exactly one place.

use crate::{
    message::Message,
    models::{Flag, Segment},
    store::{Item, Kind, Store},
};
use std::collections::HashMap;
use tracing::{trace, warn};

pub fn apply(store: &dyn Store, message: Message) {
    match message {
        Message::Put(data) => apply_put(store, data.flags, data.segments),
        Message::Patch(update) => apply_upsert(store, update),
        Message::Delete(update) => apply_delete(store, update),
    }
}

fn apply_put(store: &dyn Store, flags: HashMap<String, Flag>, segments: HashMap<String, Segment>) {
    trace!(
        num_flags = flags.len(),
        num_segments = segments.len(),
        "applying full snapshot"
    );
    let flags = flags.into_iter().map(|(k, v)| (k, Item::Flag(v))).collect();
    let segments = segments
        .into_iter()
        .map(|(k, v)| (k, Item::Segment(v)))
        .collect();
    store.init(flags, segments);
}

fn apply_upsert(store: &dyn Store, update: crate::message::PathUpdate) {
    let item = match (update.kind, update.flag, update.segment) {
        (Kind::Flags, Some(flag), _) => Item::Flag(flag),
        (Kind::Segments, _, Some(segment)) => Item::Segment(segment),
        _ => {
            warn!(key = %update.key, "patch missing its payload, ignoring");
            return;
        }
    };
    if !store.upsert(update.kind, &update.key, item) {
        trace!(key = %update.key, "ignored stale patch");
    }
}

fn apply_delete(store: &dyn Store, update: crate::message::PathUpdate) {
    let version = match update.version {
        Some(v) => v,
        None => {
            warn!(key = %update.key, "delete missing its version, ignoring");
            return;
        }
    };
    if !store.delete(update.kind, &update.key, version) {
        trace!(key = %update.key, "ignored stale delete");
    }
}
