//! Transforms internal event/user representations into the wire JSON the
//! events server expects, including the user privacy filter.

use super::{CustomEvent, FeatureEvent, IndexEvent};
use crate::{config::Config, user::User};
use std::collections::HashSet;

/// Applies `all_attributes_private` / `private_attribute_names` / the
/// user's own `privateAttributeNames`, returning the redacted wire form
/// plus the sorted list of names it stripped (emitted as `privateAttrs`).
pub fn transform_user(user: &User, config: &Config) -> serde_json::Value {
    let private: HashSet<String> = if config.all_attributes_private {
        user.attribute_names().into_iter().collect()
    } else {
        let mut set: HashSet<String> = config.private_attribute_names.iter().cloned().collect();
        set.extend(user.private_attribute_names.iter().cloned());
        set
    };

    let mut redacted = Vec::new();
    let mut obj = serde_json::Map::new();
    obj.insert("key".into(), serde_json::Value::String(user.key.clone()));

    macro_rules! field {
        ($name:literal, $value:expr) => {
            if let Some(v) = $value {
                if private.contains($name) {
                    redacted.push($name.to_owned());
                } else {
                    obj.insert($name.to_owned(), v);
                }
            }
        };
    }

    field!("ip", user.ip.clone().map(serde_json::Value::String));
    field!("country", user.country.clone().map(serde_json::Value::String));
    field!("email", user.email.clone().map(serde_json::Value::String));
    field!("firstName", user.first_name.clone().map(serde_json::Value::String));
    field!("lastName", user.last_name.clone().map(serde_json::Value::String));
    field!("avatar", user.avatar.clone().map(serde_json::Value::String));
    field!("name", user.name.clone().map(serde_json::Value::String));
    field!("secondary", user.secondary.clone().map(serde_json::Value::String));
    if let Some(anonymous) = user.anonymous {
        // not subject to privacy filtering, same as the key
        obj.insert("anonymous".into(), serde_json::Value::Bool(anonymous));
    }

    if !user.custom.is_empty() {
        let mut custom = serde_json::Map::new();
        for (k, v) in &user.custom {
            if private.contains(k) {
                redacted.push(k.clone());
            } else {
                custom.insert(k.clone(), v.clone().into());
            }
        }
        if !custom.is_empty() {
            obj.insert("custom".into(), serde_json::Value::Object(custom));
        }
    }

    redacted.sort();
    if !redacted.is_empty() {
        obj.insert(
            "privateAttrs".into(),
            serde_json::Value::Array(redacted.into_iter().map(serde_json::Value::String).collect()),
        );
    }

    serde_json::Value::Object(obj)
}

fn user_or_key(user: &User, config: &Config) -> serde_json::Value {
    if config.inline_users_in_events {
        transform_user(user, config)
    } else {
        serde_json::json!({ "userKey": user.key })
    }
}

pub fn feature_event(event: &FeatureEvent, config: &Config, debug: bool) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert(
        "kind".into(),
        serde_json::Value::String(if debug { "debug".into() } else { "feature".into() }),
    );
    obj.insert(
        "creationDate".into(),
        serde_json::json!(event.timestamp_millis),
    );
    obj.insert("key".into(), serde_json::Value::String(event.flag_key.clone()));
    obj.insert("value".into(), event.value.clone());
    obj.insert("default".into(), event.default.clone());
    if let Some(v) = event.variation_index {
        obj.insert("variation".into(), serde_json::json!(v));
    }
    if let Some(v) = event.version {
        obj.insert("version".into(), serde_json::json!(v));
    }
    if let Some(reason) = &event.reason {
        obj.insert(
            "reason".into(),
            serde_json::to_value(reason).unwrap_or(serde_json::Value::Null),
        );
    }
    if let Some(prereq_of) = &event.prereq_of {
        obj.insert("prereqOf".into(), serde_json::Value::String(prereq_of.clone()));
    }

    if debug || config.inline_users_in_events {
        obj.insert("user".into(), transform_user(&event.user, config));
    } else {
        obj.insert("userKey".into(), serde_json::Value::String(event.user.key.clone()));
    }

    serde_json::Value::Object(obj)
}

pub fn identify_event(user: &User, config: &Config, timestamp_millis: i64) -> serde_json::Value {
    serde_json::json!({
        "kind": "identify",
        "creationDate": timestamp_millis,
        "key": user.key,
        "user": transform_user(user, config),
    })
}

pub fn index_event(event: &IndexEvent, config: &Config) -> serde_json::Value {
    serde_json::json!({
        "kind": "index",
        "creationDate": event.timestamp_millis,
        "user": transform_user(&event.user, config),
    })
}

pub fn custom_event(event: &CustomEvent, config: &Config) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert("kind".into(), serde_json::Value::String("custom".into()));
    obj.insert("creationDate".into(), serde_json::json!(event.timestamp_millis));
    obj.insert("key".into(), serde_json::Value::String(event.key.clone()));
    if config.inline_users_in_events {
        obj.insert("user".into(), transform_user(&event.user, config));
    } else {
        obj.insert("userKey".into(), serde_json::Value::String(event.user.key.clone()));
    }
    if let Some(data) = &event.data {
        obj.insert("data".into(), data.clone());
    }
    serde_json::Value::Object(obj)
}

pub fn summary_event(summary: super::summarizer::Summary) -> serde_json::Value {
    let features: serde_json::Map<String, serde_json::Value> = summary
        .features
        .into_iter()
        .map(|(flag_key, feature)| {
            let counters: Vec<serde_json::Value> = feature
                .counters
                .into_iter()
                .map(|c| {
                    let mut row = serde_json::Map::new();
                    row.insert("value".into(), c.value);
                    row.insert("count".into(), serde_json::json!(c.count));
                    match c.variation {
                        Some(v) => {
                            row.insert("variation".into(), serde_json::json!(v));
                        }
                        None => {
                            row.insert("unknown".into(), serde_json::json!(true));
                        }
                    }
                    if let Some(version) = c.version {
                        row.insert("version".into(), serde_json::json!(version));
                    }
                    serde_json::Value::Object(row)
                })
                .collect();
            (
                flag_key,
                serde_json::json!({ "default": feature.default, "counters": counters }),
            )
        })
        .collect();

    serde_json::json!({
        "kind": "summary",
        "startDate": summary.start_date,
        "endDate": summary.end_date,
        "features": serde_json::Value::Object(features),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_attributes_private_strips_every_non_key_attribute() {
        let user = User::builder("alice")
            .country("DE")
            .custom("plan", "gold")
            .build();
        let config = Config::builder().all_attributes_private(true).build();
        let wire = transform_user(&user, &config);
        assert_eq!(wire["key"], "alice");
        assert!(wire.get("country").is_none());
        assert!(wire.get("custom").is_none());
        let private_attrs = wire["privateAttrs"].as_array().unwrap();
        assert!(private_attrs.iter().any(|v| v == "country"));
        assert!(private_attrs.iter().any(|v| v == "plan"));
    }

    #[test]
    fn per_user_private_attribute_names_are_honored() {
        let user = User::builder("alice")
            .country("DE")
            .email("alice@example.com")
            .private_attribute_names(vec!["email".to_owned()])
            .build();
        let config = Config::builder().build();
        let wire = transform_user(&user, &config);
        assert_eq!(wire["country"], "DE");
        assert!(wire.get("email").is_none());
        assert_eq!(wire["privateAttrs"], serde_json::json!(["email"]));
    }
}
