//! The user (end-user context) description passed into evaluation.

use crate::models::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An end user (or other evaluation context) description.
///
/// Only `key` is mandatory; every other built-in attribute is optional, and
/// arbitrary additional attributes live in `custom`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, rename = "custom", skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, AttributeValue>,
    /// Attribute names this specific user wants scrubbed from outbound
    /// events, in addition to any configured globally.
    #[serde(
        default,
        rename = "privateAttributeNames",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub private_attribute_names: Vec<String>,
}

impl User {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn builder(key: impl Into<String>) -> UserBuilder {
        UserBuilder(User::new(key))
    }

    /// Names of every attribute this user actually carries (built-ins that
    /// are `Some`, plus `custom` keys), excluding `key` itself. Used by the
    /// event pipeline's privacy transform to resolve `all_attributes_private`
    /// and `private_attribute_names` against what's actually present.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.ip.is_some() {
            names.push("ip".to_owned());
        }
        if self.country.is_some() {
            names.push("country".to_owned());
        }
        if self.email.is_some() {
            names.push("email".to_owned());
        }
        if self.first_name.is_some() {
            names.push("firstName".to_owned());
        }
        if self.last_name.is_some() {
            names.push("lastName".to_owned());
        }
        if self.avatar.is_some() {
            names.push("avatar".to_owned());
        }
        if self.name.is_some() {
            names.push("name".to_owned());
        }
        if self.anonymous.is_some() {
            names.push("anonymous".to_owned());
        }
        if self.secondary.is_some() {
            names.push("secondary".to_owned());
        }
        names.extend(self.custom.keys().cloned());
        names
    }

    /// Resolves a built-in or custom attribute by name.
    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "key" => Some(AttributeValue::String(self.key.clone())),
            "ip" => self.ip.clone().map(AttributeValue::String),
            "country" => self.country.clone().map(AttributeValue::String),
            "email" => self.email.clone().map(AttributeValue::String),
            "firstName" => self.first_name.clone().map(AttributeValue::String),
            "lastName" => self.last_name.clone().map(AttributeValue::String),
            "avatar" => self.avatar.clone().map(AttributeValue::String),
            "name" => self.name.clone().map(AttributeValue::String),
            "anonymous" => self.anonymous.map(AttributeValue::Bool),
            "secondary" => self.secondary.clone().map(AttributeValue::String),
            other => self.custom.get(other).cloned(),
        }
    }
}

/// Builder for [`User`], mirroring the fluent style used throughout this
/// crate's other builders (`FlagBuilder`, `ConfigBuilder`).
pub struct UserBuilder(User);

impl UserBuilder {
    pub fn ip(mut self, v: impl Into<String>) -> Self {
        self.0.ip = Some(v.into());
        self
    }

    pub fn country(mut self, v: impl Into<String>) -> Self {
        self.0.country = Some(v.into());
        self
    }

    pub fn email(mut self, v: impl Into<String>) -> Self {
        self.0.email = Some(v.into());
        self
    }

    pub fn first_name(mut self, v: impl Into<String>) -> Self {
        self.0.first_name = Some(v.into());
        self
    }

    pub fn last_name(mut self, v: impl Into<String>) -> Self {
        self.0.last_name = Some(v.into());
        self
    }

    pub fn avatar(mut self, v: impl Into<String>) -> Self {
        self.0.avatar = Some(v.into());
        self
    }

    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.0.name = Some(v.into());
        self
    }

    pub fn anonymous(mut self, v: bool) -> Self {
        self.0.anonymous = Some(v);
        self
    }

    pub fn secondary(mut self, v: impl Into<String>) -> Self {
        self.0.secondary = Some(v.into());
        self
    }

    pub fn custom(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.0.custom.insert(name.into(), value.into());
        self
    }

    pub fn private_attribute_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.0.private_attribute_names.extend(names);
        self
    }

    pub fn build(self) -> User {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_built_in_and_custom_attributes() {
        let user = User::builder("alice")
            .country("DE")
            .custom("plan", "gold")
            .build();
        assert_eq!(user.attribute("key"), Some(AttributeValue::String("alice".into())));
        assert_eq!(user.attribute("country"), Some(AttributeValue::String("DE".into())));
        assert_eq!(user.attribute("plan"), Some(AttributeValue::String("gold".into())));
        assert_eq!(user.attribute("missing"), None);
    }
}
