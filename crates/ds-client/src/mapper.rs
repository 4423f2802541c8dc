//! Profile attribute mapping.
//!
//! Maps directory attributes to a [`UserProfile`] using the attribute names
//! configured in [`DirectoryConfig`].

use serde::{Deserialize, Serialize};

use crate::config::DirectoryConfig;
use crate::diff::{AttributeMap, AttributeValue};
use crate::search::DirectoryEntry;

/// Profile attributes of a directory user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Distinguished Name.
    pub dn: String,
    /// Unique identifier (`uid_attribute`).
    pub uid: Option<String>,
    /// Full name (`fullname_attribute`).
    pub full_name: Option<String>,
    /// Email address (`email_attribute`).
    pub email: Option<String>,
}

/// Maps entries to profiles and back.
#[derive(Debug, Clone, Copy)]
pub struct ProfileMapper<'a> {
    config: &'a DirectoryConfig,
}

impl<'a> ProfileMapper<'a> {
    /// Creates a mapper over the configured attribute names.
    #[must_use]
    pub const fn new(config: &'a DirectoryConfig) -> Self {
        Self { config }
    }

    /// Attributes to request when reading a profile.
    #[must_use]
    pub fn attributes(&self) -> Vec<&'a str> {
        vec![
            self.config.uid_attribute.as_str(),
            self.config.fullname_attribute.as_str(),
            self.config.email_attribute.as_str(),
        ]
    }

    /// Maps a directory entry to a profile.
    #[must_use]
    pub fn map_entry(&self, dn: &str, entry: &DirectoryEntry) -> UserProfile {
        UserProfile {
            dn: entry.dn.clone().unwrap_or_else(|| dn.to_string()),
            uid: entry.get_attr(&self.config.uid_attribute).map(String::from),
            full_name: entry
                .get_attr(&self.config.fullname_attribute)
                .map(String::from),
            email: entry.get_attr(&self.config.email_attribute).map(String::from),
        }
    }

    /// Maps a profile to the desired attributes for an update.
    ///
    /// `None` fields become empty values, which delete the attribute.
    #[must_use]
    pub fn to_attributes(&self, profile: &UserProfile) -> AttributeMap {
        let value = |v: &Option<String>| {
            v.clone()
                .map_or_else(AttributeValue::empty, AttributeValue::Single)
        };

        let mut attrs = AttributeMap::new();
        attrs.insert(self.config.fullname_attribute.clone(), value(&profile.full_name));
        attrs.insert(self.config.email_attribute.clone(), value(&profile.email));
        attrs
    }
}
