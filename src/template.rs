//! `{{key}}` substitution for the desktop entry and control file templates.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::manifest::Manifest;

/// Values substituted into templates, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables(BTreeMap<String, String>);

impl Variables {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut variables = Variables::default();
        variables
            .set("name", manifest.name.as_str())
            .set("productName", manifest.product_name())
            .set("description", manifest.description.as_str())
            .set("version", manifest.version.as_str())
            .set("author", manifest.author());
        variables
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|x| x.as_str())
    }
}

/// Replaces every `{{key}}` in `template` that has a value in `variables`.
///
/// Placeholders without a value are kept as written. Substituted values are not scanned
/// again, so a value containing `{{...}}` is emitted literally.
pub fn render<'a>(template: &'a str, variables: &Variables) -> Cow<'a, str> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder = PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("static regex")
    });

    placeholder.replace_all(template, |captures: &Captures| {
        match variables.get(&captures[1]) {
            Some(value) => value.to_owned(),
            None => {
                warn!("template placeholder {} has no value", &captures[0]);
                captures[0].to_owned()
            }
        }
    })
}
