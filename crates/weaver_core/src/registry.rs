use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use crate::model::Class;
use crate::tables::latin_lookalike;

/// Assigns stable sequential ids to class names for one parse run.
///
/// Both feeds (class files and spell front matter) resolve through the same
/// dedup key, so a class seen in either place keeps a single id.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<Class>,
    by_key: HashMap<String, usize>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bare class name from a spell's class list.
    pub fn register(&mut self, name: &str) -> i64 {
        self.register_entry(name, "")
    }

    /// Register a class from its description file. Fills an empty localized
    /// name on an existing entry; a non-empty one is kept.
    pub fn register_localized(&mut self, name: &str, name_ua: &str) -> i64 {
        self.register_entry(name, name_ua)
    }

    #[cfg(test)]
    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Entries that only spell front matter mentioned.
    pub fn unlocalized(&self) -> Vec<&Class> {
        self.classes
            .iter()
            .filter(|class| class.name_ua.is_empty())
            .collect()
    }

    pub fn into_classes(self) -> Vec<Class> {
        self.classes
    }

    fn register_entry(&mut self, name: &str, name_ua: &str) -> i64 {
        let key = dedup_key(name);
        if let Some(&position) = self.by_key.get(&key) {
            let existing = &mut self.classes[position];
            if existing.name_ua.is_empty() && !name_ua.is_empty() {
                existing.name_ua = name_ua.to_string();
            }
            return existing.id;
        }

        let id = self.classes.len() as i64 + 1;
        self.by_key.insert(key.clone(), self.classes.len());
        self.classes.push(Class {
            id,
            name: key,
            name_ua: name_ua.to_string(),
        });
        id
    }
}

/// Normalized form of a class name: NFKD, Cyrillic look-alikes latinized,
/// trimmed and lowercased.
pub fn dedup_key(name: &str) -> String {
    name.trim()
        .nfkd()
        .map(latin_lookalike)
        .collect::<String>()
        .to_lowercase()
}
