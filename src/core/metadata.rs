//! Key/value metadata attached to archives, objects and properties.
//!
//! The stored form is `key=value;key2=value2` with `\`, `;` and `=`
//! backslash-escaped inside keys and values.

use smallvec::SmallVec;
use std::fmt;

/// Ordered string map. Keys are unique; `set` on an existing key replaces
/// its value in place.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MetaData {
    entries: SmallVec<[(String, String); 4]>,
}

impl MetaData {
    pub const SCHEMA_KEY: &'static str = "schema";
    pub const INTERPRETATION_KEY: &'static str = "interpretation";

    // archive-level keys
    pub const APPLICATION_KEY: &'static str = "_ai_Application";
    pub const DESCRIPTION_KEY: &'static str = "_ai_Description";
    pub const DATE_WRITTEN_KEY: &'static str = "_ai_DateWritten";
    pub const DCC_FPS_KEY: &'static str = "_ai_DCC_FPS";
    pub const ALEMBIC_VERSION_KEY: &'static str = "_ai_AlembicVersion";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set only when the key is absent.
    pub fn set_unique(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, value.into()));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every entry of `other` that is not already present.
    pub fn append_only_unique(&mut self, other: &MetaData) {
        for (k, v) in other.iter() {
            self.set_unique(k, v);
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            escape_into(&mut out, k);
            out.push('=');
            escape_into(&mut out, v);
        }
        out
    }

    /// Parse the stored form. Entries without `=` or with an empty key are
    /// skipped.
    pub fn parse(s: &str) -> Self {
        let mut meta = Self::new();
        let mut key = String::new();
        let mut cur = String::new();
        let mut in_value = false;
        let mut chars = s.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(next) => cur.push(next),
                    None => cur.push('\\'),
                },
                '=' if !in_value => {
                    key = std::mem::take(&mut cur);
                    in_value = true;
                }
                ';' => {
                    if in_value && !key.is_empty() {
                        meta.set(std::mem::take(&mut key), std::mem::take(&mut cur));
                    }
                    key.clear();
                    cur.clear();
                    in_value = false;
                }
                _ => cur.push(c),
            }
        }
        if in_value && !key.is_empty() {
            meta.set(key, cur);
        }
        meta
    }

    pub fn schema(&self) -> Option<&str> {
        self.get(Self::SCHEMA_KEY)
    }

    pub fn interpretation(&self) -> Option<&str> {
        self.get(Self::INTERPRETATION_KEY)
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetaData {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut meta = Self::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut meta = MetaData::new();
        meta.set("a", "1");
        meta.set("b", "2");
        meta.set("a", "3");
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.serialize(), "a=3;b=2");
        assert!(!meta.set_unique("b", "9"));
        assert_eq!(meta.get("b"), Some("2"));
    }

    #[test]
    fn test_parse() {
        let meta = MetaData::parse("schema=AbcGeom_PolyMesh_v1;interpretation=point");
        assert_eq!(meta.schema(), Some("AbcGeom_PolyMesh_v1"));
        assert_eq!(meta.interpretation(), Some("point"));
        assert!(MetaData::parse("").is_empty());
        assert_eq!(MetaData::parse("novalue;=x;k=v").len(), 1);
    }

    #[test]
    fn test_escape() {
        let mut meta = MetaData::new();
        meta.set("key=with;special", "value\\with;=");
        let parsed = MetaData::parse(&meta.serialize());
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_value_may_contain_equals_after_escape() {
        let meta: MetaData = [("k", "a=b")].into_iter().collect();
        assert_eq!(meta.serialize(), "k=a\\=b");
        assert_eq!(MetaData::parse("k=a\\=b").get("k"), Some("a=b"));
    }
}
