use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};
use std::fmt;

pub type JobId = u64;
pub type Script = bytes::Bytes;
pub type RunId = String;

/// Options passed to `sbatch`, one `--key[=value]` flag per entry.
///
/// Entries keep their insertion order and keys are unique: inserting a key a
/// second time replaces its value in place. A value of `None` renders as a
/// bare boolean flag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    entries: Vec<(String, Option<String>)>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) -> &mut Self {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Set `--key=value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.insert(key, Some(value.into()))
    }

    /// Set a bare `--key` flag.
    pub fn flag(&mut self, key: impl Into<String>) -> &mut Self {
        self.insert(key, None)
    }

    /// `None` if the key is absent, `Some(None)` for a bare flag.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the entries as command line flags, in order.
    pub fn to_args(&self) -> Vec<String> {
        self.iter()
            .map(|(key, value)| match value {
                Some(value) => format!("--{}={}", key, value),
                None => format!("--{}", key),
            })
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for SubmitOptions {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (key, value) in iter {
            options.insert(key, value);
        }
        options
    }
}

// A TOML table of sbatch options: `true` is a bare flag, `false` leaves the
// option out, strings and numbers become `--key=value`.
#[derive(Deserialize)]
#[serde(untagged)]
enum OptionValue {
    Flag(bool),
    Number(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for SubmitOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionsVisitor;

        impl<'de> Visitor<'de> for OptionsVisitor {
            type Value = SubmitOptions;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table of sbatch options")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut options = SubmitOptions::new();
                while let Some((key, value)) = map.next_entry::<String, OptionValue>()? {
                    match value {
                        OptionValue::Flag(true) => {
                            options.flag(key);
                        }
                        OptionValue::Flag(false) => {}
                        OptionValue::Number(n) => {
                            options.set(key, n.to_string());
                        }
                        OptionValue::Text(s) => {
                            options.set(key, s);
                        }
                    }
                }
                Ok(options)
            }
        }

        deserializer.deserialize_map(OptionsVisitor)
    }
}
