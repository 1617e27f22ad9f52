//! Config-line mini-language for initialising components
//!
//! A component is configured from a single line of the form
//!
//! ```text
//! AffineComponent input-dim=40 output-dim=10 learning-rate=0.01
//! ```
//!
//! The first token names the component type; the rest are `key=value` pairs.
//! Components pull the keys they understand out of a [`ConfigLine`]; any key left
//! over afterwards is reported as a configuration error.

use crate::error::{Error, Result};
use std::str::FromStr;

#[derive(Debug, Clone)]
struct ConfigEntry {
    key: String,
    value: String,
    used: bool,
}

/// Parsed `key=value` arguments of one config line.
///
/// # Example
///
/// ```
/// use rust_nnet_components::config::ConfigLine;
///
/// let mut cfg = ConfigLine::parse("dim=4 learning-rate=0.5").unwrap();
/// assert_eq!(cfg.get_usize("dim").unwrap(), Some(4));
/// assert_eq!(cfg.get_f32("learning-rate").unwrap(), Some(0.5));
/// assert!(cfg.ensure_all_used("IdentityNonlinearity").is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLine {
    entries: Vec<ConfigEntry>,
}

/// Splits a full config line into its type name and the remaining arguments.
///
/// # Errors
///
/// Returns a config error if the line is empty or starts with a `key=value`
/// token instead of a type name.
pub fn split_type_and_args(line: &str) -> Result<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(Error::config("empty config line"));
    }
    let (type_name, rest) = match trimmed.find(char::is_whitespace) {
        Some(pos) => (&trimmed[..pos], trimmed[pos..].trim_start()),
        None => (trimmed, ""),
    };
    if type_name.contains('=') {
        return Err(Error::config(format!(
            "config line must start with a component type, got '{}'",
            type_name
        )));
    }
    Ok((type_name, rest))
}

impl ConfigLine {
    /// Parses whitespace-separated `key=value` tokens.
    ///
    /// # Errors
    ///
    /// Returns a config error for tokens without `=`, empty keys, or keys that
    /// appear twice.
    pub fn parse(args: &str) -> Result<Self> {
        let mut entries: Vec<ConfigEntry> = Vec::new();
        for token in args.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| Error::config(format!("expected key=value, got '{}'", token)))?;
            if key.is_empty() {
                return Err(Error::config(format!("empty key in '{}'", token)));
            }
            if entries.iter().any(|e| e.key == key) {
                return Err(Error::config(format!("duplicate key '{}'", key)));
            }
            entries.push(ConfigEntry {
                key: key.to_string(),
                value: value.to_string(),
                used: false,
            });
        }
        Ok(Self { entries })
    }

    fn take(&mut self, key: &str) -> Option<&str> {
        self.entries.iter_mut().find(|e| e.key == key).map(|e| {
            e.used = true;
            e.value.as_str()
        })
    }

    fn get<T: FromStr>(&mut self, key: &str, what: &str) -> Result<Option<T>> {
        match self.take(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                Error::config(format!("bad value for {}: expected {}, got '{}'", key, what, raw))
            }),
        }
    }

    pub fn get_usize(&mut self, key: &str) -> Result<Option<usize>> {
        self.get(key, "a non-negative integer")
    }

    pub fn get_u64(&mut self, key: &str) -> Result<Option<u64>> {
        self.get(key, "a non-negative integer")
    }

    pub fn get_f32(&mut self, key: &str) -> Result<Option<f32>> {
        self.get(key, "a number")
    }

    /// Comma-separated integers, e.g. `context=-1,0,1`.
    pub fn get_i32_list(&mut self, key: &str) -> Result<Option<Vec<i32>>> {
        let Some(raw) = self.take(key).map(str::to_owned) else {
            return Ok(None);
        };
        raw.split(',')
            .map(|part| {
                part.trim().parse::<i32>().map_err(|_| {
                    Error::config(format!("bad value for {}: '{}' is not an integer", key, part))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Like [`get_usize`](Self::get_usize) but the key must be present and positive.
    pub fn require_dim(&mut self, key: &str, component: &str) -> Result<usize> {
        match self.get_usize(key)? {
            Some(0) => Err(Error::config(format!("{}: {} must be greater than 0", component, key))),
            Some(dim) => Ok(dim),
            None => Err(Error::config(format!("{}: missing required key '{}'", component, key))),
        }
    }

    /// Keys that no getter has consumed.
    pub fn unused_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| !e.used)
            .map(|e| e.key.as_str())
            .collect()
    }

    /// Fails if any key was not consumed.
    pub fn ensure_all_used(&self, component: &str) -> Result<()> {
        let unused = self.unused_keys();
        if unused.is_empty() {
            Ok(())
        } else {
            Err(Error::config(format!(
                "{}: unknown configuration keys: {}",
                component,
                unused.join(", ")
            )))
        }
    }
}
