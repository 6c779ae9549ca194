//! ENVI header text reader
//!
//! Only the subset needed to feed raster metadata is understood: the `ENVI`
//! magic line, `key = value` pairs, and brace-delimited lists that may span
//! several lines. Keys are stored lower-cased.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};

/// A single header field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Scalar(String),
    List(Vec<String>),
}

/// Header fields keyed by lower-cased field name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderMap {
    fields: BTreeMap<String, HeaderValue>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: HeaderValue) {
        self.fields.insert(key.trim().to_ascii_lowercase(), value);
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.fields.get(&key.to_ascii_lowercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns a scalar field's text
    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            HeaderValue::Scalar(s) => Some(s.as_str()),
            HeaderValue::List(_) => None,
        }
    }

    /// Returns a list field's items
    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.get(key)? {
            HeaderValue::List(items) => Some(items.as_slice()),
            HeaderValue::Scalar(_) => None,
        }
    }

    /// Parses a scalar field, `Ok(None)` when absent
    pub fn parse_scalar<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.scalar(key) {
            None => Ok(None),
            Some(text) => text
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| Error::InvalidFormat(format!("field '{}' = '{}'", key, text))),
        }
    }

    /// Parses a required scalar field
    pub fn require<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        self.parse_scalar(key)?
            .ok_or_else(|| Error::MissingField(key.to_string()))
    }

    /// Parses every item of a list field, empty when absent
    pub fn parse_list<T: std::str::FromStr>(&self, key: &str) -> Result<Vec<T>> {
        let Some(items) = self.list(key) else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .map(|item| {
                item.parse::<T>()
                    .map_err(|_| Error::InvalidFormat(format!("item '{}' in field '{}'", item, key)))
            })
            .collect()
    }
}

/// Parses ENVI header text
pub fn parse_envi_header(text: &str) -> Result<HeaderMap> {
    let mut lines = text.lines();

    let magic = lines.by_ref().map(str::trim).find(|line| !line.is_empty());
    if magic != Some("ENVI") {
        return Err(Error::InvalidFormat("header does not start with 'ENVI'".to_string()));
    }

    let mut header = HeaderMap::new();
    while let Some(line) = lines.next() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let mut value = value.trim().to_string();

        if !value.starts_with('{') {
            header.insert(key, HeaderValue::Scalar(value));
            continue;
        }

        while !value.contains('}') {
            match lines.next() {
                Some(next) => {
                    value.push(' ');
                    value.push_str(next.trim());
                }
                None => {
                    return Err(Error::InvalidFormat(format!("unterminated list in field '{}'", key)));
                }
            }
        }

        let inner = value
            .trim_start_matches('{')
            .split('}')
            .next()
            .unwrap_or_default();
        let items = inner
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        header.insert(key, HeaderValue::List(items));
    }

    Ok(header)
}

/// Reads and parses an ENVI header file
pub fn read_envi_header<P: AsRef<Path>>(path: P) -> Result<HeaderMap> {
    let text = fs::read_to_string(path)?;
    parse_envi_header(&text)
}

/// Locates the `.hdr` sidecar for a payload file
///
/// Tries the payload path with its extension replaced first, then with
/// `.hdr` appended.
pub fn find_header_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();

    let replaced = path.with_extension("hdr");
    if replaced.is_file() {
        return Ok(replaced);
    }

    let mut appended = path.as_os_str().to_os_string();
    appended.push(".hdr");
    let appended = PathBuf::from(appended);
    if appended.is_file() {
        return Ok(appended);
    }

    Err(Error::MissingField(format!("header file for {}", path.display())))
}
