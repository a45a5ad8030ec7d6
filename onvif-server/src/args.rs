//! Request argument tree
//!
//! The payload element of a SOAP body, reduced to local names, attributes,
//! trimmed text and child elements. Handlers look values up by slash
//! separated paths of local names, e.g. `StreamSetup/Stream`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::OnvifError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    name: String,
    attrs: BTreeMap<String, String>,
    text: String,
    children: Vec<Args>,
}

impl Args {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.push_text(text);
        self
    }

    pub fn with_child(mut self, child: Args) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child element holding only text
    pub fn with_value(self, name: impl Into<String>, text: &str) -> Self {
        self.with_child(Args::new(name).with_text(text))
    }

    pub(crate) fn push_child(&mut self, child: Args) {
        self.children.push(child);
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.text.push_str(text);
        }
    }

    pub(crate) fn insert_attr(&mut self, name: String, value: String) {
        self.attrs.insert(name, value);
    }

    /// Local name of the element
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// First child with the given local name
    pub fn child(&self, name: &str) -> Option<&Args> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children(&self) -> impl Iterator<Item = &Args> {
        self.children.iter()
    }

    /// Walk a slash separated path of local names
    pub fn find(&self, path: &str) -> Option<&Args> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Text of the element at `path`
    pub fn value(&self, path: &str) -> Option<&str> {
        self.find(path).map(Args::text)
    }

    /// Text of the element at `path`, or an InvalidArgs fault naming it
    pub fn required(&self, path: &str) -> Result<&str, OnvifError> {
        match self.value(path) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(OnvifError::invalid_arg(
                leaf(path),
                format!("missing required element {}", path),
            )),
        }
    }

    /// Parse the element at `path` when present
    pub fn parse<T>(&self, path: &str) -> Result<Option<T>, OnvifError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.value(path) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| OnvifError::invalid_arg(leaf(path), format!("'{}': {}", raw, e))),
        }
    }

    /// Parse the element at `path`, which must be present
    pub fn parse_required<T>(&self, path: &str) -> Result<T, OnvifError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.required(path)?;
        self.parse(path)?
            .ok_or_else(|| OnvifError::invalid_arg(leaf(path), "missing value"))
    }

    /// Parse an xs:duration such as `PT1M30S` into whole seconds
    pub fn duration_secs(&self, path: &str) -> Result<Option<u64>, OnvifError> {
        match self.value(path) {
            None => Ok(None),
            Some(raw) => parse_duration(raw).map(Some).ok_or_else(|| {
                OnvifError::invalid_arg(leaf(path), format!("'{}' is not a duration", raw))
            }),
        }
    }
}

fn parse_duration(raw: &str) -> Option<u64> {
    let rest = raw.strip_prefix("PT")?;
    if rest.is_empty() {
        return None;
    }
    let mut total = 0f64;
    let mut number = String::new();
    for c in rest.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'H' | 'M' | 'S' => {
                let value: f64 = number.parse().ok()?;
                number.clear();
                total += match c {
                    'H' => value * 3600.0,
                    'M' => value * 60.0,
                    _ => value,
                };
            }
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some(total.round() as u64)
}

fn leaf(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
