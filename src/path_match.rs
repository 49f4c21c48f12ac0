//! Path-template matching.
//!
//! A template is a `/`-separated list of segments. A segment starting with `:`
//! matches exactly one non-empty request segment and captures it under that
//! name; a final `*` segment matches any remainder, including nothing. Every
//! other segment must match literally and case-sensitively, so `/items2`
//! never matches `/item`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::AclError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A compiled path template, e.g. `/web/item/datastores/:d_id/items`.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
    regex: Regex,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, AclError> {
        let Some(rest) = template.strip_prefix('/') else {
            return Err(AclError::InvalidFormat(format!(
                "path template '{template}' must start with '/'"
            )));
        };

        let raw: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (i, seg) in raw.iter().enumerate() {
            let segment = if let Some(name) = seg.strip_prefix(':') {
                if !is_param_name(name) {
                    return Err(AclError::InvalidFormat(format!(
                        "invalid parameter ':{name}' in path template '{template}'"
                    )));
                }
                Segment::Param(name.to_string())
            } else if *seg == "*" {
                if i + 1 != raw.len() {
                    return Err(AclError::InvalidFormat(format!(
                        "wildcard must be the last segment of path template '{template}'"
                    )));
                }
                Segment::Wildcard
            } else {
                Segment::Literal(seg.to_string())
            };
            segments.push(segment);
        }

        let mut pattern = String::from("^");
        for segment in &segments {
            pattern.push('/');
            match segment {
                Segment::Literal(lit) => pattern.push_str(&regex::escape(lit)),
                Segment::Param(name) => {
                    pattern.push_str(&format!("(?P<{name}>[^/]+)"));
                }
                Segment::Wildcard => pattern.push_str(".*"),
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| {
            AclError::InvalidFormat(format!("path template '{template}': {e}"))
        })?;

        Ok(PathTemplate {
            source: template.to_string(),
            segments,
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Named parameters of `path`, or `None` when it does not match.
    pub fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.param_names()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Count of non-literal segments; lower means more specific.
    pub fn param_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| !matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }
}

fn is_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

static COMPILED: Lazy<RwLock<HashMap<String, Arc<PathTemplate>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compile `template`, reusing an earlier compilation when there is one.
pub fn compiled(template: &str) -> Result<Arc<PathTemplate>, AclError> {
    if let Some(hit) = COMPILED.read()?.get(template) {
        return Ok(Arc::clone(hit));
    }
    let parsed = Arc::new(PathTemplate::parse(template)?);
    let mut cache = COMPILED.write()?;
    let entry = cache
        .entry(template.to_string())
        .or_insert_with(|| Arc::clone(&parsed));
    Ok(Arc::clone(entry))
}

/// Does the concrete `request_path` match `template`?
///
/// A template that fails to compile never matches.
pub fn matches(request_path: &str, template: &str) -> bool {
    match compiled(template) {
        Ok(t) => t.is_match(request_path),
        Err(e) => {
            warn!(event = "PathMatch", template = template, error = %e);
            false
        }
    }
}
