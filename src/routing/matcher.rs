//! Path template matching.
//!
//! # Responsibilities
//! - Parse a route template into literal and parameter segments
//! - Match a concrete request path against a parsed template
//! - Bind parameter segments to their names
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - A parameter matches exactly one non-empty segment
//! - Segment counts must be equal (no catch-all)
//! - Both `{name}` and `:name` placeholders are accepted
//! - Concrete segments are percent-decoded after splitting, so `%2F` stays
//!   inside its segment
//! - No regex to guarantee O(n) matching

use std::borrow::Cow;
use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Parameter name to bound segment value.
pub type PathParams = HashMap<String, String>;

/// Errors raised while parsing a route template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template must start with '/': {0:?}")]
    MissingLeadingSlash(String),

    #[error("empty parameter name in template {0:?}")]
    EmptyParamName(String),

    #[error("unterminated parameter in template {0:?}")]
    UnterminatedParam(String),

    #[error("catch-all segments are not supported: {0:?}")]
    CatchAll(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// How specific a template is. Higher wins when several templates match.
///
/// Compared field by field: the number of literal segments before the first
/// parameter, then the total number of literal segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    literal_prefix: usize,
    literals: usize,
}

/// A parsed route template such as `/users/{id}/posts`.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template. The raw string is kept verbatim as the route identity.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if !raw.starts_with('/') {
            return Err(TemplateError::MissingLeadingSlash(raw.to_string()));
        }

        let segments = split_segments(raw)
            .into_iter()
            .map(|part| parse_segment(raw, part))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template exactly as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parameter names in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Parameter names declared more than once.
    pub fn duplicate_params(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        let mut dups = Vec::new();
        for name in self.param_names() {
            if seen.contains(&name) {
                if !dups.contains(&name) {
                    dups.push(name);
                }
            } else {
                seen.push(name);
            }
        }
        dups
    }

    /// Match a concrete path. Returns the bound parameters, or `None` when the
    /// path does not fit this template.
    ///
    /// A name declared twice binds the value of its last occurrence.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts = split_segments(path);
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            let decoded = decode_segment(part);
            match segment {
                Segment::Literal(literal) => {
                    if literal.as_str() != decoded {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if decoded.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), decoded.into_owned());
                }
            }
        }
        Some(params)
    }

    /// True when some concrete path could match both templates.
    pub fn overlaps(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Literal(l))
                    | (Segment::Literal(l), Segment::Param(_)) => !l.is_empty(),
                    (Segment::Param(_), Segment::Param(_)) => true,
                })
    }

    pub fn specificity(&self) -> Specificity {
        let literal_prefix = self
            .segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count();
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        Specificity {
            literal_prefix,
            literals,
        }
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split on `/` after dropping one leading separator. `/` has no segments.
fn split_segments(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Percent-decode one path segment. Invalid UTF-8 is replaced, not rejected.
fn decode_segment(part: &str) -> Cow<'_, str> {
    percent_decode_str(part).decode_utf8_lossy()
}

fn parse_segment(raw: &str, part: &str) -> Result<Segment, TemplateError> {
    let name = if let Some(inner) = part.strip_prefix('{') {
        inner
            .strip_suffix('}')
            .ok_or_else(|| TemplateError::UnterminatedParam(raw.to_string()))?
    } else if let Some(name) = part.strip_prefix(':') {
        name
    } else if part.starts_with('*') {
        return Err(TemplateError::CatchAll(raw.to_string()));
    } else {
        return Ok(Segment::Literal(part.to_string()));
    };

    if name.is_empty() {
        return Err(TemplateError::EmptyParamName(raw.to_string()));
    }
    if name.starts_with('*') || name.ends_with("...") {
        return Err(TemplateError::CatchAll(raw.to_string()));
    }
    Ok(Segment::Param(name.to_string()))
}
