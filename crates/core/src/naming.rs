//! File name patterns.
//!
//! A pattern mixes literal text with `{field}` placeholders, e.g.
//! `"{parent} - {stem}.{ext}"`. Fields are looked up in a fixed accessor
//! table; an unknown field is rejected when the pattern is parsed, not when
//! it is first used. `{{` and `}}` produce literal braces.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

use crate::source::FileSource;

/// Errors from parsing or rendering a name pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamePatternError {
    /// The pattern references a field that does not exist.
    #[error("unknown field '{field}' in pattern '{pattern}'")]
    UnknownField { pattern: String, field: String },

    /// A brace is not part of a placeholder or an escape.
    #[error("unbalanced brace at offset {offset} in pattern '{pattern}'")]
    Unterminated { pattern: String, offset: usize },

    /// The field exists but the file has no value for it.
    #[error("field '{0}' has no value for this file")]
    MissingValue(String),
}

/// Everything a pattern can refer to, extracted once per file.
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub name: String,
    pub stem: Option<String>,
    pub ext: Option<String>,
    pub parent: Option<String>,
    pub origin: Option<String>,
    pub modified: Option<DateTime<Local>>,
}

impl FileInfo {
    /// Collects the fields of a source. The modification time is read from
    /// disk when the source has a path.
    pub fn from_source(source: &dyn FileSource) -> Self {
        let name = source.name().to_string();
        let named = Path::new(&name);
        let path = source.path();

        Self {
            stem: named.file_stem().map(|s| s.to_string_lossy().to_string()),
            ext: named.extension().map(|e| e.to_string_lossy().to_string()),
            parent: path
                .and_then(|p| p.parent())
                .and_then(|p| p.file_name())
                .map(|p| p.to_string_lossy().to_string()),
            origin: source.origin().map(str::to_string),
            modified: path
                .and_then(|p| std::fs::metadata(p).ok())
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Local>::from),
            name,
        }
    }
}

type FieldAccessor = fn(&FileInfo) -> Option<String>;

static FIELDS: Lazy<HashMap<&'static str, FieldAccessor>> = Lazy::new(|| {
    let mut fields: HashMap<&'static str, FieldAccessor> = HashMap::new();
    fields.insert("name", |info| Some(info.name.clone()));
    fields.insert("stem", |info| info.stem.clone());
    fields.insert("ext", |info| info.ext.clone());
    fields.insert("parent", |info| info.parent.clone());
    fields.insert("origin", |info| info.origin.clone());
    fields.insert("modified", |info| {
        info.modified.map(|m| m.format("%Y-%m-%d").to_string())
    });
    fields
});

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<open>\{\{)|(?P<close>\}\})|\{(?P<field>[^{}]*)\}|(?P<text>[^{}]+)|(?P<stray>[{}])")
        .expect("token regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(&'static str),
}

/// A parsed name pattern.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    segments: Vec<Segment>,
}

impl NamePattern {
    /// Parses a pattern, rejecting unknown fields and stray braces.
    pub fn parse(pattern: &str) -> Result<Self, NamePatternError> {
        let mut segments = Vec::new();

        for caps in TOKEN.captures_iter(pattern) {
            if caps.name("open").is_some() {
                push_literal(&mut segments, "{");
            } else if caps.name("close").is_some() {
                push_literal(&mut segments, "}");
            } else if let Some(field) = caps.name("field") {
                let name = field.as_str().trim();
                let (key, _) = FIELDS.get_key_value(name).ok_or_else(|| {
                    NamePatternError::UnknownField {
                        pattern: pattern.to_string(),
                        field: name.to_string(),
                    }
                })?;
                segments.push(Segment::Field(*key));
            } else if let Some(text) = caps.name("text") {
                push_literal(&mut segments, text.as_str());
            } else if let Some(stray) = caps.name("stray") {
                return Err(NamePatternError::Unterminated {
                    pattern: pattern.to_string(),
                    offset: stray.start(),
                });
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Fields referenced by the pattern, in order of appearance.
    pub fn fields(&self) -> Vec<&'static str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(f) => Some(*f),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Renders the pattern for one file.
    pub fn render(&self, info: &FileInfo) -> Result<String, NamePatternError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = FIELDS
                        .get(field)
                        .and_then(|accessor| accessor(info))
                        .ok_or_else(|| NamePatternError::MissingValue(field.to_string()))?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if let Some(Segment::Literal(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_string()));
    }
}
