//! YAML front-matter extraction and validation.
//!
//! A document opens with a `---` line, followed by a YAML mapping, closed by
//! a `---` (or `...`) line. Everything after the closing line is the body.
//!
//! The four required keys are checked in order `title`, `summary`, `uri`,
//! `authors`; the first one that is absent or blank aborts the parse.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::{Field, ParseError};
use crate::models::FrontMatter;

const BOM: char = '\u{feff}';

/// Split `text` into its raw front-matter block and body.
///
/// Returns `None` for the block when the text does not open with a `---`
/// line or the block is never closed; the whole text is then the body.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let mut lines = text.split_inclusive('\n');
    let first = match lines.next() {
        Some(line) => line,
        None => return (None, text),
    };
    if !is_delimiter(first, "---") {
        return (None, text);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if is_delimiter(line, "---") || is_delimiter(line, "...") {
            let yaml = &text[yaml_start..offset];
            let body = &text[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, text)
}

fn is_delimiter(line: &str, marker: &str) -> bool {
    line.trim_end() == marker
}

/// Parse and validate the front-matter of `text`, returning it with the body.
///
/// `path` is only used to build error messages.
pub fn parse(path: &Path, text: &str) -> Result<(FrontMatter, String), ParseError> {
    let (yaml, body) = split_front_matter(text);
    let yaml = match yaml {
        Some(y) if !y.trim().is_empty() => y,
        _ => {
            return Err(ParseError::MissingFrontmatter {
                path: path.to_path_buf(),
            })
        }
    };

    let value: Value =
        serde_yaml::from_str(yaml).map_err(|source| ParseError::InvalidFrontmatter {
            path: path.to_path_buf(),
            source,
        })?;

    let mapping = match value {
        Value::Mapping(m) if !m.is_empty() => m,
        _ => {
            return Err(ParseError::MissingFrontmatter {
                path: path.to_path_buf(),
            })
        }
    };

    let missing = |field: Field| ParseError::MissingField {
        field,
        path: path.to_path_buf(),
    };

    let title = required_text(&mapping, Field::Title).ok_or_else(|| missing(Field::Title))?;
    let summary =
        required_text(&mapping, Field::Summary).ok_or_else(|| missing(Field::Summary))?;
    let uri = required_text(&mapping, Field::Uri).ok_or_else(|| missing(Field::Uri))?;
    let authors = required_authors(&mapping).ok_or_else(|| missing(Field::Authors))?;

    let front_matter = FrontMatter {
        title,
        summary,
        uri,
        authors,
    };
    Ok((front_matter, body.to_string()))
}

fn required_text(mapping: &Mapping, field: Field) -> Option<String> {
    match mapping.get(field.key()) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn required_authors(mapping: &Mapping) -> Option<Vec<String>> {
    let authors: Vec<String> = match mapping.get(Field::Authors.key())? {
        Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        _ => return None,
    };
    if authors.is_empty() {
        None
    } else {
        Some(authors)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
