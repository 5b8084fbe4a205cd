//! Corpus loader for `.md`/`.txt` files with optional YAML front matter.
//!
//! ```text
//! ---
//! sku: SKU-001
//! source: manual_sku001_v2.pdf
//! valid_from: 2025-08-01
//! tags: [specs, router]
//! ---
//! Free text body...
//! ```

use crate::passage::Document;
use chrono::{DateTime, NaiveDate};
use grounded_core::{AppError, AppResult};
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const EXTENSIONS: &[&str] = &["md", "txt"];

/// Documents read from a corpus directory.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    pub files: Vec<PathBuf>,
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date layouts accepted in front matter, besides RFC 3339 timestamps.
const DATE_LAYOUTS: &[&str] = &[DATE_FORMAT, "%d/%m/%Y", "%Y/%m/%d"];

#[derive(Debug, Default)]
struct FrontMatter {
    id: Option<String>,
    sku: Option<String>,
    source: Option<String>,
    lang: Option<String>,
    valid_from: Option<String>,
    valid_to: Option<String>,
    version: Option<String>,
    section_id: Option<String>,
    tags: Vec<String>,
}

impl FrontMatter {
    /// Read each key on its own, so one odd value does not cost the rest.
    fn from_mapping(path: &Path, map: &Mapping) -> Self {
        let text = |key: &str| map.get(key).and_then(scalar_text);
        let date = |key: &str| text(key).map(|raw| normalize_date(path, key, raw));

        Self {
            id: text("id"),
            sku: text("sku"),
            source: text("source"),
            lang: text("lang"),
            valid_from: date("valid_from"),
            valid_to: date("valid_to"),
            version: text("version"),
            section_id: text("section_id"),
            tags: map.get("tags").map(tag_list).unwrap_or_default(),
        }
    }
}

/// Load every `.md`/`.txt` file under `dir` whose path contains `include`.
///
/// Files are visited in sorted order so results are stable.
pub fn load_corpus(dir: &Path, include: Option<&str>) -> AppResult<Corpus> {
    if !dir.is_dir() {
        return Err(AppError::Knowledge(format!(
            "Corpus directory does not exist: {:?}",
            dir
        )));
    }

    let mut corpus = Corpus::default();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !has_corpus_extension(path) {
            continue;
        }
        if let Some(pattern) = include {
            if !path.to_string_lossy().contains(pattern) {
                continue;
            }
        }

        let raw = std::fs::read_to_string(path)?;
        corpus.documents.push(parse_document(path, &raw));
        corpus.files.push(path.to_path_buf());
    }

    tracing::debug!("Loaded {} corpus files from {:?}", corpus.files.len(), dir);
    Ok(corpus)
}

fn has_corpus_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build a document from a file's contents.
///
/// If the front matter is not a YAML mapping, the whole file is the body.
/// Unrecognized dates are kept as written; a `valid_to` in any form still
/// marks the document superseded. `source` defaults to the file name and `id` to a hash of the path, so
/// re-ingesting the same corpus overwrites earlier passages.
pub fn parse_document(path: &Path, raw: &str) -> Document {
    let (meta, body) = match split_front_matter(raw) {
        Some((yaml, body)) if yaml.trim().is_empty() => (FrontMatter::default(), body),
        Some((yaml, body)) => match serde_yaml::from_str::<Value>(yaml) {
            Ok(Value::Mapping(map)) => (FrontMatter::from_mapping(path, &map), body),
            Ok(Value::Null) => (FrontMatter::default(), body),
            Ok(_) => {
                tracing::warn!("Ignoring front matter in {:?}: not a mapping", path);
                (FrontMatter::default(), raw)
            }
            Err(e) => {
                tracing::warn!("Ignoring unparsable front matter in {:?}: {}", path, e);
                (FrontMatter::default(), raw)
            }
        },
        None => (FrontMatter::default(), raw),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Document {
        id: Some(meta.id.unwrap_or_else(|| path_id(path))),
        text: body.trim().to_string(),
        sku: meta.sku,
        source: Some(meta.source.unwrap_or(file_name)),
        lang: meta.lang,
        valid_from: meta.valid_from,
        valid_to: meta.valid_to,
        version: meta.version,
        section_id: meta.section_id,
        tags: meta.tags,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Tagged(tagged) => return scalar_text(&tagged.value),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// `tags: [a, b]` or `tags: "a, b"`.
fn tag_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(other)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// ISO `YYYY-MM-DD` when the value is a recognizable date, else as written.
fn normalize_date(path: &Path, key: &str, raw: String) -> String {
    match parse_date(&raw) {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => {
            tracing::warn!("Keeping unrecognized {} {:?} in {:?} as written", key, raw, path);
            raw
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(raw, layout).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Split `---\n<yaml>\n---\n<body>`; `None` when there is no closed block.
fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw
        .strip_prefix("---\r\n")
        .or_else(|| raw.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

fn path_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    digest.iter().take(16).map(|b| format!("{:02x}", b)).collect()
}
