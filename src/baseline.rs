//! Baseline system for hold-the-line analysis
//!
//! Allows adopting the analyzer without fixing legacy code first. Violations
//! listed in the baseline document are suppressed, new ones are reported.
//!
//! # Baseline File Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <baseline>
//!   <violation rule="DuplicatedArrayKey" file="src/Service.php" method="load"/>
//!   <violation rule="DuplicatedArrayKey" file="src/helpers.php"/>
//! </baseline>
//! ```
//!
//! `file` is relative to the directory holding the baseline document. An entry
//! without `method` suppresses the rule anywhere in the file.

use crate::hash::sha256_hex;
use crate::paths;
use crate::violation::Violation;
use log::{debug, info};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Baseline loading or writing error. Loading errors are fatal for a run.
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("Unable to locate the baseline file at: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unable to read baseline {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to read xml from {} at line {line}: {message}", path.display())]
    Xml {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error(
        "Missing `{attribute}` attribute in `violation` #{ordinal} (line {line}) in {}",
        path.display()
    )]
    MissingAttribute {
        path: PathBuf,
        attribute: &'static str,
        ordinal: usize,
        line: usize,
    },

    #[error("Unable to write baseline {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

/// A previously accepted violation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaselineEntry {
    rule_id: String,
    file: PathBuf,
    method: Option<String>,
}

impl BaselineEntry {
    /// `file` must already be absolute; an empty method is treated as absent
    pub fn new(rule_id: &str, file: impl Into<PathBuf>, method: Option<&str>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            file: file.into(),
            method: method.filter(|m| !m.is_empty()).map(String::from),
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Whether this entry suppresses `violation`
    pub fn matches(&self, violation: &Violation) -> bool {
        self.rule_id == violation.rule_id()
            && self.file == violation.file()
            && self.method.as_deref().map_or(true, |m| violation.method() == Some(m))
    }
}

/// Suppression set loaded once per run
#[derive(Debug, Clone, Default)]
pub struct BaselineSet {
    /// rule id -> file -> method constraints (`None` = whole file)
    index: HashMap<String, HashMap<PathBuf, Vec<Option<String>>>>,
    len: usize,
    content_hash: String,
}

impl BaselineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: BaselineEntry) {
        let methods = self
            .index
            .entry(entry.rule_id)
            .or_default()
            .entry(entry.file)
            .or_default();
        if !methods.contains(&entry.method) {
            methods.push(entry.method);
            self.len += 1;
        }
    }

    /// Load a baseline document. `base_dir` resolves a relative `path`.
    pub fn load(path: &Path, base_dir: &Path) -> Result<Self, BaselineError> {
        let path = paths::absolutize(base_dir, path);
        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => BaselineError::NotFound(path.clone()),
            _ => BaselineError::Io {
                path: path.clone(),
                source,
            },
        })?;

        let mut set = Self::parse(&bytes, &path)?;
        set.content_hash = sha256_hex(&bytes);
        info!("Loaded {} baseline entries from {}", set.len(), path.display());
        Ok(set)
    }

    /// Parse baseline XML; `path` names the document and anchors relative files
    pub fn parse(content: &[u8], path: &Path) -> Result<Self, BaselineError> {
        let base_dir = path.parent().unwrap_or(Path::new("/"));
        let mut reader = Reader::from_reader(content);
        reader.config_mut().trim_text(true);

        // Pre-calculate line positions for error messages
        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(
                content
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| **b == b'\n')
                    .map(|(i, _)| i + 1),
            )
            .collect();
        let line_at = |pos: u64| line_starts.partition_point(|&start| start <= pos as usize);

        let mut set = Self::new();
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;
        let mut ordinal = 0usize;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| BaselineError::Xml {
                    path: path.to_path_buf(),
                    line: line_at(reader.buffer_position()),
                    message: e.to_string(),
                })?;
            let line = line_at(reader.buffer_position().saturating_sub(1));

            match event {
                Event::Start(ref element) | Event::Empty(ref element) => {
                    if depth == 0 {
                        saw_root = true;
                    } else if depth == 1 && element.name().as_ref() == b"violation" {
                        ordinal += 1;
                        let entry = read_entry(element, path, base_dir, ordinal, line)?;
                        set.add_entry(entry);
                    } else if depth == 1 {
                        debug!(
                            "Skipping <{}> at line {} in {}",
                            String::from_utf8_lossy(element.name().as_ref()),
                            line,
                            path.display()
                        );
                    }
                    if matches!(event, Event::Start(_)) {
                        depth += 1;
                    }
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(BaselineError::Xml {
                path: path.to_path_buf(),
                line: 1,
                message: "document has no root element".to_string(),
            });
        }
        Ok(set)
    }

    /// Whether `violation` was accepted by the baseline
    pub fn contains(&self, violation: &Violation) -> bool {
        self.index
            .get(violation.rule_id())
            .and_then(|files| files.get(violation.file()))
            .is_some_and(|methods| {
                methods.iter().any(|method| match method {
                    None => true,
                    Some(m) => violation.method() == Some(m.as_str()),
                })
            })
    }

    /// Drop every suppressed violation
    pub fn filter(&self, violations: Vec<Violation>) -> Vec<Violation> {
        if self.is_empty() {
            return violations;
        }
        violations
            .into_iter()
            .filter(|violation| !self.contains(violation))
            .collect()
    }

    /// SHA-256 of the document bytes, empty for sets built in memory
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn read_entry(
    element: &BytesStart<'_>,
    path: &Path,
    base_dir: &Path,
    ordinal: usize,
    line: usize,
) -> Result<BaselineEntry, BaselineError> {
    let xml_error = |message: String| BaselineError::Xml {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut rule = None;
    let mut file = None;
    let mut method = None;
    for attr in element.attributes() {
        let attr = attr.map_err(|e| xml_error(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(e.to_string()))?
            .into_owned();
        match attr.key.as_ref() {
            b"rule" => rule = Some(value),
            b"file" => file = Some(value),
            b"method" => method = Some(value),
            _ => {}
        }
    }

    let missing = |attribute: &'static str| BaselineError::MissingAttribute {
        path: path.to_path_buf(),
        attribute,
        ordinal,
        line,
    };
    let rule = rule.filter(|r| !r.trim().is_empty()).ok_or_else(|| missing("rule"))?;
    let file = file.filter(|f| !f.trim().is_empty()).ok_or_else(|| missing("file"))?;

    Ok(BaselineEntry::new(
        &rule,
        paths::join(base_dir, &file),
        method.as_deref(),
    ))
}

/// Write a baseline document accepting every violation in `violations`.
///
/// Paths are stored relative to the document directory. Returns the number of
/// entries written.
pub fn write(path: &Path, violations: &[Violation]) -> Result<usize, BaselineError> {
    let write_error = |message: String| BaselineError::Write {
        path: path.to_path_buf(),
        message,
    };
    let base_dir = path.parent().unwrap_or(Path::new(""));

    let entries: BTreeSet<(String, String, Option<String>)> = violations
        .iter()
        .map(|v| {
            (
                paths::relative_to(v.file(), base_dir),
                v.rule_id().to_string(),
                v.method().map(String::from),
            )
        })
        .collect();

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| write_error(e.to_string()))?;
    writer
        .write_event(Event::Start(BytesStart::new("baseline")))
        .map_err(|e| write_error(e.to_string()))?;
    for (file, rule, method) in &entries {
        let mut element = BytesStart::new("violation");
        element.push_attribute(("rule", rule.as_str()));
        element.push_attribute(("file", file.as_str()));
        if let Some(method) = method {
            element.push_attribute(("method", method.as_str()));
        }
        writer
            .write_event(Event::Empty(element))
            .map_err(|e| write_error(e.to_string()))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("baseline")))
        .map_err(|e| write_error(e.to_string()))?;

    let mut document = writer.into_inner();
    document.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
    }
    fs::write(path, document).map_err(|e| write_error(e.to_string()))?;

    info!("Wrote {} baseline entries to {}", entries.len(), path.display());
    Ok(entries.len())
}
