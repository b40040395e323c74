//! Source Map revision 3 model and merging.
//!
//! Only what the orchestrator needs is modelled: decoding a flat (non-indexed)
//! map into per-line segments, re-encoding it deterministically, and
//! concatenating several maps into one coordinate space (see [`SourceMapConcat`]).
//!
//! Generated lines are split on `\n`. Columns are counted in UTF-16 code units,
//! which is what JavaScript engines report.

mod concat;
mod vlq;

pub use concat::{SourceMapConcat, merge_source_maps};

use crate::orchestrator::error::MalformedSourceMap;
use serde::{Deserialize, Serialize};

/// Original position a generated segment points back at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalPosition {
    /// Index into [`SourceMap::sources`]
    pub source: u32,
    /// Zero-based line in the original source
    pub line: u32,
    /// Zero-based column in the original source
    pub column: u32,
    /// Index into [`SourceMap::names`]
    pub name: Option<u32>,
}

/// One decoded mapping segment on a generated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Zero-based generated column
    pub column: u32,
    /// Original position, absent for unmapped generated code
    pub original: Option<OriginalPosition>,
}

/// Decoded source map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    /// Name of the generated file, if declared
    pub file: Option<String>,
    /// Source names with `sourceRoot` already applied
    pub sources: Vec<String>,
    /// Inlined source contents, parallel to `sources`
    pub sources_content: Vec<Option<String>>,
    /// Symbol names referenced by segments
    pub names: Vec<String>,
    /// Segments grouped by zero-based generated line
    pub lines: Vec<Vec<Segment>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInput {
    version: Option<u32>,
    file: Option<String>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    names: Vec<String>,
    mappings: Option<String>,
    sections: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawOutput<'a> {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    sources: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    sources_content: Option<&'a [Option<String>]>,
    names: &'a [String],
    mappings: String,
}

impl SourceMap {
    /// Parses a JSON source map.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedSourceMap`] when the text is not JSON, the version is not
    /// 3, the map is an indexed map, or the `mappings` string does not decode
    /// against the declared `sources` and `names`.
    pub fn parse(text: &str) -> Result<Self, MalformedSourceMap> {
        let raw: RawInput = serde_json::from_str(text)
            .map_err(|e| MalformedSourceMap(format!("invalid JSON: {}", e)))?;

        match raw.version {
            Some(3) => {}
            Some(other) => {
                return Err(MalformedSourceMap(format!(
                    "unsupported version {}",
                    other
                )));
            }
            None => return Err(MalformedSourceMap("missing version".to_string())),
        }
        if raw.sections.is_some() {
            return Err(MalformedSourceMap(
                "indexed source maps (sections) are not supported".to_string(),
            ));
        }
        let mappings = raw
            .mappings
            .ok_or_else(|| MalformedSourceMap("missing mappings".to_string()))?;

        let root = raw.source_root.unwrap_or_default();
        let sources: Vec<String> = raw
            .sources
            .into_iter()
            .map(|source| apply_source_root(&root, &source.unwrap_or_default()))
            .collect();

        let mut sources_content = raw.sources_content.unwrap_or_default();
        sources_content.resize(sources.len(), None);

        let lines = decode_mappings(&mappings, sources.len(), raw.names.len())?;

        Ok(Self {
            file: raw.file,
            sources,
            sources_content,
            names: raw.names,
            lines,
        })
    }

    /// Serializes the map to JSON.
    ///
    /// Output is deterministic: field order is fixed and segments on each line
    /// are emitted in ascending column order.
    pub fn to_json(&self) -> String {
        let has_content = self.sources_content.iter().any(Option::is_some);
        let output = RawOutput {
            version: 3,
            file: self.file.as_deref(),
            sources: &self.sources,
            sources_content: has_content.then_some(self.sources_content.as_slice()),
            names: &self.names,
            mappings: encode_mappings(&self.lines),
        };

        // Serializing plain strings and vectors cannot fail
        serde_json::to_string(&output).unwrap_or_default()
    }
}

fn apply_source_root(root: &str, source: &str) -> String {
    if root.is_empty() || source.starts_with('/') || source.contains("://") {
        return source.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), source)
}

fn to_index(value: i64, what: &str) -> Result<u32, MalformedSourceMap> {
    u32::try_from(value).map_err(|_| MalformedSourceMap(format!("{} out of range: {}", what, value)))
}

fn decode_mappings(
    mappings: &str,
    source_count: usize,
    name_count: usize,
) -> Result<Vec<Vec<Segment>>, MalformedSourceMap> {
    let mut lines = Vec::new();
    let mut source: i64 = 0;
    let mut original_line: i64 = 0;
    let mut original_column: i64 = 0;
    let mut name: i64 = 0;

    for line_text in mappings.split(';') {
        let mut column: i64 = 0;
        let mut segments = Vec::new();

        for segment_text in line_text.split(',').filter(|s| !s.is_empty()) {
            let values = vlq::decode_segment(segment_text)?;

            column += values[0];
            let original = match values.len() {
                1 => None,
                4 | 5 => {
                    source += values[1];
                    original_line += values[2];
                    original_column += values[3];

                    let source_index = to_index(source, "source index")?;
                    if source_index as usize >= source_count {
                        return Err(MalformedSourceMap(format!(
                            "source index {} exceeds {} sources",
                            source_index, source_count
                        )));
                    }

                    let name_index = if values.len() == 5 {
                        name += values[4];
                        let index = to_index(name, "name index")?;
                        if index as usize >= name_count {
                            return Err(MalformedSourceMap(format!(
                                "name index {} exceeds {} names",
                                index, name_count
                            )));
                        }
                        Some(index)
                    } else {
                        None
                    };

                    Some(OriginalPosition {
                        source: source_index,
                        line: to_index(original_line, "original line")?,
                        column: to_index(original_column, "original column")?,
                        name: name_index,
                    })
                }
                n => {
                    return Err(MalformedSourceMap(format!(
                        "segment {:?} has {} fields",
                        segment_text, n
                    )));
                }
            };

            segments.push(Segment {
                column: to_index(column, "generated column")?,
                original,
            });
        }

        lines.push(segments);
    }

    Ok(lines)
}

fn encode_mappings(lines: &[Vec<Segment>]) -> String {
    let mut out = String::new();
    let mut source: i64 = 0;
    let mut original_line: i64 = 0;
    let mut original_column: i64 = 0;
    let mut name: i64 = 0;

    // Trailing lines without segments carry no information
    let used = lines
        .iter()
        .rposition(|segments| !segments.is_empty())
        .map_or(0, |last| last + 1);

    for (index, segments) in lines[..used].iter().enumerate() {
        if index > 0 {
            out.push(';');
        }

        let mut ordered = segments.clone();
        ordered.sort_by_key(|segment| segment.column);

        let mut column: i64 = 0;
        for (position, segment) in ordered.iter().enumerate() {
            if position > 0 {
                out.push(',');
            }
            vlq::encode(i64::from(segment.column) - column, &mut out);
            column = i64::from(segment.column);

            if let Some(original) = segment.original {
                vlq::encode(i64::from(original.source) - source, &mut out);
                vlq::encode(i64::from(original.line) - original_line, &mut out);
                vlq::encode(i64::from(original.column) - original_column, &mut out);
                source = i64::from(original.source);
                original_line = i64::from(original.line);
                original_column = i64::from(original.column);

                if let Some(index) = original.name {
                    vlq::encode(i64::from(index) - name, &mut out);
                    name = i64::from(index);
                }
            }
        }
    }

    out
}
