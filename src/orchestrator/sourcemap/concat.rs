//! Concatenation of independently generated source maps.

use super::{OriginalPosition, Segment, SourceMap};
use crate::orchestrator::error::MalformedSourceMap;
use std::collections::HashMap;

/// Builds one source map for a sequence of `(code, map)` pieces that are
/// concatenated in push order.
///
/// Segments of the first piece are kept as they are. Segments of every later
/// piece are shifted by the position where that piece starts in the
/// concatenated text: lines move down by the number of line breaks before
/// it, and segments on its first line also move right by the length of the
/// line it continues.
#[derive(Debug, Default)]
pub struct SourceMapConcat {
    merged: SourceMap,
    source_index: HashMap<String, u32>,
    name_index: HashMap<String, u32>,
    line: usize,
    column: u32,
}

impl SourceMapConcat {
    /// Creates an empty concatenation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one piece.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedSourceMap`] when `map` cannot be parsed. The builder
    /// is left untouched in that case.
    pub fn push(&mut self, code: &str, map: &str) -> Result<&mut Self, MalformedSourceMap> {
        let map = SourceMap::parse(map)?;

        let sources: Vec<u32> = map
            .sources
            .iter()
            .zip(&map.sources_content)
            .map(|(source, content)| self.intern_source(source, content))
            .collect();
        let names: Vec<u32> = map.names.iter().map(|name| self.intern_name(name)).collect();

        for (offset, segments) in map.lines.iter().enumerate() {
            let target = self.line + offset;
            if self.merged.lines.len() <= target {
                self.merged.lines.resize_with(target + 1, Vec::new);
            }

            let column_shift = if offset == 0 { self.column } else { 0 };
            self.merged.lines[target].extend(segments.iter().map(|segment| Segment {
                column: segment.column + column_shift,
                original: segment.original.map(|original| OriginalPosition {
                    source: sources[original.source as usize],
                    name: original.name.map(|name| names[name as usize]),
                    ..original
                }),
            }));
        }

        self.advance(code);
        Ok(self)
    }

    /// Finishes the concatenation and returns the merged map.
    pub fn finish(self) -> SourceMap {
        self.merged
    }

    fn advance(&mut self, code: &str) {
        match code.rfind('\n') {
            Some(last_break) => {
                self.line += code.matches('\n').count();
                self.column = utf16_len(&code[last_break + 1..]);
            }
            None => self.column += utf16_len(code),
        }
    }

    fn intern_source(&mut self, source: &str, content: &Option<String>) -> u32 {
        if let Some(&index) = self.source_index.get(source) {
            return index;
        }
        let index = self.merged.sources.len() as u32;
        self.merged.sources.push(source.to_string());
        self.merged.sources_content.push(content.clone());
        self.source_index.insert(source.to_string(), index);
        index
    }

    fn intern_name(&mut self, name: &str) -> u32 {
        if let Some(&index) = self.name_index.get(name) {
            return index;
        }
        let index = self.merged.names.len() as u32;
        self.merged.names.push(name.to_string());
        self.name_index.insert(name.to_string(), index);
        index
    }
}

fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

/// Merges two `(code, map)` pairs, framework artifact first, application second.
///
/// Returns the merged map as JSON, valid against `first_code + second_code`.
pub fn merge_source_maps(
    first_code: &str,
    first_map: &str,
    second_code: &str,
    second_map: &str,
) -> Result<String, MalformedSourceMap> {
    let mut concat = SourceMapConcat::new();
    concat.push(first_code, first_map)?;
    concat.push(second_code, second_map)?;
    Ok(concat.finish().to_json())
}
