//! USDA (ASCII) file parser.
//!
//! Line-oriented: the file is split into lines, and statements that span
//! several lines (multi-line arrays, metadata blocks, time samples) are
//! joined until their brackets balance.
//!
//! # Supported Syntax
//!
//! - `def`, `over` and `class` prim blocks, typed or typeless
//! - prim metadata: `instanceable`, `active`, `references`, `payload`
//! - attributes with `custom`/`uniform` qualifiers, arrays, default values,
//!   `.timeSamples`, `.connect` and `interpolation` metadata
//! - relationships (`rel material:binding = </Mat>`)
//! - layer metadata: `defaultPrim`, `startTimeCode`, `endTimeCode`
//!
//! Unknown statements (variant sets, splines...) are skipped.

use std::collections::VecDeque;

use thiserror::Error;

use super::literal::{Literal, LiteralReader};
use super::types::*;

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file in statement starting at line {0}")]
    UnexpectedEof(usize),

    #[error("Invalid value for {type_name} {name} at line {line}")]
    InvalidValue {
        line: usize,
        name: String,
        type_name: String,
    },

    #[error("Unclosed block starting at line {0}")]
    UnclosedBlock(usize),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// The contents of one parsed USDA file.
#[derive(Clone, Debug, Default)]
pub struct ParsedLayer {
    pub metadata: LayerMetadata,
    pub prims: Vec<PrimSpec>,
}

/// Parse USDA text.
pub fn parse_usda(content: &str) -> ParseResult<ParsedLayer> {
    UsdaParser::new(content).parse()
}

/// USDA file parser.
pub struct UsdaParser {
    lines: VecDeque<(usize, String)>,
}

impl UsdaParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> Self {
        let lines = content
            .lines()
            .enumerate()
            .map(|(i, s)| (i + 1, s.to_string()))
            .collect();

        Self { lines }
    }

    /// Parse the whole file.
    pub fn parse(&mut self) -> ParseResult<ParsedLayer> {
        let mut layer = ParsedLayer::default();

        // Layer metadata block right after the `#usda 1.0` header
        if let Some((line, text)) = self.next_line() {
            if text.starts_with('(') {
                let block = self.collect_balanced(line, text)?;
                let mut reader = LiteralReader::new(&block);
                reader.eat('(');
                for (key, value) in metadata_entries(&mut reader, line)? {
                    apply_layer_metadata(&mut layer.metadata, &key, value);
                }
            } else {
                self.lines.push_front((line, text));
            }
        }

        while let Some((line, text)) = self.next_line() {
            if starts_prim(&text) {
                let prim = self.parse_prim(line, text)?;
                layer.prims.push(prim);
            } else if text.starts_with('}') {
                return Err(ParseError::Parse {
                    line,
                    message: "unexpected '}'".to_string(),
                });
            } else {
                let statement = self.collect_balanced(line, text)?;
                log::debug!("Skipping top-level statement at line {}: {}", line, first_word(&statement));
            }
        }

        Ok(layer)
    }

    /// Next non-empty, non-comment line, trimmed.
    fn next_line(&mut self) -> Option<(usize, String)> {
        while let Some((num, line)) = self.lines.pop_front() {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                return Some((num, trimmed.to_string()));
            }
        }
        None
    }

    /// Join lines until every bracket opened in `text` is closed.
    ///
    /// Anything after an unmatched closer (e.g. the `}` ending an inline
    /// prim body) is pushed back for the caller.
    fn collect_balanced(&mut self, line: usize, mut text: String) -> ParseResult<String> {
        loop {
            let scan = scan(&text);
            if let Some(pos) = scan.unmatched_close {
                let rest = text[pos..].trim().to_string();
                text.truncate(pos);
                self.lines.push_front((line, rest));
                return Ok(text);
            }
            if scan.depth <= 0 {
                return Ok(text);
            }
            match self.lines.pop_front() {
                Some((_, next)) => {
                    text.push('\n');
                    text.push_str(next.trim());
                }
                None => return Err(ParseError::UnexpectedEof(line)),
            }
        }
    }

    /// Parse a `def Type "Name" (metadata) { ... }` block.
    fn parse_prim(&mut self, start_line: usize, mut header: String) -> ParseResult<PrimSpec> {
        // The header ends at the first `{` outside of the metadata parens
        let open = loop {
            if let Some(pos) = scan(&header).block_open {
                break pos;
            }
            match self.lines.pop_front() {
                Some((_, next)) => {
                    header.push('\n');
                    header.push_str(next.trim());
                }
                None => return Err(ParseError::UnclosedBlock(start_line)),
            }
        };
        let body_start = header[open + 1..].trim().to_string();
        if !body_start.is_empty() {
            self.lines.push_front((start_line, body_start));
        }

        let mut prim = parse_prim_header(&header[..open], start_line)?;

        loop {
            let (line, text) = self.next_line().ok_or(ParseError::UnclosedBlock(start_line))?;

            if let Some(rest) = text.strip_prefix('}') {
                let rest = rest.trim();
                if !rest.is_empty() {
                    self.lines.push_front((line, rest.to_string()));
                }
                return Ok(prim);
            }

            if starts_prim(&text) {
                let child = self.parse_prim(line, text)?;
                prim.children.push(child);
                continue;
            }

            let statement = self.collect_balanced(line, text)?;
            if !statement.trim().is_empty() {
                parse_property(&statement, line, &mut prim)?;
            }
        }
    }
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

fn starts_prim(text: &str) -> bool {
    matches!(first_word(text), "def" | "over" | "class")
        || text.starts_with("def\"")
        || text.starts_with("over\"")
        || text.starts_with("class\"")
}

struct Scan {
    /// Net count of opened brackets
    depth: i32,
    /// Byte offset of the first `{` outside parens and brackets
    block_open: Option<usize>,
    /// Byte offset of the first closer with no matching opener
    unmatched_close: Option<usize>,
}

fn scan(text: &str) -> Scan {
    let mut result = Scan {
        depth: 0,
        block_open: None,
        unmatched_close: None,
    };
    let mut quote: Option<char> = None;
    let mut in_comment = false;

    for (pos, c) in text.char_indices() {
        if in_comment {
            in_comment = c != '\n';
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '@' => quote = Some(c),
            '#' => in_comment = true,
            '(' | '[' => result.depth += 1,
            '{' => {
                if result.depth == 0 && result.block_open.is_none() {
                    result.block_open = Some(pos);
                }
                result.depth += 1;
            }
            ')' | ']' | '}' => {
                result.depth -= 1;
                if result.depth < 0 && result.unmatched_close.is_none() {
                    result.unmatched_close = Some(pos);
                }
            }
            _ => {}
        }
    }
    result
}

fn syntax(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_prim_header(header: &str, line: usize) -> ParseResult<PrimSpec> {
    let mut reader = LiteralReader::new(header);
    let mut prim = PrimSpec {
        specifier: match reader.ident() {
            Some("def") => Specifier::Def,
            Some("over") => Specifier::Over,
            Some("class") => Specifier::Class,
            _ => return Err(syntax(line, "expected def, over or class")),
        },
        ..Default::default()
    };

    if !reader.next_is('"') && !reader.next_is('\'') {
        let type_name = reader.ident().ok_or_else(|| syntax(line, "expected prim type or name"))?;
        prim.type_name = Some(type_name.to_string());
    }

    prim.name = match reader.literal() {
        Some(Literal::Str(name)) => name,
        _ => return Err(syntax(line, "expected quoted prim name")),
    };

    if reader.eat('(') {
        for (key, value) in metadata_entries(&mut reader, line)? {
            apply_prim_metadata(&mut prim, &key, value, line)?;
        }
    }

    if !reader.is_at_end() {
        return Err(syntax(line, format!("unexpected text after prim header: {}", reader.rest().trim())));
    }

    Ok(prim)
}

/// Read `key = value` pairs up to the closing `)`. The opening paren must
/// already be consumed.
fn metadata_entries(reader: &mut LiteralReader<'_>, line: usize) -> ParseResult<Vec<(String, Literal)>> {
    let mut entries = Vec::new();
    loop {
        if reader.eat(')') {
            return Ok(entries);
        }
        if reader.is_at_end() {
            return Err(ParseError::UnexpectedEof(line));
        }

        // A bare string is the doc comment
        if reader.next_is('"') || reader.next_is('\'') {
            let doc = reader.literal().ok_or_else(|| syntax(line, "bad doc string"))?;
            entries.push(("doc".to_string(), doc));
            continue;
        }

        let mut key = reader.ident().ok_or_else(|| syntax(line, "expected metadata key"))?;
        if matches!(key, "prepend" | "append" | "add" | "delete" | "reorder") {
            key = reader.ident().ok_or_else(|| syntax(line, "expected metadata key"))?;
        }
        if !reader.eat('=') {
            return Err(syntax(line, format!("expected '=' after {}", key)));
        }
        let value = reader
            .literal()
            .ok_or_else(|| syntax(line, format!("bad value for {}", key)))?;
        entries.push((key.to_string(), value));
        reader.eat(';');
    }
}

fn literal_bool(value: &Literal) -> Option<bool> {
    match value {
        Literal::Ident(word) if word == "true" => Some(true),
        Literal::Ident(word) if word == "false" => Some(false),
        Literal::Number(n) => Some(*n != 0.0),
        _ => None,
    }
}

fn literal_reference(value: &Literal) -> Option<Reference> {
    match value {
        Literal::Asset(asset, prim_path) => Some(Reference {
            asset: Some(asset.clone()),
            prim_path: prim_path.clone(),
        }),
        Literal::Path(path) => Some(Reference {
            asset: None,
            prim_path: Some(path.clone()),
        }),
        _ => None,
    }
}

fn literal_paths(value: &Literal) -> Vec<String> {
    match value {
        Literal::Path(path) => vec![path.clone()],
        Literal::List(items) => items
            .iter()
            .filter_map(|item| match item {
                Literal::Path(path) => Some(path.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn apply_prim_metadata(prim: &mut PrimSpec, key: &str, value: Literal, line: usize) -> ParseResult<()> {
    match key {
        "instanceable" => {
            prim.instanceable = Some(literal_bool(&value).ok_or_else(|| syntax(line, "instanceable must be a bool"))?);
        }
        "active" => {
            prim.active = Some(literal_bool(&value).ok_or_else(|| syntax(line, "active must be a bool"))?);
        }
        "references" | "payload" => match &value {
            Literal::List(items) => prim.references.extend(items.iter().filter_map(literal_reference)),
            Literal::Ident(word) if word == "None" => {}
            other => {
                let reference = literal_reference(other).ok_or_else(|| syntax(line, "bad reference"))?;
                prim.references.push(reference);
            }
        },
        _ => log::debug!("Ignoring prim metadata '{}' on {}", key, prim.name),
    }
    Ok(())
}

fn apply_layer_metadata(metadata: &mut LayerMetadata, key: &str, value: Literal) {
    match (key, value) {
        ("defaultPrim", Literal::Str(name)) => metadata.default_prim = Some(name),
        ("startTimeCode", Literal::Number(t)) => metadata.start_time_code = Some(t),
        ("endTimeCode", Literal::Number(t)) => metadata.end_time_code = Some(t),
        ("doc", Literal::Str(doc)) => metadata.doc = Some(doc),
        (key, _) => log::debug!("Ignoring layer metadata '{}'", key),
    }
}

enum Suffix {
    Default,
    TimeSamples,
    Connect,
}

/// Parse one attribute or relationship statement into `prim`.
fn parse_property(statement: &str, line: usize, prim: &mut PrimSpec) -> ParseResult<()> {
    let mut reader = LiteralReader::new(statement);

    let type_name = loop {
        match reader.ident() {
            Some("custom" | "uniform" | "varying" | "prepend" | "append" | "add" | "delete") => continue,
            Some("reorder") => return Ok(()),
            Some("rel") => return parse_relationship(&mut reader, line, prim),
            Some(word) => break word,
            None => {
                log::debug!("Skipping statement at line {}: {}", line, first_word(statement));
                return Ok(());
            }
        }
    };

    let is_array = reader.next_is('[');
    if is_array && !(reader.eat('[') && reader.eat(']')) {
        return Err(syntax(line, "expected '[]' after type"));
    }

    let full_name = match reader.ident() {
        Some(name) => name,
        None => {
            // `variantSet "name" = {...}` and friends
            log::debug!("Skipping statement at line {}: {}", line, type_name);
            return Ok(());
        }
    };
    let (name, suffix) = if let Some(name) = full_name.strip_suffix(".timeSamples") {
        (name, Suffix::TimeSamples)
    } else if let Some(name) = full_name.strip_suffix(".connect") {
        (name, Suffix::Connect)
    } else if let Some(name) = full_name.strip_suffix(".spline") {
        log::debug!("Skipping spline on {} at line {}", name, line);
        return Ok(());
    } else {
        (full_name, Suffix::Default)
    };

    let attr = prim.attribute_mut(name);
    if attr.type_name.is_empty() {
        attr.type_name = type_name.to_string();
        attr.is_array = is_array;
    }
    let invalid = || ParseError::InvalidValue {
        line,
        name: name.to_string(),
        type_name: type_name.to_string(),
    };

    if reader.eat('=') {
        let value = reader.literal().ok_or_else(invalid)?;
        match suffix {
            Suffix::Default => {
                if value != Literal::Ident("None".to_string()) {
                    attr.default = Some(value.to_value(type_name, is_array).ok_or_else(invalid)?);
                }
            }
            Suffix::TimeSamples => {
                let samples = match value {
                    Literal::Samples(samples) => samples,
                    _ => return Err(invalid()),
                };
                attr.samples.clear();
                for (time, sample) in samples {
                    if sample == Literal::Ident("None".to_string()) {
                        continue;
                    }
                    let sample = sample.to_value(type_name, is_array).ok_or_else(invalid)?;
                    attr.samples.push((time, sample));
                }
                attr.samples.sort_by(|a, b| a.0.total_cmp(&b.0));
            }
            Suffix::Connect => attr.connections = literal_paths(&value),
        }
    }

    if reader.eat('(') {
        for (key, value) in metadata_entries(&mut reader, line)? {
            if let ("interpolation", Literal::Str(interpolation)) = (key.as_str(), value) {
                attr.interpolation = Some(interpolation);
            }
        }
    }

    Ok(())
}

fn parse_relationship(reader: &mut LiteralReader<'_>, line: usize, prim: &mut PrimSpec) -> ParseResult<()> {
    let name = reader
        .ident()
        .ok_or_else(|| syntax(line, "expected relationship name"))?
        .to_string();

    let targets = if reader.eat('=') {
        let value = reader.literal().ok_or_else(|| syntax(line, format!("bad targets for {}", name)))?;
        literal_paths(&value)
    } else {
        Vec::new()
    };

    match prim.relationships.iter_mut().find(|r| r.name == name) {
        Some(rel) => rel.targets = targets,
        None => prim.relationships.push(Relationship { name, targets }),
    }
    Ok(())
}
