//! Pattern addressing for brace-delimited project descriptors
//!
//! The project descriptor is never parsed as a whole. Its content is the
//! arena and a [`Section`] is a pair of indices into it: the opening `{` and
//! the matching closing `}` of one block. Only the top level of a located
//! section is ever tokenized (as `key = value;` entries); values stay opaque
//! byte ranges so syntax the patcher does not model survives untouched.
//!
//! The scanner understands just enough of the grammar to keep braces honest:
//! double-quoted strings with backslash escapes, `/* */` block comments and
//! `//` line comments.

use std::ops::Range;

use regex::Regex;

use crate::error::PatchError;
use super::PatchResult;

/// A located `{ ... }` block inside descriptor content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    /// Start of the addressing marker that located this block
    pub start: usize,
    /// Index of the opening `{`
    pub open: usize,
    /// Index of the matching closing `}`
    pub close: usize,
}

impl Section {
    /// Range strictly between the braces
    pub fn body_range(&self) -> Range<usize> {
        self.open + 1..self.close
    }

    /// Whole block including both braces
    pub fn block_range(&self) -> Range<usize> {
        self.open..self.close + 1
    }

    pub fn body<'a>(&self, content: &'a str) -> &'a str {
        &content[self.body_range()]
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.open <= offset && offset <= self.close
    }
}

/// One top-level `key = value;` entry of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Key token as written (quotes included, if any)
    pub key: Range<usize>,
    /// Value token, trimmed of surrounding whitespace
    pub value: Range<usize>,
    /// Index of the terminating `;`
    pub terminator: usize,
}

impl Entry {
    pub fn key_text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.key.clone()]
    }

    pub fn value_text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.value.clone()]
    }

    /// True when the key equals `key`, ignoring quoting
    pub fn has_key(&self, content: &str, key: &str) -> bool {
        unquote(self.key_text(content)) == key
    }
}

/// Strip one level of double quotes and backslash escapes from a token.
pub fn unquote(token: &str) -> String {
    let inner = match token.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => inner,
        None => return token.to_string(),
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Regex matching `/* NAME */ = {` with exact name boundaries
fn named_block_regex(name: &str) -> PatchResult<Regex> {
    let pattern = format!(r"/\*\s*{}\s*\*/\s*=\s*\{{", regex::escape(name));
    Regex::new(&pattern)
        .map_err(|e| PatchError::RegexInvalid(format!("Invalid block pattern for '{}': {}", name, e)))
}

/// Find every block addressed by `/* NAME */ = {`.
///
/// The name is matched exactly: `Debug-vicosa` does not address
/// `/* Debug-vicosaExtra */`. Markers that sit inside another comment or a
/// string are ignored.
pub fn find_named_blocks(content: &str, name: &str) -> PatchResult<Vec<Section>> {
    let regex = named_block_regex(name)?;
    let bytes = content.as_bytes();
    let mut sections = Vec::new();

    for m in regex.find_iter(content) {
        if in_comment_or_string(bytes, m.start()) {
            continue;
        }
        let open = m.end() - 1;
        let close = scan_block_end(bytes, open)?;
        sections.push(Section {
            start: m.start(),
            open,
            close,
        });
    }

    log::debug!("[Locator] '{}' -> {} candidate block(s)", name, sections.len());
    Ok(sections)
}

/// Locate exactly one block named `name`.
///
/// Returns `Ok(None)` when absent and `AmbiguousMatch` when several blocks
/// carry the same name.
pub fn locate_named_block(content: &str, name: &str) -> PatchResult<Option<Section>> {
    let mut sections = find_named_blocks(content, name)?;
    match sections.len() {
        0 => Ok(None),
        1 => Ok(sections.pop()),
        n => Err(PatchError::AmbiguousMatch {
            key: name.to_string(),
            candidates: n,
        }),
    }
}

/// Find a nested `KEY = { ... }` block at the top level of `parent`.
pub fn find_child_block(content: &str, parent: &Section, key: &str) -> PatchResult<Option<Section>> {
    for entry in top_level_entries(content, parent)? {
        if !entry.has_key(content, key) {
            continue;
        }
        if content.as_bytes().get(entry.value.start) == Some(&b'{') {
            let open = entry.value.start;
            let close = scan_block_end(content.as_bytes(), open)?;
            return Ok(Some(Section {
                start: entry.key.start,
                open,
                close,
            }));
        }
    }
    Ok(None)
}

/// Tokenize the top level of a section into `key = value;` entries.
pub fn top_level_entries(content: &str, section: &Section) -> PatchResult<Vec<Entry>> {
    let bytes = content.as_bytes();
    let end = section.close;
    let mut entries = Vec::new();
    let mut i = section.open + 1;

    loop {
        i = skip_trivia(bytes, i, end)?;
        if i >= end {
            break;
        }

        let key_start = i;
        let key_end = if bytes[i] == b'"' {
            skip_string(bytes, i)?
        } else {
            scan_bare_token(bytes, i, end)
        };
        if key_end == key_start {
            return Err(PatchError::Malformed(format!(
                "unexpected '{}' at offset {} (expected a key)",
                bytes[i] as char, i
            )));
        }

        i = skip_trivia(bytes, key_end, end)?;
        if i >= end || bytes[i] != b'=' {
            return Err(PatchError::Malformed(format!(
                "expected '=' after key '{}' at offset {}",
                &content[key_start..key_end],
                key_start
            )));
        }

        let value_start = skip_trivia(bytes, i + 1, end)?;
        let terminator = scan_value_end(bytes, value_start, end)?;
        let value_end = trim_end(bytes, value_start, terminator);

        entries.push(Entry {
            key: key_start..key_end,
            value: value_start..value_end,
            terminator,
        });
        i = terminator + 1;
    }

    Ok(entries)
}

/// Index of the `}` matching the `{` at `open`.
pub fn scan_block_end(bytes: &[u8], open: usize) -> PatchResult<usize> {
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_string(bytes, i)?;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') || bytes.get(i + 1) == Some(&b'/') => {
                i = skip_comment(bytes, i)?;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err(PatchError::Malformed(format!(
        "unbalanced braces: block opened at offset {} is never closed",
        open
    )))
}

/// Index of the `;` ending the value that starts at `start`.
fn scan_value_end(bytes: &[u8], start: usize, limit: usize) -> PatchResult<usize> {
    let mut depth = 0usize;
    let mut i = start;

    while i < limit {
        match bytes[i] {
            b'"' => {
                i = skip_string(bytes, i)?;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') || bytes.get(i + 1) == Some(&b'/') => {
                i = skip_comment(bytes, i)?;
                continue;
            }
            b'{' | b'(' => depth += 1,
            b'}' | b')' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            b';' if depth == 0 => return Ok(i),
            _ => {}
        }
        i += 1;
    }

    Err(PatchError::Malformed(format!(
        "value starting at offset {} has no terminating ';'",
        start
    )))
}

/// Index just past the closing quote of the string opening at `start`.
fn skip_string(bytes: &[u8], start: usize) -> PatchResult<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(PatchError::Malformed(format!(
        "unterminated string starting at offset {}",
        start
    )))
}

/// Index just past the comment opening at `start` (`/*` or `//`).
fn skip_comment(bytes: &[u8], start: usize) -> PatchResult<usize> {
    if bytes.get(start + 1) == Some(&b'/') {
        let mut i = start + 2;
        while i < bytes.len() && bytes[i] != b'\n' {
            i += 1;
        }
        return Ok(i);
    }

    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return Ok(i + 2);
        }
        i += 1;
    }
    Err(PatchError::Malformed(format!(
        "unterminated comment starting at offset {}",
        start
    )))
}

/// Skip whitespace and comments, never past `limit`.
fn skip_trivia(bytes: &[u8], mut i: usize, limit: usize) -> PatchResult<usize> {
    while i < limit {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
        } else if bytes[i] == b'/' && matches!(bytes.get(i + 1), Some(b'*') | Some(b'/')) {
            i = skip_comment(bytes, i)?;
        } else {
            break;
        }
    }
    Ok(i.min(limit))
}

fn scan_bare_token(bytes: &[u8], mut i: usize, limit: usize) -> usize {
    while i < limit {
        let b = bytes[i];
        if b.is_ascii_whitespace() || matches!(b, b'=' | b';' | b'{' | b'}' | b'(' | b')' | b',' | b'"') {
            break;
        }
        if b == b'/' && matches!(bytes.get(i + 1), Some(b'*') | Some(b'/')) {
            break;
        }
        i += 1;
    }
    i
}

fn trim_end(bytes: &[u8], start: usize, mut end: usize) -> usize {
    while end > start && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    end
}

/// True when `offset` falls inside a comment or string that starts earlier
/// on the same line, or inside an unterminated block comment.
fn in_comment_or_string(bytes: &[u8], offset: usize) -> bool {
    let mut i = 0;
    while i < offset {
        match bytes[i] {
            b'"' => match skip_string(bytes, i) {
                Ok(next) if next <= offset => i = next,
                _ => return true,
            },
            b'/' if matches!(bytes.get(i + 1), Some(b'*') | Some(b'/')) => {
                match skip_comment(bytes, i) {
                    Ok(next) if next <= offset => i = next,
                    _ => return true,
                }
            }
            _ => i += 1,
        }
    }
    false
}

/// Leading whitespace of the line containing `offset`, when everything
/// between the line start and `offset` is whitespace.
pub fn line_indent(content: &str, offset: usize) -> Option<&str> {
    let line_start = content[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let prefix = &content[line_start..offset];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        Some(prefix)
    } else {
        None
    }
}

/// Leading whitespace of the line containing `offset`.
pub fn leading_whitespace(content: &str, offset: usize) -> &str {
    let line_start = content[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let line = &content[line_start..];
    let width = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..width]
}
