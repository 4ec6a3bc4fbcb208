//! Key editing on located sections.
//!
//! Two editors share one contract: make a key/entry present with the desired
//! value, touch nothing else, and produce byte-identical output when run a
//! second time with the same arguments.
//!
//! - [`upsert`] works on a brace [`Section`] of the project descriptor and
//!   splices text into the content arena.
//! - [`upsert_child`] works on an XML [`Element`] and uses a caller-supplied
//!   signature predicate to find (and drop) earlier copies of the entry.

use crate::models::EditOutcome;
use super::locator::{leading_whitespace, line_indent, top_level_entries, unquote, Entry, Section};
use super::xml_tree::Element;
use super::PatchResult;
use crate::error::PatchError;

/// Content after a brace edit, with what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraceEdit {
    pub content: String,
    pub outcome: EditOutcome,
}

/// Render a value the way the project descriptor quotes strings.
///
/// Tokens made only of `[A-Za-z0-9_$/.]` stay bare; anything else is
/// double-quoted with `"` and `\` escaped.
pub fn render_value(value: &str) -> String {
    let bare = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '/' | '.'));
    if bare {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Find the single top-level entry for `key` in `section`.
///
/// A key written twice in the same section is reported as ambiguous.
pub fn find_key(content: &str, section: &Section, key: &str) -> PatchResult<Option<Entry>> {
    let mut matches: Vec<Entry> = top_level_entries(content, section)?
        .into_iter()
        .filter(|e| e.has_key(content, key))
        .collect();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        n => Err(PatchError::AmbiguousMatch {
            key: key.to_string(),
            candidates: n,
        }),
    }
}

/// Insert or rewrite `key = value;` inside `section`.
///
/// An existing entry keeps its key, spacing and terminator; only the value
/// token is replaced. A missing entry is appended after the last entry,
/// right before the closing brace, indented like its siblings.
pub fn upsert(content: &str, section: &Section, key: &str, value: &str) -> PatchResult<BraceEdit> {
    let rendered = render_value(value);

    if let Some(entry) = find_key(content, section, key)? {
        let current = entry.value_text(content);
        if current == rendered || unquote(current) == value {
            return Ok(BraceEdit {
                content: content.to_string(),
                outcome: EditOutcome::AlreadyPresent,
            });
        }

        let mut updated = String::with_capacity(content.len() + rendered.len());
        updated.push_str(&content[..entry.value.start]);
        updated.push_str(&rendered);
        updated.push_str(&content[entry.value.end..]);
        return Ok(BraceEdit {
            content: updated,
            outcome: EditOutcome::Applied,
        });
    }

    let entries = top_level_entries(content, section)?;
    let closing_indent = leading_whitespace(content, section.close);
    let indent = entries
        .first()
        .and_then(|e| line_indent(content, e.key.start))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}\t", closing_indent));

    let insert_at = insertion_point(content, section);
    let mut inserted = format!("\n{}{} = {};", indent, key, rendered);
    if !content[insert_at..section.close].contains('\n') {
        inserted.push('\n');
        inserted.push_str(closing_indent);
    }

    let mut updated = String::with_capacity(content.len() + inserted.len());
    updated.push_str(&content[..insert_at]);
    updated.push_str(&inserted);
    updated.push_str(&content[insert_at..]);
    Ok(BraceEdit {
        content: updated,
        outcome: EditOutcome::Applied,
    })
}

/// Just past the last non-whitespace byte of the section body.
fn insertion_point(content: &str, section: &Section) -> usize {
    let body = section.body(content);
    let trimmed = body.trim_end();
    section.open + 1 + trimmed.len()
}

/// Make `entry` the single child of `parent` recognised by `signature`.
///
/// When exactly one matching child exists and it already equals `entry`,
/// nothing changes. Otherwise every matching child is removed and `entry` is
/// appended, so repeated runs never accumulate duplicates.
pub fn upsert_child(
    parent: &mut Element,
    signature: &dyn Fn(&Element) -> bool,
    entry: Element,
) -> EditOutcome {
    let matching: Vec<&Element> = parent.elements().filter(|e| signature(e)).collect();
    if matching.len() == 1 && *matching[0] == entry {
        return EditOutcome::AlreadyPresent;
    }

    let removed = parent.remove_elements(|e| signature(e));
    if removed > 0 {
        log::debug!("[Editor] removed {} stale '{}' entr(ies)", removed, entry.name);
    }
    parent.push_element(entry);
    EditOutcome::Applied
}
