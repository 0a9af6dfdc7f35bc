//! Marker-delimited blocks: the pure text half of the patch engine.
//!
//! A block is owned by a `(scope, block id)` pair and framed by two comment
//! lines in the file's own syntax:
//!
//! ```text
//! // WEFT-START jni-bridge:bookmark-methods
//! ...generated lines...
//! // WEFT-END jni-bridge:bookmark-methods
//! ```
//!
//! Everything outside a block is never rewritten. Inside a block, the body is
//! replaced wholesale. Markers are matched on trimmed lines, so indentation
//! added by hand around a block does not break it. A dangling or duplicated
//! marker is reported and the file is left alone.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::language::Language;

pub const START_TAG: &str = "WEFT-START";
pub const END_TAG: &str = "WEFT-END";

// Comment opener, tag, key, optional comment closer.
const MARKER_PATTERN: &str = r"^\s*\S+\s+WEFT-(START|END)\s+([^\s:]+):(\S+)(?:\s+\S+)?\s*$";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MARKER_PATTERN).expect("marker pattern is a valid regex"))
}

// ── Keys ─────────────────────────────────────────────────────────────────────

/// `(scope, block id)`. Unique per file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarkerKey {
    scope: String,
    block: String,
}

impl MarkerKey {
    /// # Errors
    ///
    /// `InvalidMarkerKey` if either part is empty or contains whitespace, or
    /// the scope contains `:`.
    pub fn new(scope: impl Into<String>, block: impl Into<String>) -> Result<Self, DomainError> {
        let (scope, block) = (scope.into(), block.into());
        let key = format!("{scope}:{block}");
        let invalid = |reason: &str| DomainError::InvalidMarkerKey {
            key: key.clone(),
            reason: reason.into(),
        };

        if scope.is_empty() || block.is_empty() {
            return Err(invalid("scope and block id must be non-empty"));
        }
        if scope.contains(':') {
            return Err(invalid("scope cannot contain ':'"));
        }
        if scope.chars().chain(block.chars()).any(char::is_whitespace) {
            return Err(invalid("marker keys cannot contain whitespace"));
        }
        Ok(Self { scope, block })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn block(&self) -> &str {
        &self.block
    }

    pub fn start_line(&self, language: Language) -> String {
        language
            .comment_style()
            .wrap(&format!("{START_TAG} {self}"))
    }

    pub fn end_line(&self, language: Language) -> String {
        language.comment_style().wrap(&format!("{END_TAG} {self}"))
    }
}

impl fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.block)
    }
}

impl FromStr for MarkerKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((scope, block)) => Self::new(scope, block),
            None => Err(DomainError::InvalidMarkerKey {
                key: s.to_string(),
                reason: "expected 'scope:block'".into(),
            }),
        }
    }
}

impl TryFrom<String> for MarkerKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MarkerKey> for String {
    fn from(key: MarkerKey) -> Self {
        key.to_string()
    }
}

// ── Anchors and outcomes ─────────────────────────────────────────────────────

/// Where a block goes when it does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", content = "pattern", rename_all = "kebab-case")]
pub enum Anchor {
    #[default]
    EndOfFile,
    /// After the first line matching the regex.
    After(String),
    /// Before the first line matching the regex.
    Before(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOutcome {
    Inserted,
    Updated,
    Unchanged,
}

impl PatchOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// A well-formed block found in a file. Line indices are zero-based and
/// inclusive of both marker lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub key: MarkerKey,
    pub start: usize,
    pub end: usize,
}

// ── Scanning ─────────────────────────────────────────────────────────────────

fn lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

fn corruption(marker: &str, reason: &str) -> DomainError {
    DomainError::MarkerCorruption {
        marker: marker.trim().to_string(),
        reason: reason.into(),
    }
}

/// Find every block in `text`, in any comment syntax.
///
/// # Errors
///
/// `MarkerCorruption` for a start without an end, an end without a start,
/// a block opened inside another, or the same key twice.
pub fn scan_blocks(text: &str) -> Result<Vec<BlockSpan>, DomainError> {
    scan_lines(&lines(text))
}

fn scan_lines(lines: &[&str]) -> Result<Vec<BlockSpan>, DomainError> {
    let re = marker_regex();
    let mut spans = Vec::new();
    let mut seen = HashSet::new();
    let mut open: Option<(MarkerKey, usize, &str)> = None;

    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = re.captures(line.trim_end_matches(['\n', '\r'])) else {
            continue;
        };
        let key = MarkerKey::new(&caps[2], &caps[3]).map_err(|_| corruption(line, "malformed marker key"))?;

        match (&caps[1], open.take()) {
            ("START", None) => {
                if seen.contains(&key) {
                    return Err(corruption(line, "duplicate block"));
                }
                open = Some((key, i, *line));
            }
            ("START", Some((_, _, outer))) => {
                return Err(corruption(
                    line,
                    &format!("block opened inside `{}`", outer.trim()),
                ));
            }
            ("END", Some((open_key, start, start_line))) => {
                if open_key != key {
                    return Err(corruption(start_line, "start marker without matching end"));
                }
                seen.insert(key.clone());
                spans.push(BlockSpan {
                    key,
                    start,
                    end: i,
                });
            }
            (_, None) => return Err(corruption(line, "end marker without start")),
            (_, Some(_)) => unreachable!("marker pattern only captures START or END"),
        }
    }

    if let Some((_, _, line)) = open {
        return Err(corruption(line, "start marker without matching end"));
    }
    Ok(spans)
}

// ── Rendering and applying ───────────────────────────────────────────────────

/// `"\r\n"` if the first line of `text` ends that way, `"\n"` otherwise.
pub fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(i) if text[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

fn normalize_body(content: &str, eol: &str) -> String {
    let mut body = if eol == "\n" {
        content.to_string()
    } else {
        content.replace("\r\n", "\n").replace('\n', eol)
    };
    if !body.is_empty() && !body.ends_with('\n') {
        body.push_str(eol);
    }
    body
}

/// Full block text: start marker, body, end marker, newline-terminated.
pub fn render_block(key: &MarkerKey, language: Language, content: &str) -> String {
    render_block_with(key, language, content, "\n")
}

fn render_block_with(key: &MarkerKey, language: Language, content: &str, eol: &str) -> String {
    format!(
        "{}{eol}{}{}{eol}",
        key.start_line(language),
        normalize_body(content, eol),
        key.end_line(language)
    )
}

/// Insert or replace the block for `key` in `text`.
///
/// Returns the new text and what happened. `Unchanged` means the returned
/// text is byte-identical to the input. Marker and body lines use the
/// file's line ending.
///
/// Appending to a file whose last line is unterminated puts the block after
/// a new line break and leaves the end marker unterminated, so the file's
/// own bytes stay a prefix and [`remove_blocks`] can restore them exactly.
///
/// # Errors
///
/// `MarkerCorruption` if the file's markers are malformed, `InvalidAnchor`
/// for a bad pattern, `AnchorNotFound` if an anchor pattern matches no line.
pub fn apply_block(
    text: &str,
    key: &MarkerKey,
    language: Language,
    content: &str,
    anchor: &Anchor,
) -> Result<(String, PatchOutcome), DomainError> {
    let lines = lines(text);
    let spans = scan_lines(&lines)?;
    let eol = line_ending(text);
    let body = normalize_body(content, eol);

    if let Some(span) = spans.iter().find(|s| &s.key == key) {
        let current: String = lines[span.start + 1..span.end].concat();
        if current == body {
            return Ok((text.to_string(), PatchOutcome::Unchanged));
        }
        let mut out = String::with_capacity(text.len() + body.len());
        out.push_str(&lines[..=span.start].concat());
        out.push_str(&body);
        out.push_str(&lines[span.end..].concat());
        return Ok((out, PatchOutcome::Updated));
    }

    let block = render_block_with(key, language, content, eol);
    let at = match anchor {
        Anchor::EndOfFile => lines.len(),
        Anchor::After(pattern) => find_line(&lines, pattern)? + 1,
        Anchor::Before(pattern) => find_line(&lines, pattern)?,
    };

    let mut out = String::with_capacity(text.len() + block.len() + eol.len());
    out.push_str(&lines[..at].concat());
    if !out.is_empty() && !out.ends_with('\n') {
        // Only possible when appending after an unterminated last line.
        out.push_str(eol);
        out.push_str(block.strip_suffix(eol).unwrap_or(&block));
    } else {
        out.push_str(&block);
    }
    out.push_str(&lines[at..].concat());
    Ok((out, PatchOutcome::Inserted))
}

fn find_line(lines: &[&str], pattern: &str) -> Result<usize, DomainError> {
    let re = Regex::new(pattern).map_err(|e| DomainError::InvalidAnchor {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    lines
        .iter()
        .position(|l| re.is_match(l.trim_end_matches(['\n', '\r'])))
        .ok_or_else(|| DomainError::AnchorNotFound {
            pattern: pattern.to_string(),
        })
}

/// Remove every block for which `keep` returns false.
///
/// Returns the new text and the removed keys in file order. A removed block
/// whose end marker is the unterminated last line takes the line break
/// before it along, undoing what [`apply_block`] added.
pub fn remove_blocks(
    text: &str,
    mut keep: impl FnMut(&MarkerKey) -> bool,
) -> Result<(String, Vec<MarkerKey>), DomainError> {
    let lines = lines(text);
    let spans = scan_lines(&lines)?;

    let mut removed = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if keep(&span.key) {
            continue;
        }
        out.push_str(&lines[cursor..span.start].concat());
        if span.end + 1 == lines.len() && !lines[span.end].ends_with('\n') {
            let trimmed = out
                .strip_suffix("\r\n")
                .or_else(|| out.strip_suffix('\n'))
                .map(str::len);
            if let Some(len) = trimmed {
                out.truncate(len);
            }
        }
        cursor = span.end + 1;
        removed.push(span.key);
    }
    out.push_str(&lines[cursor..].concat());
    Ok((out, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> MarkerKey {
        s.parse().unwrap()
    }

    const HAND: &str = "fn main() {\n    println!(\"hi\");\n}\n";

    #[test]
    fn marker_lines_use_language_comments() {
        let k = key("jni:methods");
        assert_eq!(k.start_line(Language::Rust), "// WEFT-START jni:methods");
        assert_eq!(k.end_line(Language::Xml), "<!-- WEFT-END jni:methods -->");
    }

    #[test]
    fn key_validation() {
        assert!(MarkerKey::new("", "x").is_err());
        assert!(MarkerKey::new("a:b", "x").is_err());
        assert!(MarkerKey::new("a", "x y").is_err());
        assert_eq!(key("scope:block:part").block(), "block:part");
    }

    #[test]
    fn insert_at_end_then_unchanged() {
        let k = key("gen:one");
        let (text, outcome) =
            apply_block(HAND, &k, Language::Rust, "fn one() {}", &Anchor::EndOfFile).unwrap();
        assert_eq!(outcome, PatchOutcome::Inserted);
        assert!(text.starts_with(HAND));
        assert!(text.ends_with("// WEFT-START gen:one\nfn one() {}\n// WEFT-END gen:one\n"));

        let (again, outcome) =
            apply_block(&text, &k, Language::Rust, "fn one() {}", &Anchor::EndOfFile).unwrap();
        assert_eq!(outcome, PatchOutcome::Unchanged);
        assert_eq!(again, text);
    }

    #[test]
    fn update_touches_only_block_body() {
        let k = key("gen:one");
        let before = "head\n  // WEFT-START gen:one\nold\n  // WEFT-END gen:one\ntail";
        let (after, outcome) =
            apply_block(before, &k, Language::Rust, "new\nlines\n", &Anchor::EndOfFile).unwrap();
        assert_eq!(outcome, PatchOutcome::Updated);
        assert_eq!(
            after,
            "head\n  // WEFT-START gen:one\nnew\nlines\n  // WEFT-END gen:one\ntail"
        );
    }

    #[test]
    fn insert_after_and_before_anchor() {
        let k = key("deps:weft");
        let cargo = "[package]\nname = \"x\"\n\n[dependencies]\nserde = \"1\"\n";
        let (text, _) = apply_block(
            cargo,
            &k,
            Language::Toml,
            "weft-core = \"0.1\"",
            &Anchor::After(r"^\[dependencies\]".into()),
        )
        .unwrap();
        assert_eq!(
            text,
            "[package]\nname = \"x\"\n\n[dependencies]\n# WEFT-START deps:weft\nweft-core = \"0.1\"\n# WEFT-END deps:weft\nserde = \"1\"\n"
        );

        let (text, _) = apply_block(
            HAND,
            &k,
            Language::Rust,
            "use x;",
            &Anchor::Before("^fn main".into()),
        )
        .unwrap();
        assert!(text.starts_with("// WEFT-START deps:weft\nuse x;\n// WEFT-END deps:weft\nfn main"));
    }

    #[test]
    fn missing_anchor_is_error() {
        let err = apply_block(
            HAND,
            &key("a:b"),
            Language::Rust,
            "",
            &Anchor::After("^nothing here$".into()),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::AnchorNotFound { .. }));
    }

    #[test]
    fn dangling_start_reports_exact_marker() {
        let text = "a\n// WEFT-START gen:one\nbody\n";
        let err = apply_block(text, &key("gen:one"), Language::Rust, "x", &Anchor::EndOfFile)
            .unwrap_err();
        match err {
            DomainError::MarkerCorruption { marker, .. } => {
                assert_eq!(marker, "// WEFT-START gen:one");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn dangling_end_and_duplicates_are_corruption() {
        assert!(scan_blocks("# WEFT-END a:b\n").is_err());
        let dup = "# WEFT-START a:b\n# WEFT-END a:b\n# WEFT-START a:b\n# WEFT-END a:b\n";
        assert!(matches!(
            scan_blocks(dup),
            Err(DomainError::MarkerCorruption { .. })
        ));
    }

    #[test]
    fn scan_understands_every_comment_style() {
        let text = "<!-- WEFT-START x:manifest -->\n<a/>\n<!-- WEFT-END x:manifest -->\n\
                    /* WEFT-START x:css */\n/* WEFT-END x:css */\n";
        let spans = scan_blocks(text).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].key, key("x:manifest"));
        assert_eq!((spans[1].start, spans[1].end), (3, 4));
    }

    #[test]
    fn remove_round_trips_to_original() {
        let k = key("gen:one");
        let (with_block, _) =
            apply_block(HAND, &k, Language::Rust, "fn one() {}\n", &Anchor::EndOfFile).unwrap();
        let (stripped, removed) = remove_blocks(&with_block, |_| false).unwrap();
        assert_eq!(stripped, HAND);
        assert_eq!(removed, vec![k]);
    }

    #[test]
    fn remove_keeps_selected_blocks() {
        let text = "// WEFT-START a:1\nx\n// WEFT-END a:1\nmid\n// WEFT-START a:2\ny\n// WEFT-END a:2\n";
        let (out, removed) = remove_blocks(text, |k| k.block() == "1").unwrap();
        assert_eq!(out, "// WEFT-START a:1\nx\n// WEFT-END a:1\nmid\n");
        assert_eq!(removed, vec![key("a:2")]);
    }

    #[test]
    fn unterminated_file_round_trips_through_sweep() {
        let src = "fn main() {}";
        let k = key("gen:tail");
        let (woven, _) =
            apply_block(src, &k, Language::Rust, "fn tail() {}", &Anchor::EndOfFile).unwrap();
        assert_eq!(
            woven,
            "fn main() {}\n// WEFT-START gen:tail\nfn tail() {}\n// WEFT-END gen:tail"
        );

        let (again, outcome) =
            apply_block(&woven, &k, Language::Rust, "fn tail() {}", &Anchor::EndOfFile).unwrap();
        assert_eq!(outcome, PatchOutcome::Unchanged);
        assert_eq!(again, woven);

        let (swept, removed) = remove_blocks(&woven, |_| false).unwrap();
        assert_eq!(swept, src);
        assert_eq!(removed, vec![k]);
    }

    #[test]
    fn unterminated_file_keeps_other_blocks_on_partial_sweep() {
        let (one, _) = apply_block("x", &key("a:1"), Language::Rust, "1", &Anchor::EndOfFile)
            .unwrap();
        let (two, _) = apply_block(&one, &key("a:2"), Language::Rust, "2", &Anchor::EndOfFile)
            .unwrap();
        let (swept, _) = remove_blocks(&two, |k| k.block() == "1").unwrap();
        assert_eq!(swept, one);
        let (bare, _) = remove_blocks(&swept, |_| false).unwrap();
        assert_eq!(bare, "x");
    }

    #[test]
    fn crlf_files_keep_their_line_endings() {
        let src = "[package]\r\nname = \"x\"\r\n";
        let k = key("deps:weft");
        let (woven, _) =
            apply_block(src, &k, Language::Toml, "a = 1\nb = 2\n", &Anchor::EndOfFile).unwrap();
        assert_eq!(
            woven,
            "[package]\r\nname = \"x\"\r\n# WEFT-START deps:weft\r\na = 1\r\nb = 2\r\n# WEFT-END deps:weft\r\n"
        );
        assert!(!woven.replace("\r\n", "").contains('\n'));

        let (again, outcome) =
            apply_block(&woven, &k, Language::Toml, "a = 1\nb = 2\n", &Anchor::EndOfFile).unwrap();
        assert_eq!(outcome, PatchOutcome::Unchanged);
        assert_eq!(again, woven);

        let (swept, _) = remove_blocks(&woven, |_| false).unwrap();
        assert_eq!(swept, src);
    }

    #[test]
    fn line_ending_follows_first_line() {
        assert_eq!(line_ending("a\r\nb\n"), "\r\n");
        assert_eq!(line_ending("a\nb\r\n"), "\n");
        assert_eq!(line_ending("no break"), "\n");
    }

    #[test]
    fn anchor_serde_shape() {
        let anchor: Anchor =
            serde_json::from_str(r#"{"at":"after","pattern":"^\\[dependencies\\]"}"#).unwrap();
        assert_eq!(anchor, Anchor::After(r"^\[dependencies\]".into()));
    }
}
