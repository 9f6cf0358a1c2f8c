//! Selector Engine (C1): resolve region/regex selectors to byte spans.
//!
//! Pure functions only — no I/O, no locking. Lines are split on `\n`; any
//! trailing `\r` is retained as part of the line's content (spec.md §9
//! open question: CRLF handling).

use regex::Regex;

use crate::error::CageError;
use crate::model::Selector;

/// A half-open byte range `[start, end)` into the file's bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Whether the caller intends to insert new content (no replacement span).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// GET: read only.
    Read,
    /// INSERT: anchor point, zero-width span.
    Insert,
    /// UPDATE or DELETE: a real span to replace or remove.
    Mutate,
}

/// Resolve a selector against `content` for the given `intent`.
///
/// Returns spans in document order, non-overlapping. `None` selector means
/// "the entire file" (used by GET and whole-file UPDATE/DELETE).
///
/// # Errors
/// - `SelectorInvalid` — malformed region bounds or regex compile failure,
///   or INSERT used with a regex selector.
/// - `SelectorNotFound` — a regex selector matched nothing.
pub fn resolve(
    content: &[u8],
    selector: Option<&Selector>,
    intent: Intent,
) -> Result<Vec<Span>, CageError> {
    let Some(selector) = selector else {
        return Ok(vec![Span {
            start: 0,
            end: content.len(),
        }]);
    };

    match selector {
        Selector::Region { start, end } => resolve_region(content, *start, *end, intent),
        Selector::Regex { pattern, flags } => {
            if intent == Intent::Insert {
                return Err(CageError::SelectorInvalid {
                    reason: "INSERT is undefined for regex selectors".to_owned(),
                });
            }
            resolve_regex(content, pattern, flags)
        }
    }
}

/// Byte offset of the start of each 1-based line, for lines `1..=line_count`.
fn line_starts(content: &[u8]) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in content.iter().enumerate() {
        if *b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// Number of lines in `content` under the "split on `\n`" convention: a
/// trailing `\n` does not introduce an extra empty final line.
fn count_lines(content: &[u8]) -> usize {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.iter().filter(|&&b| b == b'\n').count();
    if content.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

fn resolve_region(
    content: &[u8],
    start: i64,
    end: i64,
    intent: Intent,
) -> Result<Vec<Span>, CageError> {
    let starts = line_starts(content);
    let line_count = count_lines(content);

    if start < 1 {
        return Err(CageError::SelectorInvalid {
            reason: format!("start must be >= 1, got {start}"),
        });
    }
    let start = start as usize;

    if intent == Intent::Insert {
        // Anchor may be one past the last line (append at EOF).
        if start > line_count + 1 {
            return Err(CageError::SelectorInvalid {
                reason: format!(
                    "insert anchor {start} is beyond end of file (file has {line_count} lines)"
                ),
            });
        }
        let offset = line_offset(&starts, content.len(), start);
        return Ok(vec![Span {
            start: offset,
            end: offset,
        }]);
    }

    if start > line_count.max(1) {
        return Err(CageError::SelectorInvalid {
            reason: format!("start {start} is out of range (file has {line_count} lines)"),
        });
    }

    let end_line = if end == Selector::EOF {
        line_count.max(1)
    } else {
        if end < start as i64 {
            return Err(CageError::SelectorInvalid {
                reason: format!("end {end} is before start {start}"),
            });
        }
        let end = end as usize;
        if end > line_count {
            return Err(CageError::SelectorInvalid {
                reason: format!("end {end} is out of range (file has {line_count} lines)"),
            });
        }
        end
    };

    let span_start = line_offset(&starts, content.len(), start);
    let span_end = line_offset(&starts, content.len(), end_line + 1);
    Ok(vec![Span {
        start: span_start,
        end: span_end,
    }])
}

/// Byte offset where 1-based line `line` begins; `line = line_count + 1`
/// means end-of-file.
fn line_offset(starts: &[usize], content_len: usize, line: usize) -> usize {
    if line == 0 {
        return 0;
    }
    starts.get(line - 1).copied().unwrap_or(content_len)
}

fn resolve_regex(content: &[u8], pattern: &str, flags: &str) -> Result<Vec<Span>, CageError> {
    let text = std::str::from_utf8(content).map_err(|e| CageError::SelectorInvalid {
        reason: format!("file is not valid UTF-8: {e}"),
    })?;

    let mut builder_pattern = pattern.to_owned();
    if flags.contains('i') {
        builder_pattern = format!("(?i){builder_pattern}");
    }
    if flags.contains('m') {
        builder_pattern = format!("(?m){builder_pattern}");
    }
    if flags.contains('s') {
        builder_pattern = format!("(?s){builder_pattern}");
    }

    let re = Regex::new(&builder_pattern).map_err(|e| CageError::SelectorInvalid {
        reason: format!("invalid regex {pattern:?}: {e}"),
    })?;

    let spans: Vec<Span> = re
        .find_iter(text)
        .map(|m| Span {
            start: m.start(),
            end: m.end(),
        })
        .collect();

    if spans.is_empty() {
        return Err(CageError::SelectorNotFound {
            path: String::new(),
        });
    }
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(start: i64, end: i64) -> Selector {
        Selector::Region { start, end }
    }

    #[test]
    fn no_selector_returns_whole_file() {
        let spans = resolve(b"abc\ndef\n", None, Intent::Read).unwrap();
        assert_eq!(spans, vec![Span { start: 0, end: 8 }]);
    }

    #[test]
    fn region_single_line() {
        let content = b"one\ntwo\nthree\n";
        let spans = resolve(content, Some(&region(2, 2)), Intent::Mutate).unwrap();
        assert_eq!(&content[spans[0].start..spans[0].end], b"two\n");
    }

    #[test]
    fn region_eof_covers_to_end() {
        let content = b"one\ntwo\nthree";
        let spans = resolve(content, Some(&region(2, -1)), Intent::Mutate).unwrap();
        assert_eq!(&content[spans[0].start..spans[0].end], b"two\nthree");
    }

    #[test]
    fn region_rejects_zero_start() {
        let content = b"a\nb\n";
        assert!(resolve(content, Some(&region(0, 1)), Intent::Mutate).is_err());
    }

    #[test]
    fn region_rejects_end_before_start() {
        let content = b"a\nb\nc\n";
        assert!(resolve(content, Some(&region(3, 1)), Intent::Mutate).is_err());
    }

    #[test]
    fn region_rejects_out_of_range() {
        let content = b"a\nb\n";
        assert!(resolve(content, Some(&region(5, 5)), Intent::Mutate).is_err());
    }

    #[test]
    fn insert_anchor_zero_width_mid_file() {
        let content = b"one\ntwo\nthree\n";
        let spans = resolve(content, Some(&region(2, 2)), Intent::Insert).unwrap();
        assert!(spans[0].is_empty());
        assert_eq!(spans[0].start, 4); // start of line 2
    }

    #[test]
    fn insert_anchor_at_eof() {
        let content = b"one\ntwo\n";
        let spans = resolve(content, Some(&region(3, 3)), Intent::Insert).unwrap();
        assert!(spans[0].is_empty());
        assert_eq!(spans[0].start, content.len());
    }

    #[test]
    fn insert_anchor_beyond_eof_fails() {
        let content = b"one\ntwo\n";
        assert!(resolve(content, Some(&region(4, 4)), Intent::Insert).is_err());
    }

    #[test]
    fn regex_matches_in_document_order() {
        let content = b"foo bar foo baz";
        let sel = Selector::Regex {
            pattern: "foo".to_owned(),
            flags: String::new(),
        };
        let spans = resolve(content, Some(&sel), Intent::Mutate).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].start, 0);
        assert_eq!(spans[1].start, 8);
    }

    #[test]
    fn regex_no_match_is_not_found() {
        let content = b"foo bar";
        let sel = Selector::Regex {
            pattern: "zzz".to_owned(),
            flags: String::new(),
        };
        let err = resolve(content, Some(&sel), Intent::Mutate).unwrap_err();
        assert!(matches!(err, CageError::SelectorNotFound { .. }));
    }

    #[test]
    fn regex_insert_is_rejected() {
        let content = b"foo";
        let sel = Selector::Regex {
            pattern: "foo".to_owned(),
            flags: String::new(),
        };
        let err = resolve(content, Some(&sel), Intent::Insert).unwrap_err();
        assert!(matches!(err, CageError::SelectorInvalid { .. }));
    }

    #[test]
    fn regex_case_insensitive_flag() {
        let content = b"FOO bar";
        let sel = Selector::Regex {
            pattern: "foo".to_owned(),
            flags: "i".to_owned(),
        };
        let spans = resolve(content, Some(&sel), Intent::Mutate).unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn crlf_is_retained_in_line_content() {
        let content = b"one\r\ntwo\r\n";
        let spans = resolve(content, Some(&region(1, 1)), Intent::Mutate).unwrap();
        assert_eq!(&content[spans[0].start..spans[0].end], b"one\r\n");
    }

    #[test]
    fn empty_file_region_one_one_is_insert_anchor_only() {
        let content: &[u8] = b"";
        // An empty file has zero lines; start=1 for INSERT is the only valid anchor.
        let spans = resolve(content, Some(&region(1, 1)), Intent::Insert).unwrap();
        assert_eq!(spans[0].start, 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn lines_content() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec("[a-zA-Z0-9 ]{0,12}", 0..12).prop_map(|lines| {
            let mut content = lines.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            content.into_bytes()
        })
    }

    proptest! {
        /// Resolving the whole-file region `(1, EOF)` always yields the same
        /// span as passing no selector at all.
        #[test]
        fn full_range_region_matches_no_selector(content in lines_content()) {
            if !content.is_empty() {
                let whole = resolve(&content, None, Intent::Mutate).unwrap();
                let region = resolve(&content, Some(&Selector::Region { start: 1, end: Selector::EOF }), Intent::Mutate).unwrap();
                prop_assert_eq!(whole, region);
            }
        }

        /// Every resolved span lies within the content's bounds and is
        /// ordered (`start <= end`), regardless of selector or intent.
        #[test]
        fn spans_are_in_bounds_and_ordered(content in lines_content()) {
            for selector in [
                None,
                Some(Selector::Region { start: 1, end: Selector::EOF }),
            ] {
                if let Ok(spans) = resolve(&content, selector.as_ref(), Intent::Read) {
                    for span in spans {
                        prop_assert!(span.start <= span.end);
                        prop_assert!(span.end <= content.len());
                    }
                }
            }
        }

        /// Resolving the same region selector twice against unchanged
        /// content is idempotent: identical spans both times.
        #[test]
        fn region_resolution_is_idempotent(content in lines_content()) {
            let line_count = count_lines(&content);
            if line_count > 0 {
                let sel = Selector::Region { start: 1, end: line_count as i64 };
                let first = resolve(&content, Some(&sel), Intent::Mutate).unwrap();
                let second = resolve(&content, Some(&sel), Intent::Mutate).unwrap();
                prop_assert_eq!(first, second);
            }
        }
    }
}
