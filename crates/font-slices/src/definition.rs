//! Slice definition parsing.

use std::collections::BTreeSet;

use crate::errors::{ParseError, ParseErrorKind};

/// Largest valid Unicode codepoint.
pub const MAX_CODEPOINT: u32 = 0x0010_FFFF;

/// Unordered set of Unicode codepoints.
pub type CodepointSet = BTreeSet<u32>;

/// Keyword opening a slice block; other top-level blocks are skipped.
const BLOCK_KEYWORD: &str = "subsets";
/// Keyword declaring codepoints inside an open block.
const CODEPOINTS_KEYWORD: &str = "codepoints";

/// Ordered group of codepoints destined to become one subset font file.
///
/// Slices are created once per run by [`parse_definition()`] and are immutable
/// afterwards; the ordinal is the sole ordering key for the final stylesheet,
/// independent of completion order during parallel subsetting.
#[derive(Debug, Clone)]
pub struct Slice {
    /// 1-based position of this slice in the source definition.
    pub ordinal: usize,
    /// Codepoints declared for this slice. Never empty.
    pub codepoints: CodepointSet,
}

/// Parses a single codepoint token.
///
/// Recognized forms, in precedence order: `U+`-prefixed hex, `0x`-prefixed
/// hex, all-decimal-digits decimal, all-hex-digits hex. The precedence makes
/// a bare `"10"` decimal ten while `"1a"` is hex 26; definition files mix
/// both styles, so the order is load-bearing.
///
/// # Errors
///
/// Fails on an empty or malformed token and on values beyond `U+10FFFF`.
pub fn parse_codepoint(token: &str) -> Result<u32, ParseError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ParseError::new(ParseErrorKind::EmptyToken));
    }

    let invalid = || {
        ParseError::new(ParseErrorKind::InvalidToken {
            token: token.to_owned(),
        })
    };
    let value = if let Some(hex) = strip_prefix_ignore_case(token, "u+") {
        parse_hex_digits(hex).ok_or_else(invalid)?
    } else if let Some(hex) = strip_prefix_ignore_case(token, "0x") {
        parse_hex_digits(hex).ok_or_else(invalid)?
    } else if token.bytes().all(|byte| byte.is_ascii_digit()) {
        token.parse().map_err(|_| invalid())?
    } else {
        parse_hex_digits(token).ok_or_else(invalid)?
    };

    if value > MAX_CODEPOINT {
        return Err(ParseError::new(ParseErrorKind::CodepointOutOfRange {
            value,
        }));
    }
    Ok(value)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn parse_hex_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}

/// Parses a full slice definition into its ordered, non-empty slices.
///
/// The definition is scanned line by line: `#` starts a comment, a line
/// opening a `subsets {` block starts a new slice, `}` closes it, and
/// `codepoints:` lines inside an open block list single codepoints or
/// `..`/`-` ranges (inverted bounds are swapped). Lines outside any open
/// block are ignored, so definition files may carry foreign metadata blocks.
/// A definition ending with an open block flushes it implicitly; blocks that
/// accumulate no codepoints are discarded.
///
/// # Errors
///
/// The first malformed token aborts the parse; no partial slice list is
/// returned.
pub fn parse_definition(text: &str) -> Result<Vec<Slice>, ParseError> {
    let mut sets = Vec::new();
    // `None` while outside any `subsets` block.
    let mut current: Option<CodepointSet> = None;

    let flush = |current: &mut Option<CodepointSet>, sets: &mut Vec<CodepointSet>| {
        if let Some(set) = current.take() {
            if !set.is_empty() {
                sets.push(set);
            }
        }
    };

    for (line_idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(BLOCK_KEYWORD) {
            if line.ends_with('{') {
                flush(&mut current, &mut sets);
                current = Some(CodepointSet::new());
            }
            continue;
        }
        if line.starts_with('}') {
            flush(&mut current, &mut sets);
            continue;
        }
        let Some(set) = &mut current else {
            continue; // metadata outside any slice block
        };

        if line.starts_with(CODEPOINTS_KEYWORD) {
            if let Some((_, tokens)) = line.split_once(':') {
                parse_token_list(tokens, set)
                    .map_err(|err| err.at_line(line_idx + 1))?;
            }
        }
    }
    flush(&mut current, &mut sets);

    let slices = sets
        .into_iter()
        .enumerate()
        .map(|(idx, codepoints)| Slice {
            ordinal: idx + 1,
            codepoints,
        })
        .collect();
    Ok(slices)
}

fn parse_token_list(tokens: &str, set: &mut CodepointSet) -> Result<(), ParseError> {
    // Definitions copied from documents occasionally carry em/en dashes.
    let tokens = tokens.replace(['\u{2014}', '\u{2013}'], "-");
    let raw_tokens = tokens
        .split(|ch: char| ch.is_whitespace() || ch == ',' || ch == ';')
        .filter(|token| !token.is_empty());

    for token in raw_tokens {
        if let Some((low, high)) = split_range(token) {
            let mut low = parse_codepoint(low)?;
            let mut high = parse_codepoint(high)?;
            if low > high {
                (low, high) = (high, low);
            }
            set.extend(low..=high);
        } else {
            set.insert(parse_codepoint(token)?);
        }
    }
    Ok(())
}

/// Splits a range token at the first `..` or `-` separator, whichever comes
/// first. Returns `None` for single-codepoint tokens.
fn split_range(token: &str) -> Option<(&str, &str)> {
    match (token.find(".."), token.find('-')) {
        (Some(dots), Some(dash)) if dots < dash => Some((&token[..dots], &token[dots + 2..])),
        (Some(dots), None) => Some((&token[..dots], &token[dots + 2..])),
        (_, Some(dash)) => Some((&token[..dash], &token[dash + 1..])),
        (None, None) => None,
    }
}
