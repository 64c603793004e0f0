//! CSS rendering: `unicode-range` values, `@font-face` rules and the final
//! stylesheet.

use std::ops::RangeInclusive;

/// Comment prepended to the assembled stylesheet.
///
/// When several `@font-face` rules could match a character, browsers fall
/// back on declaration order, so the stylesheet must keep the slice order of
/// the source definition even though subsetting ran in parallel.
pub const PROVENANCE_COMMENT: &str =
    "/* generated from slice definitions; order preserved for unicode-range prioritization */";

/// CSS-facing properties of the font being sliced.
#[derive(Debug, Clone)]
pub struct FontFace {
    /// `font-family` name quoted into every rule.
    pub family: String,
    /// `font-style` value (`normal` or `italic`).
    pub style: String,
    /// `font-weight` value, e.g. `400`.
    pub weight: String,
}

/// Renders compacted ranges in CSS `unicode-range` syntax.
///
/// A singleton range renders as `U+XXXX`, a wider one as `U+XXXX-YYYY`;
/// uppercase hex, zero-padded to at least 4 digits, never truncated above
/// `0xFFFF`. Output order follows input order.
pub fn unicode_range(ranges: &[RangeInclusive<u32>]) -> String {
    let parts = ranges.iter().map(|range| {
        let (low, high) = (range.start(), range.end());
        if low == high {
            format!("U+{low:04X}")
        } else {
            format!("U+{low:04X}-{high:04X}")
        }
    });
    parts.collect::<Vec<_>>().join(", ")
}

/// Builds the `@font-face` rule for one emitted slice.
///
/// The rule embeds the exact `unicode-range` string used for subsetting so
/// that the browser's codepoint matching stays consistent with the produced
/// subset file.
pub fn font_face_rule(
    face: &FontFace,
    file_name: &str,
    container: &str,
    unicode_range: &str,
) -> String {
    format!(
        "@font-face{{font-family:'{family}';font-style:{style};font-weight:{weight};\
         src:url('{file_name}') format('{container}');font-display:swap;\
         unicode-range:{unicode_range};}}",
        family = face.family,
        style = face.style,
        weight = face.weight,
    )
}

/// Assembles per-slice rules (already in ordinal order) into one stylesheet
/// document headed by [`PROVENANCE_COMMENT`].
pub fn stylesheet<'a>(rules: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::from(PROVENANCE_COMMENT);
    out.push('\n');
    let mut first = true;
    for rule in rules {
        if !first {
            out.push('\n');
        }
        first = false;
        out.push_str(rule);
    }
    out
}
