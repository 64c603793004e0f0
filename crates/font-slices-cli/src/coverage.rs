//! Font coverage extraction.

use std::{fs, path::Path};

use anyhow::Context;
use font_slices::CodepointSet;

/// Reads the set of codepoints the font can actually render.
///
/// Unions the codepoints of every `cmap` subtable present, mirroring what
/// browsers consider renderable. A font without a `cmap` table yields an
/// empty set rather than an error; the caller then skips every slice.
///
/// # Errors
///
/// Fails if the font file cannot be read or is not a parseable face.
pub(crate) fn font_coverage(path: &Path) -> anyhow::Result<CodepointSet> {
    let data = fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    let face = ttf_parser::Face::parse(&data, 0)
        .with_context(|| format!("failed to parse font {}", path.display()))?;

    let mut coverage = CodepointSet::new();
    if let Some(cmap) = face.tables().cmap {
        for subtable in cmap.subtables {
            subtable.codepoints(|codepoint| {
                coverage.insert(codepoint);
            });
        }
    }
    Ok(coverage)
}
