//! Unicode slice planning for web font subsetting.
//!
//! A *slice* is an ordered group of Unicode codepoints destined to become one
//! subset font file, declared in a block-structured definition format:
//!
//! ```text
//! subsets {
//!   codepoints: 0x4E00-0x4E10, U+9FA5  # CJK
//! }
//! ```
//!
//! This crate parses such definitions ([`parse_definition`]), intersects each
//! slice with the codepoints a font actually covers, compacts the overlap into
//! minimal closed ranges ([`compact`]) rendered in CSS `unicode-range` syntax
//! ([`unicode_range`]), and fans the resulting subset jobs out over a bounded
//! worker pool ([`dispatch`]). The physical subsetting operation is injected
//! through the [`Subsetter`] trait; the final stylesheet restores definition
//! order regardless of completion order, since browsers break `unicode-range`
//! ties by declaration order.

#![doc(html_root_url = "https://docs.rs/font-slices/0.1.0")]

mod css;
mod definition;
mod dispatch;
mod errors;
mod ranges;
#[cfg(test)]
pub(crate) mod tests;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

pub use crate::{
    css::{font_face_rule, stylesheet, unicode_range, FontFace, PROVENANCE_COMMENT},
    definition::{parse_codepoint, parse_definition, CodepointSet, Slice, MAX_CODEPOINT},
    dispatch::{
        dispatch, DispatchOptions, DispatchReport, SliceFailure, SliceResult, SubsetError,
        SubsetJob, Subsetter,
    },
    errors::{DispatchError, ParseError, ParseErrorKind},
    ranges::compact,
};
