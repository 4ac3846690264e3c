//! OpenType layout engine: loading and glyph-level application of the
//! `GSUB` (glyph substitution) and `GPOS` (glyph positioning) tables.
//!
//! The input and output of this crate are glyph indices: character
//! mapping, segmentation and rendering live elsewhere. Tables are loaded
//! once into immutable structures ([`layout::load_gsub`],
//! [`layout::load_gpos`], [`gdef::load_gdef`]); per-run state (activated
//! features, callbacks, the glyph buffer) is supplied at shaping time.
//!
//! ```
//! use otlayout::buffer::GlyphBuffer;
//! use otlayout::layout::FeaturePlan;
//!
//! let mut buffer = GlyphBuffer::new();
//! buffer.add_glyph(42, 0, 0);
//! let plan = FeaturePlan::new();
//! // load_gsub + plan.add_feature + gsub::apply_gsub shape the buffer
//! assert_eq!(buffer.glyphs()[0].glyph, 42);
//! ```

#![warn(rust_2018_idioms)]

/// Reading and writing of binary data.
pub mod binary;
pub mod buffer;
pub mod context;
pub mod error;
pub mod gdef;
pub mod gpos;
pub mod gsub;
pub mod layout;
pub mod size;
pub mod tag;
/// Shared test code.
#[cfg(test)]
pub mod tests;
