//! `GDEF` glyph classification.
//!
//! Lookups consult glyph properties through a single capability: the
//! property word returned by [`glyph_property`]. The word encodes the basic
//! glyph class in its low byte using the same bit positions as the
//! lookup-flag ignore bits, and a mark's attachment class in its high byte.

use std::cell::RefCell;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::error::ParseError;
use crate::layout::ClassDef;
use crate::size;

/// No classification for the glyph.
pub const GLYPH_PROP_UNCLASSIFIED: u16 = 0x0000;
/// Single standalone glyph. Same bit as the ignore-base-glyphs lookup flag.
pub const GLYPH_PROP_BASE: u16 = 0x0002;
/// Multiple-glyph substitution result. Same bit as ignore-ligatures.
pub const GLYPH_PROP_LIGATURE: u16 = 0x0004;
/// Attaching glyph. Same bit as ignore-marks.
pub const GLYPH_PROP_MARK: u16 = 0x0008;
/// Part of a decomposed base glyph.
pub const GLYPH_PROP_COMPONENT: u16 = 0x0010;
/// High byte: the mark attachment class of a classified mark.
pub const GLYPH_PROP_ATTACH_CLASS_MASK: u16 = 0xFF00;

/// GDEF class values as stored in the font.
const GDEF_CLASS_MARK: u16 = 3;
const GDEF_CLASS_MAX: u16 = 4;

/// Is the property word any kind of mark?
pub fn is_mark_property(property: u16) -> bool {
    property == GLYPH_PROP_MARK || property & GLYPH_PROP_ATTACH_CLASS_MASK != 0
}

pub struct GdefTable {
    pub glyph_classdef: Option<ClassDef>,
    pub mark_attach_classdef: Option<ClassDef>,
    /// Classes assigned while shaping, for glyphs the static table does
    /// not cover. Owned by a single shaping session at a time.
    pub constructed: Option<RefCell<ConstructedClasses>>,
}

/// Load a `GDEF` table from the bytes of the table.
pub fn load_gdef(data: &[u8]) -> Result<GdefTable, ParseError> {
    ReadScope::new(data).read::<GdefTable>()
}

impl ReadBinary for GdefTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let glyph_classdef_offset = usize::from(ctxt.read_u16be()?);
        // The attachment-point and ligature-caret lists are consulted by
        // other parts of a text stack, never by the lookup engine.
        let _attach_list_offset = usize::from(ctxt.read_u16be()?);
        let _lig_caret_list_offset = usize::from(ctxt.read_u16be()?);
        // MarkAttachClassDef arrived in OpenType 1.2 without a version
        // bump, so reading it unconditionally is the only workable policy.
        let mark_attach_classdef_offset = usize::from(ctxt.read_u16be()?);

        let gdef_header_size = 6 * size::U16;

        let glyph_classdef = if glyph_classdef_offset == 0
            || glyph_classdef_offset < gdef_header_size
        {
            None
        } else {
            Some(table.offset(glyph_classdef_offset).read::<ClassDef>()?)
        };

        let mark_attach_classdef = if mark_attach_classdef_offset == 0
            || mark_attach_classdef_offset < gdef_header_size
        {
            None
        } else {
            Some(table.offset(mark_attach_classdef_offset).read::<ClassDef>()?)
        };

        Ok(GdefTable {
            glyph_classdef,
            mark_attach_classdef,
            constructed: None,
        })
    }
}

impl GdefTable {
    /// Attach a constructed-class side table so substitutions can record
    /// classes for glyphs the font's own table leaves out.
    pub fn attach_constructed_classes(&mut self, num_glyphs: u16) {
        self.constructed = Some(RefCell::new(ConstructedClasses::new(num_glyphs)));
    }
}

/// The property word of `glyph`: its basic class, plus a classified mark's
/// attachment class in the high byte.
pub fn glyph_property(gdef: Option<&GdefTable>, glyph: u16) -> u16 {
    let gdef = match gdef {
        Some(gdef) => gdef,
        None => return GLYPH_PROP_UNCLASSIFIED,
    };
    let class = gdef
        .glyph_classdef
        .as_ref()
        .and_then(|classdef| classdef.glyph_class_with_hint(glyph))
        .map(|(class, _hint)| class)
        .filter(|&class| class != 0)
        .or_else(|| {
            // Only consulted when the static table has no answer
            gdef.constructed
                .as_ref()
                .map(|constructed| constructed.borrow().get(glyph))
                .filter(|&class| class != 0)
        });
    match class {
        Some(class) if class == GDEF_CLASS_MARK => {
            let attach_class = gdef
                .mark_attach_classdef
                .as_ref()
                .map(|classdef| classdef.glyph_class_value(glyph))
                .unwrap_or(0);
            if attach_class != 0 {
                attach_class << 8
            } else {
                GLYPH_PROP_MARK
            }
        }
        Some(class) if class <= GDEF_CLASS_MAX => 1 << class,
        _ => GLYPH_PROP_UNCLASSIFIED,
    }
}

/// Record the class of a glyph produced by substitution, when the table
/// carries a constructed-class side table and the static table does not
/// already classify the glyph.
pub fn record_glyph_property(gdef: Option<&GdefTable>, glyph: u16, property: u16) {
    let gdef = match gdef {
        Some(gdef) => gdef,
        None => return,
    };
    let constructed = match gdef.constructed {
        Some(ref constructed) => constructed,
        None => return,
    };
    let statically_classified = gdef
        .glyph_classdef
        .as_ref()
        .and_then(|classdef| classdef.glyph_class_with_hint(glyph))
        .map_or(false, |(class, _hint)| class != 0);
    if statically_classified {
        return;
    }
    let class = if is_mark_property(property) {
        GDEF_CLASS_MARK
    } else if property & GLYPH_PROP_LIGATURE != 0 {
        2
    } else if property & GLYPH_PROP_COMPONENT != 0 {
        4
    } else if property & GLYPH_PROP_BASE != 0 {
        1
    } else {
        return;
    };
    constructed.borrow_mut().set(glyph, class);
}

/// Dynamically assigned glyph classes, packed four bits per glyph so the
/// whole glyph space costs `num_glyphs / 4` words.
pub struct ConstructedClasses {
    num_glyphs: u16,
    packed: Vec<u16>,
}

impl ConstructedClasses {
    pub fn new(num_glyphs: u16) -> Self {
        let words = (usize::from(num_glyphs) + 3) / 4;
        ConstructedClasses {
            num_glyphs,
            packed: vec![0; words],
        }
    }

    pub fn get(&self, glyph: u16) -> u16 {
        if glyph >= self.num_glyphs {
            return 0;
        }
        let word = self.packed[usize::from(glyph / 4)];
        let shift = 12 - 4 * (glyph % 4);
        (word >> shift) & 0xF
    }

    pub fn set(&mut self, glyph: u16, class: u16) {
        if glyph >= self.num_glyphs || class > 0xF {
            return;
        }
        let index = usize::from(glyph / 4);
        let shift = 12 - 4 * (glyph % 4);
        self.packed[index] = (self.packed[index] & !(0xF << shift)) | (class << shift);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBinary, WriteBuffer};
    use crate::binary::U16Be;

    fn gdef_with_classdef(classdef: Option<&[u8]>, mark_attach: Option<&[u8]>) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 1u16).unwrap(); // major version
        U16Be::write(&mut w, 0u16).unwrap(); // minor version
        let header_size = 12u16;
        let classdef_offset = classdef.map(|_| header_size).unwrap_or(0);
        let mark_attach_offset = mark_attach
            .map(|_| header_size + classdef.map(|c| c.len() as u16).unwrap_or(0))
            .unwrap_or(0);
        U16Be::write(&mut w, classdef_offset).unwrap();
        U16Be::write(&mut w, 0u16).unwrap(); // attach list
        U16Be::write(&mut w, 0u16).unwrap(); // lig caret list
        U16Be::write(&mut w, mark_attach_offset).unwrap();
        if let Some(classdef) = classdef {
            w.write_bytes(classdef).unwrap();
        }
        if let Some(mark_attach) = mark_attach {
            w.write_bytes(mark_attach).unwrap();
        }
        w.into_inner()
    }

    fn classdef_format1(start: u16, classes: &[u16]) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, start).unwrap();
        U16Be::write(&mut w, classes.len() as u16).unwrap();
        for &class in classes {
            U16Be::write(&mut w, class).unwrap();
        }
        w.into_inner()
    }

    use crate::binary::write::WriteContext;

    #[test]
    fn test_gdef_zero_offsets() {
        let data = gdef_with_classdef(None, None);
        let gdef = load_gdef(&data).unwrap();
        assert!(gdef.glyph_classdef.is_none());
        assert!(gdef.mark_attach_classdef.is_none());
    }

    #[test]
    fn test_gdef_too_small_offset_ignored() {
        // classdef offset pointing inside the header is dropped
        let mut data = gdef_with_classdef(None, None);
        data[5] = 1;
        let gdef = load_gdef(&data).unwrap();
        assert!(gdef.glyph_classdef.is_none());
    }

    #[test]
    fn test_glyph_property_encoding() {
        // glyphs 10..14: base, ligature, mark, component, mark
        let classdef = classdef_format1(10, &[1, 2, 3, 4, 3]);
        // mark attach classes: glyph 14 is attach class 2
        let mark_attach = classdef_format1(14, &[2]);
        let data = gdef_with_classdef(Some(&classdef), Some(&mark_attach));
        let gdef = load_gdef(&data).unwrap();
        let gdef = Some(&gdef);
        assert_eq!(glyph_property(gdef, 10), GLYPH_PROP_BASE);
        assert_eq!(glyph_property(gdef, 11), GLYPH_PROP_LIGATURE);
        assert_eq!(glyph_property(gdef, 12), GLYPH_PROP_MARK);
        assert_eq!(glyph_property(gdef, 13), GLYPH_PROP_COMPONENT);
        assert_eq!(glyph_property(gdef, 14), 2 << 8);
        assert_eq!(glyph_property(gdef, 99), GLYPH_PROP_UNCLASSIFIED);
        assert!(is_mark_property(glyph_property(gdef, 12)));
        assert!(is_mark_property(glyph_property(gdef, 14)));
        assert!(!is_mark_property(glyph_property(gdef, 10)));
    }

    #[test]
    fn test_constructed_classes_round_trip() {
        let mut classes = ConstructedClasses::new(10);
        // glyphs 4..7 share one packed word
        classes.set(4, 1);
        classes.set(5, 3);
        classes.set(6, 2);
        classes.set(7, 4);
        assert_eq!(classes.get(4), 1);
        assert_eq!(classes.get(5), 3);
        assert_eq!(classes.get(6), 2);
        assert_eq!(classes.get(7), 4);
        assert_eq!(classes.get(8), 0);
        // out of range is a no-op
        classes.set(10, 1);
        assert_eq!(classes.get(10), 0);
    }

    #[test]
    fn test_constructed_consulted_after_static() {
        let classdef = classdef_format1(10, &[1]);
        let data = gdef_with_classdef(Some(&classdef), None);
        let mut gdef = load_gdef(&data).unwrap();
        gdef.attach_constructed_classes(100);

        // glyph 20 is unknown to the static table
        record_glyph_property(Some(&gdef), 20, GLYPH_PROP_MARK);
        assert_eq!(glyph_property(Some(&gdef), 20), GLYPH_PROP_MARK);

        // the static table takes precedence for glyph 10
        record_glyph_property(Some(&gdef), 10, GLYPH_PROP_MARK);
        assert_eq!(glyph_property(Some(&gdef), 10), GLYPH_PROP_BASE);
    }
}
