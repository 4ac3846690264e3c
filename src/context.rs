//! Glyph skipping and sequence matching for contextual lookups.

use std::marker::PhantomData;
use std::rc::Rc;

use bitflags::bitflags;

use crate::buffer::GlyphInfo;
use crate::gdef::{self, GdefTable};
use crate::layout::{ClassDef, Coverage};

bitflags! {
    /// The flag word of a lookup. The high byte names a mark attachment
    /// class; when nonzero, marks of every other attachment class are
    /// ignored while matching.
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct LookupFlag: u16 {
        const RIGHT_TO_LEFT = 0x0001;
        const IGNORE_BASE_GLYPHS = 0x0002;
        const IGNORE_LIGATURES = 0x0004;
        const IGNORE_MARKS = 0x0008;
        const MARK_ATTACHMENT_TYPE = 0xFF00;
    }
}

impl LookupFlag {
    pub fn right_to_left(self) -> bool {
        self.contains(LookupFlag::RIGHT_TO_LEFT)
    }

    pub fn ignore_marks(self) -> bool {
        self.contains(LookupFlag::IGNORE_MARKS)
    }

    pub fn ignore_ligatures(self) -> bool {
        self.contains(LookupFlag::IGNORE_LIGATURES)
    }

    /// The mark attachment class filter, 0 when unset.
    pub fn mark_attachment_type(self) -> u16 {
        self.bits() & LookupFlag::MARK_ATTACHMENT_TYPE.bits()
    }
}

/// Decides which glyphs a lookup sees and which it skips over, from the
/// lookup's flag word and each glyph's GDEF property word.
#[derive(Copy, Clone)]
pub struct MatchType {
    flag: LookupFlag,
}

impl MatchType {
    pub fn from_lookup_flag(flag: LookupFlag) -> MatchType {
        MatchType { flag }
    }

    /// Does this lookup see `info`, or skip it?
    pub fn match_glyph(self, gdef: Option<&GdefTable>, info: &GlyphInfo) -> bool {
        let property = info.property(gdef);
        // A mark classified by attachment class is still basically a mark
        let basic_class = if property & gdef::GLYPH_PROP_ATTACH_CLASS_MASK != 0 {
            gdef::GLYPH_PROP_MARK
        } else {
            property
        };
        if self.flag.bits() & basic_class != 0 {
            return false;
        }
        // Marks carrying an attachment class must match the filter class;
        // marks without one always pass
        let filter = self.flag.mark_attachment_type();
        if filter != 0
            && property & gdef::GLYPH_PROP_ATTACH_CLASS_MASK != 0
            && property & gdef::GLYPH_PROP_ATTACH_CLASS_MASK != filter
        {
            return false;
        }
        true
    }

    /// Match `table` against the glyphs strictly before `index`, walking
    /// backwards and skipping ignored glyphs.
    pub fn match_back(
        self,
        gdef: Option<&GdefTable>,
        table: &GlyphTable<'_>,
        glyphs: &[GlyphInfo],
        mut index: usize,
    ) -> bool {
        for i in 0..table.len() {
            loop {
                if index == 0 {
                    return false;
                }
                index -= 1;
                if self.match_glyph(gdef, &glyphs[index]) {
                    break;
                }
            }
            if !table.check(i, glyphs[index].glyph) {
                return false;
            }
        }
        true
    }

    /// Match `table` against the glyphs strictly after `index`, skipping
    /// ignored glyphs. On success `last_index` is the position of the
    /// final matched glyph (unchanged for an empty table).
    pub fn match_forward(
        self,
        gdef: Option<&GdefTable>,
        table: &GlyphTable<'_>,
        glyphs: &[GlyphInfo],
        mut index: usize,
        last_index: &mut usize,
    ) -> bool {
        for i in 0..table.len() {
            loop {
                index += 1;
                if index >= glyphs.len() {
                    return false;
                }
                if self.match_glyph(gdef, &glyphs[index]) {
                    break;
                }
            }
            if !table.check(i, glyphs[index].glyph) {
                return false;
            }
            *last_index = index;
        }
        true
    }

    /// Position of the next non-skipped glyph after `index`.
    pub fn find_next(
        self,
        gdef: Option<&GdefTable>,
        glyphs: &[GlyphInfo],
        mut index: usize,
    ) -> Option<usize> {
        while index + 1 < glyphs.len() {
            index += 1;
            if self.match_glyph(gdef, &glyphs[index]) {
                return Some(index);
            }
        }
        None
    }

    /// Position of the nearest non-skipped glyph before `index`.
    pub fn find_prev(
        self,
        gdef: Option<&GdefTable>,
        glyphs: &[GlyphInfo],
        mut index: usize,
    ) -> Option<usize> {
        while index > 0 {
            index -= 1;
            if self.match_glyph(gdef, &glyphs[index]) {
                return Some(index);
            }
        }
        None
    }
}

/// One window of a contextual rule: the expected glyphs, expressed as
/// literal ids, classes or coverages.
pub enum GlyphTable<'a> {
    ById(&'a [u16]),
    ByClassDef(Rc<ClassDef>, &'a [u16]),
    ByCoverage(&'a [Rc<Coverage>]),
}

impl<'a> GlyphTable<'a> {
    pub fn len(&self) -> usize {
        match self {
            GlyphTable::ById(sequence) => sequence.len(),
            GlyphTable::ByClassDef(_, sequence) => sequence.len(),
            GlyphTable::ByCoverage(coverages) => coverages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Does `glyph` satisfy element `i` of the window?
    fn check(&self, i: usize, glyph: u16) -> bool {
        match self {
            GlyphTable::ById(sequence) => sequence[i] == glyph,
            GlyphTable::ByClassDef(classdef, sequence) => {
                classdef.glyph_class_value(glyph) == sequence[i]
            }
            GlyphTable::ByCoverage(coverages) => {
                coverages[i].glyph_coverage_value(glyph).is_some()
            }
        }
    }
}

/// The three windows of a (chaining) contextual rule.
pub struct MatchContext<'a> {
    pub backtrack_table: GlyphTable<'a>,
    pub input_table: GlyphTable<'a>,
    pub lookahead_table: GlyphTable<'a>,
}

impl<'a> MatchContext<'a> {
    /// Match during a forward substitution pass: the backtrack window runs
    /// over the already-written output, input and lookahead over the
    /// unconsumed input from `index`.
    pub fn matches_forward(
        &self,
        gdef: Option<&GdefTable>,
        match_type: MatchType,
        out_glyphs: &[GlyphInfo],
        in_glyphs: &[GlyphInfo],
        index: usize,
    ) -> bool {
        let mut end_index = index;
        match_type.match_back(gdef, &self.backtrack_table, out_glyphs, out_glyphs.len())
            && match_type.match_forward(
                gdef,
                &self.input_table,
                in_glyphs,
                index,
                &mut end_index,
            )
            && match_type.match_forward(
                gdef,
                &self.lookahead_table,
                in_glyphs,
                end_index,
                &mut end_index,
            )
    }

    /// Match an in-place pass (positioning, reverse substitution): every
    /// window runs over the one glyph string around `index`.
    pub fn matches_in_place(
        &self,
        gdef: Option<&GdefTable>,
        match_type: MatchType,
        glyphs: &[GlyphInfo],
        index: usize,
    ) -> bool {
        let mut end_index = index;
        match_type.match_back(gdef, &self.backtrack_table, glyphs, index)
            && match_type.match_forward(gdef, &self.input_table, glyphs, index, &mut end_index)
            && match_type.match_forward(
                gdef,
                &self.lookahead_table,
                glyphs,
                end_index,
                &mut end_index,
            )
    }
}

/// A matched contextual rule: its windows plus the nested lookups to run,
/// each as `(sequence index, lookup index)`.
pub struct ContextLookupHelper<'a, T> {
    pub match_context: MatchContext<'a>,
    pub lookup_records: &'a [(u16, u16)],
    phantom: PhantomData<T>,
}

impl<'a, T> ContextLookupHelper<'a, T> {
    pub fn new(
        match_context: MatchContext<'a>,
        lookup_records: &'a [(u16, u16)],
    ) -> ContextLookupHelper<'a, T> {
        ContextLookupHelper {
            match_context,
            lookup_records,
            phantom: PhantomData,
        }
    }

    /// Number of glyph positions the rule's input window spans, counting
    /// the coverage glyph itself.
    pub fn input_length(&self) -> usize {
        self.match_context.input_table.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GlyphBuffer;

    fn glyphs(ids: &[u16]) -> Vec<GlyphInfo> {
        let mut buffer = GlyphBuffer::new();
        for &id in ids {
            buffer.add_glyph(id, 0, 0);
        }
        buffer.glyphs().to_vec()
    }

    #[test]
    fn test_match_forward_by_id() {
        let match_type = MatchType::from_lookup_flag(LookupFlag::empty());
        let glyphs = glyphs(&[1, 2, 3, 4]);
        let mut last = 0;
        let table = GlyphTable::ById(&[2, 3]);
        assert!(match_type.match_forward(None, &table, &glyphs, 0, &mut last));
        assert_eq!(last, 2);
        let table = GlyphTable::ById(&[3, 2]);
        assert!(!match_type.match_forward(None, &table, &glyphs, 0, &mut last));
    }

    #[test]
    fn test_match_back_by_id() {
        let match_type = MatchType::from_lookup_flag(LookupFlag::empty());
        let glyphs = glyphs(&[1, 2, 3]);
        // backtrack sequences are ordered nearest-first
        let table = GlyphTable::ById(&[2, 1]);
        assert!(match_type.match_back(None, &table, &glyphs, 2));
        let table = GlyphTable::ById(&[1, 2]);
        assert!(!match_type.match_back(None, &table, &glyphs, 2));
        // runs out of glyphs
        let table = GlyphTable::ById(&[2, 1, 9]);
        assert!(!match_type.match_back(None, &table, &glyphs, 2));
    }

    #[test]
    fn test_lookup_flag_accessors() {
        let flag = LookupFlag::from_bits_retain(0x0201);
        assert!(flag.right_to_left());
        assert_eq!(flag.mark_attachment_type(), 0x0200);
        assert!(!flag.ignore_marks());
    }
}
