//! Glyph substitution (`GSUB`) application.
//!
//! Lookups run in feature-activation order over the glyph buffer. Forward
//! lookup types stream input to output and swap when anything changed;
//! reverse chaining substitution rewrites the buffer in place from the
//! end. Contextual rules recurse into nested lookups through
//! [`MAX_NESTING_LEVEL`]-guarded glyph lookups.

use crate::binary::read::CheckIndex;
use crate::buffer::GlyphBuffer;
use crate::context::{ContextLookupHelper, MatchType};
use crate::error::{ParseError, ShapingError};
use crate::gdef::{self, GdefTable};
use crate::layout::{
    chain_context_lookup_info, context_lookup_info, AlternateSubst, ChainContextLookup,
    ContextLookup, FeaturePlan, LayoutTable, LigatureSubst, MultipleSubst,
    ReverseChainSingleSubst, SingleSubst, SubstLookup, GSUB,
};

/// Ceiling on nested contextual lookup application. A malicious font can
/// make lookups reference each other in a cycle; exceeding the ceiling is
/// reported as "not covered", never as unbounded recursion.
pub const MAX_NESTING_LEVEL: usize = 6;

/// `context_length` value meaning "not inside a contextual match".
pub(crate) const NO_CONTEXT: u16 = 0xFFFF;

/// Chooses among alternate glyphs: `(output position, glyph, alternate
/// count) -> index`. Out-of-range choices abort the lookup.
pub type AlternateSelectFn<'a> = &'a dyn Fn(usize, u16, usize) -> usize;

/// Everything a GSUB application pass needs, bundled explicitly instead of
/// hanging state off the loaded table.
pub struct GsubContext<'a> {
    pub gsub: &'a LayoutTable<GSUB>,
    pub gdef: Option<&'a GdefTable>,
    pub plan: &'a FeaturePlan,
    pub alternate_select: Option<AlternateSelectFn<'a>>,
}

type SubstContext<'a> = ContextLookupHelper<'a, GSUB>;

/// Apply every activated feature's lookups to `buffer`. Returns whether
/// any substitution was performed.
pub fn apply_gsub(ctxt: &GsubContext<'_>, buffer: &mut GlyphBuffer) -> Result<bool, ShapingError> {
    if buffer.is_empty() {
        return Ok(false);
    }
    let lookup_count = ctxt.gsub.lookup_count();
    let mut applied = false;
    for &feature_index in ctxt.plan.apply_order() {
        let feature = ctxt.gsub.feature_by_index(feature_index)?;
        for &lookup_index in &feature.feature_table().lookup_indices {
            let lookup_index = usize::from(lookup_index);
            // Nonexistent lookups are skipped
            if lookup_index >= lookup_count {
                continue;
            }
            if apply_string_lookup(ctxt, lookup_index, buffer)? {
                applied = true;
            }
        }
    }
    Ok(applied)
}

/// Run one lookup over the whole glyph string.
fn apply_string_lookup(
    ctxt: &GsubContext<'_>,
    lookup_index: usize,
    buffer: &mut GlyphBuffer,
) -> Result<bool, ParseError> {
    let lookup_list = match ctxt.gsub.lookup_list {
        Some(ref lookup_list) => lookup_list,
        None => return Ok(false),
    };
    let lookup = match lookup_list.lookup(lookup_index) {
        Some(lookup) => lookup,
        None => return Ok(false),
    };
    let properties = ctxt.plan.lookup_properties(lookup_index);
    let mut applied = false;

    match lookup.subtables {
        SubstLookup::ReverseChainSingleSubst(_) => {
            // In-place backward pass
            for pos in (0..buffer.len()).rev() {
                buffer.in_pos = pos;
                if (!buffer.cur().properties & properties) != 0
                    && apply_glyph_lookup(ctxt, lookup_index, buffer, NO_CONTEXT, 0)?
                {
                    applied = true;
                }
            }
        }
        _ => {
            // Forward in-to-out pass
            buffer.clear_output();
            while buffer.in_pos < buffer.len() {
                let advanced = if (!buffer.cur().properties & properties) != 0 {
                    apply_glyph_lookup(ctxt, lookup_index, buffer, NO_CONTEXT, 0)?
                } else {
                    false
                };
                if advanced {
                    applied = true;
                } else {
                    buffer.copy_glyph();
                }
            }
            // Don't swap when nothing changed; the output is discarded
            if applied {
                buffer.swap();
            }
        }
    }
    Ok(applied)
}

/// Apply one lookup at the current buffer position, trying its subtables
/// in order. Returns whether one of them applied.
pub(crate) fn apply_glyph_lookup(
    ctxt: &GsubContext<'_>,
    lookup_index: usize,
    buffer: &mut GlyphBuffer,
    context_length: u16,
    nesting_level: usize,
) -> Result<bool, ParseError> {
    let nesting_level = nesting_level + 1;
    if nesting_level > MAX_NESTING_LEVEL {
        // Guards against maliciously self-referential contextual lookups;
        // checked before any work so stack depth stays bounded too
        return Ok(false);
    }
    let lookup = match ctxt
        .gsub
        .lookup_list
        .as_ref()
        .and_then(|lookup_list| lookup_list.lookup(lookup_index))
    {
        Some(lookup) => lookup,
        None => return Ok(false),
    };
    let match_type = MatchType::from_lookup_flag(lookup.lookup_flag);

    match lookup.subtables {
        SubstLookup::SingleSubst(ref subtables) => {
            for subtable in subtables {
                if apply_single_subst(ctxt, subtable, match_type, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        SubstLookup::MultipleSubst(ref subtables) => {
            for subtable in subtables {
                if apply_multiple_subst(ctxt, subtable, match_type, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        SubstLookup::AlternateSubst(ref subtables) => {
            for subtable in subtables {
                if apply_alternate_subst(ctxt, subtable, match_type, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        SubstLookup::LigatureSubst(ref subtables) => {
            for subtable in subtables {
                if apply_ligature_subst(ctxt, subtable, match_type, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        SubstLookup::ContextSubst(ref subtables) => {
            for subtable in subtables {
                if apply_context_subst(
                    ctxt,
                    subtable,
                    match_type,
                    buffer,
                    context_length,
                    nesting_level,
                )? {
                    return Ok(true);
                }
            }
        }
        SubstLookup::ChainContextSubst(ref subtables) => {
            for subtable in subtables {
                if apply_chain_context_subst(
                    ctxt,
                    subtable,
                    match_type,
                    buffer,
                    context_length,
                    nesting_level,
                )? {
                    return Ok(true);
                }
            }
        }
        SubstLookup::ReverseChainSingleSubst(ref subtables) => {
            for subtable in subtables {
                if apply_reverse_chain_subst(
                    ctxt,
                    subtable,
                    match_type,
                    buffer,
                    context_length,
                    nesting_level,
                )? {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

fn apply_single_subst(
    ctxt: &GsubContext<'_>,
    subtable: &SingleSubst,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if context_length != NO_CONTEXT && context_length < 1 {
        return Ok(false);
    }
    if !match_type.match_glyph(ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let property = buffer.cur().property(ctxt.gdef);
    let substitute = match subtable.apply_glyph(buffer.cur().glyph)? {
        Some(substitute) => substitute,
        None => return Ok(false),
    };
    buffer.replace_glyph(substitute);
    // The substitute inherits the replaced glyph's class
    gdef::record_glyph_property(ctxt.gdef, substitute, property);
    Ok(true)
}

fn apply_multiple_subst(
    ctxt: &GsubContext<'_>,
    subtable: &MultipleSubst,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if context_length != NO_CONTEXT && context_length < 1 {
        return Ok(false);
    }
    if !match_type.match_glyph(ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let property = buffer.cur().property(ctxt.gdef);
    let sequence = match subtable.apply_glyph(buffer.cur().glyph)? {
        Some(sequence) => sequence,
        None => return Ok(false),
    };
    buffer.add_output_glyphs(1, &sequence.substitute_glyphs, None, None);
    for &substitute in &sequence.substitute_glyphs {
        gdef::record_glyph_property(ctxt.gdef, substitute, property);
    }
    Ok(true)
}

fn apply_alternate_subst(
    ctxt: &GsubContext<'_>,
    subtable: &AlternateSubst,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if context_length != NO_CONTEXT && context_length < 1 {
        return Ok(false);
    }
    if !match_type.match_glyph(ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let property = buffer.cur().property(ctxt.gdef);
    let glyph = buffer.cur().glyph;
    let alternate_set = match subtable.apply_glyph(glyph)? {
        Some(alternate_set) => alternate_set,
        None => return Ok(false),
    };
    let choice = match ctxt.alternate_select {
        Some(select) => select(buffer.out_len(), glyph, alternate_set.alternate_glyphs.len()),
        None => 0,
    };
    alternate_set.alternate_glyphs.check_index(choice)?;
    let substitute = alternate_set.alternate_glyphs[choice];
    buffer.replace_glyph(substitute);
    gdef::record_glyph_property(ctxt.gdef, substitute, property);
    Ok(true)
}

fn apply_ligature_subst(
    ctxt: &GsubContext<'_>,
    subtable: &LigatureSubst,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if !match_type.match_glyph(ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let first_property = buffer.cur().property(ctxt.gdef);
    let first_is_mark = gdef::is_mark_property(first_property);
    let ligature_set = match subtable.ligature_set_for_glyph(buffer.cur().glyph)? {
        Some(ligature_set) => ligature_set,
        None => return Ok(false),
    };

    'ligature: for ligature in &ligature_set.ligatures {
        let component_count = ligature.component_glyphs.len() + 1;
        if buffer.in_pos + component_count > buffer.len() {
            continue; // not enough glyphs left
        }
        if context_length != NO_CONTEXT && usize::from(context_length) < component_count {
            break;
        }

        // Match the remaining components, skipping ignored glyphs
        let mut all_marks = first_is_mark;
        let mut last_matched = buffer.in_pos;
        for &component in &ligature.component_glyphs {
            last_matched = match match_type.find_next(ctxt.gdef, buffer.glyphs(), last_matched) {
                Some(next) => next,
                None => continue 'ligature,
            };
            let matched = &buffer.glyphs()[last_matched];
            if !gdef::is_mark_property(matched.property(ctxt.gdef)) {
                all_marks = false;
            }
            if matched.glyph != component {
                continue 'ligature;
            }
        }

        gdef::record_glyph_property(
            ctxt.gdef,
            ligature.ligature_glyph,
            if all_marks {
                gdef::GLYPH_PROP_MARK
            } else {
                gdef::GLYPH_PROP_LIGATURE
            },
        );

        if last_matched == buffer.in_pos + component_count - 1 {
            // No glyphs were skipped. Reuse an existing ligature id so
            // repeated ligation of a ligature keeps one component trail.
            if buffer.cur().ligature_id != 0 {
                buffer.add_output_glyphs(component_count, &[ligature.ligature_glyph], None, None);
            } else {
                let ligature_id = buffer.allocate_ligature_id();
                buffer.add_output_glyphs(
                    component_count,
                    &[ligature.ligature_glyph],
                    None,
                    Some(ligature_id),
                );
            }
        } else {
            // Skipped glyphs are carried through tagged with the component
            // they follow, so mark attachment can still find its spot.
            let ligature_id = buffer.allocate_ligature_id();
            buffer.add_output_glyph(ligature.ligature_glyph, None, Some(ligature_id));
            for component_index in 0..component_count - 1 {
                while !match_type.match_glyph(ctxt.gdef, buffer.cur()) {
                    let skipped = buffer.cur().glyph;
                    buffer.add_output_glyph(
                        skipped,
                        Some(component_index as u16),
                        Some(ligature_id),
                    );
                }
                // The component itself is consumed into the ligature
                buffer.in_pos += 1;
            }
        }
        return Ok(true);
    }
    Ok(false)
}

fn apply_context_subst(
    ctxt: &GsubContext<'_>,
    subtable: &ContextLookup<GSUB>,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
    nesting_level: usize,
) -> Result<bool, ParseError> {
    if !match_type.match_glyph(ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let helper: Option<Box<SubstContext<'_>>> =
        context_lookup_info(subtable, buffer.cur().glyph, |match_context| {
            fits_context_length(context_length, match_context.input_table.len() + 1)
                && match_context.matches_forward(
                    ctxt.gdef,
                    match_type,
                    buffer.out_glyphs(),
                    buffer.glyphs(),
                    buffer.in_pos,
                )
        })?;
    match helper {
        Some(helper) => apply_context_records(ctxt, &helper, buffer, nesting_level),
        None => Ok(false),
    }
}

fn apply_chain_context_subst(
    ctxt: &GsubContext<'_>,
    subtable: &ChainContextLookup<GSUB>,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
    nesting_level: usize,
) -> Result<bool, ParseError> {
    if !match_type.match_glyph(ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let helper: Option<Box<SubstContext<'_>>> =
        chain_context_lookup_info(subtable, buffer.cur().glyph, |match_context| {
            fits_context_length(context_length, match_context.input_table.len() + 1)
                && match_context.matches_forward(
                    ctxt.gdef,
                    match_type,
                    buffer.out_glyphs(),
                    buffer.glyphs(),
                    buffer.in_pos,
                )
        })?;
    match helper {
        Some(helper) => apply_context_records(ctxt, &helper, buffer, nesting_level),
        None => Ok(false),
    }
}

fn fits_context_length(context_length: u16, input_length: usize) -> bool {
    context_length == NO_CONTEXT || usize::from(context_length) >= input_length
}

/// Walk the matched input span, running nested lookups at their recorded
/// sequence indices and copying everything else through.
fn apply_context_records(
    ctxt: &GsubContext<'_>,
    helper: &SubstContext<'_>,
    buffer: &mut GlyphBuffer,
    nesting_level: usize,
) -> Result<bool, ParseError> {
    let glyph_count = helper.input_length();
    let mut records = helper.lookup_records;
    let mut i = 0;
    while i < glyph_count {
        if buffer.in_pos >= buffer.len() {
            break;
        }
        if let Some(&(sequence_index, lookup_index)) = records.first() {
            if i == usize::from(sequence_index) {
                let old_pos = buffer.in_pos;
                let applied = apply_glyph_lookup(
                    ctxt,
                    usize::from(lookup_index),
                    buffer,
                    glyph_count as u16,
                    nesting_level,
                )?;
                records = &records[1..];
                i += buffer.in_pos - old_pos;
                if !applied {
                    buffer.copy_glyph();
                    i += 1;
                }
                continue;
            }
        }
        buffer.copy_glyph();
        i += 1;
    }
    Ok(true)
}

fn apply_reverse_chain_subst(
    ctxt: &GsubContext<'_>,
    subtable: &ReverseChainSingleSubst,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
    nesting_level: usize,
) -> Result<bool, ParseError> {
    // Reverse substitution only runs as a top-level pass
    if nesting_level != 1 || context_length != NO_CONTEXT {
        return Ok(false);
    }
    if !match_type.match_glyph(ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let substitute = subtable.apply_glyph(buffer.cur().glyph, |match_context| {
        match_context.matches_in_place(ctxt.gdef, match_type, buffer.glyphs(), buffer.in_pos)
    })?;
    match substitute {
        Some(substitute) => {
            buffer.cur_mut().set_glyph(substitute);
            Ok(true)
        }
        None => Ok(false),
    }
}
