//! Glyph positioning (`GPOS`) application.
//!
//! Positioning runs in place over the glyph buffer, writing 26.6
//! fixed-point adjustments into the parallel position array. Design-unit
//! values are scaled through the font metrics; device tables refine them
//! per ppem unless the caller asks for device-independent output.

use crate::buffer::{GlyphBuffer, Position};
use crate::context::{ContextLookupHelper, LookupFlag, MatchType};
use crate::error::{ParseError, ShapingError};
use crate::gdef::{self, GdefTable};
use crate::gsub::{MAX_NESTING_LEVEL, NO_CONTEXT};
use crate::layout::{
    chain_context_lookup_info, context_lookup_info, Anchor, ChainContextLookup, ContextLookup,
    CursivePos, FeaturePlan, LayoutTable, MarkBasePos, MarkLigPos, PairPos, PosLookup, SinglePos,
    ValueRecord, GPOS,
};

/// 26.6 fixed-point pixels.
pub type F26Dot6 = i32;

/// Resolves a glyph's contour point to device coordinates, for anchors
/// that name a point instead of design coordinates. Returning `None`
/// falls back to the anchor's design coordinates.
pub type ContourPointFn<'a> = &'a dyn Fn(u16, u16) -> Option<(F26Dot6, F26Dot6)>;

/// Resolves a multiple-master metric id to a 26.6 value.
pub type MetricValueFn<'a> = &'a dyn Fn(u16) -> Option<F26Dot6>;

/// The scaling environment positioning runs in. Scales are 16.16 factors
/// from design units to 26.6 pixels.
#[derive(Copy, Clone, Debug)]
pub struct FontMetrics {
    pub x_ppem: u16,
    pub y_ppem: u16,
    pub x_scale: i32,
    pub y_scale: i32,
}

impl FontMetrics {
    fn scale_x(&self, units: i16) -> F26Dot6 {
        ((i64::from(self.x_scale) * i64::from(units)) / 0x10000) as i32
    }

    fn scale_y(&self, units: i16) -> F26Dot6 {
        ((i64::from(self.y_scale) * i64::from(units)) / 0x10000) as i32
    }
}

/// Everything a GPOS application pass needs. The contour-point and
/// metric callbacks are explicit per-call state, not process globals.
pub struct GposContext<'a> {
    pub gpos: &'a LayoutTable<GPOS>,
    pub gdef: Option<&'a GdefTable>,
    pub plan: &'a FeaturePlan,
    pub metrics: FontMetrics,
    pub contour_point: Option<ContourPointFn<'a>>,
    pub metric_value: Option<MetricValueFn<'a>>,
}

type PosContext<'a> = ContextLookupHelper<'a, GPOS>;

/// Mutable state threaded through one positioning pass.
struct GposInstance<'a, 'b> {
    ctxt: &'b GposContext<'a>,
    /// Suppress device tables and contour points.
    dvi: bool,
    /// Writing direction of the run.
    r2l: bool,
    /// The last glyph that exposed a cursive exit anchor.
    last: Option<CursiveExit>,
}

#[derive(Copy, Clone)]
struct CursiveExit {
    pos: usize,
    x: F26Dot6,
    y: F26Dot6,
}

/// Apply every activated feature's lookups to `buffer`, then resolve
/// cursive chains. `device_independent` ignores device tables and contour
/// points; `right_to_left` is the direction of the run being shaped.
pub fn apply_gpos(
    ctxt: &GposContext<'_>,
    buffer: &mut GlyphBuffer,
    device_independent: bool,
    right_to_left: bool,
) -> Result<bool, ShapingError> {
    if buffer.is_empty() {
        return Ok(false);
    }
    let lookup_count = ctxt.gpos.lookup_count();
    let mut instance = GposInstance {
        ctxt,
        dvi: device_independent,
        r2l: right_to_left,
        last: None,
    };
    if ctxt.plan.apply_order().is_empty() {
        return Ok(false);
    }
    buffer.clear_positions();
    let mut applied = false;
    for &feature_index in ctxt.plan.apply_order() {
        let feature = ctxt.gpos.feature_by_index(feature_index)?;
        for &lookup_index in &feature.feature_table().lookup_indices {
            let lookup_index = usize::from(lookup_index);
            if lookup_index >= lookup_count {
                continue;
            }
            if apply_string_lookup(&mut instance, lookup_index, buffer)? {
                applied = true;
            }
        }
    }
    position_cursive_chain(buffer);
    Ok(applied)
}

/// Run one lookup over the whole glyph string.
fn apply_string_lookup(
    gpi: &mut GposInstance<'_, '_>,
    lookup_index: usize,
    buffer: &mut GlyphBuffer,
) -> Result<bool, ParseError> {
    let properties = gpi.ctxt.plan.lookup_properties(lookup_index);
    let mut applied = false;
    // No pending cursive connection carries across lookups
    gpi.last = None;
    buffer.in_pos = 0;
    while buffer.in_pos < buffer.len() {
        let advanced = if (!buffer.cur().properties & properties) != 0 {
            apply_glyph_lookup(gpi, lookup_index, buffer, NO_CONTEXT, 0)?
        } else {
            // User-disabled glyphs always interrupt cursive positioning,
            // unlike glyphs skipped through their GDEF class
            gpi.last = None;
            false
        };
        if advanced {
            applied = true;
        } else {
            buffer.in_pos += 1;
        }
    }
    Ok(applied)
}

/// Apply one lookup at the current buffer position, trying its subtables
/// in order. Successful appliers advance `in_pos` themselves.
fn apply_glyph_lookup(
    gpi: &mut GposInstance<'_, '_>,
    lookup_index: usize,
    buffer: &mut GlyphBuffer,
    context_length: u16,
    nesting_level: usize,
) -> Result<bool, ParseError> {
    let nesting_level = nesting_level + 1;
    if nesting_level > MAX_NESTING_LEVEL {
        // Same anti-recursion ceiling as substitution
        return Ok(false);
    }
    let lookup = match gpi
        .ctxt
        .gpos
        .lookup_list
        .as_ref()
        .and_then(|lookup_list| lookup_list.lookup(lookup_index))
    {
        Some(lookup) => lookup,
        None => return Ok(false),
    };
    let flag = lookup.lookup_flag;
    let match_type = MatchType::from_lookup_flag(flag);

    match lookup.subtables {
        PosLookup::SinglePos(ref subtables) => {
            for subtable in subtables {
                if apply_single_pos(gpi, subtable, match_type, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        PosLookup::PairPos(ref subtables) => {
            for subtable in subtables {
                if apply_pair_pos(gpi, subtable, match_type, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        PosLookup::CursivePos(ref subtables) => {
            for subtable in subtables {
                if apply_cursive_pos(gpi, subtable, match_type, flag, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        PosLookup::MarkBasePos(ref subtables) => {
            for subtable in subtables {
                if apply_mark_base_pos(gpi, subtable, match_type, flag, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        PosLookup::MarkLigPos(ref subtables) => {
            for subtable in subtables {
                if apply_mark_lig_pos(gpi, subtable, match_type, flag, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        PosLookup::MarkMarkPos(ref subtables) => {
            for subtable in subtables {
                if apply_mark_mark_pos(gpi, subtable, match_type, flag, buffer, context_length)? {
                    return Ok(true);
                }
            }
        }
        PosLookup::ContextPos(ref subtables) => {
            for subtable in subtables {
                if apply_context_pos(
                    gpi,
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
        PosLookup::ChainContextPos(ref subtables) => {
            for subtable in subtables {
                if apply_chain_context_pos(
                    gpi,
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

/// Scale a value record into `position`. Device adjustments arrive in
/// whole pixels and are shifted into 26.6; metric-id fields resolve
/// through the multiple-master callback when one is present.
fn apply_value_record(
    gpi: &GposInstance<'_, '_>,
    record: &ValueRecord,
    position: &mut Position,
) {
    let metrics = gpi.ctxt.metrics;
    position.x_pos += metrics.scale_x(record.x_placement);
    position.y_pos += metrics.scale_y(record.y_placement);
    position.x_advance += metrics.scale_x(record.x_advance);
    position.y_advance += metrics.scale_y(record.y_advance);

    if !gpi.dvi {
        if let Some(ref device) = record.x_placement_device {
            position.x_pos += i32::from(device.adjustment(metrics.x_ppem)) << 6;
        }
        if let Some(ref device) = record.y_placement_device {
            position.y_pos += i32::from(device.adjustment(metrics.y_ppem)) << 6;
        }
        if let Some(ref device) = record.x_advance_device {
            position.x_advance += i32::from(device.adjustment(metrics.x_ppem)) << 6;
        }
        if let Some(ref device) = record.y_advance_device {
            position.y_advance += i32::from(device.adjustment(metrics.y_ppem)) << 6;
        }
    }

    if let Some(metric_value) = gpi.ctxt.metric_value {
        // Callback values are already fractional pixels
        if let Some(value) = record.x_placement_id.and_then(metric_value) {
            position.x_pos += value;
        }
        if let Some(value) = record.y_placement_id.and_then(metric_value) {
            position.y_pos += value;
        }
        if let Some(value) = record.x_advance_id.and_then(metric_value) {
            position.x_advance += value;
        }
        if let Some(value) = record.y_advance_id.and_then(metric_value) {
            position.y_advance += value;
        }
    }
}

/// Resolve an anchor to 26.6 coordinates. `None` means the anchor cannot
/// be resolved (a metric-id anchor without a callback).
fn resolve_anchor(
    gpi: &GposInstance<'_, '_>,
    anchor: &Anchor,
    glyph: u16,
) -> Option<(F26Dot6, F26Dot6)> {
    let metrics = gpi.ctxt.metrics;
    match *anchor {
        Anchor::Format1 { x, y } => Some((metrics.scale_x(x), metrics.scale_y(y))),
        Anchor::Format2 { x, y, anchor_point } => {
            if !gpi.dvi {
                if let Some(resolve) = gpi.ctxt.contour_point {
                    if let Some(device_point) = resolve(glyph, anchor_point) {
                        return Some(device_point);
                    }
                }
            }
            // No outline available (e.g. bitmap glyphs): design coordinates
            Some((metrics.scale_x(x), metrics.scale_y(y)))
        }
        Anchor::Format3 {
            x,
            y,
            ref x_device,
            ref y_device,
        } => {
            let mut x_value = metrics.scale_x(x);
            let mut y_value = metrics.scale_y(y);
            if !gpi.dvi {
                if let Some(device) = x_device {
                    x_value += i32::from(device.adjustment(metrics.x_ppem)) << 6;
                }
                if let Some(device) = y_device {
                    y_value += i32::from(device.adjustment(metrics.y_ppem)) << 6;
                }
            }
            Some((x_value, y_value))
        }
        Anchor::Format4 { x_id, y_id } => {
            let metric_value = gpi.ctxt.metric_value?;
            Some((metric_value(x_id)?, metric_value(y_id)?))
        }
    }
}

fn apply_single_pos(
    gpi: &mut GposInstance<'_, '_>,
    subtable: &SinglePos,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if context_length != NO_CONTEXT && context_length < 1 {
        return Ok(false);
    }
    if !match_type.match_glyph(gpi.ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let record = match subtable.apply(buffer.cur().glyph)? {
        Some(record) => record,
        None => return Ok(false),
    };
    let in_pos = buffer.in_pos;
    apply_value_record(gpi, record, &mut buffer.positions_mut()[in_pos]);
    buffer.in_pos += 1;
    Ok(true)
}

fn apply_pair_pos(
    gpi: &mut GposInstance<'_, '_>,
    subtable: &PairPos,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if buffer.in_pos + 1 >= buffer.len() {
        return Ok(false); // not enough glyphs in the stream
    }
    if context_length != NO_CONTEXT && context_length < 2 {
        return Ok(false);
    }
    if !match_type.match_glyph(gpi.ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let first_pos = buffer.in_pos;
    let first_glyph = buffer.cur().glyph;
    if !subtable.covers_first(first_glyph) {
        return Ok(false);
    }
    let second_pos = match match_type.find_next(gpi.ctxt.gdef, buffer.glyphs(), first_pos) {
        Some(second_pos) => second_pos,
        None => return Ok(false),
    };
    let second_glyph = buffer.glyphs()[second_pos].glyph;

    match subtable.apply(first_glyph, second_glyph)? {
        Some((record1, record2)) => {
            apply_value_record(gpi, record1, &mut buffer.positions_mut()[first_pos]);
            apply_value_record(gpi, record2, &mut buffer.positions_mut()[second_pos]);
            // Without a second record the second glyph stays available as
            // the first glyph of the next pair
            buffer.in_pos = if subtable.has_second_record() {
                second_pos + 1
            } else {
                second_pos
            };
            Ok(true)
        }
        None => {
            buffer.in_pos = first_pos;
            if subtable.has_second_record() {
                buffer.in_pos += 1;
            }
            Ok(false)
        }
    }
}

fn apply_cursive_pos(
    gpi: &mut GposInstance<'_, '_>,
    subtable: &CursivePos,
    match_type: MatchType,
    flag: LookupFlag,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if context_length != NO_CONTEXT && context_length < 1 {
        gpi.last = None;
        return Ok(false);
    }
    // Glyphs skipped through their GDEF class leave the pending
    // connection intact
    if !match_type.match_glyph(gpi.ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    // Marks cannot participate in cursive connection
    if gdef::is_mark_property(buffer.cur().property(gpi.ctxt.gdef)) {
        gpi.last = None;
        return Ok(false);
    }
    let glyph = buffer.cur().glyph;
    let record = match subtable.entry_exit(glyph)? {
        Some(record) => record,
        None => {
            gpi.last = None;
            return Ok(false);
        }
    };

    if let (Some(last), Some(entry_anchor)) = (gpi.last, record.entry_anchor.as_ref()) {
        if let Some((entry_x, entry_y)) = resolve_anchor(gpi, entry_anchor, glyph) {
            let in_pos = buffer.in_pos;
            let positions = buffer.positions_mut();
            // The leftward glyph's advance closes the gap to the anchor,
            // whichever of the two it is
            if gpi.r2l {
                positions[in_pos].x_advance = entry_x - last.x;
                positions[in_pos].new_advance = true;
            } else {
                positions[last.pos].x_advance = last.x - entry_x;
                positions[last.pos].new_advance = true;
            }
            // Record the chain link pointing at the glyph whose y offset
            // this one inherits; direction decides which end carries it
            if flag.right_to_left() {
                positions[last.pos].cursive_chain = (last.pos as isize - in_pos as isize) as i16;
                positions[last.pos].y_pos = entry_y - last.y;
            } else {
                positions[in_pos].cursive_chain = (in_pos as isize - last.pos as isize) as i16;
                positions[in_pos].y_pos = last.y - entry_y;
            }
        }
    }

    gpi.last = match record.exit_anchor.as_ref() {
        Some(exit_anchor) => resolve_anchor(gpi, exit_anchor, glyph).map(|(x, y)| CursiveExit {
            pos: buffer.in_pos,
            x,
            y,
        }),
        None => None,
    };
    buffer.in_pos += 1;
    Ok(true)
}

/// Search backwards from `from` for the nearest glyph that is not any
/// kind of mark. Returns `(position, distance)`.
fn find_mark_base(
    gpi: &GposInstance<'_, '_>,
    buffer: &GlyphBuffer,
    from: usize,
) -> Option<(usize, u16)> {
    let mut back = 1;
    while back <= from {
        let candidate = from - back;
        let property = buffer.glyphs()[candidate].property(gpi.ctxt.gdef);
        if !gdef::is_mark_property(property) {
            return Some((candidate, back as u16));
        }
        back += 1;
    }
    None
}

fn apply_mark_base_pos(
    gpi: &mut GposInstance<'_, '_>,
    subtable: &MarkBasePos,
    match_type: MatchType,
    flag: LookupFlag,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if context_length != NO_CONTEXT && context_length < 1 {
        return Ok(false);
    }
    if flag.contains(LookupFlag::IGNORE_BASE_GLYPHS) {
        return Ok(false);
    }
    if !match_type.match_glyph(gpi.ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let mark_glyph = buffer.cur().glyph;
    let (base_pos, back) = match find_mark_base(gpi, buffer, buffer.in_pos) {
        Some(found) => found,
        None => return Ok(false),
    };
    let base_glyph = buffer.glyphs()[base_pos].glyph;
    let (base_anchor, mark_anchor) = match subtable.attachment(base_glyph, mark_glyph)? {
        Some(anchors) => anchors,
        None => return Ok(false),
    };
    let (base_x, base_y) = match resolve_anchor(gpi, base_anchor, base_glyph) {
        Some(value) => value,
        None => return Ok(false),
    };
    let (mark_x, mark_y) = match resolve_anchor(gpi, mark_anchor, mark_glyph) {
        Some(value) => value,
        None => return Ok(false),
    };

    // Anchor alignment replaces, never accumulates
    let in_pos = buffer.in_pos;
    let position = &mut buffer.positions_mut()[in_pos];
    position.x_pos = base_x - mark_x;
    position.y_pos = base_y - mark_y;
    position.x_advance = 0;
    position.y_advance = 0;
    position.back = back;
    buffer.in_pos += 1;
    Ok(true)
}

fn apply_mark_lig_pos(
    gpi: &mut GposInstance<'_, '_>,
    subtable: &MarkLigPos,
    match_type: MatchType,
    flag: LookupFlag,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if context_length != NO_CONTEXT && context_length < 1 {
        return Ok(false);
    }
    if flag.ignore_ligatures() {
        return Ok(false);
    }
    if !match_type.match_glyph(gpi.ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let mark_glyph = buffer.cur().glyph;
    let (ligature_pos, back) = match find_mark_base(gpi, buffer, buffer.in_pos) {
        Some(found) => found,
        None => return Ok(false),
    };
    let ligature_info = &buffer.glyphs()[ligature_pos];
    let ligature_glyph = ligature_info.glyph;
    // A mark belonging to another ligature attaches to this ligature's
    // last component
    let same_ligature = ligature_info.ligature_id == buffer.cur().ligature_id;
    let component = buffer.cur().component;

    let (ligature_anchor, mark_anchor) =
        match subtable.attachment(ligature_glyph, mark_glyph, same_ligature, component)? {
            Some(anchors) => anchors,
            None => return Ok(false),
        };
    let (ligature_x, ligature_y) = match resolve_anchor(gpi, ligature_anchor, ligature_glyph) {
        Some(value) => value,
        None => return Ok(false),
    };
    let (mark_x, mark_y) = match resolve_anchor(gpi, mark_anchor, mark_glyph) {
        Some(value) => value,
        None => return Ok(false),
    };

    let in_pos = buffer.in_pos;
    let position = &mut buffer.positions_mut()[in_pos];
    position.x_pos = ligature_x - mark_x;
    position.y_pos = ligature_y - mark_y;
    position.x_advance = 0;
    position.y_advance = 0;
    position.back = back;
    buffer.in_pos += 1;
    Ok(true)
}

fn apply_mark_mark_pos(
    gpi: &mut GposInstance<'_, '_>,
    subtable: &MarkBasePos,
    match_type: MatchType,
    flag: LookupFlag,
    buffer: &mut GlyphBuffer,
    context_length: u16,
) -> Result<bool, ParseError> {
    if context_length != NO_CONTEXT && context_length < 1 {
        return Ok(false);
    }
    if flag.ignore_marks() {
        return Ok(false);
    }
    if !match_type.match_glyph(gpi.ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    if buffer.in_pos == 0 {
        return Ok(false);
    }
    let mark1_glyph = buffer.cur().glyph;

    // The glyph attached to must itself be a mark; with an attachment
    // filter in force, marks of other classes are stepped over
    let filter = flag.mark_attachment_type();
    let mut back = 1;
    let mark2_pos = loop {
        if back > buffer.in_pos {
            return Ok(false);
        }
        let candidate = buffer.in_pos - back;
        let property = buffer.glyphs()[candidate].property(gpi.ctxt.gdef);
        if !gdef::is_mark_property(property) {
            return Ok(false);
        }
        if filter == 0 || property == filter {
            break candidate;
        }
        back += 1;
    };
    let mark2_glyph = buffer.glyphs()[mark2_pos].glyph;

    let (mark2_anchor, mark1_anchor) = match subtable.attachment(mark2_glyph, mark1_glyph)? {
        Some(anchors) => anchors,
        None => return Ok(false),
    };
    let (mark2_x, mark2_y) = match resolve_anchor(gpi, mark2_anchor, mark2_glyph) {
        Some(value) => value,
        None => return Ok(false),
    };
    let (mark1_x, mark1_y) = match resolve_anchor(gpi, mark1_anchor, mark1_glyph) {
        Some(value) => value,
        None => return Ok(false),
    };

    let in_pos = buffer.in_pos;
    let position = &mut buffer.positions_mut()[in_pos];
    position.x_pos = mark2_x - mark1_x;
    position.y_pos = mark2_y - mark1_y;
    position.x_advance = 0;
    position.y_advance = 0;
    position.back = 1;
    buffer.in_pos += 1;
    Ok(true)
}

fn apply_context_pos(
    gpi: &mut GposInstance<'_, '_>,
    subtable: &ContextLookup<GPOS>,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
    nesting_level: usize,
) -> Result<bool, ParseError> {
    if !match_type.match_glyph(gpi.ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let helper: Option<Box<PosContext<'_>>> =
        context_lookup_info(subtable, buffer.cur().glyph, |match_context| {
            fits_context_length(context_length, match_context.input_table.len() + 1)
                && match_context.matches_in_place(
                    gpi.ctxt.gdef,
                    match_type,
                    buffer.glyphs(),
                    buffer.in_pos,
                )
        })?;
    match helper {
        Some(helper) => apply_context_records(gpi, &helper, buffer, nesting_level),
        None => Ok(false),
    }
}

fn apply_chain_context_pos(
    gpi: &mut GposInstance<'_, '_>,
    subtable: &ChainContextLookup<GPOS>,
    match_type: MatchType,
    buffer: &mut GlyphBuffer,
    context_length: u16,
    nesting_level: usize,
) -> Result<bool, ParseError> {
    if !match_type.match_glyph(gpi.ctxt.gdef, buffer.cur()) {
        return Ok(false);
    }
    let helper: Option<Box<PosContext<'_>>> =
        chain_context_lookup_info(subtable, buffer.cur().glyph, |match_context| {
            fits_context_length(context_length, match_context.input_table.len() + 1)
                && match_context.matches_in_place(
                    gpi.ctxt.gdef,
                    match_type,
                    buffer.glyphs(),
                    buffer.in_pos,
                )
        })?;
    match helper {
        Some(helper) => apply_context_records(gpi, &helper, buffer, nesting_level),
        None => Ok(false),
    }
}

fn fits_context_length(context_length: u16, input_length: usize) -> bool {
    context_length == NO_CONTEXT || usize::from(context_length) >= input_length
}

/// Walk the matched input span, running nested lookups at their recorded
/// sequence indices. A nested lookup that does not apply abandons the
/// whole record list.
fn apply_context_records(
    gpi: &mut GposInstance<'_, '_>,
    helper: &PosContext<'_>,
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
                    gpi,
                    usize::from(lookup_index),
                    buffer,
                    glyph_count as u16,
                    nesting_level,
                )?;
                if !applied {
                    return Ok(false);
                }
                records = &records[1..];
                i += buffer.in_pos - old_pos;
                continue;
            }
        }
        i += 1;
        buffer.in_pos += 1;
    }
    Ok(true)
}

/// Propagate accumulated y offsets along cursive chains: forward for
/// left-to-right links, backward for right-to-left ones.
fn position_cursive_chain(buffer: &mut GlyphBuffer) {
    let positions = buffer.positions_mut();
    for j in 0..positions.len() {
        let chain = positions[j].cursive_chain;
        if chain > 0 {
            if let Some(k) = j.checked_sub(chain as usize) {
                positions[j].y_pos += positions[k].y_pos;
            }
        }
    }
    for j in (0..positions.len()).rev() {
        let chain = positions[j].cursive_chain;
        if chain < 0 {
            let k = j + (-(chain as isize)) as usize;
            if k < positions.len() {
                positions[j].y_pos += positions[k].y_pos;
            }
        }
    }
}
