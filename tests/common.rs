//! Builders assembling binary layout tables for tests.
//!
//! Each builder returns a self-contained byte blob with internal offsets
//! already resolved; `build_layout_table` stitches subtable blobs into a
//! complete GSUB or GPOS table with one script and its default language
//! system.

#![allow(dead_code)]

pub fn push_u16(data: &mut Vec<u8>, value: u16) {
    data.extend_from_slice(&value.to_be_bytes());
}

pub fn push_i16(data: &mut Vec<u8>, value: i16) {
    data.extend_from_slice(&value.to_be_bytes());
}

pub fn push_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_be_bytes());
}

pub struct LookupSpec {
    pub lookup_type: u16,
    pub flag: u16,
    pub subtables: Vec<Vec<u8>>,
}

impl LookupSpec {
    pub fn new(lookup_type: u16, subtable: Vec<u8>) -> Self {
        LookupSpec {
            lookup_type,
            flag: 0,
            subtables: vec![subtable],
        }
    }

    pub fn with_flag(lookup_type: u16, flag: u16, subtable: Vec<u8>) -> Self {
        LookupSpec {
            lookup_type,
            flag,
            subtables: vec![subtable],
        }
    }
}

/// Assemble a complete layout table: one script with a default language
/// system referencing every feature; `features` maps feature tags to
/// lookup indices.
pub fn build_layout_table(
    script_tag: u32,
    features: &[(u32, &[u16])],
    lookups: &[LookupSpec],
) -> Vec<u8> {
    let feature_count = features.len();
    let script_list_off = 10;
    // script list (8) + script table (4) + default langsys (6 + 2 per feature)
    let script_block = 18 + 2 * feature_count;
    let feature_list_off = script_list_off + script_block;

    let feature_tables: Vec<Vec<u8>> = features
        .iter()
        .map(|(_, lookup_indices)| {
            let mut table = Vec::new();
            push_u16(&mut table, 0); // feature params
            push_u16(&mut table, lookup_indices.len() as u16);
            for &lookup_index in *lookup_indices {
                push_u16(&mut table, lookup_index);
            }
            table
        })
        .collect();
    let feature_records_size = 2 + 6 * feature_count;
    let feature_block =
        feature_records_size + feature_tables.iter().map(Vec::len).sum::<usize>();
    let lookup_list_off = feature_list_off + feature_block;

    let mut data = Vec::new();
    push_u16(&mut data, 1); // major version
    push_u16(&mut data, 0); // minor version
    push_u16(&mut data, script_list_off as u16);
    push_u16(&mut data, feature_list_off as u16);
    push_u16(&mut data, lookup_list_off as u16);

    // script list with one script
    push_u16(&mut data, 1);
    push_u32(&mut data, script_tag);
    push_u16(&mut data, 8);
    // script table: default langsys only
    push_u16(&mut data, 4);
    push_u16(&mut data, 0);
    // default langsys referencing every feature, no required feature
    push_u16(&mut data, 0);
    push_u16(&mut data, 0xFFFF);
    push_u16(&mut data, feature_count as u16);
    for index in 0..feature_count {
        push_u16(&mut data, index as u16);
    }
    assert_eq!(data.len(), feature_list_off);

    // feature list
    push_u16(&mut data, feature_count as u16);
    let mut table_off = feature_records_size;
    for ((feature_tag, _), table) in features.iter().zip(&feature_tables) {
        push_u32(&mut data, *feature_tag);
        push_u16(&mut data, table_off as u16);
        table_off += table.len();
    }
    for table in &feature_tables {
        data.extend_from_slice(table);
    }
    assert_eq!(data.len(), lookup_list_off);

    // lookup list
    push_u16(&mut data, lookups.len() as u16);
    let lookup_blobs: Vec<Vec<u8>> = lookups.iter().map(build_lookup).collect();
    let mut lookup_off = 2 + 2 * lookups.len();
    for blob in &lookup_blobs {
        push_u16(&mut data, lookup_off as u16);
        lookup_off += blob.len();
    }
    for blob in &lookup_blobs {
        data.extend_from_slice(blob);
    }
    data
}

/// Like `build_layout_table`, with one additional named language system
/// that references every feature and declares `required_feature` as its
/// required feature.
pub fn build_layout_table_with_language(
    script_tag: u32,
    language_tag: u32,
    required_feature: u16,
    features: &[(u32, &[u16])],
    lookups: &[LookupSpec],
) -> Vec<u8> {
    let feature_count = features.len();
    let langsys_size = 6 + 2 * feature_count;
    // script list (8) + script table (4 + one langsys record) + two langsys
    let script_block = 8 + 10 + 2 * langsys_size;
    let script_list_off = 10;
    let feature_list_off = script_list_off + script_block;

    let feature_tables: Vec<Vec<u8>> = features
        .iter()
        .map(|(_, lookup_indices)| {
            let mut table = Vec::new();
            push_u16(&mut table, 0);
            push_u16(&mut table, lookup_indices.len() as u16);
            for &lookup_index in *lookup_indices {
                push_u16(&mut table, lookup_index);
            }
            table
        })
        .collect();
    let feature_records_size = 2 + 6 * feature_count;
    let feature_block =
        feature_records_size + feature_tables.iter().map(Vec::len).sum::<usize>();
    let lookup_list_off = feature_list_off + feature_block;

    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, 0);
    push_u16(&mut data, script_list_off as u16);
    push_u16(&mut data, feature_list_off as u16);
    push_u16(&mut data, lookup_list_off as u16);

    // script list with one script
    push_u16(&mut data, 1);
    push_u32(&mut data, script_tag);
    push_u16(&mut data, 8);
    // script table: default langsys, one named langsys record
    let default_langsys_off = 10;
    push_u16(&mut data, default_langsys_off);
    push_u16(&mut data, 1);
    push_u32(&mut data, language_tag);
    push_u16(&mut data, default_langsys_off + langsys_size as u16);
    // default langsys: no required feature
    push_u16(&mut data, 0);
    push_u16(&mut data, 0xFFFF);
    push_u16(&mut data, feature_count as u16);
    for index in 0..feature_count {
        push_u16(&mut data, index as u16);
    }
    // named langsys with a required feature
    push_u16(&mut data, 0);
    push_u16(&mut data, required_feature);
    push_u16(&mut data, feature_count as u16);
    for index in 0..feature_count {
        push_u16(&mut data, index as u16);
    }
    assert_eq!(data.len(), feature_list_off);

    push_u16(&mut data, feature_count as u16);
    let mut table_off = feature_records_size;
    for ((feature_tag, _), table) in features.iter().zip(&feature_tables) {
        push_u32(&mut data, *feature_tag);
        push_u16(&mut data, table_off as u16);
        table_off += table.len();
    }
    for table in &feature_tables {
        data.extend_from_slice(table);
    }
    assert_eq!(data.len(), lookup_list_off);

    push_u16(&mut data, lookups.len() as u16);
    let lookup_blobs: Vec<Vec<u8>> = lookups.iter().map(build_lookup).collect();
    let mut lookup_off = 2 + 2 * lookups.len();
    for blob in &lookup_blobs {
        push_u16(&mut data, lookup_off as u16);
        lookup_off += blob.len();
    }
    for blob in &lookup_blobs {
        data.extend_from_slice(blob);
    }
    data
}

fn build_lookup(spec: &LookupSpec) -> Vec<u8> {
    let mut blob = Vec::new();
    push_u16(&mut blob, spec.lookup_type);
    push_u16(&mut blob, spec.flag);
    push_u16(&mut blob, spec.subtables.len() as u16);
    let mut subtable_off = 6 + 2 * spec.subtables.len();
    for subtable in &spec.subtables {
        push_u16(&mut blob, subtable_off as u16);
        subtable_off += subtable.len();
    }
    for subtable in &spec.subtables {
        blob.extend_from_slice(subtable);
    }
    blob
}

/// Coverage format 1. Glyphs must be sorted.
pub fn coverage(glyphs: &[u16]) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, glyphs.len() as u16);
    for &glyph in glyphs {
        push_u16(&mut data, glyph);
    }
    data
}

/// GSUB type 1 format 1: coverage plus glyph-id delta.
pub fn single_subst_format1(covered: &[u16], delta: i16) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, 6);
    push_i16(&mut data, delta);
    data.extend_from_slice(&coverage(covered));
    data
}

/// GSUB type 1 format 2: explicit substitute per covered glyph.
/// `pairs` maps a covered glyph (sorted) to its substitute.
pub fn single_subst_format2(pairs: &[(u16, u16)]) -> Vec<u8> {
    let covered: Vec<u16> = pairs.iter().map(|&(glyph, _)| glyph).collect();
    let mut data = Vec::new();
    push_u16(&mut data, 2);
    push_u16(&mut data, (6 + 2 * pairs.len()) as u16);
    push_u16(&mut data, pairs.len() as u16);
    for &(_, substitute) in pairs {
        push_u16(&mut data, substitute);
    }
    data.extend_from_slice(&coverage(&covered));
    data
}

/// GSUB type 2: one-to-many substitution.
pub fn multiple_subst(entries: &[(u16, &[u16])]) -> Vec<u8> {
    let covered: Vec<u16> = entries.iter().map(|&(glyph, _)| glyph).collect();
    let header_size = 6 + 2 * entries.len();
    let mut sequences = Vec::new();
    let mut sequence_offsets = Vec::new();
    for &(_, substitutes) in entries {
        sequence_offsets.push(header_size + sequences.len());
        push_u16(&mut sequences, substitutes.len() as u16);
        for &substitute in substitutes {
            push_u16(&mut sequences, substitute);
        }
    }
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, (header_size + sequences.len()) as u16); // coverage
    push_u16(&mut data, entries.len() as u16);
    for offset in sequence_offsets {
        push_u16(&mut data, offset as u16);
    }
    data.extend_from_slice(&sequences);
    data.extend_from_slice(&coverage(&covered));
    data
}

/// GSUB type 3: alternate sets.
pub fn alternate_subst(entries: &[(u16, &[u16])]) -> Vec<u8> {
    let covered: Vec<u16> = entries.iter().map(|&(glyph, _)| glyph).collect();
    let header_size = 6 + 2 * entries.len();
    let mut sets = Vec::new();
    let mut set_offsets = Vec::new();
    for &(_, alternates) in entries {
        set_offsets.push(header_size + sets.len());
        push_u16(&mut sets, alternates.len() as u16);
        for &alternate in alternates {
            push_u16(&mut sets, alternate);
        }
    }
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, (header_size + sets.len()) as u16);
    push_u16(&mut data, entries.len() as u16);
    for offset in set_offsets {
        push_u16(&mut data, offset as u16);
    }
    data.extend_from_slice(&sets);
    data.extend_from_slice(&coverage(&covered));
    data
}

/// GSUB type 4. `entries` maps a first glyph to its ligature candidates,
/// each `(remaining components, ligature glyph)`.
pub fn ligature_subst(entries: &[(u16, &[(&[u16], u16)])]) -> Vec<u8> {
    let covered: Vec<u16> = entries.iter().map(|&(glyph, _)| glyph).collect();
    let header_size = 6 + 2 * entries.len();
    let mut sets = Vec::new();
    let mut set_offsets = Vec::new();
    for &(_, ligatures) in entries {
        set_offsets.push(header_size + sets.len());
        let mut set = Vec::new();
        push_u16(&mut set, ligatures.len() as u16);
        let mut ligature_off = 2 + 2 * ligatures.len();
        let mut ligature_blobs = Vec::new();
        for &(components, ligature_glyph) in ligatures {
            push_u16(&mut set, ligature_off as u16);
            let mut blob = Vec::new();
            push_u16(&mut blob, ligature_glyph);
            push_u16(&mut blob, (components.len() + 1) as u16);
            for &component in components {
                push_u16(&mut blob, component);
            }
            ligature_off += blob.len();
            ligature_blobs.push(blob);
        }
        for blob in ligature_blobs {
            set.extend_from_slice(&blob);
        }
        sets.extend_from_slice(&set);
    }
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, (header_size + sets.len()) as u16);
    push_u16(&mut data, entries.len() as u16);
    for offset in set_offsets {
        push_u16(&mut data, offset as u16);
    }
    data.extend_from_slice(&sets);
    data.extend_from_slice(&coverage(&covered));
    data
}

/// GSUB type 5 / GPOS type 7, format 3: coverage-based context.
pub fn context_format3(input: &[&[u16]], records: &[(u16, u16)]) -> Vec<u8> {
    let header_size = 6 + 2 * input.len() + 4 * records.len();
    let mut data = Vec::new();
    push_u16(&mut data, 3);
    push_u16(&mut data, input.len() as u16);
    push_u16(&mut data, records.len() as u16);
    let mut coverage_blobs = Vec::new();
    let mut coverage_off = header_size;
    for &glyphs in input {
        push_u16(&mut data, coverage_off as u16);
        let blob = coverage(glyphs);
        coverage_off += blob.len();
        coverage_blobs.push(blob);
    }
    for &(sequence_index, lookup_index) in records {
        push_u16(&mut data, sequence_index);
        push_u16(&mut data, lookup_index);
    }
    for blob in coverage_blobs {
        data.extend_from_slice(&blob);
    }
    data
}

/// GSUB type 6 / GPOS type 8, format 3: coverage-based chaining context.
pub fn chain_context_format3(
    backtrack: &[&[u16]],
    input: &[&[u16]],
    lookahead: &[&[u16]],
    records: &[(u16, u16)],
) -> Vec<u8> {
    let header_size =
        10 + 2 * (backtrack.len() + input.len() + lookahead.len()) + 4 * records.len();
    let mut coverage_blobs = Vec::new();
    let mut coverage_offsets = Vec::new();
    let mut coverage_off = header_size;
    for &glyphs in backtrack.iter().chain(input).chain(lookahead) {
        coverage_offsets.push(coverage_off);
        let blob = coverage(glyphs);
        coverage_off += blob.len();
        coverage_blobs.push(blob);
    }
    let mut offsets = coverage_offsets.into_iter();

    let mut data = Vec::new();
    push_u16(&mut data, 3);
    push_u16(&mut data, backtrack.len() as u16);
    for _ in backtrack {
        push_u16(&mut data, offsets.next().unwrap() as u16);
    }
    push_u16(&mut data, input.len() as u16);
    for _ in input {
        push_u16(&mut data, offsets.next().unwrap() as u16);
    }
    push_u16(&mut data, lookahead.len() as u16);
    for _ in lookahead {
        push_u16(&mut data, offsets.next().unwrap() as u16);
    }
    push_u16(&mut data, records.len() as u16);
    for &(sequence_index, lookup_index) in records {
        push_u16(&mut data, sequence_index);
        push_u16(&mut data, lookup_index);
    }
    for blob in coverage_blobs {
        data.extend_from_slice(&blob);
    }
    data
}

/// GSUB type 8: reverse chaining single substitution.
pub fn reverse_chain_subst(
    covered: &[u16],
    substitutes: &[u16],
    backtrack: &[&[u16]],
    lookahead: &[&[u16]],
) -> Vec<u8> {
    let header_size = 10 + 2 * (backtrack.len() + lookahead.len()) + 2 * substitutes.len();
    let mut coverage_blobs = vec![coverage(covered)];
    let mut coverage_off = header_size + coverage_blobs[0].len();
    let mut window_offsets = Vec::new();
    for &glyphs in backtrack.iter().chain(lookahead) {
        window_offsets.push(coverage_off);
        let blob = coverage(glyphs);
        coverage_off += blob.len();
        coverage_blobs.push(blob);
    }
    let mut offsets = window_offsets.into_iter();

    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, header_size as u16); // input coverage
    push_u16(&mut data, backtrack.len() as u16);
    for _ in backtrack {
        push_u16(&mut data, offsets.next().unwrap() as u16);
    }
    push_u16(&mut data, lookahead.len() as u16);
    for _ in lookahead {
        push_u16(&mut data, offsets.next().unwrap() as u16);
    }
    push_u16(&mut data, substitutes.len() as u16);
    for &substitute in substitutes {
        push_u16(&mut data, substitute);
    }
    for blob in coverage_blobs {
        data.extend_from_slice(&blob);
    }
    data
}

/// GSUB extension (type 7) / GPOS extension (type 9) wrapper around a
/// single subtable.
pub fn extension_subtable(wrapped_lookup_type: u16, subtable: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, wrapped_lookup_type);
    push_u32(&mut data, 8);
    data.extend_from_slice(subtable);
    data
}

/// GPOS type 1 format 1: one value record for every covered glyph.
/// `values` holds exactly the fields named by `value_format`, in order.
pub fn single_pos_format1(covered: &[u16], value_format: u16, values: &[i16]) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, (6 + 2 * values.len()) as u16);
    push_u16(&mut data, value_format);
    for &value in values {
        push_i16(&mut data, value);
    }
    data.extend_from_slice(&coverage(covered));
    data
}

/// GPOS type 1 format 1 with an x-advance value and an x-advance device
/// table.
pub fn single_pos_with_device(covered: &[u16], x_advance: i16, device: &[u8]) -> Vec<u8> {
    let value_format = 0x0004 | 0x0040; // X_ADVANCE | X_ADVANCE_DEVICE
    let header_size = 10;
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, (header_size + device.len()) as u16); // coverage
    push_u16(&mut data, value_format);
    push_i16(&mut data, x_advance);
    push_u16(&mut data, header_size as u16); // device offset
    data.extend_from_slice(device);
    data.extend_from_slice(&coverage(covered));
    data
}

/// A device table blob.
pub fn device_table(start_size: u16, end_size: u16, delta_format: u16, words: &[u16]) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, start_size);
    push_u16(&mut data, end_size);
    push_u16(&mut data, delta_format);
    for &word in words {
        push_u16(&mut data, word);
    }
    data
}

/// GPOS type 2 format 1 with an x-advance adjustment on the first glyph.
/// `pairs` maps `(first, second)` (sorted, unique firsts) to the delta.
pub fn pair_pos_format1(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
    let covered: Vec<u16> = pairs.iter().map(|&(first, _, _)| first).collect();
    let header_size = 10 + 2 * pairs.len();
    let mut sets = Vec::new();
    let mut set_offsets = Vec::new();
    for &(_, second, x_advance) in pairs {
        set_offsets.push(header_size + sets.len());
        push_u16(&mut sets, 1); // one pair value record
        push_u16(&mut sets, second);
        push_i16(&mut sets, x_advance); // value record 1: x advance only
    }
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, (header_size + sets.len()) as u16); // coverage
    push_u16(&mut data, 0x0004); // value format 1: X_ADVANCE
    push_u16(&mut data, 0); // value format 2: empty
    push_u16(&mut data, pairs.len() as u16);
    for offset in set_offsets {
        push_u16(&mut data, offset as u16);
    }
    data.extend_from_slice(&sets);
    data.extend_from_slice(&coverage(&covered));
    data
}

fn anchor_format1(x: i16, y: i16) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_i16(&mut data, x);
    push_i16(&mut data, y);
    data
}

/// GPOS type 3: cursive attachment. `entries` maps a covered glyph
/// (sorted) to optional entry and exit anchors.
pub fn cursive_pos(
    entries: &[(u16, Option<(i16, i16)>, Option<(i16, i16)>)],
) -> Vec<u8> {
    let covered: Vec<u16> = entries.iter().map(|&(glyph, _, _)| glyph).collect();
    let header_size = 6 + 4 * entries.len();
    let mut anchors = Vec::new();
    let mut record_offsets = Vec::new();
    for &(_, entry, exit) in entries {
        let entry_off = match entry {
            Some((x, y)) => {
                let offset = header_size + anchors.len();
                anchors.extend_from_slice(&anchor_format1(x, y));
                offset as u16
            }
            None => 0,
        };
        let exit_off = match exit {
            Some((x, y)) => {
                let offset = header_size + anchors.len();
                anchors.extend_from_slice(&anchor_format1(x, y));
                offset as u16
            }
            None => 0,
        };
        record_offsets.push((entry_off, exit_off));
    }
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, (header_size + anchors.len()) as u16); // coverage
    push_u16(&mut data, entries.len() as u16);
    for (entry_off, exit_off) in record_offsets {
        push_u16(&mut data, entry_off);
        push_u16(&mut data, exit_off);
    }
    data.extend_from_slice(&anchors);
    data.extend_from_slice(&coverage(&covered));
    data
}

fn mark_array(marks: &[(u16, u16, (i16, i16))]) -> Vec<u8> {
    // (glyph, class, anchor); glyph order must match the mark coverage
    let header_size = 2 + 4 * marks.len();
    let mut anchors = Vec::new();
    let mut data = Vec::new();
    push_u16(&mut data, marks.len() as u16);
    for &(_, class, (x, y)) in marks {
        push_u16(&mut data, class);
        push_u16(&mut data, (header_size + anchors.len()) as u16);
        anchors.extend_from_slice(&anchor_format1(x, y));
    }
    data.extend_from_slice(&anchors);
    data
}

fn anchor_matrix(rows: &[Vec<Option<(i16, i16)>>], class_count: u16) -> Vec<u8> {
    // BaseArray / Mark2Array / LigatureAttach: a count, a matrix of anchor
    // offsets, then the anchors
    let header_size = 2 + 2 * usize::from(class_count) * rows.len();
    let mut anchors = Vec::new();
    let mut data = Vec::new();
    push_u16(&mut data, rows.len() as u16);
    for row in rows {
        assert_eq!(row.len(), usize::from(class_count));
        for anchor in row {
            match anchor {
                Some((x, y)) => {
                    push_u16(&mut data, (header_size + anchors.len()) as u16);
                    anchors.extend_from_slice(&anchor_format1(*x, *y));
                }
                None => push_u16(&mut data, 0),
            }
        }
    }
    data.extend_from_slice(&anchors);
    data
}

/// GPOS type 4 (and type 6, whose layout is identical): marks against
/// per-class anchors on bases. `marks` is `(glyph, class, anchor)`,
/// `bases` is `(glyph, one anchor per class)`.
pub fn mark_base_pos(
    class_count: u16,
    marks: &[(u16, u16, (i16, i16))],
    bases: &[(u16, Vec<Option<(i16, i16)>>)],
) -> Vec<u8> {
    let mark_covered: Vec<u16> = marks.iter().map(|&(glyph, _, _)| glyph).collect();
    let base_covered: Vec<u16> = bases.iter().map(|&(glyph, _)| glyph).collect();
    let mark_coverage = coverage(&mark_covered);
    let base_coverage = coverage(&base_covered);
    let marks_blob = mark_array(marks);
    let base_rows: Vec<Vec<Option<(i16, i16)>>> =
        bases.iter().map(|(_, row)| row.clone()).collect();
    let bases_blob = anchor_matrix(&base_rows, class_count);

    let header_size = 12;
    let mark_coverage_off = header_size;
    let base_coverage_off = mark_coverage_off + mark_coverage.len();
    let mark_array_off = base_coverage_off + base_coverage.len();
    let base_array_off = mark_array_off + marks_blob.len();

    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, mark_coverage_off as u16);
    push_u16(&mut data, base_coverage_off as u16);
    push_u16(&mut data, class_count);
    push_u16(&mut data, mark_array_off as u16);
    push_u16(&mut data, base_array_off as u16);
    data.extend_from_slice(&mark_coverage);
    data.extend_from_slice(&base_coverage);
    data.extend_from_slice(&marks_blob);
    data.extend_from_slice(&bases_blob);
    data
}

/// GPOS type 5: marks against per-class anchors on ligature components.
/// `ligatures` is `(glyph, component rows)`.
pub fn mark_lig_pos(
    class_count: u16,
    marks: &[(u16, u16, (i16, i16))],
    ligatures: &[(u16, Vec<Vec<Option<(i16, i16)>>>)],
) -> Vec<u8> {
    let mark_covered: Vec<u16> = marks.iter().map(|&(glyph, _, _)| glyph).collect();
    let lig_covered: Vec<u16> = ligatures.iter().map(|&(glyph, _)| glyph).collect();
    let mark_coverage = coverage(&mark_covered);
    let lig_coverage = coverage(&lig_covered);
    let marks_blob = mark_array(marks);

    // ligature array: count, attach offsets, then the attach tables
    let attaches: Vec<Vec<u8>> = ligatures
        .iter()
        .map(|(_, components)| anchor_matrix(components, class_count))
        .collect();
    let mut lig_array = Vec::new();
    push_u16(&mut lig_array, ligatures.len() as u16);
    let mut attach_off = 2 + 2 * ligatures.len();
    for attach in &attaches {
        push_u16(&mut lig_array, attach_off as u16);
        attach_off += attach.len();
    }
    for attach in &attaches {
        lig_array.extend_from_slice(attach);
    }

    let header_size = 12;
    let mark_coverage_off = header_size;
    let lig_coverage_off = mark_coverage_off + mark_coverage.len();
    let mark_array_off = lig_coverage_off + lig_coverage.len();
    let lig_array_off = mark_array_off + marks_blob.len();

    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, mark_coverage_off as u16);
    push_u16(&mut data, lig_coverage_off as u16);
    push_u16(&mut data, class_count);
    push_u16(&mut data, mark_array_off as u16);
    push_u16(&mut data, lig_array_off as u16);
    data.extend_from_slice(&mark_coverage);
    data.extend_from_slice(&lig_coverage);
    data.extend_from_slice(&marks_blob);
    data.extend_from_slice(&lig_array);
    data
}

/// A GDEF table carrying a class-definition format 1 run starting at
/// `start_glyph`.
pub fn gdef_classes(start_glyph: u16, classes: &[u16]) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 1); // major
    push_u16(&mut data, 0); // minor
    push_u16(&mut data, 12); // glyph classdef
    push_u16(&mut data, 0); // attach list
    push_u16(&mut data, 0); // lig caret list
    push_u16(&mut data, 0); // mark attach classdef
    push_u16(&mut data, 1); // classdef format 1
    push_u16(&mut data, start_glyph);
    push_u16(&mut data, classes.len() as u16);
    for &class in classes {
        push_u16(&mut data, class);
    }
    data
}

/// Convenience fixtures shared between unit and integration tests.
pub struct GsubBuilder;

impl GsubBuilder {
    /// A GSUB with a `latn` script, a `liga` feature and one single
    /// substitution lookup mapping glyph 1 to glyph 2.
    pub fn single_subst_font() -> Vec<u8> {
        build_layout_table(
            0x6C61746E, // latn
            &[(0x6C696761, &[0])],
            &[LookupSpec::new(1, single_subst_format2(&[(1, 2)]))],
        )
    }
}
