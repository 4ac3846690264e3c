//! End-to-end positioning tests over hand-built GPOS tables.

mod common;

use common::*;
use otlayout::buffer::GlyphBuffer;
use otlayout::gdef::{load_gdef, GdefTable};
use otlayout::gpos::{apply_gpos, FontMetrics, GposContext};
use otlayout::gsub::{apply_gsub, GsubContext};
use otlayout::layout::{load_gpos, load_gsub, FeaturePlan, LayoutTable, GPOS};
use otlayout::tag;

const FEATURE_MASK: u32 = 0x0001;

/// Identity scaling: design units come out unchanged, ppem 12.
fn metrics() -> FontMetrics {
    FontMetrics {
        x_ppem: 12,
        y_ppem: 12,
        x_scale: 0x10000,
        y_scale: 0x10000,
    }
}

fn buffer_of(glyphs: &[u16]) -> GlyphBuffer {
    let mut buffer = GlyphBuffer::new();
    for (cluster, &glyph) in glyphs.iter().enumerate() {
        buffer.add_glyph(glyph, 0, cluster as u32);
    }
    buffer
}

fn plan_for(table: &LayoutTable<GPOS>) -> FeaturePlan {
    let mut plan = FeaturePlan::new();
    plan.add_feature(table, 0, FEATURE_MASK).expect("add_feature");
    plan
}

fn position(
    table: &LayoutTable<GPOS>,
    gdef: Option<&GdefTable>,
    buffer: &mut GlyphBuffer,
) -> bool {
    let plan = plan_for(table);
    let ctxt = GposContext {
        gpos: table,
        gdef,
        plan: &plan,
        metrics: metrics(),
        contour_point: None,
        metric_value: None,
    };
    apply_gpos(&ctxt, buffer, false, false).expect("apply_gpos")
}

#[test]
fn pair_advance_adjustment() {
    let data = build_layout_table(
        tag::LATN,
        &[(tag::KERN, &[0])],
        &[LookupSpec::new(2, pair_pos_format1(&[(1, 2, -50)]))],
    );
    let table = load_gpos(&data).unwrap();

    let mut buffer = buffer_of(&[1, 2]);
    let applied = position(&table, None, &mut buffer);
    assert!(applied);
    assert_eq!(buffer.positions()[0].x_advance, -50);
    assert_eq!(buffer.positions()[1].x_advance, 0);

    // no rule for (1, 3): default positions stay
    let mut buffer = buffer_of(&[1, 3]);
    let applied = position(&table, None, &mut buffer);
    assert!(!applied);
    assert!(buffer.positions().iter().all(|p| p.x_advance == 0));
}

#[test]
fn pair_chains_share_the_middle_glyph() {
    // without a second value record, glyph 2 starts the next pair
    let data = build_layout_table(
        tag::LATN,
        &[(tag::KERN, &[0])],
        &[LookupSpec::new(
            2,
            pair_pos_format1(&[(1, 2, -50), (2, 3, -60)]),
        )],
    );
    let table = load_gpos(&data).unwrap();
    let mut buffer = buffer_of(&[1, 2, 3]);
    position(&table, None, &mut buffer);
    assert_eq!(buffer.positions()[0].x_advance, -50);
    assert_eq!(buffer.positions()[1].x_advance, -60);
}

#[test]
fn single_pos_placement() {
    let data = build_layout_table(
        tag::LATN,
        &[(tag::DIST, &[0])],
        &[LookupSpec::new(
            1,
            single_pos_format1(&[4], 0x0001, &[15]), // x placement
        )],
    );
    let table = load_gpos(&data).unwrap();
    let mut buffer = buffer_of(&[3, 4]);
    position(&table, None, &mut buffer);
    assert_eq!(buffer.positions()[0].x_pos, 0);
    assert_eq!(buffer.positions()[1].x_pos, 15);
}

#[test]
fn device_table_refines_advance_at_matching_ppem() {
    // +2 pixels at ppem 12, encoded 8 bits per size
    let device = device_table(12, 12, 3, &[0x0200]);
    let data = build_layout_table(
        tag::LATN,
        &[(tag::KERN, &[0])],
        &[LookupSpec::new(
            1,
            single_pos_with_device(&[1], 10, &device),
        )],
    );
    let table = load_gpos(&data).unwrap();
    let plan = plan_for(&table);
    let ctxt = GposContext {
        gpos: &table,
        gdef: None,
        plan: &plan,
        metrics: metrics(),
        contour_point: None,
        metric_value: None,
    };

    let mut buffer = buffer_of(&[1]);
    apply_gpos(&ctxt, &mut buffer, false, false).unwrap();
    assert_eq!(buffer.positions()[0].x_advance, 10 + (2 << 6));

    // device-independent positioning ignores the device table
    let mut buffer = buffer_of(&[1]);
    apply_gpos(&ctxt, &mut buffer, true, false).unwrap();
    assert_eq!(buffer.positions()[0].x_advance, 10);
}

#[test]
fn cursive_chain_accumulates_offsets() {
    let data = build_layout_table(
        tag::ARAB,
        &[(tag::CURS, &[0])],
        &[LookupSpec::new(
            3,
            cursive_pos(&[
                (1, None, Some((100, 10))),
                (2, Some((20, 30)), Some((110, 40))),
                (3, Some((15, 5)), None),
            ]),
        )],
    );
    let table = load_gpos(&data).unwrap();
    let mut plan = FeaturePlan::new();
    let script = table.select_script(tag::ARAB).unwrap();
    let feature = table
        .select_feature(script, None, tag::CURS)
        .unwrap()
        .unwrap();
    plan.add_feature(&table, feature, FEATURE_MASK).unwrap();
    let ctxt = GposContext {
        gpos: &table,
        gdef: None,
        plan: &plan,
        metrics: metrics(),
        contour_point: None,
        metric_value: None,
    };
    let mut buffer = buffer_of(&[1, 2, 3]);
    apply_gpos(&ctxt, &mut buffer, false, false).unwrap();

    let positions = buffer.positions();
    // each glyph's advance now reaches exactly to the next entry anchor
    assert_eq!(positions[0].x_advance, 100 - 20);
    assert!(positions[0].new_advance);
    assert_eq!(positions[1].x_advance, 110 - 15);
    assert!(positions[1].new_advance);
    // chain links point back at the glyph each one follows
    assert_eq!(positions[1].cursive_chain, 1);
    assert_eq!(positions[2].cursive_chain, 1);
    // y offsets accumulate along the chain
    assert_eq!(positions[1].y_pos, 10 - 30);
    assert_eq!(positions[2].y_pos, (40 - 5) + (10 - 30));
}

fn mark_test_gdef() -> GdefTable {
    // glyph classes starting at 1: 1, 2 bases; 5, 10, 11 marks; 30 ligature
    let mut classes = vec![0u16; 30];
    classes[0] = 1; // glyph 1
    classes[1] = 1; // glyph 2
    classes[4] = 3; // glyph 5
    classes[9] = 3; // glyph 10
    classes[10] = 3; // glyph 11
    classes[29] = 2; // glyph 30
    let data = gdef_classes(1, &classes);
    load_gdef(&data).unwrap()
}

#[test]
fn mark_to_base_attaches_over_intervening_marks() {
    let gdef = mark_test_gdef();
    let data = build_layout_table(
        tag::LATN,
        &[(tag::MARK, &[0])],
        &[LookupSpec::new(
            4,
            mark_base_pos(
                1,
                &[(10, 0, (5, 5)), (11, 0, (7, 7))],
                &[(1, vec![Some((100, 50))])],
            ),
        )],
    );
    let table = load_gpos(&data).unwrap();
    let mut buffer = buffer_of(&[1, 10, 11]);
    let applied = position(&table, Some(&gdef), &mut buffer);
    assert!(applied);

    let positions = buffer.positions();
    assert_eq!(positions[1].x_pos, 100 - 5);
    assert_eq!(positions[1].y_pos, 50 - 5);
    assert_eq!(positions[1].back, 1);
    // the second mark looks through the first to the same base
    assert_eq!(positions[2].x_pos, 100 - 7);
    assert_eq!(positions[2].y_pos, 50 - 7);
    assert_eq!(positions[2].back, 2);
}

#[test]
fn mark_to_mark_attaches_to_previous_mark() {
    let gdef = mark_test_gdef();
    let data = build_layout_table(
        tag::LATN,
        &[(tag::MKMK, &[0])],
        &[LookupSpec::new(
            6,
            mark_base_pos(1, &[(11, 0, (2, 2))], &[(10, vec![Some((8, 8))])]),
        )],
    );
    let table = load_gpos(&data).unwrap();
    let mut buffer = buffer_of(&[1, 10, 11]);
    position(&table, Some(&gdef), &mut buffer);

    let positions = buffer.positions();
    assert_eq!(positions[2].x_pos, 8 - 2);
    assert_eq!(positions[2].y_pos, 8 - 2);
    assert_eq!(positions[2].back, 1);
    // the first mark has nothing to attach to
    assert_eq!(positions[1].x_pos, 0);
}

/// Run a ligature substitution first so the buffer carries real ligature
/// ids and component values into mark positioning.
fn ligate(gdef: &GdefTable, glyphs: &[u16]) -> GlyphBuffer {
    let gsub_data = build_layout_table(
        tag::LATN,
        &[(tag::LIGA, &[0])],
        &[LookupSpec::with_flag(
            4,
            0x0008, // ignore marks
            ligature_subst(&[(1, &[(&[2], 30)])]),
        )],
    );
    let gsub_table = load_gsub(&gsub_data).unwrap();
    let mut plan = FeaturePlan::new();
    plan.add_feature(&gsub_table, 0, FEATURE_MASK).unwrap();
    let ctxt = GsubContext {
        gsub: &gsub_table,
        gdef: Some(gdef),
        plan: &plan,
        alternate_select: None,
    };
    let mut buffer = buffer_of(glyphs);
    apply_gsub(&ctxt, &mut buffer).unwrap();
    buffer
}

#[test]
fn mark_to_ligature_uses_component_of_merged_mark() {
    let gdef = mark_test_gdef();
    // mark 5 sits between the components, so it merges into the
    // ligature's trail at component 0
    let mut buffer = ligate(&gdef, &[1, 5, 2]);
    assert_eq!(buffer.glyphs()[0].glyph, 30);
    assert_eq!(buffer.glyphs()[1].glyph, 5);

    let data = build_layout_table(
        tag::LATN,
        &[(tag::MARK, &[0])],
        &[LookupSpec::new(
            5,
            mark_lig_pos(
                1,
                &[(5, 0, (1, 0))],
                &[(30, vec![vec![Some((10, 0))], vec![Some((30, 0))]])],
            ),
        )],
    );
    let table = load_gpos(&data).unwrap();
    position(&table, Some(&gdef), &mut buffer);
    assert_eq!(buffer.positions()[1].x_pos, 10 - 1);
    assert_eq!(buffer.positions()[1].back, 1);
}

#[test]
fn mark_to_ligature_foreign_mark_attaches_to_last_component() {
    let gdef = mark_test_gdef();
    // the mark follows the whole ligature and keeps ligature id 0
    let mut buffer = ligate(&gdef, &[1, 2, 5]);
    assert_eq!(buffer.glyphs()[0].glyph, 30);
    assert_ne!(
        buffer.glyphs()[0].ligature_id,
        buffer.glyphs()[1].ligature_id
    );

    let data = build_layout_table(
        tag::LATN,
        &[(tag::MARK, &[0])],
        &[LookupSpec::new(
            5,
            mark_lig_pos(
                1,
                &[(5, 0, (1, 0))],
                &[(30, vec![vec![Some((10, 0))], vec![Some((30, 0))]])],
            ),
        )],
    );
    let table = load_gpos(&data).unwrap();
    position(&table, Some(&gdef), &mut buffer);
    assert_eq!(buffer.positions()[1].x_pos, 30 - 1);
}

#[test]
fn context_pos_drives_nested_positioning() {
    let data = build_layout_table(
        tag::LATN,
        &[(tag::DIST, &[0])],
        &[
            LookupSpec::new(7, context_format3(&[&[1], &[2]], &[(0, 1)])),
            LookupSpec::new(1, single_pos_format1(&[1], 0x0001, &[25])),
        ],
    );
    let table = load_gpos(&data).unwrap();

    let mut buffer = buffer_of(&[1, 2]);
    let applied = position(&table, None, &mut buffer);
    assert!(applied);
    assert_eq!(buffer.positions()[0].x_pos, 25);

    // the context requires glyph 2 after glyph 1
    let mut buffer = buffer_of(&[1, 3]);
    let applied = position(&table, None, &mut buffer);
    assert!(!applied);
    assert_eq!(buffer.positions()[0].x_pos, 0);
}

#[test]
fn chain_context_pos_checks_backtrack() {
    let data = build_layout_table(
        tag::LATN,
        &[(tag::DIST, &[0])],
        &[
            LookupSpec::new(
                8,
                chain_context_format3(&[&[8]], &[&[1]], &[], &[(0, 1)]),
            ),
            LookupSpec::new(1, single_pos_format1(&[1], 0x0001, &[25])),
        ],
    );
    let table = load_gpos(&data).unwrap();

    let mut buffer = buffer_of(&[8, 1]);
    position(&table, None, &mut buffer);
    assert_eq!(buffer.positions()[1].x_pos, 25);

    let mut buffer = buffer_of(&[9, 1]);
    position(&table, None, &mut buffer);
    assert_eq!(buffer.positions()[1].x_pos, 0);
}

#[test]
fn extension_pos_behaves_like_wrapped_type() {
    let data = build_layout_table(
        tag::LATN,
        &[(tag::KERN, &[0])],
        &[LookupSpec::new(
            9,
            extension_subtable(2, &pair_pos_format1(&[(1, 2, -40)])),
        )],
    );
    let table = load_gpos(&data).unwrap();
    let mut buffer = buffer_of(&[1, 2]);
    position(&table, None, &mut buffer);
    assert_eq!(buffer.positions()[0].x_advance, -40);
}

#[test]
fn empty_plan_positions_nothing() {
    let data = build_layout_table(
        tag::LATN,
        &[(tag::KERN, &[0])],
        &[LookupSpec::new(2, pair_pos_format1(&[(1, 2, -50)]))],
    );
    let table = load_gpos(&data).unwrap();
    let plan = FeaturePlan::new();
    let ctxt = GposContext {
        gpos: &table,
        gdef: None,
        plan: &plan,
        metrics: metrics(),
        contour_point: None,
        metric_value: None,
    };
    let mut buffer = buffer_of(&[1, 2]);
    let applied = apply_gpos(&ctxt, &mut buffer, false, false).unwrap();
    assert!(!applied);
    assert!(buffer.positions().is_empty());
}

#[test]
fn scaling_halves_design_units() {
    let data = build_layout_table(
        tag::LATN,
        &[(tag::KERN, &[0])],
        &[LookupSpec::new(2, pair_pos_format1(&[(1, 2, -50)]))],
    );
    let table = load_gpos(&data).unwrap();
    let plan = plan_for(&table);
    let ctxt = GposContext {
        gpos: &table,
        gdef: None,
        plan: &plan,
        metrics: FontMetrics {
            x_ppem: 12,
            y_ppem: 12,
            x_scale: 0x8000, // 0.5
            y_scale: 0x8000,
        },
        contour_point: None,
        metric_value: None,
    };
    let mut buffer = buffer_of(&[1, 2]);
    apply_gpos(&ctxt, &mut buffer, false, false).unwrap();
    assert_eq!(buffer.positions()[0].x_advance, -25);
}
