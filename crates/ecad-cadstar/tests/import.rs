//! End-to-end archive imports against hand-built archives: stackup
//! balancing, zone priorities, pad slot recovery, via classification and
//! the design-extents gate.

use ecad_board::{
    Board, DrillShape, Layer, PadShape, StackupLayer, TrackItem, ViaType, ZoneFillMode,
};
use ecad_cadstar::archive::*;
use ecad_cadstar::{CadstarPcbLoader, ImportError};
use ecad_core::Diagnostics;
use glam::I64Vec2;

/// Archive skeleton: 1 unit = 1 micron, a sane design area, and empty
/// collections everywhere.
fn base_archive() -> Archive {
    let mut archive = Archive::default();
    archive.assignments.technology = Technology {
        units_per_mm: 1000,
        design_limit: I64Vec2::new(500_000, 500_000),
        design_area: (I64Vec2::new(0, 0), I64Vec2::new(200_000, 200_000)),
        max_physical_layer: 2,
        min_route_width: 200,
    };
    archive
}

fn add_copper_layer(archive: &mut Archive, id: &str, name: &str, physical: u32, kind: LayerKind) {
    let layer_id = LayerId::new(id);
    archive.assignments.layerdefs.layer_stack.push(layer_id.clone());
    archive.assignments.layerdefs.layers.insert(
        layer_id.clone(),
        CadstarLayer {
            id: layer_id,
            name: name.to_owned(),
            kind,
            subtype: LayerSubtype::None,
            physical_layer: physical,
            thickness: 35,
            material: None,
            embedding: Embedding::None,
        },
    );
}

fn add_construction_layer(archive: &mut Archive, id: &str, name: &str, thickness: i64) {
    let layer_id = LayerId::new(id);
    archive.assignments.layerdefs.layer_stack.push(layer_id.clone());
    archive.assignments.layerdefs.layers.insert(
        layer_id.clone(),
        CadstarLayer {
            id: layer_id,
            name: name.to_owned(),
            kind: LayerKind::Construction,
            subtype: LayerSubtype::None,
            physical_layer: 0,
            thickness,
            material: None,
            embedding: Embedding::None,
        },
    );
}

fn two_layer_stack(archive: &mut Archive) {
    add_copper_layer(archive, "L1", "Top", 1, LayerKind::Elec);
    add_construction_layer(archive, "D1", "Core", 1500);
    add_copper_layer(archive, "L2", "Bottom", 2, LayerKind::Elec);
}

fn square_shape(x0: i64, y0: i64, x1: i64, y1: i64, fill: ShapeFill) -> CadstarShape {
    CadstarShape {
        fill,
        vertices: vec![
            CadstarVertex::point(I64Vec2::new(x0, y0)),
            CadstarVertex::point(I64Vec2::new(x1, y0)),
            CadstarVertex::point(I64Vec2::new(x1, y1)),
            CadstarVertex::point(I64Vec2::new(x0, y1)),
            CadstarVertex::point(I64Vec2::new(x0, y0)),
        ],
        cutouts: Vec::new(),
        hatch_code: None,
    }
}

fn import(archive: Archive) -> (Board, Diagnostics) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut board = Board::new();
    let mut diag = Diagnostics::new();
    {
        let mut loader = CadstarPcbLoader::new(archive, &mut diag);
        loader.load(&mut board).expect("import should succeed");
    }
    (board, diag)
}

#[test]
fn odd_stackup_is_padded_with_a_zero_thickness_dummy() {
    // Cu, Pre, Cu, Pre, Cu: three copper layers, each prepreg below a
    // copper layer.
    let mut archive = base_archive();
    archive.assignments.technology.max_physical_layer = 3;
    add_copper_layer(&mut archive, "L1", "Top", 1, LayerKind::Elec);
    add_construction_layer(&mut archive, "D1", "Pre1", 1000);
    add_copper_layer(&mut archive, "L2", "Mid", 2, LayerKind::Elec);
    add_construction_layer(&mut archive, "D2", "Pre2", 1000);
    add_copper_layer(&mut archive, "L3", "Bottom", 3, LayerKind::Elec);

    let (board, _) = import(archive);

    // Copper count is even: the odd stack was padded.
    assert_eq!(board.copper_layer_count, 4);
    assert_eq!(board.stackup.copper_count(), 4);
    assert!(board.stackup.is_balanced());

    let coppers: Vec<_> = board.stackup.copper_layers().collect();

    // The dummy is the inserted third copper entry and has zero thickness.
    let StackupLayer::Copper { thickness, layer, .. } = coppers[2] else {
        panic!("expected copper");
    };
    assert_eq!(*thickness, 0);
    assert_eq!(*layer, Layer::In(2));

    let StackupLayer::Copper { thickness, name, .. } = coppers[3] else {
        panic!("expected copper");
    };
    assert!(*thickness > 0);
    assert_eq!(name, "Bottom");

    // The trailing dielectric was split evenly around the dummy.
    let dielectric_thicknesses: Vec<i64> = board
        .stackup
        .layers
        .iter()
        .filter_map(|l| match l {
            StackupLayer::Dielectric { sublayers, .. } => {
                Some(sublayers.iter().map(|s| i64::from(s.thickness)).sum())
            }
            _ => None,
        })
        .collect();

    assert_eq!(dielectric_thicknesses.len(), 3);
    // Pre1 complete, then the two halves of Pre2.
    assert_eq!(dielectric_thicknesses[0], 1_000_000);
    assert_eq!(dielectric_thicknesses[1], 500_000);
    assert_eq!(dielectric_thicknesses[2], 500_000);
}

#[test]
fn embedding_direction_selects_core_or_prepreg() {
    let mut archive = base_archive();
    two_layer_stack(&mut archive);

    // Top embeds downward (Above = toward the dielectric below it) and
    // bottom embeds upward: the dielectric between them is a core.
    archive.assignments.layerdefs.layers.get_mut(&LayerId::new("L1")).unwrap().embedding =
        Embedding::Above;
    archive.assignments.layerdefs.layers.get_mut(&LayerId::new("L2")).unwrap().embedding =
        Embedding::Below;

    let (board, _) = import(archive);

    let forms: Vec<_> = board
        .stackup
        .layers
        .iter()
        .filter_map(|l| match l {
            StackupLayer::Dielectric { form, .. } => Some(*form),
            _ => None,
        })
        .collect();

    assert_eq!(forms, vec![ecad_board::DielectricForm::Core]);
}

#[test]
fn overlapping_zone_priorities_follow_fill_over_outline_area() {
    let mut archive = base_archive();
    two_layer_stack(&mut archive);

    let layer = LayerId::new("L1");

    // T1: 100x100 mm outline; T2: 100x100 mm shifted right by 50 mm.
    let t1 = TemplateId::new("T1");
    let t2 = TemplateId::new("T2");

    let pouring = Pouring {
        relief_copper_code: CopperCodeId::new("CC1"),
        ..Default::default()
    };

    archive.layout.templates.insert(
        t1.clone(),
        Template {
            id: t1.clone(),
            name: "T1".to_owned(),
            layer: layer.clone(),
            net: None,
            shape: square_shape(0, 0, 100_000, 100_000, ShapeFill::Solid),
            pouring: pouring.clone(),
        },
    );
    archive.layout.templates.insert(
        t2.clone(),
        Template {
            id: t2.clone(),
            name: "T2".to_owned(),
            layer: layer.clone(),
            net: None,
            shape: square_shape(50_000, 0, 150_000, 100_000, ShapeFill::Solid),
            pouring,
        },
    );

    archive
        .assignments
        .codedefs
        .copper_codes
        .insert(CopperCodeId::new("CC1"), CopperCode {
            id: CopperCodeId::new("CC1"),
            name: "CC1".to_owned(),
            copper_width: 0,
        });

    // T1's poured copper covers its whole outline, so its fill overlaps
    // half of T2's outline. T2's poured copper is a sliver that stays clear
    // of T1 entirely.
    archive.layout.coppers.insert(
        CopperId::new("C1"),
        Copper {
            id: CopperId::new("C1"),
            layer: layer.clone(),
            copper_code: CopperCodeId::new("CC1"),
            shape: square_shape(0, 0, 100_000, 100_000, ShapeFill::Solid),
            net: None,
            poured_template: Some(t1.clone()),
        },
    );
    archive.layout.coppers.insert(
        CopperId::new("C2"),
        Copper {
            id: CopperId::new("C2"),
            layer,
            copper_code: CopperCodeId::new("CC1"),
            shape: square_shape(140_000, 0, 150_000, 20_000, ShapeFill::Solid),
            net: None,
            poured_template: Some(t2.clone()),
        },
    );

    let (board, _) = import(archive);

    let priority_of = |name: &str| {
        board
            .zones
            .iter()
            .find(|z| z.name == name)
            .map(|z| z.priority)
            .expect("zone present")
    };

    let p1 = priority_of("T1");
    let p2 = priority_of("T2");

    assert!(p1 >= 1 && p2 >= 1, "template priorities start at 1");
    assert!(
        p1 > p2,
        "the zone whose fill covers more of the other's outline fills first \
         (T1={p1}, T2={p2})"
    );
}

fn slotted_pad_archive(drill_x_offset: i64) -> Archive {
    let mut archive = base_archive();
    two_layer_stack(&mut archive);

    archive.assignments.codedefs.pad_codes.insert(
        PadCodeId::new("P1"),
        PadCode {
            id: PadCodeId::new("P1"),
            name: "Slotted".to_owned(),
            shape: PadShapeDef {
                kind: PadShapeKind::Circle,
                size: 2_000, // 2 mm
                left_length: 0,
                right_length: 0,
                internal_feature: 0,
                orient_angle: 0,
            },
            drill_diameter: Some(500),
            drill_x_offset,
            drill_y_offset: 0,
            slot_length: Some(700),
            slot_orientation: 45_000,
            plated: true,
            relief_clearance: None,
            relief_width: None,
        },
    );

    let symdef_id = SymdefId::new("S1");
    let mut symdef = SymdefPcb {
        id: symdef_id.clone(),
        reference_name: "CONN".to_owned(),
        ..Default::default()
    };
    symdef.component_pads.insert(1, ComponentPad {
        id: 1,
        identifier: Some("A1".to_owned()),
        pad_code: PadCodeId::new("P1"),
        position: I64Vec2::new(100_000, 100_000),
        orient_angle: 0,
        side: PadSide::ThroughHole,
    });
    archive.library.component_definitions.insert(symdef_id.clone(), symdef);

    archive.layout.components.insert(
        ComponentId::new("CMP1"),
        Component {
            id: ComponentId::new("CMP1"),
            name: "J1".to_owned(),
            symdef: symdef_id,
            part: None,
            origin: I64Vec2::new(100_000, 100_000),
            orient_angle: 0,
            mirror: false,
            variant_id: None,
            variant_parent: None,
            pad_exceptions: Default::default(),
            attributes: Vec::new(),
            text_locations: Vec::new(),
        },
    );

    archive
}

#[test]
fn rotated_slot_inside_pad_becomes_a_custom_pad() {
    let (board, _) = import(slotted_pad_archive(0));

    let pad = &board.footprints[0].pads[0];

    assert!(matches!(pad.shape, PadShape::Custom { .. }), "expected custom pad");
    assert!(!pad.slot_recentred);
    assert_eq!(pad.drill.unwrap().shape, DrillShape::Oblong);
    // Oblong drill length = slot length + drill diameter.
    assert_eq!(pad.drill.unwrap().size.x, 1_200_000);
}

#[test]
fn slot_outside_pad_is_recentred_and_flagged() {
    // A drill offset of 10 mm pushes the hole far outside the 2 mm pad.
    let (board, diag) = import(slotted_pad_archive(10_000));

    let pad = &board.footprints[0].pads[0];

    assert!(pad.slot_recentred, "recovered pad must carry a user-visible flag");
    assert!(!matches!(pad.shape, PadShape::Custom { .. }));
    assert!(
        diag.warnings().any(|w| w.text.contains("hole shape outside")),
        "recovery must be reported"
    );
}

#[test]
fn via_type_derives_from_layer_pair_depth() {
    let mut archive = base_archive();
    archive.assignments.technology.max_physical_layer = 4;
    add_copper_layer(&mut archive, "L1", "Top", 1, LayerKind::Elec);
    add_construction_layer(&mut archive, "D1", "Pre1", 500);
    add_copper_layer(&mut archive, "L2", "In1", 2, LayerKind::Elec);
    add_construction_layer(&mut archive, "D2", "Core", 1000);
    add_copper_layer(&mut archive, "L3", "In2", 3, LayerKind::Elec);
    add_construction_layer(&mut archive, "D3", "Pre2", 500);
    add_copper_layer(&mut archive, "L4", "Bottom", 4, LayerKind::Elec);

    archive.assignments.codedefs.via_codes.insert(
        ViaCodeId::new("V1"),
        ViaCode {
            id: ViaCodeId::new("V1"),
            name: "Via".to_owned(),
            shape: PadShapeDef::circle(600),
            drill_diameter: 300,
        },
    );

    for (id, start, end) in [("LP1", 1u32, 4u32), ("LP2", 2, 3), ("LP3", 1, 2)] {
        archive.assignments.codedefs.layer_pairs.insert(
            LayerPairId::new(id),
            LayerPair {
                id: LayerPairId::new(id),
                name: id.to_owned(),
                physical_layer_start: start,
                physical_layer_end: end,
            },
        );
    }

    let mut net = Net {
        id: NetId::new("N1"),
        name: Some("GND".to_owned()),
        signal_num: 1,
        route_code: RouteCodeId::new("RC1"),
        netclass: None,
        spacing_class: None,
        pins: Default::default(),
        vias: Default::default(),
        connections: Vec::new(),
    };

    for (n, pair) in [("E1", "LP1"), ("E2", "LP2"), ("E3", "LP3")] {
        net.vias.insert(NetElementId::new(n), NetVia {
            via_code: ViaCodeId::new("V1"),
            layer_pair: LayerPairId::new(pair),
            location: I64Vec2::new(10_000, 10_000),
            fixed: false,
        });
    }

    archive.layout.nets.insert(NetId::new("N1"), net);

    let (board, _) = import(archive);

    let mut via_types: Vec<ViaType> = board
        .tracks
        .iter()
        .filter_map(|t| match t {
            TrackItem::Via(v) => Some(v.via_type),
            _ => None,
        })
        .collect();
    via_types.sort_by_key(|t| match t {
        ViaType::Through => 0,
        ViaType::BlindBuried => 1,
        ViaType::Micro => 2,
    });

    assert_eq!(via_types, vec![ViaType::Through, ViaType::BlindBuried, ViaType::Micro]);

    // All vias carry the net.
    assert!(board
        .tracks
        .iter()
        .all(|t| !matches!(t, TrackItem::Via(v)) || matches!(t, TrackItem::Via(v) if v.net.is_some())));

    assert_eq!(board.net_by_name("GND").map(|n| n.code.0), Some(1));
}

#[test]
fn oversized_designs_are_rejected() {
    let mut archive = base_archive();
    two_layer_stack(&mut archive);
    // 10^13 microns is far beyond what fits in an i32 of nanometres.
    archive.assignments.technology.design_limit = I64Vec2::new(10_000_000_000_000, 1);

    let mut board = Board::new();
    let mut diag = Diagnostics::new();
    let mut loader = CadstarPcbLoader::new(archive, &mut diag);

    match loader.load(&mut board) {
        Err(ImportError::DesignTooLarge { width_mm, .. }) => {
            assert!(width_mm > 2_000.0);
        }
        other => panic!("expected DesignTooLarge, got {other:?}"),
    }
}

#[test]
fn power_plane_layer_gets_an_implicit_zone_at_priority_zero() {
    let mut archive = base_archive();
    add_copper_layer(&mut archive, "L1", "Top", 1, LayerKind::Elec);
    add_construction_layer(&mut archive, "D1", "Core", 1500);
    add_copper_layer(&mut archive, "PWR", "VCC", 2, LayerKind::Power);

    // A board outline for the implicit zone to span, and the matching net.
    archive.assignments.codedefs.line_codes.insert(
        LineCodeId::new("LC1"),
        LineCode { id: LineCodeId::new("LC1"), name: "Line".to_owned(), width: 100 },
    );
    archive.layout.boards.insert(
        BoardId::new("B1"),
        BoardOutline {
            id: BoardId::new("B1"),
            line_code: LineCodeId::new("LC1"),
            shape: square_shape(0, 0, 200_000, 200_000, ShapeFill::Outline),
            group: None,
        },
    );
    archive.layout.nets.insert(
        NetId::new("N1"),
        Net {
            id: NetId::new("N1"),
            name: Some("VCC".to_owned()),
            signal_num: 1,
            route_code: RouteCodeId::new("RC1"),
            netclass: None,
            spacing_class: None,
            pins: Default::default(),
            vias: Default::default(),
            connections: Vec::new(),
        },
    );

    let (board, _) = import(archive);

    let zone = board.zones.iter().find(|z| z.name == "VCC").expect("implicit power zone");
    assert_eq!(zone.priority, 0);
    assert!(matches!(zone.fill_mode, ZoneFillMode::Solid));
    assert_eq!(board.net(zone.net.unwrap()).unwrap().name, "VCC");
    assert!(zone.layers.contains(Layer::BCu));

    // Edge cuts created for the board outline.
    assert!(board.shapes.iter().any(|s| s.layer == Layer::EdgeCuts));
}

#[test]
fn unknown_pad_index_in_net_is_reported_and_skipped() {
    let mut archive = slotted_pad_archive(0);

    let mut net = Net {
        id: NetId::new("N1"),
        name: Some("SIG".to_owned()),
        signal_num: 7,
        route_code: RouteCodeId::new("RC1"),
        netclass: None,
        spacing_class: None,
        pins: Default::default(),
        vias: Default::default(),
        connections: Vec::new(),
    };

    net.pins.insert(
        NetElementId::new("P1"),
        NetPin { component: ComponentId::new("CMP1"), pad_id: 1 },
    );
    net.pins.insert(
        NetElementId::new("P2"),
        NetPin { component: ComponentId::new("CMP1"), pad_id: 99 },
    );
    net.pins.insert(
        NetElementId::new("P3"),
        NetPin { component: ComponentId::new("MISSING"), pad_id: 1 },
    );

    archive.layout.nets.insert(NetId::new("N1"), net);

    let (board, diag) = import(archive);

    // The valid pin is bound; the two broken references warn and skip.
    let pad = &board.footprints[0].pads[0];
    assert!(pad.net.is_some());

    let warnings: Vec<String> = diag.warnings().map(|w| w.text.clone()).collect();
    assert!(warnings.iter().any(|w| w.contains("non-existent pad index")));
    assert!(warnings.iter().any(|w| w.contains("does not exist")));
}
