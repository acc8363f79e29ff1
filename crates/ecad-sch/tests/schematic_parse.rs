//! End-to-end schematic sheet parsing: items, hierarchy data, groups,
//! legacy fixups and cancellation.

use ecad_core::{Diagnostics, Kiid, NullProgress, ProgressReporter};
use ecad_sch::{
    FieldId, LabelKind, LineLayer, LineStyle, ParseOptions, SchError, SchItemKind, SchParser,
    SymbolLink,
};

fn parse(input: &str) -> (ecad_sch::Document, Diagnostics) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut diag = Diagnostics::new();
    let doc = {
        let mut parser = SchParser::new(input, "test.kicad_sch", &mut diag);
        parser.parse_schematic().expect("schematic should parse")
    };
    (doc, diag)
}

const SMALL_SCHEMATIC: &str = r#"(kicad_sch (version 20250114) (generator eeschema)
    (generator_version "9.0")
    (uuid 11111111-2222-3333-4444-555555555555)
    (paper "A4")
    (title_block (title "Amp") (date "2024-11-02") (rev "B") (company "ACME")
        (comment 1 "first") (comment 2 "second"))
    (lib_symbols
        (symbol "Device:R"
            (property "Reference" "R" (at 0 0 0))
            (property "Value" "R" (at 0 0 0))
            (symbol "R_0_1"
                (pin passive line (at 0 3.81 270) (length 1.27)
                    (name "~" (effects (font (size 1.27 1.27))))
                    (number "1" (effects (font (size 1.27 1.27)))))
                (pin passive line (at 0 -3.81 90) (length 1.27)
                    (name "~" (effects (font (size 1.27 1.27))))
                    (number "2" (effects (font (size 1.27 1.27)))))
            )
        )
    )
    (junction (at 95.25 80.01) (diameter 0) (color 0 0 0 0)
        (uuid aaaaaaaa-0000-0000-0000-000000000001))
    (wire (pts (xy 95.25 80.01) (xy 105.41 80.01))
        (stroke (width 0) (type default))
        (uuid aaaaaaaa-0000-0000-0000-000000000002))
    (label "CLK" (at 99.06 80.01 0)
        (effects (font (size 1.27 1.27)) (justify left bottom))
        (uuid aaaaaaaa-0000-0000-0000-000000000003))
    (global_label "EN" (shape input) (at 120.65 80.01 180)
        (effects (font (size 1.27 1.27)))
        (uuid aaaaaaaa-0000-0000-0000-000000000004)
        (property "Intersheetrefs" "${INTERSHEET_REFS}" (at 0 0 0)
            (effects (font (size 1.27 1.27)) hide)))
    (symbol (lib_id "Device:R") (at 95.25 85.09 0) (unit 1)
        (exclude_from_sim no) (in_bom yes) (on_board yes) (dnp no)
        (uuid aaaaaaaa-0000-0000-0000-000000000005)
        (property "Reference" "R1" (at 97.79 83.82 0))
        (property "Value" "10k" (at 97.79 86.36 0))
        (pin "1" (uuid aaaaaaaa-0000-0000-0000-000000000006))
        (pin "2" (uuid aaaaaaaa-0000-0000-0000-000000000007))
        (instances (project "amp"
            (path "/11111111-2222-3333-4444-555555555555"
                (reference "R1") (unit 1))))
    )
    (symbol (lib_id "Device:C") (at 60.0 60.0 0) (unit 1)
        (uuid aaaaaaaa-0000-0000-0000-000000000008)
        (property "Reference" "C1" (at 0 0 0)))
    (sheet_instances (path "/" (page "1")))
)"#;

#[test]
fn parses_a_small_sheet() {
    let (doc, _) = parse(SMALL_SCHEMATIC);

    assert_eq!(doc.version_at_load, 20250114);
    assert_eq!(doc.uuid.to_string(), "11111111-2222-3333-4444-555555555555");
    assert_eq!(doc.page.paper, "A4");
    assert_eq!(doc.title_block.title, "Amp");
    assert_eq!(doc.title_block.comments.get(&1).map(String::as_str), Some("second"));
    assert_eq!(doc.lib_symbols.len(), 1);

    let kinds: Vec<&'static str> = doc
        .items
        .iter()
        .map(|i| match &i.kind {
            SchItemKind::Junction(_) => "junction",
            SchItemKind::Line(_) => "line",
            SchItemKind::Label(_) => "label",
            SchItemKind::Symbol(_) => "symbol",
            _ => "other",
        })
        .collect();

    assert_eq!(kinds, ["junction", "line", "label", "label", "symbol", "symbol"]);
}

#[test]
fn every_uuid_is_unique() {
    let (doc, _) = parse(SMALL_SCHEMATIC);

    let mut seen = std::collections::HashSet::new();
    for item in &doc.items {
        assert!(seen.insert(item.uuid), "duplicate uuid {}", item.uuid);
    }
}

#[test]
fn missing_library_symbol_is_substituted_with_dummy() {
    let (doc, _) = parse(SMALL_SCHEMATIC);

    let links: Vec<_> = doc
        .items
        .iter()
        .filter_map(|i| match &i.kind {
            SchItemKind::Symbol(s) => Some((s.reference().to_owned(), s.link.clone())),
            _ => None,
        })
        .collect();

    assert_eq!(links[0].0, "R1");
    assert_eq!(links[0].1, SymbolLink::Resolved("Device:R".to_owned()));
    assert_eq!(links[1].0, "C1");
    assert_eq!(links[1].1, SymbolLink::Dummy);
    assert!(doc.lib_symbols.contains_key(""), "dummy sentinel registered");
}

#[test]
fn every_symbol_pin_maps_to_a_library_pin() {
    let (doc, _) = parse(SMALL_SCHEMATIC);

    let symbol = doc
        .items
        .iter()
        .find_map(|i| match &i.kind {
            SchItemKind::Symbol(s) if s.reference() == "R1" => Some(s),
            _ => None,
        })
        .unwrap();

    let lib = &doc.lib_symbols["Device:R"];

    for pin in &symbol.pins {
        assert!(
            lib.pin_by_number(&pin.number, symbol.unit).is_some(),
            "instance pin {} has no library pin",
            pin.number
        );
    }
}

#[test]
fn junction_diameter_zero_means_default() {
    let (doc, _) = parse(SMALL_SCHEMATIC);

    let junction = doc
        .items
        .iter()
        .find_map(|i| match &i.kind {
            SchItemKind::Junction(j) => Some(j),
            _ => None,
        })
        .unwrap();

    assert_eq!(junction.diameter, 0);
}

#[test]
fn global_label_has_intersheet_refs_field() {
    let (doc, _) = parse(SMALL_SCHEMATIC);

    let global = doc
        .items
        .iter()
        .find_map(|i| match &i.kind {
            SchItemKind::Label(l) if l.kind == LabelKind::Global => Some(l),
            _ => None,
        })
        .unwrap();

    let refs = global.field(FieldId::IntersheetRefs).expect("intersheet refs field");
    assert_eq!(refs.text, "${INTERSHEET_REFS}");
    assert!(!refs.effects.visible);
}

#[test]
fn legacy_polyline_default_style_becomes_dash() {
    let input = r#"(kicad_sch (version 20211123) (generator eeschema)
        (polyline (pts (xy 0 0) (xy 10 0) (xy 10 10))
            (stroke (width 0) (type default))
            (uuid aaaaaaaa-0000-0000-0000-00000000000a))
    )"#;

    let (doc, _) = parse(input);

    let shape = doc
        .items
        .iter()
        .find_map(|i| match &i.kind {
            SchItemKind::Shape(s) => Some(s),
            _ => None,
        })
        .unwrap();

    assert_eq!(shape.stroke.style, LineStyle::Dash);
}

#[test]
fn two_point_polyline_demotes_to_a_line() {
    let input = r#"(kicad_sch (version 20250114) (generator eeschema)
        (generator_version "9.0")
        (polyline (pts (xy 0 0) (xy 10 0))
            (stroke (width 0) (type default))
            (uuid aaaaaaaa-0000-0000-0000-00000000000b))
    )"#;

    let (doc, _) = parse(input);

    let line = doc
        .items
        .iter()
        .find_map(|i| match &i.kind {
            SchItemKind::Line(l) => Some(l),
            _ => None,
        })
        .unwrap();

    assert_eq!(line.layer, LineLayer::Notes);
    assert_eq!(line.end, glam::IVec2::new(100000, 0));
}

#[test]
fn legacy_sheet_fields_get_positional_ids() {
    let input = r#"(kicad_sch (version 20200310) (generator eeschema)
        (sheet (at 50 50) (size 20 15)
            (stroke (width 0) (type default))
            (fill (type none))
            (uuid aaaaaaaa-0000-0000-0000-00000000000c)
            (property "Irrelevant Name" "Sub Sheet" (at 0 0 0))
            (property "Another Name" "sub.kicad_sch" (at 0 0 0))
        )
    )"#;

    let (doc, _) = parse(input);

    let sheet = doc
        .items
        .iter()
        .find_map(|i| match &i.kind {
            SchItemKind::Sheet(s) => Some(s),
            _ => None,
        })
        .unwrap();

    assert_eq!(sheet.name(), "Sub Sheet");
    assert_eq!(sheet.file_name(), "sub.kicad_sch");
}

#[test]
fn legacy_root_sheet_instance_paths_get_root_prefix() {
    // Version < 20221002: root-relative paths must be prefixed with the
    // root UUID.
    let input = r#"(kicad_sch (version 20210406) (generator eeschema)
        (uuid 99999999-8888-7777-6666-555555555555)
        (sheet_instances (path "/" (page "1")))
    )"#;

    let (doc, _) = parse(input);

    assert_eq!(doc.sheet_instances.len(), 1);
    assert_eq!(
        doc.sheet_instances[0].path.0,
        vec!["99999999-8888-7777-6666-555555555555".parse::<Kiid>().unwrap()]
    );
    assert_eq!(doc.sheet_instances[0].page_number, "1");
}

#[test]
fn pre_uuid_files_get_deterministic_root_uuid() {
    let input = r#"(kicad_sch (version 20200310) (generator eeschema))"#;

    let mut diag = Diagnostics::new();
    let doc_a = SchParser::new(input, "same.kicad_sch", &mut diag)
        .parse_schematic()
        .unwrap();
    let doc_b = SchParser::new(input, "same.kicad_sch", &mut diag)
        .parse_schematic()
        .unwrap();
    let doc_c = SchParser::new(input, "other.kicad_sch", &mut diag)
        .parse_schematic()
        .unwrap();

    assert!(!doc_a.uuid.is_nil());
    assert_eq!(doc_a.uuid, doc_b.uuid, "repeated reads must agree");
    assert_ne!(doc_a.uuid, doc_c.uuid, "distinct screens must differ");
}

#[test]
fn stray_eof_aborts_unless_copyable() {
    let fragment = r#"(junction (at 0 0) (diameter 0)
        (uuid aaaaaaaa-0000-0000-0000-00000000000d))"#;

    // Copyable-fragment mode: EOF terminates cleanly.
    let mut diag = Diagnostics::new();
    let doc = SchParser::new(fragment, "clipboard", &mut diag)
        .with_options(ParseOptions { copyable_only: true, ..Default::default() })
        .parse_schematic()
        .unwrap();
    assert_eq!(doc.items.len(), 1);

    // A full file that just stops is a parse error.
    let truncated = r#"(kicad_sch (version 20250114) (generator eeschema)
        (generator_version "9.0")
        (junction (at 0 0) (diameter 0))"#;

    let mut diag = Diagnostics::new();
    let err = SchParser::new(truncated, "test.kicad_sch", &mut diag)
        .parse_schematic()
        .unwrap_err();
    assert!(matches!(err, SchError::Parse(_)), "got {err:?}");
}

#[test]
fn documents_serialize_to_json() {
    let (doc, _) = parse(SMALL_SCHEMATIC);

    let json = serde_json::to_value(&doc).expect("document serializes");
    assert_eq!(json["page"]["paper"], "A4");
    assert_eq!(json["title_block"]["title"], "Amp");
    assert!(json["items"].as_array().is_some_and(|items| items.len() == 6));
}

#[test]
fn cancellation_aborts_with_no_document() {
    struct CancelImmediately;

    impl ProgressReporter for CancelImmediately {
        fn report_progress(&mut self, _c: u64, _t: u64) {}
        fn should_cancel(&self) -> bool {
            true
        }
    }

    // Enough lines to pass the 500-line checkpoint threshold.
    let mut input = String::from(
        "(kicad_sch (version 20250114) (generator eeschema)\n(generator_version \"9.0\")\n",
    );
    for i in 0..600 {
        input.push_str(&format!("(no_connect (at {i} 0))\n"));
    }
    input.push(')');

    let mut diag = Diagnostics::new();
    let mut cancel = CancelImmediately;
    let err = SchParser::new(&input, "big.kicad_sch", &mut diag)
        .with_progress(&mut cancel)
        .parse_schematic()
        .unwrap_err();

    assert!(matches!(err, SchError::Canceled));
}

#[test]
fn progress_is_reported_during_long_parses() {
    struct CountProgress(u32);

    impl ProgressReporter for CountProgress {
        fn report_progress(&mut self, _c: u64, _t: u64) {
            self.0 += 1;
        }
    }

    let mut input = String::from("(kicad_sch (version 20250114) (generator eeschema)\n");
    for i in 0..1200 {
        input.push_str(&format!("(no_connect (at {i} 0))\n"));
    }
    input.push(')');

    let mut diag = Diagnostics::new();
    let mut counter = CountProgress(0);
    SchParser::new(&input, "big.kicad_sch", &mut diag)
        .with_progress(&mut counter)
        .parse_schematic()
        .unwrap();

    assert!(counter.0 >= 2, "expected periodic progress, got {}", counter.0);

    // The null reporter is always safe to pass.
    let mut diag = Diagnostics::new();
    let mut null = NullProgress;
    SchParser::new(SMALL_SCHEMATIC, "test.kicad_sch", &mut diag)
        .with_progress(&mut null)
        .parse_schematic()
        .unwrap();
}
