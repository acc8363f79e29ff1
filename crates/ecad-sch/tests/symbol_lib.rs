//! Symbol library parsing against real-format fixtures, including the
//! legacy fixups the reader applies on old files.

use ecad_core::Diagnostics;
use ecad_sch::{
    DrawItem, FieldId, LibSymbolMap, PinType, SchError, SchParser, ShapeKind,
};

fn parse_lib(input: &str) -> (LibSymbolMap, Diagnostics) {
    let mut diag = Diagnostics::new();
    let mut map = LibSymbolMap::new();
    {
        let mut parser = SchParser::new(input, "test.kicad_sym", &mut diag);
        parser.parse_library(&mut map).expect("library should parse");
    }
    (map, diag)
}

#[test]
fn overbar_notation_is_normalized_in_old_files() {
    let input = r#"(kicad_symbol_lib (version 20210101) (generator eeschema)
        (symbol "FF"
            (property "Reference" "U" (at 0 0 0))
            (symbol "FF_0_1"
                (pin passive line (at 0 0 0) (length 1)
                    (name "~CLK~" (effects (font (size 1.27 1.27))))
                    (number "1" (effects (font (size 1.27 1.27))))
                )
            )
        )
    )"#;

    let (map, _) = parse_lib(input);
    let ff = map.get("FF").expect("symbol FF");
    let pin = ff.pins().next().expect("one pin");

    assert_eq!(pin.name, "~{CLK}");
    assert_eq!(pin.number, "1");
    assert_eq!(pin.pin_type, PinType::Passive);
}

#[test]
fn modern_overbar_notation_is_untouched() {
    let input = r#"(kicad_symbol_lib (version 20211014) (generator eeschema)
        (symbol "FF"
            (symbol "FF_0_1"
                (pin passive line (at 0 0 0) (length 1)
                    (name "~{CLK}" (effects (font (size 1.27 1.27))))
                    (number "1" (effects (font (size 1.27 1.27))))
                )
            )
        )
    )"#;

    let (map, _) = parse_lib(input);
    assert_eq!(map.get("FF").unwrap().pins().next().unwrap().name, "~{CLK}");
}

#[test]
fn oversized_legacy_arc_is_complemented() {
    // Three points spanning more than half the circle; files at or below
    // 20230121 carry these from buggy format conversions.
    let input = r#"(kicad_symbol_lib (version 20220101) (generator eeschema)
        (symbol "A"
            (symbol "A_0_1"
                (arc (start 1 0) (mid -1 0.001) (end 0 -1)
                    (stroke (width 0.254) (type default))
                    (fill (type none))
                )
            )
        )
    )"#;

    let (map, diag) = parse_lib(input);
    let sym = map.get("A").unwrap();

    let shape = sym
        .draw_items
        .iter()
        .find_map(|i| match i {
            DrawItem::Shape(s) => Some(s),
            _ => None,
        })
        .expect("arc shape");

    let angle = shape.arc_angle().expect("valid arc");
    assert!(angle <= 180.0, "normalized angle {angle} must be <= 180");

    // The ends were swapped by the fixup.
    let ShapeKind::Arc { start, end, .. } = shape.kind else { panic!("not an arc") };
    assert_eq!(start, glam::IVec2::new(0, -10000));
    assert_eq!(end, glam::IVec2::new(10000, 0));

    assert!(diag.warnings().count() > 0, "legacy fixup should be reported");
}

#[test]
fn collinear_arc_is_rejected_but_library_recovers() {
    let input = r#"(kicad_symbol_lib (version 20240101) (generator eeschema)
        (symbol "Bad"
            (symbol "Bad_0_1"
                (arc (start 0 0) (mid 1 1) (end 2 2)
                    (stroke (width 0.254) (type default))
                    (fill (type none))
                )
            )
        )
        (symbol "Good"
            (property "Reference" "R" (at 0 0 0))
        )
    )"#;

    let (map, diag) = parse_lib(input);

    assert!(!map.contains_key("Bad"));
    assert!(map.contains_key("Good"));
    assert!(diag.warnings().count() > 0);
}

#[test]
fn duplicate_user_fields_are_renamed_with_warning() {
    let input = r#"(kicad_symbol_lib (version 20240101) (generator eeschema)
        (symbol "U1"
            (property "MyField" "A" (at 0 0 0))
            (property "MyField" "B" (at 0 0 0))
        )
    )"#;

    let (map, diag) = parse_lib(input);
    let sym = map.get("U1").unwrap();

    assert_eq!(sym.field_by_name("MyField").unwrap().text, "A");
    assert_eq!(sym.field_by_name("MyField_1").unwrap().text, "B");
    assert_eq!(diag.warnings().count(), 1);
}

#[test]
fn ki_fields_become_symbol_attributes() {
    let input = r#"(kicad_symbol_lib (version 20211014) (generator eeschema)
        (symbol "R"
            (property "ki_keywords" "res resistor" (at 0 0 0))
            (property "ki_description" "Resistor" (at 0 0 0))
            (property "ki_fp_filters" "R_* Resistor_*" (at 0 0 0))
            (property "ki_locked" "" (at 0 0 0))
        )
    )"#;

    let (map, _) = parse_lib(input);
    let sym = map.get("R").unwrap();

    assert_eq!(sym.keywords, "res resistor");
    assert_eq!(sym.description, "Resistor");
    assert_eq!(sym.fp_filters, vec!["R_*", "Resistor_*"]);
    assert!(sym.lock_units);
    assert!(sym.field_by_name("ki_keywords").is_none());
}

#[test]
fn derived_symbols_and_units_extend_counts() {
    let input = r#"(kicad_symbol_lib (version 20240101) (generator eeschema)
        (symbol "Base"
            (pin_names (offset 0.254) (hide yes))
            (pin_numbers (hide yes))
            (symbol "Base_1_1"
                (pin input line (at 0 0 0) (length 1)
                    (name "A" (effects (font (size 1.27 1.27))))
                    (number "1" (effects (font (size 1.27 1.27))))
                )
            )
            (symbol "Base_2_1"
                (unit_name "Second")
                (pin input line (at 0 0 180) (length 1)
                    (name "B" (effects (font (size 1.27 1.27))))
                    (number "2" (effects (font (size 1.27 1.27))))
                )
            )
            (symbol "Base_1_2"
                (rectangle (start -1 -1) (end 1 1)
                    (stroke (width 0) (type default)) (fill (type none)))
            )
        )
        (symbol "Derived" (extends "Base")
            (property "Value" "Derived" (at 0 0 0))
        )
    )"#;

    let (map, _) = parse_lib(input);
    let base = map.get("Base").unwrap();

    assert_eq!(base.unit_count, 2);
    assert_eq!(base.body_style_count, 2);
    assert!(!base.show_pin_names);
    assert!(!base.show_pin_numbers);
    assert_eq!(base.pin_name_offset, 2540);
    assert_eq!(base.unit_display_names.get(&2).map(String::as_str), Some("Second"));
    // Pre-20250827 files infer DeMorgan from alternate-body drawings.
    assert!(base.has_demorgan_body_styles);

    let derived = map.get("Derived").unwrap();
    assert_eq!(derived.parent.as_deref(), Some("Base"));
    assert!(!derived.is_derived() || map.get("Base").is_some_and(|p| !p.is_derived()));
}

#[test]
fn bare_hide_keyword_means_hidden() {
    let input = r#"(kicad_symbol_lib (version 20211014) (generator eeschema)
        (symbol "R"
            (pin_names hide)
            (symbol "R_0_1"
                (pin passive line (at 0 0 0) (length 1) hide
                    (name "x" (effects (font (size 1.27 1.27))))
                    (number "1" (effects (font (size 1.27 1.27))))
                )
            )
        )
    )"#;

    let (map, _) = parse_lib(input);
    let sym = map.get("R").unwrap();

    assert!(!sym.show_pin_names);
    assert!(!sym.pins().next().unwrap().visible);
}

#[test]
fn tilde_value_is_empty_only_before_20250318() {
    let old = r#"(kicad_symbol_lib (version 20240101) (generator eeschema)
        (symbol "R" (property "Value" "~" (at 0 0 0)))
    )"#;
    let new = r#"(kicad_symbol_lib (version 20250318) (generator eeschema)
        (generator_version "9.99")
        (symbol "R" (property "Value" "~" (at 0 0 0)))
    )"#;

    let (map, _) = parse_lib(old);
    assert_eq!(map.get("R").unwrap().field(FieldId::Value).unwrap().text, "");

    // 20250318 takes the tilde literally.
    let (map, _) = parse_lib(new);
    assert_eq!(map.get("R").unwrap().field(FieldId::Value).unwrap().text, "~");
}

#[test]
fn future_format_returns_no_symbols() {
    let input = r#"(kicad_symbol_lib (version 99999999) (generator eeschema)
        (generator_version "99.9")
        (symbol "R")
    )"#;

    let mut diag = Diagnostics::new();
    let mut map = LibSymbolMap::new();
    let mut parser = SchParser::new(input, "future.kicad_sym", &mut diag);

    match parser.parse_library(&mut map) {
        Err(SchError::FutureFormat { required, generator }) => {
            assert_eq!(required, 99999999);
            assert_eq!(generator.as_deref(), Some("99.9"));
        }
        other => panic!("expected future-format failure, got {other:?}"),
    }

    assert!(map.is_empty());
}
