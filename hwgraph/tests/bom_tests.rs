//! Bill of materials aggregation over real fixtures

use hwgraph::bom::{BomPart, BomSource};
use hwgraph::{parse_pcb, parse_schematic, render, to_bom, BomRecord, Projection};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_divider_bom() {
    let model = parse_schematic(&fixture_path("divider.kicad_sch")).unwrap();
    let bom = to_bom(&model);

    assert_eq!(bom.len(), 2);
    assert_eq!(bom.entries[0].value, "100nF");
    assert_eq!(bom.entries[0].footprint, "Capacitor_SMD:C_0603_1608Metric");
    assert_eq!(bom.entries[0].references, vec!["C1"]);

    let resistors = &bom.entries[1];
    assert_eq!(resistors.value, "10k");
    assert_eq!(resistors.references, vec!["R1", "R2", "R10"]);
    assert_eq!(resistors.quantity, 3);

    // R3 is in_bom no, power symbols never count
    assert!(bom.references().all(|r| r != "R3" && !r.starts_with('#')));
}

#[test]
fn test_divider_bom_csv() {
    let model = parse_schematic(&fixture_path("divider.kicad_sch")).unwrap();
    let csv = to_bom(&model).to_csv().unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(
        lines,
        vec![
            "Item,Quantity,References,Value,Footprint",
            "1,1,C1,100nF,Capacitor_SMD:C_0603_1608Metric",
            "2,3,\"R1, R2, R10\",10k,Resistor_SMD:R_0603_1608Metric",
        ]
    );
    assert_eq!(render(&model, Projection::Bom).unwrap(), csv);
}

#[test]
fn test_board_bom_skips_excluded_footprints() {
    let model = parse_pcb(&fixture_path("board.kicad_pcb")).unwrap();
    let bom = to_bom(&model);

    let values: Vec<&str> = bom.entries.iter().map(|e| e.value.as_str()).collect();
    assert_eq!(values, vec!["100nF", "10k", "Conn_01x03"]);
    assert!(bom.references().all(|r| r != "H1"));
    assert_eq!(
        bom.entries[2].footprint,
        "Connector_PinHeader_2.54mm:PinHeader_1x03_P2.54mm_Vertical"
    );
}

#[test]
fn test_quantity_matches_eligible_parts() {
    let schematic = parse_schematic(&fixture_path("divider.kicad_sch")).unwrap();
    let eligible = schematic
        .schematic
        .symbols
        .iter()
        .filter(|s| s.in_bom && !s.power)
        .count();
    assert_eq!(to_bom(&schematic).total_quantity(), eligible);

    let board = parse_pcb(&fixture_path("board.kicad_pcb")).unwrap();
    assert_eq!(to_bom(&board).total_quantity(), board.bom_parts().len());
    assert_eq!(board.bom_parts().len(), 3);
}

#[test]
fn test_duplicate_references_collapse() {
    // Two units of one multi-unit part share a reference
    let parts = [
        BomPart { reference: "U1", value: "LM358", footprint: "SOIC-8", library: "Amplifier:LM358" },
        BomPart { reference: "U1", value: "LM358", footprint: "SOIC-8", library: "Amplifier:LM358" },
        BomPart { reference: "U2", value: "LM358", footprint: "SOIC-8", library: "Amplifier:LM358" },
    ];
    let bom = BomRecord::from_parts(parts);
    assert_eq!(bom.len(), 1);
    assert_eq!(bom.entries[0].references, vec!["U1", "U2"]);
    assert_eq!(bom.entries[0].quantity, 2);
}

#[test]
fn test_markdown_table() {
    let model = parse_schematic(&fixture_path("divider.kicad_sch")).unwrap();
    let md = to_bom(&model).to_markdown();
    let lines: Vec<&str> = md.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[3], "| 2 | 3 | R1, R2, R10 | 10k | Resistor_SMD:R_0603_1608Metric |");
}
