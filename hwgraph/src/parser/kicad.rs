//! KiCAD Schematic Parser
//!
//! Extracts symbols, pins, wires, labels, junctions and hierarchical sheets
//! from KiCad schematic files (.kicad_sch).
//!
//! Key format details:
//! - All values are in millimeters
//! - Properties: (property "KEY" "VALUE")
//! - Position: (at X Y [ANGLE])
//! - Points: (pts (xy X Y) ...)
//! - Pin geometry lives in the embedded `lib_symbols` table, in library
//!   coordinates (Y up). Sub-symbols are named `NAME_UNIT_STYLE`; unit 0
//!   holds pins shared by every unit.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::parser::diagnostics::{Extraction, ExtractionError};
use crate::parser::fields;
use crate::parser::schema::*;
use crate::parser::sexp::{NodeRef, ParseError, SExpTree};

#[derive(Debug, Error)]
pub enum KicadParseError {
    #[error("S-expression parse error: {0}")]
    SExpParse(#[from] ParseError),
    #[error("Invalid schematic format: {0}")]
    InvalidFormat(String),
}

/// Top-level items of a schematic file the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchematicItem {
    LibSymbols,
    Symbol,
    Wire,
    Label(LabelKind),
    Junction,
    Sheet,
    Unknown,
}

impl SchematicItem {
    fn from_head(head: &str) -> Self {
        match head {
            "lib_symbols" => SchematicItem::LibSymbols,
            "symbol" => SchematicItem::Symbol,
            "wire" => SchematicItem::Wire,
            "label" => SchematicItem::Label(LabelKind::Local),
            "global_label" => SchematicItem::Label(LabelKind::Global),
            "hierarchical_label" => SchematicItem::Label(LabelKind::Hierarchical),
            "junction" => SchematicItem::Junction,
            "sheet" => SchematicItem::Sheet,
            _ => SchematicItem::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
struct LibPin {
    unit: u32,
    body_style: u32,
    number: String,
    name: String,
    electrical_type: String,
    position: Position,
}

#[derive(Debug, Clone, Default)]
struct LibSymbol {
    power: bool,
    extends: Option<String>,
    pins: Vec<LibPin>,
}

/// The file's embedded symbol library, keyed by library id.
#[derive(Debug, Default)]
struct Library {
    symbols: HashMap<String, LibSymbol>,
}

impl Library {
    /// Read every library symbol. A malformed pin is reported and left
    /// out; the rest of its symbol and the other symbols are kept.
    fn from_node(node: NodeRef<'_>, errors: &mut Vec<ExtractionError>) -> Self {
        let mut symbols = HashMap::new();
        for sym in node.get_all("symbol") {
            let Some(name) = sym.arg(0) else { continue };
            let mut lib = LibSymbol {
                // `(power)` in KiCad 6-8, `(power global|local)` from 9 on
                power: sym.get("power").is_some(),
                extends: sym.value("extends").map(str::to_string),
                pins: Vec::new(),
            };
            Self::collect_pins(sym, 0, 0, &mut lib.pins, errors);
            for unit in sym.get_all("symbol") {
                let (unit_no, style) = unit.arg(0).and_then(unit_suffix).unwrap_or((0, 0));
                Self::collect_pins(unit, unit_no, style, &mut lib.pins, errors);
            }
            symbols.insert(name.to_string(), lib);
        }
        Self { symbols }
    }

    fn collect_pins(
        node: NodeRef<'_>,
        unit: u32,
        body_style: u32,
        pins: &mut Vec<LibPin>,
        errors: &mut Vec<ExtractionError>,
    ) {
        for pin in node.get_all("pin") {
            match Self::lib_pin(pin, unit, body_style) {
                Ok(lib_pin) => pins.push(lib_pin),
                Err(e) => errors.push(e),
            }
        }
    }

    fn lib_pin(pin: NodeRef<'_>, unit: u32, body_style: u32) -> Result<LibPin, ExtractionError> {
        let number = pin
            .value("number")
            .ok_or_else(|| fields::missing(pin, "number", None))?;
        let (position, _) = fields::at(pin, None)?;
        Ok(LibPin {
            unit,
            body_style,
            number: number.to_string(),
            name: pin.value("name").unwrap_or_default().to_string(),
            electrical_type: pin.arg(0).unwrap_or("unspecified").to_string(),
            position,
        })
    }

    /// Look up a symbol, following `extends` to the parent for derived
    /// symbols that carry no pins of their own.
    fn lookup(&self, id: &str) -> Option<(&LibSymbol, &[LibPin])> {
        let symbol = self.symbols.get(id)?;
        let mut current = symbol;
        for _ in 0..self.symbols.len() {
            if !current.pins.is_empty() {
                break;
            }
            match current.extends.as_deref().and_then(|p| self.symbols.get(p)) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Some((symbol, &current.pins))
    }
}

/// `R_1_1` -> (unit 1, style 1)
fn unit_suffix(name: &str) -> Option<(u32, u32)> {
    let mut parts = name.rsplitn(3, '_');
    let style = parts.next()?.parse().ok()?;
    let unit = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((unit, style))
}

/// Parser for KiCAD schematic files (KiCad 6 and later S-expression format)
pub struct KicadParser;

impl KicadParser {
    /// Parse and extract a schematic held in memory.
    pub fn parse_schematic_str(
        content: &str,
        filename: &str,
    ) -> Result<Extraction<Schematic>, KicadParseError> {
        let tree = SExpTree::parse(content)?;
        Self::extract(&tree, filename)
    }

    /// Walk an already parsed tree. Entities that fail to extract are
    /// skipped and returned as errors next to the schematic.
    pub fn extract(tree: &SExpTree, filename: &str) -> Result<Extraction<Schematic>, KicadParseError> {
        let root = tree.root();
        match root.head() {
            Some("kicad_sch") => {}
            Some(other) => {
                return Err(KicadParseError::InvalidFormat(format!(
                    "Expected kicad_sch, found {}",
                    other
                )))
            }
            None => {
                return Err(KicadParseError::InvalidFormat(
                    "Expected kicad_sch root".to_string(),
                ))
            }
        }

        let mut schematic = Schematic::new(filename);
        schematic.uuid = fields::uuid(root);
        schematic.version = root.value("version").map(str::to_string);
        let mut errors = Vec::new();

        // Symbols need the library whatever order the file lists things in
        let library = root
            .get("lib_symbols")
            .map(|node| Library::from_node(node, &mut errors))
            .unwrap_or_default();
        let mut seen_units: HashSet<(String, u32)> = HashSet::new();

        for item in root.children().skip(1) {
            let Some(head) = item.head() else { continue };
            let result = match SchematicItem::from_head(head) {
                SchematicItem::LibSymbols | SchematicItem::Unknown => Ok(()),
                SchematicItem::Symbol => Self::parse_symbol(item, &library, &mut seen_units)
                    .map(|symbol| schematic.symbols.push(symbol)),
                SchematicItem::Wire => {
                    Self::parse_wire(item).map(|wires| schematic.wires.extend(wires))
                }
                SchematicItem::Label(kind) => {
                    Self::parse_label(item, kind).map(|label| schematic.labels.push(label))
                }
                SchematicItem::Junction => fields::at(item, None)
                    .map(|(position, _)| schematic.junctions.push(Junction { position })),
                SchematicItem::Sheet => {
                    Self::parse_sheet(item).map(|sheet| schematic.sheets.push(sheet))
                }
            };
            if let Err(e) = result {
                tracing::warn!("{}: skipping entity: {}", filename, e);
                errors.push(e);
            }
        }

        tracing::debug!(
            "Extracted {}: {} symbols, {} wires, {} labels, {} sheets",
            filename,
            schematic.symbols.len(),
            schematic.wires.len(),
            schematic.labels.len(),
            schematic.sheets.len()
        );

        Ok(Extraction {
            value: schematic,
            errors,
        })
    }

    fn parse_symbol(
        sexp: NodeRef<'_>,
        library: &Library,
        seen_units: &mut HashSet<(String, u32)>,
    ) -> Result<Symbol, ExtractionError> {
        let reference = fields::property(sexp, "Reference");
        let reference_str = reference.ok_or_else(|| fields::missing(sexp, "Reference", None))?;
        let lib_id = sexp
            .value("lib_id")
            .ok_or_else(|| fields::missing(sexp, "lib_id", reference))?;
        let value = fields::property(sexp, "Value")
            .ok_or_else(|| fields::missing(sexp, "Value", reference))?;
        let (position, rotation) = fields::at(sexp, reference)?;

        let mirror = match sexp.value("mirror") {
            Some("x") => Mirror::X,
            Some("y") => Mirror::Y,
            _ => Mirror::None,
        };
        let unit: u32 = fields::optional(sexp, "unit", reference)?.unwrap_or(1);
        let body_style: u32 = match fields::optional(sexp, "body_style", reference)? {
            Some(style) => style,
            None => fields::optional(sexp, "convert", reference)?.unwrap_or(1),
        };

        // Placed symbols may point at a renamed library copy via lib_name
        let lib_key = sexp.value("lib_name").unwrap_or(lib_id);
        let (lib_symbol, lib_pins) =
            library
                .lookup(lib_key)
                .ok_or_else(|| ExtractionError::UnknownLibrary {
                    reference: reference_str.to_string(),
                    lib_id: lib_key.to_string(),
                    location: sexp.location(),
                })?;

        if !seen_units.insert((reference_str.to_string(), unit)) {
            return Err(ExtractionError::DuplicateReference {
                reference: reference_str.to_string(),
                unit,
                location: sexp.location(),
            });
        }

        let placement = Placement {
            position,
            rotation,
            mirror,
        };
        let pins = lib_pins
            .iter()
            .filter(|p| p.unit == 0 || p.unit == unit)
            .filter(|p| p.body_style == 0 || p.body_style == body_style)
            .map(|p| Pin {
                number: p.number.clone(),
                name: p.name.clone(),
                electrical_type: p.electrical_type.clone(),
                position: placement.apply(&p.position),
            })
            .collect();

        let properties = sexp
            .get_all("property")
            .filter_map(|p| Some((p.arg(0)?.to_string(), p.arg(1)?.to_string())))
            .collect();

        Ok(Symbol {
            uuid: fields::uuid(sexp),
            reference: reference_str.to_string(),
            value: value.to_string(),
            lib_id: lib_id.to_string(),
            footprint: fields::property(sexp, "Footprint")
                .filter(|f| !f.trim().is_empty())
                .map(str::to_string),
            placement,
            unit,
            in_bom: sexp.value("in_bom") != Some("no"),
            power: lib_symbol.power,
            properties,
            pins,
        })
    }

    /// A wire's point list becomes one segment per consecutive pair.
    fn parse_wire(sexp: NodeRef<'_>) -> Result<Vec<Wire>, ExtractionError> {
        let pts = sexp.get("pts").ok_or_else(|| fields::missing(sexp, "pts", None))?;
        let points = fields::pts(pts, None)?;
        if points.len() < 2 {
            return Err(fields::missing(pts, "xy", None));
        }
        Ok(points
            .windows(2)
            .map(|pair| Wire {
                start: pair[0],
                end: pair[1],
            })
            .collect())
    }

    fn parse_label(sexp: NodeRef<'_>, kind: LabelKind) -> Result<Label, ExtractionError> {
        // Label text is the first argument: (label "TEXT" (at ...) ...)
        let text = sexp.arg(0).ok_or_else(|| fields::missing(sexp, "text", None))?;
        let (position, _) = fields::at(sexp, None)?;
        Ok(Label {
            text: text.to_string(),
            position,
            kind,
        })
    }

    fn parse_sheet(sexp: NodeRef<'_>) -> Result<Sheet, ExtractionError> {
        // KiCad 6 writes "Sheet name"/"Sheet file", later versions drop the space
        let name = fields::property(sexp, "Sheetname")
            .or_else(|| fields::property(sexp, "Sheet name"))
            .ok_or_else(|| fields::missing(sexp, "Sheetname", None))?;
        let file = fields::property(sexp, "Sheetfile")
            .or_else(|| fields::property(sexp, "Sheet file"))
            .ok_or_else(|| fields::missing(sexp, "Sheetfile", Some(name)))?;
        let (position, _) = fields::at(sexp, Some(name))?;

        let pins = sexp
            .get_all("pin")
            .map(|pin| {
                let pin_name = pin.arg(0).ok_or_else(|| fields::missing(pin, "name", Some(name)))?;
                let (position, _) = fields::at(pin, Some(name))?;
                Ok(SheetPin {
                    name: pin_name.to_string(),
                    position,
                })
            })
            .collect::<Result<Vec<_>, ExtractionError>>()?;

        Ok(Sheet {
            name: name.to_string(),
            file: file.to_string(),
            position,
            pins,
        })
    }
}
