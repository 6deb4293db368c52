//! Extracted models and their structured records
//!
//! A model bundles what one extraction produced: the entity tree, its
//! resolved netlist and the diagnostics collected on the way. Records are the
//! owned, serde-ready projection of a model (`{components, nets}` for
//! schematics, `{modules, tracks, vias, zones, nets, statistics}` for boards).

use serde::{Deserialize, Serialize};

use crate::parser::diagnostics::Diagnostics;
use crate::parser::netlist::{Net, Netlist, SheetLink};
use crate::parser::pcb_schema::{PcbDesign, PcbStatistics, Track, Via};
use crate::parser::schema::{Position, Schematic, Symbol};

/// A single schematic file, resolved on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchematicModel {
    pub schematic: Schematic,
    pub netlist: Netlist,
    pub diagnostics: Diagnostics,
}

impl SchematicModel {
    pub fn record(&self) -> SchematicRecord {
        SchematicRecord::build(&self.schematic.filename, [&self.schematic], &self.netlist)
    }
}

/// A board file with its copper connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcbModel {
    pub pcb: PcbDesign,
    pub netlist: Netlist,
    pub diagnostics: Diagnostics,
}

impl PcbModel {
    pub fn record(&self) -> PcbRecord {
        let modules = self
            .pcb
            .footprints
            .iter()
            .map(|fp| ModuleRecord {
                reference: fp.reference.clone(),
                value: fp.value.clone(),
                footprint: fp.footprint_lib.clone(),
                layer: fp.layer.clone(),
                position: fp.position,
                rotation: fp.rotation,
                pads: fp
                    .pads
                    .iter()
                    .map(|pad| PadRecord {
                        number: pad.number.clone(),
                        position: pad.position,
                        net: self
                            .netlist
                            .net_of(&fp.reference, &pad.number)
                            .map(|n| n.name.clone()),
                    })
                    .collect(),
            })
            .collect();

        let zones = self
            .pcb
            .zones
            .iter()
            .map(|z| ZoneRecord {
                net: z.net_name.clone(),
                layers: z.layers.clone(),
                priority: z.priority,
                keepout: z.is_keepout(),
                outline: z.outline.clone(),
            })
            .collect();

        PcbRecord {
            file: self.pcb.filename.clone(),
            modules,
            tracks: self.pcb.tracks.clone(),
            vias: self.pcb.vias.clone(),
            zones,
            nets: self.netlist.nets.clone(),
            statistics: self.pcb.statistics(),
        }
    }
}

/// Why a sheet of a hierarchy was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The file is already an ancestor of this sheet
    Cycle,
    /// The file could not be read or parsed
    Failed(String),
    /// The file is already instantiated by another sheet
    Repeated,
}

/// A sheet reference that was not followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSheet {
    pub parent: String,
    pub sheet: String,
    pub file: String,
    pub reason: SkipReason,
}

/// A root schematic with every sheet file it references, resolved as one
/// design. `files[0]` is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectModel {
    pub files: Vec<Schematic>,
    pub links: Vec<SheetLink>,
    pub netlist: Netlist,
    /// One entry per file, in `files` order. Net conflicts are reported on
    /// the root entry.
    pub diagnostics: Vec<Diagnostics>,
    pub skipped: Vec<SkippedSheet>,
}

impl ProjectModel {
    pub fn root(&self) -> Option<&Schematic> {
        self.files.first()
    }

    /// Symbols of every file, in file order. A file used by several sheets
    /// contributes its symbols once.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.files.iter().flat_map(|f| f.symbols.iter())
    }

    pub fn record(&self) -> SchematicRecord {
        let file = self.root().map(|r| r.filename.as_str()).unwrap_or_default();
        SchematicRecord::build(file, self.files.iter(), &self.netlist)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinRecord {
    pub number: String,
    pub name: String,
    pub position: Position,
    pub net: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub reference: String,
    pub value: String,
    pub footprint: Option<String>,
    pub lib_id: String,
    pub unit: u32,
    pub position: Position,
    pub rotation: f64,
    pub pins: Vec<PinRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchematicRecord {
    pub file: String,
    pub components: Vec<ComponentRecord>,
    pub nets: Vec<Net>,
}

impl SchematicRecord {
    fn build<'a>(
        file: &str,
        files: impl IntoIterator<Item = &'a Schematic>,
        netlist: &Netlist,
    ) -> Self {
        let components = files
            .into_iter()
            .flat_map(|sch| sch.symbols.iter())
            .map(|sym| ComponentRecord {
                reference: sym.reference.clone(),
                value: sym.value.clone(),
                footprint: sym.footprint.clone(),
                lib_id: sym.lib_id.clone(),
                unit: sym.unit,
                position: sym.placement.position,
                rotation: sym.placement.rotation,
                pins: sym
                    .pins
                    .iter()
                    .map(|pin| PinRecord {
                        number: pin.number.clone(),
                        name: pin.name.clone(),
                        position: pin.position,
                        net: netlist
                            .net_of(&sym.reference, &pin.number)
                            .map(|n| n.name.clone()),
                    })
                    .collect(),
            })
            .collect();

        SchematicRecord {
            file: file.to_string(),
            components,
            nets: netlist.nets.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadRecord {
    pub number: String,
    pub position: Position,
    pub net: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub layer: String,
    pub position: Position,
    pub rotation: f64,
    pub pads: Vec<PadRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub net: String,
    pub layers: Vec<String>,
    pub priority: u32,
    pub keepout: bool,
    pub outline: Vec<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcbRecord {
    pub file: String,
    pub modules: Vec<ModuleRecord>,
    pub tracks: Vec<Track>,
    pub vias: Vec<Via>,
    pub zones: Vec<ZoneRecord>,
    pub nets: Vec<Net>,
    pub statistics: PcbStatistics,
}
