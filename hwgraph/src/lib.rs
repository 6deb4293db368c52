//! hwgraph - connectivity, BOM and diagram extraction for KiCad designs
//!
//! This library reads KiCad schematic (`.kicad_sch`) and board
//! (`.kicad_pcb`) files, builds an immutable entity model from them and
//! resolves which pins or pads are electrically connected. Three views are
//! derived from a model: a bill of materials, a netlist and a Mermaid
//! diagram.
//!
//! # Quick Start
//!
//! ```no_run
//! use hwgraph::{parse_schematic, to_bom, to_diagram};
//! use std::path::Path;
//!
//! let model = parse_schematic(Path::new("design.kicad_sch")).unwrap();
//!
//! for net in &model.netlist.nets {
//!     println!("{}: {} pins", net.name, net.pins.len());
//! }
//! for entry in &to_bom(&model).entries {
//!     println!("{} x {} ({})", entry.quantity, entry.value, entry.references.join(", "));
//! }
//! println!("{}", to_diagram(&model));
//! ```
//!
//! # Features
//!
//! - **Extraction**: symbols, pins, wires, labels, sheets; footprints, pads,
//!   tracks, vias, zones. Malformed entities are skipped and reported in
//!   [`Diagnostics`] instead of failing the file.
//! - **Connectivity**: union-find net resolution with label precedence and
//!   conflict reporting, across hierarchical sheets.
//! - **Projections**: JSON record, CSV/Markdown BOM, Mermaid flowchart and
//!   class diagram, KiCad-style netlist export.
//! - **Batches**: parallel extraction of whole directories.

pub mod bom;
pub mod core;
pub mod diagram;
pub mod export;
pub mod model;
pub mod parser;

// Re-export main types
pub use crate::core::{
    discover_design_files, render, CancelFlag, DesignModel, ExtractOptions, HwGraphCore, HwGraphError,
    Projection, Render,
};
pub use bom::{to_bom, BomEntry, BomRecord, BomSource};
pub use diagram::{to_diagram, Diagram, DiagramSource};
pub use model::{PcbModel, PcbRecord, ProjectModel, SchematicModel, SchematicRecord};
pub use parser::diagnostics::{Diagnostics, ExtractionError, NetConflictError};
pub use parser::kicad::KicadParser;
pub use parser::netlist::{Net, Netlist, PinRef};
pub use parser::pcb::PcbParser;
pub use parser::pcb_schema::PcbDesign;
pub use parser::schema::Schematic;

/// Parse a schematic file with default options (convenience wrapper).
pub fn parse_schematic(path: &std::path::Path) -> Result<SchematicModel, HwGraphError> {
    HwGraphCore::parse_schematic(path, &ExtractOptions::default())
}

/// Parse a board file with default options (convenience wrapper).
pub fn parse_pcb(path: &std::path::Path) -> Result<PcbModel, HwGraphError> {
    HwGraphCore::parse_pcb(path, &ExtractOptions::default())
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        parse_pcb, parse_schematic, render, to_bom, to_diagram, BomRecord, BomSource, Diagnostics,
        DiagramSource, ExtractOptions, HwGraphCore, HwGraphError, Netlist, PcbModel, ProjectModel,
        Projection, SchematicModel,
    };
}
