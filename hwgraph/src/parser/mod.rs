pub mod diagnostics;
pub(crate) mod fields;
pub mod format_detector;
pub mod kicad;
pub mod lexer;
pub mod netlist;
pub mod pcb;
pub mod pcb_schema;
pub mod schema;
pub mod sexp;

// Re-export for convenience
pub use diagnostics::{Diagnostics, Extraction, ExtractionError, NetConflictError};
pub use format_detector::{detect_format, detect_version, DesignFormat, KicadVersion};
pub use kicad::{KicadParseError, KicadParser};
pub use lexer::{LexError, Lexer, Location, Token};
pub use netlist::{Net, Netlist, PcbResolver, PinRef, SchematicResolver, SheetLink};
pub use pcb::{PcbParseError, PcbParser};
pub use pcb_schema::*;
pub use schema::*;
pub use sexp::{NodeId, NodeRef, ParseError, SExp, SExpTree};
