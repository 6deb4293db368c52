use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point in sheet coordinates (millimetres, Y pointing down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Rotate about the origin, counter-clockwise as seen on a Y-down sheet.
    pub fn rotated(&self, degrees: f64) -> Position {
        // Exact quarter turns avoid accumulating error from sin/cos.
        let normalized = degrees.rem_euclid(360.0);
        let (sin, cos) = if normalized == 0.0 {
            (0.0, 1.0)
        } else if normalized == 90.0 {
            (1.0, 0.0)
        } else if normalized == 180.0 {
            (0.0, -1.0)
        } else if normalized == 270.0 {
            (-1.0, 0.0)
        } else {
            normalized.to_radians().sin_cos()
        };
        Position {
            x: self.x * cos + self.y * sin,
            y: -self.x * sin + self.y * cos,
        }
    }

    pub fn offset(&self, by: &Position) -> Position {
        Position {
            x: self.x + by.x,
            y: self.y + by.y,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mirror {
    #[default]
    None,
    /// Flipped across the horizontal axis
    X,
    /// Flipped across the vertical axis
    Y,
}

/// Placement of a symbol instance on the sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Position,
    pub rotation: f64,
    pub mirror: Mirror,
}

impl Placement {
    /// Map a library-space point (Y up) onto the sheet: flip Y, rotate,
    /// mirror, then translate.
    pub fn apply(&self, local: &Position) -> Position {
        let flipped = Position::new(local.x, -local.y);
        let rotated = flipped.rotated(self.rotation);
        let mirrored = match self.mirror {
            Mirror::None => rotated,
            Mirror::X => Position::new(rotated.x, -rotated.y),
            Mirror::Y => Position::new(-rotated.x, rotated.y),
        };
        mirrored.offset(&self.position)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schematic {
    pub uuid: Option<Uuid>,
    pub filename: String,
    pub version: Option<String>,
    pub symbols: Vec<Symbol>,
    pub wires: Vec<Wire>,
    pub labels: Vec<Label>,
    pub junctions: Vec<Junction>,
    pub sheets: Vec<Sheet>,
}

impl Schematic {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            uuid: None,
            filename: filename.into(),
            version: None,
            symbols: Vec::new(),
            wires: Vec::new(),
            labels: Vec::new(),
            junctions: Vec::new(),
            sheets: Vec::new(),
        }
    }

    pub fn pin_count(&self) -> usize {
        self.symbols.iter().map(|s| s.pins.len()).sum()
    }

    pub fn symbol(&self, reference: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.reference == reference)
    }
}

/// A placed symbol instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub uuid: Option<Uuid>,
    pub reference: String, // R1, C1, U1
    pub value: String,     // 10k, 100nF, STM32F4
    pub lib_id: String,    // Device:R
    pub footprint: Option<String>,
    pub placement: Placement,
    pub unit: u32,
    pub in_bom: bool,
    /// Power port symbol (GND, +3V3, ...); its value names a global net
    pub power: bool,
    pub properties: BTreeMap<String, String>,
    pub pins: Vec<Pin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub number: String,
    pub name: String,
    pub electrical_type: String,
    /// Absolute position of the connection point on the sheet
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wire {
    pub start: Position,
    pub end: Position,
}

impl Wire {
    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Distance from `point` to the closest point of the segment.
    pub fn distance_to(&self, point: &Position) -> f64 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let length_sq = dx * dx + dy * dy;
        if length_sq < 1e-12 {
            return point.distance(&self.start);
        }
        let t = ((point.x - self.start.x) * dx + (point.y - self.start.y) * dy) / length_sq;
        let t = t.clamp(0.0, 1.0);
        point.distance(&Position::new(self.start.x + t * dx, self.start.y + t * dy))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Local,
    Hierarchical,
    Global,
    /// Implied by a power symbol pin
    Power,
}

impl LabelKind {
    /// Labels of global scope connect across every sheet of a project.
    pub fn is_global(self) -> bool {
        matches!(self, LabelKind::Global | LabelKind::Power)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
    pub position: Position,
    pub kind: LabelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Junction {
    pub position: Position,
}

/// A hierarchical sheet instance referencing another schematic file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub file: String,
    pub position: Position,
    pub pins: Vec<SheetPin>,
}

/// Port on a sheet's border, matched by name to a hierarchical label inside
/// the referenced file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetPin {
    pub name: String,
    pub position: Position,
}
