//! PCB Schema Definitions
//!
//! Data structures for KiCad board files (.kicad_pcb). Coordinates are
//! millimetres with Y pointing down, like the schematic model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use super::schema::Position;

/// Represents a complete PCB design
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PcbDesign {
    pub uuid: Option<Uuid>,
    pub filename: String,
    pub version: Option<String>,
    pub thickness: Option<f64>, // Board thickness in mm
    pub layers: Vec<PcbLayer>,
    pub nets: Vec<PcbNet>,
    pub footprints: Vec<Footprint>,
    pub tracks: Vec<Track>,
    pub vias: Vec<Via>,
    pub zones: Vec<Zone>,
    pub graphics: Vec<GraphicItem>,
}

/// PCB Layer definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcbLayer {
    pub ordinal: u32,           // Layer number (0-31 for copper in KiCad 6/7)
    pub canonical_name: String, // e.g., "F.Cu", "B.Cu", "In1.Cu"
    pub layer_type: LayerType,
    pub user_name: Option<String>,
}

impl PcbLayer {
    pub fn is_copper(&self) -> bool {
        self.canonical_name.ends_with(".Cu")
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LayerType {
    #[default]
    Signal, // Copper signal layer
    Power,  // Power plane
    Mixed,  // Mixed signal/power
    Jumper, // Jumper layer
    User,   // User-defined
    Unknown,
}

impl LayerType {
    pub fn from_keyword(s: &str) -> Self {
        match s {
            "signal" => LayerType::Signal,
            "power" => LayerType::Power,
            "mixed" => LayerType::Mixed,
            "jumper" => LayerType::Jumper,
            "user" => LayerType::User,
            _ => LayerType::Unknown,
        }
    }
}

/// Net declaration from the board's net table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcbNet {
    pub id: u32,
    pub name: String,
}

/// Footprint (component) on PCB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footprint {
    pub uuid: Option<Uuid>,
    pub reference: String,
    pub value: String,
    pub footprint_lib: String,
    pub layer: String,
    pub position: Position,
    pub rotation: f64,
    pub pads: Vec<Pad>,
    pub properties: BTreeMap<String, String>,
    /// `(attr ...)` flags: smd, through_hole, board_only, exclude_from_bom
    pub attributes: Vec<String>,
}

impl Footprint {
    /// Whether the part is purchased, i.e. not flagged `exclude_from_bom`
    /// or `board_only`.
    pub fn in_bom(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| a == "exclude_from_bom" || a == "board_only")
    }

    /// Board position of a point given relative to the footprint origin.
    pub fn to_board(&self, local: &Position) -> Position {
        local.rotated(self.rotation).offset(&self.position)
    }

    pub fn pad(&self, number: &str) -> Option<&Pad> {
        self.pads.iter().find(|p| p.number == number)
    }
}

/// Pad on a footprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pad {
    pub number: String,
    pub pad_type: PadType,
    pub shape: PadShape,
    /// Offset from the footprint origin, as written in the file
    pub local_position: Position,
    /// Board position after footprint rotation and translation
    pub position: Position,
    pub size: Size2D,
    pub drill: Option<DrillInfo>,
    /// Layer names as declared, wildcards included
    pub layers: Vec<String>,
    /// Concrete copper layers the pad occupies
    pub copper_layers: Vec<String>,
    pub net: Option<u32>,
    pub net_name: Option<String>,
}

impl Pad {
    /// Non-plated holes carry no copper and never join a net.
    pub fn is_electrical(&self) -> bool {
        self.pad_type != PadType::NPThruHole && !self.copper_layers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PadType {
    ThruHole,
    SMD,
    Connect,
    NPThruHole, // Non-plated through hole
}

impl PadType {
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "thru_hole" => Some(PadType::ThruHole),
            "smd" => Some(PadType::SMD),
            "connect" => Some(PadType::Connect),
            "np_thru_hole" => Some(PadType::NPThruHole),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PadShape {
    Circle,
    Rect,
    Oval,
    Trapezoid,
    RoundRect,
    Custom,
}

impl PadShape {
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "circle" => Some(PadShape::Circle),
            "rect" => Some(PadShape::Rect),
            "oval" => Some(PadShape::Oval),
            "trapezoid" => Some(PadShape::Trapezoid),
            "roundrect" => Some(PadShape::RoundRect),
            "custom" => Some(PadShape::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Size2D {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillInfo {
    pub diameter: f64,
    pub oval: bool,
    pub offset: Option<Position>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackKind {
    Segment,
    /// Arc through `mid`
    Arc { mid: Position },
}

/// Copper track: a straight `segment` or an `arc`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub uuid: Option<Uuid>,
    pub kind: TrackKind,
    pub start: Position,
    pub end: Position,
    pub width: f64,               // Track width in mm
    pub layer: String,            // Layer name (e.g., "F.Cu")
    pub net: u32,                 // Net ID, 0 when unconnected
    pub net_name: Option<String>, // Net name for convenience
    pub locked: bool,
}

impl Track {
    /// Track length in mm
    pub fn length(&self) -> f64 {
        match self.kind {
            TrackKind::Segment => self.start.distance(&self.end),
            TrackKind::Arc { mid } => arc_length(&self.start, &mid, &self.end),
        }
    }
}

/// Length of the circular arc from `start` through `mid` to `end`.
/// Collinear points degrade to the straight path.
fn arc_length(start: &Position, mid: &Position, end: &Position) -> f64 {
    let (ax, ay) = (start.x, start.y);
    let (bx, by) = (mid.x, mid.y);
    let (cx, cy) = (end.x, end.y);
    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    if d.abs() < 1e-12 {
        return start.distance(mid) + mid.distance(end);
    }
    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let center = Position::new(
        (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d,
        (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d,
    );
    let radius = center.distance(start);

    let angle = |p: &Position| (p.y - center.y).atan2(p.x - center.x);
    let tau = std::f64::consts::TAU;
    let sweep_to = |p: &Position| (angle(p) - angle(start)).rem_euclid(tau);
    let to_mid = sweep_to(mid);
    let to_end = sweep_to(end);
    // The arc runs in whichever direction passes through mid
    let sweep = if to_mid <= to_end { to_end } else { tau - to_end };
    radius * sweep
}

/// Via (vertical interconnect)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Via {
    pub uuid: Option<Uuid>,
    pub position: Position,
    pub size: f64,                // Via pad size (mm)
    pub drill: f64,               // Drill diameter (mm)
    pub layers: (String, String), // Start and end layers
    /// Every copper layer between start and end, inclusive
    pub copper_layers: Vec<String>,
    pub net: u32,
    pub net_name: Option<String>,
    pub via_type: ViaType,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ViaType {
    #[default]
    Through,
    Blind,
    Buried,
    Micro,
}

/// Copper zone (pour)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub uuid: Option<Uuid>,
    pub net: u32,
    pub net_name: String,
    pub layers: Vec<String>,
    pub priority: u32,
    pub connect_pads: ZoneConnectType,
    pub outline: Vec<Position>, // Zone boundary polygon
    pub filled_polygons: Vec<FilledPolygon>,
    pub keepout: Option<ZoneKeepout>,
}

impl Zone {
    /// Even-odd point-in-polygon test against the outline.
    pub fn contains(&self, point: &Position) -> bool {
        point_in_polygon(&self.outline, point)
    }

    pub fn is_keepout(&self) -> bool {
        self.keepout.is_some()
    }
}

pub(crate) fn point_in_polygon(polygon: &[Position], point: &Position) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (&polygon[i], &polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ZoneConnectType {
    Solid,
    #[default]
    ThermalRelief,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilledPolygon {
    pub layer: String,
    pub points: Vec<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ZoneKeepout {
    pub tracks: bool,
    pub vias: bool,
    pub pads: bool,
    pub copperpour: bool,
    pub footprints: bool,
}

/// Board-level graphic item (outline, silkscreen, fab drawings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicItem {
    pub item_type: GraphicType,
    pub layer: String,
    pub start: Position,
    pub end: Option<Position>,
    pub points: Vec<Position>,
    pub width: f64,
    pub fill: bool,
}

impl GraphicItem {
    /// Axis-aligned (min, max) corners covered by the item.
    pub fn bounds(&self) -> Option<(Position, Position)> {
        let mut pts: Vec<Position> = match self.item_type {
            GraphicType::Circle => {
                // `end` is a point on the circle
                let end = self.end?;
                let r = self.start.distance(&end);
                vec![
                    Position::new(self.start.x - r, self.start.y - r),
                    Position::new(self.start.x + r, self.start.y + r),
                ]
            }
            GraphicType::Polygon => Vec::new(),
            _ => std::iter::once(self.start).chain(self.end).collect(),
        };
        pts.extend(self.points.iter().copied());
        bounding_box(pts.iter())
    }
}

fn bounding_box<'a>(points: impl Iterator<Item = &'a Position>) -> Option<(Position, Position)> {
    points.fold(None, |acc, p| match acc {
        None => Some((*p, *p)),
        Some((lo, hi)) => Some((
            Position::new(lo.x.min(p.x), lo.y.min(p.y)),
            Position::new(hi.x.max(p.x), hi.y.max(p.y)),
        )),
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GraphicType {
    Line,
    Arc,
    Circle,
    Rect,
    Polygon,
}

/// Summary counts reported next to a board's structured record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcbStatistics {
    pub total_components: usize,
    pub components_by_layer: BTreeMap<String, usize>,
    pub total_tracks: usize,
    pub tracks_by_layer: BTreeMap<String, usize>,
    pub total_track_length: f64,
    pub total_vias: usize,
    pub zones_by_layer: BTreeMap<String, usize>,
    /// Width and height of the board outline in mm
    pub board_dimensions: Option<(f64, f64)>,
}

impl PcbDesign {
    pub fn footprint(&self, reference: &str) -> Option<&Footprint> {
        self.footprints.iter().find(|f| f.reference == reference)
    }

    pub fn net_name(&self, id: u32) -> Option<&str> {
        self.nets
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.name.as_str())
    }

    pub fn copper_layers(&self) -> impl Iterator<Item = &PcbLayer> {
        self.layers.iter().filter(|l| l.is_copper())
    }

    /// Extent of the `Edge.Cuts` drawings, falling back to the spread of
    /// footprint origins when the board has no outline.
    pub fn board_dimensions(&self) -> Option<(f64, f64)> {
        let outline: Vec<Position> = self
            .graphics
            .iter()
            .filter(|g| g.layer == "Edge.Cuts")
            .filter_map(|g| g.bounds())
            .flat_map(|(lo, hi)| [lo, hi])
            .collect();
        let (lo, hi) = match bounding_box(outline.iter()) {
            Some(b) => b,
            None => bounding_box(self.footprints.iter().map(|f| &f.position))?,
        };
        Some((hi.x - lo.x, hi.y - lo.y))
    }

    pub fn statistics(&self) -> PcbStatistics {
        let mut stats = PcbStatistics {
            total_components: self.footprints.len(),
            total_tracks: self.tracks.len(),
            total_vias: self.vias.len(),
            board_dimensions: self.board_dimensions(),
            ..Default::default()
        };
        for fp in &self.footprints {
            *stats.components_by_layer.entry(fp.layer.clone()).or_default() += 1;
        }
        for track in &self.tracks {
            *stats.tracks_by_layer.entry(track.layer.clone()).or_default() += 1;
            stats.total_track_length += track.length();
        }
        for zone in &self.zones {
            for layer in &zone.layers {
                *stats.zones_by_layer.entry(layer.clone()).or_default() += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(kind: TrackKind, start: Position, end: Position) -> Track {
        Track {
            uuid: None,
            kind,
            start,
            end,
            width: 0.25,
            layer: "F.Cu".to_string(),
            net: 1,
            net_name: Some("VCC".to_string()),
            locked: false,
        }
    }

    #[test]
    fn test_track_length() {
        let t = track(TrackKind::Segment, Position::new(0.0, 0.0), Position::new(3.0, 4.0));
        assert_eq!(t.length(), 5.0);
    }

    #[test]
    fn test_arc_length() {
        // Half circle of radius 1
        let t = track(
            TrackKind::Arc {
                mid: Position::new(0.0, 1.0),
            },
            Position::new(-1.0, 0.0),
            Position::new(1.0, 0.0),
        );
        assert!((t.length() - std::f64::consts::PI).abs() < 1e-9);

        // Quarter circle going the other way round
        let t = track(
            TrackKind::Arc {
                mid: Position::new(0.5f64.sqrt(), -(0.5f64.sqrt())),
            },
            Position::new(1.0, 0.0),
            Position::new(0.0, -1.0),
        );
        assert!((t.length() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_zone_contains() {
        let zone = Zone {
            uuid: None,
            net: 1,
            net_name: "GND".to_string(),
            layers: vec!["F.Cu".to_string()],
            priority: 0,
            connect_pads: ZoneConnectType::default(),
            outline: vec![
                Position::new(0.0, 0.0),
                Position::new(10.0, 0.0),
                Position::new(10.0, 10.0),
                Position::new(0.0, 10.0),
            ],
            filled_polygons: Vec::new(),
            keepout: None,
        };
        assert!(zone.contains(&Position::new(5.0, 5.0)));
        assert!(!zone.contains(&Position::new(15.0, 5.0)));
        assert!(!zone.is_keepout());
    }

    #[test]
    fn test_footprint_to_board() {
        let fp = Footprint {
            uuid: None,
            reference: "R1".to_string(),
            value: "10k".to_string(),
            footprint_lib: "Resistor_SMD:R_0603".to_string(),
            layer: "F.Cu".to_string(),
            position: Position::new(100.0, 50.0),
            rotation: 90.0,
            pads: Vec::new(),
            properties: BTreeMap::new(),
            attributes: vec!["smd".to_string()],
        };
        assert!(fp.in_bom());
        assert_eq!(fp.to_board(&Position::new(1.0, 0.0)), Position::new(100.0, 49.0));
    }

    #[test]
    fn test_statistics_and_dimensions() {
        let mut pcb = PcbDesign::default();
        pcb.tracks.push(track(TrackKind::Segment, Position::new(0.0, 0.0), Position::new(3.0, 4.0)));
        pcb.graphics.push(GraphicItem {
            item_type: GraphicType::Rect,
            layer: "Edge.Cuts".to_string(),
            start: Position::new(0.0, 0.0),
            end: Some(Position::new(50.0, 30.0)),
            points: Vec::new(),
            width: 0.1,
            fill: false,
        });
        let stats = pcb.statistics();
        assert_eq!(stats.total_tracks, 1);
        assert_eq!(stats.tracks_by_layer.get("F.Cu"), Some(&1));
        assert_eq!(stats.total_track_length, 5.0);
        assert_eq!(stats.board_dimensions, Some((50.0, 30.0)));
    }
}
