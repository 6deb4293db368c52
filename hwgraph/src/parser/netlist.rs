//! Netlist Resolver
//!
//! Partitions pins (schematic) or pads (board) into nets with a union-find
//! over connection points.
//!
//! Schematic: every distinct coordinate, snapped to the resolution grid, is
//! one point. Pins sit on the point of their coordinate, wires union their two
//! endpoints, and junctions, labels, sheet pins and other wire ends lying on
//! a wire's interior attach to that wire. Labels name the set they touch;
//! labels with the same name are the same net. Hierarchical sheets are
//! joined afterwards through their sheet pins.
//!
//! Board: plated pads, track endpoints and vias are points; points closer
//! than the tolerance on a shared copper layer are joined, found through a
//! grid index. Zones join the pads inside them that declare the zone's net.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::parser::diagnostics::NetConflictError;
use crate::parser::pcb_schema::{PcbDesign, Position as BoardPosition, TrackKind};
use crate::parser::schema::*;

/// Default schematic grid (mm); KiCad stores four decimals
pub const SCHEMATIC_RESOLUTION: f64 = 0.0001;
/// Default board coincidence tolerance (mm)
pub const PCB_TOLERANCE: f64 = 0.001;

/// One pin of one component: `(reference, pin number)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PinRef {
    pub reference: String,
    pub pin: String,
}

impl PinRef {
    pub fn new(reference: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            pin: pin.into(),
        }
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.reference, self.pin)
    }
}

/// Where a net's name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    Label(LabelKind),
    /// Net declared on a board pad, track or via
    Declared,
    /// `Net-(<ref>-<pin>)` from the smallest pin
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    pub code: u32,
    pub name: String,
    pub source: NameSource,
    /// Sorted by (reference, pin)
    pub pins: Vec<PinRef>,
}

impl Net {
    /// Distinct references on this net, in pin order.
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        for pin in &self.pins {
            if refs.last() != Some(&pin.reference.as_str()) {
                refs.push(&pin.reference);
            }
        }
        refs
    }
}

/// Resolved nets, ordered by name and numbered from 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Netlist {
    pub nets: Vec<Net>,
    pub conflicts: Vec<NetConflictError>,
}

impl Netlist {
    pub fn net(&self, name: &str) -> Option<&Net> {
        self.nets.iter().find(|n| n.name == name)
    }

    /// The net containing `reference`'s pin `pin`.
    pub fn net_of(&self, reference: &str, pin: &str) -> Option<&Net> {
        self.nets
            .iter()
            .find(|n| n.pins.iter().any(|p| p.reference == reference && p.pin == pin))
    }

    pub fn pin_count(&self) -> usize {
        self.nets.iter().map(|n| n.pins.len()).sum()
    }

    /// The partition without names, for comparing connectivity.
    pub fn partition(&self) -> Vec<Vec<PinRef>> {
        let mut sets: Vec<Vec<PinRef>> = self.nets.iter().map(|n| n.pins.clone()).collect();
        sets.sort();
        sets
    }

    /// Turn `root -> pins` and `root -> names` into numbered nets.
    fn assemble(groups: BTreeMap<usize, Vec<PinRef>>, mut names: HashMap<usize, NameCandidates>) -> Self {
        let mut conflicts = Vec::new();
        let mut nets: Vec<Net> = Vec::with_capacity(groups.len());

        for (root, mut pins) in groups {
            pins.sort();
            let (name, source) = match names.remove(&root).and_then(|c| c.resolve(&mut conflicts)) {
                Some(named) => named,
                None => (format!("Net-({})", pins[0]), NameSource::Generated),
            };
            nets.push(Net {
                code: 0,
                name,
                source,
                pins,
            });
        }

        // Names on sets without pins still count as conflicts
        let mut leftover: Vec<(usize, NameCandidates)> = names.into_iter().collect();
        leftover.sort_by_key(|(root, _)| *root);
        for (_, candidates) in leftover {
            candidates.resolve(&mut conflicts);
        }

        nets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.pins.cmp(&b.pins)));
        disambiguate(&mut nets);
        nets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.pins.cmp(&b.pins)));
        for (i, net) in nets.iter_mut().enumerate() {
            net.code = i as u32 + 1;
        }
        conflicts.sort_by(|a: &NetConflictError, b| (&a.chosen, &a.names).cmp(&(&b.chosen, &b.names)));
        Netlist { nets, conflicts }
    }
}

/// Separate sets that ended up with the same name (unrouted islands of one
/// board net, a local and a global label sharing text) keep it on the set
/// with the smallest pin; the others get `_2`, `_3`, ... appended.
/// `nets` must be sorted by (name, pins).
fn disambiguate(nets: &mut [Net]) {
    let mut used: HashSet<String> = nets.iter().map(|n| n.name.clone()).collect();
    let mut i = 0;
    while i < nets.len() {
        let name = nets[i].name.clone();
        let mut j = i + 1;
        let mut k = 2;
        while j < nets.len() && nets[j].name == name {
            let mut renamed = format!("{}_{}", name, k);
            while used.contains(&renamed) {
                k += 1;
                renamed = format!("{}_{}", name, k);
            }
            tracing::warn!("Net '{}' is split into unconnected sets, naming one '{}'", name, renamed);
            used.insert(renamed.clone());
            nets[j].name = renamed;
            k += 1;
            j += 1;
        }
        i = j;
    }
}

/// Names applied to one connected set, in application order.
#[derive(Debug, Default)]
struct NameCandidates {
    applied: Vec<(u8, usize, String, NameSource)>,
}

impl NameCandidates {
    fn push(&mut self, rank: u8, order: usize, name: &str, source: NameSource) {
        self.applied.push((rank, order, name.to_string(), source));
    }

    /// Highest rank wins, then the last applied. More than one distinct
    /// name is reported as a conflict.
    fn resolve(mut self, conflicts: &mut Vec<NetConflictError>) -> Option<(String, NameSource)> {
        self.applied.sort_by_key(|(_, order, _, _)| *order);
        let (_, _, chosen, source) = self
            .applied
            .iter()
            .max_by_key(|(rank, order, _, _)| (*rank, *order))?
            .clone();

        let mut names: Vec<String> = Vec::new();
        for (_, _, name, _) in &self.applied {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        if names.len() > 1 {
            tracing::warn!("Net naming conflict between {:?}, using '{}'", names, chosen);
            conflicts.push(NetConflictError {
                names,
                chosen: chosen.clone(),
            });
        }
        Some((chosen, source))
    }
}

fn label_rank(kind: LabelKind) -> u8 {
    match kind {
        LabelKind::Local => 0,
        LabelKind::Hierarchical => 1,
        LabelKind::Global => 2,
        LabelKind::Power => 3,
    }
}

/// Parent sheet `sheet` (index into the parent's `sheets`) refers to the
/// file at `child`. Indices point into the slice given to
/// [`SchematicResolver::resolve_hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLink {
    pub parent: usize,
    pub sheet: usize,
    pub child: usize,
}

/// Label as seen by the resolver: power symbol pins become power labels.
struct AppliedLabel {
    file: usize,
    node: usize,
    kind: LabelKind,
    text: String,
    /// Hierarchical label bound to a sheet pin in the parent
    port: bool,
}

/// Snapped-coordinate point table shared by all files of one resolution.
struct PointTable {
    resolution: f64,
    ids: HashMap<(usize, i64, i64), usize>,
}

impl PointTable {
    fn new(resolution: f64) -> Self {
        Self {
            resolution,
            ids: HashMap::new(),
        }
    }

    fn key(&self, file: usize, p: &Position) -> (usize, i64, i64) {
        (
            file,
            (p.x / self.resolution).round() as i64,
            (p.y / self.resolution).round() as i64,
        )
    }

    fn id(&mut self, file: usize, p: &Position) -> usize {
        let key = self.key(file, p);
        let next = self.ids.len();
        *self.ids.entry(key).or_insert(next)
    }

    fn get(&self, file: usize, p: &Position) -> Option<usize> {
        self.ids.get(&self.key(file, p)).copied()
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Schematic netlist resolution.
#[derive(Debug, Clone, Copy)]
pub struct SchematicResolver {
    pub resolution: f64,
}

impl Default for SchematicResolver {
    fn default() -> Self {
        Self {
            resolution: SCHEMATIC_RESOLUTION,
        }
    }
}

impl SchematicResolver {
    pub fn new(resolution: f64) -> Self {
        Self { resolution }
    }

    /// Resolve a single file on its own.
    pub fn resolve(&self, schematic: &Schematic) -> Netlist {
        self.resolve_hierarchy(&[schematic], &[])
    }

    /// Resolve several files as one design. `files[0]` is the root; `links`
    /// connect sheet pins in a parent to hierarchical labels in a child.
    /// Global and power labels connect across every file.
    ///
    /// A file is instantiated once: when several sheets refer to the same
    /// child, only the first link is followed.
    pub fn resolve_hierarchy(&self, files: &[&Schematic], links: &[SheetLink]) -> Netlist {
        let mut linked = HashSet::new();
        let links: Vec<&SheetLink> = links
            .iter()
            .filter(|link| {
                let first = linked.insert(link.child);
                if !first {
                    tracing::warn!(
                        "{}: sheet {} repeats an instantiated file, not joined",
                        files.get(link.parent).map_or("?", |f| f.filename.as_str()),
                        link.sheet
                    );
                }
                first
            })
            .collect();
        let mut points = PointTable::new(self.resolution);
        let paths = sheet_paths(files, &links);

        // Pass 1: allocate every connection point
        let mut pins: Vec<(PinRef, usize)> = Vec::new();
        let mut labels: Vec<AppliedLabel> = Vec::new();
        let mut wires: Vec<(usize, usize, usize, &Wire)> = Vec::new();
        // Points that attach to a wire's interior, per file
        let mut attach: Vec<Vec<(usize, Position)>> = vec![Vec::new(); files.len()];

        for (f, sch) in files.iter().enumerate() {
            for wire in &sch.wires {
                let a = points.id(f, &wire.start);
                let b = points.id(f, &wire.end);
                attach[f].push((a, wire.start));
                attach[f].push((b, wire.end));
                wires.push((f, a, b, wire));
            }
            for junction in &sch.junctions {
                let id = points.id(f, &junction.position);
                attach[f].push((id, junction.position));
            }
            for sheet in &sch.sheets {
                for pin in &sheet.pins {
                    let id = points.id(f, &pin.position);
                    attach[f].push((id, pin.position));
                }
            }
            for label in &sch.labels {
                let id = points.id(f, &label.position);
                attach[f].push((id, label.position));
                labels.push(AppliedLabel {
                    file: f,
                    node: id,
                    kind: label.kind,
                    text: label.text.clone(),
                    port: false,
                });
            }
            for symbol in &sch.symbols {
                for pin in &symbol.pins {
                    let id = points.id(f, &pin.position);
                    pins.push((PinRef::new(&symbol.reference, &pin.number), id));
                    if symbol.power {
                        labels.push(AppliedLabel {
                            file: f,
                            node: id,
                            kind: LabelKind::Power,
                            text: symbol.value.clone(),
                            port: false,
                        });
                    }
                }
            }
        }

        let mut uf = UnionFind::<usize>::new(points.len());

        // Pass 2: wires and everything lying on them
        let half = self.resolution / 2.0;
        for &(f, a, b, wire) in &wires {
            uf.union(a, b);
            let (lo_x, hi_x) = (wire.start.x.min(wire.end.x) - half, wire.start.x.max(wire.end.x) + half);
            let (lo_y, hi_y) = (wire.start.y.min(wire.end.y) - half, wire.start.y.max(wire.end.y) + half);
            for (id, p) in &attach[f] {
                if p.x < lo_x || p.x > hi_x || p.y < lo_y || p.y > hi_y {
                    continue;
                }
                if wire.distance_to(p) <= half {
                    uf.union(a, *id);
                }
            }
        }

        // Pass 3: sheet pins join hierarchical labels of the child file
        for link in &links {
            let Some(sheet) = files[link.parent].sheets.get(link.sheet) else {
                continue;
            };
            for sheet_pin in &sheet.pins {
                let Some(outer) = points.get(link.parent, &sheet_pin.position) else {
                    continue;
                };
                for label in labels.iter_mut().filter(|l| {
                    l.file == link.child && l.kind == LabelKind::Hierarchical && l.text == sheet_pin.name
                }) {
                    label.port = true;
                    uf.union(outer, label.node);
                }
            }
        }

        // Pass 4: labels with the same name are one net
        let mut names: HashMap<usize, NameCandidates> = HashMap::new();
        let mut by_name: HashMap<(bool, String), usize> = HashMap::new();
        for label in &labels {
            let name = scope_key(label, &paths);
            match by_name.get(&name) {
                Some(&first) => {
                    uf.union(first, label.node);
                }
                None => {
                    by_name.insert(name, label.node);
                }
            }
        }
        for (order, label) in labels.iter().enumerate() {
            if label.port {
                continue;
            }
            let root = uf.find(label.node);
            names.entry(root).or_default().push(
                label_rank(label.kind),
                order,
                &scoped_name(label, &paths),
                NameSource::Label(label.kind),
            );
        }
        let mut groups: BTreeMap<usize, Vec<PinRef>> = BTreeMap::new();
        for (pin, id) in pins {
            groups.entry(uf.find(id)).or_default().push(pin);
        }

        let netlist = Netlist::assemble(groups, names);
        tracing::debug!(
            "Resolved {} file(s) into {} nets ({} conflicts)",
            files.len(),
            netlist.nets.len(),
            netlist.conflicts.len()
        );
        netlist
    }
}

/// Local and hierarchical names are private to their sheet; below the root
/// they carry the sheet path.
fn scoped_name(label: &AppliedLabel, paths: &[String]) -> String {
    match label.kind {
        LabelKind::Global | LabelKind::Power => label.text.clone(),
        LabelKind::Local | LabelKind::Hierarchical => match paths.get(label.file) {
            Some(path) if !path.is_empty() => format!("{}/{}", path, label.text),
            _ => label.text.clone(),
        },
    }
}

/// Labels join when their keys match. Global and power labels share one
/// design-wide scope, apart from the root sheet's local names.
fn scope_key(label: &AppliedLabel, paths: &[String]) -> (bool, String) {
    let global = matches!(label.kind, LabelKind::Global | LabelKind::Power);
    (global, scoped_name(label, paths))
}

/// `""` for the root, `/Power`, `/Power/Regulator`, ... for sheets, taken
/// from the first link that reaches each file.
fn sheet_paths(files: &[&Schematic], links: &[&SheetLink]) -> Vec<String> {
    let mut paths: Vec<Option<String>> = vec![None; files.len()];
    if let Some(root) = paths.first_mut() {
        *root = Some(String::new());
    }
    // Links arrive in discovery order, so parents are named before children
    for _ in 0..files.len() {
        let mut changed = false;
        for link in links {
            if paths.get(link.child).map_or(true, |p| p.is_some()) {
                continue;
            }
            let Some(Some(parent)) = paths.get(link.parent).cloned() else {
                continue;
            };
            let name = files[link.parent]
                .sheets
                .get(link.sheet)
                .map(|s| s.name.as_str())
                .unwrap_or("sheet");
            paths[link.child] = Some(format!("{}/{}", parent, name));
            changed = true;
        }
        if !changed {
            break;
        }
    }
    paths.into_iter().map(|p| p.unwrap_or_default()).collect()
}

/// Board netlist resolution.
#[derive(Debug, Clone, Copy)]
pub struct PcbResolver {
    pub tolerance: f64,
    /// Join pads that touch without a track between them
    pub pad_adjacency: bool,
}

impl Default for PcbResolver {
    fn default() -> Self {
        Self {
            tolerance: PCB_TOLERANCE,
            pad_adjacency: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Pad,
    TrackEnd,
    Via,
}

/// A connection point on the board.
struct BoardItem<'a> {
    kind: ItemKind,
    position: BoardPosition,
    layers: &'a [String],
    net_name: Option<&'a str>,
}

impl BoardItem<'_> {
    fn shares_layer(&self, other: &BoardItem<'_>) -> bool {
        self.layers.iter().any(|l| other.layers.contains(l))
    }
}

/// Uniform grid over item positions.
struct GridIndex {
    cell: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl GridIndex {
    fn new(cell: f64) -> Self {
        Self {
            cell,
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, p: &BoardPosition) -> (i64, i64) {
        ((p.x / self.cell).floor() as i64, (p.y / self.cell).floor() as i64)
    }

    fn insert(&mut self, p: &BoardPosition, item: usize) {
        let key = self.cell_of(p);
        self.cells.entry(key).or_default().push(item);
    }

    /// Items in cells overlapping the box `lo..=hi`.
    fn query(&self, lo: &BoardPosition, hi: &BoardPosition) -> impl Iterator<Item = usize> + '_ {
        let (x0, y0) = self.cell_of(lo);
        let (x1, y1) = self.cell_of(hi);
        (x0..=x1)
            .flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
            .filter_map(move |key| self.cells.get(&key))
            .flatten()
            .copied()
    }
}

impl PcbResolver {
    pub fn new(tolerance: f64, pad_adjacency: bool) -> Self {
        Self {
            tolerance,
            pad_adjacency,
        }
    }

    pub fn resolve(&self, pcb: &PcbDesign) -> Netlist {
        let tol = self.tolerance;
        let mut items: Vec<BoardItem<'_>> = Vec::new();
        let mut pins: Vec<(PinRef, usize)> = Vec::new();

        for fp in &pcb.footprints {
            for pad in fp.pads.iter().filter(|p| p.is_electrical()) {
                pins.push((PinRef::new(&fp.reference, &pad.number), items.len()));
                items.push(BoardItem {
                    kind: ItemKind::Pad,
                    position: pad.position,
                    layers: &pad.copper_layers,
                    net_name: pad.net_name.as_deref(),
                });
            }
        }
        let track_layers: Vec<[String; 1]> = pcb.tracks.iter().map(|t| [t.layer.clone()]).collect();
        let mut track_ends: Vec<(usize, usize)> = Vec::new();
        for (track, layer) in pcb.tracks.iter().zip(&track_layers) {
            let start = items.len();
            for position in [track.start, track.end] {
                items.push(BoardItem {
                    kind: ItemKind::TrackEnd,
                    position,
                    layers: layer,
                    net_name: track.net_name.as_deref(),
                });
            }
            track_ends.push((start, start + 1));
        }
        let mut via_ids: Vec<usize> = Vec::new();
        for via in &pcb.vias {
            via_ids.push(items.len());
            items.push(BoardItem {
                kind: ItemKind::Via,
                position: via.position,
                layers: &via.copper_layers,
                net_name: via.net_name.as_deref(),
            });
        }

        let mut uf = UnionFind::<usize>::new(items.len() + pcb.zones.len());
        let mut grid = GridIndex::new(tol.max(1.0));
        for (i, item) in items.iter().enumerate() {
            grid.insert(&item.position, i);
        }

        // Tracks join their own endpoints
        for &(a, b) in &track_ends {
            uf.union(a, b);
        }

        // Coincident points on a shared layer
        let margin = BoardPosition::new(tol, tol);
        for (i, item) in items.iter().enumerate() {
            let lo = BoardPosition::new(item.position.x - margin.x, item.position.y - margin.y);
            let hi = item.position.offset(&margin);
            for j in grid.query(&lo, &hi) {
                if j <= i {
                    continue;
                }
                let other = &items[j];
                if item.kind == ItemKind::Pad && other.kind == ItemKind::Pad && !self.pad_adjacency {
                    continue;
                }
                if item.position.distance(&other.position) <= tol && item.shares_layer(other) {
                    uf.union(i, j);
                }
            }
        }

        // Points landing on a track's interior
        for (t, track) in pcb.tracks.iter().enumerate() {
            // Only the ends of an arc connect
            if matches!(track.kind, TrackKind::Arc { .. }) {
                continue;
            }
            let (a, _) = track_ends[t];
            let lo = BoardPosition::new(track.start.x.min(track.end.x) - tol, track.start.y.min(track.end.y) - tol);
            let hi = BoardPosition::new(track.start.x.max(track.end.x) + tol, track.start.y.max(track.end.y) + tol);
            let segment = Wire {
                start: track.start,
                end: track.end,
            };
            for j in grid.query(&lo, &hi) {
                if items[j].layers.contains(&track.layer) && segment.distance_to(&items[j].position) <= tol {
                    uf.union(a, j);
                }
            }
        }

        // Zones join same-net pads and vias inside their outline
        for (z, zone) in pcb.zones.iter().enumerate() {
            if zone.is_keepout() || zone.net_name.is_empty() {
                continue;
            }
            let zone_node = items.len() + z;
            for (i, item) in items.iter().enumerate() {
                if item.kind == ItemKind::TrackEnd || item.net_name != Some(zone.net_name.as_str()) {
                    continue;
                }
                if item.layers.iter().any(|l| zone.layers.contains(l)) && zone.contains(&item.position) {
                    uf.union(zone_node, i);
                }
            }
        }

        // Declared names, applied pads first, then tracks, then vias
        let mut names: HashMap<usize, NameCandidates> = HashMap::new();
        for (order, item) in items.iter().enumerate() {
            if let Some(name) = item.net_name.filter(|n| !n.is_empty()) {
                names
                    .entry(uf.find(order))
                    .or_default()
                    .push(0, order, name, NameSource::Declared);
            }
        }

        let mut groups: BTreeMap<usize, Vec<PinRef>> = BTreeMap::new();
        for (pin, id) in pins {
            groups.entry(uf.find(id)).or_default().push(pin);
        }
        let netlist = Netlist::assemble(groups, names);
        tracing::debug!(
            "Resolved board {} into {} nets ({} conflicts)",
            pcb.filename,
            netlist.nets.len(),
            netlist.conflicts.len()
        );
        netlist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn symbol(reference: &str, pins: &[(&str, f64, f64)]) -> Symbol {
        Symbol {
            uuid: None,
            reference: reference.to_string(),
            value: "X".to_string(),
            lib_id: "Device:X".to_string(),
            footprint: None,
            placement: Placement::default(),
            unit: 1,
            in_bom: true,
            power: false,
            properties: Map::new(),
            pins: pins
                .iter()
                .map(|(n, x, y)| Pin {
                    number: n.to_string(),
                    name: String::new(),
                    electrical_type: "passive".to_string(),
                    position: Position::new(*x, *y),
                })
                .collect(),
        }
    }

    fn wire(x1: f64, y1: f64, x2: f64, y2: f64) -> Wire {
        Wire {
            start: Position::new(x1, y1),
            end: Position::new(x2, y2),
        }
    }

    fn label(text: &str, x: f64, y: f64, kind: LabelKind) -> Label {
        Label {
            text: text.to_string(),
            position: Position::new(x, y),
            kind,
        }
    }

    #[test]
    fn test_wire_and_label_name_net() {
        let mut sch = Schematic::new("t");
        sch.symbols.push(symbol("U1", &[("1", 0.0, 0.0), ("2", 0.0, 5.0)]));
        sch.symbols.push(symbol("U2", &[("1", 10.0, 0.0)]));
        sch.wires.push(wire(0.0, 0.0, 10.0, 0.0));
        sch.labels.push(label("VCC", 0.0, 0.0, LabelKind::Local));

        let netlist = SchematicResolver::default().resolve(&sch);
        assert_eq!(netlist.nets.len(), 2);
        let vcc = netlist.net("VCC").unwrap();
        assert_eq!(vcc.pins, vec![PinRef::new("U1", "1"), PinRef::new("U2", "1")]);
        assert_eq!(vcc.source, NameSource::Label(LabelKind::Local));
        assert_eq!(netlist.net("Net-(U1-2)").unwrap().source, NameSource::Generated);
        assert_eq!(netlist.pin_count(), 3);
        assert!(netlist.conflicts.is_empty());
    }

    #[test]
    fn test_t_junction_on_wire_interior() {
        let mut sch = Schematic::new("t");
        sch.symbols.push(symbol("R1", &[("1", 0.0, 0.0)]));
        sch.symbols.push(symbol("R2", &[("1", 20.0, 0.0)]));
        sch.symbols.push(symbol("R3", &[("1", 10.0, 10.0)]));
        sch.wires.push(wire(0.0, 0.0, 20.0, 0.0));
        sch.wires.push(wire(10.0, 0.0, 10.0, 10.0));
        sch.junctions.push(Junction {
            position: Position::new(10.0, 0.0),
        });

        let netlist = SchematicResolver::default().resolve(&sch);
        assert_eq!(netlist.nets.len(), 1);
        assert_eq!(netlist.nets[0].name, "Net-(R1-1)");
        assert_eq!(netlist.nets[0].code, 1);
    }

    #[test]
    fn test_pin_on_wire_interior_stays_apart() {
        let mut sch = Schematic::new("t");
        sch.symbols.push(symbol("R1", &[("1", 0.0, 0.0)]));
        sch.symbols.push(symbol("R2", &[("1", 5.0, 0.0)]));
        sch.wires.push(wire(0.0, 0.0, 10.0, 0.0));
        let netlist = SchematicResolver::default().resolve(&sch);
        assert_eq!(netlist.nets.len(), 2);
    }

    #[test]
    fn test_same_label_name_joins_sets() {
        let mut sch = Schematic::new("t");
        sch.symbols.push(symbol("R1", &[("1", 0.0, 0.0)]));
        sch.symbols.push(symbol("R2", &[("1", 50.0, 50.0)]));
        sch.labels.push(label("SDA", 0.0, 0.0, LabelKind::Local));
        sch.labels.push(label("SDA", 50.0, 50.0, LabelKind::Local));
        let netlist = SchematicResolver::default().resolve(&sch);
        assert_eq!(netlist.nets.len(), 1);
        assert_eq!(netlist.net("SDA").unwrap().pins.len(), 2);
    }

    #[test]
    fn test_conflict_precedence() {
        let mut sch = Schematic::new("t");
        sch.symbols.push(symbol("R1", &[("1", 0.0, 0.0)]));
        sch.wires.push(wire(0.0, 0.0, 10.0, 0.0));
        sch.labels.push(label("VDD", 10.0, 0.0, LabelKind::Global));
        sch.labels.push(label("LOCAL", 5.0, 0.0, LabelKind::Local));
        let netlist = SchematicResolver::default().resolve(&sch);
        assert_eq!(netlist.nets[0].name, "VDD");
        assert_eq!(netlist.conflicts.len(), 1);
        assert_eq!(netlist.conflicts[0].names, vec!["VDD".to_string(), "LOCAL".to_string()]);
    }

    #[test]
    fn test_power_symbol_names_net() {
        let mut sch = Schematic::new("t");
        let mut gnd = symbol("#PWR01", &[("1", 0.0, 10.0)]);
        gnd.power = true;
        gnd.value = "GND".to_string();
        sch.symbols.push(gnd);
        sch.symbols.push(symbol("C1", &[("2", 0.0, 10.0)]));
        let netlist = SchematicResolver::default().resolve(&sch);
        let net = netlist.net("GND").unwrap();
        assert_eq!(net.source, NameSource::Label(LabelKind::Power));
        assert_eq!(net.pins.len(), 2);
    }

    #[test]
    fn test_hierarchy_through_sheet_pins() {
        let mut root = Schematic::new("root.kicad_sch");
        root.symbols.push(symbol("J1", &[("1", 0.0, 0.0)]));
        root.wires.push(wire(0.0, 0.0, 20.0, 0.0));
        root.sheets.push(Sheet {
            name: "Power".to_string(),
            file: "power.kicad_sch".to_string(),
            position: Position::new(20.0, -5.0),
            pins: vec![SheetPin {
                name: "VIN".to_string(),
                position: Position::new(20.0, 0.0),
            }],
        });
        let mut child = Schematic::new("power.kicad_sch");
        child.symbols.push(symbol("U1", &[("1", 0.0, 0.0), ("2", 0.0, 5.0)]));
        child.labels.push(label("VIN", 0.0, 0.0, LabelKind::Hierarchical));
        child.labels.push(label("EN", 0.0, 5.0, LabelKind::Local));

        let links = [SheetLink {
            parent: 0,
            sheet: 0,
            child: 1,
        }];
        let netlist = SchematicResolver::default().resolve_hierarchy(&[&root, &child], &links);
        let vin = netlist.net_of("J1", "1").unwrap();
        assert_eq!(vin.pins, vec![PinRef::new("J1", "1"), PinRef::new("U1", "1")]);
        assert_eq!(vin.name, "Net-(J1-1)");
        assert!(netlist.net("/Power/EN").is_some());
    }

    #[test]
    fn test_conflict_on_set_without_pins() {
        let mut sch = Schematic::new("t");
        sch.wires.push(wire(0.0, 0.0, 10.0, 0.0));
        sch.labels.push(label("GND", 0.0, 0.0, LabelKind::Local));
        sch.labels.push(label("0V", 10.0, 0.0, LabelKind::Local));

        let netlist = SchematicResolver::default().resolve(&sch);
        assert!(netlist.nets.is_empty());
        assert_eq!(netlist.conflicts.len(), 1);
        assert_eq!(netlist.conflicts[0].names, vec!["GND".to_string(), "0V".to_string()]);
        assert_eq!(netlist.conflicts[0].chosen, "0V");
    }

    #[test]
    fn test_root_local_label_is_not_global() {
        let mut sch = Schematic::new("t");
        sch.symbols.push(symbol("R1", &[("1", 0.0, 0.0)]));
        sch.symbols.push(symbol("R2", &[("1", 50.0, 0.0)]));
        sch.labels.push(label("VCC", 0.0, 0.0, LabelKind::Local));
        sch.labels.push(label("VCC", 50.0, 0.0, LabelKind::Global));

        let netlist = SchematicResolver::default().resolve(&sch);
        assert_eq!(netlist.nets.len(), 2);
        assert_eq!(netlist.net("VCC").unwrap().pins, vec![PinRef::new("R1", "1")]);
        assert_eq!(netlist.net("VCC_2").unwrap().pins, vec![PinRef::new("R2", "1")]);
    }

    #[test]
    fn test_repeated_sheet_file_joins_first_instance_only() {
        let sheet = |name: &str, x: f64| Sheet {
            name: name.to_string(),
            file: "ch.kicad_sch".to_string(),
            position: Position::new(x, -5.0),
            pins: vec![SheetPin {
                name: "IN".to_string(),
                position: Position::new(x, 0.0),
            }],
        };
        let mut root = Schematic::new("root.kicad_sch");
        root.symbols.push(symbol("R1", &[("1", 0.0, 0.0)]));
        root.symbols.push(symbol("R2", &[("1", 30.0, 0.0)]));
        root.sheets.push(sheet("Left", 0.0));
        root.sheets.push(sheet("Right", 30.0));
        let mut child = Schematic::new("ch.kicad_sch");
        child.symbols.push(symbol("R5", &[("1", 0.0, 0.0)]));
        child.labels.push(label("IN", 0.0, 0.0, LabelKind::Hierarchical));

        let links = [
            SheetLink { parent: 0, sheet: 0, child: 1 },
            SheetLink { parent: 0, sheet: 1, child: 1 },
        ];
        let netlist = SchematicResolver::default().resolve_hierarchy(&[&root, &child], &links);
        assert_eq!(
            netlist.net_of("R1", "1").unwrap().pins,
            vec![PinRef::new("R1", "1"), PinRef::new("R5", "1")]
        );
        assert_eq!(netlist.net_of("R2", "1").unwrap().pins, vec![PinRef::new("R2", "1")]);
    }

    fn pad(number: &str, x: f64, y: f64, net: Option<&str>) -> crate::parser::pcb_schema::Pad {
        use crate::parser::pcb_schema::*;
        Pad {
            number: number.to_string(),
            pad_type: PadType::SMD,
            shape: PadShape::Rect,
            local_position: Position::new(x, y),
            position: Position::new(x, y),
            size: Size2D::default(),
            drill: None,
            layers: vec!["F.Cu".to_string()],
            copper_layers: vec!["F.Cu".to_string()],
            net: None,
            net_name: net.map(str::to_string),
        }
    }

    fn footprint(reference: &str, pads: Vec<crate::parser::pcb_schema::Pad>) -> crate::parser::pcb_schema::Footprint {
        crate::parser::pcb_schema::Footprint {
            uuid: None,
            reference: reference.to_string(),
            value: "X".to_string(),
            footprint_lib: "L:X".to_string(),
            layer: "F.Cu".to_string(),
            position: Position::default(),
            rotation: 0.0,
            pads,
            properties: Map::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn test_pcb_track_joins_pads() {
        use crate::parser::pcb_schema::*;
        let mut pcb = PcbDesign::default();
        pcb.footprints.push(footprint("R1", vec![pad("1", 0.0, 0.0, Some("VCC")), pad("2", 0.0, 1.6, None)]));
        pcb.footprints.push(footprint("R2", vec![pad("1", 10.0, 0.0005, None)]));
        pcb.tracks.push(Track {
            uuid: None,
            kind: TrackKind::Segment,
            start: Position::new(0.0, 0.0),
            end: Position::new(10.0, 0.0),
            width: 0.25,
            layer: "F.Cu".to_string(),
            net: 1,
            net_name: Some("VCC".to_string()),
            locked: false,
        });
        let netlist = PcbResolver::default().resolve(&pcb);
        let vcc = netlist.net("VCC").unwrap();
        assert_eq!(vcc.pins, vec![PinRef::new("R1", "1"), PinRef::new("R2", "1")]);
        assert_eq!(netlist.net("Net-(R1-2)").unwrap().source, NameSource::Generated);
    }

    #[test]
    fn test_pcb_coincident_pads_need_adjacency() {
        let mut pcb = PcbDesign::default();
        pcb.footprints.push(footprint("R1", vec![pad("1", 5.0, 5.0, None)]));
        pcb.footprints.push(footprint("R2", vec![pad("1", 5.0, 5.0, None)]));
        assert_eq!(PcbResolver::default().resolve(&pcb).nets.len(), 2);
        assert_eq!(PcbResolver::new(PCB_TOLERANCE, true).resolve(&pcb).nets.len(), 1);
    }

    #[test]
    fn test_pcb_zone_joins_same_net_pads() {
        use crate::parser::pcb_schema::*;
        let mut pcb = PcbDesign::default();
        pcb.footprints.push(footprint("C1", vec![pad("2", 1.0, 1.0, Some("GND"))]));
        pcb.footprints.push(footprint("C2", vec![pad("2", 8.0, 8.0, Some("GND")), pad("1", 9.0, 9.0, Some("VCC"))]));
        pcb.zones.push(Zone {
            uuid: None,
            net: 2,
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
        });
        let netlist = PcbResolver::default().resolve(&pcb);
        assert_eq!(netlist.net("GND").unwrap().pins.len(), 2);
        assert_eq!(netlist.net("VCC").unwrap().pins.len(), 1);
    }

    #[test]
    fn test_pcb_declared_name_conflict() {
        let mut pcb = PcbDesign::default();
        pcb.footprints.push(footprint("R1", vec![pad("1", 0.0, 0.0, Some("A"))]));
        pcb.footprints.push(footprint("R2", vec![pad("1", 0.0, 0.0, Some("B"))]));
        let netlist = PcbResolver::new(PCB_TOLERANCE, true).resolve(&pcb);
        assert_eq!(netlist.nets.len(), 1);
        assert_eq!(netlist.nets[0].name, "B");
        assert_eq!(netlist.conflicts.len(), 1);
    }

    #[test]
    fn test_pcb_arc_joins_only_its_ends() {
        use crate::parser::pcb_schema::*;
        let mut pcb = PcbDesign::default();
        pcb.footprints.push(footprint("R1", vec![pad("1", 0.0, 0.0, None)]));
        // On the chord, off the arc
        pcb.footprints.push(footprint("R2", vec![pad("1", 5.0, 0.0, None)]));
        pcb.footprints.push(footprint("R3", vec![pad("1", 10.0, 0.0, None)]));
        pcb.tracks.push(Track {
            uuid: None,
            kind: TrackKind::Arc {
                mid: Position::new(5.0, 5.0),
            },
            start: Position::new(0.0, 0.0),
            end: Position::new(10.0, 0.0),
            width: 0.25,
            layer: "F.Cu".to_string(),
            net: 0,
            net_name: None,
            locked: false,
        });
        let netlist = PcbResolver::default().resolve(&pcb);
        assert_eq!(
            netlist.net_of("R1", "1").unwrap().pins,
            vec![PinRef::new("R1", "1"), PinRef::new("R3", "1")]
        );
        assert_eq!(netlist.net_of("R2", "1").unwrap().pins, vec![PinRef::new("R2", "1")]);
    }

    #[test]
    fn test_pcb_unrouted_islands_get_distinct_names() {
        let mut pcb = PcbDesign::default();
        pcb.footprints.push(footprint("R1", vec![pad("1", 0.0, 0.0, Some("GND"))]));
        pcb.footprints.push(footprint("R2", vec![pad("1", 20.0, 20.0, Some("GND"))]));
        pcb.footprints.push(footprint("R3", vec![pad("1", 40.0, 0.0, Some("GND_2"))]));

        let netlist = PcbResolver::default().resolve(&pcb);
        let names: Vec<&str> = netlist.nets.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["GND", "GND_2", "GND_3"]);
        assert_eq!(netlist.net("GND").unwrap().pins, vec![PinRef::new("R1", "1")]);
        assert_eq!(netlist.net("GND_3").unwrap().pins, vec![PinRef::new("R2", "1")]);
        assert!(netlist.conflicts.is_empty());
    }
}
