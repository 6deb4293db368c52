//! KiCAD PCB Parser
//!
//! This module extracts footprints, pads, tracks, vias, zones and board
//! graphics from KiCad PCB files (.kicad_pcb).
//!
//! Key format details:
//! - All values are in millimeters
//! - Layers are identified by ordinal number and canonical name
//! - Traces are stored as (segment ...) or (arc ...) elements
//! - Pad positions are relative to their footprint and rotate with it
//! - Layer lists may use wildcards (`*.Cu`, `F&B.Cu`)

use std::collections::HashMap;

use thiserror::Error;

use crate::parser::diagnostics::{Extraction, ExtractionError};
use crate::parser::fields;
use crate::parser::pcb_schema::*;
use crate::parser::sexp::{NodeRef, ParseError, SExpTree};

#[derive(Debug, Error)]
pub enum PcbParseError {
    #[error("S-expression parse error: {0}")]
    SExpParse(#[from] ParseError),
    #[error("Invalid PCB format: {0}")]
    InvalidFormat(String),
}

/// Top-level items of a board file the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PcbItem {
    General,
    Layers,
    Net,
    Footprint,
    Segment,
    Arc,
    Via,
    Zone,
    Graphic(GraphicType),
    Unknown,
}

impl PcbItem {
    fn from_head(head: &str) -> Self {
        match head {
            "general" => PcbItem::General,
            "layers" => PcbItem::Layers,
            "net" => PcbItem::Net,
            "footprint" | "module" => PcbItem::Footprint,
            "segment" => PcbItem::Segment,
            "arc" => PcbItem::Arc,
            "via" => PcbItem::Via,
            "zone" => PcbItem::Zone,
            "gr_line" => PcbItem::Graphic(GraphicType::Line),
            "gr_arc" => PcbItem::Graphic(GraphicType::Arc),
            "gr_circle" => PcbItem::Graphic(GraphicType::Circle),
            "gr_rect" => PcbItem::Graphic(GraphicType::Rect),
            "gr_poly" => PcbItem::Graphic(GraphicType::Polygon),
            _ => PcbItem::Unknown,
        }
    }
}

/// Declared layer table plus the net table, used while extracting items.
struct BoardContext {
    layers: Vec<PcbLayer>,
    nets: HashMap<u32, String>,
    net_ids: HashMap<String, u32>,
}

const DEFAULT_COPPER: [&str; 2] = ["F.Cu", "B.Cu"];

impl BoardContext {
    fn new(layers: Vec<PcbLayer>, nets: &[PcbNet]) -> Self {
        Self {
            layers,
            nets: nets.iter().map(|n| (n.id, n.name.clone())).collect(),
            net_ids: nets.iter().map(|n| (n.name.clone(), n.id)).collect(),
        }
    }

    fn copper_names(&self) -> Vec<String> {
        if self.layers.is_empty() {
            DEFAULT_COPPER.iter().map(|s| s.to_string()).collect()
        } else {
            self.layers
                .iter()
                .filter(|l| l.is_copper())
                .map(|l| l.canonical_name.clone())
                .collect()
        }
    }

    /// Check one concrete layer name against the table. Files without a
    /// table accept anything.
    fn validate(
        &self,
        node: NodeRef<'_>,
        layer: &str,
        reference: Option<&str>,
    ) -> Result<(), ExtractionError> {
        let declared = self.layers.is_empty()
            || self
                .layers
                .iter()
                .any(|l| l.canonical_name == layer || l.user_name.as_deref() == Some(layer));
        if declared {
            Ok(())
        } else {
            Err(ExtractionError::UnknownLayer {
                keyword: node.head().unwrap_or_default().to_string(),
                layer: layer.to_string(),
                reference: reference.map(str::to_string),
                location: node.location(),
            })
        }
    }

    /// Expand a declared layer list to the concrete copper layers it covers.
    fn copper_layers(
        &self,
        node: NodeRef<'_>,
        declared: &[String],
        reference: Option<&str>,
    ) -> Result<Vec<String>, ExtractionError> {
        let copper = self.copper_names();
        let mut out: Vec<String> = Vec::new();
        for name in declared {
            let expanded: Vec<String> = if name == "*.Cu" {
                copper.clone()
            } else if name == "F&B.Cu" {
                DEFAULT_COPPER.iter().map(|s| s.to_string()).collect()
            } else if name.starts_with('*') || name.contains('&') {
                // Wildcards over non-copper layers
                Vec::new()
            } else {
                self.validate(node, name, reference)?;
                if name.ends_with(".Cu") {
                    vec![name.clone()]
                } else {
                    Vec::new()
                }
            };
            for layer in expanded {
                if !out.contains(&layer) {
                    out.push(layer);
                }
            }
        }
        Ok(out)
    }

    /// Copper layers from `start` to `end` inclusive, in stack order.
    fn span(&self, start: &str, end: &str) -> Vec<String> {
        let copper = self.copper_names();
        let a = copper.iter().position(|l| l == start);
        let b = copper.iter().position(|l| l == end);
        match (a, b) {
            (Some(a), Some(b)) => copper[a.min(b)..=a.max(b)].to_vec(),
            _ => {
                let mut v = vec![start.to_string()];
                if end != start {
                    v.push(end.to_string());
                }
                v
            }
        }
    }

    /// `(net ID ["NAME"])` or `(net "NAME")`.
    fn net(&self, node: NodeRef<'_>) -> (Option<u32>, Option<String>) {
        let Some(net) = node.get("net") else {
            return (None, None);
        };
        match net.parse_arg::<u32>(0) {
            Some(id) => {
                let name = net
                    .arg(1)
                    .map(str::to_string)
                    .or_else(|| self.nets.get(&id).cloned());
                (Some(id), name)
            }
            None => {
                let name = net.arg(0).map(str::to_string);
                let id = name.as_ref().and_then(|n| self.net_ids.get(n).copied());
                (id, name)
            }
        }
    }
}

/// Parser for KiCAD PCB files (KiCad 6 and later S-expression format, plus
/// the `module` spelling of KiCad 5 boards)
pub struct PcbParser;

impl PcbParser {
    /// Parse and extract a board held in memory.
    pub fn parse_pcb_str(content: &str, filename: &str) -> Result<Extraction<PcbDesign>, PcbParseError> {
        let tree = SExpTree::parse(content)?;
        Self::extract(&tree, filename)
    }

    pub fn extract(tree: &SExpTree, filename: &str) -> Result<Extraction<PcbDesign>, PcbParseError> {
        let root = tree.root();
        match root.head() {
            Some("kicad_pcb") => {}
            Some(other) => {
                return Err(PcbParseError::InvalidFormat(format!(
                    "Expected kicad_pcb, found {}",
                    other
                )))
            }
            None => {
                return Err(PcbParseError::InvalidFormat(
                    "Expected kicad_pcb root".to_string(),
                ))
            }
        }

        let mut pcb = PcbDesign {
            uuid: fields::uuid(root),
            filename: filename.to_string(),
            version: root.value("version").map(str::to_string),
            ..Default::default()
        };
        let mut errors = Vec::new();

        // Tables first: items may only be checked once both are known
        for item in root.children().skip(1) {
            let Some(head) = item.head() else { continue };
            let result = match PcbItem::from_head(head) {
                PcbItem::General => {
                    pcb.thickness = item.parse_value("thickness");
                    Ok(())
                }
                PcbItem::Layers => {
                    pcb.layers = Self::parse_layers(item);
                    Ok(())
                }
                PcbItem::Net => Self::parse_net(item).map(|net| pcb.nets.push(net)),
                _ => Ok(()),
            };
            if let Err(e) = result {
                errors.push(e);
            }
        }
        let ctx = BoardContext::new(std::mem::take(&mut pcb.layers), &pcb.nets);

        for item in root.children().skip(1) {
            let Some(head) = item.head() else { continue };
            let result = match PcbItem::from_head(head) {
                PcbItem::General | PcbItem::Layers | PcbItem::Net | PcbItem::Unknown => Ok(()),
                PcbItem::Footprint => Self::parse_footprint(item, &ctx, &mut errors)
                    .map(|fp| pcb.footprints.push(fp)),
                PcbItem::Segment => {
                    Self::parse_track(item, TrackKind::Segment, &ctx).map(|t| pcb.tracks.push(t))
                }
                PcbItem::Arc => fields::point(item, "mid", None)
                    .and_then(|mid| Self::parse_track(item, TrackKind::Arc { mid }, &ctx))
                    .map(|t| pcb.tracks.push(t)),
                PcbItem::Via => Self::parse_via(item, &ctx).map(|v| pcb.vias.push(v)),
                PcbItem::Zone => Self::parse_zone(item, &ctx).map(|z| pcb.zones.push(z)),
                PcbItem::Graphic(kind) => {
                    Self::parse_graphic(item, kind).map(|g| pcb.graphics.push(g))
                }
            };
            if let Err(e) = result {
                tracing::warn!("{}: skipping entity: {}", filename, e);
                errors.push(e);
            }
        }
        pcb.layers = ctx.layers;

        tracing::debug!(
            "Extracted {}: {} footprints, {} tracks, {} vias, {} zones",
            filename,
            pcb.footprints.len(),
            pcb.tracks.len(),
            pcb.vias.len(),
            pcb.zones.len()
        );

        Ok(Extraction { value: pcb, errors })
    }

    fn parse_layers(sexp: NodeRef<'_>) -> Vec<PcbLayer> {
        sexp.children()
            .skip(1)
            .filter(|l| l.len() >= 3)
            .filter_map(|l| {
                let ordinal = l.head()?.parse().ok()?;
                Some(PcbLayer {
                    ordinal,
                    canonical_name: l.arg(0)?.to_string(),
                    layer_type: LayerType::from_keyword(l.arg(1).unwrap_or("signal")),
                    user_name: l.arg(2).map(str::to_string),
                })
            })
            .collect()
    }

    fn parse_net(sexp: NodeRef<'_>) -> Result<PcbNet, ExtractionError> {
        Ok(PcbNet {
            id: fields::arg(sexp, 0, "id", None)?,
            name: sexp.arg(1).unwrap_or_default().to_string(),
        })
    }

    fn declared_layers(sexp: NodeRef<'_>) -> Vec<String> {
        sexp.get("layers")
            .map(|l| l.children().skip(1).filter_map(|c| c.as_atom()).map(str::to_string).collect())
            .or_else(|| sexp.value("layer").map(|l| vec![l.to_string()]))
            .unwrap_or_default()
    }

    fn parse_footprint(
        sexp: NodeRef<'_>,
        ctx: &BoardContext,
        errors: &mut Vec<ExtractionError>,
    ) -> Result<Footprint, ExtractionError> {
        let mut properties: std::collections::BTreeMap<String, String> = sexp
            .get_all("property")
            .filter_map(|p| Some((p.arg(0)?.to_string(), p.arg(1)?.to_string())))
            .collect();
        // Older boards carry reference and value as fp_text
        for text in sexp.get_all("fp_text") {
            match (text.arg(0), text.arg(1)) {
                (Some("reference"), Some(v)) => {
                    properties.entry("Reference".to_string()).or_insert_with(|| v.to_string());
                }
                (Some("value"), Some(v)) => {
                    properties.entry("Value".to_string()).or_insert_with(|| v.to_string());
                }
                _ => {}
            }
        }

        let reference = properties
            .get("Reference")
            .cloned()
            .ok_or_else(|| fields::missing(sexp, "Reference", None))?;
        let r = Some(reference.as_str());
        let value = properties.get("Value").cloned().unwrap_or_default();

        let layer = sexp
            .value("layer")
            .ok_or_else(|| fields::missing(sexp, "layer", r))?;
        ctx.validate(sexp, layer, r)?;
        let (position, rotation) = fields::at(sexp, r)?;

        let mut footprint = Footprint {
            uuid: fields::uuid(sexp),
            reference: reference.clone(),
            value,
            footprint_lib: sexp.arg(0).unwrap_or_default().to_string(),
            layer: layer.to_string(),
            position,
            rotation,
            pads: Vec::new(),
            properties,
            attributes: sexp
                .get("attr")
                .map(|a| a.children().skip(1).filter_map(|c| c.as_atom()).map(str::to_string).collect())
                .unwrap_or_default(),
        };

        for pad in sexp.get_all("pad") {
            match Self::parse_pad(pad, &footprint, ctx) {
                Ok(p) => footprint.pads.push(p),
                Err(e) => {
                    tracing::warn!("{}: skipping pad: {}", reference, e);
                    errors.push(e);
                }
            }
        }
        Ok(footprint)
    }

    fn parse_pad(sexp: NodeRef<'_>, footprint: &Footprint, ctx: &BoardContext) -> Result<Pad, ExtractionError> {
        let r = Some(footprint.reference.as_str());
        let number = sexp.arg(0).ok_or_else(|| fields::missing(sexp, "number", r))?;
        let kind = sexp.arg(1).ok_or_else(|| fields::missing(sexp, "type", r))?;
        let pad_type = PadType::from_keyword(kind).ok_or_else(|| fields::invalid(sexp, "type", kind, r))?;
        let shape_name = sexp.arg(2).ok_or_else(|| fields::missing(sexp, "shape", r))?;
        let shape =
            PadShape::from_keyword(shape_name).ok_or_else(|| fields::invalid(sexp, "shape", shape_name, r))?;

        let (local_position, _) = fields::at(sexp, r)?;
        let size = fields::point(sexp, "size", r)
            .map(|p| Size2D {
                width: p.x,
                height: p.y,
            })
            .unwrap_or_default();

        let drill = match sexp.get("drill") {
            Some(d) => {
                let oval = d.arg(0) == Some("oval");
                let diameter = fields::arg(d, usize::from(oval), "drill", r)?;
                Some(DrillInfo {
                    diameter,
                    oval,
                    offset: fields::point(d, "offset", r).ok(),
                })
            }
            None => None,
        };

        let layers = Self::declared_layers(sexp);
        let copper_layers = ctx.copper_layers(sexp, &layers, r)?;
        let (net, net_name) = ctx.net(sexp);

        Ok(Pad {
            number: number.to_string(),
            pad_type,
            shape,
            local_position,
            position: footprint.to_board(&local_position),
            size,
            drill,
            layers,
            copper_layers,
            net,
            net_name: net_name.filter(|n| !n.is_empty()),
        })
    }

    fn parse_track(sexp: NodeRef<'_>, kind: TrackKind, ctx: &BoardContext) -> Result<Track, ExtractionError> {
        let start = fields::point(sexp, "start", None)?;
        let end = fields::point(sexp, "end", None)?;
        let width = fields::required(sexp, "width", None)?;
        let layer = sexp
            .value("layer")
            .ok_or_else(|| fields::missing(sexp, "layer", None))?;
        ctx.validate(sexp, layer, None)?;
        let (net, net_name) = ctx.net(sexp);

        Ok(Track {
            uuid: fields::uuid(sexp),
            kind,
            start,
            end,
            width,
            layer: layer.to_string(),
            net: net.unwrap_or(0),
            net_name: net_name.filter(|n| !n.is_empty()),
            locked: sexp.has_flag("locked"),
        })
    }

    fn parse_via(sexp: NodeRef<'_>, ctx: &BoardContext) -> Result<Via, ExtractionError> {
        let (position, _) = fields::at(sexp, None)?;
        let size = fields::required(sexp, "size", None)?;
        let drill = fields::required(sexp, "drill", None)?;

        let declared = Self::declared_layers(sexp);
        let layers = match declared.as_slice() {
            [start, end, ..] => (start.clone(), end.clone()),
            _ => ("F.Cu".to_string(), "B.Cu".to_string()),
        };
        ctx.validate(sexp, &layers.0, None)?;
        ctx.validate(sexp, &layers.1, None)?;
        let copper_layers = ctx.span(&layers.0, &layers.1);

        let via_type = if sexp.has_flag("blind") {
            ViaType::Blind
        } else if sexp.has_flag("micro") {
            ViaType::Micro
        } else if copper_layers.len() < ctx.copper_names().len() {
            ViaType::Buried
        } else {
            ViaType::Through
        };
        let (net, net_name) = ctx.net(sexp);

        Ok(Via {
            uuid: fields::uuid(sexp),
            position,
            size,
            drill,
            layers,
            copper_layers,
            net: net.unwrap_or(0),
            net_name: net_name.filter(|n| !n.is_empty()),
            via_type,
            locked: sexp.has_flag("locked"),
        })
    }

    fn parse_zone(sexp: NodeRef<'_>, ctx: &BoardContext) -> Result<Zone, ExtractionError> {
        let declared = Self::declared_layers(sexp);
        let layers = ctx.copper_layers(sexp, &declared, None)?;
        let (net, declared_name) = ctx.net(sexp);
        let net_name = sexp
            .value("net_name")
            .map(str::to_string)
            .or(declared_name)
            .unwrap_or_default();

        let connect_pads = match sexp.get("connect_pads").and_then(|c| c.arg(0)) {
            Some("yes") => ZoneConnectType::Solid,
            Some("no") => ZoneConnectType::None,
            _ => ZoneConnectType::ThermalRelief,
        };

        let outline = match sexp.get("polygon").and_then(|p| p.get("pts")) {
            Some(pts) => fields::pts(pts, None)?,
            None => return Err(fields::missing(sexp, "polygon", None)),
        };

        let mut filled_polygons = Vec::new();
        for fp in sexp.get_all("filled_polygon") {
            if let Some(pts) = fp.get("pts") {
                filled_polygons.push(FilledPolygon {
                    layer: fp.value("layer").unwrap_or_default().to_string(),
                    points: fields::pts(pts, None)?,
                });
            }
        }

        let keepout = sexp.get("keepout").map(|ko| {
            let not_allowed = |key: &str| ko.value(key) == Some("not_allowed");
            ZoneKeepout {
                tracks: not_allowed("tracks"),
                vias: not_allowed("vias"),
                pads: not_allowed("pads"),
                copperpour: not_allowed("copperpour"),
                footprints: not_allowed("footprints"),
            }
        });

        Ok(Zone {
            uuid: fields::uuid(sexp),
            net: net.unwrap_or(0),
            net_name,
            layers,
            priority: fields::optional(sexp, "priority", None)?.unwrap_or(0),
            connect_pads,
            outline,
            filled_polygons,
            keepout,
        })
    }

    fn parse_graphic(sexp: NodeRef<'_>, item_type: GraphicType) -> Result<GraphicItem, ExtractionError> {
        let layer = sexp
            .value("layer")
            .ok_or_else(|| fields::missing(sexp, "layer", None))?;
        let (start, end, points) = match item_type {
            GraphicType::Polygon => {
                let pts = sexp.get("pts").ok_or_else(|| fields::missing(sexp, "pts", None))?;
                let points = fields::pts(pts, None)?;
                let first = points.first().copied().unwrap_or_default();
                (first, None, points)
            }
            GraphicType::Circle => {
                let key = if sexp.get("center").is_some() { "center" } else { "start" };
                (fields::point(sexp, key, None)?, Some(fields::point(sexp, "end", None)?), Vec::new())
            }
            GraphicType::Arc => {
                let mid = fields::point(sexp, "mid", None).ok();
                (
                    fields::point(sexp, "start", None)?,
                    Some(fields::point(sexp, "end", None)?),
                    mid.into_iter().collect(),
                )
            }
            GraphicType::Line | GraphicType::Rect => (
                fields::point(sexp, "start", None)?,
                Some(fields::point(sexp, "end", None)?),
                Vec::new(),
            ),
        };
        let width = match sexp.get("stroke") {
            Some(stroke) => fields::optional(stroke, "width", None)?,
            None => fields::optional(sexp, "width", None)?,
        }
        .unwrap_or(0.0);

        Ok(GraphicItem {
            item_type,
            layer: layer.to_string(),
            start,
            end,
            points,
            width,
            fill: matches!(sexp.value("fill"), Some("solid") | Some("yes")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYERS: &str = r#"
  (layers
    (0 "F.Cu" signal)
    (1 "In1.Cu" power "GND_PLANE")
    (2 "In2.Cu" signal)
    (31 "B.Cu" signal)
    (35 "F.Paste" user)
    (36 "B.SilkS" user "B.Silkscreen")
    (39 "F.Mask" user)
    (44 "Edge.Cuts" user))
  (net 0 "")
  (net 1 "VCC")
  (net 2 "GND")"#;

    fn board(body: &str) -> Extraction<PcbDesign> {
        let content = format!("(kicad_pcb (version 20221018) (generator pcbnew) {} {})", LAYERS, body);
        PcbParser::parse_pcb_str(&content, "test.kicad_pcb").unwrap()
    }

    #[test]
    fn test_rejects_other_roots() {
        assert!(matches!(
            PcbParser::parse_pcb_str("(kicad_sch)", "x"),
            Err(PcbParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_layers_and_nets() {
        let ex = board("");
        let pcb = &ex.value;
        assert_eq!(pcb.layers.len(), 8);
        assert_eq!(pcb.layers[1].layer_type, LayerType::Power);
        assert_eq!(pcb.layers[1].user_name.as_deref(), Some("GND_PLANE"));
        assert_eq!(pcb.copper_layers().count(), 4);
        assert_eq!(pcb.net_name(2), Some("GND"));
    }

    #[test]
    fn test_footprint_pads_rotate_with_footprint() {
        let ex = board(
            r#"(footprint "Resistor_SMD:R_0603_1608Metric" (layer "F.Cu") (at 100 50 90)
                 (property "Reference" "R1") (property "Value" "10k")
                 (pad "1" smd roundrect (at -0.825 0 90) (size 0.8 0.95)
                   (layers "F.Cu" "F.Paste" "F.Mask") (net 1 "VCC"))
                 (pad "2" smd roundrect (at 0.825 0 90) (size 0.8 0.95)
                   (layers "F.Cu" "F.Paste" "F.Mask") (net 2 "GND")))"#,
        );
        assert!(ex.errors.is_empty(), "{:?}", ex.errors);
        let fp = ex.value.footprint("R1").unwrap();
        assert_eq!(fp.value, "10k");
        let pad1 = fp.pad("1").unwrap();
        assert_eq!(pad1.local_position, Position::new(-0.825, 0.0));
        assert!(pad1.position.distance(&Position::new(100.0, 50.825)) < 1e-9);
        assert_eq!(pad1.copper_layers, vec!["F.Cu".to_string()]);
        assert_eq!(pad1.net_name.as_deref(), Some("VCC"));
        assert_eq!(fp.pad("2").unwrap().net, Some(2));
    }

    #[test]
    fn test_legacy_module_and_wildcards() {
        let ex = board(
            r#"(module "Connector:Pin_1" (layer "F.Cu") (at 10 10)
                 (fp_text reference "J1" (at 0 0)) (fp_text value "CONN" (at 0 2))
                 (pad "1" thru_hole circle (at 0 0) (size 1.7 1.7) (drill 1)
                   (layers "*.Cu" "*.Mask") (net 1))
                 (pad "" np_thru_hole circle (at 3 0) (size 3 3) (drill 3) (layers "F&B.Cu" "*.Mask")))"#,
        );
        assert!(ex.errors.is_empty(), "{:?}", ex.errors);
        let fp = ex.value.footprint("J1").unwrap();
        assert_eq!(fp.value, "CONN");
        let pad = fp.pad("1").unwrap();
        assert_eq!(pad.copper_layers.len(), 4);
        assert_eq!(pad.net_name.as_deref(), Some("VCC"));
        assert_eq!(pad.drill.as_ref().map(|d| d.diameter), Some(1.0));
        assert!(!fp.pads[1].is_electrical());
    }

    #[test]
    fn test_unknown_layer_reported() {
        let ex = board(
            r#"(segment (start 0 0) (end 10 0) (width 0.25) (layer "In7.Cu") (net 1))
               (segment (start 0 0) (end 10 0) (width 0.25) (layer "F.Cu") (net 1))"#,
        );
        assert_eq!(ex.value.tracks.len(), 1);
        assert!(matches!(
            &ex.errors[0],
            ExtractionError::UnknownLayer { layer, .. } if layer == "In7.Cu"
        ));
    }

    #[test]
    fn test_file_without_layer_table_skips_validation() {
        let content = r#"(kicad_pcb (version 4)
            (segment (start 0 0) (end 1 0) (width 0.2) (layer "Whatever.Cu") (net 0)))"#;
        let ex = PcbParser::parse_pcb_str(content, "old.kicad_pcb").unwrap();
        assert!(ex.errors.is_empty());
        assert_eq!(ex.value.tracks[0].net_name, None);
    }

    #[test]
    fn test_tracks_vias_zones() {
        let ex = board(
            r#"(segment (start 0 0) (end 3 4) (width 0.25) (layer "F.Cu") (net 1) (uuid "3f0a1b2c-4d5e-4f60-8a7b-9c0d1e2f3a4b"))
               (arc (start 0 0) (mid 1 1) (end 2 0) (width 0.25) (layer "B.Cu") (net 1))
               (via (at 3 4) (size 0.8) (drill 0.4) (layers "F.Cu" "B.Cu") (net 1))
               (via blind (at 5 5) (size 0.6) (drill 0.3) (layers "F.Cu" "In1.Cu") (net 2))
               (zone (net 2) (net_name "GND") (layers "F.Cu" "B.Cu") (priority 1)
                 (connect_pads yes (clearance 0.5))
                 (polygon (pts (xy 0 0) (xy 20 0) (xy 20 20) (xy 0 20))))
               (gr_rect (start 0 0) (end 40 30) (stroke (width 0.1) (type default)) (fill none) (layer "Edge.Cuts"))"#,
        );
        assert!(ex.errors.is_empty(), "{:?}", ex.errors);
        let pcb = &ex.value;
        assert_eq!(pcb.tracks.len(), 2);
        assert!(pcb.tracks[0].uuid.is_some());
        assert_eq!(pcb.tracks[0].net_name.as_deref(), Some("VCC"));
        assert!(matches!(pcb.tracks[1].kind, TrackKind::Arc { .. }));

        assert_eq!(pcb.vias[0].copper_layers.len(), 4);
        assert_eq!(pcb.vias[0].via_type, ViaType::Through);
        assert_eq!(pcb.vias[1].copper_layers, vec!["F.Cu".to_string(), "In1.Cu".to_string()]);
        assert_eq!(pcb.vias[1].via_type, ViaType::Blind);

        let zone = &pcb.zones[0];
        assert_eq!(zone.net_name, "GND");
        assert_eq!(zone.connect_pads, ZoneConnectType::Solid);
        assert_eq!(zone.priority, 1);
        assert!(zone.contains(&Position::new(5.0, 5.0)));

        let stats = pcb.statistics();
        assert_eq!(stats.total_vias, 2);
        assert_eq!(stats.board_dimensions, Some((40.0, 30.0)));
        assert_eq!(stats.zones_by_layer.get("B.Cu"), Some(&1));
    }

    #[test]
    fn test_footprint_without_reference() {
        let ex = board(r#"(footprint "X:Y" (layer "F.Cu") (at 0 0))"#);
        assert!(ex.value.footprints.is_empty());
        assert!(matches!(
            &ex.errors[0],
            ExtractionError::MissingField { field, .. } if field == "Reference"
        ));
    }
}
