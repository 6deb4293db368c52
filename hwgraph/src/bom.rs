//! Bill of Materials
//!
//! Groups placed parts by (value, footprint). References inside a group are
//! distinct and naturally ordered (R1 < R2 < R10); groups are ordered by
//! value then footprint. Power symbols, parts marked `in_bom no` or
//! `exclude_from_bom`, and references starting with `#` are left out.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::io;

use serde::{Deserialize, Serialize};

use crate::model::{PcbModel, ProjectModel, SchematicModel};
use crate::parser::schema::Symbol;

/// One placed part as seen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BomPart<'a> {
    pub reference: &'a str,
    pub value: &'a str,
    pub footprint: &'a str,
    pub library: &'a str,
}

/// Anything that can list its placed parts in declaration order.
pub trait BomSource {
    fn bom_parts(&self) -> Vec<BomPart<'_>>;
}

fn symbol_parts<'a>(symbols: impl Iterator<Item = &'a Symbol>) -> Vec<BomPart<'a>> {
    symbols
        .filter(|s| s.in_bom && !s.power)
        .map(|s| BomPart {
            reference: &s.reference,
            value: &s.value,
            footprint: s.footprint.as_deref().unwrap_or_default(),
            library: &s.lib_id,
        })
        .collect()
}

impl BomSource for SchematicModel {
    fn bom_parts(&self) -> Vec<BomPart<'_>> {
        symbol_parts(self.schematic.symbols.iter())
    }
}

impl BomSource for ProjectModel {
    fn bom_parts(&self) -> Vec<BomPart<'_>> {
        symbol_parts(self.symbols())
    }
}

impl BomSource for PcbModel {
    fn bom_parts(&self) -> Vec<BomPart<'_>> {
        self.pcb
            .footprints
            .iter()
            .filter(|fp| fp.in_bom())
            .map(|fp| BomPart {
                reference: &fp.reference,
                value: &fp.value,
                footprint: &fp.footprint_lib,
                library: &fp.footprint_lib,
            })
            .collect()
    }
}

/// String with natural ordering (C1 < C2 < C10). Strings that compare equal
/// naturally ("R01", "R1") fall back to byte order so they stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalString(String);

impl NaturalString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NaturalString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for NaturalString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NaturalString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for NaturalString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NaturalString {
    fn cmp(&self, other: &Self) -> Ordering {
        natord::compare(&self.0, &other.0).then_with(|| self.0.cmp(&other.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomEntry {
    pub value: String,
    pub footprint: String,
    pub references: Vec<String>,
    pub quantity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomRecord {
    pub entries: Vec<BomEntry>,
}

impl BomRecord {
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = BomPart<'a>>) -> Self {
        let mut groups: BTreeMap<(&str, &str), BTreeSet<NaturalString>> = BTreeMap::new();
        for part in parts {
            if part.reference.starts_with('#') {
                continue;
            }
            groups
                .entry((part.value.trim(), part.footprint.trim()))
                .or_default()
                .insert(NaturalString::new(part.reference.trim()));
        }

        let entries = groups
            .into_iter()
            .map(|((value, footprint), refs)| BomEntry {
                value: value.to_string(),
                footprint: footprint.to_string(),
                quantity: refs.len(),
                references: refs.into_iter().map(|r| r.0).collect(),
            })
            .collect();
        BomRecord { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every entry's quantity.
    pub fn total_quantity(&self) -> usize {
        self.entries.iter().map(|e| e.quantity).sum()
    }

    /// Every reference, entry by entry.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|e| e.references.iter().map(String::as_str))
    }

    /// CSV with an `Item, Quantity, References, Value, Footprint` header.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["Item", "Quantity", "References", "Value", "Footprint"])?;
        for (i, entry) in self.entries.iter().enumerate() {
            wtr.write_record([
                (i + 1).to_string(),
                entry.quantity.to_string(),
                entry.references.join(", "),
                entry.value.clone(),
                entry.footprint.clone(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("| Item | Quantity | References | Value | Footprint |\n");
        out.push_str("|------|----------|------------|-------|-----------|\n");
        for (i, entry) in self.entries.iter().enumerate() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                i + 1,
                entry.quantity,
                markdown_cell(&entry.references.join(", ")),
                markdown_cell(&entry.value),
                markdown_cell(&entry.footprint),
            );
        }
        out
    }
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Aggregate the parts of `source`.
pub fn to_bom(source: &impl BomSource) -> BomRecord {
    BomRecord::from_parts(source.bom_parts())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part<'a>(reference: &'a str, value: &'a str, footprint: &'a str) -> BomPart<'a> {
        BomPart {
            reference,
            value,
            footprint,
            library: "Device:R",
        }
    }

    #[test]
    fn test_natural_order_and_dedup() {
        let bom = BomRecord::from_parts(vec![
            part("R10", "10k", "R_0603"),
            part("R2", "10k", "R_0603"),
            part("R1", "10k", "R_0603"),
            part("R2", "10k", "R_0603"),
        ]);
        assert_eq!(bom.len(), 1);
        assert_eq!(bom.entries[0].references, vec!["R1", "R2", "R10"]);
        assert_eq!(bom.entries[0].quantity, 3);
    }

    #[test]
    fn test_grouping_is_trimmed_and_case_sensitive() {
        let bom = BomRecord::from_parts(vec![
            part("C1", "100nF ", "C_0402"),
            part("C2", "100nF", " C_0402"),
            part("C3", "100NF", "C_0402"),
            part("#PWR01", "GND", ""),
        ]);
        assert_eq!(bom.len(), 2);
        assert_eq!(bom.entries[0].value, "100NF");
        assert_eq!(bom.entries[1].references, vec!["C1", "C2"]);
        assert_eq!(bom.total_quantity(), 3);
    }

    #[test]
    fn test_natural_string_keeps_zero_padded_distinct() {
        let a = NaturalString::from("R01");
        let b = NaturalString::from("R1");
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert!(NaturalString::from("C2") < NaturalString::from("C10"));
    }

    #[test]
    fn test_csv_and_markdown() {
        let bom = BomRecord::from_parts(vec![
            part("R1", "10k", "R_0603"),
            part("R2", "10k", "R_0603"),
            part("C1", "1u", "C_0805"),
        ]);
        let csv = bom.to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Item,Quantity,References,Value,Footprint"));
        assert_eq!(lines.next(), Some("1,2,\"R1, R2\",10k,R_0603"));
        assert_eq!(lines.next(), Some("2,1,C1,1u,C_0805"));

        let md = bom.to_markdown();
        assert!(md.starts_with("| Item | Quantity | References | Value | Footprint |"));
        assert!(md.contains("| 1 | 2 | R1, R2 | 10k | R_0603 |"));
    }
}
