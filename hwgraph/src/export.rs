//! KiCad-style netlist export
//!
//! Writes a resolved design as an `(export ...)` S-expression netlist and
//! reads one back into a [`Netlist`]:
//!
//! ```text
//! (export (version "E")
//!   (design (source "board.kicad_sch") (tool "hwgraph"))
//!   (components (comp (ref "R1") (value "10k") (footprint "R_0603")))
//!   (nets (net (code "1") (name "GND") (node (ref "R1") (pin "2")))))
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::diagram::DiagramSource;
use crate::parser::diagnostics::ExtractionError;
use crate::parser::fields;
use crate::parser::netlist::{NameSource, Net, Netlist, PinRef};
use crate::parser::sexp::{ParseError, SExp, SExpTree};

#[derive(Error, Debug)]
pub enum NetlistParseError {
    #[error("S-expression parse error: {0}")]
    SExpParse(#[from] ParseError),
    #[error("Invalid netlist format: {0}")]
    InvalidFormat(String),
    #[error("{0}")]
    Field(#[from] ExtractionError),
}

/// Netlist S-expression for `source`. `design` names the source file.
pub fn to_netlist(source: &impl DiagramSource, design: &str) -> SExp {
    let mut seen = HashSet::new();
    let components = source
        .bom_parts()
        .into_iter()
        .filter(|p| seen.insert(p.reference))
        .map(|p| {
            let mut comp = vec![
                SExp::list("ref", [SExp::string(p.reference)]),
                SExp::list("value", [SExp::string(p.value)]),
            ];
            if !p.footprint.is_empty() {
                comp.push(SExp::list("footprint", [SExp::string(p.footprint)]));
            }
            if !p.library.is_empty() {
                comp.push(SExp::list("libsource", [SExp::list("lib", [SExp::string(p.library)])]));
            }
            SExp::list("comp", comp)
        });

    let nets = source.netlist().nets.iter().map(|net| {
        let mut items = vec![
            SExp::list("code", [SExp::string(net.code.to_string())]),
            SExp::list("name", [SExp::string(net.name.clone())]),
        ];
        items.extend(net.pins.iter().map(|pin| {
            SExp::list(
                "node",
                [
                    SExp::list("ref", [SExp::string(pin.reference.clone())]),
                    SExp::list("pin", [SExp::string(pin.pin.clone())]),
                ],
            )
        }));
        SExp::list("net", items)
    });

    SExp::list(
        "export",
        [
            SExp::list("version", [SExp::string("E")]),
            SExp::list(
                "design",
                [
                    SExp::list("source", [SExp::string(design)]),
                    SExp::list("tool", [SExp::string("hwgraph")]),
                ],
            ),
            SExp::list("components", components),
            SExp::list("nets", nets),
        ],
    )
}

/// Read the `nets` section of an exported netlist.
pub fn parse_netlist(content: &str) -> Result<Netlist, NetlistParseError> {
    let tree = SExpTree::parse(content)?;
    let root = tree.root();
    if root.head() != Some("export") {
        return Err(NetlistParseError::InvalidFormat(format!(
            "expected (export ...), found ({} ...)",
            root.head().unwrap_or_default()
        )));
    }

    let mut nets = Vec::new();
    if let Some(section) = root.get("nets") {
        for net in section.get_all("net") {
            let code: u32 = fields::required(net, "code", None)?;
            let name = net
                .value("name")
                .ok_or_else(|| fields::missing(net, "name", None))?
                .to_string();

            let mut pins = net
                .get_all("node")
                .map(|node| {
                    let reference: String = fields::required(node, "ref", None)?;
                    let pin: String = fields::required(node, "pin", Some(&reference))?;
                    Ok(PinRef::new(reference, pin))
                })
                .collect::<Result<Vec<_>, ExtractionError>>()?;
            pins.sort();

            let generated = pins
                .first()
                .is_some_and(|first| name == format!("Net-({})", first));
            nets.push(Net {
                code,
                name,
                source: if generated {
                    NameSource::Generated
                } else {
                    NameSource::Declared
                },
                pins,
            });
        }
    }

    tracing::debug!("Read {} nets from netlist", nets.len());
    Ok(Netlist {
        nets,
        conflicts: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_netlist() {
        let text = r#"(export (version "E")
          (components (comp (ref "R1") (value "10k")))
          (nets
            (net (code "1") (name "GND") (node (ref "R1") (pin "2")) (node (ref "C1") (pin "2")))
            (net (code "2") (name "Net-(R1-1)") (node (ref "R1") (pin "1")))))"#;
        let netlist = parse_netlist(text).unwrap();
        assert_eq!(netlist.nets.len(), 2);
        let gnd = netlist.net("GND").unwrap();
        assert_eq!(gnd.pins, vec![PinRef::new("C1", "2"), PinRef::new("R1", "2")]);
        assert_eq!(gnd.source, NameSource::Declared);
        assert_eq!(netlist.nets[1].source, NameSource::Generated);
    }

    #[test]
    fn test_parse_netlist_errors() {
        assert!(matches!(
            parse_netlist("(kicad_sch)"),
            Err(NetlistParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_netlist("(export (nets (net (name \"A\"))))"),
            Err(NetlistParseError::Field(ExtractionError::MissingField { .. }))
        ));
        assert!(matches!(
            parse_netlist("(export (nets"),
            Err(NetlistParseError::SExpParse(_))
        ));
    }
}
