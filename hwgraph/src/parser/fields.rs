//! Readers for the field shapes shared by schematic and board files:
//! `(at X Y [ANGLE])`, `(pts (xy X Y) ...)`, `(property "KEY" "VALUE")`,
//! `(uuid ...)`.

use std::str::FromStr;

use uuid::Uuid;

use super::diagnostics::ExtractionError;
use super::schema::Position;
use super::sexp::NodeRef;

pub(crate) fn missing(node: NodeRef<'_>, field: &str, reference: Option<&str>) -> ExtractionError {
    ExtractionError::MissingField {
        keyword: node.head().unwrap_or_default().to_string(),
        field: field.to_string(),
        reference: reference.map(str::to_string),
        location: node.location(),
    }
}

pub(crate) fn invalid(
    node: NodeRef<'_>,
    field: &str,
    value: &str,
    reference: Option<&str>,
) -> ExtractionError {
    ExtractionError::InvalidValue {
        keyword: node.head().unwrap_or_default().to_string(),
        field: field.to_string(),
        value: value.to_string(),
        reference: reference.map(str::to_string),
        location: node.location(),
    }
}

/// Parse argument `index` of `node`, reporting absence or garbage against
/// the field name `field`.
pub(crate) fn arg<T: FromStr>(
    node: NodeRef<'_>,
    index: usize,
    field: &str,
    reference: Option<&str>,
) -> Result<T, ExtractionError> {
    let raw = node
        .arg(index)
        .ok_or_else(|| missing(node, field, reference))?;
    raw.parse()
        .map_err(|_| invalid(node, field, raw, reference))
}

/// `(key value)` child parsed as `T`; `Ok(None)` when the child is absent.
pub(crate) fn optional<T: FromStr>(
    node: NodeRef<'_>,
    key: &str,
    reference: Option<&str>,
) -> Result<Option<T>, ExtractionError> {
    match node.get(key) {
        Some(child) => arg(child, 0, key, reference).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn required<T: FromStr>(
    node: NodeRef<'_>,
    key: &str,
    reference: Option<&str>,
) -> Result<T, ExtractionError> {
    optional(node, key, reference)?.ok_or_else(|| missing(node, key, reference))
}

/// `(key X Y)` as a point.
pub(crate) fn point(
    node: NodeRef<'_>,
    key: &str,
    reference: Option<&str>,
) -> Result<Position, ExtractionError> {
    let child = node.get(key).ok_or_else(|| missing(node, key, reference))?;
    Ok(Position::new(
        arg(child, 0, key, reference)?,
        arg(child, 1, key, reference)?,
    ))
}

/// `(at X Y [ANGLE])`; the angle defaults to 0.
pub(crate) fn at(node: NodeRef<'_>, reference: Option<&str>) -> Result<(Position, f64), ExtractionError> {
    let position = point(node, "at", reference)?;
    let rotation = match node.get("at").and_then(|at| at.arg(2).map(|raw| (at, raw))) {
        Some((at, raw)) => raw.parse().map_err(|_| invalid(at, "angle", raw, reference))?,
        None => 0.0,
    };
    Ok((position, rotation))
}

/// Every `(xy X Y)` inside `(pts ...)`. Other point kinds (`arc`) are skipped.
pub(crate) fn pts(pts: NodeRef<'_>, reference: Option<&str>) -> Result<Vec<Position>, ExtractionError> {
    pts.get_all("xy")
        .map(|xy| Ok(Position::new(arg(xy, 0, "xy", reference)?, arg(xy, 1, "xy", reference)?)))
        .collect()
}

/// Value of `(property "KEY" "VALUE" ...)`.
pub(crate) fn property<'t>(node: NodeRef<'t>, key: &str) -> Option<&'t str> {
    node.get_all("property")
        .find(|p| p.arg(0) == Some(key))
        .and_then(|p| p.arg(1))
}

/// `(uuid ...)`, or `(tstamp ...)` in older files. Unparseable ids are
/// treated as absent.
pub(crate) fn uuid(node: NodeRef<'_>) -> Option<Uuid> {
    node.value("uuid")
        .or_else(|| node.value("tstamp"))
        .and_then(|s| Uuid::parse_str(s).ok())
}
