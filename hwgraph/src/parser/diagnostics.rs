//! Recoverable problems found while extracting and resolving a file.
//!
//! Syntax errors abort a file. Everything here does not: the offending
//! entity is skipped (or, for net conflicts, a name is picked) and the
//! problem travels next to the partial result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::lexer::Location;

fn in_reference(reference: &Option<String>) -> String {
    match reference {
        Some(r) => format!(" of {}", r),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExtractionError {
    #[error("missing field '{field}' in ({keyword}){} at {location}", in_reference(.reference))]
    MissingField {
        keyword: String,
        field: String,
        reference: Option<String>,
        location: Location,
    },
    #[error("invalid value {value:?} for '{field}' in ({keyword}){} at {location}", in_reference(.reference))]
    InvalidValue {
        keyword: String,
        field: String,
        value: String,
        reference: Option<String>,
        location: Location,
    },
    #[error("({keyword}){} uses undeclared layer '{layer}' at {location}", in_reference(.reference))]
    UnknownLayer {
        keyword: String,
        layer: String,
        reference: Option<String>,
        location: Location,
    },
    #[error("symbol {reference} refers to library symbol '{lib_id}' which is not embedded in the file ({location})")]
    UnknownLibrary {
        reference: String,
        lib_id: String,
        location: Location,
    },
    #[error("duplicate reference {reference} (unit {unit}) at {location}")]
    DuplicateReference {
        reference: String,
        unit: u32,
        location: Location,
    },
}

impl ExtractionError {
    pub fn location(&self) -> Location {
        match self {
            ExtractionError::MissingField { location, .. }
            | ExtractionError::InvalidValue { location, .. }
            | ExtractionError::UnknownLayer { location, .. }
            | ExtractionError::UnknownLibrary { location, .. }
            | ExtractionError::DuplicateReference { location, .. } => *location,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            ExtractionError::MissingField { reference, .. }
            | ExtractionError::InvalidValue { reference, .. }
            | ExtractionError::UnknownLayer { reference, .. } => reference.as_deref(),
            ExtractionError::UnknownLibrary { reference, .. }
            | ExtractionError::DuplicateReference { reference, .. } => Some(reference),
        }
    }
}

/// Two or more explicit names landed on one connected set.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("net naming conflict: {} are connected, using '{chosen}'", .names.join(", "))]
pub struct NetConflictError {
    /// Every distinct name found on the set, in the order they were applied
    pub names: Vec<String>,
    pub chosen: String,
}

/// Everything recoverable reported for one file (or one project).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub file: String,
    pub extraction: Vec<ExtractionError>,
    pub conflicts: Vec<NetConflictError>,
}

impl Diagnostics {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.extraction.is_empty() && self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extraction.len() + self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_clean()
    }
}

/// Output of an extractor: the entities that could be read plus the
/// errors for the ones that were skipped.
#[derive(Debug, Clone)]
pub struct Extraction<T> {
    pub value: T,
    pub errors: Vec<ExtractionError>,
}
