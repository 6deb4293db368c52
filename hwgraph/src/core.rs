//! Core extraction API: single files, hierarchical projects and batches.
//! Holds no global state; every call builds its own values.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::bom::to_bom;
use crate::diagram::{to_diagram, DiagramSource};
use crate::model::{PcbModel, ProjectModel, SchematicModel, SkipReason, SkippedSheet};
use crate::parser::diagnostics::{Diagnostics, Extraction};
use crate::parser::format_detector::{detect_format, detect_version, DesignFormat};
use crate::parser::kicad::{KicadParseError, KicadParser};
use crate::parser::lexer::LexError;
use crate::parser::netlist::{PcbResolver, SchematicResolver, SheetLink, PCB_TOLERANCE, SCHEMATIC_RESOLUTION};
use crate::parser::pcb::{PcbParseError, PcbParser};
use crate::parser::pcb_schema::PcbDesign;
use crate::parser::schema::Schematic;
use crate::parser::sexp::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum HwGraphError {
    #[error("{path}: {source}")]
    Lex { path: String, source: LexError },
    #[error("{path}: {source}")]
    Parse { path: String, source: ParseError },
    #[error("{path}: {message}")]
    InvalidFormat { path: String, message: String },
    #[error("{path}: unsupported format: {format}")]
    UnsupportedFormat { path: String, format: String },
    #[error("{path}: IO error: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cancelled")]
    Cancelled,
}

impl HwGraphError {
    fn syntax(path: &str, e: ParseError) -> Self {
        match e {
            ParseError::Lex(source) => HwGraphError::Lex {
                path: path.to_string(),
                source,
            },
            source => HwGraphError::Parse {
                path: path.to_string(),
                source,
            },
        }
    }

    pub fn schematic(path: &str, e: KicadParseError) -> Self {
        match e {
            KicadParseError::SExpParse(e) => Self::syntax(path, e),
            KicadParseError::InvalidFormat(message) => HwGraphError::InvalidFormat {
                path: path.to_string(),
                message,
            },
        }
    }

    pub fn pcb(path: &str, e: PcbParseError) -> Self {
        match e {
            PcbParseError::SExpParse(e) => Self::syntax(path, e),
            PcbParseError::InvalidFormat(message) => HwGraphError::InvalidFormat {
                path: path.to_string(),
                message,
            },
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        HwGraphError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// The file the error refers to, when it refers to one.
    pub fn path(&self) -> Option<&str> {
        match self {
            HwGraphError::Lex { path, .. }
            | HwGraphError::Parse { path, .. }
            | HwGraphError::InvalidFormat { path, .. }
            | HwGraphError::UnsupportedFormat { path, .. }
            | HwGraphError::Io { path, .. } => Some(path),
            HwGraphError::Csv(_) | HwGraphError::Json(_) | HwGraphError::Cancelled => None,
        }
    }
}

/// Options for extraction runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Schematic coordinate grid (mm)
    pub resolution: f64,
    /// Board coincidence tolerance (mm)
    pub tolerance: f64,
    /// Join pads that touch without a track
    pub pad_adjacency: bool,
    /// Follow sheet references in [`HwGraphCore::parse_project`]
    pub load_sheets: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            resolution: SCHEMATIC_RESOLUTION,
            tolerance: PCB_TOLERANCE,
            pad_adjacency: false,
            load_sheets: true,
        }
    }
}

impl ExtractOptions {
    pub fn schematic_resolver(&self) -> SchematicResolver {
        SchematicResolver::new(self.resolution)
    }

    pub fn pcb_resolver(&self) -> PcbResolver {
        PcbResolver::new(self.tolerance, self.pad_adjacency)
    }
}

/// Shared stop signal for batch runs. Files already being extracted finish;
/// files not yet started come back as [`HwGraphError::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Output projection selected by a caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    Json,
    Mermaid,
    Bom,
}

impl FromStr for Projection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Projection::Json),
            "mermaid" => Ok(Projection::Mermaid),
            "bom" => Ok(Projection::Bom),
            other => Err(format!("unknown projection '{}', expected json, mermaid or bom", other)),
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Projection::Json => "json",
            Projection::Mermaid => "mermaid",
            Projection::Bom => "bom",
        };
        f.write_str(name)
    }
}

/// A model that can be rendered to every [`Projection`].
pub trait Render: DiagramSource {
    /// The structured record as pretty JSON.
    fn to_json(&self) -> Result<String, serde_json::Error>;
}

impl Render for SchematicModel {
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.record())
    }
}

impl Render for PcbModel {
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.record())
    }
}

impl Render for ProjectModel {
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.record())
    }
}

/// Render `model` as the requested projection. The BOM projection is CSV.
pub fn render(model: &impl Render, projection: Projection) -> Result<String, HwGraphError> {
    Ok(match projection {
        Projection::Json => model.to_json()?,
        Projection::Mermaid => to_diagram(model),
        Projection::Bom => to_bom(model).to_csv()?,
    })
}

/// Either kind of single-file model, as produced by batch runs.
#[derive(Debug, Clone)]
pub enum DesignModel {
    Schematic(SchematicModel),
    Pcb(PcbModel),
}

impl DesignModel {
    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            DesignModel::Schematic(m) => &m.diagnostics,
            DesignModel::Pcb(m) => &m.diagnostics,
        }
    }

    pub fn render(&self, projection: Projection) -> Result<String, HwGraphError> {
        match self {
            DesignModel::Schematic(m) => render(m, projection),
            DesignModel::Pcb(m) => render(m, projection),
        }
    }
}

/// Recursively discover KiCad schematic and board files in a directory.
/// Hidden directories and build output are skipped. Legacy `.sch`/`.brd`
/// files are listed too; extracting them reports
/// [`HwGraphError::UnsupportedFormat`].
pub fn discover_design_files(dir: &Path) -> Result<Vec<PathBuf>, HwGraphError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .max_depth(20)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || !is_ignored_dir(e.path()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            HwGraphError::io(&path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ext) = entry.path().extension().and_then(|s| s.to_str()) {
            match ext {
                "kicad_sch" | "sch" | "kicad_pcb" | "brd" => files.push(entry.into_path()),
                _ => {}
            }
        }
    }
    Ok(files)
}

fn is_ignored_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with('.') || name == "node_modules" || name == "target" || name == "build"
}

fn read(path: &Path) -> Result<String, HwGraphError> {
    std::fs::read_to_string(path).map_err(|e| HwGraphError::io(path, e))
}

/// Reject content that is not a modern file of the `expected` kind.
/// Unrecognised headers are left to the parser to report.
fn check_format(content: &str, filename: &str, expected: DesignFormat) -> Result<(), HwGraphError> {
    match detect_format(content) {
        Some(format) if format.is_legacy() => Err(HwGraphError::UnsupportedFormat {
            path: filename.to_string(),
            format: format.as_str().to_string(),
        }),
        Some(format) if format != expected => Err(HwGraphError::InvalidFormat {
            path: filename.to_string(),
            message: format!("expected a {}, found a {}", expected.as_str(), format.as_str()),
        }),
        _ => {
            if let Some(version) = detect_version(content) {
                tracing::debug!("{}: {} file", filename, version.as_str());
            }
            Ok(())
        }
    }
}

fn extract_schematic(content: &str, filename: &str) -> Result<Extraction<Schematic>, HwGraphError> {
    check_format(content, filename, DesignFormat::Schematic)?;
    let extraction = KicadParser::parse_schematic_str(content, filename)
        .map_err(|e| HwGraphError::schematic(filename, e))?;
    tracing::info!(
        "Extracted {} symbols, {} wires, {} labels from {} ({} errors)",
        extraction.value.symbols.len(),
        extraction.value.wires.len(),
        extraction.value.labels.len(),
        filename,
        extraction.errors.len()
    );
    Ok(extraction)
}

fn extract_pcb(content: &str, filename: &str) -> Result<Extraction<PcbDesign>, HwGraphError> {
    check_format(content, filename, DesignFormat::Pcb)?;
    let extraction =
        PcbParser::parse_pcb_str(content, filename).map_err(|e| HwGraphError::pcb(filename, e))?;
    tracing::info!(
        "Extracted {} footprints, {} tracks, {} vias from {} ({} errors)",
        extraction.value.footprints.len(),
        extraction.value.tracks.len(),
        extraction.value.vias.len(),
        filename,
        extraction.errors.len()
    );
    Ok(extraction)
}

/// Core extraction API.
pub struct HwGraphCore;

impl HwGraphCore {
    /// Extract and resolve schematic text. `filename` is used in errors.
    pub fn parse_schematic_str(
        content: &str,
        filename: &str,
        options: &ExtractOptions,
    ) -> Result<SchematicModel, HwGraphError> {
        let Extraction { value, errors } = extract_schematic(content, filename)?;
        let netlist = options.schematic_resolver().resolve(&value);
        let diagnostics = Diagnostics {
            file: filename.to_string(),
            extraction: errors,
            conflicts: netlist.conflicts.clone(),
        };
        Ok(SchematicModel {
            schematic: value,
            netlist,
            diagnostics,
        })
    }

    /// Extract and resolve board text. `filename` is used in errors.
    pub fn parse_pcb_str(
        content: &str,
        filename: &str,
        options: &ExtractOptions,
    ) -> Result<PcbModel, HwGraphError> {
        let Extraction { value, errors } = extract_pcb(content, filename)?;
        let netlist = options.pcb_resolver().resolve(&value);
        let diagnostics = Diagnostics {
            file: filename.to_string(),
            extraction: errors,
            conflicts: netlist.conflicts.clone(),
        };
        Ok(PcbModel {
            pcb: value,
            netlist,
            diagnostics,
        })
    }

    /// Extract a single schematic file. Sheet references are not followed.
    pub fn parse_schematic(path: &Path, options: &ExtractOptions) -> Result<SchematicModel, HwGraphError> {
        let content = read(path)?;
        Self::parse_schematic_str(&content, &path.display().to_string(), options)
    }

    pub fn parse_pcb(path: &Path, options: &ExtractOptions) -> Result<PcbModel, HwGraphError> {
        let content = read(path)?;
        Self::parse_pcb_str(&content, &path.display().to_string(), options)
    }

    /// Extract a file of either kind, judged from its content.
    pub fn parse_design(path: &Path, options: &ExtractOptions) -> Result<DesignModel, HwGraphError> {
        let content = read(path)?;
        let filename = path.display().to_string();
        match detect_format(&content) {
            Some(DesignFormat::Pcb) => Self::parse_pcb_str(&content, &filename, options).map(DesignModel::Pcb),
            Some(format) if format.is_legacy() => Err(HwGraphError::UnsupportedFormat {
                path: filename,
                format: format.as_str().to_string(),
            }),
            _ => Self::parse_schematic_str(&content, &filename, options).map(DesignModel::Schematic),
        }
    }

    /// Extract a root schematic and every sheet file below it, then resolve
    /// them as one design.
    ///
    /// Sheet files are loaded wave by wave: each wave holds the files first
    /// referenced by the previous one and is extracted in parallel. The
    /// cross-file union runs only after the last wave has finished. A sheet
    /// file used by several sheets is extracted once. Sheets that would
    /// close a cycle, and files that fail to load, are reported in
    /// [`ProjectModel::skipped`].
    pub fn parse_project(root: &Path, options: &ExtractOptions) -> Result<ProjectModel, HwGraphError> {
        let root_dir = root.parent().map(Path::to_path_buf).unwrap_or_default();
        let first = extract_schematic(&read(root)?, &root.display().to_string())?;

        let mut files = vec![first.value];
        let mut diagnostics = vec![Diagnostics {
            file: root.display().to_string(),
            extraction: first.errors,
            conflicts: Vec::new(),
        }];
        let mut index: HashMap<PathBuf, usize> = HashMap::new();
        index.insert(normalize(root), 0);
        let mut links: Vec<SheetLink> = Vec::new();
        let mut skipped: Vec<SkippedSheet> = Vec::new();

        let mut wave: Vec<usize> = if options.load_sheets { vec![0] } else { Vec::new() };
        while !wave.is_empty() {
            // Sheet references of this wave, split into known and new files
            let mut pending: Vec<PathBuf> = Vec::new();
            let mut waiting: Vec<(usize, usize, PathBuf)> = Vec::new();
            for &parent in &wave {
                for (s, sheet) in files[parent].sheets.iter().enumerate() {
                    let path = sheet_path(&root_dir, &sheet.file);
                    match index.get(&path) {
                        Some(&child) => {
                            if child == parent || reaches(&links, child, parent) {
                                tracing::warn!(
                                    "{}: sheet '{}' refers back to {}, skipping",
                                    files[parent].filename,
                                    sheet.name,
                                    sheet.file
                                );
                                skipped.push(SkippedSheet {
                                    parent: files[parent].filename.clone(),
                                    sheet: sheet.name.clone(),
                                    file: sheet.file.clone(),
                                    reason: SkipReason::Cycle,
                                });
                            } else {
                                link_sheet(&files, &mut links, &mut skipped, parent, s, child);
                            }
                        }
                        None => {
                            if !pending.contains(&path) {
                                pending.push(path.clone());
                            }
                            waiting.push((parent, s, path));
                        }
                    }
                }
            }

            let loaded: Vec<Result<Extraction<Schematic>, HwGraphError>> = pending
                .par_iter()
                .map(|path| extract_schematic(&read(path)?, &path.display().to_string()))
                .collect();

            let mut failed: HashMap<PathBuf, String> = HashMap::new();
            let mut next = Vec::new();
            for (path, result) in pending.into_iter().zip(loaded) {
                match result {
                    Ok(extraction) => {
                        let id = files.len();
                        diagnostics.push(Diagnostics {
                            file: path.display().to_string(),
                            extraction: extraction.errors,
                            conflicts: Vec::new(),
                        });
                        files.push(extraction.value);
                        index.insert(path, id);
                        next.push(id);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load sheet file {}: {}", path.display(), e);
                        failed.insert(path, e.to_string());
                    }
                }
            }

            for (parent, s, path) in waiting {
                let sheet = &files[parent].sheets[s];
                if let Some(message) = failed.get(&path) {
                    skipped.push(SkippedSheet {
                        parent: files[parent].filename.clone(),
                        sheet: sheet.name.clone(),
                        file: sheet.file.clone(),
                        reason: SkipReason::Failed(message.clone()),
                    });
                } else if let Some(&child) = index.get(&path) {
                    link_sheet(&files, &mut links, &mut skipped, parent, s, child);
                }
            }

            wave = next;
        }

        // Every file is loaded; join them
        let refs: Vec<&Schematic> = files.iter().collect();
        let netlist = options.schematic_resolver().resolve_hierarchy(&refs, &links);
        diagnostics[0].conflicts = netlist.conflicts.clone();
        tracing::info!(
            "Resolved project {}: {} files, {} nets, {} skipped sheets",
            root.display(),
            files.len(),
            netlist.nets.len(),
            skipped.len()
        );

        Ok(ProjectModel {
            files,
            links,
            netlist,
            diagnostics,
            skipped,
        })
    }

    /// Extract many files in parallel. Results come back in input order.
    pub fn batch_extract(
        paths: &[PathBuf],
        options: &ExtractOptions,
        cancel: &CancelFlag,
    ) -> Vec<(PathBuf, Result<DesignModel, HwGraphError>)> {
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| {
                let result = if cancel.is_cancelled() {
                    Err(HwGraphError::Cancelled)
                } else {
                    Self::parse_design(path, options)
                };
                (path.clone(), result)
            })
            .collect();

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        tracing::info!("Batch extracted {} files ({} failed)", results.len(), failed);
        results
    }

    /// Discover and extract every design file under `dir`.
    pub fn extract_directory(
        dir: &Path,
        options: &ExtractOptions,
        cancel: &CancelFlag,
    ) -> Result<Vec<(PathBuf, Result<DesignModel, HwGraphError>)>, HwGraphError> {
        let files = discover_design_files(dir)?;
        tracing::debug!("Found {} design files in {}", files.len(), dir.display());
        Ok(Self::batch_extract(&files, options, cancel))
    }
}

/// Sheet file paths are relative to the root schematic's directory.
fn sheet_path(root_dir: &Path, file: &str) -> PathBuf {
    normalize(&root_dir.join(file))
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Link sheet `s` of `parent` to `child`, unless another sheet already
/// instantiates that file.
fn link_sheet(
    files: &[Schematic],
    links: &mut Vec<SheetLink>,
    skipped: &mut Vec<SkippedSheet>,
    parent: usize,
    s: usize,
    child: usize,
) {
    let sheet = &files[parent].sheets[s];
    if links.iter().any(|l| l.child == child) {
        tracing::warn!(
            "{}: sheet '{}' reuses {}, which is already instantiated",
            files[parent].filename,
            sheet.name,
            sheet.file
        );
        skipped.push(SkippedSheet {
            parent: files[parent].filename.clone(),
            sheet: sheet.name.clone(),
            file: sheet.file.clone(),
            reason: SkipReason::Repeated,
        });
        return;
    }
    links.push(SheetLink { parent, sheet: s, child });
}

/// Whether `to` is reachable from `from` through `links`.
fn reaches(links: &[SheetLink], from: usize, to: usize) -> bool {
    let mut stack = vec![from];
    let mut seen = vec![from];
    while let Some(file) = stack.pop() {
        if file == to {
            return true;
        }
        for link in links.iter().filter(|l| l.parent == file) {
            if !seen.contains(&link.child) {
                seen.push(link.child);
                stack.push(link.child);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ExtractOptions = serde_json::from_str(r#"{"pad_adjacency": true}"#).unwrap();
        assert!(options.pad_adjacency);
        assert_eq!(options.tolerance, PCB_TOLERANCE);
        assert!(options.load_sheets);
    }

    #[test]
    fn test_projection_from_str() {
        assert_eq!("JSON".parse::<Projection>().unwrap(), Projection::Json);
        assert_eq!("bom".parse::<Projection>().unwrap(), Projection::Bom);
        assert!("svg".parse::<Projection>().is_err());
        assert_eq!(Projection::Mermaid.to_string(), "mermaid");
    }

    #[test]
    fn test_legacy_rejected() {
        let err = HwGraphCore::parse_schematic_str(
            "EESchema Schematic File Version 4\n",
            "old.sch",
            &ExtractOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, HwGraphError::UnsupportedFormat { .. }));
        assert_eq!(err.path(), Some("old.sch"));
    }

    #[test]
    fn test_wrong_kind_and_syntax_errors() {
        let options = ExtractOptions::default();
        let err = HwGraphCore::parse_schematic_str("(kicad_pcb (version 20240108))", "b", &options).unwrap_err();
        assert!(matches!(err, HwGraphError::InvalidFormat { .. }));

        let err = HwGraphCore::parse_pcb_str("(kicad_pcb (net 1 \"GND", "b.kicad_pcb", &options).unwrap_err();
        assert!(matches!(err, HwGraphError::Lex { .. }), "{err:?}");

        let err = HwGraphCore::parse_pcb_str("(kicad_pcb (net 1 GND)", "b.kicad_pcb", &options).unwrap_err();
        assert!(matches!(err, HwGraphError::Parse { .. }), "{err:?}");
    }

    #[test]
    fn test_reaches() {
        let links = [
            SheetLink { parent: 0, sheet: 0, child: 1 },
            SheetLink { parent: 1, sheet: 0, child: 2 },
        ];
        assert!(reaches(&links, 0, 2));
        assert!(!reaches(&links, 2, 0));
    }

    #[test]
    fn test_cancelled_batch() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let results = HwGraphCore::batch_extract(
            &[PathBuf::from("a.kicad_sch"), PathBuf::from("b.kicad_pcb")],
            &ExtractOptions::default(),
            &cancel,
        );
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| matches!(r, Err(HwGraphError::Cancelled))));
    }
}
