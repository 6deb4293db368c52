//! Extract a schematic project or a board and print one projection.
//!
//! Usage: cargo run --example extract_project -- <file> [json|mermaid|bom]

use anyhow::{bail, Context};
use hwgraph::prelude::*;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: extract_project <file.kicad_sch|file.kicad_pcb> [json|mermaid|bom]");
    };
    let projection: Projection = args
        .next()
        .as_deref()
        .unwrap_or("mermaid")
        .parse()
        .map_err(anyhow::Error::msg)?;

    let path = Path::new(&path);
    let options = ExtractOptions::default();

    let output = match path.extension().and_then(|e| e.to_str()) {
        Some("kicad_pcb") => {
            let model = HwGraphCore::parse_pcb(path, &options)?;
            report(&model.diagnostics);
            render(&model, projection)?
        }
        _ => {
            let project = HwGraphCore::parse_project(path, &options)
                .with_context(|| format!("extracting {}", path.display()))?;
            for diagnostics in &project.diagnostics {
                report(diagnostics);
            }
            for skipped in &project.skipped {
                eprintln!("skipped sheet '{}' ({}): {:?}", skipped.sheet, skipped.file, skipped.reason);
            }
            render(&project, projection)?
        }
    };

    print!("{}", output);
    Ok(())
}

fn report(diagnostics: &Diagnostics) {
    for error in &diagnostics.extraction {
        eprintln!("{}: {}", diagnostics.file, error);
    }
    for conflict in &diagnostics.conflicts {
        eprintln!("{}: {}", diagnostics.file, conflict);
    }
}
