use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub mod asmhdr;
pub mod constant;
pub mod diag;
pub mod encode;
pub mod error;
pub mod export;
pub mod fmt;
pub mod import;
pub mod ir;
pub mod layout;
pub mod lex;
pub mod loader;
pub mod parse;
pub mod source;
pub mod symtab;
pub mod types;
pub mod unit;

use diag::{Diag, Severity, has_errors, render_diags};
use encode::IndexEncoder;
use fmt::format_unit;
use loader::{UnitBuild, load_unit, load_unit_from_file};
use source::{FileId, Pos, SourceManager};

pub use constant::ConstValue;
pub use diag::{DiagLabel, Severity as DiagSeverity};
pub use error::{Error, Redeclaration};
pub use export::{EXPORT_BEGIN, EXPORT_END, find_export_data, is_exported};
pub use unit::{Unit, UnitOptions};

/// First line of every object file written by `build_path`.
pub const OBJECT_MAGIC: &str = "pkgiface object";

#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    pub include_dirs: Vec<PathBuf>,
    pub unit: UnitOptions,
}

#[derive(Clone, Debug, Default)]
pub struct PipelineReport {
    /// Warnings only; errors fail the pipeline.
    pub diags: Vec<Diag>,
    /// Lines requested by `debug_export` or `list_exports`.
    pub echo: Vec<String>,
    /// Payload size of the export section, when one was written.
    pub export_size: Option<u64>,
}

/// Loads `input`, writes the object file to `out` and the assembly header
/// when one is configured.
pub fn build_path(input: &Path, out: &Path, opts: &BuildOptions) -> Result<PipelineReport, Vec<Diag>> {
    let artifacts = load_path(input, opts);
    let _ = render_diags(&artifacts.source_manager, &artifacts.diags);
    let Some(mut unit) = artifacts.unit.filter(|_| !has_errors(&artifacts.diags)) else {
        return Err(artifacts.diags);
    };

    let fail = |diag: Diag| {
        let mut diags = artifacts.diags.clone();
        diags.push(diag);
        let _ = render_diags(&artifacts.source_manager, &diags);
        diags
    };
    let anchor = Pos::file_start(artifacts.entry_file);

    let mut bytes = Vec::new();
    let size = write_object(&mut unit, &mut bytes).map_err(|err| fail(err.to_diag(&anchor)))?;

    if let Some(header) = unit.options.asm_header.clone() {
        unit.write_asm_header(&header)
            .map_err(|err| fail(err.to_diag(&anchor)))?;
    }

    if let Err(err) = std::fs::write(out, &bytes) {
        return Err(fail(Diag::error_at(
            &anchor,
            format!("failed to write output file: {err}"),
        )));
    }

    Ok(PipelineReport {
        diags: only_warnings(&artifacts.diags),
        echo: unit.take_echo(),
        export_size: Some(size),
    })
}

pub fn check_path(input: &Path, opts: &BuildOptions) -> Result<PipelineReport, Vec<Diag>> {
    let artifacts = load_path(input, opts);
    let _ = render_diags(&artifacts.source_manager, &artifacts.diags);

    match artifacts.unit {
        Some(mut unit) if !has_errors(&artifacts.diags) => Ok(PipelineReport {
            diags: only_warnings(&artifacts.diags),
            echo: unit.take_echo(),
            export_size: None,
        }),
        _ => Err(artifacts.diags),
    }
}

/// Resolved local declarations and export queue of `input`, in manifest
/// syntax.
pub fn dump_path(input: &Path, opts: &BuildOptions) -> Result<String, Vec<Diag>> {
    let artifacts = load_path(input, opts);
    let _ = render_diags(&artifacts.source_manager, &artifacts.diags);

    match artifacts.unit {
        Some(unit) if !has_errors(&artifacts.diags) => Ok(format_unit(&unit)),
        _ => Err(artifacts.diags),
    }
}

/// Loads a single manifest held in memory. Imports other than `runtime`
/// cannot be resolved without a directory to search.
pub fn load_source_text(text: &str, options: UnitOptions) -> (Option<Unit>, Vec<Diag>) {
    let mut source_manager = SourceManager::new(Vec::new());
    let file = source_manager.add_virtual_file("inline.pkg", text.to_string());
    let build = load_unit_from_file(&mut source_manager, file, options);
    (build.unit, build.diags)
}

/// Writes the object header line followed by the framed export section.
/// Returns the payload size.
pub fn write_object<W: Write>(unit: &mut Unit, out: &mut W) -> error::Result<u64> {
    writeln!(out, "{OBJECT_MAGIC} {}", unit.local_path())
        .map_err(|err| Error::io("failed to write object header", err))?;
    unit.write_export(out, &mut IndexEncoder)
}

struct LoadArtifacts {
    source_manager: SourceManager,
    entry_file: FileId,
    unit: Option<Unit>,
    diags: Vec<Diag>,
}

fn load_path(input: &Path, opts: &BuildOptions) -> LoadArtifacts {
    let mut source_manager = SourceManager::new(opts.include_dirs.clone());
    let UnitBuild {
        entry_file,
        unit,
        diags,
    } = load_unit(&mut source_manager, input, opts.unit.clone());

    LoadArtifacts {
        source_manager,
        entry_file,
        unit,
        diags,
    }
}

fn only_warnings(diags: &[Diag]) -> Vec<Diag> {
    diags
        .iter()
        .filter(|diag| diag.severity != Severity::Error)
        .cloned()
        .collect()
}
