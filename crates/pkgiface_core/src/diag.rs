//! Collected, non-fatal problems found while reading manifests, rendered
//! with source snippets.

use std::io::{self, Write};

use ariadne::{Color, Config, IndexType, Label, LabelAttach, Report, ReportKind, sources};

use crate::source::{FileId, Pos, SourceManager, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug)]
pub struct DiagLabel {
    pub file: FileId,
    pub span: Span,
    pub message: String,
}

impl DiagLabel {
    pub fn at(pos: &Pos, message: impl Into<String>) -> Self {
        Self {
            file: pos.file,
            span: pos.span.clone(),
            message: message.into(),
        }
    }

    fn location(&self) -> (usize, Span) {
        (self.file.0 as usize, self.span.clone())
    }
}

#[derive(Clone, Debug)]
pub struct Diag {
    pub severity: Severity,
    pub message: String,
    pub primary: DiagLabel,
    /// Related locations, such as an earlier declaration of the same name.
    pub labels: Vec<DiagLabel>,
    pub help: Option<String>,
}

impl Diag {
    pub fn error(file: FileId, span: Span, message: impl Into<String>) -> Self {
        Self::at(Severity::Error, &Pos::new(file, span), message.into())
    }

    pub fn error_at(pos: &Pos, message: impl Into<String>) -> Self {
        Self::at(Severity::Error, pos, message.into())
    }

    pub fn warning_at(pos: &Pos, message: impl Into<String>) -> Self {
        Self::at(Severity::Warning, pos, message.into())
    }

    pub fn with_label(mut self, label: DiagLabel) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    fn at(severity: Severity, pos: &Pos, message: String) -> Self {
        Self {
            severity,
            primary: DiagLabel::at(pos, message.clone()),
            message,
            labels: Vec::new(),
            help: None,
        }
    }

    fn report(&self, use_color: bool) -> Report<'static, (usize, Span)> {
        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };
        let config = Config::default()
            .with_color(use_color)
            .with_index_type(IndexType::Byte)
            .with_label_attach(LabelAttach::Middle)
            .with_compact(self.severity == Severity::Warning);

        let mut report = Report::build(kind, self.primary.location())
            .with_message(&self.message)
            .with_config(config)
            .with_label(
                Label::new(self.primary.location())
                    .with_message(&self.primary.message)
                    .with_color(color)
                    .with_order(0),
            );
        for (idx, label) in self.labels.iter().enumerate() {
            report = report.with_label(
                Label::new(label.location())
                    .with_message(&label.message)
                    .with_color(Color::Cyan)
                    .with_order(idx as i32 + 1),
            );
        }
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }
        report.finish()
    }
}

pub fn has_errors(diags: &[Diag]) -> bool {
    diags.iter().any(|diag| diag.severity == Severity::Error)
}

pub fn render_diags(source_manager: &SourceManager, diags: &[Diag]) -> io::Result<()> {
    write_diags(source_manager, diags, io::stderr(), true)
}

pub fn render_diags_to_string(source_manager: &SourceManager, diags: &[Diag]) -> io::Result<String> {
    let mut buffer = Vec::new();
    write_diags(source_manager, diags, &mut buffer, false)?;
    String::from_utf8(buffer).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn write_diags<W: Write>(
    source_manager: &SourceManager,
    diags: &[Diag],
    mut writer: W,
    use_color: bool,
) -> io::Result<()> {
    if diags.is_empty() {
        return Ok(());
    }

    let mut cache = sources(
        source_manager
            .files()
            .map(|(id, file)| (id.0 as usize, file.text.clone())),
    );
    for diag in diags {
        diag.report(use_color).write(&mut cache, &mut writer)?;
    }
    Ok(())
}
