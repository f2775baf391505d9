//! Fatal conditions raised while importing, exporting or writing headers.
//!
//! None of these are recoverable for the unit being built: the pipeline stops
//! at the first one and reports it.

use std::io;

use thiserror::Error;

use crate::{
    diag::{Diag, DiagLabel},
    source::Pos,
    symtab::SymId,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Two incompatible declarations claiming the same (package, name).
#[derive(Clone, Debug, Error)]
#[error("{name} redeclared {context}")]
pub struct Redeclaration {
    pub sym: SymId,
    /// Qualified display name, `pkg.Name`.
    pub name: String,
    pub pos: Pos,
    pub previous: Option<Pos>,
    /// Where the clash was detected, e.g. `during import "example.com/lib"`.
    pub context: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Redeclared(Box<Redeclaration>),

    #[error("missing stub declaration for {0}")]
    MissingStub(String),

    #[error("type {0} has no underlying definition")]
    IncompleteType(String),

    #[error("invalid recursive type {0}")]
    InvalidRecursiveType(String),

    #[error("type {0} is larger than the address space")]
    TypeTooLarge(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Converts the error into a diagnostic anchored at `fallback` when the
    /// error carries no position of its own.
    pub fn to_diag(&self, fallback: &Pos) -> Diag {
        match self {
            Error::Redeclared(redecl) => {
                let diag = Diag::error_at(&redecl.pos, self.to_string());
                match &redecl.previous {
                    Some(previous) => diag.with_label(DiagLabel::at(
                        previous,
                        format!("previous declaration of {}", redecl.name),
                    )),
                    None => diag,
                }
            }
            other => Diag::error_at(fallback, other.to_string()),
        }
    }
}

impl From<Redeclaration> for Error {
    fn from(redecl: Redeclaration) -> Self {
        Error::Redeclared(Box::new(redecl))
    }
}
