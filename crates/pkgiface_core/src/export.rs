//! Selecting local declarations for export and framing the encoded interface.

use std::io::{self, Write};

use crate::{
    encode::Encoder,
    error::{Error, Result},
    symtab::{Class, SymId},
    unit::{DeclContext, Unit},
};

/// Opens the interface section. The byte after `$$` names the binary format.
pub const EXPORT_BEGIN: &[u8] = b"\n$$B\n";
pub const EXPORT_END: &[u8] = b"\n$$\n";

/// Whether `name` is visible outside its package.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn is_init_name(name: &str) -> bool {
    name == "init"
}

impl Unit {
    /// Queues `sym` for export if it is a package-level declaration of the
    /// local package with an exported name, and records it as an assembly
    /// header candidate when a header was requested.
    pub fn consider_for_export(&mut self, sym: SymId, class: Class) {
        if self.symtab.sym(sym).pkg != self.local_pkg() {
            return;
        }
        if !matches!(class, Class::Extern | Class::Func) || self.dcl_context != DeclContext::Extern
        {
            return;
        }
        if self.is_method(sym) {
            return;
        }

        let name = &self.symtab.sym(sym).name;
        if is_exported(name) || is_init_name(name) {
            self.export_sym(sym);
        }
        if self.options.asm_header.is_some() && !self.symtab.sym(sym).asm() {
            self.symtab.sym_mut(sym).set_asm();
            self.asm_list.push(sym);
        }
    }

    /// Appends `sym` to the export queue unless it is already there.
    pub fn export_sym(&mut self, sym: SymId) {
        if self.symtab.sym(sym).on_export_list() {
            return;
        }
        self.symtab.sym_mut(sym).set_on_export_list();

        if self.verbose() {
            let line = format!("export symbol {}", self.symtab.qualified_name(sym));
            self.echo(line);
        }
        self.export_list.push(sym);
    }

    pub fn export_list(&self) -> &[SymId] {
        &self.export_list
    }

    pub fn asm_list(&self) -> &[SymId] {
        &self.asm_list
    }

    /// Writes the framed interface section and returns the number of bytes
    /// the encoder produced between the markers.
    pub fn write_export<W: Write>(&mut self, out: &mut W, encoder: &mut dyn Encoder) -> Result<u64> {
        let mut out = OffsetWriter::new(out);
        let write_err = |err: io::Error| Error::io("failed to write export data", err);

        out.write_all(EXPORT_BEGIN).map_err(write_err)?;
        let start = out.offset();
        encoder
            .encode(self, &self.export_list, &mut out)
            .map_err(|err| Error::io("failed to encode export data", err))?;
        let size = out.offset() - start;
        out.write_all(EXPORT_END).map_err(write_err)?;
        out.flush().map_err(write_err)?;

        log::debug!(
            "exported {} symbols from {} in {size} bytes",
            self.export_list.len(),
            self.local_path()
        );
        if self.options.debug_export {
            self.echo("$$B".to_string());
            self.echo("$$".to_string());
            let line = format!("BenchmarkExportSize:{} 1 {size} bytes", self.local_path());
            self.echo(line);
        }
        Ok(size)
    }

    fn is_method(&self, sym: SymId) -> bool {
        self.symtab
            .def(sym)
            .and_then(|decl| decl.ty)
            .and_then(|ty| self.types.signature(ty))
            .is_some_and(|sig| sig.recv.is_some())
    }
}

/// Locates the encoded interface inside a larger byte stream, such as an
/// object file, returning the bytes between the markers.
pub fn find_export_data(bytes: &[u8]) -> Option<&[u8]> {
    let start = find(bytes, EXPORT_BEGIN)? + EXPORT_BEGIN.len();
    let len = rfind(&bytes[start..], EXPORT_END)?;
    Some(&bytes[start..start + len])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// The encoded payload may itself contain the end marker, so search backwards.
fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Counts bytes passed through to the underlying writer.
struct OffsetWriter<'a, W: Write> {
    inner: &'a mut W,
    offset: u64,
}

impl<'a, W: Write> OffsetWriter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self { inner, offset: 0 }
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

impl<W: Write> Write for OffsetWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.offset += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
