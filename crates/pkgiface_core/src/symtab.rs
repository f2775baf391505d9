//! Per-unit registry of packages, symbols and declaration nodes.
//!
//! A symbol is identified by `(PkgId, name)` and resolves to at most one
//! declaration node. Nodes start out `Unresolved` (a stub) and are later
//! defined exactly once by the importer or by a local declaration.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::{constant::ConstValue, source::Pos, types::TypeId, unit::FuncId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PkgId(pub u32);

#[derive(Clone, Debug)]
pub struct Package {
    pub path: String,
    pub name: String,
}

/// Packages keyed by import path, in registration order.
#[derive(Clone, Debug, Default)]
pub struct Packages {
    by_path: IndexMap<String, Package>,
}

impl Packages {
    pub fn intern(&mut self, path: &str, name: &str) -> PkgId {
        let entry = self.by_path.entry(path.to_string());
        let index = entry.index();
        let package = entry.or_insert_with(|| Package {
            path: path.to_string(),
            name: String::new(),
        });
        if package.name.is_empty() {
            package.name = name.to_string();
        }
        PkgId(index as u32)
    }

    pub fn by_path(&self, path: &str) -> Option<PkgId> {
        self.by_path.get_index_of(path).map(|idx| PkgId(idx as u32))
    }

    pub fn get(&self, id: PkgId) -> &Package {
        &self.by_path[id.0 as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

#[derive(Clone, Debug)]
pub struct Symbol {
    pub pkg: PkgId,
    pub name: String,
    pub def: Option<DeclId>,
    on_export_list: bool,
    asm: bool,
    is_func: bool,
}

impl Symbol {
    fn new(pkg: PkgId, name: &str) -> Self {
        Self {
            pkg,
            name: name.to_string(),
            def: None,
            on_export_list: false,
            asm: false,
            is_func: false,
        }
    }

    pub fn on_export_list(&self) -> bool {
        self.on_export_list
    }

    pub fn asm(&self) -> bool {
        self.asm
    }

    pub fn is_func(&self) -> bool {
        self.is_func
    }

    /// Flags are write-once: they can be raised but never cleared.
    pub(crate) fn set_on_export_list(&mut self) {
        self.on_export_list = true;
    }

    pub(crate) fn set_asm(&mut self) {
        self.asm = true;
    }

    pub(crate) fn set_func(&mut self) {
        self.is_func = true;
    }

    pub fn is_blank(&self) -> bool {
        self.name.is_empty() || self.name == "_"
    }
}

/// Operation kind of a declaration node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Unresolved,
    Type,
    Func,
    Var,
    Const,
    Alias,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Unresolved => "unresolved",
            Op::Type => "type",
            Op::Func => "func",
            Op::Var => "var",
            Op::Const => "const",
            Op::Alias => "alias",
        })
    }
}

/// Storage class of a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    Unset,
    Extern,
    Func,
}

#[derive(Clone, Debug)]
pub struct Decl {
    pub op: Op,
    pub pos: Option<Pos>,
    pub class: Class,
    pub ty: Option<TypeId>,
    pub func: Option<FuncId>,
    pub val: Option<ConstValue>,
    /// Package whose interface supplied the definition, if imported.
    pub imported_from: Option<PkgId>,
}

impl Decl {
    fn stub() -> Self {
        Self {
            op: Op::Unresolved,
            pos: None,
            class: Class::Unset,
            ty: None,
            func: None,
            val: None,
            imported_from: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    pub packages: Packages,
    symbols: Vec<Symbol>,
    index: FxHashMap<(PkgId, String), SymId>,
    decls: Vec<Decl>,
}

impl SymbolTable {
    pub fn lookup(&self, pkg: PkgId, name: &str) -> Option<SymId> {
        self.index.get(&(pkg, name.to_string())).copied()
    }

    /// Returns the symbol for `(pkg, name)`, creating it without a
    /// declaration node if needed.
    pub fn intern(&mut self, pkg: PkgId, name: &str) -> SymId {
        if let Some(id) = self.lookup(pkg, name) {
            return id;
        }

        let id = SymId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(pkg, name));
        self.index.insert((pkg, name.to_string()), id);
        id
    }

    /// Returns the symbol for `(pkg, name)`, guaranteeing it resolves to a
    /// declaration node. New nodes are `Unresolved` stubs.
    pub fn lookup_or_create_stub(&mut self, pkg: PkgId, name: &str) -> SymId {
        let id = self.intern(pkg, name);
        self.ensure_def(id);
        id
    }

    /// Declaration node of `sym`, attaching a fresh stub if it has none.
    pub(crate) fn ensure_def(&mut self, sym: SymId) -> DeclId {
        if let Some(decl) = self.symbols[sym.0 as usize].def {
            return decl;
        }
        let decl = DeclId(self.decls.len() as u32);
        self.decls.push(Decl::stub());
        self.symbols[sym.0 as usize].def = Some(decl);
        log::trace!("stub {}", self.qualified_name(sym));
        decl
    }

    pub fn sym(&self, id: SymId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub(crate) fn sym_mut(&mut self, id: SymId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub(crate) fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    /// Declaration node the symbol currently resolves to.
    pub fn def(&self, sym: SymId) -> Option<&Decl> {
        self.sym(sym).def.map(|id| self.decl(id))
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(idx, sym)| (SymId(idx as u32), sym))
    }

    /// `pkgname.Name`, the form used in diagnostics and the echo log.
    pub fn qualified_name(&self, sym: SymId) -> String {
        let symbol = self.sym(sym);
        let package = self.packages.get(symbol.pkg);
        if package.name.is_empty() {
            format!("{:?}.{}", package.path, symbol.name)
        } else {
            format!("{}.{}", package.name, symbol.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Class, Op, SymbolTable};

    #[test]
    fn stub_is_created_once_per_key() {
        let mut table = SymbolTable::default();
        let pkg = table.packages.intern("example.com/lib", "lib");
        let other = table.packages.intern("example.com/other", "other");

        let first = table.lookup_or_create_stub(pkg, "Node");
        let second = table.lookup_or_create_stub(pkg, "Node");
        let elsewhere = table.lookup_or_create_stub(other, "Node");

        assert_eq!(first, second);
        assert_ne!(first, elsewhere);
        let decl = table.def(first).expect("stub has a node");
        assert_eq!(decl.op, Op::Unresolved);
        assert_eq!(decl.class, Class::Unset);
        assert_eq!(table.qualified_name(first), "lib.Node");
    }

    #[test]
    fn interned_symbol_gains_stub_later() {
        let mut table = SymbolTable::default();
        let pkg = table.packages.intern("runtime", "runtime");
        let sym = table.intern(pkg, "mallocgc");
        assert!(table.def(sym).is_none());

        assert_eq!(table.lookup_or_create_stub(pkg, "mallocgc"), sym);
        assert!(table.def(sym).is_some());
    }

    #[test]
    fn write_once_flags_stay_raised() {
        let mut table = SymbolTable::default();
        let pkg = table.packages.intern("p", "p");
        let sym = table.lookup_or_create_stub(pkg, "X");
        assert!(!table.sym(sym).on_export_list());

        table.sym_mut(sym).set_on_export_list();
        table.sym_mut(sym).set_on_export_list();
        assert!(table.sym(sym).on_export_list());
        assert!(!table.sym(sym).asm());
    }
}
