//! Materializing declarations supplied by other packages' interfaces.
//!
//! Every entry point reconciles against the symbol's current declaration
//! node: a stub is defined, a matching earlier import is accepted as is, and
//! anything else is a redeclaration.

use crate::{
    constant::ConstValue,
    error::{Error, Redeclaration, Result},
    fmt::{format_signature, format_type},
    source::Pos,
    symtab::{Class, DeclId, Op, PkgId, SymId},
    types::{Method, TypeId},
    unit::Unit,
};

impl Unit {
    /// Returns the named type declared by `pkg.name`, creating a forward
    /// declaration if the symbol is still a stub. `ipkg` is the package
    /// whose interface is being read.
    pub fn import_type(&mut self, ipkg: PkgId, pos: Pos, pkg: PkgId, name: &str) -> Result<TypeId> {
        let (sym, decl) = self.import_sym(ipkg, &pos, pkg, name, Op::Type)?;
        if self.symtab.decl(decl).op != Op::Type {
            let ty = self.types.new_named(sym);
            let node = self.symtab.decl_mut(decl);
            node.op = Op::Type;
            node.pos = Some(pos);
            node.ty = Some(ty);
            node.class = Class::Extern;
            node.imported_from = Some(ipkg);
            log::trace!("forward type {}", self.symtab.qualified_name(sym));
        }

        self.symtab
            .decl(decl)
            .ty
            .ok_or_else(|| Error::IncompleteType(self.symtab.qualified_name(sym)))
    }

    /// Attaches the structural definition of a named type. Attaching an
    /// identical definition again is a no-op.
    pub fn set_underlying(
        &mut self,
        ipkg: Option<PkgId>,
        named: TypeId,
        underlying: TypeId,
        pos: Pos,
    ) -> Result<()> {
        let Some(current) = self.types.named(named) else {
            return Err(Error::IncompleteType(format_type(self, named)));
        };
        let (sym, existing) = (current.sym, current.underlying);

        match existing {
            None => {
                if let Some(named) = self.types.named_mut(named) {
                    named.underlying = Some(underlying);
                }
                Ok(())
            }
            Some(previous) if self.types.identical(previous, underlying) => Ok(()),
            Some(_) => Err(self.redeclared(sym, self.symtab.qualified_name(sym), pos, ipkg)),
        }
    }

    /// Attaches method `name` to a named type. A second import of the same
    /// method must carry an identical signature.
    pub fn add_method(
        &mut self,
        ipkg: Option<PkgId>,
        named: TypeId,
        name: &str,
        sig: TypeId,
        pos: Pos,
    ) -> Result<()> {
        let Some(recv) = self.types.named(named) else {
            return Err(Error::IncompleteType(format_type(self, named)));
        };
        let sym = recv.sym;

        if let Some(existing) = recv.methods.iter().find(|method| method.name == name) {
            if self.types.identical(existing.sig, sig) {
                return Ok(());
            }
            let display = format!("{}.{name}", self.symtab.qualified_name(sym));
            let previous = existing.pos.clone();
            let mut err = self.redeclared(sym, display, pos, ipkg);
            if let Error::Redeclared(redecl) = &mut err {
                redecl.previous = previous;
            }
            return Err(err);
        }

        if let Some(recv) = self.types.named_mut(named) {
            recv.methods.push(Method {
                name: name.to_string(),
                sig,
                pos: Some(pos),
            });
        }
        Ok(())
    }

    pub fn import_const(
        &mut self,
        ipkg: PkgId,
        pos: Pos,
        pkg: PkgId,
        name: &str,
        ty: TypeId,
        val: ConstValue,
    ) -> Result<()> {
        let Some((sym, decl)) = self.import_obj(ipkg, pos, pkg, name, Op::Const, Class::Extern, ty)?
        else {
            // TODO: compare `val` with the value from the earlier import once
            // mismatching constant values are specified to be a conflict.
            return Ok(());
        };

        if self.verbose() {
            let line = format!(
                "import const {} {} = {val}",
                self.symtab.qualified_name(sym),
                format_type(self, ty)
            );
            self.echo(line);
        }
        self.symtab.decl_mut(decl).val = Some(val);
        Ok(())
    }

    /// Declares an imported function. Its body is filled in later through
    /// `Unit::set_func_body`.
    pub fn import_func(
        &mut self,
        ipkg: PkgId,
        pos: Pos,
        pkg: PkgId,
        name: &str,
        sig: TypeId,
    ) -> Result<()> {
        let Some((sym, decl)) =
            self.import_obj(ipkg, pos.clone(), pkg, name, Op::Func, Class::Func, sig)?
        else {
            return Ok(());
        };

        let func = self.new_func(sym, Some(pos), sig);
        self.symtab.decl_mut(decl).func = Some(func);

        if self.verbose() {
            let line = format!(
                "import func {}{}",
                self.symtab.qualified_name(sym),
                format_signature(self, sig)
            );
            self.echo(line);
        }
        Ok(())
    }

    pub fn import_var(
        &mut self,
        ipkg: PkgId,
        pos: Pos,
        pkg: PkgId,
        name: &str,
        ty: TypeId,
    ) -> Result<()> {
        let Some((sym, _)) = self.import_obj(ipkg, pos, pkg, name, Op::Var, Class::Extern, ty)?
        else {
            return Ok(());
        };

        if self.verbose() {
            let line = format!(
                "import var {} {}",
                self.symtab.qualified_name(sym),
                format_type(self, ty)
            );
            self.echo(line);
        }
        Ok(())
    }

    /// Declares `pkg.name` as another name for the existing type `ty`.
    pub fn import_alias(
        &mut self,
        ipkg: PkgId,
        pos: Pos,
        pkg: PkgId,
        name: &str,
        ty: TypeId,
    ) -> Result<()> {
        let Some((sym, _)) = self.import_obj(ipkg, pos, pkg, name, Op::Alias, Class::Extern, ty)?
        else {
            return Ok(());
        };

        if self.verbose() {
            let line = format!(
                "import type {} = {}",
                self.symtab.qualified_name(sym),
                format_type(self, ty)
            );
            self.echo(line);
        }
        Ok(())
    }

    /// Resolves the symbol an import refers to. Only runtime symbols may be
    /// created on demand; all others must have been stubbed beforehand.
    fn import_sym(
        &mut self,
        ipkg: PkgId,
        pos: &Pos,
        pkg: PkgId,
        name: &str,
        op: Op,
    ) -> Result<(SymId, DeclId)> {
        let existing = self
            .symtab
            .lookup(pkg, name)
            .and_then(|sym| self.symtab.sym(sym).def.map(|decl| (sym, decl)));

        let (sym, decl) = match existing {
            Some(found) => found,
            None if pkg == self.runtime_pkg() => {
                let sym = self.symtab.lookup_or_create_stub(pkg, name);
                let decl = self.symtab.ensure_def(sym);
                self.symtab.decl_mut(decl).imported_from = Some(ipkg);
                (sym, decl)
            }
            None => {
                let path = &self.symtab.packages.get(pkg).path;
                return Err(Error::MissingStub(format!("{path:?}.{name}")));
            }
        };

        let current = self.symtab.decl(decl).op;
        if current != Op::Unresolved && current != op {
            return Err(self.redeclared(sym, self.symtab.qualified_name(sym), pos.clone(), Some(ipkg)));
        }
        Ok((sym, decl))
    }

    /// Defines `pkg.name` as an imported object, or checks a redundant
    /// import against the existing node. Returns `None` for the latter.
    #[allow(clippy::too_many_arguments)]
    fn import_obj(
        &mut self,
        ipkg: PkgId,
        pos: Pos,
        pkg: PkgId,
        name: &str,
        op: Op,
        class: Class,
        ty: TypeId,
    ) -> Result<Option<(SymId, DeclId)>> {
        let (sym, decl) = self.import_sym(ipkg, &pos, pkg, name, op)?;
        let node = self.symtab.decl(decl);
        if node.op != Op::Unresolved {
            let same_type = node.ty.is_some_and(|prev| self.types.identical(prev, ty));
            if node.class != class || !same_type {
                return Err(self.redeclared(sym, self.symtab.qualified_name(sym), pos, Some(ipkg)));
            }
            log::trace!("redundant import of {}", self.symtab.qualified_name(sym));
            return Ok(None);
        }

        let node = self.symtab.decl_mut(decl);
        node.op = op;
        node.pos = Some(pos);
        node.class = class;
        node.ty = Some(ty);
        node.imported_from = Some(ipkg);
        if class == Class::Func {
            self.symtab.sym_mut(sym).set_func();
        }
        Ok(Some((sym, decl)))
    }

    fn redeclared(&self, sym: SymId, name: String, pos: Pos, ipkg: Option<PkgId>) -> Error {
        let previous = self.symtab.def(sym).and_then(|decl| decl.pos.clone());
        let context = match ipkg {
            Some(ipkg) => format!("during import {:?}", self.symtab.packages.get(ipkg).path),
            None => "in this block".to_string(),
        };
        Redeclaration {
            sym,
            name,
            pos,
            previous,
            context,
        }
        .into()
    }
}
