//! The compilation-unit context.
//!
//! Everything the importer, export selector and header emitter mutate lives
//! in one `Unit`, so independent units never share state.

use std::path::PathBuf;

use crate::{
    constant::ConstValue,
    error::{Redeclaration, Result},
    source::Pos,
    symtab::{Class, DeclId, Op, PkgId, SymId, SymbolTable},
    types::{Method, TypeId, Types},
};

pub const RUNTIME_PATH: &str = "runtime";

#[derive(Clone, Debug)]
pub struct UnitOptions {
    /// Echo framing markers, the export size and every import/export decision.
    pub debug_export: bool,
    /// Echo export and import decisions.
    pub list_exports: bool,
    /// Destination of the assembly header; `None` disables header candidates.
    pub asm_header: Option<PathBuf>,
    /// Pointer width of the layout target, in bytes.
    pub ptr_size: u64,
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self {
            debug_export: false,
            list_exports: false,
            asm_header: None,
            ptr_size: 8,
        }
    }
}

/// Whether declarations currently being processed are package-level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclContext {
    Extern,
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// Opaque function body owned by the decoder collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyHandle(pub u32);

#[derive(Clone, Debug)]
pub struct Func {
    pub sym: SymId,
    pub pos: Option<Pos>,
    pub ty: TypeId,
    pub body: Option<BodyHandle>,
}

#[derive(Clone, Debug)]
pub struct Unit {
    pub options: UnitOptions,
    pub symtab: SymbolTable,
    pub types: Types,
    pub dcl_context: DeclContext,
    funcs: Vec<Func>,
    local: PkgId,
    runtime: PkgId,
    pub(crate) export_list: Vec<SymId>,
    pub(crate) asm_list: Vec<SymId>,
    echo: Vec<String>,
}

impl Unit {
    pub fn new(path: &str, name: &str, options: UnitOptions) -> Self {
        let mut symtab = SymbolTable::default();
        let local = symtab.packages.intern(path, name);
        let runtime = symtab.packages.intern(RUNTIME_PATH, "runtime");

        Self {
            options,
            symtab,
            types: Types::default(),
            dcl_context: DeclContext::Extern,
            funcs: Vec::new(),
            local,
            runtime,
            export_list: Vec::new(),
            asm_list: Vec::new(),
            echo: Vec::new(),
        }
    }

    pub fn local_pkg(&self) -> PkgId {
        self.local
    }

    pub fn runtime_pkg(&self) -> PkgId {
        self.runtime
    }

    pub fn local_name(&self) -> &str {
        &self.symtab.packages.get(self.local).name
    }

    pub fn local_path(&self) -> &str {
        &self.symtab.packages.get(self.local).path
    }

    pub fn func(&self, id: FuncId) -> &Func {
        &self.funcs[id.0 as usize]
    }

    pub fn funcs(&self) -> &[Func] {
        &self.funcs
    }

    /// Called by the decoder once a function body has been materialized.
    pub fn set_func_body(&mut self, id: FuncId, body: BodyHandle) {
        self.funcs[id.0 as usize].body = Some(body);
    }

    pub fn echo_lines(&self) -> &[String] {
        &self.echo
    }

    pub fn take_echo(&mut self) -> Vec<String> {
        std::mem::take(&mut self.echo)
    }

    pub(crate) fn verbose(&self) -> bool {
        self.options.list_exports || self.options.debug_export
    }

    pub(crate) fn echo(&mut self, line: String) {
        log::debug!("{line}");
        self.echo.push(line);
    }

    pub(crate) fn new_func(&mut self, sym: SymId, pos: Option<Pos>, ty: TypeId) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(Func {
            sym,
            pos,
            ty,
            body: None,
        });
        id
    }

    /// Declares a named type of the local package. Its underlying definition
    /// is attached separately so other declarations may refer to it first.
    pub fn declare_type(&mut self, name: &str, pos: Pos) -> Result<TypeId> {
        let (sym, decl) = self.define_local(name, Op::Type, Class::Extern, pos)?;
        let ty = self.types.new_named(sym);
        self.symtab.decl_mut(decl).ty = Some(ty);
        self.consider_for_export(sym, Class::Extern);
        Ok(ty)
    }

    /// Declares a local function, variable or alias.
    pub fn declare_object(&mut self, name: &str, op: Op, ty: TypeId, pos: Pos) -> Result<SymId> {
        let class = if op == Op::Func {
            Class::Func
        } else {
            Class::Extern
        };
        let (sym, decl) = self.define_local(name, op, class, pos.clone())?;
        self.symtab.decl_mut(decl).ty = Some(ty);
        if op == Op::Func {
            let func = self.new_func(sym, Some(pos), ty);
            self.symtab.decl_mut(decl).func = Some(func);
            self.symtab.sym_mut(sym).set_func();
        }
        self.consider_for_export(sym, class);
        Ok(sym)
    }

    pub fn declare_const(
        &mut self,
        name: &str,
        ty: TypeId,
        val: ConstValue,
        pos: Pos,
    ) -> Result<SymId> {
        let (sym, decl) = self.define_local(name, Op::Const, Class::Extern, pos)?;
        let node = self.symtab.decl_mut(decl);
        node.ty = Some(ty);
        node.val = Some(val);
        self.consider_for_export(sym, Class::Extern);
        Ok(sym)
    }

    /// Declares method `name` on the local named type `recv`. The method is
    /// registered as symbol `Recv.name` and travels with its receiver.
    pub fn declare_method(
        &mut self,
        recv: TypeId,
        name: &str,
        sig: TypeId,
        pos: Pos,
    ) -> Result<SymId> {
        let recv_name = match self.types.named(recv) {
            Some(named) => self.symtab.sym(named.sym).name.clone(),
            None => String::from("?"),
        };
        let sym = self.declare_object(&format!("{recv_name}.{name}"), Op::Func, sig, pos.clone())?;
        if let Some(named) = self.types.named_mut(recv) {
            named.methods.push(Method {
                name: name.to_string(),
                sig,
                pos: Some(pos),
            });
        }
        Ok(sym)
    }

    fn define_local(
        &mut self,
        name: &str,
        op: Op,
        class: Class,
        pos: Pos,
    ) -> Result<(SymId, DeclId)> {
        let sym = self.symtab.intern(self.local, name);
        let decl = self.symtab.ensure_def(sym);
        let node = self.symtab.decl(decl);
        if node.op != Op::Unresolved {
            return Err(Redeclaration {
                sym,
                name: self.symtab.qualified_name(sym),
                pos,
                previous: node.pos.clone(),
                context: "in this block".to_string(),
            }
            .into());
        }

        let node = self.symtab.decl_mut(decl);
        node.op = op;
        node.class = class;
        node.pos = Some(pos);
        log::trace!("declare {op} {}", self.symtab.qualified_name(sym));
        Ok((sym, decl))
    }
}

#[cfg(test)]
mod tests {
    use super::{Unit, UnitOptions};
    use crate::{
        constant::ConstValue,
        error::Error,
        source::{FileId, Pos},
        symtab::{Class, Op},
        types::BasicKind,
    };

    fn pos(at: usize) -> Pos {
        Pos::new(FileId(0), at..at + 1)
    }

    #[test]
    fn local_redeclaration_reports_both_positions() {
        let mut unit = Unit::new("example.com/app", "app", UnitOptions::default());
        let int = unit.types.basic(BasicKind::Int);
        unit.declare_object("Count", Op::Var, int, pos(1))
            .expect("first declaration");

        let err = unit
            .declare_const("Count", int, ConstValue::Int(1), pos(9))
            .expect_err("second declaration must fail");
        let Error::Redeclared(redecl) = err else {
            panic!("expected redeclaration, got {err:?}");
        };
        assert_eq!(redecl.name, "app.Count");
        assert_eq!(redecl.pos, pos(9));
        assert_eq!(redecl.previous, Some(pos(1)));
        assert_eq!(redecl.to_string(), "app.Count redeclared in this block");
    }

    #[test]
    fn local_function_gets_identity_and_func_flag() {
        let mut unit = Unit::new("example.com/app", "app", UnitOptions::default());
        let sig = unit.types.new_func(Default::default());
        let sym = unit
            .declare_object("Run", Op::Func, sig, pos(0))
            .expect("declare");

        let decl = unit.symtab.def(sym).expect("node");
        assert_eq!(decl.class, Class::Func);
        let func = decl.func.expect("function identity");
        assert_eq!(unit.func(func).sym, sym);
        assert!(unit.symtab.sym(sym).is_func());
        assert!(unit.func(func).body.is_none());
    }
}
