//! Turns an entry manifest and its transitive dependencies into a `Unit`.
//!
//! Dependencies are loaded once per import path, ordered dependencies-first,
//! pre-registered as stubs and then fed through the importer. The entry
//! manifest's own declarations are declared locally last.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    constant::ConstValue,
    diag::{Diag, DiagLabel, has_errors},
    error::Error,
    fmt::format_type,
    ir::{Decl, DeclKind, FieldExpr, ImportClause, Manifest, QualName, SigExpr, TypeExpr},
    lex::lex_file,
    parse::parse_tokens,
    source::{FileId, Pos, SourceManager},
    symtab::{Op, PkgId},
    types::{BasicKind, Field, Signature, StructFlavor, TypeId, TypeKind},
    unit::{DeclContext, RUNTIME_PATH, Unit, UnitOptions},
};

pub const MANIFEST_EXT: &str = "pkg";

#[derive(Debug)]
pub struct UnitBuild {
    pub entry_file: FileId,
    /// `None` when the entry manifest could not be read or has no package
    /// clause.
    pub unit: Option<Unit>,
    pub diags: Vec<Diag>,
}

#[derive(Debug)]
struct LoadedPackage {
    pkg: PkgId,
    manifest: Manifest,
}

/// Import aliases visible to one manifest.
#[derive(Debug)]
struct Scope {
    own: PkgId,
    aliases: FxHashMap<String, PkgId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Reading the interface of the given dependency.
    Import(PkgId),
    Local,
}

impl Mode {
    fn importing(self) -> Option<PkgId> {
        match self {
            Mode::Import(ipkg) => Some(ipkg),
            Mode::Local => None,
        }
    }
}

/// Declarations are bound kind by kind so that every named type exists
/// before anything refers to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Types,
    Aliases,
    Underlying,
    Funcs,
    Methods,
    Vars,
    Consts,
}

impl Phase {
    const ORDER: [Phase; 7] = [
        Phase::Types,
        Phase::Aliases,
        Phase::Underlying,
        Phase::Funcs,
        Phase::Methods,
        Phase::Vars,
        Phase::Consts,
    ];

    fn includes(self, kind: &DeclKind) -> bool {
        matches!(
            (self, kind),
            (Phase::Types | Phase::Underlying, DeclKind::Type(_))
                | (Phase::Aliases, DeclKind::Alias(_))
                | (Phase::Funcs, DeclKind::Func(_))
                | (Phase::Methods, DeclKind::Method { .. })
                | (Phase::Vars, DeclKind::Var(_))
                | (Phase::Consts, DeclKind::Const { .. })
        )
    }
}

pub fn load_unit(source_manager: &mut SourceManager, input: &Path, options: UnitOptions) -> UnitBuild {
    let entry_file = match source_manager.load_path(input) {
        Ok(file) => file,
        Err(err) => {
            let file = source_manager.add_virtual_file(input.to_path_buf(), String::new());
            return UnitBuild {
                entry_file: file,
                unit: None,
                diags: vec![Diag::error_at(
                    &Pos::file_start(file),
                    format!("failed to read input file: {err}"),
                )],
            };
        }
    };

    load_unit_from_file(source_manager, entry_file, options)
}

/// Same as `load_unit` for a manifest that is already registered with the
/// source manager.
pub fn load_unit_from_file(
    source_manager: &mut SourceManager,
    entry_file: FileId,
    options: UnitOptions,
) -> UnitBuild {
    let (manifest, mut diags) = parse_file(source_manager, entry_file);
    let Some(package) = manifest.package.clone() else {
        diags.push(
            Diag::error_at(&Pos::file_start(entry_file), "missing package clause")
                .with_help("start the manifest with `package NAME \"PATH\"`"),
        );
        return UnitBuild {
            entry_file,
            unit: None,
            diags,
        };
    };

    let roots = source_manager.search_roots(entry_file);
    let mut unit = Unit::new(&package.path.value, &package.name.value, options);

    let mut loader = PackageLoader {
        source_manager,
        roots,
        entry: package.path.value.clone(),
        packages: IndexMap::new(),
        diags,
    };
    for import in &manifest.imports {
        loader.load(&mut unit, import);
    }
    let PackageLoader {
        packages,
        mut diags,
        ..
    } = loader;

    let order = dependency_order(&manifest, &packages, &mut diags);
    log::debug!(
        "package {} depends on [{}]",
        package.path.value,
        order.join(", ")
    );

    let mut binder = Binder { unit, diags };
    if !has_errors(&binder.diags) {
        binder.bind(&manifest, &packages, &order);
    }

    UnitBuild {
        entry_file,
        unit: Some(binder.unit),
        diags: binder.diags,
    }
}

fn parse_file(source_manager: &SourceManager, file: FileId) -> (Manifest, Vec<Diag>) {
    let (tokens, mut diags) = lex_file(source_manager, file);
    let (manifest, parse_diags) = parse_tokens(&tokens);
    diags.extend(parse_diags);
    (manifest, diags)
}

struct PackageLoader<'a> {
    source_manager: &'a mut SourceManager,
    roots: Vec<PathBuf>,
    entry: String,
    packages: IndexMap<String, LoadedPackage>,
    diags: Vec<Diag>,
}

impl PackageLoader<'_> {
    fn load(&mut self, unit: &mut Unit, import: &ImportClause) {
        let path = import.path.value.as_str();
        if path == self.entry {
            self.diags.push(Diag::error_at(
                &import.path.pos(),
                format!("import cycle not allowed: {path:?} imports itself"),
            ));
            return;
        }
        if self.packages.contains_key(path) {
            return;
        }

        let resolved = match resolve_import_path(path, &self.roots) {
            Ok(resolved) => resolved,
            // Runtime declarations are created on demand.
            Err(_) if path == RUNTIME_PATH => return,
            Err(message) => {
                self.diags.push(
                    Diag::error_at(&import.path.pos(), message)
                        .with_help(format!("expected file `{}`", manifest_file_name(path))),
                );
                return;
            }
        };

        let file = match self.source_manager.load_path(&resolved) {
            Ok(file) => file,
            Err(err) => {
                self.diags.push(Diag::error_at(
                    &import.path.pos(),
                    format!(
                        "failed to load package {path:?} from `{}`: {err}",
                        resolved.display()
                    ),
                ));
                return;
            }
        };

        let (manifest, parse_diags) = parse_file(self.source_manager, file);
        self.diags.extend(parse_diags);

        let Some(clause) = &manifest.package else {
            self.diags.push(
                Diag::error_at(&Pos::file_start(file), format!("missing package clause for {path:?}"))
                    .with_label(DiagLabel::at(&import.path.pos(), "imported here")),
            );
            return;
        };
        if clause.path.value != path {
            self.diags.push(
                Diag::error_at(
                    &clause.path.pos(),
                    format!(
                        "package clause path {:?} does not match import path {path:?}",
                        clause.path.value
                    ),
                )
                .with_label(DiagLabel::at(&import.path.pos(), "imported here")),
            );
        }

        let pkg = unit.symtab.packages.intern(path, &clause.name.value);
        let imports = manifest.imports.clone();
        log::debug!("loaded package {path:?} from {}", resolved.display());
        self.packages
            .insert(path.to_string(), LoadedPackage { pkg, manifest });

        for import in &imports {
            self.load(unit, import);
        }
    }
}

fn dependency_order(
    entry: &Manifest,
    packages: &IndexMap<String, LoadedPackage>,
    diags: &mut Vec<Diag>,
) -> Vec<String> {
    let mut order = Vec::new();
    let mut visited = FxHashSet::default();
    let mut visiting = FxHashSet::default();
    for import in &entry.imports {
        visit_package(import, packages, &mut visited, &mut visiting, &mut order, diags);
    }
    order
}

fn visit_package(
    import: &ImportClause,
    packages: &IndexMap<String, LoadedPackage>,
    visited: &mut FxHashSet<String>,
    visiting: &mut FxHashSet<String>,
    order: &mut Vec<String>,
    diags: &mut Vec<Diag>,
) {
    let path = &import.path.value;
    if visited.contains(path) {
        return;
    }
    let Some(package) = packages.get(path) else {
        return;
    };
    if !visiting.insert(path.clone()) {
        diags.push(Diag::error_at(
            &import.path.pos(),
            format!("import cycle not allowed: {path:?}"),
        ));
        return;
    }

    for dep in &package.manifest.imports {
        visit_package(dep, packages, visited, visiting, order, diags);
    }

    visiting.remove(path);
    visited.insert(path.clone());
    order.push(path.clone());
}

fn resolve_import_path(path: &str, roots: &[PathBuf]) -> Result<PathBuf, String> {
    let relative = manifest_file_name(path);
    let mut hits = Vec::new();
    for root in roots {
        let candidate = root.join(&relative);
        if candidate.is_file() {
            hits.push(candidate);
        }
    }

    match hits.len() {
        0 => Err(format!("package {path:?} not found")),
        1 => Ok(hits.remove(0)),
        _ => {
            let choices = hits
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            Err(format!("ambiguous import {path:?}; candidates: {choices}"))
        }
    }
}

fn manifest_file_name(path: &str) -> String {
    format!("{path}.{MANIFEST_EXT}")
}

struct Binder {
    unit: Unit,
    diags: Vec<Diag>,
}

impl Binder {
    fn bind(
        &mut self,
        entry: &Manifest,
        packages: &IndexMap<String, LoadedPackage>,
        order: &[String],
    ) {
        let deps: Vec<(&LoadedPackage, Scope)> = order
            .iter()
            .filter_map(|path| packages.get(path))
            .map(|package| {
                let scope = self.scope(package.pkg, &package.manifest.imports, packages);
                (package, scope)
            })
            .collect();
        let local = self.scope(self.unit.local_pkg(), &entry.imports, packages);
        if has_errors(&self.diags) {
            return;
        }

        for (package, scope) in &deps {
            self.stub_decls(package, scope);
        }
        if has_errors(&self.diags) {
            return;
        }

        for (package, scope) in &deps {
            log::debug!(
                "importing {}",
                self.unit.symtab.packages.get(package.pkg).path
            );
            self.bind_decls(Mode::Import(package.pkg), scope, &package.manifest.decls);
            if has_errors(&self.diags) {
                return;
            }
        }

        self.unit.dcl_context = DeclContext::Extern;
        self.bind_decls(Mode::Local, &local, &entry.decls);
    }

    fn scope(
        &mut self,
        own: PkgId,
        imports: &[ImportClause],
        packages: &IndexMap<String, LoadedPackage>,
    ) -> Scope {
        let mut aliases = FxHashMap::default();
        let mut seen: FxHashMap<&str, &ImportClause> = FxHashMap::default();

        for import in imports {
            let path = import.path.value.as_str();
            if let Some(first) = seen.insert(path, import) {
                self.diags.push(
                    Diag::warning_at(
                        &import.path.pos(),
                        format!("package {path:?} imported more than once"),
                    )
                    .with_label(DiagLabel::at(&first.path.pos(), "first imported here")),
                );
                continue;
            }

            let pkg = match packages.get(path) {
                Some(package) => package.pkg,
                None if path == RUNTIME_PATH => self.unit.runtime_pkg(),
                // Load failures have already been reported.
                None => continue,
            };
            let alias = match &import.alias {
                Some(alias) => alias.value.clone(),
                None => self.unit.symtab.packages.get(pkg).name.clone(),
            };
            if let Some(previous) = aliases.insert(alias.clone(), pkg) {
                if previous != pkg {
                    self.diags.push(
                        Diag::error_at(
                            &import.path.pos(),
                            format!("import alias `{alias}` is already used"),
                        )
                        .with_help("choose a unique alias in this manifest"),
                    );
                }
            }
        }

        Scope { own, aliases }
    }

    /// Registers a stub for every symbol a dependency describes, so the
    /// importer finds them regardless of the order packages are read in.
    fn stub_decls(&mut self, package: &LoadedPackage, scope: &Scope) {
        for decl in &package.manifest.decls {
            if matches!(decl.kind, DeclKind::Method { .. }) {
                continue;
            }
            match target_pkg(Mode::Import(package.pkg), scope, decl) {
                Ok(pkg) if pkg == self.unit.runtime_pkg() => {}
                Ok(pkg) => {
                    self.unit
                        .symtab
                        .lookup_or_create_stub(pkg, &decl.name.value.name);
                }
                Err(diag) => self.diags.push(diag),
            }
        }
    }

    fn bind_decls(&mut self, mode: Mode, scope: &Scope, decls: &[Decl]) {
        let mut named = FxHashMap::default();
        for phase in Phase::ORDER {
            for (idx, decl) in decls.iter().enumerate() {
                if !phase.includes(&decl.kind) {
                    continue;
                }
                log::trace!("{phase:?} {}", decl.name.value.name);
                if let Err(diag) = self.bind_decl(mode, scope, phase, decl, idx, &mut named) {
                    self.diags.push(diag);
                }
            }
        }
    }

    fn bind_decl(
        &mut self,
        mode: Mode,
        scope: &Scope,
        phase: Phase,
        decl: &Decl,
        idx: usize,
        named: &mut FxHashMap<usize, TypeId>,
    ) -> Result<(), Diag> {
        let pos = decl.pos();
        let name = decl.name.value.name.as_str();
        let fatal = |err: Error| err.to_diag(&pos);
        let pkg = target_pkg(mode, scope, decl)?;

        match (phase, &decl.kind) {
            (Phase::Types, DeclKind::Type(_)) => {
                let ty = match mode {
                    Mode::Import(ipkg) => self.unit.import_type(ipkg, pos.clone(), pkg, name),
                    Mode::Local => self.unit.declare_type(name, pos.clone()),
                }
                .map_err(fatal)?;
                named.insert(idx, ty);
            }
            (Phase::Underlying, DeclKind::Type(expr)) => {
                // Declaring the type failed and has been reported.
                let Some(&ty) = named.get(&idx) else {
                    return Ok(());
                };
                let underlying = self.resolve_type(mode, scope, expr, &pos)?;
                self.unit
                    .set_underlying(mode.importing(), ty, underlying, pos.clone())
                    .map_err(fatal)?;
            }
            (Phase::Aliases, DeclKind::Alias(expr)) => {
                let ty = self.resolve_type(mode, scope, expr, &pos)?;
                let declared = match mode {
                    Mode::Import(ipkg) => self.unit.import_alias(ipkg, pos.clone(), pkg, name, ty),
                    Mode::Local => self
                        .unit
                        .declare_object(name, Op::Alias, ty, pos.clone())
                        .map(drop),
                };
                declared.map_err(fatal)?;
            }
            (Phase::Funcs, DeclKind::Func(sig)) => {
                let sig = self.resolve_signature(mode, scope, sig, None, &pos)?;
                let declared = match mode {
                    Mode::Import(ipkg) => self.unit.import_func(ipkg, pos.clone(), pkg, name, sig),
                    Mode::Local => self
                        .unit
                        .declare_object(name, Op::Func, sig, pos.clone())
                        .map(drop),
                };
                declared.map_err(fatal)?;
            }
            (Phase::Methods, DeclKind::Method { recv, sig }) => {
                let recv = self.resolve_type(mode, scope, recv, &pos)?;
                let base = self.receiver_base(mode, recv, &pos)?;
                let sig = self.resolve_signature(mode, scope, sig, Some(recv), &pos)?;
                let declared = match mode {
                    Mode::Import(ipkg) => {
                        self.unit
                            .add_method(Some(ipkg), base, name, sig, pos.clone())
                    }
                    Mode::Local => self
                        .unit
                        .declare_method(base, name, sig, pos.clone())
                        .map(drop),
                };
                declared.map_err(fatal)?;
            }
            (Phase::Vars, DeclKind::Var(expr)) => {
                let ty = self.resolve_type(mode, scope, expr, &pos)?;
                let declared = match mode {
                    Mode::Import(ipkg) => self.unit.import_var(ipkg, pos.clone(), pkg, name, ty),
                    Mode::Local => self
                        .unit
                        .declare_object(name, Op::Var, ty, pos.clone())
                        .map(drop),
                };
                declared.map_err(fatal)?;
            }
            (Phase::Consts, DeclKind::Const { ty, value }) => {
                let ty = self.resolve_type(mode, scope, ty, &pos)?;
                let value = self.const_value(ty, value, &pos)?;
                let declared = match mode {
                    Mode::Import(ipkg) => {
                        self.unit
                            .import_const(ipkg, pos.clone(), pkg, name, ty, value)
                    }
                    Mode::Local => self
                        .unit
                        .declare_const(name, ty, value, pos.clone())
                        .map(drop),
                };
                declared.map_err(fatal)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn resolve_type(
        &mut self,
        mode: Mode,
        scope: &Scope,
        expr: &TypeExpr,
        pos: &Pos,
    ) -> Result<TypeId, Diag> {
        let ty = match expr {
            TypeExpr::Name(name) => return self.resolve_type_name(mode, scope, name, pos),
            TypeExpr::Pointer(elem) => {
                let elem = self.resolve_type(mode, scope, elem, pos)?;
                self.unit.types.new_pointer(elem)
            }
            TypeExpr::Slice(elem) => {
                let elem = self.resolve_type(mode, scope, elem, pos)?;
                self.unit.types.new_slice(elem)
            }
            TypeExpr::Array(len, elem) => {
                let elem = self.resolve_type(mode, scope, elem, pos)?;
                self.unit.types.new_array(*len, elem)
            }
            TypeExpr::Map(key, value) => {
                let key = self.resolve_type(mode, scope, key, pos)?;
                let value = self.resolve_type(mode, scope, value, pos)?;
                self.unit.types.new_map(key, value)
            }
            TypeExpr::Struct(fields) => {
                let fields = self.resolve_fields(mode, scope, fields, pos)?;
                self.unit.types.new_struct(fields, StructFlavor::Plain)
            }
            TypeExpr::Func(sig) => return self.resolve_signature(mode, scope, sig, None, pos),
        };
        Ok(ty)
    }

    fn resolve_fields(
        &mut self,
        mode: Mode,
        scope: &Scope,
        fields: &[FieldExpr],
        pos: &Pos,
    ) -> Result<Vec<Field>, Diag> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            if field.name != "_" && !seen.insert(field.name.as_str()) {
                return Err(Diag::error_at(pos, format!("duplicate field {}", field.name)));
            }
            out.push(Field {
                name: field.name.clone(),
                ty: self.resolve_type(mode, scope, &field.ty, pos)?,
            });
        }
        Ok(out)
    }

    fn resolve_signature(
        &mut self,
        mode: Mode,
        scope: &Scope,
        sig: &SigExpr,
        recv: Option<TypeId>,
        pos: &Pos,
    ) -> Result<TypeId, Diag> {
        let mut params = Vec::with_capacity(sig.params.len());
        for param in &sig.params {
            params.push(self.resolve_type(mode, scope, param, pos)?);
        }
        let mut results = Vec::with_capacity(sig.results.len());
        for result in &sig.results {
            results.push(self.resolve_type(mode, scope, result, pos)?);
        }

        Ok(self.unit.types.new_func(Signature {
            recv,
            params,
            results,
            variadic: sig.variadic,
        }))
    }

    fn resolve_type_name(
        &mut self,
        mode: Mode,
        scope: &Scope,
        name: &QualName,
        pos: &Pos,
    ) -> Result<TypeId, Diag> {
        let display = match &name.qualifier {
            Some(qualifier) => format!("{qualifier}.{}", name.name),
            None => name.name.clone(),
        };
        let pkg = match name.qualifier.as_deref() {
            Some("unsafe") if name.name == "Pointer" => {
                return Ok(self.unit.types.basic(BasicKind::UnsafePointer));
            }
            Some(qualifier) => scope
                .aliases
                .get(qualifier)
                .copied()
                .ok_or_else(|| Diag::error_at(pos, format!("undefined: {qualifier}")))?,
            None => scope.own,
        };

        let existing = self
            .unit
            .symtab
            .lookup(pkg, &name.name)
            .and_then(|sym| self.unit.symtab.def(sym))
            .map(|decl| (decl.op, decl.ty));
        match (existing, mode) {
            (Some((Op::Type | Op::Alias, Some(ty))), _) => return Ok(ty),
            // Referenced before its own declaration was read.
            (Some((Op::Unresolved, _)), Mode::Import(ipkg)) => {
                return self.forward_type(ipkg, pkg, &name.name, pos);
            }
            (Some((Op::Unresolved, _)), Mode::Local) | (None, _) => {}
            (Some(_), _) => {
                return Err(Diag::error_at(pos, format!("{display} is not a type")));
            }
        }

        if name.qualifier.is_none() {
            if let Some(kind) = BasicKind::from_name(&name.name) {
                return Ok(self.unit.types.basic(kind));
            }
        }
        if let Mode::Import(ipkg) = mode {
            if pkg == self.unit.runtime_pkg() {
                return self.forward_type(ipkg, pkg, &name.name, pos);
            }
        }
        Err(Diag::error_at(pos, format!("undefined: {display}")))
    }

    fn forward_type(&mut self, ipkg: PkgId, pkg: PkgId, name: &str, pos: &Pos) -> Result<TypeId, Diag> {
        self.unit
            .import_type(ipkg, pos.clone(), pkg, name)
            .map_err(|err| err.to_diag(pos))
    }

    /// Named type a method is attached to, looking through one pointer.
    fn receiver_base(&self, mode: Mode, recv: TypeId, pos: &Pos) -> Result<TypeId, Diag> {
        let base = match self.unit.types.kind(recv) {
            TypeKind::Pointer(elem) => *elem,
            _ => recv,
        };
        let invalid = || {
            Diag::error_at(
                pos,
                format!("invalid receiver type {}", format_type(&self.unit, recv)),
            )
        };
        let named = self.unit.types.named(base).ok_or_else(invalid)?;
        if mode == Mode::Local && self.unit.symtab.sym(named.sym).pkg != self.unit.local_pkg() {
            return Err(invalid().with_help("methods can only be declared on local types"));
        }
        Ok(base)
    }

    /// Converts an untyped literal to the representation of constant type
    /// `ty`.
    fn const_value(&self, ty: TypeId, value: &ConstValue, pos: &Pos) -> Result<ConstValue, Diag> {
        let kind = self
            .unit
            .types
            .resolve_underlying(ty)
            .and_then(|underlying| match self.unit.types.kind(underlying) {
                TypeKind::Basic(kind) => Some(*kind),
                _ => None,
            });
        let Some(kind) = kind else {
            return Err(Diag::error_at(
                pos,
                format!("invalid constant type {}", format_type(&self.unit, ty)),
            ));
        };

        let converted = match (kind, value) {
            (BasicKind::Bool, ConstValue::Bool(_)) | (BasicKind::String, ConstValue::String(_)) => {
                value.clone()
            }
            (kind, ConstValue::Int(_)) if kind.is_integer() => value.clone(),
            (BasicKind::Float32 | BasicKind::Float64, ConstValue::Int(v)) => {
                ConstValue::Float(*v as f64)
            }
            (BasicKind::Float32 | BasicKind::Float64, ConstValue::Float(_)) => value.clone(),
            (BasicKind::Complex64 | BasicKind::Complex128, ConstValue::Int(v)) => {
                ConstValue::Complex {
                    re: *v as f64,
                    im: 0.0,
                }
            }
            (BasicKind::Complex64 | BasicKind::Complex128, ConstValue::Float(v)) => {
                ConstValue::Complex { re: *v, im: 0.0 }
            }
            (BasicKind::Complex64 | BasicKind::Complex128, ConstValue::Complex { .. }) => {
                value.clone()
            }
            _ => {
                return Err(Diag::error_at(
                    pos,
                    format!(
                        "cannot use {value} as {} constant",
                        format_type(&self.unit, ty)
                    ),
                ));
            }
        };
        Ok(converted)
    }
}

/// Package a declaration belongs to. Dependency manifests may describe
/// declarations of the packages they import as `alias.Name`.
fn target_pkg(mode: Mode, scope: &Scope, decl: &Decl) -> Result<PkgId, Diag> {
    let name = &decl.name.value;
    match (&name.qualifier, mode) {
        (None, _) => Ok(scope.own),
        (Some(qualifier), Mode::Local) => Err(Diag::error_at(
            &decl.pos(),
            format!(
                "cannot declare {qualifier}.{} outside its own package",
                name.name
            ),
        )),
        (Some(qualifier), Mode::Import(_)) => {
            scope.aliases.get(qualifier).copied().ok_or_else(|| {
                Diag::error_at(&decl.pos(), format!("undefined: {qualifier}"))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::load_unit_from_file;
    use crate::{
        constant::ConstValue,
        diag::{Severity, has_errors},
        source::SourceManager,
        symtab::Op,
        unit::UnitOptions,
    };

    fn load(text: &str) -> super::UnitBuild {
        let mut manager = SourceManager::new(Vec::new());
        let file = manager.add_virtual_file("inline.pkg", text);
        load_unit_from_file(&mut manager, file, UnitOptions::default())
    }

    #[test]
    fn declares_local_package() {
        let build = load(
            "package app \"example.com/app\"\n\
             type Size = int\n\
             type Point struct { x Size; y Size }\n\
             func (*Point) Scale(int)\n\
             const Origin float64 = 1\n",
        );
        assert!(!has_errors(&build.diags), "{:#?}", build.diags);
        let unit = build.unit.expect("unit");

        let origin = unit
            .symtab
            .lookup(unit.local_pkg(), "Origin")
            .expect("Origin");
        let decl = unit.symtab.def(origin).expect("node");
        assert_eq!(decl.op, Op::Const);
        assert_eq!(decl.val, Some(ConstValue::Float(1.0)));
        assert!(
            unit.symtab
                .lookup(unit.local_pkg(), "Point.Scale")
                .is_some()
        );
    }

    #[test]
    fn reports_undefined_types_and_bad_constants() {
        let build = load(
            "package app \"app\"\n\
             var X Missing\n\
             const S string = 1\n\
             var Y other.T\n",
        );
        let messages: Vec<_> = build.diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            ["undefined: Missing", "undefined: other", "cannot use 1 as string constant"]
        );
    }

    #[test]
    fn local_redeclaration_is_reported_with_previous_position() {
        let build = load("package app \"app\"\nvar X int\nfunc X()\n");
        assert_eq!(build.diags.len(), 1);
        assert_eq!(build.diags[0].message, "app.X redeclared in this block");
        assert_eq!(build.diags[0].labels.len(), 1);
    }

    #[test]
    fn missing_package_clause_yields_no_unit() {
        let build = load("var X int\n");
        assert!(build.unit.is_none());
        assert_eq!(build.diags[0].message, "missing package clause");
    }

    #[test]
    fn runtime_import_needs_no_manifest() {
        let build = load(
            "package app \"app\"\n\
             import \"runtime\"\n\
             import \"runtime\"\n\
             var X int\n",
        );
        assert!(!has_errors(&build.diags), "{:#?}", build.diags);
        assert_eq!(build.diags.len(), 1);
        assert_eq!(build.diags[0].severity, Severity::Warning);
    }
}
