use std::{fs, path::Path};

use pkgiface_core::{
    UnitOptions,
    diag::{Severity, has_errors},
    loader::{UnitBuild, load_unit},
    source::SourceManager,
    symtab::Op,
};
use tempfile::tempdir;

const BASE: &str = "package base \"example.com/base\"\n\
                    type File struct { fd int; name string }\n\
                    func Open(string) *File\n\
                    func (*File) Close() bool\n";

const LEFT: &str = "package left \"example.com/left\"\n\
                    import \"example.com/base\"\n\
                    type Handle = *base.File\n\
                    type base.File struct { fd int; name string }\n\
                    func base.Open(string) *base.File\n\
                    func Use(Handle) bool\n";

const RIGHT: &str = "package right \"example.com/right\"\n\
                     import b \"example.com/base\"\n\
                     func b.Open(string) *b.File\n\
                     const Limit int = 4\n";

fn load(entry: &Path, include_dirs: Vec<std::path::PathBuf>) -> UnitBuild {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut source_manager = SourceManager::new(include_dirs);
    load_unit(&mut source_manager, entry, UnitOptions::default())
}

fn messages(build: &UnitBuild) -> Vec<&str> {
    build.diags.iter().map(|diag| diag.message.as_str()).collect()
}

#[test]
fn diamond_imports_share_declarations() {
    let temp = tempdir().expect("create tempdir");
    write_file(
        temp.path().join("app.pkg"),
        "package app \"example.com/app\"\n\
         import \"example.com/left\"\n\
         import \"example.com/right\"\n\
         var Main left.Handle\n\
         const Max int = 8\n",
    );
    write_file(temp.path().join("example.com/base.pkg"), BASE);
    write_file(temp.path().join("example.com/left.pkg"), LEFT);
    write_file(temp.path().join("example.com/right.pkg"), RIGHT);

    let build = load(&temp.path().join("app.pkg"), Vec::new());
    assert!(!has_errors(&build.diags), "diagnostics: {:#?}", build.diags);
    let unit = build.unit.expect("unit");

    let base = unit
        .symtab
        .packages
        .by_path("example.com/base")
        .expect("base package");
    let open = unit.symtab.lookup(base, "Open").expect("Open");
    let decl = unit.symtab.def(open).expect("Open node");
    assert_eq!(decl.op, Op::Func);
    assert_eq!(decl.imported_from, Some(base));

    let file = unit.symtab.lookup(base, "File").expect("File");
    let file_ty = unit.symtab.def(file).and_then(|decl| decl.ty).expect("File type");
    let named = unit.types.named(file_ty).expect("named");
    assert_eq!(named.methods.len(), 1);

    let exported: Vec<_> = unit
        .export_list()
        .iter()
        .map(|sym| unit.symtab.sym(*sym).name.as_str())
        .collect();
    assert_eq!(exported, ["Main", "Max"]);
}

#[test]
fn conflicting_redescription_names_the_importing_package() {
    let temp = tempdir().expect("create tempdir");
    write_file(
        temp.path().join("app.pkg"),
        "package app \"example.com/app\"\n\
         import \"example.com/left\"\n\
         import \"example.com/right\"\n",
    );
    write_file(temp.path().join("example.com/base.pkg"), BASE);
    write_file(temp.path().join("example.com/left.pkg"), LEFT);
    write_file(
        temp.path().join("example.com/right.pkg"),
        "package right \"example.com/right\"\n\
         import \"example.com/base\"\n\
         var base.Open int\n",
    );

    let build = load(&temp.path().join("app.pkg"), Vec::new());
    assert!(has_errors(&build.diags), "diagnostics: {:#?}", build.diags);
    assert_eq!(
        messages(&build),
        ["base.Open redeclared during import \"example.com/right\""]
    );
    assert_eq!(build.diags[0].labels.len(), 1);
}

#[test]
fn dependency_packages_are_found_in_include_dirs() {
    let temp = tempdir().expect("create tempdir");
    let deps = temp.path().join("deps");
    write_file(
        temp.path().join("src/app.pkg"),
        "package app \"example.com/app\"\n\
         import \"example.com/right\"\n\
         const Twice int = 8\n",
    );
    write_file(deps.join("example.com/base.pkg"), BASE);
    write_file(deps.join("example.com/right.pkg"), RIGHT);

    let build = load(&temp.path().join("src/app.pkg"), vec![deps]);
    assert!(!has_errors(&build.diags), "diagnostics: {:#?}", build.diags);
}

#[test]
fn reports_missing_and_ambiguous_packages() {
    let temp = tempdir().expect("create tempdir");
    let extra = temp.path().join("extra");
    write_file(
        temp.path().join("app.pkg"),
        "package app \"example.com/app\"\n\
         import \"example.com/base\"\n\
         import \"example.com/gone\"\n",
    );
    write_file(temp.path().join("example.com/base.pkg"), BASE);
    write_file(extra.join("example.com/base.pkg"), BASE);

    let build = load(&temp.path().join("app.pkg"), vec![extra]);
    let messages = messages(&build);
    assert_eq!(messages.len(), 2, "diagnostics: {:#?}", build.diags);
    assert!(messages[0].starts_with("ambiguous import \"example.com/base\"; candidates: "));
    assert_eq!(messages[1], "package \"example.com/gone\" not found");
    assert_eq!(
        build.diags[1].help.as_deref(),
        Some("expected file `example.com/gone.pkg`")
    );
}

#[test]
fn rejects_package_clause_that_disagrees_with_import_path() {
    let temp = tempdir().expect("create tempdir");
    write_file(
        temp.path().join("app.pkg"),
        "package app \"example.com/app\"\nimport \"example.com/base\"\n",
    );
    write_file(
        temp.path().join("example.com/base.pkg"),
        "package base \"example.com/other\"\n",
    );

    let build = load(&temp.path().join("app.pkg"), Vec::new());
    assert_eq!(
        messages(&build),
        ["package clause path \"example.com/other\" does not match import path \"example.com/base\""]
    );
}

#[test]
fn rejects_import_cycles() {
    let temp = tempdir().expect("create tempdir");
    write_file(
        temp.path().join("app.pkg"),
        "package app \"example.com/app\"\nimport \"example.com/a\"\n",
    );
    write_file(
        temp.path().join("example.com/a.pkg"),
        "package a \"example.com/a\"\nimport \"example.com/b\"\n",
    );
    write_file(
        temp.path().join("example.com/b.pkg"),
        "package b \"example.com/b\"\nimport \"example.com/a\"\n",
    );

    let build = load(&temp.path().join("app.pkg"), Vec::new());
    assert_eq!(
        messages(&build),
        ["import cycle not allowed: \"example.com/a\""]
    );
}

#[test]
fn dependency_may_refer_to_runtime_declarations_lazily() {
    let temp = tempdir().expect("create tempdir");
    write_file(
        temp.path().join("app.pkg"),
        "package app \"example.com/app\"\nimport \"example.com/sys\"\n",
    );
    write_file(
        temp.path().join("example.com/sys.pkg"),
        "package sys \"example.com/sys\"\n\
         import \"runtime\"\n\
         import \"runtime\"\n\
         func runtime.memmove(*runtime.Buf, *runtime.Buf, uintptr)\n\
         var Page runtime.Buf\n",
    );

    let build = load(&temp.path().join("app.pkg"), Vec::new());
    assert!(!has_errors(&build.diags), "diagnostics: {:#?}", build.diags);
    assert_eq!(build.diags.len(), 1);
    assert_eq!(build.diags[0].severity, Severity::Warning);

    let unit = build.unit.expect("unit");
    let memmove = unit
        .symtab
        .lookup(unit.runtime_pkg(), "memmove")
        .expect("memmove");
    assert_eq!(unit.symtab.def(memmove).map(|decl| decl.op), Some(Op::Func));
    let buf = unit.symtab.lookup(unit.runtime_pkg(), "Buf").expect("Buf");
    assert_eq!(unit.symtab.def(buf).map(|decl| decl.op), Some(Op::Type));
}

#[test]
fn reports_unreadable_entry() {
    let temp = tempdir().expect("create tempdir");
    let build = load(&temp.path().join("missing.pkg"), Vec::new());
    assert!(build.unit.is_none());
    assert!(
        build.diags[0].message.starts_with("failed to read input file: "),
        "diagnostics: {:#?}",
        build.diags
    );
}

fn write_file(path: impl AsRef<Path>, contents: &str) {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directories");
    }
    fs::write(path, contents).expect("write file");
}
