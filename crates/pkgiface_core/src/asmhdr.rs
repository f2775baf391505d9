//! `#define` projection of constants and struct layouts for assembly code.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{
    constant::ConstKind,
    error::{Error, Result},
    symtab::Op,
    unit::Unit,
};

impl Unit {
    /// Creates (or truncates) `path` and writes the header for every
    /// candidate collected by `consider_for_export`.
    pub fn write_asm_header(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|err| Error::io(format!("failed to create {}", path.display()), err))?;
        let mut out = BufWriter::new(file);
        self.render_asm_header(&mut out)?;
        out.flush()
            .map_err(|err| Error::io(format!("failed to write {}", path.display()), err))?;
        log::debug!("wrote assembly header {}", path.display());
        Ok(())
    }

    pub fn render_asm_header<W: Write>(&self, out: &mut W) -> Result<()> {
        let write_err = |err: std::io::Error| Error::io("failed to write assembly header", err);

        writeln!(
            out,
            "// generated by pkgiface -asmhdr from package {}\n",
            self.local_name()
        )
        .map_err(write_err)?;

        for &sym in self.asm_list() {
            let symbol = self.symtab.sym(sym);
            if symbol.is_blank() {
                continue;
            }
            let Some(decl) = self.symtab.def(sym) else {
                continue;
            };
            let name = &symbol.name;

            match decl.op {
                Op::Const => {
                    let Some(val) = &decl.val else { continue };
                    if matches!(val.kind(), ConstKind::Float | ConstKind::Complex) {
                        continue;
                    }
                    writeln!(out, "#define const_{name} {val}").map_err(write_err)?;
                }
                Op::Type => {
                    let Some(ty) = decl.ty else { continue };
                    if self.types.plain_struct(ty).is_none() {
                        continue;
                    }
                    writeln!(out, "#define {name}__size {}", self.size_of(ty)?)
                        .map_err(write_err)?;
                    for (field, offset) in self.field_offsets(ty)? {
                        if field.is_empty() || field == "_" {
                            continue;
                        }
                        writeln!(out, "#define {name}_{field} {offset}").map_err(write_err)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::{
        constant::ConstValue,
        error::Error,
        source::{FileId, Pos},
        symtab::Op,
        types::{BasicKind, Field, StructFlavor},
        unit::{Unit, UnitOptions},
    };

    fn pos(at: usize) -> Pos {
        Pos::new(FileId(0), at..at + 1)
    }

    fn header_unit() -> Unit {
        Unit::new(
            "example.com/app",
            "app",
            UnitOptions {
                asm_header: Some(PathBuf::from("go_asm.h")),
                ..UnitOptions::default()
            },
        )
    }

    fn render(unit: &Unit) -> String {
        let mut out = Vec::new();
        unit.render_asm_header(&mut out).expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn numeric_constants_are_projected_and_floats_skipped() {
        let mut unit = header_unit();
        let int = unit.types.basic(BasicKind::Int);
        let f64_ = unit.types.basic(BasicKind::Float64);
        let string = unit.types.basic(BasicKind::String);
        let boolean = unit.types.basic(BasicKind::Bool);
        let c128 = unit.types.basic(BasicKind::Complex128);
        unit.declare_const("Foo", int, ConstValue::Int(42), pos(0)).expect("Foo");
        unit.declare_const("Ratio", f64_, ConstValue::Float(2.5), pos(1)).expect("Ratio");
        unit.declare_const("Phase", c128, ConstValue::Complex { re: 1.0, im: 0.0 }, pos(5))
            .expect("Phase");
        unit.declare_const("greeting", string, ConstValue::String("hi".into()), pos(2))
            .expect("greeting");
        unit.declare_const("Debug", boolean, ConstValue::Bool(false), pos(3))
            .expect("Debug");
        unit.declare_const("_", int, ConstValue::Int(1), pos(4)).expect("blank");

        assert_eq!(
            render(&unit),
            "// generated by pkgiface -asmhdr from package app\n\n\
             #define const_Foo 42\n\
             #define const_greeting \"hi\"\n\
             #define const_Debug false\n"
        );
    }

    #[test]
    fn plain_struct_layout_is_projected() {
        let mut unit = header_unit();
        let point = unit.declare_type("Point", pos(0)).expect("Point");
        let int32 = unit.types.basic(BasicKind::Int32);
        let int64 = unit.types.basic(BasicKind::Int64);
        let def = unit.types.new_struct(
            vec![
                Field {
                    name: "x".into(),
                    ty: int32,
                },
                Field {
                    name: "_".into(),
                    ty: int32,
                },
                Field {
                    name: "y".into(),
                    ty: int64,
                },
            ],
            StructFlavor::Plain,
        );
        unit.set_underlying(None, point, def, pos(0)).expect("define");

        let args = unit.declare_type("args", pos(1)).expect("args");
        let args_def = unit.types.new_struct(Vec::new(), StructFlavor::FuncArgs);
        unit.set_underlying(None, args, args_def, pos(1)).expect("define");

        let count = unit.types.basic(BasicKind::Int);
        unit.declare_object("Count", Op::Var, count, pos(2)).expect("Count");

        assert_eq!(
            render(&unit),
            "// generated by pkgiface -asmhdr from package app\n\n\
             #define Point__size 16\n\
             #define Point_x 0\n\
             #define Point_y 8\n"
        );
    }

    #[test]
    fn header_file_is_created_and_failures_are_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut unit = header_unit();
        let int = unit.types.basic(BasicKind::Int);
        unit.declare_const("Foo", int, ConstValue::Int(42), pos(0)).expect("Foo");

        let path = dir.path().join("go_asm.h");
        std::fs::write(&path, "stale contents that must be truncated\n").expect("seed");
        unit.write_asm_header(&path).expect("write");
        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.ends_with("\n\n#define const_Foo 42\n"));

        let missing = dir.path().join("no-such-dir").join("go_asm.h");
        assert!(matches!(
            unit.write_asm_header(&missing),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn oversized_struct_fails_instead_of_wrapping() {
        let mut unit = header_unit();
        let big = unit.declare_type("Big", pos(0)).expect("Big");
        let int64 = unit.types.basic(BasicKind::Int64);
        let huge = unit.types.new_array(u64::MAX, int64);
        let def = unit.types.new_struct(
            vec![Field {
                name: "a".into(),
                ty: huge,
            }],
            StructFlavor::Plain,
        );
        unit.set_underlying(None, big, def, pos(0)).expect("define");

        let mut out = Vec::new();
        assert!(matches!(
            unit.render_asm_header(&mut out),
            Err(Error::TypeTooLarge(_))
        ));
        let text = String::from_utf8(out).expect("utf8");
        assert!(!text.contains("Big__size"), "{text}");
    }
}
