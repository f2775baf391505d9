use pretty::{Arena, DocAllocator, DocBuilder};

use crate::{
    symtab::{Op, SymId},
    types::{Signature, TypeId, TypeKind},
    unit::Unit,
};

const FORMAT_WIDTH: usize = 100;
const FIELD_INDENT: isize = 4;
const ONE_LINE: usize = 1 << 16;

type Doc<'a> = DocBuilder<'a, Arena<'a>>;

/// Single-line rendering of `ty`, as used by the echo log and diagnostics.
pub fn format_type(unit: &Unit, ty: TypeId) -> String {
    let arena = Arena::new();
    let doc = doc_type(&arena, unit, ty);
    render_doc(doc, ONE_LINE)
}

/// Parameter and result lists of a function type, without the `func`
/// keyword.
pub fn format_signature(unit: &Unit, ty: TypeId) -> String {
    let arena = Arena::new();
    let doc = match unit.types.signature(ty) {
        Some(sig) => doc_signature(&arena, unit, sig),
        None => doc_type(&arena, unit, ty),
    };
    render_doc(doc, ONE_LINE)
}

/// Declaration of `sym` in manifest syntax, or `None` for stubs.
pub fn format_decl(unit: &Unit, sym: SymId) -> Option<String> {
    let arena = Arena::new();
    let doc = doc_decl(&arena, unit, sym)?;
    Some(render_doc(doc, FORMAT_WIDTH))
}

/// Local declarations of the unit followed by its export queue.
pub fn format_unit(unit: &Unit) -> String {
    let arena = Arena::new();
    let header = arena
        .text("package ")
        .append(arena.text(unit.local_name().to_string()))
        .append(arena.space())
        .append(arena.text(format!("{:?}", unit.local_path())));

    let decls: Vec<_> = unit
        .symtab
        .symbols()
        .filter(|(_, symbol)| symbol.pkg == unit.local_pkg())
        .filter_map(|(sym, _)| doc_decl(&arena, unit, sym))
        .collect();

    let mut doc = header.append(arena.hardline());
    if !decls.is_empty() {
        doc = doc
            .append(arena.hardline())
            .append(arena.intersperse(decls, arena.hardline()))
            .append(arena.hardline());
    }

    let exports: Vec<_> = unit
        .export_list()
        .iter()
        .map(|sym| arena.text(unit.symtab.sym(*sym).name.clone()))
        .collect();
    if !exports.is_empty() {
        doc = doc
            .append(arena.hardline())
            .append(arena.text("// exports: "))
            .append(arena.intersperse(exports, arena.space()))
            .append(arena.hardline());
    }

    render_doc(doc, FORMAT_WIDTH)
}

fn render_doc(doc: Doc<'_>, width: usize) -> String {
    let mut out = Vec::new();
    doc.render(width, &mut out)
        .expect("writing to Vec<u8> cannot fail");
    String::from_utf8(out).expect("formatter produced invalid UTF-8")
}

fn doc_decl<'a>(arena: &'a Arena<'a>, unit: &Unit, sym: SymId) -> Option<Doc<'a>> {
    let decl = unit.symtab.def(sym)?;
    let ty = decl.ty?;
    let name = unit.symtab.sym(sym).name.clone();

    let doc = match decl.op {
        Op::Unresolved => return None,
        Op::Type => {
            let body = match unit.types.named(ty).and_then(|named| named.underlying) {
                Some(underlying) => doc_type(arena, unit, underlying),
                None => arena.text("/* incomplete */"),
            };
            arena
                .text("type ")
                .append(arena.text(name))
                .append(arena.space())
                .append(body)
        }
        Op::Alias => arena
            .text("type ")
            .append(arena.text(name))
            .append(arena.text(" = "))
            .append(doc_type(arena, unit, ty)),
        Op::Func => {
            let sig = unit.types.signature(ty)?;
            let head = match sig.recv {
                // Methods are registered as `Recv.Name`.
                Some(recv) => {
                    let method = name.rsplit('.').next().unwrap_or_default().to_string();
                    arena
                        .text("func (")
                        .append(doc_type(arena, unit, recv))
                        .append(arena.text(") "))
                        .append(arena.text(method))
                }
                None => arena.text("func ").append(arena.text(name)),
            };
            head.append(doc_signature(arena, unit, sig))
        }
        Op::Var => arena
            .text("var ")
            .append(arena.text(name))
            .append(arena.space())
            .append(doc_type(arena, unit, ty)),
        Op::Const => {
            let value = decl
                .val
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            arena
                .text("const ")
                .append(arena.text(name))
                .append(arena.space())
                .append(doc_type(arena, unit, ty))
                .append(arena.text(" = "))
                .append(arena.text(value))
        }
    };
    Some(doc.group())
}

fn doc_type<'a>(arena: &'a Arena<'a>, unit: &Unit, ty: TypeId) -> Doc<'a> {
    match unit.types.kind(ty) {
        TypeKind::Basic(kind) => arena.text(kind.name()),
        TypeKind::Named(named) => arena.text(unit.symtab.qualified_name(named.sym)),
        TypeKind::Pointer(elem) => arena.text("*").append(doc_type(arena, unit, *elem)),
        TypeKind::Slice(elem) => arena.text("[]").append(doc_type(arena, unit, *elem)),
        TypeKind::Array { len, elem } => arena
            .text(format!("[{len}]"))
            .append(doc_type(arena, unit, *elem)),
        TypeKind::Map { key, value } => arena
            .text("map[")
            .append(doc_type(arena, unit, *key))
            .append(arena.text("]"))
            .append(doc_type(arena, unit, *value)),
        TypeKind::Struct(st) => {
            if st.fields.is_empty() {
                return arena.text("struct {}");
            }
            let fields = st.fields.iter().map(|field| {
                arena
                    .text(field.name.clone())
                    .append(arena.space())
                    .append(doc_type(arena, unit, field.ty))
            });
            arena
                .text("struct {")
                .append(
                    arena
                        .line()
                        .append(arena.intersperse(fields, arena.text(";").append(arena.line())))
                        .nest(FIELD_INDENT),
                )
                .append(arena.line())
                .append(arena.text("}"))
                .group()
        }
        TypeKind::Func(sig) => arena.text("func").append(doc_signature(arena, unit, sig)),
    }
}

fn doc_signature<'a>(arena: &'a Arena<'a>, unit: &Unit, sig: &Signature) -> Doc<'a> {
    let last = sig.params.len().saturating_sub(1);
    let params = sig.params.iter().enumerate().map(|(idx, param)| {
        match unit.types.kind(*param) {
            TypeKind::Slice(elem) if sig.variadic && idx == last => {
                arena.text("...").append(doc_type(arena, unit, *elem))
            }
            _ => doc_type(arena, unit, *param),
        }
    });
    let params = arena
        .text("(")
        .append(arena.intersperse(params, arena.text(", ")))
        .append(arena.text(")"));

    let results = match sig.results.as_slice() {
        [] => arena.nil(),
        [single] if !matches!(unit.types.kind(*single), TypeKind::Func(_)) => {
            arena.space().append(doc_type(arena, unit, *single))
        }
        many => arena
            .text(" (")
            .append(arena.intersperse(
                many.iter().map(|result| doc_type(arena, unit, *result)),
                arena.text(", "),
            ))
            .append(arena.text(")")),
    };

    params.append(results)
}

#[cfg(test)]
mod tests {
    use super::{format_decl, format_signature, format_type, format_unit};
    use crate::{
        constant::ConstValue,
        source::{FileId, Pos},
        symtab::Op,
        types::{BasicKind, Field, Signature, StructFlavor},
        unit::{Unit, UnitOptions},
    };

    fn pos() -> Pos {
        Pos::new(FileId(0), 0..1)
    }

    #[test]
    fn formats_composite_types_on_one_line() {
        let mut unit = Unit::new("example.com/lib", "lib", UnitOptions::default());
        let file = unit.declare_type("File", pos()).expect("File");
        let string = unit.types.basic(BasicKind::String);
        let int = unit.types.basic(BasicKind::Int);
        let ptr = unit.types.new_pointer(file);
        let ints = unit.types.new_slice(int);
        let map = unit.types.new_map(string, ptr);
        let st = unit.types.new_struct(
            vec![
                Field {
                    name: "fd".into(),
                    ty: int,
                },
                Field {
                    name: "names".into(),
                    ty: map,
                },
            ],
            StructFlavor::Plain,
        );

        assert_eq!(
            format_type(&unit, st),
            "struct { fd int; names map[string]*lib.File }"
        );

        let open = unit.types.new_func(Signature {
            params: vec![string, ints],
            results: vec![ptr, int],
            variadic: true,
            ..Signature::default()
        });
        assert_eq!(format_signature(&unit, open), "(string, ...int) (*lib.File, int)");
    }

    #[test]
    fn dumps_local_declarations_and_exports() {
        let mut unit = Unit::new("example.com/app", "app", UnitOptions::default());
        let int = unit.types.basic(BasicKind::Int);
        let point = unit.declare_type("Point", pos()).expect("Point");
        let def = unit.types.new_struct(
            vec![Field {
                name: "x".into(),
                ty: int,
            }],
            StructFlavor::Plain,
        );
        unit.set_underlying(None, point, def, pos()).expect("define");
        let len = unit.types.new_func(Signature {
            recv: Some(point),
            results: vec![int],
            ..Signature::default()
        });
        let method = unit.declare_method(point, "Len", len, pos()).expect("Len");
        unit.declare_const("limit", int, ConstValue::Int(3), pos())
            .expect("limit");
        unit.declare_object("Count", Op::Var, int, pos()).expect("Count");

        assert_eq!(
            format_decl(&unit, method).as_deref(),
            Some("func (app.Point) Len() int")
        );
        assert_eq!(
            format_unit(&unit),
            "package app \"example.com/app\"\n\
             \n\
             type Point struct { x int }\n\
             func (app.Point) Len() int\n\
             const limit int = 3\n\
             var Count int\n\
             \n\
             // exports: Point Count\n"
        );
    }
}
