//! Binary encoding of the export queue.

use std::io::{self, Write};

use crate::{
    constant::ConstValue,
    symtab::{Op, SymId},
    types::{BasicKind, TypeId, TypeKind},
    unit::Unit,
};

/// Serializes the declarations named by the export queue. The interface
/// writer supplies framing and measures the size; an encoder only emits the
/// payload.
pub trait Encoder {
    fn encode(&mut self, unit: &Unit, exports: &[SymId], out: &mut dyn Write) -> io::Result<()>;
}

pub const INDEX_MAGIC: u8 = b'i';
pub const INDEX_VERSION: u64 = 1;

mod tag {
    pub const TYPE: u8 = b'T';
    pub const ALIAS: u8 = b'A';
    pub const FUNC: u8 = b'F';
    pub const VAR: u8 = b'V';
    pub const CONST: u8 = b'C';

    pub const BASIC: u8 = 0;
    pub const NAMED: u8 = 1;
    pub const POINTER: u8 = 2;
    pub const SLICE: u8 = 3;
    pub const ARRAY: u8 = 4;
    pub const MAP: u8 = 5;
    pub const STRUCT: u8 = 6;
    pub const FUNC_TYPE: u8 = 7;

    pub const BOOL: u8 = 0;
    pub const STRING: u8 = 1;
    pub const INT: u8 = 2;
    pub const FLOAT: u8 = 3;
    pub const COMPLEX: u8 = 4;
}

/// Reference encoder. Named types are written by reference (package path and
/// name), so recursive types need no back-patching; a named type's structure
/// and methods are written with its `T` record.
#[derive(Debug, Default)]
pub struct IndexEncoder;

impl Encoder for IndexEncoder {
    fn encode(&mut self, unit: &Unit, exports: &[SymId], out: &mut dyn Write) -> io::Result<()> {
        let mut w = IndexWriter { unit, out };
        w.byte(INDEX_MAGIC)?;
        w.uvarint(u128::from(INDEX_VERSION))?;
        w.string(unit.local_path())?;
        w.string(unit.local_name())?;
        w.uvarint(exports.len() as u128)?;

        for &sym in exports {
            w.decl(sym)?;
        }
        Ok(())
    }
}

struct IndexWriter<'a> {
    unit: &'a Unit,
    out: &'a mut dyn Write,
}

impl IndexWriter<'_> {
    fn decl(&mut self, sym: SymId) -> io::Result<()> {
        let unit = self.unit;
        let Some(decl) = unit.symtab.def(sym) else {
            return Err(invalid(format!(
                "{} has no declaration",
                unit.symtab.qualified_name(sym)
            )));
        };
        let Some(ty) = decl.ty else {
            return Err(invalid(format!(
                "{} has no type",
                unit.symtab.qualified_name(sym)
            )));
        };

        let tag = match decl.op {
            Op::Type => tag::TYPE,
            Op::Alias => tag::ALIAS,
            Op::Func => tag::FUNC,
            Op::Var => tag::VAR,
            Op::Const => tag::CONST,
            Op::Unresolved => {
                return Err(invalid(format!(
                    "{} is unresolved",
                    unit.symtab.qualified_name(sym)
                )));
            }
        };
        self.byte(tag)?;
        self.string(&unit.symtab.sym(sym).name)?;

        match decl.op {
            Op::Type => self.named_body(ty),
            Op::Const => {
                self.ty(ty)?;
                match &decl.val {
                    Some(val) => self.value(val),
                    None => Err(invalid("constant without value".to_string())),
                }
            }
            _ => self.ty(ty),
        }
    }

    fn named_body(&mut self, ty: TypeId) -> io::Result<()> {
        let unit = self.unit;
        let Some(named) = unit.types.named(ty) else {
            return self.ty(ty);
        };
        match named.underlying {
            Some(underlying) => self.ty(underlying)?,
            None => return Err(invalid("type without underlying definition".to_string())),
        }
        self.uvarint(named.methods.len() as u128)?;
        for method in &named.methods {
            self.string(&method.name)?;
            self.ty(method.sig)?;
        }
        Ok(())
    }

    fn ty(&mut self, ty: TypeId) -> io::Result<()> {
        let unit = self.unit;
        match unit.types.kind(ty) {
            TypeKind::Basic(kind) => {
                self.byte(tag::BASIC)?;
                self.byte(basic_index(*kind))
            }
            TypeKind::Named(named) => {
                let sym = unit.symtab.sym(named.sym);
                self.byte(tag::NAMED)?;
                self.string(&unit.symtab.packages.get(sym.pkg).path)?;
                self.string(&sym.name)
            }
            TypeKind::Pointer(elem) => {
                self.byte(tag::POINTER)?;
                self.ty(*elem)
            }
            TypeKind::Slice(elem) => {
                self.byte(tag::SLICE)?;
                self.ty(*elem)
            }
            TypeKind::Array { len, elem } => {
                self.byte(tag::ARRAY)?;
                self.uvarint(u128::from(*len))?;
                self.ty(*elem)
            }
            TypeKind::Map { key, value } => {
                self.byte(tag::MAP)?;
                self.ty(*key)?;
                self.ty(*value)
            }
            TypeKind::Struct(st) => {
                self.byte(tag::STRUCT)?;
                self.uvarint(st.fields.len() as u128)?;
                for field in &st.fields {
                    self.string(&field.name)?;
                    self.ty(field.ty)?;
                }
                Ok(())
            }
            TypeKind::Func(sig) => {
                self.byte(tag::FUNC_TYPE)?;
                self.byte(u8::from(sig.variadic))?;
                self.uvarint(sig.params.len() as u128)?;
                for param in &sig.params {
                    self.ty(*param)?;
                }
                self.uvarint(sig.results.len() as u128)?;
                for result in &sig.results {
                    self.ty(*result)?;
                }
                Ok(())
            }
        }
    }

    fn value(&mut self, val: &ConstValue) -> io::Result<()> {
        match val {
            ConstValue::Bool(v) => {
                self.byte(tag::BOOL)?;
                self.byte(u8::from(*v))
            }
            ConstValue::String(v) => {
                self.byte(tag::STRING)?;
                self.string(v)
            }
            ConstValue::Int(v) => {
                self.byte(tag::INT)?;
                self.varint(*v)
            }
            ConstValue::Float(v) => {
                self.byte(tag::FLOAT)?;
                self.out.write_all(&v.to_le_bytes())
            }
            ConstValue::Complex { re, im } => {
                self.byte(tag::COMPLEX)?;
                self.out.write_all(&re.to_le_bytes())?;
                self.out.write_all(&im.to_le_bytes())
            }
        }
    }

    fn byte(&mut self, b: u8) -> io::Result<()> {
        self.out.write_all(&[b])
    }

    fn string(&mut self, s: &str) -> io::Result<()> {
        self.uvarint(s.len() as u128)?;
        self.out.write_all(s.as_bytes())
    }

    fn varint(&mut self, v: i128) -> io::Result<()> {
        let zigzag = ((v << 1) ^ (v >> 127)) as u128;
        self.uvarint(zigzag)
    }

    fn uvarint(&mut self, mut v: u128) -> io::Result<()> {
        let mut buf = [0u8; 19];
        let mut len = 0;
        while v >= 0x80 {
            buf[len] = (v as u8) | 0x80;
            v >>= 7;
            len += 1;
        }
        buf[len] = v as u8;
        self.out.write_all(&buf[..=len])
    }
}

fn basic_index(kind: BasicKind) -> u8 {
    BasicKind::ALL
        .iter()
        .position(|candidate| *candidate == kind)
        .unwrap_or_default() as u8
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

#[cfg(test)]
mod tests {
    use super::{Encoder, IndexEncoder};
    use crate::{
        constant::ConstValue,
        source::{FileId, Pos},
        symtab::Op,
        types::{BasicKind, Field, StructFlavor},
        unit::{Unit, UnitOptions},
    };

    fn pos(at: usize) -> Pos {
        Pos::new(FileId(0), at..at + 1)
    }

    fn encode(unit: &Unit) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        IndexEncoder.encode(unit, unit.export_list(), &mut out)?;
        Ok(out)
    }

    #[test]
    fn header_names_the_package() {
        let unit = Unit::new("p", "p", UnitOptions::default());
        let bytes = encode(&unit).expect("encode");
        assert_eq!(bytes, b"i\x01\x01p\x01p\x00");
    }

    #[test]
    fn negative_constants_are_zigzag_encoded() {
        let mut unit = Unit::new("p", "p", UnitOptions::default());
        let int = unit.types.basic(BasicKind::Int);
        unit.declare_const("Min", int, ConstValue::Int(-1), pos(0))
            .expect("declare");

        let bytes = encode(&unit).expect("encode");
        // count, tag, name, basic int, int tag, zigzag(-1)
        assert!(bytes.ends_with(b"\x01C\x03Min\x00\x09\x02\x01"));
    }

    #[test]
    fn recursive_type_is_written_by_reference() {
        let mut unit = Unit::new("p", "p", UnitOptions::default());
        let node = unit.declare_type("Node", pos(0)).expect("declare");
        let ptr = unit.types.new_pointer(node);
        let def = unit.types.new_struct(
            vec![Field {
                name: "next".to_string(),
                ty: ptr,
            }],
            StructFlavor::Plain,
        );
        unit.set_underlying(None, node, def, pos(0)).expect("define");

        let bytes = encode(&unit).expect("encode");
        assert!(bytes.ends_with(b"T\x04Node\x06\x01\x04next\x02\x01\x01p\x04Node\x00"));
    }

    #[test]
    fn forward_declared_type_cannot_be_encoded() {
        let mut unit = Unit::new("p", "p", UnitOptions::default());
        unit.declare_type("Opaque", pos(0)).expect("declare");
        assert!(encode(&unit).is_err());

        let mut unit = Unit::new("p", "p", UnitOptions::default());
        let int = unit.types.basic(BasicKind::Int);
        unit.declare_object("Count", Op::Var, int, pos(0)).expect("declare");
        assert!(encode(&unit).is_ok());
    }
}
