//! Arena of type nodes.
//!
//! Types are addressed by `TypeId` so a named type can be referenced before
//! its underlying definition is attached, which is what makes recursive and
//! mutually recursive types across packages representable.

use rustc_hash::FxHashMap;

use crate::{source::Pos, symtab::SymId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int,
    Uint,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
}

impl BasicKind {
    pub const ALL: [BasicKind; 18] = [
        BasicKind::Bool,
        BasicKind::Int8,
        BasicKind::Int16,
        BasicKind::Int32,
        BasicKind::Int64,
        BasicKind::Uint8,
        BasicKind::Uint16,
        BasicKind::Uint32,
        BasicKind::Uint64,
        BasicKind::Int,
        BasicKind::Uint,
        BasicKind::Uintptr,
        BasicKind::Float32,
        BasicKind::Float64,
        BasicKind::Complex64,
        BasicKind::Complex128,
        BasicKind::String,
        BasicKind::UnsafePointer,
    ];

    /// Resolves a universe-scope type name, including the `byte` and `rune`
    /// spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "byte" => Some(BasicKind::Uint8),
            "rune" => Some(BasicKind::Int32),
            _ => Self::ALL.into_iter().find(|kind| kind.name() == name),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Int => "int",
            BasicKind::Uint => "uint",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "unsafe.Pointer",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            BasicKind::Bool
                | BasicKind::Float32
                | BasicKind::Float64
                | BasicKind::Complex64
                | BasicKind::Complex128
                | BasicKind::String
                | BasicKind::UnsafePointer
        )
    }
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub sig: TypeId,
    pub pos: Option<Pos>,
}

#[derive(Clone, Debug)]
pub struct NamedType {
    pub sym: SymId,
    pub underlying: Option<TypeId>,
    pub methods: Vec<Method>,
}

/// What a struct type is used for. Only `Plain` structs describe a layout an
/// assembler may rely on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructFlavor {
    Plain,
    MapInternal,
    FuncArgs,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug)]
pub struct StructType {
    pub fields: Vec<Field>,
    pub flavor: StructFlavor,
}

#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub recv: Option<TypeId>,
    pub params: Vec<TypeId>,
    pub results: Vec<TypeId>,
    pub variadic: bool,
}

#[derive(Clone, Debug)]
pub enum TypeKind {
    Basic(BasicKind),
    Named(NamedType),
    Pointer(TypeId),
    Slice(TypeId),
    Array { len: u64, elem: TypeId },
    Map { key: TypeId, value: TypeId },
    Struct(StructType),
    Func(Signature),
}

#[derive(Clone, Debug, Default)]
pub struct Types {
    kinds: Vec<TypeKind>,
    basics: FxHashMap<BasicKind, TypeId>,
}

impl Types {
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    pub fn basic(&mut self, kind: BasicKind) -> TypeId {
        if let Some(id) = self.basics.get(&kind) {
            return *id;
        }
        let id = self.alloc(TypeKind::Basic(kind));
        self.basics.insert(kind, id);
        id
    }

    /// Allocates a named type with no underlying definition yet.
    pub fn new_named(&mut self, sym: SymId) -> TypeId {
        self.alloc(TypeKind::Named(NamedType {
            sym,
            underlying: None,
            methods: Vec::new(),
        }))
    }

    pub fn new_pointer(&mut self, elem: TypeId) -> TypeId {
        self.alloc(TypeKind::Pointer(elem))
    }

    pub fn new_slice(&mut self, elem: TypeId) -> TypeId {
        self.alloc(TypeKind::Slice(elem))
    }

    pub fn new_array(&mut self, len: u64, elem: TypeId) -> TypeId {
        self.alloc(TypeKind::Array { len, elem })
    }

    pub fn new_map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.alloc(TypeKind::Map { key, value })
    }

    pub fn new_struct(&mut self, fields: Vec<Field>, flavor: StructFlavor) -> TypeId {
        self.alloc(TypeKind::Struct(StructType { fields, flavor }))
    }

    pub fn new_func(&mut self, sig: Signature) -> TypeId {
        self.alloc(TypeKind::Func(sig))
    }

    pub fn named(&self, id: TypeId) -> Option<&NamedType> {
        match self.kind(id) {
            TypeKind::Named(named) => Some(named),
            _ => None,
        }
    }

    pub(crate) fn named_mut(&mut self, id: TypeId) -> Option<&mut NamedType> {
        match &mut self.kinds[id.0 as usize] {
            TypeKind::Named(named) => Some(named),
            _ => None,
        }
    }

    pub fn signature(&self, id: TypeId) -> Option<&Signature> {
        match self.kind(id) {
            TypeKind::Func(sig) => Some(sig),
            _ => None,
        }
    }

    /// Follows chains of named types down to a structural type. Returns
    /// `None` when some named type in the chain is still forward-declared or
    /// the chain loops.
    pub fn resolve_underlying(&self, id: TypeId) -> Option<TypeId> {
        let mut current = id;
        for _ in 0..=self.kinds.len() {
            match self.kind(current) {
                TypeKind::Named(named) => current = named.underlying?,
                _ => return Some(current),
            }
        }
        None
    }

    /// Struct definition of `id` if it is (or names) a plain field record.
    pub fn plain_struct(&self, id: TypeId) -> Option<&StructType> {
        match self.kind(self.resolve_underlying(id)?) {
            TypeKind::Struct(st) if st.flavor == StructFlavor::Plain => Some(st),
            _ => None,
        }
    }

    /// Structural identity. Named types are identical only to themselves,
    /// which also keeps the comparison finite on recursive types.
    pub fn identical(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }

        match (self.kind(a), self.kind(b)) {
            (TypeKind::Basic(x), TypeKind::Basic(y)) => x == y,
            (TypeKind::Pointer(x), TypeKind::Pointer(y))
            | (TypeKind::Slice(x), TypeKind::Slice(y)) => self.identical(*x, *y),
            (
                TypeKind::Array { len: la, elem: ea },
                TypeKind::Array { len: lb, elem: eb },
            ) => la == lb && self.identical(*ea, *eb),
            (
                TypeKind::Map { key: ka, value: va },
                TypeKind::Map { key: kb, value: vb },
            ) => self.identical(*ka, *kb) && self.identical(*va, *vb),
            (TypeKind::Struct(x), TypeKind::Struct(y)) => {
                x.flavor == y.flavor
                    && x.fields.len() == y.fields.len()
                    && x
                        .fields
                        .iter()
                        .zip(&y.fields)
                        .all(|(fa, fb)| fa.name == fb.name && self.identical(fa.ty, fb.ty))
            }
            // Receivers do not take part in signature identity.
            (TypeKind::Func(x), TypeKind::Func(y)) => {
                x.variadic == y.variadic
                    && self.identical_lists(&x.params, &y.params)
                    && self.identical_lists(&x.results, &y.results)
            }
            _ => false,
        }
    }

    fn identical_lists(&self, a: &[TypeId], b: &[TypeId]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.identical(*x, *y))
    }

    fn alloc(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        id
    }
}
