use crate::{
    constant::ConstValue,
    source::{Pos, Spanned},
};

/// One parsed `.pkg` manifest.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    pub package: Option<PackageClause>,
    pub imports: Vec<ImportClause>,
    pub decls: Vec<Decl>,
}

#[derive(Clone, Debug)]
pub struct PackageClause {
    pub name: Spanned<String>,
    pub path: Spanned<String>,
}

#[derive(Clone, Debug)]
pub struct ImportClause {
    pub alias: Option<Spanned<String>>,
    pub path: Spanned<String>,
}

/// `Name` or `alias.Name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualName {
    pub qualifier: Option<String>,
    pub name: String,
}

impl QualName {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Decl {
    pub name: Spanned<QualName>,
    pub kind: DeclKind,
}

impl Decl {
    pub fn pos(&self) -> Pos {
        self.name.pos()
    }
}

#[derive(Clone, Debug)]
pub enum DeclKind {
    Type(TypeExpr),
    Alias(TypeExpr),
    Func(SigExpr),
    Method { recv: TypeExpr, sig: SigExpr },
    Var(TypeExpr),
    Const { ty: TypeExpr, value: ConstValue },
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    Name(QualName),
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array(u64, Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Struct(Vec<FieldExpr>),
    Func(SigExpr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldExpr {
    pub name: String,
    pub ty: TypeExpr,
}

/// Parameter and result lists. A variadic final parameter is stored as its
/// slice type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SigExpr {
    pub params: Vec<TypeExpr>,
    pub results: Vec<TypeExpr>,
    pub variadic: bool,
}
