//! Byte sizes and field offsets for the header emitter's target.

use rustc_hash::FxHashSet;

use crate::{
    error::{Error, Result},
    fmt::format_type,
    types::{BasicKind, StructType, TypeId, TypeKind},
    unit::Unit,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub size: u64,
    pub align: u64,
}

impl Layout {
    fn scalar(size: u64) -> Self {
        Self { size, align: size }
    }
}

impl Unit {
    pub fn size_of(&self, ty: TypeId) -> Result<u64> {
        Ok(self.layout_of(ty)?.size)
    }

    pub fn layout_of(&self, ty: TypeId) -> Result<Layout> {
        self.layout(ty, &mut FxHashSet::default())
    }

    /// Offsets of the fields of the plain struct `ty` (or the struct it
    /// names), in declaration order.
    pub fn field_offsets(&self, ty: TypeId) -> Result<Vec<(String, u64)>> {
        let Some(st) = self.types.plain_struct(ty) else {
            return Ok(Vec::new());
        };
        let mut visiting = FxHashSet::default();
        if self.types.named(ty).is_some() {
            visiting.insert(ty);
        }
        let (_, offsets) = self.struct_layout(ty, st, &mut visiting)?;
        Ok(st
            .fields
            .iter()
            .zip(offsets)
            .map(|(field, offset)| (field.name.clone(), offset))
            .collect())
    }

    fn layout(&self, ty: TypeId, visiting: &mut FxHashSet<TypeId>) -> Result<Layout> {
        let word = self.options.ptr_size;
        let layout = match self.types.kind(ty) {
            TypeKind::Basic(kind) => self.basic_layout(*kind),
            TypeKind::Pointer(_) | TypeKind::Map { .. } | TypeKind::Func(_) => {
                Layout::scalar(word)
            }
            TypeKind::Slice(_) => Layout {
                size: 3 * word,
                align: word,
            },
            TypeKind::Array { len, elem } => {
                let elem = self.layout(*elem, visiting)?;
                Layout {
                    size: elem.size.checked_mul(*len).ok_or_else(|| self.too_large(ty))?,
                    align: elem.align,
                }
            }
            TypeKind::Struct(st) => self.struct_layout(ty, st, visiting)?.0,
            TypeKind::Named(named) => {
                let name = || self.symtab.qualified_name(named.sym);
                let Some(underlying) = named.underlying else {
                    return Err(Error::IncompleteType(name()));
                };
                if !visiting.insert(ty) {
                    return Err(Error::InvalidRecursiveType(name()));
                }
                let layout = self.layout(underlying, visiting)?;
                visiting.remove(&ty);
                layout
            }
        };
        Ok(layout)
    }

    fn struct_layout(
        &self,
        ty: TypeId,
        st: &StructType,
        visiting: &mut FxHashSet<TypeId>,
    ) -> Result<(Layout, Vec<u64>)> {
        let fits = |offset: Option<u64>| offset.ok_or_else(|| self.too_large(ty));
        let mut offset: u64 = 0;
        let mut align = 1;
        let mut offsets = Vec::with_capacity(st.fields.len());
        let mut last_size = None;

        for field in &st.fields {
            let field = self.layout(field.ty, visiting)?;
            offset = fits(round_up(offset, field.align))?;
            offsets.push(offset);
            offset = fits(offset.checked_add(field.size))?;
            align = align.max(field.align);
            last_size = Some(field.size);
        }

        // A pointer to a trailing zero-size field must not point past the
        // end of the struct.
        if last_size == Some(0) && offset > 0 {
            offset = fits(offset.checked_add(1))?;
        }

        let layout = Layout {
            size: fits(round_up(offset, align))?,
            align,
        };
        Ok((layout, offsets))
    }

    fn too_large(&self, ty: TypeId) -> Error {
        Error::TypeTooLarge(format_type(self, ty))
    }

    fn basic_layout(&self, kind: BasicKind) -> Layout {
        let word = self.options.ptr_size;
        match kind {
            BasicKind::Bool | BasicKind::Int8 | BasicKind::Uint8 => Layout::scalar(1),
            BasicKind::Int16 | BasicKind::Uint16 => Layout::scalar(2),
            BasicKind::Int32 | BasicKind::Uint32 | BasicKind::Float32 => Layout::scalar(4),
            BasicKind::Int64 | BasicKind::Uint64 | BasicKind::Float64 => Layout {
                size: 8,
                align: 8.min(word),
            },
            BasicKind::Complex64 => Layout { size: 8, align: 4 },
            BasicKind::Complex128 => Layout {
                size: 16,
                align: 8.min(word),
            },
            BasicKind::Int | BasicKind::Uint | BasicKind::Uintptr | BasicKind::UnsafePointer => {
                Layout::scalar(word)
            }
            BasicKind::String => Layout {
                size: 2 * word,
                align: word,
            },
        }
    }
}

fn round_up(offset: u64, align: u64) -> Option<u64> {
    if align <= 1 {
        Some(offset)
    } else {
        offset.checked_next_multiple_of(align)
    }
}
