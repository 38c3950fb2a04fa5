//! Struct and union layout registry
//!
//! Layouts are computed once, in definition order, when resolution starts.
//! Fields are placed sequentially at the next offset aligned to the field's
//! natural alignment; the struct's size is rounded up to its alignment.
//! Every union member sits at offset 0 and the union is as large as its
//! largest member, rounded the same way.

use super::errors::ResolveError;
use crate::parser::ast::{SourceLocation, StructDef, Type};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub ty: Type,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    pub name: String,
    pub fields: Vec<FieldLayout>,
    pub size: usize,
    pub align: usize,
    pub is_union: bool,
}

impl StructLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Registry of every struct/union layout in the program, keyed by tag
#[derive(Debug, Clone, Default)]
pub struct Layouts {
    structs: FxHashMap<String, StructLayout>,
}

/// Saturates; an object that large can never be allocated anyway
fn align_to(offset: usize, align: usize) -> usize {
    let align = align.max(1);
    offset.div_ceil(align).saturating_mul(align)
}

impl Layouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute and register the layout of `def`. A later definition of the
    /// same tag replaces the earlier one.
    pub fn define(&mut self, def: &StructDef) -> Result<(), ResolveError> {
        let mut fields: Vec<FieldLayout> = Vec::with_capacity(def.fields.len());
        let mut offset = 0;
        let mut size = 0;
        let mut align = 1;

        for field in &def.fields {
            if fields.iter().any(|f| f.name == field.name) {
                return Err(ResolveError::Redeclaration {
                    name: field.name.clone(),
                    location: field.location,
                });
            }
            let (field_size, field_align) = self
                .size_of(&field.ty)
                .zip(self.align_of(&field.ty))
                .ok_or_else(|| ResolveError::IncompleteType {
                    ty: field.ty.clone(),
                    location: field.location,
                })?;

            let field_offset = if def.is_union {
                0
            } else {
                align_to(offset, field_align)
            };
            fields.push(FieldLayout {
                name: field.name.clone(),
                ty: field.ty.clone(),
                offset: field_offset,
            });
            offset = field_offset.saturating_add(field_size);
            size = size.max(offset);
            align = align.max(field_align);
        }

        let layout = StructLayout {
            name: def.name.clone(),
            fields,
            size: align_to(size, align),
            align,
            is_union: def.is_union,
        };
        log::trace!(
            "layout of {} {}: {} bytes, align {}",
            if def.is_union { "union" } else { "struct" },
            def.name,
            layout.size,
            layout.align
        );
        self.structs.insert(def.name.clone(), layout);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&StructLayout> {
        self.structs.get(name)
    }

    /// `sizeof`; `None` for void, unsized arrays and undefined structs
    pub fn size_of(&self, ty: &Type) -> Option<usize> {
        match ty {
            Type::Void => None,
            Type::Float => Some(4),
            Type::Double | Type::Pointer(_) => Some(8),
            Type::Array(elem, Some(len)) => self.size_of(elem).map(|s| s.saturating_mul(*len)),
            Type::Array(_, None) => None,
            Type::Struct(name) => self.structs.get(name).map(|l| l.size),
            other => other.integer_width(),
        }
    }

    pub fn align_of(&self, ty: &Type) -> Option<usize> {
        match ty {
            Type::Array(elem, _) => self.align_of(elem),
            Type::Struct(name) => self.structs.get(name).map(|l| l.align),
            other => self.size_of(other),
        }
    }

    /// Size of the object a pointer of type `ty` steps over. `void *` steps by one byte.
    pub fn stride(&self, ty: &Type) -> usize {
        ty.pointee()
            .and_then(|target| self.size_of(target))
            .unwrap_or(1)
    }

    /// Look up `member` of struct type `ty`
    pub fn member(
        &self,
        ty: &Type,
        member: &str,
        location: SourceLocation,
    ) -> Result<&FieldLayout, ResolveError> {
        let layout = ty
            .struct_name()
            .and_then(|name| self.structs.get(name))
            .ok_or_else(|| ResolveError::IncompleteType {
                ty: ty.clone(),
                location,
            })?;
        layout
            .field(member)
            .ok_or_else(|| ResolveError::UnknownMember {
                ty: ty.clone(),
                member: member.to_string(),
                location,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Field;

    fn def(name: &str, is_union: bool, fields: &[(&str, Type)]) -> StructDef {
        StructDef {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(n, ty)| Field {
                    name: n.to_string(),
                    ty: ty.clone(),
                    location: SourceLocation::default(),
                })
                .collect(),
            is_union,
            location: SourceLocation::default(),
        }
    }

    #[test]
    fn test_natural_alignment_and_padding() {
        let mut layouts = Layouts::new();
        layouts
            .define(&def("s", false, &[("c", Type::Char), ("n", Type::Int), ("d", Type::Char)]))
            .unwrap();
        let s = layouts.get("s").unwrap();
        assert_eq!(s.field("n").unwrap().offset, 4);
        assert_eq!(s.field("d").unwrap().offset, 8);
        assert_eq!(s.size, 12);
        assert_eq!(s.align, 4);
    }

    #[test]
    fn test_oversized_types_saturate() {
        let mut layouts = Layouts::new();
        let huge = Type::Long.array_of(Some(usize::MAX / 4));
        assert_eq!(layouts.size_of(&huge), Some(usize::MAX));
        layouts
            .define(&def("wide", false, &[("tag", Type::Char), ("body", huge)]))
            .unwrap();
        assert_eq!(layouts.get("wide").unwrap().size, usize::MAX);
    }

    #[test]
    fn test_nested_struct_and_arrays() {
        let mut layouts = Layouts::new();
        layouts
            .define(&def("point", false, &[("x", Type::Int), ("y", Type::Int)]))
            .unwrap();
        layouts
            .define(&def(
                "rect",
                false,
                &[
                    ("tag", Type::Char.array_of(Some(3))),
                    ("pt1", Type::Struct("point".into())),
                    ("next", Type::Struct("rect".into()).pointer_to()),
                ],
            ))
            .unwrap();
        let rect = layouts.get("rect").unwrap();
        assert_eq!(rect.field("pt1").unwrap().offset, 4);
        assert_eq!(rect.field("next").unwrap().offset, 16);
        assert_eq!(rect.size, 24);
        assert_eq!(layouts.size_of(&Type::Struct("point".into()).array_of(Some(3))), Some(24));
    }

    #[test]
    fn test_union() {
        let mut layouts = Layouts::new();
        layouts
            .define(&def("u", true, &[("c", Type::Char), ("d", Type::Double), ("i", Type::Int)]))
            .unwrap();
        let u = layouts.get("u").unwrap();
        assert!(u.fields.iter().all(|f| f.offset == 0));
        assert_eq!(u.size, 8);
    }

    #[test]
    fn test_incomplete_member() {
        let mut layouts = Layouts::new();
        let err = layouts
            .define(&def("bad", false, &[("inner", Type::Struct("missing".into()))]))
            .unwrap_err();
        assert!(matches!(err, ResolveError::IncompleteType { .. }));
        assert_eq!(layouts.stride(&Type::void_pointer()), 1);
        assert_eq!(layouts.stride(&Type::Long.pointer_to()), 8);
    }
}
