//! Per-kind descriptor generation.
//!
//! One variant per type kind the runtime library has a descriptor class
//! for. Generation is a single dispatch on the type's payload; a kind with
//! no variant is a compiler bug.

use std::fmt;

use kiln_types::{BasicKind, DeclId, FnSig, NominalKind, TypeData, TypeId, TypePool};

use super::descriptor::InternalSlot;
use crate::error::BackendError;

/// The shape-specific content of a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorKind {
    Basic(BasicKind),
    Typedef { decl: DeclId, base: TypeId },
    Pointer { next: TypeId },
    DynArray { elem: TypeId },
    StaticArray { elem: TypeId, len: u64 },
    AssocArray { key: TypeId, value: TypeId },
    Struct(DeclId),
    Class(DeclId),
    Interface(DeclId),
    Enum { decl: DeclId, base: TypeId },
    Function(FnSig),
    Delegate { func: TypeId },
    Tuple(Box<[TypeId]>),
    /// A shared placeholder.
    Internal(InternalSlot),
}

impl DescriptorKind {
    /// The runtime class of the descriptor instance.
    pub fn reflection_class(&self) -> ReflectionClass {
        match self {
            DescriptorKind::Basic(_) => ReflectionClass::TypeInfo,
            DescriptorKind::Typedef { .. } => ReflectionClass::Typedef,
            DescriptorKind::Pointer { .. } => ReflectionClass::Pointer,
            DescriptorKind::DynArray { .. } => ReflectionClass::Array,
            DescriptorKind::StaticArray { .. } => ReflectionClass::StaticArray,
            DescriptorKind::AssocArray { .. } => ReflectionClass::AssociativeArray,
            DescriptorKind::Struct(_) => ReflectionClass::Struct,
            DescriptorKind::Class(_) => ReflectionClass::Class,
            DescriptorKind::Interface(_) => ReflectionClass::Interface,
            DescriptorKind::Enum { .. } => ReflectionClass::Enum,
            DescriptorKind::Function(_) => ReflectionClass::Function,
            DescriptorKind::Delegate { .. } => ReflectionClass::Delegate,
            DescriptorKind::Tuple(_) => ReflectionClass::Tuple,
            DescriptorKind::Internal(slot) => slot.reflection_class(),
        }
    }
}

/// Runtime descriptor classes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReflectionClass {
    TypeInfo,
    Typedef,
    Pointer,
    Array,
    StaticArray,
    AssociativeArray,
    Struct,
    Class,
    Interface,
    Enum,
    Function,
    Delegate,
    Tuple,
}

impl ReflectionClass {
    pub fn name(self) -> &'static str {
        match self {
            ReflectionClass::TypeInfo => "TypeInfo",
            ReflectionClass::Typedef => "TypeInfo_Typedef",
            ReflectionClass::Pointer => "TypeInfo_Pointer",
            ReflectionClass::Array => "TypeInfo_Array",
            ReflectionClass::StaticArray => "TypeInfo_StaticArray",
            ReflectionClass::AssociativeArray => "TypeInfo_AssociativeArray",
            ReflectionClass::Struct => "TypeInfo_Struct",
            ReflectionClass::Class => "TypeInfo_Class",
            ReflectionClass::Interface => "TypeInfo_Interface",
            ReflectionClass::Enum => "TypeInfo_Enum",
            ReflectionClass::Function => "TypeInfo_Function",
            ReflectionClass::Delegate => "TypeInfo_Delegate",
            ReflectionClass::Tuple => "TypeInfo_Tuple",
        }
    }
}

impl fmt::Display for ReflectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generate the descriptor content for the merged type `ty`.
pub(crate) fn generate(pool: &TypePool, ty: TypeId) -> Result<DescriptorKind, BackendError> {
    let kind = match pool.data(ty) {
        TypeData::Basic(kind) => DescriptorKind::Basic(*kind),
        TypeData::Pointer(next) => DescriptorKind::Pointer { next: *next },
        TypeData::DynArray(elem) => DescriptorKind::DynArray { elem: *elem },
        TypeData::StaticArray { elem, len } => DescriptorKind::StaticArray {
            elem: *elem,
            len: *len,
        },
        TypeData::AssocArray { key, value } => DescriptorKind::AssocArray {
            key: *key,
            value: *value,
        },
        TypeData::Struct(decl) => DescriptorKind::Struct(*decl),
        TypeData::Class(decl) => class_or_interface(pool, *decl),
        TypeData::Enum(decl) => DescriptorKind::Enum {
            decl: *decl,
            base: nominal_base(pool, *decl, ty),
        },
        TypeData::Typedef(decl) => DescriptorKind::Typedef {
            decl: *decl,
            base: nominal_base(pool, *decl, ty),
        },
        TypeData::Function(sig) => DescriptorKind::Function(sig.clone()),
        TypeData::Delegate(func) => DescriptorKind::Delegate { func: *func },
        TypeData::Tuple(elems) => DescriptorKind::Tuple(elems.clone()),
        data @ TypeData::Error => {
            return Err(BackendError::DescriptorKindUnsupported {
                ty: pool.display(ty).to_string(),
                kind: data.kind_name(),
            })
        }
    };
    Ok(kind)
}

fn class_or_interface(pool: &TypePool, decl: DeclId) -> DescriptorKind {
    match pool.decl(decl).kind {
        NominalKind::Interface => DescriptorKind::Interface(decl),
        _ => DescriptorKind::Class(decl),
    }
}

/// Declared base of an enum or typedef. Falls back to `ty` itself for a
/// declaration without one, which the pool never produces.
fn nominal_base(pool: &TypePool, decl: DeclId, ty: TypeId) -> TypeId {
    match pool.decl(decl).kind {
        NominalKind::Enum { base } | NominalKind::Typedef { base } => base,
        NominalKind::Struct | NominalKind::Class | NominalKind::Interface => ty,
    }
}
