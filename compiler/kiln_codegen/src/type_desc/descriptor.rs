//! Descriptor entities and their handles.

use std::fmt;

use kiln_types::TypeId;

use super::generate::{DescriptorKind, ReflectionClass};

/// Index of a descriptor in [`TypeDescriptors`](super::TypeDescriptors).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(u32);

impl DescriptorId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "descriptor count is bounded by the type count"
        )]
        let raw = index as u32;
        DescriptorId(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A compilation unit (one source module compiled in this session).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

impl UnitId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        UnitId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// Where semantic analysis is when it asks for a descriptor.
///
/// `imported_from` is the root unit whose import graph reached `module`;
/// descriptors created here become members of that root unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SemanticScope {
    pub module: UnitId,
    pub imported_from: UnitId,
}

impl SemanticScope {
    /// Scope of a unit compiled directly.
    pub fn root(unit: UnitId) -> Self {
        SemanticScope {
            module: unit,
            imported_from: unit,
        }
    }

    /// Scope of `module`, reached through the imports of `root`.
    pub fn imported(module: UnitId, root: UnitId) -> Self {
        SemanticScope {
            module,
            imported_from: root,
        }
    }
}

/// Shared placeholder descriptors standing in for whole families of types
/// at call sites that only need identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InternalSlot {
    Pointer,
    Function,
    Delegate,
    Class,
    ArrayOfClass,
}

impl InternalSlot {
    pub const COUNT: usize = 5;

    pub const ALL: [InternalSlot; Self::COUNT] = [
        InternalSlot::Pointer,
        InternalSlot::Function,
        InternalSlot::Delegate,
        InternalSlot::Class,
        InternalSlot::ArrayOfClass,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Encoding used in the placeholder's symbol name.
    pub fn deco(self) -> &'static str {
        match self {
            InternalSlot::Pointer => "P",
            InternalSlot::Function => "F",
            InternalSlot::Delegate => "D",
            InternalSlot::Class => "C",
            InternalSlot::ArrayOfClass => "AC",
        }
    }

    pub(crate) fn reflection_class(self) -> ReflectionClass {
        match self {
            InternalSlot::Pointer => ReflectionClass::Pointer,
            InternalSlot::Function => ReflectionClass::Function,
            InternalSlot::Delegate => ReflectionClass::Delegate,
            InternalSlot::Class => ReflectionClass::Class,
            InternalSlot::ArrayOfClass => ReflectionClass::Array,
        }
    }
}

/// Lifecycle of a descriptor.
///
/// A descriptor is only stored once its state is decided, so there is no
/// unassigned state. `Builtin` and `Emitted` are terminal; `Pending` moves
/// to `Emitted` exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorState {
    /// Shipped by the runtime library; only ever referenced.
    Builtin,
    /// Owed by `owner`, which emits it during its code generation pass.
    Pending { owner: UnitId },
    /// Emitted into the module named `module`.
    Emitted { module: Box<str> },
}

impl DescriptorState {
    pub fn is_builtin(&self) -> bool {
        matches!(self, DescriptorState::Builtin)
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self, DescriptorState::Emitted { .. })
    }
}

/// The compiler-side handle of one runtime type descriptor instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub(crate) ty: Option<TypeId>,
    pub(crate) kind: DescriptorKind,
    pub(crate) symbol: String,
    pub(crate) state: DescriptorState,
}

impl Descriptor {
    /// The canonical type described; `None` for internal placeholders.
    pub fn ty(&self) -> Option<TypeId> {
        self.ty
    }

    pub fn kind(&self) -> &DescriptorKind {
        &self.kind
    }

    /// Link-time name of the descriptor instance.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> &DescriptorState {
        &self.state
    }

    pub fn reflection_class(&self) -> ReflectionClass {
        self.kind.reflection_class()
    }
}

/// What a descriptor request evaluates to: the descriptor and the
/// reflection class the reference is typed as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorRef {
    pub id: DescriptorId,
    pub class: ReflectionClass,
}
