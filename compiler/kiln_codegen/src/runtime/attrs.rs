//! Attribute sets of runtime routines.
//!
//! Attributes are promises about the runtime library's implementation that
//! the optimizer relies on. A set is written once in the catalogue, applied
//! to the runtime module's declaration, and copied verbatim onto every
//! target-module declaration of the same routine.

use bitflags::bitflags;
use inkwell::attributes::{Attribute, AttributeLoc};
use inkwell::context::Context;
use inkwell::values::FunctionValue;
use smallvec::SmallVec;

/// `memory` attribute payload: `Ref` in each of the three location slots
/// (argument memory, inaccessible memory, everything else).
const MEMORY_READ: u64 = 0b01_01_01;
/// `memory(none)`.
const MEMORY_NONE: u64 = 0;

bitflags! {
    /// Whole-routine and return-value attributes.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RoutineFlags: u8 {
        const NOUNWIND = 1 << 0;
        /// Reads memory but writes none (`memory(read)`).
        const READONLY = 1 << 1;
        /// Touches no memory at all (`memory(none)`).
        const READNONE = 1 << 2;
        /// The returned pointer aliases nothing the caller can see.
        const NOALIAS_RETURN = 1 << 3;
    }
}

/// Attributes of one runtime routine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutineAttrs {
    flags: RoutineFlags,
    /// Pointer parameters (0-based) the routine does not capture.
    nocapture: SmallVec<[u32; 2]>,
}

impl RoutineAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, flags: RoutineFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn nocapture(mut self, params: &[u32]) -> Self {
        for &param in params {
            if !self.nocapture.contains(&param) {
                self.nocapture.push(param);
            }
        }
        self.nocapture.sort_unstable();
        self
    }

    pub fn flags(&self) -> RoutineFlags {
        self.flags
    }

    pub fn nocapture_params(&self) -> &[u32] {
        &self.nocapture
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.nocapture.is_empty()
    }

    /// Attach this set to `func`.
    pub(crate) fn apply(&self, context: &Context, func: FunctionValue<'_>) {
        let attr = |name: &str, value: u64| {
            context.create_enum_attribute(Attribute::get_named_enum_kind_id(name), value)
        };

        if self.flags.contains(RoutineFlags::NOUNWIND) {
            func.add_attribute(AttributeLoc::Function, attr("nounwind", 0));
        }
        if self.flags.contains(RoutineFlags::READNONE) {
            func.add_attribute(AttributeLoc::Function, attr("memory", MEMORY_NONE));
        } else if self.flags.contains(RoutineFlags::READONLY) {
            func.add_attribute(AttributeLoc::Function, attr("memory", MEMORY_READ));
        }
        if self.flags.contains(RoutineFlags::NOALIAS_RETURN) {
            func.add_attribute(AttributeLoc::Return, attr("noalias", 0));
        }
        for &param in &self.nocapture {
            func.add_attribute(AttributeLoc::Param(param), attr("nocapture", 0));
        }
    }

    /// Read back the set attached to `func`. Attributes outside this
    /// vocabulary are ignored.
    pub fn of(func: FunctionValue<'_>) -> Self {
        let get = |loc: AttributeLoc, name: &str| {
            func.get_enum_attribute(loc, Attribute::get_named_enum_kind_id(name))
        };

        let mut flags = RoutineFlags::empty();
        if get(AttributeLoc::Function, "nounwind").is_some() {
            flags |= RoutineFlags::NOUNWIND;
        }
        match get(AttributeLoc::Function, "memory").map(|a| a.get_enum_value()) {
            Some(MEMORY_NONE) => flags |= RoutineFlags::READNONE,
            Some(MEMORY_READ) => flags |= RoutineFlags::READONLY,
            _ => {}
        }
        if get(AttributeLoc::Return, "noalias").is_some() {
            flags |= RoutineFlags::NOALIAS_RETURN;
        }
        let nocapture = (0..func.count_params())
            .filter(|&i| get(AttributeLoc::Param(i), "nocapture").is_some())
            .collect();

        RoutineAttrs { flags, nocapture }
    }
}

/// Copy every attribute of `from` onto `to`, location by location.
pub(crate) fn copy_attributes<'ctx>(from: FunctionValue<'ctx>, to: FunctionValue<'ctx>) {
    let locations = [AttributeLoc::Function, AttributeLoc::Return]
        .into_iter()
        .chain((0..from.count_params()).map(AttributeLoc::Param));
    for loc in locations {
        for attr in from.attributes(loc) {
            to.add_attribute(loc, attr);
        }
    }
}
