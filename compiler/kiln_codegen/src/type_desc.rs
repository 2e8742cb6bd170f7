//! Type descriptor canonicalization.
//!
//! Every canonical type gets at most one [`Descriptor`], created on first
//! request and stored in a per-type slot. Requests through
//! [`internal_descriptor_of`](TypeDescriptors::internal_descriptor_of) first
//! collapse families of types that only need identity (pointers, functions,
//! delegates, classes, arrays of classes) onto one shared placeholder each.
//!
//! Descriptors the runtime library ships are `Builtin` and only ever
//! referenced by name. Any other descriptor is owed by a compilation unit:
//! during semantic analysis it is queued on the root unit whose imports
//! reached the type first, during code generation it is emitted on the spot.

mod descriptor;
mod generate;

use inkwell::module::Module;
use inkwell::values::GlobalValue;
use kiln_types::{descriptor_symbol, TypeData, TypeId, TypePool};
use rustc_hash::FxHashMap;

use crate::error::BackendError;
use crate::runtime::{module_name, RuntimeRegistry};

pub use descriptor::{
    Descriptor, DescriptorId, DescriptorRef, DescriptorState, InternalSlot, SemanticScope, UnitId,
};
pub use generate::{DescriptorKind, ReflectionClass};

/// The pass a descriptor request comes from.
pub enum DescriptorContext<'a, 'ctx> {
    /// Semantic analysis: new descriptors are queued on the owning unit.
    Semantic(SemanticScope),
    /// Code generation into `module`: new descriptors are emitted there.
    Codegen {
        registry: &'a mut RuntimeRegistry<'ctx>,
        module: &'a Module<'ctx>,
    },
}

/// Descriptor table for one compilation session.
#[derive(Debug, Default)]
pub struct TypeDescriptors {
    descriptors: Vec<Descriptor>,
    /// Keyed by merged type.
    by_type: FxHashMap<TypeId, DescriptorId>,
    internal: [Option<DescriptorId>; InternalSlot::COUNT],
    pending: FxHashMap<UnitId, Vec<DescriptorId>>,
}

impl TypeDescriptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    #[inline]
    pub fn get(&self, id: DescriptorId) -> &Descriptor {
        &self.descriptors[id.index()]
    }

    /// The descriptor of a merged type, if one was created.
    pub fn descriptor_of(&self, ty: TypeId) -> Option<DescriptorId> {
        self.by_type.get(&ty).copied()
    }

    /// The shared placeholder for `slot`, if one was created.
    pub fn internal_slot(&self, slot: InternalSlot) -> Option<DescriptorId> {
        self.internal[slot.index()]
    }

    /// Descriptors still owed by `unit`, in creation order.
    pub fn pending(&self, unit: UnitId) -> &[DescriptorId] {
        self.pending.get(&unit).map_or(&[][..], Vec::as_slice)
    }

    /// Descriptor for value-category uses, where only identity matters.
    ///
    /// The type is reduced to its base, static arrays become dynamic arrays,
    /// and pointers, functions, delegates, non-interface classes and arrays
    /// of classes collapse onto a shared placeholder. Interfaces and every
    /// other type get their exact descriptor.
    pub fn internal_descriptor_of(
        &mut self,
        pool: &mut TypePool,
        ty: TypeId,
        cx: DescriptorContext<'_, '_>,
    ) -> Result<DescriptorRef, BackendError> {
        let mut ty = pool.to_base(ty);
        if let TypeData::StaticArray { elem, .. } = *pool.data(ty) {
            ty = pool.dyn_array(elem);
        }

        let slot = match pool.data(ty) {
            TypeData::Class(_) if pool.is_interface(ty) => None,
            TypeData::Class(_) => Some(InternalSlot::Class),
            TypeData::DynArray(elem) if pool.is_class(*elem) => Some(InternalSlot::ArrayOfClass),
            TypeData::Pointer(_) => Some(InternalSlot::Pointer),
            TypeData::Function(_) => Some(InternalSlot::Function),
            TypeData::Delegate(_) => Some(InternalSlot::Delegate),
            _ => None,
        };

        match slot {
            Some(slot) => Ok(self.placeholder(slot)),
            None => self.exact_descriptor_of(pool, ty, cx),
        }
    }

    /// The full descriptor of `ty`, created on first request.
    ///
    /// `ty` need not be merged. A new descriptor shipped by the runtime is
    /// `Builtin`. Any other new descriptor is queued on the scope's root
    /// unit during semantic analysis, or emitted into the target module
    /// during code generation. On error nothing is recorded.
    pub fn exact_descriptor_of(
        &mut self,
        pool: &mut TypePool,
        ty: TypeId,
        cx: DescriptorContext<'_, '_>,
    ) -> Result<DescriptorRef, BackendError> {
        let ty = pool.merge(ty);
        if let Some(id) = self.descriptor_of(ty) {
            return Ok(self.reference(id));
        }

        let kind = generate::generate(pool, ty)?;
        let symbol = descriptor_symbol(&pool.deco(ty));
        let state = if pool.has_builtin_descriptor(ty) {
            DescriptorState::Builtin
        } else {
            match cx {
                DescriptorContext::Semantic(scope) => DescriptorState::Pending {
                    owner: scope.imported_from,
                },
                DescriptorContext::Codegen { registry, module } => {
                    registry.fetch_descriptor_global(module, &symbol)?;
                    DescriptorState::Emitted {
                        module: module_name(module).into(),
                    }
                }
            }
        };

        tracing::debug!(
            ty = %pool.display(ty),
            symbol = %symbol,
            state = ?state,
            "created type descriptor"
        );
        let owner = match state {
            DescriptorState::Pending { owner } => Some(owner),
            _ => None,
        };
        let id = self.push(Descriptor {
            ty: Some(ty),
            kind,
            symbol,
            state,
        });
        self.by_type.insert(ty, id);
        if let Some(owner) = owner {
            self.pending.entry(owner).or_default().push(id);
        }
        Ok(self.reference(id))
    }

    /// Emit a pending descriptor into `module`.
    ///
    /// Returns `true` on the transition to `Emitted`. Emitted and builtin
    /// descriptors are left alone and yield `false`.
    pub fn emit<'ctx>(
        &mut self,
        id: DescriptorId,
        registry: &mut RuntimeRegistry<'ctx>,
        module: &Module<'ctx>,
    ) -> Result<bool, BackendError> {
        let desc = &self.descriptors[id.index()];
        if !matches!(desc.state, DescriptorState::Pending { .. }) {
            return Ok(false);
        }
        registry.fetch_descriptor_global(module, &desc.symbol)?;
        let module = module_name(module);
        tracing::debug!(symbol = %desc.symbol, %module, "emitted type descriptor");
        self.descriptors[id.index()].state = DescriptorState::Emitted {
            module: module.into(),
        };
        Ok(true)
    }

    /// Emit everything `unit` owes into `module`. Returns how many
    /// descriptors changed state.
    pub fn emit_pending<'ctx>(
        &mut self,
        unit: UnitId,
        registry: &mut RuntimeRegistry<'ctx>,
        module: &Module<'ctx>,
    ) -> Result<usize, BackendError> {
        let Some(queue) = self.pending.remove(&unit) else {
            return Ok(0);
        };
        let mut emitted = 0;
        for (i, &id) in queue.iter().enumerate() {
            match self.emit(id, registry, module) {
                Ok(changed) => emitted += usize::from(changed),
                Err(err) => {
                    self.pending.insert(unit, queue[i..].to_vec());
                    return Err(err);
                }
            }
        }
        tracing::debug!(%unit, emitted, "emitted pending type descriptors");
        Ok(emitted)
    }

    /// Declare the descriptor instance in `module` for use by generated
    /// code. Builtins come from the runtime; a pending descriptor is
    /// emitted first.
    pub fn descriptor_global<'ctx>(
        &mut self,
        id: DescriptorId,
        registry: &mut RuntimeRegistry<'ctx>,
        module: &Module<'ctx>,
    ) -> Result<GlobalValue<'ctx>, BackendError> {
        let symbol = self.descriptors[id.index()].symbol.clone();
        if self.descriptors[id.index()].state.is_builtin() {
            return registry.fetch_global(module, &symbol);
        }
        self.emit(id, registry, module)?;
        registry.fetch_descriptor_global(module, &symbol)
    }

    fn placeholder(&mut self, slot: InternalSlot) -> DescriptorRef {
        let id = match self.internal[slot.index()] {
            Some(id) => id,
            None => {
                let symbol = descriptor_symbol(slot.deco());
                tracing::debug!(?slot, symbol = %symbol, "created internal type descriptor");
                let id = self.push(Descriptor {
                    ty: None,
                    kind: DescriptorKind::Internal(slot),
                    symbol,
                    state: DescriptorState::Builtin,
                });
                self.internal[slot.index()] = Some(id);
                id
            }
        };
        self.reference(id)
    }

    fn push(&mut self, descriptor: Descriptor) -> DescriptorId {
        let id = DescriptorId::from_index(self.descriptors.len());
        self.descriptors.push(descriptor);
        id
    }

    fn reference(&self, id: DescriptorId) -> DescriptorRef {
        DescriptorRef {
            id,
            class: self.get(id).reflection_class(),
        }
    }
}

#[cfg(test)]
mod tests;
