//! The runtime module: one declaration per support routine the runtime
//! library implements, plus the descriptor instances it ships.
//!
//! Attribute sets are part of the ABI: each one here must match what the
//! library actually guarantees.

use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum};
use kiln_types::{descriptor_symbol, BasicKind};

use super::abi::{AbiTypes, RuntimeLayouts};
use super::attrs::{RoutineAttrs, RoutineFlags};
use super::lowering::{apply_routine, ArrayInitKind, CharWidth, RuntimeCall, Transcode};
use crate::target::TargetLayout;
use crate::type_desc::InternalSlot;

/// Name of the runtime module.
pub const RUNTIME_MODULE_NAME: &str = "kiln internal runtime";

/// Declaration sink for the catalogue.
struct Catalogue<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
}

impl<'ctx> Catalogue<'ctx> {
    fn declare(
        &self,
        name: &str,
        params: &[BasicTypeEnum<'ctx>],
        ret: Option<BasicTypeEnum<'ctx>>,
    ) {
        self.declare_with(name, params, ret, &RoutineAttrs::new());
    }

    fn declare_with(
        &self,
        name: &str,
        params: &[BasicTypeEnum<'ctx>],
        ret: Option<BasicTypeEnum<'ctx>>,
        attrs: &RoutineAttrs,
    ) {
        debug_assert!(
            self.module.get_function(name).is_none(),
            "runtime routine `{name}` declared twice"
        );
        let params: Vec<BasicMetadataTypeEnum<'ctx>> =
            params.iter().map(|&p| p.into()).collect();
        let fn_type = match ret {
            Some(ret) => ret.fn_type(&params, false),
            None => self.context.void_type().fn_type(&params, false),
        };
        let func = self.module.add_function(name, fn_type, Some(Linkage::External));
        attrs.apply(self.context, func);
    }

    fn declare_descriptor(&self, deco: &str, abi: &AbiTypes<'ctx>) {
        let global = self
            .module
            .add_global(abi.type_info_body, None, &descriptor_symbol(deco));
        global.set_constant(true);
        global.set_linkage(Linkage::External);
    }
}

fn nocapture(params: &[u32]) -> RoutineAttrs {
    RoutineAttrs::new().nocapture(params)
}

/// Fresh allocation: the returned pointer aliases nothing.
fn noalias() -> RoutineAttrs {
    RoutineAttrs::new().with(RoutineFlags::NOALIAS_RETURN)
}

fn readonly() -> RoutineAttrs {
    RoutineAttrs::new().with(RoutineFlags::READONLY)
}

fn readonly_nounwind() -> RoutineAttrs {
    RoutineAttrs::new().with(RoutineFlags::READONLY | RoutineFlags::NOUNWIND)
}

/// Build the runtime module for `target` in `context`.
pub(crate) fn build_runtime_module<'ctx>(
    context: &'ctx Context,
    target: &TargetLayout,
    layouts: &dyn RuntimeLayouts,
) -> Module<'ctx> {
    let abi = AbiTypes::new(context, target, layouts);
    let cat = Catalogue {
        context,
        module: context.create_module(RUNTIME_MODULE_NAME),
    };
    cat.module.set_triple(&target.triple());

    declare_diagnostics(&cat, &abi);
    declare_allocation(&cat, &abi);
    declare_array_init(&cat, &abi);
    declare_string_apply(&cat, &abi);
    declare_casts(&cat, &abi);
    declare_array_algorithms(&cat, &abi);
    declare_assoc_arrays(&cat, &abi);
    declare_control(&cat, &abi);
    declare_builtin_descriptors(&cat, &abi);

    cat.module
}

fn declare_diagnostics<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    // (file, line)
    for name in ["_d_assert", "_d_array_bounds", "_d_switch_error"] {
        cat.declare(name, &[abi.array, abi.int], None);
    }
    // (msg, file, line)
    cat.declare("_d_assert_msg", &[abi.array, abi.array, abi.int], Some(abi.ptr));
}

fn declare_allocation<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    cat.declare_with("_d_allocmemoryT", &[abi.ptr], Some(abi.ptr), &noalias());

    // (ti, length)
    for name in ["_d_newarrayT", "_d_newarrayiT", "_d_newarrayvT"] {
        cat.declare_with(name, &[abi.ptr, abi.size], Some(abi.ptr), &noalias());
    }

    // (ti, ndims, dims)
    for name in ["_d_newarraymT", "_d_newarraymiT", "_d_newarraymvT"] {
        cat.declare_with(
            name,
            &[abi.ptr, abi.size, abi.ptr],
            Some(abi.ptr),
            &noalias().nocapture(&[2]),
        );
    }

    // (ti, newlength, length, data): may reallocate, so the result can
    // alias the input
    for name in ["_d_arraysetlengthT", "_d_arraysetlengthiT"] {
        cat.declare(name, &[abi.ptr, abi.size, abi.size, abi.ptr], Some(abi.ptr));
    }

    // (classinfo)
    cat.declare_with("_d_allocclass", &[abi.ptr], Some(abi.ptr), &noalias());

    // -- Deallocation --
    cat.declare("_d_delarray", &[abi.size, abi.ptr], None);
    for name in ["_d_delmemory", "_d_delinterface", "_d_callfinalizer", "_d_delclass"] {
        cat.declare(name, &[abi.ptr], None);
    }
}

fn declare_array_init<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    // (dst, length, value)
    for kind in ArrayInitKind::ALL {
        cat.declare_with(
            &kind.routine(),
            &[abi.ptr, abi.size, kind.element_type(abi)],
            None,
            &nocapture(&[0]),
        );
    }

    // (dst, dstlen, src, srclen)
    for name in ["_d_array_init_mem", "_d_array_slice_copy"] {
        cat.declare_with(
            name,
            &[abi.ptr, abi.size, abi.ptr, abi.size],
            None,
            &nocapture(&[0, 2]),
        );
    }

    cat.declare_with(
        "_d_array_cast_len",
        &[abi.size, abi.size, abi.size],
        Some(abi.size),
        &RoutineAttrs::new().with(RoutineFlags::READNONE),
    );
}

/// `foreach` over a string with transcoding: every ordered pair of distinct
/// encodings, both directions, with and without an index.
fn declare_string_apply<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    for reverse in [false, true] {
        for with_index in [false, true] {
            for transcode in Transcode::all() {
                let name = apply_routine(transcode, reverse, with_index);
                cat.declare(&name, &[abi.array, abi.delegate], Some(abi.int));
            }
        }
    }
}

fn declare_casts<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    // (p)
    cat.declare_with("_d_toObject", &[abi.ptr], Some(abi.ptr), &readonly_nounwind());
    // (p, classinfo), (object, classinfo)
    for name in ["_d_interface_cast", "_d_dynamic_cast"] {
        cat.declare_with(name, &[abi.ptr, abi.ptr], Some(abi.ptr), &readonly_nounwind());
    }
}

fn declare_array_algorithms<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    for name in ["_adReverseChar", "_adSortChar", "_adReverseWchar", "_adSortWchar"] {
        cat.declare(name, &[abi.array], Some(abi.array));
    }

    cat.declare_with(
        "_adReverse",
        &[abi.array, abi.size],
        Some(abi.array),
        &RoutineAttrs::new().with(RoutineFlags::NOUNWIND),
    );
    cat.declare("_adDupT", &[abi.ptr, abi.array], Some(abi.array));
    for name in ["_adEq", "_adCmp"] {
        cat.declare_with(name, &[abi.array, abi.array, abi.ptr], Some(abi.int), &readonly());
    }
    cat.declare_with(
        "_adCmpChar",
        &[abi.array, abi.array],
        Some(abi.int),
        &readonly_nounwind(),
    );
    cat.declare("_adSort", &[abi.array, abi.ptr], Some(abi.array));
}

fn declare_assoc_arrays<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    cat.declare_with(
        "_aaLen",
        &[abi.ptr],
        Some(abi.size),
        &readonly_nounwind().nocapture(&[0]),
    );
    // (aa, keyti, valuesize, pkey)
    cat.declare_with(
        "_aaGet",
        &[abi.ptr, abi.ptr, abi.size, abi.ptr],
        Some(abi.ptr),
        &nocapture(&[0, 3]),
    );
    // (aa, keyti, pkey)
    cat.declare_with(
        "_aaIn",
        &[abi.ptr, abi.ptr, abi.ptr],
        Some(abi.ptr),
        &readonly().nocapture(&[0, 2]),
    );
    cat.declare_with("_aaDel", &[abi.ptr, abi.ptr, abi.ptr], None, &nocapture(&[0, 2]));
    // (aa, keysize, valuesize)
    cat.declare_with(
        "_aaValues",
        &[abi.ptr, abi.size, abi.size],
        Some(abi.array),
        &noalias().nocapture(&[0]),
    );
    cat.declare("_aaRehash", &[abi.ptr, abi.ptr], Some(abi.ptr));
    cat.declare_with(
        "_aaKeys",
        &[abi.ptr, abi.size],
        Some(abi.array),
        &noalias().nocapture(&[0]),
    );
    // (aa, keysize, dg)
    for name in ["_aaApply", "_aaApply2"] {
        cat.declare_with(
            name,
            &[abi.ptr, abi.size, abi.delegate],
            Some(abi.int),
            &nocapture(&[0]),
        );
    }
    cat.declare_with(
        "_aaEq",
        &[abi.ptr, abi.ptr, abi.ptr],
        Some(abi.int),
        &nocapture(&[0, 1]),
    );
}

fn declare_control<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    for name in ["_moduleCtor", "_moduleDtor"] {
        cat.declare(name, &[], None);
    }

    cat.declare("_d_throw_exception", &[abi.ptr], None);

    // (table, value)
    for width in CharWidth::ALL {
        cat.declare_with(
            &RuntimeCall::StringSwitch(width).routine(),
            &[abi.array, abi.array],
            Some(abi.int),
            &readonly(),
        );
    }

    // -- Synchronization --
    for name in ["_d_criticalenter", "_d_criticalexit"] {
        cat.declare(name, &[abi.ptr], None);
    }
    for name in ["_d_monitorenter", "_d_monitorexit"] {
        cat.declare_with(name, &[abi.ptr], None, &nocapture(&[0]));
    }

    // -- Exception handling --
    // (version, actions, exception class, exception info, context)
    cat.declare(
        "_d_eh_personality",
        &[abi.int, abi.int, abi.long, abi.ptr, abi.ptr],
        Some(abi.int),
    );
    cat.declare("_d_eh_resume_unwind", &[abi.ptr], None);

    cat.declare("_d_invariant", &[abi.ptr], None);
}

/// Descriptor instances the runtime library ships: every basic type, every
/// dynamic array of a basic type, and the shared internal placeholders.
fn declare_builtin_descriptors<'ctx>(cat: &Catalogue<'ctx>, abi: &AbiTypes<'ctx>) {
    for kind in BasicKind::ALL {
        let deco = kind.deco();
        cat.declare_descriptor(&deco.to_string(), abi);
        cat.declare_descriptor(&format!("A{deco}"), abi);
    }
    for slot in InternalSlot::ALL {
        cat.declare_descriptor(slot.deco(), abi);
    }
}
