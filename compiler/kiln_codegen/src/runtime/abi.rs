//! LLVM types the runtime routine signatures are written in.
//!
//! Pointers are opaque, so every class reference, descriptor reference and
//! associative array handle is a plain `ptr`, and every dynamic array is
//! `{ size_t, ptr }` whatever its element type.

use inkwell::context::Context;
use inkwell::types::{BasicType, BasicTypeEnum, StructType};
use inkwell::AddressSpace;

use crate::target::TargetLayout;

/// Layouts of the runtime library's own aggregate types.
///
/// Supplied by code generation, which owns the translation of the runtime's
/// semantic types into LLVM types. Only the descriptor body is needed by
/// value; everything else crosses the ABI behind a pointer.
pub trait RuntimeLayouts {
    /// Instance layout of `TypeInfo`; every descriptor global stores one.
    fn type_info_body<'ctx>(
        &self,
        context: &'ctx Context,
        target: &TargetLayout,
    ) -> StructType<'ctx>;
}

/// Standard object model: every class instance starts with a vtable pointer
/// and a monitor slot.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultLayouts;

impl RuntimeLayouts for DefaultLayouts {
    fn type_info_body<'ctx>(
        &self,
        context: &'ctx Context,
        _target: &TargetLayout,
    ) -> StructType<'ctx> {
        let ptr = context.ptr_type(AddressSpace::default());
        context.struct_type(&[ptr.into(), ptr.into()], false)
    }
}

/// Every LLVM type the catalogue needs, computed once per build.
pub(crate) struct AbiTypes<'ctx> {
    context: &'ctx Context,
    pub int: BasicTypeEnum<'ctx>,
    pub long: BasicTypeEnum<'ctx>,
    pub short: BasicTypeEnum<'ctx>,
    pub size: BasicTypeEnum<'ctx>,
    pub float: BasicTypeEnum<'ctx>,
    pub double: BasicTypeEnum<'ctx>,
    pub real: BasicTypeEnum<'ctx>,
    pub ptr: BasicTypeEnum<'ctx>,
    /// `{ size_t, ptr }`: strings of every width, `void[]`, and arrays of
    /// strings.
    pub array: BasicTypeEnum<'ctx>,
    /// `{ context, function }`, for one- and two-argument callbacks alike.
    pub delegate: BasicTypeEnum<'ctx>,
    pub type_info_body: StructType<'ctx>,
}

impl<'ctx> AbiTypes<'ctx> {
    pub fn new(
        context: &'ctx Context,
        target: &TargetLayout,
        layouts: &dyn RuntimeLayouts,
    ) -> Self {
        let size = target.size_type(context);
        let ptr = context.ptr_type(AddressSpace::default());
        AbiTypes {
            context,
            int: context.i32_type().into(),
            long: context.i64_type().into(),
            short: context.i16_type().into(),
            size: size.into(),
            float: context.f32_type().into(),
            double: context.f64_type().into(),
            real: target.real_type(context).into(),
            ptr: ptr.into(),
            array: context.struct_type(&[size.into(), ptr.into()], false).into(),
            delegate: context.struct_type(&[ptr.into(), ptr.into()], false).into(),
            type_info_body: layouts.type_info_body(context, target),
        }
    }

    /// Complex number: a pair of the component type.
    pub fn complex(&self, component: BasicTypeEnum<'ctx>) -> BasicTypeEnum<'ctx> {
        self.context
            .struct_type(&[component, component], false)
            .as_basic_type_enum()
    }
}
