use inkwell::context::Context;
use inkwell::values::GlobalValue;
use kiln_types::{BasicKind, TypeData, TypeId, TypePool};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::options::RuntimeCallPolicy;
use crate::target::TargetLayout;

const APP: UnitId = UnitId::from_raw(0);
const LIB: UnitId = UnitId::from_raw(1);

fn semantic() -> DescriptorContext<'static, 'static> {
    DescriptorContext::Semantic(SemanticScope::root(APP))
}

fn registry(context: &Context, policy: RuntimeCallPolicy) -> RuntimeRegistry<'_> {
    let Ok(target) = TargetLayout::from_triple("x86_64-unknown-linux-gnu") else {
        panic!("valid triple rejected");
    };
    RuntimeRegistry::with_default_layouts(context, policy, target)
}

fn global_count(module: &Module<'_>) -> usize {
    module.get_globals().count()
}

fn global_name(global: GlobalValue<'_>) -> String {
    global.get_name().to_string_lossy().into_owned()
}

fn exact(descs: &mut TypeDescriptors, pool: &mut TypePool, ty: TypeId) -> DescriptorRef {
    match descs.exact_descriptor_of(pool, ty, semantic()) {
        Ok(r) => r,
        Err(err) => panic!("descriptor request failed: {err}"),
    }
}

fn internal(descs: &mut TypeDescriptors, pool: &mut TypePool, ty: TypeId) -> DescriptorRef {
    match descs.internal_descriptor_of(pool, ty, semantic()) {
        Ok(r) => r,
        Err(err) => panic!("descriptor request failed: {err}"),
    }
}

#[test]
fn exact_descriptor_is_memoized_per_merged_type() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let interned = pool.assoc_array(TypeId::INT, TypeId::DOUBLE);
    let fresh = pool.fresh(TypeData::AssocArray {
        key: TypeId::INT,
        value: TypeId::DOUBLE,
    });

    let a = exact(&mut descs, &mut pool, fresh);
    let b = exact(&mut descs, &mut pool, interned);
    assert_eq!(a, b);
    assert_eq!(a.class, ReflectionClass::AssociativeArray);
    assert_eq!(descs.len(), 1);
    assert_eq!(descs.descriptor_of(interned), Some(a.id));
    assert_eq!(descs.get(a.id).ty(), Some(interned));
}

#[test]
fn basic_types_are_builtin() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let int = exact(&mut descs, &mut pool, TypeId::INT);
    let desc = descs.get(int.id);
    assert_eq!(*desc.state(), DescriptorState::Builtin);
    assert_eq!(desc.symbol(), "_D10TypeInfo_i6__initZ");
    assert!(descs.pending(APP).is_empty());

    let string = pool.dyn_array(TypeId::CHAR);
    let string = exact(&mut descs, &mut pool, string);
    assert!(descs.get(string.id).state().is_builtin());
    assert_eq!(string.class, ReflectionClass::Array);
}

#[test]
fn custom_descriptors_are_queued_on_the_root_unit() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let point = pool.struct_type("app.geometry", "Point");

    let scope = SemanticScope::imported(LIB, APP);
    let Ok(r) = descs.exact_descriptor_of(&mut pool, point, DescriptorContext::Semantic(scope))
    else {
        panic!("struct descriptor should be created");
    };
    assert_eq!(*descs.get(r.id).state(), DescriptorState::Pending { owner: APP });
    assert_eq!(descs.pending(APP), [r.id]);
    assert!(descs.pending(LIB).is_empty());
    assert_eq!(
        descs.get(r.id).symbol(),
        "_D29TypeInfo_S3app8geometry5Point6__initZ"
    );
}

#[test]
fn first_requesting_unit_owns_the_descriptor() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let pair = pool.tuple(&[TypeId::INT, TypeId::INT]);

    let first = descs.exact_descriptor_of(
        &mut pool,
        pair,
        DescriptorContext::Semantic(SemanticScope::root(LIB)),
    );
    let second = descs.exact_descriptor_of(
        &mut pool,
        pair,
        DescriptorContext::Semantic(SemanticScope::root(APP)),
    );
    assert_eq!(first, second);
    let Ok(r) = first else {
        panic!("tuple descriptor should be created");
    };
    assert_eq!(descs.pending(LIB), [r.id]);
    assert!(descs.pending(APP).is_empty());
}

#[test]
fn static_arrays_collapse_to_dynamic_arrays() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let point = pool.struct_type("app", "Point");
    let fixed = pool.static_array(point, 4);
    let slice = pool.dyn_array(point);

    let a = internal(&mut descs, &mut pool, fixed);
    let b = internal(&mut descs, &mut pool, slice);
    assert_eq!(a, b);
    assert_eq!(a.class, ReflectionClass::Array);
    assert_eq!(descs.get(a.id).ty(), Some(slice));
}

#[test]
fn identity_only_kinds_share_a_placeholder() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let f1 = pool.function(&[TypeId::INT], TypeId::VOID);
    let f2 = pool.function(&[TypeId::CHAR, TypeId::CHAR], TypeId::BOOL);
    let p1 = pool.pointer_to(TypeId::INT);
    let p2 = pool.pointer_to(f1);

    let rf1 = internal(&mut descs, &mut pool, f1);
    let rf2 = internal(&mut descs, &mut pool, f2);
    assert_eq!(rf1, rf2);
    assert_eq!(descs.internal_slot(InternalSlot::Function), Some(rf1.id));

    let rp1 = internal(&mut descs, &mut pool, p1);
    let rp2 = internal(&mut descs, &mut pool, p2);
    assert_eq!(rp1, rp2);
    assert_ne!(rp1, rf1);

    let placeholder = descs.get(rp1.id);
    assert_eq!(placeholder.ty(), None);
    assert_eq!(placeholder.symbol(), "_D10TypeInfo_P6__initZ");
    assert!(placeholder.state().is_builtin());
    // placeholders never enter the per-type table
    assert_eq!(descs.descriptor_of(p1), None);
}

#[test]
fn classes_and_class_arrays_collapse_but_interfaces_do_not() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let widget = pool.class_type("app", "Widget");
    let button = pool.class_type("app", "Button");
    let drawable = pool.interface_type("app", "Drawable");
    let widgets = pool.static_array(widget, 3);
    let drawables = pool.dyn_array(drawable);

    let w = internal(&mut descs, &mut pool, widget);
    let b = internal(&mut descs, &mut pool, button);
    assert_eq!(w, b);
    assert_eq!(Some(w.id), descs.internal_slot(InternalSlot::Class));

    let arr = internal(&mut descs, &mut pool, widgets);
    let iface_arr = internal(&mut descs, &mut pool, drawables);
    assert_eq!(arr, iface_arr);
    assert_eq!(Some(arr.id), descs.internal_slot(InternalSlot::ArrayOfClass));

    let d = internal(&mut descs, &mut pool, drawable);
    assert_eq!(d.class, ReflectionClass::Interface);
    for slot in InternalSlot::ALL {
        assert_ne!(Some(d.id), descs.internal_slot(slot));
    }
    assert_eq!(descs.descriptor_of(drawable), Some(d.id));
}

#[test]
fn internal_request_reduces_to_base_first() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let handle = pool.pointer_to(TypeId::VOID);
    let alias = pool.typedef_type("app", "Handle", handle);
    let color = pool.enum_type("app", "Color", TypeId::UBYTE);

    let r = internal(&mut descs, &mut pool, alias);
    assert_eq!(Some(r.id), descs.internal_slot(InternalSlot::Pointer));
    let r = internal(&mut descs, &mut pool, color);
    assert_eq!(descs.get(r.id).ty(), Some(TypeId::UBYTE));

    // exact requests keep nominal identity
    let r = exact(&mut descs, &mut pool, color);
    assert_eq!(r.class, ReflectionClass::Enum);
}

#[test]
fn error_type_records_nothing() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let err = descs.exact_descriptor_of(&mut pool, TypeId::ERROR, semantic());
    assert!(matches!(err, Err(BackendError::DescriptorKindUnsupported { .. })));
    assert!(descs.is_empty());
}

#[test]
fn codegen_pass_emits_immediately() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let context = Context::create();
    let mut reg = registry(&context, RuntimeCallPolicy::Allowed);
    let module = context.create_module("app");
    let point = pool.struct_type("app", "Point");

    let cx = DescriptorContext::Codegen {
        registry: &mut reg,
        module: &module,
    };
    let Ok(r) = descs.exact_descriptor_of(&mut pool, point, cx) else {
        panic!("struct descriptor should be emitted");
    };
    let DescriptorState::Emitted { module: owner } = descs.get(r.id).state() else {
        panic!("codegen pass should emit in place");
    };
    assert_eq!(&**owner, "app");
    assert!(module.get_global("_D20TypeInfo_S3app5Point6__initZ").is_some());
    assert!(descs.pending(APP).is_empty());
}

#[test]
fn codegen_pass_under_forbidden_policy_records_nothing() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let context = Context::create();
    let mut reg = registry(&context, RuntimeCallPolicy::Forbidden);
    let module = context.create_module("app");
    let point = pool.struct_type("app", "Point");

    let cx = DescriptorContext::Codegen {
        registry: &mut reg,
        module: &module,
    };
    let err = descs.exact_descriptor_of(&mut pool, point, cx);
    assert!(matches!(err, Err(BackendError::PolicyViolation { .. })));
    assert!(descs.is_empty());
    assert_eq!(global_count(&module), 0);
}

#[test]
fn emission_happens_once() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let context = Context::create();
    let mut reg = registry(&context, RuntimeCallPolicy::Allowed);
    let module = context.create_module("app");
    let point = pool.struct_type("app", "Point");
    let r = exact(&mut descs, &mut pool, point);

    assert_eq!(descs.emit(r.id, &mut reg, &module), Ok(true));
    assert_eq!(descs.emit(r.id, &mut reg, &module), Ok(false));
    assert_eq!(global_count(&module), 1);
    assert!(descs.get(r.id).state().is_emitted());
}

#[test]
fn emit_leaves_builtins_alone() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let context = Context::create();
    let mut reg = registry(&context, RuntimeCallPolicy::Allowed);
    let module = context.create_module("app");
    let r = exact(&mut descs, &mut pool, TypeId::INT);

    assert_eq!(descs.emit(r.id, &mut reg, &module), Ok(false));
    assert_eq!(*descs.get(r.id).state(), DescriptorState::Builtin);
    assert_eq!(global_count(&module), 0);
}

#[test]
fn emit_pending_drains_the_unit_queue() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let context = Context::create();
    let mut reg = registry(&context, RuntimeCallPolicy::Allowed);
    let module = context.create_module("app");
    let point = pool.struct_type("app", "Point");
    let points = pool.static_array(point, 2);
    exact(&mut descs, &mut pool, point);
    exact(&mut descs, &mut pool, points);
    exact(&mut descs, &mut pool, TypeId::INT);

    assert_eq!(descs.emit_pending(APP, &mut reg, &module), Ok(2));
    assert!(descs.pending(APP).is_empty());
    assert_eq!(global_count(&module), 2);
    assert_eq!(descs.emit_pending(APP, &mut reg, &module), Ok(0));
}

#[test]
fn emit_pending_keeps_the_queue_on_failure() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let context = Context::create();
    let mut reg = registry(&context, RuntimeCallPolicy::Forbidden);
    let module = context.create_module("app");
    let point = pool.struct_type("app", "Point");
    let r = exact(&mut descs, &mut pool, point);

    let err = descs.emit_pending(APP, &mut reg, &module);
    assert!(matches!(err, Err(BackendError::PolicyViolation { .. })));
    assert_eq!(descs.pending(APP), [r.id]);
}

#[test]
fn descriptor_global_resolves_builtins_through_the_runtime() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let context = Context::create();
    let mut reg = registry(&context, RuntimeCallPolicy::Allowed);
    let module = context.create_module("app");

    let int = exact(&mut descs, &mut pool, TypeId::INT);
    let Ok(global) = descs.descriptor_global(int.id, &mut reg, &module) else {
        panic!("int descriptor should resolve");
    };
    assert_eq!(global_name(global), "_D10TypeInfo_i6__initZ");
    assert!(reg.is_initialized());

    let p = internal(&mut descs, &mut pool, TypeId::INT);
    assert_eq!(p, int);
    let f = pool.function(&[], TypeId::VOID);
    let f = internal(&mut descs, &mut pool, f);
    let Ok(global) = descs.descriptor_global(f.id, &mut reg, &module) else {
        panic!("function placeholder should resolve");
    };
    assert_eq!(global_name(global), "_D10TypeInfo_F6__initZ");
}

#[test]
fn descriptor_global_in_a_second_module_declares_again() {
    let mut pool = TypePool::new();
    let mut descs = TypeDescriptors::new();
    let context = Context::create();
    let mut reg = registry(&context, RuntimeCallPolicy::Allowed);
    let owner = context.create_module("app");
    let user = context.create_module("lib");
    let point = pool.struct_type("app", "Point");
    let r = exact(&mut descs, &mut pool, point);

    assert!(descs.descriptor_global(r.id, &mut reg, &owner).is_ok());
    assert!(descs.descriptor_global(r.id, &mut reg, &user).is_ok());
    assert!(descs.descriptor_global(r.id, &mut reg, &user).is_ok());
    assert_eq!(global_count(&owner), 1);
    assert_eq!(global_count(&user), 1);
    let DescriptorState::Emitted { module } = descs.get(r.id).state() else {
        panic!("descriptor should be emitted");
    };
    assert_eq!(&**module, "app");
}

/// A type expression, built either interned or as unmerged nodes.
#[derive(Clone, Debug)]
enum Shape {
    Basic(BasicKind),
    Pointer(Box<Shape>),
    Array(Box<Shape>),
    Fixed(Box<Shape>, u64),
    Assoc(Box<Shape>, Box<Shape>),
    Struct(u8),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        (0..BasicKind::COUNT).prop_map(|i| Shape::Basic(BasicKind::ALL[i])),
        (0u8..3).prop_map(Shape::Struct),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|s| Shape::Pointer(Box::new(s))),
            inner.clone().prop_map(|s| Shape::Array(Box::new(s))),
            (inner.clone(), 1u64..5).prop_map(|(s, n)| Shape::Fixed(Box::new(s), n)),
            (inner.clone(), inner).prop_map(|(k, v)| Shape::Assoc(Box::new(k), Box::new(v))),
        ]
    })
}

fn build(pool: &mut TypePool, structs: &[TypeId], shape: &Shape, fresh: bool) -> TypeId {
    let data = match shape {
        Shape::Basic(kind) => return TypeId::basic(*kind),
        Shape::Struct(i) => return structs[usize::from(*i)],
        Shape::Pointer(s) => TypeData::Pointer(build(pool, structs, s, fresh)),
        Shape::Array(s) => TypeData::DynArray(build(pool, structs, s, fresh)),
        Shape::Fixed(s, len) => TypeData::StaticArray {
            elem: build(pool, structs, s, fresh),
            len: *len,
        },
        Shape::Assoc(k, v) => TypeData::AssocArray {
            key: build(pool, structs, k, fresh),
            value: build(pool, structs, v, fresh),
        },
    };
    if fresh {
        pool.fresh(data)
    } else {
        pool.intern(data)
    }
}

proptest! {
    #[test]
    fn one_descriptor_per_canonical_type(shape in shape()) {
        let mut pool = TypePool::new();
        let structs: Vec<TypeId> = ["A", "B", "C"]
            .into_iter()
            .map(|name| pool.struct_type("app", name))
            .collect();
        let mut descs = TypeDescriptors::new();

        let fresh = build(&mut pool, &structs, &shape, true);
        let interned = build(&mut pool, &structs, &shape, false);

        let a = descs.exact_descriptor_of(&mut pool, fresh, semantic());
        let b = descs.exact_descriptor_of(&mut pool, interned, semantic());
        prop_assert!(a.is_ok());
        prop_assert_eq!(a, b);
        prop_assert_eq!(descs.len(), 1);

        let a = descs.internal_descriptor_of(&mut pool, fresh, semantic());
        let b = descs.internal_descriptor_of(&mut pool, interned, semantic());
        prop_assert_eq!(a, b);
    }
}
