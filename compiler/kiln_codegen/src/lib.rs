//! Runtime interface layer of the Kiln backend.
//!
//! Two components sit between the front end's type graph and the runtime
//! library's binary contract:
//!
//! - [`RuntimeRegistry`]: the catalogue of support routines the runtime
//!   library implements. Code generation asks for a routine by name and gets
//!   a correctly typed, correctly attributed declaration in its own module.
//! - [`TypeDescriptors`]: decides which canonical descriptor represents each
//!   type, creates exactly one per canonical type, and tracks whether it is
//!   supplied by the runtime or still owed by some compilation unit.
//!
//! [`CodegenSession`] owns both for one compilation session. Both work on
//! LLVM modules through `inkwell`, so every module involved belongs to one
//! [`inkwell::context::Context`] the host creates.
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=kiln_codegen=debug`: runtime module construction and
//!   descriptor creation.
//! - `RUST_LOG=kiln_codegen=trace`: every runtime symbol fetch.

mod error;
mod options;
mod runtime;
mod session;
mod target;
mod type_desc;

use std::sync::Once;

pub use error::{BackendError, SymbolKind};
pub use options::{BackendOptions, RuntimeCallPolicy};
pub use runtime::{
    ArrayInitKind, CharWidth, DefaultLayouts, RoutineAttrs, RoutineFlags, RuntimeCall,
    RuntimeLayouts, RuntimeRegistry, Transcode, RUNTIME_MODULE_NAME,
};
pub use session::{CodegenSession, Pass};
pub use target::{RealRepr, TargetError, TargetLayout, TargetTripleComponents};
pub use type_desc::{
    Descriptor, DescriptorContext, DescriptorId, DescriptorKind, DescriptorRef, DescriptorState,
    InternalSlot, ReflectionClass, SemanticScope, TypeDescriptors, UnitId,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing subscriber for debug output.
///
/// Reads `RUST_LOG` for filtering. Does nothing when `RUST_LOG` is unset.
/// Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
