//! Runtime ABI registry.
//!
//! The runtime module is a private catalogue holding one declaration per
//! support routine. It is built on first use and never handed out mutably.
//! Code generation fetches from it by name, which copies the declaration
//! (type, attributes) into the module being generated. Every module involved
//! lives in the registry's [`Context`].
//!
//! Routine fetches consult the runtime-call policy before anything else: with
//! runtime calls forbidden, no routine is handed out, not even one the target
//! module already declares. Global fetches reuse an existing target
//! declaration first, so each target sees at most one declaration per symbol.

mod abi;
mod attrs;
mod catalogue;
mod lowering;

use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, GlobalValue};

use crate::error::{BackendError, SymbolKind};
use crate::options::RuntimeCallPolicy;
use crate::target::TargetLayout;

pub use abi::{DefaultLayouts, RuntimeLayouts};
pub use attrs::{RoutineAttrs, RoutineFlags};
pub use catalogue::RUNTIME_MODULE_NAME;
pub use lowering::{ArrayInitKind, CharWidth, RuntimeCall, Transcode};

/// Name of `module`, for logs and descriptor bookkeeping.
pub(crate) fn module_name(module: &Module<'_>) -> String {
    module.get_name().to_string_lossy().into_owned()
}

/// Catalogue of runtime routines and globals for one session.
pub struct RuntimeRegistry<'ctx> {
    context: &'ctx Context,
    policy: RuntimeCallPolicy,
    target: TargetLayout,
    layouts: Box<dyn RuntimeLayouts>,
    module: Option<Module<'ctx>>,
}

impl<'ctx> RuntimeRegistry<'ctx> {
    /// Create a registry. The runtime module is built lazily.
    pub fn new(
        context: &'ctx Context,
        policy: RuntimeCallPolicy,
        target: TargetLayout,
        layouts: Box<dyn RuntimeLayouts>,
    ) -> Self {
        RuntimeRegistry {
            context,
            policy,
            target,
            layouts,
            module: None,
        }
    }

    pub fn with_default_layouts(
        context: &'ctx Context,
        policy: RuntimeCallPolicy,
        target: TargetLayout,
    ) -> Self {
        Self::new(context, policy, target, Box::new(DefaultLayouts))
    }

    pub fn context(&self) -> &'ctx Context {
        self.context
    }

    pub fn policy(&self) -> RuntimeCallPolicy {
        self.policy
    }

    pub fn target(&self) -> &TargetLayout {
        &self.target
    }

    /// Build the runtime module if it does not exist yet.
    pub fn init_runtime(&mut self) {
        self.runtime();
    }

    /// Drop the runtime module. A later fetch rebuilds it.
    pub fn free_runtime(&mut self) {
        if self.module.take().is_none() {
            tracing::warn!("freeing runtime module that was never built");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.module.is_some()
    }

    /// The runtime module, if built.
    pub fn runtime_module(&self) -> Option<&Module<'ctx>> {
        self.module.as_ref()
    }

    fn runtime(&mut self) -> &Module<'ctx> {
        let (context, target, layouts) = (self.context, &self.target, &self.layouts);
        self.module.get_or_insert_with(|| {
            tracing::debug!(triple = %target.components(), "building runtime module");
            let module = catalogue::build_runtime_module(context, target, &**layouts);
            tracing::debug!(
                functions = module.get_functions().count(),
                globals = module.get_globals().count(),
                "runtime module built"
            );
            module
        })
    }

    fn check_policy(&self, symbol: &str) -> Result<(), BackendError> {
        if self.policy.is_forbidden() {
            return Err(BackendError::PolicyViolation {
                symbol: symbol.to_owned(),
                construct: None,
                span: None,
            });
        }
        Ok(())
    }

    /// Declare the runtime routine `name` in `target` and return it.
    ///
    /// Fails whenever runtime calls are forbidden, including for a routine
    /// `target` already declares. An existing declaration is otherwise
    /// returned as is. On error `target` is left untouched.
    pub fn fetch_function(
        &mut self,
        target: &Module<'ctx>,
        name: &str,
    ) -> Result<FunctionValue<'ctx>, BackendError> {
        self.check_policy(name)?;
        if let Some(existing) = target.get_function(name) {
            tracing::trace!(symbol = name, "runtime function already declared");
            return Ok(existing);
        }

        let Some(found) = self.runtime().get_function(name) else {
            return Err(BackendError::RuntimeSymbolMissing {
                name: name.to_owned(),
                kind: SymbolKind::Function,
            });
        };
        let func = target.add_function(name, found.get_type(), Some(Linkage::External));
        attrs::copy_attributes(found, func);
        tracing::trace!(
            symbol = name,
            module = %module_name(target),
            "declared runtime function"
        );
        Ok(func)
    }

    /// Declare the runtime global `name` in `target` and return it.
    ///
    /// An existing declaration in `target` is returned as is, even when
    /// runtime calls are forbidden.
    pub fn fetch_global(
        &mut self,
        target: &Module<'ctx>,
        name: &str,
    ) -> Result<GlobalValue<'ctx>, BackendError> {
        if let Some(existing) = target.get_global(name) {
            tracing::trace!(symbol = name, "runtime global already declared");
            return Ok(existing);
        }
        self.check_policy(name)?;

        let missing = || BackendError::RuntimeSymbolMissing {
            name: name.to_owned(),
            kind: SymbolKind::Global,
        };
        let found = self.runtime().get_global(name).ok_or_else(missing)?;
        let value_type =
            BasicTypeEnum::try_from(found.get_value_type()).map_err(|_| missing())?;
        let global = target.add_global(value_type, None, name);
        global.set_constant(found.is_constant());
        global.set_linkage(found.get_linkage());
        tracing::trace!(symbol = name, module = %module_name(target), "declared runtime global");
        Ok(global)
    }

    /// Declare the descriptor instance `symbol` in `target`.
    ///
    /// Like [`fetch_global`](Self::fetch_global), except that a symbol the
    /// runtime module does not ship is declared as an external constant of
    /// the descriptor layout: compiler-requested descriptors are provided
    /// under their mangled names at link time.
    pub fn fetch_descriptor_global(
        &mut self,
        target: &Module<'ctx>,
        symbol: &str,
    ) -> Result<GlobalValue<'ctx>, BackendError> {
        if let Some(existing) = target.get_global(symbol) {
            return Ok(existing);
        }
        self.check_policy(symbol)?;

        if self.runtime().get_global(symbol).is_some() {
            return self.fetch_global(target, symbol);
        }
        let body = self.layouts.type_info_body(self.context, &self.target);
        let global = target.add_global(body, None, symbol);
        global.set_constant(true);
        global.set_linkage(Linkage::External);
        tracing::trace!(symbol, module = %module_name(target), "declared descriptor global");
        Ok(global)
    }
}

impl std::fmt::Debug for RuntimeRegistry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeRegistry")
            .field("policy", &self.policy)
            .field("target", &self.target.components().to_string())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
