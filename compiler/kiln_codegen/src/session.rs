//! Per-session state of the runtime interface.
//!
//! A session owns one runtime registry and one descriptor table, so two
//! sessions never observe each other's runtime module or descriptors.
//! Everything mutates through `&mut self`; a host compiling units in
//! parallel builds one session per thread.

use kiln_diagnostic::{Diagnostic, DiagnosticQueue, ErrorGuaranteed};
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{FunctionValue, GlobalValue};
use kiln_ir::Span;
use kiln_types::{TypeId, TypePool};

use crate::error::BackendError;
use crate::options::BackendOptions;
use crate::runtime::{RuntimeCall, RuntimeLayouts, RuntimeRegistry};
use crate::type_desc::{
    DescriptorContext, DescriptorId, DescriptorRef, SemanticScope, TypeDescriptors, UnitId,
};

/// The compiler pass issuing a descriptor request.
pub enum Pass<'m, 'ctx> {
    /// Semantic analysis of the unit in `scope`.
    Semantic(SemanticScope),
    /// Code generation into a module.
    Codegen(&'m Module<'ctx>),
}

/// One compilation session's runtime registry, descriptor table and
/// diagnostics.
///
/// Every module the session declares into must come from the session's
/// [`Context`]; [`create_module`](Self::create_module) makes one.
#[derive(Debug)]
pub struct CodegenSession<'ctx> {
    options: BackendOptions,
    registry: RuntimeRegistry<'ctx>,
    descriptors: TypeDescriptors,
    diagnostics: DiagnosticQueue,
}

impl<'ctx> CodegenSession<'ctx> {
    pub fn new(context: &'ctx Context, options: BackendOptions) -> Self {
        let registry = RuntimeRegistry::with_default_layouts(
            context,
            options.runtime_calls,
            options.target.clone(),
        );
        Self::with_registry(options, registry)
    }

    /// Session using the code generator's own runtime type layouts.
    pub fn with_layouts(
        context: &'ctx Context,
        options: BackendOptions,
        layouts: Box<dyn RuntimeLayouts>,
    ) -> Self {
        let registry = RuntimeRegistry::new(
            context,
            options.runtime_calls,
            options.target.clone(),
            layouts,
        );
        Self::with_registry(options, registry)
    }

    fn with_registry(options: BackendOptions, registry: RuntimeRegistry<'ctx>) -> Self {
        tracing::debug!(
            runtime_calls = ?options.runtime_calls,
            triple = %options.target.components(),
            "codegen session created"
        );
        CodegenSession {
            options,
            registry,
            descriptors: TypeDescriptors::new(),
            diagnostics: DiagnosticQueue::new(),
        }
    }

    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    pub fn registry(&self) -> &RuntimeRegistry<'ctx> {
        &self.registry
    }

    /// An empty module for the session's target.
    pub fn create_module(&self, name: &str) -> Module<'ctx> {
        let module = self.registry.context().create_module(name);
        module.set_triple(&self.options.target.triple());
        module
    }

    pub fn descriptors(&self) -> &TypeDescriptors {
        &self.descriptors
    }

    pub fn init_runtime(&mut self) {
        self.registry.init_runtime();
    }

    pub fn free_runtime(&mut self) {
        self.registry.free_runtime();
    }

    pub fn fetch_function(
        &mut self,
        module: &Module<'ctx>,
        name: &str,
    ) -> Result<FunctionValue<'ctx>, BackendError> {
        self.registry.fetch_function(module, name)
    }

    pub fn fetch_global(
        &mut self,
        module: &Module<'ctx>,
        name: &str,
    ) -> Result<GlobalValue<'ctx>, BackendError> {
        self.registry.fetch_global(module, name)
    }

    /// Declare the routine `call` lowers to. A policy violation names the
    /// construct and its location.
    pub fn declare_runtime_call(
        &mut self,
        module: &Module<'ctx>,
        call: RuntimeCall,
        span: Span,
    ) -> Result<FunctionValue<'ctx>, BackendError> {
        self.registry
            .fetch_function(module, &call.routine())
            .map_err(|err| err.at_construct(call.construct(), span))
    }

    pub fn internal_descriptor_of(
        &mut self,
        pool: &mut TypePool,
        ty: TypeId,
        pass: Pass<'_, 'ctx>,
    ) -> Result<DescriptorRef, BackendError> {
        let cx = Self::context(&mut self.registry, pass);
        self.descriptors.internal_descriptor_of(pool, ty, cx)
    }

    pub fn exact_descriptor_of(
        &mut self,
        pool: &mut TypePool,
        ty: TypeId,
        pass: Pass<'_, 'ctx>,
    ) -> Result<DescriptorRef, BackendError> {
        let cx = Self::context(&mut self.registry, pass);
        self.descriptors.exact_descriptor_of(pool, ty, cx)
    }

    /// Declare a descriptor's instance in `module`.
    pub fn descriptor_global(
        &mut self,
        module: &Module<'ctx>,
        id: DescriptorId,
    ) -> Result<GlobalValue<'ctx>, BackendError> {
        self.descriptors.descriptor_global(id, &mut self.registry, module)
    }

    /// Emit the descriptors `unit` owes into its module.
    pub fn emit_pending(
        &mut self,
        unit: UnitId,
        module: &Module<'ctx>,
    ) -> Result<usize, BackendError> {
        self.descriptors.emit_pending(unit, &mut self.registry, module)
    }

    /// Record a fatal backend error.
    pub fn report(&mut self, err: &BackendError) -> ErrorGuaranteed {
        if err.is_internal() {
            tracing::error!(%err, "internal backend error");
        }
        self.diagnostics.emit_error(err.to_diagnostic())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.diagnostics()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Take all diagnostics reported so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.flush()
    }

    fn context<'a>(
        registry: &'a mut RuntimeRegistry<'ctx>,
        pass: Pass<'a, 'ctx>,
    ) -> DescriptorContext<'a, 'ctx> {
        match pass {
            Pass::Semantic(scope) => DescriptorContext::Semantic(scope),
            Pass::Codegen(module) => DescriptorContext::Codegen { registry, module },
        }
    }
}
