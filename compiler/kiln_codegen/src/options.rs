//! Backend configuration.
//!
//! The runtime interface has one tunable behavior: whether implicit runtime
//! calls are allowed at all. Freestanding targets turn them off so any
//! accidental dependency on the runtime library fails the build instead of
//! failing at link time.

use crate::target::{TargetError, TargetLayout};

/// Whether generated code may call into the runtime library implicitly.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RuntimeCallPolicy {
    #[default]
    Allowed,
    /// Any runtime routine or global request is a fatal error.
    Forbidden,
}

impl RuntimeCallPolicy {
    #[inline]
    pub fn is_forbidden(self) -> bool {
        self == RuntimeCallPolicy::Forbidden
    }
}

/// Options for one codegen session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendOptions {
    pub runtime_calls: RuntimeCallPolicy,
    pub target: TargetLayout,
}

impl BackendOptions {
    /// Host target with implicit runtime calls disabled.
    pub fn no_runtime() -> Self {
        BackendOptions {
            runtime_calls: RuntimeCallPolicy::Forbidden,
            ..BackendOptions::default()
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: TargetLayout) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_runtime_calls(mut self, policy: RuntimeCallPolicy) -> Self {
        self.runtime_calls = policy;
        self
    }

    /// Pick the backend's flags out of a command line.
    ///
    /// Recognizes `--no-runtime` (and its short spelling `-noruntime`) and
    /// `--target=<triple>`. Everything else belongs to the driver and is
    /// skipped.
    pub fn from_args<I, S>(args: I) -> Result<Self, TargetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = BackendOptions::default();
        for arg in args {
            let arg = arg.as_ref();
            if arg == "--no-runtime" || arg == "-noruntime" {
                options.runtime_calls = RuntimeCallPolicy::Forbidden;
            } else if let Some(triple) = arg.strip_prefix("--target=") {
                options.target = TargetLayout::from_triple(triple)?;
            }
        }
        tracing::debug!(
            runtime_calls = ?options.runtime_calls,
            triple = %options.target.components(),
            "backend options"
        );
        Ok(options)
    }
}
