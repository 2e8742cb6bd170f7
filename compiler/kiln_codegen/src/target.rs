//! Target description: the handful of layout facts the runtime interface
//! depends on.
//!
//! Target triples follow the format `<arch>-<vendor>-<os>[-<env>]`:
//! - `x86_64-unknown-linux-gnu` - 64-bit, 80-bit `real`
//! - `i686-pc-windows-msvc` - 32-bit, 80-bit `real`
//! - `aarch64-apple-darwin` - 64-bit, `real` is `double`

use std::fmt;

use inkwell::context::Context;
use inkwell::targets::TargetTriple;
use inkwell::types::{FloatType, IntType};

/// A target triple that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    InvalidTripleFormat { triple: String, reason: String },
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TargetError::InvalidTripleFormat { triple, reason } = self;
        write!(f, "cannot use target `{triple}`: {reason}")
    }
}

impl std::error::Error for TargetError {}

/// `<arch>-<vendor>-<os>[-<env>]`, split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTripleComponents {
    pub arch: String,
    pub vendor: String,
    pub os: String,
    /// ABI suffix such as `gnu` or `msvc`.
    pub env: Option<String>,
}

impl TargetTripleComponents {
    pub fn parse(triple: &str) -> Result<Self, TargetError> {
        let invalid = |reason: &str| TargetError::InvalidTripleFormat {
            triple: triple.to_owned(),
            reason: reason.to_owned(),
        };

        let mut parts = triple.splitn(4, '-');
        let (Some(arch), Some(vendor), Some(os)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("need <arch>-<vendor>-<os>"));
        };
        let env = parts.next();
        if [arch, vendor, os].iter().chain(env.iter()).any(|p| p.is_empty()) {
            return Err(invalid("empty component"));
        }

        Ok(TargetTripleComponents {
            arch: arch.to_owned(),
            vendor: vendor.to_owned(),
            os: os.to_owned(),
            env: env.map(str::to_owned),
        })
    }

    /// Check if this is a 32- or 64-bit x86 target.
    pub fn is_x86(&self) -> bool {
        matches!(
            self.arch.as_str(),
            "x86" | "x86_64" | "i386" | "i486" | "i586" | "i686"
        )
    }

    /// Pointer width in bits.
    pub fn pointer_bits(&self) -> u32 {
        match self.arch.as_str() {
            "x86" | "i386" | "i486" | "i586" | "i686" | "arm" | "armv7" | "thumbv7" | "wasm32"
            | "riscv32" | "mips" | "mipsel" | "powerpc" | "sparc" => 32,
            _ => 64,
        }
    }
}

impl fmt::Display for TargetTripleComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TargetTripleComponents {
            arch,
            vendor,
            os,
            env,
        } = self;
        match env {
            Some(env) => write!(f, "{arch}-{vendor}-{os}-{env}"),
            None => write!(f, "{arch}-{vendor}-{os}"),
        }
    }
}

/// Representation of the language's `real` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealRepr {
    /// x87 80-bit extended precision.
    X86Fp80,
    /// Plain IEEE double.
    Double,
}

/// Layout facts about the compilation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    components: TargetTripleComponents,
    pointer_bits: u32,
    real: RealRepr,
}

impl TargetLayout {
    pub fn from_triple(triple: &str) -> Result<Self, TargetError> {
        let components = TargetTripleComponents::parse(triple)?;
        let real = if components.is_x86() {
            RealRepr::X86Fp80
        } else {
            RealRepr::Double
        };
        Ok(TargetLayout {
            pointer_bits: components.pointer_bits(),
            real,
            components,
        })
    }

    /// The target the compiler itself runs on.
    pub fn host() -> Self {
        let components = TargetTripleComponents {
            arch: std::env::consts::ARCH.to_string(),
            vendor: "unknown".to_string(),
            os: std::env::consts::OS.to_string(),
            env: None,
        };
        let real = if components.is_x86() {
            RealRepr::X86Fp80
        } else {
            RealRepr::Double
        };
        TargetLayout {
            pointer_bits: components.pointer_bits(),
            real,
            components,
        }
    }

    pub fn components(&self) -> &TargetTripleComponents {
        &self.components
    }

    pub fn pointer_bits(&self) -> u32 {
        self.pointer_bits
    }

    pub fn real_repr(&self) -> RealRepr {
        self.real
    }

    /// LLVM triple for modules compiled for this target.
    pub fn triple(&self) -> TargetTriple {
        TargetTriple::create(&self.components.to_string())
    }

    /// `size_t`: unsigned integer of pointer width.
    pub fn size_type<'ctx>(&self, context: &'ctx Context) -> IntType<'ctx> {
        context.custom_width_int_type(self.pointer_bits)
    }

    /// LLVM type of `real`.
    pub fn real_type<'ctx>(&self, context: &'ctx Context) -> FloatType<'ctx> {
        match self.real {
            RealRepr::X86Fp80 => context.x86_f80_type(),
            RealRepr::Double => context.f64_type(),
        }
    }
}

impl Default for TargetLayout {
    fn default() -> Self {
        Self::host()
    }
}
