//! Language constructs that lower to runtime routine calls.
//!
//! Each [`RuntimeCall`] names the routine it needs and describes the
//! construct in user terms, so a forbidden runtime call can be reported
//! against the source construct rather than an internal symbol.

use inkwell::types::BasicTypeEnum;

use super::abi::AbiTypes;

/// Character encoding width of a string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CharWidth {
    /// UTF-8 `char[]`
    Narrow,
    /// UTF-16 `wchar[]`
    Wide,
    /// UTF-32 `dchar[]`
    Full,
}

impl CharWidth {
    pub const ALL: [CharWidth; 3] = [CharWidth::Narrow, CharWidth::Wide, CharWidth::Full];

    /// Letter used in routine names.
    pub fn letter(self) -> char {
        match self {
            CharWidth::Narrow => 'c',
            CharWidth::Wide => 'w',
            CharWidth::Full => 'd',
        }
    }

    fn switch_routine(self) -> &'static str {
        match self {
            CharWidth::Narrow => "_d_switch_string",
            CharWidth::Wide => "_d_switch_ustring",
            CharWidth::Full => "_d_switch_dstring",
        }
    }
}

/// Decoding from one string encoding into another, as a `foreach` over a
/// string does when its loop variable has a different width.
///
/// A loop whose variable has the string's own width walks the elements
/// directly and needs no runtime routine, so there is no same-width value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Transcode {
    from: CharWidth,
    to: CharWidth,
}

impl Transcode {
    /// `None` when `from == to`.
    pub fn new(from: CharWidth, to: CharWidth) -> Option<Self> {
        (from != to).then_some(Transcode { from, to })
    }

    /// Encoding of the string being walked.
    pub fn source(self) -> CharWidth {
        self.from
    }

    /// Encoding of the loop variable.
    pub fn decoded(self) -> CharWidth {
        self.to
    }

    /// Every ordered pair of distinct encodings.
    pub fn all() -> impl Iterator<Item = Transcode> {
        CharWidth::ALL.into_iter().flat_map(|from| {
            CharWidth::ALL
                .into_iter()
                .filter_map(move |to| Transcode::new(from, to))
        })
    }
}

/// Element kinds with a dedicated array fill routine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayInitKind {
    I16,
    I32,
    I64,
    Float,
    Double,
    Real,
    Cfloat,
    Cdouble,
    Creal,
    Pointer,
}

impl ArrayInitKind {
    pub const ALL: [ArrayInitKind; 10] = [
        ArrayInitKind::I16,
        ArrayInitKind::I32,
        ArrayInitKind::I64,
        ArrayInitKind::Float,
        ArrayInitKind::Double,
        ArrayInitKind::Real,
        ArrayInitKind::Cfloat,
        ArrayInitKind::Cdouble,
        ArrayInitKind::Creal,
        ArrayInitKind::Pointer,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            ArrayInitKind::I16 => "i16",
            ArrayInitKind::I32 => "i32",
            ArrayInitKind::I64 => "i64",
            ArrayInitKind::Float => "float",
            ArrayInitKind::Double => "double",
            ArrayInitKind::Real => "real",
            ArrayInitKind::Cfloat => "cfloat",
            ArrayInitKind::Cdouble => "cdouble",
            ArrayInitKind::Creal => "creal",
            ArrayInitKind::Pointer => "pointer",
        }
    }

    pub fn routine(self) -> String {
        format!("_d_array_init_{}", self.suffix())
    }

    pub(crate) fn element_type<'ctx>(self, abi: &AbiTypes<'ctx>) -> BasicTypeEnum<'ctx> {
        match self {
            ArrayInitKind::I16 => abi.short,
            ArrayInitKind::I32 => abi.int,
            ArrayInitKind::I64 => abi.long,
            ArrayInitKind::Float => abi.float,
            ArrayInitKind::Double => abi.double,
            ArrayInitKind::Real => abi.real,
            ArrayInitKind::Cfloat => abi.complex(abi.float),
            ArrayInitKind::Cdouble => abi.complex(abi.double),
            ArrayInitKind::Creal => abi.complex(abi.real),
            ArrayInitKind::Pointer => abi.ptr,
        }
    }
}

/// Name of the routine behind a transcoding `foreach`.
pub(crate) fn apply_routine(transcode: Transcode, reverse: bool, with_index: bool) -> String {
    format!(
        "_aApply{}{}{}{}",
        if reverse { "R" } else { "" },
        transcode.source().letter(),
        transcode.decoded().letter(),
        if with_index { 2 } else { 1 }
    )
}

/// A construct whose lowering calls into the runtime library.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuntimeCall {
    Assert,
    AssertMessage,
    BoundsCheck,
    SwitchError,
    /// `new T` of a non-class type
    HeapAlloc,
    /// `new T[n]`, zero-filled element type
    NewArray,
    /// `new T[n]`, element type with a non-zero initializer
    NewArrayInit,
    /// `new T[n]` with `= void`
    NewArrayUninit,
    /// `new T[a][b]...`
    NewMultiArray,
    /// `arr.length = n` (may grow the array)
    SetLength,
    SetLengthInit,
    NewClass,
    DeleteArray,
    DeleteMemory,
    DeleteInterface,
    DeleteClass,
    Finalize,
    /// Fill an array with one value.
    ArrayFill(ArrayInitKind),
    /// Fill an array by repeating a byte pattern.
    ArrayFillBytes,
    /// `a[] = b[]` with bounds checking.
    SliceCopy,
    /// Reinterpret `T[]` as `U[]`.
    ArrayCast,
    ToObject,
    InterfaceCast,
    DynamicCast,
    ArrayDup,
    ArraySort,
    ArrayReverse,
    ArrayEquals,
    ArrayCompare,
    StringSort(CharWidth),
    StringReverse(CharWidth),
    StringCompare,
    AaIndex,
    AaContains,
    AaRemove,
    AaLength,
    AaKeys,
    AaValues,
    AaRehash,
    AaEquals,
    AaForeach,
    AaForeachKeyValue,
    /// `foreach` over a string, decoding between encodings.
    StringForeach {
        transcode: Transcode,
        reverse: bool,
        with_index: bool,
    },
    StringSwitch(CharWidth),
    Throw,
    /// `synchronized (obj)`
    MonitorEnter,
    MonitorExit,
    /// `synchronized` without an object
    CriticalEnter,
    CriticalExit,
    InvariantCheck,
}

impl RuntimeCall {
    /// The routine this construct lowers to.
    pub fn routine(self) -> String {
        let name = match self {
            RuntimeCall::Assert => "_d_assert",
            RuntimeCall::AssertMessage => "_d_assert_msg",
            RuntimeCall::BoundsCheck => "_d_array_bounds",
            RuntimeCall::SwitchError => "_d_switch_error",
            RuntimeCall::HeapAlloc => "_d_allocmemoryT",
            RuntimeCall::NewArray => "_d_newarrayT",
            RuntimeCall::NewArrayInit => "_d_newarrayiT",
            RuntimeCall::NewArrayUninit => "_d_newarrayvT",
            RuntimeCall::NewMultiArray => "_d_newarraymT",
            RuntimeCall::SetLength => "_d_arraysetlengthT",
            RuntimeCall::SetLengthInit => "_d_arraysetlengthiT",
            RuntimeCall::NewClass => "_d_allocclass",
            RuntimeCall::DeleteArray => "_d_delarray",
            RuntimeCall::DeleteMemory => "_d_delmemory",
            RuntimeCall::DeleteInterface => "_d_delinterface",
            RuntimeCall::DeleteClass => "_d_delclass",
            RuntimeCall::Finalize => "_d_callfinalizer",
            RuntimeCall::ArrayFill(kind) => return kind.routine(),
            RuntimeCall::ArrayFillBytes => "_d_array_init_mem",
            RuntimeCall::SliceCopy => "_d_array_slice_copy",
            RuntimeCall::ArrayCast => "_d_array_cast_len",
            RuntimeCall::ToObject => "_d_toObject",
            RuntimeCall::InterfaceCast => "_d_interface_cast",
            RuntimeCall::DynamicCast => "_d_dynamic_cast",
            RuntimeCall::ArrayDup => "_adDupT",
            RuntimeCall::ArraySort => "_adSort",
            RuntimeCall::ArrayReverse => "_adReverse",
            RuntimeCall::ArrayEquals => "_adEq",
            RuntimeCall::ArrayCompare => "_adCmp",
            RuntimeCall::StringSort(CharWidth::Narrow) => "_adSortChar",
            RuntimeCall::StringSort(CharWidth::Wide) => "_adSortWchar",
            RuntimeCall::StringReverse(CharWidth::Narrow) => "_adReverseChar",
            RuntimeCall::StringReverse(CharWidth::Wide) => "_adReverseWchar",
            // dchar strings sort and reverse element-wise
            RuntimeCall::StringSort(CharWidth::Full) => "_adSort",
            RuntimeCall::StringReverse(CharWidth::Full) => "_adReverse",
            RuntimeCall::StringCompare => "_adCmpChar",
            RuntimeCall::AaIndex => "_aaGet",
            RuntimeCall::AaContains => "_aaIn",
            RuntimeCall::AaRemove => "_aaDel",
            RuntimeCall::AaLength => "_aaLen",
            RuntimeCall::AaKeys => "_aaKeys",
            RuntimeCall::AaValues => "_aaValues",
            RuntimeCall::AaRehash => "_aaRehash",
            RuntimeCall::AaEquals => "_aaEq",
            RuntimeCall::AaForeach => "_aaApply",
            RuntimeCall::AaForeachKeyValue => "_aaApply2",
            RuntimeCall::StringForeach {
                transcode,
                reverse,
                with_index,
            } => return apply_routine(transcode, reverse, with_index),
            RuntimeCall::StringSwitch(width) => width.switch_routine(),
            RuntimeCall::Throw => "_d_throw_exception",
            RuntimeCall::MonitorEnter => "_d_monitorenter",
            RuntimeCall::MonitorExit => "_d_monitorexit",
            RuntimeCall::CriticalEnter => "_d_criticalenter",
            RuntimeCall::CriticalExit => "_d_criticalexit",
            RuntimeCall::InvariantCheck => "_d_invariant",
        };
        name.to_string()
    }

    /// The construct, as a user would name it.
    pub fn construct(self) -> &'static str {
        match self {
            RuntimeCall::Assert | RuntimeCall::AssertMessage => "assert",
            RuntimeCall::BoundsCheck => "array bounds check",
            RuntimeCall::SwitchError => "switch without a default case",
            RuntimeCall::HeapAlloc => "heap allocation",
            RuntimeCall::NewArray
            | RuntimeCall::NewArrayInit
            | RuntimeCall::NewArrayUninit
            | RuntimeCall::NewMultiArray => "array allocation",
            RuntimeCall::SetLength | RuntimeCall::SetLengthInit => "array length assignment",
            RuntimeCall::NewClass => "class instantiation",
            RuntimeCall::DeleteArray
            | RuntimeCall::DeleteMemory
            | RuntimeCall::DeleteInterface
            | RuntimeCall::DeleteClass => "delete expression",
            RuntimeCall::Finalize => "scope class destruction",
            RuntimeCall::ArrayFill(_) | RuntimeCall::ArrayFillBytes => "array fill",
            RuntimeCall::SliceCopy => "slice copy",
            RuntimeCall::ArrayCast => "array cast",
            RuntimeCall::ToObject | RuntimeCall::InterfaceCast | RuntimeCall::DynamicCast => {
                "class cast"
            }
            RuntimeCall::ArrayDup => "array .dup",
            RuntimeCall::ArraySort | RuntimeCall::StringSort(_) => "array .sort",
            RuntimeCall::ArrayReverse | RuntimeCall::StringReverse(_) => "array .reverse",
            RuntimeCall::ArrayEquals => "array equality",
            RuntimeCall::ArrayCompare | RuntimeCall::StringCompare => "array comparison",
            RuntimeCall::AaIndex => "associative array indexing",
            RuntimeCall::AaContains => "associative array `in`",
            RuntimeCall::AaRemove => "associative array .remove",
            RuntimeCall::AaLength => "associative array .length",
            RuntimeCall::AaKeys => "associative array .keys",
            RuntimeCall::AaValues => "associative array .values",
            RuntimeCall::AaRehash => "associative array .rehash",
            RuntimeCall::AaEquals => "associative array equality",
            RuntimeCall::AaForeach | RuntimeCall::AaForeachKeyValue => {
                "foreach over associative array"
            }
            RuntimeCall::StringForeach { .. } => "foreach over string",
            RuntimeCall::StringSwitch(_) => "switch on string",
            RuntimeCall::Throw => "throw statement",
            RuntimeCall::MonitorEnter
            | RuntimeCall::MonitorExit
            | RuntimeCall::CriticalEnter
            | RuntimeCall::CriticalExit => "synchronized statement",
            RuntimeCall::InvariantCheck => "class invariant check",
        }
    }
}
