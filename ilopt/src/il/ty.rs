//! Type shapes reduced to what evaluation-stack slot sizing requires.
//!
//! The abstract stack simulator tracks slot widths only, so this model keeps
//! just enough structure to answer "4 or 8 bytes?": primitives, the
//! pointer-like shapes, enums with their underlying field type, and custom
//! modifiers wrapping an element type. It is not a type system.

use crate::{Error, Result};

/// Width of one abstract evaluation-stack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotWidth {
    /// A 4-byte slot: everything that is not an 8-byte integer or double.
    Four,
    /// An 8-byte slot: `int64`, `uint64`, `float64`.
    Eight,
}

impl SlotWidth {
    /// The width in bytes.
    #[must_use]
    pub fn bytes(self) -> u32 {
        match self {
            SlotWidth::Four => 4,
            SlotWidth::Eight => 8,
        }
    }
}

/// A CIL type, reduced to the shapes that influence slot sizing.
#[derive(Debug, Clone, PartialEq)]
pub enum CilType {
    /// `void`; has no stack representation.
    Void,
    /// `bool`.
    Bool,
    /// `char` (UTF-16 code unit).
    Char,
    /// `int8`.
    I1,
    /// `uint8`.
    U1,
    /// `int16`.
    I2,
    /// `uint16`.
    U2,
    /// `int32`.
    I4,
    /// `uint32`.
    U4,
    /// `int64`.
    I8,
    /// `uint64`.
    U8,
    /// `float32`.
    R4,
    /// `float64`.
    R8,
    /// `native int` (`IntPtr`).
    I,
    /// `native uint` (`UIntPtr`).
    U,
    /// `object`.
    Object,
    /// `string`.
    String,
    /// A reference type other than the built-ins.
    Class,
    /// A single- or multi-dimensional array; the element type is kept for
    /// the `ldelem`/`stelem` accessors.
    Array(Box<CilType>),
    /// An unmanaged pointer.
    Pointer(Box<CilType>),
    /// A managed pointer (`&`), as produced by `ldloca` or a by-ref
    /// parameter.
    ByRef(Box<CilType>),
    /// A function pointer.
    FnPtr,
    /// A value type. `underlying` is `Some` for enums and names the type of
    /// the enum's instance field; `None` is a plain struct.
    ValueType {
        /// Underlying field type when this value type is an enum.
        underlying: Option<Box<CilType>>,
    },
    /// A generic type parameter (`!n`).
    GenericVar(u32),
    /// A generic method parameter (`!!n`).
    GenericMethodVar(u32),
    /// An instantiated generic type (`List<int32>`).
    GenericInst {
        /// Whether the open type is a value type.
        value_type: bool,
    },
    /// A pinned local.
    Pinned(Box<CilType>),
    /// A `modreq`/`modopt` wrapper around an element type.
    Modified(Box<CilType>),
    /// `typedref` (`System.TypedReference`); not representable as a slot.
    TypedByRef,
    /// Vararg sentinel marker; not representable as a slot.
    Sentinel,
}

impl CilType {
    /// The evaluation-stack slot width of a value of this type.
    ///
    /// Everything pointer-shaped, every small integer, `float32`, generic
    /// variables, and plain value types occupy one 4-byte slot; the 8-byte
    /// integers and `float64` occupy an 8-byte slot. Enums size as their
    /// underlying field type; modifiers size as their element type.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnsizedType`] for `void`, `typedref` and the
    /// vararg sentinel, which have no evaluation-stack representation.
    pub fn slot_width(&self) -> Result<SlotWidth> {
        match self {
            CilType::Bool
            | CilType::Char
            | CilType::I1
            | CilType::U1
            | CilType::I2
            | CilType::U2
            | CilType::I4
            | CilType::U4
            | CilType::R4
            | CilType::I
            | CilType::U
            | CilType::Object
            | CilType::String
            | CilType::Class
            | CilType::Array(_)
            | CilType::Pointer(_)
            | CilType::ByRef(_)
            | CilType::FnPtr
            | CilType::GenericVar(_)
            | CilType::GenericMethodVar(_)
            | CilType::GenericInst { .. }
            | CilType::Pinned(_)
            | CilType::ValueType { underlying: None } => Ok(SlotWidth::Four),
            CilType::I8 | CilType::U8 | CilType::R8 => Ok(SlotWidth::Eight),
            CilType::ValueType {
                underlying: Some(underlying),
            } => underlying.slot_width(),
            CilType::Modified(element) => element.slot_width(),
            CilType::Void => Err(Error::UnsizedType("void")),
            CilType::TypedByRef => Err(Error::UnsizedType("typedref")),
            CilType::Sentinel => Err(Error::UnsizedType("sentinel")),
        }
    }

    /// Strips `modreq`/`modopt` and pinned wrappers.
    #[must_use]
    pub fn unwrapped(&self) -> &CilType {
        match self {
            CilType::Modified(element) | CilType::Pinned(element) => element.unwrapped(),
            other => other,
        }
    }

    /// Whether this is a by-ref shape after unwrapping modifiers.
    #[must_use]
    pub fn is_by_ref(&self) -> bool {
        matches!(self.unwrapped(), CilType::ByRef(_))
    }
}
