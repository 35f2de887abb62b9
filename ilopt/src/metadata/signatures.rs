//! Blob signature parsing (ECMA-335 II.23.2) into the crate's type model.
//!
//! Only the shapes that influence stack slot sizing are materialized;
//! generic arguments, array bounds, and function-pointer details are parsed
//! for position but discarded.

use crate::il::{CilType, ParamSig};
use crate::metadata::streams::read_compressed_u32;
use crate::reader::Reader;
use crate::{Error, Result};

// ELEMENT_TYPE_* constants (II.23.1.16).
const ELEMENT_VOID: u8 = 0x01;
const ELEMENT_BOOLEAN: u8 = 0x02;
const ELEMENT_CHAR: u8 = 0x03;
const ELEMENT_I1: u8 = 0x04;
const ELEMENT_U1: u8 = 0x05;
const ELEMENT_I2: u8 = 0x06;
const ELEMENT_U2: u8 = 0x07;
const ELEMENT_I4: u8 = 0x08;
const ELEMENT_U4: u8 = 0x09;
const ELEMENT_I8: u8 = 0x0A;
const ELEMENT_U8: u8 = 0x0B;
const ELEMENT_R4: u8 = 0x0C;
const ELEMENT_R8: u8 = 0x0D;
const ELEMENT_STRING: u8 = 0x0E;
const ELEMENT_PTR: u8 = 0x0F;
const ELEMENT_BYREF: u8 = 0x10;
const ELEMENT_VALUETYPE: u8 = 0x11;
const ELEMENT_CLASS: u8 = 0x12;
const ELEMENT_VAR: u8 = 0x13;
const ELEMENT_ARRAY: u8 = 0x14;
const ELEMENT_GENERICINST: u8 = 0x15;
const ELEMENT_TYPEDBYREF: u8 = 0x16;
const ELEMENT_I: u8 = 0x18;
const ELEMENT_U: u8 = 0x19;
const ELEMENT_FNPTR: u8 = 0x1B;
const ELEMENT_OBJECT: u8 = 0x1C;
const ELEMENT_SZARRAY: u8 = 0x1D;
const ELEMENT_MVAR: u8 = 0x1E;
const ELEMENT_CMOD_REQD: u8 = 0x1F;
const ELEMENT_CMOD_OPT: u8 = 0x20;
const ELEMENT_SENTINEL: u8 = 0x41;
const ELEMENT_PINNED: u8 = 0x45;

// Calling convention byte.
const SIG_HAS_THIS: u8 = 0x20;
const SIG_EXPLICIT_THIS: u8 = 0x40;
const SIG_GENERIC: u8 = 0x10;
const SIG_CONV_MASK: u8 = 0x0F;
const SIG_FIELD: u8 = 0x06;
const SIG_LOCALS: u8 = 0x07;

/// Nesting guard for pathological signatures.
const MAX_TYPE_DEPTH: usize = 64;

/// Resolves the TypeDefOrRef coded tokens that appear inside signatures.
pub trait TypeResolver {
    /// The shape of the named type: `ValueType` (with enum underlying when
    /// known) or `Class`.
    fn resolve(&self, coded: u32) -> CilType;
}

/// Resolver mapping every token to a plain class; used while the loader
/// bootstraps the real type shapes.
pub struct ClassResolver;

impl TypeResolver for ClassResolver {
    fn resolve(&self, _coded: u32) -> CilType {
        CilType::Class
    }
}

/// A parsed callable signature, before `out` flags are applied.
#[derive(Debug)]
pub struct RawMethodSig {
    /// `HASTHIS`.
    pub has_this: bool,
    /// `EXPLICITTHIS`.
    pub explicit_this: bool,
    /// Declared parameter types.
    pub params: Vec<ParamSig>,
    /// Declared return type.
    pub return_type: CilType,
}

/// Parses a MethodDefSig / MethodRefSig blob.
///
/// # Errors
///
/// Fails with [`Error::Malformed`] on truncated or malformed signatures.
pub fn parse_method_sig(blob: &[u8], resolver: &dyn TypeResolver) -> Result<RawMethodSig> {
    let mut reader = Reader::new(blob);
    let convention = reader.read_le::<u8>()?;
    if convention & SIG_CONV_MASK == SIG_FIELD {
        return Err(Error::Malformed(
            "field signature where a method signature was expected".into(),
        ));
    }
    if convention & SIG_GENERIC != 0 {
        let _generic_count = read_compressed_u32(&mut reader)?;
    }
    let param_count = read_compressed_u32(&mut reader)?;
    let return_type = parse_type(&mut reader, resolver, 0)?;
    let mut params = Vec::with_capacity(param_count as usize);
    for _ in 0..param_count {
        // A vararg call site separates fixed and variable parameters with a
        // sentinel that is not itself counted.
        if reader.peek_u8() == Some(ELEMENT_SENTINEL) {
            reader.read_le::<u8>()?;
        }
        params.push(ParamSig::plain(parse_type(&mut reader, resolver, 0)?));
    }
    Ok(RawMethodSig {
        has_this: convention & SIG_HAS_THIS != 0,
        explicit_this: convention & SIG_EXPLICIT_THIS != 0,
        params,
        return_type,
    })
}

/// Parses a LocalVarSig blob into the declared local types.
///
/// # Errors
///
/// Fails with [`Error::Malformed`] when the blob is not a locals signature.
pub fn parse_locals_sig(blob: &[u8], resolver: &dyn TypeResolver) -> Result<Vec<CilType>> {
    let mut reader = Reader::new(blob);
    if reader.read_le::<u8>()? != SIG_LOCALS {
        return Err(Error::Malformed("not a locals signature".into()));
    }
    let count = read_compressed_u32(&mut reader)?;
    let mut locals = Vec::with_capacity(count as usize);
    for _ in 0..count {
        locals.push(parse_type(&mut reader, resolver, 0)?);
    }
    Ok(locals)
}

/// Parses a FieldSig blob into the field's declared type.
///
/// # Errors
///
/// Fails with [`Error::Malformed`] when the blob is not a field signature.
pub fn parse_field_sig(blob: &[u8], resolver: &dyn TypeResolver) -> Result<CilType> {
    let mut reader = Reader::new(blob);
    if reader.read_le::<u8>()? & SIG_CONV_MASK != SIG_FIELD {
        return Err(Error::Malformed("not a field signature".into()));
    }
    parse_type(&mut reader, resolver, 0)
}

/// Parses a TypeSpec blob.
///
/// # Errors
///
/// Fails with [`Error::Malformed`] on truncated or malformed signatures.
pub fn parse_type_spec(blob: &[u8], resolver: &dyn TypeResolver) -> Result<CilType> {
    let mut reader = Reader::new(blob);
    parse_type(&mut reader, resolver, 0)
}

/// Whether a blob holds a field signature (MemberRefs name both fields and
/// methods; the leading byte disambiguates).
#[must_use]
pub fn is_field_sig(blob: &[u8]) -> bool {
    blob.first()
        .is_some_and(|&first| first & SIG_CONV_MASK == SIG_FIELD && first & SIG_HAS_THIS == 0)
}

fn parse_type(
    reader: &mut Reader<'_>,
    resolver: &dyn TypeResolver,
    depth: usize,
) -> Result<CilType> {
    if depth > MAX_TYPE_DEPTH {
        return Err(Error::Malformed("signature nesting too deep".into()));
    }
    let element = reader.read_le::<u8>()?;
    Ok(match element {
        ELEMENT_VOID => CilType::Void,
        ELEMENT_BOOLEAN => CilType::Bool,
        ELEMENT_CHAR => CilType::Char,
        ELEMENT_I1 => CilType::I1,
        ELEMENT_U1 => CilType::U1,
        ELEMENT_I2 => CilType::I2,
        ELEMENT_U2 => CilType::U2,
        ELEMENT_I4 => CilType::I4,
        ELEMENT_U4 => CilType::U4,
        ELEMENT_I8 => CilType::I8,
        ELEMENT_U8 => CilType::U8,
        ELEMENT_R4 => CilType::R4,
        ELEMENT_R8 => CilType::R8,
        ELEMENT_STRING => CilType::String,
        ELEMENT_OBJECT => CilType::Object,
        ELEMENT_I => CilType::I,
        ELEMENT_U => CilType::U,
        ELEMENT_TYPEDBYREF => CilType::TypedByRef,
        ELEMENT_SENTINEL => CilType::Sentinel,
        ELEMENT_PTR => CilType::Pointer(Box::new(parse_type(reader, resolver, depth + 1)?)),
        ELEMENT_BYREF => CilType::ByRef(Box::new(parse_type(reader, resolver, depth + 1)?)),
        ELEMENT_PINNED => CilType::Pinned(Box::new(parse_type(reader, resolver, depth + 1)?)),
        ELEMENT_CMOD_REQD | ELEMENT_CMOD_OPT => {
            let _modifier = read_compressed_u32(reader)?;
            CilType::Modified(Box::new(parse_type(reader, resolver, depth + 1)?))
        }
        ELEMENT_VALUETYPE => {
            let coded = read_compressed_u32(reader)?;
            match resolver.resolve(coded) {
                // The resolver decides between enum and plain value type.
                ty @ CilType::ValueType { .. } => ty,
                _ => CilType::ValueType { underlying: None },
            }
        }
        ELEMENT_CLASS => {
            let _coded = read_compressed_u32(reader)?;
            CilType::Class
        }
        ELEMENT_VAR => CilType::GenericVar(read_compressed_u32(reader)?),
        ELEMENT_MVAR => CilType::GenericMethodVar(read_compressed_u32(reader)?),
        ELEMENT_SZARRAY => CilType::Array(Box::new(parse_type(reader, resolver, depth + 1)?)),
        ELEMENT_ARRAY => {
            let element = parse_type(reader, resolver, depth + 1)?;
            let _rank = read_compressed_u32(reader)?;
            let size_count = read_compressed_u32(reader)?;
            for _ in 0..size_count {
                let _size = read_compressed_u32(reader)?;
            }
            let bound_count = read_compressed_u32(reader)?;
            for _ in 0..bound_count {
                let _bound = read_compressed_u32(reader)?;
            }
            CilType::Array(Box::new(element))
        }
        ELEMENT_GENERICINST => {
            let kind = reader.read_le::<u8>()?;
            let _coded = read_compressed_u32(reader)?;
            let argument_count = read_compressed_u32(reader)?;
            for _ in 0..argument_count {
                let _argument = parse_type(reader, resolver, depth + 1)?;
            }
            CilType::GenericInst {
                value_type: kind == ELEMENT_VALUETYPE,
            }
        }
        ELEMENT_FNPTR => {
            // An embedded method signature; its shape does not matter here,
            // but the bytes must be consumed.
            let convention = reader.read_le::<u8>()?;
            if convention & SIG_GENERIC != 0 {
                let _generic_count = read_compressed_u32(reader)?;
            }
            let param_count = read_compressed_u32(reader)?;
            let _return_type = parse_type(reader, resolver, depth + 1)?;
            for _ in 0..param_count {
                let _param = parse_type(reader, resolver, depth + 1)?;
            }
            CilType::FnPtr
        }
        other => {
            return Err(Error::Malformed(format!(
                "unknown element type 0x{other:02X} in signature"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_static_signature() {
        // default, 2 params, void(int32, int64)
        let blob = [0x00, 0x02, ELEMENT_VOID, ELEMENT_I4, ELEMENT_I8];
        let sig = parse_method_sig(&blob, &ClassResolver).unwrap();
        assert!(!sig.has_this);
        assert_eq!(sig.return_type, CilType::Void);
        assert_eq!(sig.params.len(), 2);
        assert_eq!(sig.params[0].ty, CilType::I4);
        assert_eq!(sig.params[1].ty, CilType::I8);
    }

    #[test]
    fn parses_an_instance_signature_with_byref() {
        // hasthis, 1 param, void(int32&)
        let blob = [SIG_HAS_THIS, 0x01, ELEMENT_VOID, ELEMENT_BYREF, ELEMENT_I4];
        let sig = parse_method_sig(&blob, &ClassResolver).unwrap();
        assert!(sig.has_this);
        assert!(sig.params[0].ty.is_by_ref());
    }

    #[test]
    fn parses_locals_with_pinned_and_modifiers() {
        // LOCAL_SIG, 3 locals: int32, pinned string, modreq(token) int64
        let blob = [
            SIG_LOCALS,
            0x03,
            ELEMENT_I4,
            ELEMENT_PINNED,
            ELEMENT_STRING,
            ELEMENT_CMOD_REQD,
            0x11, // compressed coded token
            ELEMENT_I8,
        ];
        let locals = parse_locals_sig(&blob, &ClassResolver).unwrap();
        assert_eq!(locals.len(), 3);
        assert_eq!(locals[0], CilType::I4);
        assert_eq!(locals[1], CilType::Pinned(Box::new(CilType::String)));
        assert_eq!(locals[2], CilType::Modified(Box::new(CilType::I8)));
    }

    #[test]
    fn parses_generic_instantiations_positionally() {
        // default, 1 param: List<int32> -> GENERICINST CLASS token 1 I4
        let blob = [
            0x00,
            0x01,
            ELEMENT_VOID,
            ELEMENT_GENERICINST,
            ELEMENT_CLASS,
            0x05,
            0x01,
            ELEMENT_I4,
        ];
        let sig = parse_method_sig(&blob, &ClassResolver).unwrap();
        assert_eq!(sig.params[0].ty, CilType::GenericInst { value_type: false });
    }

    #[test]
    fn field_signature_detection() {
        assert!(is_field_sig(&[0x06, ELEMENT_I4]));
        assert!(!is_field_sig(&[0x00, 0x00, ELEMENT_VOID]));
        assert!(!is_field_sig(&[SIG_HAS_THIS, 0x00, ELEMENT_VOID]));
    }

    #[test]
    fn field_sig_parses_its_type() {
        let ty = parse_field_sig(&[0x06, ELEMENT_R8], &ClassResolver).unwrap();
        assert_eq!(ty, CilType::R8);
    }

    #[test]
    fn rejects_wrong_signature_kinds() {
        assert!(parse_locals_sig(&[0x06, ELEMENT_I4], &ClassResolver).is_err());
        assert!(parse_method_sig(&[0x06, ELEMENT_I4], &ClassResolver).is_err());
        assert!(parse_field_sig(&[0x07, 0x00], &ClassResolver).is_err());
    }

    #[test]
    fn rejects_unknown_elements_and_truncation() {
        assert!(parse_field_sig(&[0x06, 0x17], &ClassResolver).is_err());
        assert!(parse_method_sig(&[0x00, 0x01, ELEMENT_VOID], &ClassResolver).is_err());
    }
}
