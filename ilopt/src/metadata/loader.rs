//! Assembles the in-memory [`Module`] from a PE image.
//!
//! The loader walks the metadata tables once, classifies type shapes (for
//! enum underlying types), decodes every method body, and resolves the
//! instruction operands the analyses inspect — call targets, field types,
//! and type tokens — into shared references. Tokens the analyses ignore
//! stay opaque.

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::il::{decode_stream, CilType, Family, MethodBody, MethodSig, Operand, ParamSig};
use crate::metadata::body::BodyHeader;
use crate::metadata::module::{MethodDef, Module, TypeDef};
use crate::metadata::pe::PeImage;
use crate::metadata::signatures::{
    is_field_sig, parse_field_sig, parse_locals_sig, parse_method_sig, parse_type_spec,
    ClassResolver, TypeResolver,
};
use crate::metadata::streams::MetadataRoot;
use crate::metadata::tables::{
    TablesStream, TABLE_FIELD, TABLE_MEMBER_REF, TABLE_METHOD_DEF, TABLE_METHOD_SPEC,
    TABLE_STAND_ALONE_SIG, TABLE_TYPE_DEF, TABLE_TYPE_REF, TABLE_TYPE_SPEC,
};
use crate::{Error, Result};

/// Param table flag: the parameter carries the `[out]` contract.
const PARAM_OUT: u16 = 0x0002;
/// Field table flag: the field is static.
const FIELD_STATIC: u16 = 0x0010;

/// Reads a .NET module image into the driver's object model.
///
/// # Errors
///
/// Fails with [`Error::Pe`] / [`Error::Malformed`] when the container or
/// its metadata cannot be parsed. Per-method decode failures are not fatal:
/// the method is loaded bodyless with its failure recorded, so the driver
/// counts it as failed instead of aborting the module.
pub fn read_module(data: &[u8]) -> Result<Module> {
    let image = PeImage::parse(data)?;
    let root = MetadataRoot::parse(image.metadata()?)?;
    let tables = TablesStream::parse(root.tables)?;
    Loader {
        image,
        root,
        tables,
    }
    .load()
}

/// Shapes of the module's type definitions, resolved up front so that
/// signature parsing can size enums correctly.
struct TypeShapes {
    shapes: Vec<CilType>,
}

impl TypeResolver for TypeShapes {
    fn resolve(&self, coded: u32) -> CilType {
        // TypeDefOrRef in signatures: tag 0 TypeDef, 1 TypeRef, 2 TypeSpec.
        let row = (coded >> 2) as usize;
        match coded & 0x3 {
            0 => self
                .shapes
                .get(row.wrapping_sub(1))
                .cloned()
                .unwrap_or(CilType::Class),
            // External references cannot be resolved without loading the
            // target assembly; their value types size as plain structs.
            _ => CilType::Class,
        }
    }
}

struct Loader<'d> {
    image: PeImage<'d>,
    root: MetadataRoot<'d>,
    tables: TablesStream,
}

impl Loader<'_> {
    fn load(self) -> Result<Module> {
        let shapes = self.classify_types()?;
        let mut resolver = OperandResolver {
            loader: &self,
            shapes: &shapes,
            method_sigs: FxHashMap::default(),
            field_types: FxHashMap::default(),
            type_tokens: FxHashMap::default(),
        };

        let method_count = self.tables.methods.len();
        let mut methods = Vec::with_capacity(method_count);
        for index in 0..method_count {
            methods.push(self.load_method(index, &mut resolver)?);
        }

        let mut module = Module {
            name: self.root.strings.get(self.tables.module_name)?.to_string(),
            types: Vec::with_capacity(self.tables.type_defs.len()),
            event_count: self.tables.event_count,
            property_count: self.tables.property_count,
        };

        // Methods belong to the type whose [method_list, next method_list)
        // range contains them.
        let mut methods = methods.into_iter().map(Some).collect::<Vec<_>>();
        for (index, row) in self.tables.type_defs.iter().enumerate() {
            let start = row.method_list.saturating_sub(1) as usize;
            let end = self
                .tables
                .type_defs
                .get(index + 1)
                .map_or(method_count, |next| {
                    next.method_list.saturating_sub(1) as usize
                });
            let mut type_def = TypeDef {
                namespace: self.root.strings.get(row.namespace)?.to_string(),
                name: self.root.strings.get(row.name)?.to_string(),
                nested: Vec::new(),
                enclosing: None,
                methods: Vec::new(),
            };
            for method in methods
                .iter_mut()
                .take(end.min(method_count))
                .skip(start.min(method_count))
            {
                if let Some(method) = method.take() {
                    type_def.methods.push(method);
                }
            }
            module.types.push(type_def);
        }

        for &(nested, enclosing) in &self.tables.nested_classes {
            let nested = nested.saturating_sub(1) as usize;
            let enclosing = enclosing.saturating_sub(1) as usize;
            if nested < module.types.len() && enclosing < module.types.len() {
                module.types[nested].enclosing = Some(enclosing);
                module.types[enclosing].nested.push(nested);
            }
        }

        Ok(module)
    }

    /// Pass one: classify each TypeDef as class, struct, or enum (with its
    /// underlying field type).
    fn classify_types(&self) -> Result<TypeShapes> {
        let mut shapes = Vec::with_capacity(self.tables.type_defs.len());
        for (index, row) in self.tables.type_defs.iter().enumerate() {
            let shape = match self.extends_name(row.extends)? {
                Some(("System", "Enum")) => {
                    let underlying = self
                        .enum_underlying(index)
                        .unwrap_or(CilType::I4);
                    CilType::ValueType {
                        underlying: Some(Box::new(underlying)),
                    }
                }
                Some(("System", "ValueType")) => CilType::ValueType { underlying: None },
                _ => CilType::Class,
            };
            shapes.push(shape);
        }
        Ok(TypeShapes { shapes })
    }

    /// Namespace and name of a TypeDefOrRef coded index, when it points at
    /// a TypeRef (the base types that matter here always do).
    fn extends_name(&self, coded: u32) -> Result<Option<(&str, &str)>> {
        if coded & 0x3 != 1 {
            return Ok(None);
        }
        let Some(row) = self.tables.type_refs.get((coded >> 2).wrapping_sub(1) as usize) else {
            return Ok(None);
        };
        Ok(Some((
            self.root.strings.get(row.namespace)?,
            self.root.strings.get(row.name)?,
        )))
    }

    /// The type of an enum's single instance field.
    fn enum_underlying(&self, type_index: usize) -> Option<CilType> {
        let row = self.tables.type_defs.get(type_index)?;
        let start = row.field_list.checked_sub(1)? as usize;
        let end = self
            .tables
            .type_defs
            .get(type_index + 1)
            .map_or(self.tables.fields.len(), |next| {
                next.field_list.saturating_sub(1) as usize
            });
        for field in self.tables.fields.get(start..end.min(self.tables.fields.len()))? {
            if field.flags & FIELD_STATIC != 0 {
                continue;
            }
            let blob = self.root.blobs.get(field.signature).ok()?;
            return parse_field_sig(blob, &ClassResolver).ok();
        }
        None
    }

    fn load_method(
        &self,
        index: usize,
        resolver: &mut OperandResolver<'_, '_>,
    ) -> Result<MethodDef> {
        let row = self.tables.methods[index];
        let name = self.root.strings.get(row.name)?.to_string();
        let mut method = MethodDef {
            name,
            body: None,
            header_offset: None,
            fat_header: false,
            load_failed: false,
        };
        if row.rva == 0 {
            return Ok(method);
        }

        match self.load_body(index, resolver) {
            Ok((body, offset, fat)) => {
                method.body = Some(body);
                method.header_offset = Some(offset);
                method.fat_header = fat;
            }
            Err(error) if error.is_method_local() || matches!(error, Error::Malformed(_)) => {
                debug!("{}: body not loaded: {error}", method.name);
                method.load_failed = true;
            }
            Err(error) => return Err(error),
        }
        Ok(method)
    }

    fn load_body(
        &self,
        index: usize,
        resolver: &mut OperandResolver<'_, '_>,
    ) -> Result<(MethodBody, usize, bool)> {
        let row = self.tables.methods[index];
        let offset = self.image.rva_to_offset(row.rva)?;
        let data = self.image.data();
        let header = BodyHeader::parse(
            data.get(offset..)
                .ok_or_else(|| Error::Malformed("method body past end of image".into()))?,
        )?;
        let code = &data[offset..][header.code_range()];
        let mut instructions = decode_stream(code)?;

        let locals = if header.local_var_sig_token != 0 {
            let blob_index = self
                .standalone_sig(header.local_var_sig_token)
                .ok_or_else(|| {
                    Error::Malformed(format!(
                        "bad locals token 0x{:08X}",
                        header.local_var_sig_token
                    ))
                })?;
            parse_locals_sig(self.root.blobs.get(blob_index)?, resolver.shapes)?
        } else {
            Vec::new()
        };

        let sig = resolver.method_def_sig(index)?;
        for instruction in &mut instructions {
            resolver.resolve_operand(instruction)?;
        }

        let mut body = MethodBody::new(
            instructions,
            locals,
            sig.params.clone(),
            sig.has_this,
        );
        body.init_locals = header.init_locals;
        body.max_stack = header.max_stack;
        Ok((body, offset, header.is_fat))
    }

    fn standalone_sig(&self, token: u32) -> Option<u32> {
        if (token >> 24) as u8 != TABLE_STAND_ALONE_SIG {
            return None;
        }
        let row = (token & 0x00FF_FFFF).checked_sub(1)? as usize;
        self.tables.standalone_sigs.get(row).copied()
    }
}

/// Caches resolved call-target signatures, field types, and type tokens.
struct OperandResolver<'l, 'd> {
    loader: &'l Loader<'d>,
    shapes: &'l TypeShapes,
    method_sigs: FxHashMap<u32, Arc<MethodSig>>,
    field_types: FxHashMap<u32, Arc<CilType>>,
    type_tokens: FxHashMap<u32, Arc<CilType>>,
}

impl OperandResolver<'_, '_> {
    /// Replaces the raw token operand of call, field, and type
    /// instructions with the resolved reference.
    fn resolve_operand(&mut self, instruction: &mut crate::il::Instruction) -> Result<()> {
        let Operand::Token(token) = instruction.operand else {
            return Ok(());
        };
        match instruction.family {
            Family::Call | Family::Callvirt | Family::Newobj | Family::Jmp => {
                if let Some(sig) = self.call_target(token.value())? {
                    instruction.operand = Operand::Method(sig);
                }
            }
            Family::Ldfld
            | Family::Ldflda
            | Family::Stfld
            | Family::Ldsfld
            | Family::Ldsflda
            | Family::Stsfld => {
                if let Some(ty) = self.field_type(token.value())? {
                    instruction.operand = Operand::Field(ty);
                }
            }
            Family::Initobj
            | Family::Ldelem
            | Family::Ldelema
            | Family::Stelem
            | Family::Box
            | Family::Unbox
            | Family::Castclass
            | Family::Isinst
            | Family::Newarr
            | Family::Sizeof
            | Family::Constrained => {
                if let Some(ty) = self.type_token(token.value()) {
                    instruction.operand = Operand::Type(ty);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn method_def_sig(&mut self, index: usize) -> Result<Arc<MethodSig>> {
        let token = (u32::from(TABLE_METHOD_DEF) << 24) | (index as u32 + 1);
        if let Some(sig) = self.method_sigs.get(&token) {
            return Ok(sig.clone());
        }
        let row = self.loader.tables.methods[index];
        let name = self.loader.root.strings.get(row.name)?;
        let raw = parse_method_sig(self.loader.root.blobs.get(row.signature)?, self.shapes)?;

        // Param rows attach the out flags by 1-based sequence number.
        let mut params: Vec<ParamSig> = raw.params;
        let start = row.param_list.saturating_sub(1) as usize;
        let end = self
            .loader
            .tables
            .methods
            .get(index + 1)
            .map_or(self.loader.tables.params.len(), |next| {
                next.param_list.saturating_sub(1) as usize
            });
        if let Some(rows) = self.loader.tables.params.get(start..end.min(self.loader.tables.params.len())) {
            for param in rows {
                if param.flags & PARAM_OUT != 0 && param.sequence > 0 {
                    if let Some(slot) = params.get_mut(usize::from(param.sequence) - 1) {
                        slot.is_out = true;
                    }
                }
            }
        }

        let sig = Arc::new(MethodSig {
            has_this: raw.has_this,
            explicit_this: raw.explicit_this,
            is_ctor: name == ".ctor",
            params,
            return_type: raw.return_type,
        });
        self.method_sigs.insert(token, sig.clone());
        Ok(sig)
    }

    /// Resolves a call-site token to a callee signature; `None` when the
    /// token names something a call cannot (left opaque, the simulator
    /// reports the method as failed if it ever needs it).
    fn call_target(&mut self, token: u32) -> Result<Option<Arc<MethodSig>>> {
        if let Some(sig) = self.method_sigs.get(&token) {
            return Ok(Some(sig.clone()));
        }
        let table = (token >> 24) as u8;
        let row = (token & 0x00FF_FFFF).wrapping_sub(1) as usize;
        let sig = match table {
            TABLE_METHOD_DEF => {
                if row >= self.loader.tables.methods.len() {
                    return Ok(None);
                }
                return self.method_def_sig(row).map(Some);
            }
            TABLE_MEMBER_REF => {
                let Some(member) = self.loader.tables.member_refs.get(row) else {
                    return Ok(None);
                };
                let blob = self.loader.root.blobs.get(member.signature)?;
                if is_field_sig(blob) {
                    return Ok(None);
                }
                let name = self.loader.root.strings.get(member.name)?;
                let raw = parse_method_sig(blob, self.shapes)?;
                // MemberRef parameters have no Param rows, so no out flags:
                // by-ref parameters of external methods never prove
                // assignment.
                Arc::new(MethodSig {
                    has_this: raw.has_this,
                    explicit_this: raw.explicit_this,
                    is_ctor: name == ".ctor",
                    params: raw.params,
                    return_type: raw.return_type,
                })
            }
            TABLE_METHOD_SPEC => {
                let Some(spec) = self.loader.tables.method_specs.get(row) else {
                    return Ok(None);
                };
                // MethodDefOrRef coded index: tag 0 MethodDef, 1 MemberRef.
                let target = if spec.method & 0x1 == 0 {
                    (u32::from(TABLE_METHOD_DEF) << 24) | (spec.method >> 1)
                } else {
                    (u32::from(TABLE_MEMBER_REF) << 24) | (spec.method >> 1)
                };
                return self.call_target(target);
            }
            _ => return Ok(None),
        };
        self.method_sigs.insert(token, sig.clone());
        Ok(Some(sig))
    }

    fn field_type(&mut self, token: u32) -> Result<Option<Arc<CilType>>> {
        if let Some(ty) = self.field_types.get(&token) {
            return Ok(Some(ty.clone()));
        }
        let table = (token >> 24) as u8;
        let row = (token & 0x00FF_FFFF).wrapping_sub(1) as usize;
        let blob_index = match table {
            TABLE_FIELD => match self.loader.tables.fields.get(row) {
                Some(field) => field.signature,
                None => return Ok(None),
            },
            TABLE_MEMBER_REF => match self.loader.tables.member_refs.get(row) {
                Some(member) => member.signature,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        let blob = self.loader.root.blobs.get(blob_index)?;
        if !is_field_sig(blob) {
            return Ok(None);
        }
        let ty = Arc::new(parse_field_sig(blob, self.shapes)?);
        self.field_types.insert(token, ty.clone());
        Ok(Some(ty))
    }

    fn type_token(&mut self, token: u32) -> Option<Arc<CilType>> {
        if let Some(ty) = self.type_tokens.get(&token) {
            return Some(ty.clone());
        }
        let table = (token >> 24) as u8;
        let row = (token & 0x00FF_FFFF).wrapping_sub(1) as usize;
        let ty = match table {
            TABLE_TYPE_DEF => self.shapes.shapes.get(row).cloned()?,
            TABLE_TYPE_REF => CilType::Class,
            TABLE_TYPE_SPEC => {
                let blob_index = *self.loader.tables.type_specs.get(row)?;
                let blob = self.loader.root.blobs.get(blob_index).ok()?;
                parse_type_spec(blob, self.shapes).ok()?
            }
            _ => return None,
        };
        let ty = Arc::new(ty);
        self.type_tokens.insert(token, ty.clone());
        Some(ty)
    }
}
