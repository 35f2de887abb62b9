//! The `#~` tables stream: header, row counts, row sizes, and the parsed
//! rows the optimizer consumes.
//!
//! Tables are stored back to back in table-id order, so even tables this
//! crate ignores must have their row sizes computed to reach the ones it
//! reads. The sizes depend on the heap-size flags and on every table's row
//! count (simple and coded indices widen to 4 bytes past 64 K rows), which
//! is why the full column schema is spelled out here.

use crate::reader::Reader;
use crate::{Error, Result};

// Table identifiers (ECMA-335 II.22).
pub(crate) const TABLE_MODULE: u8 = 0x00;
pub(crate) const TABLE_TYPE_REF: u8 = 0x01;
pub(crate) const TABLE_TYPE_DEF: u8 = 0x02;
pub(crate) const TABLE_FIELD: u8 = 0x04;
pub(crate) const TABLE_METHOD_DEF: u8 = 0x06;
pub(crate) const TABLE_PARAM: u8 = 0x08;
pub(crate) const TABLE_MEMBER_REF: u8 = 0x0A;
pub(crate) const TABLE_STAND_ALONE_SIG: u8 = 0x11;
pub(crate) const TABLE_EVENT: u8 = 0x14;
pub(crate) const TABLE_PROPERTY: u8 = 0x17;
pub(crate) const TABLE_MODULE_REF: u8 = 0x1A;
pub(crate) const TABLE_TYPE_SPEC: u8 = 0x1B;
pub(crate) const TABLE_ASSEMBLY: u8 = 0x20;
pub(crate) const TABLE_ASSEMBLY_REF: u8 = 0x23;
pub(crate) const TABLE_FILE: u8 = 0x26;
pub(crate) const TABLE_EXPORTED_TYPE: u8 = 0x27;
pub(crate) const TABLE_MANIFEST_RESOURCE: u8 = 0x28;
pub(crate) const TABLE_NESTED_CLASS: u8 = 0x29;
pub(crate) const TABLE_GENERIC_PARAM: u8 = 0x2A;
pub(crate) const TABLE_METHOD_SPEC: u8 = 0x2B;
pub(crate) const TABLE_GENERIC_PARAM_CONSTRAINT: u8 = 0x2C;

const TABLE_COUNT: usize = 0x2D;

/// One column of a table row.
#[derive(Clone, Copy)]
enum Col {
    U16,
    U32,
    /// `#Strings` index.
    Str,
    /// `#GUID` index.
    Guid,
    /// `#Blob` index.
    Blob,
    /// Simple index into one table.
    Idx(u8),
    /// Tagged index into a table group.
    Coded(Coded),
}

/// Coded index groups (ECMA-335 II.24.2.6).
#[derive(Clone, Copy)]
enum Coded {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl Coded {
    /// Tables addressed by the group. `0xFF` marks unused tag slots.
    fn members(self) -> &'static [u8] {
        match self {
            Coded::TypeDefOrRef => &[TABLE_TYPE_DEF, TABLE_TYPE_REF, TABLE_TYPE_SPEC],
            Coded::HasConstant => &[TABLE_FIELD, TABLE_PARAM, TABLE_PROPERTY],
            Coded::HasCustomAttribute => &[
                TABLE_METHOD_DEF,
                TABLE_FIELD,
                TABLE_TYPE_REF,
                TABLE_TYPE_DEF,
                TABLE_PARAM,
                0x09, // InterfaceImpl
                TABLE_MEMBER_REF,
                TABLE_MODULE,
                0x0E, // DeclSecurity
                TABLE_PROPERTY,
                TABLE_EVENT,
                TABLE_STAND_ALONE_SIG,
                TABLE_MODULE_REF,
                TABLE_TYPE_SPEC,
                TABLE_ASSEMBLY,
                TABLE_ASSEMBLY_REF,
                TABLE_FILE,
                TABLE_EXPORTED_TYPE,
                TABLE_MANIFEST_RESOURCE,
                TABLE_GENERIC_PARAM,
                TABLE_GENERIC_PARAM_CONSTRAINT,
                TABLE_METHOD_SPEC,
            ],
            Coded::HasFieldMarshal => &[TABLE_FIELD, TABLE_PARAM],
            Coded::HasDeclSecurity => &[TABLE_TYPE_DEF, TABLE_METHOD_DEF, TABLE_ASSEMBLY],
            Coded::MemberRefParent => &[
                TABLE_TYPE_DEF,
                TABLE_TYPE_REF,
                TABLE_MODULE_REF,
                TABLE_METHOD_DEF,
                TABLE_TYPE_SPEC,
            ],
            Coded::HasSemantics => &[TABLE_EVENT, TABLE_PROPERTY],
            Coded::MethodDefOrRef => &[TABLE_METHOD_DEF, TABLE_MEMBER_REF],
            Coded::MemberForwarded => &[TABLE_FIELD, TABLE_METHOD_DEF],
            Coded::Implementation => &[TABLE_FILE, TABLE_ASSEMBLY_REF, TABLE_EXPORTED_TYPE],
            Coded::CustomAttributeType => &[0xFF, 0xFF, TABLE_METHOD_DEF, TABLE_MEMBER_REF, 0xFF],
            Coded::ResolutionScope => &[
                TABLE_MODULE,
                TABLE_MODULE_REF,
                TABLE_ASSEMBLY_REF,
                TABLE_TYPE_REF,
            ],
            Coded::TypeOrMethodDef => &[TABLE_TYPE_DEF, TABLE_METHOD_DEF],
        }
    }

    /// Number of tag bits.
    fn tag_bits(self) -> u32 {
        match self {
            Coded::HasFieldMarshal
            | Coded::HasSemantics
            | Coded::MethodDefOrRef
            | Coded::MemberForwarded
            | Coded::TypeOrMethodDef => 1,
            Coded::TypeDefOrRef
            | Coded::HasConstant
            | Coded::HasDeclSecurity
            | Coded::Implementation
            | Coded::ResolutionScope => 2,
            Coded::MemberRefParent | Coded::CustomAttributeType => 3,
            Coded::HasCustomAttribute => 5,
        }
    }
}

/// Column schema of every table, indexed by table id.
static SCHEMA: [&[Col]; TABLE_COUNT] = [
    &[Col::U16, Col::Str, Col::Guid, Col::Guid, Col::Guid], // 0x00 Module
    &[Col::Coded(Coded::ResolutionScope), Col::Str, Col::Str], // 0x01 TypeRef
    &[
        Col::U32,
        Col::Str,
        Col::Str,
        Col::Coded(Coded::TypeDefOrRef),
        Col::Idx(TABLE_FIELD),
        Col::Idx(TABLE_METHOD_DEF),
    ], // 0x02 TypeDef
    &[Col::Idx(TABLE_FIELD)],                               // 0x03 FieldPtr
    &[Col::U16, Col::Str, Col::Blob],                       // 0x04 Field
    &[Col::Idx(TABLE_METHOD_DEF)],                          // 0x05 MethodPtr
    &[
        Col::U32,
        Col::U16,
        Col::U16,
        Col::Str,
        Col::Blob,
        Col::Idx(TABLE_PARAM),
    ], // 0x06 MethodDef
    &[Col::Idx(TABLE_PARAM)],                               // 0x07 ParamPtr
    &[Col::U16, Col::U16, Col::Str],                        // 0x08 Param
    &[Col::Idx(TABLE_TYPE_DEF), Col::Coded(Coded::TypeDefOrRef)], // 0x09 InterfaceImpl
    &[Col::Coded(Coded::MemberRefParent), Col::Str, Col::Blob], // 0x0A MemberRef
    &[Col::U16, Col::Coded(Coded::HasConstant), Col::Blob], // 0x0B Constant
    &[
        Col::Coded(Coded::HasCustomAttribute),
        Col::Coded(Coded::CustomAttributeType),
        Col::Blob,
    ], // 0x0C CustomAttribute
    &[Col::Coded(Coded::HasFieldMarshal), Col::Blob],       // 0x0D FieldMarshal
    &[Col::U16, Col::Coded(Coded::HasDeclSecurity), Col::Blob], // 0x0E DeclSecurity
    &[Col::U16, Col::U32, Col::Idx(TABLE_TYPE_DEF)],        // 0x0F ClassLayout
    &[Col::U32, Col::Idx(TABLE_FIELD)],                     // 0x10 FieldLayout
    &[Col::Blob],                                           // 0x11 StandAloneSig
    &[Col::Idx(TABLE_TYPE_DEF), Col::Idx(TABLE_EVENT)],     // 0x12 EventMap
    &[Col::Idx(TABLE_EVENT)],                               // 0x13 EventPtr
    &[Col::U16, Col::Str, Col::Coded(Coded::TypeDefOrRef)], // 0x14 Event
    &[Col::Idx(TABLE_TYPE_DEF), Col::Idx(TABLE_PROPERTY)],  // 0x15 PropertyMap
    &[Col::Idx(TABLE_PROPERTY)],                            // 0x16 PropertyPtr
    &[Col::U16, Col::Str, Col::Blob],                       // 0x17 Property
    &[
        Col::U16,
        Col::Idx(TABLE_METHOD_DEF),
        Col::Coded(Coded::HasSemantics),
    ], // 0x18 MethodSemantics
    &[
        Col::Idx(TABLE_TYPE_DEF),
        Col::Coded(Coded::MethodDefOrRef),
        Col::Coded(Coded::MethodDefOrRef),
    ], // 0x19 MethodImpl
    &[Col::Str],                                            // 0x1A ModuleRef
    &[Col::Blob],                                           // 0x1B TypeSpec
    &[
        Col::U16,
        Col::Coded(Coded::MemberForwarded),
        Col::Str,
        Col::Idx(TABLE_MODULE_REF),
    ], // 0x1C ImplMap
    &[Col::U32, Col::Idx(TABLE_FIELD)],                     // 0x1D FieldRVA
    &[Col::U32, Col::U32],                                  // 0x1E ENCLog
    &[Col::U32],                                            // 0x1F ENCMap
    &[
        Col::U32,
        Col::U16,
        Col::U16,
        Col::U16,
        Col::U16,
        Col::U32,
        Col::Blob,
        Col::Str,
        Col::Str,
    ], // 0x20 Assembly
    &[Col::U32],                                            // 0x21 AssemblyProcessor
    &[Col::U32, Col::U32, Col::U32],                        // 0x22 AssemblyOS
    &[
        Col::U16,
        Col::U16,
        Col::U16,
        Col::U16,
        Col::U32,
        Col::Blob,
        Col::Str,
        Col::Str,
        Col::Blob,
    ], // 0x23 AssemblyRef
    &[Col::U32, Col::Idx(TABLE_ASSEMBLY_REF)],              // 0x24 AssemblyRefProcessor
    &[
        Col::U32,
        Col::U32,
        Col::U32,
        Col::Idx(TABLE_ASSEMBLY_REF),
    ], // 0x25 AssemblyRefOS
    &[Col::U32, Col::Str, Col::Blob],                       // 0x26 File
    &[
        Col::U32,
        Col::U32,
        Col::Str,
        Col::Str,
        Col::Coded(Coded::Implementation),
    ], // 0x27 ExportedType
    &[
        Col::U32,
        Col::U32,
        Col::Str,
        Col::Coded(Coded::Implementation),
    ], // 0x28 ManifestResource
    &[Col::Idx(TABLE_TYPE_DEF), Col::Idx(TABLE_TYPE_DEF)],  // 0x29 NestedClass
    &[
        Col::U16,
        Col::U16,
        Col::Coded(Coded::TypeOrMethodDef),
        Col::Str,
    ], // 0x2A GenericParam
    &[Col::Coded(Coded::MethodDefOrRef), Col::Blob],        // 0x2B MethodSpec
    &[
        Col::Idx(TABLE_GENERIC_PARAM),
        Col::Coded(Coded::TypeDefOrRef),
    ], // 0x2C GenericParamConstraint
];

/// TypeDef row fields the loader consumes.
#[derive(Debug, Clone, Copy)]
pub struct TypeDefRow {
    pub(crate) name: u32,
    pub(crate) namespace: u32,
    /// Raw TypeDefOrRef coded index.
    pub(crate) extends: u32,
    /// 1-based start of the type's Field rows.
    pub(crate) field_list: u32,
    /// 1-based start of the type's MethodDef rows.
    pub(crate) method_list: u32,
}

/// MethodDef row fields the loader consumes.
#[derive(Debug, Clone, Copy)]
pub struct MethodDefRow {
    pub(crate) rva: u32,
    pub(crate) name: u32,
    pub(crate) signature: u32,
    /// 1-based start of the method's Param rows.
    pub(crate) param_list: u32,
}

/// Field row fields the loader consumes.
#[derive(Debug, Clone, Copy)]
pub struct FieldRow {
    pub(crate) flags: u16,
    pub(crate) signature: u32,
}

/// Param row fields the loader consumes.
#[derive(Debug, Clone, Copy)]
pub struct ParamRow {
    pub(crate) flags: u16,
    /// 1-based parameter position; 0 names the return value.
    pub(crate) sequence: u16,
}

/// MemberRef row fields the loader consumes.
#[derive(Debug, Clone, Copy)]
pub struct MemberRefRow {
    pub(crate) name: u32,
    pub(crate) signature: u32,
}

/// TypeRef row fields the loader consumes.
#[derive(Debug, Clone, Copy)]
pub struct TypeRefRow {
    pub(crate) name: u32,
    pub(crate) namespace: u32,
}

/// MethodSpec row fields the loader consumes.
#[derive(Debug, Clone, Copy)]
pub struct MethodSpecRow {
    /// Raw MethodDefOrRef coded index.
    pub(crate) method: u32,
}

/// The parsed tables stream.
pub struct TablesStream {
    pub(crate) module_name: u32,
    pub(crate) type_refs: Vec<TypeRefRow>,
    pub(crate) type_defs: Vec<TypeDefRow>,
    pub(crate) fields: Vec<FieldRow>,
    pub(crate) methods: Vec<MethodDefRow>,
    pub(crate) params: Vec<ParamRow>,
    pub(crate) member_refs: Vec<MemberRefRow>,
    pub(crate) standalone_sigs: Vec<u32>,
    pub(crate) type_specs: Vec<u32>,
    pub(crate) method_specs: Vec<MethodSpecRow>,
    pub(crate) nested_classes: Vec<(u32, u32)>,
    pub(crate) event_count: usize,
    pub(crate) property_count: usize,
}

struct Layout {
    heap_sizes: u8,
    row_counts: [u32; 64],
}

impl Layout {
    fn index_bytes(&self, table: u8) -> usize {
        if self.row_counts[table as usize] > 0xFFFF {
            4
        } else {
            2
        }
    }

    fn coded_bytes(&self, coded: Coded) -> usize {
        let max_rows = coded
            .members()
            .iter()
            .filter(|&&table| table != 0xFF)
            .map(|&table| self.row_counts[table as usize])
            .max()
            .unwrap_or(0);
        if max_rows >= 1 << (16 - coded.tag_bits()) {
            4
        } else {
            2
        }
    }

    fn col_bytes(&self, col: Col) -> usize {
        match col {
            Col::U16 => 2,
            Col::U32 => 4,
            Col::Str => {
                if self.heap_sizes & 0x01 != 0 {
                    4
                } else {
                    2
                }
            }
            Col::Guid => {
                if self.heap_sizes & 0x02 != 0 {
                    4
                } else {
                    2
                }
            }
            Col::Blob => {
                if self.heap_sizes & 0x04 != 0 {
                    4
                } else {
                    2
                }
            }
            Col::Idx(table) => self.index_bytes(table),
            Col::Coded(coded) => self.coded_bytes(coded),
        }
    }

    fn row_bytes(&self, table: u8) -> usize {
        SCHEMA[table as usize]
            .iter()
            .map(|&col| self.col_bytes(col))
            .sum()
    }
}

/// Reads one column value; every column fits a `u32`.
fn read_col(reader: &mut Reader<'_>, layout: &Layout, col: Col) -> Result<u32> {
    match layout.col_bytes(col) {
        2 => Ok(u32::from(reader.read_le::<u16>()?)),
        _ => reader.read_le::<u32>(),
    }
}

impl TablesStream {
    /// Parses the `#~` stream.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Malformed`] on truncated data or a table id
    /// outside the known schema.
    pub fn parse(data: &[u8]) -> Result<TablesStream> {
        let mut reader = Reader::new(data);
        reader.seek(4)?; // reserved
        let _major = reader.read_le::<u8>()?;
        let _minor = reader.read_le::<u8>()?;
        let heap_sizes = reader.read_le::<u8>()?;
        let _reserved = reader.read_le::<u8>()?;
        let valid = reader.read_le::<u64>()?;
        let _sorted = reader.read_le::<u64>()?;

        let mut layout = Layout {
            heap_sizes,
            row_counts: [0; 64],
        };
        for table in 0..64 {
            if valid & (1 << table) != 0 {
                layout.row_counts[table] = reader.read_le::<u32>()?;
            }
        }

        let mut stream = TablesStream {
            module_name: 0,
            type_refs: Vec::new(),
            type_defs: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            params: Vec::new(),
            member_refs: Vec::new(),
            standalone_sigs: Vec::new(),
            type_specs: Vec::new(),
            method_specs: Vec::new(),
            nested_classes: Vec::new(),
            event_count: layout.row_counts[TABLE_EVENT as usize] as usize,
            property_count: layout.row_counts[TABLE_PROPERTY as usize] as usize,
        };

        for table in 0..64u8 {
            let rows = layout.row_counts[table as usize];
            if rows == 0 {
                continue;
            }
            if usize::from(table) >= TABLE_COUNT {
                return Err(Error::Malformed(format!(
                    "unknown metadata table 0x{table:02X}"
                )));
            }
            match table {
                TABLE_MODULE => {
                    for row in 0..rows {
                        let _generation = read_col(&mut reader, &layout, Col::U16)?;
                        let name = read_col(&mut reader, &layout, Col::Str)?;
                        let _mvid = read_col(&mut reader, &layout, Col::Guid)?;
                        let _enc_id = read_col(&mut reader, &layout, Col::Guid)?;
                        let _enc_base = read_col(&mut reader, &layout, Col::Guid)?;
                        if row == 0 {
                            stream.module_name = name;
                        }
                    }
                }
                TABLE_TYPE_REF => {
                    for _ in 0..rows {
                        let _scope =
                            read_col(&mut reader, &layout, Col::Coded(Coded::ResolutionScope))?;
                        let name = read_col(&mut reader, &layout, Col::Str)?;
                        let namespace = read_col(&mut reader, &layout, Col::Str)?;
                        stream.type_refs.push(TypeRefRow { name, namespace });
                    }
                }
                TABLE_TYPE_DEF => {
                    for _ in 0..rows {
                        let _flags = read_col(&mut reader, &layout, Col::U32)?;
                        let name = read_col(&mut reader, &layout, Col::Str)?;
                        let namespace = read_col(&mut reader, &layout, Col::Str)?;
                        let extends =
                            read_col(&mut reader, &layout, Col::Coded(Coded::TypeDefOrRef))?;
                        let field_list = read_col(&mut reader, &layout, Col::Idx(TABLE_FIELD))?;
                        let method_list =
                            read_col(&mut reader, &layout, Col::Idx(TABLE_METHOD_DEF))?;
                        stream.type_defs.push(TypeDefRow {
                            name,
                            namespace,
                            extends,
                            field_list,
                            method_list,
                        });
                    }
                }
                TABLE_FIELD => {
                    for _ in 0..rows {
                        let flags = read_col(&mut reader, &layout, Col::U16)? as u16;
                        let _name = read_col(&mut reader, &layout, Col::Str)?;
                        let signature = read_col(&mut reader, &layout, Col::Blob)?;
                        stream.fields.push(FieldRow { flags, signature });
                    }
                }
                TABLE_METHOD_DEF => {
                    for _ in 0..rows {
                        let rva = read_col(&mut reader, &layout, Col::U32)?;
                        let _impl_flags = read_col(&mut reader, &layout, Col::U16)?;
                        let _flags = read_col(&mut reader, &layout, Col::U16)?;
                        let name = read_col(&mut reader, &layout, Col::Str)?;
                        let signature = read_col(&mut reader, &layout, Col::Blob)?;
                        let param_list = read_col(&mut reader, &layout, Col::Idx(TABLE_PARAM))?;
                        stream.methods.push(MethodDefRow {
                            rva,
                            name,
                            signature,
                            param_list,
                        });
                    }
                }
                TABLE_PARAM => {
                    for _ in 0..rows {
                        let flags = read_col(&mut reader, &layout, Col::U16)? as u16;
                        let sequence = read_col(&mut reader, &layout, Col::U16)? as u16;
                        let _name = read_col(&mut reader, &layout, Col::Str)?;
                        stream.params.push(ParamRow { flags, sequence });
                    }
                }
                TABLE_MEMBER_REF => {
                    for _ in 0..rows {
                        let _class =
                            read_col(&mut reader, &layout, Col::Coded(Coded::MemberRefParent))?;
                        let name = read_col(&mut reader, &layout, Col::Str)?;
                        let signature = read_col(&mut reader, &layout, Col::Blob)?;
                        stream.member_refs.push(MemberRefRow { name, signature });
                    }
                }
                TABLE_STAND_ALONE_SIG => {
                    for _ in 0..rows {
                        stream
                            .standalone_sigs
                            .push(read_col(&mut reader, &layout, Col::Blob)?);
                    }
                }
                TABLE_TYPE_SPEC => {
                    for _ in 0..rows {
                        stream
                            .type_specs
                            .push(read_col(&mut reader, &layout, Col::Blob)?);
                    }
                }
                TABLE_NESTED_CLASS => {
                    for _ in 0..rows {
                        let nested = read_col(&mut reader, &layout, Col::Idx(TABLE_TYPE_DEF))?;
                        let enclosing = read_col(&mut reader, &layout, Col::Idx(TABLE_TYPE_DEF))?;
                        stream.nested_classes.push((nested, enclosing));
                    }
                }
                TABLE_METHOD_SPEC => {
                    for _ in 0..rows {
                        let method =
                            read_col(&mut reader, &layout, Col::Coded(Coded::MethodDefOrRef))?;
                        let _instantiation = read_col(&mut reader, &layout, Col::Blob)?;
                        stream.method_specs.push(MethodSpecRow { method });
                    }
                }
                _ => {
                    // A table the optimizer ignores: skip its rows whole.
                    let bytes = layout.row_bytes(table) * rows as usize;
                    reader.read_bytes(bytes)?;
                }
            }
        }

        Ok(stream)
    }
}
