//! The lowered type system: machine types, layout, and the per-module type
//! table.
//!
//! Every source type lowers to one of four machine scalars for its value
//! representation; aggregates and pointers are `i32` addresses into linear
//! memory, but keep their source shape (fields, element types, signatures)
//! so that member access can be reconstructed later. Types live in an arena
//! and are referred to by [`TypeId`]; id equality is the identity that the
//! signature table interns by.
//!
//! Structs are inserted into the table *incomplete* before their fields are
//! walked, so a struct holding a pointer to itself terminates.

use crate::compiler::compiler_errors::{CompileError, ErrorLocation};
use crate::compiler::parsers::ast_nodes::{Expr, TypeDecl, TypeExpr};
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::wast_codegen::signatures::{SigId, SignatureTable};
use crate::{return_layout_error, return_unsupported_error};
use rustc_hash::FxHashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineType {
    I32,
    I64,
    F32,
    F64,
}

impl MachineType {
    pub fn name(&self) -> &'static str {
        match self {
            MachineType::I32 => "i32",
            MachineType::I64 => "i64",
            MachineType::F32 => "f32",
            MachineType::F64 => "f64",
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLength {
    Fixed(u32),
    /// `[...]T` - fixed by the first composite literal.
    Ellipsis,
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub offset: u32,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Scalar {
        machine: MachineType,
        signed: bool,
        float: bool,
    },
    Pointer {
        base: TypeId,
    },
    Array {
        length: ArrayLength,
        elem: TypeId,
    },
    Struct {
        fields: Vec<StructField>,
    },
    Func {
        sig: SigId,
    },
}

#[derive(Debug, Clone)]
pub struct TypeEntry {
    /// Source-level name, used only in comments ("[3]int8", "*Point").
    pub name: String,
    /// Byte size for memory layout. Small integers keep their 1/2 byte size
    /// here even though their machine type is `i32`.
    pub size: u32,
    pub align: u32,
    pub kind: TypeKind,
}

#[derive(Debug, Default)]
pub struct TypeArena {
    entries: Vec<TypeEntry>,
    by_name: FxHashMap<String, TypeId>,
    pointer_cache: FxHashMap<TypeId, TypeId>,
    func_type_cache: FxHashMap<SigId, TypeId>,
}

impl TypeArena {
    pub fn new() -> TypeArena {
        TypeArena::default()
    }

    fn push(&mut self, entry: TypeEntry) -> TypeId {
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(entry);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeEntry {
        &self.entries[id.0 as usize]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.get(id).name
    }

    pub fn size(&self, id: TypeId) -> u32 {
        self.get(id).size
    }

    pub fn align(&self, id: TypeId) -> u32 {
        self.get(id).align
    }

    pub fn machine_type(&self, id: TypeId) -> MachineType {
        match &self.get(id).kind {
            TypeKind::Scalar { machine, .. } => *machine,
            TypeKind::Pointer { .. }
            | TypeKind::Array { .. }
            | TypeKind::Struct { .. }
            | TypeKind::Func { .. } => MachineType::I32,
        }
    }

    pub fn is_signed(&self, id: TypeId) -> bool {
        match &self.get(id).kind {
            TypeKind::Scalar { signed, .. } => *signed,
            _ => false,
        }
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        match &self.get(id).kind {
            TypeKind::Scalar { float, .. } => *float,
            _ => false,
        }
    }

    pub fn named(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// `(length, element type)` if `id` is an array type.
    pub fn array_info(&self, id: TypeId) -> Option<(ArrayLength, TypeId)> {
        match self.get(id).kind {
            TypeKind::Array { length, elem } => Some((length, elem)),
            _ => None,
        }
    }

    pub fn pointer_base(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id).kind {
            TypeKind::Pointer { base } => Some(base),
            _ => None,
        }
    }

    pub fn func_sig(&self, id: TypeId) -> Option<SigId> {
        match self.get(id).kind {
            TypeKind::Func { sig } => Some(sig),
            _ => None,
        }
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Pointer { .. })
    }

    pub fn is_func(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Func { .. })
    }

    /// Look up a struct field by name, if `id` is a struct type.
    pub fn struct_field(&self, id: TypeId, name: &str) -> Option<StructField> {
        match &self.get(id).kind {
            TypeKind::Struct { fields } => fields.iter().find(|f| f.name == name).cloned(),
            _ => None,
        }
    }

    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Struct { .. })
    }

    /// Whether `name` is one of the fixed scalar names (without registering
    /// anything). Used to decide if a call head is a type conversion.
    pub fn is_scalar_name(name: &str) -> bool {
        scalar_layout(name).is_some()
    }

    /// Look up a scalar type by source name, registering it in the module
    /// type table on first use. Unknown names are a hard error.
    pub fn scalar(
        &mut self,
        name: &str,
        location: TextLocation,
    ) -> Result<TypeId, CompileError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        let (machine, size, signed, float) = match scalar_layout(name) {
            Some(layout) => layout,
            None => {
                return_layout_error!(
                    ErrorLocation::from_span(&location),
                    "unimplemented scalar type: '{}'",
                    name
                );
            }
        };
        let id = self.push(TypeEntry {
            name: name.to_string(),
            size,
            align: size,
            kind: TypeKind::Scalar {
                machine,
                signed,
                float,
            },
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Pointer types are canonicalised by the identity of their base.
    pub fn pointer_to(&mut self, base: TypeId) -> TypeId {
        if let Some(id) = self.pointer_cache.get(&base) {
            return *id;
        }
        let name = format!("*{}", self.name(base));
        let id = self.push(TypeEntry {
            name,
            size: 4,
            align: 4,
            kind: TypeKind::Pointer { base },
        });
        self.pointer_cache.insert(base, id);
        id
    }

    /// Array handles are addresses: size and alignment 4. Each syntactic
    /// array type gets its own entry so an ellipsis length can be resolved
    /// on the one literal that fixes it.
    pub fn array_of(&mut self, length: ArrayLength, elem: TypeId) -> TypeId {
        let name = match length {
            ArrayLength::Fixed(n) => format!("[{}]{}", n, self.name(elem)),
            ArrayLength::Ellipsis => format!("[...]{}", self.name(elem)),
        };
        self.push(TypeEntry {
            name,
            size: 4,
            align: 4,
            kind: TypeKind::Array { length, elem },
        })
    }

    pub fn set_array_length(&mut self, id: TypeId, n: u32) {
        if let TypeKind::Array { length, .. } = &mut self.entries[id.0 as usize].kind {
            *length = ArrayLength::Fixed(n);
        }
    }

    /// One interned `Func` entry per signature, so function-pointer values
    /// of the same shape share a type identity.
    pub fn func_type_for_sig(&mut self, sig: SigId, sigs: &SignatureTable) -> TypeId {
        if let Some(id) = self.func_type_cache.get(&sig) {
            return *id;
        }
        let name = format!("func {}", sigs.get(sig).wasm_name);
        let id = self.push(TypeEntry {
            name,
            size: 4,
            align: 4,
            kind: TypeKind::Func { sig },
        });
        self.func_type_cache.insert(sig, id);
        id
    }

    fn declare_struct_incomplete(&mut self, name: &str) -> TypeId {
        let id = self.push(TypeEntry {
            name: name.to_string(),
            size: 0,
            align: 8, // conservative
            kind: TypeKind::Struct { fields: Vec::new() },
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn complete_struct(&mut self, id: TypeId, fields: Vec<StructField>, size: u32) {
        let entry = &mut self.entries[id.0 as usize];
        entry.size = size;
        entry.kind = TypeKind::Struct { fields };
    }
}

/// The fixed scalar mapping: `(machine, byte size, signed, float)`.
/// 1- and 2-byte integers still use `i32` as their machine type.
fn scalar_layout(name: &str) -> Option<(MachineType, u32, bool, bool)> {
    let layout = match name {
        "int8" => (MachineType::I32, 1, true, false),
        "byte" | "uint8" => (MachineType::I32, 1, false, false),
        "int16" => (MachineType::I32, 2, true, false),
        "uint16" => (MachineType::I32, 2, false, false),
        "int32" => (MachineType::I32, 4, true, false),
        "int" | "uint32" | "uintptr" | "unsafe.Pointer" => (MachineType::I32, 4, false, false),
        "int64" => (MachineType::I64, 8, true, false),
        "uint64" => (MachineType::I64, 8, false, false),
        "float32" => (MachineType::F32, 4, true, true),
        "float64" => (MachineType::F64, 8, true, true),
        _ => return None,
    };
    Some(layout)
}

/// Lower a syntactic type to a [`TypeId`], registering named scalars on
/// first use.
pub fn lower_type_expr(
    arena: &mut TypeArena,
    sigs: &mut SignatureTable,
    expr: &TypeExpr,
) -> Result<TypeId, CompileError> {
    match expr {
        TypeExpr::Name { name, location } => {
            if let Some(id) = arena.named(name) {
                return Ok(id);
            }
            arena.scalar(name, *location)
        }
        TypeExpr::Qualified {
            package,
            name,
            location,
        } => {
            if package == "unsafe" && name == "Pointer" {
                return arena.scalar("unsafe.Pointer", *location);
            }
            return_layout_error!(
                ErrorLocation::from_span(location),
                "unsupported qualified type: {}.{}",
                package,
                name
            )
        }
        TypeExpr::Pointer { base, .. } => {
            let base = lower_type_expr(arena, sigs, base)
                .map_err(|e| e.with_context("error in a pointer type"))?;
            Ok(arena.pointer_to(base))
        }
        TypeExpr::Array {
            length,
            elem,
            location,
        } => {
            let elem = lower_type_expr(arena, sigs, elem)
                .map_err(|e| e.with_context("error in an array type"))?;
            let length = match length {
                None => ArrayLength::Ellipsis,
                Some(expr) => ArrayLength::Fixed(eval_const_length(expr, *location)?),
            };
            Ok(arena.array_of(length, elem))
        }
        TypeExpr::Func {
            params,
            results,
            location,
        } => {
            let sig = lower_func_type_expr(arena, sigs, params, results, *location)?;
            Ok(arena.func_type_for_sig(sig, sigs))
        }
        TypeExpr::Struct { location, .. } => {
            return_layout_error!(
                ErrorLocation::from_span(location),
                "anonymous struct types are not supported"
            )
        }
    }
}

/// Lower a function type into an interned signature.
pub fn lower_func_type_expr(
    arena: &mut TypeArena,
    sigs: &mut SignatureTable,
    params: &[TypeExpr],
    results: &[TypeExpr],
    location: TextLocation,
) -> Result<SigId, CompileError> {
    let mut param_ids = Vec::with_capacity(params.len());
    for param in params {
        param_ids.push(lower_type_expr(arena, sigs, param)?);
    }
    if results.len() > 1 {
        return_unsupported_error!(
            ErrorLocation::from_span(&location),
            "functions returning {} values are not implemented",
            results.len()
        );
    }
    let result = match results.first() {
        Some(result) => Some(lower_type_expr(arena, sigs, result)?),
        None => None,
    };
    Ok(sigs.add(param_ids, result))
}

/// Register a `type` declaration: struct or function type. The struct entry
/// goes into the table before its fields are walked so recursive references
/// through a pointer resolve.
pub fn declare_named_type(
    arena: &mut TypeArena,
    sigs: &mut SignatureTable,
    decl: &TypeDecl,
) -> Result<TypeId, CompileError> {
    if let Some(id) = arena.named(&decl.name) {
        return Ok(id);
    }
    match &decl.ty {
        TypeExpr::Func {
            params,
            results,
            location,
        } => {
            let sig = lower_func_type_expr(arena, sigs, params, results, *location)?;
            sigs.set_source_name(sig, &decl.name);
            let id = arena.push(TypeEntry {
                name: decl.name.clone(),
                size: 4,
                align: 4,
                kind: TypeKind::Func { sig },
            });
            arena.by_name.insert(decl.name.clone(), id);
            Ok(id)
        }
        TypeExpr::Struct { fields, location } => {
            if fields.is_empty() {
                return_layout_error!(
                    ErrorLocation::from_span(location),
                    "struct types with no fields are not supported (struct {})",
                    decl.name
                );
            }
            let id = arena.declare_struct_incomplete(&decl.name);
            let mut lowered = Vec::with_capacity(fields.len());
            let mut offset = 0u32;
            for field in fields {
                let ty = lower_type_expr(arena, sigs, &field.ty).map_err(|e| {
                    e.with_context(format!("error parsing type of field {}", field.name))
                })?;
                lowered.push(StructField {
                    name: field.name.clone(),
                    offset,
                    ty,
                });
                offset += arena.size(ty); // TODO: take alignment into account
            }
            arena.complete_struct(id, lowered, offset);
            Ok(id)
        }
        other => {
            return_layout_error!(
                ErrorLocation::from_span(&other.location()),
                "unsupported type declaration for '{}'",
                decl.name
            )
        }
    }
}

/// Constant array lengths: integer literals (decimal or hex) and quoted
/// ASCII character literals.
pub fn eval_const_length(expr: &Expr, location: TextLocation) -> Result<u32, CompileError> {
    match expr {
        Expr::IntLit { text, location } => {
            let parsed = if let Some(hex) = text.strip_prefix("0x").or(text.strip_prefix("0X")) {
                u32::from_str_radix(hex, 16)
            } else {
                text.parse::<u32>()
            };
            match parsed {
                Ok(n) => Ok(n),
                Err(_) => {
                    return_layout_error!(
                        ErrorLocation::from_span(location),
                        "error parsing an integer constant: '{}'",
                        text
                    )
                }
            }
        }
        Expr::CharLit { value, .. } => Ok(*value as u32),
        _ => {
            return_layout_error!(
                ErrorLocation::from_span(&location),
                "unsupported constant expression for an array length"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parsers::ast_nodes::FieldDecl;

    fn name_expr(name: &str) -> TypeExpr {
        TypeExpr::Name {
            name: name.to_string(),
            location: TextLocation::default(),
        }
    }

    #[test]
    fn scalar_mapping_is_fixed() {
        let mut arena = TypeArena::new();
        let loc = TextLocation::default();

        let byte = arena.scalar("byte", loc).unwrap();
        assert_eq!(arena.machine_type(byte), MachineType::I32);
        assert_eq!(arena.size(byte), 1);
        assert!(!arena.is_signed(byte));

        let int64 = arena.scalar("int64", loc).unwrap();
        assert_eq!(arena.machine_type(int64), MachineType::I64);
        assert_eq!(arena.size(int64), 8);
        assert!(arena.is_signed(int64));

        let f32 = arena.scalar("float32", loc).unwrap();
        assert_eq!(arena.machine_type(f32), MachineType::F32);
        assert!(arena.is_float(f32));

        let uintptr = arena.scalar("uintptr", loc).unwrap();
        assert_eq!(arena.machine_type(uintptr), MachineType::I32);
        assert!(!arena.is_signed(uintptr));

        assert!(arena.scalar("string", loc).is_err());
    }

    #[test]
    fn scalars_are_registered_once() {
        let mut arena = TypeArena::new();
        let loc = TextLocation::default();
        let a = arena.scalar("int32", loc).unwrap();
        let b = arena.scalar("int32", loc).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pointers_are_canonical_by_base() {
        let mut arena = TypeArena::new();
        let loc = TextLocation::default();
        let int32 = arena.scalar("int32", loc).unwrap();
        let p1 = arena.pointer_to(int32);
        let p2 = arena.pointer_to(int32);
        assert_eq!(p1, p2);
        assert_eq!(arena.size(p1), 4);
        assert_eq!(arena.align(p1), 4);
        assert_eq!(arena.name(p1), "*int32");
    }

    #[test]
    fn struct_offsets_are_dense() {
        let mut arena = TypeArena::new();
        let mut sigs = SignatureTable::new();
        let decl = TypeDecl {
            name: "Mixed".to_string(),
            ty: TypeExpr::Struct {
                fields: vec![
                    FieldDecl {
                        name: "a".to_string(),
                        ty: name_expr("int8"),
                        location: TextLocation::default(),
                    },
                    FieldDecl {
                        name: "b".to_string(),
                        ty: name_expr("int32"),
                        location: TextLocation::default(),
                    },
                    FieldDecl {
                        name: "c".to_string(),
                        ty: name_expr("int16"),
                        location: TextLocation::default(),
                    },
                ],
                location: TextLocation::default(),
            },
            location: TextLocation::default(),
        };
        let id = declare_named_type(&mut arena, &mut sigs, &decl).unwrap();
        match &arena.get(id).kind {
            TypeKind::Struct { fields } => {
                assert_eq!(fields[0].offset, 0);
                assert_eq!(fields[1].offset, 1);
                assert_eq!(fields[2].offset, 5);
            }
            _ => unreachable!(),
        }
        assert_eq!(arena.size(id), 7);
        assert_eq!(arena.align(id), 8);
    }

    #[test]
    fn recursive_struct_through_pointer_terminates() {
        let mut arena = TypeArena::new();
        let mut sigs = SignatureTable::new();
        let decl = TypeDecl {
            name: "Node".to_string(),
            ty: TypeExpr::Struct {
                fields: vec![
                    FieldDecl {
                        name: "value".to_string(),
                        ty: name_expr("int32"),
                        location: TextLocation::default(),
                    },
                    FieldDecl {
                        name: "next".to_string(),
                        ty: TypeExpr::Pointer {
                            base: Box::new(name_expr("Node")),
                            location: TextLocation::default(),
                        },
                        location: TextLocation::default(),
                    },
                ],
                location: TextLocation::default(),
            },
            location: TextLocation::default(),
        };
        let id = declare_named_type(&mut arena, &mut sigs, &decl).unwrap();
        assert_eq!(arena.size(id), 8);
        match &arena.get(id).kind {
            TypeKind::Struct { fields } => match arena.get(fields[1].ty).kind {
                TypeKind::Pointer { base } => assert_eq!(base, id),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn zero_field_structs_are_rejected() {
        let mut arena = TypeArena::new();
        let mut sigs = SignatureTable::new();
        let decl = TypeDecl {
            name: "Empty".to_string(),
            ty: TypeExpr::Struct {
                fields: Vec::new(),
                location: TextLocation::default(),
            },
            location: TextLocation::default(),
        };
        assert!(declare_named_type(&mut arena, &mut sigs, &decl).is_err());
    }

    #[test]
    fn array_length_from_char_literal() {
        let expr = Expr::CharLit {
            value: 'A',
            location: TextLocation::default(),
        };
        assert_eq!(eval_const_length(&expr, TextLocation::default()).unwrap(), 65);
    }

    #[test]
    fn ellipsis_array_length_resolves_once() {
        let mut arena = TypeArena::new();
        let loc = TextLocation::default();
        let int8 = arena.scalar("int8", loc).unwrap();
        let arr = arena.array_of(ArrayLength::Ellipsis, int8);
        arena.set_array_length(arr, 3);
        match arena.get(arr).kind {
            TypeKind::Array { length, .. } => assert_eq!(length, ArrayLength::Fixed(3)),
            _ => unreachable!(),
        }
        // The handle itself stays a 4-byte address
        assert_eq!(arena.size(arr), 4);
    }
}
