//! Expression lowering: one resolved AST expression in, one output
//! expression tree out.
//!
//! Lowering carries an optional *type hint* inherited from context; untyped
//! integer and character literals take the hint, or default to `int32`.
//! L-values are handled explicitly as `(address expression, element type)`
//! pairs - assignment stores through them, reads load through them.

use crate::compiler::compiler_errors::{CompileError, ErrorLocation};
use crate::compiler::parsers::ast_nodes::{BinOpToken, Expr, Ident, TypeExpr, UnaryOp};
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::wast_codegen::functions::FuncId;
use crate::compiler::wast_codegen::imports::{parse_import_signature, runtime_import, WastImport};
use crate::compiler::wast_codegen::linker::{LinkedFile, Module};
use crate::compiler::wast_codegen::types::{lower_type_expr, MachineType, TypeId};
use crate::compiler::wast_codegen::vars::{VarId, VarKind};
use crate::compiler::wast_codegen::wast_expr::{Span, WastBinOp, WastExpr, WastKind};
use crate::compiler::wast_codegen::{mangle_function_name, mangle_plain_name};
use crate::settings;
use crate::{
    return_link_error, return_rule_error, return_type_error, return_unsupported_error,
};

/// The storage location of a value: an address expression plus the type of
/// the element stored there.
pub struct LValue {
    pub addr: WastExpr,
    pub ty: TypeId,
}

/// An expression list that may introduce new locals (function body, block,
/// loop). The scope's name prefixes the mangled names of locals defined in
/// it and derives break/continue labels.
pub struct Scope {
    pub name: String,
    pub exprs: Vec<WastExpr>,
}

/// Per-function lowering state. Borrows the module tables mutably for the
/// duration of one body; collected locals are written back into the
/// function when the body is done.
pub struct FnLowerer<'a> {
    pub module: &'a mut Module,
    pub file: &'a LinkedFile,
    pub file_index: usize,
    pub result: Option<TypeId>,
    pub locals: Vec<VarId>,
    pub next_scope: u32,
}

impl FnLowerer<'_> {
    pub fn span(&self, location: TextLocation) -> Span {
        Span {
            file: self.file_index,
            location,
        }
    }

    pub fn literal(&self, value: impl Into<String>, ty: TypeId) -> WastExpr {
        WastExpr::new(
            WastKind::Const {
                value: value.into(),
            },
            Some(ty),
        )
    }

    pub fn literal_i32(
        &mut self,
        value: i64,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let ty = self.module.types.scalar("int32", location)?;
        Ok(self.literal(value.to_string(), ty))
    }

    pub fn lower_expr(
        &mut self,
        expr: &Expr,
        type_hint: Option<TypeId>,
    ) -> Result<WastExpr, CompileError> {
        match expr {
            Expr::IntLit { text, location } => {
                let ty = match type_hint {
                    Some(ty) => ty,
                    None => self.module.types.scalar("int32", *location)?,
                };
                Ok(self.literal(text.clone(), ty))
            }
            Expr::CharLit { value, location } => {
                let ty = match type_hint {
                    Some(ty) => ty,
                    None => self.module.types.scalar("int32", *location)?,
                };
                Ok(self.literal((*value as u32).to_string(), ty))
            }
            Expr::FloatLit { text, location } => {
                let ty = match type_hint {
                    Some(ty) => ty,
                    None => {
                        return_type_error!(
                            ErrorLocation::from_span(location),
                            "not implemented: literal without a type hint: {}",
                            text
                        );
                    }
                };
                Ok(self.literal(text.clone(), ty))
            }
            Expr::Binary {
                op, x, y, location, ..
            } => self.lower_binary(*op, x, y, type_hint, *location),
            Expr::Call {
                fun,
                args,
                location,
            } => self.lower_call(fun, args, *location),
            Expr::Composite { ty, elts, location } => self.lower_composite(ty, elts, *location),
            Expr::Ident(ident) => self.lower_ident(ident),
            Expr::Index { x, index, location } => self.lower_index(x, index, *location),
            Expr::Paren { x, .. } => self.lower_expr(x, type_hint),
            Expr::Selector { x, sel, location } => self.lower_selector(x, sel, *location),
            Expr::Star { x, location } => self.lower_star(x, *location),
            Expr::Unary { op, x, location } => self.lower_unary(*op, x, *location),
        }
    }

    fn lower_binary(
        &mut self,
        op: BinOpToken,
        x: &Expr,
        y: &Expr,
        type_hint: Option<TypeId>,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let x = self
            .lower_expr(x, type_hint)
            .map_err(|e| e.with_context("couldn't get operand X in a binary expression"))?;
        let y = self
            .lower_expr(y, x.ty)
            .map_err(|e| e.with_context("couldn't get operand Y in a binary expression"))?;
        let op = match map_binary_op(op) {
            Some(op) => op,
            None => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&location),
                    "unsupported binary op: '{}'",
                    op.symbol()
                );
            }
        };
        let ty = match x.ty {
            Some(ty) => ty,
            None => {
                return_type_error!(
                    ErrorLocation::from_span(&location),
                    "operand X of a binary expression has no type"
                );
            }
        };
        Ok(WastExpr::new(
            WastKind::BinOp {
                op,
                x: Box::new(x),
                y: Box::new(y),
            },
            Some(ty),
        )
        .with_span(self.span(location)))
    }

    pub fn lower_ident(&mut self, ident: &Ident) -> Result<WastExpr, CompileError> {
        let object = match ident.object {
            Some(object) => object,
            None => {
                return_rule_error!(
                    ErrorLocation::from_span(&ident.location),
                    "undefined identifier '{}'",
                    ident.name
                );
            }
        };

        if let Some(&vid) = self.module.variables_by_object.get(&object) {
            let (kind, ty, full_ty, name, orig) = {
                let var = self.module.vars.get(vid);
                (
                    var.kind,
                    var.ty,
                    var.full_ty,
                    var.name.clone(),
                    var.orig.clone(),
                )
            };
            return match kind {
                VarKind::Global { addr } => {
                    let addr = self.literal_i32(addr as i64, ident.location)?;
                    Ok(WastExpr::new(
                        WastKind::Load {
                            addr: Box::new(addr),
                        },
                        Some(ty),
                    )
                    .with_comment(format!("get_global {}", orig))
                    .with_full_ty(full_ty))
                }
                VarKind::Param | VarKind::Local => {
                    Ok(WastExpr::new(WastKind::GetLocal { name }, Some(ty)).with_full_ty(full_ty))
                }
            };
        }

        if let Some(&fid) = self.module.functions_by_object.get(&object) {
            return self.lower_func_ident(ident, fid);
        }

        return_rule_error!(
            ErrorLocation::from_span(&ident.location),
            "undefined identifier '{}'",
            ident.name
        )
    }

    /// A function name in value position: the value is its index in the
    /// function-pointer table, and taking it marks the function
    /// address-taken.
    fn lower_func_ident(&mut self, ident: &Ident, fid: FuncId) -> Result<WastExpr, CompileError> {
        let index = self.module.table.add(fid);
        let func = self.module.func(fid);
        let name = func.name.clone();
        let sig = func.sig;
        let module = &mut *self.module;
        let func_ty = module.types.func_type_for_sig(sig, &module.sigs);

        let idx = self
            .literal_i32(index as i64, ident.location)?
            .with_comment(format!("function index for {}", name))
            .with_span(self.span(ident.location));
        Ok(WastExpr::new(
            WastKind::FuncPtr {
                index: Box::new(idx),
            },
            Some(func_ty),
        )
        .with_full_ty(Some(func_ty))
        .with_span(self.span(ident.location)))
    }

    fn lower_index(
        &mut self,
        x: &Expr,
        index: &Expr,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let lvalue = self
            .lower_index_lvalue(x, index, location)
            .map_err(|e| e.with_context("error in address computation for an index expression"))?;
        Ok(WastExpr::new(
            WastKind::Load {
                addr: Box::new(lvalue.addr),
            },
            Some(lvalue.ty),
        )
        .with_span(self.span(location)))
    }

    pub fn lower_index_lvalue(
        &mut self,
        x: &Expr,
        index: &Expr,
        location: TextLocation,
    ) -> Result<LValue, CompileError> {
        let index = self
            .lower_expr(index, None)
            .map_err(|e| e.with_context("error in an index expression"))?
            .with_comment("array index");
        let x = self
            .lower_expr(x, None)
            .map_err(|e| e.with_context("error in an index expression"))?;
        self.create_index_lvalue(index, x, location)
    }

    /// Element address = base + index * sizeof(elem); the element type comes
    /// from the base's full (array) type.
    pub fn create_index_lvalue(
        &mut self,
        index: WastExpr,
        x: WastExpr,
        location: TextLocation,
    ) -> Result<LValue, CompileError> {
        let full_ty = match x.full_ty {
            Some(full_ty) => full_ty,
            None => {
                return_rule_error!(
                    ErrorLocation::from_span(&location),
                    "error in an index expression: full type of the base is unknown"
                );
            }
        };
        let elem = match self.module.types.array_info(full_ty) {
            Some((_, elem)) => elem,
            None => {
                return_type_error!(
                    ErrorLocation::from_span(&location),
                    "unsupported type in an index expression: {}",
                    self.module.types.name(full_ty)
                );
            }
        };
        let elem_size = self.module.types.size(elem);
        let multiplier = self
            .literal_i32(elem_size as i64, location)?
            .with_comment("array element size");
        let x_ty = x.ty;
        let offset = WastExpr::new(
            WastKind::BinOp {
                op: WastBinOp::Mul,
                x: Box::new(index),
                y: Box::new(multiplier),
            },
            x_ty,
        )
        .with_comment("array element offset");
        let addr = WastExpr::new(
            WastKind::BinOp {
                op: WastBinOp::Add,
                x: Box::new(x),
                y: Box::new(offset),
            },
            x_ty,
        )
        .with_comment("array element address");
        Ok(LValue { addr, ty: elem })
    }

    fn lower_selector(
        &mut self,
        x: &Expr,
        sel: &str,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let lvalue = self.lower_selector_lvalue(x, sel, location).map_err(|e| {
            e.with_context("error in address computation for a selector expression")
        })?;
        Ok(WastExpr::new(
            WastKind::Load {
                addr: Box::new(lvalue.addr),
            },
            Some(lvalue.ty),
        )
        .with_span(self.span(location)))
    }

    /// Field access through a pointer-to-struct: address = base + offset.
    pub fn lower_selector_lvalue(
        &mut self,
        x: &Expr,
        sel: &str,
        location: TextLocation,
    ) -> Result<LValue, CompileError> {
        let x = self
            .lower_expr(x, None)
            .map_err(|e| e.with_context("error in a selector expression"))?;
        let full_ty = match x.full_ty {
            Some(full_ty) => full_ty,
            None => {
                return_rule_error!(
                    ErrorLocation::from_span(&location),
                    "error in a selector expression: full type of the base is unknown"
                );
            }
        };
        let base = match self.module.types.pointer_base(full_ty) {
            Some(base) => base,
            None => {
                return_type_error!(
                    ErrorLocation::from_span(&location),
                    "unsupported type in a selector expression: {}",
                    self.module.types.name(full_ty)
                );
            }
        };
        if !self.module.types.is_struct(base) {
            return_type_error!(
                ErrorLocation::from_span(&location),
                "unsupported base type in a selector expression: {}",
                self.module.types.name(base)
            );
        }
        let field = match self.module.types.struct_field(base, sel) {
            Some(field) => field,
            None => {
                return_type_error!(
                    ErrorLocation::from_span(&location),
                    "field {} not found in struct: {}",
                    sel,
                    self.module.types.name(base)
                );
            }
        };

        let offset = self
            .literal_i32(field.offset as i64, location)?
            .with_comment(format!("field {}, offset: {}", field.name, field.offset));
        let x_ty = x.ty;
        let field_ptr = self.module.types.pointer_to(field.ty);
        let addr = WastExpr::new(
            WastKind::BinOp {
                op: WastBinOp::Add,
                x: Box::new(x),
                y: Box::new(offset),
            },
            x_ty,
        )
        .with_full_ty(Some(field_ptr));
        Ok(LValue {
            addr,
            ty: field.ty,
        })
    }

    fn lower_star(&mut self, x: &Expr, location: TextLocation) -> Result<WastExpr, CompileError> {
        let lvalue = self.lower_expr_lvalue(x)?;
        Ok(WastExpr::new(
            WastKind::Load {
                addr: Box::new(lvalue.addr),
            },
            Some(lvalue.ty),
        )
        .with_span(self.span(location)))
    }

    /// The l-value form of a bare expression: today only identifiers whose
    /// machine type is `i32` (addresses) can be dereferenced.
    fn lower_expr_lvalue(&mut self, expr: &Expr) -> Result<LValue, CompileError> {
        match expr {
            Expr::Ident(ident) => {
                let i = self.lower_ident(ident)?;
                let ty = match i.ty {
                    Some(ty) => ty,
                    None => {
                        return_type_error!(
                            ErrorLocation::from_span(&ident.location),
                            "dereferenced identifier '{}' has no type",
                            ident.name
                        );
                    }
                };
                if self.module.types.machine_type(ty) != MachineType::I32 {
                    return_unsupported_error!(
                        ErrorLocation::from_span(&ident.location),
                        "unimplemented L-value identifier expression (not an address)"
                    );
                }
                let elem = match i.full_ty {
                    Some(full_ty) => self.module.types.pointer_base(full_ty).unwrap_or(full_ty),
                    None => ty,
                };
                Ok(LValue { addr: i, ty: elem })
            }
            other => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&other.location()),
                    "unimplemented L-value expression"
                )
            }
        }
    }

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        x: &Expr,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        match op {
            UnaryOp::AddressOf => self.lower_address_of(x, location),
            UnaryOp::Complement => self.lower_complement(x, location),
        }
    }

    fn lower_address_of(
        &mut self,
        x: &Expr,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        match x {
            Expr::Composite { ty, location, .. } => {
                // `&Point{}` - heap-allocate and hand back the address
                let ty = lower_type_expr(&mut self.module.types, &mut self.module.sigs, ty)
                    .map_err(|e| e.with_context("struct allocation, type not found"))?;
                let ptr = self.module.types.pointer_to(ty);
                let size = self.module.types.size(ty);
                let align = self.module.types.align(ty);
                self.generate_alloc(size, align, *location, ptr)
            }
            Expr::Selector {
                x: base,
                sel,
                location,
            } => {
                let lvalue = self.lower_selector_lvalue(base, sel, *location).map_err(|e| {
                    e.with_context("error in address computation for a selector expression")
                })?;
                Ok(lvalue.addr)
            }
            _ => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&location),
                    "unsupported address-of operand"
                )
            }
        }
    }

    fn lower_complement(
        &mut self,
        x: &Expr,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let x = self
            .lower_expr(x, None)
            .map_err(|e| e.with_context("error in bitwise complement"))?;
        let ty = match x.ty {
            Some(ty) => ty,
            None => {
                return_type_error!(
                    ErrorLocation::from_span(&location),
                    "operand of bitwise complement has no type"
                );
            }
        };
        let mask = self
            .literal("-1", ty)
            .with_comment("mask for bitwise complement");
        Ok(WastExpr::new(
            WastKind::BinOp {
                op: WastBinOp::Xor,
                x: Box::new(mask),
                y: Box::new(x),
            },
            Some(ty),
        )
        .with_span(self.span(location)))
    }

    fn lower_composite(
        &mut self,
        ty: &TypeExpr,
        elts: &[Expr],
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let tid = lower_type_expr(&mut self.module.types, &mut self.module.sigs, ty)
            .map_err(|e| e.with_context("composite literal, type not found"))?;
        match self.module.types.array_info(tid) {
            Some((_, elem)) => {
                // The literal fixes an ellipsis length
                self.module.types.set_array_length(tid, elts.len() as u32);
                let size = elts.len() as u32 * self.module.types.size(elem);
                let align = self.module.types.align(elem);
                self.generate_alloc(size, align, location, tid).map_err(|e| {
                    e.with_context("couldn't generate array alloc for a composite literal")
                })
            }
            None => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&location),
                    "unimplemented composite literal of type {}",
                    self.module.types.name(tid)
                )
            }
        }
    }

    /// Synthesise a call to the runtime bump allocator. The result carries
    /// the supplied full type so later member access knows the shape of the
    /// allocation.
    pub fn generate_alloc(
        &mut self,
        size: u32,
        align: u32,
        location: TextLocation,
        full_ty: TypeId,
    ) -> Result<WastExpr, CompileError> {
        let size = self
            .literal_i32(size as i64, location)?
            .with_comment("array total size");
        let align = self
            .literal_i32(align as i64, location)?
            .with_comment("alignment");

        let name = mangle_function_name(settings::GC_PACKAGE, settings::ALLOC_FUNCTION);
        let fid = match self.module.func_sym_tab.get(&name) {
            Some(&fid) => fid,
            None => {
                return_link_error!(
                    ErrorLocation::from_span(&location),
                    "link error, couldn't find alloc function: {}",
                    name
                );
            }
        };
        let result = self.module.func(fid).result;
        Ok(WastExpr::new(
            WastKind::Call {
                name,
                args: vec![size, align],
            },
            result,
        )
        .with_full_ty(Some(full_ty))
        .with_span(self.span(location)))
    }

    fn lower_call(
        &mut self,
        fun: &Expr,
        args: &[Expr],
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        match fun {
            Expr::Ident(ident) => {
                // A type name as a call head is a conversion: `int32(x)`
                if args.len() == 1 {
                    if let Some(tid) = self.try_type_name(&ident.name, ident.location)? {
                        return self.lower_convert(tid, &args[0]);
                    }
                }
                let object = match ident.object {
                    Some(object) => object,
                    None => {
                        return_rule_error!(
                            ErrorLocation::from_span(&ident.location),
                            "function '{}' undefined",
                            ident.name
                        );
                    }
                };
                if let Some(&fid) = self.module.functions_by_object.get(&object) {
                    let name = self.module.func(fid).name.clone();
                    return self.create_call(name, fid, args, location);
                }
                if self.module.variables_by_object.contains_key(&object) {
                    return self.lower_indirect_call(ident, args, location);
                }
                return_rule_error!(
                    ErrorLocation::from_span(&ident.location),
                    "function '{}' undefined",
                    ident.name
                )
            }
            Expr::Paren { x, .. } => {
                // `(*int32)(x)` - a parenthesised type is a conversion
                if args.len() == 1 {
                    if let Some(type_expr) = expr_as_type(x) {
                        let tid = lower_type_expr(
                            &mut self.module.types,
                            &mut self.module.sigs,
                            &type_expr,
                        )?;
                        return self.lower_convert(tid, &args[0]);
                    }
                }
                return_unsupported_error!(
                    ErrorLocation::from_span(&location),
                    "unimplemented parenthesised expression in a call head"
                )
            }
            Expr::Selector {
                x,
                sel,
                location: sel_location,
            } => self.lower_call_selector(x, sel, args, *sel_location, location),
            other => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&other.location()),
                    "unimplemented function expression in a call"
                )
            }
        }
    }

    /// `pkg.Fn(...)`: reserved packages first (`unsafe`, the runtime
    /// package), then the file's imports.
    fn lower_call_selector(
        &mut self,
        x: &Expr,
        sel: &str,
        args: &[Expr],
        sel_location: TextLocation,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let pkg = match x {
            Expr::Ident(ident) => &ident.name,
            other => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&other.location()),
                    "unimplemented expression in a call selector"
                );
            }
        };

        if pkg == "unsafe" {
            if sel != "Pointer" {
                return_unsupported_error!(
                    ErrorLocation::from_span(&sel_location),
                    "member of package 'unsafe' is not implemented yet: {}",
                    sel
                );
            }
            if args.len() != 1 {
                return_type_error!(
                    ErrorLocation::from_span(&location),
                    "unexpected number of arguments to unsafe.Pointer"
                );
            }
            let tid = self.module.types.scalar("unsafe.Pointer", sel_location)?;
            return self.lower_convert(tid, &args[0]);
        }

        if pkg == settings::RUNTIME_PACKAGE {
            return self.lower_runtime_call(sel, args, sel_location, location);
        }

        if let Some(long) = self.file.imports.get(pkg) {
            let name = mangle_function_name(long, sel);
            let fid = match self.module.func_sym_tab.get(&name) {
                Some(&fid) => fid,
                None => {
                    return_link_error!(
                        ErrorLocation::from_span(&sel_location),
                        "link error, couldn't find function: {}",
                        name
                    );
                }
            };
            return self.create_call(name, fid, args, location);
        }

        return_rule_error!(
            ErrorLocation::from_span(&location),
            "unimplemented selector in a call expression: {}.{}",
            pkg,
            sel
        )
    }

    fn lower_runtime_call(
        &mut self,
        sel: &str,
        args: &[Expr],
        sel_location: TextLocation,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let (ext_module, ext_func, signature) = match runtime_import(sel) {
            Some(entry) => entry,
            None => {
                return_link_error!(
                    ErrorLocation::from_span(&sel_location),
                    "unknown runtime function: {}.{}",
                    settings::RUNTIME_PACKAGE,
                    sel
                );
            }
        };
        let name = mangle_plain_name(sel);
        let result = match self.module.imports.lookup(sel) {
            Some(import) => import.result,
            None => {
                let (params, result) =
                    parse_import_signature(signature, &mut self.module.types, sel_location)?;
                self.module.imports.add(
                    sel,
                    WastImport {
                        name: name.clone(),
                        module: ext_module.to_string(),
                        func: ext_func.to_string(),
                        params,
                        result,
                    },
                );
                result
            }
        };
        let args = self.lower_args(args)?;
        Ok(WastExpr::new(WastKind::CallImport { name, args }, result)
            .with_full_ty(result)
            .with_span(self.span(location)))
    }

    fn create_call(
        &mut self,
        name: String,
        fid: FuncId,
        args: &[Expr],
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let result = self.module.func(fid).result;
        let args = self
            .lower_args(args)
            .map_err(|e| e.with_context(format!("error parsing args to function {}", name)))?;
        Ok(WastExpr::new(WastKind::Call { name, args }, result)
            .with_full_ty(result)
            .with_span(self.span(location)))
    }

    /// A call through a function-typed variable: the value is a table index
    /// and the interned signature names the callee shape.
    fn lower_indirect_call(
        &mut self,
        ident: &Ident,
        args: &[Expr],
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let index = self
            .lower_ident(ident)
            .map_err(|e| e.with_context("call_indirect, couldn't create the table index"))?;
        let index_ty = match index.ty {
            Some(ty) => ty,
            None => {
                return_type_error!(
                    ErrorLocation::from_span(&ident.location),
                    "call_indirect through '{}' which has no type",
                    ident.name
                );
            }
        };
        let sig = match self.module.types.func_sig(index_ty) {
            Some(sig) => sig,
            None => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&location),
                    "unimplemented expression type in call_indirect: {}",
                    self.module.types.name(index_ty)
                );
            }
        };
        let sig_name = self.module.sigs.get(sig).wasm_name.clone();
        let result = self.module.sigs.get(sig).result;
        let args = self.lower_args(args)?;
        Ok(WastExpr::new(
            WastKind::CallIndirect {
                sig_name,
                index: Box::new(index),
                args,
            },
            result,
        )
        .with_full_ty(result)
        .with_span(self.span(location)))
    }

    /// Arguments are lowered without a hint; the frontend already inserted
    /// any conversions the callee's declared types require.
    fn lower_args(&mut self, args: &[Expr]) -> Result<Vec<WastExpr>, CompileError> {
        let mut lowered = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            lowered.push(
                self.lower_expr(arg, None)
                    .map_err(|e| e.with_context(format!("error parsing arg #{}", i)))?,
            );
        }
        Ok(lowered)
    }

    /// `T(x)`: lower with `T` as the hint, then overwrite the machine type -
    /// except pointer targets, which stay plain `i32` addresses. The full
    /// type always becomes `T`.
    fn lower_convert(&mut self, ty: TypeId, value: &Expr) -> Result<WastExpr, CompileError> {
        let mut expr = self.lower_expr(value, Some(ty))?;
        if !self.module.types.is_pointer(ty) {
            expr.ty = Some(ty);
        }
        expr.full_ty = Some(ty);
        Ok(expr)
    }

    fn try_type_name(
        &mut self,
        name: &str,
        location: TextLocation,
    ) -> Result<Option<TypeId>, CompileError> {
        if let Some(id) = self.module.types.named(name) {
            return Ok(Some(id));
        }
        if crate::compiler::wast_codegen::types::TypeArena::is_scalar_name(name) {
            return Ok(Some(self.module.types.scalar(name, location)?));
        }
        Ok(None)
    }
}

/// Reinterpret an expression as a type, for conversion heads like
/// `(*int32)(x)`.
fn expr_as_type(expr: &Expr) -> Option<TypeExpr> {
    match expr {
        Expr::Ident(ident) => Some(TypeExpr::Name {
            name: ident.name.clone(),
            location: ident.location,
        }),
        Expr::Star { x, location } => expr_as_type(x).map(|base| TypeExpr::Pointer {
            base: Box::new(base),
            location: *location,
        }),
        Expr::Paren { x, .. } => expr_as_type(x),
        _ => None,
    }
}

fn map_binary_op(op: BinOpToken) -> Option<WastBinOp> {
    let mapped = match op {
        BinOpToken::Add => WastBinOp::Add,
        BinOpToken::Sub => WastBinOp::Sub,
        BinOpToken::Mul => WastBinOp::Mul,
        BinOpToken::Div => WastBinOp::Div,
        BinOpToken::Eq => WastBinOp::Eq,
        BinOpToken::Ne => WastBinOp::Ne,
        BinOpToken::Lt => WastBinOp::Lt,
        BinOpToken::Le => WastBinOp::Le,
        BinOpToken::Gt => WastBinOp::Gt,
        BinOpToken::Ge => WastBinOp::Ge,
        BinOpToken::BitAnd => WastBinOp::And,
        BinOpToken::BitOr => WastBinOp::Or,
        BinOpToken::Xor => WastBinOp::Xor,
        BinOpToken::Shl => WastBinOp::Shl,
        BinOpToken::Shr => WastBinOp::Shr,
        BinOpToken::Rem | BinOpToken::LogAnd | BinOpToken::LogOr => return None,
    };
    Some(mapped)
}
