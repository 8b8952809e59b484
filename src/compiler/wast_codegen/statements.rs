//! Statement lowering: blocks, loops, conditionals, assignments, returns.
//!
//! Statements append their lowered expressions to the enclosing [`Scope`].
//! Scopes are numbered per function; a scope's name prefixes the locals
//! defined in it and derives the break/continue labels of loops, so every
//! mangled name is unique within its function.
//!
//! `for` loops desugar into the canonical break/continue shape - the target
//! machine has no structured loop condition:
//!
//! ```text
//! (block            ;; outer, holds the init
//!   <init>
//!   (loop $break $continue
//!     (if <cond> (nop) (br $break))
//!     <body...>
//!     <post>
//!     (br $continue)))
//! ```

use crate::compiler::compiler_errors::{CompileError, ErrorLocation};
use crate::compiler::parsers::ast_nodes::{Expr, Ident, Stmt, VarDeclStmt};
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::wast_codegen::expressions::{FnLowerer, Scope};
use crate::compiler::wast_codegen::mangle_local_name;
use crate::compiler::wast_codegen::types::{lower_type_expr, ArrayLength, TypeId};
use crate::compiler::wast_codegen::vars::{VarId, VarKind, Variable};
use crate::compiler::wast_codegen::wast_expr::{WastBinOp, WastExpr, WastKind};
use crate::{
    return_layout_error, return_rule_error, return_type_error, return_unsupported_error,
};

impl FnLowerer<'_> {
    pub fn new_scope(&mut self, prefix: &str) -> Scope {
        let n = self.next_scope;
        self.next_scope += 1;
        Scope {
            name: format!("{}{}", prefix, n),
            exprs: Vec::new(),
        }
    }

    /// The function's own scope keeps the plain `function_<name>` form.
    pub fn top_scope(&mut self, orig_name: &str) -> Scope {
        self.next_scope += 1;
        Scope {
            name: format!("function_{}", orig_name),
            exprs: Vec::new(),
        }
    }

    pub fn lower_stmt_list(
        &mut self,
        scope: &mut Scope,
        stmts: &[Stmt],
    ) -> Result<(), CompileError> {
        for stmt in stmts {
            self.lower_stmt(scope, stmt)?;
        }
        Ok(())
    }

    pub fn lower_stmt(&mut self, scope: &mut Scope, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Assign {
                lhs,
                rhs,
                define,
                location,
            } => self.lower_assign(scope, lhs, rhs, *define, *location),
            Stmt::Block { body, location } => {
                let block = self.lower_block(body, *location)?;
                scope.exprs.push(block);
                Ok(())
            }
            Stmt::VarDecl(decl) => self.lower_var_decl(scope, decl),
            Stmt::Expr { expr, location } => {
                let lowered = self
                    .lower_expr(expr, None)
                    .map_err(|e| e.with_context("error in an expression statement"))?
                    .with_span(self.span(*location));
                scope.exprs.push(lowered);
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                location,
            } => self.lower_for(scope, init.as_deref(), cond.as_ref(), post.as_deref(), body, *location),
            Stmt::If {
                cond,
                body,
                else_branch,
                location,
            } => {
                let lowered = self.lower_if(cond, body, else_branch.as_deref(), *location)?;
                scope.exprs.push(lowered);
                Ok(())
            }
            Stmt::IncDec {
                x,
                increment,
                location,
            } => self.lower_incdec(scope, x, *increment, *location),
            Stmt::Return { values, location } => self.lower_return(scope, values, *location),
        }
    }

    fn lower_block(
        &mut self,
        body: &[Stmt],
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let mut scope = self.new_scope("block");
        self.lower_stmt_list(&mut scope, body)?;
        Ok(WastExpr::new(WastKind::Block { body: scope.exprs }, None)
            .with_span(self.span(location)))
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        body: &[Stmt],
        else_branch: Option<&Stmt>,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let cond = self
            .lower_expr(cond, None)
            .map_err(|e| e.with_context("error in the condition of an if statement"))?;
        let body = self
            .lower_block(body, location)
            .map_err(|e| e.with_context("error in the block of an if statement"))?;
        let body_else = match else_branch {
            None => None,
            Some(Stmt::Block { body, location }) => Some(self.lower_block(body, *location)?),
            Some(Stmt::If {
                cond,
                body,
                else_branch,
                location,
            }) => Some(self.lower_if(cond, body, else_branch.as_deref(), *location)?),
            Some(other) => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&other.location()),
                    "unimplemented else branch"
                );
            }
        };
        Ok(WastExpr::new(
            WastKind::If {
                cond: Box::new(cond),
                body: Box::new(body),
                body_else: body_else.map(Box::new),
            },
            None,
        )
        .with_span(self.span(location)))
    }

    fn lower_for(
        &mut self,
        scope: &mut Scope,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &[Stmt],
        location: TextLocation,
    ) -> Result<(), CompileError> {
        let init = match init {
            Some(init) => init,
            None => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&location),
                    "loops with no init clause are not implemented"
                );
            }
        };
        let cond = match cond {
            Some(cond) => cond,
            None => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&location),
                    "loops with no condition are not implemented"
                );
            }
        };

        // The init lives in an outer block so its locals anchor the loop
        let mut outer = self.new_scope("loop_block");
        self.lower_stmt(&mut outer, init)
            .map_err(|e| e.with_context("error in the init part of a loop"))?;

        let cond = self
            .lower_expr(cond, None)
            .map_err(|e| e.with_context("error in the condition of a loop"))?;

        let mut loop_scope = self.new_scope("loop");
        let label_break = format!("{}_break", loop_scope.name);
        let label_continue = format!("{}_continue", loop_scope.name);

        let guard = WastExpr::new(
            WastKind::If {
                cond: Box::new(cond),
                body: Box::new(WastExpr::new(WastKind::Nop, None)),
                body_else: Some(Box::new(WastExpr::new(
                    WastKind::Br {
                        label: label_break.clone(),
                    },
                    None,
                ))),
            },
            None,
        );
        loop_scope.exprs.push(guard);

        self.lower_stmt_list(&mut loop_scope, body)
            .map_err(|e| e.with_context("error in the body of a loop"))?;
        if let Some(post) = post {
            self.lower_stmt(&mut loop_scope, post)
                .map_err(|e| e.with_context("error in the post part of a loop"))?;
        }
        loop_scope.exprs.push(WastExpr::new(
            WastKind::Br {
                label: label_continue.clone(),
            },
            None,
        ));

        outer.exprs.push(WastExpr::new(
            WastKind::Loop {
                label_break,
                label_continue,
                body: loop_scope.exprs,
            },
            None,
        ));
        scope.exprs.push(
            WastExpr::new(WastKind::Block { body: outer.exprs }, None)
                .with_span(self.span(location)),
        );
        Ok(())
    }

    fn lower_assign(
        &mut self,
        scope: &mut Scope,
        lhs: &[Expr],
        rhs: &[Expr],
        define: bool,
        location: TextLocation,
    ) -> Result<(), CompileError> {
        if lhs.len() != 1 || rhs.len() != 1 {
            return_unsupported_error!(
                ErrorLocation::from_span(&location),
                "unimplemented multi-value assignment statement"
            );
        }

        // RHS first: its type dominates the assignment
        let rhs_expr = self
            .lower_expr(&rhs[0], None)
            .map_err(|e| e.with_context("error parsing RHS of an assignment"))?;
        let rhs_ty = match rhs_expr.ty {
            Some(ty) => ty,
            None => {
                return_type_error!(
                    ErrorLocation::from_span(&rhs[0].location()),
                    "error parsing RHS of an assignment: type is unknown"
                );
            }
        };

        if define {
            let ident = match &lhs[0] {
                Expr::Ident(ident) => ident,
                other => {
                    return_unsupported_error!(
                        ErrorLocation::from_span(&other.location()),
                        "unimplemented LHS in a define-assignment"
                    );
                }
            };
            let scope_name = scope.name.clone();
            let vid = self.create_local(&scope_name, ident, rhs_ty)?;
            let set = self.set_var(vid, rhs_expr, location)?;
            scope.exprs.push(set);
            return self.push_composite_inits(scope, vid, &rhs[0], location);
        }

        match &lhs[0] {
            Expr::Ident(ident) => {
                let vid = match ident.object.and_then(|o| {
                    self.module.variables_by_object.get(&o).copied()
                }) {
                    Some(vid) => vid,
                    None => {
                        return_rule_error!(
                            ErrorLocation::from_span(&ident.location),
                            "couldn't find variable '{}' on the LHS of an assignment",
                            ident.name
                        );
                    }
                };
                let set = self.set_var(vid, rhs_expr, location)?;
                scope.exprs.push(set);
                self.push_composite_inits(scope, vid, &rhs[0], location)
            }
            Expr::Index { x, index, location: lhs_location } => {
                let lvalue = self
                    .lower_index_lvalue(x, index, *lhs_location)
                    .map_err(|e| {
                        e.with_context("error in address computation for an index expression")
                    })?;
                let store = WastExpr::new(
                    WastKind::Store {
                        addr: Box::new(lvalue.addr),
                        value: Box::new(rhs_expr),
                    },
                    Some(rhs_ty),
                )
                .with_span(self.span(location));
                scope.exprs.push(store);
                Ok(())
            }
            Expr::Selector { x, sel, location: lhs_location } => {
                let lvalue = self
                    .lower_selector_lvalue(x, sel, *lhs_location)
                    .map_err(|e| {
                        e.with_context("error in address computation for a selector expression")
                    })?;
                let store = WastExpr::new(
                    WastKind::Store {
                        addr: Box::new(lvalue.addr),
                        value: Box::new(rhs_expr),
                    },
                    Some(rhs_ty),
                )
                .with_span(self.span(location));
                scope.exprs.push(store);
                Ok(())
            }
            other => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&other.location()),
                    "unimplemented LHS in an assignment"
                )
            }
        }
    }

    /// An array composite literal on the RHS expands into stores to the
    /// successive element addresses of the fresh allocation.
    fn push_composite_inits(
        &mut self,
        scope: &mut Scope,
        vid: VarId,
        rhs: &Expr,
        location: TextLocation,
    ) -> Result<(), CompileError> {
        let elts = match rhs {
            Expr::Composite { elts, .. } => elts,
            _ => return Ok(()),
        };
        for (i, elt) in elts.iter().enumerate() {
            let value = self.lower_expr(elt, None)?;
            let value_ty = match value.ty {
                Some(ty) => ty,
                None => {
                    return_type_error!(
                        ErrorLocation::from_span(&elt.location()),
                        "array element initialiser has no type"
                    );
                }
            };
            let (name, ty, full_ty) = {
                let var = self.module.vars.get(vid);
                (var.name.clone(), var.ty, var.full_ty)
            };
            let base =
                WastExpr::new(WastKind::GetLocal { name }, Some(ty)).with_full_ty(full_ty);
            let index = self.literal_i32(i as i64, location)?;
            let lvalue = self.create_index_lvalue(index, base, location)?;
            let store = WastExpr::new(
                WastKind::Store {
                    addr: Box::new(lvalue.addr),
                    value: Box::new(value),
                },
                Some(value_ty),
            )
            .with_span(self.span(location));
            scope.exprs.push(store);
        }
        Ok(())
    }

    pub fn create_local(
        &mut self,
        scope_name: &str,
        ident: &Ident,
        ty: TypeId,
    ) -> Result<VarId, CompileError> {
        let object = match ident.object {
            Some(object) => object,
            None => {
                return_rule_error!(
                    ErrorLocation::from_span(&ident.location),
                    "identifier '{}' was not resolved to a declaration",
                    ident.name
                );
            }
        };
        let vid = self.module.vars.add(Variable {
            name: mangle_local_name(scope_name, &ident.name),
            orig: ident.name.clone(),
            ty,
            full_ty: None,
            kind: VarKind::Local,
        });
        self.module.variables_by_object.insert(object, vid);
        self.locals.push(vid);
        Ok(vid)
    }

    /// Assignment sink: globals store to their static address, locals and
    /// parameters use `set_local`. The variable inherits the full type of
    /// the value assigned to it.
    pub fn set_var(
        &mut self,
        vid: VarId,
        rhs: WastExpr,
        location: TextLocation,
    ) -> Result<WastExpr, CompileError> {
        let (kind, name, orig, ty) = {
            let var = self.module.vars.get(vid);
            (var.kind, var.name.clone(), var.orig.clone(), var.ty)
        };
        match kind {
            VarKind::Global { addr } => {
                let addr = self.literal_i32(addr as i64, location)?;
                Ok(WastExpr::new(
                    WastKind::Store {
                        addr: Box::new(addr),
                        value: Box::new(rhs),
                    },
                    Some(ty),
                )
                .with_comment(format!("set_global {}", orig))
                .with_span(self.span(location)))
            }
            VarKind::Param | VarKind::Local => {
                let rhs_full = rhs.full_ty;
                self.module.vars.get_mut(vid).full_ty = rhs_full;
                Ok(WastExpr::new(
                    WastKind::SetLocal {
                        name,
                        rhs: Box::new(rhs),
                    },
                    Some(ty),
                )
                .with_full_ty(rhs_full)
                .with_span(self.span(location)))
            }
        }
    }

    /// `var x T` - arrays get heap storage, function-typed locals start as
    /// nil (-1), scalars start at zero.
    fn lower_var_decl(
        &mut self,
        scope: &mut Scope,
        decl: &VarDeclStmt,
    ) -> Result<(), CompileError> {
        let ty = lower_type_expr(&mut self.module.types, &mut self.module.sigs, &decl.ty)
            .map_err(|e| {
                e.with_context(format!("unsupported type for variable {}", decl.name.name))
            })?;
        let scope_name = scope.name.clone();
        let vid = self.create_local(&scope_name, &decl.name, ty)?;

        let init = if let Some((length, elem)) = self.module.types.array_info(ty) {
            let n = match length {
                ArrayLength::Fixed(n) => n,
                ArrayLength::Ellipsis => {
                    return_layout_error!(
                        ErrorLocation::from_span(&decl.location),
                        "an array variable declaration needs a fixed length"
                    );
                }
            };
            let size = n * self.module.types.size(elem);
            let align = self.module.types.align(elem);
            self.generate_alloc(size, align, decl.location, ty)
                .map_err(|e| e.with_context("couldn't generate array alloc"))?
        } else if self.module.types.is_func(ty) {
            self.literal_i32(-1, decl.location)?
                .with_comment("nil function pointer")
        } else {
            self.literal("0", ty)
        };

        let set = self.set_var(vid, init, decl.location)?;
        scope.exprs.push(set);
        Ok(())
    }

    fn lower_incdec(
        &mut self,
        scope: &mut Scope,
        x: &Expr,
        increment: bool,
        location: TextLocation,
    ) -> Result<(), CompileError> {
        let ident = match x {
            Expr::Ident(ident) => ident,
            other => {
                return_unsupported_error!(
                    ErrorLocation::from_span(&other.location()),
                    "unimplemented expression in an increment/decrement statement"
                );
            }
        };
        let vid = match ident
            .object
            .and_then(|o| self.module.variables_by_object.get(&o).copied())
        {
            Some(vid) => vid,
            None => {
                return_rule_error!(
                    ErrorLocation::from_span(&ident.location),
                    "undefined variable '{}' in an increment/decrement statement",
                    ident.name
                );
            }
        };

        let current = self
            .lower_ident(ident)
            .map_err(|e| e.with_context("error in an increment/decrement statement"))?;
        let ty = self.module.vars.get(vid).ty;
        let one = self.literal("1", ty);
        let op = if increment {
            WastBinOp::Add
        } else {
            WastBinOp::Sub
        };
        let rhs = WastExpr::new(
            WastKind::BinOp {
                op,
                x: Box::new(current),
                y: Box::new(one),
            },
            Some(ty),
        );
        let set = self.set_var(vid, rhs, location)?;
        scope.exprs.push(set);
        Ok(())
    }

    fn lower_return(
        &mut self,
        scope: &mut Scope,
        values: &[Expr],
        location: TextLocation,
    ) -> Result<(), CompileError> {
        if values.len() > 1 {
            return_unsupported_error!(
                ErrorLocation::from_span(&location),
                "unimplemented multi-value return statement"
            );
        }
        let value = match values.first() {
            Some(value) => {
                let hint = self.result;
                Some(Box::new(self.lower_expr(value, hint)?))
            }
            None => None,
        };
        scope.exprs.push(
            WastExpr::new(WastKind::Return { value }, None).with_span(self.span(location)),
        );
        Ok(())
    }
}
