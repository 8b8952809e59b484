//! Function lowering.
//!
//! Pass 1 builds the shell: mangled name, parameters, result, interned
//! signature, export flag. Pass 2 lowers the declared body into the
//! function's top-level scope and harvests pragmas from the doc comment.

use crate::compiler::compiler_errors::CompileError;
use crate::compiler::parsers::ast_nodes::FuncDecl;
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::wast_codegen::emitter::IndentWriter;
use crate::compiler::wast_codegen::expressions::FnLowerer;
use crate::compiler::wast_codegen::linker::{LinkedFile, Module};
use crate::compiler::wast_codegen::signatures::SigId;
use crate::compiler::wast_codegen::types::{lower_type_expr, TypeId};
use crate::compiler::wast_codegen::vars::{VarId, VarKind, Variable};
use crate::compiler::wast_codegen::wast_expr::{EmitCx, WastExpr};
use crate::compiler::wast_codegen::{mangle_function_name, mangle_plain_name};
use crate::settings;
use crate::{return_compiler_error, return_unsupported_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// `(func $pkg/name (type $Fk) (param ...)* (result ...)? (local ...)* ...)`
#[derive(Debug)]
pub struct WastFunc {
    pub name: String,
    pub orig_name: String,
    pub location: TextLocation,
    pub params: Vec<VarId>,
    pub result: Option<TypeId>,
    pub sig: SigId,
    pub locals: Vec<VarId>,
    pub body: Vec<WastExpr>,
    pub exported: bool,
    pub file_index: usize,
    pub decl_index: usize,
}

/// Pass 1: register the function shell in every symbol table that pass 2
/// and the emitter resolve through.
pub fn build_shell(
    module: &mut Module,
    pkg_name: &str,
    file_index: usize,
    decl_index: usize,
    decl: &FuncDecl,
) -> Result<FuncId, CompileError> {
    let mut param_tys = Vec::with_capacity(decl.params.len());
    let mut params = Vec::with_capacity(decl.params.len());
    for param in &decl.params {
        let ty = lower_type_expr(&mut module.types, &mut module.sigs, &param.ty)?;
        let object = match param.name.object {
            Some(object) => object,
            None => {
                return_compiler_error!(
                    "parameter '{}' of '{}' was not resolved",
                    param.name.name,
                    decl.name.name
                );
            }
        };
        let vid = module.vars.add(Variable {
            name: mangle_plain_name(&param.name.name),
            orig: param.name.name.clone(),
            ty,
            full_ty: Some(ty),
            kind: VarKind::Param,
        });
        module.variables_by_object.insert(object, vid);
        params.push(vid);
        param_tys.push(ty);
    }

    if decl.results.len() > 1 {
        return_unsupported_error!(
            crate::compiler::compiler_errors::ErrorLocation::from_span(&decl.location),
            "functions returning {} values are not implemented",
            decl.results.len()
        );
    }
    let result = match decl.results.first() {
        Some(result) => Some(lower_type_expr(&mut module.types, &mut module.sigs, result)?),
        None => None,
    };
    let sig = module.sigs.add(param_tys, result);

    let orig_name = decl.name.name.clone();
    let exported = orig_name.chars().next().is_some_and(|c| c.is_uppercase())
        || orig_name == "main";
    let name = mangle_function_name(pkg_name, &orig_name);

    let fid = FuncId(module.functions.len() as u32);
    module.functions.push(WastFunc {
        name: name.clone(),
        orig_name,
        location: decl.name.location,
        params,
        result,
        sig,
        locals: Vec::new(),
        body: Vec::new(),
        exported,
        file_index,
        decl_index,
    });

    let object = match decl.name.object {
        Some(object) => object,
        None => {
            return_compiler_error!("function '{}' was not resolved", decl.name.name);
        }
    };
    module.functions_by_object.insert(object, fid);
    module.func_sym_tab.insert(name, fid);
    Ok(fid)
}

/// Pass 2: harvest pragmas, then lower the body statement list into the
/// function's top-level scope.
pub fn lower_body(
    module: &mut Module,
    file: &LinkedFile,
    file_index: usize,
    fid: FuncId,
    decl: &FuncDecl,
) -> Result<(), CompileError> {
    for line in &decl.doc {
        parse_doc_comment(module, line);
    }

    let result = module.func(fid).result;
    let orig_name = module.func(fid).orig_name.clone();
    let mut lowerer = FnLowerer {
        module: &mut *module,
        file,
        file_index,
        result,
        locals: Vec::new(),
        next_scope: 0,
    };
    let mut scope = lowerer.top_scope(&orig_name);
    lowerer.lower_stmt_list(&mut scope, &decl.body)?;
    let locals = lowerer.locals;

    let func = &mut module.functions[fid.0 as usize];
    func.locals = locals;
    func.body = scope.exprs;
    Ok(())
}

/// Doc comments carrying the pragma prefix append to the module's
/// post-module lists. Unknown pragmas and plain comments are ignored.
fn parse_doc_comment(module: &mut Module, line: &str) {
    let pragma = match line.strip_prefix(settings::PRAGMA_PREFIX) {
        Some(pragma) => pragma,
        None => return,
    };
    if let Some(rest) = pragma.strip_prefix("assert_return ") {
        module.assert_return.push(rest.trim().to_string());
    } else if let Some(rest) = pragma.strip_prefix("invoke ") {
        module.invoke.push(rest.trim().to_string());
    }
}

pub fn print_function(
    w: &mut IndentWriter,
    cx: &EmitCx,
    module: &Module,
    func: &WastFunc,
    file: &LinkedFile,
) {
    let indent = 1;
    w.print_indent(
        indent,
        format!(
            ";; Go function '{}' [{}:{}:{}]\n",
            func.orig_name,
            file.ast.path.display(),
            func.location.start.line,
            func.location.start.column
        ),
    );

    w.print_indent(
        indent,
        format!(
            "(func {} (type {})",
            func.name,
            module.sigs.get(func.sig).wasm_name
        ),
    );
    for &param in &func.params {
        let var = module.vars.get(param);
        w.print(format!(
            " (param {} {})",
            var.name,
            cx.types.machine_type(var.ty)
        ));
    }
    if let Some(result) = func.result {
        w.print(format!(" (result {})", cx.types.machine_type(result)));
    }
    w.print("\n");

    let body_indent = indent + 1;
    for &local in &func.locals {
        let var = module.vars.get(local);
        w.print_indent(
            body_indent,
            format!(
                "(local {} {}) ;; {}\n",
                var.name,
                cx.types.machine_type(var.ty),
                var.orig
            ),
        );
    }
    if !func.locals.is_empty() {
        w.print("\n");
    }

    for (i, expr) in func.body.iter().enumerate() {
        if i > 0 {
            w.print("\n");
        }
        print_source_echo(w, body_indent, cx, expr);
        expr.print(w, body_indent, cx);
    }

    w.print_indent(indent, format!(") ;; func {}\n", func.name));
}

/// Echo the source text of the statement behind a top-level body
/// expression, `;;`-prefixed per line.
fn print_source_echo(w: &mut IndentWriter, indent: usize, cx: &EmitCx, expr: &WastExpr) {
    let span = match &expr.span {
        Some(span) => span,
        None => return,
    };
    let text = cx.source_slice(span);
    if text.is_empty() {
        return;
    }
    let line_prefix = format!("\n{};; ", settings::INDENT_PATTERN.repeat(indent));
    let echoed = text.replace('\n', &line_prefix);
    w.print_indent(indent, format!(";; {}\n", echoed));
}
