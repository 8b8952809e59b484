//! Per-file identifier resolution.
//!
//! A pre-pass registers every file-level function and global so forward
//! references resolve; a second walk threads a lexical scope stack through
//! each function body, assigning an [`ObjectId`] to every identifier that
//! names a declared function, global, parameter or local.
//!
//! Identifiers that resolve to nothing are left untouched rather than
//! rejected: they may be type names (`int32(x)`) or imported package names
//! (`gc.Alloc`), which the lowerer resolves from context. Genuinely
//! undefined names surface there with a "undefined identifier" diagnostic.

use crate::compiler::compiler_errors::CompileError;
use crate::compiler::parsers::ast_nodes::*;
use rustc_hash::FxHashMap;

pub fn resolve_file(
    file: &mut SourceFile,
    objects: &mut ObjectTable,
) -> Result<(), CompileError> {
    let mut file_scope: FxHashMap<String, ObjectId> = FxHashMap::default();

    for decl in &mut file.decls {
        match decl {
            Decl::Func(func) => {
                let id = objects.define(&func.name.name, ObjectKind::Function);
                func.name.object = Some(id);
                file_scope.insert(func.name.name.clone(), id);
            }
            Decl::Var(global) => {
                let id = objects.define(&global.name.name, ObjectKind::Global);
                global.name.object = Some(id);
                file_scope.insert(global.name.name.clone(), id);
            }
            Decl::Import(_) | Decl::Type(_) => {}
        }
    }

    let mut scopes = ScopeStack {
        scopes: vec![file_scope],
        objects,
    };
    for decl in &mut file.decls {
        if let Decl::Func(func) = decl {
            scopes.push();
            for param in &mut func.params {
                let id = scopes.define(&param.name.name, ObjectKind::Param);
                param.name.object = Some(id);
            }
            for stmt in &mut func.body {
                scopes.resolve_stmt(stmt);
            }
            scopes.pop();
        }
    }
    Ok(())
}

struct ScopeStack<'a> {
    scopes: Vec<FxHashMap<String, ObjectId>>,
    objects: &'a mut ObjectTable,
}

impl ScopeStack<'_> {
    fn push(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: &str, kind: ObjectKind) -> ObjectId {
        let id = self.objects.define(name, kind);
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), id);
        id
    }

    fn lookup(&self, name: &str) -> Option<ObjectId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.get(name) {
                return Some(id);
            }
        }
        None
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Assign {
                lhs, rhs, define, ..
            } => {
                // RHS first: `x := f(x)` sees the outer x
                for expr in rhs.iter_mut() {
                    self.resolve_expr(expr);
                }
                for expr in lhs.iter_mut() {
                    if *define {
                        if let Expr::Ident(ident) = expr {
                            let id = self.define(&ident.name, ObjectKind::Local);
                            ident.object = Some(id);
                            continue;
                        }
                    }
                    self.resolve_expr(expr);
                }
            }
            Stmt::Block { body, .. } => {
                self.push();
                for stmt in body {
                    self.resolve_stmt(stmt);
                }
                self.pop();
            }
            Stmt::VarDecl(decl) => {
                let id = self.define(&decl.name.name, ObjectKind::Local);
                decl.name.object = Some(id);
            }
            Stmt::Expr { expr, .. } => self.resolve_expr(expr),
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.push();
                if let Some(init) = init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = cond {
                    self.resolve_expr(cond);
                }
                if let Some(post) = post {
                    self.resolve_stmt(post);
                }
                self.push();
                for stmt in body {
                    self.resolve_stmt(stmt);
                }
                self.pop();
                self.pop();
            }
            Stmt::If {
                cond,
                body,
                else_branch,
                ..
            } => {
                self.resolve_expr(cond);
                self.push();
                for stmt in body {
                    self.resolve_stmt(stmt);
                }
                self.pop();
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::IncDec { x, .. } => self.resolve_expr(x),
            Stmt::Return { values, .. } => {
                for value in values {
                    self.resolve_expr(value);
                }
            }
        }
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Ident(ident) => {
                ident.object = self.lookup(&ident.name);
            }
            Expr::Binary { x, y, .. } => {
                self.resolve_expr(x);
                self.resolve_expr(y);
            }
            Expr::Call { fun, args, .. } => {
                self.resolve_expr(fun);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            Expr::Composite { elts, .. } => {
                for elt in elts {
                    self.resolve_expr(elt);
                }
            }
            Expr::Index { x, index, .. } => {
                self.resolve_expr(x);
                self.resolve_expr(index);
            }
            Expr::Paren { x, .. } | Expr::Star { x, .. } | Expr::Unary { x, .. } => {
                self.resolve_expr(x);
            }
            Expr::Selector { x, .. } => {
                // The selector name is a field or a cross-package function;
                // neither has an object in this file
                self.resolve_expr(x);
            }
            Expr::IntLit { .. } | Expr::FloatLit { .. } | Expr::CharLit { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parsers::build_ast::parse_file;
    use crate::compiler::parsers::tokenizer::tokenize;
    use std::path::PathBuf;

    fn resolved(source: &str) -> (SourceFile, ObjectTable) {
        let tokens = tokenize(source).unwrap();
        let mut file =
            parse_file(&PathBuf::from("test/test.go"), source.to_string(), tokens).unwrap();
        let mut objects = ObjectTable::new();
        resolve_file(&mut file, &mut objects).unwrap();
        (file, objects)
    }

    #[test]
    fn forward_function_references_resolve() {
        let (file, objects) = resolved(
            "package t\nfunc F() int32 {\n\treturn two()\n}\nfunc two() int32 {\n\treturn 2\n}\n",
        );
        match &file.decls[0] {
            Decl::Func(f) => match &f.body[0] {
                Stmt::Return { values, .. } => match &values[0] {
                    Expr::Call { fun, .. } => match fun.as_ref() {
                        Expr::Ident(ident) => {
                            let id = ident.object.expect("two must resolve");
                            assert_eq!(objects.get(id).kind, ObjectKind::Function);
                        }
                        _ => unreachable!(),
                    },
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn locals_shadow_globals() {
        let (file, objects) = resolved(
            "package t\nvar counter int32\nfunc F() int32 {\n\tcounter := int32(1)\n\treturn counter\n}\n",
        );
        match &file.decls[1] {
            Decl::Func(f) => match &f.body[1] {
                Stmt::Return { values, .. } => match &values[0] {
                    Expr::Ident(ident) => {
                        let id = ident.object.unwrap();
                        assert_eq!(objects.get(id).kind, ObjectKind::Local);
                    }
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn package_names_resolve_to_nothing() {
        let (file, _) = resolved(
            "package t\nimport \"gowast/rt/gc\"\nfunc F() int32 {\n\treturn gc.Alloc(8, 8)\n}\n",
        );
        match &file.decls[1] {
            Decl::Func(f) => match &f.body[0] {
                Stmt::Return { values, .. } => match &values[0] {
                    Expr::Call { fun, .. } => match fun.as_ref() {
                        Expr::Selector { x, .. } => match x.as_ref() {
                            Expr::Ident(ident) => assert!(ident.object.is_none()),
                            _ => unreachable!(),
                        },
                        _ => unreachable!(),
                    },
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn type_conversion_names_resolve_to_nothing() {
        let (file, _) = resolved("package t\nfunc F() int32 {\n\treturn int32(0)\n}\n");
        match &file.decls[0] {
            Decl::Func(f) => match &f.body[0] {
                Stmt::Return { values, .. } => match &values[0] {
                    Expr::Call { fun, .. } => match fun.as_ref() {
                        Expr::Ident(ident) => assert!(ident.object.is_none()),
                        _ => unreachable!(),
                    },
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }
}
