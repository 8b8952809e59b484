//! The module linker: multi-file, two-pass assembly and final emission.
//!
//! Pass 1 ([`ModuleLinker::add_source_file`]) walks each file's declarations
//! in order, building symbol tables: function shells, the file's import map,
//! named types, and globals in static memory. Pass 2
//! ([`ModuleLinker::finalize`]) lowers every function body; all intra-module
//! references - including forward references - resolve through the tables
//! pass 1 already filled. Finalising also freezes the static image by
//! writing its length into the free-pointer cell.
//!
//! Emission order is fixed: file headers, memory and data segments, the
//! global-variable comment block, interned signatures, the function-pointer
//! table, imports, functions, exports, then the harvested pragmas after the
//! module. Identical inputs produce byte-identical output.

use crate::compiler::compiler_errors::{CompileError, ErrorLocation};
use crate::compiler::parsers::ast_nodes::{Decl, Expr, GlobalDecl, SourceFile};
use crate::compiler::wast_codegen::emitter::IndentWriter;
use crate::compiler::wast_codegen::functions::{
    build_shell, lower_body, print_function, FuncId, WastFunc,
};
use crate::compiler::wast_codegen::imports::ImportTable;
use crate::compiler::wast_codegen::signatures::{FunctionTable, SignatureTable};
use crate::compiler::wast_codegen::static_memory::StaticMemory;
use crate::compiler::wast_codegen::types::{declare_named_type, lower_type_expr, TypeArena};
use crate::compiler::wast_codegen::vars::{VarKind, VarTable, Variable};
use crate::compiler::wast_codegen::wast_expr::EmitCx;
use crate::compiler::parsers::ast_nodes::ObjectId;
use crate::compiler::wast_codegen::vars::VarId;
use crate::settings;
use crate::{return_compiler_error, return_layout_error};
use rustc_hash::FxHashMap;
use std::path::Path;

/// One input file after pass 1: its AST (still owning the source text), the
/// package name derived from its path, its import map, and the functions it
/// declared.
pub struct LinkedFile {
    pub ast: SourceFile,
    pub pkg_name: String,
    /// Import short name -> full package path.
    pub imports: FxHashMap<String, String>,
    /// `(declaration index, function id)` in declaration order.
    pub functions: Vec<(usize, FuncId)>,
}

/// All shared tables. Owned by the linker and mutated only on the single
/// driver thread.
pub struct Module {
    /// Package clause of the most recent file; used in header comments.
    pub name: String,
    pub functions: Vec<WastFunc>,
    pub types: TypeArena,
    pub vars: VarTable,
    pub sigs: SignatureTable,
    pub table: FunctionTable,
    pub imports: ImportTable,
    pub memory: StaticMemory,
    pub variables_by_object: FxHashMap<ObjectId, VarId>,
    pub functions_by_object: FxHashMap<ObjectId, FuncId>,
    /// Mangled name -> function, for cross-package and allocator linkage.
    pub func_sym_tab: FxHashMap<String, FuncId>,
    pub free_ptr_addr: Option<u32>,
    pub assert_return: Vec<String>,
    pub invoke: Vec<String>,
}

impl Module {
    fn new() -> Module {
        Module {
            name: String::new(),
            functions: Vec::new(),
            types: TypeArena::new(),
            vars: VarTable::new(),
            sigs: SignatureTable::new(),
            table: FunctionTable::new(),
            imports: ImportTable::new(),
            memory: StaticMemory::new(),
            variables_by_object: FxHashMap::default(),
            functions_by_object: FxHashMap::default(),
            func_sym_tab: FxHashMap::default(),
            free_ptr_addr: None,
            assert_return: Vec::new(),
            invoke: Vec::new(),
        }
    }

    pub fn func(&self, fid: FuncId) -> &WastFunc {
        &self.functions[fid.0 as usize]
    }
}

#[derive(Default)]
pub struct ModuleLinker {
    files: Vec<LinkedFile>,
    module: Module,
}

impl Default for Module {
    fn default() -> Self {
        Module::new()
    }
}

impl ModuleLinker {
    pub fn new() -> ModuleLinker {
        ModuleLinker {
            files: Vec::new(),
            module: Module::new(),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Pass 1 for one file: populate symbol tables and declarations.
    pub fn add_source_file(&mut self, ast: SourceFile) -> Result<(), CompileError> {
        let pkg_name = package_name_from_path(&ast.path, &ast.package_clause);
        self.module.name = ast.package_clause.clone();

        let mut file = LinkedFile {
            ast,
            pkg_name,
            imports: FxHashMap::default(),
            functions: Vec::new(),
        };
        let file_index = self.files.len();
        let path = file.ast.path.clone();

        for (decl_index, decl) in file.ast.decls.iter().enumerate() {
            let lowered = match decl {
                Decl::Func(func) => {
                    build_shell(&mut self.module, &file.pkg_name, file_index, decl_index, func)
                        .map(|fid| file.functions.push((decl_index, fid)))
                }
                Decl::Import(import) => {
                    let short = match import.path.rsplit_once('/') {
                        Some((_, last)) => last.to_string(),
                        None => import.path.clone(),
                    };
                    file.imports.insert(short, import.path.clone());
                    Ok(())
                }
                Decl::Type(decl) => {
                    declare_named_type(&mut self.module.types, &mut self.module.sigs, decl)
                        .map(|_| ())
                }
                Decl::Var(global) => declare_global(&mut self.module, global),
            };
            lowered.map_err(|e| e.with_file_path(&path))?;
        }

        self.files.push(file);
        Ok(())
    }

    /// Pass 2 over every file, then freeze the static image: the heap bump
    /// allocator starts right above it.
    pub fn finalize(&mut self) -> Result<(), CompileError> {
        let ModuleLinker { files, module } = self;
        for (file_index, file) in files.iter().enumerate() {
            for &(decl_index, fid) in &file.functions {
                let decl = match &file.ast.decls[decl_index] {
                    Decl::Func(decl) => decl,
                    _ => {
                        return_compiler_error!(
                            "declaration {} of {} is not a function",
                            decl_index,
                            file.pkg_name
                        );
                    }
                };
                lower_body(module, file, file_index, fid, decl).map_err(|e| {
                    e.with_file_path(&file.ast.path)
                        .with_context(format!("error in function '{}'", decl.name.name))
                })?;
            }
        }

        if let Some(addr) = module.free_ptr_addr {
            let len = module.memory.len();
            module.memory.write_i32(addr, len as i32);
        }
        Ok(())
    }

    /// Emit the whole module, post-module pragmas included.
    pub fn print(&self) -> String {
        let mut w = IndentWriter::new();
        let cx = EmitCx {
            types: &self.module.types,
            sources: self.files.iter().map(|f| f.ast.source.as_str()).collect(),
        };

        w.print("(module\n");
        w.print_indent(1, format!(";; Go package '{}'\n", self.module.name));
        for file in &self.files {
            w.print_indent(1, format!(";; File {}\n", file.pkg_name));
        }

        self.module.memory.print(&mut w);

        let globals: Vec<&Variable> = self
            .module
            .vars
            .iter()
            .filter(|v| matches!(v.kind, VarKind::Global { .. }))
            .collect();
        if !globals.is_empty() {
            w.print("\n");
            w.print_indent(1, ";; Global variables\n");
            for var in globals {
                if let VarKind::Global { addr } = var.kind {
                    w.print_indent(
                        1,
                        format!(
                            ";; @{:x} (size {}): var {} {}\n",
                            addr,
                            self.module.types.size(var.ty),
                            var.name,
                            self.module.types.name(var.ty)
                        ),
                    );
                }
            }
        }

        if !self.module.sigs.is_empty() {
            w.print("\n");
            for sig in self.module.sigs.iter() {
                w.print_indent(1, format!("(type {} (func", sig.wasm_name));
                if !sig.params.is_empty() {
                    w.print(" (param");
                    for &param in &sig.params {
                        w.print(format!(" {}", self.module.types.machine_type(param)));
                    }
                    w.print(")");
                }
                if let Some(result) = sig.result {
                    w.print(format!(" (result {})", self.module.types.machine_type(result)));
                }
                w.print("))");
                if let Some(source_name) = &sig.source_name {
                    w.print(format!(" ;; {}", source_name));
                }
                w.print("\n");
            }
        }

        if !self.module.table.is_empty() {
            w.print("\n");
            w.print_indent(1, "(table");
            for &fid in self.module.table.iter() {
                w.print(format!(" {}", self.module.func(fid).name));
            }
            w.print(")\n");
        }

        if self.module.imports.iter().next().is_some() {
            w.print("\n");
            self.module.imports.print(&mut w, &self.module.types);
        }

        for func in &self.module.functions {
            w.print("\n");
            print_function(&mut w, &cx, &self.module, func, &self.files[func.file_index]);
        }

        w.print("\n");
        for func in &self.module.functions {
            if func.exported {
                w.print_indent(1, format!("(export \"{}\" {})\n", func.orig_name, func.name));
            }
        }
        w.print(format!(") ;; end Go package '{}'\n", self.module.name));

        if !self.module.assert_return.is_empty() || !self.module.invoke.is_empty() {
            w.print("\n");
        }
        for assert in &self.module.assert_return {
            w.print(format!("(assert_return {})\n", assert));
        }
        for invoke in &self.module.invoke {
            w.print(format!("{}\n", invoke));
        }

        w.into_string()
    }
}

/// Global `var` declarations: bump-allocate in static memory, honour the
/// free-pointer magic name, and write any constant initialiser into the
/// image.
fn declare_global(module: &mut Module, global: &GlobalDecl) -> Result<(), CompileError> {
    let ty = lower_type_expr(&mut module.types, &mut module.sigs, &global.ty).map_err(|e| {
        e.with_context(format!("unsupported type for variable {}", global.name.name))
    })?;
    let size = module.types.size(ty);
    let align = module.types.align(ty);
    let addr = module.memory.alloc_global(size, align);

    let object = match global.name.object {
        Some(object) => object,
        None => {
            return_compiler_error!("global '{}' was not resolved", global.name.name);
        }
    };
    let vid = module.vars.add(Variable {
        name: global.name.name.clone(),
        orig: global.name.name.clone(),
        ty,
        full_ty: Some(ty),
        kind: VarKind::Global { addr },
    });
    module.variables_by_object.insert(object, vid);

    if let Some(init) = &global.init {
        match init {
            Expr::IntLit { text, location } => {
                if size != 4 {
                    return_layout_error!(
                        ErrorLocation::from_span(location),
                        "unsupported variable initialization of int of size {}",
                        size
                    );
                }
                let value = match parse_int_literal(text) {
                    Some(value) => value,
                    None => {
                        return_layout_error!(
                            ErrorLocation::from_span(location),
                            "couldn't parse int value '{}'",
                            text
                        );
                    }
                };
                module.memory.write_i32(addr, value as i32);
            }
            other => {
                return_layout_error!(
                    ErrorLocation::from_span(&other.location()),
                    "unsupported variable initialization for '{}'",
                    global.name.name
                );
            }
        }
    }

    if global.name.name == settings::FREE_POINTER_NAME {
        module.free_ptr_addr = Some(addr);
    }
    Ok(())
}

fn parse_int_literal(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or(digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

/// Package names come from the file path: drop the file name, drop a
/// leading `src/`. Files with no directory fall back to their package
/// clause.
fn package_name_from_path(path: &Path, fallback: &str) -> String {
    let parent = path
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let parent = parent.strip_prefix("src/").unwrap_or(&parent);
    if parent.is_empty() || parent == "src" {
        fallback.to_string()
    } else {
        parent.to_string()
    }
}
