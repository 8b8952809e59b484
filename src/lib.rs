//! gowast compiles a small, statically-typed Go subset into the textual
//! s-expression form of a WASM module.
//!
//! The library entry point is [`compile_sources`]: it runs the frontend
//! (tokenizer, parser, resolver) over each input, links all files into one
//! module in two passes, and returns the printed module text. The `gowast`
//! binary wraps it with file I/O and flags.

pub mod compiler;
pub mod file_output;
pub mod settings;

use crate::compiler::compiler_errors::CompileError;
use crate::compiler::parsers::ast_nodes::ObjectTable;
use crate::compiler::parsers::build_ast::parse_file;
use crate::compiler::parsers::resolver::resolve_file;
use crate::compiler::parsers::tokenizer::tokenize;
use crate::compiler::wast_codegen::linker::ModuleLinker;
use std::path::{Path, PathBuf};

/// Compile already-read sources, in command-line order. Returns the full
/// module text.
pub fn compile_sources(
    inputs: &[(PathBuf, String)],
    dump_ast: bool,
) -> Result<String, CompileError> {
    let mut objects = ObjectTable::new();
    let mut linker = ModuleLinker::new();

    for (path, source) in inputs {
        let tokens = tokenize(source).map_err(|e| e.with_file_path(path))?;
        let mut file = parse_file(path, source.clone(), tokens)?;
        resolve_file(&mut file, &mut objects).map_err(|e| e.with_file_path(path))?;

        if dump_ast {
            eprintln!("{:#?}", file);
        }
        ast_log!("{:#?}", file);

        linker.add_source_file(file)?;
    }

    linker.finalize()?;
    Ok(linker.print())
}

/// Read and compile the given files.
pub fn compile_files(paths: &[PathBuf], dump_ast: bool) -> Result<String, CompileError> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let source = read_source(path)?;
        inputs.push((path.clone(), source));
    }
    compile_sources(&inputs, dump_ast)
}

fn read_source(path: &Path) -> Result<String, CompileError> {
    std::fs::read_to_string(path)
        .map_err(|e| CompileError::file_error(path, format!("error reading source file: {}", e)))
}
