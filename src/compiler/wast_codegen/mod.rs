//! Lowering of resolved ASTs into a textual s-expression WASM module.
//!
//! The pipeline runs in two passes over all input files: pass 1
//! ([`linker::ModuleLinker::add_source_file`]) builds symbol tables and
//! declarations, pass 2 ([`linker::ModuleLinker::finalize`]) lowers function
//! bodies. Emission walks the finished module in a fixed order, so the same
//! inputs always produce byte-identical output.

pub mod emitter;
pub mod expressions;
pub mod functions;
pub mod imports;
pub mod linker;
pub mod signatures;
pub mod statements;
pub mod static_memory;
pub mod types;
pub mod vars;
pub mod wast_expr;

/// `$<pkg>/<name>` - package-qualified function symbol.
pub fn mangle_function_name(pkg: &str, name: &str) -> String {
    format!("${}/{}", pkg, name)
}

/// `$<scope>_<name>` - scope-qualified local variable symbol.
pub fn mangle_local_name(scope: &str, name: &str) -> String {
    format!("${}_{}", scope, name)
}

/// `$<name>` - unscoped symbol (parameters, imports).
pub fn mangle_plain_name(name: &str) -> String {
    format!("${}", name)
}
