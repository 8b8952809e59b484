//! Compiler-wide constants.
//!
//! Everything that would otherwise be a magic number or a magic name in the
//! middle of the pipeline lives here.

/// Default output path when `-o` is not given.
pub const DEFAULT_OUTPUT_FILE: &str = "out.wast";

/// Two spaces per nesting level in the emitted module.
pub const INDENT_PATTERN: &str = "  ";

/// Doc comments starting with this prefix are harvested as pragmas.
pub const PRAGMA_PREFIX: &str = "//wasm:";

/// Declared size of the module's linear memory, in bytes.
pub const STATIC_MEMORY_SIZE: u32 = 65536;

/// First usable static address. Address 0 is reserved so that a nil
/// dereference reads the zero word instead of a live global.
pub const STATIC_BASE_ADDR: u32 = 4;

/// Package whose calls become `call_import` instructions.
pub const RUNTIME_PACKAGE: &str = "wasm";

/// Package providing the user-level bump allocator.
pub const GC_PACKAGE: &str = "gowast/rt/gc";

/// Allocator entry point inside [`GC_PACKAGE`].
pub const ALLOC_FUNCTION: &str = "Alloc";

/// Magic global variable holding the heap bump cursor.
pub const FREE_POINTER_NAME: &str = "freePointer";

// Rough source-to-token ratio used to pre-size the token vector.
pub const SRC_TO_TOKEN_RATIO: usize = 6;
