//! Unified error handling for the gowast compiler.
//!
//! Every fallible stage of the pipeline (tokenizing, parsing, resolving,
//! lowering, linking, file I/O) returns a [`CompileError`]. The error carries
//! an [`ErrorLocation`] with the source file plus start/end positions, and an
//! [`ErrorType`] classifying the failure:
//!
//! - **Syntax**: malformed source that the tokenizer or parser rejected
//! - **Rule**: unresolved identifiers and other semantic violations
//! - **Type**: conversions or operations the type rules reject
//! - **Unsupported**: constructs outside the accepted language subset
//!   (multi-value returns, `for` without an init clause, `if` with an init
//!   clause, unknown LHS forms, ...)
//! - **Layout**: type layout failures (unknown scalar names, zero-field
//!   structs, unrepresentable initialisers)
//! - **Link**: function or runtime import symbols that cannot be resolved
//! - **File**: file system problems
//! - **Compiler**: internal bugs, never the user's fault
//!
//! Lowering routines attach context by wrapping messages ("error parsing
//! arg #0: ..."); the linker attaches the file path via
//! [`CompileError::with_file_path`] so the individual routines don't have to
//! thread it through.

use crate::compiler::parsers::tokens::{CharPosition, TextLocation};
use colour::{e_magenta_ln, e_red_ln, e_yellow_ln};
use std::path::{Path, PathBuf};

/// A source range owned by the error itself, so errors can outlive every
/// table that produced them.
#[derive(Debug, Clone, Default)]
pub struct ErrorLocation {
    pub file: PathBuf,
    pub start: CharPosition,
    pub end: CharPosition,
}

impl ErrorLocation {
    pub fn new(file: PathBuf, start: CharPosition, end: CharPosition) -> ErrorLocation {
        ErrorLocation { file, start, end }
    }

    /// Location with no file attached yet; the linker fills it in later.
    pub fn from_span(location: &TextLocation) -> ErrorLocation {
        ErrorLocation {
            file: PathBuf::new(),
            start: location.start,
            end: location.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    Syntax,
    Rule,
    Type,
    Unsupported,
    Layout,
    Link,
    File,
    Compiler,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::Syntax => "Syntax Error",
        ErrorType::Rule => "Language Rule Violation",
        ErrorType::Type => "Type Error",
        ErrorType::Unsupported => "Unsupported Construct",
        ErrorType::Layout => "Type Layout Error",
        ErrorType::Link => "Link Error",
        ErrorType::File => "File Error",
        ErrorType::Compiler => "Compiler Bug",
    }
}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub msg: String,
    pub location: ErrorLocation,
    pub error_type: ErrorType,
}

impl CompileError {
    pub fn new(
        msg: impl Into<String>,
        location: ErrorLocation,
        error_type: ErrorType,
    ) -> CompileError {
        CompileError {
            msg: msg.into(),
            location,
            error_type,
        }
    }

    /// Attach the source file path if nothing earlier in the pipeline did.
    pub fn with_file_path(mut self, file_path: &Path) -> Self {
        if self.location.file.as_os_str().is_empty() {
            self.location.file = file_path.to_path_buf();
        }
        self
    }

    /// Prefix the message with more context, keeping location and kind.
    pub fn with_context(mut self, context: impl AsRef<str>) -> Self {
        self.msg = format!("{}: {}", context.as_ref(), self.msg);
        self
    }

    pub fn file_error(path: &Path, msg: impl Into<String>) -> Self {
        CompileError {
            msg: msg.into(),
            location: ErrorLocation::new(
                path.to_path_buf(),
                CharPosition::default(),
                CharPosition::default(),
            ),
            error_type: ErrorType::File,
        }
    }

    pub fn compiler_error(msg: impl Into<String>) -> Self {
        CompileError {
            msg: msg.into(),
            location: ErrorLocation::default(),
            error_type: ErrorType::Compiler,
        }
    }
}

pub fn print_formatted_error(e: &CompileError) {
    e_red_ln!("{}", error_type_to_str(&e.error_type));
    if !e.location.file.as_os_str().is_empty() {
        e_magenta_ln!(
            "{}:{}:{}",
            e.location.file.display(),
            e.location.start.line,
            e.location.start.column
        );
    }
    e_yellow_ln!("{}", e.msg);
}

pub fn print_errors(errors: &[CompileError]) {
    for e in errors {
        print_formatted_error(e);
    }
}

/// Returns a new Syntax CompileError.
///
/// Usage: `return_syntax_error!(location, "message {}", args)`
#[macro_export]
macro_rules! return_syntax_error {
    ($location:expr, $($msg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::new(
            format!($($msg)*),
            $location,
            $crate::compiler::compiler_errors::ErrorType::Syntax,
        ))
    };
}

/// Returns a new Rule CompileError (unresolved symbols and friends).
///
/// Usage: `return_rule_error!(location, "message {}", args)`
#[macro_export]
macro_rules! return_rule_error {
    ($location:expr, $($msg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::new(
            format!($($msg)*),
            $location,
            $crate::compiler::compiler_errors::ErrorType::Rule,
        ))
    };
}

/// Returns a new Type CompileError.
#[macro_export]
macro_rules! return_type_error {
    ($location:expr, $($msg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::new(
            format!($($msg)*),
            $location,
            $crate::compiler::compiler_errors::ErrorType::Type,
        ))
    };
}

/// Returns a new Unsupported CompileError. Name the construct in the message.
#[macro_export]
macro_rules! return_unsupported_error {
    ($location:expr, $($msg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::new(
            format!($($msg)*),
            $location,
            $crate::compiler::compiler_errors::ErrorType::Unsupported,
        ))
    };
}

/// Returns a new Layout CompileError.
#[macro_export]
macro_rules! return_layout_error {
    ($location:expr, $($msg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::new(
            format!($($msg)*),
            $location,
            $crate::compiler::compiler_errors::ErrorType::Layout,
        ))
    };
}

/// Returns a new Link CompileError.
#[macro_export]
macro_rules! return_link_error {
    ($location:expr, $($msg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::new(
            format!($($msg)*),
            $location,
            $crate::compiler::compiler_errors::ErrorType::Link,
        ))
    };
}

/// Returns a new File CompileError.
///
/// Usage: `return_file_error!(path, "message {}", args)`
#[macro_export]
macro_rules! return_file_error {
    ($path:expr, $($msg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::file_error(
            $path,
            format!($($msg)*),
        ))
    };
}

/// Returns a new Compiler CompileError (internal bug, not the user's fault).
#[macro_export]
macro_rules! return_compiler_error {
    ($($msg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompileError::compiler_error(
            format!($($msg)*),
        ))
    };
}
