pub mod compiler_errors;
pub mod compiler_dev_logging;
pub mod parsers;
pub mod wast_codegen;
