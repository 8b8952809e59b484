use crate::compiler::compiler_errors::CompileError;
use crate::return_file_error;
use std::fs;
use std::path::Path;

/// Write the finished module text, creating the output directory if needed.
pub fn write_wast_module(text: &str, file_path: &Path) -> Result<(), CompileError> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() && fs::metadata(parent).is_err() {
            match fs::create_dir_all(parent) {
                Ok(_) => {}
                Err(e) => return_file_error!(file_path, "error creating output directory: {}", e),
            }
        }
    }

    match fs::write(file_path, text) {
        Ok(_) => Ok(()),
        Err(e) => return_file_error!(file_path, "error writing output file: {}", e),
    }
}
