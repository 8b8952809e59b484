use colour::{e_red_ln, green_ln_bold, grey_ln};
use gowast::compiler::compiler_errors::print_formatted_error;
use gowast::{compile_files, file_output, settings};
use std::env;
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

struct Flags {
    dump_ast: bool,
    verbose: bool,
    out_file: PathBuf,
    inputs: Vec<PathBuf>,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let flags = match parse_flags(&args[1..]) {
        Ok(flags) => flags,
        Err(e) => {
            e_red_ln!("{}", e);
            print_help();
            exit(1);
        }
    };

    if flags.inputs.is_empty() {
        print_help();
        return;
    }

    let start = Instant::now();
    let output = match compile_files(&flags.inputs, flags.dump_ast) {
        Ok(output) => output,
        Err(e) => {
            e_red_ln!("Errors while compiling:\n");
            print_formatted_error(&e);
            exit(1);
        }
    };

    if flags.verbose {
        eprintln!("--- begin WASM output\n{}\n--- end WASM output", output);
    }

    if let Err(e) = file_output::write_wast_module(&output, &flags.out_file) {
        print_formatted_error(&e);
        exit(1);
    }

    grey_ln!("------------------------------------");
    print!("Output written to '{}' in: ", flags.out_file.display());
    green_ln_bold!("{:?}", start.elapsed());
}

fn parse_flags(args: &[String]) -> Result<Flags, String> {
    let mut flags = Flags {
        dump_ast: false,
        verbose: false,
        out_file: PathBuf::from(settings::DEFAULT_OUTPUT_FILE),
        inputs: Vec::new(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-d" => flags.dump_ast = true,
            "-v" => flags.verbose = true,
            "-o" => {
                i += 1;
                match args.get(i) {
                    Some(path) if !path.is_empty() => flags.out_file = PathBuf::from(path),
                    _ => return Err("'-o' needs an output path".to_string()),
                }
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown flag: {}", other));
            }
            input => flags.inputs.push(PathBuf::from(input)),
        }
        i += 1;
    }
    Ok(flags)
}

fn print_help() {
    green_ln_bold!("The gowast compiler!");
    println!("Usage: gowast [flags] <input.go>...");
    println!("  -d         - print the parsed AST to stderr");
    println!("  -v         - print the WASM output to stderr");
    println!("  -o <path>  - output file (default {})", settings::DEFAULT_OUTPUT_FILE);
}
