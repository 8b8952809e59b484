//! End-to-end tests: compile literal source programs and check the emitted
//! module text.
//!
//! Assertions run against a normalised form of the output — comments
//! stripped, whitespace collapsed — so they follow the expression structure
//! rather than the exact indentation. Tests that care about comments or
//! data segments look at the raw text instead.

use gowast::compile_sources;
use std::path::PathBuf;

fn compile(files: &[(&str, &str)]) -> String {
    let inputs: Vec<(PathBuf, String)> = files
        .iter()
        .map(|(path, source)| (PathBuf::from(path), source.to_string()))
        .collect();
    match compile_sources(&inputs, false) {
        Ok(output) => output,
        Err(e) => panic!("compile failed ({:?}): {}", e.error_type, e.msg),
    }
}

fn compile_err(files: &[(&str, &str)]) -> gowast::compiler::compiler_errors::CompileError {
    let inputs: Vec<(PathBuf, String)> = files
        .iter()
        .map(|(path, source)| (PathBuf::from(path), source.to_string()))
        .collect();
    match compile_sources(&inputs, false) {
        Ok(_) => panic!("expected a compile error"),
        Err(e) => e,
    }
}

/// Strip `;;` comments, collapse all whitespace, and glue closing parens to
/// their expressions, so structural fragments can be asserted with
/// `contains`.
fn flatten(output: &str) -> String {
    let mut out = String::new();
    for line in output.lines() {
        let code = match line.find(";;") {
            Some(i) => &line[..i],
            None => line,
        };
        out.push_str(code);
        out.push(' ');
    }
    let mut joined = out.split_whitespace().collect::<Vec<_>>().join(" ");
    while joined.contains(" )") {
        joined = joined.replace(" )", ")");
    }
    joined
}

/// The allocator runtime that user code links against.
const GC_SOURCE: (&str, &str) = (
    "src/gowast/rt/gc/gc.go",
    r#"package gc

var freePointer int32

//wasm:assert_return (invoke "Align" (i32.const 9) (i32.const 4)) (i32.const 12)
//wasm:assert_return (invoke "Align" (i32.const 16) (i32.const 4)) (i32.const 16)
func Align(addr, alignment int32) int32 {
	addr = addr + (alignment - 1)
	mask := ^(alignment - 1)
	addr = addr & mask
	return addr
}

func Alloc(size, align int32) int32 {
	mem := Align(freePointer, align)
	freePointer = mem + size
	return mem
}
"#,
);

#[test]
fn scalar_add_lowers_to_locals_and_add() {
    let output = compile(&[(
        "src/i32/add.go",
        "package i32\n\nfunc Add(a, b int32) int32 {\n\tc := a + b\n\treturn c\n}\n",
    )]);
    let flat = flatten(&output);

    assert!(flat.contains("(func $i32/Add (type $F0) (param $a i32) (param $b i32) (result i32)"));
    assert!(flat.contains("(local $function_Add_c i32)"));
    assert!(flat.contains("(set_local $function_Add_c (i32.add (get_local $a) (get_local $b)))"));
    assert!(flat.contains("(return (get_local $function_Add_c))"));
    assert!(flat.contains("(export \"Add\" $i32/Add)"));

    // Source echo comments trace each statement back to its input
    assert!(output.contains(";; c := a + b"));
    assert!(output.contains(";; return c"));
}

#[test]
fn unsigned_operands_pick_unsigned_compares() {
    let output = compile(&[(
        "src/u32/distance.go",
        "package u32\n\nfunc DistanceUnsigned(a, b uint32) uint32 {\n\tif a > b {\n\t\treturn a - b\n\t} else {\n\t\treturn b - a\n\t}\n}\n",
    )]);
    let flat = flatten(&output);

    assert!(flat.contains("(i32.gt_u (get_local $a) (get_local $b))"));
    assert!(!flat.contains("gt_s"));
    // Sub never carries a sign suffix
    assert!(flat.contains("(i32.sub (get_local $a) (get_local $b))"));
}

#[test]
fn signed_operands_pick_signed_compares_and_division() {
    let output = compile(&[(
        "src/i32/div.go",
        "package i32\n\nfunc Half(a int32) int32 {\n\tif a < 100 {\n\t\treturn a / 2\n\t}\n\treturn a\n}\n",
    )]);
    let flat = flatten(&output);
    assert!(flat.contains("(i32.lt_s"));
    assert!(flat.contains("(i32.div_s"));
}

#[test]
fn nested_for_loops_get_anchoring_blocks_and_fresh_labels() {
    let output = compile(&[(
        "src/loops/nested.go",
        "package loops\n\nfunc NestedLoop(a, b int32) int32 {\n\tsum := int32(0)\n\tfor i := int32(0); i < a; i++ {\n\t\tfor j := int32(0); j < b; j++ {\n\t\t\tsum = sum + 1\n\t\t}\n\t}\n\treturn sum\n}\n",
    )]);
    let flat = flatten(&output);

    // Outer loop: its init sits in the anchoring block before the loop
    assert!(flat.contains(
        "(block (set_local $loop_block1_i (i32.const 0)) (loop $loop2_break $loop2_continue"
    ));
    // Inner loop, with its own labels and its own init scope
    assert!(flat.contains(
        "(block (set_local $loop_block3_j (i32.const 0)) (loop $loop4_break $loop4_continue"
    ));
    // Condition guard: fall through on true, break out on false
    assert!(flat.contains(
        "(if_else (i32.lt_s (get_local $loop_block1_i) (get_local $a)) (nop) (br $loop2_break))"
    ));
    // Post and re-entry
    assert!(flat.contains("(br $loop2_continue)"));
    assert!(flat.contains("(br $loop4_continue)"));
    assert!(flat.contains(
        "(set_local $loop_block1_i (i32.add (get_local $loop_block1_i) (i32.const 1)))"
    ));
}

#[test]
fn struct_fields_load_and_store_through_pointer() {
    let output = compile(&[
        GC_SOURCE,
        (
            "src/mem/point.go",
            "package mem\n\nimport \"gowast/rt/gc\"\n\ntype Point struct {\n\tx, y int32\n}\n\nfunc F() int32 {\n\tp := &Point{}\n\tp.y = 5\n\tp.x = 17\n\treturn p.x\n}\n",
        ),
    ]);
    let flat = flatten(&output);

    // The literal allocates the struct: size 8, align 8
    assert!(flat.contains(
        "(set_local $function_F_p (call $gowast/rt/gc/Alloc (i32.const 8) (i32.const 8)))"
    ));
    // x at offset 0, y at offset 4
    assert!(flat.contains(
        "(i32.store (i32.add (get_local $function_F_p) (i32.const 4)) (i32.const 5))"
    ));
    assert!(flat.contains(
        "(i32.store (i32.add (get_local $function_F_p) (i32.const 0)) (i32.const 17))"
    ));
    assert!(flat.contains("(return (i32.load (i32.add (get_local $function_F_p) (i32.const 0))))"));
}

#[test]
fn field_access_works_through_pointer_parameters() {
    let output = compile(&[
        GC_SOURCE,
        (
            "src/mem/getx.go",
            "package mem\n\ntype Point struct {\n\tx, y int32\n}\n\nfunc GetX(p *Point) int32 {\n\treturn p.x\n}\n",
        ),
    ]);
    let flat = flatten(&output);
    assert!(flat.contains("(return (i32.load (i32.add (get_local $p) (i32.const 0))))"));
}

#[test]
fn indirect_calls_go_through_the_function_pointer_table() {
    let output = compile(&[(
        "src/fp/fp.go",
        "package fp\n\ntype IntFunc func() int32\n\nfunc twelve() int32 {\n\treturn 12\n}\n\nfunc CallIt() int32 {\n\tvar f IntFunc\n\tf = twelve\n\treturn f()\n}\n",
    )]);
    let flat = flatten(&output);

    // One structural signature shared by the named type and both functions
    assert_eq!(output.matches("(type $F0 (func").count(), 1);
    assert!(!output.contains("(type $F1"));
    assert!(flat.contains("(type $F0 (func (result i32)))"));
    // twelve is address-taken: index 0 in the table
    assert!(flat.contains("(table $fp/twelve)"));
    assert!(flat.contains("(set_local $function_CallIt_f (i32.const -1))"));
    assert!(flat.contains("(set_local $function_CallIt_f (i32.const 0))"));
    assert!(output.contains("function index for $fp/twelve"));
    assert!(output.contains("nil function pointer"));
    assert!(flat.contains("(call_indirect $F0 (get_local $function_CallIt_f))"));
}

#[test]
fn array_composite_literal_allocates_and_initialises_elements() {
    let output = compile(&[
        GC_SOURCE,
        (
            "src/arr/arr.go",
            "package arr\n\nimport \"gowast/rt/gc\"\n\nfunc Make() int32 {\n\ta := [...]int8{13, 15, 17}\n\treturn a\n}\n",
        ),
    ]);
    let flat = flatten(&output);

    // size = 3 elements * 1 byte, align = element alignment
    assert!(flat.contains(
        "(set_local $function_Make_a (call $gowast/rt/gc/Alloc (i32.const 3) (i32.const 1)))"
    ));
    // Element stores at offsets 0, 1, 2 of the fresh base address
    for (i, value) in [(0, 13), (1, 15), (2, 17)] {
        let store = format!(
            "(i32.store (i32.add (get_local $function_Make_a) (i32.mul (i32.const {}) (i32.const 1))) (i32.const {}))",
            i, value
        );
        assert!(flat.contains(&store), "missing store: {}", store);
    }
}

#[test]
fn globals_live_in_the_static_image_with_the_free_pointer_frozen_last() {
    let output = compile(&[
        GC_SOURCE,
        (
            "src/globals/globals.go",
            "package globals\n\nvar answer int32 = 17\n",
        ),
    ]);

    // freePointer at 4, answer at 8; the image is 12 bytes, and the
    // free-pointer cell holds that length after finalisation
    assert!(output.contains(";; @4 (size 4): var freePointer int32"));
    assert!(output.contains(";; @8 (size 4): var answer int32"));
    assert!(output.contains("(segment 0 \"\\00\\00\\00\\00\\0c\\00\\00\\00\\11\\00\\00\\00\")"));
    assert!(output.contains("(segment 12 \"\")"));
}

#[test]
fn global_reads_and_writes_go_through_their_static_address() {
    let output = compile(&[(
        "src/globals/counter.go",
        "package globals\n\nvar counter int32\n\nfunc Bump() int32 {\n\tcounter = counter + 1\n\treturn counter\n}\n",
    )]);
    let flat = flatten(&output);

    assert!(flat.contains(
        "(i32.store (i32.const 4) (i32.add (i32.load (i32.const 4)) (i32.const 1)))"
    ));
    assert!(output.contains("get_global counter"));
    assert!(output.contains("set_global counter"));
}

#[test]
fn exports_are_upper_case_names_plus_main() {
    let output = compile(&[(
        "src/app/app.go",
        "package app\n\nfunc main() {\n\thelper()\n}\n\nfunc helper() int32 {\n\treturn 1\n}\n\nfunc Public() int32 {\n\treturn 2\n}\n",
    )]);

    assert!(output.contains("(export \"main\" $app/main)"));
    assert!(output.contains("(export \"Public\" $app/Public)"));
    assert!(!output.contains("(export \"helper\""));
}

#[test]
fn cross_package_calls_resolve_through_the_import_map() {
    let output = compile(&[
        GC_SOURCE,
        (
            "src/app/grab.go",
            "package app\n\nimport \"gowast/rt/gc\"\n\nfunc Grab() int32 {\n\treturn gc.Alloc(16, 8)\n}\n",
        ),
    ]);
    let flat = flatten(&output);
    assert!(flat.contains("(call $gowast/rt/gc/Alloc (i32.const 16) (i32.const 8))"));
}

#[test]
fn runtime_calls_become_imports_emitted_once() {
    let output = compile(&[(
        "src/out/show.go",
        "package out\n\nimport \"gowast/rt/wasm\"\n\nfunc Show(n int32) {\n\twasm.Print_int32(n)\n\twasm.Print_int32(n)\n}\n",
    )]);
    let flat = flatten(&output);

    assert_eq!(
        output
            .matches("(import $Print_int32 \"spectest\" \"print\" (param i32))")
            .count(),
        1
    );
    assert!(flat.contains("(call_import $Print_int32 (get_local $n))"));
}

#[test]
fn int64_bitwise_ops_use_the_i64_machine_type() {
    let output = compile(&[(
        "src/bits/bits.go",
        "package bits\n\nfunc TestBitwise(a, b int64) int64 {\n\tr := (a | b) << 8\n\tr = r | (a & b)\n\treturn r\n}\n",
    )]);
    let flat = flatten(&output);

    assert!(flat.contains("(i64.shl (i64.or (get_local $a) (get_local $b)) (i64.const 8))"));
    assert!(flat.contains("(i64.and (get_local $a) (get_local $b))"));
}

#[test]
fn bitwise_complement_is_xor_with_all_ones() {
    let output = compile(&[(
        "src/bits/mask.go",
        "package bits\n\nfunc Mask(alignment int32) int32 {\n\tmask := ^(alignment - 1)\n\treturn mask\n}\n",
    )]);
    let flat = flatten(&output);
    assert!(flat.contains(
        "(i32.xor (i32.const -1) (i32.sub (get_local $alignment) (i32.const 1)))"
    ));
    assert!(output.contains("mask for bitwise complement"));
}

#[test]
fn dereference_loads_through_the_pointer() {
    let output = compile(&[(
        "src/mem/deref.go",
        "package mem\n\nfunc Deref(p *int32) int32 {\n\treturn *p\n}\n",
    )]);
    let flat = flatten(&output);
    assert!(flat.contains("(return (i32.load (get_local $p)))"));
}

#[test]
fn pointer_conversions_stay_plain_addresses() {
    let output = compile(&[(
        "src/mem/convert.go",
        "package mem\n\nimport \"unsafe\"\n\nfunc Convert(p uintptr) uintptr {\n\tq := unsafe.Pointer(p)\n\treturn uintptr(q)\n}\n",
    )]);
    let flat = flatten(&output);
    assert!(flat.contains("(set_local $function_Convert_q (get_local $p))"));
    assert!(flat.contains("(return (get_local $function_Convert_q))"));
}

#[test]
fn pragmas_appear_verbatim_in_source_order() {
    let output = compile(&[
        GC_SOURCE,
        (
            "src/app/main.go",
            "package app\n\n//wasm:invoke (invoke \"Main\")\nfunc Main() {\n}\n",
        ),
    ]);

    let first = output
        .find("(assert_return (invoke \"Align\" (i32.const 9) (i32.const 4)) (i32.const 12))")
        .expect("first pragma missing");
    let second = output
        .find("(assert_return (invoke \"Align\" (i32.const 16) (i32.const 4)) (i32.const 16))")
        .expect("second pragma missing");
    let invoke = output.find("(invoke \"Main\")").expect("invoke missing");
    assert!(first < second);
    assert!(second < invoke);
    // Pragmas come after the module closes
    let module_end = output.find(") ;; end Go package").unwrap();
    assert!(first > module_end);
}

#[test]
fn output_is_deterministic() {
    let files = [
        GC_SOURCE,
        (
            "src/mem/point.go",
            "package mem\n\nimport \"gowast/rt/gc\"\n\ntype Point struct {\n\tx, y int32\n}\n\nfunc F() int32 {\n\tp := &Point{}\n\tp.x = 17\n\treturn p.x\n}\n",
        ),
        (
            "src/out/show.go",
            "package out\n\nimport \"gowast/rt/wasm\"\n\nfunc Show(n int32) {\n\twasm.Print_int32(n)\n}\n",
        ),
    ];
    let a = compile(&files);
    let b = compile(&files);
    assert_eq!(a, b);
}

#[test]
fn equivalent_signatures_are_interned_once() {
    let output = compile(&[(
        "src/sig/sig.go",
        "package sig\n\nfunc A(x int32) int32 {\n\treturn x\n}\n\nfunc B(y int32) int32 {\n\treturn y\n}\n\nfunc C() {\n}\n",
    )]);

    assert_eq!(
        output
            .matches("(type $F0 (func (param i32) (result i32)))")
            .count(),
        1
    );
    assert_eq!(output.matches("(type $F1 (func))").count(), 1);
    let flat = flatten(&output);
    assert!(flat.contains("(func $sig/A (type $F0)"));
    assert!(flat.contains("(func $sig/B (type $F0)"));
    assert!(flat.contains("(func $sig/C (type $F1)"));
}

#[test]
fn multi_value_returns_are_rejected() {
    let e = compile_err(&[(
        "src/bad/multi.go",
        "package bad\n\nfunc Two() (int32, int32) {\n\treturn 1, 2\n}\n",
    )]);
    assert_eq!(
        e.error_type,
        gowast::compiler::compiler_errors::ErrorType::Unsupported
    );
}

#[test]
fn for_without_init_is_rejected() {
    let e = compile_err(&[(
        "src/bad/forloop.go",
        "package bad\n\nfunc Spin(a int32) int32 {\n\tfor a > 0 {\n\t\ta--\n\t}\n\treturn a\n}\n",
    )]);
    assert_eq!(
        e.error_type,
        gowast::compiler::compiler_errors::ErrorType::Unsupported
    );
}

#[test]
fn if_with_init_clause_is_rejected() {
    let e = compile_err(&[(
        "src/bad/ifinit.go",
        "package bad\n\nfunc F(a int32) int32 {\n\tif b := a; b > 0 {\n\t\treturn b\n\t}\n\treturn 0\n}\n",
    )]);
    assert_eq!(
        e.error_type,
        gowast::compiler::compiler_errors::ErrorType::Unsupported
    );
}

#[test]
fn unknown_scalar_names_are_a_layout_error() {
    let e = compile_err(&[(
        "src/bad/scalar.go",
        "package bad\n\nfunc F(s string) {\n}\n",
    )]);
    assert_eq!(
        e.error_type,
        gowast::compiler::compiler_errors::ErrorType::Layout
    );
}

#[test]
fn undefined_identifiers_are_a_rule_error() {
    let e = compile_err(&[(
        "src/bad/undef.go",
        "package bad\n\nfunc F() int32 {\n\treturn missing\n}\n",
    )]);
    assert_eq!(
        e.error_type,
        gowast::compiler::compiler_errors::ErrorType::Rule
    );
}

#[test]
fn missing_alloc_function_is_a_link_error() {
    // No gc package in the compilation: composite literals can't allocate
    let e = compile_err(&[(
        "src/bad/noalloc.go",
        "package bad\n\ntype Point struct {\n\tx int32\n}\n\nfunc F() {\n\tp := &Point{}\n\tp.x = 1\n}\n",
    )]);
    assert_eq!(
        e.error_type,
        gowast::compiler::compiler_errors::ErrorType::Link
    );
}

#[test]
fn module_layout_follows_the_fixed_order() {
    let output = compile(&[
        GC_SOURCE,
        (
            "src/out/show.go",
            "package out\n\nimport \"gowast/rt/wasm\"\n\nfunc Show(n int32) {\n\twasm.Print_int32(n)\n}\n",
        ),
    ]);

    let memory = output.find("(memory ").unwrap();
    let globals = output.find(";; Global variables").unwrap();
    let types = output.find("(type $F0").unwrap();
    let imports = output.find("(import $Print_int32").unwrap();
    let funcs = output.find("(func $gowast/rt/gc/Align").unwrap();
    let exports = output.find("(export ").unwrap();
    assert!(memory < globals);
    assert!(globals < types);
    assert!(types < imports);
    assert!(imports < funcs);
    assert!(funcs < exports);
}
