//! End-to-end compilation tests through the public API.

use dcc::{CompilerConfig, OptPass, compile_file, compile_source};

const FIB: &str = "\
int fib(int n) {
    int a;
    int b;
    int t;
    b = 1;
    while (n > 0) {
        t = a + b;
        a = b;
        b = t;
        n -= 1;
    }
    return a;
}

void main() {
    callout(\"printf\", \"fib(10) = %d\\n\", fib(10));
}
";

const CLASSES: &str = "\
interface Shape {
    int area(int scale);
}

class Program implements Shape {
    int side;

    int area(int scale) {
        return side * side * scale;
    }

    void main() {
        side = 4;
        callout(\"printf\", \"area = %d\\n\", area(1));
    }
}
";

#[test]
fn test_fib_compiles_with_every_mask() {
    let masks = [
        CompilerConfig::new(),
        CompilerConfig::new().with_pass(OptPass::ConstantFolding),
        CompilerConfig::new().with_pass(OptPass::Cse),
        CompilerConfig::new().with_all_optimizations(),
    ];
    for config in masks {
        let artifacts = compile_source(FIB, "fib.dcf", &config).unwrap();
        assert!(artifacts.assembly.contains(".global fib"));
        assert!(artifacts.assembly.contains(".global main"));
        assert!(artifacts.assembly.contains("call fib"));
    }
}

#[test]
fn test_class_program_entry_point() {
    let artifacts = compile_source(CLASSES, "shape.dcf", &CompilerConfig::default()).unwrap();
    assert!(artifacts.assembly.contains(".global main"));
    assert!(artifacts.assembly.contains(".global area"));
    // the class field lives in static storage
    assert!(artifacts.assembly.contains(".lcomm side,8"));
}

#[test]
fn test_compile_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("fib.dcf");
    let output = dir.path().join("fib.s");
    std::fs::write(&input, FIB).unwrap();

    let config = CompilerConfig::new().with_all_optimizations();
    compile_file(&input, &output, &config).unwrap();

    let asm = std::fs::read_to_string(&output).unwrap();
    assert!(asm.starts_with(".file \"fib.dcf\""));
    assert!(asm.contains("enter $"));
    assert!(asm.contains(".string"));
}

#[test]
fn test_semantic_errors_leave_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.dcf");
    let output = dir.path().join("bad.s");
    std::fs::write(&input, "int a[5];\nvoid main() { a[7] = 0; }").unwrap();

    let err = compile_file(&input, &output, &CompilerConfig::default()).unwrap_err();
    assert!(err.contains("array 'a' index out of range. Max value: 5 but given 7."));
    assert!(!output.exists());
}

#[test]
fn test_runtime_bounds_check_on_dynamic_index() {
    let source = "\
int a[5];
void main() {
    int i;
    i = 4;
    a[i] = 9;
}
";
    let artifacts = compile_source(source, "arr.dcf", &CompilerConfig::default()).unwrap();
    let asm = &artifacts.assembly;
    assert!(asm.contains("cmp $5, %rsi"));
    assert!(asm.contains("$.BOUNDSMSG"));
    assert!(asm.contains("call printf"));
    assert!(asm.contains("call exit"));
}

#[test]
fn test_double_literals_are_interned_data() {
    let source = "\
void main() {
    double x;
    double y;
    x = 3.25;
    y = 3.25;
}
";
    let artifacts = compile_source(source, "dbl.dcf", &CompilerConfig::default()).unwrap();
    let asm = &artifacts.assembly;
    assert_eq!(asm.matches(".double 3.25").count(), 1);
    assert!(asm.contains("movsd"));
}
