use w1ld::{compiler::tokenize, constants::Word, prelude::*};

fn run(source: &str) -> W1ldResult<Word> {
    let program = compile(source)?;
    let mut vm = Vm::with_host(VmConf::default(), BufferHost::new())?;
    vm.load_program(&program, &["test"])?;
    vm.execute()
}

#[test]
fn test_undeclared_identifier() {
    let err = run("int main() {\n  return missing + 1;\n}").unwrap_err();
    assert_eq!(err.kind(), "parse error");
    assert_eq!(
        err.to_string(),
        "parse error: line 2: undeclared identifier 'missing'"
    );
    assert_ne!(err.exit_code(), 0);
}

#[test]
fn test_missing_source_file() {
    let err = load_source("programs/does-not-exist.c").unwrap_err();
    assert!(matches!(err, W1ldError::SourceIo(_)));
    assert!(err.to_string().starts_with("source io error"));
    assert_ne!(err.exit_code(), 0);
}

#[test]
fn test_load_source() {
    let source = load_source(concat!(env!("CARGO_MANIFEST_DIR"), "/programs/fib.c")).unwrap();
    assert!(compile(source).is_ok());
}

#[test]
fn test_division_by_zero() {
    let err = run("int main() { int z; z = 0; return 1 / z; }").unwrap_err();
    assert!(matches!(err, W1ldError::DivisionByZero { .. }));
    assert_ne!(err.exit_code(), 0);
}

#[test]
fn test_unknown_opcode() {
    let program = Program {
        text: vec![Opcode::PUSH.as_word(), Opcode::EXIT.as_word(), -5].into_boxed_slice(),
        data: vec![0; 8].into_boxed_slice(),
        entry: 2,
    };
    let mut vm = Vm::with_host(VmConf::default(), BufferHost::new()).unwrap();
    vm.load_program(&program, &["test"]).unwrap();

    let err = vm.execute().unwrap_err();
    assert_eq!(err.kind(), "runtime decode error");
    assert_eq!(err.to_string(), "runtime decode error: unknown instruction -5 at 0002");
}

#[test]
fn test_lex_error() {
    let err = compile("int main() {\n\n  return 1 @ 2;\n}").unwrap_err();
    assert_eq!(err.to_string(), "lex error: line 3: unknown character '@'");

    let err = compile("int main() { printf(\"oops); }").unwrap_err();
    assert!(matches!(err, W1ldError::Lex(_)));
}

#[test]
fn test_parse_errors() {
    let cases = [
        ("int main() { return 1 }", "semicolon expected"),
        ("int main() { if 1) return 0; }", "open paren expected"),
        ("int main() { return (1; }", "close paren expected"),
        ("int main() { int x; return x[0]; }", "pointer type expected"),
        ("int main() { return main; }", "function 'main' used as a value"),
        ("int x; int main() { return x(); }", "'x' is not a function"),
        ("int main() { return 1 ? 2 3; }", "conditional missing colon"),
        ("enum { A = x };", "bad enum initializer"),
        ("int f() { return 0; }", "main() not defined"),
        ("int main() { return 0;", "unexpected end of input in function body"),
    ];

    for (source, message) in cases {
        match compile(source) {
            Err(W1ldError::Parse(err)) => {
                assert!(err.message.contains(message), "{source}: {}", err.message)
            }
            Err(err) => panic!("{source}: expected parse error, got {err}"),
            Ok(_) => panic!("{source}: expected parse error"),
        }
    }
}

#[test]
fn test_codegen_overflow() {
    let conf = CompileConf {
        pool_size: 64,
        ..Default::default()
    };
    let source = "int main() { return 1 + 2 + 3 + 4 + 5 + 6 + 7 + 8 + 9; }";
    let err = compile_with(source, conf).unwrap_err();
    assert_eq!(err.kind(), "codegen overflow");
}

#[test]
fn test_stack_exhausted() {
    let err = run("int f(int n) { return f(n + 1); }\nint main() { return f(0); }").unwrap_err();
    assert!(matches!(err, W1ldError::Resource(ResourceError::Stack { .. })), "{err}");
}

#[test]
fn test_null_dereference() {
    let err = run("int main() { int *p; p = 0; return *p; }").unwrap_err();
    assert_eq!(err.kind(), "runtime resource error");
}

#[test]
fn test_lexer_determinism() {
    let source = include_str!("../programs/strings.c");
    let (first, symbols_a) = tokenize(source).unwrap();
    let (second, symbols_b) = tokenize(source).unwrap();
    assert_eq!(first, second);
    assert_eq!(symbols_a.len(), symbols_b.len());
}

#[test]
fn test_symbol_uniqueness() {
    let source = include_str!("../programs/fib.c");
    let (_, symbols) = tokenize(source).unwrap();

    let names: Vec<&str> = symbols.iter().map(|symbol| symbol.name.as_str()).collect();
    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(names.len(), unique.len());
    assert!(names.contains(&"fib"));
}
