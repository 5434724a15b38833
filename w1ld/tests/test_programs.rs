use w1ld::{constants::Word, prelude::*};

fn run_with(source: &str, args: &[&str], host: BufferHost) -> W1ldResult<(Word, BufferHost)> {
    let program = compile(source)?;
    let mut vm = Vm::with_host(VmConf::default(), host)?;
    vm.load_program(&program, args)?;
    let code = vm.execute()?;
    Ok((code, vm.into_host()))
}

fn run(source: &str) -> (Word, String) {
    match run_with(source, &["test"], BufferHost::new()) {
        Ok((code, host)) => (code, host.output_str().into_owned()),
        Err(err) => panic!("{err}"),
    }
}

fn exit_code(source: &str) -> Word {
    run(source).0
}

#[test]
fn test_precedence() {
    assert_eq!(exit_code("int main() { return 1 + 2 * 3; }"), 7);
    assert_eq!(exit_code("int main() { return (1 + 2) * 3; }"), 9);
    assert_eq!(exit_code("int main() { return 1 << 2 + 1; }"), 8);
    assert_eq!(exit_code("int main() { return 10 - 4 - 3; }"), 3);
    assert_eq!(exit_code("int main() { return 1 | 6 & 3 ^ 1; }"), 3);
    assert_eq!(exit_code("int main() { return !0 + ~0; }"), 0);
}

#[test]
fn test_short_circuit() {
    let source = r#"
        int calls;
        int fail() { calls = calls + 1; return 0; }
        int main() {
            int a; int b;
            a = 1 || fail();
            b = 0 && fail();
            printf("%d %d %d\n", a, b, calls);
            return a;
        }
    "#;
    assert_eq!(run(source), (1, "1 0 0\n".to_string()));
}

#[test]
fn test_logical_operators_yield_zero_or_one() {
    assert_eq!(exit_code("int main() { return 0 || 0 || 3; }"), 1);
    assert_eq!(exit_code("int main() { return 2 && 5; }"), 1);
    assert_eq!(exit_code("int main() { return 7 && 0; }"), 0);
    assert_eq!(exit_code("int main() { return -4 || 0; }"), 1);
    assert_eq!(exit_code("int main() { return (0 || 9) + (3 && 4); }"), 2);
}

#[test]
fn test_control_flow() {
    assert_eq!(
        exit_code("int f() { if (1) return 1; return 0; }\nint main() { return f(); }"),
        1
    );
    assert_eq!(
        exit_code(
            "int main() { int i; int s; i = 1; s = 0; while (i <= 5) { s = s + i; i = i + 1; } return s; }"
        ),
        15
    );

    let (code, output) = run(include_str!("../programs/control.c"));
    assert_eq!(code, 15);
    assert_eq!(output, "0 5 6\n-1 0 1\n100 0\n");
}

#[test]
fn test_division() {
    assert_eq!(exit_code("int main() { return 7 / 2; }"), 3);
    assert_eq!(exit_code("int main() { return -7 / 2; }"), -3);
    assert_eq!(exit_code("int main() { return -7 % 2; }"), -1);
}

#[test]
fn test_pointer_scaling() {
    let (code, output) = run(include_str!("../programs/pointers.c"));
    assert_eq!(code, 90);
    assert_eq!(output, "90 2 8\n1\n40\n7 8\n");
}

#[test]
fn test_increments() {
    let source = r#"
        int main() {
            int x; int y;
            x = 5;
            y = x++;
            printf("%d %d ", x, y);
            y = --x;
            printf("%d %d\n", x, y);
            return x;
        }
    "#;
    assert_eq!(run(source), (5, "6 5 5 5\n".to_string()));
}

#[test]
fn test_recursion() {
    let (code, output) = run(include_str!("../programs/fib.c"));
    assert_eq!(code, 610);
    assert!(output.starts_with("fib(0) = 0\nfib(1) = 1\nfib(2) = 1\n"));
    assert!(output.ends_with("fib(10) = 55\n"));
}

#[test]
fn test_strings_and_memory() {
    let (code, output) = run(include_str!("../programs/strings.c"));
    assert_eq!(code, 1);
    assert_eq!(output, "hello, world|12|xxx\n1\n");
}

#[test]
fn test_char_literals() {
    assert_eq!(exit_code("int main() { return 'a'; }"), 97);
    // Only the last character of a long literal is kept.
    assert_eq!(exit_code("int main() { return 'ab'; }"), 98);
    assert_eq!(exit_code("int main() { return '\\n'; }"), 10);
    assert_eq!(exit_code("int main() { return '\\q'; }"), 'q' as Word);
}

#[test]
fn test_fall_off_returns_zero() {
    assert_eq!(exit_code("int main() { int x; x = 3; }"), 0);
}

#[test]
fn test_exit_builtin() {
    let source = r#"
        int main() {
            printf("before\n");
            exit(3);
            printf("after\n");
            return 0;
        }
    "#;
    assert_eq!(run(source), (3, "before\n".to_string()));
}

#[test]
fn test_argv() {
    let (code, host) = run_with(
        include_str!("../programs/args.c"),
        &["args.c", "a", "bc"],
        BufferHost::new(),
    )
    .unwrap();
    assert_eq!(code, 3);
    assert_eq!(host.output_str(), "0:args.c\n1:a\n2:bc\n");
}

#[test]
fn test_file_builtins() {
    let host = BufferHost::new().with_file("input.txt", "some text\n");
    let (code, host) = run_with(include_str!("../programs/files.c"), &["files.c"], host).unwrap();
    assert_eq!(code, -1);
    assert_eq!(host.output_str(), "read 10: some text\n");
    assert_eq!(host.open_count(), 0);
}

#[test]
fn test_printf_many_args() {
    let source = r#"
        int main() {
            printf("%d %d %d %d %d\n", 1, 2, 3, 4, 5);
            return printf("%5s|%-3d|%x\n", "ab", 7, 255);
        }
    "#;
    assert_eq!(
        run(source),
        (13, "1 2 3 4 5\n   ab|7  |ff\n".to_string())
    );
}

#[test]
fn test_globals_and_chars() {
    let source = r#"
        char c;
        int n, *p;
        int main() {
            c = 300;
            n = 2;
            p = &n;
            *p = *p + c;
            return n;
        }
    "#;
    // 300 truncates to 44 in a char.
    assert_eq!(exit_code(source), 46);
}

#[test]
fn test_vms_are_independent() {
    let a = compile("int main() { return 1; }").unwrap();
    let b = compile("int g; int main() { g = 2; return g; }").unwrap();

    let mut vm_a = Vm::with_host(VmConf::default(), BufferHost::new()).unwrap();
    let mut vm_b = Vm::with_host(VmConf::default(), BufferHost::new()).unwrap();
    vm_a.load_program(&a, &["a"]).unwrap();
    vm_b.load_program(&b, &["b"]).unwrap();

    assert_eq!(vm_b.execute().unwrap(), 2);
    assert_eq!(vm_a.execute().unwrap(), 1);

    // Reloading resets the machine.
    vm_b.load_program(&b, &["b"]).unwrap();
    assert_eq!(vm_b.execute().unwrap(), 2);
}
