use cc8::{compile_file, compile_str, Options};
use std::{env, fs, path::PathBuf};

/// Compila y normaliza el ensamblador a una instrucción por línea con
/// espacios simples.
fn compile(source: &str) -> Vec<String> {
    let compiled = match compile_str(source, &Options::default()) {
        Ok(compiled) => compiled,
        Err(diagnostics) => panic!("compilation failed:\n{}", diagnostics),
    };

    normalize(&compiled.assembly)
}

fn normalize(assembly: &str) -> Vec<String> {
    assembly
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

fn errors(source: &str) -> String {
    match compile_str(source, &Options::default()) {
        Ok(_) => panic!("compilation of {:?} should fail", source),
        Err(diagnostics) => diagnostics.to_string(),
    }
}

/// Determina si `expected` aparece de forma contigua en `lines`.
fn contains_sequence(lines: &[String], expected: &[&str]) -> bool {
    lines
        .windows(expected.len())
        .any(|window| window.iter().zip(expected).all(|(line, expected)| line == expected))
}

fn function<'a>(lines: &'a [String], name: &str) -> &'a [String] {
    let label = format!("{}:", name);
    let exit = format!("{}_exit:", name);

    let start = lines.iter().position(|line| *line == label).unwrap();
    let end = lines.iter().position(|line| *line == exit).unwrap();

    &lines[start..=end + 1]
}

#[test]
fn minimal_program() {
    let lines = compile("char main() { return 5; }");

    let expected = [
        "#bank RAM",
        "#addr 0x8000",
        "__start:",
        "call main",
        "__halt:",
        "jmp __halt",
        "main:",
        "mov a, 5",
        "jmp main_exit",
        "main_exit:",
        "ret",
        "heap_start:",
    ];

    assert_eq!(lines, expected);
}

#[test]
fn origin_and_prelude() {
    let options = Options {
        origin: 0x1234,
        prelude: Some("cpu.asm".to_string()),
    };

    let compiled = compile_str("char main() { return 0; }", &options).ok().unwrap();
    let lines = normalize(&compiled.assembly);

    assert_eq!(lines[0], "#include \"cpu.asm\"");
    assert_eq!(lines[1], "#bank RAM");
    assert_eq!(lines[2], "#addr 0x1234");
}

#[test]
fn local_variable_round_trip() {
    let lines = compile("char main() { char a = 3; return a; }");

    assert!(contains_sequence(
        &lines,
        &[
            "main:",
            "mov sp, sp-1",
            "mov a, 3",
            "mov [sp+0], a",
            "mov a, [sp+0]",
            "jmp main_exit",
            "main_exit:",
            "mov sp, sp+1",
            "ret",
        ]
    ));
}

#[test]
fn assignment_stores_then_reloads() {
    let lines = compile("char main() { char a; a = 3; return a; }");

    assert!(contains_sequence(
        &lines,
        &["mov a, 3", "mov [sp+0], a", "mov a, [sp+0]", "jmp main_exit"]
    ));
}

#[test]
fn call_result_arrives_in_accumulator() {
    let lines = compile("char f(char x) { return x + 1; } char main() { return f(5); }");

    assert!(contains_sequence(
        &lines,
        &["f:", "mov a, [sp+2]", "mov b, 1", "add b", "jmp f_exit"]
    ));

    assert!(contains_sequence(
        &lines,
        &["push a", "call f", "mov sp, sp+1", "jmp main_exit"]
    ));
}

#[test]
fn bounded_loop() {
    let source = "char main() { char n = 0; while (n <= 13) { n = n + 1; } return n; }";
    let lines = compile(source);

    assert!(contains_sequence(
        &lines,
        &[
            ".while_start_0:",
            "mov a, [sp+0]",
            "mov b, 13",
            "cmp b",
            "jc .cmp_less_equal_false_0",
            "jmp .cmp_less_equal_true_0",
        ]
    ));

    assert!(contains_sequence(
        &lines,
        &[".cmp_less_equal_exit_0:", "cmp 0", "je .while_exit_0"]
    ));

    assert!(contains_sequence(
        &lines,
        &["jmp .while_start_0", ".while_exit_0:"]
    ));
}

#[test]
fn call_pushes_arguments_and_cleans_up() {
    let lines = compile("char f(char x) { return x; } char main() { return f(5); }");

    assert_eq!(
        function(&lines, "f"),
        ["f:", "mov a, [sp+2]", "jmp f_exit", "f_exit:", "ret"]
    );

    assert!(contains_sequence(
        &lines,
        &["main:", "mov a, 5", "push a", "call f", "mov sp, sp+1", "jmp main_exit"]
    ));
}

#[test]
fn live_registers_survive_calls() {
    let source = "char f(char x) { return x; } char main() { char a = 1; return a + f(2); }";
    let lines = compile(source);

    assert!(contains_sequence(
        &lines,
        &[
            "mov a, [sp+0]",
            "push a",
            "mov a, 2",
            "push a",
            "call f",
            "mov sp, sp+1",
            "mov b, a",
            "pop a",
            "add b",
        ]
    ));
}

#[test]
fn loop_labels_are_unique() {
    let source = "char main() { char i = 2; while (i) { i = i - 1; } while (i) { } return i; }";
    let lines = compile(source);

    for n in 0..2 {
        for label in ["start", "contents", "exit"] {
            let label = format!(".while_{}_{}:", label, n);
            assert_eq!(lines.iter().filter(|line| **line == label).count(), 1);
        }
    }

    assert!(contains_sequence(
        &lines,
        &[
            ".while_start_0:",
            "mov a, [sp+0]",
            "cmp 0",
            "je .while_exit_0",
            ".while_contents_0:",
        ]
    ));
}

#[test]
fn if_else_layout() {
    let source = "char main() { char x = 1; if (x) x = 2; else x = 3; return x; }";
    let lines = compile(source);

    let position = |label: &str| lines.iter().position(|line| line == label).unwrap();
    assert!(position("je .if_false_0") < position(".if_true_0:"));
    assert!(position(".if_true_0:") < position("jmp .if_exit_0"));
    assert!(position("jmp .if_exit_0") < position(".if_false_0:"));
    assert!(position(".if_false_0:") < position(".if_exit_0:"));
}

#[test]
fn comparisons_materialize_booleans() {
    let lines = compile("char main() { char a = 1; return a < 2; }");

    assert!(contains_sequence(
        &lines,
        &[
            "cmp b",
            "jc .cmp_less_false_0",
            "je .cmp_less_false_0",
            ".cmp_less_true_0:",
            "mov a, 1",
            "jmp .cmp_less_exit_0",
            ".cmp_less_false_0:",
            "mov a, 0",
            ".cmp_less_exit_0:",
        ]
    ));
}

#[test]
fn global_data_layout() {
    let lines = compile("int g = 300; char s; char main() { return 0; }");

    assert!(contains_sequence(&lines, &["jmp g + 2", "g:", "#d16 300"]));
    assert!(contains_sequence(&lines, &["jmp s + 1", "s:", "#res 1"]));
}

#[test]
fn global_string_initializer() {
    let lines = compile("char *m = \"hi\"; char main() { return 0; }");

    assert!(contains_sequence(
        &lines,
        &[
            "jmp string_skip_0",
            "string_0:",
            "#d \"hi\\0\"",
            "string_skip_0:",
            "jmp m + 2",
            "m:",
            "#d16 string_0",
        ]
    ));
}

#[test]
fn pointer_int_assignment_warns() {
    let compiled = compile_str("char main() { char *p; p = 5; return 0; }", &Options::default())
        .ok()
        .unwrap();

    assert_eq!(compiled.warnings.len(), 1);
}

#[test]
fn redeclaration_is_reported() {
    let rendered = errors("char main() { char x; char x; return 0; }");

    assert!(rendered.starts_with("error: Redeclaration of `x`"));
    assert!(rendered.ends_with("Build failed with 1 error\n"));
}

#[test]
fn missing_main_is_reported() {
    let rendered = errors("char f() { return 0; }");
    assert!(rendered.contains("No `main` function was defined"));
}

#[test]
fn wide_multiplication_is_rejected() {
    let rendered = errors("int main() { int a = 300; int b = 2; return a * b; }");
    assert!(rendered.contains("Multiplication of 16-bit operands is not supported"));
}

#[test]
fn includes_are_expanded_once() {
    let directory: PathBuf = env::temp_dir().join(format!("cc8-include-{}", std::process::id()));
    fs::create_dir_all(&directory).unwrap();

    fs::write(
        directory.join("twice.c"),
        "char twice(char x) { return x + x; }\n",
    )
    .unwrap();

    let main = directory.join("main.c");
    fs::write(
        &main,
        "#include \"twice.c\"\n#include \"twice.c\"\nchar main() { return twice(2); }\n",
    )
    .unwrap();

    let compiled = compile_file(&main, &Options::default()).ok().unwrap();
    let lines = normalize(&compiled.assembly);
    fs::remove_dir_all(&directory).unwrap();

    assert_eq!(lines.iter().filter(|line| *line == "twice:").count(), 1);
    assert!(lines.iter().any(|line| line == "call twice"));
}

#[test]
fn pointer_arguments_bind_to_int_parameters() {
    let source = "void show(int v) { return; } \
                  char main() { extern void heap_start; char* p; show(&heap_start); show(p); return 0; }";

    let compiled = compile_str(source, &Options::default()).ok().unwrap();
    assert_eq!(compiled.warnings.len(), 2);

    let lines = normalize(&compiled.assembly);
    assert!(contains_sequence(
        &lines,
        &["mov bc, heap_start", "push bc", "call show", "mov sp, sp+2"]
    ));

    assert!(contains_sequence(
        &lines,
        &["mov c, [sp+0]", "mov b, [sp+1]", "push bc", "call show", "mov sp, sp+2"]
    ));
}

#[test]
fn constant_shifts_match_rotate_loops() {
    let lines = compile("char g = 1 << 8; char h = 129 << 1; char k = 129 >> 1; char main() { return 0; }");

    assert!(contains_sequence(&lines, &["g:", "#d8 1"]));
    assert!(contains_sequence(&lines, &["h:", "#d8 3"]));
    assert!(contains_sequence(&lines, &["k:", "#d8 192"]));
}

#[test]
fn shifts_are_rotate_loops() {
    let left = compile("char main() { char a = 1; char n = 3; return a << n; }");
    assert!(contains_sequence(
        &left,
        &[
            "mov a, [sp+1]",
            "mov b, [sp+0]",
            "push a",
            "mov a, b",
            "and 0b111",
            "mov b, a",
            "pop a",
            ".shl_loop_0:",
            "dec b",
            "jnc .shl_exit_0",
            "rol",
            "jmp .shl_loop_0",
            ".shl_exit_0:",
        ]
    ));

    let right = compile("char main() { char a = 1; char n = 3; return a >> n; }");
    assert!(contains_sequence(
        &right,
        &[
            "push a",
            "mov a, 8",
            "sub b",
            "and 0b111",
            "mov b, a",
            "pop a",
            ".shr_loop_0:",
            "dec b",
            "jnc .shr_exit_0",
            "rol",
            "jmp .shr_loop_0",
            ".shr_exit_0:",
        ]
    ));
}

#[test]
fn pushed_arguments_shift_local_offsets() {
    let source = "char f(char x, char y) { return y; } \
                  char main() { char a = 1; char b = 2; return f(a, b); }";
    let lines = compile(source);

    assert_eq!(
        function(&lines, "f"),
        ["f:", "mov a, [sp+2]", "jmp f_exit", "f_exit:", "ret"]
    );

    // Tras empujar `a`, `b` queda un byte más lejos
    assert!(contains_sequence(
        &lines,
        &[
            "mov a, [sp+1]",
            "push a",
            "mov a, [sp+1]",
            "push a",
            "call f",
            "mov sp, sp+2",
        ]
    ));
}

#[test]
fn wide_comparison_checks_high_half_first() {
    let lines = compile("char main() { int a = 300; int b = 400; return a < b; }");

    assert!(contains_sequence(
        &lines,
        &[
            "mov c, [sp+2]",
            "mov b, [sp+3]",
            "mov e, [sp+0]",
            "mov d, [sp+1]",
            "mov a, b",
            "cmp d",
            "jne .cmp_less_decide_0",
            "mov a, c",
            "cmp e",
            ".cmp_less_decide_0:",
            "jc .cmp_less_false_0",
            "je .cmp_less_false_0",
        ]
    ));

    assert!(contains_sequence(
        &lines,
        &[".cmp_less_exit_0:", "mov c, a", "mov b, 0", "mov a, c", "jmp main_exit"]
    ));
}

#[test]
fn multiplication_loop() {
    let lines = compile("char main() { char a = 6; char b = 3; return a * b; }");

    assert!(contains_sequence(
        &lines,
        &[
            "mov a, [sp+1]",
            "mov b, [sp+0]",
            "mov c, a",
            "mov a, 0",
            ".mul_loop_0:",
            "dec b",
            "jnc .mul_exit_0",
            "add c",
            "jmp .mul_loop_0",
            ".mul_exit_0:",
            "jmp main_exit",
        ]
    ));
}

#[test]
fn division_loop() {
    let lines = compile("char main() { char a = 6; char b = 3; return a / b; }");

    assert!(contains_sequence(
        &lines,
        &[
            "mov c, 0",
            ".div_loop_0:",
            "cmp b",
            "je .div_step_0",
            "jnc .div_exit_0",
            ".div_step_0:",
            "sub b",
            "inc c",
            "jmp .div_loop_0",
            ".div_exit_0:",
            "mov a, c",
            "jmp main_exit",
        ]
    ));
}

#[test]
fn return_releases_nested_frames() {
    let source = "char main() { char a = 1; { char b = 2; { char c = 3; return c; } } }";
    let lines = compile(source);

    assert!(contains_sequence(
        &lines,
        &["mov a, [sp+0]", "mov sp, sp+2", "jmp main_exit"]
    ));

    assert!(contains_sequence(&lines, &["main_exit:", "mov sp, sp+1", "ret"]));
}

#[test]
fn register_exhaustion_is_reported() {
    let rendered = errors("char main() { char a = 1; return a + (a + (a + (a + (a + (a + a))))); }");

    assert!(rendered.starts_with("error: Register exhaustion: no free register of 1 bytes"));
    assert!(rendered.contains("(held: a, b, c, d, e)"));
    assert!(rendered.ends_with("Build failed with 1 error\n"));
}
