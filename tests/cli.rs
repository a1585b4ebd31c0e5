use assert_cmd::Command;

fn salmon() -> Command {
    Command::cargo_bin("salmon").unwrap()
}

#[test]
fn tokenize_prints_one_token_per_line() {
    salmon()
        .args(["tokenize", "tests/inputs/tokens.salmon"])
        .assert()
        .success()
        .stdout(
            "VAR var null\n\
             IDENTIFIER answer null\n\
             EQUAL = null\n\
             NUMBER 42 42.0\n\
             SEMICOLON ; null\n\
             PRINT print null\n\
             STRING \"hi\" hi\n\
             PLUS + null\n\
             IDENTIFIER answer null\n\
             SEMICOLON ; null\n\
             EOF  null\n",
        );
}

#[test]
fn tokenize_json_emits_serialized_tokens() {
    let output = salmon()
        .args(["tokenize", "--json", "tests/inputs/tokens.salmon"])
        .output()
        .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines[0], r#"{"token_type":"VAR","lexeme":"var","line":1}"#);
    assert_eq!(
        lines[3],
        r#"{"token_type":{"NUMBER":42.0},"lexeme":"42","line":1}"#
    );
    assert_eq!(lines.len(), 11);
}

#[test]
fn tokenize_reports_bad_characters_and_keeps_going() {
    let output = salmon()
        .args(["tokenize", "tests/inputs/bad_char.salmon"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(65));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("SEMICOLON ; null"));
    assert!(stdout.ends_with("EOF  null\n"));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr, "[line 2] Error: Unexpected character.\n");
}

#[test]
fn parse_prints_desugared_tree() {
    salmon()
        .args(["parse", "tests/inputs/loop.salmon"])
        .assert()
        .success()
        .stdout(
            "(block (var i 0.0) (while (< i 2.0) \
             (block (print (* (- i) (group 2.0))) (; (= i (+ i 1.0))))))\n",
        );
}

#[test]
fn parse_reports_static_errors() {
    salmon()
        .args(["parse", "tests/inputs/bad_char.salmon"])
        .assert()
        .code(65)
        .stdout("")
        .stderr(
            "[line 2] Error: Unexpected character.\n\
             [line 2] Error at ';': Expect expression.\n",
        );
}

#[test]
fn run_executes_program() {
    salmon()
        .args(["run", "tests/inputs/loop.salmon"])
        .assert()
        .success()
        .stdout("-0\n-2\n");
}

#[test]
fn run_exits_70_on_runtime_error() {
    salmon()
        .args(["run", "tests/inputs/tokens.salmon"])
        .assert()
        .code(70)
        .stdout("")
        .stderr("Operands must be two numbers or two strings.\n[line 2]\n");
}

#[test]
fn run_accepts_empty_file() {
    salmon()
        .args(["run", "tests/inputs/empty.salmon"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn run_fails_on_missing_file() {
    salmon()
        .args(["run", "tests/inputs/does_not_exist.salmon"])
        .assert()
        .failure();
}

#[test]
fn repl_keeps_state_between_lines() {
    let output = salmon()
        .arg("repl")
        .write_stdin("var a = 1;\nprint a + 1;\nprint b;\nprint a;\n")
        .output()
        .unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout, "> > 2\n> > 1\n> \n");

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr, "Undefined variable 'b'.\n[line 1]\n");
}

#[test]
fn repl_is_the_default_command() {
    salmon()
        .write_stdin("print \"hi\";\n")
        .assert()
        .success()
        .stdout("> hi\n> \n");
}

#[test]
fn invalid_invocation_exits_64() {
    salmon().arg("run").assert().code(64);
    salmon().arg("frobnicate").assert().code(64);
    salmon().arg("--help").assert().success();
}

#[test]
fn deeply_nested_script_runs_and_parses() {
    let depth = 3000;
    let path = std::path::Path::new(env!("CARGO_TARGET_TMPDIR")).join("deeply_nested.salmon");
    std::fs::write(
        &path,
        format!("print {}1{};\n", "(".repeat(depth), ")".repeat(depth)),
    )
    .unwrap();

    salmon()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout("1\n");

    let output = salmon().arg("parse").arg(&path).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("(print (group (group "));
    assert_eq!(stdout.matches("group").count(), depth);
}
