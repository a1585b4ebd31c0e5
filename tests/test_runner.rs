use std::path::Path;
use std::process::Output;

use assert_cmd::Command;
use walkdir::WalkDir;

const EXPECT: &str = "// expect: ";
const EXPECT_RUNTIME_ERROR: &str = "// expect runtime error: ";
const EXPECT_ERROR: &str = "// expect error: ";

/// What a `.salmon` fixture says should happen when it runs.
#[derive(Default)]
struct Expectations {
    stdout: Vec<String>,
    runtime_error: Option<String>,
    static_errors: Vec<String>,
}

impl Expectations {
    fn exit_code(&self) -> i32 {
        if !self.static_errors.is_empty() {
            65
        } else if self.runtime_error.is_some() {
            70
        } else {
            0
        }
    }
}

#[test]
fn run_all_files() {
    let dir = "./tests/data/";

    let entries = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|o| o.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "salmon"));

    let mut count = 0;
    for entry in entries {
        let filename = entry.path();
        print!("{} ... ", filename.display());

        let expect = find_expects(filename);
        let output = run_file(filename);

        let stdout = String::from_utf8(output.stdout).unwrap();
        let stdout = stdout.trim_end();

        let stderr = String::from_utf8(output.stderr).unwrap();
        let stderr = stderr.trim_end();

        assert_eq!(
            expect.stdout.join("\n"),
            stdout,
            "{}: stdout={}, stderr={}",
            filename.display(),
            stdout,
            stderr
        );

        assert_eq!(
            output.status.code(),
            Some(expect.exit_code()),
            "{}: stderr={}",
            filename.display(),
            stderr
        );

        if let Some(message) = &expect.runtime_error {
            assert_eq!(
                stderr.lines().next(),
                Some(message.as_str()),
                "{}",
                filename.display()
            );
        }

        for line in &expect.static_errors {
            assert!(
                stderr.lines().any(|l| l == line),
                "{}: missing `{}` in stderr={}",
                filename.display(),
                line,
                stderr
            );
        }

        count += 1;
        println!("OK");
    }

    assert!(count > 0, "no fixtures found under {}", dir);
}

fn run_file(filename: &Path) -> Output {
    let mut cmd = Command::cargo_bin("salmon").unwrap();
    cmd.arg("run").arg(filename).output().unwrap()
}

fn find_expects(filename: &Path) -> Expectations {
    let content = std::fs::read_to_string(filename)
        .unwrap_or_else(|_| panic!("failed to read {}", filename.display()));

    let mut result = Expectations::default();
    for line in content.lines() {
        if let Some((_, rest)) = line.split_once(EXPECT) {
            result.stdout.push(rest.to_string());
        } else if let Some((_, rest)) = line.split_once(EXPECT_RUNTIME_ERROR) {
            result.runtime_error = Some(rest.to_string());
        } else if let Some((_, rest)) = line.split_once(EXPECT_ERROR) {
            result.static_errors.push(rest.to_string());
        }
    }

    result
}
