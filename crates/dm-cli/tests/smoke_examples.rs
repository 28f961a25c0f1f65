use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn mapping_cases() -> Vec<PathBuf> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
        .join("mappings");
    let mut directories = fs::read_dir(&root)
        .expect("demo mappings root must exist")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    directories.sort();
    directories
}

fn input_file(directory: &Path) -> PathBuf {
    ["input.json", "input.xml"]
        .iter()
        .map(|name| directory.join(name))
        .find(|path| path.is_file())
        .unwrap_or_else(|| panic!("no input file in {}", directory.display()))
}

#[test]
fn run_succeeds_for_every_demo_mapping() {
    let bin = env!("CARGO_BIN_EXE_datamapper");
    let directories = mapping_cases();
    assert!(!directories.is_empty(), "expected demo mappings");

    for directory in directories {
        let output = Command::new(bin)
            .arg("run")
            .arg("--mapper")
            .arg(directory.join("mapper.json"))
            .arg("--input")
            .arg(input_file(&directory))
            .output()
            .expect("cli should execute");

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            panic!(
                "mapping {} failed\nstdout:\n{}\nstderr:\n{}",
                directory.display(),
                stdout,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        assert!(
            stdout.lines().next() == Some("RESULT:OK"),
            "stdout missing RESULT:OK for {}",
            directory.display()
        );
        assert!(
            stdout.contains("OUTPUT_JSON:"),
            "stdout missing OUTPUT_JSON for {}",
            directory.display()
        );
    }
}

#[test]
fn generate_writes_a_script_file() {
    let bin = env!("CARGO_BIN_EXE_datamapper");
    let directory = mapping_cases().into_iter().next().expect("a demo mapping");
    let out_dir = tempfile::tempdir().expect("temp dir");
    let script = out_dir.path().join("mapping.rhai");

    let output = Command::new(bin)
        .arg("generate")
        .arg("--mapper")
        .arg(directory.join("mapper.json"))
        .arg("--out")
        .arg(&script)
        .output()
        .expect("cli should execute");

    assert!(output.status.success());
    let written = fs::read_to_string(&script).expect("script should be written");
    assert!(written.contains("let output = #{};"));
}

#[test]
fn config_file_limits_apply_to_execute() {
    let bin = env!("CARGO_BIN_EXE_datamapper");
    let dir = tempfile::tempdir().expect("temp dir");
    let config = dir.path().join("limits.toml");
    let script = dir.path().join("spin.rhai");
    let input = dir.path().join("input.json");
    fs::write(&config, "[executor]\nmax_operations = 500\n").expect("config");
    fs::write(&script, "let n = 0; loop { n += 1; }").expect("script");
    fs::write(&input, "{}").expect("input");

    let output = Command::new(bin)
        .arg("--config")
        .arg(&config)
        .arg("execute")
        .arg("--script")
        .arg(&script)
        .arg("--input")
        .arg(&input)
        .output()
        .expect("cli should execute");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RESULT:ERROR"));
    assert!(stdout.contains("ERROR_CODE:EXEC_FAILED"));
}
