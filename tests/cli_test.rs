// Drives the compiled binary end to end: search, result formatting, MCS and
// index persistence, and failure exit codes.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn seed_sieve() -> Command {
    Command::new(env!("CARGO_BIN_EXE_seed-sieve"))
}

fn write_inputs(dir: &Path, text: &str, queries: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let text_path = dir.join("text.txt");
    let queries_path = dir.join("queries.txt");
    std::fs::write(&text_path, text).unwrap();
    std::fs::write(&queries_path, queries).unwrap();
    (text_path, queries_path)
}

#[test]
fn search_prints_one_line_per_query() {
    let dir = TempDir::new().unwrap();
    let (text, queries) = write_inputs(dir.path(), "ACGTACGTACGT", "ACGT\nCGTA\n");

    let output = seed_sieve()
        .arg("-t")
        .arg(&text)
        .arg("-q")
        .arg(&queries)
        .args(["-m", "1"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout, "ACGT 0 4 8\nCGTA 1 5\n");
}

#[test]
fn saved_mcs_and_index_can_be_loaded_back() {
    let dir = TempDir::new().unwrap();
    let (text, queries) = write_inputs(dir.path(), "AAAAABAAAA", "AAAA\n");
    let mcs_path = dir.path().join("cover.mcs");
    let index_path = dir.path().join("samples.idx");
    let first_results = dir.path().join("first.txt");
    let second_results = dir.path().join("second.txt");

    let output = seed_sieve()
        .arg("-t")
        .arg(&text)
        .arg("-q")
        .arg(&queries)
        .args(["-m", "1"])
        .arg("--save-mcs")
        .arg(&mcs_path)
        .arg("--save-index")
        .arg(&index_path)
        .arg("--save-results")
        .arg(&first_results)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    assert!(mcs_path.exists() && index_path.exists());

    let output = seed_sieve()
        .arg("-t")
        .arg(&text)
        .arg("-q")
        .arg(&queries)
        .args(["-m", "1"])
        .arg("--load-mcs")
        .arg(&mcs_path)
        .arg("--load-index")
        .arg(&index_path)
        .arg("--save-results")
        .arg(&second_results)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let first = std::fs::read_to_string(&first_results).unwrap();
    let second = std::fs::read_to_string(&second_results).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "AAAA 0 1 2 3 4 5 6\n");
}

#[test]
fn missing_text_file_fails_with_exit_code_one() {
    let dir = TempDir::new().unwrap();
    let queries = dir.path().join("queries.txt");
    std::fs::write(&queries, "ACGT\n").unwrap();

    let output = seed_sieve()
        .args(["-t", "does-not-exist.txt"])
        .arg("-q")
        .arg(&queries)
        .args(["-m", "1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn oversized_budget_fails_with_exit_code_one() {
    let dir = TempDir::new().unwrap();
    let (text, queries) = write_inputs(dir.path(), "ACGTACGT", "ACGT\n");

    let output = seed_sieve()
        .arg("-t")
        .arg(&text)
        .arg("-q")
        .arg(&queries)
        .args(["-m", "9"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn loading_an_index_without_its_mcs_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (text, queries) = write_inputs(dir.path(), "ACGTACGT", "ACGT\n");
    let index_path = dir.path().join("samples.idx");
    std::fs::write(&index_path, "AC__;0;4;\n").unwrap();

    let output = seed_sieve()
        .arg("-t")
        .arg(&text)
        .arg("-q")
        .arg(&queries)
        .args(["-m", "1"])
        .arg("--load-index")
        .arg(&index_path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}
