//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Get path to the cryptpad binary
fn cryptpad_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps/
    path.push("cryptpad");
    path
}

/// Run cryptpad with passphrase from stdin
fn run_cryptpad_with_passphrase(
    args: &[&str],
    passphrase: &str,
) -> Result<std::process::Output, std::io::Error> {
    let mut child = Command::new(cryptpad_bin())
        .arg("--passphrase-stdin")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., file not found)
        let _ = stdin.write_all(passphrase.as_bytes());
    }

    child.wait_with_output()
}

fn run_ok(args: &[&str], passphrase: &str) -> String {
    let result = run_cryptpad_with_passphrase(args, passphrase).unwrap();
    assert!(
        result.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&result.stderr)
    );
    String::from_utf8(result.stdout).unwrap()
}

/// Get path to testdata directory
fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("testdata");
    path.push(filename);
    path
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext_path = testdata_path("hello.txt");
    let encrypted_path = temp_dir.path().join("hello.txt.asc");
    let decrypted_path = temp_dir.path().join("hello-decrypted.txt");

    run_ok(
        &["encrypt", "-i", s(&plaintext_path), "-o", s(&encrypted_path)],
        "test",
    );
    let armored = fs::read_to_string(&encrypted_path).unwrap();
    assert!(armored.starts_with("-----BEGIN ENCRYPTED MESSAGE-----\n"));

    run_ok(
        &["decrypt", "-i", s(&encrypted_path), "-o", s(&decrypted_path)],
        "test",
    );

    let original = fs::read_to_string(&plaintext_path).unwrap();
    let decrypted = fs::read_to_string(&decrypted_path).unwrap();
    assert_eq!(original, decrypted);
}

#[test]
fn test_decrypt_wrong_passphrase_fails() {
    let temp_dir = TempDir::new().unwrap();
    let encrypted = temp_dir.path().join("hello.txt.asc");
    let output = temp_dir.path().join("out.txt");

    run_ok(
        &["encrypt", "-i", s(&testdata_path("hello.txt")), "-o", s(&encrypted)],
        "correct_password",
    );
    let result = run_cryptpad_with_passphrase(
        &["decrypt", "-i", s(&encrypted), "-o", s(&output)],
        "wrong_password",
    )
    .unwrap();

    assert!(!result.status.success());
    assert!(!output.exists());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("wrong passphrase or corrupted data"),
        "Expected authentication error, got: {}",
        stderr
    );
}

#[test]
fn test_decrypt_nonexistent_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let nonexistent = temp_dir.path().join("nonexistent.asc");
    let output = temp_dir.path().join("output.txt");

    let result =
        run_cryptpad_with_passphrase(&["decrypt", "-i", s(&nonexistent), "-o", s(&output)], "test")
            .unwrap();

    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn test_document_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("notes");
    let doc = temp_dir.path().join("notes.cryptpad");

    let out = run_ok(&["new", s(&file), "--empty"], "pw");
    assert_eq!(out.trim(), s(&doc));
    assert_eq!(run_ok(&["tree", s(&doc)], "pw"), "");

    run_ok(&["add", s(&doc), "Recipes"], "pw");
    run_ok(&["add", s(&doc), "Soup", "--under", "Recipes", "--body", "boil water"], "pw");
    run_ok(&["add", s(&doc), "Travel"], "pw");
    assert_eq!(run_ok(&["tree", s(&doc)], "pw"), "Recipes\n  Soup\nTravel\n");
    assert_eq!(run_ok(&["show", s(&doc), "Recipes", "Soup"], "pw"), "boil water");

    run_ok(&["edit", s(&doc), "Recipes", "Soup", "--title", "Stew", "--body", "simmer"], "pw");
    run_ok(&["move", s(&doc), "Recipes", "Stew", "--to", "Travel"], "pw");
    run_ok(&["move", s(&doc), "Travel", "--index", "0"], "pw");
    assert_eq!(run_ok(&["tree", s(&doc)], "pw"), "Travel\n  Stew\nRecipes\n");
    assert_eq!(run_ok(&["show", s(&doc), "Travel", "Stew"], "pw"), "simmer");

    run_ok(&["remove", s(&doc), "Travel"], "pw");
    assert_eq!(run_ok(&["tree", s(&doc)], "pw"), "Recipes\n");
}

#[test]
fn test_new_document_has_welcome_entry() {
    let temp_dir = TempDir::new().unwrap();
    let doc = temp_dir.path().join("fresh.cryptpad");
    run_ok(&["new", s(&doc)], "pw");
    assert_eq!(run_ok(&["tree", s(&doc)], "pw"), "Welcome\n");
}

#[test]
fn test_invalid_move_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let doc = temp_dir.path().join("tree.cryptpad");
    run_ok(&["new", s(&doc), "--empty"], "pw");
    run_ok(&["add", s(&doc), "Parent"], "pw");
    run_ok(&["add", s(&doc), "Child", "--under", "Parent"], "pw");
    let before = fs::read(&doc).unwrap();

    let result =
        run_cryptpad_with_passphrase(&["move", s(&doc), "Parent", "--to", "Parent", "--to", "Child"], "pw")
            .unwrap();
    assert!(!result.status.success());
    assert_eq!(fs::read(&doc).unwrap(), before);

    // Dropping onto the root without a position is not a move.
    let result =
        run_cryptpad_with_passphrase(&["move", s(&doc), "Parent", "Child"], "pw").unwrap();
    assert!(!result.status.success());
    assert_eq!(fs::read(&doc).unwrap(), before);
}

#[test]
fn test_wrong_passphrase_leaves_document_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let doc = temp_dir.path().join("locked.cryptpad");
    run_ok(&["new", s(&doc)], "right");
    let before = fs::read(&doc).unwrap();

    let result = run_cryptpad_with_passphrase(&["add", s(&doc), "Intruder"], "wrong").unwrap();
    assert!(!result.status.success());
    assert_eq!(fs::read(&doc).unwrap(), before);
}

#[test]
fn test_legacy_document_upgraded() {
    let temp_dir = TempDir::new().unwrap();
    let legacy = temp_dir.path().join("old.jcryptpad");
    fs::copy(testdata_path("legacy.jcryptpad"), &legacy).unwrap();

    assert_eq!(
        run_ok(&["tree", s(&legacy)], "legacy pass"),
        "Shopping\n  Weekend\nIdeas\n"
    );

    let result =
        run_cryptpad_with_passphrase(&["add", s(&legacy), "Later"], "legacy pass").unwrap();
    assert!(result.status.success());
    let upgraded = temp_dir.path().join("old.cryptpad");
    assert!(String::from_utf8_lossy(&result.stderr).contains(s(&upgraded)));
    assert_eq!(
        run_ok(&["tree", s(&upgraded)], "legacy pass"),
        "Shopping\n  Weekend\nIdeas\nLater\n"
    );
}

#[test]
fn test_config_wrap_width() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("cryptpad.toml");
    let encrypted = temp_dir.path().join("hello.txt.asc");
    fs::write(&config, "wrap_width = 20\n").unwrap();

    run_ok(
        &[
            "--config",
            s(&config),
            "encrypt",
            "-i",
            s(&testdata_path("hello.txt")),
            "-o",
            s(&encrypted),
        ],
        "test",
    );
    let armored = fs::read_to_string(&encrypted).unwrap();
    let body: Vec<&str> = armored
        .lines()
        .skip_while(|l| *l != "-----BEGIN-----")
        .skip(1)
        .take_while(|l| !l.starts_with("-----END"))
        .collect();
    assert!(body.len() > 1);
    assert!(body.iter().all(|l| l.len() <= 20));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("cryptpad.toml");
    fs::write(&config, "wrap_width = 2\n").unwrap();
    let result = run_cryptpad_with_passphrase(&["--config", s(&config), "passgen"], "").unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("wrap_width"));
}

#[test]
fn test_passgen() {
    let out = run_ok(&["passgen", "--length", "24", "--numbers"], "");
    let password = out.trim_end_matches('\n');
    assert_eq!(password.chars().count(), 24);
    assert!(password.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

    let result = run_cryptpad_with_passphrase(&["passgen", "--length", "0"], "").unwrap();
    assert!(!result.status.success());
}

#[test]
fn test_move_help_mentions_root_drop() {
    let output = Command::new(cryptpad_bin())
        .args(["move", "--help"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Required when --to is omitted"));
}
