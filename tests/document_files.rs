//! Document files on disk: fixtures from older releases, save/open cycles
//! and round-trip properties.

use std::fs;
use std::path::PathBuf;

use proptest::prelude::*;
use tempfile::TempDir;

use cryptpad::document::{Document, EntryTree};
use cryptpad::file_ops;
use cryptpad::markup;
use cryptpad::passphrase::ConstantPassphraseReader;
use cryptpad::{CipherScheme, Codec, CodecConfig, ErrorKind};

/// Get path to testdata directory
fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("testdata");
    path.push(filename);
    path
}

fn reader(pass: &str) -> ConstantPassphraseReader {
    ConstantPassphraseReader::new(pass.as_bytes().to_vec())
}

fn legacy_fixture_tree() -> Vec<EntryTree> {
    vec![
        EntryTree::new("Shopping", "milk\neggs & <bread>")
            .with_children(vec![EntryTree::new("Weekend", "cake")]),
        EntryTree::new("Ideas", ""),
    ]
}

#[test]
fn test_legacy_fixture_opens() {
    let decoded = file_ops::open_document(
        &testdata_path("legacy.jcryptpad"),
        &mut reader("legacy pass"),
        &CodecConfig::default(),
    )
    .unwrap();
    assert_eq!(decoded.scheme, CipherScheme::LegacyInsecure);
    assert_eq!(decoded.document.snapshot(), legacy_fixture_tree());
}

#[test]
fn test_legacy_fixture_wrong_passphrase() {
    let err = file_ops::open_document(
        &testdata_path("legacy.jcryptpad"),
        &mut reader("not the pass"),
        &CodecConfig::default(),
    )
    .unwrap_err();
    assert!(err.is_authentication_failure());
}

#[test]
fn test_legacy_fixture_rejected_when_fallback_disabled() {
    let config = CodecConfig {
        legacy_fallback: false,
        ..CodecConfig::default()
    };
    let err = file_ops::open_document(
        &testdata_path("legacy.jcryptpad"),
        &mut reader("legacy pass"),
        &config,
    )
    .unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn test_legacy_fixture_upgraded_on_save() {
    let temp_dir = TempDir::new().unwrap();
    let legacy_path = temp_dir.path().join("notes.jcryptpad");
    fs::copy(testdata_path("legacy.jcryptpad"), &legacy_path).unwrap();
    let legacy_bytes = fs::read(&legacy_path).unwrap();
    let config = CodecConfig::default();

    let decoded = file_ops::open_document(&legacy_path, &mut reader("legacy pass"), &config).unwrap();
    let written =
        file_ops::save_document(&legacy_path, &decoded.document, &mut reader("legacy pass"), &config)
            .unwrap();
    assert_eq!(written, temp_dir.path().join("notes.cryptpad"));
    assert_eq!(fs::read(&legacy_path).unwrap(), legacy_bytes);

    let reopened = file_ops::open_document(&written, &mut reader("legacy pass"), &config).unwrap();
    assert_eq!(reopened.scheme, CipherScheme::Modern);
    assert_eq!(reopened.document.snapshot(), legacy_fixture_tree());
}

#[test]
fn test_edit_save_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("journal.cryptpad");
    let config = CodecConfig {
        wrap_width: 64,
        ..CodecConfig::default()
    };

    let mut doc = Document::with_welcome_entry();
    let work = doc.add_entry(None, "Work").unwrap();
    let todo = doc.add_entry(Some(work), "Todo").unwrap();
    doc.set_body(todo, "- ship it\n- write docs").unwrap();
    let welcome = doc.children(None).unwrap()[0];
    doc.move_entry(welcome, Some(work), Some(0)).unwrap();
    file_ops::save_document(&path, &doc, &mut reader("s3cret"), &config).unwrap();

    let armored = fs::read_to_string(&path).unwrap();
    assert!(armored.starts_with("-----BEGIN ENCRYPTED FILE-----\n"));
    assert!(armored.lines().all(|l| l.len() <= 64));

    let reopened = file_ops::open_document(&path, &mut reader("s3cret"), &config).unwrap();
    let doc2 = reopened.document;
    assert_eq!(doc2.snapshot(), doc.snapshot());
    let todo2 = doc2.find_path(&["Work", "Todo"]).unwrap();
    assert_eq!(doc2.body(todo2).unwrap(), "- ship it\n- write docs");
}

#[test]
fn test_document_named_txt_rejected_on_open() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("notes.txt");
    fs::write(&path, "-----BEGIN-----\nAAAA\n-----END ENCRYPTED MESSAGE-----").unwrap();
    let err = file_ops::open_document(&path, &mut reader("pw"), &CodecConfig::default()).unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::UnsupportedExtension));
}

fn title() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 <>&\"'üß✓.-]{1,16}"
}

fn body() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 <>&\"'üß✓.\n\t-]{0,40}"
}

fn arb_tree() -> impl Strategy<Value = EntryTree> {
    let leaf = (title(), body()).prop_map(|(t, b)| EntryTree::new(t, b));
    leaf.prop_recursive(3, 24, 4, |inner| {
        (title(), body(), prop::collection::vec(inner, 0..4))
            .prop_map(|(t, b, children)| EntryTree::new(t, b).with_children(children))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_markup_round_trip(trees in prop::collection::vec(arb_tree(), 0..4)) {
        let doc = Document::from_trees(&trees).unwrap();
        let parsed = markup::from_text(&markup::to_text(&doc).unwrap()).unwrap();
        prop_assert_eq!(parsed.snapshot(), trees);
    }
}

proptest! {
    // Every case runs PBKDF2 twice.
    #![proptest_config(ProptestConfig::with_cases(3))]

    #[test]
    fn prop_encrypted_document_round_trip(
        trees in prop::collection::vec(arb_tree(), 0..3),
        pass in "[ -~]{1,24}",
    ) {
        let codec = Codec::default();
        let doc = Document::from_trees(&trees).unwrap();
        let armored = codec.encrypt_document(&doc, pass.as_bytes()).unwrap();
        let decoded = codec.decrypt_document(&armored, pass.as_bytes()).unwrap();
        prop_assert_eq!(decoded.scheme, CipherScheme::Modern);
        prop_assert_eq!(decoded.document.snapshot(), trees);
    }
}
