//! Golden-file harness: every `tests/fixtures/*.c` is preprocessed and its
//! output compared byte-for-byte against a sibling `*.expected` file.

use cpp99::Preprocessor;
use walkdir::WalkDir;

#[test]
fn fixtures_match_expected_output() {
    let fixtures_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    let mut checked = 0;

    for entry in WalkDir::new(fixtures_dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("c") {
            continue;
        }
        let expected_path = path.with_extension("expected");
        let source = std::fs::read_to_string(path).unwrap();
        let expected = std::fs::read_to_string(&expected_path)
            .unwrap_or_else(|_| panic!("missing {} for {}", expected_path.display(), path.display()));

        let mut pp = Preprocessor::new();
        pp.parse(&source, path.file_name().and_then(|n| n.to_str()));
        let mut buf: Vec<u8> = Vec::new();
        pp.write(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();

        assert_eq!(out, expected, "mismatch for {}", path.display());
        assert!(pp.diagnostics.is_empty(), "unexpected diagnostics for {}: {:?}", path.display(), pp.diagnostics);
        checked += 1;
    }

    assert!(checked >= 3, "expected at least 3 fixture pairs, found {checked}");
}
