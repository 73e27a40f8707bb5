use sspec_harness::cases::{load_case, parse_case, CaseStore, MalformedCaseError};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const SIMPLE_CASE: &str = "\
---
category: widgets
----------- app code
X
----------- test code
assert true
";

#[test]
fn parses_front_matter_and_two_segments() {
    let case = parse_case(SIMPLE_CASE, Path::new("simple.sspec")).unwrap();
    assert_eq!(
        case.metadata.get("category"),
        Some(&serde_yaml::Value::String("widgets".into()))
    );
    assert_eq!(case.app_code(), "X");
    assert_eq!(case.test_code(), "assert true");
}

#[test]
fn segment_labels_match_case_insensitively() {
    let text = "\
---
--- App Code
Shoes.app {}
--- TEST CODE
assert true
";
    let case = parse_case(text, Path::new("labels.sspec")).unwrap();
    assert!(case.segments.contains_key("app code"));
    assert!(case.segments.contains_key("test code"));
    assert_eq!(case.app_code(), "Shoes.app {}");
}

#[test]
fn preserves_payload_content_between_markers() {
    let body = "Shoes.app height: 200, width: 300 do\n  para \"---- not a marker\"\nend";
    let text = format!(
        "---\ntags: [button]\n----------- app code\n{body}\n----------- test code\n  assert true  \n"
    );
    let case = parse_case(&text, Path::new("content.sspec")).unwrap();
    // Inner lines survive byte-for-byte; only surrounding whitespace is trimmed.
    assert_eq!(case.app_code(), body);
    assert_eq!(case.test_code(), "assert true");
}

#[test]
fn empty_front_matter_is_fine() {
    let text = "---\n----- app code\ncode\n----- test code\ntest\n";
    let case = parse_case(text, Path::new("empty_meta.sspec")).unwrap();
    assert!(case.metadata.is_empty());
}

#[test]
fn fewer_than_two_segments_is_malformed() {
    let text = "---\n----------- app code\nonly one segment\n";
    let err = parse_case(text, Path::new("broken.sspec")).unwrap_err();
    let malformed = err
        .downcast_ref::<MalformedCaseError>()
        .expect("should be a MalformedCaseError");
    assert!(malformed.to_string().contains("broken.sspec"));
    assert!(malformed.to_string().contains("found 1"));
}

#[test]
fn no_segments_at_all_is_malformed() {
    let err = parse_case("just some text\n", Path::new("none.sspec")).unwrap_err();
    assert!(err.downcast_ref::<MalformedCaseError>().is_some());
}

#[test]
fn bad_front_matter_yaml_is_malformed() {
    let text = "---\n: [unbalanced\n----- app code\na\n----- test code\nb\n";
    let err = parse_case(text, Path::new("badyaml.sspec")).unwrap_err();
    assert!(err.downcast_ref::<MalformedCaseError>().is_some());
}

#[test]
fn discovers_categories_sorted_with_forward_slashes() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    for rel in [
        "drawables/button/push.sspec",
        "drawables/button/toggle.sspec",
        "drawables/para/replace.sspec",
        "app/basic.sspec",
    ] {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, SIMPLE_CASE).unwrap();
    }
    // A stray non-case file must not create a category.
    fs::write(root.join("drawables/README.md"), "notes").unwrap();

    let store = CaseStore::discover(root).unwrap();
    let categories: Vec<&str> = store.categories().iter().map(|s| s.as_str()).collect();
    assert_eq!(categories, vec!["app", "drawables/button", "drawables/para"]);
    assert_eq!(store.len(), 4);

    let names: Vec<(&str, &str)> = store
        .cases()
        .map(|c| (c.category.as_str(), c.test_name.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("app", "basic"),
            ("drawables/button", "push"),
            ("drawables/button", "toggle"),
            ("drawables/para", "replace"),
        ]
    );
}

#[test]
fn loads_case_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("simple.sspec");
    fs::write(&path, SIMPLE_CASE).unwrap();
    let case = load_case(&path).unwrap();
    assert_eq!(case.app_code(), "X");
    assert_eq!(case.test_code(), "assert true");
}
