use sspec_harness::backend::ExecutionResult;
use sspec_harness::normalize::{normalize, TagVocabulary};
use sspec_harness::types::Outcome;

fn transported(raw: &str) -> ExecutionResult {
    ExecutionResult::Transported(raw.to_string())
}

#[test]
fn empty_failures_is_a_pass() {
    let tags = TagVocabulary::default();
    let result = transported(r#"[{"failures": [], "assertions": 3}]"#);
    assert_eq!(normalize(&result, &tags), Outcome::Pass);
}

#[test]
fn skip_tag_wins() {
    let tags = TagVocabulary::default();
    let result = transported(r#"[{"failures": [["skip", "not implemented"]], "assertions": 0}]"#);
    assert_eq!(normalize(&result, &tags), Outcome::Skip);
}

#[test]
fn pending_counts_as_skip() {
    let tags = TagVocabulary::default();
    let result =
        transported(r#"[{"failures": [["pending_implementation", "later"]], "assertions": 0}]"#);
    assert_eq!(normalize(&result, &tags), Outcome::Skip);
}

#[test]
fn error_tag_beats_plain_failure() {
    let tags = TagVocabulary::default();
    let result = transported(
        r#"[{"failures": [["assertion", "boom"], ["unexpected_error", "raised"]], "assertions": 1}]"#,
    );
    assert_eq!(normalize(&result, &tags), Outcome::Error);
}

#[test]
fn skip_is_checked_before_error_tags() {
    let tags = TagVocabulary::default();
    let result = transported(
        r#"[{"failures": [["unexpected_error", "raised"], ["skip", "ignore"]], "assertions": 0}]"#,
    );
    assert_eq!(normalize(&result, &tags), Outcome::Skip);
}

#[test]
fn untagged_failures_are_fails() {
    let tags = TagVocabulary::default();
    let result = transported(r#"[{"failures": [["assertion", "1 != 2"]], "assertions": 2}]"#);
    assert_eq!(normalize(&result, &tags), Outcome::Fail);
}

#[test]
fn transport_failure_is_never_a_pass() {
    let tags = TagVocabulary::default();
    let result = ExecutionResult::TransportFailure("no result file".into());
    assert_eq!(normalize(&result, &tags), Outcome::Error);
}

#[test]
fn structurally_invalid_payloads_are_errors() {
    let tags = TagVocabulary::default();
    for raw in [
        "",
        "not json",
        "{}",
        "[]",
        r#"[{"assertions": 1}]"#,
        r#"[{"failures": "oops"}]"#,
        r#"[{"failures": []}, {"failures": []}]"#,
    ] {
        assert_eq!(
            normalize(&transported(raw), &tags),
            Outcome::Error,
            "payload: {raw:?}"
        );
    }
}

#[test]
fn missing_assertions_count_is_tolerated() {
    let tags = TagVocabulary::default();
    let result = transported(r#"[{"failures": []}]"#);
    assert_eq!(normalize(&result, &tags), Outcome::Pass);
}

#[test]
fn vocabulary_is_per_backend() {
    let tags = TagVocabulary {
        skip_tags: vec!["omitted".into()],
        error_tags: vec!["blew_up".into()],
    };
    let skipped = transported(r#"[{"failures": [["omitted", ""]], "assertions": 0}]"#);
    assert_eq!(normalize(&skipped, &tags), Outcome::Skip);
    // The default vocabulary's tags mean nothing to this backend.
    let result = transported(r#"[{"failures": [["skip", ""]], "assertions": 0}]"#);
    assert_eq!(normalize(&result, &tags), Outcome::Fail);
}

#[test]
fn normalize_is_deterministic() {
    let tags = TagVocabulary::default();
    let result = transported(r#"[{"failures": [["assertion", "x"]], "assertions": 1}]"#);
    let first = normalize(&result, &tags);
    assert_eq!(normalize(&result, &tags), first);
}
