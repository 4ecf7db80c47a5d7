// tests/references_and_durations.rs

use std::time::Duration;

use rundag::config::duration::{format_duration, parse_duration};
use rundag::dag::reference::{resolve_result_refs, result_refs};
use rundag::dag::{ResultRef, WhenExpression};
use rundag::types::WhenOperator;

#[test]
fn result_refs_are_extracted_in_order() {
    let refs = result_refs("$(tasks.build.results.image)@$(tasks.scan.results.digest.sha)");
    assert_eq!(
        refs,
        vec![
            ResultRef {
                task: "build".to_string(),
                result: "image".to_string(),
            },
            ResultRef {
                task: "scan".to_string(),
                result: "digest.sha".to_string(),
            },
        ]
    );
    assert!(result_refs("$(params.rev) and plain text").is_empty());
}

#[test]
fn references_are_substituted_in_place() {
    let resolved = resolve_result_refs("img:$(tasks.build.results.tag)-final", |r| {
        Some(format!("{}-{}", r.task, r.result))
    });
    assert_eq!(resolved.as_deref(), Some("img:build-tag-final"));

    let unresolved = resolve_result_refs("$(tasks.build.results.tag)", |_| None);
    assert_eq!(unresolved, None);
}

#[test]
fn when_expressions_evaluate_in_and_notin() {
    let expr = |operator| WhenExpression {
        input: "$(tasks.a.results.env)".to_string(),
        operator,
        values: vec!["prod".to_string(), "staging".to_string()],
    };

    let prod = |_: &ResultRef| Some("prod".to_string());
    let dev = |_: &ResultRef| Some("dev".to_string());

    assert_eq!(expr(WhenOperator::In).evaluate(prod), Some(true));
    assert_eq!(expr(WhenOperator::In).evaluate(dev), Some(false));
    assert_eq!(expr(WhenOperator::NotIn).evaluate(prod), Some(false));
    assert_eq!(expr(WhenOperator::NotIn).evaluate(dev), Some(true));
    assert_eq!(expr(WhenOperator::In).evaluate(|_| None), None);
}

#[test]
fn durations_parse_with_unit_suffixes() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
}

#[test]
fn durations_format_for_messages() {
    assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
    assert_eq!(format_duration(Duration::from_secs(330)), "5m30s");
    assert_eq!(format_duration(Duration::from_secs(45)), "45s");
    assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
}
