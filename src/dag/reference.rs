// src/dag/reference.rs

//! Result references of the form `$(tasks.<task>.results.<result>)`.

use std::sync::LazyLock;

use regex::Regex;

static RESULT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\(tasks\.([A-Za-z0-9_-]+)\.results\.([A-Za-z0-9_.-]+?)\)")
        .expect("result reference pattern is a valid regex")
});

/// A reference to a result produced by another task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultRef {
    pub task: String,
    pub result: String,
}

/// All result references in `s`, in order of appearance.
pub fn result_refs(s: &str) -> Vec<ResultRef> {
    RESULT_REF
        .captures_iter(s)
        .map(|caps| ResultRef {
            task: caps[1].to_string(),
            result: caps[2].to_string(),
        })
        .collect()
}

/// Replace every result reference in `input` with the value returned by
/// `lookup`.
///
/// Returns `None` as soon as one reference cannot be resolved yet.
pub fn resolve_result_refs<F>(input: &str, mut lookup: F) -> Option<String>
where
    F: FnMut(&ResultRef) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in RESULT_REF.captures_iter(input) {
        let whole = caps.get(0)?;
        let reference = ResultRef {
            task: caps[1].to_string(),
            result: caps[2].to_string(),
        };

        out.push_str(&input[last..whole.start()]);
        out.push_str(&lookup(&reference)?);
        last = whole.end();
    }

    out.push_str(&input[last..]);
    Some(out)
}
