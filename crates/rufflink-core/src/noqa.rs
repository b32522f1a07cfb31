//! Suppression comments (`# noqa: CODE`).

use regex::Regex;

use crate::diagnostics::{Edit, Fix, Location};
use crate::edits::utf16_len;
use crate::regex_util::static_regex;

static_regex!(
    fn noqa_pattern,
    r"(?i:# (?:(?:ruff|flake8): )?(?P<noqa>noqa))(?::\s?(?P<codes>([A-Z]+[0-9]+(?:[,\s]+)?)+))?"
);
static_regex!(fn code_pattern, r"[A-Z]+[0-9]+");

/// Rewrite `line` so its suppression comment also covers `code`.
///
/// - `x  # noqa: OLD` becomes `x  # noqa: OLD, NEW`
/// - `x  # noqa` becomes `x  # noqa: NEW`
/// - `x` becomes `x  # noqa: NEW`
pub fn with_suppression(line: &str, code: &str) -> String {
    let Some(captures) = noqa_pattern().captures(line) else {
        return format!("{line}  # noqa: {code}");
    };
    if let Some(codes) = captures.name("codes") {
        format!(
            "{}{}, {code}{}",
            &line[..codes.start()],
            codes.as_str(),
            &line[codes.end()..]
        )
    } else if let Some(noqa) = captures.name("noqa") {
        format!("{}: {code}{}", &line[..noqa.end()], &line[noqa.end()..])
    } else {
        format!("{line}  # noqa: {code}")
    }
}

/// Fix replacing line `noqa_row` (one-based) with its suppressed form.
/// `line` is the current text of that row without its terminator.
pub fn suppression_fix(line: &str, noqa_row: u32, code: &str) -> Fix {
    let row = i64::from(noqa_row);
    Fix {
        applicability: None,
        message: None,
        edits: vec![Edit {
            content: with_suppression(line, code),
            location: Location::new(row, 0),
            end_location: Location::new(row, i64::from(utf16_len(line))),
        }],
    }
}

/// The rule code listed in a suppression comment at `character` (UTF-16) on
/// `line`, if the cursor is on one.
pub fn code_at(line: &str, character: u32) -> Option<String> {
    let captures = noqa_pattern().captures(line)?;
    let codes = captures.name("codes")?;
    code_pattern()
        .find_iter(codes.as_str())
        .map(|m| (codes.start() + m.start(), codes.start() + m.end(), m.as_str()))
        .find(|(start, end, _)| {
            let start = utf16_len(&line[..*start]);
            let end = utf16_len(&line[..*end]);
            (start..end).contains(&character)
        })
        .map(|(_, _, code)| code.to_string())
}
