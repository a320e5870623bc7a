//! Integration tests driving the public API the way a caller embedding this
//! crate in an editor or highlighter would: build a small grammar, thread a
//! [`ParseState`] across several lines, and check the resulting tokens.

use tmtoken::parsing::{CaptureAttribute, CaptureMapping, Grammar, ParseState, Rule, Scope};
use tmtoken::util::LinesWithEndings;

fn scope(s: &str) -> Scope {
    Scope::new(s).unwrap()
}

fn scope_paths(state: &mut ParseState, grammar: &Grammar, lines: &[&str]) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    for line in lines {
        let tokens = state.parse_line(line, grammar, None).unwrap();
        out.push(
            tokens
                .iter()
                .map(|t| {
                    t.scope_path
                        .as_slice()
                        .iter()
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect(),
        );
    }
    out
}

/// A line comment and a block comment whose `end` is a plain literal,
/// exercising state threading across several lines of a document fed via
/// [`LinesWithEndings`].
#[test]
fn block_comment_state_threads_across_the_document() {
    let grammar = Grammar::new(
        scope("source.test"),
        vec![
            Rule::match_rule("//.*$", Some(scope("comment.line"))),
            Rule::range(
                "/\\*",
                "\\*/",
                Some(scope("comment.block")),
                None,
                None,
                None,
                vec![],
            ),
        ],
    );

    let doc = "a\n/* start\nmiddle\nstill */b\n// trailing\n";
    let mut state = ParseState::new(&grammar);
    let lines: Vec<&str> = LinesWithEndings::from(doc).collect();
    assert_eq!(lines.len(), 5);

    let paths = scope_paths(&mut state, &grammar, &lines);

    // Line 0 ("a\n") is plain text, no scopes.
    assert!(paths[0].iter().all(|p| p.is_empty()));
    // Line 1 opens the block comment; every token from the delimiter on is
    // scoped "comment.block".
    assert!(paths[1].iter().skip(1).all(|p| p == "comment.block"));
    // Line 2 is entirely inside the comment.
    assert!(paths[2].iter().all(|p| p == "comment.block"));
    // Line 3 closes the comment partway through, then returns to no scope.
    assert_eq!(paths[3].last().unwrap(), "");
    assert!(paths[3][..paths[3].len() - 1].iter().all(|p| p == "comment.block"));
    // Line 4 is an independent line comment, unaffected by the closed block:
    // every scoped token on it is "comment.line" (a trailing newline past
    // the `$` anchor, if any, carries no scope).
    assert!(paths[4].iter().any(|p| p == "comment.line"));
    assert!(paths[4].iter().all(|p| p.is_empty() || p == "comment.line"));
}

/// A quoted string whose closing delimiter is a back-reference to the
/// opening quote character, with an escape sequence scoped inside via a
/// nested match rule.
#[test]
fn quoted_string_with_backreferenced_end_and_nested_escape() {
    let mapping: CaptureMapping = vec![(1, CaptureAttribute::scoped(scope("punctuation.quote")))];
    let grammar = Grammar::new(
        scope("source.test"),
        vec![Rule::range(
            r#"(["'])"#,
            r"\1",
            Some(scope("string.quoted")),
            None,
            Some(mapping),
            None,
            vec![Rule::match_rule(r"\\.", Some(scope("constant.escape")))],
        )],
    );

    let mut state = ParseState::new(&grammar);
    let tokens = state.parse_line(r#"x = "a\"b";"#, &grammar, None).unwrap();

    let escape_token = tokens
        .iter()
        .find(|t| t.scope_path.as_slice().last().map(|s| s.to_string()).as_deref() == Some("constant.escape"));
    assert!(escape_token.is_some(), "expected an escape-scoped token inside the string");

    // The string never leaks its scope onto the trailing `;`.
    let last = tokens.last().unwrap();
    assert!(last.scope_path.is_empty());
}

/// Nested group/range rules accumulate the scope path, and an `{include}`
/// resolved against the grammar's repository behaves exactly like an
/// inline pattern list.
#[test]
fn include_and_nested_scopes_compose() {
    let mut repo = std::collections::HashMap::new();
    repo.insert(
        "number".to_string(),
        Rule::match_rule(r"\d+", Some(scope("constant.numeric"))),
    );

    let grammar = Grammar::with_repository(
        scope("source.test"),
        vec![Rule::range(
            "\\(",
            "\\)",
            Some(scope("meta.parens")),
            None,
            None,
            None,
            vec![Rule::include("number")],
        )],
        repo,
    );

    let mut state = ParseState::new(&grammar);
    let tokens = state.parse_line("(42)", &grammar, None).unwrap();

    let numeric = tokens
        .iter()
        .find(|t| t.scope_path.as_slice().iter().any(|s| s.to_string() == "constant.numeric"))
        .expect("the included number rule should have fired");
    assert!(numeric
        .scope_path
        .as_slice()
        .first()
        .map(|s| s.to_string())
        .as_deref()
        == Some("meta.parens"));
}

/// The trace sink receives the human-readable lines documented for
/// diagnostics, without affecting the returned tokens.
#[test]
fn trace_sink_is_purely_additive() {
    let grammar = Grammar::new(scope("source.test"), vec![Rule::match_rule("foo", Some(scope("k")))]);

    let mut untraced_state = ParseState::new(&grammar);
    let untraced = untraced_state.parse_line("xfoox", &grammar, None).unwrap();

    let mut traced_state = ParseState::new(&grammar);
    let mut trace = String::new();
    let traced = traced_state
        .parse_line("xfoox", &grammar, Some(&mut trace))
        .unwrap();

    assert_eq!(untraced, traced);
    assert!(trace.contains("match plans, position 0"));
}
