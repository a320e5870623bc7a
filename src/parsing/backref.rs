//! Back-reference resolution for `end` patterns (spec §4.7).
//!
//! An `end` pattern may reference a capture group of the paired `begin`
//! match using the integer form `\1`, `\2`, ... Named back-references
//! (`\k<name>`) are out of scope, per spec §9's open question.

use super::regex::{Region, Regex};
use regex_syntax::escape;

/// U+FFFF: not valid in well-formed source text, used as the substitution
/// for a back-reference whose capture group didn't participate. This makes
/// the resulting pattern unable to match anything in ordinary text rather
/// than, say, silently matching the empty string.
const SENTINEL: char = '\u{FFFF}';

/// Scans `pattern` for `\` followed by one or more decimal digits and
/// substitutes each with the literal (regex-escaped) text `begin_match`
/// captured at that group index, using `begin_text` as the source the
/// match ran over.
///
/// If `pattern` contains no back-references, returns it completely
/// unchanged — spec §4.7's identity-preservation requirement, verified by
/// the `no_backrefs_is_identity` test below.
pub fn resolve_backrefs(pattern: &Regex, begin_match: &Region, begin_text: &str) -> Regex {
    let source = pattern.regex_str();
    if !has_backref(source) {
        return pattern.clone();
    }
    let resolved = substitute(source, |n| {
        begin_match
            .pos(n)
            .map(|(start, end)| escape(&begin_text[start..end]))
    });
    Regex::new(resolved)
}

fn has_backref(source: &str) -> bool {
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_digit() {
                    return true;
                }
            }
            chars.next(); // skip the escaped character itself
        }
    }
    false
}

/// Walks `source` character by character, replacing every `\N` (N one or
/// more decimal digits) with `substituter(N)`, or the sentinel scalar if
/// the substituter returns `None`. Any other `\X` escape is passed through
/// verbatim.
fn substitute<F>(source: &str, substituter: F) -> String
where
    F: Fn(usize) -> Option<String>,
{
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n: usize = digits.parse().expect("scanned only ascii digits");
                match substituter(n) {
                    Some(text) => out.push_str(&text),
                    None => out.push(SENTINEL),
                }
            }
            Some(&escaped) => {
                out.push('\\');
                out.push(escaped);
                chars.next();
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin_match(pattern: &str, text: &str) -> (Regex, Region) {
        let regex = Regex::new(pattern.to_owned());
        let mut region = Region::new();
        assert!(regex.search(text, 0, text.len(), Some(&mut region)).unwrap());
        (regex, region)
    }

    #[test]
    fn no_backrefs_is_identity() {
        let end = Regex::new(r"foo\s+bar".to_owned());
        let (_, region) = begin_match("x", "x");
        let resolved = resolve_backrefs(&end, &region, "x");
        assert_eq!(resolved.regex_str(), end.regex_str());
    }

    #[test]
    fn substitutes_participating_capture() {
        let (_, region) = begin_match(r#"(["'])"#, "'hi'");
        let end = Regex::new(r"\1".to_owned());
        let resolved = resolve_backrefs(&end, &region, "'hi'");
        assert_eq!(resolved.regex_str(), "'");
    }

    #[test]
    fn non_participating_capture_becomes_sentinel() {
        let (_, region) = begin_match(r"(a)|(b)", "a");
        let end = Regex::new(r"\2".to_owned());
        let resolved = resolve_backrefs(&end, &region, "a");
        assert_eq!(resolved.regex_str(), SENTINEL.to_string());
    }

    #[test]
    fn escapes_special_regex_characters_in_substitution() {
        let (_, region) = begin_match(r"(.*)", r"a.b*c");
        let end = Regex::new(r"\1".to_owned());
        let resolved = resolve_backrefs(&end, &region, r"a.b*c");
        assert_eq!(resolved.regex_str(), r"a\.b\*c");
    }

    #[test]
    fn resolving_twice_is_deterministic() {
        let (_, region) = begin_match(r"(\w+)", "abc");
        let end = Regex::new(r"end-\1".to_owned());
        let first = resolve_backrefs(&end, &region, "abc");
        let second = resolve_backrefs(&end, &region, "abc");
        assert_eq!(first.regex_str(), second.regex_str());
    }

    #[test]
    fn non_backref_escapes_are_preserved() {
        let end = Regex::new(r"\s\1\d".to_owned());
        let (_, region) = begin_match(r"(x)", "x");
        let resolved = resolve_backrefs(&end, &region, "x");
        assert_eq!(resolved.regex_str(), r"\sx\d");
    }
}
