//! Everything about turning a line of text, plus a [`Grammar`], into a
//! stream of scope-annotated [`Token`]s.
//!
//! [`ParseState`] is the entry point: construct one at the start of a
//! document and feed it one line at a time via
//! [`ParseState::parse_line`][parser::ParseState::parse_line], threading the
//! returned state into the call for the next line.

mod backref;
mod captures;
mod grammar;
mod parser;
mod regex;
mod scope;

pub use self::backref::resolve_backrefs;
pub use self::captures::{build_boundary_anchors, build_capture_anchors, CaptureAnchor};
pub use self::grammar::{
    CaptureAttribute, CaptureMapping, Grammar, MatchRule, Rule, ScopeRule,
};
pub use self::parser::{ParseState, ParsingError, Token};
pub use self::regex::{Region, Regex, RegexError};
pub use self::scope::{ParseScopeError, Scope, ScopePath};
