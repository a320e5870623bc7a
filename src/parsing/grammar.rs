//! Data structures for representing a TextMate grammar.
//!
//! Everything here is public because callers embedding this engine in an
//! editor or highlighter may well want to build or inspect grammars
//! directly rather than only through whatever loader they bring; see
//! spec.md §1 for why this crate doesn't ship that loader itself.

use super::regex::Regex;
use super::scope::Scope;
use std::collections::HashMap;

/// Maps a capture-group index to the attribute (scope name + nested
/// patterns) it should carry, in the order the grammar author wrote them.
/// A `Vec` rather than a map because later code (the capture anchor
/// builder) wants a stable iteration order and there are never more than a
/// handful of entries.
pub type CaptureMapping = Vec<(usize, CaptureAttribute)>;

/// The scope name and nested sub-patterns attached to one capture group,
/// spec §3 "Captures map" value type.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CaptureAttribute {
    pub scope_name: Option<Scope>,
    pub patterns: Vec<Rule>,
}

impl CaptureAttribute {
    pub fn scoped(scope_name: Scope) -> CaptureAttribute {
        CaptureAttribute {
            scope_name: Some(scope_name),
            patterns: Vec::new(),
        }
    }
}

/// A rule in the grammar's pattern tree (spec §3 "Rule").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// A rule matching a single regex in one shot.
    Match(MatchRule),
    /// A rule that either brackets a nested region with `begin`/`end` (a
    /// "range rule") or simply groups `patterns` to be inlined (a "group
    /// rule"). Exactly one of these two shapes — never a mix — per spec's
    /// invariant in §3.
    Scope(ScopeRule),
    /// A named reference into the grammar's repository, resolved by the
    /// planner (§4.1).
    Include(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRule {
    pub match_pattern: Regex,
    pub scope_name: Option<Scope>,
    pub captures: Option<CaptureMapping>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeRule {
    pub scope_name: Option<Scope>,
    pub content_name: Option<Scope>,
    /// `Some((begin, end))` for a range rule, `None` for a group rule. Both
    /// present or both absent is the invariant from spec §3; there is no
    /// constructor that can build one without the other.
    pub bounds: Option<(Regex, Regex)>,
    pub begin_captures: Option<CaptureMapping>,
    pub end_captures: Option<CaptureMapping>,
    /// Applies to the region's own captures when it's a match rule; for a
    /// range rule this is unused (begin/end have their own capture maps).
    pub captures: Option<CaptureMapping>,
    pub patterns: Vec<Rule>,
}

impl Rule {
    pub fn match_rule(pattern: impl Into<String>, scope_name: Option<Scope>) -> Rule {
        Rule::Match(MatchRule {
            match_pattern: Regex::new(pattern.into()),
            scope_name,
            captures: None,
        })
    }

    pub fn match_rule_with_captures(
        pattern: impl Into<String>,
        scope_name: Option<Scope>,
        captures: CaptureMapping,
    ) -> Rule {
        Rule::Match(MatchRule {
            match_pattern: Regex::new(pattern.into()),
            scope_name,
            captures: Some(captures),
        })
    }

    /// A group rule: no begin/end, just a named place to inline `patterns`.
    pub fn group(scope_name: Option<Scope>, patterns: Vec<Rule>) -> Rule {
        Rule::Scope(ScopeRule {
            scope_name,
            content_name: None,
            bounds: None,
            begin_captures: None,
            end_captures: None,
            captures: None,
            patterns,
        })
    }

    /// A range rule: both begin and end present, per the §3 invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn range(
        begin: impl Into<String>,
        end: impl Into<String>,
        scope_name: Option<Scope>,
        content_name: Option<Scope>,
        begin_captures: Option<CaptureMapping>,
        end_captures: Option<CaptureMapping>,
        patterns: Vec<Rule>,
    ) -> Rule {
        Rule::Scope(ScopeRule {
            scope_name,
            content_name,
            bounds: Some((Regex::new(begin.into()), Regex::new(end.into()))),
            begin_captures,
            end_captures,
            captures: None,
            patterns,
        })
    }

    pub fn include(name: impl Into<String>) -> Rule {
        Rule::Include(name.into())
    }
}

impl ScopeRule {
    /// True for a range rule (begin/end pair); false for a group rule.
    pub fn is_range_rule(&self) -> bool {
        self.bounds.is_some()
    }
}

/// An immutable grammar: the top-level pattern list plus a repository of
/// named rules reachable via `Rule::Include`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grammar {
    pub scope_name: Scope,
    pub root_patterns: Vec<Rule>,
    pub repository: HashMap<String, Rule>,
}

impl Grammar {
    pub fn new(scope_name: Scope, root_patterns: Vec<Rule>) -> Grammar {
        Grammar {
            scope_name,
            root_patterns,
            repository: HashMap::new(),
        }
    }

    pub fn with_repository(
        scope_name: Scope,
        root_patterns: Vec<Rule>,
        repository: HashMap<String, Rule>,
    ) -> Grammar {
        Grammar {
            scope_name,
            root_patterns,
            repository,
        }
    }

    /// Resolves a named include against the repository. Unresolved
    /// includes are tolerated (spec §7 "Unresolved include"): the planner
    /// simply contributes nothing for them.
    pub fn resolve(&self, name: &str) -> Option<&Rule> {
        self.repository.get(name)
    }
}
