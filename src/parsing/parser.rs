//! The per-line parsing engine (spec §3 "Parser state", "State stack",
//! §4 "Component design").
//!
//! This is the hard part of the crate: given a [`Grammar`] and a line of
//! text, [`ParseState::parse_line`] drives the state-stack machine that
//! chooses which regex matches first, pushes and pops nested scopes, and
//! emits a token stream covering the line. Everything here is a direct
//! translation of spec §4.1-§4.8; see the doc comment on each piece for
//! the section it implements.

use std::fmt;

use super::captures::{build_boundary_anchors, build_capture_anchors, CaptureAnchor};
use super::grammar::{CaptureMapping, Grammar, MatchRule, Rule, ScopeRule};
use super::regex::{Region, Regex, RegexError};
use super::scope::{Scope, ScopePath};
use super::backref::resolve_backrefs;

/// Errors that can occur while parsing one line (spec §7).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParsingError {
    /// A match plan pointed at a rule shape the engine doesn't know how to
    /// apply. Never produced by this crate's own planner; reserved for
    /// callers who hand-build a `MatchPlan`.
    #[error("match plan referenced a rule that is not a match rule")]
    BadMatchPlan,
    /// An `{include}` named a repository entry the grammar doesn't have.
    /// The planner itself tolerates this (§7 "Unresolved include");
    /// reserved for stricter callers that want to treat it as fatal.
    #[error("missing repository entry for include {0:?}")]
    UnresolvedInclude(String),
    /// A `pop` phase fired on a frame the engine didn't push itself, e.g.
    /// a hand-built or corrupted [`ParseState`] (§7 "grammar-integrity
    /// violation").
    #[error("end pattern popped a frame with no owning scope rule")]
    PopWithoutScopeRule,
    /// The text about to be popped off the scope path doesn't match the
    /// `contentName` that was pushed when the frame was entered.
    #[error("contentName mismatch on pop: expected {expected:?}, found {found:?}")]
    ContentNameMismatch {
        expected: Option<Scope>,
        found: Option<Scope>,
    },
    /// The regex engine failed to compile or search a pattern.
    #[error("regex engine error: {0}")]
    Regex(#[from] RegexError),
}

/// A half-open range of a source line paired with the scope path in
/// effect over it (spec §3 "Token"). Tokens never overlap and are
/// returned in strictly increasing start order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub scope_path: ScopePath,
}

/// What a frame does when it becomes the top of the stack again (spec §3
/// "phase").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Entered a begin-rule's body; `contentName` hasn't been applied yet.
    PushContent,
    /// Steady state: `contentName`, if any, is already on the scope path.
    Content,
    /// The owning end-pattern already matched; remove this frame on the
    /// next iteration.
    Pop,
}

/// One frame of the parser's state stack (spec §3 "Parser state"). Value
/// type, moved (not shared) between line parses, per §9's design notes.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Frame {
    phase: Option<Phase>,
    patterns: Vec<Rule>,
    capture_anchors: Vec<CaptureAnchor>,
    scope_path: ScopePath,
    end_pattern: Option<Regex>,
    end_position: Option<usize>,
    /// Set only on a scope rule's content frame; used both to push the
    /// name when `PushContent` fires and to verify the matching pop.
    content_name: Option<Scope>,
    end_captures: Option<CaptureMapping>,
}

impl Frame {
    fn root(grammar: &Grammar) -> Frame {
        Frame {
            phase: None,
            patterns: grammar.root_patterns.clone(),
            capture_anchors: Vec::new(),
            scope_path: ScopePath::new(),
            end_pattern: None,
            end_position: None,
            content_name: None,
            end_captures: None,
        }
    }
}

/// Keeps the parser's state stack between lines of input (spec §3 "State
/// stack"). Construct one with [`ParseState::new`] at the start of a
/// document and feed it one line at a time to [`ParseState::parse_line`];
/// the updated state threads through to the next call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseState {
    stack: Vec<Frame>,
}

impl ParseState {
    /// Starts a fresh parse at the grammar's root, with an empty scope
    /// path (spec §3: "a root frame that carries the grammar's top-level
    /// patterns and empty scope path").
    pub fn new(grammar: &Grammar) -> ParseState {
        ParseState {
            stack: vec![Frame::root(grammar)],
        }
    }

    /// Parses one line against `grammar`, returning the tokens that cover
    /// it. `trace`, when present, receives the human-readable trace lines
    /// of spec §6.
    pub fn parse_line(
        &mut self,
        line: &str,
        grammar: &Grammar,
        mut trace: Option<&mut dyn fmt::Write>,
    ) -> Result<Vec<Token>, ParsingError> {
        let line_end = line.len();
        let mut position = 0usize;
        let mut tokens = Vec::new();

        // Loop prevention: the position/stack-depth recorded right after a
        // push whose winning match consumed nothing. Ported from the
        // teacher's `non_consuming_push_at` (`parser.rs`'s "Preventing
        // loops" block) - if we come straight back to this exact spot with
        // another non-consuming outcome, the push+pop cycle would repeat
        // forever. A stack depth of 0 never occurs (the root frame is
        // always present), so `(0, 0)` is a safe sentinel for "no push yet".
        let mut non_consuming_push_at: (usize, usize) = (0, 0);

        loop {
            // 1. Phase handling (§4.4 step 1).
            loop {
                let phase = self.top().phase;
                match phase {
                    Some(Phase::PushContent) => {
                        let top = self.top_mut();
                        if let Some(name) = top.content_name {
                            top.scope_path.push(name);
                        }
                        top.phase = Some(Phase::Content);
                        trace_line(&mut trace, "apply contentName")?;
                        break;
                    }
                    Some(Phase::Content) | None => break,
                    Some(Phase::Pop) => {
                        self.pop_frame()?;
                        trace_line(&mut trace, "pop")?;
                        continue;
                    }
                }
            }

            // 2. Anchor cleanup (§4.4 step 2): anchors fully behind the
            // cursor are done and are dropped from the top frame's list.
            self.top_mut().capture_anchors.retain(|a| a.end > position);

            let check_loop = non_consuming_push_at == (position, self.stack.len());

            // 3. Compute the search end and the candidate plans (§4.1,
            // §4.2).
            let search_end = compute_search_end(self.top(), position, line_end);
            let plans = collect_plans(self.top(), grammar);
            let current_path = self.top().scope_path.clone();

            if let Some(t) = trace.as_deref_mut() {
                writeln!(t, "match plans, position {}", position)?;
                for (i, plan) in plans.iter().enumerate() {
                    writeln!(t, "[{}/{}]{}", i + 1, plans.len(), plan.describe())?;
                }
            }

            let range_end = search_end.position();
            let hit = search_plans(line, position, range_end, &plans)?;

            // We are back at the exact (position, stack depth) a
            // non-consuming push left us at, and the outcome this time is
            // again non-consuming: applying it would just repeat the same
            // cycle. Skip one character under the current scope instead.
            let would_loop = check_loop
                && match &hit {
                    Some(h) => h.start == position && h.end == position,
                    None => range_end == position,
                };

            if would_loop {
                match line[position..].char_indices().nth(1) {
                    Some((offset, _)) => {
                        tokens.push(Token {
                            start: position,
                            end: position + offset,
                            scope_path: current_path,
                        });
                        position += offset;
                        trace_line(&mut trace, "skip zero-width loop")?;
                        while self.stack.len() > 1 && self.top().end_position.map_or(false, |p| p <= position) {
                            self.pop_frame()?;
                            trace_line(&mut trace, "pop")?;
                        }
                        continue;
                    }
                    None => {
                        if position < line_end {
                            tokens.push(Token {
                                start: position,
                                end: line_end,
                                scope_path: current_path,
                            });
                        }
                        trace_line(&mut trace, "skip zero-width loop, end line")?;
                        break;
                    }
                }
            }

            match hit {
                None => {
                    if range_end > position {
                        tokens.push(Token {
                            start: position,
                            end: range_end,
                            scope_path: current_path,
                        });
                    }
                    match search_end {
                        SearchEnd::BeginCapture(anchor) => {
                            position = anchor.start;
                            self.process_hit_anchor(&anchor);
                            trace_line(&mut trace, "push state: anchor")?;
                        }
                        SearchEnd::EndPosition(p) => {
                            position = p;
                            self.pop_frame()?;
                            trace_line(&mut trace, "pop state")?;
                        }
                        SearchEnd::Line(_) => {
                            debug_assert!(
                                self.top().capture_anchors.is_empty(),
                                "end of line reached with pending capture anchors"
                            );
                            trace_line(&mut trace, "no match, end line")?;
                            break;
                        }
                    }
                }
                Some(hit) => {
                    if hit.start > position {
                        tokens.push(Token {
                            start: position,
                            end: hit.start,
                            scope_path: current_path,
                        });
                    }
                    position = hit.start;
                    trace_line(&mut trace, &format!("match!: {}", plans[hit.plan_index].describe()))?;
                    // Only `BeginRule` can still win a zero-width match here
                    // (`MatchRule` zero-width hits are filtered out by
                    // `search_plans`); record it so the next iteration can
                    // recognize an immediate, position-unchanged pop back to
                    // this exact depth as the other half of a loop.
                    let pushes = matches!(plans[hit.plan_index], MatchPlan::BeginRule(_));
                    let non_consuming = hit.start == hit.end;
                    self.apply_plan(&plans[hit.plan_index], &hit, line, &mut trace)?;
                    if pushes && non_consuming {
                        non_consuming_push_at = (position, self.stack.len());
                    }
                }
            }
        }

        Ok(tokens)
    }

    fn top(&self) -> &Frame {
        self.stack.last().expect("state stack is never empty")
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("state stack is never empty")
    }

    /// Pushes a frame, clamping its `endPosition` to the current top's if
    /// set (spec §4.8 "push-state clamp").
    fn push_frame(&mut self, mut frame: Frame) {
        if let Some(parent_end) = self.top().end_position {
            frame.end_position = Some(frame.end_position.map_or(parent_end, |e| e.min(parent_end)));
        }
        self.stack.push(frame);
    }

    /// Removes the top frame. The root frame is never popped; reaching it
    /// here means a grammar-integrity violation (spec §7).
    fn pop_frame(&mut self) -> Result<(), ParsingError> {
        if self.stack.len() <= 1 {
            return Err(ParsingError::PopWithoutScopeRule);
        }
        self.stack.pop();
        Ok(())
    }

    /// Process-hit-anchor (spec §4.6): pushes a frame scoped to `anchor`,
    /// bounded to its own range.
    fn process_hit_anchor(&mut self, anchor: &CaptureAnchor) {
        let scope_path = self.top().scope_path.extended(anchor.scope_name);
        self.push_frame(Frame {
            phase: None,
            patterns: anchor.patterns.clone(),
            capture_anchors: anchor.children.clone(),
            scope_path,
            end_pattern: None,
            end_position: Some(anchor.end),
            content_name: None,
            end_captures: None,
        });
    }

    fn apply_plan(
        &mut self,
        plan: &MatchPlan,
        hit: &SearchHit,
        line: &str,
        trace: &mut Option<&mut dyn fmt::Write>,
    ) -> Result<(), ParsingError> {
        match plan {
            MatchPlan::MatchRule(rule) => {
                let scope_path = self.top().scope_path.extended(rule.scope_name);
                let anchors = match &rule.captures {
                    Some(caps) => build_capture_anchors(&hit.region, caps),
                    None => Vec::new(),
                };
                self.push_frame(Frame {
                    phase: None,
                    patterns: Vec::new(),
                    capture_anchors: anchors,
                    scope_path,
                    end_pattern: None,
                    end_position: Some(hit.end),
                    content_name: None,
                    end_captures: None,
                });
                trace_line(trace, "push state")?;
                self.process_leading_anchor(hit.start, trace)?;
            }
            MatchPlan::BeginRule(rule) => {
                let (begin, end) = rule.bounds.as_ref().expect("BeginRule plan always has bounds");
                let scope_path = self.top().scope_path.extended(rule.scope_name);
                let mut begin_region = Region::new();
                begin.search(line, hit.start, hit.end, Some(&mut begin_region))?;
                let resolved_end = resolve_backrefs(end, &hit.region, line);
                let anchors = build_boundary_anchors(&hit.region, rule.begin_captures.as_ref(), hit.start, hit.end);
                self.push_frame(Frame {
                    phase: Some(Phase::PushContent),
                    patterns: rule.patterns.clone(),
                    capture_anchors: anchors,
                    scope_path,
                    end_pattern: Some(resolved_end),
                    end_position: None,
                    content_name: rule.content_name,
                    end_captures: rule.end_captures.clone(),
                });
                trace_line(trace, "push state")?;
                self.process_leading_anchor(hit.start, trace)?;
            }
            MatchPlan::EndPattern => {
                let top = self.top_mut();
                if let Some(expected) = top.content_name {
                    let found = top.scope_path.pop();
                    if found != Some(expected) {
                        return Err(ParsingError::ContentNameMismatch { expected: Some(expected), found });
                    }
                }
                top.phase = Some(Phase::Pop);
                let end_captures = top.end_captures.clone();
                let anchors = build_boundary_anchors(&hit.region, end_captures.as_ref(), hit.start, hit.end);
                if let Some(anchor) = anchors.into_iter().next() {
                    self.process_hit_anchor(&anchor);
                    trace_line(trace, "push state: anchor")?;
                }
            }
        }
        Ok(())
    }

    /// After pushing a frame for a match/begin rule, the spec's "process
    /// hit anchor if one was built" shortcut (§4.4 step 6): when the
    /// earliest anchor on the just-pushed frame starts exactly where we
    /// are, enter it immediately instead of waiting a full loop iteration
    /// to rediscover it.
    fn process_leading_anchor(&mut self, position: usize, trace: &mut Option<&mut dyn fmt::Write>) -> Result<(), ParsingError> {
        let leading = self
            .top()
            .capture_anchors
            .iter()
            .filter(|a| a.start >= position)
            .min_by_key(|a| a.start)
            .filter(|a| a.start == position)
            .cloned();
        if let Some(anchor) = leading {
            self.process_hit_anchor(&anchor);
            trace_line(trace, "push state: anchor")?;
        }
        Ok(())
    }
}

fn trace_line(trace: &mut Option<&mut dyn fmt::Write>, line: &str) -> Result<(), fmt::Error> {
    if let Some(t) = trace.as_deref_mut() {
        writeln!(t, "{}", line)?;
    }
    Ok(())
}

/// A candidate for the next search (spec §3 "Match plan", §4.1).
#[derive(Clone, Debug)]
enum MatchPlan {
    EndPattern,
    MatchRule(MatchRule),
    BeginRule(ScopeRule),
}

impl MatchPlan {
    fn regex(&self, frame: &Frame) -> Regex {
        match self {
            MatchPlan::EndPattern => frame.end_pattern.clone().expect("EndPattern plan implies an end pattern"),
            MatchPlan::MatchRule(r) => r.match_pattern.clone(),
            MatchPlan::BeginRule(r) => r.bounds.as_ref().expect("BeginRule plan always has bounds").0.clone(),
        }
    }

    fn describe(&self) -> String {
        match self {
            MatchPlan::EndPattern => "EndPattern".to_string(),
            MatchPlan::MatchRule(r) => format!("MatchRule(/{}/)", r.match_pattern.regex_str()),
            MatchPlan::BeginRule(r) => format!(
                "BeginRule(/{}/)",
                r.bounds.as_ref().map(|(b, _)| b.regex_str()).unwrap_or("")
            ),
        }
    }
}

/// Match planner (spec §4.1): enumerates candidate regexes for the next
/// search against the current frame.
fn collect_plans(frame: &Frame, grammar: &Grammar) -> Vec<MatchPlan> {
    let mut plans = Vec::new();
    if frame.end_pattern.is_some() {
        plans.push(MatchPlan::EndPattern);
    }
    expand_patterns(&frame.patterns, grammar, &mut plans);
    plans
}

fn expand_patterns(rules: &[Rule], grammar: &Grammar, plans: &mut Vec<MatchPlan>) {
    for rule in rules {
        match rule {
            Rule::Include(name) => {
                if let Some(resolved) = grammar.resolve(name) {
                    expand_patterns(std::slice::from_ref(resolved), grammar, plans);
                }
            }
            Rule::Match(m) => plans.push(MatchPlan::MatchRule(m.clone())),
            Rule::Scope(s) if s.is_range_rule() => plans.push(MatchPlan::BeginRule(s.clone())),
            Rule::Scope(s) => expand_patterns(&s.patterns, grammar, plans),
        }
    }
}

/// The upper bound of the next search (spec §4.2).
enum SearchEnd {
    BeginCapture(CaptureAnchor),
    EndPosition(usize),
    Line(usize),
}

impl SearchEnd {
    fn position(&self) -> usize {
        match self {
            SearchEnd::BeginCapture(a) => a.start,
            SearchEnd::EndPosition(p) => *p,
            SearchEnd::Line(p) => *p,
        }
    }
}

fn compute_search_end(frame: &Frame, position: usize, line_end: usize) -> SearchEnd {
    let anchor = frame
        .capture_anchors
        .iter()
        .filter(|a| a.start >= position)
        .filter(|a| frame.end_position.map_or(true, |p| a.end <= p))
        .min_by_key(|a| a.start);
    if let Some(anchor) = anchor {
        return SearchEnd::BeginCapture(anchor.clone());
    }
    if let Some(p) = frame.end_position {
        return SearchEnd::EndPosition(p);
    }
    SearchEnd::Line(line_end)
}

/// The winning candidate from a multi-pattern leftmost search (spec §4.3).
struct SearchHit {
    plan_index: usize,
    start: usize,
    end: usize,
    region: Region,
}

/// Multi-pattern leftmost search (spec §4.3): searches every plan within
/// `[position, range_end)` and returns the one with the smallest start,
/// ties broken by plan index (first wins).
fn search_plans(
    line: &str,
    position: usize,
    range_end: usize,
    plans: &[MatchPlan],
) -> Result<Option<SearchHit>, ParsingError> {
    let mut best: Option<SearchHit> = None;
    for (index, plan) in plans.iter().enumerate() {
        // `regex()` needs the owning frame only for `EndPattern`, which we
        // don't have direct access to here; callers only ever reach this
        // with plans produced by `collect_plans` against the live frame,
        // so we re-derive the regex through the plan itself.
        let regex = plan_regex(plan);
        let mut region = Region::new();
        if regex.search(line, position, range_end, Some(&mut region))? {
            let (start, end) = region.pos(0).expect("a successful search always has a whole match");
            // A plain match rule that matches nothing doesn't do anything -
            // no token, no push worth keeping - so treat it as a non-match
            // rather than let it win and spin forever on the same spot.
            // `EndPattern`/`BeginRule` genuinely push or pop and are exempt:
            // `parse_line`'s non-consuming-push tracking covers those.
            if matches!(plan, MatchPlan::MatchRule(_)) && start == end {
                continue;
            }
            let better = match &best {
                None => true,
                Some(b) => start < b.start,
            };
            if better {
                best = Some(SearchHit { plan_index: index, start, end, region });
            }
        }
    }
    Ok(best)
}

fn plan_regex(plan: &MatchPlan) -> &Regex {
    match plan {
        MatchPlan::EndPattern => unreachable!("EndPattern plans carry their regex via the owning frame"),
        MatchPlan::MatchRule(r) => &r.match_pattern,
        MatchPlan::BeginRule(r) => &r.bounds.as_ref().expect("BeginRule plan always has bounds").0,
    }
}
