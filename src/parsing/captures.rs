//! The capture anchor tree (spec §3 "Capture anchor", §4.6
//! "Process-hit-anchor").
//!
//! A capture anchor records a sub-region of a successful match that should
//! receive its own scope and, recursively, its own nested patterns. It's
//! built once right after a match and then consumed incrementally as the
//! engine's position reaches each anchor's start.

use super::grammar::{CaptureMapping, Rule};
use super::regex::Region;
use super::scope::Scope;

/// Builds the anchor list for a `begin` or `end` pattern match (spec §4.4's
/// `BeginRule`/`EndPattern` branches).
///
/// Unlike a plain match rule's captures (whose own `endPosition` already
/// bounds the matched text), a begin/end delimiter's own text has nothing
/// else bounding it once the frame holding `patterns`/`endPattern` is
/// unbounded (§3 "no endPosition"). So the whole match is always wrapped
/// in one synthetic root anchor scoped/patterned by whatever capture index
/// `"0"` maps to (or neither, if unmapped), with any other mapped capture
/// groups nested inside it exactly as [`build_capture_anchors`] would nest
/// them. Processing that root anchor (§4.6) is what gives the delimiter
/// its own bounded sub-frame, separate from the content that follows.
///
/// Returns empty for a zero-width match, per §4.5's "don't build an anchor
/// for an empty match" (there is no text to wrap).
pub fn build_boundary_anchors(
    region: &Region,
    captures: Option<&CaptureMapping>,
    start: usize,
    end: usize,
) -> Vec<CaptureAnchor> {
    if start == end {
        return Vec::new();
    }
    let mut whole_scope = None;
    let mut whole_patterns = Vec::new();
    let mut rest: CaptureMapping = Vec::new();
    if let Some(caps) = captures {
        for (index, attr) in caps {
            if *index == 0 {
                whole_scope = attr.scope_name;
                whole_patterns = attr.patterns.clone();
            } else {
                rest.push((*index, attr.clone()));
            }
        }
    }
    let children = if rest.is_empty() {
        Vec::new()
    } else {
        build_capture_anchors(region, &rest)
    };
    vec![CaptureAnchor {
        scope_name: whole_scope,
        patterns: whole_patterns,
        start,
        end,
        children,
    }]
}

/// One node of the capture anchor tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureAnchor {
    pub scope_name: Option<Scope>,
    /// The capture attribute's own nested patterns (spec §3 "Capture
    /// anchor" fields, §4.6 "patterns = anchor.attribute.patterns"), used
    /// to sub-highlight inside the captured region once the parser reaches
    /// it. Empty when the capture had no attribute or the attribute named
    /// no nested patterns.
    pub patterns: Vec<Rule>,
    pub start: usize,
    pub end: usize,
    pub children: Vec<CaptureAnchor>,
}

impl CaptureAnchor {
    pub fn range(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn is_empty_range(&self) -> bool {
        self.start == self.end
    }
}

/// Builds the capture anchor list for a match, given the region returned by
/// the regex engine and the rule's capture mapping. Returns one top-level
/// anchor per mapped, participating, non-empty capture group — per spec
/// §4.5, a zero-width capture "would have no children anyway" and is
/// dropped rather than producing a degenerate anchor.
///
/// Capture group nesting (e.g. group 2 lying entirely inside group 1)
/// becomes tree nesting: an anchor's `children` are exactly the other
/// mapped anchors whose range it strictly contains, themselves nested the
/// same way. Groups that don't nest are siblings at the top level.
pub fn build_capture_anchors(region: &Region, captures: &CaptureMapping) -> Vec<CaptureAnchor> {
    let mut anchors: Vec<CaptureAnchor> = Vec::new();
    for (index, attr) in captures {
        let Some((start, end)) = region.pos(*index) else {
            continue;
        };
        if start == end {
            continue;
        }
        anchors.push(CaptureAnchor {
            scope_name: attr.scope_name,
            patterns: attr.patterns.clone(),
            start,
            end,
            children: Vec::new(),
        });
    }
    nest(anchors)
}

/// Arranges a flat list of anchors into a tree by containment, preserving
/// relative order among siblings.
fn nest(mut anchors: Vec<CaptureAnchor>) -> Vec<CaptureAnchor> {
    // Widest ranges first so a container always precedes what it contains
    // when we scan for a home for each anchor.
    anchors.sort_by(|a, b| {
        (a.start, std::cmp::Reverse(a.end)).cmp(&(b.start, std::cmp::Reverse(b.end)))
    });

    let mut roots: Vec<CaptureAnchor> = Vec::new();
    for anchor in anchors {
        if !insert_into(&mut roots, anchor.clone()) {
            roots.push(anchor);
        }
    }
    roots
}

/// Tries to place `anchor` as a descendant of one of `nodes`. Returns true
/// if it found a containing home.
fn insert_into(nodes: &mut [CaptureAnchor], anchor: CaptureAnchor) -> bool {
    for node in nodes.iter_mut() {
        if node.start <= anchor.start && anchor.end <= node.end && node.range() != anchor.range() {
            if !insert_into(&mut node.children, anchor.clone()) {
                node.children.push(anchor);
                node.children.sort_by_key(|c| c.start);
            }
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::grammar::CaptureAttribute;
    use crate::parsing::regex::Regex;

    fn captures_region(pattern: &str, text: &str) -> Region {
        let regex = Regex::new(pattern.to_owned());
        let mut region = Region::new();
        assert!(regex.search(text, 0, text.len(), Some(&mut region)).unwrap());
        region
    }

    #[test]
    fn empty_captures_are_dropped() {
        let region = captures_region(r"(a)(x?)(b)", "ab");
        let mapping: CaptureMapping = vec![
            (1, CaptureAttribute::scoped(Scope::new("x").unwrap())),
            (2, CaptureAttribute::scoped(Scope::new("y").unwrap())),
            (3, CaptureAttribute::scoped(Scope::new("z").unwrap())),
        ];
        let anchors = build_capture_anchors(&region, &mapping);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].range(), (0, 1));
        assert_eq!(anchors[1].range(), (1, 2));
    }

    #[test]
    fn nested_captures_become_tree_children() {
        // group 1 spans the whole match, group 2 is the inner "b"
        let region = captures_region(r"(a(b)c)", "abc");
        let mapping: CaptureMapping = vec![
            (1, CaptureAttribute::scoped(Scope::new("outer").unwrap())),
            (2, CaptureAttribute::scoped(Scope::new("inner").unwrap())),
        ];
        let anchors = build_capture_anchors(&region, &mapping);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].range(), (0, 3));
        assert_eq!(anchors[0].children.len(), 1);
        assert_eq!(anchors[0].children[0].range(), (1, 2));
    }

    #[test]
    fn boundary_anchor_wraps_whole_match_even_without_captures() {
        let region = captures_region(r#"""#, "\"");
        let anchors = build_boundary_anchors(&region, None, 0, 1);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].range(), (0, 1));
        assert!(anchors[0].scope_name.is_none());
        assert!(anchors[0].children.is_empty());
    }

    #[test]
    fn boundary_anchor_takes_scope_from_index_zero() {
        let region = captures_region(r#"""#, "\"");
        let mapping: CaptureMapping = vec![(0, CaptureAttribute::scoped(Scope::new("punctuation").unwrap()))];
        let anchors = build_boundary_anchors(&region, Some(&mapping), 0, 1);
        assert_eq!(anchors[0].scope_name, Some(Scope::new("punctuation").unwrap()));
    }

    #[test]
    fn boundary_anchor_nests_other_captures_under_the_whole_match() {
        let region = captures_region(r#"(["'])"#, "'");
        let mapping: CaptureMapping = vec![(1, CaptureAttribute::scoped(Scope::new("quote").unwrap()))];
        let anchors = build_boundary_anchors(&region, Some(&mapping), 0, 1);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].children.len(), 1);
        assert_eq!(anchors[0].children[0].range(), (0, 1));
    }

    #[test]
    fn boundary_anchor_empty_for_zero_width_match() {
        let region = captures_region(r"(?=x)", "x");
        assert!(build_boundary_anchors(&region, None, 0, 0).is_empty());
    }
}
