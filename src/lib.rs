//! A per-line syntax-highlighting tokenizer built on the TextMate grammar
//! model: a tree of nested `match`/`begin`/`end` pattern rules against a
//! regex engine, driving a state-stack machine that emits a token stream
//! for one line at a time.
//!
//! Grammar loading (YAML/JSON/plist), theme application, and a multi-line
//! driver that aggregates results across a whole document are deliberately
//! not part of this crate; it covers the hard part underneath all three of
//! those: [`parsing::ParseState::parse_line`].
//!
//! Start with [`parsing::Grammar`] to build a rule tree, then feed lines
//! through a [`parsing::ParseState`] threaded across calls the same way a
//! caller would thread it across the lines of a document.

#![doc(html_root_url = "https://docs.rs/tmtoken/0.1.0")]

#[macro_use]
extern crate lazy_static;
#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod parsing;
pub mod util;
