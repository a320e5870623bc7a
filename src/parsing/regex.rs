//! An abstraction over the external regex engine.
//!
//! * Keeps the chosen engine (`onig` or `fancy-regex`) confined to this
//!   module, behind the `regex-onig`/`regex-fancy` features.
//! * Lazily compiles a pattern on first use, so building a [`Grammar`](
//!   crate::parsing::Grammar) out of pattern strings can never itself fail;
//!   only a `search` call can surface a compile error.
//! * Exposes match positions through [`Region`], index 0 being the whole
//!   match and index N the N-th capture group, absent if it didn't
//!   participate — exactly the contract spec §6(c) asks of the regex
//!   library.

use once_cell::sync::OnceCell;
use std::error::Error as StdError;
use std::fmt;

/// A compile or search failure from the underlying regex engine.
#[derive(Debug, Clone)]
pub struct RegexError {
    pattern: String,
    message: String,
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error compiling regex '{}': {}", self.pattern, self.message)
    }
}

impl StdError for RegexError {}

/// A lazily-compiled regex pattern.
#[derive(Debug)]
pub struct Regex {
    regex_str: String,
    regex: OnceCell<Result<regex_impl::Regex, String>>,
}

/// Capture-group positions from a successful search.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Region {
    region: regex_impl::Region,
}

impl Regex {
    /// Creates a regex from a pattern string. Compilation is deferred to
    /// first use, see the module docs.
    pub fn new(regex_str: String) -> Self {
        Regex {
            regex_str,
            regex: OnceCell::new(),
        }
    }

    pub fn regex_str(&self) -> &str {
        &self.regex_str
    }

    /// Searches `text[begin..end]` (not `text[begin..]` — the caller's
    /// computed search range from §4.2 is respected exactly, including for
    /// lookaround, which still sees the full `text` for context but cannot
    /// match past `end`).
    pub fn search(
        &self,
        text: &str,
        begin: usize,
        end: usize,
        region: Option<&mut Region>,
    ) -> Result<bool, RegexError> {
        let compiled = self.compiled()?;
        Ok(compiled.search(text, begin, end, region.map(|r| &mut r.region)))
    }

    fn compiled(&self) -> Result<&regex_impl::Regex, RegexError> {
        match self
            .regex
            .get_or_init(|| regex_impl::Regex::new(&self.regex_str).map_err(|e| e.to_string()))
        {
            Ok(r) => Ok(r),
            Err(message) => Err(RegexError {
                pattern: self.regex_str.clone(),
                message: message.clone(),
            }),
        }
    }
}

impl Clone for Regex {
    fn clone(&self) -> Self {
        Regex {
            regex_str: self.regex_str.clone(),
            regex: OnceCell::new(),
        }
    }
}

impl PartialEq for Regex {
    fn eq(&self, other: &Regex) -> bool {
        self.regex_str == other.regex_str
    }
}

impl Eq for Regex {}

impl Region {
    pub fn new() -> Self {
        Region {
            region: regex_impl::new_region(),
        }
    }

    /// Start/end byte offsets of capture group `index` (0 = whole match),
    /// or `None` if the group didn't participate in the match.
    pub fn pos(&self, index: usize) -> Option<(usize, usize)> {
        self.region.pos(index)
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "regex-onig")]
mod regex_impl {
    pub use onig::Region;
    use onig::{MatchParam, RegexOptions, SearchOptions, Syntax};
    use std::error::Error;

    #[derive(Debug)]
    pub struct Regex {
        regex: onig::Regex,
    }

    pub fn new_region() -> Region {
        Region::with_capacity(8)
    }

    impl Regex {
        pub fn new(regex_str: &str) -> Result<Regex, Box<dyn Error + Send + Sync + 'static>> {
            let result = onig::Regex::with_options(
                regex_str,
                RegexOptions::REGEX_OPTION_CAPTURE_GROUP,
                Syntax::default(),
            );
            match result {
                Ok(regex) => Ok(Regex { regex }),
                Err(error) => Err(Box::new(error)),
            }
        }

        pub fn search(
            &self,
            text: &str,
            begin: usize,
            end: usize,
            region: Option<&mut Region>,
        ) -> bool {
            let matched = self.regex.search_with_param(
                text,
                begin,
                end,
                SearchOptions::SEARCH_OPTION_NONE,
                region,
                MatchParam::default(),
            );
            // Catastrophic backtracking etc. surfaces as an Err from onig;
            // treat it as "no match" rather than propagating, matching how
            // the engine treats exhausted retry budgets elsewhere.
            matches!(matched, Ok(Some(_)))
        }
    }
}

#[cfg(all(feature = "regex-fancy", not(feature = "regex-onig")))]
mod regex_impl {
    use std::error::Error;

    #[derive(Debug)]
    pub struct Regex {
        regex: fancy_regex::Regex,
    }

    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct Region {
        positions: Vec<Option<(usize, usize)>>,
    }

    pub fn new_region() -> Region {
        Region {
            positions: Vec::with_capacity(8),
        }
    }

    impl Regex {
        pub fn new(regex_str: &str) -> Result<Regex, Box<dyn Error + Send + Sync + 'static>> {
            match fancy_regex::Regex::new(regex_str) {
                Ok(regex) => Ok(Regex { regex }),
                Err(error) => Err(Box::new(error)),
            }
        }

        pub fn search(
            &self,
            text: &str,
            begin: usize,
            end: usize,
            region: Option<&mut Region>,
        ) -> bool {
            if let Ok(Some(captures)) = self.regex.captures_from_pos(&text[..end], begin) {
                if let Some(region) = region {
                    region.init_from_captures(&captures);
                }
                true
            } else {
                false
            }
        }
    }

    impl Region {
        fn init_from_captures(&mut self, captures: &fancy_regex::Captures) {
            self.positions.clear();
            for i in 0..captures.len() {
                self.positions.push(captures.get(i).map(|m| (m.start(), m.end())));
            }
        }

        pub fn pos(&self, i: usize) -> Option<(usize, usize)> {
            self.positions.get(i).copied().flatten()
        }
    }
}
