//! Scope names and scope paths.
//!
//! A scope is a dotted identifier like `keyword.control.if`; a scope path is
//! the ordered sequence of scopes in effect over a range of text, deepest
//! last. Comparisons between scopes happen extremely often (every token
//! emitted touches one), so `Scope` is interned into a global atom table and
//! packed into a 128-bit value instead of being a `String`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::u16;
use std::u64;

/// Number of atoms a packed `Scope` can hold.
const MAX_ATOMS: usize = 8;

lazy_static! {
    static ref SCOPE_REPO: Mutex<ScopeRepository> = Mutex::new(ScopeRepository::new());
}

/// A dotted scope name, e.g. `string.quoted.double`.
///
/// Packed as eight 16-bit atom indices (`u16::MAX` atoms per process) into
/// two `u64`s, which makes `Scope` `Copy`, cheap to compare, and lets
/// [`Scope::is_prefix_of`] run as a handful of bitwise operations. Scopes are
/// always compared against atoms from the same process-global repository.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Scope {
    a: u64,
    b: u64,
}

/// Why a string could not be turned into a [`Scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseScopeError {
    /// The optimized internal representation caps scopes at 8 atoms.
    #[error("scope has more than 8 atoms")]
    TooLong,
    /// The internal representation uses 16 bits per atom index.
    #[error("more than {} distinct atoms have been interned", u16::MAX - 1)]
    TooManyAtoms,
}

struct ScopeRepository {
    atoms: Vec<String>,
    atom_index: std::collections::HashMap<String, usize>,
}

impl ScopeRepository {
    fn new() -> Self {
        ScopeRepository {
            atoms: Vec::new(),
            atom_index: std::collections::HashMap::new(),
        }
    }

    fn intern(&mut self, atom: &str) -> usize {
        if let Some(&i) = self.atom_index.get(atom) {
            return i;
        }
        self.atoms.push(atom.to_owned());
        let i = self.atoms.len() - 1;
        self.atom_index.insert(atom.to_owned(), i);
        i
    }

    fn build(&mut self, s: &str) -> Result<Scope, ParseScopeError> {
        if s.is_empty() {
            return Ok(Scope { a: 0, b: 0 });
        }
        let indices: Vec<usize> = s.split('.').map(|atom| self.intern(atom)).collect();
        if indices.len() > MAX_ATOMS {
            return Err(ParseScopeError::TooLong);
        }
        pack(&indices)
    }

    fn atom_str(&self, atom_number: u16) -> &str {
        &self.atoms[(atom_number - 1) as usize]
    }

    fn to_string(&self, scope: Scope) -> String {
        let mut s = String::new();
        for i in 0..MAX_ATOMS {
            let atom = scope.atom_at(i);
            if atom == 0 {
                break;
            }
            if i != 0 {
                s.push('.');
            }
            s.push_str(self.atom_str(atom));
        }
        s
    }
}

fn pack(indices: &[usize]) -> Result<Scope, ParseScopeError> {
    let mut res = Scope { a: 0, b: 0 };
    for (i, &n) in indices.iter().enumerate() {
        if n >= (u16::MAX as usize) - 2 {
            return Err(ParseScopeError::TooManyAtoms);
        }
        let small = n + 1; // 0 means "unused" so every real atom is offset by one
        if i < 4 {
            res.a |= (small as u64) << ((3 - i) * 16);
        } else {
            res.b |= (small as u64) << ((7 - i) * 16);
        }
    }
    Ok(res)
}

impl Scope {
    /// Parses a scope from a series of atoms separated by `.`.
    pub fn new(s: &str) -> Result<Scope, ParseScopeError> {
        SCOPE_REPO.lock().unwrap().build(s.trim())
    }

    fn atom_at(self, index: usize) -> u16 {
        let shifted = if index < 4 {
            self.a >> ((3 - index) * 16)
        } else {
            self.b >> ((7 - index) * 16)
        };
        (shifted & 0xFFFF) as u16
    }

    fn missing_atoms(self) -> u32 {
        let trailing = if self.b == 0 {
            self.a.trailing_zeros() + 64
        } else {
            self.b.trailing_zeros()
        };
        trailing / 16
    }

    /// Number of atoms in this scope.
    pub fn len(self) -> u32 {
        MAX_ATOMS as u32 - self.missing_atoms()
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Builds the dotted string form of this scope. Locks the global
    /// repository; not something to do on every token.
    pub fn build_string(self) -> String {
        SCOPE_REPO.lock().unwrap().to_string(self)
    }

    /// True if `self` is a prefix of `other` in the scope-selector sense:
    /// every atom of `self`, in order, equals the corresponding atom of
    /// `other`. The empty scope is a prefix of everything.
    pub fn is_prefix_of(self, other: Scope) -> bool {
        let missing = self.missing_atoms();
        let mask: (u64, u64) = if missing == MAX_ATOMS as u32 {
            (0, 0)
        } else if missing == 4 {
            (u64::MAX, 0)
        } else if missing > 4 {
            (u64::MAX << ((missing - 4) * 16), 0)
        } else {
            (u64::MAX, u64::MAX << (missing * 16))
        };
        let ax = (self.a ^ other.a) & mask.0;
        let bx = (self.b ^ other.b) & mask.1;
        ax == 0 && bx == 0
    }
}

impl FromStr for Scope {
    type Err = ParseScopeError;
    fn from_str(s: &str) -> Result<Scope, ParseScopeError> {
        Scope::new(s)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build_string())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.build_string())
    }
}

impl Ord for Scope {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.a, self.b).cmp(&(other.a, other.b))
    }
}

impl PartialOrd for Scope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An ordered sequence of scopes in effect over a range of text, deepest
/// (most specific) scope last. This is spec's "scope path".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopePath {
    scopes: Vec<Scope>,
}

impl ScopePath {
    pub fn new() -> ScopePath {
        ScopePath { scopes: Vec::new() }
    }

    pub fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    pub fn as_slice(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Returns a path extended by `extra`, leaving `self` untouched. Used
    /// when a frame's path is derived from its parent's.
    pub fn extended(&self, extra: Option<Scope>) -> ScopePath {
        let mut path = self.clone();
        if let Some(s) = extra {
            path.push(s);
        }
        path
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.scopes.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", s)?;
        }
        Ok(())
    }
}
