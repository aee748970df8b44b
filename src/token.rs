//! The atomic unit of the preprocessing pipeline (spec §3 "Token").
//!
//! A token is copied, never aliased, whenever it is placed into an
//! expansion: mutating a copy never mutates the original. `hide_set` plays
//! the role spec §3 assigns to `expanded_from` — the set of macro names
//! currently being expanded into this token's producing chain, used purely
//! to prevent self-recursion (spec §9 "painting blue"). We use `im::HashSet`
//! over `Rc<str>` so that splicing a replacement list into thousands of
//! tokens shares the hide-set storage instead of cloning a growing `Vec`
//! per token.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Integer,
    Float,
    Str,
    Char,
    Whitespace,
    Pound,
    DoublePound,
    Punct,
    Eof,
}

pub type HideSet = im::HashSet<Rc<str>>;

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub source: Rc<str>,
    pub hide_set: HideSet,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize, source: Rc<str>) -> Self {
        Self { kind, value: value.into(), line, source, hide_set: HideSet::new() }
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }

    /// A whitespace token whose spelling contains a newline: this is what
    /// terminates a logical line (spec §4.2 step 4).
    pub fn is_newline_bearing(&self) -> bool {
        self.kind == TokenKind::Whitespace && self.value.contains('\n')
    }

    pub fn is_punct(&self, spelling: &str) -> bool {
        matches!(self.kind, TokenKind::Punct | TokenKind::Pound | TokenKind::DoublePound)
            && self.value == spelling
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.value == name
    }

    /// Stamps this token as having been produced through `macro_name`'s
    /// expansion, appending it to the hide set (spec §3 invariant).
    pub fn hide(&self, macro_name: &Rc<str>) -> Self {
        let mut t = self.clone();
        t.hide_set = t.hide_set.update(Rc::clone(macro_name));
        t
    }

    pub fn in_hide_set(&self, macro_name: &str) -> bool {
        self.hide_set.iter().any(|n| n.as_ref() == macro_name)
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}
