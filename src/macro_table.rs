//! Macro records and the prescan that computes patch lists (spec §3 "Macro",
//! §4.4 "Macro prescan", §4.9 "`#define` handling").
//!
//! Patch lists mark where arguments must be substituted, stringified, pasted
//! or variadic-comma-elided, computed once at definition time rather than by
//! re-scanning the replacement list on every invocation (spec §9: "a
//! performance choice, not a semantics choice").

use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::{PpError, SourceContext};
use crate::lexer::classify_spelling;
use crate::token::Token;
use crate::token_utils::{collect_arguments, trim_whitespace, trimmed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Expand,
    Concat,
}

#[derive(Debug, Clone)]
pub struct PatchEntry {
    pub kind: PatchKind,
    pub arg_index: usize,
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub value: Vec<Token>,
    /// `None`: object-like. `Some(params)`: function-like (possibly empty).
    pub arglist: Option<Vec<String>>,
    pub variadic: bool,
    pub vararg: Option<String>,
    /// Sorted by descending `position` (spec §3 invariant).
    pub patch: Vec<PatchEntry>,
    pub str_patch: Vec<(usize, usize)>,
    pub var_comma_patch: Vec<usize>,
}

impl Macro {
    pub fn object_like(name: impl Into<String>, value: Vec<Token>) -> Self {
        Self {
            name: name.into(),
            value,
            arglist: None,
            variadic: false,
            vararg: None,
            patch: Vec::new(),
            str_patch: Vec::new(),
            var_comma_patch: Vec::new(),
        }
    }

    pub fn is_function_like(&self) -> bool {
        self.arglist.is_some()
    }

    /// Builds a function-like macro and runs the prescan (spec §4.4).
    pub fn function_like(
        name: impl Into<String>,
        arglist: Vec<String>,
        variadic: bool,
        vararg: Option<String>,
        value: Vec<Token>,
    ) -> Self {
        let mut m = Self {
            name: name.into(),
            value,
            arglist: Some(arglist),
            variadic,
            vararg,
            patch: Vec::new(),
            str_patch: Vec::new(),
            var_comma_patch: Vec::new(),
        };
        m.prescan();
        m
    }

    fn param_index(&self, name: &str) -> Option<usize> {
        let arglist = self.arglist.as_ref()?;
        if let Some(pos) = arglist.iter().position(|p| p == name) {
            return Some(pos);
        }
        if self.variadic && self.vararg.as_deref() == Some(name) {
            return Some(arglist.len());
        }
        None
    }

    /// spec §4.4: walk the (already `##`-whitespace-stripped) replacement
    /// list, classify each parameter occurrence, and collapse any leftover
    /// literal-to-literal `##` pastes (tokens on neither side a parameter)
    /// at definition time, since those never depend on arguments.
    fn prescan(&mut self) {
        self.collapse_literal_pastes();

        let mut i = 0usize;
        let mut patch = Vec::new();
        let mut str_patch = Vec::new();
        let mut var_comma_patch = Vec::new();

        while i < self.value.len() {
            let Some(arg_index) = self.ident_param_index(i) else {
                i += 1;
                continue;
            };

            if let Some(j) = self.prev_significant(i) {
                if self.value[j].is_punct("#") {
                    // Remove only the `#` (and any whitespace between it and
                    // the parameter); the parameter token itself is kept as
                    // the substitution placeholder and now sits at index j.
                    str_patch.push((arg_index, j));
                    self.value.drain(j..i);
                    i = j + 1;
                    continue;
                }
                if self.value[j].is_punct("##") {
                    // Variadic-comma-elision bookkeeping: `, ## __VA_ARGS__`.
                    if self.variadic && self.vararg.as_deref() == self.param_name(arg_index) {
                        if let Some(k) = self.prev_significant(j) {
                            if self.value[k].is_punct(",") {
                                var_comma_patch.extend(k..j);
                            }
                        }
                    }
                    patch.push(PatchEntry { kind: PatchKind::Concat, arg_index, position: j });
                    self.value.drain(j..i);
                    i = j + 1;
                    continue;
                }
            }

            if let Some(k) = self.next_significant(i) {
                if self.value[k].is_punct("##") {
                    // The `##` is left in place; a generic paste pass at
                    // substitution time (expander) pastes it with whatever
                    // follows once the argument is spliced in.
                    patch.push(PatchEntry { kind: PatchKind::Concat, arg_index, position: i });
                    i += 1;
                    continue;
                }
            }

            patch.push(PatchEntry { kind: PatchKind::Expand, arg_index, position: i });
            i += 1;
        }

        patch.sort_by_key(|p| std::cmp::Reverse(p.position));
        self.patch = patch;
        self.str_patch = str_patch;
        self.var_comma_patch = var_comma_patch;
    }

    fn param_name(&self, arg_index: usize) -> Option<&str> {
        let arglist = self.arglist.as_ref()?;
        if arg_index < arglist.len() {
            Some(arglist[arg_index].as_str())
        } else {
            self.vararg.as_deref()
        }
    }

    fn ident_param_index(&self, i: usize) -> Option<usize> {
        let tok = &self.value[i];
        if tok.kind != crate::token::TokenKind::Identifier {
            return None;
        }
        self.param_index(&tok.value)
    }

    fn prev_significant(&self, i: usize) -> Option<usize> {
        let mut j = i;
        while j > 0 {
            j -= 1;
            if !self.value[j].is_whitespace() {
                return Some(j);
            }
        }
        None
    }

    fn next_significant(&self, i: usize) -> Option<usize> {
        let mut j = i + 1;
        while j < self.value.len() {
            if !self.value[j].is_whitespace() {
                return Some(j);
            }
            j += 1;
        }
        None
    }

    /// Collapses `X ## Y` where neither `X` nor `Y` is a macro parameter:
    /// these are static pastes that never depend on an invocation's
    /// arguments, so we fold them once, here, instead of patching them.
    fn collapse_literal_pastes(&mut self) {
        let mut i = 0;
        while i < self.value.len() {
            if !self.value[i].is_punct("##") {
                i += 1;
                continue;
            }
            let left = self.prev_significant(i);
            let right = self.next_significant(i);
            let left_is_param = left.is_some_and(|l| self.ident_param_index(l).is_some());
            let right_is_param = right.is_some_and(|r| self.ident_param_index(r).is_some());
            if left_is_param || right_is_param {
                i += 1;
                continue;
            }
            let (Some(l), Some(r)) = (left, right) else {
                i += 1;
                continue;
            };
            let pasted_value = format!("{}{}", self.value[l].value, self.value[r].value);
            let kind = classify_spelling(&pasted_value);
            let mut pasted = self.value[l].clone();
            pasted.kind = kind;
            pasted.value = pasted_value;
            self.value.splice(l..=r, std::iter::once(pasted));
            i = l;
        }
    }

    /// Parses a `#define`'s token sequence per spec §4.9 (the name token has
    /// already been consumed by the caller; `rest` starts right after it).
    pub fn parse_define(
        name: &str,
        rest: &[Token],
        ctx: &SourceContext,
    ) -> Result<Macro, PpError> {
        if rest.first().is_some_and(|t| t.is_punct("(")) {
            return Self::parse_function_like(name, rest, ctx);
        }
        // Object-like: drop a single leading whitespace separator, if any.
        let body = if rest.first().is_some_and(|t| t.is_whitespace()) { &rest[1..] } else { rest };
        Ok(Macro::function_like_or_object(name, trimmed(body.to_vec())))
    }

    fn function_like_or_object(name: &str, value: Vec<Token>) -> Macro {
        Macro::object_like(name, value)
    }

    fn parse_function_like(name: &str, rest: &[Token], ctx: &SourceContext) -> Result<Macro, PpError> {
        let collected = collect_arguments(rest, 0, false, ctx)?;
        let mut params = Vec::new();
        let mut variadic = false;
        let mut vararg = None;

        for (idx, raw_arg) in collected.args.iter().enumerate() {
            // `()` function-like macro with zero params collects one empty arg.
            if collected.args.len() == 1 && raw_arg.is_empty() {
                break;
            }
            let arg = trimmed(raw_arg.clone());
            if variadic {
                return Err(PpError::semantic(
                    ctx.clone(),
                    "no parameter may follow a variadic parameter",
                ));
            }
            if arg.len() == 1 && arg[0].is_punct("...") {
                variadic = true;
                vararg = Some("__VA_ARGS__".to_string());
                continue;
            }
            if arg.len() >= 2 && arg.last().unwrap().is_punct("...") {
                let mut name_tok = arg[..arg.len() - 1].to_vec();
                trim_whitespace(&mut name_tok);
                if name_tok.len() != 1 {
                    return Err(PpError::syntax(
                        ctx.clone(),
                        format!("malformed parameter #{idx} in macro definition"),
                    ));
                }
                variadic = true;
                vararg = Some(name_tok[0].value.clone());
                continue;
            }
            if arg.len() != 1 || arg[0].kind != crate::token::TokenKind::Identifier {
                return Err(PpError::syntax(
                    ctx.clone(),
                    format!("malformed parameter #{idx} in macro definition"),
                ));
            }
            params.push(arg[0].value.clone());
        }

        let body_start = collected.consumed;
        let mut body = trimmed(rest[body_start..].to_vec());
        strip_whitespace_around_paste_ops(&mut body, vararg.as_deref());

        Ok(Macro::function_like(name, params, variadic, vararg, body))
    }
}

/// spec §4.4: "Whitespace adjacent to `##` in the replacement list is
/// stripped at definition time." The `, ## __VA_ARGS__` comma-elision idiom
/// is exempted on its left side: that whitespace separates the preceding
/// argument from the (possibly-elided) comma rather than participating in
/// an actual token paste, so it is kept for when the variadic argument is
/// non-empty (spec §8 scenario 4: `printf("x=%d", 7)`, not `,7`).
fn strip_whitespace_around_paste_ops(tokens: &mut Vec<Token>, vararg: Option<&str>) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_punct("##") {
            let is_comma_elision = vararg.is_some_and(|v| {
                let left_is_comma = i > 0 && {
                    let mut j = i;
                    while j > 0 && tokens[j - 1].is_whitespace() {
                        j -= 1;
                    }
                    j > 0 && tokens[j - 1].is_punct(",")
                };
                let mut k = i + 1;
                while k < tokens.len() && tokens[k].is_whitespace() {
                    k += 1;
                }
                left_is_comma && tokens.get(k).is_some_and(|t| t.value == v)
            });
            if !is_comma_elision {
                while i > 0 && tokens[i - 1].is_whitespace() {
                    tokens.remove(i - 1);
                    i -= 1;
                }
            }
            while i + 1 < tokens.len() && tokens[i + 1].is_whitespace() {
                tokens.remove(i + 1);
            }
        }
        i += 1;
    }
}

/// Mapping from identifier string to [`Macro`]; unique names, redefinition
/// silently replaces (spec §3 "Macro table").
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self { macros: HashMap::new() }
    }

    pub fn define(&mut self, m: Macro) {
        self.macros.insert(m.name.clone(), m);
    }

    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn set_object_like(&mut self, name: &str, value: &str, source: &Rc<str>) {
        let toks = crate::lexer::tokenize(value, source);
        self.define(Macro::object_like(name, trimmed(toks)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use std::rc::Rc;

    fn src() -> Rc<str> {
        Rc::from("t.c")
    }

    fn define(text: &str) -> Macro {
        let toks = tokenize(text, &src());
        let name = toks[0].value.clone();
        let ctx = SourceContext::new("t.c", 1);
        Macro::parse_define(&name, &toks[1..], &ctx).unwrap()
    }

    #[test]
    fn object_like_trims_body() {
        let m = define("X   42  ");
        assert_eq!(m.value.len(), 1);
        assert_eq!(m.value[0].value, "42");
        assert!(!m.is_function_like());
    }

    #[test]
    fn stringify_patch_recorded_and_hash_removed() {
        let m = define("STR(x) #x");
        assert_eq!(m.str_patch.len(), 1);
        // `#` must have been removed from the replacement list.
        assert!(m.value.iter().all(|t| !t.is_punct("#")));
    }

    #[test]
    fn concat_patch_recorded_and_hashhash_removed() {
        let m = define("CAT(a,b) a##b");
        assert_eq!(m.patch.len(), 2);
        assert!(m.value.iter().all(|t| !t.is_punct("##")));
    }

    #[test]
    fn literal_paste_collapses_at_definition_time() {
        let m = define("X() foo##bar");
        assert_eq!(m.value.len(), 1);
        assert_eq!(m.value[0].value, "foobar");
    }

    #[test]
    fn variadic_comma_patch_detected() {
        let m = define("LOG(fmt, ...) printf(fmt, ##__VA_ARGS__)");
        assert!(!m.var_comma_patch.is_empty());
    }

    #[test]
    fn named_variadic_parameter() {
        let m = define("LOG(fmt, args...) printf(fmt, args)");
        assert_eq!(m.vararg.as_deref(), Some("args"));
    }

    #[test]
    fn variadic_followed_by_param_is_error() {
        let toks = tokenize("BAD(...,x) x", &src());
        let ctx = SourceContext::new("t.c", 1);
        assert!(Macro::parse_define("BAD", &toks[1..], &ctx).is_err());
    }
}
