//! Conditional-compilation state machine (spec §4.8).
//!
//! This module owns only the `enable`/`iftrigger`/`ifstack` bookkeeping and
//! directive-line parsing; the engine (`src/engine.rs`) drives it, since
//! dispatching `include`/`define` needs the macro table, include paths and
//! recursive parsing that live there.

use crate::errors::{PpError, SourceContext};
use crate::token::Token;

/// One pushed frame per open `#if`/`#ifdef`/`#ifndef` (spec §3 "Conditional stack").
#[derive(Debug, Clone, Copy)]
pub struct ConditionalFrame {
    pub outer_enable: bool,
    pub outer_triggered: bool,
}

#[derive(Debug, Default)]
pub struct DirectiveState {
    pub enable: bool,
    pub iftrigger: bool,
    pub ifstack: Vec<ConditionalFrame>,
}

impl DirectiveState {
    pub fn new() -> Self {
        Self { enable: true, iftrigger: true, ifstack: Vec::new() }
    }

    fn push(&mut self) {
        self.ifstack.push(ConditionalFrame { outer_enable: self.enable, outer_triggered: self.iftrigger });
    }

    /// `#ifdef`/`#ifndef`: `condition` is whether the tested name is (for
    /// `ifdef`) or isn't (for `ifndef`) in the macro table.
    pub fn enter_ifdef(&mut self, condition: bool) {
        let was_enabled = self.enable;
        self.push();
        if was_enabled {
            self.enable = condition;
            self.iftrigger = self.enable;
        }
    }

    /// `#if EXPR`: `condition` is the evaluated boolean result.
    pub fn enter_if(&mut self, condition: bool) {
        self.enter_ifdef(condition);
    }

    /// Whether `#elif`'s expression is actually worth evaluating: only
    /// when the enclosing frame was enabled, nothing in it has fired yet,
    /// and we're not currently in the branch that's about to be closed.
    pub fn elif_needs_eval(&self) -> bool {
        self.ifstack.last().is_some_and(|f| f.outer_enable) && !self.enable && !self.iftrigger
    }

    /// `#elif EXPR` / `#else` (the latter passes `condition = true`).
    pub fn elif(&mut self, condition: bool, ctx: &SourceContext) -> Result<(), PpError> {
        let Some(&top) = self.ifstack.last() else {
            return Err(PpError::syntax(ctx.clone(), "#elif with no matching #if"));
        };
        if !top.outer_enable {
            return Ok(());
        }
        if self.enable {
            self.enable = false;
        } else if !self.iftrigger && condition {
            self.enable = true;
            self.iftrigger = true;
        }
        Ok(())
    }

    pub fn endif(&mut self, ctx: &SourceContext) -> Result<(), PpError> {
        match self.ifstack.pop() {
            Some(frame) => {
                self.enable = frame.outer_enable;
                self.iftrigger = frame.outer_triggered;
                Ok(())
            }
            None => Err(PpError::syntax(ctx.clone(), "#endif with no matching #if")),
        }
    }

    pub fn unbalanced_at_eof(&self) -> bool {
        !self.ifstack.is_empty()
    }
}

/// A parsed directive line (spec §4.8): `name` is the first identifier
/// after `#`, `args` is the (untrimmed) remainder.
pub struct Directive<'a> {
    pub name: String,
    pub args: &'a [Token],
}

/// If `line`'s first non-whitespace token is `#`, parses it into a
/// [`Directive`]. Returns `None` for ordinary (non-directive) lines.
pub fn parse_directive(line: &[Token]) -> Option<Directive<'_>> {
    let mut i = 0;
    while line.get(i).is_some_and(|t| t.is_whitespace()) {
        i += 1;
    }
    if !line.get(i).is_some_and(|t| t.is_punct("#")) {
        return None;
    }
    i += 1;
    while line.get(i).is_some_and(|t| t.is_whitespace()) {
        i += 1;
    }
    let Some(name_tok) = line.get(i) else {
        // A bare `#` with nothing after it is the null directive; treat the
        // name as empty so it is silently ignored like any unknown name.
        return Some(Directive { name: String::new(), args: &[] });
    };
    let name = name_tok.value.clone();
    i += 1;
    Some(Directive { name, args: &line[i..] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use std::rc::Rc;

    fn ctx() -> SourceContext {
        SourceContext::new("t.c", 1)
    }

    fn line(s: &str) -> Vec<Token> {
        tokenize(s, &Rc::from("t.c"))
    }

    #[test]
    fn parses_directive_name_and_args() {
        let l = line("  #  define FOO 1\n");
        let d = parse_directive(&l).unwrap();
        assert_eq!(d.name, "define");
    }

    #[test]
    fn non_directive_line_is_none() {
        let l = line("int x;\n");
        assert!(parse_directive(&l).is_none());
    }

    #[test]
    fn if_else_endif_round_trip() {
        let mut st = DirectiveState::new();
        st.enter_if(false);
        assert!(!st.enable);
        st.elif(true, &ctx()).unwrap();
        assert!(st.enable);
        st.endif(&ctx()).unwrap();
        assert!(st.enable);
        assert!(!st.unbalanced_at_eof());
    }

    #[test]
    fn elif_after_trigger_does_not_reenable() {
        let mut st = DirectiveState::new();
        st.enter_if(true);
        st.elif(true, &ctx()).unwrap();
        assert!(!st.enable); // already triggered, so elif disables
    }

    #[test]
    fn misplaced_endif_errors() {
        let mut st = DirectiveState::new();
        assert!(st.endif(&ctx()).is_err());
    }

    #[test]
    fn unbalanced_if_detected_at_eof() {
        let mut st = DirectiveState::new();
        st.enter_if(true);
        assert!(st.unbalanced_at_eof());
    }
}
