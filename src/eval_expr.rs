//! Constant-expression evaluation for `#if`/`#elif` (spec §4.7).
//!
//! Order of operations: resolve `defined` first (its operand is never
//! macro-expanded), then run the normal expander, then parse with a
//! recursive-descent parser over C's operator precedence. Spec §9's design
//! note prefers this over a textual rewrite handed to a host expression
//! evaluator, so there is no intermediate string form here at all.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{PpError, SourceContext};
use crate::expander::{expand_macros, ExpandState};
use crate::macro_table::MacroTable;
use crate::token::{Token, TokenKind};

static INT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(0x[0-9a-f]+|0[0-7]*|[1-9][0-9]*)(u|l|ul|lu|ull|llu|ll)?$").unwrap());

/// Evaluates a `#if`/`#elif` controlling expression. Never fails hard:
/// division/modulo by zero and malformed expressions surface as a
/// diagnostic plus a value of `0` (spec §4.7 step 6).
pub fn eval_constant_expr(
    tokens: &[Token],
    table: &MacroTable,
    ctx: &SourceContext,
    diags: &mut Vec<PpError>,
) -> bool {
    let resolved = resolve_defined(tokens, table);
    let mut state = ExpandState::default();
    let expanded = expand_macros(resolved, table, &mut state, diags);
    let significant: Vec<Token> = expanded.into_iter().filter(|t| !t.is_whitespace()).collect();
    let mut parser = Parser { tokens: &significant, pos: 0, ctx, diags };
    match parser.parse_expr() {
        Some(v) => v != 0,
        None => {
            diags.push(PpError::semantic(ctx.clone(), "#if with no expression"));
            false
        }
    }
}

/// Rewrites every `defined X` / `defined ( X )` span into a single integer
/// token (`1` or `0`), before any macro expansion touches the operand.
fn resolve_defined(tokens: &[Token], table: &MacroTable) -> Vec<Token> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_identifier("defined") {
            let mut j = i + 1;
            while tokens.get(j).is_some_and(|t| t.is_whitespace()) {
                j += 1;
            }
            let parenthesized = tokens.get(j).is_some_and(|t| t.is_punct("("));
            if parenthesized {
                j += 1;
                while tokens.get(j).is_some_and(|t| t.is_whitespace()) {
                    j += 1;
                }
            }
            if let Some(ident) = tokens.get(j).filter(|t| t.kind == TokenKind::Identifier) {
                let defined = table.contains(&ident.value);
                let mut end = j + 1;
                if parenthesized {
                    while tokens.get(end).is_some_and(|t| t.is_whitespace()) {
                        end += 1;
                    }
                    if tokens.get(end).is_some_and(|t| t.is_punct(")")) {
                        end += 1;
                    }
                }
                let line = tokens[i].line;
                let source = Rc::clone(&tokens[i].source);
                out.push(Token::new(TokenKind::Integer, if defined { "1" } else { "0" }, line, source));
                i = end;
                continue;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ctx: &'a SourceContext,
    diags: &'a mut Vec<PpError>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_punct(&mut self, spelling: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(spelling)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> Option<i64> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Option<i64> {
        let cond = self.parse_binary(0)?;
        if self.eat_punct("?") {
            let then_val = self.parse_expr()?;
            if !self.eat_punct(":") {
                self.diags.push(PpError::syntax(self.ctx.clone(), "expected ':' in conditional expression"));
                return Some(0);
            }
            let else_val = self.parse_conditional()?;
            Some(if cond != 0 { then_val } else { else_val })
        } else {
            Some(cond)
        }
    }

    /// Precedence-climbing binary parse; `min_prec` is the lowest level
    /// this call is allowed to consume (0 = `||`, ..., 7 = `* / %`).
    fn parse_binary(&mut self, min_prec: u8) -> Option<i64> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec, right_assoc)) = self.peek_binop() {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.parse_binary(next_min)?;
            lhs = apply_binop(op, lhs, rhs, self.ctx, self.diags);
        }
        Some(lhs)
    }

    fn peek_binop(&self) -> Option<(&'static str, u8, bool)> {
        let t = self.peek()?;
        if t.kind != TokenKind::Punct {
            return None;
        }
        let entry = match t.value.as_str() {
            "||" => ("||", 0, false),
            "&&" => ("&&", 1, false),
            "|" => ("|", 2, false),
            "^" => ("^", 3, false),
            "&" => ("&", 4, false),
            "==" => ("==", 5, false),
            "!=" => ("!=", 5, false),
            "<" => ("<", 6, false),
            "<=" => ("<=", 6, false),
            ">" => (">", 6, false),
            ">=" => (">=", 6, false),
            "<<" => ("<<", 7, false),
            ">>" => (">>", 7, false),
            "+" => ("+", 8, false),
            "-" => ("-", 8, false),
            "*" => ("*", 9, false),
            "/" => ("/", 9, false),
            "%" => ("%", 9, false),
            _ => return None,
        };
        Some(entry)
    }

    fn parse_unary(&mut self) -> Option<i64> {
        if let Some(t) = self.peek() {
            if t.kind == TokenKind::Punct {
                match t.value.as_str() {
                    "!" => {
                        self.pos += 1;
                        return Some(if self.parse_unary()? == 0 { 1 } else { 0 });
                    }
                    "~" => {
                        self.pos += 1;
                        return Some(!self.parse_unary()?);
                    }
                    "-" => {
                        self.pos += 1;
                        return Some(self.parse_unary()?.wrapping_neg());
                    }
                    "+" => {
                        self.pos += 1;
                        return self.parse_unary();
                    }
                    _ => {}
                }
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<i64> {
        let t = self.bump()?.clone();
        match t.kind {
            TokenKind::Integer => Some(parse_int_literal(&t.value)),
            TokenKind::Char => Some(parse_char_literal(&t.value)),
            TokenKind::Identifier => Some(0), // undefined identifiers evaluate to 0 (step 3)
            TokenKind::Punct if t.value == "(" => {
                let v = self.parse_expr()?;
                if !self.eat_punct(")") {
                    self.diags.push(PpError::syntax(self.ctx.clone(), "expected ')' in constant expression"));
                }
                Some(v)
            }
            _ => {
                self.diags.push(PpError::syntax(self.ctx.clone(), format!("unexpected token '{}' in constant expression", t.value)));
                Some(0)
            }
        }
    }
}

fn apply_binop(op: &str, a: i64, b: i64, ctx: &SourceContext, diags: &mut Vec<PpError>) -> i64 {
    match op {
        "||" => i64::from(a != 0 || b != 0),
        "&&" => i64::from(a != 0 && b != 0),
        "|" => a | b,
        "^" => a ^ b,
        "&" => a & b,
        "==" => i64::from(a == b),
        "!=" => i64::from(a != b),
        "<" => i64::from(a < b),
        "<=" => i64::from(a <= b),
        ">" => i64::from(a > b),
        ">=" => i64::from(a >= b),
        "<<" => a.wrapping_shl(b as u32),
        ">>" => a.wrapping_shr(b as u32),
        "+" => a.wrapping_add(b),
        "-" => a.wrapping_sub(b),
        "*" => a.wrapping_mul(b),
        "/" => {
            if b == 0 {
                diags.push(PpError::semantic(ctx.clone(), "division by zero in constant expression"));
                0
            } else {
                a.wrapping_div(b)
            }
        }
        "%" => {
            if b == 0 {
                diags.push(PpError::semantic(ctx.clone(), "modulo by zero in constant expression"));
                0
            } else {
                a.wrapping_rem(b)
            }
        }
        _ => unreachable!(),
    }
}

/// Strips trailing `u`/`l`/`ul`/`ll` (any case/combination) then parses as
/// hex (`0x`), octal (leading `0`), or decimal (spec §4.7 step 4).
fn parse_int_literal(spelling: &str) -> i64 {
    let Some(caps) = INT_SUFFIX.captures(spelling) else { return 0 };
    let digits = &caps[1];
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).unwrap_or(0)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).unwrap_or(0)
    } else {
        digits.parse().unwrap_or(0)
    }
}

fn parse_char_literal(spelling: &str) -> i64 {
    let inner = spelling.trim_matches('\'');
    let mut chars = inner.chars();
    match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => 10,
            Some('t') => 9,
            Some('0') => 0,
            Some('r') => 13,
            Some(c) => c as i64,
            None => 0,
        },
        Some(c) => c as i64,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn eval(expr: &str, defines: &[&str]) -> bool {
        let mut table = MacroTable::new();
        let source: Rc<str> = Rc::from("t.c");
        for d in defines {
            table.set_object_like(d, "1", &source);
        }
        let ctx = SourceContext::new("t.c", 1);
        let toks = tokenize(expr, &source);
        let mut diags = Vec::new();
        eval_constant_expr(&toks, &table, &ctx, &mut diags)
    }

    #[test]
    fn basic_arithmetic_and_precedence() {
        assert!(eval("1 + 2 * 3 == 7", &[]));
        assert!(eval("(1 + 2) * 3 == 9", &[]));
    }

    #[test]
    fn defined_operator_with_and_without_parens() {
        assert!(eval("defined(FOO)", &["FOO"]));
        assert!(eval("defined FOO", &["FOO"]));
        assert!(!eval("defined(BAR)", &["FOO"]));
    }

    #[test]
    fn undefined_identifier_is_zero() {
        assert!(!eval("UNDEFINED_THING", &[]));
        assert!(eval("UNDEFINED_THING == 0", &[]));
    }

    #[test]
    fn ternary_and_logical_ops() {
        assert!(eval("1 ? 1 : 0", &[]));
        assert!(eval("0 || 1 && 1", &[]));
    }

    #[test]
    fn hex_and_suffixed_literals() {
        assert!(eval("0x10 == 16", &[]));
        assert!(eval("10UL == 10", &[]));
    }

    #[test]
    fn division_by_zero_is_false_not_a_panic() {
        assert!(!eval("1 / 0", &[]));
    }
}
