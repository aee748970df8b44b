//! Recursive macro expansion (spec §4.5 "Macro argument substitution" and
//! §4.6 "Expander").
//!
//! Self-recursion avoidance follows spec §9's design note: rather than a
//! single mutable global, each token carries a `hide_set` (its
//! `expanded_from`, spec §3) that is checked and extended as tokens are
//! produced. A transient `expanding` set is additionally threaded through
//! the recursive calls of one top-level expansion so a macro can't re-enter
//! itself before its own replacement tokens have been stamped.

use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::{PpError, SourceContext};
use crate::lexer::classify_spelling;
use crate::macro_table::{Macro, MacroTable, PatchKind};
use crate::token::{Token, TokenKind};
use crate::token_utils::{collect_arguments, trim_whitespace};

/// Per-expansion counter state: `__COUNTER__` increments on every use.
#[derive(Default)]
pub struct ExpandState {
    pub counter: u64,
}

pub fn expand_macros(
    tokens: Vec<Token>,
    table: &MacroTable,
    state: &mut ExpandState,
    diags: &mut Vec<PpError>,
) -> Vec<Token> {
    expand_tokens(tokens, table, &im::HashSet::new(), state, diags)
}

fn expand_tokens(
    mut tokens: Vec<Token>,
    table: &MacroTable,
    expanding: &im::HashSet<Rc<str>>,
    state: &mut ExpandState,
    diags: &mut Vec<PpError>,
) -> Vec<Token> {
    let mut i = 0;
    while i < tokens.len() {
        let t = tokens[i].clone();
        if t.kind != TokenKind::Identifier {
            i += 1;
            continue;
        }
        if t.value == "__LINE__" {
            tokens[i] = Token::new(TokenKind::Integer, t.line.to_string(), t.line, Rc::clone(&t.source));
            i += 1;
            continue;
        }
        if t.value == "__COUNTER__" {
            let val = state.counter;
            state.counter += 1;
            tokens[i] = Token::new(TokenKind::Integer, val.to_string(), t.line, Rc::clone(&t.source));
            i += 1;
            continue;
        }

        let Some(m) = table.get(&t.value) else {
            i += 1;
            continue;
        };
        if t.in_hide_set(&m.name) || expanding.contains(m.name.as_str()) {
            i += 1;
            continue;
        }

        if !m.is_function_like() {
            let name: Rc<str> = Rc::from(m.name.as_str());
            let new_expanding = expanding.update(Rc::clone(&name));
            let mut replacement = m.value.clone();
            paste_remaining(&mut replacement);
            let mut expanded = expand_tokens(replacement, table, &new_expanding, state, diags);
            stamp(&mut expanded, t.line, &name);
            tokens.splice(i..i + 1, expanded);
            continue;
        }

        let mut j = i + 1;
        while tokens.get(j).is_some_and(|tk| tk.is_whitespace()) {
            j += 1;
        }
        if !tokens.get(j).is_some_and(|tk| tk.is_punct("(")) {
            // No invocation present at this occurrence; leave identifier in place.
            i = j;
            continue;
        }

        let ctx = SourceContext::new(t.source.to_string(), t.line);
        let collected = match collect_arguments(&tokens, j, false, &ctx) {
            Ok(c) => c,
            Err(e) => {
                diags.push(e);
                i += 1;
                continue;
            }
        };

        let params = m.arglist.clone().unwrap_or_default();
        let mut args = collected.args.clone();

        if m.variadic {
            let min = params.len();
            if args.len() < min {
                diags.push(PpError::arity(
                    ctx,
                    format!("macro \"{}\" needs at least {} arguments, but only {} given", m.name, min, args.len()),
                ));
                i += 1;
                continue;
            }
            if args.len() == min {
                args.push(Vec::new());
            } else if args.len() > min + 1 {
                let tail_start = collected.arg_starts[min];
                let close_paren = j + collected.consumed - 1;
                let mut tail: Vec<Token> = tokens[tail_start..close_paren].to_vec();
                trim_whitespace(&mut tail);
                args.truncate(min);
                args.push(tail);
            }
        } else if args.len() != params.len() {
            if params.is_empty() && args.len() == 1 && args[0].is_empty() {
                args.clear();
            } else {
                diags.push(PpError::arity(
                    ctx,
                    format!("macro \"{}\" requires {} arguments, but {} given", m.name, params.len(), args.len()),
                ));
                i += 1;
                continue;
            }
        }

        let name: Rc<str> = Rc::from(m.name.as_str());
        let substituted = substitute(m, &args, table, expanding, state, diags);
        let new_expanding = expanding.update(Rc::clone(&name));
        let mut expanded = expand_tokens(substituted, table, &new_expanding, state, diags);
        stamp(&mut expanded, t.line, &name);

        let total = (j - i) + collected.consumed;
        tokens.splice(i..i + total, expanded);
    }
    tokens
}

fn stamp(tokens: &mut [Token], line: usize, name: &Rc<str>) {
    for tok in tokens {
        tok.line = line;
        tok.hide_set = tok.hide_set.update(Rc::clone(name));
    }
}

/// spec §4.5: substitute arguments into a macro's (already prescanned)
/// replacement list.
fn substitute(
    m: &Macro,
    args: &[Vec<Token>],
    table: &MacroTable,
    expanding: &im::HashSet<Rc<str>>,
    state: &mut ExpandState,
    diags: &mut Vec<PpError>,
) -> Vec<Token> {
    let mut result: Vec<Token> = m.value.clone();

    let mut str_memo: HashMap<usize, String> = HashMap::new();
    for &(arg_idx, pos) in &m.str_patch {
        let s = str_memo
            .entry(arg_idx)
            .or_insert_with(|| stringify_arg(args.get(arg_idx).map(|a| a.as_slice()).unwrap_or(&[])))
            .clone();
        result[pos].kind = TokenKind::Str;
        result[pos].value = s;
    }

    let mut deleted: std::collections::HashSet<usize> = Default::default();
    if m.variadic {
        let vararg_idx = m.arglist.as_ref().map(|a| a.len()).unwrap_or(0);
        if args.get(vararg_idx).is_some_and(|a| a.is_empty()) {
            deleted.extend(m.var_comma_patch.iter().copied());
        }
    }

    let mut patch_by_pos: HashMap<usize, (PatchKind, usize)> = HashMap::new();
    for p in &m.patch {
        patch_by_pos.insert(p.position, (p.kind, p.arg_index));
    }

    let mut expand_memo: HashMap<usize, Vec<Token>> = HashMap::new();
    let mut output = Vec::new();
    for (pos, tok) in result.drain(..).enumerate() {
        if deleted.contains(&pos) {
            continue;
        }
        if let Some(&(kind, arg_idx)) = patch_by_pos.get(&pos) {
            let empty = Vec::new();
            let arg = args.get(arg_idx).unwrap_or(&empty);
            match kind {
                PatchKind::Concat => output.extend(arg.iter().cloned()),
                PatchKind::Expand => {
                    let expanded = expand_memo
                        .entry(arg_idx)
                        .or_insert_with(|| expand_tokens(arg.clone(), table, expanding, state, diags));
                    output.extend(expanded.iter().cloned());
                }
            }
            continue;
        }
        output.push(tok);
    }

    paste_remaining(&mut output);
    output
}

/// Stringification (spec §4.5 step 2 / glossary): collapse internal
/// whitespace runs to a single space, escape `\` and `"`, wrap in quotes.
fn stringify_arg(tokens: &[Token]) -> String {
    let mut raw = String::new();
    for tok in tokens {
        if tok.is_whitespace() {
            if !raw.is_empty() && !raw.ends_with(' ') {
                raw.push(' ');
            }
        } else {
            raw.push_str(&tok.value);
        }
    }
    let escaped = raw.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Pastes any `##` tokens left over after patch substitution (spec §4.4's
/// "argument immediately after a parameter" case deliberately leaves the
/// `##` in place; literal-to-literal pastes with no parameter on either
/// side also end up here if they weren't collapsed at definition time).
/// Relexes the pasted spelling per spec §9's design note.
fn paste_remaining(tokens: &mut Vec<Token>) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_punct("##") && i > 0 && i + 1 < tokens.len() {
            let left = tokens[i - 1].clone();
            let right = tokens[i + 1].clone();
            let pasted_value = format!("{}{}", left.value, right.value);
            let kind = classify_spelling(&pasted_value);
            let mut pasted = left;
            pasted.kind = kind;
            pasted.value = pasted_value;
            tokens.splice(i - 1..=i + 1, std::iter::once(pasted));
            i = i.saturating_sub(1);
            continue;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::macro_table::MacroTable;

    fn src() -> Rc<str> {
        Rc::from("t.c")
    }

    fn run(table_src: &[&str], input: &str) -> String {
        let mut table = MacroTable::new();
        for def in table_src {
            let toks = tokenize(def, &src());
            let name = toks[0].value.clone();
            let ctx = SourceContext::new("t.c", 1);
            let m = Macro::parse_define(&name, &toks[1..], &ctx).unwrap();
            table.define(m);
        }
        let input_toks = tokenize(input, &src());
        let mut state = ExpandState::default();
        let mut diags = Vec::new();
        let out = expand_macros(input_toks, &table, &mut state, &mut diags);
        out.iter().map(|t| t.value.clone()).collect::<Vec<_>>().join("")
    }

    #[test]
    fn object_like_substitution() {
        assert_eq!(run(&["X 42"], "int v = X;\n").trim(), "int v = 42;");
    }

    #[test]
    fn self_reference_expands_once() {
        assert_eq!(run(&["X X+1"], "X\n").trim(), "X+1");
    }

    #[test]
    fn stringify_and_paste() {
        assert_eq!(run(&["STR(x) #x"], "STR(hello world)\n").trim(), "\"hello world\"");
        assert_eq!(run(&["CAT(a,b) a##b"], "CAT(foo,42)\n").trim(), "foo42");
    }

    #[test]
    fn variadic_comma_elision() {
        assert_eq!(
            run(&["LOG(fmt, ...) printf(fmt, ##__VA_ARGS__)"], "LOG(\"hi\");\n").trim(),
            "printf(\"hi\");"
        );
        assert_eq!(
            run(&["LOG(fmt, ...) printf(fmt, ##__VA_ARGS__)"], "LOG(\"x=%d\", 7);\n").trim(),
            "printf(\"x=%d\", 7);"
        );
    }

    #[test]
    fn function_like_without_call_is_left_alone() {
        assert_eq!(run(&["F(x) x+1"], "F;\n").trim(), "F;");
    }

    #[test]
    fn zero_arg_function_macro() {
        assert_eq!(run(&["F() 1+1"], "F()\n").trim(), "1+1");
    }

    #[test]
    fn literal_to_literal_paste_with_no_params() {
        assert_eq!(run(&["X foo##bar"], "X\n").trim(), "foobar");
    }
}
