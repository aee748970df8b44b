//! Token-sequence utilities (spec §4.3): whitespace trimming and macro-call
//! argument collection.

use crate::errors::{PpError, SourceContext};
use crate::token::Token;

/// Trims leading and trailing whitespace tokens from `tokens` in place.
pub fn trim_whitespace(tokens: &mut Vec<Token>) {
    while tokens.first().is_some_and(|t| t.is_whitespace()) {
        tokens.remove(0);
    }
    while tokens.last().is_some_and(|t| t.is_whitespace()) {
        tokens.pop();
    }
}

pub fn trimmed(mut tokens: Vec<Token>) -> Vec<Token> {
    trim_whitespace(&mut tokens);
    tokens
}

/// Result of collecting a parenthesized, comma-separated argument list
/// starting at `tokens[start]`, which must be `(`.
pub struct CollectedArgs {
    /// Number of tokens consumed, including the closing `)`.
    pub consumed: usize,
    pub args: Vec<Vec<Token>>,
    /// Start offset (relative to `start`) of each argument's first token.
    pub arg_starts: Vec<usize>,
}

/// Collects macro-call arguments (spec §4.3). Nested parens raise/lower a
/// depth counter and suppress comma-splitting while `depth > 1`. A single
/// empty argument list is represented as `[[]]`. On error, returns `Ok` with
/// a zero-consumed sentinel when `ignore_errors` is set, otherwise `Err`.
pub fn collect_arguments(
    tokens: &[Token],
    start: usize,
    ignore_errors: bool,
    ctx: &SourceContext,
) -> Result<CollectedArgs, PpError> {
    let sentinel = || CollectedArgs { consumed: 0, args: Vec::new(), arg_starts: Vec::new() };

    if tokens.get(start).is_none_or(|t| !t.is_punct("(")) {
        return if ignore_errors {
            Ok(sentinel())
        } else {
            Err(PpError::syntax(ctx.clone(), "expected '(' to begin macro argument list"))
        };
    }

    let mut depth = 1usize;
    let mut i = start + 1;
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut arg_starts: Vec<usize> = vec![start + 1];

    loop {
        let Some(tok) = tokens.get(i) else {
            return if ignore_errors {
                Ok(sentinel())
            } else {
                Err(PpError::syntax(ctx.clone(), "unterminated macro argument list"))
            };
        };
        if tok.is_punct("(") {
            depth += 1;
            args.last_mut().unwrap().push(tok.clone());
        } else if tok.is_punct(")") {
            depth -= 1;
            if depth == 0 {
                i += 1;
                break;
            }
            args.last_mut().unwrap().push(tok.clone());
        } else if tok.is_punct(",") && depth == 1 {
            arg_starts.push(i + 1);
            args.push(Vec::new());
        } else {
            args.last_mut().unwrap().push(tok.clone());
        }
        i += 1;
    }

    for arg in &mut args {
        trim_whitespace(arg);
    }

    Ok(CollectedArgs { consumed: i - start, args, arg_starts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use std::rc::Rc;

    fn toks(s: &str) -> Vec<Token> {
        tokenize(s, &Rc::from("t.c"))
    }

    fn ctx() -> SourceContext {
        SourceContext::new("t.c", 1)
    }

    #[test]
    fn trims_both_ends() {
        let mut t = toks("  a  ");
        trim_whitespace(&mut t);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].value, "a");
    }

    #[test]
    fn collects_simple_args() {
        let t = toks("(a, b, c)");
        let res = collect_arguments(&t, 0, false, &ctx()).unwrap();
        assert_eq!(res.args.len(), 3);
        assert_eq!(res.args[1][0].value, "b");
        assert_eq!(res.consumed, t.len());
    }

    #[test]
    fn nested_parens_suppress_comma_split() {
        let t = toks("(a, f(b, c), d)");
        let res = collect_arguments(&t, 0, false, &ctx()).unwrap();
        assert_eq!(res.args.len(), 3);
        assert_eq!(res.args[1].len(), 7); // f ( b , <space> c )
    }

    #[test]
    fn single_empty_argument() {
        let t = toks("()");
        let res = collect_arguments(&t, 0, false, &ctx()).unwrap();
        assert_eq!(res.args.len(), 1);
        assert!(res.args[0].is_empty());
    }

    #[test]
    fn missing_paren_errors() {
        let t = toks("a, b)");
        assert!(collect_arguments(&t, 0, false, &ctx()).is_err());
    }

    #[test]
    fn missing_paren_ignored_returns_sentinel() {
        let t = toks("a, b)");
        let res = collect_arguments(&t, 0, true, &ctx()).unwrap();
        assert_eq!(res.consumed, 0);
    }
}
