//! Line-aware output formatting (spec §4.11).
//!
//! Pulls a flat token stream and reconstructs text: blank-run accumulation
//! with a six-blank-line threshold, synthetic `# N "source"` markers on
//! source changes, and right-to-left whitespace collapsing that preserves
//! leading indentation.

use std::io::{self, Write};

use crate::token::Token;

const BLANK_RUN_THRESHOLD: usize = 6;

/// Output destination, modeled on the teacher's `OutputSink` abstraction:
/// callers can target a `Vec<u8>`, a file, or stdout uniformly.
pub trait OutputSink {
    fn write_str(&mut self, s: &str) -> io::Result<()>;
}

impl<W: Write> OutputSink for W {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.write_all(s.as_bytes())
    }
}

/// Drives spec §4.11 to completion over the full token stream.
pub fn write_tokens(tokens: &[Token], sink: &mut dyn OutputSink) -> io::Result<()> {
    let mut line: Vec<Token> = Vec::new();
    let mut blank_lines: Vec<String> = Vec::new();
    let mut blank_count = 0usize;
    let mut last_source: Option<String> = None;
    let mut next_lineno = 1usize;

    let flush_line = |line: &mut Vec<Token>,
                           blank_lines: &mut Vec<String>,
                           blank_count: &mut usize,
                           last_source: &mut Option<String>,
                           next_lineno: &mut usize,
                           sink: &mut dyn OutputSink|
     -> io::Result<()> {
        if line.is_empty() {
            return Ok(());
        }
        let is_blank = line.iter().all(|t| t.is_whitespace());
        if is_blank {
            let text: String = line.iter().map(|t| t.value.as_str()).collect();
            *blank_count += text.matches('\n').count();
            blank_lines.push(text);
            line.clear();
            return Ok(());
        }

        let source = line.first().map(|t| t.source.to_string());
        let source_changed = last_source.is_some() && source != *last_source;
        if *blank_count > BLANK_RUN_THRESHOLD || source_changed {
            let lineno = line.first().map(|t| t.line).unwrap_or(*next_lineno);
            let marker_line = lineno.saturating_sub(1);
            match &source {
                Some(src) => sink.write_str(&format!("# {marker_line} \"{src}\"\n"))?,
                None => sink.write_str(&format!("# {marker_line}\n"))?,
            }
            blank_lines.clear();
        } else {
            for b in blank_lines.iter() {
                sink.write_str(b)?;
            }
            blank_lines.clear();
        }
        *blank_count = 0;
        *last_source = source;

        let rendered = collapse_whitespace(line);
        sink.write_str(&rendered)?;
        if let Some(t) = line.last() {
            *next_lineno = t.line + 1;
        }
        line.clear();
        Ok(())
    };

    for tok in tokens {
        let ends_line = tok.is_newline_bearing();
        line.push(tok.clone());
        if ends_line {
            flush_line(&mut line, &mut blank_lines, &mut blank_count, &mut last_source, &mut next_lineno, sink)?;
        }
    }
    flush_line(&mut line, &mut blank_lines, &mut blank_count, &mut last_source, &mut next_lineno, sink)?;
    // Trailing buffered blank lines at end of stream are discarded (spec §4.11 step 5).
    Ok(())
}

/// Collapses consecutive space/tab tokens to a single space, scanning
/// right to left, except the leftmost (indentation) run which is kept as-is.
fn collapse_whitespace(line: &[Token]) -> String {
    let first_non_ws = line.iter().position(|t| !t.is_whitespace());
    let indent_end = first_non_ws.unwrap_or(line.len());

    let mut out = String::new();
    let mut i = 0;
    while i < line.len() {
        if i < indent_end {
            out.push_str(&line[i].value);
            i += 1;
            continue;
        }
        if line[i].is_whitespace() && !line[i].value.contains('\n') {
            out.push(' ');
            while i < line.len() && line[i].is_whitespace() && !line[i].value.contains('\n') {
                i += 1;
            }
            continue;
        }
        out.push_str(&line[i].value);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use std::rc::Rc;

    fn render(text: &str) -> String {
        let toks = tokenize(text, &Rc::from("t.c"));
        let mut buf: Vec<u8> = Vec::new();
        write_tokens(&toks, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn collapses_internal_whitespace_preserving_indent() {
        assert_eq!(render("    a    b\n"), "    a b\n");
    }

    #[test]
    fn long_blank_run_emits_synthetic_marker() {
        let mut toks = tokenize("a\n", &Rc::from("t.c"));
        for _ in 0..8 {
            toks.extend(tokenize("\n", &Rc::from("t.c")));
        }
        toks.extend(tokenize("b\n", &Rc::from("t.c")));
        let mut buf: Vec<u8> = Vec::new();
        write_tokens(&toks, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("# "));
        assert!(out.contains("b\n"));
    }

    #[test]
    fn short_blank_run_passes_through_verbatim() {
        let mut toks = tokenize("a\n", &Rc::from("t.c"));
        toks.extend(tokenize("\n\n", &Rc::from("t.c")));
        toks.extend(tokenize("b\n", &Rc::from("t.c")));
        let mut buf: Vec<u8> = Vec::new();
        write_tokens(&toks, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(!out.contains('#'));
        assert_eq!(out, "a\n\n\nb\n");
    }

    #[test]
    fn trailing_blank_lines_are_discarded() {
        let mut toks = tokenize("a\n", &Rc::from("t.c"));
        toks.extend(tokenize("\n\n\n", &Rc::from("t.c")));
        let mut buf: Vec<u8> = Vec::new();
        write_tokens(&toks, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "a\n");
    }
}
