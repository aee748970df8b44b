//! Top-level `Preprocessor` façade (spec §6 "Programmatic surface").
//!
//! Ties together the line grouper, macro table, expander, constant-
//! expression evaluator, directive interpreter and writer into the single
//! object a driver talks to. `parse` is eager rather than a lazy generator
//! (the teacher's engines mostly work this way too): it computes the full
//! output token stream up front, and `token()`/`write()` then pull from it.
//! This is an implementation choice, not an observable difference — see
//! DESIGN.md.

use std::collections::HashSet;
use std::rc::Rc;

use crate::directives::{parse_directive, DirectiveState};
use crate::errors::{PpError, SourceContext};
use crate::eval_expr::eval_constant_expr;
use crate::expander::{expand_macros, ExpandState};
use crate::include::IncludePaths;
use crate::lexer::{lex_logical_lines, tokenize};
use crate::macro_table::{Macro, MacroTable};
use crate::token::{Token, TokenKind};
use crate::token_utils::trimmed;
use crate::writer::{write_tokens, OutputSink};

pub struct Preprocessor {
    pub macros: MacroTable,
    pub include_paths: IncludePaths,
    pub diagnostics: Vec<PpError>,
    ignore_kinds: HashSet<TokenKind>,
    state: DirectiveState,
    expand_state: ExpandState,
    chunk: Vec<Token>,
    output: Vec<Token>,
    cursor: usize,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        let mut macros = MacroTable::new();
        let source: Rc<str> = Rc::from("<built-in>");
        let (date, time) = now_date_time_strings();
        macros.set_object_like("__DATE__", &format!("\"{date}\""), &source);
        macros.set_object_like("__TIME__", &format!("\"{time}\""), &source);
        macros.set_object_like("__STDC__", "1", &source);
        macros.set_object_like("__FILE__", "\"\"", &source);

        Self {
            macros,
            include_paths: IncludePaths::new(),
            diagnostics: Vec::new(),
            ignore_kinds: HashSet::new(),
            state: DirectiveState::new(),
            expand_state: ExpandState::default(),
            chunk: Vec::new(),
            output: Vec::new(),
            cursor: 0,
        }
    }

    pub fn add_path(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.include_paths.add_path(dir);
    }

    /// Accepts a raw `"NAME value"` definition (spec §6 `define(text_or_tokens)`).
    pub fn define(&mut self, text: &str) {
        let source: Rc<str> = Rc::from("<command-line>");
        let toks = tokenize(text, &source);
        let ctx = SourceContext::new("<command-line>", 0);
        self.handle_define(&toks, &ctx);
    }

    pub fn undef(&mut self, name: &str) {
        self.macros.undef(name);
    }

    /// Suppress a token kind from subsequent `token()` pulls.
    pub fn ignore(&mut self, kind: TokenKind) {
        self.ignore_kinds.insert(kind);
    }

    pub fn return_code(&self) -> usize {
        self.diagnostics.iter().filter(|d| !d.is_warning()).count()
    }

    /// Begins a new parse over `text` (spec §6 `parse`). Appends to any
    /// previously parsed output; call on a fresh `Preprocessor` for a clean run.
    pub fn parse(&mut self, text: &str, source: Option<&str>) {
        let name = source.unwrap_or("<input>").to_string();
        self.process_source(text, &name);
        self.flush_chunk();
        if self.state.unbalanced_at_eof() {
            self.diagnostics.push(PpError::syntax(SourceContext::new(name, 0), "unterminated conditional directive"));
        }
    }

    /// Pulls the next non-ignored token, or `None` at end of output.
    pub fn token(&mut self) -> Option<Token> {
        while self.cursor < self.output.len() {
            let t = self.output[self.cursor].clone();
            self.cursor += 1;
            if !self.ignore_kinds.contains(&t.kind) {
                return Some(t);
            }
        }
        None
    }

    /// Drives the writer (spec §4.11) to completion over the full output.
    pub fn write(&self, sink: &mut dyn OutputSink) -> std::io::Result<()> {
        write_tokens(&self.output, sink)
    }

    fn process_source(&mut self, text: &str, source_name: &str) {
        let substituted = crate::trigraph::substitute_trigraphs(text);
        let source: Rc<str> = Rc::from(source_name);
        let lines = lex_logical_lines(&substituted, source_name);

        let prev_file = self.macros.get("__FILE__").cloned();
        self.macros.set_object_like("__FILE__", &format!("\"{source_name}\""), &source);

        for line in lines {
            if parse_directive(&line).is_some() {
                self.dispatch_directive(&line, &source);
            } else if self.state.enable {
                self.chunk.extend(line);
            }
        }

        match prev_file {
            Some(m) => self.macros.define(m),
            None => self.macros.undef("__FILE__"),
        }
    }

    fn flush_chunk(&mut self) {
        if self.chunk.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut self.chunk);
        let expanded = expand_macros(chunk, &self.macros, &mut self.expand_state, &mut self.diagnostics);
        self.output.extend(expanded);
    }

    fn dispatch_directive(&mut self, line: &[Token], source: &Rc<str>) {
        let d = parse_directive(line).expect("caller already checked this is a directive line");
        let lineno = line.first().map(|t| t.line).unwrap_or(1);
        let ctx = SourceContext::new(source.to_string(), lineno);

        // spec §4.8: preserve vertical whitespace so output line numbers
        // stay aligned, regardless of whether the directive itself acts.
        for tok in line.iter().filter(|t| t.is_newline_bearing()) {
            self.chunk.push(tok.clone());
        }

        let args = trimmed(d.args.to_vec());
        let enable = self.state.enable;

        match d.name.as_str() {
            "define" if enable => {
                self.flush_chunk();
                self.handle_define(&args, &ctx);
            }
            "undef" if enable => {
                self.flush_chunk();
                if let Some(first) = args.first() {
                    self.macros.undef(&first.value);
                }
            }
            "include" if enable => {
                self.flush_chunk();
                self.handle_include(&args, &ctx);
            }
            "error" if enable => {
                self.diagnostics.push(PpError::semantic(ctx, render_directive_text(&args)));
            }
            "warning" if enable => {
                self.diagnostics.push(PpError::warning(ctx, render_directive_text(&args)));
            }
            "ifdef" => {
                let name = args.first().map(|t| t.value.as_str()).unwrap_or("");
                let condition = self.macros.contains(name);
                self.state.enter_ifdef(condition);
            }
            "ifndef" => {
                let name = args.first().map(|t| t.value.as_str()).unwrap_or("");
                let condition = !self.macros.contains(name);
                self.state.enter_ifdef(condition);
            }
            "if" => {
                let condition = if enable {
                    eval_constant_expr(&args, &self.macros, &ctx, &mut self.diagnostics)
                } else {
                    false
                };
                self.state.enter_if(condition);
            }
            "elif" => {
                let condition = if self.state.elif_needs_eval() {
                    eval_constant_expr(&args, &self.macros, &ctx, &mut self.diagnostics)
                } else {
                    false
                };
                if let Err(e) = self.state.elif(condition, &ctx) {
                    self.diagnostics.push(e);
                }
            }
            "else" => {
                if let Err(e) = self.state.elif(true, &ctx) {
                    self.diagnostics.push(e);
                }
            }
            "endif" => {
                if let Err(e) = self.state.endif(&ctx) {
                    self.diagnostics.push(e);
                }
            }
            _ => {}
        }
    }

    fn handle_define(&mut self, args: &[Token], ctx: &SourceContext) {
        let Some(name_tok) = args.first() else {
            self.diagnostics.push(PpError::syntax(ctx.clone(), "#define requires a macro name"));
            return;
        };
        if name_tok.kind != TokenKind::Identifier {
            self.diagnostics.push(PpError::syntax(ctx.clone(), "macro name must be an identifier"));
            return;
        }
        match Macro::parse_define(&name_tok.value, &args[1..], ctx) {
            Ok(m) => self.macros.define(m),
            Err(e) => self.diagnostics.push(e),
        }
    }

    fn handle_include(&mut self, args: &[Token], ctx: &SourceContext) {
        let Some((name, angle)) = self.resolve_include_spelling(args) else {
            self.diagnostics.push(PpError::syntax(ctx.clone(), "malformed #include directive"));
            return;
        };
        match self.include_paths.resolve(&name, angle) {
            Some((path, contents)) => {
                let dir = path.parent().map(std::path::Path::to_path_buf).unwrap_or_default();
                self.include_paths.temp_path.push(dir);
                let tag = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_else(|| name.clone());
                self.process_source(&contents, &tag);
                self.include_paths.temp_path.pop();
            }
            None => {
                self.diagnostics.push(PpError::io(ctx.clone(), format!("'{name}' file not found")));
            }
        }
    }

    /// spec §4.10: use the argument directly if it's already a string or
    /// begins with `<`; otherwise macro-expand and re-inspect.
    fn resolve_include_spelling(&mut self, args: &[Token]) -> Option<(String, bool)> {
        if let Some(spec) = spelling_from(args) {
            return Some(spec);
        }
        let mut state = ExpandState::default();
        let mut diags = Vec::new();
        let expanded = trimmed(expand_macros(args.to_vec(), &self.macros, &mut state, &mut diags));
        self.diagnostics.extend(diags);
        spelling_from(&expanded)
    }
}

fn spelling_from(tokens: &[Token]) -> Option<(String, bool)> {
    let first = tokens.first()?;
    if first.kind == TokenKind::Str {
        return Some((first.value.trim_matches('"').to_string(), false));
    }
    if first.is_punct("<") {
        let mut name = String::new();
        for tok in &tokens[1..] {
            if tok.is_punct(">") {
                return Some((name, true));
            }
            name.push_str(&tok.value);
        }
    }
    None
}

fn render_directive_text(args: &[Token]) -> String {
    args.iter().map(|t| t.value.as_str()).collect::<String>()
}

fn now_date_time_strings() -> (String, String) {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let days = secs.div_euclid(86400);
    let time_of_day = secs.rem_euclid(86400);
    let (y, m, d) = civil_from_days(days);
    const MONTHS: [&str; 12] =
        ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    let date = format!("{} {:2} {}", MONTHS[(m - 1) as usize], d, y);
    let (hh, mm, ss) = (time_of_day / 3600, (time_of_day % 3600) / 60, time_of_day % 60);
    let time = format!("{hh:02}:{mm:02}:{ss:02}");
    (date, time)
}

/// Howard Hinnant's `civil_from_days`: days-since-epoch to a proleptic
/// Gregorian `(year, month, day)`. UTC, not local time — no timezone
/// database dependency (see DESIGN.md).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = z.div_euclid(146097);
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> (String, Preprocessor) {
        let mut pp = Preprocessor::new();
        pp.parse(source, Some("t.c"));
        let mut buf: Vec<u8> = Vec::new();
        pp.write(&mut buf).unwrap();
        (String::from_utf8(buf).unwrap(), pp)
    }

    #[test]
    fn scenario_object_like_substitution() {
        let (out, _) = run("#define X 42\nint v = X;\n");
        assert!(out.contains("int v = 42;"));
    }

    #[test]
    fn scenario_self_reference_is_fixed() {
        let (out, _) = run("#define X X+1\nX\n");
        assert!(out.contains("X+1"));
    }

    #[test]
    fn scenario_stringify_and_paste() {
        let (out, _) = run("#define STR(x) #x\n#define CAT(a,b) a##b\nSTR(hello world)\nCAT(foo,42)\n");
        assert!(out.contains("\"hello world\""));
        assert!(out.contains("foo42"));
    }

    #[test]
    fn scenario_variadic_comma_elision() {
        let (out, _) = run("#define LOG(fmt, ...) printf(fmt, ##__VA_ARGS__)\nLOG(\"hi\");\nLOG(\"x=%d\", 7);\n");
        assert!(out.contains("printf(\"hi\")"));
        assert!(!out.contains("printf(\"hi\"),"));
        assert!(out.contains("printf(\"x=%d\", 7)"));
    }

    #[test]
    fn scenario_conditional_with_defined() {
        let (out, _) = run("#define A\n#if defined(A) && !defined(B)\nyes\n#else\nno\n#endif\n");
        assert!(out.contains("yes"));
        assert!(!out.contains("no"));
    }

    #[test]
    fn scenario_nested_include_with_line_markers() {
        let dir = std::env::temp_dir().join(format!("cpp99_engine_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.h"), "line1\nline2\n").unwrap();

        let mut pp = Preprocessor::new();
        pp.add_path(dir.clone());
        pp.parse("#include \"a.h\"\nend\n", Some("main.c"));
        let mut buf: Vec<u8> = Vec::new();
        pp.write(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("line1"));
        assert!(out.contains("line2"));
        assert!(out.contains("end"));
        assert!(out.contains("# ") && out.contains("\"main.c\""));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn disabled_branch_defines_do_not_take_effect() {
        let (_, pp) = run("#if 0\n#define X 1\n#endif\nY\n");
        assert!(!pp.macros.contains("X"));
    }

    #[test]
    fn unbalanced_if_reports_diagnostic() {
        let (_, pp) = run("#if 1\nx\n");
        assert!(pp.diagnostics.iter().any(|d| !d.is_warning()));
    }

    #[test]
    fn error_and_warning_directives_produce_diagnostics() {
        let (_, pp) = run("#error boom\n#warning heads up\n");
        assert_eq!(pp.diagnostics.iter().filter(|d| !d.is_warning()).count(), 1);
        assert_eq!(pp.diagnostics.iter().filter(|d| d.is_warning()).count(), 1);
    }

    #[test]
    fn counter_and_stdc_builtins() {
        let (out, _) = run("__COUNTER__ __COUNTER__ __STDC__\n");
        assert!(out.contains("0 1 1"));
    }
}
