//! Unified diagnostic model for the preprocessor.
//!
//! All engine-level failures are reported through [`PpError`], a
//! `miette`+`thiserror` diagnostic. Diagnostics are never fatal to the
//! engine: callers collect them (see [`crate::engine::Preprocessor::diagnostics`])
//! and the CLI renders them as `"<source>:<line> <message>"` per the
//! propagation policy, then continues past the offending directive or
//! invocation. The engine exposes a monotonically increasing `return_code`
//! equal to the number of diagnostics emitted.

use miette::Diagnostic;
use thiserror::Error;

/// Where a diagnostic occurred: a source name and a 1-based line number.
#[derive(Debug, Clone, Default)]
pub struct SourceContext {
    pub source: String,
    pub line: usize,
}

impl SourceContext {
    pub fn new(source: impl Into<String>, line: usize) -> Self {
        Self { source: source.into(), line }
    }
}

impl std::fmt::Display for SourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// The unified error/diagnostic type for every preprocessing stage.
#[derive(Debug, Error, Diagnostic)]
pub enum PpError {
    #[error("{ctx} {message}")]
    #[diagnostic(code(cpp99::syntax))]
    Syntax { ctx: SourceContext, message: String },

    #[error("{ctx} {message}")]
    #[diagnostic(code(cpp99::arity))]
    Arity { ctx: SourceContext, message: String },

    #[error("{ctx} {message}")]
    #[diagnostic(code(cpp99::semantic))]
    Semantic { ctx: SourceContext, message: String },

    #[error("{ctx} {message}")]
    #[diagnostic(code(cpp99::io))]
    Io { ctx: SourceContext, message: String },

    #[error("{ctx} {message}")]
    #[diagnostic(code(cpp99::lexer_probe))]
    LexerProbe { ctx: SourceContext, message: String },

    #[error("{ctx} {message}")]
    #[diagnostic(code(cpp99::directive), severity(warning))]
    Warning { ctx: SourceContext, message: String },
}

impl PpError {
    pub fn syntax(ctx: SourceContext, message: impl Into<String>) -> Self {
        PpError::Syntax { ctx, message: message.into() }
    }
    pub fn arity(ctx: SourceContext, message: impl Into<String>) -> Self {
        PpError::Arity { ctx, message: message.into() }
    }
    pub fn semantic(ctx: SourceContext, message: impl Into<String>) -> Self {
        PpError::Semantic { ctx, message: message.into() }
    }
    pub fn io(ctx: SourceContext, message: impl Into<String>) -> Self {
        PpError::Io { ctx, message: message.into() }
    }
    pub fn lexer_probe(ctx: SourceContext, message: impl Into<String>) -> Self {
        PpError::LexerProbe { ctx, message: message.into() }
    }
    pub fn warning(ctx: SourceContext, message: impl Into<String>) -> Self {
        PpError::Warning { ctx, message: message.into() }
    }

    /// Whether this is purely informational (spec's `#warning`, not `#error`).
    pub fn is_warning(&self) -> bool {
        matches!(self, PpError::Warning { .. })
    }
}
