//! A C99-conforming preprocessor: trigraph substitution, line splicing,
//! tokenization, macro definition and expansion, file inclusion, and
//! conditional compilation, driven through the [`engine::Preprocessor`]
//! façade and rendered by [`writer`].

pub mod cli;
pub mod directives;
pub mod engine;
pub mod errors;
pub mod eval_expr;
pub mod expander;
pub mod include;
pub mod lexer;
pub mod macro_table;
pub mod token;
pub mod token_utils;
pub mod trigraph;
pub mod writer;

pub use engine::Preprocessor;
pub use errors::PpError;
pub use token::{Token, TokenKind};
