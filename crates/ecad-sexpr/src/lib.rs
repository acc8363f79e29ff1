//! A streaming S-expression tokenizer.
//!
//! Unlike a tree-building reader, this crate hands out one token at a time —
//! `(`, `)`, symbols, quoted strings, numbers, end-of-file — with one token
//! of history, which is exactly the interface the order-permissive schematic
//! productions consume. Atom spelling is preserved so the caller decides how
//! to interpret a token (`1.27` can be a number or a pin number).
//!
//! Number parsing is locale-independent: `.` is always the decimal separator
//! regardless of the process locale.

mod error;
mod lexer;
mod token;

pub use error::{SexprError, SexprErrorKind};
pub use lexer::Tokenizer;
pub use token::{Token, TokenKind};
