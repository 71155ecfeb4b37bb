//! miniC compiler pipeline: source text in, NASM x86-64 text out.

pub mod ast;
pub mod backend;
pub mod common;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod semantics;
