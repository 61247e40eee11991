//! Unbound SQL statement trees.
//!
//! This module defines the statement AST handed to the executor. Names are
//! still textual here; [`crate::executor::bind_select`] resolves them
//! against a database.

mod ast;

pub use ast::*;
