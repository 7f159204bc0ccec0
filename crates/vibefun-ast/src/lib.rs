//! AST definitions for the Vibefun front-end.
//!
//! Two trees: the sugar-rich [`surface`] AST handed over by the parser, and
//! the minimal [`core`] AST produced by the desugarer and consumed by the
//! type checker. Every node in both trees carries a
//! [`vibefun_common::Location`]; desugaring reuses surface locations so
//! diagnostics always point at user-written syntax.

pub mod core;
pub mod surface;
