//! Hindley-Milner type checking for the Vibefun front-end.
//!
//! Algorithm W with level-based generalization over the Core AST:
//! let-polymorphism under the value restriction, nominal variants,
//! closed-record unification, arity-resolved external overloads, and
//! matrix-based exhaustiveness checking for every `match`.

pub mod builtins;
pub mod env;
pub mod error;
pub mod exhaustiveness;
pub mod infer;
pub mod ty;
pub mod unify;

pub use error::TypeError;
pub use infer::Checker;
pub use ty::{Scheme, Type, TyVar};
pub use unify::InferCtx;
