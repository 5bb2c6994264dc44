//! Query language front end.
//!
//! Queries combine dependency path patterns with set operators and
//! function calls, e.g. `deps(github.com/foo/...) - rdeps(golang.org/x/net, 2)`.
//! This module turns query text into an [`Expr`] tree; evaluation against a
//! graph lives in [`crate::depgraph`].
//!
//! Operators, from tightest to loosest binding:
//!
//! | Operator            | Meaning              |
//! |---------------------|----------------------|
//! | `delta`             | symmetric difference |
//! | `inter`             | intersection         |
//! | `+`, `union`        | union                |
//! | `-`, `minus`        | subtraction          |

mod ast;
mod parser;
mod token;
mod tokenizer;

pub use ast::{BinaryOp, Expr, ExprKind};
pub use parser::{parse, ParseError};
pub use token::{Span, Token, TokenKind};
pub use tokenizer::{tokenize, TokenizeError, Tokenizer};
