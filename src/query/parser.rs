//! Operator-precedence parser for the query language.
//!
//! The parser is a shift/reduce machine over two stacks: an expression
//! stack holding parsed operands and a rule stack holding pending
//! reductions. An incoming operator first reduces every pending rule of
//! equal or tighter precedence. Groups and function calls sit on the rule
//! stack as barriers that operator and comma reductions never cross.

use tracing::{debug, trace};

use super::ast::{BinaryOp, Expr, ExprKind};
use super::token::{Span, Token, TokenKind};
use super::tokenizer::{tokenize, TokenizeError};

/// Errors raised while parsing a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error("empty expression at position {span}")]
    EmptyExpression { span: Span },

    #[error("empty function call at position {span}")]
    EmptyFuncCall { span: Span },

    #[error("empty parenthesis at position {span}")]
    EmptyParenthesis { span: Span },

    /// A boolean or integer where a set of nodes is required.
    #[error("invalid argument at position {span}")]
    InvalidArgument { span: Span },

    #[error("invalid function name at position {span}")]
    InvalidFuncName { span: Span },

    #[error("missing argument at position {span}")]
    MissingArgument { span: Span },

    #[error("missing operator at position {span}")]
    MissingOperator { span: Span },

    #[error("unexpected comma at position {span}")]
    UnexpectedComma { span: Span },

    #[error("unexpected operator at position {span}")]
    UnexpectedOperator { span: Span },

    #[error("unexpected parenthesis at position {span}")]
    UnexpectedParenthesis { span: Span },

    #[error("unclosed parenthesis at position {span}")]
    UnclosedParenthesis { span: Span },
}

impl ParseError {
    /// Position of the offending token or expression.
    pub fn span(&self) -> Span {
        match self {
            ParseError::Tokenize(e) => e.span(),
            ParseError::EmptyExpression { span }
            | ParseError::EmptyFuncCall { span }
            | ParseError::EmptyParenthesis { span }
            | ParseError::InvalidArgument { span }
            | ParseError::InvalidFuncName { span }
            | ParseError::MissingArgument { span }
            | ParseError::MissingOperator { span }
            | ParseError::UnexpectedComma { span }
            | ParseError::UnexpectedOperator { span }
            | ParseError::UnexpectedParenthesis { span }
            | ParseError::UnclosedParenthesis { span } => *span,
        }
    }
}

/// Parses a query string into an expression tree.
///
/// # Example
///
/// ```
/// use depscope::query::parse;
///
/// let expr = parse("deps(foo, 2) - bar").unwrap();
/// assert_eq!(expr.to_string(), "(deps([foo, 2]) - bar)");
/// ```
pub fn parse(query: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(query)?;
    debug!(query, tokens = tokens.len(), "parsing query");

    let mut parser = Parser::default();
    let mut idx = 0;
    while let Some(token) = tokens.get(idx) {
        match parser.shift(token)? {
            Step::Shifted => idx += 1,
            Step::Reduce => {
                parser.reduce(Some(token.span))?;
                idx += 1;
            }
            Step::ReduceAndRetry => parser.reduce(Some(token.span))?,
        }
        parser.check_balance(token.span)?;
    }
    parser.finish(query)
}

/// Pending reductions ordered by binding strength. Operators compare by
/// this order; the last three act as barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RuleKind {
    Delta,
    Intersect,
    Union,
    Subtract,
    ArgsList,
    Func,
    Group,
}

impl RuleKind {
    fn from_operator(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Delta => Some(RuleKind::Delta),
            TokenKind::Intersect => Some(RuleKind::Intersect),
            TokenKind::Union => Some(RuleKind::Union),
            TokenKind::Subtract => Some(RuleKind::Subtract),
            _ => None,
        }
    }

    fn binary_op(self) -> Option<BinaryOp> {
        match self {
            RuleKind::Delta => Some(BinaryOp::Delta),
            RuleKind::Intersect => Some(BinaryOp::Intersect),
            RuleKind::Union => Some(BinaryOp::Union),
            RuleKind::Subtract => Some(BinaryOp::Subtract),
            _ => None,
        }
    }

    fn is_scope(self) -> bool {
        matches!(self, RuleKind::Func | RuleKind::Group)
    }
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    kind: RuleKind,
    /// Expression stack length when the rule was pushed
    base: usize,
    /// Span of the token that opened the rule
    span: Span,
}

enum Step {
    Shifted,
    Reduce,
    ReduceAndRetry,
}

#[derive(Debug, Default)]
struct Parser {
    exprs: Vec<Expr>,
    rules: Vec<Rule>,
}

impl Parser {
    /// Whether an operand has been parsed since the innermost pending rule.
    fn operand_ready(&self) -> bool {
        match self.rules.last() {
            Some(rule) => self.exprs.len() > rule.base,
            None => !self.exprs.is_empty(),
        }
    }

    fn push_rule(&mut self, kind: RuleKind, span: Span) {
        self.rules.push(Rule {
            kind,
            base: self.exprs.len(),
            span,
        });
        trace!(rule = ?kind, depth = self.rules.len(), "pushed rule");
    }

    fn shift(&mut self, token: &Token) -> Result<Step, ParseError> {
        let span = token.span;
        match &token.kind {
            TokenKind::Boolean(v) => self.exprs.push(Expr::new(ExprKind::Bool(*v), span)),
            TokenKind::Integer(v) => self.exprs.push(Expr::new(ExprKind::Integer(*v), span)),
            TokenKind::String(v) => self.exprs.push(Expr::string(v.clone(), span)),
            TokenKind::Comma => {
                if !self.operand_ready() {
                    return Err(ParseError::UnexpectedComma { span });
                }
                if self
                    .rules
                    .last()
                    .is_some_and(|top| top.kind < RuleKind::ArgsList)
                {
                    return Ok(Step::ReduceAndRetry);
                }
                self.push_rule(RuleKind::ArgsList, span);
            }
            TokenKind::ParenLeft => {
                let kind = if self.operand_ready() {
                    RuleKind::Func
                } else {
                    RuleKind::Group
                };
                self.push_rule(kind, span);
            }
            TokenKind::ParenRight => {
                if !self.rules.iter().any(|r| r.kind.is_scope()) {
                    return Err(ParseError::UnexpectedParenthesis { span });
                }
                return Ok(match self.rules.last() {
                    Some(top) if top.kind.is_scope() => Step::Reduce,
                    _ => Step::ReduceAndRetry,
                });
            }
            op => {
                let Some(kind) = RuleKind::from_operator(op) else {
                    return Err(ParseError::UnexpectedOperator { span });
                };
                if !self.operand_ready() {
                    return Err(ParseError::UnexpectedOperator { span });
                }
                if self.rules.last().is_some_and(|top| top.kind <= kind) {
                    return Ok(Step::ReduceAndRetry);
                }
                self.push_rule(kind, span);
            }
        }
        Ok(Step::Shifted)
    }

    /// Reduces the top rule. `close` is the span of the token that
    /// triggered the reduction, if any.
    fn reduce(&mut self, close: Option<Span>) -> Result<(), ParseError> {
        let Some(rule) = self.rules.pop() else {
            return Ok(());
        };
        let scope_span = close.map_or(rule.span, |c| rule.span.to(c));
        let has_operand = self.exprs.len() > rule.base;
        trace!(rule = ?rule.kind, exprs = self.exprs.len(), "reducing");

        match rule.kind {
            RuleKind::Group => {
                if !has_operand {
                    return Err(ParseError::EmptyParenthesis { span: scope_span });
                }
                if let Some(inner) = self.exprs.last() {
                    reject_list(inner)?;
                }
            }
            RuleKind::Func => {
                if !has_operand {
                    return Err(ParseError::EmptyFuncCall { span: scope_span });
                }
                let (name, args) = self.pop_pair(scope_span)?;
                let ExprKind::String(name_value) = name.kind else {
                    return Err(ParseError::InvalidFuncName { span: name.span });
                };
                let args = match args.kind {
                    ExprKind::List(items) => items,
                    _ => vec![args],
                };
                self.exprs.push(Expr::new(
                    ExprKind::Func {
                        name: name_value,
                        args,
                    },
                    name.span.to(scope_span),
                ));
            }
            RuleKind::ArgsList => {
                if !has_operand {
                    return Err(ParseError::MissingArgument { span: rule.span });
                }
                let (first, rest) = self.pop_pair(rule.span)?;
                let span = first.span.to(rest.span);
                let mut items = vec![first];
                match rest.kind {
                    ExprKind::List(more) => items.extend(more),
                    _ => items.push(rest),
                }
                self.exprs.push(Expr::new(ExprKind::List(items), span));
            }
            kind => {
                if !has_operand {
                    return Err(ParseError::MissingArgument { span: rule.span });
                }
                let (lhs, rhs) = self.pop_pair(rule.span)?;
                for operand in [&lhs, &rhs] {
                    if operand.is_scalar() {
                        return Err(ParseError::InvalidArgument { span: operand.span });
                    }
                }
                let Some(op) = kind.binary_op() else {
                    return Err(ParseError::UnexpectedOperator { span: rule.span });
                };
                self.exprs.push(Expr::binary(op, lhs, rhs));
            }
        }
        Ok(())
    }

    /// Pops the two topmost expressions. Every non-group rule is pushed
    /// with its left operand already on the stack.
    fn pop_pair(&mut self, span: Span) -> Result<(Expr, Expr), ParseError> {
        let second = self.exprs.pop();
        let first = self.exprs.pop();
        match (first, second) {
            (Some(first), Some(second)) => Ok((first, second)),
            _ => Err(ParseError::MissingArgument { span }),
        }
    }

    /// Every non-group rule joins two expressions, so the expression stack
    /// must hold exactly one more entry than those rules, or as many while
    /// the right-hand operand is pending.
    fn check_balance(&self, span: Span) -> Result<(), ParseError> {
        let pending = self.rules.iter().filter(|r| r.kind != RuleKind::Group).count();
        if self.exprs.len() < pending || self.exprs.len() > pending + 1 {
            return Err(ParseError::MissingOperator { span });
        }
        Ok(())
    }

    fn finish(mut self, query: &str) -> Result<Expr, ParseError> {
        while let Some(top) = self.rules.last() {
            if top.kind.is_scope() {
                return Err(ParseError::UnclosedParenthesis { span: top.span });
            }
            self.reduce(None)?;
        }

        let Some(expr) = self.exprs.pop() else {
            return Err(ParseError::EmptyExpression {
                span: Span::new(0, query.len()),
            });
        };
        if expr.is_scalar() {
            return Err(ParseError::InvalidArgument { span: expr.span });
        }
        reject_list(&expr)?;
        debug!(expr = %expr, "parsed query");
        Ok(expr)
    }
}

/// Comma lists are only valid directly inside a call's parentheses.
fn reject_list(expr: &Expr) -> Result<(), ParseError> {
    match expr.kind {
        ExprKind::List(_) => Err(ParseError::UnexpectedComma { span: expr.span }),
        _ => Ok(()),
    }
}
