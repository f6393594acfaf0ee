//! PEST-based parser for the Flow language
//!
//! Produces the executor AST with span information for error reporting.
//! Statements on the same line must be separated by a newline; anything else
//! (including `;`) is a syntax error, which is what routes shell command lines
//! to the console's dispatcher.

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::executor::types::ast::{
    BinaryOp, Binding, Expr, ForLoopKind, ImportName, PathSegment, Span, Stmt, UnaryOp, VarKind,
};

#[cfg(test)]
mod tests;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/flow.pest"]
struct FlowParser;

/* ===================== Error Types ===================== */

/// A syntax error, with the position it was detected at when known
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    message: String,
    span: Option<Span>,
}

impl ParseError {
    fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        use pest::error::{ErrorVariant, LineColLocation};

        // pest counts from 1 and points one past the end of a span
        let ((line, col), (end_line, end_col)) = match err.line_col {
            LineColLocation::Pos((line, col)) => ((line, col), (line, col + 1)),
            LineColLocation::Span(start, end) => (start, end),
        };
        let span = Span::new(
            0,
            0,
            line.saturating_sub(1),
            col.saturating_sub(1),
            end_line.saturating_sub(1),
            end_col.saturating_sub(1),
        );

        let message = match &err.variant {
            ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
                let expected: Vec<String> = positives.iter().map(describe_rule).collect();
                format!("invalid syntax, expected {}", expected.join(" or "))
            }
            _ => "invalid syntax".to_string(),
        };
        Self {
            message,
            span: Some(span),
        }
    }
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".to_string(),
        Rule::expression | Rule::unary_expr | Rule::primary => "expression".to_string(),
        Rule::statement => "statement".to_string(),
        Rule::identifier => "identifier".to_string(),
        other => format!("{:?}", other),
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Span of a pair, measured against the full source.
///
/// A rule ending in `?` or `*` swallows the implicit whitespace and comments
/// after its last token, newlines included. The span stops at the last token
/// so that statement lines stay accurate.
fn pair_to_span(pair: &Pair, source: &str) -> Span {
    let start = pair.as_span().start_pos();
    let end = start.pos() + token_len(pair.as_str());
    let (start_line, start_col) = start.line_col();
    let (end_line, end_col) = pest::Position::new(source, end)
        .map(|position| position.line_col())
        .unwrap_or((start_line, start_col));

    Span::new(
        start.pos(),
        end,
        start_line - 1,
        start_col - 1,
        end_line - 1,
        end_col - 1,
    )
}

/// Byte length of `text` up to the end of its last token
fn token_len(text: &str) -> usize {
    let mut end = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        match ch {
            '"' | '\'' => {
                end = text.len();
                while let Some((j, c)) = chars.next() {
                    if c == '\\' {
                        chars.next();
                    } else if c == ch {
                        end = j + c.len_utf8();
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut prev = '\0';
                for (_, c) in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            c if c.is_whitespace() => {}
            c => end = i + c.len_utf8(),
        }
    }

    end
}

/* ===================== Public API ===================== */

/// Parse a Flow source string into its top-level statements
pub fn parse_program(source: &str) -> ParseResult<Vec<Stmt>> {
    let mut pairs = FlowParser::parse(Rule::program, source)?;
    let program = pairs.next().unwrap();

    let builder = Builder::new(source);
    let statements = program
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::statement)
        .map(|pair| builder.statement(pair))
        .collect::<ParseResult<Vec<_>>>()?;

    check_line_separation(&statements)?;
    Ok(statements)
}

/// Whether `source` stops inside an open `(`, `[`, `{`, comment or string.
///
/// Only meaningful for source that failed to parse: it is how the console
/// decides between "needs another line" and "invalid". A string is open only
/// when its line ends in a `\` continuation; an unterminated quote is invalid
/// so that shell lines such as `echo it's` still reach the dispatcher.
pub fn has_open_delimiters(source: &str) -> bool {
    let mut depth: i64 = 0;
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' | '\'' => loop {
                match chars.next() {
                    None | Some('\n') => return false,
                    Some('\\') => {
                        if chars.next().is_none() {
                            return true;
                        }
                    }
                    Some(c) if c == ch => break,
                    Some(_) => {}
                }
            },
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if !closed {
                    return true;
                }
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }

    depth > 0
}

/* ===================== AST Builder ===================== */

/// Turns pest pairs into AST nodes, resolving spans against the full source
struct Builder<'s> {
    source: &'s str,
}

impl<'s> Builder<'s> {
    fn new(source: &'s str) -> Self {
        Self { source }
    }

    fn span(&self, pair: &Pair) -> Span {
        pair_to_span(pair, self.source)
    }

    fn block(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let statements: Vec<Stmt> = pair
            .into_inner()
            .map(|stmt_pair| self.statement(stmt_pair))
            .collect::<ParseResult<_>>()?;
        check_line_separation(&statements)?;

        Ok(Stmt::Block {
            body: statements,
            span,
        })
    }

    fn if_stmt(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        let test = self.expression(inner.next().unwrap())?;
        let then_s = self.statement(inner.next().unwrap())?;

        let else_s = if let Some(else_clause_pair) = inner.next() {
            let else_inner = else_clause_pair.into_inner().next().unwrap();
            Some(Box::new(self.statement(else_inner)?))
        } else {
            None
        };

        Ok(Stmt::If {
            test,
            then_s: Box::new(then_s),
            else_s,
            span,
        })
    }

    fn while_stmt(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        let test = self.expression(inner.next().unwrap())?;
        let body = self.statement(inner.next().unwrap())?;

        Ok(Stmt::While {
            test,
            body: Box::new(body),
            span,
        })
    }

    fn for_loop(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        // let/const is accepted but loop bindings are always fresh per iteration
        let _var_kind = self.var_kind(inner.next().unwrap())?;
        let binding = inner.next().unwrap().as_str().to_string();

        let kind_pair = inner.next().unwrap();
        let kind = match kind_pair.as_str() {
            "of" => ForLoopKind::Of,
            "in" => ForLoopKind::In,
            _ => {
                return Err(ParseError::at(
                    format!("expected 'of' or 'in', got {}", kind_pair.as_str()),
                    self.span(&kind_pair),
                ))
            }
        };

        let iterable = self.expression(inner.next().unwrap())?;
        let body = self.statement(inner.next().unwrap())?;

        Ok(Stmt::ForLoop {
            kind,
            binding,
            iterable,
            body: Box::new(body),
            span,
        })
    }

    fn var_kind(&self, pair: Pair) -> ParseResult<VarKind> {
        match pair.as_str() {
            "let" => Ok(VarKind::Let),
            "const" => Ok(VarKind::Const),
            other => Err(ParseError::at(
                format!("expected 'let' or 'const', got {}", other),
                self.span(&pair),
            )),
        }
    }

    fn declare(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        let var_kind = self.var_kind(inner.next().unwrap())?;
        let target = self.binding(inner.next().unwrap())?;

        let init = match inner.next() {
            Some(expr_pair) => Some(self.expression(expr_pair)?),
            None => None,
        };

        if matches!(target, Binding::Fields(_)) && init.is_none() {
            return Err(ParseError::at(
                "Destructuring declaration requires an initializer",
                span,
            ));
        }

        Ok(Stmt::Declare {
            var_kind,
            target,
            init,
            span,
        })
    }

    fn binding(&self, pair: Pair) -> ParseResult<Binding> {
        let inner = pair.into_inner().next().unwrap();

        match inner.as_rule() {
            Rule::identifier => Ok(Binding::Name(inner.as_str().to_string())),
            Rule::destructure_pattern => {
                let list = inner.into_inner().next().unwrap();
                Ok(Binding::Fields(
                    list.into_inner().map(|id| id.as_str().to_string()).collect(),
                ))
            }
            rule => Err(ParseError::at(
                format!("unexpected binding rule {:?}", rule),
                self.span(&inner),
            )),
        }
    }

    fn try_stmt(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        let body = self.statement(inner.next().unwrap())?;
        let catch_var = inner.next().unwrap().as_str().to_string();
        let catch_body = self.statement(inner.next().unwrap())?;

        Ok(Stmt::Try {
            body: Box::new(body),
            catch_var,
            catch_body: Box::new(catch_body),
            span,
        })
    }

    fn import(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        let module = inner.next().unwrap().as_str().to_string();
        let alias = inner.next().map(|alias| alias.as_str().to_string());

        Ok(Stmt::Import {
            module,
            alias,
            span,
        })
    }

    fn from_import(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        let module = inner.next().unwrap().as_str().to_string();
        let names = inner
            .next()
            .unwrap()
            .into_inner()
            .map(|id| ImportName {
                name: id.as_str().to_string(),
                span: self.span(&id),
            })
            .collect();

        Ok(Stmt::FromImport {
            module,
            names,
            span,
        })
    }

    fn assign(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        let var = inner.next().unwrap().as_str().to_string();

        let mut path = Vec::new();
        let mut value = None;

        for pair in inner {
            match pair.as_rule() {
                Rule::assign_path_segment => {
                    let segment = pair.into_inner().next().unwrap();
                    path.push(match segment.as_rule() {
                        Rule::identifier => PathSegment::Field(segment.as_str().to_string()),
                        _ => PathSegment::Index(self.expression(segment)?),
                    });
                }
                Rule::expression => {
                    value = Some(self.expression(pair)?);
                    break;
                }
                _ => {}
            }
        }

        let value = value.ok_or_else(|| ParseError::at("assignment without a value", span))?;

        Ok(Stmt::Assign {
            var,
            path,
            value,
            span,
        })
    }

    /// Fold `a op b op c` left to right
    fn binary(&self, pair: Pair) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();

        let first = inner
            .next()
            .ok_or_else(|| ParseError::at("empty binary expression", span))?;
        let mut left = self.expression(first)?;

        while let Some(op_pair) = inner.next() {
            let op = binary_op(op_pair.as_rule()).ok_or_else(|| {
                ParseError::at(
                    format!("expected an operator, got {:?}", op_pair.as_rule()),
                    self.span(&op_pair),
                )
            })?;
            let operand = inner
                .next()
                .ok_or_else(|| ParseError::at("missing right operand", span))?;
            let right = self.expression(operand)?;

            let span = left.span().merge(&right.span());
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn statement(&self, pair: Pair) -> ParseResult<Stmt> {
        let span = self.span(&pair);

        match pair.as_rule() {
            Rule::statement => {
                let inner = pair.into_inner().next().unwrap();
                self.statement(inner)
            }
            Rule::return_stmt => {
                let value = match pair.into_inner().next() {
                    Some(expr_pair) => Some(self.expression(expr_pair)?),
                    None => None,
                };
                Ok(Stmt::Return { value, span })
            }
            Rule::import_stmt => self.import(pair),
            Rule::from_import_stmt => self.from_import(pair),
            Rule::if_stmt => self.if_stmt(pair),
            Rule::while_stmt => self.while_stmt(pair),
            Rule::for_loop_stmt => self.for_loop(pair),
            Rule::try_stmt => self.try_stmt(pair),
            Rule::break_stmt => Ok(Stmt::Break { span }),
            Rule::continue_stmt => Ok(Stmt::Continue { span }),
            Rule::block => self.block(pair),
            Rule::declare_stmt => self.declare(pair),
            Rule::assign_stmt => self.assign(pair),
            Rule::expr_stmt => {
                let expr = self.expression(pair.into_inner().next().unwrap())?;
                Ok(Stmt::Expr { expr, span })
            }
            rule => Err(ParseError::at(
                format!("unexpected statement rule {:?}", rule),
                span,
            )),
        }
    }

    fn expression(&self, pair: Pair) -> ParseResult<Expr> {
        let span = self.span(&pair);

        match pair.as_rule() {
            Rule::expression | Rule::primary | Rule::literal => {
                let inner = pair.into_inner().next().unwrap();
                self.expression(inner)
            }
            Rule::ternary_expr => {
                let mut inner = pair.into_inner();
                let condition = self.expression(inner.next().unwrap())?;

                match inner.next() {
                    Some(consequent_pair) => {
                        let consequent = self.expression(consequent_pair)?;
                        let alternate = self.expression(inner.next().unwrap())?;
                        Ok(Expr::Ternary {
                            condition: Box::new(condition),
                            consequent: Box::new(consequent),
                            alternate: Box::new(alternate),
                            span,
                        })
                    }
                    None => Ok(condition),
                }
            }
            Rule::nullish_expr
            | Rule::logical_or_expr
            | Rule::logical_and_expr
            | Rule::equality_expr
            | Rule::comparison_expr
            | Rule::additive_expr
            | Rule::multiplicative_expr => self.binary(pair),
            Rule::unary_expr => {
                let mut inner = pair.into_inner();
                let first = inner.next().unwrap();

                let op = match first.as_rule() {
                    Rule::op_not => UnaryOp::Not,
                    Rule::op_neg => UnaryOp::Neg,
                    _ => return self.expression(first),
                };
                let operand = self.expression(inner.next().unwrap())?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                    span,
                })
            }
            Rule::await_expr => {
                let inner_expr = self.expression(pair.into_inner().next().unwrap())?;
                Ok(Expr::Await {
                    inner: Box::new(inner_expr),
                    span,
                })
            }
            Rule::call_expr => self.postfix_chain(pair),
            Rule::identifier => Ok(Expr::Ident {
                name: pair.as_str().to_string(),
                span,
            }),
            Rule::number => {
                let num_str = pair.as_str();
                let value = num_str.parse::<f64>().map_err(|e| {
                    ParseError::at(format!("invalid number '{}': {}", num_str, e), span)
                })?;
                Ok(Expr::LitNum { v: value, span })
            }
            Rule::boolean => Ok(Expr::LitBool {
                v: pair.as_str() == "true",
                span,
            }),
            Rule::string => Ok(Expr::LitStr {
                v: string_value(pair),
                span,
            }),
            Rule::null_lit => Ok(Expr::LitNull { span }),
            Rule::object_lit => self.object(pair),
            Rule::array_lit => self.array(pair),
            rule => Err(ParseError::at(
                format!("unexpected expression rule {:?}", rule),
                span,
            )),
        }
    }

    fn postfix_chain(&self, pair: Pair) -> ParseResult<Expr> {
        let mut inner = pair.into_inner();
        let mut expr = self.expression(inner.next().unwrap())?;

        for postfix_pair in inner {
            let postfix_span = self.span(&postfix_pair);
            let postfix_inner = postfix_pair.into_inner().next().unwrap();
            let new_span = expr.span().merge(&postfix_span);

            expr = match postfix_inner.as_rule() {
                Rule::call_suffix => {
                    let args = match postfix_inner.into_inner().next() {
                        Some(arg_list_pair) => self.expressions(arg_list_pair)?,
                        None => vec![],
                    };
                    Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span: new_span,
                    }
                }
                Rule::optional_access | Rule::regular_access => {
                    let optional = postfix_inner.as_rule() == Rule::optional_access;
                    let prop_pair = postfix_inner.into_inner().next().unwrap();
                    Expr::Member {
                        object: Box::new(expr),
                        property: prop_pair.as_str().to_string(),
                        optional,
                        span: new_span,
                    }
                }
                Rule::index_access => {
                    let index = self.expression(postfix_inner.into_inner().next().unwrap())?;
                    Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span: new_span,
                    }
                }
                _ => unreachable!("Unexpected postfix rule: {:?}", postfix_inner.as_rule()),
            };
        }

        Ok(expr)
    }

    fn expressions(&self, pair: Pair) -> ParseResult<Vec<Expr>> {
        pair.into_inner()
            .map(|expr_pair| self.expression(expr_pair))
            .collect()
    }

    fn object(&self, pair: Pair) -> ParseResult<Expr> {
        let span = self.span(&pair);

        let properties = match pair.into_inner().next() {
            Some(property_list_pair) => property_list_pair
                .into_inner()
                .map(|property_pair| self.property(property_pair))
                .collect::<ParseResult<Vec<_>>>()?,
            None => vec![],
        };

        Ok(Expr::LitObj { properties, span })
    }

    fn property(&self, pair: Pair) -> ParseResult<(String, Expr)> {
        let inner = pair.into_inner().next().unwrap();
        let inner_span = self.span(&inner);

        match inner.as_rule() {
            Rule::property_pair => {
                let mut inner_pairs = inner.into_inner();
                let key_pair = inner_pairs.next().unwrap();
                let key = match key_pair.as_rule() {
                    Rule::string => string_value(key_pair),
                    _ => key_pair.as_str().to_string(),
                };
                let value = self.expression(inner_pairs.next().unwrap())?;
                Ok((key, value))
            }
            Rule::property_shorthand => {
                let key = inner.as_str().to_string();
                let value = Expr::Ident {
                    name: key.clone(),
                    span: inner_span,
                };
                Ok((key, value))
            }
            rule => Err(ParseError::at(
                format!("unexpected property rule {:?}", rule),
                inner_span,
            )),
        }
    }

    fn array(&self, pair: Pair) -> ParseResult<Expr> {
        let span = self.span(&pair);

        let elements = match pair.into_inner().next() {
            Some(element_list_pair) => self.expressions(element_list_pair)?,
            None => vec![],
        };

        Ok(Expr::LitList { elements, span })
    }
}

/// Statements sharing a line must not run together (`a b` is not two statements)
fn check_line_separation(statements: &[Stmt]) -> ParseResult<()> {
    for pair in statements.windows(2) {
        let (prev, next) = (pair[0].span(), pair[1].span());
        if prev.end_line == next.start_line {
            return Err(ParseError::at(
                format!(
                    "invalid syntax: unexpected token at line {}, column {}",
                    next.line(),
                    next.start_col + 1
                ),
                next,
            ));
        }
    }
    Ok(())
}

fn binary_op(rule: Rule) -> Option<BinaryOp> {
    Some(match rule {
        Rule::op_and => BinaryOp::And,
        Rule::op_or => BinaryOp::Or,
        Rule::op_nullish => BinaryOp::Nullish,
        Rule::op_eq => BinaryOp::Eq,
        Rule::op_ne => BinaryOp::Ne,
        Rule::op_lt => BinaryOp::Lt,
        Rule::op_lte => BinaryOp::Lte,
        Rule::op_gt => BinaryOp::Gt,
        Rule::op_gte => BinaryOp::Gte,
        Rule::op_add => BinaryOp::Add,
        Rule::op_sub => BinaryOp::Sub,
        Rule::op_mul => BinaryOp::Mul,
        Rule::op_div => BinaryOp::Div,
        Rule::op_mod => BinaryOp::Mod,
        _ => return None,
    })
}

/// Decode the escapes of a string literal pair
fn string_value(pair: Pair) -> String {
    let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            // Line continuation
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
