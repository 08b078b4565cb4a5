//! pest front end for the macro script language.

use super::ast::{BinaryOp, Expr, Program, Stmt, TemplatePart, UnaryOp};
use super::value::{parse_number, Value};
use super::ScriptError;
use once_cell::sync::Lazy;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "script/grammar.pest"]
struct ScriptParser;

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left)
            | Op::infix(Rule::strict_eq, Assoc::Left)
            | Op::infix(Rule::strict_ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::not) | Op::prefix(Rule::neg) | Op::prefix(Rule::pos))
});

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a single expression, e.g. the operand of `#if`.
pub fn parse_expression(source: &str) -> Result<Expr, ScriptError> {
    let mut pairs =
        ScriptParser::parse(Rule::expression_input, source).map_err(convert_parse_error)?;
    let input = next_pair(&mut pairs, "expression")?;
    let expr = next_pair(&mut input.into_inner(), "expression")?;
    build_expr(expr)
}

/// Parses a function-macro body: one `{ ... }` block.
pub fn parse_function_body(source: &str) -> Result<Program, ScriptError> {
    let mut pairs =
        ScriptParser::parse(Rule::function_body, source.trim()).map_err(convert_parse_error)?;
    let input = next_pair(&mut pairs, "function body")?;
    let block = next_pair(&mut input.into_inner(), "block")?;
    let body = block
        .into_inner()
        .map(build_stmt)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program { body })
}

fn convert_parse_error(error: pest::error::Error<Rule>) -> ScriptError {
    let position = match error.line_col {
        pest::error::LineColLocation::Pos((line, col)) => format!("{}:{}", line, col),
        pest::error::LineColLocation::Span((line, col), _) => format!("{}:{}", line, col),
    };
    let detail = match &error.variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let expected: Vec<String> = positives.iter().map(|rule| format!("{:?}", rule)).collect();
            format!("expected {}", expected.join(" or "))
        }
        pest::error::ErrorVariant::ParsingError { .. } => "unexpected input".to_string(),
        pest::error::ErrorVariant::CustomError { message } => message.clone(),
    };
    ScriptError::Parse(format!("{} at {}", detail, position))
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, ScriptError> {
    pairs
        .next()
        .ok_or_else(|| ScriptError::Parse(format!("missing {}", what)))
}

// ============================================================================
// STATEMENT BUILDERS
// ============================================================================

fn build_stmt(pair: Pair<Rule>) -> Result<Stmt, ScriptError> {
    match pair.as_rule() {
        Rule::block => Ok(Stmt::Block(
            pair.into_inner()
                .map(build_stmt)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Rule::declaration => {
            let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::kw_decl);
            let name = inner
                .next()
                .ok_or_else(|| ScriptError::Parse("missing variable name".into()))?
                .as_str()
                .to_string();
            let init = inner.next().map(build_expr).transpose()?;
            Ok(Stmt::Let(name, init))
        }
        Rule::assignment => {
            let mut inner = pair.into_inner();
            let name = next_pair(&mut inner, "assignment target")?.as_str().to_string();
            let value = build_expr(next_pair(&mut inner, "assigned value")?)?;
            Ok(Stmt::Assign(name, value))
        }
        Rule::if_stmt => {
            let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::kw_else);
            let condition = build_expr(
                inner
                    .next()
                    .ok_or_else(|| ScriptError::Parse("missing if condition".into()))?,
            )?;
            let then = build_stmt(
                inner
                    .next()
                    .ok_or_else(|| ScriptError::Parse("missing if branch".into()))?,
            )?;
            let otherwise = inner.next().map(build_stmt).transpose()?;
            Ok(Stmt::If(condition, Box::new(then), otherwise.map(Box::new)))
        }
        Rule::return_stmt => {
            let value = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .map(build_expr)
                .transpose()?;
            Ok(Stmt::Return(value))
        }
        Rule::empty_stmt => Ok(Stmt::Empty),
        Rule::expr_stmt => {
            let expr = next_pair(&mut pair.into_inner(), "expression")?;
            Ok(Stmt::Expr(build_expr(expr)?))
        }
        other => Err(ScriptError::Parse(format!("unexpected {:?}", other))),
    }
}

// ============================================================================
// EXPRESSION BUILDERS
// ============================================================================

fn build_expr(pair: Pair<Rule>) -> Result<Expr, ScriptError> {
    let mut inner = pair.into_inner();
    let condition = build_binary(next_pair(&mut inner, "expression")?.into_inner())?;
    match (inner.next(), inner.next()) {
        (Some(then), Some(otherwise)) => Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(build_expr(then)?),
            Box::new(build_expr(otherwise)?),
        )),
        _ => Ok(condition),
    }
}

fn build_binary(pairs: Pairs<Rule>) -> Result<Expr, ScriptError> {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::not => UnaryOp::Not,
                Rule::neg => UnaryOp::Neg,
                _ => UnaryOp::Pos,
            };
            Ok(Expr::Unary(op, Box::new(operand?)))
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::or => BinaryOp::Or,
                Rule::and => BinaryOp::And,
                Rule::eq => BinaryOp::Eq,
                Rule::ne => BinaryOp::Ne,
                Rule::strict_eq => BinaryOp::StrictEq,
                Rule::strict_ne => BinaryOp::StrictNe,
                Rule::lt => BinaryOp::Lt,
                Rule::le => BinaryOp::Le,
                Rule::gt => BinaryOp::Gt,
                Rule::ge => BinaryOp::Ge,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                _ => BinaryOp::Rem,
            };
            Ok(Expr::Binary(op, Box::new(lhs?), Box::new(rhs?)))
        })
        .parse(pairs)
}

fn build_primary(pair: Pair<Rule>) -> Result<Expr, ScriptError> {
    match pair.as_rule() {
        Rule::expr => build_expr(pair),
        Rule::number => Ok(Expr::Literal(Value::Number(parse_number(pair.as_str())))),
        Rule::string => Ok(Expr::Literal(Value::Str(unescape(strip_quotes(
            pair.as_str(),
        ))))),
        Rule::template => {
            let parts = pair
                .into_inner()
                .map(|part| match part.as_rule() {
                    Rule::template_text => Ok(TemplatePart::Text(unescape(part.as_str()))),
                    _ => {
                        let expr = next_pair(&mut part.into_inner(), "template expression")?;
                        Ok(TemplatePart::Expr(build_expr(expr)?))
                    }
                })
                .collect::<Result<Vec<_>, ScriptError>>()?;
            Ok(Expr::Template(parts))
        }
        Rule::boolean => Ok(Expr::Literal(Value::Bool(pair.as_str() == "true"))),
        Rule::null_lit => Ok(Expr::Literal(Value::Null)),
        Rule::undefined_lit => Ok(Expr::Literal(Value::Undefined)),
        Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = next_pair(&mut inner, "function name")?.as_str().to_string();
            let args = inner.map(build_expr).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Call(name, args))
        }
        other => Err(ScriptError::Parse(format!("unexpected {:?}", other))),
    }
}

fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Resolves backslash escapes in string and template literals.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
