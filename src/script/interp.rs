//! Tree-walking evaluator for the script language.

use super::ast::{BinaryOp, Expr, Program, Stmt, TemplatePart, UnaryOp};
use super::builtins::call_pure;
use super::parser::parse_expression;
use super::value::Value;
use super::ScriptError;
use std::collections::HashMap;

/// Supplies builtins that need session state.
pub trait Host {
    /// Calls the host builtin `name`. `None` means the host has no such builtin.
    fn call(&mut self, name: &str, args: &[Value]) -> Option<Result<Value, ScriptError>>;
}

/// A host with no builtins of its own.
pub struct PureHost;

impl Host for PureHost {
    fn call(&mut self, _name: &str, _args: &[Value]) -> Option<Result<Value, ScriptError>> {
        None
    }
}

/// Nesting limit for `eval()` calls evaluating text that calls `eval()`.
const MAX_EVAL_DEPTH: usize = 16;

enum Flow {
    Normal,
    Return(Value),
}

struct Interpreter<'h> {
    host: &'h mut dyn Host,
    scopes: Vec<HashMap<String, Value>>,
    eval_depth: usize,
}

/// Parses and evaluates one expression.
pub fn evaluate(source: &str, host: &mut dyn Host) -> Result<Value, ScriptError> {
    let expr = parse_expression(source)?;
    let mut interp = Interpreter {
        host,
        scopes: vec![HashMap::new()],
        eval_depth: 0,
    };
    interp.eval(&expr)
}

/// Runs a function body with the given bindings. A missing `return` yields `undefined`.
pub fn run_program(
    program: &Program,
    bindings: Vec<(String, Value)>,
    host: &mut dyn Host,
) -> Result<Value, ScriptError> {
    let mut interp = Interpreter {
        host,
        scopes: vec![bindings.into_iter().collect(), HashMap::new()],
        eval_depth: 0,
    };
    for stmt in &program.body {
        if let Flow::Return(value) = interp.exec(stmt)? {
            return Ok(value);
        }
    }
    Ok(Value::Undefined)
}

impl<'h> Interpreter<'h> {
    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        match stmt {
            Stmt::Let(name, init) => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Assign(name, expr) => {
                let value = self.eval(expr)?;
                let scope = self
                    .scopes
                    .iter_mut()
                    .rev()
                    .find(|scope| scope.contains_key(name))
                    .ok_or_else(|| ScriptError::Undeclared(name.clone()))?;
                scope.insert(name.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::If(condition, then, otherwise) => {
                if self.eval(condition)?.truthy() {
                    self.exec(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Block(stmts) => {
                self.scopes.push(HashMap::new());
                let mut flow = Ok(Flow::Normal);
                for stmt in stmts {
                    flow = self.exec(stmt);
                    if !matches!(flow, Ok(Flow::Normal)) {
                        break;
                    }
                }
                self.scopes.pop();
                flow
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, ScriptError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| ScriptError::UnknownIdentifier(name.to_string()))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.lookup(name),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => out.push_str(&self.eval(expr)?.to_string()),
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, &args)
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Pos => Value::Number(value.to_number()),
                })
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.truthy() {
                    self.eval(rhs)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Conditional(condition, then, otherwise) => {
                if self.eval(condition)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        if name == "eval" {
            return self.eval_text(args);
        }
        if let Some(result) = self.host.call(name, args) {
            return result;
        }
        call_pure(name, args).unwrap_or_else(|| Err(ScriptError::UnknownFunction(name.to_string())))
    }

    fn eval_text(&mut self, args: &[Value]) -> Result<Value, ScriptError> {
        if args.len() != 1 {
            return Err(ScriptError::Arity {
                name: "eval".into(),
                expected: "1".into(),
                actual: args.len(),
            });
        }
        if self.eval_depth >= MAX_EVAL_DEPTH {
            return Err(ScriptError::Host("eval() nested too deeply".into()));
        }
        let expr = parse_expression(&args[0].to_string())?;
        self.eval_depth += 1;
        let result = self.eval(&expr);
        self.eval_depth -= 1;
        result
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{}{}", left, right)),
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        BinaryOp::And | BinaryOp::Or => Value::Undefined,
    }
}
