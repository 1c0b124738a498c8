use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{context::Namespace, distributions, EvalError, EvalResult};
use crate::analyzer::parse_tokens;
use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};
use crate::tokenizer::Tokenizer;

/// Numeric value produced by parameter expressions.
///
/// Integers stay integers through `+ - * // % **` and are promoted to floats
/// when mixed with a float or divided with `/`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Integer(i) => *i as f64,
            Value::Float(x) => *x,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Integer(i) => *i == 0,
            Value::Float(x) => *x == 0.0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Tokenizes, parses and evaluates expression text.
    #[tracing::instrument(level = "debug", skip(self, namespace))]
    pub fn eval_source(&self, source: &str, namespace: &mut Namespace) -> EvalResult<Value> {
        let tokens = Tokenizer::new().tokenize_significant(source)?;
        let expression = parse_tokens(&tokens)?;
        self.eval_expression(&expression, namespace)
    }

    pub fn eval_expression(
        &self,
        expr: &Expression,
        namespace: &mut Namespace,
    ) -> EvalResult<Value> {
        match expr {
            Expression::Literal(Literal::Integer(i)) => Ok(Value::Integer(*i)),
            Expression::Literal(Literal::Float(x)) => Ok(Value::Float(*x)),
            Expression::Variable(name) => namespace.lookup(name),
            Expression::FunctionCall {
                function,
                arguments,
            } => self.eval_function_call(function, arguments, namespace),
            Expression::BinaryOp { op, left, right } => {
                let left = self.eval_expression(left, namespace)?;
                let right = self.eval_expression(right, namespace)?;
                eval_binary_op(*op, left, right)
            }
            Expression::UnaryOp { op, operand } => {
                let value = self.eval_expression(operand, namespace)?;
                match (op, value) {
                    (UnaryOperator::Plus, value) => Ok(value),
                    (UnaryOperator::Negate, Value::Integer(i)) => i
                        .checked_neg()
                        .map(Value::Integer)
                        .ok_or_else(|| EvalError::Overflow("negation".to_string())),
                    (UnaryOperator::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
                }
            }
        }
    }

    fn eval_function_call(
        &self,
        function: &str,
        arguments: &[Expression],
        namespace: &mut Namespace,
    ) -> EvalResult<Value> {
        // arguments are evaluated left to right before the call draws
        let mut evaluated_args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            evaluated_args.push(self.eval_expression(arg, namespace)?);
        }

        if let Some(result) = eval_math_function(function, &evaluated_args) {
            return result;
        }

        match distributions::lookup(function) {
            Some(sampler) => {
                let value = sampler(
                    &distributions::Args::new(function, &evaluated_args),
                    namespace.rng(),
                )?;
                debug!("{}({:?}) drew {}", function, evaluated_args, value);
                Ok(value)
            }
            None => Err(EvalError::UnknownFunction(function.to_string())),
        }
    }
}

fn arity(function: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(EvalError::Arity {
            function: function.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn invalid(function: &str, message: impl Into<String>) -> EvalError {
    EvalError::InvalidArgument {
        function: function.to_string(),
        message: message.into(),
    }
}

fn to_integer(function: &str, x: f64) -> EvalResult<Value> {
    if !x.is_finite() || x < i64::MIN as f64 || x > i64::MAX as f64 {
        return Err(invalid(function, format!("cannot convert {} to integer", x)));
    }
    Ok(Value::Integer(x as i64))
}

/// Evaluates an allowlisted math function, or returns `None` when `function`
/// is not one.
fn eval_math_function(function: &str, args: &[Value]) -> Option<EvalResult<Value>> {
    let result = match function {
        "abs" => arity(function, args, 1, 1).and_then(|_| match args[0] {
            Value::Integer(i) => i
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| EvalError::Overflow("abs".to_string())),
            Value::Float(x) => Ok(Value::Float(x.abs())),
        }),
        "min" | "max" => arity(function, args, 1, usize::MAX).map(|_| {
            let pick_later = |current: &Value, candidate: &Value| {
                if function == "min" {
                    candidate.as_f64() < current.as_f64()
                } else {
                    candidate.as_f64() > current.as_f64()
                }
            };
            let mut best = args[0];
            for candidate in &args[1..] {
                if pick_later(&best, candidate) {
                    best = *candidate;
                }
            }
            best
        }),
        "round" => arity(function, args, 1, 2).and_then(|_| match args.get(1) {
            None => match args[0] {
                Value::Integer(i) => Ok(Value::Integer(i)),
                Value::Float(x) => to_integer(function, x.round_ties_even()),
            },
            Some(Value::Integer(digits)) => {
                let exponent = i32::try_from(*digits)
                    .map_err(|_| invalid(function, format!("ndigits {} out of range", digits)))?;
                let scale = 10f64.powi(exponent);
                match args[0] {
                    Value::Integer(i) if *digits >= 0 => Ok(Value::Integer(i)),
                    value => Ok(Value::Float(
                        (value.as_f64() * scale).round_ties_even() / scale,
                    )),
                }
            }
            Some(Value::Float(_)) => Err(invalid(function, "ndigits must be an integer")),
        }),
        "floor" => arity(function, args, 1, 1).and_then(|_| match args[0] {
            Value::Integer(i) => Ok(Value::Integer(i)),
            Value::Float(x) => to_integer(function, x.floor()),
        }),
        "ceil" => arity(function, args, 1, 1).and_then(|_| match args[0] {
            Value::Integer(i) => Ok(Value::Integer(i)),
            Value::Float(x) => to_integer(function, x.ceil()),
        }),
        "exp" => arity(function, args, 1, 1).map(|_| Value::Float(args[0].as_f64().exp())),
        "sqrt" => arity(function, args, 1, 1).and_then(|_| {
            let x = args[0].as_f64();
            if x < 0.0 {
                Err(invalid(function, "math domain error"))
            } else {
                Ok(Value::Float(x.sqrt()))
            }
        }),
        "log" => arity(function, args, 1, 2).and_then(|_| {
            let x = args[0].as_f64();
            if x <= 0.0 {
                return Err(invalid(function, "math domain error"));
            }
            match args.get(1) {
                None => Ok(Value::Float(x.ln())),
                Some(base) if base.as_f64() > 0.0 && base.as_f64() != 1.0 => {
                    Ok(Value::Float(x.ln() / base.as_f64().ln()))
                }
                Some(_) => Err(invalid(function, "math domain error")),
            }
        }),
        "pow" => arity(function, args, 2, 2)
            .and_then(|_| eval_binary_op(BinaryOperator::Power, args[0], args[1])),
        _ => return None,
    };
    Some(result)
}

/// Floored quotient and remainder for integers.
fn floor_div_mod(a: i64, b: i64) -> EvalResult<(i64, i64)> {
    if b == 0 {
        return Err(EvalError::DivisionByZero);
    }
    let q = a
        .checked_div(b)
        .ok_or_else(|| EvalError::Overflow("division".to_string()))?;
    let r = a % b;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok((q - 1, r + b))
    } else {
        Ok((q, r))
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

pub fn eval_binary_op(op: BinaryOperator, left: Value, right: Value) -> EvalResult<Value> {
    let overflow = || EvalError::Overflow(op.to_string());
    match (op, left, right) {
        (BinaryOperator::Add, Value::Integer(l), Value::Integer(r)) => {
            l.checked_add(r).map(Value::Integer).ok_or_else(overflow)
        }
        (BinaryOperator::Subtract, Value::Integer(l), Value::Integer(r)) => {
            l.checked_sub(r).map(Value::Integer).ok_or_else(overflow)
        }
        (BinaryOperator::Multiply, Value::Integer(l), Value::Integer(r)) => {
            l.checked_mul(r).map(Value::Integer).ok_or_else(overflow)
        }
        (BinaryOperator::FloorDivide, Value::Integer(l), Value::Integer(r)) => {
            floor_div_mod(l, r).map(|(q, _)| Value::Integer(q))
        }
        (BinaryOperator::Modulo, Value::Integer(l), Value::Integer(r)) => {
            floor_div_mod(l, r).map(|(_, m)| Value::Integer(m))
        }
        (BinaryOperator::Power, Value::Integer(l), Value::Integer(r)) if r >= 0 => {
            let exponent = u32::try_from(r).map_err(|_| overflow())?;
            l.checked_pow(exponent).map(Value::Integer).ok_or_else(overflow)
        }
        (op, left, right) => {
            let (l, r) = (left.as_f64(), right.as_f64());
            match op {
                BinaryOperator::Add => Ok(Value::Float(l + r)),
                BinaryOperator::Subtract => Ok(Value::Float(l - r)),
                BinaryOperator::Multiply => Ok(Value::Float(l * r)),
                BinaryOperator::Divide if right.is_zero() => Err(EvalError::DivisionByZero),
                BinaryOperator::Divide => Ok(Value::Float(l / r)),
                BinaryOperator::FloorDivide if right.is_zero() => Err(EvalError::DivisionByZero),
                BinaryOperator::FloorDivide => Ok(Value::Float((l - float_mod(l, r)) / r)),
                BinaryOperator::Modulo if right.is_zero() => Err(EvalError::DivisionByZero),
                BinaryOperator::Modulo => Ok(Value::Float(float_mod(l, r))),
                BinaryOperator::Power if l == 0.0 && r < 0.0 => Err(EvalError::DivisionByZero),
                BinaryOperator::Power if l < 0.0 && r.fract() != 0.0 => Err(invalid(
                    "pow",
                    "negative number cannot be raised to a fractional power",
                )),
                BinaryOperator::Power => Ok(Value::Float(l.powf(r))),
            }
        }
    }
}
