//! Arithmetic primitives (§4.8): integer-only; mixing with non-integers is
//! an error. `+` with zero args is 0; `-` with one arg negates; `<`/`=`
//! require exactly two integers. `rand` is the SUPPLEMENT addition: a
//! simple in-process PRNG rather than a blocking source of entropy, since
//! the core spec names no randomness source and the `rand` crate is
//! outside this interpreter's otherwise small, self-contained stack.

use crate::eval::eval_list;
use crate::interpreter::Interpreter;
use shi_gc::Value;
use shi_util::error::{EvalError, EvalResult};

fn as_int(v: Value, form: &str) -> Result<i64, EvalError> {
    match v {
        Value::Integer(n) => Ok(n),
        _ => Err(EvalError::Type {
            form: form.to_string(),
            expected: "integer".to_string(),
        }),
    }
}

/// `(+ n1 n2 … nk)` — left-to-right sum; 0 with no arguments.
pub fn add(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let mut total = 0i64;
    for v in args {
        total += as_int(v, "+")?;
    }
    Ok(Value::Integer(total))
}

/// `(- n)` negates; `(- n1 n2 … nk)` subtracts left-to-right.
pub fn sub(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let mut iter = args.into_iter();
    let first = as_int(
        iter.next().ok_or_else(|| EvalError::Arity {
            form: "-".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        })?,
        "-",
    )?;
    let rest: Vec<i64> = iter.map(|v| as_int(v, "-")).collect::<Result<_, _>>()?;
    if rest.is_empty() {
        return Ok(Value::Integer(-first));
    }
    let mut total = first;
    for n in rest {
        total -= n;
    }
    Ok(Value::Integer(total))
}

/// `(< a b)` — exactly two integers.
pub fn lt(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let (a, b) = two_ints(interp, env, tail, "<")?;
    Ok(if a < b { Value::True } else { Value::Nil })
}

/// `(= a b)` — exactly two integers.
pub fn num_eq(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let (a, b) = two_ints(interp, env, tail, "=")?;
    Ok(if a == b { Value::True } else { Value::Nil })
}

fn two_ints(interp: &mut Interpreter, env: Value, tail: Value, form: &str) -> EvalResult<(i64, i64)> {
    let args = eval_list(interp, env, tail)?;
    if args.len() != 2 {
        return Err(EvalError::Arity {
            form: form.to_string(),
            expected: "2".to_string(),
            got: args.len(),
        }
        .into());
    }
    Ok((as_int(args[0], form)?, as_int(args[1], form)?))
}

/// `(rand)` — a non-negative pseudo-random Integer; `(rand n)` bounds it to
/// `[0, n)`. Backed by a splitmix64-style step seeded from the wall clock at
/// first use, advanced on every call — deterministic only within a process,
/// which is all §4.8's arithmetic section requires of it.
pub fn rand(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let bound = match args.as_slice() {
        [] => None,
        [Value::Integer(n)] => Some(*n),
        [_] => {
            return Err(EvalError::Type {
                form: "rand".to_string(),
                expected: "integer".to_string(),
            }
            .into())
        }
        _ => {
            return Err(EvalError::Arity {
                form: "rand".to_string(),
                expected: "0 or 1".to_string(),
                got: args.len(),
            }
            .into())
        }
    };

    let raw = next_rand(&mut interp.rng_state);
    let value = match bound {
        Some(n) if n > 0 => (raw % (n as u64)) as i64,
        Some(_) => 0,
        None => (raw & i64::MAX as u64) as i64,
    };
    Ok(Value::Integer(value))
}

fn next_rand(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
