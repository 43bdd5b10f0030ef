//! List primitives (§4.8) plus the SUPPLEMENT additions `list`, `nil?`,
//! `not` (§4.8's supplement paragraph).

use crate::eval::{eval, eval_list};
use crate::interpreter::Interpreter;
use crate::primitives::nth_raw;
use shi_gc::Value;
use shi_util::error::{EvalError, EvalResult};

fn arg(interp: &Interpreter, tail: Value, n: usize, form: &str) -> EvalResult<Value> {
    nth_raw(&interp.heap, tail, n).ok_or_else(|| {
        EvalError::Arity {
            form: form.to_string(),
            expected: "more".to_string(),
            got: n,
        }
        .into()
    })
}

/// `(cons a b)` — constructs a pair.
pub fn cons(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let a_expr = arg(interp, tail, 0, "cons")?;
    let b_expr = arg(interp, tail, 1, "cons")?;
    let a = eval(interp, env, a_expr)?;
    let a_h = interp.heap.root(a);
    let b = eval(interp, env, b_expr)?;
    let a = interp.heap.get_root(a_h);
    Ok(interp.heap.cons(a, b)?)
}

/// `(car p)` — errors on a non-Cell argument (§4.8).
pub fn car(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let expr = arg(interp, tail, 0, "car")?;
    let v = eval(interp, env, expr)?;
    interp.heap.car(v).ok_or_else(|| {
        EvalError::Type {
            form: "car".to_string(),
            expected: "cell".to_string(),
        }
        .into()
    })
}

/// `(cdr p)` — errors on a non-Cell argument (§4.8).
pub fn cdr(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let expr = arg(interp, tail, 0, "cdr")?;
    let v = eval(interp, env, expr)?;
    interp.heap.cdr(v).ok_or_else(|| {
        EvalError::Type {
            form: "cdr".to_string(),
            expected: "cell".to_string(),
        }
        .into()
    })
}

/// `(set-car! p v)` — mutates the pair's head in place. Returns Nil.
pub fn set_car(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let p_expr = arg(interp, tail, 0, "set-car!")?;
    let v_expr = arg(interp, tail, 1, "set-car!")?;
    let p = eval(interp, env, p_expr)?;
    let p_h = interp.heap.root(p);
    let v = eval(interp, env, v_expr)?;
    let p = interp.heap.get_root(p_h);
    if !interp.heap.set_car(p, v) {
        return Err(EvalError::Type {
            form: "set-car!".to_string(),
            expected: "cell".to_string(),
        }
        .into());
    }
    Ok(Value::Nil)
}

/// `(list e1 e2 … en)` — a variadic list constructor (§4.8 SUPPLEMENT),
/// used by the `{…}` alist desugaring and `read-sexp`'s multi-expression
/// wrap.
pub fn list(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let items = eval_list(interp, env, tail)?;
    Ok(interp.heap.vec_to_list(&items)?)
}

/// `(nil? v)` — Nil iff `v` is not Nil, True iff it is.
pub fn nil_pred(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let expr = arg(interp, tail, 0, "nil?")?;
    let v = eval(interp, env, expr)?;
    Ok(if matches!(v, Value::Nil) { Value::True } else { Value::Nil })
}

/// `(not v)` — the falsiness test (§4.7: "everything non-Nil is truthy").
pub fn not(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let expr = arg(interp, tail, 0, "not")?;
    let v = eval(interp, env, expr)?;
    Ok(if v.is_truthy() { Value::Nil } else { Value::True })
}
