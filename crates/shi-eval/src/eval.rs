//! The evaluator core (§4.7): `eval`, apply-form dispatch, macro
//! expansion, and closure application (including partial application,
//! §3.4/§8).
//!
//! Every function here that holds a `Value` across a call which might
//! itself allocate (and so might trigger a GC cycle) roots that value
//! through a [`shi_gc::Handle`] first and re-reads it afterward, per the
//! handle discipline of §4.2/§9. Read-only heap accessors (`car`, `cdr`,
//! `obj_find`, …) never allocate and need no such care.

use crate::env::{bind_params, env_get, env_set, formal_arity, set_existing};
use crate::interpreter::Interpreter;
use crate::primitives;
use shi_gc::{is_valid_key, Value};
use shi_util::error::{EvalError, EvalOutcome, EvalResult};

/// Evaluates `expr` in `env`, per the evaluation table of §4.7.
pub fn eval(interp: &mut Interpreter, env: Value, expr: Value) -> EvalResult<Value> {
    match expr {
        Value::Cell(_) => apply_form(interp, env, expr),
        Value::Symbol(_) => eval_symbol(interp, env, expr),
        other => Ok(other),
    }
}

fn eval_symbol(interp: &mut Interpreter, env: Value, sym: Value) -> EvalResult<Value> {
    if sym == interp.star_env_sym() {
        return Ok(env);
    }
    env_get(&interp.heap, env, sym)
        .ok_or_else(|| EvalError::Unbound(interp.symbol_display(sym)).into())
}

/// Applies the head of a Cell `(head . tail)`, expanding macros first
/// (§4.7 apply-form steps 1–4).
fn apply_form(interp: &mut Interpreter, env: Value, form: Value) -> EvalResult<Value> {
    let head = interp.heap.car(form).expect("apply_form called on a Cell");
    let tail = interp.heap.cdr(form).expect("apply_form called on a Cell");

    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let tail_h = interp.heap.root(tail);
    let result = (|| -> EvalResult<Value> {
        if let Some(macro_val) = resolve_macro(interp, env, head) {
            let tail = interp.heap.get_root(tail_h);
            let expanded = apply_macro(interp, macro_val, tail)?;
            let env = interp.heap.get_root(env_h);
            return eval(interp, env, expanded);
        }

        let env = interp.heap.get_root(env_h);
        let func = eval(interp, env, head)?;
        let tail = interp.heap.get_root(tail_h);
        let env = interp.heap.get_root(env_h);
        apply_value(interp, env, func, tail)
    })();
    interp.heap.exit_frame();
    result
}

/// If `head` names a Macro (either directly, or by a Symbol bound to one
/// in `env`), returns it. Resolution is read-only (`env_get`/`obj_find`
/// never allocate), so `head` never needs to survive a collection here.
fn resolve_macro(interp: &Interpreter, env: Value, head: Value) -> Option<Value> {
    match head {
        Value::Macro(_) => Some(head),
        Value::Symbol(_) => match env_get(&interp.heap, env, head) {
            Some(v @ Value::Macro(_)) => Some(v),
            _ => None,
        },
        _ => None,
    }
}

/// Applies `macro_val` to the unevaluated `tail`, returning the expanded
/// form (still unevaluated — the caller evaluates it in its own
/// environment, per §4.7 step 1).
pub fn apply_macro(interp: &mut Interpreter, macro_val: Value, tail: Value) -> EvalResult<Value> {
    let (params, body, menv) = interp
        .heap
        .closure_fields(macro_val)
        .expect("resolve_macro only returns Macro values");

    let (required, has_rest) = formal_arity(&interp.heap, params);
    let actual = interp.heap.list_length(tail);
    if actual < 0 {
        return Err(EvalError::Type {
            form: "macro call".to_string(),
            expected: "proper argument list".to_string(),
        }
        .into());
    }
    let actual = actual as usize;
    check_arity("macro", required, has_rest, actual)?;

    interp.heap.enter_frame();
    let result = (|| -> EvalResult<Value> {
        let args = interp
            .heap
            .list_to_vec(tail)
            .expect("arity already validated tail is a proper list");
        let new_env = interp.heap.alloc_object(menv)?;
        let new_env_h = interp.heap.root(new_env);
        bind_params(&mut interp.heap, new_env, params, &args)?;
        let new_env = interp.heap.get_root(new_env_h);
        eval_seq(interp, new_env, body)
    })();
    interp.heap.exit_frame();
    result
}

/// Dispatches a single already-evaluated `func` against a raw (possibly
/// already-quoted) argument list, per §4.7 apply-form steps 2–4. Shared
/// by `apply_form`'s function-call path and the `apply` primitive, which
/// builds a synthetic `tail` of `(quote v)` forms so already-evaluated
/// values pass through unchanged regardless of their type.
pub fn apply_value(
    interp: &mut Interpreter,
    env: Value,
    func: Value,
    tail: Value,
) -> EvalResult<Value> {
    match func {
        Value::Primitive(id) => primitives::call(interp, id, env, tail),
        Value::Closure(_) => apply_closure(interp, env, func, tail),
        _ => Err(EvalError::NotCallable.into()),
    }
}

/// Evaluates the raw argument list `tail` left-to-right in the caller's
/// `env`, then applies `closure_val`, including partial application when
/// fewer actuals than formals are supplied (§3.4, §8).
pub fn apply_closure(
    interp: &mut Interpreter,
    env: Value,
    closure_val: Value,
    tail: Value,
) -> EvalResult<Value> {
    interp.heap.enter_frame();
    let closure_h = interp.heap.root(closure_val);
    let result = (|| -> EvalResult<Value> {
        let args = eval_list(interp, env, tail)?;
        let closure_val = interp.heap.get_root(closure_h);
        let (params, body, cenv) = interp
            .heap
            .closure_fields(closure_val)
            .expect("apply_closure called with a Closure");
        let (required, has_rest) = formal_arity(&interp.heap, params);

        if args.len() < required {
            return partial_apply_closure(interp, params, body, cenv, &args);
        }
        check_arity("closure", required, has_rest, args.len())?;

        let new_env = interp.heap.alloc_object(cenv)?;
        let new_env_h = interp.heap.root(new_env);
        bind_params(&mut interp.heap, new_env, params, &args)?;
        let new_env = interp.heap.get_root(new_env_h);
        eval_seq(interp, new_env, body)
    })();
    interp.heap.exit_frame();
    result
}

/// Builds the curried Closure produced when fewer actuals than formals
/// are supplied: a new environment with `proto = cenv` holding the
/// already-bound prefix, and a Closure over the remaining formal suffix
/// that closes over it (§3.4, §8's partial-application property).
fn partial_apply_closure(
    interp: &mut Interpreter,
    params: Value,
    body: Value,
    cenv: Value,
    args: &[Value],
) -> EvalResult<Value> {
    interp.heap.enter_frame();
    let body_h = interp.heap.root(body);
    let result = (|| -> EvalResult<Value> {
        let new_env = interp.heap.alloc_object(cenv)?;
        let new_env_h = interp.heap.root(new_env);
        let params_h = interp.heap.root(params);
        let value_hs: Vec<_> = args.iter().map(|&v| interp.heap.root(v)).collect();

        for &value_h in &value_hs {
            let cursor = interp.heap.get_root(params_h);
            let param = interp
                .heap
                .car(cursor)
                .expect("args.len() < required guarantees another formal remains");
            let new_env = interp.heap.get_root(new_env_h);
            let value = interp.heap.get_root(value_h);
            env_set(&mut interp.heap, new_env, param, value)?;
            let next = interp
                .heap
                .cdr(interp.heap.get_root(params_h))
                .expect("cell cdr");
            interp.heap.set_root(params_h, next);
        }

        let remaining_params = interp.heap.get_root(params_h);
        let new_env = interp.heap.get_root(new_env_h);
        let body = interp.heap.get_root(body_h);
        Ok(interp.heap.alloc_closure(remaining_params, body, new_env)?)
    })();
    interp.heap.exit_frame();
    result
}

fn check_arity(
    form: &str,
    required: usize,
    has_rest: bool,
    got: usize,
) -> Result<(), EvalOutcome> {
    if got < required || (!has_rest && got > required) {
        let expected = if has_rest {
            format!("at least {required}")
        } else {
            required.to_string()
        };
        return Err(EvalError::Arity {
            form: form.to_string(),
            expected,
            got,
        }
        .into());
    }
    Ok(())
}

/// Evaluates `tail` (a raw, unevaluated argument list) left-to-right in
/// `env`, returning the evaluated values. Every already-evaluated value
/// and the remaining spine must be re-read from a handle after each
/// recursive `eval` call, since that call may itself allocate.
pub fn eval_list(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Vec<Value>> {
    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let remaining_h = interp.heap.root(tail);
    let result = (|| -> EvalResult<Vec<Value>> {
        let mut value_handles = Vec::new();
        loop {
            let remaining = interp.heap.get_root(remaining_h);
            match remaining {
                Value::Nil => break,
                Value::Cell(_) => {
                    let item = interp.heap.car(remaining).expect("cell car");
                    let env = interp.heap.get_root(env_h);
                    let value = eval(interp, env, item)?;
                    value_handles.push(interp.heap.root(value));
                    let next = interp
                        .heap
                        .cdr(interp.heap.get_root(remaining_h))
                        .expect("cell cdr");
                    interp.heap.set_root(remaining_h, next);
                }
                _ => {
                    return Err(EvalError::Type {
                        form: "argument list".to_string(),
                        expected: "proper list".to_string(),
                    }
                    .into())
                }
            }
        }
        Ok(value_handles.iter().map(|&h| interp.heap.get_root(h)).collect())
    })();
    interp.heap.exit_frame();
    result
}

/// Evaluates a body (sequence of expressions), returning the last value,
/// or Nil for an empty body (`do`'s semantics, and closure/macro bodies,
/// §4.7).
pub fn eval_seq(interp: &mut Interpreter, env: Value, body: Value) -> EvalResult<Value> {
    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let remaining_h = interp.heap.root(body);
    let result = (|| -> EvalResult<Value> {
        let mut last = Value::Nil;
        loop {
            let remaining = interp.heap.get_root(remaining_h);
            match remaining {
                Value::Nil => break,
                Value::Cell(_) => {
                    let item = interp.heap.car(remaining).expect("cell car");
                    let env = interp.heap.get_root(env_h);
                    last = eval(interp, env, item)?;
                    let next = interp
                        .heap
                        .cdr(interp.heap.get_root(remaining_h))
                        .expect("cell cdr");
                    interp.heap.set_root(remaining_h, next);
                }
                _ => {
                    return Err(EvalError::Type {
                        form: "body".to_string(),
                        expected: "proper list".to_string(),
                    }
                    .into())
                }
            }
        }
        Ok(last)
    })();
    interp.heap.exit_frame();
    result
}

/// `set`'s target-resolution: a bare Symbol mutates the nearest enclosing
/// binding; `(: obj key)` mutates a property directly (§4.6).
pub fn eval_set_target(
    interp: &mut Interpreter,
    env: Value,
    target: Value,
    value: Value,
) -> EvalResult<()> {
    match target {
        Value::Symbol(_) => Ok(set_existing(&mut interp.heap, env, target, value)?),
        Value::Cell(_) => {
            let head = interp.heap.car(target);
            let colon_sym = interp.heap.intern(b":")?;
            if head != Some(colon_sym) {
                return Err(EvalError::Type {
                    form: "set".to_string(),
                    expected: "symbol or (: obj key)".to_string(),
                }
                .into());
            }
            let rest = interp.heap.cdr(target).expect("cell cdr");
            interp.heap.enter_frame();
            let rest_h = interp.heap.root(rest);
            let value_h = interp.heap.root(value);
            let env_h = interp.heap.root(env);
            let result = (|| -> EvalResult<()> {
                let rest = interp.heap.get_root(rest_h);
                let obj_expr = interp.heap.car(rest).expect("cell car");
                let env = interp.heap.get_root(env_h);
                let obj = eval(interp, env, obj_expr)?;
                let obj_h = interp.heap.root(obj);
                // obj eval may have collected; re-derive key_expr from
                // rest_h rather than reuse a value read before it.
                let rest = interp.heap.get_root(rest_h);
                let key_expr = interp
                    .heap
                    .car(interp.heap.cdr(rest).expect("cell cdr"))
                    .expect("cell car");
                let env = interp.heap.get_root(env_h);
                let key = eval(interp, env, key_expr)?;
                if !is_valid_key(&key) {
                    return Err(EvalError::Type {
                        form: "set".to_string(),
                        expected: "symbol, string, or integer key".to_string(),
                    }
                    .into());
                }
                let obj = interp.heap.get_root(obj_h);
                let value = interp.heap.get_root(value_h);
                interp.heap.obj_set(obj, key, value)?;
                Ok(())
            })();
            interp.heap.exit_frame();
            result
        }
        _ => Err(EvalError::Type {
            form: "set".to_string(),
            expected: "symbol or (: obj key)".to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpreterConfig;

    fn interp() -> Interpreter {
        Interpreter::new(InterpreterConfig::default()).unwrap()
    }

    fn eval_str(interp: &mut Interpreter, src: &str) -> Value {
        interp.eval_source(src).unwrap()
    }

    #[test]
    fn arithmetic_adds_left_to_right() {
        let mut i = interp();
        assert_eq!(eval_str(&mut i, "(+ 1 2 3)"), Value::Integer(6));
    }

    #[test]
    fn factorial_via_user_defined_multiply() {
        let mut i = interp();
        eval_str(
            &mut i,
            "(def * (fn (a b) (if (= b 0) 0 (+ a (* a (- b 1))))))",
        );
        eval_str(
            &mut i,
            "(def fact (fn (n) (if (< n 2) 1 (* n (fact (- n 1))))))",
        );
        assert_eq!(eval_str(&mut i, "(fact 5)"), Value::Integer(120));
    }

    #[test]
    fn list_and_cons_access() {
        let mut i = interp();
        let result = eval_str(&mut i, "(do (def l (list 1 2 3)) (car (cdr l)))");
        assert_eq!(result, Value::Integer(2));
    }

    #[test]
    fn trap_error_rescues_and_binds_message() {
        let mut i = interp();
        let result = eval_str(&mut i, r#"(trap-error (fn () (error "boom")) (fn (m) m))"#);
        assert_eq!(i.heap.string_bytes(result), Some(&b"boom"[..]));
    }

    #[test]
    fn object_set_then_get_round_trips() {
        let mut i = interp();
        eval_str(&mut i, "(def o (obj nil (list (cons 'x 1))))");
        eval_str(&mut i, "(obj-set o 'x 42)");
        assert_eq!(eval_str(&mut i, "(obj-get o 'x)"), Value::Integer(42));
    }

    #[test]
    fn partial_application_matches_full_application() {
        let mut i = interp();
        eval_str(&mut i, "(def add3 (fn (a b c) (+ a b c)))");
        eval_str(&mut i, "(def g (add3 1 2))");
        let partial = eval_str(&mut i, "(g 3)");
        let full = eval_str(&mut i, "(add3 1 2 3)");
        assert_eq!(partial, full);
    }

    #[test]
    fn unbound_symbol_is_an_error() {
        let mut i = interp();
        assert!(i.eval_source("totally-unbound-name").is_err());
    }

    fn always_gc_interp() -> Interpreter {
        let mut config = InterpreterConfig::default();
        config.gc.always_gc = true;
        Interpreter::new(config).unwrap()
    }

    #[test]
    fn multi_form_program_sees_earlier_defs_under_always_gc() {
        let mut i = always_gc_interp();
        assert_eq!(eval_str(&mut i, "(def x 1) x"), Value::Integer(1));
    }

    #[test]
    fn if_then_arm_survives_an_allocating_condition_under_always_gc() {
        let mut i = always_gc_interp();
        let result = eval_str(&mut i, "(if (cons 1 2) (list 3))");
        assert_eq!(i.heap.list_to_vec(result), Some(vec![Value::Integer(3)]));
    }

    #[test]
    fn set_object_key_survives_an_allocating_target_expr_under_always_gc() {
        let mut i = always_gc_interp();
        eval_str(&mut i, "(def k 'x)");
        eval_str(&mut i, "(def a (obj nil nil))");
        eval_str(&mut i, "(set (: (do (cons 1 2) a) k) 42)");
        assert_eq!(eval_str(&mut i, "(obj-get a 'x)"), Value::Integer(42));
    }
}
