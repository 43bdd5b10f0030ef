//! Special forms (§4.7) and the handful of §4.8 primitives (`type`, `eq?`,
//! `pr-str`, `read-sexp`, `sym`, `macro-expand`, `gensym`, `:`) that also
//! need unevaluated access to their own arguments.

use crate::env::{env_set, topmost_env};
use crate::eval::{apply_value, eval, eval_seq, eval_set_target};
use crate::interpreter::Interpreter;
use crate::primitives::nth_raw;
use shi_gc::Value;
use shi_util::error::{EvalError, EvalResult};

/// `(quote v)` — returns its argument unevaluated.
pub fn quote(interp: &mut Interpreter, _env: Value, tail: Value) -> EvalResult<Value> {
    Ok(interp.heap.car(tail).unwrap_or(Value::Nil))
}

/// `(if c1 t1 c2 t2 … else?)` (§4.7): test each `ci` in turn; on the first
/// truthy one return `ti`; if only a trailing odd arm remains, return it
/// unconditionally; otherwise Nil.
pub fn if_form(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let remaining_h = interp.heap.root(tail);
    let result = (|| -> EvalResult<Value> {
        loop {
            let remaining = interp.heap.get_root(remaining_h);
            match remaining {
                Value::Nil => return Ok(Value::Nil),
                Value::Cell(_) => {
                    let rest = interp.heap.cdr(remaining).expect("cell cdr");
                    match rest {
                        Value::Nil => {
                            // a lone trailing arm is the unconditional `else`
                            let cond_expr = interp.heap.car(remaining).expect("cell car");
                            let env = interp.heap.get_root(env_h);
                            return eval(interp, env, cond_expr);
                        }
                        Value::Cell(_) => {
                            let cond_expr = interp.heap.car(remaining).expect("cell car");
                            let env = interp.heap.get_root(env_h);
                            let cond_val = eval(interp, env, cond_expr)?;
                            if cond_val.is_truthy() {
                                // cond eval may have collected; re-derive the
                                // then-arm from remaining_h rather than reuse
                                // the stale `rest`/`then_expr` read before it.
                                let remaining = interp.heap.get_root(remaining_h);
                                let rest = interp.heap.cdr(remaining).expect("cell cdr");
                                let then_expr = interp.heap.car(rest).expect("cell car");
                                let env = interp.heap.get_root(env_h);
                                return eval(interp, env, then_expr);
                            }
                            let next = interp.heap.cdr(interp.heap.get_root(remaining_h)).expect("cell cdr");
                            let next = interp.heap.cdr(next).expect("cell cdr");
                            interp.heap.set_root(remaining_h, next);
                        }
                        _ => {
                            return Err(EvalError::Type {
                                form: "if".to_string(),
                                expected: "proper clause list".to_string(),
                            }
                            .into())
                        }
                    }
                }
                _ => {
                    return Err(EvalError::Type {
                        form: "if".to_string(),
                        expected: "proper clause list".to_string(),
                    }
                    .into())
                }
            }
        }
    })();
    interp.heap.exit_frame();
    result
}

/// `(do e1 e2 … en)` — evaluates in sequence, returning the last value (Nil
/// if empty).
pub fn do_form(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    eval_seq(interp, env, tail)
}

/// `(while cond body…)` — re-evaluates `cond`; while truthy, evaluates
/// `body` as a sequence; always returns Nil.
pub fn while_form(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let cond_h = interp.heap.root(interp.heap.car(tail).unwrap_or(Value::Nil));
    let body_h = interp.heap.root(interp.heap.cdr(tail).unwrap_or(Value::Nil));
    let result = (|| -> EvalResult<Value> {
        loop {
            let cond_expr = interp.heap.get_root(cond_h);
            let env = interp.heap.get_root(env_h);
            let cond_val = eval(interp, env, cond_expr)?;
            if !cond_val.is_truthy() {
                break;
            }
            let body = interp.heap.get_root(body_h);
            let env = interp.heap.get_root(env_h);
            eval_seq(interp, env, body)?;
        }
        Ok(Value::Nil)
    })();
    interp.heap.exit_frame();
    result
}

/// `(def name expr)` — binds `name` in the innermost (current) environment.
pub fn def(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    def_in(interp, env, tail, |_h, e| e)
}

/// `(def-global name expr)` — binds `name` in the topmost environment.
pub fn def_global(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    def_in(interp, env, tail, |h, e| topmost_env(h, e))
}

fn def_in(
    interp: &mut Interpreter,
    env: Value,
    tail: Value,
    target_env: impl FnOnce(&shi_gc::Heap, Value) -> Value,
) -> EvalResult<Value> {
    let name = nth_raw(&interp.heap, tail, 0).ok_or_else(|| EvalError::Arity {
        form: "def".to_string(),
        expected: "2".to_string(),
        got: 0,
    })?;
    let value_expr = nth_raw(&interp.heap, tail, 1).ok_or_else(|| EvalError::Arity {
        form: "def".to_string(),
        expected: "2".to_string(),
        got: 1,
    })?;

    interp.heap.enter_frame();
    let name_h = interp.heap.root(name);
    let env_h = interp.heap.root(env);
    let result = (|| -> EvalResult<Value> {
        let value = eval(interp, env, value_expr)?;
        let name = interp.heap.get_root(name_h);
        let env = interp.heap.get_root(env_h);
        let target = target_env(&interp.heap, env);
        env_set(&mut interp.heap, target, name, value)?;
        Ok(Value::Nil)
    })();
    interp.heap.exit_frame();
    result
}

/// `(set target expr)` — `target` is either a bare Symbol or `(: obj key)`
/// (the reader's expansion of `obj:key`), per §4.6.
pub fn set(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let target = nth_raw(&interp.heap, tail, 0).ok_or_else(|| EvalError::Arity {
        form: "set".to_string(),
        expected: "2".to_string(),
        got: 0,
    })?;
    let value_expr = nth_raw(&interp.heap, tail, 1).ok_or_else(|| EvalError::Arity {
        form: "set".to_string(),
        expected: "2".to_string(),
        got: 1,
    })?;

    interp.heap.enter_frame();
    let target_h = interp.heap.root(target);
    let result = (|| -> EvalResult<Value> {
        let value = eval(interp, env, value_expr)?;
        let target = interp.heap.get_root(target_h);
        eval_set_target(interp, env, target, value)?;
        Ok(Value::Nil)
    })();
    interp.heap.exit_frame();
    result
}

/// `(fn params body…)` — builds a Closure over the current environment.
pub fn fn_form(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let params = interp.heap.car(tail).unwrap_or(Value::Nil);
    let body = interp.heap.cdr(tail).unwrap_or(Value::Nil);
    Ok(interp.heap.alloc_closure(params, body, env)?)
}

/// `(macro params body…)` — builds a Macro over the current environment.
pub fn macro_form(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let params = interp.heap.car(tail).unwrap_or(Value::Nil);
    let body = interp.heap.cdr(tail).unwrap_or(Value::Nil);
    Ok(interp.heap.alloc_macro(params, body, env)?)
}

/// `(eval form-expr [env-expr])` — evaluates `form-expr` to get a value,
/// then evaluates that value as a form, in `env-expr`'s value (if given and
/// truthy) or the caller's environment otherwise.
pub fn eval_form(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let form_expr = nth_raw(&interp.heap, tail, 0).ok_or_else(|| EvalError::Arity {
        form: "eval".to_string(),
        expected: "1 or 2".to_string(),
        got: 0,
    })?;
    let env_expr = nth_raw(&interp.heap, tail, 1);

    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let result = (|| -> EvalResult<Value> {
        let caller_env = interp.heap.get_root(env_h);
        let form_val = eval(interp, caller_env, form_expr)?;
        let form_h = interp.heap.root(form_val);

        let target_env = match env_expr {
            Some(e) => {
                let caller_env = interp.heap.get_root(env_h);
                let v = eval(interp, caller_env, e)?;
                if v.is_truthy() {
                    v
                } else {
                    interp.heap.get_root(env_h)
                }
            }
            None => interp.heap.get_root(env_h),
        };

        let form_val = interp.heap.get_root(form_h);
        eval(interp, target_env, form_val)
    })();
    interp.heap.exit_frame();
    result
}

/// `(apply f args)` — `args` evaluates to an already-built proper list of
/// values; `f` is applied to them without re-evaluating any element. Since
/// every primitive/closure in this evaluator receives a raw (unevaluated)
/// tail and decides internally what to evaluate, each value is wrapped in a
/// synthetic `(quote v)` pair so the callee's own evaluation step yields it
/// back unchanged (§9: reusing the uniform dispatch path for already-
/// evaluated arguments).
pub fn apply_form(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let func_expr = nth_raw(&interp.heap, tail, 0).ok_or_else(|| EvalError::Arity {
        form: "apply".to_string(),
        expected: "2".to_string(),
        got: 0,
    })?;
    let args_expr = nth_raw(&interp.heap, tail, 1).ok_or_else(|| EvalError::Arity {
        form: "apply".to_string(),
        expected: "2".to_string(),
        got: 1,
    })?;

    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let result = (|| -> EvalResult<Value> {
        let func = eval(interp, env, func_expr)?;
        let func_h = interp.heap.root(func);
        let env2 = interp.heap.get_root(env_h);
        let args_list = eval(interp, env2, args_expr)?;
        let items = interp.heap.list_to_vec(args_list).ok_or_else(|| EvalError::Type {
            form: "apply".to_string(),
            expected: "proper list".to_string(),
        })?;

        let quote_sym = interp.quote_sym();
        let quote_h = interp.heap.root(quote_sym);
        let item_hs = crate::primitives::root_all(&mut interp.heap, &items);

        let mut synthetic = Value::Nil;
        for &item_h in item_hs.iter().rev() {
            let item = interp.heap.get_root(item_h);
            let quote_sym = interp.heap.get_root(quote_h);
            let inner = interp.heap.cons(item, Value::Nil)?;
            let quoted = interp.heap.cons(quote_sym, inner)?;
            synthetic = interp.heap.cons(quoted, synthetic)?;
        }

        let func = interp.heap.get_root(func_h);
        let env = interp.heap.get_root(env_h);
        apply_value(interp, env, func, synthetic)
    })();
    interp.heap.exit_frame();
    result
}

/// `(trap-error thunk-expr handler-expr)` (§4.7): evaluates both expressions
/// to get a zero-arg thunk and a one-arg handler, enters a rescue frame,
/// calls the thunk; on a catchable error, calls the handler with the error
/// message as a String.
pub fn trap_error(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let thunk_expr = nth_raw(&interp.heap, tail, 0).ok_or_else(|| EvalError::Arity {
        form: "trap-error".to_string(),
        expected: "2".to_string(),
        got: 0,
    })?;
    let handler_expr = nth_raw(&interp.heap, tail, 1).ok_or_else(|| EvalError::Arity {
        form: "trap-error".to_string(),
        expected: "2".to_string(),
        got: 1,
    })?;

    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let result = (|| -> EvalResult<Value> {
        let thunk = eval(interp, env, thunk_expr)?;
        let thunk_h = interp.heap.root(thunk);
        let env2 = interp.heap.get_root(env_h);
        let handler = eval(interp, env2, handler_expr)?;
        let handler_h = interp.heap.root(handler);

        interp.rescue.enter(interp.config.max_rescue_depth)?;
        let thunk = interp.heap.get_root(thunk_h);
        let env3 = interp.heap.get_root(env_h);
        let outcome = apply_value(interp, env3, thunk, Value::Nil);
        interp.rescue.exit();

        match outcome {
            Ok(v) => Ok(v),
            Err(shi_util::error::EvalOutcome::Fatal(f)) => Err(f.into()),
            Err(shi_util::error::EvalOutcome::Error(e)) => {
                let msg = interp.heap.alloc_string(e.to_string().into_bytes())?;
                let msg_h = interp.heap.root(msg);
                let quote_sym = interp.quote_sym();
                let quote_h = interp.heap.root(quote_sym);

                let msg = interp.heap.get_root(msg_h);
                let quote_sym = interp.heap.get_root(quote_h);
                let inner = interp.heap.cons(msg, Value::Nil)?;
                let quoted = interp.heap.cons(quote_sym, inner)?;
                let synthetic = interp.heap.cons(quoted, Value::Nil)?;

                let handler = interp.heap.get_root(handler_h);
                let env4 = interp.heap.get_root(env_h);
                apply_value(interp, env4, handler, synthetic)
            }
        }
    })();
    interp.heap.exit_frame();
    result
}

/// `(type v)` — the Symbol naming `v`'s tag.
pub fn type_of(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let expr = nth_raw(&interp.heap, tail, 0).unwrap_or(Value::Nil);
    let v = eval(interp, env, expr)?;
    Ok(interp.heap.intern(v.type_name().as_bytes())?)
}

/// `(eq? a b)` — identity for heap references, byte equality for Strings
/// (§3.1/§8 "Symbol identity").
pub fn eq_pred(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let a_expr = nth_raw(&interp.heap, tail, 0).unwrap_or(Value::Nil);
    let b_expr = nth_raw(&interp.heap, tail, 1).unwrap_or(Value::Nil);
    let a = eval(interp, env, a_expr)?;
    let a_h = interp.heap.root(a);
    let b = eval(interp, env, b_expr)?;
    let a = interp.heap.get_root(a_h);
    Ok(if interp.heap.key_eq(a, b) { Value::True } else { Value::Nil })
}

/// `(pr-str v)` — the printed representation of `v`, as a String.
pub fn pr_str(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let expr = nth_raw(&interp.heap, tail, 0).unwrap_or(Value::Nil);
    let v = eval(interp, env, expr)?;
    let printed = interp.heap.print_value(v);
    Ok(interp.heap.alloc_string(printed.into_bytes())?)
}

/// `(read-sexp str)` (§4.7): parses `str`; 0 expressions → Nil, 1 → itself,
/// 2+ → wrapped in `(do …)`.
pub fn read_sexp(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let expr = nth_raw(&interp.heap, tail, 0).unwrap_or(Value::Nil);
    let s = eval(interp, env, expr)?;
    let bytes = interp
        .heap
        .string_bytes(s)
        .ok_or_else(|| EvalError::Type {
            form: "read-sexp".to_string(),
            expected: "string".to_string(),
        })?
        .to_vec();

    // Successive `next_expr` calls can each allocate and trigger a
    // collection, so every form already read must stay rooted, not sit in
    // a plain `Vec<Value>`, until it is actually consed into the result
    // below (same discipline as `shi-reader`'s own list-building).
    interp.heap.enter_frame();
    let result = (|| -> EvalResult<Value> {
        let mut form_handles = Vec::new();
        {
            let mut reader = shi_reader::Reader::new(&mut interp.heap, &bytes);
            loop {
                match reader.next_expr() {
                    Ok(Some(form)) => {
                        let h = reader.heap_mut().root(form);
                        form_handles.push(h);
                    }
                    Ok(None) => break,
                    Err(e) => return Err(EvalError::User(e.to_string()).into()),
                }
            }
        }

        match form_handles.len() {
            0 => Ok(Value::Nil),
            1 => Ok(interp.heap.get_root(form_handles[0])),
            _ => {
                let do_sym = interp.heap.intern(b"do")?;
                let do_h = interp.heap.root(do_sym);
                let forms: Vec<Value> =
                    form_handles.iter().map(|&h| interp.heap.get_root(h)).collect();
                let mut list = interp.heap.vec_to_list(&forms)?;
                let do_sym = interp.heap.get_root(do_h);
                list = interp.heap.cons(do_sym, list)?;
                Ok(list)
            }
        }
    })();
    interp.heap.exit_frame();
    result
}

/// `(sym name)` — interns `name` (a String) as a Symbol.
pub fn sym(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let expr = nth_raw(&interp.heap, tail, 0).unwrap_or(Value::Nil);
    let s = eval(interp, env, expr)?;
    let bytes = interp
        .heap
        .string_bytes(s)
        .ok_or_else(|| EvalError::Type {
            form: "sym".to_string(),
            expected: "string".to_string(),
        })?
        .to_vec();
    Ok(interp.heap.intern(&bytes)?)
}

/// `(macro-expand form-expr)` — a single macro-expansion step (not
/// followed by evaluation of the result), for inspecting what a macro call
/// would expand to.
pub fn macro_expand(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let form_expr = nth_raw(&interp.heap, tail, 0).unwrap_or(Value::Nil);
    let form = eval(interp, env, form_expr)?;
    let head = interp.heap.car(form).ok_or_else(|| EvalError::Type {
        form: "macro-expand".to_string(),
        expected: "a macro call form".to_string(),
    })?;
    let macro_val = match head {
        Value::Macro(_) => head,
        Value::Symbol(_) => match crate::env::env_get(&interp.heap, env, head) {
            Some(v @ Value::Macro(_)) => v,
            _ => {
                return Err(EvalError::Type {
                    form: "macro-expand".to_string(),
                    expected: "a macro call form".to_string(),
                }
                .into())
            }
        },
        _ => {
            return Err(EvalError::Type {
                form: "macro-expand".to_string(),
                expected: "a macro call form".to_string(),
            }
            .into())
        }
    };
    let tail = interp.heap.cdr(form).unwrap_or(Value::Nil);
    crate::eval::apply_macro(interp, macro_val, tail)
}

/// `(gensym)` — a Symbol guaranteed distinct from any interned or
/// previously generated Symbol.
pub fn gensym(interp: &mut Interpreter, _env: Value, _tail: Value) -> EvalResult<Value> {
    Ok(interp.gensym()?)
}

/// `(: obj key)` — the reader's expansion of `obj:key`; a prototype-walking
/// lookup (`obj-find`), erroring ("unbound") if not found anywhere in the
/// chain, matching a bare-symbol lookup's failure mode.
pub fn colon_find(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let obj_expr = nth_raw(&interp.heap, tail, 0).ok_or_else(|| EvalError::Arity {
        form: ":".to_string(),
        expected: "2".to_string(),
        got: 0,
    })?;
    let key_expr = nth_raw(&interp.heap, tail, 1).ok_or_else(|| EvalError::Arity {
        form: ":".to_string(),
        expected: "2".to_string(),
        got: 1,
    })?;

    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let result = (|| -> EvalResult<Value> {
        let obj = eval(interp, env, obj_expr)?;
        let obj_h = interp.heap.root(obj);
        let env = interp.heap.get_root(env_h);
        let key = eval(interp, env, key_expr)?;
        let obj = interp.heap.get_root(obj_h);
        interp
            .heap
            .obj_find(obj, key)
            .ok_or_else(|| EvalError::Unbound(interp.heap.print_value(key)).into())
    })();
    interp.heap.exit_frame();
    result
}
