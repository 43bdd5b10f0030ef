//! Object primitives (§4.8): `obj`, `obj-get`, `obj-set`, `obj-del`,
//! `obj-proto`, `obj-proto-set!`, `obj->alist`.

use crate::eval::eval;
use crate::interpreter::Interpreter;
use crate::primitives::{nth_raw, root_all};
use shi_gc::{is_valid_key, Value};
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

/// Rejects a key outside {Symbol, String, Integer} (§3.3) as a catchable
/// type error rather than leaving it to `Heap::obj_set`'s `debug_assert`.
fn check_key(key: Value, form: &str) -> EvalResult<()> {
    if is_valid_key(&key) {
        Ok(())
    } else {
        Err(EvalError::Type {
            form: form.to_string(),
            expected: "symbol, string, or integer key".to_string(),
        }
        .into())
    }
}

/// `(obj proto props)` — `proto` is an Object or Nil; `props` is an alist
/// of `(Symbol . Value)` pairs, evaluated to build a fresh Object.
pub fn obj(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let proto_expr = arg(interp, tail, 0, "obj")?;
    let props_expr = arg(interp, tail, 1, "obj")?;

    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let result = (|| -> EvalResult<Value> {
        let proto = eval(interp, env, proto_expr)?;
        match proto {
            Value::Object(_) | Value::Nil => {}
            _ => {
                return Err(EvalError::Type {
                    form: "obj".to_string(),
                    expected: "object or nil proto".to_string(),
                }
                .into())
            }
        }
        let proto_h = interp.heap.root(proto);
        let env = interp.heap.get_root(env_h);
        let props = eval(interp, env, props_expr)?;
        let pairs = interp.heap.list_to_vec(props).ok_or_else(|| EvalError::Type {
            form: "obj".to_string(),
            expected: "proper alist".to_string(),
        })?;

        let proto = interp.heap.get_root(proto_h);
        let new_obj = interp.heap.alloc_object(proto)?;
        let new_obj_h = interp.heap.root(new_obj);
        let pair_hs = root_all(&mut interp.heap, &pairs);

        for &pair_h in &pair_hs {
            let pair = interp.heap.get_root(pair_h);
            let key = interp.heap.car(pair).ok_or_else(|| EvalError::Type {
                form: "obj".to_string(),
                expected: "(key . value) pairs".to_string(),
            })?;
            let value = interp.heap.cdr(pair).ok_or_else(|| EvalError::Type {
                form: "obj".to_string(),
                expected: "(key . value) pairs".to_string(),
            })?;
            check_key(key, "obj")?;
            let new_obj = interp.heap.get_root(new_obj_h);
            interp.heap.obj_set(new_obj, key, value)?;
        }

        Ok(interp.heap.get_root(new_obj_h))
    })();
    interp.heap.exit_frame();
    result
}

/// `(obj-get o k)` — own-table lookup, no prototype walk.
pub fn obj_get(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let o_expr = arg(interp, tail, 0, "obj-get")?;
    let k_expr = arg(interp, tail, 1, "obj-get")?;
    let o = eval(interp, env, o_expr)?;
    let o_h = interp.heap.root(o);
    let k = eval(interp, env, k_expr)?;
    let o = interp.heap.get_root(o_h);
    Ok(interp.heap.obj_get(o, k).unwrap_or(Value::Nil))
}

/// `(obj-set o k v)` — writes into `o`'s own table. Returns Nil.
pub fn obj_set(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let o_expr = arg(interp, tail, 0, "obj-set")?;
    let k_expr = arg(interp, tail, 1, "obj-set")?;
    let v_expr = arg(interp, tail, 2, "obj-set")?;

    interp.heap.enter_frame();
    let env_h = interp.heap.root(env);
    let result = (|| -> EvalResult<Value> {
        let o = eval(interp, env, o_expr)?;
        let o_h = interp.heap.root(o);
        let env = interp.heap.get_root(env_h);
        let k = eval(interp, env, k_expr)?;
        let k_h = interp.heap.root(k);
        let env = interp.heap.get_root(env_h);
        let v = eval(interp, env, v_expr)?;
        let o = interp.heap.get_root(o_h);
        let k = interp.heap.get_root(k_h);
        check_key(k, "obj-set")?;
        interp.heap.obj_set(o, k, v)?;
        Ok(Value::Nil)
    })();
    interp.heap.exit_frame();
    result
}

/// `(obj-del o k)` — removes `k` from `o`'s own table; returns True if a
/// binding existed, Nil otherwise (decided in DESIGN.md: accepts the same
/// Symbol/String/Integer key shapes `obj-get`/`obj-set` do).
pub fn obj_del(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let o_expr = arg(interp, tail, 0, "obj-del")?;
    let k_expr = arg(interp, tail, 1, "obj-del")?;
    let o = eval(interp, env, o_expr)?;
    let o_h = interp.heap.root(o);
    let k = eval(interp, env, k_expr)?;
    let o = interp.heap.get_root(o_h);
    check_key(k, "obj-del")?;
    Ok(if interp.heap.obj_del(o, k)? { Value::True } else { Value::Nil })
}

/// `(obj-proto o)` — the prototype link, or Nil.
pub fn obj_proto(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let o_expr = arg(interp, tail, 0, "obj-proto")?;
    let o = eval(interp, env, o_expr)?;
    interp.heap.object_proto(o).ok_or_else(|| {
        EvalError::Type {
            form: "obj-proto".to_string(),
            expected: "object".to_string(),
        }
        .into()
    })
}

/// `(obj-proto-set! o new-proto)` — mutates the prototype link. Returns Nil.
pub fn obj_proto_set(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let o_expr = arg(interp, tail, 0, "obj-proto-set!")?;
    let p_expr = arg(interp, tail, 1, "obj-proto-set!")?;
    let o = eval(interp, env, o_expr)?;
    let o_h = interp.heap.root(o);
    let p = eval(interp, env, p_expr)?;
    let o = interp.heap.get_root(o_h);
    if !interp.heap.set_object_proto(o, p) {
        return Err(EvalError::Type {
            form: "obj-proto-set!".to_string(),
            expected: "object".to_string(),
        }
        .into());
    }
    Ok(Value::Nil)
}

/// `(obj->alist o)` — every own-table `(key . value)` entry as a fresh
/// alist; bucket/within-bucket order is unspecified but stable (§4.8).
pub fn obj_to_alist(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let o_expr = arg(interp, tail, 0, "obj->alist")?;
    let o = eval(interp, env, o_expr)?;
    Ok(interp.heap.obj_to_alist(o)?)
}
