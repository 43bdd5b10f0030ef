//! String primitives (§4.8): `str` concatenation and `str-len`. `pr-str` is
//! defined in `special.rs` since §4.7 groups it with the other
//! introspection forms.

use crate::eval::eval_list;
use crate::interpreter::Interpreter;
use shi_gc::Value;
use shi_util::error::{EvalError, EvalResult};

/// `(str s1 s2 … sk)` — concatenates its (all-String) arguments.
pub fn str_concat(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let mut bytes = Vec::new();
    for v in &args {
        let piece = interp.heap.string_bytes(*v).ok_or_else(|| EvalError::Type {
            form: "str".to_string(),
            expected: "string".to_string(),
        })?;
        bytes.extend_from_slice(piece);
    }
    Ok(interp.heap.alloc_string(bytes)?)
}

/// `(str-len s)` — byte length.
pub fn str_len(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let s = *args.first().ok_or_else(|| EvalError::Arity {
        form: "str-len".to_string(),
        expected: "1".to_string(),
        got: 0,
    })?;
    let bytes = interp.heap.string_bytes(s).ok_or_else(|| EvalError::Type {
        form: "str-len".to_string(),
        expected: "string".to_string(),
    })?;
    Ok(Value::Integer(bytes.len() as i64))
}
