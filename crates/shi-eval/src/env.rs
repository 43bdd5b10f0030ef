//! The environment model (§4.6): an Environment is "just" an
//! [`shi_gc::object`] Object, so all of this is a thin, named layer over
//! the prototype-chained property table — grounded algorithmically on
//! `faxc-sem::scope::ScopeTree::resolve`'s parent-walk loop, adapted onto a
//! single first-class `Object` rather than a separate `Rib` type (see
//! `DESIGN.md`).

use shi_gc::{Heap, Value};
use shi_util::error::{EvalError, RuntimeError};

/// `env_get`: a prototype-chain lookup, per §4.6. Unlike `obj-get`, this is
/// the walking lookup (`obj-find`'s semantics) since an unqualified symbol
/// reference must see enclosing scopes.
pub fn env_get(heap: &Heap, env: Value, sym: Value) -> Option<Value> {
    heap.obj_find(env, sym)
}

/// `env_set`: writes directly on `env` itself (the innermost frame),
/// never walking the prototype chain. This is what `def` and parameter
/// binding use.
pub fn env_set(heap: &mut Heap, env: Value, sym: Value, val: Value) -> Result<(), RuntimeError> {
    heap.obj_set(env, sym, val)
}

/// Finds the Environment object in `env`'s prototype chain that owns a
/// binding for `sym` directly (i.e. the frame `set` on a bare symbol must
/// mutate), or `None` if `sym` is unbound anywhere in the chain.
pub fn find_owning_env(heap: &Heap, env: Value, sym: Value) -> Option<Value> {
    let mut cursor = env;
    loop {
        match cursor {
            Value::Object(_) => {
                if heap.obj_get(cursor, sym).is_some() {
                    return Some(cursor);
                }
                cursor = heap.object_proto(cursor)?;
            }
            _ => return None,
        }
    }
}

/// `def-global`: walks to the topmost Environment (the one whose `proto`
/// is `Nil`) and binds there, per §4.6.
pub fn topmost_env(heap: &Heap, env: Value) -> Value {
    let mut cursor = env;
    loop {
        match heap.object_proto(cursor) {
            Some(Value::Nil) | None => return cursor,
            Some(parent) => cursor = parent,
        }
    }
}

/// Mutates an existing binding for a bare symbol in the nearest enclosing
/// environment that defines it. Per §4.6, this is an error if `sym` is
/// unbound anywhere in the chain ("set on a bare Symbol ... error if
/// unbound").
pub fn set_existing(heap: &mut Heap, env: Value, sym: Value, val: Value) -> Result<(), EvalError> {
    match find_owning_env(heap, env, sym) {
        Some(owner) => {
            heap.obj_set(owner, sym, val)?;
            Ok(())
        }
        None => Err(EvalError::Unbound(symbol_display(heap, sym))),
    }
}

fn symbol_display(heap: &Heap, sym: Value) -> String {
    match heap.symbol_name(sym) {
        Some(name) => String::from_utf8_lossy(name).into_owned(),
        None => heap.print_value(sym),
    }
}

/// Counts the required (non-rest) formals in a parameter list, and whether
/// it ends in a dotted rest-arg or lone variadic symbol, per §4.6/§3.4:
///
/// - a lone `Symbol` binds the whole actuals list (variadic, `required =
///   0`, `has_rest = true`);
/// - a proper list of Symbols has `required` equal to its length and no
///   rest;
/// - a list ending in a dotted Symbol tail has `required` equal to the
///   number of Cells before the tail, with `has_rest = true`.
pub fn formal_arity(heap: &Heap, params: Value) -> (usize, bool) {
    match params {
        Value::Symbol(_) => (0, true),
        _ => {
            let mut required = 0usize;
            let mut cursor = params;
            loop {
                match cursor {
                    Value::Nil => return (required, false),
                    Value::Cell(_) => {
                        required += 1;
                        cursor = heap.cdr(cursor).expect("cell cdr");
                    }
                    Value::Symbol(_) => return (required, true),
                    _ => return (required, false),
                }
            }
        }
    }
}

/// Binds `values` against `params` into `env` (already allocated with the
/// correct `proto`), per §4.6's `push_env` pairing rules. Callers must
/// ensure `values.len()` already satisfies `formal_arity`'s `required`
/// count (partial application is handled by the caller before this runs).
pub fn bind_params(
    heap: &mut Heap,
    env: Value,
    params: Value,
    values: &[Value],
) -> Result<(), RuntimeError> {
    match params {
        Value::Symbol(_) => {
            let list = heap.vec_to_list(values)?;
            env_set(heap, env, params, list)
        }
        // `env_set` may allocate (and so may trigger a collection) on each
        // iteration, so `cursor` and every remaining actual value must be
        // re-read through a root handle rather than held as a bare local —
        // otherwise a cycle triggered mid-loop would leave them pointing at
        // relocated addresses (§4.2 handle discipline).
        _ => heap.with_frame(|h| {
            let env_h = h.root(env);
            let cursor_h = h.root(params);
            let value_hs: Vec<_> = values.iter().map(|&v| h.root(v)).collect();
            let mut idx = 0usize;
            loop {
                let cursor = h.get_root(cursor_h);
                match cursor {
                    Value::Nil => break,
                    Value::Cell(_) => {
                        let param = h.car(cursor).expect("cell car");
                        let env = h.get_root(env_h);
                        let value = h.get_root(value_hs[idx]);
                        env_set(h, env, param, value)?;
                        idx += 1;
                        let next = h.cdr(h.get_root(cursor_h)).expect("cell cdr");
                        h.set_root(cursor_h, next);
                    }
                    Value::Symbol(_) => {
                        let rest_values: Vec<Value> =
                            value_hs[idx..].iter().map(|&hnd| h.get_root(hnd)).collect();
                        let rest = h.vec_to_list(&rest_values)?;
                        let env = h.get_root(env_h);
                        env_set(h, env, cursor, rest)?;
                        break;
                    }
                    _ => unreachable!("formal_arity already validated this shape"),
                }
            }
            Ok(())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shi_gc::GcConfig;

    #[test]
    fn env_get_walks_prototype_chain() {
        let mut heap = Heap::new(GcConfig::default());
        let parent = heap.alloc_object(Value::Nil).unwrap();
        let sym = heap.intern(b"x").unwrap();
        env_set(&mut heap, parent, sym, Value::Integer(7)).unwrap();
        let child = heap.alloc_object(parent).unwrap();
        assert_eq!(env_get(&heap, child, sym), Some(Value::Integer(7)));
    }

    #[test]
    fn def_creates_binding_only_in_innermost() {
        let mut heap = Heap::new(GcConfig::default());
        let parent = heap.alloc_object(Value::Nil).unwrap();
        let child = heap.alloc_object(parent).unwrap();
        let sym = heap.intern(b"x").unwrap();
        env_set(&mut heap, child, sym, Value::Integer(1)).unwrap();
        assert!(heap.obj_get(child, sym).is_some());
        assert!(heap.obj_get(parent, sym).is_none());
    }

    #[test]
    fn def_global_binds_in_topmost() {
        let mut heap = Heap::new(GcConfig::default());
        let top = heap.alloc_object(Value::Nil).unwrap();
        let mid = heap.alloc_object(top).unwrap();
        let leaf = heap.alloc_object(mid).unwrap();
        let sym = heap.intern(b"x").unwrap();
        let t = topmost_env(&heap, leaf);
        assert_eq!(t, top);
        env_set(&mut heap, t, sym, Value::Integer(9)).unwrap();
        assert_eq!(env_get(&heap, leaf, sym), Some(Value::Integer(9)));
    }

    #[test]
    fn set_existing_mutates_nearest_defining_frame() {
        let mut heap = Heap::new(GcConfig::default());
        let top = heap.alloc_object(Value::Nil).unwrap();
        let leaf = heap.alloc_object(top).unwrap();
        let sym = heap.intern(b"x").unwrap();
        env_set(&mut heap, top, sym, Value::Integer(1)).unwrap();
        set_existing(&mut heap, leaf, sym, Value::Integer(2)).unwrap();
        assert_eq!(heap.obj_get(top, sym), Some(Value::Integer(2)));
        assert!(heap.obj_get(leaf, sym).is_none());
    }

    #[test]
    fn set_existing_unbound_is_an_error() {
        let mut heap = Heap::new(GcConfig::default());
        let env = heap.alloc_object(Value::Nil).unwrap();
        let sym = heap.intern(b"missing").unwrap();
        assert!(matches!(
            set_existing(&mut heap, env, sym, Value::Nil),
            Err(EvalError::Unbound(_))
        ));
    }

    #[test]
    fn formal_arity_counts_dotted_rest() {
        let mut heap = Heap::new(GcConfig::default());
        let rest = heap.intern(b"rest").unwrap();
        let a = heap.intern(b"a").unwrap();
        let b = heap.intern(b"b").unwrap();
        let params = heap.cons(a, heap.cons(b, rest).unwrap()).unwrap();
        assert_eq!(formal_arity(&heap, params), (2, true));
    }

    #[test]
    fn bind_params_binds_variadic_symbol_to_whole_list() {
        let mut heap = Heap::new(GcConfig::default());
        let sym = heap.intern(b"args").unwrap();
        let env = heap.alloc_object(Value::Nil).unwrap();
        bind_params(&mut heap, env, sym, &[Value::Integer(1), Value::Integer(2)]).unwrap();
        let bound = heap.obj_get(env, sym).unwrap();
        assert_eq!(heap.list_length(bound), 2);
    }
}
