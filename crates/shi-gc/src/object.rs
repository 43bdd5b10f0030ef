//! The prototype-chained, hashed-bucket Object model (§3.3).
//!
//! An Environment is "just" an Object (§4.6), so this single representation
//! backs both user records and lexical scope frames — there is no separate
//! `Rib`/environment type the way `faxc-sem::scope::ScopeTree` keeps ribs
//! apart from ordinary values; the parent-chain walk here is grounded on
//! `ScopeTree::resolve`'s loop shape (follow `parent`/`proto` until `None`/
//! `Nil`), adapted onto a single `Object` tag.
//!
//! Each bucket is an association list of `(Key . Value)` cells, chained
//! through an outer spine of plain `Cell`s: `bucket = ((k1 . v1) (k2 . v2)
//! …)`. Bucket selection hashes the key's *printed* form with a Jenkins
//! one-at-a-time mix, matching §3.3's "hash over printable form" allowance.

use crate::heap::Heap;
use crate::value::{is_valid_key, Value};
use shi_util::error::RuntimeError;

fn jenkins_one_at_a_time(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0;
    for &b in bytes {
        hash = hash.wrapping_add(b as u64);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

impl Heap {
    /// Key equality per §3.1: Symbols by identity (their `Value` already
    /// encodes identity as an address, since they are interned), Strings by
    /// byte content (NOT address — two distinct heap strings with the same
    /// bytes are the same key), Integers by value. Also used directly by
    /// the `eq?` primitive, which follows the same rule for every variant.
    pub fn key_eq(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::String(_), Value::String(_)) => self.string_bytes(a) == self.string_bytes(b),
            _ => a == b,
        }
    }

    fn bucket_index(&self, key: Value) -> usize {
        let printed = self.print_value(key);
        (jenkins_one_at_a_time(printed.as_bytes()) % crate::heap::BUCKET_COUNT as u64) as usize
    }

    /// Looks up `key` in `obj`'s own bucket table only — no prototype walk.
    /// This is `obj-get`'s semantics (§4.8): direct access, not `:`.
    pub fn obj_get(&self, obj: Value, key: Value) -> Option<Value> {
        let idx = self.bucket_index(key);
        let mut entry_list = self.bucket(obj, idx)?;
        loop {
            match entry_list {
                Value::Nil => return None,
                Value::Cell(_) => {
                    let entry = self.car(entry_list).expect("bucket spine cell has a car");
                    let entry_key = self.car(entry).expect("alist entry has a key");
                    if self.key_eq(entry_key, key) {
                        return self.cdr(entry);
                    }
                    entry_list = self.cdr(entry_list).expect("bucket spine cell has a cdr");
                }
                _ => unreachable!("a bucket spine is always a proper list"),
            }
        }
    }

    /// Writes `key -> value` into `obj`'s own table, creating the entry if
    /// absent or overwriting it in place if present (§3.3 invariant: exactly
    /// one entry per key).
    pub fn obj_set(&mut self, obj: Value, key: Value, value: Value) -> Result<(), RuntimeError> {
        debug_assert!(is_valid_key(&key), "obj_set called with an invalid key");
        let idx = self.bucket_index(key);

        let mut entry_list = self.bucket(obj, idx).unwrap_or(Value::Nil);
        loop {
            match entry_list {
                Value::Nil => break,
                Value::Cell(_) => {
                    let entry = self.car(entry_list).expect("bucket spine cell has a car");
                    let entry_key = self.car(entry).expect("alist entry has a key");
                    if self.key_eq(entry_key, key) {
                        self.set_cdr(entry, value);
                        return Ok(());
                    }
                    entry_list = self.cdr(entry_list).expect("bucket spine cell has a cdr");
                }
                _ => unreachable!("a bucket spine is always a proper list"),
            }
        }

        self.with_frame(|h| {
            let obj_h = h.root(obj);
            let key_h = h.root(key);
            let value_h = h.root(value);
            let entry = h.cons(h.get_root(key_h), h.get_root(value_h))?;
            let entry_h = h.root(entry);
            let old_head = h.bucket(h.get_root(obj_h), idx).unwrap_or(Value::Nil);
            let old_head_h = h.root(old_head);
            let new_head = h.cons(h.get_root(entry_h), h.get_root(old_head_h))?;
            h.set_bucket(h.get_root(obj_h), idx, new_head);
            Ok(())
        })
    }

    /// Removes `key` from `obj`'s own table only, per §3.3's `del`
    /// invariant. Returns whether an entry was actually removed.
    pub fn obj_del(&mut self, obj: Value, key: Value) -> Result<bool, RuntimeError> {
        let idx = self.bucket_index(key);
        let Some(head) = self.bucket(obj, idx) else {
            return Ok(false);
        };

        let mut kept = Vec::new();
        let mut removed = false;
        let mut cursor = head;
        loop {
            match cursor {
                Value::Nil => break,
                Value::Cell(_) => {
                    let entry = self.car(cursor).expect("bucket spine cell has a car");
                    let entry_key = self.car(entry).expect("alist entry has a key");
                    if self.key_eq(entry_key, key) {
                        removed = true;
                    } else {
                        kept.push(entry);
                    }
                    cursor = self.cdr(cursor).expect("bucket spine cell has a cdr");
                }
                _ => unreachable!("a bucket spine is always a proper list"),
            }
        }

        if !removed {
            return Ok(false);
        }

        // Rebuilding the spine can allocate; root `obj` and every surviving
        // entry across the rebuild since a triggered GC may run mid-loop.
        // A failed `cons` (heap exhausted) propagates instead of panicking,
        // same as every other mutating Object operation.
        self.with_frame(|h| -> Result<(), RuntimeError> {
            let obj_h = h.root(obj);
            let entry_handles: Vec<_> = kept.into_iter().map(|e| h.root(e)).collect();
            let mut new_head = Value::Nil;
            for entry_h in entry_handles.into_iter().rev() {
                new_head = h.cons(h.get_root(entry_h), new_head)?;
            }
            h.set_bucket(h.get_root(obj_h), idx, new_head);
            Ok(())
        })?;
        Ok(true)
    }

    /// Walks the prototype chain starting at `obj`, returning the first
    /// value found via `obj_get` at each level. This is the `:` operator's
    /// semantics (`obj-find` in §4.8), distinct from the non-walking
    /// `obj-get`.
    pub fn obj_find(&self, obj: Value, key: Value) -> Option<Value> {
        let mut cursor = obj;
        loop {
            match cursor {
                Value::Object(_) => {
                    if let Some(v) = self.obj_get(cursor, key) {
                        return Some(v);
                    }
                    cursor = self.object_proto(cursor)?;
                }
                _ => return None,
            }
        }
    }

    /// Collects every `(key . value)` entry in `obj`'s own table (not its
    /// prototypes) into a fresh alist, for `obj->alist`. Bucket order, then
    /// within-bucket order, is unspecified but stable for a given object.
    pub fn obj_to_alist(&mut self, obj: Value) -> Result<Value, RuntimeError> {
        let mut entries = Vec::new();
        for idx in 0..crate::heap::BUCKET_COUNT {
            let Some(mut cursor) = self.bucket(obj, idx) else {
                continue;
            };
            loop {
                match cursor {
                    Value::Nil => break,
                    Value::Cell(_) => {
                        entries.push(self.car(cursor).expect("bucket spine cell has a car"));
                        cursor = self.cdr(cursor).expect("bucket spine cell has a cdr");
                    }
                    _ => unreachable!("a bucket spine is always a proper list"),
                }
            }
        }
        self.vec_to_list(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;

    #[test]
    fn set_then_get_round_trips() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(64));
        let obj = heap.alloc_object(Value::Nil).unwrap();
        let key = heap.intern(b"x").unwrap();
        heap.obj_set(obj, key, Value::Integer(42)).unwrap();
        assert_eq!(heap.obj_get(obj, key), Some(Value::Integer(42)));
    }

    #[test]
    fn set_twice_overwrites_in_place() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(64));
        let obj = heap.alloc_object(Value::Nil).unwrap();
        let key = heap.intern(b"x").unwrap();
        heap.obj_set(obj, key, Value::Integer(1)).unwrap();
        heap.obj_set(obj, key, Value::Integer(2)).unwrap();
        assert_eq!(heap.obj_get(obj, key), Some(Value::Integer(2)));
    }

    #[test]
    fn del_removes_the_entry() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(64));
        let obj = heap.alloc_object(Value::Nil).unwrap();
        let key = heap.intern(b"x").unwrap();
        heap.obj_set(obj, key, Value::Integer(1)).unwrap();
        assert!(heap.obj_del(obj, key).unwrap());
        assert_eq!(heap.obj_get(obj, key), None);
        assert!(!heap.obj_del(obj, key).unwrap());
    }

    #[test]
    fn get_does_not_walk_prototype_but_find_does() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(64));
        let parent = heap.alloc_object(Value::Nil).unwrap();
        let key = heap.intern(b"x").unwrap();
        heap.obj_set(parent, key, Value::Integer(7)).unwrap();
        let child = heap.alloc_object(parent).unwrap();

        assert_eq!(heap.obj_get(child, key), None);
        assert_eq!(heap.obj_find(child, key), Some(Value::Integer(7)));
    }

    #[test]
    fn string_keys_compare_by_bytes_not_identity() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(64));
        let obj = heap.alloc_object(Value::Nil).unwrap();
        let k1 = heap.alloc_string(b"name".to_vec()).unwrap();
        heap.obj_set(obj, k1, Value::Integer(1)).unwrap();
        let k2 = heap.alloc_string(b"name".to_vec()).unwrap();
        assert_eq!(heap.obj_get(obj, k2), Some(Value::Integer(1)));
    }
}
