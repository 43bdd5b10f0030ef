//! Symbol interning (§3.5, §4.3).
//!
//! `intern` is a linear scan over the symbol list — a `Cell` chain whose
//! `car`s are `Value::Symbol`s, with the list head itself kept as a
//! dedicated GC root on [`Heap`]. This deliberately departs from
//! `faxc-util`'s `DashMap`-backed concurrent interner: the core spec wants
//! the symbol table to live inside the same managed heap the collector
//! already walks, not a separate thread-safe structure, and there is no
//! concurrency to support in a single-threaded interpreter.

use crate::heap::{Heap, HeapSlot};
use crate::value::Value;
use shi_util::error::RuntimeError;

impl Heap {
    /// Returns the existing `Symbol` with this exact name, or interns a
    /// new one and prepends it to the symbol list.
    pub fn intern(&mut self, name: &[u8]) -> Result<Value, RuntimeError> {
        let mut cursor = self.symbol_list;
        loop {
            match cursor {
                Value::Nil => break,
                Value::Cell(_) => {
                    let entry = self.car(cursor).expect("symbol list cell has a car");
                    if let Value::Symbol(addr) = entry {
                        if let HeapSlot::Symbol(existing) = self.get(addr) {
                            if existing.as_slice() == name {
                                return Ok(entry);
                            }
                        }
                    }
                    cursor = self.cdr(cursor).expect("symbol list cell has a cdr");
                }
                _ => unreachable!("the symbol list must always be a proper list"),
            }
        }

        let sym_addr = self.alloc(HeapSlot::Symbol(name.to_vec()))?;
        let sym = Value::Symbol(sym_addr);
        let old_head = self.symbol_list;
        let new_head = self.cons(sym, old_head)?;
        self.symbol_list = new_head;
        Ok(sym)
    }

    pub fn symbol_name(&self, v: Value) -> Option<&[u8]> {
        match v {
            Value::Symbol(a) => match self.get(a) {
                HeapSlot::Symbol(name) => Some(name.as_slice()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Counts the entries in the symbol list. Intended for diagnostics and
    /// tests, not the hot path.
    pub fn symbol_count(&self) -> usize {
        self.list_length(self.symbol_list).max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;

    #[test]
    fn interning_the_same_name_twice_returns_identical_symbol() {
        let mut heap = Heap::new(GcConfig::default());
        let a = heap.intern(b"foo").unwrap();
        let b = heap.intern(b"foo").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn interning_distinct_names_returns_distinct_symbols() {
        let mut heap = Heap::new(GcConfig::default());
        let a = heap.intern(b"foo").unwrap();
        let b = heap.intern(b"bar").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn symbol_count_tracks_distinct_names() {
        let mut heap = Heap::new(GcConfig::default());
        heap.intern(b"a").unwrap();
        heap.intern(b"b").unwrap();
        heap.intern(b"a").unwrap();
        assert_eq!(heap.symbol_count(), 2);
    }
}
