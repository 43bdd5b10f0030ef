//! The Cheney copying collector (§4.4).
//!
//! Grounded on the phase decomposition of `fgc::gc::GarbageCollector::
//! execute_gc_cycle` (flip → forward roots → scan/relocate → cleanup), but
//! implementing the exact single-pass semispace algorithm the core spec
//! describes rather than `fgc`'s concurrent generational mark-compact
//! design: no marking phase, no generations, no background threads. A GC
//! cycle runs to completion on the thread that triggered it, which is
//! correct for a single-threaded interpreter (§5).

use crate::heap::{Heap, HeapSlot};
use crate::value::Value;

impl Heap {
    /// Runs one full collection cycle: flip the semispaces, forward every
    /// root, then scan-and-copy until the scan pointer catches the free
    /// pointer, and finally reclaim the old from-space.
    pub fn collect(&mut self) {
        assert!(!self.gc_running, "collector invoked reentrantly");
        self.gc_running = true;
        tracing::debug!(cycle = self.stats.cycles + 1, "gc: starting cycle");

        // Phase 1: flip. The current to-space becomes the from-space for
        // this cycle; a fresh, empty to-space receives relocated objects.
        let fresh_to_space = Vec::with_capacity(self.config.capacity);
        let old_to_space = std::mem::replace(&mut self.to_space, fresh_to_space);
        self.from_space = old_to_space;

        // Phase 2: forward roots. The symbol list is forwarded first, as
        // a dedicated root, then every slot in the root registry (frame
        // handles, then pinned handles — the latter outlive any frame and
        // back host-side records such as `ev-start` watchers).
        let symbol_list = self.symbol_list;
        self.symbol_list = self.forward(symbol_list);

        let mut root_values = self.roots.snapshot();
        for v in root_values.iter_mut() {
            *v = self.forward(*v);
        }
        self.roots.restore(root_values);

        let mut pinned_values = self.roots.pinned_snapshot();
        for slot in pinned_values.iter_mut() {
            if let Some(v) = slot {
                *v = self.forward(*v);
            }
        }
        self.roots.pinned_restore(pinned_values);

        // Phase 3: scan-and-copy. `scan` trails `to_space.len()` (the free
        // pointer); every object discovered while scanning is appended to
        // to-space, advancing the free pointer, until scan catches up.
        let mut scan = 0usize;
        while scan < self.to_space.len() {
            let slot = std::mem::replace(&mut self.to_space[scan], HeapSlot::Moved(0));
            let forwarded = self.forward_slot_fields(slot);
            self.to_space[scan] = forwarded;
            scan += 1;
        }

        debug_assert_eq!(scan, self.to_space.len());

        // Phase 4: reclaim. The entire from-space is dropped.
        let forwarded_count = self.from_space.len();
        self.from_space.clear();
        self.from_space.shrink_to_fit();

        self.stats.cycles += 1;
        self.stats.last_used = self.to_space.len();
        self.stats.last_forwarded = forwarded_count;

        if self.config.debug_gc {
            tracing::info!(
                cycle = self.stats.cycles,
                used = self.stats.last_used,
                capacity = self.config.capacity,
                from_space_objects = forwarded_count,
                "gc: cycle complete"
            );
        }

        self.gc_running = false;
    }

    /// Forwards every `Value`-typed field inside `slot` according to its
    /// tag, per the per-tag table in §4.4. Leaf tags (`String`, `Symbol`)
    /// carry no `Value` fields and pass through unchanged.
    fn forward_slot_fields(&mut self, slot: HeapSlot) -> HeapSlot {
        match slot {
            HeapSlot::String(bytes) => HeapSlot::String(bytes),
            HeapSlot::Symbol(bytes) => HeapSlot::Symbol(bytes),
            HeapSlot::Cell { car, cdr } => {
                let car = self.forward(car);
                let cdr = self.forward(cdr);
                HeapSlot::Cell { car, cdr }
            }
            HeapSlot::Object { proto, mut buckets } => {
                let proto = self.forward(proto);
                for bucket in buckets.iter_mut() {
                    *bucket = self.forward(*bucket);
                }
                HeapSlot::Object { proto, buckets }
            }
            HeapSlot::Closure { params, body, env } => {
                let params = self.forward(params);
                let body = self.forward(body);
                let env = self.forward(env);
                HeapSlot::Closure { params, body, env }
            }
            HeapSlot::Macro { params, body, env } => {
                let params = self.forward(params);
                let body = self.forward(body);
                let env = self.forward(env);
                HeapSlot::Macro { params, body, env }
            }
            HeapSlot::Moved(_) => {
                unreachable!("a from-space tombstone should never appear in to-space")
            }
        }
    }

    /// Relocates the object `v` refers to from from-space to to-space,
    /// returning an updated `Value` pointing at its new address.
    /// Singletons (`Nil`, `True`), inline scalars (`Integer`, `Primitive`)
    /// pass through untouched. Already-forwarded objects (tombstones) just
    /// return the recorded new address.
    fn forward(&mut self, v: Value) -> Value {
        let addr = match v.addr() {
            Some(addr) => addr,
            None => return v,
        };

        match &self.from_space[addr] {
            HeapSlot::Moved(new_addr) => v.with_addr(*new_addr),
            _ => {
                let slot = std::mem::replace(&mut self.from_space[addr], HeapSlot::Moved(0));
                let new_addr = self.to_space.len();
                self.to_space.push(slot);
                self.from_space[addr] = HeapSlot::Moved(new_addr);
                v.with_addr(new_addr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;

    #[test]
    fn collect_preserves_rooted_cell_chain() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(16));
        let a = heap.cons(Value::Integer(1), Value::Nil).unwrap();
        let list = heap.with_frame(|h| {
            let handle = h.root(a);
            let list = h.cons(Value::Integer(0), h.get_root(handle)).unwrap();
            h.set_root(handle, list);
            h.get_root(handle)
        });

        let list = heap.with_frame(|h| {
            let handle = h.root(list);
            h.collect();
            h.get_root(handle)
        });

        assert_eq!(heap.list_length(list), 2);
        assert_eq!(heap.car(list), Some(Value::Integer(0)));
    }

    #[test]
    fn collect_drops_unrooted_garbage() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(16));
        let _garbage = heap.cons(Value::Integer(99), Value::Nil).unwrap();
        let before = heap.used();
        heap.collect();
        assert!(heap.used() < before);
    }

    #[test]
    fn always_gc_config_does_not_change_observable_value() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(16));
        heap.config.always_gc = true;
        let result = heap.with_frame(|h| {
            let handle = h.root(Value::Nil);
            let v = h.cons(Value::Integer(7), Value::Nil).unwrap();
            h.set_root(handle, v);
            h.get_root(handle)
        });
        assert_eq!(heap.car(result), Some(Value::Integer(7)));
    }
}
