//! The heap: two semispaces of [`HeapSlot`]s, bump-allocated.
//!
//! Grounded on `fgc::gc::GarbageCollector::allocate`'s retry-on-failure
//! contract (§4.1): an allocation that does not fit triggers a collection,
//! and only fails with a fatal error if it still does not fit afterward.
//! Unlike `fgc`, there is exactly one generation, no threads, and no OS
//! paging — each semispace is a plain growable `Vec<HeapSlot>` capped at
//! `capacity` slots.

use crate::config::GcConfig;
use crate::roots::{Handle, PinnedHandle, RootRegistry};
use crate::value::{Addr, Value};
use shi_util::error::RuntimeError;

pub const BUCKET_COUNT: usize = 64;

/// One heap-allocated object. The variant is the object's "tag"; the
/// payload is exactly the fields the collector must forward during a scan
/// (see the per-tag table in the core spec, §4.4).
#[derive(Debug, Clone)]
pub enum HeapSlot {
    String(Vec<u8>),
    Symbol(Vec<u8>),
    Cell {
        car: Value,
        cdr: Value,
    },
    Object {
        proto: Value,
        buckets: Vec<Value>,
    },
    Closure {
        params: Value,
        body: Value,
        env: Value,
    },
    Macro {
        params: Value,
        body: Value,
        env: Value,
    },
    /// A tombstone left behind by the collector: the object has already
    /// been relocated to `to_space[.0]`.
    Moved(Addr),
}

impl HeapSlot {
    pub fn tag_name(&self) -> &'static str {
        match self {
            HeapSlot::String(_) => "string",
            HeapSlot::Symbol(_) => "symbol",
            HeapSlot::Cell { .. } => "cell",
            HeapSlot::Object { .. } => "object",
            HeapSlot::Closure { .. } => "closure",
            HeapSlot::Macro { .. } => "macro",
            HeapSlot::Moved(_) => "moved",
        }
    }

    pub fn new_object(proto: Value) -> HeapSlot {
        HeapSlot::Object {
            proto,
            buckets: vec![Value::Nil; BUCKET_COUNT],
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GcStats {
    pub cycles: u64,
    pub last_used: usize,
    pub last_forwarded: usize,
}

pub struct Heap {
    pub(crate) to_space: Vec<HeapSlot>,
    pub(crate) from_space: Vec<HeapSlot>,
    pub(crate) config: GcConfig,
    /// Head of the interned-symbol list: `Nil` or a `Cell` chain whose
    /// `car`s are `Value::Symbol`. A dedicated GC root, forwarded first on
    /// every cycle (§4.3).
    pub(crate) symbol_list: Value,
    pub(crate) roots: RootRegistry,
    pub(crate) gc_running: bool,
    pub(crate) stats: GcStats,
}

impl Heap {
    pub fn new(config: GcConfig) -> Self {
        Self {
            to_space: Vec::with_capacity(config.capacity),
            from_space: Vec::with_capacity(config.capacity),
            config,
            symbol_list: Value::Nil,
            roots: RootRegistry::new(),
            gc_running: false,
            stats: GcStats::default(),
        }
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub fn used(&self) -> usize {
        self.to_space.len()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn symbol_list(&self) -> Value {
        self.symbol_list
    }

    pub fn set_symbol_list(&mut self, v: Value) {
        self.symbol_list = v;
    }

    /// Ensures the active semispace has room for one more slot, triggering
    /// a collection if it is full (or if `always_gc` debug mode is on).
    /// Fails with a fatal [`RuntimeError::MemoryExhausted`] if a collection
    /// does not free enough room. Takes no payload: collecting here, before
    /// the caller's `HeapSlot` is constructed, means a triggered GC never
    /// has to reason about a not-yet-rooted, not-yet-heap-resident value.
    fn reserve_slot(&mut self) -> Result<(), RuntimeError> {
        assert!(
            !self.gc_running,
            "allocation attempted while the collector is running"
        );

        if self.config.always_gc || self.to_space.len() >= self.config.capacity {
            self.collect();
        }

        if self.to_space.len() >= self.config.capacity {
            return Err(RuntimeError::MemoryExhausted);
        }

        Ok(())
    }

    /// Pushes an already-built `slot` into to-space. Callers MUST have
    /// called [`Heap::reserve_slot`] immediately beforehand with no
    /// intervening allocation, and any `Value` fields inside `slot` must
    /// have been re-read (e.g. via a [`crate::roots::Handle`]) after that
    /// call returns, per the root discipline of §4.2/§9.
    fn push_slot(&mut self, slot: HeapSlot) -> Addr {
        let addr = self.to_space.len();
        self.to_space.push(slot);
        addr
    }

    /// Allocates a slot with no embedded `Value` fields (`String`,
    /// `Symbol`): there is nothing for a triggered collection to
    /// invalidate, so no rooting dance is needed around the call.
    pub fn alloc(&mut self, slot: HeapSlot) -> Result<Addr, RuntimeError> {
        debug_assert!(
            !matches!(slot, HeapSlot::Moved(_)),
            "a tombstone is never allocated directly"
        );
        self.reserve_slot()?;
        Ok(self.push_slot(slot))
    }

    pub fn get(&self, addr: Addr) -> &HeapSlot {
        &self.to_space[addr]
    }

    pub fn get_mut(&mut self, addr: Addr) -> &mut HeapSlot {
        &mut self.to_space[addr]
    }

    // --- Cell accessors -------------------------------------------------

    pub fn car(&self, v: Value) -> Option<Value> {
        match v {
            Value::Cell(a) => match self.get(a) {
                HeapSlot::Cell { car, .. } => Some(*car),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn cdr(&self, v: Value) -> Option<Value> {
        match v {
            Value::Cell(a) => match self.get(a) {
                HeapSlot::Cell { cdr, .. } => Some(*cdr),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn set_car(&mut self, v: Value, new_car: Value) -> bool {
        match v {
            Value::Cell(a) => match self.get_mut(a) {
                HeapSlot::Cell { car, .. } => {
                    *car = new_car;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    pub fn set_cdr(&mut self, v: Value, new_cdr: Value) -> bool {
        match v {
            Value::Cell(a) => match self.get_mut(a) {
                HeapSlot::Cell { cdr, .. } => {
                    *cdr = new_cdr;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Constructs a pair. `car`/`cdr` may themselves be heap addresses that
    /// a collection triggered by this very allocation would relocate, so
    /// they are rooted across [`Heap::reserve_slot`] and re-read before the
    /// `Cell` is built (§4.2 handle discipline).
    pub fn cons(&mut self, car: Value, cdr: Value) -> Result<Value, RuntimeError> {
        self.with_frame(|h| {
            let car_h = h.root(car);
            let cdr_h = h.root(cdr);
            h.reserve_slot()?;
            let car = h.get_root(car_h);
            let cdr = h.get_root(cdr_h);
            let addr = h.push_slot(HeapSlot::Cell { car, cdr });
            Ok(Value::Cell(addr))
        })
    }

    /// The number of `Cell`s before a terminating `Nil`, or `-1` if the
    /// chain is not Nil-terminated.
    pub fn list_length(&self, mut v: Value) -> i64 {
        let mut len: i64 = 0;
        loop {
            match v {
                Value::Nil => return len,
                Value::Cell(_) => {
                    len += 1;
                    v = self.cdr(v).expect("cell cdr");
                }
                _ => return -1,
            }
        }
    }

    pub fn list_to_vec(&self, mut v: Value) -> Option<Vec<Value>> {
        let mut out = Vec::new();
        loop {
            match v {
                Value::Nil => return Some(out),
                Value::Cell(_) => {
                    out.push(self.car(v).expect("cell car"));
                    v = self.cdr(v).expect("cell cdr");
                }
                _ => return None,
            }
        }
    }

    /// Builds a proper list from `items`, in order. Every element not yet
    /// consed is rooted for the duration of the loop: `cons` roots only the
    /// two arguments of its own call, so an item still waiting in `items`
    /// a few iterations out would otherwise sit outside the root registry
    /// entirely while an earlier iteration's `cons` triggers a collection
    /// (§4.2) — a plain Rust slice is invisible to the collector.
    pub fn vec_to_list(&mut self, items: &[Value]) -> Result<Value, RuntimeError> {
        self.with_frame(|h| {
            let item_handles: Vec<Handle> = items.iter().map(|&v| h.root(v)).collect();
            let tail_h = h.root(Value::Nil);
            for item_h in item_handles.into_iter().rev() {
                let item = h.get_root(item_h);
                let rest = h.get_root(tail_h);
                let cell = h.cons(item, rest)?;
                h.set_root(tail_h, cell);
            }
            Ok(h.get_root(tail_h))
        })
    }

    // --- String accessors -------------------------------------------------

    pub fn string_bytes(&self, v: Value) -> Option<&[u8]> {
        match v {
            Value::String(a) => match self.get(a) {
                HeapSlot::String(bytes) => Some(bytes),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn alloc_string(&mut self, bytes: Vec<u8>) -> Result<Value, RuntimeError> {
        let addr = self.alloc(HeapSlot::String(bytes))?;
        Ok(Value::String(addr))
    }

    // --- Object accessors -------------------------------------------------

    pub fn object_proto(&self, v: Value) -> Option<Value> {
        match v {
            Value::Object(a) => match self.get(a) {
                HeapSlot::Object { proto, .. } => Some(*proto),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn set_object_proto(&mut self, v: Value, proto: Value) -> bool {
        match v {
            Value::Object(a) => match self.get_mut(a) {
                HeapSlot::Object { proto: p, .. } => {
                    *p = proto;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    pub fn bucket(&self, v: Value, index: usize) -> Option<Value> {
        match v {
            Value::Object(a) => match self.get(a) {
                HeapSlot::Object { buckets, .. } => Some(buckets[index % BUCKET_COUNT]),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn set_bucket(&mut self, v: Value, index: usize, head: Value) -> bool {
        match v {
            Value::Object(a) => match self.get_mut(a) {
                HeapSlot::Object { buckets, .. } => {
                    buckets[index % BUCKET_COUNT] = head;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    pub fn alloc_object(&mut self, proto: Value) -> Result<Value, RuntimeError> {
        self.with_frame(|h| {
            let proto_h = h.root(proto);
            h.reserve_slot()?;
            let proto = h.get_root(proto_h);
            let addr = h.push_slot(HeapSlot::new_object(proto));
            Ok(Value::Object(addr))
        })
    }

    // --- Closure / Macro accessors -----------------------------------------

    pub fn closure_fields(&self, v: Value) -> Option<(Value, Value, Value)> {
        match v {
            Value::Closure(a) | Value::Macro(a) => match self.get(a) {
                HeapSlot::Closure { params, body, env } | HeapSlot::Macro { params, body, env } => {
                    Some((*params, *body, *env))
                }
                _ => None,
            },
            _ => None,
        }
    }

    pub fn alloc_closure(
        &mut self,
        params: Value,
        body: Value,
        env: Value,
    ) -> Result<Value, RuntimeError> {
        self.with_frame(|h| {
            let params_h = h.root(params);
            let body_h = h.root(body);
            let env_h = h.root(env);
            h.reserve_slot()?;
            let params = h.get_root(params_h);
            let body = h.get_root(body_h);
            let env = h.get_root(env_h);
            let addr = h.push_slot(HeapSlot::Closure { params, body, env });
            Ok(Value::Closure(addr))
        })
    }

    pub fn alloc_macro(
        &mut self,
        params: Value,
        body: Value,
        env: Value,
    ) -> Result<Value, RuntimeError> {
        self.with_frame(|h| {
            let params_h = h.root(params);
            let body_h = h.root(body);
            let env_h = h.root(env);
            h.reserve_slot()?;
            let params = h.get_root(params_h);
            let body = h.get_root(body_h);
            let env = h.get_root(env_h);
            let addr = h.push_slot(HeapSlot::Macro { params, body, env });
            Ok(Value::Macro(addr))
        })
    }

    // --- Root registry passthrough ------------------------------------------

    pub fn enter_frame(&mut self) {
        self.roots.enter_frame();
    }

    pub fn exit_frame(&mut self) {
        self.roots.exit_frame();
    }

    pub fn root(&mut self, v: Value) -> Handle {
        self.roots.push(v)
    }

    pub fn get_root(&self, h: Handle) -> Value {
        self.roots.get(h)
    }

    pub fn set_root(&mut self, h: Handle, v: Value) {
        self.roots.set(h, v);
    }

    /// Pins `v` outside the frame stack: it survives any number of
    /// enclosing `exit_frame` calls, staying valid until [`Heap::unpin`].
    /// For host-side records that must outlive the call that created them
    /// (an `ev-start` watcher's callback, e.g.), where an ordinary
    /// [`Heap::root`] handle would be truncated the moment the registering
    /// call's frame exits.
    pub fn pin(&mut self, v: Value) -> PinnedHandle {
        self.roots.pin(v)
    }

    pub fn get_pinned(&self, h: PinnedHandle) -> Value {
        self.roots.get_pinned(h)
    }

    pub fn unpin(&mut self, h: PinnedHandle) {
        self.roots.unpin(h)
    }

    pub fn with_frame<R>(&mut self, f: impl FnOnce(&mut Heap) -> R) -> R {
        self.enter_frame();
        let result = f(self);
        self.exit_frame();
        result
    }
}
