//! The root registry and the `Handle` abstraction (§4.2, §9).
//!
//! Rather than a C-style pointer-to-pointer threaded through every host
//! call, this realizes the design notes' recommendation directly: a
//! `Handle` is a slot index into a growable stack of root values, and its
//! scope is tied to the enclosing frame via [`Heap::with_frame`]. Any
//! `Value` read from the heap and retained across a call that might
//! allocate must be rooted with [`Heap::root`] first — the collector only
//! ever looks at these slots (plus the symbol list) when relocating.
//!
//! A second, parallel table holds *pinned* roots: values that must survive
//! past the return of whatever call created them (a host-registered
//! callback, for instance), rather than being scoped to a frame. A
//! [`PinnedHandle`] is released only by an explicit [`RootRegistry::unpin`]
//! call.

use crate::value::Value;

/// A slot index into the [`RootRegistry`]'s flat value stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub(crate) usize);

/// A slot index into the [`RootRegistry`]'s pinned-value table. Unlike
/// [`Handle`], not tied to any frame — stays valid across any number of
/// `enter_frame`/`exit_frame` pairs until explicitly [`RootRegistry::unpin`]ned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinnedHandle(pub(crate) usize);

pub struct RootRegistry {
    slots: Vec<Value>,
    frame_marks: Vec<usize>,
    pinned: Vec<Option<Value>>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            frame_marks: Vec::new(),
            pinned: Vec::new(),
        }
    }

    pub fn enter_frame(&mut self) {
        self.frame_marks.push(self.slots.len());
    }

    pub fn exit_frame(&mut self) {
        let mark = self
            .frame_marks
            .pop()
            .expect("exit_frame called without a matching enter_frame");
        self.slots.truncate(mark);
    }

    pub fn push(&mut self, v: Value) -> Handle {
        let idx = self.slots.len();
        self.slots.push(v);
        Handle(idx)
    }

    pub fn get(&self, handle: Handle) -> Value {
        self.slots[handle.0]
    }

    pub fn set(&mut self, handle: Handle, v: Value) {
        self.slots[handle.0] = v;
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.slots.iter_mut()
    }

    pub fn depth(&self) -> usize {
        self.frame_marks.len()
    }

    /// Copies out every live root slot, in order. Used by the collector to
    /// forward roots without holding a borrow of `self` across a call that
    /// also needs `&mut self` for the heap's semispaces.
    pub fn snapshot(&self) -> Vec<Value> {
        self.slots.clone()
    }

    /// Writes back a forwarded snapshot produced by [`RootRegistry::snapshot`].
    pub fn restore(&mut self, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.slots.len());
        self.slots = values;
    }

    /// Pins `v` so it survives any number of frame exits; released only by
    /// [`RootRegistry::unpin`].
    pub fn pin(&mut self, v: Value) -> PinnedHandle {
        let idx = self.pinned.len();
        self.pinned.push(Some(v));
        PinnedHandle(idx)
    }

    pub fn get_pinned(&self, handle: PinnedHandle) -> Value {
        self.pinned[handle.0].expect("pinned handle used after unpin")
    }

    /// Releases a pinned slot; the collector no longer forwards it.
    pub fn unpin(&mut self, handle: PinnedHandle) {
        self.pinned[handle.0] = None;
    }

    /// Copies out every pinned slot (including released ones, as `None`),
    /// for the collector to forward in place, mirroring [`RootRegistry::
    /// snapshot`]'s borrow-avoidance trick.
    pub fn pinned_snapshot(&self) -> Vec<Option<Value>> {
        self.pinned.clone()
    }

    pub fn pinned_restore(&mut self, values: Vec<Option<Value>>) {
        debug_assert_eq!(values.len(), self.pinned.len());
        self.pinned = values;
    }
}

impl Default for RootRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_frame_truncates_its_own_slots() {
        let mut reg = RootRegistry::new();
        reg.enter_frame();
        reg.push(Value::Integer(1));
        reg.enter_frame();
        reg.push(Value::Integer(2));
        reg.push(Value::Integer(3));
        assert_eq!(reg.slots.len(), 3);
        reg.exit_frame();
        assert_eq!(reg.slots.len(), 1);
        reg.exit_frame();
        assert_eq!(reg.slots.len(), 0);
    }

    #[test]
    #[should_panic]
    fn exit_without_enter_panics() {
        let mut reg = RootRegistry::new();
        reg.exit_frame();
    }

    #[test]
    fn pinned_handle_survives_frame_exit() {
        let mut reg = RootRegistry::new();
        reg.enter_frame();
        let pinned = reg.pin(Value::Integer(42));
        reg.exit_frame();
        assert_eq!(reg.get_pinned(pinned), Value::Integer(42));
    }

    #[test]
    #[should_panic]
    fn get_pinned_after_unpin_panics() {
        let mut reg = RootRegistry::new();
        let pinned = reg.pin(Value::Integer(1));
        reg.unpin(pinned);
        reg.get_pinned(pinned);
    }
}
