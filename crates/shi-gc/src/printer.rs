//! Printing values to their textual form (`pr-str`, and the input to the
//! object-key hash in §3.3).

use crate::heap::{Heap, HeapSlot};
use crate::value::Value;

impl Heap {
    /// Renders `v` to its printed representation, per the escape rules of
    /// §4.5 for strings and the plain decimal form for integers.
    pub fn print_value(&self, v: Value) -> String {
        let mut out = String::new();
        self.print_into(v, &mut out);
        out
    }

    fn print_into(&self, v: Value, out: &mut String) {
        match v {
            Value::Integer(n) => out.push_str(&n.to_string()),
            Value::Nil => out.push_str("nil"),
            Value::True => out.push_str("true"),
            Value::String(_) => {
                out.push('"');
                for &byte in self.string_bytes(v).unwrap_or(&[]) {
                    match byte {
                        b'\n' => out.push_str("\\n"),
                        b'\r' => out.push_str("\\r"),
                        b'\t' => out.push_str("\\t"),
                        b'"' => out.push_str("\\\""),
                        b'\\' => out.push_str("\\\\"),
                        b if b.is_ascii() => out.push(b as char),
                        b => out.push_str(&format!("\\x{:02x}", b)),
                    }
                }
                out.push('"');
            }
            Value::Symbol(_) => {
                if let Some(name) = self.symbol_name(v) {
                    out.push_str(&String::from_utf8_lossy(name));
                }
            }
            Value::Cell(_) => self.print_list(v, out),
            Value::Object(_) => {
                if let Some(name) = self.object_name(v) {
                    out.push_str(&format!("#<object {name}>"));
                } else {
                    out.push_str("#<object>");
                }
            }
            Value::Primitive(id) => out.push_str(&format!("#<primitive {}>", id.0)),
            Value::Closure(_) => out.push_str("#<closure>"),
            Value::Macro(_) => out.push_str("#<macro>"),
        }
    }

    fn print_list(&self, mut v: Value, out: &mut String) {
        out.push('(');
        let mut first = true;
        loop {
            match v {
                Value::Cell(_) => {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    self.print_into(self.car(v).expect("cell car"), out);
                    v = self.cdr(v).expect("cell cdr");
                }
                Value::Nil => break,
                other => {
                    out.push_str(" . ");
                    self.print_into(other, out);
                    break;
                }
            }
        }
        out.push(')');
    }

    /// The `*object-name*` property used by the printer for a friendly
    /// display, if the object or one of its prototypes defines one.
    fn object_name(&self, v: Value) -> Option<String> {
        let name_key = self.find_interned_symbol(b"*object-name*")?;
        let found = self.obj_find(v, Value::Symbol(name_key));
        found.map(|val| self.print_value(val))
    }

    /// Looks up an already-interned symbol by name without interning a
    /// new one (this is a read-only helper, so it takes `&self`).
    fn find_interned_symbol(&self, name: &[u8]) -> Option<crate::value::Addr> {
        let mut cursor = self.symbol_list();
        loop {
            match cursor {
                Value::Nil => return None,
                Value::Cell(_) => {
                    let entry = self.car(cursor)?;
                    if let Value::Symbol(addr) = entry {
                        if let HeapSlot::Symbol(existing) = self.get(addr) {
                            if existing.as_slice() == name {
                                return Some(addr);
                            }
                        }
                    }
                    cursor = self.cdr(cursor)?;
                }
                _ => return None,
            }
        }
    }
}
