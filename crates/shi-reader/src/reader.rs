//! The reader: character stream to canonical expression tree (§4.5).
//!
//! A single recursive-descent `read_form` produces `Value` trees directly —
//! unlike the teacher's two-stage lex-then-parse pipeline (`faxc-lex`
//! produces a `Token` stream that `faxc-par` then parses), there is no
//! separate token type here: the core spec's reader unit of output is one
//! expression, not one token, so collapsing the two stages is the idiomatic
//! shape for this grammar (see `DESIGN.md`).
//!
//! The three "reader-internal" sentinels named by the core spec (`)`, `}`,
//! `.`) never materialize as `Value`s here at all: they are detected by
//! peeking the current byte before recursing, so there is nothing that
//! could accidentally leak out of the public entry point.

use crate::cursor::Cursor;
use shi_gc::{Handle, Heap, Value};
use shi_util::error::{ReaderError, RuntimeError};

const MAX_STRING_LEN: usize = 1000;
const MAX_SYMBOL_LEN: usize = 200;

const SYMBOL_PUNCT: &[u8] = b"~!#$%^&*-_=+:/?<>";

fn is_symbol_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || SYMBOL_PUNCT.contains(&b)
}

fn is_symbol_continue(b: u8) -> bool {
    is_symbol_start(b) || b.is_ascii_digit()
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Either a catchable syntax error (§7 reader errors) or a fatal
/// allocation failure — the reader allocates as it parses, so any call
/// into the heap can in principle hit [`RuntimeError::MemoryExhausted`],
/// which must stay distinguishable from an ordinary syntax mistake
/// (fatal errors are never caught by `trap-error`, per §7).
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Syntax(#[from] ReaderError),
    #[error(transparent)]
    Fatal(#[from] RuntimeError),
}

/// Reads successive expressions from one source buffer, allocating each
/// into `heap` as it is read. Holds no state beyond the cursor position, so
/// repeated calls to [`Reader::next_expr`] over the same source produce
/// successive top-level expressions until EOF, per §4.5.
pub struct Reader<'a, 'h> {
    cursor: Cursor<'a>,
    heap: &'h mut Heap,
}

impl<'a, 'h> Reader<'a, 'h> {
    pub fn new(heap: &'h mut Heap, source: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(source),
            heap,
        }
    }

    /// Exposes the underlying heap so a caller reading several successive
    /// top-level expressions can root each one as it comes back, before the
    /// next [`Reader::next_expr`] call allocates further and potentially
    /// triggers a collection.
    pub fn heap_mut(&mut self) -> &mut Heap {
        self.heap
    }

    /// Reads the next top-level expression, or `Ok(None)` at EOF. A shebang
    /// line (`#...`) is only recognized when it begins at byte offset 0 of
    /// the whole source.
    pub fn next_expr(&mut self) -> Result<Option<Value>, ReadError> {
        if self.cursor.position() == 0 && self.cursor.current() == Some(b'#') {
            self.skip_line_comment();
        }
        self.skip_whitespace_and_comments();

        if self.cursor.is_at_end() {
            return Ok(None);
        }

        let value = self.read_form()?;
        Ok(Some(value))
    }

    fn skip_line_comment(&mut self) {
        while let Some(b) = self.cursor.current() {
            if b == b'\n' {
                break;
            }
            self.cursor.advance();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.cursor.current() {
                Some(b) if is_whitespace(b) => self.cursor.advance(),
                Some(b';') => self.skip_line_comment(),
                _ => break,
            }
        }
    }

    /// Reads one expression, dispatching on the current byte. This is the
    /// entry point both for top-level reads and for every recursive
    /// sub-read (list elements, quote-family operands, dotted tails, …).
    fn read_form(&mut self) -> Result<Value, ReadError> {
        self.skip_whitespace_and_comments();
        let start = self.cursor.here();

        let Some(b) = self.cursor.current() else {
            return Err(ReaderError::UnterminatedList(start).into());
        };

        match b {
            b')' => Err(ReaderError::StrayCloseDelimiter(start, ')').into()),
            b'}' => Err(ReaderError::StrayCloseDelimiter(start, '}').into()),
            // `.` is never a symbol character (§4.5), so a bare `.` reached
            // here — outside the dotted-tail position `read_paren_list`
            // handles specially — is always a syntax error.
            b'.' => Err(ReaderError::StrayDot(start).into()),
            b'(' => {
                self.cursor.advance();
                self.read_paren_list()
            }
            b'{' => {
                self.cursor.advance();
                self.read_brace_alist()
            }
            b'\'' => {
                self.cursor.advance();
                self.read_prefixed("quote")
            }
            b'`' => {
                self.cursor.advance();
                self.read_prefixed("quasiquote")
            }
            b',' => {
                self.cursor.advance();
                if self.cursor.current() == Some(b'@') {
                    self.cursor.advance();
                    self.read_prefixed("unquote-splicing")
                } else {
                    self.read_prefixed("unquote")
                }
            }
            b'@' => {
                self.cursor.advance();
                self.read_prefixed("unbox")
            }
            b'"' => self.read_string(),
            b'-' if self.cursor.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                self.read_integer()
            }
            b if b.is_ascii_digit() => self.read_integer(),
            b if is_symbol_start(b) => self.read_symbol(),
            other => Err(ReaderError::UnknownChar(start, other as char).into()),
        }
    }

    /// Reads the operand of a prefix operator and wraps it as `(kw operand)`.
    fn read_prefixed(&mut self, keyword: &str) -> Result<Value, ReadError> {
        let operand = self.read_form()?;
        let kw = self.intern(keyword.as_bytes())?;
        let tail = self.cons(operand, Value::Nil)?;
        self.cons(kw, tail)
    }

    /// Elements are read one at a time, each allocating further sub-expressions
    /// of its own; a later element's read can trigger a collection, so every
    /// element read so far must stay reachable as a root, not sit unrooted in
    /// a plain `Vec<Value>` (§4.2). `read_paren_list_body` runs inside the
    /// frame this wrapper opens so every [`Handle`] it roots is released
    /// together, on return.
    fn read_paren_list(&mut self) -> Result<Value, ReadError> {
        self.heap.enter_frame();
        let result = self.read_paren_list_body();
        self.heap.exit_frame();
        result
    }

    fn read_paren_list_body(&mut self) -> Result<Value, ReadError> {
        let list_start = self.cursor.here();
        let mut item_handles: Vec<Handle> = Vec::new();
        let mut tail = Value::Nil;

        loop {
            self.skip_whitespace_and_comments();
            match self.cursor.current() {
                None => return Err(ReaderError::UnterminatedList(list_start).into()),
                Some(b')') => {
                    self.cursor.advance();
                    break;
                }
                Some(b'.') => {
                    self.cursor.advance();
                    let t = self.read_form()?;
                    let tail_h = self.heap.root(t);
                    self.skip_whitespace_and_comments();
                    match self.cursor.current() {
                        Some(b')') => {
                            self.cursor.advance();
                        }
                        None => return Err(ReaderError::UnterminatedList(list_start).into()),
                        _ => return Err(ReaderError::StrayDot(list_start).into()),
                    }
                    tail = self.heap.get_root(tail_h);
                    break;
                }
                _ => {
                    let v = self.read_form()?;
                    item_handles.push(self.heap.root(v));
                }
            }
        }

        self.build_list_from_handles(item_handles, tail)
    }

    fn read_brace_alist(&mut self) -> Result<Value, ReadError> {
        self.heap.enter_frame();
        let result = self.read_brace_alist_body();
        self.heap.exit_frame();
        result
    }

    fn read_brace_alist_body(&mut self) -> Result<Value, ReadError> {
        let list_start = self.cursor.here();
        let mut item_handles: Vec<Handle> = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            match self.cursor.current() {
                None => return Err(ReaderError::UnterminatedList(list_start).into()),
                Some(b'}') => {
                    self.cursor.advance();
                    break;
                }
                _ => {
                    let v = self.read_form()?;
                    item_handles.push(self.heap.root(v));
                }
            }
        }

        if item_handles.len() % 2 != 0 {
            return Err(ReaderError::OddAlistCount(list_start).into());
        }

        // `{k1 v1 k2 v2 ...}` -> `(list (cons k1 v1) (cons k2 v2) ...)`
        let cons_sym = self.intern(b"cons")?;
        let mut pair_handles = Vec::with_capacity(item_handles.len() / 2);
        for kv in item_handles.chunks(2) {
            let k = self.heap.get_root(kv[0]);
            let v = self.heap.get_root(kv[1]);
            let nil_tail = self.cons(v, Value::Nil)?;
            let k_tail = self.cons(k, nil_tail)?;
            let pair = self.cons(cons_sym, k_tail)?;
            pair_handles.push(self.heap.root(pair));
        }

        let list_sym = self.intern(b"list")?;
        let args = self.build_list_from_handles(pair_handles, Value::Nil)?;
        self.cons(list_sym, args)
    }

    fn read_string(&mut self) -> Result<Value, ReadError> {
        let start = self.cursor.here();
        self.cursor.advance(); // opening quote
        let mut bytes = Vec::new();

        loop {
            match self.cursor.current() {
                None => return Err(ReaderError::UnterminatedString(start).into()),
                Some(b'"') => {
                    self.cursor.advance();
                    break;
                }
                Some(b'\\') => {
                    self.cursor.advance();
                    let escaped = match self.cursor.current() {
                        Some(b'n') => b'\n',
                        Some(b'r') => b'\r',
                        Some(b't') => b'\t',
                        Some(b'"') => b'"',
                        Some(b'\\') => b'\\',
                        Some(other) => {
                            return Err(ReaderError::UnknownChar(start, other as char).into())
                        }
                        None => return Err(ReaderError::UnterminatedString(start).into()),
                    };
                    self.cursor.advance();
                    bytes.push(escaped);
                }
                Some(b) => {
                    self.cursor.advance();
                    bytes.push(b);
                }
            }
            if bytes.len() > MAX_STRING_LEN {
                return Err(ReaderError::StringTooLong(start).into());
            }
        }

        Ok(self.heap.alloc_string(bytes)?)
    }

    fn read_integer(&mut self) -> Result<Value, ReadError> {
        let start = self.cursor.here();
        let mut text = String::new();
        if self.cursor.current() == Some(b'-') {
            text.push('-');
            self.cursor.advance();
        }
        while let Some(b) = self.cursor.current() {
            if b.is_ascii_digit() {
                text.push(b as char);
                self.cursor.advance();
            } else {
                break;
            }
        }
        let n: i64 = text
            .parse()
            .map_err(|_| ReadError::from(ReaderError::UnknownChar(start, '0')))?;
        Ok(Value::Integer(n))
    }

    fn read_symbol(&mut self) -> Result<Value, ReadError> {
        let start = self.cursor.here();
        let mut raw = Vec::new();
        while let Some(b) = self.cursor.current() {
            if raw.is_empty() {
                if !is_symbol_start(b) {
                    break;
                }
            } else if !is_symbol_continue(b) {
                break;
            }
            raw.push(b);
            self.cursor.advance();
            if raw.len() > MAX_SYMBOL_LEN {
                return Err(ReaderError::SymbolTooLong(start).into());
            }
        }

        match raw.iter().position(|&b| b == b':') {
            None => self.intern(&raw),
            Some(idx) => {
                let obj_name = &raw[..idx];
                let prop_name = &raw[idx + 1..];
                let obj_sym = self.intern(obj_name)?;
                let prop_sym = self.intern(prop_name)?;
                let quote_sym = self.intern(b"quote")?;
                let colon_sym = self.intern(b":")?;

                let quoted_prop = self.cons(prop_sym, Value::Nil)?;
                let quote_form = self.cons(quote_sym, quoted_prop)?;
                let tail = self.cons(quote_form, Value::Nil)?;
                let obj_tail = self.cons(obj_sym, tail)?;
                self.cons(colon_sym, obj_tail)
            }
        }
    }

    fn intern(&mut self, name: &[u8]) -> Result<Value, ReadError> {
        Ok(self.heap.intern(name)?)
    }

    fn cons(&mut self, car: Value, cdr: Value) -> Result<Value, ReadError> {
        Ok(self.heap.cons(car, cdr)?)
    }

    /// Conses `items` (already-rooted, in read order) onto `tail`. Each
    /// not-yet-consumed handle stays reachable across every intervening
    /// `cons` call, and the in-progress spine itself is rooted and updated
    /// via `tail_h` rather than held in a plain local, since building the
    /// list is itself a sequence of allocations that can trigger a
    /// collection partway through.
    fn build_list_from_handles(
        &mut self,
        items: Vec<Handle>,
        tail: Value,
    ) -> Result<Value, ReadError> {
        let tail_h = self.heap.root(tail);
        for item_h in items.into_iter().rev() {
            let item = self.heap.get_root(item_h);
            let rest = self.heap.get_root(tail_h);
            let cell = self.cons(item, rest)?;
            self.heap.set_root(tail_h, cell);
        }
        Ok(self.heap.get_root(tail_h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shi_gc::GcConfig;

    fn read_one(heap: &mut Heap, source: &[u8]) -> Value {
        Reader::new(heap, source).next_expr().unwrap().unwrap()
    }

    #[test]
    fn reads_an_integer() {
        let mut heap = Heap::new(GcConfig::default());
        assert_eq!(read_one(&mut heap, b"42"), Value::Integer(42));
        assert_eq!(read_one(&mut heap, b"-7"), Value::Integer(-7));
    }

    #[test]
    fn reads_successive_toplevel_forms() {
        let mut heap = Heap::new(GcConfig::default());
        let mut reader = Reader::new(&mut heap, b"1 2 3");
        assert_eq!(reader.next_expr().unwrap(), Some(Value::Integer(1)));
        assert_eq!(reader.next_expr().unwrap(), Some(Value::Integer(2)));
        assert_eq!(reader.next_expr().unwrap(), Some(Value::Integer(3)));
        assert_eq!(reader.next_expr().unwrap(), None);
    }

    #[test]
    fn quote_family_desugars_to_keyword_forms() {
        let mut heap = Heap::new(GcConfig::default());
        let quoted = read_one(&mut heap, b"'a");
        let quote_sym = heap.intern(b"quote").unwrap();
        assert_eq!(heap.car(quoted), Some(quote_sym));

        let quasi = read_one(&mut heap, b"`a");
        let quasi_sym = heap.intern(b"quasiquote").unwrap();
        assert_eq!(heap.car(quasi), Some(quasi_sym));

        let unq = read_one(&mut heap, b",a");
        let unq_sym = heap.intern(b"unquote").unwrap();
        assert_eq!(heap.car(unq), Some(unq_sym));

        let splice = read_one(&mut heap, b",@a");
        let splice_sym = heap.intern(b"unquote-splicing").unwrap();
        assert_eq!(heap.car(splice), Some(splice_sym));
    }

    #[test]
    fn dotted_pair_reads_as_a_single_cell() {
        let mut heap = Heap::new(GcConfig::default());
        let pair = read_one(&mut heap, b"(1 . 2)");
        assert_eq!(heap.car(pair), Some(Value::Integer(1)));
        assert_eq!(heap.cdr(pair), Some(Value::Integer(2)));
    }

    #[test]
    fn brace_alist_desugars_to_list_of_cons() {
        let mut heap = Heap::new(GcConfig::default());
        let form = read_one(&mut heap, b"{a 1 b 2}");
        let list_sym = heap.intern(b"list").unwrap();
        assert_eq!(heap.car(form), Some(list_sym));
        let args = heap.cdr(form).unwrap();
        assert_eq!(heap.list_length(args), 2);
    }

    #[test]
    fn colon_symbol_desugars_to_colon_call() {
        let mut heap = Heap::new(GcConfig::default());
        let form = read_one(&mut heap, b"point:x");
        let colon_sym = heap.intern(b":").unwrap();
        assert_eq!(heap.car(form), Some(colon_sym));
    }

    #[test]
    fn unterminated_list_is_a_syntax_error() {
        let mut heap = Heap::new(GcConfig::default());
        let err = Reader::new(&mut heap, b"(1 2").next_expr().unwrap_err();
        assert!(matches!(err, ReadError::Syntax(ReaderError::UnterminatedList(_))));
    }

    #[test]
    fn stray_close_delimiter_is_a_syntax_error() {
        let mut heap = Heap::new(GcConfig::default());
        let err = Reader::new(&mut heap, b")").next_expr().unwrap_err();
        assert!(matches!(
            err,
            ReadError::Syntax(ReaderError::StrayCloseDelimiter(_, ')'))
        ));
    }

    #[test]
    fn odd_alist_count_is_a_syntax_error() {
        let mut heap = Heap::new(GcConfig::default());
        let err = Reader::new(&mut heap, b"{a 1 b}").next_expr().unwrap_err();
        assert!(matches!(err, ReadError::Syntax(ReaderError::OddAlistCount(_))));
    }

    #[test]
    fn list_elements_survive_a_gc_cycle_triggered_mid_read() {
        let mut heap = Heap::new(GcConfig::default().with_capacity(4));
        let form = read_one(&mut heap, br#"("one" "two" "three" "four")"#);
        assert_eq!(heap.list_length(form), 4);
        let rendered: Vec<String> = heap
            .list_to_vec(form)
            .unwrap()
            .into_iter()
            .map(|v| heap.print_value(v))
            .collect();
        assert_eq!(rendered, vec!["\"one\"", "\"two\"", "\"three\"", "\"four\""]);
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_integers_round_trip(n in -1_000_000_000i64..1_000_000_000i64) {
            let mut heap = Heap::new(GcConfig::default());
            let source = n.to_string();
            let value = read_one(&mut heap, source.as_bytes());
            proptest::prop_assert_eq!(value, Value::Integer(n));
        }

        #[test]
        fn arbitrary_symbols_round_trip_through_print(name in "[a-zA-Z][a-zA-Z0-9_]{0,30}") {
            let mut heap = Heap::new(GcConfig::default());
            let value = read_one(&mut heap, name.as_bytes());
            proptest::prop_assert_eq!(heap.print_value(value), name);
        }

        #[test]
        fn arbitrary_well_formed_lists_read_without_error(n in 0usize..20) {
            let mut heap = Heap::new(GcConfig::default());
            let source: String = format!("({})", (0..n).map(|i| i.to_string()).collect::<Vec<_>>().join(" "));
            let value = read_one(&mut heap, source.as_bytes());
            proptest::prop_assert_eq!(heap.list_length(value), n as i64);
        }
    }
}

