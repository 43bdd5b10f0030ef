//! The `Interpreter`: owns the heap, the global environment, the host
//! table, and the rescue stack, and wires the primitive registry into a
//! fresh global environment at construction.
//!
//! Grounded on the teacher's top-level `Runtime`/`CompilationContext`
//! shape (one struct bundling every process-wide singleton the design
//! notes warn against scattering as bare statics, §9 "Global singletons").

use crate::config::InterpreterConfig;
use crate::host::HostTable;
use crate::primitives;
use crate::trap::RescueStack;
use shi_gc::{Handle, Heap, PrimitiveId, Value};
use shi_util::error::{EvalError, EvalOutcome, RuntimeError};

/// Everything the evaluator needs that must outlive any single GC cycle:
/// the global environment and a handful of frequently-consulted interned
/// symbols. None of these may be stored as a bare `Value` field — only
/// the symbol list, the root registry, and host watcher records are
/// forwarded during a collection (§3.6), so anything else held long-term
/// is kept alive through a [`Handle`] in a frame that is never popped.
struct Permanent {
    global_env: Handle,
    quote_sym: Handle,
    star_env_sym: Handle,
    star_args_sym: Handle,
}

pub struct Interpreter {
    pub heap: Heap,
    pub host: HostTable,
    pub rescue: RescueStack,
    pub config: InterpreterConfig,
    permanent: Permanent,
    gensym_counter: u64,
    /// Mutable splitmix64 state backing the `rand` primitive.
    pub(crate) rng_state: u64,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Result<Self, RuntimeError> {
        let mut heap = Heap::new(config.gc);
        heap.enter_frame();

        let global_env = heap.alloc_object(Value::Nil)?;
        let global_env_h = heap.root(global_env);
        let quote_sym = heap.intern(b"quote")?;
        let quote_sym_h = heap.root(quote_sym);
        let star_env_sym = heap.intern(b"*env*")?;
        let star_env_sym_h = heap.root(star_env_sym);
        let star_args_sym = heap.intern(b"*args*")?;
        let star_args_sym_h = heap.root(star_args_sym);

        for (index, entry) in primitives::TABLE.iter().enumerate() {
            let name_sym = heap.intern(entry.name.as_bytes())?;
            let id = Value::Primitive(PrimitiveId(index as u32));
            heap.obj_set(global_env, name_sym, id)?;
        }

        Ok(Self {
            heap,
            host: HostTable::new(),
            rescue: RescueStack::new(),
            config,
            permanent: Permanent {
                global_env: global_env_h,
                quote_sym: quote_sym_h,
                star_env_sym: star_env_sym_h,
                star_args_sym: star_args_sym_h,
            },
            gensym_counter: 0,
            rng_state: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x2545F4914F6CDD1D),
        })
    }

    pub fn global_env(&self) -> Value {
        self.heap.get_root(self.permanent.global_env)
    }

    pub fn quote_sym(&self) -> Value {
        self.heap.get_root(self.permanent.quote_sym)
    }

    pub fn star_env_sym(&self) -> Value {
        self.heap.get_root(self.permanent.star_env_sym)
    }

    /// `gensym`: allocates a Symbol bearing a name no ordinary `intern`
    /// call could ever produce, and bypasses the interned symbol list
    /// entirely (§4.7) so it is never returned by a later `(sym "...")`
    /// lookup.
    pub fn gensym(&mut self) -> Result<Value, RuntimeError> {
        self.gensym_counter += 1;
        let name = format!("%gensym-{}", self.gensym_counter);
        let addr = self
            .heap
            .alloc(shi_gc::HeapSlot::Symbol(name.into_bytes()))?;
        Ok(Value::Symbol(addr))
    }

    /// Binds `*args*` in the global environment to a proper list of
    /// String values, one per host argv entry (§6).
    pub fn bind_args(&mut self, argv: &[String]) -> Result<(), RuntimeError> {
        self.heap.enter_frame();
        let env_h = self.heap.root(self.global_env());
        let mut value_handles = Vec::with_capacity(argv.len());
        for arg in argv {
            let s = self.heap.alloc_string(arg.as_bytes().to_vec())?;
            value_handles.push(self.heap.root(s));
        }
        let values: Vec<Value> = value_handles.iter().map(|&h| self.heap.get_root(h)).collect();
        let list = self.heap.vec_to_list(&values)?;
        let env = self.heap.get_root(env_h);
        let args_sym = self.heap.get_root(self.permanent.star_args_sym);
        self.heap.obj_set(env, args_sym, list)?;
        self.heap.exit_frame();
        Ok(())
    }

    /// Reads every top-level form in `source` and evaluates them in
    /// sequence in the global environment, returning the last value (Nil
    /// if `source` contains no forms) — the entry point `shi-cli` uses
    /// for both "run a file" and "pipe a program via stdin" (§6).
    pub fn eval_source(&mut self, source: &str) -> Result<Value, EvalOutcome> {
        self.heap.enter_frame();
        let forms = self.read_all_forms(source);
        let forms = match forms {
            Ok(f) => f,
            Err(e) => {
                self.heap.exit_frame();
                return Err(e);
            }
        };

        let mut result = Value::Nil;
        let outcome = (|| -> Result<Value, EvalOutcome> {
            for h in &forms {
                let env = self.global_env();
                let form = self.heap.get_root(*h);
                result = crate::eval::eval(self, env, form)?;
            }
            Ok(result)
        })();
        self.heap.exit_frame();
        outcome
    }

    /// Reads every top-level form in `source`, rooting each as it comes
    /// back from the reader: a later `next_expr` call can itself allocate
    /// and trigger a collection, so a form already read can't sit in a
    /// plain `Vec<Value>` until it is actually evaluated.
    fn read_all_forms(&mut self, source: &str) -> Result<Vec<Handle>, EvalOutcome> {
        let mut form_handles = Vec::new();
        let mut reader = shi_reader::Reader::new(&mut self.heap, source.as_bytes());
        loop {
            match reader.next_expr() {
                Ok(Some(form)) => form_handles.push(reader.heap_mut().root(form)),
                Ok(None) => break,
                Err(e) => return Err(EvalError::User(e.to_string()).into()),
            }
        }
        Ok(form_handles)
    }

    /// Resolves an unbound-symbol error's display name for diagnostics.
    pub fn symbol_display(&self, sym: Value) -> String {
        match self.heap.symbol_name(sym) {
            Some(name) => String::from_utf8_lossy(name).into_owned(),
            None => self.heap.print_value(sym),
        }
    }
}
