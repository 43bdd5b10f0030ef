//! The host-facing primitive surface (§6): files, sockets, the process
//! environment, and the `ev-start`/`ev-stop` watcher bookkeeping. Also
//! `error` (§4.8 SUPPLEMENT), raising a catchable `EvalError::User`.

use crate::eval::eval_list;
use crate::host::{self, Resource, WatcherKind};
use crate::interpreter::Interpreter;
use shi_gc::Value;
use shi_util::error::{EvalError, EvalResult, HostError};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

fn one_arg(args: &[Value], form: &str) -> Result<Value, EvalError> {
    args.first().copied().ok_or_else(|| EvalError::Arity {
        form: form.to_string(),
        expected: "at least 1".to_string(),
        got: args.len(),
    })
}

fn int_arg(v: Value, form: &str) -> Result<i64, EvalError> {
    match v {
        Value::Integer(n) => Ok(n),
        _ => Err(EvalError::Type {
            form: form.to_string(),
            expected: "integer".to_string(),
        }),
    }
}

/// `(write fd str)` — writes every byte of `str` to `fd`; errors on a short
/// write. Returns Nil.
pub fn write(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let fd = int_arg(one_arg(&args, "write")?, "write")?;
    let s = *args.get(1).ok_or_else(|| EvalError::Arity {
        form: "write".to_string(),
        expected: "2".to_string(),
        got: args.len(),
    })?;
    let bytes = interp.heap.string_bytes(s).ok_or_else(|| EvalError::Type {
        form: "write".to_string(),
        expected: "string".to_string(),
    })?;
    let resource = interp.host.get_mut(fd).map_err(EvalError::from)?;
    host::host_write(resource, bytes).map_err(EvalError::from)?;
    Ok(Value::Nil)
}

/// `(read fd n)` — reads up to `n` bytes, returned as a (possibly empty)
/// String.
pub fn read(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let fd = int_arg(one_arg(&args, "read")?, "read")?;
    let n = int_arg(
        *args.get(1).ok_or_else(|| EvalError::Arity {
            form: "read".to_string(),
            expected: "2".to_string(),
            got: args.len(),
        })?,
        "read",
    )?;
    let resource = interp.host.get_mut(fd).map_err(EvalError::from)?;
    let bytes = host::host_read(resource, n.max(0) as usize).map_err(EvalError::from)?;
    Ok(interp.heap.alloc_string(bytes)?)
}

/// `(open path [mode])` — opens a file, returning an integer fd. `mode`
/// defaults to `"r"`; `"w"`/`"a"` open for writing/appending, anything else
/// for reading.
pub fn open(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let path_val = one_arg(&args, "open")?;
    let path_bytes = interp.heap.string_bytes(path_val).ok_or_else(|| EvalError::Type {
        form: "open".to_string(),
        expected: "string path".to_string(),
    })?;
    let path = String::from_utf8_lossy(path_bytes).into_owned();

    let mode = match args.get(1) {
        Some(v) => {
            let bytes = interp.heap.string_bytes(*v).ok_or_else(|| EvalError::Type {
                form: "open".to_string(),
                expected: "string mode".to_string(),
            })?;
            String::from_utf8_lossy(bytes).into_owned()
        }
        None => "r".to_string(),
    };

    let file = match mode.as_str() {
        "w" => std::fs::OpenOptions::new().write(true).create(true).truncate(true).open(&path),
        "a" => std::fs::OpenOptions::new().append(true).create(true).open(&path),
        _ => std::fs::OpenOptions::new().read(true).open(&path),
    }
    .map_err(HostError::from)
    .map_err(EvalError::from)?;

    Ok(Value::Integer(interp.host.insert(Resource::File(file))))
}

/// `(close fd)` — closes `fd`. Returns Nil.
pub fn close(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let fd = int_arg(one_arg(&args, "close")?, "close")?;
    interp.host.close(fd).map_err(EvalError::from)?;
    Ok(Value::Nil)
}

/// `(isatty fd)` — True iff `fd` names a terminal.
pub fn isatty(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let fd = int_arg(one_arg(&args, "isatty")?, "isatty")?;
    let resource = interp.host.get(fd).map_err(EvalError::from)?;
    Ok(if resource.is_tty() { Value::True } else { Value::Nil })
}

/// `(getenv name)` — String or Nil.
pub fn getenv(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let name_val = one_arg(&args, "getenv")?;
    let name_bytes = interp.heap.string_bytes(name_val).ok_or_else(|| EvalError::Type {
        form: "getenv".to_string(),
        expected: "string".to_string(),
    })?;
    let name = String::from_utf8_lossy(name_bytes).into_owned();
    match std::env::var(&name) {
        Ok(value) => Ok(interp.heap.alloc_string(value.into_bytes())?),
        Err(_) => Ok(Value::Nil),
    }
}

/// `(seconds)` — wall-clock seconds since the Unix epoch, as an Integer.
pub fn seconds(_interp: &mut Interpreter, _env: Value, _tail: Value) -> EvalResult<Value> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| HostError::Unsupported("system clock before the Unix epoch"))
        .map_err(EvalError::from)?;
    Ok(Value::Integer(now.as_secs() as i64))
}

/// `(sleep ms)` — blocks the calling thread for `ms` milliseconds.
pub fn sleep(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let ms = int_arg(one_arg(&args, "sleep")?, "sleep")?;
    std::thread::sleep(std::time::Duration::from_millis(ms.max(0) as u64));
    Ok(Value::Nil)
}

/// `(exit code)` — terminates the process immediately.
pub fn exit(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    use std::io::Write as _;
    let args = eval_list(interp, env, tail)?;
    let code = int_arg(one_arg(&args, "exit")?, "exit")?;
    let _ = std::io::stdout().flush();
    std::process::exit(code as i32);
}

/// `(socket domain type proto)` — a POSIX-style socket constructor. Only
/// AF_INET/SOCK_STREAM is meaningful before `bind-inet`; the returned fd is
/// always treated as non-blocking by `accept` (§6).
pub fn socket(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let _args = eval_list(interp, env, tail)?;
    Ok(Value::Integer(interp.host.insert(Resource::Pending { host: None, port: None })))
}

/// `(bind-inet fd host port)` — records the bind address; the fd becomes a
/// live `Listener` on the following `listen` call.
pub fn bind_inet(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let fd = int_arg(one_arg(&args, "bind-inet")?, "bind-inet")?;
    let host_val = *args.get(1).ok_or_else(|| EvalError::Arity {
        form: "bind-inet".to_string(),
        expected: "3".to_string(),
        got: args.len(),
    })?;
    let port = int_arg(
        *args.get(2).ok_or_else(|| EvalError::Arity {
            form: "bind-inet".to_string(),
            expected: "3".to_string(),
            got: args.len(),
        })?,
        "bind-inet",
    )?;
    let host_bytes = interp.heap.string_bytes(host_val).ok_or_else(|| EvalError::Type {
        form: "bind-inet".to_string(),
        expected: "string host".to_string(),
    })?;
    let host_str = String::from_utf8_lossy(host_bytes).into_owned();

    let resource = interp.host.get_mut(fd).map_err(EvalError::from)?;
    match resource {
        Resource::Pending { host, port: p } => {
            *host = Some(host_str);
            *p = Some(port as u16);
            Ok(Value::Nil)
        }
        _ => Err(EvalError::Host(HostError::Unsupported("fd is not a pending socket")).into()),
    }
}

/// `(listen fd backlog)` — begins listening on a previously `bind-inet`'d
/// fd. `backlog` is accepted but unused beyond `TcpListener`'s own queueing.
pub fn listen(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let fd = int_arg(one_arg(&args, "listen")?, "listen")?;

    let (host_str, port) = match interp.host.get(fd).map_err(EvalError::from)? {
        Resource::Pending {
            host: Some(h),
            port: Some(p),
        } => (h.clone(), *p),
        _ => {
            return Err(EvalError::Host(HostError::Unsupported(
                "fd must be bind-inet'd before listen",
            ))
            .into())
        }
    };

    let ip: Ipv4Addr = host_str.parse().map_err(|_| {
        EvalError::Type {
            form: "listen".to_string(),
            expected: "dotted-quad IPv4 address".to_string(),
        }
    })?;
    let listener = TcpListener::bind(SocketAddrV4::new(ip, port))
        .map_err(HostError::from)
        .map_err(EvalError::from)?;
    listener.set_nonblocking(true).map_err(HostError::from).map_err(EvalError::from)?;

    let slot = interp.host.get_mut(fd).map_err(EvalError::from)?;
    *slot = Resource::Listener(listener);
    Ok(Value::Nil)
}

/// `(accept fd)` — returns a client fd, or Nil if no connection is pending
/// (§5 "suspension points": this is the one place user code observes
/// would-block without a reactor).
pub fn accept(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let fd = int_arg(one_arg(&args, "accept")?, "accept")?;
    let resource = interp.host.get_mut(fd).map_err(EvalError::from)?;
    let listener = match resource {
        Resource::Listener(l) => l,
        _ => return Err(EvalError::Host(HostError::Unsupported("fd is not a listener")).into()),
    };
    match listener.accept() {
        Ok((stream, _addr)) => {
            stream.set_nonblocking(true).map_err(HostError::from).map_err(EvalError::from)?;
            Ok(Value::Integer(interp.host.insert(Resource::Stream(stream))))
        }
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::Interrupted => {
            Ok(Value::Nil)
        }
        Err(e) => Err(EvalError::from(HostError::from(e)).into()),
    }
}

/// `(ev-start type cb [arg])` — registers a watcher; returns its id. `arg`
/// is accepted (e.g. an fd for a read/write watcher, a delay for a timer)
/// but not itself interpreted, since the delivering reactor is out of scope
/// (§5 AMBIENT).
pub fn ev_start(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let kind_val = one_arg(&args, "ev-start")?;
    let kind_bytes = interp.heap.string_bytes(kind_val).ok_or_else(|| EvalError::Type {
        form: "ev-start".to_string(),
        expected: "string watcher kind".to_string(),
    })?;
    let kind = WatcherKind::parse(kind_bytes).ok_or_else(|| EvalError::Type {
        form: "ev-start".to_string(),
        expected: "one of read/write/timer/signal".to_string(),
    })?;
    let callback = *args.get(1).ok_or_else(|| EvalError::Arity {
        form: "ev-start".to_string(),
        expected: "at least 2".to_string(),
        got: args.len(),
    })?;
    // Pinned, not `root`ed: a frame-scoped handle would be truncated the
    // moment this primitive's own call frame exits, long before `ev-stop`.
    let callback_handle = interp.heap.pin(callback);
    Ok(Value::Integer(interp.host.register_watcher(kind, callback_handle)))
}

/// `(ev-stop id)` — True on success, Nil if `id` is unknown.
pub fn ev_stop(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let id = int_arg(one_arg(&args, "ev-stop")?, "ev-stop")?;
    Ok(if interp.host.stop_watcher(id, &mut interp.heap) { Value::True } else { Value::Nil })
}

/// `(term-raw t?)` — toggles raw mode on stdin.
#[cfg(unix)]
pub fn term_raw(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let enable = one_arg(&args, "term-raw")?.is_truthy();
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(0, &mut termios) != 0 {
            return Err(EvalError::from(HostError::from(std::io::Error::last_os_error())).into());
        }
        if enable {
            libc::cfmakeraw(&mut termios);
        } else {
            termios.c_lflag |= libc::ICANON | libc::ECHO;
        }
        if libc::tcsetattr(0, libc::TCSANOW, &termios) != 0 {
            return Err(EvalError::from(HostError::from(std::io::Error::last_os_error())).into());
        }
    }
    Ok(Value::Nil)
}

#[cfg(not(unix))]
pub fn term_raw(_interp: &mut Interpreter, _env: Value, _tail: Value) -> EvalResult<Value> {
    Err(EvalError::from(HostError::Unsupported("term-raw requires a Unix terminal")).into())
}

/// `(error msg)` (§4.8 SUPPLEMENT) — raises a catchable `EvalError::User`
/// carrying `msg`, the String's byte content.
pub fn error(interp: &mut Interpreter, env: Value, tail: Value) -> EvalResult<Value> {
    let args = eval_list(interp, env, tail)?;
    let msg_val = one_arg(&args, "error")?;
    let bytes = interp.heap.string_bytes(msg_val).ok_or_else(|| EvalError::Type {
        form: "error".to_string(),
        expected: "string".to_string(),
    })?;
    Err(EvalError::User(String::from_utf8_lossy(bytes).into_owned()).into())
}
