//! The host-facing primitive surface (§6): file descriptors, sockets, the
//! watcher registry, and terminal raw-mode toggling.
//!
//! Grounded on the teacher's `cfg(unix)` / `cfg(windows)` split for
//! platform-dependent code (`fgc`'s memory-mapping backend); everything
//! else uses `std::fs`/`std::net`/`std::io` directly, per §6's note that
//! these are implemented "to the exact contract of §6, using host
//! standard-library facilities" rather than a production-grade I/O layer.

use shi_util::error::HostError;
use shi_util::index_vec::IndexVec;
use std::fs::File;
use std::io::{Read as _, Write as _};
use std::net::{TcpListener, TcpStream};

shi_util::define_idx! {
    /// An index into the host's file-descriptor table, returned to user
    /// code as a plain `Value::Integer`.
    pub struct HostFd;
}

/// One open host resource. `Pending` models a `socket()` call that has not
/// yet been `bind-inet`'d to an address (§6's `socket`/`bind-inet`/
/// `listen` sequence).
pub enum Resource {
    Stdin,
    Stdout,
    Stderr,
    File(File),
    Pending { host: Option<String>, port: Option<u16> },
    Listener(TcpListener),
    Stream(TcpStream),
}

impl Resource {
    pub fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Resource::Stdin => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "stdin is not writable",
            )),
            Resource::Stdout => std::io::stdout().write_all(bytes),
            Resource::Stderr => std::io::stderr().write_all(bytes),
            Resource::File(f) => f.write_all(bytes),
            Resource::Stream(s) => s.write_all(bytes),
            Resource::Pending { .. } | Resource::Listener(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "descriptor is not an open stream",
            )),
        }
    }

    pub fn read_upto(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let read = match self {
            Resource::Stdin => std::io::stdin().read(&mut buf)?,
            Resource::Stdout | Resource::Stderr => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "descriptor is not readable",
                ))
            }
            Resource::File(f) => f.read(&mut buf)?,
            Resource::Stream(s) => s.read(&mut buf)?,
            Resource::Pending { .. } | Resource::Listener(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "descriptor is not an open stream",
                ))
            }
        };
        buf.truncate(read);
        Ok(buf)
    }

    pub fn is_tty(&self) -> bool {
        match self {
            #[cfg(unix)]
            Resource::Stdin => unsafe { libc::isatty(0) != 0 },
            #[cfg(unix)]
            Resource::Stdout => unsafe { libc::isatty(1) != 0 },
            #[cfg(unix)]
            Resource::Stderr => unsafe { libc::isatty(2) != 0 },
            #[cfg(not(unix))]
            Resource::Stdin | Resource::Stdout | Resource::Stderr => false,
            _ => false,
        }
    }
}

/// A registered `ev-start` watcher, kept only as bookkeeping: the reactor
/// that would actually deliver events is out of scope (§1, §5 AMBIENT
/// note). The callback Value is kept alive across GC via a pinned handle
/// (not an ordinary frame-scoped [`shi_gc::Handle`], which would be
/// truncated the moment `ev-start`'s own call frame exits) per §3.6's "any
/// Value referenced by a host-registered callback record" root rule.
pub struct Watcher {
    pub kind: WatcherKind,
    pub callback: shi_gc::PinnedHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherKind {
    Read,
    Write,
    Timer,
    Signal,
}

impl WatcherKind {
    pub fn parse(name: &[u8]) -> Option<Self> {
        match name {
            b"read" => Some(WatcherKind::Read),
            b"write" => Some(WatcherKind::Write),
            b"timer" => Some(WatcherKind::Timer),
            b"signal" => Some(WatcherKind::Signal),
            _ => None,
        }
    }
}

/// The process-wide file-descriptor table and watcher registry. Kept as a
/// single struct on [`crate::interpreter::Interpreter`] rather than a
/// process-level global, per the design notes' "avoid process-level
/// globals so multiple interpreter instances are possible."
pub struct HostTable {
    fds: IndexVec<HostFd, Option<Resource>>,
    watchers: Vec<Option<Watcher>>,
}

impl HostTable {
    pub fn new() -> Self {
        let mut fds = IndexVec::new();
        fds.push(Some(Resource::Stdin));
        fds.push(Some(Resource::Stdout));
        fds.push(Some(Resource::Stderr));
        Self {
            fds,
            watchers: Vec::new(),
        }
    }

    pub fn get_mut(&mut self, fd: i64) -> Result<&mut Resource, HostError> {
        let idx = HostFdIdx::from_raw(fd)?;
        self.fds
            .get_mut(idx.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(HostError::BadFd(fd))
    }

    pub fn get(&self, fd: i64) -> Result<&Resource, HostError> {
        let idx = HostFdIdx::from_raw(fd)?;
        self.fds
            .get(idx.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(HostError::BadFd(fd))
    }

    pub fn insert(&mut self, resource: Resource) -> i64 {
        let idx = self.fds.push(Some(resource));
        raw_of(idx)
    }

    pub fn close(&mut self, fd: i64) -> Result<(), HostError> {
        let idx = HostFdIdx::from_raw(fd)?;
        match self.fds.get_mut(idx.0) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(HostError::BadFd(fd)),
        }
    }

    pub fn register_watcher(&mut self, kind: WatcherKind, callback: shi_gc::PinnedHandle) -> i64 {
        let id = self.watchers.len();
        self.watchers.push(Some(Watcher { kind, callback }));
        id as i64
    }

    /// Deterministically stops and releases a watcher, unpinning its
    /// callback so the collector may reclaim it. Returns whether one was
    /// found (§6: "True on success, Nil if unknown").
    pub fn stop_watcher(&mut self, id: i64, heap: &mut shi_gc::Heap) -> bool {
        if id < 0 {
            return false;
        }
        match self.watchers.get_mut(id as usize) {
            Some(slot @ Some(_)) => {
                let watcher = slot.take().expect("matched Some above");
                heap.unpin(watcher.callback);
                true
            }
            _ => false,
        }
    }
}

impl Default for HostTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A validated, in-range index into the fd table, distinct from the raw
/// `i64` user code passes around.
struct HostFdIdx(HostFd);

impl HostFdIdx {
    fn from_raw(fd: i64) -> Result<Self, HostError> {
        if fd < 0 {
            return Err(HostError::BadFd(fd));
        }
        Ok(Self(shi_util::index_vec::Idx::from_usize(fd as usize)))
    }
}

fn raw_of(fd: HostFd) -> i64 {
    shi_util::index_vec::Idx::index(fd) as i64
}

/// `(write fd str)`: writes every byte, erroring on a short write (§6).
pub fn host_write(resource: &mut Resource, bytes: &[u8]) -> Result<(), HostError> {
    resource.write_all(bytes)?;
    Ok(())
}

/// `(read fd n)`: reads up to `n` bytes, possibly empty on EOF (§6).
pub fn host_read(resource: &mut Resource, n: usize) -> Result<Vec<u8>, HostError> {
    Ok(resource.read_upto(n)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_fds_are_preregistered() {
        let table = HostTable::new();
        assert!(table.get(0).is_ok());
        assert!(table.get(1).is_ok());
        assert!(table.get(2).is_ok());
    }

    #[test]
    fn close_then_get_fails() {
        let mut table = HostTable::new();
        let fd = table.insert(Resource::Pending {
            host: None,
            port: None,
        });
        table.close(fd).unwrap();
        assert!(matches!(table.get(fd), Err(HostError::BadFd(_))));
    }

    #[test]
    fn negative_fd_is_bad() {
        let table = HostTable::new();
        assert!(matches!(table.get(-1), Err(HostError::BadFd(-1))));
    }

    #[test]
    fn stop_unknown_watcher_returns_false() {
        let mut table = HostTable::new();
        let mut heap = shi_gc::Heap::new(shi_gc::GcConfig::default());
        assert!(!table.stop_watcher(42, &mut heap));
    }

    #[test]
    fn registered_watcher_callback_survives_a_gc_cycle() {
        let mut table = HostTable::new();
        let mut heap = shi_gc::Heap::new(shi_gc::GcConfig::default().with_capacity(16));
        let callback = heap.cons(shi_gc::Value::Integer(7), shi_gc::Value::Nil).unwrap();
        let pinned = heap.pin(callback);
        let id = table.register_watcher(WatcherKind::Timer, pinned);

        heap.collect();
        let survived = heap.get_pinned(pinned);
        assert_eq!(heap.car(survived), Some(shi_gc::Value::Integer(7)));

        assert!(table.stop_watcher(id, &mut heap));
        assert!(!table.stop_watcher(id, &mut heap));
    }
}
