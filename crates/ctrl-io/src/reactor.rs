//! Level-triggered epoll wrapper
//!
//! The [`Reactor`] multiplexes readiness for any number of descriptors
//! and dispatches to exactly one callback per descriptor. Registration
//! misuse (adding a descriptor twice, modifying or removing an unknown
//! one) is surfaced as an error rather than silently ignored - those are
//! wiring bugs the caller needs to see.
//!
//! Callbacks may fail; the first failure aborts the current dispatch pass
//! and propagates out of [`Reactor::wait`], which is how fatal connection
//! and protocol errors terminate the event loop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::rc::Rc;
use std::time::Duration;

use crate::error::IoError;

/// Interest/readiness flag set for one descriptor.
///
/// Maps 1:1 onto the epoll event bits; level-triggered only.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness(u32);

impl Readiness {
    pub const NONE: Readiness = Readiness(0);
    pub const READABLE: Readiness = Readiness(libc::EPOLLIN as u32);
    pub const WRITABLE: Readiness = Readiness(libc::EPOLLOUT as u32);
    pub const PEER_CLOSED: Readiness = Readiness(libc::EPOLLRDHUP as u32);
    pub const PRIORITY: Readiness = Readiness(libc::EPOLLPRI as u32);
    pub const ERROR: Readiness = Readiness(libc::EPOLLERR as u32);
    pub const HANGUP: Readiness = Readiness(libc::EPOLLHUP as u32);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether any flag in `other` is set in `self`.
    pub fn intersects(self, other: Readiness) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn to_epoll(self) -> u32 {
        self.0
    }

    pub(crate) fn from_epoll(bits: u32) -> Self {
        Readiness(bits)
    }
}

impl BitOr for Readiness {
    type Output = Readiness;
    fn bitor(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 | rhs.0)
    }
}

impl BitOrAssign for Readiness {
    fn bitor_assign(&mut self, rhs: Readiness) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Readiness {
    type Output = Readiness;
    fn bitand(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 & rhs.0)
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (flag, name) in [
            (Readiness::READABLE, "READABLE"),
            (Readiness::WRITABLE, "WRITABLE"),
            (Readiness::PEER_CLOSED, "PEER_CLOSED"),
            (Readiness::PRIORITY, "PRIORITY"),
            (Readiness::ERROR, "ERROR"),
            (Readiness::HANGUP, "HANGUP"),
        ] {
            if self.intersects(flag) {
                set.entry(&name);
            }
        }
        set.finish()
    }
}

type Callback = Box<dyn FnMut(Readiness) -> anyhow::Result<()>>;

/// Readiness multiplexer: one epoll instance, one callback per
/// registered descriptor, a blocking [`Reactor::wait`] that dispatches.
pub struct Reactor {
    epfd: OwnedFd,
    callbacks: RefCell<HashMap<RawFd, Rc<RefCell<Callback>>>>,
}

const WAIT_BATCH: usize = 16;

impl Reactor {
    pub fn new() -> Result<Self, IoError> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd == -1 {
            return Err(IoError::syscall("epoll_create1"));
        }
        Ok(Reactor {
            epfd: unsafe { OwnedFd::from_raw_fd(epfd) },
            callbacks: RefCell::new(HashMap::new()),
        })
    }

    /// Register `fd` with the given interest and callback.
    pub fn add<F>(&self, fd: RawFd, interest: Readiness, callback: F) -> Result<(), IoError>
    where
        F: FnMut(Readiness) -> anyhow::Result<()> + 'static,
    {
        let mut callbacks = self.callbacks.borrow_mut();
        if callbacks.contains_key(&fd) {
            return Err(IoError::AlreadyRegistered { fd });
        }

        self.epoll_ctl(libc::EPOLL_CTL_ADD, fd, Some(interest))?;
        callbacks.insert(fd, Rc::new(RefCell::new(Box::new(callback) as Callback)));
        Ok(())
    }

    /// Replace the interest mask of a registered descriptor.
    pub fn modify(&self, fd: RawFd, interest: Readiness) -> Result<(), IoError> {
        if !self.callbacks.borrow().contains_key(&fd) {
            return Err(IoError::NotRegistered { fd });
        }
        self.epoll_ctl(libc::EPOLL_CTL_MOD, fd, Some(interest))
    }

    /// Deregister a descriptor.
    pub fn remove(&self, fd: RawFd) -> Result<(), IoError> {
        if self.callbacks.borrow_mut().remove(&fd).is_none() {
            return Err(IoError::NotRegistered { fd });
        }
        self.epoll_ctl(libc::EPOLL_CTL_DEL, fd, None)
    }

    /// Block until at least one descriptor is ready or `timeout` elapses
    /// (`None` = wait forever). Retries transparently on EINTR. Invokes
    /// each ready descriptor's callback once with the readiness observed
    /// in this pass; returns whether any event fired.
    pub fn wait(&self, timeout: Option<Duration>) -> anyhow::Result<bool> {
        let timeout_ms: libc::c_int = match timeout {
            Some(t) => t.as_millis().try_into().unwrap_or(libc::c_int::MAX),
            None => -1,
        };

        let mut events: [libc::epoll_event; WAIT_BATCH] =
            unsafe { std::mem::zeroed() };

        let nevents = loop {
            let n = unsafe {
                libc::epoll_wait(
                    self.epfd.as_raw_fd(),
                    events.as_mut_ptr(),
                    WAIT_BATCH as libc::c_int,
                    timeout_ms,
                )
            };
            if n == -1 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(IoError::Syscall {
                    op: "epoll_wait",
                    source: err,
                }
                .into());
            }
            break n as usize;
        };

        for event in &events[..nevents] {
            let fd = event.u64 as RawFd;
            // A callback earlier in this pass may have removed this
            // descriptor; skip it rather than dispatching to a gone fd.
            let callback = match self.callbacks.borrow().get(&fd) {
                Some(cb) => Rc::clone(cb),
                None => continue,
            };
            (callback.borrow_mut())(Readiness::from_epoll(event.events))?;
        }

        Ok(nevents != 0)
    }

    fn epoll_ctl(
        &self,
        op: libc::c_int,
        fd: RawFd,
        interest: Option<Readiness>,
    ) -> Result<(), IoError> {
        let mut event = libc::epoll_event {
            events: interest.map_or(0, Readiness::to_epoll),
            u64: fd as u64,
        };
        let event_ptr = if interest.is_some() {
            &mut event
        } else {
            std::ptr::null_mut()
        };

        let res = unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), op, fd, event_ptr) };
        if res == -1 {
            return Err(IoError::syscall("epoll_ctl"));
        }
        Ok(())
    }
}
