//! Raw process-group and file-descriptor calls. All `unsafe` for the child
//! supervisor lives here.

use std::io;
use std::os::fd::RawFd;
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Where process-group signals go. The real implementation is [`KillPg`];
/// tests substitute a recorder.
pub trait SignalSink {
    fn signal_group(&self, pgid: i32, signal: i32) -> io::Result<()>;
}

/// Delivers signals with `killpg(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KillPg;

impl SignalSink for KillPg {
    fn signal_group(&self, pgid: i32, signal: i32) -> io::Result<()> {
        // Guard: pgid 0 would signal our own group.
        if pgid <= 0 {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        // SAFETY: killpg only takes plain integers. The group was created
        // by `new_process_group` for a child we spawned.
        let rc = unsafe { libc::killpg(pgid as libc::pid_t, signal) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Make the spawned process the leader of a new process group, so its
/// shell pipelines can be paused and terminated together.
pub fn new_process_group(cmd: &mut Command) {
    // SAFETY: setpgid(0, 0) is async-signal-safe (POSIX) and runs between
    // fork() and exec() without touching the parent's state.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Put `fd` into non-blocking mode.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl with F_GETFL/F_SETFL on a descriptor we own.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags == -1 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonpositive_group_is_refused() {
        let err = KillPg.signal_group(0, libc::SIGTERM).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn pipe_becomes_nonblocking() {
        let mut fds = [0; 2];
        // SAFETY: pipe writes two descriptors into the array.
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        set_nonblocking(fds[0]).unwrap();
        // SAFETY: reading the flags of a descriptor we just created.
        let flags = unsafe { libc::fcntl(fds[0], libc::F_GETFL) };
        assert_ne!(flags & libc::O_NONBLOCK, 0);
        // SAFETY: closing descriptors we own.
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }
}
