// src/exec/pty.rs

//! Pseudo-terminal backend (Unix).
//!
//! The child gets a new session whose controlling terminal is the pty slave,
//! wired to its stdin and stdout. Its stderr stays on a pipe so the two
//! streams can still be told apart. The parent keeps the master side:
//!
//! - one non-blocking handle for reading child output,
//! - one for writing child input,
//! - one for reading the terminal's echo flag ([`EchoProbe`]).
//!
//! Exec failures are reported by `spawn` itself, through the standard
//! library's close-on-exec error channel.

use std::fs::File;
use std::io::{self, IsTerminal, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll, ready};

use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::libc;
use nix::pty::{OpenptyResult, openpty};
use nix::sys::termios::{LocalFlags, tcgetattr};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use super::backend::{Backend, SpawnRequest, Spawned, base_command, missing_pipe};

#[derive(Debug, Clone, Copy, Default)]
pub struct PtyBackend;

impl Backend for PtyBackend {
    fn name(&self) -> &'static str {
        "pty"
    }

    fn spawn(&self, request: &SpawnRequest<'_>) -> io::Result<Spawned> {
        let OpenptyResult { master, slave } = openpty(None, None).map_err(io::Error::from)?;
        set_cloexec(&master)?;
        set_cloexec(&slave)?;

        let mut child = {
            let mut cmd = base_command(request);
            cmd.stdin(Stdio::from(slave.try_clone()?))
                .stdout(Stdio::from(slave.try_clone()?))
                .stderr(Stdio::piped());

            // SAFETY: only async-signal-safe calls between fork and exec.
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() < 0 {
                        return Err(io::Error::last_os_error());
                    }
                    if libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY as _, 0) < 0 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }

            cmd.spawn()?
            // `cmd` drops here, closing its copies of the slave.
        };
        drop(slave);

        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
        let reader = PtyStream::new(master.try_clone()?)?;
        let writer = PtyStream::new(master.try_clone()?)?;
        debug!(pid = ?child.id(), "pty child started");

        Ok(Spawned {
            child,
            stdout: Box::new(reader),
            stderr: Box::new(stderr),
            stdin: Box::new(writer),
            terminal: Some(EchoProbe { master }),
        })
    }
}

/// Read-only view of the pty's terminal settings.
#[derive(Debug)]
pub struct EchoProbe {
    master: OwnedFd,
}

impl EchoProbe {
    /// `true` while the terminal echoes typed input. Programs turn echo off
    /// while prompting for a password.
    pub fn echo_enabled(&self) -> io::Result<bool> {
        let attrs = tcgetattr(&self.master).map_err(io::Error::from)?;
        Ok(attrs.local_flags.contains(LocalFlags::ECHO))
    }

    pub fn is_tty(&self) -> bool {
        self.master.is_terminal()
    }
}

/// Non-blocking handle on the pty master driven by the tokio reactor.
#[derive(Debug)]
pub struct PtyStream {
    inner: AsyncFd<File>,
}

impl PtyStream {
    fn new(fd: OwnedFd) -> io::Result<Self> {
        set_nonblocking(&fd)?;
        // SAFETY: the `File` owns the descriptor and is only dropped with
        // the `AsyncFd`, so it stays open and unchanged while registered.
        let inner = unsafe { AsyncFd::register(File::from(fd)) }?;
        Ok(Self { inner })
    }
}

impl AsyncRead for PtyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.inner.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.read(unfilled)
            }) {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for PtyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.inner.poll_write_ready(cx))?;
            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.write(buf)
            }) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(io::Error::from)?;
    Ok(())
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL).map_err(io::Error::from)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;
    Ok(())
}
