// src/exec/bridge.rs

//! I/O bridge between a child process and its job.
//!
//! - One reader per output stream pushes `(stream, chunk)` onto the output
//!   queue, then an end-marker when the stream closes.
//! - One writer drains the input queue into the child's stdin until it sees
//!   an end-marker. Nothing joins it automatically; the job pushes the marker
//!   when it is done with stdin.
//! - One dispatcher (started by `communicate`) drains the output queue into
//!   the accumulation buffers and optionally echoes each chunk.
//!
//! Every loop also watches the job's abort token and exits quietly once it
//! is cancelled.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::backend::{InputStream, OutputStream};
use super::shared::JobShared;
use crate::errors::JobError;
use crate::types::{Chunk, Interactive, StreamName};

/// Maximum bytes taken from a stream per read.
pub const READ_CHUNK_SIZE: usize = 1024;

/// How often the dispatcher re-checks stream and abort state while idle.
pub const DISPATCH_POLL: Duration = Duration::from_millis(100);

/// Handles for the tasks started at spawn time.
pub(crate) struct BridgeHandles {
    pub readers: Vec<JoinHandle<()>>,
    pub writer: JoinHandle<()>,
}

/// Start both readers and the stdin writer.
pub(crate) fn start(
    shared: &Arc<JobShared>,
    stdout: OutputStream,
    stderr: OutputStream,
    stdin: InputStream,
) -> BridgeHandles {
    let readers = vec![
        tokio::spawn(read_stream(Arc::clone(shared), StreamName::Stdout, stdout)),
        tokio::spawn(read_stream(Arc::clone(shared), StreamName::Stderr, stderr)),
    ];
    let writer = tokio::spawn(write_stdin(Arc::clone(shared), stdin));
    BridgeHandles { readers, writer }
}

pub(crate) fn spawn_dispatcher(shared: Arc<JobShared>, interactive: Interactive) -> JoinHandle<()> {
    tokio::spawn(dispatch(shared, interactive))
}

async fn read_stream(shared: Arc<JobShared>, stream: StreamName, mut reader: OutputStream) {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = tokio::select! {
            biased;
            _ = shared.abort.cancelled() => {
                debug!(job = %shared.name, %stream, "reader stopping on abort");
                break;
            }
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!(job = %shared.name, %stream, "end of stream");
                break;
            }
            Ok(len) => {
                trace!(job = %shared.name, %stream, len, "read chunk");
                shared.output.push((stream, Chunk::Data(buf[..len].to_vec())));
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if is_benign_disconnect(&err) => {
                debug!(job = %shared.name, %stream, error = %err, "stream disconnected");
                break;
            }
            Err(err) => {
                let origin = match stream {
                    StreamName::Stdout => "stdout reader",
                    StreamName::Stderr => "stderr reader",
                };
                shared.record_failure(origin, JobError::io(format!("reading {stream}"), err));
                break;
            }
        }
    }

    shared.output.push((stream, Chunk::End));
}

async fn write_stdin(shared: Arc<JobShared>, mut writer: InputStream) {
    // Once the child stops reading, the rest of the queue is discarded so
    // blocked `write` callers still see it drain.
    let mut broken = false;

    loop {
        let item = tokio::select! {
            biased;
            _ = shared.abort.cancelled() => {
                debug!(job = %shared.name, "stdin writer stopping on abort");
                break;
            }
            item = shared.input.pop() => item,
        };

        let data = match item {
            Some(Chunk::Data(data)) => data,
            Some(Chunk::End) | None => {
                debug!(job = %shared.name, "stdin writer received end-marker");
                break;
            }
        };
        if broken {
            continue;
        }

        trace!(job = %shared.name, len = data.len(), "writing to stdin");
        let written = async {
            writer.write_all(&data).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!(job = %shared.name, "child closed stdin; discarding further input");
                broken = true;
            }
            Err(err) => {
                shared.record_failure("stdin writer", JobError::io("writing stdin", err));
                broken = true;
            }
        }
    }

    if let Err(err) = writer.shutdown().await {
        trace!(job = %shared.name, error = %err, "stdin shutdown failed");
    }
}

async fn dispatch(shared: Arc<JobShared>, interactive: Interactive) {
    debug!(job = %shared.name, ?interactive, "dispatcher started");

    while shared.open_streams() > 0 {
        let next = tokio::select! {
            biased;
            _ = shared.abort.cancelled() => {
                debug!(job = %shared.name, "dispatcher stopping on abort");
                break;
            }
            next = timeout(DISPATCH_POLL, shared.output.pop()) => next,
        };

        let (stream, chunk) = match next {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(_idle) => continue,
        };

        match chunk {
            Chunk::End => {
                let remaining = shared.stream_closed();
                debug!(job = %shared.name, %stream, remaining, "output stream finished");
            }
            Chunk::Data(data) => {
                if interactive == Interactive::Echo {
                    echo_chunk(stream, &data).await;
                }
                shared.append(stream, data);
            }
        }
    }

    debug!(job = %shared.name, "dispatcher finished");
}

async fn echo_chunk(stream: StreamName, data: &[u8]) {
    let echoed = match stream {
        StreamName::Stdout => {
            let mut out = tokio::io::stdout();
            match out.write_all(data).await {
                Ok(()) => out.flush().await,
                Err(err) => Err(err),
            }
        }
        StreamName::Stderr => {
            let mut err_out = tokio::io::stderr();
            match err_out.write_all(data).await {
                Ok(()) => err_out.flush().await,
                Err(err) => Err(err),
            }
        }
    };
    if let Err(err) = echoed {
        warn!(%stream, error = %err, "failed to echo job output");
    }
}

#[cfg(unix)]
fn is_benign_disconnect(err: &io::Error) -> bool {
    use nix::libc;

    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::EBADF || code == libc::EIO || code == libc::EPIPE
    )
}

#[cfg(not(unix))]
fn is_benign_disconnect(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}
