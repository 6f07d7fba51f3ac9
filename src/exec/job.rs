// src/exec/job.rs

//! The job façade.
//!
//! A [`Job`] owns one child process and the tasks bridging its streams. Its
//! lifecycle is spawned → running → terminated → closed; the shared abort
//! token can be set from running or terminated and makes every worker stop.
//!
//! Worker tasks never return errors to the caller directly. They record them
//! in the job's failure log, and the controlling call (`communicate` or
//! `close`) turns the log into a single `JobError` once resources are
//! released.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use super::backend::{EchoProbe, SpawnRequest, Spawned, select_backend};
use super::bridge::{self, BridgeHandles};
use super::escalate::{self, ErrorPolicy, KillSignal};
use super::failures::FailureLog;
use super::options::{CommunicateOptions, SpawnOptions};
use super::password::PasswordInjector;
use super::shared::JobShared;
use super::watchdog::Deadman;
use crate::errors::{JobError, JobOutput};
use crate::types::{Chunk, CommandLine, JobStatus, ReadChunk, StreamName};

/// Interval for exit and delay polling.
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Pause between input lines.
const INPUT_LINE_GAP: Duration = Duration::from_millis(10);

/// How long `close` waits for output streams to finish after the process
/// exited. Grandchildren holding a stream open are cut off after this.
const STREAM_DRAIN_GRACE: Duration = Duration::from_secs(2);

pub struct Job {
    shared: Arc<JobShared>,
    /// Dropped at close so the pty master is released.
    echo_probe: Option<EchoProbe>,
    tty: bool,
    readers: Vec<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
    deadman: Option<Deadman>,
    /// Stdout bytes taken off the queue by `read` but not yet returned.
    unread: Vec<u8>,
    stdin_closed: bool,
    closed: bool,
    stdout: String,
    stderr: String,
}

impl Job {
    /// Start `command` and its bridge tasks. Must be called inside a tokio
    /// runtime.
    ///
    /// A program that cannot be started does not produce an `Err`: the job
    /// comes back already terminated and closed, with the launch failure
    /// recorded and described on stderr. `Err` is reserved for configuration
    /// problems (empty command, unsupported mode).
    pub fn spawn(command: impl Into<CommandLine>, options: &SpawnOptions) -> Result<Self, JobError> {
        let tokens = command.into().into_tokens()?;
        let (program, args) = tokens
            .split_first()
            .ok_or_else(|| JobError::Config("command must not be empty".to_string()))?;
        let backend = select_backend(options.pty)?;

        let env = options.merged_env();
        let request = SpawnRequest {
            program,
            args,
            cwd: options.cwd.as_deref(),
            env: &env,
        };
        debug!(program, ?args, cwd = ?options.cwd, backend = backend.name(), "spawning job");

        match backend.spawn(&request) {
            Ok(spawned) => Ok(Self::started(program, spawned, options)),
            Err(err) => Ok(Self::launch_failed(program, err, options)),
        }
    }

    fn started(program: &str, spawned: Spawned, options: &SpawnOptions) -> Self {
        let Spawned {
            child,
            stdout,
            stderr,
            stdin,
            terminal,
        } = spawned;

        let shared = Arc::new(JobShared::new(
            program.to_string(),
            Some(child),
            Arc::clone(&options.kill_signals),
        ));
        info!(job = %shared.name, pid = ?shared.pid, pty = terminal.is_some(), "job started");

        let BridgeHandles { readers, writer } = bridge::start(&shared, stdout, stderr, stdin);

        Self {
            shared,
            tty: terminal.as_ref().is_some_and(EchoProbe::is_tty),
            echo_probe: terminal,
            readers,
            writer: Some(writer),
            dispatcher: None,
            deadman: None,
            unread: Vec::new(),
            stdin_closed: false,
            closed: false,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn launch_failed(program: &str, err: std::io::Error, options: &SpawnOptions) -> Self {
        warn!(program, error = %err, "failed to launch job");
        let shared = Arc::new(JobShared::new(
            program.to_string(),
            None,
            Arc::clone(&options.kill_signals),
        ));

        let error = shared.record_failure("spawner", JobError::launch(program, err));
        let stderr = format!("EXCEPTION: {error}");
        shared.append(StreamName::Stderr, stderr.clone().into_bytes());

        Self {
            shared,
            echo_probe: None,
            tty: false,
            readers: Vec::new(),
            writer: None,
            dispatcher: None,
            deadman: None,
            unread: Vec::new(),
            stdin_closed: true,
            closed: true,
            stdout: String::new(),
            stderr,
        }
    }

    /// Feed passwords and input, wait for the process to finish, then close.
    ///
    /// Cleanup always runs. Any failure recorded along the way is returned
    /// after the job is closed. Invalid options close the job too, but the
    /// configuration error is not recorded in its failure log.
    pub async fn communicate(&mut self, options: &CommunicateOptions) -> Result<(), JobError> {
        if let Err(err) = options.validate() {
            warn!(job = %self.shared.name, error = %err, "invalid communicate options; closing job");
            if let Err(close_err) = self.close(true).await {
                debug!(job = %self.shared.name, error = %close_err, "close after invalid options failed");
            }
            return Err(err);
        }
        if self.closed {
            return self.raise_if_exceptions();
        }

        let driven = self.drive(options).await;
        let closed = self.close(true).await;

        match (closed, driven) {
            (Err(err), _) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn drive(&mut self, options: &CommunicateOptions) -> Result<(), JobError> {
        let deadline = options.timeout.map(|limit| Instant::now() + limit);
        if let Some(limit) = options.timeout {
            debug!(job = %self.shared.name, ?limit, "arming deadman timer");
            self.deadman = Some(Deadman::arm(Arc::clone(&self.shared), limit));
        }
        if self.dispatcher.is_none() {
            self.dispatcher = Some(bridge::spawn_dispatcher(
                Arc::clone(&self.shared),
                options.interactive,
            ));
        }

        if !options.passwords.is_empty() {
            let injector = PasswordInjector::new(
                &self.shared,
                options.password_policy,
                options.effective_password_timeout(),
                deadline,
            );
            match &self.echo_probe {
                Some(probe) => injector.inject_pty(probe, &options.passwords).await?,
                None => injector.inject_piped(&options.passwords).await,
            }
        }

        if let Some(input) = &options.input {
            self.send_input(input, options.input_delay).await;
        }
        if self.echo_probe.is_none() && options.close_stdin {
            self.close_stdin();
        }

        self.wait_for_exit().await;
        if let Some(deadman) = self.deadman.take() {
            deadman.disarm().await;
        }
        self.join_dispatcher().await;
        Ok(())
    }

    async fn send_input(&self, input: &[u8], delay: Duration) {
        if !self.pause_while_alive(delay).await {
            debug!(job = %self.shared.name, "job finished before input was sent");
            return;
        }

        let lines = split_input_lines(input);
        debug!(job = %self.shared.name, lines = lines.len(), "sending input");
        for line in lines {
            self.shared.input.push(Chunk::Data(line));
            sleep(INPUT_LINE_GAP).await;
        }
    }

    /// Sleep for `delay` unless the job ends first. Returns `true` if the job
    /// is still running afterwards.
    async fn pause_while_alive(&self, delay: Duration) -> bool {
        let until = Instant::now() + delay;
        loop {
            if self.shared.abort.is_cancelled() || !self.shared.is_alive() {
                return false;
            }
            let now = Instant::now();
            if now >= until {
                return true;
            }
            tokio::select! {
                _ = self.shared.abort.cancelled() => return false,
                _ = sleep((until - now).min(EXIT_POLL)) => {}
            }
        }
    }

    async fn wait_for_exit(&self) {
        while self.shared.is_alive() {
            tokio::select! {
                _ = self.shared.abort.cancelled() => {
                    debug!(job = %self.shared.name, "stopped waiting for exit on abort");
                    return;
                }
                _ = sleep(EXIT_POLL) => {}
            }
        }
    }

    async fn join_dispatcher(&mut self) {
        let Some(mut handle) = self.dispatcher.take() else {
            return;
        };
        match timeout(STREAM_DRAIN_GRACE, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(job = %self.shared.name, error = %err, "dispatcher task failed"),
            Err(_elapsed) => {
                warn!(job = %self.shared.name, "output streams still open after exit; abandoning them");
                handle.abort();
            }
        }
    }

    /// Close without waiting for a natural exit.
    pub async fn close(&mut self, force: bool) -> Result<(), JobError> {
        self.close_with_grace(None, force).await
    }

    /// Shut the job down and release everything it holds.
    ///
    /// 1. Optionally give the process `grace` to exit on its own.
    /// 2. Send the mildest termination signal; escalate if `force` is set and
    ///    the process survived.
    /// 3. Stop the deadman, end stdin, collect remaining output.
    /// 4. Render `stdout`/`stderr` and report recorded failures.
    ///
    /// Calling it again is a no-op that returns `Ok`.
    pub async fn close_with_grace(
        &mut self,
        grace: Option<Duration>,
        force: bool,
    ) -> Result<(), JobError> {
        if self.closed {
            return Ok(());
        }
        debug!(job = %self.shared.name, ?grace, force, "closing job");

        if let Some(grace) = grace {
            self.pause_while_alive(grace).await;
        }
        escalate::terminate(&self.shared).await;
        if force && !self.shared.abort.is_cancelled() && self.shared.is_alive() {
            // Recorded only; surfaced below with everything else.
            if let Err(err) = escalate::kill(&self.shared, ErrorPolicy::Record).await {
                debug!(job = %self.shared.name, error = %err, "forced kill failed");
            }
        }

        if let Some(deadman) = self.deadman.take() {
            deadman.disarm().await;
        }
        self.close_stdin();

        let exited = !self.shared.is_alive();
        if exited {
            self.finish_streams().await;
        }
        self.stop_tasks().await;
        self.echo_probe = None;
        self.drain_leftovers();

        let (stdout, stderr) = self.shared.render_output();
        self.stdout = stdout;
        self.stderr = stderr;
        self.closed = true;
        info!(
            job = %self.shared.name,
            status = ?self.shared.status(),
            failures = self.shared.failures().len(),
            "job closed"
        );

        self.shared.raise_if_exceptions()
    }

    /// Let the dispatcher (or, without one, the readers) run to the end of
    /// both streams.
    async fn finish_streams(&mut self) {
        if self.dispatcher.is_some() {
            self.join_dispatcher().await;
            return;
        }
        let until = Instant::now() + STREAM_DRAIN_GRACE;
        let mut running = Vec::new();
        for mut reader in std::mem::take(&mut self.readers) {
            let left = until.saturating_duration_since(Instant::now());
            if timeout(left, &mut reader).await.is_err() {
                debug!(job = %self.shared.name, "reader still running at close");
                running.push(reader);
            }
        }
        self.readers = running;
    }

    async fn stop_tasks(&mut self) {
        let mut handles = std::mem::take(&mut self.readers);
        handles.extend(self.writer.take());
        handles.extend(self.dispatcher.take());
        for handle in handles {
            handle.abort();
            match handle.await {
                Err(err) if !err.is_cancelled() => {
                    warn!(job = %self.shared.name, error = %err, "bridge task failed");
                }
                _ => {}
            }
        }
    }

    /// Move whatever is still queued into the accumulation buffers.
    fn drain_leftovers(&mut self) {
        if !self.unread.is_empty() {
            let unread = std::mem::take(&mut self.unread);
            self.shared.append(StreamName::Stdout, unread);
        }
        while let Some((stream, chunk)) = self.shared.output.try_pop() {
            match chunk {
                Chunk::Data(data) => self.shared.append(stream, data),
                Chunk::End => {
                    self.shared.stream_closed();
                }
            }
        }
    }

    /// Non-blocking: how the process ended, or `None` while it runs.
    pub fn poll(&self) -> Option<JobStatus> {
        if self.shared.is_alive() {
            None
        } else {
            self.shared.status()
        }
    }

    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// Escalate through the kill signals until the process dies.
    pub async fn kill(&self, policy: ErrorPolicy) -> Result<(), JobError> {
        escalate::kill(&self.shared, policy).await
    }

    /// One mild termination attempt.
    pub async fn terminate(&self) {
        escalate::terminate(&self.shared).await;
    }

    pub fn send_signal(&self, signal: KillSignal) -> Result<(), JobError> {
        self.shared
            .send_signal(signal)
            .map_err(|err| JobError::io(format!("sending {signal}"), err))
    }

    /// Queue bytes for the child's stdin. With `block`, wait until the writer
    /// has taken everything queued so far.
    pub async fn write(&self, data: impl Into<Vec<u8>>, block: bool) -> Result<(), JobError> {
        if self.stdin_closed {
            return Err(JobError::Execution(format!(
                "stdin of {} is already closed",
                self.shared.name
            )));
        }
        if !self.shared.is_alive() {
            return Err(JobError::Execution(format!(
                "cannot write to {}: process is not running",
                self.shared.name
            )));
        }

        self.shared.input.push(Chunk::Data(data.into()));
        if block {
            tokio::select! {
                _ = self.shared.abort.cancelled() => {}
                _ = self.shared.input.wait_drained() => {}
            }
        }
        Ok(())
    }

    /// End the child's stdin. Idempotent.
    pub fn close_stdin(&mut self) {
        if self.stdin_closed {
            return;
        }
        self.stdin_closed = true;
        self.shared.input.push(Chunk::End);
    }

    /// Take stdout directly from the output queue instead of letting the
    /// dispatcher accumulate it. At most `max_size` bytes are returned.
    ///
    /// Stderr chunks met on the way are accumulated as usual.
    pub async fn read(&mut self, max_size: usize, block: bool) -> ReadChunk {
        let max_size = max_size.max(1);
        loop {
            if !self.unread.is_empty() {
                let take = max_size.min(self.unread.len());
                let rest = self.unread.split_off(take);
                let data = std::mem::replace(&mut self.unread, rest);
                return ReadChunk::Data(data);
            }
            if self.shared.open_streams() == 0 {
                return ReadChunk::Closed;
            }

            let item = if block {
                tokio::select! {
                    _ = self.shared.abort.cancelled() => return ReadChunk::Closed,
                    item = self.shared.output.pop() => item,
                }
            } else {
                match self.shared.output.try_pop() {
                    Some(item) => Some(item),
                    None => return ReadChunk::Pending,
                }
            };

            match item {
                None => return ReadChunk::Closed,
                Some((StreamName::Stdout, Chunk::Data(data))) => self.unread.extend(data),
                Some((StreamName::Stderr, Chunk::Data(data))) => {
                    self.shared.append(StreamName::Stderr, data);
                }
                Some((stream, Chunk::End)) => {
                    let remaining = self.shared.stream_closed();
                    debug!(job = %self.shared.name, %stream, remaining, "stream ended during read");
                }
            }
        }
    }

    /// Report recorded failures: nothing, the only one, or a composite.
    pub fn raise_if_exceptions(&self) -> Result<(), JobError> {
        self.shared.raise_if_exceptions()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// `None` when the program never started.
    pub fn pid(&self) -> Option<u32> {
        self.shared.pid
    }

    /// Exit code; `None` while running or when killed by a signal.
    pub fn returncode(&self) -> Option<i32> {
        self.shared.status().and_then(|status| status.code())
    }

    pub fn signal(&self) -> Option<i32> {
        self.shared.status().and_then(|status| status.signal())
    }

    pub fn terminated(&self) -> bool {
        self.shared.terminated()
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Complete only once the job is closed.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Complete only once the job is closed.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn failures(&self) -> FailureLog {
        self.shared.failures()
    }

    pub fn output(&self) -> JobOutput {
        JobOutput {
            name: self.shared.name.clone(),
            pid: self.shared.pid,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            returncode: self.returncode(),
            signal: self.signal(),
            terminated: self.terminated(),
            closed: self.closed,
        }
    }

    /// Terminal echo state; `None` without a pty, once closed, or if it
    /// cannot be read.
    pub fn echo_enabled(&self) -> Option<bool> {
        let probe = self.echo_probe.as_ref()?;
        match probe.echo_enabled() {
            Ok(enabled) => Some(enabled),
            Err(err) => {
                debug!(job = %self.shared.name, error = %err, "cannot read echo flag");
                None
            }
        }
    }

    /// Whether the job was started on a pseudo-terminal.
    pub fn is_tty(&self) -> bool {
        self.tty
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if !self.closed {
            // Stops the bridge tasks; the child is killed when the last
            // reference to it goes away.
            debug!(job = %self.shared.name, "job dropped without close");
            self.shared.abort.cancel();
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.shared.name)
            .field("pid", &self.shared.pid)
            .field("status", &self.shared.status())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Split input into newline-terminated lines; a final line without a newline
/// stays that way.
fn split_input_lines(input: &[u8]) -> Vec<Vec<u8>> {
    input
        .split_inclusive(|&byte| byte == b'\n')
        .map(<[u8]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::split_input_lines;

    #[test]
    fn input_lines_keep_their_terminators() {
        let lines = split_input_lines(b"one\ntwo\nthree");
        assert_eq!(
            lines,
            vec![b"one\n".to_vec(), b"two\n".to_vec(), b"three".to_vec()]
        );
        assert!(split_input_lines(b"").is_empty());
    }
}
