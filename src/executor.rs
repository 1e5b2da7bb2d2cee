//! Background execution engine.
//!
//! An [`Engine`] owns one tokio current-thread runtime driven by a dedicated,
//! named OS thread. Connections submit their asynchronous I/O to it; all
//! submitted work runs on that one thread, interleaved at await points.
//!
//! The thread blocks on a shutdown signal inside `block_on`, so the runtime
//! stays alive between bursts of work even when nothing is pending. Stopping
//! the engine fires the signal, drops the runtime (cancelling unfinished
//! tasks) and joins the thread. A stopped engine cannot be restarted.
//!
//! Most programs want exactly one engine. [`global`] returns a shared
//! instance, started on first use; [`shutdown_global`] stops it.

use std::future::Future;
use std::sync::mpsc;
use std::thread::{self, JoinHandle as ThreadHandle, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{Error, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the engine thread
    pub thread_name: String,
    /// Stack size of the engine thread; the platform default when unset
    pub stack_size: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_name: "pgview-io".to_string(),
            stack_size: None,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine thread's name.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the engine thread's stack size in bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

// ============================================================================
// Engine
// ============================================================================

enum State {
    Idle,
    Running(Running),
    Stopped,
}

struct Running {
    handle: Handle,
    shutdown: oneshot::Sender<()>,
    thread: ThreadHandle<()>,
    thread_id: ThreadId,
}

/// A dedicated event loop for asynchronous database I/O.
pub struct Engine {
    config: EngineConfig,
    state: Mutex<State>,
}

impl Engine {
    /// Create an engine. Nothing runs until [`start`](Self::start).
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Idle),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the runtime and spawn the engine thread. Does nothing if the
    /// engine is already running; fails once it has been stopped.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            State::Running(_) => return Ok(()),
            State::Stopped => return Err(Error::EngineStopped),
            State::Idle => {}
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let (shutdown, signal) = oneshot::channel::<()>();

        let mut builder = thread::Builder::new().name(self.config.thread_name.clone());
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }
        let thread = builder.spawn(move || {
            // A dropped sender also ends the loop.
            runtime.block_on(async {
                let _ = signal.await;
            });
        })?;

        info!(thread = %self.config.thread_name, "execution engine started");

        *state = State::Running(Running {
            handle,
            shutdown,
            thread_id: thread.thread().id(),
            thread,
        });
        Ok(())
    }

    /// Stop the loop and join the engine thread.
    ///
    /// Unfinished tasks are cancelled. Stopping is final and idempotent. It
    /// cannot be done from the engine thread itself, which would have to join
    /// itself.
    pub fn stop(&self) -> Result<()> {
        let running = {
            let mut state = self.state.lock();
            if let State::Running(running) = &*state {
                if running.thread_id == thread::current().id() {
                    return Err(Error::StopFromEngineThread);
                }
            }
            match std::mem::replace(&mut *state, State::Stopped) {
                State::Running(running) => running,
                State::Idle | State::Stopped => return Ok(()),
            }
        };

        let _ = running.shutdown.send(());
        running.thread.join().map_err(|_| Error::EnginePanicked)?;

        info!(thread = %self.config.thread_name, "execution engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running(_))
    }

    /// Whether the calling thread is the engine thread.
    pub fn on_engine_thread(&self) -> bool {
        match &*self.state.lock() {
            State::Running(running) => running.thread_id == thread::current().id(),
            _ => false,
        }
    }

    /// Handle to the engine's runtime, for connections that drive their own
    /// tasks or need its I/O and timer drivers.
    pub fn handle(&self) -> Result<Handle> {
        self.running().map(|(handle, _)| handle)
    }

    /// Run `future` on the engine.
    pub fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Ok(self.handle()?.spawn(future))
    }

    /// Run `work` on the engine, then call `continuation` with its output on
    /// the engine thread. The continuation is skipped if the engine stops
    /// before `work` finishes.
    pub fn post<F, C>(&self, work: F, continuation: C) -> Result<()>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        C: FnOnce(F::Output) + Send + 'static,
    {
        self.spawn(async move { continuation(work.await) })
            .map(drop)
    }

    /// Run `future` on the engine and block the calling thread until it
    /// completes. Refused on the engine thread, which would deadlock.
    pub fn run<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (handle, engine_thread) = self.running()?;
        if engine_thread == thread::current().id() {
            warn!("refusing to block the execution engine thread");
            return Err(Error::BlockingOnEngineThread);
        }

        let (tx, rx) = mpsc::sync_channel(1);
        handle.spawn(async move {
            let _ = tx.send(future.await);
        });
        // A task dropped by shutdown or a panic drops the sender.
        rx.recv().map_err(|_| Error::TaskCancelled)
    }

    fn running(&self) -> Result<(Handle, ThreadId)> {
        match &*self.state.lock() {
            State::Running(running) => Ok((running.handle.clone(), running.thread_id)),
            State::Idle => {
                warn!(thread = %self.config.thread_name, "work submitted before the execution engine started");
                Err(Error::EngineNotStarted)
            }
            State::Stopped => {
                warn!(thread = %self.config.thread_name, "work submitted after the execution engine stopped");
                Err(Error::EngineStopped)
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "failed to stop execution engine on drop");
        }
    }
}

// ============================================================================
// Shared instance
// ============================================================================

static GLOBAL: OnceCell<Engine> = OnceCell::new();

/// Create and start the shared engine with `config`. Fails with
/// [`Error::AlreadyInitialized`] if it already exists.
pub fn init_global(config: EngineConfig) -> Result<&'static Engine> {
    let mut created = false;
    let engine = GLOBAL.get_or_try_init(|| {
        created = true;
        start_engine(config)
    })?;
    if !created {
        return Err(Error::AlreadyInitialized);
    }
    Ok(engine)
}

/// The shared engine, created with the default configuration and started on
/// first use. After [`shutdown_global`] it stays stopped.
pub fn global() -> Result<&'static Engine> {
    GLOBAL.get_or_try_init(|| start_engine(EngineConfig::default()))
}

/// Stop the shared engine, if it was ever created. Statics are never
/// dropped, so programs that need the engine thread joined before exit call
/// this during teardown.
pub fn shutdown_global() -> Result<()> {
    match GLOBAL.get() {
        Some(engine) => engine.stop(),
        None => Ok(()),
    }
}

fn start_engine(config: EngineConfig) -> Result<Engine> {
    let engine = Engine::new(config);
    engine.start()?;
    Ok(engine)
}
