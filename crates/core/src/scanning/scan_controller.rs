use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::decoding::domain::code_decoder::{CodeDecoder, DecodeError};
use crate::scanning::domain::scan_policy::ScanSession;
use crate::scanning::domain::scanner_config::ScannerConfig;
use crate::shared::clock::{Clock, SystemClock};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("camera error: {0}")]
    Capture(#[from] CaptureError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

pub type ScanCallback = Box<dyn FnMut(String) + Send>;
pub type ErrorCallback = Box<dyn FnMut(ScanError) + Send>;

struct Callbacks {
    on_scan: ScanCallback,
    on_error: ErrorCallback,
}

/// Empty while the worker is acquiring the source or after `stop` took it.
type SharedSource = Arc<Mutex<Option<Box<dyn FrameSource>>>>;
type SharedDecoder = Arc<Mutex<Box<dyn CodeDecoder>>>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handles the controller keeps on a running session.
struct Worker {
    stopped: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    callbacks: Arc<Mutex<Option<Callbacks>>>,
    source: SharedSource,
    wake: Option<Sender<()>>,
}

/// Drives the continuous decode loop and reports new scans.
///
/// Each [`start`](Self::start) spawns one worker thread that acquires the
/// frame source, then repeatedly grabs a frame, decodes it and applies the
/// cooldown rule, pausing `scan_interval` between attempts. Only one decode
/// is ever in flight per controller.
///
/// [`stop`](Self::stop) is a hard boundary: once it returns, neither
/// callback fires again for that session. A decode already running is not
/// interrupted; its result is discarded. A source still being acquired is
/// released by the worker as soon as acquisition returns. Callbacks must not
/// wait on the controller itself, since `stop` waits for a running callback
/// to finish.
pub struct ScanController {
    config: ScannerConfig,
    decoder: SharedDecoder,
    clock: Arc<dyn Clock>,
    worker: Option<Worker>,
}

impl ScanController {
    pub fn new(decoder: Box<dyn CodeDecoder>) -> Self {
        Self {
            config: ScannerConfig::default(),
            decoder: Arc::new(Mutex::new(decoder)),
            clock: Arc::new(SystemClock),
            worker: None,
        }
    }

    pub fn with_config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// True once the frame source is acquired and until the session ends.
    pub fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.active.load(Ordering::SeqCst))
    }

    /// Starts scanning `source`, stopping any previous session first.
    ///
    /// Returns immediately. Acquisition failures arrive through `on_error`
    /// and leave the controller inactive.
    pub fn start<S, E>(&mut self, source: Box<dyn FrameSource>, on_scan: S, on_error: E)
    where
        S: FnMut(String) + Send + 'static,
        E: FnMut(ScanError) + Send + 'static,
    {
        self.stop();

        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(0);
        let worker = Worker {
            stopped: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            callbacks: Arc::new(Mutex::new(Some(Callbacks {
                on_scan: Box::new(on_scan),
                on_error: Box::new(on_error),
            }))),
            source: Arc::new(Mutex::new(Some(source))),
            wake: Some(wake_tx),
        };

        let scan_loop = ScanLoop {
            stopped: worker.stopped.clone(),
            active: worker.active.clone(),
            callbacks: worker.callbacks.clone(),
            source: worker.source.clone(),
            wake: wake_rx,
            decoder: self.decoder.clone(),
            clock: self.clock.clone(),
            config: self.config,
        };

        log::info!(
            "Scanner starting (cooldown {:?}, interval {:?})",
            self.config.cooldown,
            self.config.scan_interval
        );
        thread::spawn(move || scan_loop.run());
        self.worker = Some(worker);
    }

    /// Ends the current session and releases its frame source.
    ///
    /// Safe to call when not scanning.
    pub fn stop(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        worker.stopped.store(true, Ordering::SeqCst);
        worker.active.store(false, Ordering::SeqCst);
        // Disconnecting the wake channel cuts the inter-attempt pause short.
        drop(worker.wake.take());
        // Waits out a callback that is already running.
        lock(&worker.callbacks).take();
        let source = lock(&worker.source).take();
        if let Some(mut source) = source {
            source.release();
        }
        log::info!("Scanner stopped");
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by one worker thread.
struct ScanLoop {
    stopped: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    callbacks: Arc<Mutex<Option<Callbacks>>>,
    source: SharedSource,
    wake: Receiver<()>,
    decoder: SharedDecoder,
    clock: Arc<dyn Clock>,
    config: ScannerConfig,
}

impl ScanLoop {
    fn run(self) {
        match self.acquire() {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                log::warn!("Failed to acquire frame source: {e}");
                self.report_error(e.into());
                return;
            }
        }
        self.active.store(true, Ordering::SeqCst);
        log::debug!("Frame source acquired, scanning");

        let policy = self.config.policy();
        let mut session = ScanSession::new();

        while !self.is_stopped() {
            match self.attempt() {
                None => break,
                Some(Ok(text)) => {
                    let now = self.clock.now();
                    if session.observe(&text, now, &policy) {
                        self.emit(text);
                    } else if let Some(last) = session.last_emission() {
                        log::debug!(
                            "Suppressed repeat scan, last reported {:?} ago (cooldown {:?})",
                            now.saturating_duration_since(last.at),
                            policy.cooldown()
                        );
                    }
                }
                Some(Err(ScanError::Decode(e))) if e.is_not_found() => {}
                Some(Err(e)) => self.report_error(e),
            }

            match self.wake.recv_timeout(self.config.scan_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.active.store(false, Ordering::SeqCst);
        log::debug!("Scan loop exited");
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Acquires the source outside the shared lock so `stop` never waits on
    /// a slow camera. `Ok(false)` when the session ended first.
    fn acquire(&self) -> Result<bool, CaptureError> {
        let Some(mut source) = lock(&self.source).take() else {
            return Ok(false);
        };
        let result = source.acquire();

        let mut slot = lock(&self.source);
        if self.is_stopped() {
            drop(slot);
            source.release();
            return Ok(false);
        }
        *slot = Some(source);
        result.map(|()| true)
    }

    /// One grab + decode. `None` if the session was stopped before either.
    fn attempt(&self) -> Option<Result<String, ScanError>> {
        let frame = {
            let mut slot = lock(&self.source);
            if self.is_stopped() {
                return None;
            }
            slot.as_mut()?.grab()
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e.into())),
        };
        let mut decoder = lock(&self.decoder);
        if self.is_stopped() {
            return None;
        }
        Some(decoder.decode(&frame).map_err(ScanError::from))
    }

    fn emit(&self, text: String) {
        if let Some(callbacks) = lock(&self.callbacks).as_mut() {
            (callbacks.on_scan)(text);
        }
    }

    fn report_error(&self, error: ScanError) {
        if let Some(callbacks) = lock(&self.callbacks).as_mut() {
            (callbacks.on_error)(error);
        }
    }
}
