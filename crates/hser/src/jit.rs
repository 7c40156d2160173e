// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deferred codec compilation.
//!
//! The resolver never blocks on compilation: with the asynchronous mode
//! enabled, `register_codec_callback` ships the compile closure to a worker
//! thread and returns the caller's default kind immediately; the finished
//! codec is delivered through the `on_ready` callback (which installs it
//! into the owning `ClassInfo`). With the asynchronous mode disabled the
//! compile runs inline. Compilation failures never propagate: the resolver
//! stays on the fallback codec and the failure is logged.

use crate::codec::{Codec, CodecKind};
use crate::error::Result;
use crossbeam::channel::{self, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Outcome of a compilation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFactory {
    /// Compilation is in flight; use this interim kind meanwhile.
    Pending(CodecKind),
    /// Compilation finished inline; the compiled kind is installed.
    Ready(CodecKind),
}

impl CodecFactory {
    /// The kind the caller should materialize right now.
    pub fn current_kind(self) -> CodecKind {
        match self {
            CodecFactory::Pending(kind) | CodecFactory::Ready(kind) => kind,
        }
    }
}

struct CompileTask {
    label: String,
    compile: Box<dyn FnOnce() -> Result<Arc<dyn Codec>> + Send>,
    on_ready: Box<dyn FnOnce(Arc<dyn Codec>) + Send>,
}

/// Compilation context shared by a resolver and its worker thread.
pub struct JitContext {
    sender: Option<Sender<CompileTask>>,
    worker: Option<JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
}

impl JitContext {
    /// `async_enabled` spawns the worker thread; otherwise every compile
    /// runs inline on the calling thread.
    pub fn new(async_enabled: bool) -> Self {
        let in_flight = Arc::new(AtomicUsize::new(0));
        if !async_enabled {
            return JitContext {
                sender: None,
                worker: None,
                in_flight,
            };
        }
        let (sender, receiver) = channel::unbounded::<CompileTask>();
        let counter = Arc::clone(&in_flight);
        let worker = std::thread::Builder::new()
            .name("hser-codec-compile".into())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    match (task.compile)() {
                        Ok(codec) => {
                            log::debug!("compiled codec for {}", task.label);
                            (task.on_ready)(codec);
                        }
                        Err(err) => {
                            log::warn!(
                                "codec compilation for {} failed, keeping fallback: {err}",
                                task.label
                            );
                        }
                    }
                    counter.fetch_sub(1, Ordering::Release);
                }
            })
            .expect("spawn codec compile thread");
        JitContext {
            sender: Some(sender),
            worker: Some(worker),
            in_flight,
        }
    }

    pub fn is_async(&self) -> bool {
        self.sender.is_some()
    }

    /// Request a compiled codec for `label`.
    ///
    /// Returns `Pending(default_kind)` when the work was deferred (or
    /// failed inline), `Ready(kind)` when the compile completed inline and
    /// `on_ready` already ran.
    pub fn register_codec_callback(
        &self,
        default_kind: CodecKind,
        label: &str,
        compile: impl FnOnce() -> Result<Arc<dyn Codec>> + Send + 'static,
        on_ready: impl FnOnce(Arc<dyn Codec>) + Send + 'static,
    ) -> CodecFactory {
        match &self.sender {
            Some(sender) => {
                self.in_flight.fetch_add(1, Ordering::Acquire);
                let task = CompileTask {
                    label: label.to_owned(),
                    compile: Box::new(compile),
                    on_ready: Box::new(on_ready),
                };
                if sender.send(task).is_err() {
                    self.in_flight.fetch_sub(1, Ordering::Release);
                    log::warn!("codec compile worker is gone, keeping fallback for {label}");
                }
                CodecFactory::Pending(default_kind)
            }
            None => match compile() {
                Ok(codec) => {
                    let kind = codec.kind();
                    on_ready(codec);
                    CodecFactory::Ready(kind)
                }
                Err(err) => {
                    log::warn!("codec compilation for {label} failed, keeping fallback: {err}");
                    CodecFactory::Pending(default_kind)
                }
            },
        }
    }

    /// True when no deferred compilation is outstanding.
    pub fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) == 0
    }
}

impl Drop for JitContext {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
