// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Single-threaded driver for a [`DeviceEnumerator`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::enumerator::DeviceEnumerator;
use crate::Error;

/// Default wait for hotplug events per loop iteration
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

type Request = Box<dyn FnOnce(&mut DeviceEnumerator) + Send>;

/// Event loop owning a [`DeviceEnumerator`]
///
/// Each iteration runs the requests marshalled through a [`LoopHandle`],
/// then waits up to one tick for hotplug events and applies them. Registry
/// mutation and searches therefore all happen on the loop thread.
///
/// ```no_run
/// use std::sync::atomic::AtomicBool;
/// use std::sync::Arc;
/// use mediadev::event_loop::EventLoop;
/// use mediadev::DeviceEnumerator;
///
/// let mut enumerator = DeviceEnumerator::create()?;
/// enumerator.enumerate()?;
///
/// let mut event_loop = EventLoop::new(enumerator);
/// let handle = event_loop.handle();
/// let stop = Arc::new(AtomicBool::new(false));
///
/// let thread = {
///     let stop = stop.clone();
///     std::thread::spawn(move || event_loop.run(&stop))
/// };
///
/// let count = handle.invoke(|enumerator| enumerator.len())?;
/// println!("{} devices", count);
///
/// stop.store(true, std::sync::atomic::Ordering::Relaxed);
/// thread.join().unwrap();
/// # Ok::<(), mediadev::Error>(())
/// ```
pub struct EventLoop {
    enumerator: DeviceEnumerator,
    requests: Receiver<Request>,
    sender: Sender<Request>,
    tick: Duration,
}

/// Handle for running closures on the loop thread
#[derive(Clone)]
pub struct LoopHandle {
    sender: Sender<Request>,
}

impl EventLoop {
    pub fn new(enumerator: DeviceEnumerator) -> Self {
        let (sender, requests) = mpsc::channel();
        Self {
            enumerator,
            requests,
            sender,
            tick: DEFAULT_TICK,
        }
    }

    /// Maximum time one iteration waits for hotplug events
    pub fn with_tick(self, tick: Duration) -> Self {
        Self { tick, ..self }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn enumerator(&self) -> &DeviceEnumerator {
        &self.enumerator
    }

    pub fn enumerator_mut(&mut self) -> &mut DeviceEnumerator {
        &mut self.enumerator
    }

    /// Run one iteration: pending requests, then hotplug events.
    pub fn process_events(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            request(&mut self.enumerator);
        }

        if let Err(err) = self.enumerator.process_events(self.tick) {
            log::warn!("{}; hotplug disabled, known devices remain available", err);
        }
    }

    /// Iterate until `stop` is set, then run the requests still queued.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::debug!("Event loop started");
        while !stop.load(Ordering::Acquire) {
            self.process_events();
        }
        while let Ok(request) = self.requests.try_recv() {
            request(&mut self.enumerator);
        }
        log::debug!("Event loop stopped");
    }

    /// Consume the loop and return the enumerator
    pub fn into_enumerator(self) -> DeviceEnumerator {
        self.enumerator
    }
}

impl LoopHandle {
    /// Run `f` on the loop thread and wait for its result.
    ///
    /// Must not be called from the loop thread itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] if the loop has gone away.
    pub fn invoke<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut DeviceEnumerator) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, result) = mpsc::sync_channel(1);
        self.post(move |enumerator| {
            let _ = reply.send(f(enumerator));
        })?;
        result.recv().map_err(|_| Error::NotStarted)
    }

    /// Queue `f` to run on the loop thread without waiting.
    pub fn post<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut DeviceEnumerator) + Send + 'static,
    {
        self.sender
            .send(Box::new(f))
            .map_err(|_| Error::NotStarted)
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("enumerator", &self.enumerator)
            .field("tick", &self.tick)
            .finish()
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::media::MediaDeviceBuilder;
    use std::sync::Arc;

    #[test]
    fn test_invoke_runs_on_loop_thread() {
        let backend = MemoryBackend::new();
        let plug = backend.handle();
        let mut enumerator = DeviceEnumerator::new(Box::new(backend));
        enumerator.init().unwrap();

        let mut event_loop = EventLoop::new(enumerator).with_tick(Duration::from_millis(5));
        let handle = event_loop.handle();
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                event_loop.run(&stop);
                event_loop
            })
        };

        let loop_thread = handle.invoke(|_| std::thread::current().id()).unwrap();
        assert_ne!(loop_thread, std::thread::current().id());

        plug.plug(MediaDeviceBuilder::new("/dev/media0", "uvcvideo"));
        let mut len = 0;
        for _ in 0..100 {
            len = handle.invoke(|enumerator| enumerator.len()).unwrap();
            if len == 1 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(len, 1);

        stop.store(true, Ordering::Release);
        let event_loop = thread.join().unwrap();
        drop(event_loop);
        assert!(matches!(handle.invoke(|e| e.len()), Err(Error::NotStarted)));
    }

    #[test]
    fn test_channel_lost_keeps_running() {
        let backend = MemoryBackend::new();
        let plug = backend.handle();
        plug.plug(MediaDeviceBuilder::new("/dev/media0", "uvcvideo"));

        let mut enumerator = DeviceEnumerator::new(Box::new(backend));
        enumerator.init().unwrap();
        enumerator.enumerate().unwrap();

        let mut event_loop = EventLoop::new(enumerator).with_tick(Duration::from_millis(1));
        plug.lose_channel("socket closed");
        event_loop.process_events();
        event_loop.process_events();

        assert!(!event_loop.enumerator().hotplug_active());
        assert_eq!(event_loop.enumerator().len(), 1);
    }
}
