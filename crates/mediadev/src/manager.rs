// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Camera Manager
//!
//! The [`CameraManager`] runs a [`DeviceEnumerator`] on its own event loop
//! thread and turns matched media devices into [`Camera`] objects. Each
//! registered [`PipelineHandler`] claims every unclaimed device satisfying its
//! [`DeviceMatch`](crate::DeviceMatch), at start and whenever a device is
//! hotplugged. Unplugging a device disconnects and removes its camera.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::{Arc, Weak};
//! use mediadev::camera::Camera;
//! use mediadev::manager::{CameraListener, CameraManager};
//!
//! struct Printer;
//!
//! impl CameraListener for Printer {
//!     fn camera_added(&self, camera: &Arc<Camera>) {
//!         println!("+ {}", camera);
//!     }
//!     fn camera_removed(&self, camera: &Arc<Camera>) {
//!         println!("- {}", camera);
//!     }
//! }
//!
//! let printer: Arc<dyn CameraListener> = Arc::new(Printer);
//! let manager = CameraManager::shared()?;
//! manager.subscribe(Arc::downgrade(&printer));
//! # Ok::<(), mediadev::Error>(())
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::backend::Backend;
use crate::camera::Camera;
use crate::enumerator::{DeviceEnumerator, DeviceListener, ListenerId};
use crate::event_loop::{EventLoop, LoopHandle, DEFAULT_TICK};
use crate::media::MediaDevice;
use crate::pipeline::{default_pipelines, PipelineHandler};
use crate::Error;

type BackendFactory = Box<dyn Fn() -> Box<dyn Backend> + Send + Sync>;

static SHARED: Mutex<Weak<CameraManager>> = Mutex::new(Weak::new());

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Receiver of camera hotplug notifications
///
/// Called on the manager's event loop thread. Implementations must not call
/// [`CameraManager::with_enumerator`] from inside a callback.
pub trait CameraListener: Send + Sync {
    fn camera_added(&self, _camera: &Arc<Camera>) {}
    fn camera_removed(&self, _camera: &Arc<Camera>) {}
}

/// Camera list shared between the manager and its event loop
struct Registry {
    pipelines: Mutex<Vec<Arc<dyn PipelineHandler>>>,
    cameras: Mutex<Vec<Arc<Camera>>>,
    listeners: Mutex<Vec<(ListenerId, Weak<dyn CameraListener>)>>,
    next_listener: AtomicU64,
}

impl Registry {
    fn new(pipelines: Vec<Arc<dyn PipelineHandler>>) -> Self {
        Self {
            pipelines: Mutex::new(pipelines),
            cameras: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Let every pipeline claim all the devices it matches.
    fn bind_all(&self, enumerator: &DeviceEnumerator) {
        let pipelines = lock(&self.pipelines).clone();
        for pipeline in pipelines {
            while let Some(device) = enumerator.search(pipeline.device_match()) {
                let Some(claim) = device.claim() else { break };

                let id = self.unique_id(pipeline.camera_name(&device));
                let camera = Arc::new(Camera::new(id, pipeline.name(), claim));
                log::info!("Camera {} added", camera);

                lock(&self.cameras).push(Arc::clone(&camera));
                for listener in self.live_listeners() {
                    listener.camera_added(&camera);
                }
            }
        }
    }

    fn unbind(&self, device: &Arc<MediaDevice>) {
        let removed: Vec<Arc<Camera>> = {
            let mut cameras = lock(&self.cameras);
            let (removed, kept): (Vec<_>, Vec<_>) = cameras
                .drain(..)
                .partition(|camera| Arc::ptr_eq(camera.device(), device));
            *cameras = kept;
            removed
        };

        for camera in removed {
            camera.disconnect();
            log::info!("Camera {} removed", camera.id());
            for listener in self.live_listeners() {
                listener.camera_removed(&camera);
            }
        }
    }

    fn unique_id(&self, base: String) -> String {
        let cameras = lock(&self.cameras);
        let taken = |id: &str| cameras.iter().any(|camera| camera.id() == id);
        if !taken(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let id = format!("{}#{}", base, n);
            if !taken(&id) {
                return id;
            }
            n += 1;
        }
    }

    fn live_listeners(&self) -> Vec<Arc<dyn CameraListener>> {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|(_, listener)| listener.strong_count() > 0);
        listeners
            .iter()
            .filter_map(|(_, listener)| listener.upgrade())
            .collect()
    }
}

impl DeviceListener for Registry {
    fn device_added(&self, enumerator: &DeviceEnumerator, _device: &Arc<MediaDevice>) {
        self.bind_all(enumerator);
    }

    fn device_removed(&self, device: &Arc<MediaDevice>) {
        self.unbind(device);
    }
}

struct Runtime {
    handle: LoopHandle,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Owner of the camera list
///
/// # Example
///
/// ```no_run
/// use mediadev::manager::CameraManager;
///
/// let manager = CameraManager::new();
/// manager.start()?;
///
/// for camera in manager.cameras() {
///     println!("{}", camera);
/// }
///
/// let count = manager.with_enumerator(|enumerator| enumerator.len())?;
/// println!("{} media devices", count);
///
/// manager.stop();
/// # Ok::<(), mediadev::Error>(())
/// ```
pub struct CameraManager {
    backend: Option<BackendFactory>,
    registry: Arc<Registry>,
    tick: Duration,
    runtime: Mutex<Option<Runtime>>,
}

impl CameraManager {
    /// Manager with the default pipeline handlers and backend selection
    pub fn new() -> Self {
        Self {
            backend: None,
            registry: Arc::new(Registry::new(default_pipelines())),
            tick: DEFAULT_TICK,
            runtime: Mutex::new(None),
        }
    }

    /// Use backends from `factory` instead of
    /// [`DeviceEnumerator::create`]. The factory is called on every start.
    pub fn with_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Backend> + Send + Sync + 'static,
    {
        self.backend = Some(Box::new(factory));
        self
    }

    /// Register an additional pipeline handler
    pub fn with_pipeline(self, pipeline: Arc<dyn PipelineHandler>) -> Self {
        lock(&self.registry.pipelines).push(pipeline);
        self
    }

    /// Replace all pipeline handlers
    pub fn with_pipelines(self, pipelines: Vec<Arc<dyn PipelineHandler>>) -> Self {
        *lock(&self.registry.pipelines) = pipelines;
        self
    }

    /// Hotplug wait per event loop iteration
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Process-wide manager.
    ///
    /// The first call constructs and starts a default manager; later calls
    /// return the same instance while any `Arc` to it is alive. Once the
    /// last `Arc` is dropped the manager stops, and the next call builds a
    /// new one.
    ///
    /// # Errors
    ///
    /// Returns the [`start`](Self::start) error if the manager cannot start.
    pub fn shared() -> Result<Arc<CameraManager>, Error> {
        let mut slot = lock(&SHARED);
        if let Some(manager) = slot.upgrade() {
            return Ok(manager);
        }

        let manager = Arc::new(CameraManager::new());
        manager.start()?;
        *slot = Arc::downgrade(&manager);
        Ok(manager)
    }

    /// Start the event loop thread and bind the devices present now.
    ///
    /// Returns once the initial enumeration has completed, so
    /// [`cameras`](Self::cameras) already lists every camera available at
    /// start. Starting a running manager does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the discovery backend cannot
    /// be initialised, or the scan error if enumeration fails.
    pub fn start(&self) -> Result<(), Error> {
        let mut runtime = lock(&self.runtime);
        if runtime.is_some() {
            return Ok(());
        }

        let backend = self.backend.as_ref().map(|factory| factory());
        let registry = Arc::clone(&self.registry);
        let tick = self.tick;
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("mediadev-loop".to_string())
                .spawn(move || {
                    let enumerator = match setup(backend, &registry) {
                        Ok(enumerator) => enumerator,
                        Err(err) => {
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                    };

                    let mut event_loop = EventLoop::new(enumerator).with_tick(tick);
                    let _ = ready_tx.send(Ok(event_loop.handle()));
                    event_loop.run(&stop);
                })?
        };

        match ready_rx.recv() {
            Ok(Ok(handle)) => {
                log::info!(
                    "Camera manager started with {} cameras",
                    lock(&self.registry.cameras).len()
                );
                *runtime = Some(Runtime {
                    handle,
                    stop,
                    thread,
                });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::NotStarted)
            }
        }
    }

    /// Stop the event loop and release every camera.
    ///
    /// Cameras still held by the application are disconnected and their
    /// devices left in `PendingRemoval`, so a later [`start`](Self::start)
    /// binds the hardware to new cameras only. No `camera_removed`
    /// notifications are sent. Stopping a stopped manager does nothing.
    pub fn stop(&self) {
        let Some(runtime) = lock(&self.runtime).take() else {
            return;
        };

        runtime.stop.store(true, Ordering::Release);
        if runtime.thread.join().is_err() {
            log::warn!("Camera manager event loop panicked");
        }

        let cameras = std::mem::take(&mut *lock(&self.registry.cameras));
        for camera in &cameras {
            camera.disconnect();
        }
        log::info!("Camera manager stopped, released {} cameras", cameras.len());
    }

    pub fn is_running(&self) -> bool {
        lock(&self.runtime).is_some()
    }

    /// Cameras currently available, in the order they were added
    pub fn cameras(&self) -> Vec<Arc<Camera>> {
        lock(&self.registry.cameras).clone()
    }

    /// Camera by id
    pub fn get(&self, id: &str) -> Option<Arc<Camera>> {
        lock(&self.registry.cameras)
            .iter()
            .find(|camera| camera.id() == id)
            .cloned()
    }

    /// Camera whose media device exposes the character device `major:minor`.
    ///
    /// Matches the device number of any entity of the camera's device, such
    /// as the video capture node an application has opened.
    pub fn get_by_devnum(&self, major: u32, minor: u32) -> Option<Arc<Camera>> {
        lock(&self.registry.cameras)
            .iter()
            .find(|camera| {
                camera
                    .device()
                    .entities()
                    .iter()
                    .any(|entity| entity.device_number() == Some((major, minor)))
            })
            .cloned()
    }

    /// Register a camera listener. Only a weak reference is kept.
    pub fn subscribe(&self, listener: Weak<dyn CameraListener>) -> ListenerId {
        let id = ListenerId(self.registry.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.registry.listeners).push((id, listener));
        id
    }

    /// Remove a camera listener. Returns false if the id is unknown.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.registry.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Run `f` against the device registry on the event loop thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] if the manager is not running.
    pub fn with_enumerator<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut DeviceEnumerator) -> R + Send + 'static,
        R: Send + 'static,
    {
        let handle = lock(&self.runtime)
            .as_ref()
            .map(|runtime| runtime.handle.clone())
            .ok_or(Error::NotStarted)?;
        handle.invoke(f)
    }
}

/// Build the enumerator on the loop thread and bind the initial devices.
fn setup(
    backend: Option<Box<dyn Backend>>,
    registry: &Arc<Registry>,
) -> Result<DeviceEnumerator, Error> {
    let mut enumerator = match backend {
        Some(backend) => {
            let mut enumerator = DeviceEnumerator::new(backend);
            enumerator.init()?;
            enumerator
        }
        None => DeviceEnumerator::create()?,
    };

    enumerator.enumerate()?;
    registry.bind_all(&enumerator);

    let listener: Weak<dyn DeviceListener> = Arc::downgrade(registry) as Weak<dyn DeviceListener>;
    enumerator.subscribe(listener);
    Ok(enumerator)
}

impl Default for CameraManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CameraManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraManager")
            .field("running", &self.is_running())
            .field("cameras", &lock(&self.registry.cameras).len())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}
