//! The [`Runtime`]: owns every engine instance, the timer thread, the HTTP
//! listener, and the dispatcher loop that runs script callbacks one at a
//! time.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use brook_posix::HandleRegistry;

use crate::bindings::{self, Scope};
use crate::config::RuntimeOptions;
use crate::console::format_value;
use crate::error::{script_error, RuntimeError};
use crate::http::{self, HttpServer, PendingRequests};
use crate::instance::{eval_script, report_uncaught, EngineInstance, InstanceId, InstanceRole};
use crate::scheduler::{DispatchHandle, Dispatcher, ShutdownHandle, Task, TimerId, TimerThread};

/// How long [`Runtime::run`] keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Until a shutdown is requested.
    Forever,
    /// Until no timer is registered, no server is listening and the queue
    /// is empty (or a shutdown is requested).
    UntilIdle,
}

/// Why [`Runtime::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Idle,
    Shutdown,
}

/// State shared by the runtime and the host functions of its instances.
pub(crate) struct Shared {
    pub(crate) options: RuntimeOptions,
    pub(crate) dispatch: DispatchHandle,
    pub(crate) timers: Arc<TimerThread>,
    pub(crate) pending: PendingRequests,
    next_timer: Cell<u64>,
    next_instance: Cell<u64>,
    instances: RefCell<HashMap<InstanceId, Rc<EngineInstance>>>,
    http: RefCell<Option<HttpServer>>,
}

impl Shared {
    /// Next timer handle. Both timer kinds draw from this counter and
    /// handles are never reused.
    pub(crate) fn next_timer_id(&self) -> TimerId {
        let id = self.next_timer.get();
        self.next_timer.set(id + 1);
        TimerId(id)
    }

    /// Create an instance with the host API surface installed and register
    /// it.
    pub(crate) fn spawn_instance(
        self: &Rc<Self>,
        role: InstanceRole,
        label: &str,
    ) -> Result<Rc<EngineInstance>, RuntimeError> {
        let id = InstanceId(self.next_instance.get());
        self.next_instance.set(id.0 + 1);

        let instance = Rc::new(EngineInstance::new(id, role, label)?);
        let scope = Scope {
            id,
            shared: Rc::downgrade(self),
            instance: Rc::downgrade(&instance),
        };
        instance.enter(|ctx| Ok(bindings::install(&ctx, &scope, role)?))?;

        self.instances.borrow_mut().insert(id, Rc::clone(&instance));
        tracing::debug!(instance = %id, ?role, label, "engine instance created");
        Ok(instance)
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Option<Rc<EngineInstance>> {
        self.instances.borrow().get(&id).cloned()
    }

    fn all_instances(&self) -> Vec<Rc<EngineInstance>> {
        let mut instances: Vec<_> = self.instances.borrow().values().cloned().collect();
        instances.sort_by_key(|instance| instance.id());
        instances
    }

    /// Start the HTTP listener for `instance`. Only one per runtime.
    pub(crate) fn listen(&self, instance: InstanceId) -> Result<SocketAddr, RuntimeError> {
        let mut http = self.http.borrow_mut();
        if let Some(server) = http.as_ref() {
            return Err(RuntimeError::InvalidArgument(format!(
                "http.createServer: a server is already listening on {}",
                server.address()
            )));
        }
        let server = HttpServer::start(
            &self.options.http_host,
            self.options.http_port,
            instance,
            self.dispatch.clone(),
            Arc::clone(&self.pending),
        )?;
        let address = server.address();
        tracing::info!(%address, %instance, "http server listening");
        *http = Some(server);
        Ok(address)
    }

    pub(crate) fn http_address(&self) -> Option<SocketAddr> {
        self.http.borrow().as_ref().map(HttpServer::address)
    }

    pub(crate) fn live_timers(&self) -> usize {
        self.instances.borrow().values().map(|instance| instance.live_timers()).sum()
    }

    /// Nothing can produce further work.
    pub(crate) fn is_idle(&self) -> bool {
        self.http.borrow().is_none() && self.live_timers() == 0
    }

    /// Run queued promise jobs of every instance.
    pub(crate) fn drain_jobs(&self) {
        for instance in self.all_instances() {
            instance.drain_jobs(&self.options.console);
        }
    }

    pub(crate) fn run_task(&self, task: Task) {
        match task {
            Task::Timer { instance, timer } => {
                self.fire_timer(instance, timer);
                self.drain_jobs();
            }
            Task::Request { instance, request, done } => {
                http::serve_request(self, instance, request);
                let _ = done.send(());
            }
            Task::Shutdown => {}
        }
    }

    fn fire_timer(&self, instance_id: InstanceId, timer: TimerId) {
        let Some(instance) = self.instance(instance_id) else {
            return;
        };
        let callback = instance.timers().borrow_mut().take_due(timer);
        let Some(callback) = callback else {
            tracing::trace!(instance = %instance_id, %timer, "suppressed fire of cleared timer");
            return;
        };
        tracing::trace!(instance = %instance_id, %timer, "timer fired");

        let result = instance.enter(|ctx| {
            let function = callback.restore(&ctx)?;
            function
                .call::<_, rquickjs::Value>(())
                .map(|_| ())
                .map_err(|err| script_error(&ctx, err))
        });
        if let Err(err) = result {
            report_uncaught(&self.options.console, instance_id, &err.to_string());
        }
    }

    fn close(&self) {
        let server = self.http.borrow_mut().take();
        if let Some(mut server) = server {
            server.stop();
        }
        self.timers.stop();
        let instances: Vec<_> = self.instances.borrow_mut().drain().collect();
        drop(instances);
    }
}

/// A script host: one root instance plus the instances created by
/// `require`, driven by a single dispatcher loop.
///
/// Not `Send`: the thread that creates a runtime is the one that runs
/// scripts. Other threads interact through a [`ShutdownHandle`].
pub struct Runtime {
    shared: Rc<Shared>,
    dispatcher: Dispatcher,
    root: Rc<EngineInstance>,
}

impl Runtime {
    /// Create a runtime and its root instance, and start the timer thread.
    pub fn new(options: RuntimeOptions) -> Result<Self, RuntimeError> {
        let dispatcher = Dispatcher::new();
        let timers = TimerThread::new();
        timers.start(dispatcher.handle())?;

        let shared = Rc::new(Shared {
            options,
            dispatch: dispatcher.handle(),
            timers,
            pending: Arc::new(HandleRegistry::new()),
            next_timer: Cell::new(1),
            next_instance: Cell::new(1),
            instances: RefCell::new(HashMap::new()),
            http: RefCell::new(None),
        });
        let root = match shared.spawn_instance(InstanceRole::Root, "main") {
            Ok(root) => root,
            Err(err) => {
                shared.close();
                return Err(err);
            }
        };

        Ok(Self {
            shared,
            dispatcher,
            root,
        })
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.shared.options
    }

    /// Evaluate script text in the root instance and return its completion
    /// value rendered the way `console.log` would print it.
    pub fn eval(&self, source: &str) -> Result<String, RuntimeError> {
        let result = self.root.enter(|ctx| match eval_script(&ctx, source) {
            Ok(value) => Ok(format_value(&ctx, &value)),
            Err(err) => Err(script_error(&ctx, err)),
        });
        self.shared.drain_jobs();
        result
    }

    /// Read and evaluate a script file in the root instance.
    pub fn eval_file(&self, path: &Path) -> Result<String, RuntimeError> {
        let source = brook_posix::fs::read_text_file(path)?;
        tracing::debug!(path = %path.display(), "evaluating entry script");
        self.eval(&source)
    }

    /// Drain the dispatcher queue, running each callback to completion
    /// before the next.
    pub fn run(&self, mode: RunMode) -> RunOutcome {
        self.shared.drain_jobs();
        loop {
            let task = match self.dispatcher.try_next() {
                Some(task) => task,
                None => {
                    if mode == RunMode::UntilIdle && self.shared.is_idle() {
                        tracing::debug!("runtime idle");
                        return RunOutcome::Idle;
                    }
                    match self.dispatcher.next() {
                        Some(task) => task,
                        None => return RunOutcome::Shutdown,
                    }
                }
            };

            if let Task::Shutdown = task {
                tracing::info!("shutdown requested");
                return RunOutcome::Shutdown;
            }
            self.shared.run_task(task);
        }
    }

    /// Handle other threads can use to stop [`Runtime::run`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.shared.dispatch.clone())
    }

    /// Bound address of the HTTP listener, once a script created one.
    pub fn http_address(&self) -> Option<SocketAddr> {
        self.shared.http_address()
    }

    /// Timers registered across all instances.
    pub fn live_timers(&self) -> usize {
        self.shared.live_timers()
    }

    /// Number of engine instances (root included).
    pub fn instance_count(&self) -> usize {
        self.shared.instances.borrow().len()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shared.close();
    }
}
