//! The request dispatcher.
//!
//! A [`Dispatcher`] owns a FIFO queue of pending requests and executes them
//! with at most `max_concurrency` transport operations in flight. Each
//! resolved request passes through the completion pipeline:
//!
//! 1. the response slot of the request is filled
//! 2. the process-wide after-request hooks run
//! 3. the cache setter is called if the request asked for caching
//! 4. `handled_response` is filled
//! 5. the `on_complete` callbacks of the request run
//! 6. the `on_complete` callback of the dispatcher runs
//! 7. the `after_complete` callbacks of the request run
//! 8. memoized requests waiting for the same result are resolved
//!
//! Pipelines run one at a time. Callbacks may enqueue further requests or
//! abort the dispatcher; newly enqueued requests are picked up by the run
//! which is currently executing.

mod run;

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};
use tokio::{runtime::Handle, sync::Notify};
use typed_builder::TypedBuilder;

use crate::{
    Request, Response, Result,
    cache::{CacheError, CachePort},
    config::{DEFAULT_MAX_CONCURRENCY, DispatcherConfig, TransportConfig},
    policy,
    transport::{ReqwestTransport, Transport},
};
use run::Run;

/// Callback invoked for every request resolved by a dispatcher
pub type GlobalOnComplete = Arc<dyn Fn(&Request, &Response) + Send + Sync>;

static SHARED_DISPATCHER: LazyLock<RwLock<Option<Dispatcher>>> =
    LazyLock::new(|| RwLock::new(None));

/// Builder for a [`Dispatcher`]
///
/// ```
/// use volley_lib::DispatcherBuilder;
///
/// # fn main() -> volley_lib::Result<()> {
/// let dispatcher = DispatcherBuilder::builder()
///     .max_concurrency(20)
///     .build()
///     .dispatcher()?;
/// assert_eq!(dispatcher.max_concurrency(), 20);
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder, Debug)]
#[builder(doc)]
pub struct DispatcherBuilder {
    /// Maximum number of transport operations in flight at the same time.
    /// Zero is treated as one.
    #[builder(default = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Share one transport operation between identical `GET` requests
    #[builder(default = true)]
    memoize: bool,

    /// Transport used to execute requests.
    /// A [`ReqwestTransport`] with default settings is used if unset.
    #[builder(default, setter(strip_option))]
    transport: Option<Arc<dyn Transport>>,
}

impl Default for DispatcherBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DispatcherBuilder {
    /// Instantiates a [`Dispatcher`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if no transport was given and the default
    /// [`ReqwestTransport`] cannot be created.
    pub fn dispatcher(self) -> Result<Dispatcher> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(TransportConfig::default())?),
        };

        Ok(Dispatcher::assemble(
            self.max_concurrency,
            self.memoize,
            transport,
        ))
    }
}

/// Queue bookkeeping, guarded by one lock
#[derive(Default)]
struct State {
    pending: VecDeque<Request>,
    aborted: bool,
    running: bool,
}

/// State shared between the dispatcher handles and the loop
struct Shared {
    max_concurrency: usize,
    memoize: AtomicBool,
    transport: Arc<dyn Transport>,
    cache: RwLock<CachePort>,
    on_complete: RwLock<Option<GlobalOnComplete>>,
    state: Mutex<State>,
    /// Wakes a running loop after `enqueue`
    wakeup: Notify,
    /// Signalled whenever a loop finishes
    idle: Notify,
}

/// Executes queued requests with bounded concurrency.
///
/// `Dispatcher` is a handle: clones share the same queue and settings, so a
/// clone can be moved into a callback to enqueue follow-up requests.
///
/// ```no_run
/// use volley_lib::{Dispatcher, Request, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let dispatcher = Dispatcher::new()?;
///     let request = Request::new("https://example.com")?;
///     request.on_complete(|response| println!("{response}"));
///     dispatcher.enqueue(request.clone())?;
///     dispatcher.run().await;
///     assert!(request.response().is_some());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Create a dispatcher with default settings
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the default transport cannot be created.
    pub fn new() -> Result<Self> {
        DispatcherBuilder::default().dispatcher()
    }

    /// Create a dispatcher using the given transport and default settings
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::assemble(DEFAULT_MAX_CONCURRENCY, true, transport)
    }

    /// Create a dispatcher from a configuration.
    ///
    /// The `[network]` section is not applied; see
    /// [`DispatcherConfig::apply_network_policy`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the configuration is invalid or the transport
    /// cannot be created.
    pub fn from_config(config: &DispatcherConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.transport.clone())?;
        Ok(Self::assemble(
            config.max_concurrency,
            config.memoize,
            Arc::new(transport),
        ))
    }

    fn assemble(max_concurrency: usize, memoize: bool, transport: Arc<dyn Transport>) -> Self {
        let max_concurrency = if max_concurrency == 0 {
            log::warn!("`max_concurrency` must be at least 1, using 1");
            1
        } else {
            max_concurrency
        };

        Dispatcher {
            shared: Arc::new(Shared {
                max_concurrency,
                memoize: AtomicBool::new(memoize),
                transport,
                cache: RwLock::new(CachePort::default()),
                on_complete: RwLock::new(None),
                state: Mutex::new(State::default()),
                wakeup: Notify::new(),
                idle: Notify::new(),
            }),
        }
    }

    /// Add a request to the tail of the queue.
    ///
    /// If a loop is running, it picks the request up as soon as a slot is
    /// free. Otherwise the request waits for [`Dispatcher::run`] or
    /// [`Dispatcher::fire_and_forget`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NetConnectNotAllowed`](crate::ErrorKind::NetConnectNotAllowed)
    /// if the network policy forbids contacting the host. The request is not
    /// queued in that case.
    pub fn enqueue(&self, request: Request) -> Result<()> {
        policy::check(request.url())?;
        log::debug!("Enqueueing {request}");
        self.shared.state.lock().pending.push_back(request);
        self.shared.wakeup.notify_one();
        Ok(())
    }

    /// Execute queued requests until the queue is drained.
    ///
    /// Requests enqueued by callbacks during the run are executed before this
    /// returns. After [`Dispatcher::abort`], this returns once the requests
    /// in flight have completed and leaves the rest of the queue untouched.
    ///
    /// If a loop of this dispatcher is already running (see
    /// [`Dispatcher::fire_and_forget`]), this waits for it to finish instead
    /// of starting another one.
    ///
    /// Dropping the returned future stops the loop. Requests in flight at
    /// that point are abandoned and their callbacks never run; the rest of
    /// the queue is kept for the next run.
    pub async fn run(&self) {
        let idle = self.shared.idle.notified();
        tokio::pin!(idle);

        let already_running = {
            let mut state = self.shared.state.lock();
            if state.running {
                // Register before releasing the lock so the signal of the
                // running loop cannot be missed
                idle.as_mut().enable();
                true
            } else {
                state.running = true;
                false
            }
        };

        if already_running {
            log::debug!("Waiting for the running loop to finish");
            idle.await;
            return;
        }

        let mut run = Run::new(Arc::clone(&self.shared));
        run.admit();
        run.drive().await;
    }

    /// Start executing queued requests in the background and return
    /// immediately.
    ///
    /// Callbacks run on the background task as responses arrive. Calling this
    /// while a loop is running only wakes that loop. Await
    /// [`Dispatcher::run`] to wait for the background loop to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MissingRuntime`](crate::ErrorKind::MissingRuntime)
    /// if called outside of a Tokio runtime.
    pub fn fire_and_forget(&self) -> Result<()> {
        let handle = Handle::try_current()?;
        {
            let mut state = self.shared.state.lock();
            if state.running {
                drop(state);
                self.shared.wakeup.notify_one();
                return Ok(());
            }
            state.running = true;
        }

        let mut run = Run::new(Arc::clone(&self.shared));
        run.admit();
        handle.spawn(run.drive());
        Ok(())
    }

    /// Stop taking requests from the queue.
    ///
    /// Requests in flight still complete and run their callbacks. The flag
    /// is cleared when the running loop finishes. Without a running loop,
    /// this does nothing.
    pub fn abort(&self) {
        let mut state = self.shared.state.lock();
        if state.running {
            log::debug!("Aborting with {} requests pending", state.pending.len());
            state.aborted = true;
        } else {
            log::debug!("Ignoring abort, no loop is running");
        }
    }

    /// Whether the running loop has been aborted
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.shared.state.lock().aborted
    }

    /// Whether a loop is currently running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Number of queued requests which have not been started yet
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Maximum number of transport operations in flight
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.shared.max_concurrency
    }

    /// Set the callback invoked for every resolved request, replacing the
    /// previous one
    pub fn on_complete<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Request, &Response) + Send + Sync + 'static,
    {
        self.set_on_complete(Some(Arc::new(callback)));
        self
    }

    /// Replace or remove the callback invoked for every resolved request
    pub fn set_on_complete(&self, callback: Option<GlobalOnComplete>) {
        *self.shared.on_complete.write() = callback;
    }

    /// Set the function consulted before a `GET` request is sent.
    /// A returned response resolves the request without a transport call.
    pub fn set_cache_getter<F>(&self, getter: F)
    where
        F: Fn(&Request) -> std::result::Result<Option<Response>, CacheError>
            + Send
            + Sync
            + 'static,
    {
        self.shared.cache.write().set_getter(getter);
    }

    /// Set the function called with each resolved `GET` request that has a
    /// `cache_timeout`
    pub fn set_cache_setter<F>(&self, setter: F)
    where
        F: Fn(&Request) -> std::result::Result<(), CacheError> + Send + Sync + 'static,
    {
        self.shared.cache.write().set_setter(setter);
    }

    /// Replace both cache functions
    pub fn set_cache(&self, cache: CachePort) {
        *self.shared.cache.write() = cache;
    }

    /// Stop sharing transport operations between identical requests
    pub fn disable_memoization(&self) {
        self.shared.memoize.store(false, Ordering::Relaxed);
    }

    /// Share one transport operation between identical `GET` requests
    pub fn enable_memoization(&self) {
        self.shared.memoize.store(true, Ordering::Relaxed);
    }

    /// Whether memoization is enabled
    #[must_use]
    pub fn is_memoizing(&self) -> bool {
        self.shared.memoize.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Dispatcher")
            .field("max_concurrency", &self.shared.max_concurrency)
            .field("memoize", &self.is_memoizing())
            .field("transport", &self.shared.transport)
            .field("pending", &state.pending.len())
            .field("running", &state.running)
            .field("aborted", &state.aborted)
            .finish_non_exhaustive()
    }
}

/// The process-wide default dispatcher.
///
/// Created with default settings on first use unless one was installed with
/// [`set_shared_dispatcher`].
///
/// # Errors
///
/// Returns an `Err` if the default dispatcher has to be created and its
/// transport cannot be built.
pub fn shared_dispatcher() -> Result<Dispatcher> {
    if let Some(dispatcher) = SHARED_DISPATCHER.read().as_ref() {
        return Ok(dispatcher.clone());
    }

    let mut slot = SHARED_DISPATCHER.write();
    match slot.as_ref() {
        Some(dispatcher) => Ok(dispatcher.clone()),
        None => {
            let dispatcher = Dispatcher::new()?;
            *slot = Some(dispatcher.clone());
            Ok(dispatcher)
        }
    }
}

/// Install the process-wide default dispatcher
pub fn set_shared_dispatcher(dispatcher: Dispatcher) {
    *SHARED_DISPATCHER.write() = Some(dispatcher);
}
