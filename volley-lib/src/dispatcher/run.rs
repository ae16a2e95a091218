//! The execution loop of a dispatcher.

use std::{
    collections::{HashMap, VecDeque, hash_map::Entry},
    sync::{Arc, atomic::Ordering},
};

use futures::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use parking_lot::MutexGuard;

use super::{Shared, State};
use crate::{CacheKey, Request, Response, TransportStatus, hooks};

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// The transport; `leader` is set when other requests may be waiting on
    /// the same cache key
    Transport { leader: bool },
    /// The cache getter
    Cache,
    /// The leader with the same cache key
    Follower,
}

/// A response which is ready to pass through the completion pipeline
struct Resolution {
    request: Request,
    response: Response,
    origin: Origin,
}

type InFlight = BoxFuture<'static, Resolution>;

/// One execution of the loop, from start until the queue is drained or the
/// loop was aborted.
///
/// Memoization is scoped to a run: a request only becomes a follower if
/// its leader is in flight in the same run.
pub(super) struct Run {
    shared: Arc<Shared>,
    in_flight: FuturesUnordered<InFlight>,
    /// Cache hits waiting for their pipeline, in dispatch order
    ready: VecDeque<Resolution>,
    /// Followers per cache key of a leader in flight
    memo: HashMap<CacheKey, Vec<Request>>,
    /// Set once the loop has released the dispatcher
    finished: bool,
}

impl Run {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        log::debug!("Starting dispatch loop");
        Self {
            shared,
            in_flight: FuturesUnordered::new(),
            ready: VecDeque::new(),
            memo: HashMap::new(),
            finished: false,
        }
    }

    /// Take requests from the queue while transport slots are free
    pub(super) fn admit(&mut self) {
        while self.in_flight.len() < self.shared.max_concurrency {
            let Some(request) = self.next_pending() else {
                break;
            };
            self.dispatch(request);
        }
    }

    fn next_pending(&self) -> Option<Request> {
        let mut state = self.shared.state.lock();
        if state.aborted {
            return None;
        }
        state.pending.pop_front()
    }

    fn dispatch(&mut self, request: Request) {
        if request.is_resolved() {
            log::warn!("Skipping {request}: it has already been resolved");
            return;
        }

        let mut leader = false;
        if request.is_get() {
            // Cloned so that the getter runs without holding the lock
            let cache = self.shared.cache.read().clone();
            if let Some(response) = cache.get(&request) {
                log::debug!("Cache hit for {request}");
                self.ready.push_back(Resolution {
                    request,
                    response,
                    origin: Origin::Cache,
                });
                return;
            }

            if self.shared.memoize.load(Ordering::Relaxed) {
                match self.memo.entry(request.cache_key().clone()) {
                    Entry::Occupied(mut followers) => {
                        log::debug!("Waiting for the response of an identical request: {request}");
                        followers.get_mut().push(request);
                        return;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(Vec::new());
                        leader = true;
                    }
                }
            }
        }

        self.submit(request, leader);
    }

    fn submit(&mut self, request: Request, leader: bool) {
        log::debug!("Sending {request}");
        let transport = Arc::clone(&self.shared.transport);
        let task_request = request.clone();
        let task = tokio::spawn(async move { transport.execute(&task_request).await });

        self.in_flight.push(
            async move {
                let response = match task.await {
                    Ok(response) => response,
                    Err(e) => Response::transport_failure(TransportStatus::Failed(format!(
                        "transport task failed: {e}"
                    ))),
                };
                Resolution {
                    request,
                    response,
                    origin: Origin::Transport { leader },
                }
            }
            .boxed(),
        );
    }

    /// Run until the queue is drained, or until the loop was aborted and
    /// every request in flight has completed
    pub(super) async fn drive(mut self) {
        loop {
            if let Some(resolution) = self.ready.pop_front() {
                self.complete(resolution);
                self.admit();
                continue;
            }

            if self.in_flight.is_empty() {
                if self.try_finish() {
                    break;
                }
                self.admit();
                continue;
            }

            let next = {
                let shared = &self.shared;
                tokio::select! {
                    next = self.in_flight.next() => next,
                    () = shared.wakeup.notified() => None,
                }
            };

            // The freed slot is refilled before the pipeline runs
            self.admit();
            if let Some(resolution) = next {
                self.complete(resolution);
                self.admit();
            }
        }
        log::debug!("Dispatch loop finished");
    }

    /// Mark the loop as finished if there is nothing left to do
    fn try_finish(&mut self) -> bool {
        let mut state = self.shared.state.lock();
        if !state.pending.is_empty() && !state.aborted {
            return false;
        }
        if state.aborted {
            log::debug!(
                "Dispatch loop aborted with {} requests pending",
                state.pending.len()
            );
        }
        release(&self.shared, state);
        self.finished = true;
        true
    }

    fn complete(&mut self, resolution: Resolution) {
        let Resolution {
            request,
            response,
            origin,
        } = resolution;

        let followers = match origin {
            Origin::Transport { leader: true } => self
                .memo
                .remove(request.cache_key())
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        self.pipeline(&request, &response, origin);

        for follower in followers {
            log::debug!("Resolving {follower} with the response of its leader");
            self.pipeline(&follower, &response, Origin::Follower);
        }
    }

    fn pipeline(&self, request: &Request, response: &Response, origin: Origin) {
        if !request.resolve(response.clone()) {
            log::warn!("Ignoring second response for {request}");
            return;
        }

        hooks::run_after_request_hooks(request);

        if origin != Origin::Cache && request.is_get() {
            let cache = self.shared.cache.read().clone();
            cache.set(request);
        }

        request.set_handled_response(response.clone());

        for callback in request.take_on_complete() {
            callback(response);
        }

        let global = self.shared.on_complete.read().clone();
        if let Some(callback) = global {
            callback(request, response);
        }

        for callback in request.take_after_complete() {
            callback(request);
        }
    }
}

impl Drop for Run {
    /// Runs when the future of `run` is dropped or a callback panicked.
    /// Requests in flight or waiting on a leader are abandoned.
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let abandoned = self.in_flight.len()
            + self.ready.len()
            + self.memo.values().map(Vec::len).sum::<usize>();
        log::warn!("Dispatch loop stopped early, abandoning {abandoned} requests");
        release(&self.shared, self.shared.state.lock());
    }
}

/// Let the next `run` start and wake everyone waiting for this one
fn release(shared: &Shared, mut state: MutexGuard<'_, State>) {
    state.running = false;
    state.aborted = false;
    drop(state);
    shared.idle.notify_waiters();
}
