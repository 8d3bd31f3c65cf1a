// Copyright (c) 2025 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use core::error::Error;
use core::fmt;
use core::ops::ControlFlow;
use core::time::Duration;
use std::io;
use std::sync::Mutex;

use futures::StreamExt;

use xmpp_parsers::{
    iq::{Iq, IqType},
    stanza_error::StanzaError,
};

use crate::{
    event::make_id,
    jid::Jid,
    minidom::Element,
    stanzastream::{StanzaState, StanzaToken},
    task::{self, Promise, Task},
};

/// Default time to wait for an IQ response before giving up. RFC 6120
/// offers no guidance here, but servers and clients alike converge on
/// something in the tens of seconds. Callers needing a different bound
/// should use [`IqResponseToken::wait_with_timeout`] directly.
pub const DEFAULT_IQ_TIMEOUT: Duration = Duration::from_secs(30);

/// An IQ request payload
pub enum IqRequest {
    /// Payload for a `type="get"` request
    Get(Element),

    /// Payload for a `type="set"` request
    Set(Element),
}

impl From<IqRequest> for IqType {
    fn from(other: IqRequest) -> IqType {
        match other {
            IqRequest::Get(v) => Self::Get(v),
            IqRequest::Set(v) => Self::Set(v),
        }
    }
}

/// An IQ response payload
#[derive(Clone, Debug)]
pub enum IqResponse {
    /// Payload for a `type="result"` response.
    Result(Option<Element>),

    /// Payload for a `type="error"` response.
    Error(StanzaError),
}

impl From<IqResponse> for IqType {
    fn from(other: IqResponse) -> IqType {
        match other {
            IqResponse::Result(v) => Self::Result(v),
            IqResponse::Error(v) => Self::Error(v),
        }
    }
}

/// Error enumeration for Iq sending failures
#[derive(Debug, Clone)]
pub enum IqFailure {
    /// Internal error inside tokio_xmpp which caused the stream worker to
    /// drop the token before the response was received.
    ///
    /// Most likely, this means that the stream has died with a panic.
    LostWorker,

    /// The IQ failed to send because of an I/O or serialisation error.
    SendError(Arc<io::Error>),

    /// No response arrived within the allotted time.
    Timeout,
}

impl fmt::Display for IqFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LostWorker => {
                f.write_str("disconnected from internal connection worker while sending IQ")
            }
            Self::SendError(e) => write!(f, "send error: {e}"),
            Self::Timeout => f.write_str("timed out waiting for IQ response"),
        }
    }
}

impl Error for IqFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SendError(ref e) => Some(e.as_ref()),
            Self::LostWorker | Self::Timeout => None,
        }
    }
}

type IqOutcome = Result<IqResponse, IqFailure>;
type IqKey = (Option<Jid>, String);

/// One in-flight request: the wire-level promise plus every
/// fingerprint-deduplicated waiter riding along on the same reply.
struct IqWaiters {
    primary: Promise<IqOutcome>,
    riders: Vec<Promise<IqOutcome>>,
}

impl IqWaiters {
    fn complete(self, outcome: IqOutcome) {
        self.primary.finish(outcome.clone());
        for rider in self.riders {
            rider.finish(outcome.clone());
        }
    }
}

type IqMap = BTreeMap<IqKey, IqWaiters>;

struct IqMapEntryHandle {
    key: IqKey,
    map: Weak<Mutex<IqMap>>,
    dedup: Weak<Mutex<BTreeMap<String, IqKey>>>,
    fingerprint: Option<String>,
}

impl Drop for IqMapEntryHandle {
    fn drop(&mut self) {
        if let Some(map) = self.map.upgrade() {
            if let Some(mut map) = map.lock().ok() {
                map.remove(&self.key);
            }
        }
        let Some(fingerprint) = self.fingerprint.as_ref() else {
            return;
        };
        let Some(dedup) = self.dedup.upgrade() else {
            return;
        };
        let Some(mut dedup) = dedup.lock().ok() else {
            return;
        };
        // Only remove the entry if it still points at this request: a
        // newer request with the same fingerprint may have replaced it
        // after this one completed.
        if dedup.get(fingerprint) == Some(&self.key) {
            dedup.remove(fingerprint);
        }
    }
}

/// Awaits an IQ response.
///
/// Unlike the older bare-`oneshot` design, this wraps a [`Task`] from the
/// general single-producer/single-consumer primitive, and folds in the
/// associated [`StanzaToken`]'s delivery state so callers only have to poll
/// one future to find out that sending itself failed.
///
/// There is no internal timeout by default: call [`Self::wait_with_timeout`]
/// to get one (Client Core always does, using [`DEFAULT_IQ_TIMEOUT`] unless
/// configured otherwise).
pub struct IqResponseToken {
    entry: Option<IqMapEntryHandle>,
    stanza_token: Option<StanzaToken>,
    task: Task<IqOutcome>,
}

impl IqResponseToken {
    /// Tie a stanza token to this IQ response token.
    ///
    /// The stanza token should point at the IQ **request**, the response of
    /// which this response token awaits.
    pub(crate) fn set_stanza_token(&mut self, token: StanzaToken) {
        assert!(self.stanza_token.is_none());
        self.stanza_token = Some(token);
    }

    /// Await the response, surfacing send failures observed on the
    /// associated stanza token as [`IqFailure::SendError`]/[`IqFailure::LostWorker`].
    pub async fn wait(mut self) -> IqOutcome {
        if let Some(token) = self.stanza_token.take() {
            let mut states = token.into_stream();
            loop {
                match states.next().await {
                    Some(StanzaState::Queued) => continue,
                    Some(StanzaState::Dropped) | None => {
                        log::warn!("StanzaToken associated with IqResponseToken signalled that the Stanza was dropped before transmission.");
                        self.entry.take();
                        return Err(IqFailure::LostWorker);
                    }
                    Some(StanzaState::Failed { error }) => {
                        self.entry.take();
                        return Err(IqFailure::SendError(Arc::new(error.into_io_error())));
                    }
                    Some(StanzaState::Sent { .. }) | Some(StanzaState::Acked { .. }) => break,
                }
            }
        }
        let outcome = self.task.await;
        self.entry.take();
        outcome
    }

    /// Await the response, giving up after `timeout` and yielding
    /// [`IqFailure::Timeout`].
    pub async fn wait_with_timeout(self, timeout: Duration) -> IqOutcome {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(IqFailure::Timeout),
        }
    }
}

/// Utility struct to track IQ responses.
///
/// Wire correlation still happens by `(from, id)` exactly as before; what
/// changed is that every in-flight request now rides on a [`Task`]/
/// [`Promise`] pair instead of a bare `oneshot`, and callers asking for the
/// same logical operation (matching fingerprint) while one is already in
/// flight are fanned in to that single round-trip instead of sending a
/// duplicate IQ.
pub struct IqResponseTracker {
    map: Arc<Mutex<IqMap>>,
    dedup: Arc<Mutex<BTreeMap<String, IqKey>>>,
}

impl IqResponseTracker {
    /// Create a new empty response tracker.
    pub fn new() -> Self {
        Self {
            map: Arc::new(Mutex::new(IqMap::new())),
            dedup: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Attempt to handle an IQ stanza as IQ response.
    ///
    /// Returns the IQ stanza unharmed if it is not an IQ response matching
    /// any request which is still being tracked. Per RFC 6120 §8.4, the
    /// caller should reply `feature-not-implemented` to anything still a
    /// `get`/`set` after this returns `Continue`.
    pub fn handle_iq(&self, iq: Iq) -> ControlFlow<(), Iq> {
        let payload = match iq.payload {
            IqType::Error(error) => IqResponse::Error(error),
            IqType::Result(result) => IqResponse::Result(result),
            _ => return ControlFlow::Continue(iq),
        };
        let key = (iq.from, iq.id);
        let waiters = {
            let mut map = self.map.lock().unwrap();
            map.remove(&key)
        };
        match waiters {
            None => {
                log::trace!("not handling IQ response from {:?} with id {:?}: no active tracker for this tuple", key.0, key.1);
                ControlFlow::Continue(Iq {
                    from: key.0,
                    id: key.1,
                    to: iq.to,
                    payload: payload.into(),
                })
            }
            Some(waiters) => {
                waiters.complete(Ok(payload));
                ControlFlow::Break(())
            }
        }
    }

    /// Allocate a new IQ response tracking handle.
    ///
    /// This modifies the IQ to assign a unique ID. `fingerprint`, if given,
    /// identifies the logical request being made (e.g. a disco#info query
    /// against a given JID); a second call with a fingerprint matching an
    /// in-flight request returns `None` for the `Iq` (nothing new needs to
    /// go on the wire) and a token that resolves once the in-flight
    /// request's reply arrives.
    pub fn allocate_iq_handle(
        &self,
        from: Option<Jid>,
        to: Option<Jid>,
        req: IqRequest,
        fingerprint: Option<String>,
    ) -> (Option<Iq>, IqResponseToken) {
        if let Some(fingerprint) = fingerprint.as_ref() {
            let dedup = self.dedup.lock().unwrap();
            if let Some(existing_key) = dedup.get(fingerprint) {
                let mut map = self.map.lock().unwrap();
                if let Some(waiters) = map.get_mut(existing_key) {
                    let (rider_task, rider_promise) = task::pair();
                    waiters.riders.push(rider_promise);
                    let token = IqResponseToken {
                        entry: Some(IqMapEntryHandle {
                            key: existing_key.clone(),
                            map: Arc::downgrade(&self.map),
                            dedup: Weak::new(),
                            fingerprint: None,
                        }),
                        stanza_token: None,
                        task: rider_task,
                    };
                    return (None, token);
                }
            }
        }

        let key = (to, make_id());
        let mut map = self.map.lock().unwrap();
        let (task, promise) = task::pair();
        assert!(map.get(&key).is_none());
        let token = IqResponseToken {
            entry: Some(IqMapEntryHandle {
                key: key.clone(),
                map: Arc::downgrade(&self.map),
                dedup: Arc::downgrade(&self.dedup),
                fingerprint: fingerprint.clone(),
            }),
            stanza_token: None,
            task,
        };
        map.insert(
            key.clone(),
            IqWaiters {
                primary: promise,
                riders: Vec::new(),
            },
        );
        if let Some(fingerprint) = fingerprint {
            self.dedup.lock().unwrap().insert(fingerprint, key.clone());
        }
        (
            Some(Iq {
                from,
                to: key.0,
                id: key.1,
                payload: req.into(),
            }),
            token,
        )
    }
}

impl Default for IqResponseTracker {
    fn default() -> Self {
        Self::new()
    }
}
