// Copyright (c) 2019 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::ops::ControlFlow::{Break, Continue};
use core::pin::Pin;
use core::task::{Context, Poll};
use std::io;

use futures::{ready, Sink, Stream};

use xmpp_parsers::{
    jid::Jid,
    sm,
    stream_error::{ReceivedStreamError, StreamError},
    stream_features::StreamFeatures,
};

use crate::xmlstream::{ReadError, XmppStreamElement};

use super::negotiation::{NegotiationResult, NegotiationState};
use super::queue::{QueueEntry, StanzaState, TransmitQueue};
use super::stream_management::SmState;
use super::worker::{Never, WorkerEvent, XmppStream};

/// State of an established, freshly connected stream: first stream
/// negotiation (resource binding plus, if offered, XEP-0198 stream
/// management), then steady-state stanza exchange.
pub(super) enum ConnectedState {
    /// Bind/SM negotiation is still in progress.
    Negotiating { substate: NegotiationState },

    /// Negotiation concluded, the stream is ready to exchange stanzas.
    Ready {
        /// Stream management state, if negotiated.
        sm_state: Option<SmState>,

        /// I/O error observed by a concurrent `poll_writes` call, to be
        /// reported on the next `poll`.
        pending_error: Option<io::Error>,
    },

    /// A fatal stream error is queued for transmission; once it is flushed
    /// out, the stream terminates by local choice.
    SendingError { error: Option<StreamError> },
}

/// Event produced by driving a [`ConnectedState`].
pub(super) enum ConnectedEvent {
    /// Forward as-is to the frontend/worker event loop.
    Worker(WorkerEvent),

    /// The stream broke or was closed unexpectedly.
    Disconnect {
        sm_state: Option<SmState>,
        error: Option<io::Error>,
    },

    /// The peer closed the stream cleanly (stream footer or EOF).
    RemoteShutdown { sm_state: Option<SmState> },

    /// We are done with this stream by local choice (e.g. after sending a
    /// stream error, or after the transmit queue was closed and drained).
    LocalShutdownRequested,
}

/// Attempt to make one unit of write progress: send a queued `<sm:r/>` or
/// `<sm:a/>`, or the next stanza in `transmit_queue`.
///
/// Returns `Ok(true)` if progress was made (the caller should call again
/// immediately), `Ok(false)` if the transmit queue is closed and fully
/// drained (i.e. local shutdown was requested), or `Err` on fatal I/O
/// error.
fn poll_write_step(
    sm_state: &mut Option<SmState>,
    mut stream: Pin<&mut XmppStream>,
    transmit_queue: &mut TransmitQueue<QueueEntry>,
    cx: &mut Context,
) -> Poll<io::Result<bool>> {
    if let Some(sm) = sm_state.as_mut() {
        if sm.pending_req {
            match ready!(<XmppStream as Sink<&XmppStreamElement>>::poll_ready(
                stream.as_mut(),
                cx
            )) {
                Ok(()) => (),
                Err(error) => return Poll::Ready(Err(error)),
            }
            let element = XmppStreamElement::SM(sm::Nonza::Req(sm::R));
            match stream.as_mut().start_send(&element) {
                Ok(()) => sm.pending_req = false,
                Err(error) => return Poll::Ready(Err(error)),
            }
            return Poll::Ready(Ok(true));
        }

        if sm.pending_acks > 0 {
            match ready!(<XmppStream as Sink<&XmppStreamElement>>::poll_ready(
                stream.as_mut(),
                cx
            )) {
                Ok(()) => (),
                Err(error) => return Poll::Ready(Err(error)),
            }
            let element = XmppStreamElement::SM(sm::Nonza::Ack(sm::A::new(sm.inbound_ctr())));
            match stream.as_mut().start_send(&element) {
                Ok(()) => sm.pending_acks = 0,
                Err(error) => return Poll::Ready(Err(error)),
            }
            return Poll::Ready(Ok(true));
        }
    }

    match transmit_queue.poll_next(cx) {
        Poll::Ready(Some(entry_ref)) => {
            match ready!(<XmppStream as Sink<&XmppStreamElement>>::poll_ready(
                stream.as_mut(),
                cx
            )) {
                Ok(()) => (),
                Err(error) => return Poll::Ready(Err(error)),
            }
            let entry = entry_ref.take();
            let element = XmppStreamElement::Stanza(*entry.stanza);
            match stream.as_mut().start_send(&element) {
                Ok(()) => (),
                Err(error) => return Poll::Ready(Err(error)),
            }
            entry.token.send_replace(StanzaState::Sent {});
            let stanza = match element {
                XmppStreamElement::Stanza(stanza) => stanza,
                _ => unreachable!("element was constructed as the Stanza variant above"),
            };
            if let Some(sm) = sm_state.as_mut() {
                sm.enqueue(QueueEntry {
                    stanza: Box::new(stanza),
                    token: entry.token,
                });
            }
            Poll::Ready(Ok(true))
        }
        Poll::Ready(None) => {
            // Sender dropped and queue drained: local shutdown.
            match <XmppStream as Sink<&XmppStreamElement>>::poll_flush(stream, cx) {
                Poll::Ready(Ok(())) => Poll::Ready(Ok(false)),
                Poll::Ready(Err(error)) => Poll::Ready(Err(error)),
                Poll::Pending => Poll::Pending,
            }
        }
        Poll::Pending => {
            // Nothing new queued right now; make sure whatever is already
            // buffered actually reaches the wire before we go idle.
            match <XmppStream as Sink<&XmppStreamElement>>::poll_flush(stream, cx) {
                Poll::Ready(Ok(())) => Poll::Pending,
                Poll::Ready(Err(error)) => Poll::Ready(Err(error)),
                Poll::Pending => Poll::Pending,
            }
        }
    }
}

impl ConnectedState {
    pub(super) fn poll(
        &mut self,
        mut stream: Pin<&mut XmppStream>,
        identity: &mut Jid,
        features: &StreamFeatures,
        transmit_queue: &mut TransmitQueue<QueueEntry>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<ConnectedEvent>> {
        match self {
            Self::Negotiating { substate } => {
                match ready!(substate.advance(stream.as_mut(), &*identity, transmit_queue, cx)) {
                    Continue(Some(stanza)) => {
                        Poll::Ready(Some(ConnectedEvent::Worker(WorkerEvent::Stanza(stanza))))
                    }
                    Continue(None) => Poll::Ready(None),
                    Break(NegotiationResult::StreamReset { sm_state, bound_jid }) => {
                        *self = Self::Ready {
                            sm_state,
                            pending_error: None,
                        };
                        Poll::Ready(Some(ConnectedEvent::Worker(WorkerEvent::Reset {
                            bound_jid,
                            features: features.clone(),
                        })))
                    }
                    Break(NegotiationResult::StreamResumed { sm_state }) => {
                        *self = Self::Ready {
                            sm_state: Some(sm_state),
                            pending_error: None,
                        };
                        Poll::Ready(Some(ConnectedEvent::Worker(WorkerEvent::Resumed)))
                    }
                    Break(NegotiationResult::Disconnect { sm_state, error }) => {
                        Poll::Ready(Some(ConnectedEvent::Disconnect {
                            sm_state,
                            error: Some(error),
                        }))
                    }
                    Break(NegotiationResult::StreamError { error }) => {
                        self.start_send_stream_error(error);
                        Poll::Ready(None)
                    }
                }
            }

            Self::Ready {
                sm_state,
                pending_error,
            } => {
                if let Some(error) = pending_error.take() {
                    return Poll::Ready(Some(ConnectedEvent::Disconnect {
                        sm_state: sm_state.take(),
                        error: Some(error),
                    }));
                }

                match poll_write_step(sm_state, stream.as_mut(), transmit_queue, cx) {
                    Poll::Ready(Ok(true)) => return Poll::Ready(None),
                    Poll::Ready(Ok(false)) => {
                        return Poll::Ready(Some(ConnectedEvent::LocalShutdownRequested))
                    }
                    Poll::Ready(Err(error)) => {
                        return Poll::Ready(Some(ConnectedEvent::Disconnect {
                            sm_state: sm_state.take(),
                            error: Some(error),
                        }))
                    }
                    Poll::Pending => (),
                }

                let item = ready!(stream.poll_next(cx));
                match item {
                    None => Poll::Ready(Some(ConnectedEvent::RemoteShutdown {
                        sm_state: sm_state.take(),
                    })),

                    Some(Ok(XmppStreamElement::Stanza(data))) => {
                        if let Some(sm) = sm_state.as_mut() {
                            sm.note_inbound();
                        }
                        Poll::Ready(Some(ConnectedEvent::Worker(WorkerEvent::Stanza(data))))
                    }

                    Some(Ok(XmppStreamElement::SM(sm::Nonza::Req(_)))) => {
                        if let Some(sm) = sm_state.as_mut() {
                            sm.pending_acks += 1;
                        } else {
                            log::warn!("Received <sm:r/> without stream management enabled. Ignoring.");
                        }
                        Poll::Ready(None)
                    }

                    Some(Ok(XmppStreamElement::SM(sm::Nonza::Ack(ack)))) => {
                        let outcome = match sm_state.as_mut() {
                            Some(sm) => sm.remote_acked(ack.h),
                            None => {
                                log::warn!(
                                    "Received <sm:a/> without stream management enabled. Ignoring."
                                );
                                Ok(())
                            }
                        };
                        match outcome {
                            Ok(()) => Poll::Ready(None),
                            Err(e) => {
                                log::error!(
                                    "Stream management bookkeeping error, disconnecting: {e}"
                                );
                                Poll::Ready(Some(ConnectedEvent::Disconnect {
                                    sm_state: sm_state.take(),
                                    error: Some(io::Error::new(
                                        io::ErrorKind::InvalidData,
                                        e.to_string(),
                                    )),
                                }))
                            }
                        }
                    }

                    Some(Ok(XmppStreamElement::StreamError(error))) => {
                        log::debug!("Received stream:error, failing stream.");
                        let error = io::Error::new(io::ErrorKind::Other, error);
                        transmit_queue.fail(&(&error).into());
                        Poll::Ready(Some(ConnectedEvent::Disconnect {
                            sm_state: sm_state.take(),
                            error: Some(error),
                        }))
                    }

                    Some(Ok(other)) => {
                        log::warn!(
                            "Received unsupported stream element on established stream: {other:?}. Dropping."
                        );
                        Poll::Ready(None)
                    }

                    Some(Err(ReadError::SoftTimeout)) => {
                        Poll::Ready(Some(ConnectedEvent::Worker(WorkerEvent::SoftTimeout)))
                    }

                    Some(Err(ReadError::ParseError(e))) => {
                        Poll::Ready(Some(ConnectedEvent::Worker(WorkerEvent::ParseError(e))))
                    }

                    Some(Err(ReadError::HardError(error))) => {
                        Poll::Ready(Some(ConnectedEvent::Disconnect {
                            sm_state: sm_state.take(),
                            error: Some(error),
                        }))
                    }

                    Some(Err(ReadError::StreamFooterReceived)) => {
                        Poll::Ready(Some(ConnectedEvent::RemoteShutdown {
                            sm_state: sm_state.take(),
                        }))
                    }
                }
            }

            Self::SendingError { error } => match error.take() {
                Some(err) => {
                    match ready!(<XmppStream as Sink<&XmppStreamElement>>::poll_ready(
                        stream.as_mut(),
                        cx
                    )) {
                        Ok(()) => (),
                        Err(io_error) => {
                            return Poll::Ready(Some(ConnectedEvent::Disconnect {
                                sm_state: None,
                                error: Some(io_error),
                            }))
                        }
                    }
                    let element = XmppStreamElement::StreamError(ReceivedStreamError(err));
                    match stream.as_mut().start_send(&element) {
                        Ok(()) => Poll::Ready(None),
                        Err(io_error) => Poll::Ready(Some(ConnectedEvent::Disconnect {
                            sm_state: None,
                            error: Some(io_error),
                        })),
                    }
                }
                None => match ready!(<XmppStream as Sink<&XmppStreamElement>>::poll_flush(
                    stream, cx
                )) {
                    Ok(()) => Poll::Ready(Some(ConnectedEvent::LocalShutdownRequested)),
                    Err(io_error) => Poll::Ready(Some(ConnectedEvent::Disconnect {
                        sm_state: None,
                        error: Some(io_error),
                    })),
                },
            },
        }
    }

    /// Drive write progress only, never completing except on fatal I/O
    /// error (in which case the error is stashed and reported on the next
    /// call to [`Self::poll`]).
    pub(super) fn poll_writes(
        &mut self,
        mut stream: Pin<&mut XmppStream>,
        transmit_queue: &mut TransmitQueue<QueueEntry>,
        cx: &mut Context,
    ) -> Poll<Never> {
        loop {
            match self {
                Self::Ready {
                    sm_state,
                    pending_error,
                } => {
                    if pending_error.is_some() {
                        return Poll::Pending;
                    }
                    match poll_write_step(sm_state, stream.as_mut(), transmit_queue, cx) {
                        Poll::Ready(Ok(_)) => continue,
                        Poll::Ready(Err(error)) => {
                            *pending_error = Some(error);
                            return Poll::Pending;
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                Self::Negotiating { .. } | Self::SendingError { .. } => return Poll::Pending,
            }
        }
    }

    pub(super) fn start_send_stream_error(&mut self, error: StreamError) {
        *self = Self::SendingError { error: Some(error) };
    }

    pub(super) fn poll_close(
        &mut self,
        stream: Pin<&mut XmppStream>,
        cx: &mut Context,
    ) -> Poll<io::Result<()>> {
        <XmppStream as Sink<&XmppStreamElement>>::poll_close(stream, cx)
    }

    /// Enqueue a `<sm:r/>`, if stream management is enabled.
    pub(super) fn queue_sm_request(&mut self) -> bool {
        match self {
            Self::Ready {
                sm_state: Some(sm),
                ..
            } => {
                sm.pending_req = true;
                true
            }
            _ => false,
        }
    }
}
