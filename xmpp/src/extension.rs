// Copyright (c) 2023 xmpp-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_xmpp::{
    jid::Jid,
    minidom::Element,
    parsers::{
        disco::Feature,
        iq::Iq,
        stanza_error::{DefinedCondition, ErrorType, StanzaError},
    },
    Stanza,
};

use crate::{Agent, Event};

/// A pluggable handler participating in the extension dispatcher.
///
/// Managers are registered with [`Agent::register_extension`] and offered
/// inbound stanzas in registration order; the first manager whose
/// [`handle_stanza`](Self::handle_stanza) returns `Some` stops the walk.
/// PubSub event notifications bypass this "first handler wins" rule: every
/// registered manager is offered the same event, since e.g. an avatar
/// manager and a bookmarks manager both care about entirely different
/// nodes.
#[async_trait]
pub trait ExtensionManager: Send + Sync {
    /// Called once, right after the manager is added to the dispatcher.
    async fn on_registered(&self, _agent: &mut Agent) {}

    /// Called once, right before the manager is removed from the
    /// dispatcher.
    async fn on_unregistered(&self, _agent: &mut Agent) {}

    /// Offered every inbound top-level stanza not already claimed by the
    /// IQ router (i.e. get/set IQs; result/error IQs are matched against
    /// in-flight requests before managers ever see them). Return `Some`
    /// (even an empty `Vec`) to claim the stanza and stop the walk.
    async fn handle_stanza(&self, _agent: &mut Agent, _stanza: &Stanza) -> Option<Vec<Event>> {
        None
    }

    /// Offered every PubSub event notification, independently of generic
    /// stanza routing.
    async fn handle_pubsub_event(
        &self,
        _agent: &mut Agent,
        _from: &Jid,
        _node: &str,
        _elem: &Element,
    ) -> Vec<Event> {
        Vec::new()
    }

    /// disco#info features this manager contributes.
    fn discovery_features(&self) -> Vec<Feature> {
        Vec::new()
    }
}

/// Offer an unclaimed get/set IQ to every registered manager in order;
/// falls back to `feature-not-implemented` (RFC 6120 §8.4) if none claims
/// it.
pub(crate) async fn dispatch_unclaimed_iq(agent: &mut Agent, iq: Iq, is_get: bool) -> Vec<Event> {
    let stanza = Stanza::Iq(iq);
    let extensions = std::mem::take(&mut agent.extensions);
    let mut claimed = None;
    for ext in &extensions {
        if let Some(events) = ext.handle_stanza(agent, &stanza).await {
            claimed = Some(events);
            break;
        }
    }
    agent.extensions = extensions;

    match claimed {
        Some(events) => events,
        None => {
            let Stanza::Iq(iq) = stanza else {
                unreachable!()
            };
            // RFC 6120 §8.4: feature-not-implemented, not service-unavailable
            // (that error is for the whole entity being unreachable, not a
            // single unsupported feature).
            let _ = is_get;
            let error = StanzaError::new(
                ErrorType::Cancel,
                DefinedCondition::FeatureNotImplemented,
                "en",
                "No handler defined for this kind of iq.",
            );
            let mut reply = Iq::from_error(iq.id, error);
            if let Some(from) = iq.from {
                reply = reply.with_to(from);
            }
            let _ = agent.client.send_stanza(reply.into()).await;
            Vec::new()
        }
    }
}

/// Fan a PubSub event notification out to every registered manager.
pub(crate) async fn dispatch_pubsub_event(
    agent: &mut Agent,
    from: &Jid,
    node: &str,
    elem: &Element,
) -> Vec<Event> {
    let extensions = std::mem::take(&mut agent.extensions);
    let mut events = Vec::new();
    for ext in &extensions {
        events.extend(ext.handle_pubsub_event(agent, from, node, elem).await);
    }
    agent.extensions = extensions;
    events
}

/// Aggregate `discovery_features()` across every registered manager, for
/// the client's disco#info response.
pub(crate) fn aggregate_discovery_features(extensions: &[Arc<dyn ExtensionManager>]) -> Vec<Feature> {
    extensions.iter().flat_map(|ext| ext.discovery_features()).collect()
}
