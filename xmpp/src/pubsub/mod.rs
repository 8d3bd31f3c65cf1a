// Copyright (c) 2019 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_xmpp::{
    jid::{BareJid, Jid},
    minidom::Element,
    parsers::{
        bookmarks2::Conference,
        data_forms::{DataForm, DataFormType, Field, FieldType},
        disco::Feature,
        ns,
        pubsub::{self, pubsub::PubSub},
    },
    IqFailure, IqRequest, IqResponse,
};

use crate::{
    extension::ExtensionManager,
    muc::room::{JoinRoomSettings, LeaveRoomSettings},
    Agent, Event, RoomNick,
};

#[cfg(feature = "avatars")]
pub(crate) mod avatar;

/// FORM_TYPE for the publish-options form attached to a bookmark publish
/// (XEP-0060 §7.1.5, XEP-0402 §3).
const PUBLISH_OPTIONS_FORM_TYPE: &str = "http://jabber.org/protocol/pubsub#publish-options";

/// Failure publishing or retracting a bookmark.
#[derive(Debug)]
pub enum BookmarkError {
    /// The IQ round-trip itself failed (timeout, disconnect, I/O error).
    Request(IqFailure),
    /// The service rejected the request with a stanza error.
    Rejected(tokio_xmpp::parsers::stanza_error::StanzaError),
}

impl fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "bookmark request failed: {e}"),
            Self::Rejected(e) => write!(f, "bookmark request rejected: {e:?}"),
        }
    }
}

impl std::error::Error for BookmarkError {}

/// Build the publish-options form mandated by XEP-0402 §3.2: bookmarks must
/// be persisted, unlimited in count, visible only to the owner, and not
/// broadcast on every publish (we already hold the full set locally).
fn publish_options_form() -> DataForm {
    DataForm::new(
        DataFormType::Submit,
        PUBLISH_OPTIONS_FORM_TYPE,
        vec![
            Field::new("pubsub#persist_items", FieldType::Boolean).with_value("1"),
            Field::new("pubsub#max_items", FieldType::TextSingle).with_value("max"),
            Field::new("pubsub#access_model", FieldType::ListSingle).with_value("whitelist"),
            Field::new("pubsub#send_last_published_item", FieldType::ListSingle)
                .with_value("never"),
        ],
    )
}

fn publish_element(jid: &BareJid, conference: &Conference) -> Element {
    let item = Element::builder("item", ns::PUBSUB)
        .attr("id", jid.to_string())
        .append(Element::from(conference.clone()))
        .build();
    let publish = Element::builder("publish", ns::PUBSUB)
        .attr("node", ns::BOOKMARKS2)
        .append(item)
        .build();
    let options = Element::builder("publish-options", ns::PUBSUB)
        .append(Element::from(publish_options_form()))
        .build();
    Element::builder("pubsub", ns::PUBSUB)
        .append(publish)
        .append(options)
        .build()
}

fn retract_element(jid: &BareJid) -> Element {
    let item = Element::builder("item", ns::PUBSUB)
        .attr("id", jid.to_string())
        .build();
    let retract = Element::builder("retract", ns::PUBSUB)
        .attr("node", ns::BOOKMARKS2)
        .attr("notify", "true")
        .append(item)
        .build();
    Element::builder("pubsub", ns::PUBSUB).append(retract).build()
}

/// Our own PEP bookmarks (XEP-0402): a local cache kept in sync with the
/// `urn:xmpp:bookmarks:1` PEP node, plus the publish/retract API to change
/// it.
pub struct BookmarksManager {
    cache: RwLock<HashMap<BareJid, Conference>>,
}

impl BookmarksManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Snapshot of every bookmark currently known.
    pub async fn bookmarks(&self) -> Vec<(BareJid, Conference)> {
        self.cache
            .read()
            .await
            .iter()
            .map(|(jid, conference)| (jid.clone(), conference.clone()))
            .collect()
    }

    /// Publish a bookmark, creating or replacing the one for `jid`.
    ///
    /// Enforces the publish-options required by XEP-0402 §3.2 (persisted,
    /// unbounded, owner-only). If the server can't or won't honour them
    /// (`precondition-not-met`), the publish is rejected rather than
    /// silently losing those guarantees.
    pub async fn set_bookmark(
        &self,
        agent: &mut Agent,
        jid: BareJid,
        conference: Conference,
    ) -> Result<(), BookmarkError> {
        let elem = publish_element(&jid, &conference);
        let response = agent
            .client
            .send_iq(
                None,
                IqRequest::Set(elem),
                Some(format!("bookmark-publish:{jid}")),
            )
            .await
            .map_err(BookmarkError::Request)?;
        match response {
            IqResponse::Result(_) => {
                let previous = self.cache.write().await.insert(jid.clone(), conference.clone());
                let _ = previous;
                Ok(())
            }
            IqResponse::Error(e) => Err(BookmarkError::Rejected(e)),
        }
    }

    /// Retract a bookmark.
    pub async fn remove_bookmark(&self, agent: &mut Agent, jid: BareJid) -> Result<(), BookmarkError> {
        let elem = retract_element(&jid);
        let response = agent
            .client
            .send_iq(
                None,
                IqRequest::Set(elem),
                Some(format!("bookmark-retract:{jid}")),
            )
            .await
            .map_err(BookmarkError::Request)?;
        match response {
            IqResponse::Result(_) => {
                self.cache.write().await.remove(&jid);
                Ok(())
            }
            IqResponse::Error(e) => Err(BookmarkError::Rejected(e)),
        }
    }

    /// Reconcile the cache and room-join state against one incoming
    /// bookmark (add/change), joining the room if it is newly autojoin and
    /// leaving it if autojoin was cleared.
    async fn apply(&self, agent: &mut Agent, jid: BareJid, conference: Conference) -> Vec<Event> {
        let mut events = Vec::new();
        let previous = self.cache.write().await.insert(jid.clone(), conference.clone());

        if conference.autojoin {
            if !agent.rooms.contains_key(&jid) {
                agent
                    .join_room(JoinRoomSettings {
                        room: jid.clone(),
                        nick: conference.nick.clone().map(RoomNick::new),
                        password: conference.password.clone(),
                        status: None,
                    })
                    .await;
            }
        } else if agent.rooms.contains_key(&jid) {
            agent.leave_room(LeaveRoomSettings::new(jid.clone())).await;
        }

        events.push(match previous {
            Some(_) => Event::BookmarkChanged(jid, conference),
            None => Event::BookmarkAdded(jid, conference),
        });
        events
    }

    async fn retract(&self, agent: &mut Agent, jid: BareJid) -> Vec<Event> {
        if self.cache.write().await.remove(&jid).is_none() {
            return Vec::new();
        }
        if agent.rooms.contains_key(&jid) {
            agent.leave_room(LeaveRoomSettings::new(jid.clone())).await;
        }
        vec![Event::BookmarkRemoved(jid)]
    }

    /// Handle a PEP event push (`<message/>` carrying `<event/>`) for the
    /// bookmarks node.
    pub(crate) async fn handle_push(
        &self,
        agent: &mut Agent,
        published: Vec<pubsub::event::Item>,
        retracted: Vec<pubsub::ItemId>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        for item in published {
            let Some(id) = item.id else { continue };
            let Some(payload) = item.payload else { continue };
            let Ok(jid) = BareJid::from_str(&id.0) else { continue };
            match Conference::try_from(payload) {
                Ok(conference) => events.extend(self.apply(agent, jid, conference).await),
                Err(err) => warn!("Malformed XEP-0402 bookmark from {jid}: {err}"),
            }
        }
        for id in retracted {
            let Ok(jid) = BareJid::from_str(&id.0) else { continue };
            events.extend(self.retract(agent, jid).await);
        }
        events
    }

    /// Handle the full node contents returned by our startup fetch
    /// (`<iq type="get"><pubsub><items node="...bookmarks:1"/></pubsub></iq>`),
    /// reconciling against anything already cached and leaving rooms that
    /// dropped out of the list entirely.
    pub(crate) async fn handle_full_sync(
        &self,
        agent: &mut Agent,
        items: Vec<pubsub::pubsub::Item>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        let mut seen = Vec::new();

        for item in items {
            let Some(id) = item.id.clone() else { continue };
            let Some(payload) = item.payload.clone() else { continue };
            let Ok(jid) = BareJid::from_str(&id.0) else { continue };
            match Conference::try_from(payload) {
                Ok(conference) => {
                    seen.push(jid.clone());
                    events.extend(self.apply(agent, jid, conference).await);
                }
                Err(err) => warn!("Malformed XEP-0402 bookmark from {jid}: {err}"),
            }
        }

        let stale: Vec<BareJid> = self
            .cache
            .read()
            .await
            .keys()
            .filter(|jid| !seen.contains(jid))
            .cloned()
            .collect();
        for jid in stale {
            events.extend(self.retract(agent, jid).await);
        }

        events.push(Event::BookmarksReset(self.bookmarks().await));
        events
    }
}

#[async_trait]
impl ExtensionManager for BookmarksManager {
    fn discovery_features(&self) -> Vec<Feature> {
        vec![Feature::new(format!("{}+notify", ns::BOOKMARKS2))]
    }
}

pub(crate) async fn handle_event(
    #[cfg_attr(not(feature = "avatars"), allow(unused_variables))] from: &Jid,
    elem: Element,
    #[cfg_attr(not(feature = "avatars"), allow(unused_variables))] agent: &mut Agent,
) -> Vec<Event> {
    #[allow(unused_mut)]
    let mut events = Vec::new();

    let event = pubsub::Event::try_from(elem);
    trace!("PubSub event: {:#?}", event);
    match event {
        Ok(pubsub::Event {
            payload:
                pubsub::event::Payload::Items {
                    node,
                    published,
                    retracted,
                },
        }) => match node.0 {
            #[cfg(feature = "avatars")]
            ref node if node == ns::AVATAR_METADATA => {
                let new_events = avatar::handle_metadata_pubsub_event(from, agent, published).await;
                events.extend(new_events);
            }
            ref node if node == ns::BOOKMARKS2 => {
                let manager = agent.bookmarks();
                events.extend(manager.handle_push(agent, published, retracted).await);
            }
            ref node => debug!("Ignoring PubSub event for unhandled node {}", node),
        },
        Ok(pubsub::Event {
            payload: pubsub::event::Payload::Purge { node },
        }) => match node.0 {
            ref node if node == ns::BOOKMARKS2 => {
                warn!("The bookmarks2 PEP node was deleted!");
            }
            ref node => debug!("Ignoring PubSub purge for unhandled node {}", node),
        },
        Err(e) => {
            error!("Error parsing PubSub event: {}", e);
        }
        _ => debug!("Ignoring unhandled PubSub event: {:#?}", event),
    }
    events
}

pub(crate) async fn handle_iq_result(
    #[cfg_attr(not(feature = "avatars"), allow(unused_variables))] from: &Jid,
    elem: Element,
    agent: &mut Agent,
) -> Vec<Event> {
    #[allow(unused_mut)]
    let mut events = Vec::new();

    let pubsub = match PubSub::try_from(elem) {
        Ok(pubsub) => pubsub,
        Err(e) => {
            warn!("Malformed pubsub iq result: {e}");
            return events;
        }
    };
    trace!("PubSub: {:#?}", pubsub);
    if let PubSub::Items(items) = pubsub {
        match items.node.0.clone() {
            #[cfg(feature = "avatars")]
            ref node if node == ns::AVATAR_DATA => {
                let new_events = avatar::handle_data_pubsub_iq(from, &items);
                events.extend(new_events);
            }
            ref node if node == ns::BOOKMARKS2 => {
                let manager = agent.bookmarks();
                events.extend(manager.handle_full_sync(agent, items.items).await);
            }
            ref node => debug!("Ignoring PubSub items result for unhandled node {}", node),
        }
    }
    events
}
