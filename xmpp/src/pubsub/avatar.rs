// Copyright (c) 2019 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use tokio_xmpp::{
    jid::Jid,
    parsers::{
        avatar::{Data, Metadata},
        disco::Feature,
        iq::Iq,
        ns,
        pubsub::{
            event::Item,
            pubsub::{Items, PubSub},
            NodeName,
        },
    },
};

use crate::{extension::ExtensionManager, Agent, Event};

/// Advertises support for XEP-0084 avatars via PEP, so contacts know to
/// push metadata notifications our way.
///
/// The actual fetch/save logic is handled directly by
/// [`handle_metadata_pubsub_event`] and [`handle_data_pubsub_iq`], called
/// from [`super::handle_event`]/[`super::handle_iq_result`]; this manager
/// only participates in disco#info feature aggregation.
pub struct AvatarManager;

impl AvatarManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExtensionManager for AvatarManager {
    fn discovery_features(&self) -> Vec<Feature> {
        vec![Feature::new(format!("{}+notify", ns::AVATAR_METADATA))]
    }
}

pub(crate) async fn handle_metadata_pubsub_event(
    from: &Jid,
    agent: &mut Agent,
    items: Vec<Item>,
) -> Vec<Event> {
    let mut events = Vec::new();
    for item in items {
        let payload = item.payload.clone().unwrap();
        if !payload.is("metadata", ns::AVATAR_METADATA) {
            continue;
        }
        let metadata = match Metadata::try_from(payload) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Malformed XEP-0084 metadata from {from}: {e}");
                continue;
            }
        };
        for info in metadata.infos {
            let filename = format!("data/{}/{}", from, &*info.id.to_hex());
            let file_length = tokio::fs::metadata(&filename)
                .await
                .map(|metadata| metadata.len())
                .unwrap_or(0);
            // TODO: Also check the hash, not just the length.
            if info.bytes as u64 == file_length {
                events.push(Event::AvatarRetrieved(from.clone(), filename));
            } else {
                let iq = download_avatar(from);
                let _ = agent.client.send_stanza(iq.into()).await;
            }
        }
    }
    events
}

fn download_avatar(from: &Jid) -> Iq {
    Iq::from_get(
        "avatar-data",
        PubSub::Items(Items {
            max_items: None,
            node: NodeName(String::from(ns::AVATAR_DATA)),
            subid: None,
            items: Vec::new(),
        }),
    )
    .with_to(from.clone())
}

pub(crate) fn handle_data_pubsub_iq<'a>(
    from: &'a Jid,
    items: &'a Items,
) -> impl IntoIterator<Item = Event> + 'a {
    let from = from.clone();
    items
        .items
        .iter()
        .filter_map(move |item| match (&item.id, &item.payload) {
            (Some(id), Some(payload)) => match Data::try_from(payload.clone()) {
                Ok(data) => match save_avatar(&from, &id.0, &data.data) {
                    Ok(filename) => Some(Event::AvatarRetrieved(from.clone(), filename)),
                    Err(e) => {
                        warn!("Could not save avatar data from {from}: {e}");
                        None
                    }
                },
                Err(e) => {
                    warn!("Malformed XEP-0084 avatar data from {from}: {e}");
                    None
                }
            },
            _ => None,
        })
}

fn save_avatar(from: &Jid, id: &str, data: &[u8]) -> std::io::Result<String> {
    use std::io::Write;

    let directory = format!("data/{}", from);
    let filename = format!("data/{}/{}", from, id);
    std::fs::create_dir_all(directory)?;
    let mut file = std::fs::File::create(&filename)?;
    file.write_all(data)?;
    Ok(filename)
}
