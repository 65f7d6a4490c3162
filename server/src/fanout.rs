//! Broadcast fan-out: turns presence changes into packets and receiver rules.
//!
//! Everything here is pure. The rules are computed as [`Recipients`] and
//! handed to a [`Publisher`], which owns actual delivery.

use log::debug;
use shared::{ConnectionId, Packet, PlayerRecord};
use std::collections::HashMap;

/// Receiver rule for one outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    Only(ConnectionId),
    AllExcept(ConnectionId),
    All,
}

impl Recipients {
    pub fn includes(&self, id: ConnectionId) -> bool {
        match *self {
            Recipients::Only(target) => target == id,
            Recipients::AllExcept(excluded) => excluded != id,
            Recipients::All => true,
        }
    }

    /// Applies the rule to the current connection set.
    pub fn resolve<I>(&self, connections: I) -> Vec<ConnectionId>
    where
        I: IntoIterator<Item = ConnectionId>,
    {
        connections
            .into_iter()
            .filter(|id| self.includes(*id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub packet: Packet,
    pub recipients: Recipients,
}

impl Outbound {
    pub fn new(packet: Packet, recipients: Recipients) -> Self {
        Self { packet, recipients }
    }
}

/// Transport capability: deliver a packet to every live connection the rule
/// selects. Delivery is fire-and-forget.
pub trait Publisher {
    fn publish(&self, packet: &Packet, recipients: Recipients);
}

pub fn deliver<P: Publisher + ?Sized>(publisher: &P, outbound: &[Outbound]) {
    for message in outbound {
        debug!(
            "Publishing {} to {:?}",
            message.packet.kind(),
            message.recipients
        );
        publisher.publish(&message.packet, message.recipients);
    }
}

/// Roster to the joiner (taken after its own add), announcement to everyone else.
pub fn announce_join(
    player: &PlayerRecord,
    roster: HashMap<ConnectionId, PlayerRecord>,
) -> Vec<Outbound> {
    vec![
        Outbound::new(
            Packet::Roster { players: roster },
            Recipients::Only(player.id),
        ),
        Outbound::new(
            Packet::PlayerJoined {
                player: player.clone(),
            },
            Recipients::AllExcept(player.id),
        ),
    ]
}

pub fn announce_move(player: &PlayerRecord) -> Vec<Outbound> {
    vec![Outbound::new(
        Packet::PlayerMoved {
            id: player.id,
            x: player.x,
            y: player.y,
        },
        Recipients::AllExcept(player.id),
    )]
}

/// The departed connection is already unregistered when this is published.
pub fn announce_leave(id: ConnectionId) -> Vec<Outbound> {
    vec![Outbound::new(Packet::PlayerLeft { id }, Recipients::All)]
}
