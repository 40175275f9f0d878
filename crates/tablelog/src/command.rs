//! typed commands
//!
//! one variant per wire `type`, each carrying its own payload shape. the
//! payload parsed here is the public payload with any viewer overlay already
//! merged in, so overlay-only keys (`identity`, `cards`) are simply absent for
//! viewers that could not decrypt them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::identity::ActorId;
use crate::state::{CardIdentity, Position, TopRevealMode};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    #[serde(rename = "player.join")]
    PlayerJoin(PlayerJoin),
    #[serde(rename = "player.leave")]
    PlayerLeave(PlayerLeave),
    #[serde(rename = "player.update")]
    PlayerUpdate(PlayerUpdate),
    #[serde(rename = "battlefield.scale.set")]
    BattlefieldScaleSet(BattlefieldScaleSet),
    #[serde(rename = "room.lock.set")]
    RoomLockSet(RoomLockSet),
    #[serde(rename = "global.counter.set")]
    GlobalCounterSet(GlobalCounterSet),
    #[serde(rename = "zone.reorder.public")]
    ZoneReorder(ZoneReorder),
    #[serde(rename = "card.create.public")]
    CardCreate(CardCreate),
    #[serde(rename = "card.update.public")]
    CardUpdate(CardUpdate),
    #[serde(rename = "card.move.public")]
    CardMove(CardMove),
    #[serde(rename = "card.remove.public")]
    CardRemove(CardRemove),
    #[serde(rename = "card.untapAll")]
    CardUntapAll(CardUntapAll),
    #[serde(rename = "card.draw")]
    CardDraw(CardDraw),
    #[serde(rename = "library.shuffle")]
    LibraryShuffle(LibraryShuffle),
    #[serde(rename = "zone.set.hidden")]
    ZoneSetHidden(ZoneSetHidden),
    #[serde(rename = "card.reveal.set")]
    CardRevealSet(CardRevealSet),
    #[serde(rename = "library.topReveal.set")]
    LibraryTopRevealSet(LibraryTopRevealSet),
}

impl Command {
    /// parse a wire type plus merged payload. unknown types and malformed
    /// payloads yield `None`.
    pub fn parse(kind: &str, payload: Value) -> Option<Self> {
        serde_json::from_value(json!({ "type": kind, "payload": payload })).ok()
    }

    /// wire type string
    pub fn kind(&self) -> &'static str {
        match self {
            Command::PlayerJoin(_) => "player.join",
            Command::PlayerLeave(_) => "player.leave",
            Command::PlayerUpdate(_) => "player.update",
            Command::BattlefieldScaleSet(_) => "battlefield.scale.set",
            Command::RoomLockSet(_) => "room.lock.set",
            Command::GlobalCounterSet(_) => "global.counter.set",
            Command::ZoneReorder(_) => "zone.reorder.public",
            Command::CardCreate(_) => "card.create.public",
            Command::CardUpdate(_) => "card.update.public",
            Command::CardMove(_) => "card.move.public",
            Command::CardRemove(_) => "card.remove.public",
            Command::CardUntapAll(_) => "card.untapAll",
            Command::CardDraw(_) => "card.draw",
            Command::LibraryShuffle(_) => "library.shuffle",
            Command::ZoneSetHidden(_) => "zone.set.hidden",
            Command::CardRevealSet(_) => "card.reveal.set",
            Command::LibraryTopRevealSet(_) => "library.topReveal.set",
        }
    }

    /// split into wire type and payload value
    pub fn into_parts(self) -> (String, Value) {
        let kind = self.kind().to_string();
        let payload = match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove("payload").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        (kind, payload)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoin {
    pub player_id: ActorId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeave {
    pub player_id: ActorId,
}

/// self-service fields; absent fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub player_id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life: Option<i64>,
    /// damage taken from each commander's owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commander_damage: Option<BTreeMap<ActorId, i64>>,
    /// replaces named counters; a zero value removes the counter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<BTreeMap<String, i64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattlefieldScaleSet {
    pub player_id: ActorId,
    pub scale: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLockSet {
    pub locked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCounterSet {
    pub counter_type: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneReorder {
    pub zone_id: String,
    pub card_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCreate {
    pub card_id: String,
    pub owner_id: ActorId,
    pub zone_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CardIdentity>,
    #[serde(default)]
    pub is_token: bool,
    #[serde(default)]
    pub face_down: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// battlefield state changes; absent fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUpdate {
    pub card_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tapped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_down: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_face_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_id: Option<ActorId>,
    /// identity shown when turning face up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal: Option<CardIdentity>,
    /// overlay: identity for viewers allowed to see a face-down card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CardIdentity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMove {
    pub card_id: String,
    pub to_zone_id: String,
    /// insertion index in the destination; library index 0 is the top
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub face_down: bool,
    /// id assigned to a card leaving a hidden zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_card_id: Option<String>,
    /// public identity of a card leaving a hidden zone face up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal: Option<CardIdentity>,
    /// overlay: identity for viewers allowed to see it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CardIdentity>,
    /// public identity of the library's new top card while it is revealed to all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_reveal: Option<CardIdentity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRemove {
    pub card_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUntapAll {
    pub player_id: ActorId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDraw {
    pub player_id: ActorId,
    #[serde(default = "one")]
    pub count: usize,
    /// overlay: identities of the drawn cards, in draw order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<CardIdentity>>,
    /// public identity of the new top card while it is revealed to all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal: Option<CardIdentity>,
}

fn one() -> usize {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryShuffle {
    pub player_id: ActorId,
    /// overlay: library identities in their new order, top first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<CardIdentity>>,
    /// public identity of the new top card while it is revealed to all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal: Option<CardIdentity>,
}

/// replace the full contents of one of the author's hidden zones
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSetHidden {
    pub zone_id: String,
    pub count: usize,
    /// overlay: identities of every slot, slot 0 first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<CardIdentity>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRevealSet {
    pub card_id: String,
    #[serde(default)]
    pub to_all: bool,
    #[serde(default)]
    pub to: Vec<ActorId>,
    /// public identity when revealed to everyone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal: Option<CardIdentity>,
    /// overlay: identity for the targeted recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CardIdentity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryTopRevealSet {
    pub player_id: ActorId,
    pub mode: TopRevealMode,
    /// public identity of the top card when mode is `all`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal: Option<CardIdentity>,
    /// overlay: identity of the top card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CardIdentity>,
}
