//! per-viewer projection of the command log
//!
//! everything here is derived by folding authenticated, authorized commands.
//! maps are ordered so that serialization is deterministic and two replays
//! of the same log compare bit-identical.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chain::genesis_hash;
use crate::identity::ActorId;

/// starting life total for a newly joined player
pub const STARTING_LIFE: i64 = 20;

/// the seven zones every player owns
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Library,
    Hand,
    Battlefield,
    Graveyard,
    Exile,
    Command,
    Sideboard,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 7] = [
        ZoneKind::Library,
        ZoneKind::Hand,
        ZoneKind::Battlefield,
        ZoneKind::Graveyard,
        ZoneKind::Exile,
        ZoneKind::Command,
        ZoneKind::Sideboard,
    ];

    /// hidden zones are viewable by their owner only
    pub fn is_hidden(self) -> bool {
        matches!(self, ZoneKind::Library | ZoneKind::Hand | ZoneKind::Sideboard)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneKind::Library => "library",
            ZoneKind::Hand => "hand",
            ZoneKind::Battlefield => "battlefield",
            ZoneKind::Graveyard => "graveyard",
            ZoneKind::Exile => "exile",
            ZoneKind::Command => "command",
            ZoneKind::Sideboard => "sideboard",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// deterministic zone id: `<ownerId>-<kind>`
pub fn zone_id(owner: &ActorId, kind: ZoneKind) -> String {
    format!("{owner}-{kind}")
}

const PLACEHOLDER_PREFIX: &str = "hidden:";

/// deterministic hidden-zone card id: `hidden:<zoneId>:<slot>`
pub fn placeholder_id(zone_id: &str, slot: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{zone_id}:{slot}")
}

/// placeholder ids are reserved for hidden-zone slots
pub fn is_placeholder_id(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

const MOVING_PREFIX: &str = "moving:";
const ARRIVAL_PREFIX: &str = "card:";

/// transient id of a card travelling into or within a hidden zone
pub fn moving_id(command_id: &str) -> String {
    format!("{MOVING_PREFIX}{command_id}")
}

/// id of a card leaving a hidden zone when the command names none
pub fn arrival_id(command_id: &str) -> String {
    format!("{ARRIVAL_PREFIX}{command_id}")
}

/// ids the replay mints itself; a command may never claim one
pub fn is_reserved_id(id: &str) -> bool {
    is_placeholder_id(id) || id.starts_with(MOVING_PREFIX) || id.starts_with(ARRIVAL_PREFIX)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: String,
    pub kind: ZoneKind,
    pub owner_id: ActorId,
    /// index 0 is the top of a library
    pub card_ids: Vec<String>,
}

/// the identity fields of a card. these are the only fields allowed to
/// differ between viewers replaying the same log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// face names for multi-faced cards, front first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faces: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub owner_id: ActorId,
    pub controller_id: ActorId,
    pub zone_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CardIdentity>,
    #[serde(default)]
    pub tapped: bool,
    #[serde(default)]
    pub face_down: bool,
    #[serde(default)]
    pub current_face_index: u32,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    #[serde(default)]
    pub is_token: bool,
    #[serde(default)]
    pub revealed_to_all: bool,
    #[serde(default)]
    pub revealed_to: Vec<ActorId>,
}

impl Card {
    /// blank card owned and controlled by `owner`
    pub fn new(id: impl Into<String>, owner: &ActorId, zone_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner.clone(),
            controller_id: owner.clone(),
            zone_id: zone_id.into(),
            identity: None,
            tapped: false,
            face_down: false,
            current_face_index: 0,
            rotation: 0,
            position: None,
            counters: BTreeMap::new(),
            custom_text: None,
            is_token: false,
            revealed_to_all: false,
            revealed_to: Vec::new(),
        }
    }

    /// reset applied when a card leaves the battlefield
    pub fn reset_battlefield_state(&mut self) {
        self.current_face_index = 0;
        self.tapped = false;
        self.face_down = false;
        self.rotation = 0;
        self.position = None;
        self.counters.clear();
        self.custom_text = None;
    }

    pub fn clear_reveals(&mut self) {
        self.revealed_to_all = false;
        self.revealed_to.clear();
    }
}

/// who may see the top card of a library
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopRevealMode {
    Off,
    /// the owner plays with the top card visible to themselves
    #[serde(rename = "self")]
    Owner,
    All,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: ActorId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub life: i64,
    #[serde(default)]
    pub commander_damage: BTreeMap<ActorId, i64>,
    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
    #[serde(default = "default_top_reveal")]
    pub library_top_reveal: TopRevealMode,
}

fn default_top_reveal() -> TopRevealMode {
    TopRevealMode::Off
}

impl Player {
    pub fn new(id: &ActorId, name: impl Into<String>) -> Self {
        Self {
            id: id.clone(),
            name: name.into(),
            color: None,
            life: STARTING_LIFE,
            commander_damage: BTreeMap::new(),
            counters: BTreeMap::new(),
            library_top_reveal: TopRevealMode::Off,
        }
    }
}

/// the projection one viewer derives from the log
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLogState {
    pub players: BTreeMap<ActorId, Player>,
    /// canonical join order
    pub player_order: Vec<ActorId>,
    pub cards: BTreeMap<String, Card>,
    pub zones: BTreeMap<String, Zone>,
    /// counter type -> color, first writer wins
    pub global_counters: BTreeMap<String, String>,
    pub battlefield_view_scale: BTreeMap<ActorId, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_host_id: Option<ActorId>,
    pub room_locked_by_host: bool,
    pub room_over_capacity: bool,
}

impl CommandLogState {
    pub fn zone(&self, kind: ZoneKind, owner: &ActorId) -> Option<&Zone> {
        self.zones.get(&zone_id(owner, kind))
    }

    /// cards of a zone in zone order
    pub fn cards_in(&self, zone_id: &str) -> Vec<&Card> {
        self.zones
            .get(zone_id)
            .map(|z| z.card_ids.iter().filter_map(|id| self.cards.get(id)).collect())
            .unwrap_or_default()
    }

    /// create any of the player's seven zones that do not exist yet
    pub fn ensure_zones(&mut self, owner: &ActorId) {
        for kind in ZoneKind::ALL {
            let id = zone_id(owner, kind);
            self.zones.entry(id.clone()).or_insert_with(|| Zone {
                id,
                kind,
                owner_id: owner.clone(),
                card_ids: Vec::new(),
            });
        }
    }

    /// rename every card of a hidden zone to its slot placeholder,
    /// keeping card data (and any identity this viewer knows) attached
    pub fn reslot_hidden_zone(&mut self, zone_id: &str) {
        let Some(zone) = self.zones.get(zone_id) else {
            return;
        };
        if !zone.kind.is_hidden() {
            return;
        }

        let old_ids = zone.card_ids.clone();
        let moved: Vec<Card> = old_ids.iter().filter_map(|id| self.cards.remove(id)).collect();

        let mut new_ids = Vec::with_capacity(moved.len());
        for (slot, mut card) in moved.into_iter().enumerate() {
            card.id = placeholder_id(zone_id, slot);
            card.zone_id = zone_id.to_string();
            new_ids.push(card.id.clone());
            self.cards.insert(card.id.clone(), card);
        }

        if let Some(zone) = self.zones.get_mut(zone_id) {
            zone.card_ids = new_ids;
        }
    }

    /// detach a card from its zone list; the card record stays
    pub fn detach_card(&mut self, card_id: &str) {
        let Some(zone_id) = self.cards.get(card_id).map(|c| c.zone_id.clone()) else {
            return;
        };
        if let Some(zone) = self.zones.get_mut(&zone_id) {
            zone.card_ids.retain(|id| id != card_id);
        }
    }

    /// delete a card entirely, re-slotting its zone if hidden
    pub fn remove_card(&mut self, card_id: &str) {
        let Some(zone_id) = self.cards.get(card_id).map(|c| c.zone_id.clone()) else {
            return;
        };
        self.detach_card(card_id);
        self.cards.remove(card_id);
        self.reslot_hidden_zone(&zone_id);
    }
}

/// per-viewer replay cursor. never synced; rebuilt on trust-context change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLogMeta {
    pub last_applied_index: usize,
    pub last_seq_by_actor: BTreeMap<ActorId, u64>,
    pub log_hash: String,
}

impl Default for CommandLogMeta {
    fn default() -> Self {
        Self {
            last_applied_index: 0,
            last_seq_by_actor: BTreeMap::new(),
            log_hash: genesis_hash(),
        }
    }
}

impl CommandLogMeta {
    /// next seq this viewer will accept from `actor`
    pub fn expected_seq(&self, actor: &ActorId) -> u64 {
        self.last_seq_by_actor.get(actor).copied().unwrap_or(0) + 1
    }
}
