//! player, room and global reducers

use super::{Denial, Scope, Transition};
use crate::command::{
    BattlefieldScaleSet, GlobalCounterSet, PlayerJoin, PlayerLeave, PlayerUpdate, RoomLockSet,
};
use crate::state::{CommandLogState, Player};

const MIN_SCALE: f64 = 0.5;
const MAX_SCALE: f64 = 1.0;

pub(super) fn join(state: &mut CommandLogState, scope: &Scope<'_>, p: PlayerJoin) -> Transition {
    if &p.player_id != scope.actor {
        return Err(Denial::NotSelf);
    }

    if let Some(player) = state.players.get_mut(&p.player_id) {
        // rejoin only refreshes identity fields
        player.name = p.name;
        if p.color.is_some() {
            player.color = p.color;
        }
        state.ensure_zones(&p.player_id);
        return Ok(());
    }

    if state.room_locked_by_host {
        return Err(Denial::RoomLocked);
    }

    let mut player = Player::new(&p.player_id, p.name);
    player.color = p.color;
    state.players.insert(p.player_id.clone(), player);
    if !state.player_order.contains(&p.player_id) {
        state.player_order.push(p.player_id.clone());
    }
    state.ensure_zones(&p.player_id);
    Ok(())
}

pub(super) fn leave(state: &mut CommandLogState, scope: &Scope<'_>, p: PlayerLeave) -> Transition {
    if &p.player_id != scope.actor {
        return Err(Denial::NotSelf);
    }
    if state.players.remove(&p.player_id).is_none() {
        return Err(Denial::UnknownPlayer);
    }

    let owned_zones: Vec<String> = state
        .zones
        .values()
        .filter(|z| z.owner_id == p.player_id)
        .map(|z| z.id.clone())
        .collect();
    let owned_cards: Vec<String> = state
        .cards
        .values()
        .filter(|c| c.owner_id == p.player_id || owned_zones.contains(&c.zone_id))
        .map(|c| c.id.clone())
        .collect();

    for id in &owned_cards {
        state.detach_card(id);
        state.cards.remove(id);
    }
    for id in &owned_zones {
        state.zones.remove(id);
    }
    // what is left belongs to someone else; hand control back to the owner
    for card in state.cards.values_mut() {
        if card.controller_id == p.player_id {
            card.controller_id = card.owner_id.clone();
        }
        card.revealed_to.retain(|id| id != &p.player_id);
    }
    state.battlefield_view_scale.remove(&p.player_id);
    state.player_order.retain(|id| id != &p.player_id);
    Ok(())
}

pub(super) fn update(state: &mut CommandLogState, scope: &Scope<'_>, p: PlayerUpdate) -> Transition {
    if &p.player_id != scope.actor {
        return Err(Denial::NotSelf);
    }
    let player = state
        .players
        .get_mut(&p.player_id)
        .ok_or(Denial::UnknownPlayer)?;

    if let Some(name) = p.name {
        player.name = name;
    }
    if let Some(color) = p.color {
        player.color = Some(color);
    }
    if let Some(life) = p.life {
        player.life = life;
    }
    if let Some(damage) = p.commander_damage {
        for (source, amount) in damage {
            if amount == 0 {
                player.commander_damage.remove(&source);
            } else {
                player.commander_damage.insert(source, amount);
            }
        }
    }
    if let Some(counters) = p.counters {
        for (name, value) in counters {
            if value == 0 {
                player.counters.remove(&name);
            } else {
                player.counters.insert(name, value);
            }
        }
    }
    Ok(())
}

pub(super) fn set_scale(
    state: &mut CommandLogState,
    scope: &Scope<'_>,
    p: BattlefieldScaleSet,
) -> Transition {
    if &p.player_id != scope.actor {
        return Err(Denial::NotSelf);
    }
    if !state.players.contains_key(&p.player_id) {
        return Err(Denial::UnknownPlayer);
    }
    if !p.scale.is_finite() {
        return Err(Denial::InvalidValue);
    }
    state
        .battlefield_view_scale
        .insert(p.player_id, p.scale.clamp(MIN_SCALE, MAX_SCALE));
    Ok(())
}

pub(super) fn set_room_lock(
    state: &mut CommandLogState,
    scope: &Scope<'_>,
    p: RoomLockSet,
) -> Transition {
    if state.room_host_id.as_ref() != Some(scope.actor) {
        return Err(Denial::NotHost);
    }
    state.room_locked_by_host = p.locked;
    Ok(())
}

/// first writer wins; the color is immutable afterwards
pub(super) fn set_global_counter(state: &mut CommandLogState, p: GlobalCounterSet) -> Transition {
    if p.counter_type.is_empty() {
        return Err(Denial::InvalidValue);
    }
    if state.global_counters.contains_key(&p.counter_type) {
        return Err(Denial::AlreadySet);
    }
    state.global_counters.insert(p.counter_type, p.color);
    Ok(())
}
