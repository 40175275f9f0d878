//! public card lifecycle reducers

use super::hidden::{concealed_identity, reveal_top, top_revealed_to_all};
use super::{Denial, Scope, Transition};
use crate::command::{CardCreate, CardMove, CardRemove, CardUntapAll, CardUpdate, ZoneReorder};
use crate::rules;
use crate::state::{arrival_id, is_reserved_id, moving_id, Card, CommandLogState, ZoneKind};

pub(super) fn reorder(state: &mut CommandLogState, scope: &Scope<'_>, p: ZoneReorder) -> Transition {
    let zone = state.zones.get_mut(&p.zone_id).ok_or(Denial::UnknownZone)?;
    if &zone.owner_id != scope.actor {
        return Err(Denial::NotOwner);
    }
    if zone.kind.is_hidden() {
        return Err(Denial::Forbidden);
    }
    if !rules::is_permutation(&zone.card_ids, &p.card_ids) {
        return Err(Denial::NotPermutation);
    }
    zone.card_ids = p.card_ids;
    Ok(())
}

pub(super) fn create(state: &mut CommandLogState, scope: &Scope<'_>, p: CardCreate) -> Transition {
    if p.card_id.is_empty() || is_reserved_id(&p.card_id) || state.cards.contains_key(&p.card_id) {
        return Err(Denial::IdTaken);
    }
    let zone = state.zones.get(&p.zone_id).ok_or(Denial::UnknownZone)?;
    if !rules::can_create(scope.actor, &p.owner_id, zone, p.is_token) {
        return Err(Denial::Forbidden);
    }

    let mut card = Card::new(p.card_id.clone(), &p.owner_id, p.zone_id.clone());
    card.is_token = p.is_token;
    card.face_down = p.face_down && zone.kind == ZoneKind::Battlefield;
    card.position = p.position;
    card.identity = if card.face_down {
        concealed_identity(scope, &p.owner_id, p.identity, None)
    } else {
        p.identity
    };

    if let Some(zone) = state.zones.get_mut(&p.zone_id) {
        zone.card_ids.push(p.card_id.clone());
    }
    state.cards.insert(p.card_id, card);
    Ok(())
}

pub(super) fn update(state: &mut CommandLogState, scope: &Scope<'_>, p: CardUpdate) -> Transition {
    let card = state.cards.get(&p.card_id).ok_or(Denial::UnknownCard)?;
    let zone = state.zones.get(&card.zone_id).ok_or(Denial::UnknownZone)?;
    if p.tapped.is_some() && !rules::can_tap(scope.actor, card, zone) {
        return Err(Denial::NotController);
    }
    if !rules::can_modify(scope.actor, card, zone) {
        return Err(Denial::NotController);
    }
    if let Some(controller) = &p.controller_id {
        if !state.players.contains_key(controller) {
            return Err(Denial::UnknownPlayer);
        }
    }

    let card = state.cards.get_mut(&p.card_id).ok_or(Denial::UnknownCard)?;
    if let Some(tapped) = p.tapped {
        card.tapped = tapped;
    }
    if let Some(index) = p.current_face_index {
        card.current_face_index = index;
    }
    if let Some(rotation) = p.rotation {
        card.rotation = rotation.rem_euclid(360);
    }
    if let Some(position) = p.position {
        card.position = Some(position);
    }
    if let Some(counters) = p.counters {
        for (name, value) in counters {
            if value == 0 {
                card.counters.remove(&name);
            } else {
                card.counters.insert(name, value);
            }
        }
    }
    if let Some(text) = p.custom_text {
        card.custom_text = if text.is_empty() { None } else { Some(text) };
    }
    if let Some(controller) = p.controller_id {
        card.controller_id = controller;
    }

    match p.face_down {
        Some(true) if !card.face_down => {
            card.face_down = true;
            card.current_face_index = 0;
            let known = card.identity.take();
            card.identity = concealed_identity(scope, &card.owner_id, p.identity, known);
        }
        Some(false) if card.face_down => {
            card.face_down = false;
            let known = card.identity.take();
            card.identity = p.reveal.or(known);
        }
        _ if card.face_down && scope.disclosed && p.identity.is_some() => {
            card.identity = p.identity;
        }
        _ => {}
    }
    Ok(())
}

pub(super) fn move_card(state: &mut CommandLogState, scope: &Scope<'_>, p: CardMove) -> Transition {
    let card = state.cards.get(&p.card_id).ok_or(Denial::UnknownCard)?;
    let from = state.zones.get(&card.zone_id).ok_or(Denial::UnknownZone)?;
    let to = state.zones.get(&p.to_zone_id).ok_or(Denial::UnknownZone)?;
    if !rules::can_move(scope.actor, card, from, to) {
        return Err(Denial::Forbidden);
    }

    let from_id = from.id.clone();
    let from_kind = from.kind;
    let from_owner = from.owner_id.clone();
    let to_kind = to.kind;
    let to_owner = to.owner_id.clone();
    let owner = card.owner_id.clone();
    let leaving_play = from_kind == ZoneKind::Battlefield && to_kind != ZoneKind::Battlefield;

    if card.is_token && leaving_play {
        state.remove_card(&p.card_id);
        return Ok(());
    }

    // hidden-zone slots are renamed on every change, so the card travels
    // under a fresh id and is re-slotted on arrival when needed
    let new_id = if to_kind.is_hidden() {
        moving_id(scope.command_id)
    } else if from_kind.is_hidden() {
        let id = match &p.new_card_id {
            Some(id) if id.is_empty() || is_reserved_id(id) => return Err(Denial::IdTaken),
            Some(id) => id.clone(),
            None => arrival_id(scope.command_id),
        };
        if state.cards.contains_key(&id) {
            return Err(Denial::IdTaken);
        }
        id
    } else {
        p.card_id.clone()
    };

    let mut card = state.cards.remove(&p.card_id).ok_or(Denial::UnknownCard)?;
    if let Some(zone) = state.zones.get_mut(&from_id) {
        zone.card_ids.retain(|id| id != &p.card_id);
    }
    state.reslot_hidden_zone(&from_id);

    let was_concealed = from_kind.is_hidden() || card.face_down;
    if from_id != p.to_zone_id {
        card.clear_reveals();
    }
    if leaving_play {
        card.reset_battlefield_state();
        card.controller_id = owner.clone();
    }

    match to_kind {
        ZoneKind::Battlefield if from_kind == ZoneKind::Battlefield => {
            card.position = p.position.or(card.position);
        }
        ZoneKind::Battlefield => {
            card.face_down = p.face_down;
            card.position = p.position;
        }
        _ => card.face_down = false,
    }

    let known = card.identity.take();
    card.identity = if to_kind.is_hidden() || card.face_down {
        concealed_identity(scope, &owner, p.identity, known)
    } else if was_concealed {
        let disclosed = if scope.disclosed { p.identity } else { None };
        p.reveal.or(disclosed).or(known)
    } else {
        known
    };

    card.id = new_id;
    card.zone_id = p.to_zone_id.clone();
    let zone = state.zones.get_mut(&p.to_zone_id).ok_or(Denial::UnknownZone)?;
    let at = p.index.unwrap_or(zone.card_ids.len()).min(zone.card_ids.len());
    zone.card_ids.insert(at, card.id.clone());
    state.cards.insert(card.id.clone(), card);
    state.reslot_hidden_zone(&p.to_zone_id);

    // a new library top is shown again while its owner reveals it to all
    let new_top = match (from_kind, to_kind) {
        (ZoneKind::Library, _) => Some(from_owner),
        (_, ZoneKind::Library) if at == 0 => Some(to_owner),
        _ => None,
    };
    if let Some(owner) = new_top.filter(|o| top_revealed_to_all(state, o)) {
        reveal_top(state, &owner, p.top_reveal);
    }
    Ok(())
}

pub(super) fn remove(state: &mut CommandLogState, scope: &Scope<'_>, p: CardRemove) -> Transition {
    let card = state.cards.get(&p.card_id).ok_or(Denial::UnknownCard)?;
    if !rules::can_remove(scope.actor, card) {
        return Err(Denial::NotOwner);
    }
    state.remove_card(&p.card_id);
    Ok(())
}

pub(super) fn untap_all(state: &mut CommandLogState, scope: &Scope<'_>, p: CardUntapAll) -> Transition {
    if &p.player_id != scope.actor {
        return Err(Denial::NotSelf);
    }
    let zones = &state.zones;
    for card in state.cards.values_mut() {
        let on_battlefield = zones
            .get(&card.zone_id)
            .is_some_and(|z| z.kind == ZoneKind::Battlefield);
        if on_battlefield && &card.controller_id == scope.actor {
            card.tapped = false;
        }
    }
    Ok(())
}
