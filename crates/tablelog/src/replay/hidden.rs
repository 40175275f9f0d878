//! hidden-zone reducers
//!
//! the public side only ever sees slot placeholders; identities come from
//! the viewer's overlay or from what the owner's projection already knows.

use super::{Denial, Scope, Transition};
use crate::command::{CardDraw, CardRevealSet, LibraryShuffle, LibraryTopRevealSet, ZoneSetHidden};
use crate::identity::ActorId;
use crate::state::{moving_id, zone_id, Card, CardIdentity, CommandLogState, TopRevealMode, ZoneKind};

/// upper bound on cards loaded into one hidden zone by a single command
pub const MAX_HIDDEN_ZONE_CARDS: usize = 1024;

/// identity a concealed card of `owner` keeps in this viewer's projection
pub(super) fn concealed_identity(
    scope: &Scope<'_>,
    owner: &ActorId,
    supplied: Option<CardIdentity>,
    known: Option<CardIdentity>,
) -> Option<CardIdentity> {
    if scope.disclosed && supplied.is_some() {
        return supplied;
    }
    if scope.owner_view(owner) {
        return supplied.or(known);
    }
    None
}

/// overlay identity for slot `i`, only when it was actually disclosed
fn disclosed_slot(scope: &Scope<'_>, cards: Option<&[CardIdentity]>, i: usize) -> Option<CardIdentity> {
    if !scope.disclosed {
        return None;
    }
    cards.and_then(|c| c.get(i).cloned())
}

/// set the public identity of a library's top card
pub(super) fn reveal_top(state: &mut CommandLogState, owner: &ActorId, identity: Option<CardIdentity>) {
    let library = zone_id(owner, ZoneKind::Library);
    let Some(top) = state.zones.get(&library).and_then(|z| z.card_ids.first().cloned()) else {
        return;
    };
    if let (Some(card), Some(identity)) = (state.cards.get_mut(&top), identity) {
        card.identity = Some(identity);
    }
}

pub(super) fn top_revealed_to_all(state: &CommandLogState, owner: &ActorId) -> bool {
    state
        .players
        .get(owner)
        .is_some_and(|p| p.library_top_reveal == TopRevealMode::All)
}

pub(super) fn draw(state: &mut CommandLogState, scope: &Scope<'_>, p: CardDraw) -> Transition {
    if &p.player_id != scope.actor {
        return Err(Denial::NotOwner);
    }
    let library = zone_id(&p.player_id, ZoneKind::Library);
    let hand = zone_id(&p.player_id, ZoneKind::Hand);
    if !state.zones.contains_key(&hand) {
        return Err(Denial::UnknownZone);
    }
    let zone = state.zones.get_mut(&library).ok_or(Denial::UnknownZone)?;
    if p.count == 0 || zone.card_ids.is_empty() {
        return Err(Denial::InvalidValue);
    }

    let n = p.count.min(zone.card_ids.len());
    let drawn: Vec<String> = zone.card_ids.drain(..n).collect();

    let mut arrivals = Vec::with_capacity(n);
    for (i, id) in drawn.iter().enumerate() {
        let Some(mut card) = state.cards.remove(id) else {
            continue;
        };
        card.clear_reveals();
        let known = card.identity.take();
        let supplied = disclosed_slot(scope, p.cards.as_deref(), i);
        card.identity = concealed_identity(scope, &p.player_id, supplied, known);
        card.id = format!("{}:{i}", moving_id(scope.command_id));
        card.zone_id = hand.clone();
        arrivals.push(card);
    }

    state.reslot_hidden_zone(&library);
    if let Some(zone) = state.zones.get_mut(&hand) {
        zone.card_ids.extend(arrivals.iter().map(|c| c.id.clone()));
    }
    for card in arrivals {
        state.cards.insert(card.id.clone(), card);
    }
    state.reslot_hidden_zone(&hand);

    if top_revealed_to_all(state, &p.player_id) {
        reveal_top(state, &p.player_id, p.reveal);
    }
    Ok(())
}

pub(super) fn shuffle(state: &mut CommandLogState, scope: &Scope<'_>, p: LibraryShuffle) -> Transition {
    if &p.player_id != scope.actor {
        return Err(Denial::NotOwner);
    }
    let library = zone_id(&p.player_id, ZoneKind::Library);
    let ids = state
        .zones
        .get(&library)
        .map(|z| z.card_ids.clone())
        .ok_or(Denial::UnknownZone)?;

    // the new order is only known to viewers holding the overlay
    let order = match &p.cards {
        Some(cards) if scope.disclosed && cards.len() == ids.len() => Some(cards),
        _ => None,
    };
    for (i, id) in ids.iter().enumerate() {
        if let Some(card) = state.cards.get_mut(id) {
            card.clear_reveals();
            card.identity = order.and_then(|o| o.get(i).cloned());
        }
    }

    if top_revealed_to_all(state, &p.player_id) {
        reveal_top(state, &p.player_id, p.reveal);
    }
    Ok(())
}

pub(super) fn set_hidden(state: &mut CommandLogState, scope: &Scope<'_>, p: ZoneSetHidden) -> Transition {
    let zone = state.zones.get(&p.zone_id).ok_or(Denial::UnknownZone)?;
    if &zone.owner_id != scope.actor {
        return Err(Denial::NotOwner);
    }
    if !zone.kind.is_hidden() {
        return Err(Denial::Forbidden);
    }
    if p.count > MAX_HIDDEN_ZONE_CARDS {
        return Err(Denial::InvalidValue);
    }

    let owner = zone.owner_id.clone();
    let previous = zone.card_ids.clone();
    for id in &previous {
        state.cards.remove(id);
    }

    let identities = match &p.cards {
        Some(cards) if scope.disclosed && cards.len() == p.count => Some(cards),
        _ => None,
    };
    let mut ids = Vec::with_capacity(p.count);
    for slot in 0..p.count {
        let id = format!("{}:{slot}", moving_id(scope.command_id));
        let mut card = Card::new(id, &owner, p.zone_id.clone());
        card.identity = identities.and_then(|c| c.get(slot).cloned());
        ids.push(card.id.clone());
        state.cards.insert(card.id.clone(), card);
    }
    if let Some(zone) = state.zones.get_mut(&p.zone_id) {
        zone.card_ids = ids;
    }
    state.reslot_hidden_zone(&p.zone_id);
    Ok(())
}

pub(super) fn set_reveal(state: &mut CommandLogState, scope: &Scope<'_>, p: CardRevealSet) -> Transition {
    let card = state.cards.get(&p.card_id).ok_or(Denial::UnknownCard)?;
    if &card.owner_id != scope.actor {
        return Err(Denial::NotOwner);
    }
    let concealed = card.face_down
        || state
            .zones
            .get(&card.zone_id)
            .map_or(true, |z| z.kind.is_hidden());

    let mut to = p.to;
    to.sort();
    to.dedup();

    let owner_view = scope.owner_view(&card.owner_id);
    let card = state.cards.get_mut(&p.card_id).ok_or(Denial::UnknownCard)?;
    card.revealed_to_all = p.to_all;
    card.revealed_to = to;

    if concealed && !owner_view {
        let disclosed = if scope.disclosed { p.identity } else { None };
        card.identity = if p.to_all {
            p.reveal.or(disclosed)
        } else {
            disclosed
        };
    }
    Ok(())
}

pub(super) fn set_top_reveal(
    state: &mut CommandLogState,
    scope: &Scope<'_>,
    p: LibraryTopRevealSet,
) -> Transition {
    if &p.player_id != scope.actor {
        return Err(Denial::NotOwner);
    }
    let player = state.players.get_mut(&p.player_id).ok_or(Denial::UnknownPlayer)?;
    player.library_top_reveal = p.mode;

    if scope.owner_view(&p.player_id) {
        return Ok(());
    }
    let library = zone_id(&p.player_id, ZoneKind::Library);
    let Some(top) = state.zones.get(&library).and_then(|z| z.card_ids.first().cloned()) else {
        return Ok(());
    };
    let disclosed = if scope.disclosed { p.identity } else { None };
    if let Some(card) = state.cards.get_mut(&top) {
        card.identity = match p.mode {
            TopRevealMode::All => p.reveal.or(disclosed),
            TopRevealMode::Owner | TopRevealMode::Off => disclosed,
        };
    }
    Ok(())
}
