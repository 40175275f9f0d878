//! game-level authorization predicates
//!
//! every predicate is evaluated against the envelope's authenticated actor
//! and the current projection, never against the local viewer.

use std::collections::BTreeMap;

use crate::identity::ActorId;
use crate::state::{Card, Zone, ZoneKind};

/// hidden zones are viewable by their owner only
pub fn can_view_zone(zone: &Zone, viewer: Option<&ActorId>) -> bool {
    !zone.kind.is_hidden() || viewer == Some(&zone.owner_id)
}

/// may `actor` move `card` from `from` into `to`
pub fn can_move(actor: &ActorId, card: &Card, from: &Zone, to: &Zone) -> bool {
    // only the owner pulls a card out of a hidden zone
    if !can_view_zone(from, Some(actor)) {
        return false;
    }
    // a token leaving play vanishes; only its owner may do that
    if card.is_token && from.kind == ZoneKind::Battlefield && to.kind != ZoneKind::Battlefield {
        return actor == &card.owner_id;
    }
    if to.kind == ZoneKind::Battlefield {
        return actor == &card.owner_id
            || actor == &to.owner_id
            || (from.kind == ZoneKind::Battlefield && actor == &from.owner_id);
    }
    // a card only ever lands in a non-battlefield zone of its owner
    actor == &to.owner_id && to.owner_id == card.owner_id
}

/// tap/untap: battlefield only, controller only
pub fn can_tap(actor: &ActorId, card: &Card, zone: &Zone) -> bool {
    zone.kind == ZoneKind::Battlefield && actor == &card.controller_id
}

/// other battlefield state changes: the controller, or the owner taking it back
pub fn can_modify(actor: &ActorId, card: &Card, zone: &Zone) -> bool {
    zone.kind == ZoneKind::Battlefield && (actor == &card.controller_id || actor == &card.owner_id)
}

/// tokens only on the author's battlefield; other cards only into the
/// author's own public zones
pub fn can_create(actor: &ActorId, owner: &ActorId, zone: &Zone, is_token: bool) -> bool {
    if is_token {
        return zone.kind == ZoneKind::Battlefield && actor == &zone.owner_id && actor == owner;
    }
    !zone.kind.is_hidden() && actor == owner && actor == &zone.owner_id
}

pub fn can_remove(actor: &ActorId, card: &Card) -> bool {
    actor == &card.owner_id
}

/// `proposed` is a reordering of exactly the cards in `current`
pub fn is_permutation(current: &[String], proposed: &[String]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for id in current {
        *counts.entry(id.as_str()).or_default() += 1;
    }
    for id in proposed {
        *counts.entry(id.as_str()).or_default() -= 1;
    }
    counts.values().all(|&n| n == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::zone_id;

    fn zone(owner: &str, kind: ZoneKind) -> Zone {
        let owner = ActorId::from(owner);
        Zone {
            id: zone_id(&owner, kind),
            kind,
            owner_id: owner,
            card_ids: Vec::new(),
        }
    }

    fn card(owner: &str) -> Card {
        Card::new("c", &ActorId::from(owner), "z")
    }

    #[test]
    fn test_battlefield_moves() {
        let a = ActorId::from("a");
        let b = ActorId::from("b");
        let c = ActorId::from("c");
        let a_bf = zone("a", ZoneKind::Battlefield);
        let b_bf = zone("b", ZoneKind::Battlefield);

        // owner between any battlefields
        assert!(can_move(&a, &card("a"), &a_bf, &b_bf));
        // destination host may take it in
        assert!(can_move(&b, &card("a"), &a_bf, &b_bf));
        // source host may hand it over
        assert!(can_move(&a, &card("c"), &a_bf, &b_bf));
        // bystander may not
        assert!(!can_move(&c, &card("a"), &a_bf, &b_bf));
    }

    #[test]
    fn test_hidden_and_private_zones() {
        let a = ActorId::from("a");
        let b = ActorId::from("b");
        let a_hand = zone("a", ZoneKind::Hand);
        let a_bf = zone("a", ZoneKind::Battlefield);
        let a_gy = zone("a", ZoneKind::Graveyard);

        assert!(can_move(&a, &card("a"), &a_hand, &a_bf));
        assert!(!can_move(&b, &card("a"), &a_hand, &a_bf));
        // only the destination owner receives into non-battlefield zones
        assert!(!can_move(&b, &card("a"), &a_bf, &a_gy));
        assert!(can_move(&a, &card("a"), &a_bf, &a_gy));

        assert!(can_view_zone(&a_hand, Some(&a)));
        assert!(!can_view_zone(&a_hand, Some(&b)));
        assert!(!can_view_zone(&a_hand, None));
        assert!(can_view_zone(&a_bf, None));
    }

    #[test]
    fn test_token_leaving_play() {
        let a = ActorId::from("a");
        let b = ActorId::from("b");
        let mut token = card("a");
        token.is_token = true;
        let b_bf = zone("b", ZoneKind::Battlefield);
        let a_gy = zone("a", ZoneKind::Graveyard);
        assert!(can_move(&a, &token, &b_bf, &a_gy));
        assert!(!can_move(&b, &token, &b_bf, &a_gy));
    }

    #[test]
    fn test_tap_and_create() {
        let a = ActorId::from("a");
        let b = ActorId::from("b");
        let a_bf = zone("a", ZoneKind::Battlefield);
        let a_gy = zone("a", ZoneKind::Graveyard);
        let a_lib = zone("a", ZoneKind::Library);

        assert!(can_tap(&a, &card("a"), &a_bf));
        assert!(!can_tap(&b, &card("a"), &a_bf));
        assert!(!can_tap(&a, &card("a"), &a_gy));

        assert!(can_create(&a, &a, &a_bf, true));
        assert!(!can_create(&b, &b, &a_bf, true));
        assert!(!can_create(&a, &a, &a_gy, true));
        assert!(can_create(&a, &a, &a_gy, false));
        assert!(!can_create(&a, &a, &a_lib, false));
    }

    #[test]
    fn test_permutation() {
        let cur: Vec<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        let perm: Vec<String> = ["z", "x", "y"].iter().map(|s| s.to_string()).collect();
        let dup: Vec<String> = ["x", "x", "y"].iter().map(|s| s.to_string()).collect();
        assert!(is_permutation(&cur, &perm));
        assert!(!is_permutation(&cur, &dup));
        assert!(!is_permutation(&cur, &cur[..2]));
    }
}
