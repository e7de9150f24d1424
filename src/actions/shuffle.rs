//! `shuffleCards` (spec §4.3).
//!
//! Permutes `_cards` uniformly at random using a cryptographically
//! acceptable PRNG; the multiset of card codes is preserved exactly
//! (invariant 5, property P4). Per the Open Question in spec §9 (resolved
//! in DESIGN.md): statistical uniformity is best-effort, not guaranteed —
//! `ChaCha8Rng` gives a solid general-purpose shuffle without claiming a
//! formal uniformity proof.

use crate::model::{ObjectId, Variant};
use crate::store::TableStore;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

pub fn shuffle_cards(store: &TableStore, ids: &[ObjectId]) {
    let mut rng = ChaCha8Rng::from_entropy();

    store.transact(Some("local"), |txn| {
        for id in ids {
            let Some(mut obj) = store.get_object_in(txn, id) else { continue };

            if let Variant::Stack { cards, .. } = &mut obj.variant {
                cards.shuffle(&mut rng);
                store.set_object(txn, &obj);
            }
        }
    });
}
