//! XP, levels and level-gated slot unlocks.

use crate::outcome::Notice;
use crate::reducer::Step;
use idle_core::GameState;
use tracing::info;

/// Add XP, rolling over into as many levels as it pays for.
pub(crate) fn grant_xp(step: &mut Step, state: &mut GameState, xp: u64) {
    if xp == 0 {
        return;
    }
    let catalog = step.catalog;
    let curve = &catalog.settings.progression;
    state.progression.xp = state.progression.xp.saturating_add(xp);
    let mut leveled = false;
    while state.progression.level < curve.max_level {
        let need = curve.xp_for_level(state.progression.level);
        if state.progression.xp < need {
            break;
        }
        state.progression.xp -= need;
        state.progression.level += 1;
        leveled = true;
        info!(level = state.progression.level, "level up");
        step.notify(Notice::LevelUp {
            level: state.progression.level,
        });
    }
    if leveled {
        unlock_free_slots(step, state);
    }
}

/// Unlock every free slot whose level gate is now met.
pub(crate) fn unlock_free_slots(step: &mut Step, state: &mut GameState) {
    let catalog = step.catalog;
    let level = state.progression.level;
    for slot in state.slots.iter_mut().filter(|s| !s.unlocked) {
        let Some(spec) = catalog.slot_spec(&slot.slot_id) else {
            continue;
        };
        if spec.unlock_cost == 0 && spec.unlock_level <= level {
            slot.unlocked = true;
            step.notify(Notice::SlotUnlocked {
                slot_id: slot.slot_id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::{fixtures, new_game};
    use idle_core::Timestamp;

    #[test]
    fn xp_rolls_over_multiple_levels() {
        let c = fixtures::catalog();
        let mut s = new_game(&c, Timestamp(0));
        let mut step = Step::new(&c, Timestamp(0));
        // 100 for level 1->2, 150 for 2->3
        grant_xp(&mut step, &mut s, 260);
        assert_eq!(s.progression.level, 3);
        assert_eq!(s.progression.xp, 10);
        assert!(step.notices.contains(&Notice::LevelUp { level: 3 }));
    }

    #[test]
    fn level_up_unlocks_free_gated_slot() {
        let c = fixtures::catalog();
        let mut s = new_game(&c, Timestamp(0));
        assert!(!s.slot("g3").unwrap().unlocked);
        let mut step = Step::new(&c, Timestamp(0));
        grant_xp(&mut step, &mut s, 250);
        assert!(s.slot("g3").unwrap().unlocked);
        // paid slots stay locked
        assert!(!s.slot("g2").unwrap().unlocked);
        assert!(step.notices.contains(&Notice::SlotUnlocked {
            slot_id: "g3".into()
        }));
    }
}
