//! Recipe matching and crafting.

use crate::action::CraftInput;
use crate::outcome::{Notice, Rejection};
use crate::progression::grant_xp;
use crate::reducer::{ensure_storage, Step};
use idle_core::{Catalog, GameState, Recipe};
use tracing::info;

/// Recipe whose inputs equal `items` as a multiset. Order does not matter;
/// extras or shortfalls never match.
pub fn match_recipe<I, S>(catalog: &Catalog, items: I) -> Option<&Recipe>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut attempt: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    attempt.sort_unstable();
    catalog
        .recipes
        .iter()
        .find(|r| r.flattened_inputs() == attempt)
}

pub(crate) fn craft(step: &mut Step, state: &mut GameState, input: &CraftInput) -> Result<(), Rejection> {
    let catalog = step.catalog;
    let recipe = match input {
        CraftInput::Recipe(id) => {
            let r = catalog
                .recipe(id)
                .ok_or_else(|| Rejection::UnknownEntry(id.clone()))?;
            if !state.discovered.contains(&r.id) {
                return Err(Rejection::Undiscovered(r.id.clone()));
            }
            r
        }
        CraftInput::Items(items) => {
            match_recipe(catalog, items).ok_or(Rejection::NoMatchingRecipe)?
        }
    };

    let have = state.resources.energy;
    if !state.resources.try_spend_energy(recipe.energy_cost) {
        return Err(Rejection::InsufficientEnergy {
            need: recipe.energy_cost,
            have,
        });
    }
    let before_total = state.inventory.total();
    if !state.inventory.remove_all(&recipe.inputs) {
        return Err(Rejection::MissingItems);
    }
    state
        .inventory
        .add(&recipe.output.item, recipe.output.amount as u64);
    ensure_storage(catalog, before_total, state)?;

    let new_discovery = state.discovered.insert(recipe.id.clone());
    state.stats.total_crafted += recipe.output.amount as u64;
    if new_discovery {
        info!(recipe = %recipe.id, "recipe discovered");
    }
    step.notify(Notice::Crafted {
        recipe_id: recipe.id.clone(),
        output: recipe.output.clone(),
        new_discovery,
    });
    let bonus = if new_discovery {
        catalog.settings.discovery_xp
    } else {
        0
    };
    grant_xp(step, state, recipe.xp_reward + bonus);
    Ok(())
}
