//! Selling to the market and the delivery order board.

use crate::outcome::{Notice, Rejection};
use crate::progression::grant_xp;
use crate::reducer::{earn, Step};
use idle_core::{GameState, Order};
use rand::Rng;

pub(crate) fn sell(
    step: &mut Step,
    state: &mut GameState,
    item_id: &str,
    amount: u64,
) -> Result<(), Rejection> {
    if amount == 0 {
        return Err(Rejection::InvalidAmount);
    }
    let catalog = step.catalog;
    let producible = catalog
        .producible(item_id)
        .ok_or_else(|| Rejection::UnknownEntry(item_id.to_string()))?;
    if !state.inventory.remove(item_id, amount) {
        return Err(Rejection::MissingItems);
    }
    let market = &catalog.settings.market;
    let entry = state
        .market
        .entry(item_id.to_string())
        .or_insert_with(|| idle_econ::initial_entry(producible.base_value, market, step.now));
    let earned = idle_econ::sale_value(entry, amount);
    idle_econ::record_sale(entry, producible.base_value, amount, market, step.now);
    earn(state, earned);
    state.stats.total_sold += amount;
    step.notify(Notice::Sold {
        item_id: item_id.to_string(),
        amount,
        earned,
    });
    Ok(())
}

pub(crate) fn fulfill_order(
    step: &mut Step,
    state: &mut GameState,
    order_id: &str,
) -> Result<(), Rejection> {
    let catalog = step.catalog;
    let pos = state
        .orders
        .iter()
        .position(|o| o.order_id == order_id)
        .ok_or_else(|| Rejection::UnknownOrder(order_id.to_string()))?;
    let order = &state.orders[pos];
    if order.is_expired(step.now) {
        return Err(Rejection::OrderExpired(order_id.to_string()));
    }
    let template = catalog
        .order(&order.template_id)
        .ok_or_else(|| Rejection::UnknownEntry(order.template_id.clone()))?;
    if !state.inventory.remove_all(&template.items) {
        return Err(Rejection::MissingItems);
    }
    state.orders.remove(pos);
    earn(state, template.reward_money);
    state.stats.bump("orders_fulfilled", 1.0);
    step.notify(Notice::OrderFulfilled {
        order_id: order_id.to_string(),
        reward: template.reward_money,
    });
    grant_xp(step, state, template.reward_xp);
    Ok(())
}

/// Drop expired orders and post a new one when the board has room and the
/// refresh interval has passed.
pub(crate) fn refresh_orders(step: &mut Step, state: &mut GameState) {
    let catalog = step.catalog;
    let now = step.now;
    let mut expired = Vec::new();
    state.orders.retain(|o| {
        if o.is_expired(now) {
            expired.push(o.order_id.clone());
            false
        } else {
            true
        }
    });
    for order_id in expired {
        step.notify(Notice::OrderExpired { order_id });
    }

    let board = &catalog.settings.order_board;
    if catalog.orders.is_empty()
        || state.orders.len() >= board.max_open
        || now.secs_since(state.last_order_refresh) < board.refresh_secs
    {
        return;
    }
    let mut rng = idle_econ::draw_rng(&mut state.rng);
    let template = &catalog.orders[rng.gen_range(0..catalog.orders.len())];
    state.next_order_seq += 1;
    let order_id = format!("order-{}", state.next_order_seq);
    state.orders.push(Order {
        order_id: order_id.clone(),
        template_id: template.id.clone(),
        expires_at: now.plus_secs(template.duration_secs),
    });
    state.last_order_refresh = now;
    step.notify(Notice::OrderPosted { order_id });
}
