//! Two-leg route construction from a pool snapshot.

use crate::buyback::types::SwapAction;
use crate::config::AppConfig;
use crate::dex::calc::{get_token_flow_ratio, min_amount_out};
use crate::dex::state::PoolSnapshot;
use crate::errors::Result;
use bigdecimal::BigDecimal;
use num_traits::Zero;
use tracing::{info, warn};

/// Static description of the buyback route.
#[derive(Debug, Clone)]
pub struct Route {
    pub token_in: String,
    pub token_out: String,
    pub pool_one: u64,
    pub pool_two: u64,
    pub slippage: BigDecimal,
}

impl Route {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            token_in: config.token_in.clone(),
            token_out: config.token_out.clone(),
            pool_one: config.pool_one,
            pool_two: config.pool_two,
            slippage: config.retry.slippage.clone(),
        }
    }
}

/// Size both legs for `amount_in` against one snapshot.
///
/// An empty list means there is no viable route this time: a pool is missing,
/// cannot be oriented, or quotes zero. Only a malformed target pool is an error.
pub fn build_actions(route: &Route, amount_in: u128, snapshot: &PoolSnapshot) -> Result<Vec<SwapAction>> {
    let (Some(pool_one), Some(pool_two)) = (snapshot.find(route.pool_one)?, snapshot.find(route.pool_two)?)
    else {
        warn!(
            pool_one = route.pool_one,
            pool_two = route.pool_two,
            "[BUYBACK] configured pool missing from snapshot"
        );
        return Ok(Vec::new());
    };

    let Some(leg_one) = pool_one.selling(&route.token_in) else {
        warn!(pool = pool_one.id, token = %route.token_in, "[BUYBACK] first pool does not trade the fund token");
        return Ok(Vec::new());
    };
    let Some(leg_two) = pool_two.buying(&route.token_out) else {
        warn!(pool = pool_two.id, token = %route.token_out, "[BUYBACK] second pool does not trade the buyback token");
        return Ok(Vec::new());
    };
    if leg_two.token_in != leg_one.token_out {
        warn!(
            first_out = leg_one.token_out,
            second_in = leg_two.token_in,
            "[BUYBACK] pools do not chain"
        );
        return Ok(Vec::new());
    }

    let one_amount_out = get_token_flow_ratio(
        &amount_in.to_string(),
        leg_one.balance_in,
        leg_one.balance_out,
        leg_one.total_fee,
    );
    info!(one_amount_out = %one_amount_out, "[BUYBACK] first leg quoted");
    if one_amount_out.is_zero() {
        warn!("[BUYBACK] first leg quotes zero");
        return Ok(Vec::new());
    }

    let two_amount_out = get_token_flow_ratio(
        &one_amount_out.to_string(),
        leg_two.balance_in,
        leg_two.balance_out,
        leg_two.total_fee,
    );
    info!(two_amount_out = %two_amount_out, "[BUYBACK] second leg quoted");
    if two_amount_out.is_zero() {
        warn!("[BUYBACK] second leg quotes zero");
        return Ok(Vec::new());
    }

    Ok(vec![
        SwapAction {
            pool_id: pool_one.id,
            token_in: leg_one.token_in.to_string(),
            amount_in: Some(amount_in.to_string()),
            token_out: leg_one.token_out.to_string(),
            min_amount_out: min_amount_out(&one_amount_out, &route.slippage).to_string(),
        },
        SwapAction {
            pool_id: pool_two.id,
            token_in: leg_two.token_in.to_string(),
            amount_in: None,
            token_out: leg_two.token_out.to_string(),
            min_amount_out: min_amount_out(&two_amount_out, &route.slippage).to_string(),
        },
    ])
}
