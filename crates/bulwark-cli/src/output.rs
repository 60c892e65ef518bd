// crates/bulwark-cli/src/output.rs
//
// Output formatting utilities for the Bulwark CLI.
// Supports table and JSON output modes.

use serde::Serialize;
use tabled::{Table, Tabled};

use bulwark_module::ModuleSnapshot;

use crate::scenario::Outcome;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed table output (default).
    Table,
    /// JSON output for machine consumption.
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Table
        }
    }
}

/// A row in the reserve pool table.
#[derive(Tabled)]
pub struct ReservePoolRow {
    #[tabled(rename = "ID")]
    id: u16,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Stake")]
    stake: u128,
    #[tabled(rename = "Deposits")]
    deposits: u128,
    #[tabled(rename = "Pending Unstakes")]
    pending_unstakes: u128,
    #[tabled(rename = "Pending Withdrawals")]
    pending_withdrawals: u128,
    #[tabled(rename = "Fees")]
    fees: u128,
    #[tabled(rename = "Weight")]
    weight: u16,
}

/// A row in the reward pool table.
#[derive(Tabled)]
pub struct RewardPoolRow {
    #[tabled(rename = "ID")]
    id: u16,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Undripped")]
    undripped: u128,
    #[tabled(rename = "Dripped")]
    dripped: u128,
    #[tabled(rename = "Last Drip")]
    last_drip_time: u64,
}

#[derive(Tabled)]
pub struct RedemptionRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Pool")]
    pool: u16,
    #[tabled(rename = "Receiver")]
    receiver: String,
    #[tabled(rename = "Assets")]
    assets: u128,
    #[tabled(rename = "Ready At")]
    ready_at: u64,
}

#[derive(Tabled)]
pub struct OutcomeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Time")]
    time: u64,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

pub fn reserve_pool_rows(snapshot: &ModuleSnapshot) -> Vec<ReservePoolRow> {
    snapshot
        .reserve_pools
        .iter()
        .map(|p| ReservePoolRow {
            id: p.id,
            asset: p.pool.asset.short(),
            stake: p.pool.stake_amount,
            deposits: p.pool.deposit_amount,
            pending_unstakes: p.pool.pending_unstakes_amount,
            pending_withdrawals: p.pool.pending_withdrawals_amount,
            fees: p.pool.fee_amount,
            weight: p.pool.rewards_pool_weight,
        })
        .collect()
}

pub fn reward_pool_rows(snapshot: &ModuleSnapshot) -> Vec<RewardPoolRow> {
    snapshot
        .reward_pools
        .iter()
        .map(|p| RewardPoolRow {
            id: p.id,
            asset: p.asset.short(),
            undripped: p.undripped_rewards,
            dripped: p.cumulative_dripped_rewards,
            last_drip_time: p.last_drip_time,
        })
        .collect()
}

pub fn redemption_rows(snapshot: &ModuleSnapshot) -> Vec<RedemptionRow> {
    snapshot
        .redemptions
        .iter()
        .map(|r| RedemptionRow {
            id: r.id,
            kind: r.kind.to_string(),
            pool: r.reserve_pool_id,
            receiver: r.receiver.short(),
            assets: r.asset_amount,
            ready_at: r.ready_at(),
        })
        .collect()
}

pub fn outcome_rows(outcomes: &[Outcome]) -> Vec<OutcomeRow> {
    outcomes
        .iter()
        .map(|o| OutcomeRow {
            index: o.index,
            time: o.time,
            action: o.action.clone(),
            result: if o.ok { "ok" } else { "rejected" }.to_string(),
            detail: o.detail.clone(),
        })
        .collect()
}

/// Format a slice of Tabled items as a table string.
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    Table::new(data).to_string()
}

/// Format a serializable value as a pretty-printed JSON string.
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("JSON serialization error: {}", e))
}
