//! CLI commands for the segwit-light node
//!
//! Implements all command handlers for the CLI interface.

use crate::config::NodeConfig;
use crate::core::{MockClock, OutPoint, PolicyZone, COIN};
use crate::node::Node;
use chrono::{TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const HOUR: i64 = 3_600;

/// Offsets from activation walked by `simulate`
pub const SIMULATION_OFFSETS: [i64; 6] = [-24 * HOUR, -10 * HOUR, -HOUR, HOUR, 10 * HOUR, 24 * HOUR];

/// Application state
pub struct AppState {
    pub config: NodeConfig,
}

impl AppState {
    /// Load the config file if one is given, defaults otherwise
    pub fn new(config_path: Option<&Path>) -> CliResult<Self> {
        let config = match config_path {
            Some(path) => {
                println!("📂 Loading config from {:?}...", path);
                NodeConfig::load(path)?
            }
            None => NodeConfig::default(),
        };
        Ok(Self { config })
    }
}

/// Print the effective configuration
pub fn cmd_config(state: &AppState) -> CliResult<()> {
    state.config.validate()?;
    println!("{}", serde_json::to_string_pretty(&state.config)?);
    Ok(())
}

/// Write the effective configuration to a file
pub fn cmd_config_save(state: &AppState, path: &Path) -> CliResult<()> {
    state.config.save(path)?;
    println!("✅ Config written to {:?}", path);
    Ok(())
}

/// Print the policy zone at a given time
pub fn cmd_zone(state: &AppState, time: i64) -> CliResult<()> {
    let policy = state.config.activation_policy()?;
    let zone = policy.zone_at(time);
    let distance = time.saturating_sub(policy.activation_time());

    println!("🕒 Time: {} ({})", time, format_time(time));
    println!(
        "   ├─ Activation: {} ({})",
        policy.activation_time(),
        format_time(policy.activation_time())
    );
    println!("   ├─ Offset: {:+}s", distance);
    println!("   ├─ Zone: {}", zone);
    println!(
        "   ├─ Wallet spends unconfirmed: {}",
        yes_no(zone.allows_wallet_unconfirmed() && state.config.spend_zero_conf_change)
    );
    println!(
        "   └─ Mempool relays unconfirmed spends: {}",
        yes_no(zone.allows_relay_unconfirmed())
    );
    Ok(())
}

/// Outcome of the three unconfirmed-spend attempts at one offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRow {
    pub offset: i64,
    pub zone: PolicyZone,
    /// The wallet built and relayed a spend of unconfirmed change
    pub wallet_spend: bool,
    /// A hand-built spend of an unconfirmed output was relayed
    pub relay: bool,
    /// The same hand-built spend confirmed when mined directly
    pub mined: bool,
}

/// Run the unconfirmed-spend walk at one offset from activation
///
/// A fresh in-memory node is funded well before activation with exactly
/// one mature coinbase; the clock then jumps to `activation + offset`
/// where the node pays itself and tries to spend the unconfirmed result.
pub async fn simulate_offset(config: &NodeConfig, offset: i64) -> CliResult<SimulationRow> {
    let clock = MockClock::new(config.activation_time - 7 * 24 * HOUR);
    let node = Node::new(config.clone(), Arc::new(clock.clone()))?;
    node.generate(config.coinbase_maturity.max(1) as u32).await?;

    clock.set(config.activation_time + offset);
    let zone = node.policy_zone().await;

    // Confirmed coin spent; leaves 10 coins plus change unconfirmed
    let receive = node.get_new_address(None).await;
    let parent_txid = node.send_to_address(&receive, 10 * COIN).await?;
    let parent = node.get_raw_transaction(&parent_txid).await?.decoded;
    let vout = parent
        .transaction
        .outputs
        .iter()
        .position(|o| o.address() == receive)
        .ok_or("payment output missing")?;
    let unconfirmed = OutPoint::new(parent.bare_txid, vout as u32);

    let wallet_to = node.get_new_address(None).await;
    let wallet_spend = node.send_to_address(&wallet_to, 20 * COIN).await.is_ok();

    let raw_to = node.get_new_address(None).await;
    let raw = node
        .create_raw_transaction(&[unconfirmed], &[(raw_to, 9 * COIN)])
        .await?;
    let signed = node.sign_raw_transaction(&raw, &[]).await?;
    let child = node.decode_raw_transaction(&signed.hex)?;
    let relay = node.send_raw_transaction(&signed.hex).await.is_ok();

    node.generate_block(&[signed.hex]).await?;
    let mined = node
        .get_raw_transaction(&child.bare_txid)
        .await
        .map(|info| info.confirmations > 0)
        .unwrap_or(false);

    Ok(SimulationRow {
        offset,
        zone,
        wallet_spend,
        relay,
        mined,
    })
}

/// Walk the standard offsets around activation and report each attempt
pub async fn cmd_simulate(state: &AppState) -> CliResult<()> {
    let policy = state.config.activation_policy()?;
    println!(
        "🔬 Simulating unconfirmed spends around activation {} ({})",
        policy.activation_time(),
        format_time(policy.activation_time())
    );
    println!(
        "   Windows: mempool {}s, wallet {}s\n",
        policy.mempool_window().as_secs(),
        policy.wallet_window().as_secs()
    );

    println!(
        "   {:>6}  {:<20} {:<8} {:<8} {:<8}",
        "offset", "zone", "wallet", "relay", "mined"
    );
    for offset in SIMULATION_OFFSETS {
        let row = simulate_offset(&state.config, offset).await?;
        println!(
            "   {:>+5}h  {:<20} {:<8} {:<8} {:<8}",
            row.offset / HOUR,
            row.zone.as_str(),
            yes_no(row.wallet_spend),
            yes_no(row.relay),
            yes_no(row.mined)
        );
    }
    Ok(())
}

fn format_time(time: i64) -> String {
    Utc.timestamp_opt(time, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "out of range".to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NodeConfig {
        NodeConfig {
            difficulty: 4,
            coinbase_maturity: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_simulation_matches_zones() {
        let expected = [
            (-24 * HOUR, PolicyZone::Unrestricted, true, true),
            (-10 * HOUR, PolicyZone::WalletRestricted, false, true),
            (HOUR, PolicyZone::MempoolRestricted, false, false),
        ];
        for (offset, zone, wallet_spend, relay) in expected {
            let row = simulate_offset(&config(), offset).await.unwrap();
            assert_eq!(
                row,
                SimulationRow {
                    offset,
                    zone,
                    wallet_spend,
                    relay,
                    mined: true,
                }
            );
        }
    }

    #[test]
    fn test_app_state_defaults_without_file() {
        let state = AppState::new(None).unwrap();
        assert_eq!(state.config, NodeConfig::default());
    }
}
