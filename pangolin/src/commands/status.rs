use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pangolin_core::StatusSnapshot;

use crate::output::{self, Table};

pub fn run(socket_path: Option<&PathBuf>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let client = super::control_client(socket_path)?;
    if !client.probe() {
        output::step("No client is currently running");
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    let snapshot = rt.block_on(client.status())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    client_table(&snapshot).print();
    match peer_table(&snapshot, Utc::now()) {
        Some(peers) => {
            println!();
            peers.print();
        }
        None => {
            println!();
            println!("No peers connected");
        }
    }
    Ok(())
}

fn client_table(snapshot: &StatusSnapshot) -> Table {
    let mut table = Table::new(["VERSION", "STATUS", "REGISTERED", "ORG ID"]);
    table.row([
        snapshot.version.clone(),
        format_connected(snapshot.connected).to_string(),
        snapshot.registered.to_string(),
        snapshot.org_id.clone(),
    ]);
    table
}

fn peer_table(snapshot: &StatusSnapshot, now: DateTime<Utc>) -> Option<Table> {
    if snapshot.peers.is_empty() {
        return None;
    }
    let mut table = Table::new(["SITE ID", "ENDPOINT", "STATUS", "RTT", "LAST SEEN", "RELAY"]);
    for peer in snapshot.peers.values() {
        table.row([
            peer.site_id.to_string(),
            peer.endpoint.clone(),
            format_connected(peer.connected).to_string(),
            format_rtt(peer.rtt),
            format_last_seen(&peer.last_seen, now),
            peer.is_relay.to_string(),
        ]);
    }
    Some(table)
}

pub fn format_connected(connected: bool) -> &'static str {
    if connected { "Connected" } else { "Disconnected" }
}

/// Round-trip time given in nanoseconds.
pub fn format_rtt(rtt_ns: i64) -> String {
    if rtt_ns == 0 {
        return "-".to_string();
    }
    let ns = rtt_ns as f64;
    let ms = ns / 1_000_000.0;
    if ms < 1.0 {
        format!("{:.2}μs", ns / 1_000.0)
    } else if ms < 1_000.0 {
        format!("{ms:.2}ms")
    } else {
        format!("{:.2}s", ns / 1_000_000_000.0)
    }
}

/// Relative for the last day, absolute (in the timestamp's own offset) after.
/// Unparseable input is returned unchanged.
pub fn format_last_seen(value: &str, now: DateTime<Utc>) -> String {
    if value.is_empty() {
        return "-".to_string();
    }
    let Ok(seen) = DateTime::parse_from_rfc3339(value) else {
        return value.to_string();
    };

    let diff = (now - seen.with_timezone(&Utc))
        .to_std()
        .unwrap_or(Duration::ZERO)
        .as_secs_f64();
    if diff < 60.0 {
        format!("{diff:.0}s ago")
    } else if diff < 3_600.0 {
        format!("{:.0}m ago", diff / 60.0)
    } else if diff < 86_400.0 {
        format!("{:.1}h ago", diff / 3_600.0)
    } else {
        seen.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
