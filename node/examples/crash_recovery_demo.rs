// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Simple Crash Recovery Demo
//!
//! Walks a participant through a crash while in doubt: it votes YES,
//! dies before hearing the decision, replays its WAL on restart and is
//! then resolved by an operator.

use ratify_kernel::types::Operation;
use ratify_kernel::wal::WalReader;
use ratify_kernel::{Participant, ParticipantConfig};
use tempfile::tempdir;

fn main() {
    println!("\n╔════════════════════════════════════════╗");
    println!("║  Ratify Crash Recovery Demo            ║");
    println!("╚════════════════════════════════════════╝\n");

    let dir = tempdir().unwrap();
    let wal_path = dir.path().join("participant_B.wal");
    let config = ParticipantConfig::new("B").with_wal(&wal_path);

    // Phase 1: vote and crash
    println!("📝 Phase 1: vote YES on TX1 (2PC) and TX2 (3PC), commit TX3");
    {
        let p = Participant::open(config.clone()).unwrap();
        p.prepare("TX1", Some(Operation::set("x", "5"))).unwrap();
        p.can_commit("TX2", Some(Operation::set("y", "7"))).unwrap();
        p.precommit("TX2").unwrap();
        p.prepare("TX3", Some(Operation::set("z", "1"))).unwrap();
        p.commit("TX3").unwrap();
        println!("   💥 Crash before the decisions for TX1 and TX2 arrive\n");
    }

    println!("📜 WAL contents:");
    for record in WalReader::open(&wal_path).unwrap() {
        println!("   {}", record.unwrap().encode());
    }
    println!();

    // Phase 2: restart
    println!("🔄 Phase 2: restart and replay");
    let p = Participant::open(config).unwrap();
    for txid in ["TX1", "TX2", "TX3"] {
        let state = p.state_of(txid).unwrap();
        let marker = if state.is_in_doubt() { "⏳ in doubt" } else { "✅ final" };
        println!("   {} -> {} ({})", txid, state, marker);
    }
    println!("   store: z={:?} x={:?}\n", p.value("z"), p.value("x"));

    // Phase 3: operator resolution
    println!("🛠  Phase 3: operator commits TX1 and TX2");
    p.commit("TX1").unwrap();
    p.commit("TX2").unwrap();
    println!("   store: x={:?} y={:?} z={:?}", p.value("x"), p.value("y"), p.value("z"));
    println!("\n✅ Recovered without losing a vote or a committed write\n");
}
