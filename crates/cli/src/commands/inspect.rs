use std::collections::BTreeMap;
use std::path::Path;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use ratify_kernel::participant::Replay;
use ratify_kernel::types::{Decision, ParticipantState};
use ratify_kernel::wal::{LogAction, WalError, WalReader};

/// Who wrote the log. Participant vote lines carry a vote; coordinator
/// lines never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Coordinator,
    Participant,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxSummary {
    pub txid: String,
    pub lines: usize,
    pub last_action: LogAction,
    /// State a participant replaying this log would hold.
    pub state: Option<ParticipantState>,
    pub decision: Option<Decision>,
    pub done: bool,
}

impl TxSummary {
    /// A coordinator decision without DONE may not have reached every
    /// participant.
    pub fn possibly_undelivered(&self, kind: LogKind) -> bool {
        kind == LogKind::Coordinator && self.decision.is_some() && !self.done
    }
}

#[derive(Debug, Clone)]
pub struct WalSummary {
    pub kind: LogKind,
    pub transactions: Vec<TxSummary>,
    pub skipped: Vec<(usize, String)>,
}

pub fn summarize<P: AsRef<Path>>(path: P) -> anyhow::Result<WalSummary> {
    let mut replay = Replay::new();
    let mut rows: BTreeMap<String, TxSummary> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut saw_vote = false;
    let mut saw_line = false;

    for entry in WalReader::open(path)? {
        let record = match entry {
            Ok(record) => record,
            Err(WalError::Malformed { line, reason }) => {
                skipped.push((line, reason));
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        saw_line = true;
        saw_vote |= record.vote.is_some();

        let row = rows.entry(record.txid.clone()).or_insert_with(|| TxSummary {
            txid: record.txid.clone(),
            lines: 0,
            last_action: record.action,
            state: None,
            decision: None,
            done: false,
        });
        row.lines += 1;
        row.last_action = record.action;
        match record.action {
            LogAction::Commit => row.decision = Some(Decision::Commit),
            LogAction::Abort => row.decision = Some(Decision::Abort),
            LogAction::Done => row.done = true,
            _ => {}
        }
        replay.apply(record);
    }

    let kind = match (saw_line, saw_vote) {
        (false, _) => LogKind::Empty,
        (true, true) => LogKind::Participant,
        (true, false) => LogKind::Coordinator,
    };

    let transactions = rows
        .into_values()
        .map(|mut row| {
            row.state = replay.transactions.get(&row.txid).map(|r| r.state);
            row
        })
        .collect();

    Ok(WalSummary {
        kind,
        transactions,
        skipped,
    })
}

pub fn run(wal_path: &str) -> anyhow::Result<()> {
    let summary = summarize(wal_path)?;

    println!("\nWAL Report: {} ({:?} log)", wal_path, summary.kind);
    println!("--------------------");

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["TXID", "Lines", "Last Action", "State", "Decision", "Note"]);

    for tx in &summary.transactions {
        let note = if tx.possibly_undelivered(summary.kind) {
            "decided, no DONE: possibly undelivered"
        } else if summary.kind == LogKind::Participant && tx.state.map_or(false, |s| s.is_in_doubt()) {
            "in doubt"
        } else {
            ""
        };
        let state = match summary.kind {
            LogKind::Coordinator => "-".to_string(),
            _ => tx.state.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
        };
        table.add_row(vec![
            tx.txid.clone(),
            tx.lines.to_string(),
            tx.last_action.to_string(),
            state,
            tx.decision.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            note.to_string(),
        ]);
    }

    println!("{table}");

    if !summary.skipped.is_empty() {
        println!("\n⚠️  Skipped {} malformed line(s):", summary.skipped.len());
        for (line, reason) in &summary.skipped {
            println!("   line {}: {}", line, reason);
        }
    }
    println!();

    Ok(())
}
