use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde_json::Value;

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// `participant=VALUE` pairs, one per line.
fn pairs(value: &Value) -> String {
    value
        .as_object()
        .map(|m| {
            m.iter()
                .map(|(k, v)| format!("{}={}", k, text(v)))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn timestamp(ms: &Value) -> String {
    ms.as_i64()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string())
}

/// Renders a `/status` body. Participants report a `kv` store;
/// coordinators report their participant list.
pub fn render(body: &Value) -> String {
    let mut out = format!("\nNode {}\n", text(&body["node"]));

    if body.get("kv").is_some() {
        out.push_str(&format!("WAL: {}\n\n", text(&body["wal"])));

        let mut kv = table(vec!["Key", "Value"]);
        if let Some(store) = body["kv"].as_object() {
            for (k, v) in store {
                kv.add_row(vec![k.clone(), text(v)]);
            }
        }
        out.push_str(&format!("{kv}\n\n"));

        let mut tx = table(vec!["TXID", "State", "Operation", "Updated"]);
        if let Some(records) = body["tx"].as_object() {
            for (txid, record) in records {
                tx.add_row(vec![
                    txid.clone(),
                    text(&record["state"]),
                    text(&record["op"]),
                    timestamp(&record["updated_at_ms"]),
                ]);
            }
        }
        out.push_str(&format!("{tx}\n"));
    } else {
        out.push_str(&format!("Participants: {}\n\n", pairs_list(&body["participants"])));

        let mut tx = table(vec!["TXID", "Protocol", "State", "Decision", "Votes", "Deliveries", "Created"]);
        if let Some(records) = body["tx"].as_array() {
            for record in records {
                tx.add_row(vec![
                    text(&record["txid"]),
                    text(&record["protocol"]),
                    text(&record["state"]),
                    text(&record["decision"]),
                    pairs(&record["votes"]),
                    pairs(&record["deliveries"]),
                    timestamp(&record["created_at_ms"]),
                ]);
            }
        }
        out.push_str(&format!("{tx}\n"));
    }

    out
}

fn pairs_list(value: &Value) -> String {
    value
        .as_array()
        .map(|items| items.iter().map(text).collect::<Vec<_>>().join(", "))
        .unwrap_or_default()
}

pub fn run(node_url: &str) -> anyhow::Result<()> {
    let url = format!("{}/status", node_url.trim_end_matches('/'));
    let body: Value = reqwest::blocking::get(&url)?.error_for_status()?.json()?;
    println!("{}", render(&body));
    Ok(())
}
