use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde_json::{json, Value};

pub fn run(coordinator: &str, txid: &str, protocol: &str, key: &str, value: &str) -> anyhow::Result<()> {
    let url = format!("{}/tx/start", coordinator.trim_end_matches('/'));
    let payload = json!({
        "txid": txid,
        "protocol": protocol,
        "op": {"type": "SET", "key": key, "value": value}
    });

    let resp = reqwest::blocking::Client::new().post(&url).json(&payload).send()?;
    let status = resp.status();
    let body: Value = resp.json()?;

    if !status.is_success() {
        let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        anyhow::bail!("coordinator rejected transaction ({}): {}", status, error);
    }

    println!(
        "\n{} {}: {}\n",
        body["protocol"].as_str().unwrap_or(protocol),
        txid,
        body["decision"].as_str().unwrap_or("?")
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Participant", "Vote"]);

    if let Some(votes) = body["votes"].as_object() {
        for (participant, vote) in votes {
            table.add_row(vec![participant.clone(), vote.as_str().unwrap_or("?").to_string()]);
        }
    }
    println!("{table}\n");

    Ok(())
}
