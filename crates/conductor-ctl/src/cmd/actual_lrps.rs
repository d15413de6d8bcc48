//! Actual LRP commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::Client;

#[derive(Deserialize)]
struct ActualLrp {
    process_guid: String,
    index: u32,
    instance_guid: String,
    cell_id: String,
    host: String,
    state: String,
}

pub async fn cmd_actual_list(client: &Client, process_guid: Option<&str>) -> Result<()> {
    let path = match process_guid {
        Some(guid) => format!("/v1/actual_lrps/{guid}"),
        None => "/v1/actual_lrps".to_string(),
    };
    let lrps: Vec<ActualLrp> = client.get_json(client.url(&path, &[])?).await?;

    if lrps.is_empty() {
        println!("No actual LRPs reported.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Actual LRPs ({})", lrps.len());
    println!("═══════════════════════════════════════");
    for lrp in &lrps {
        println!("  ┌─ {}[{}]", lrp.process_guid, lrp.index);
        println!("  │  instance : {}", lrp.instance_guid);
        println!("  │  cell     : {}", lrp.cell_id);
        println!("  │  host     : {}", lrp.host);
        println!("  └─ state    : {}", lrp.state);
    }
    Ok(())
}
