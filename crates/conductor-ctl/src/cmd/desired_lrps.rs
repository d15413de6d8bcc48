//! Desired LRP commands.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use super::http::Client;

#[derive(Deserialize)]
struct DesiredLrp {
    process_guid: String,
    domain: String,
    instances: i32,
    #[serde(default)]
    routes: Vec<String>,
    #[serde(default)]
    annotation: String,
}

pub async fn cmd_desired_list(client: &Client, domain: Option<&str>) -> Result<()> {
    let query: Vec<(&str, &str)> = domain.map(|d| ("domain", d)).into_iter().collect();
    let lrps: Vec<DesiredLrp> = client
        .get_json(client.url("/v1/desired_lrps", &query)?)
        .await?;

    if lrps.is_empty() {
        println!("No desired LRPs.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Desired LRPs ({})", lrps.len());
    println!("═══════════════════════════════════════");
    for lrp in &lrps {
        println!("  ┌─ {}", lrp.process_guid);
        println!("  │  domain     : {}", lrp.domain);
        println!("  │  instances  : {}", lrp.instances);
        println!("  │  routes     : {}", lrp.routes.join(", "));
        println!("  └─ annotation : {}", lrp.annotation);
    }
    Ok(())
}

pub async fn cmd_desired_get(client: &Client, guid: &str) -> Result<()> {
    let lrp: serde_json::Value = client
        .get_json(client.url(&format!("/v1/desired_lrps/{guid}"), &[])?)
        .await?;
    println!("{}", serde_json::to_string_pretty(&lrp)?);
    Ok(())
}

pub async fn cmd_desired_create(client: &Client, file: &str) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("failed to read {file}"))?;
    let body: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("{file} is not valid JSON"))?;
    client
        .post_json(client.url("/v1/desired_lrps", &[])?, &body)
        .await?;
    let guid = body
        .get("process_guid")
        .and_then(|g| g.as_str())
        .unwrap_or("<unknown>");
    println!("Desired LRP {guid} created.");
    Ok(())
}

pub async fn cmd_desired_scale(client: &Client, guid: &str, instances: i32) -> Result<()> {
    client
        .put_json(
            client.url(&format!("/v1/desired_lrps/{guid}"), &[])?,
            &json!({ "instances": instances }),
        )
        .await?;
    println!("Desired LRP {guid} scaled to {instances}.");
    Ok(())
}

pub async fn cmd_desired_annotate(client: &Client, guid: &str, annotation: &str) -> Result<()> {
    client
        .put_json(
            client.url(&format!("/v1/desired_lrps/{guid}"), &[])?,
            &json!({ "annotation": annotation }),
        )
        .await?;
    println!("Desired LRP {guid} annotated.");
    Ok(())
}

pub async fn cmd_desired_delete(client: &Client, guid: &str) -> Result<()> {
    client
        .delete(client.url(&format!("/v1/desired_lrps/{guid}"), &[])?)
        .await?;
    println!("Desired LRP {guid} deleted.");
    Ok(())
}
