use anyhow::Result;
use serde::Deserialize;

use super::http::Client;

#[derive(Deserialize)]
struct Cell {
    cell_id: String,
    stack: String,
}

pub async fn cmd_cells(client: &Client) -> Result<()> {
    let cells: Vec<Cell> = client.get_json(client.url("/v1/cells", &[])?).await?;

    if cells.is_empty() {
        println!("No cells present.");
        return Ok(());
    }
    for cell in &cells {
        println!("  {:<24} {}", cell.cell_id, cell.stack);
    }
    Ok(())
}
