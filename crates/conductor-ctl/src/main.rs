//! conductor-ctl: command-line interface for conductord.

use anyhow::{Context, Result};

mod cmd;

use cmd::http::Client;

const DEFAULT_ADDR: &str = "http://127.0.0.1:8887";

fn print_usage() {
    println!("Usage: conductor-ctl [--addr <url>] [--username <u> --password <p>] <command>");
    println!();
    println!("Commands:");
    println!("  desired list [--domain <d>]     List desired LRPs");
    println!("  desired get <guid>              Show one desired LRP");
    println!("  desired create <file>           Create a desired LRP from a JSON file");
    println!("  desired scale <guid> <n>        Set the instance count");
    println!("  desired annotate <guid> <text>  Replace the annotation");
    println!("  desired delete <guid>           Remove a desired LRP");
    println!("  actual list [<guid>]            List actual LRPs");
    println!("  cells                           List cells");
    println!();
    println!("Options:");
    println!("  --addr <url>       conductord address (default: {DEFAULT_ADDR})");
    println!("  --username <u>     basic auth username");
    println!("  --password <p>     basic auth password");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse global options
    let mut addr = DEFAULT_ADDR.to_string();
    let mut username: Option<String> = None;
    let mut password = String::new();
    let mut domain: Option<String> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" => {
                i += 1;
                addr = args.get(i).context("--addr requires a value")?.clone();
            }
            "--username" => {
                i += 1;
                username = Some(args.get(i).context("--username requires a value")?.clone());
            }
            "--password" => {
                i += 1;
                password = args.get(i).context("--password requires a value")?.clone();
            }
            "--domain" => {
                i += 1;
                domain = Some(args.get(i).context("--domain requires a value")?.clone());
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    let client = Client::new(&addr, username.map(|u| (u, password)))?;

    match remaining.as_slice() {
        ["desired", "list"] => cmd::desired_lrps::cmd_desired_list(&client, domain.as_deref()).await,
        ["desired", "get", guid] => cmd::desired_lrps::cmd_desired_get(&client, guid).await,
        ["desired", "create", file] => cmd::desired_lrps::cmd_desired_create(&client, file).await,
        ["desired", "scale", guid, n] => {
            let instances = n.parse().context("instance count must be a number")?;
            cmd::desired_lrps::cmd_desired_scale(&client, guid, instances).await
        }
        ["desired", "annotate", guid, text] => {
            cmd::desired_lrps::cmd_desired_annotate(&client, guid, text).await
        }
        ["desired", "delete", guid] => cmd::desired_lrps::cmd_desired_delete(&client, guid).await,
        ["actual", "list"] => cmd::actual_lrps::cmd_actual_list(&client, None).await,
        ["actual", "list", guid] => cmd::actual_lrps::cmd_actual_list(&client, Some(*guid)).await,
        ["cells"] => cmd::cells::cmd_cells(&client).await,
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
