//! GemmaTalk CLI
//!
//! Command-line client for a running GemmaTalk server:
//! - Ask questions and stream the answer
//! - Process the conversation buffer
//! - Inspect memories, moods and today's summary
//! - Export or clear data

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gemmatalk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Talk to your local GemmaTalk companion")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://127.0.0.1:8000", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question and stream the answer
    Ask {
        /// The question
        question: Vec<String>,
        /// Model to answer with (default: server setting)
        #[arg(short, long)]
        model: Option<String>,
        /// Answer language code, e.g. "hi"
        #[arg(short, long)]
        language: Option<String>,
        /// Your name
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Classify buffered conversation turns
    Process,

    /// List memories
    Memories {
        /// core, general or special (default: all)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Show the mood log
    Moods,

    /// Show today's summary and tips
    Summary,

    /// List available models
    Models,

    /// Show server status
    Status,

    /// Export all data as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete all data
    Clear {
        /// Leave no empty database behind
        #[arg(long)]
        no_reinitialize: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let json_output = cli.format == "json";

    match cli.command {
        Commands::Ask {
            question,
            model,
            language,
            user,
        } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                bail!("Nothing to ask");
            }

            let body = serde_json::json!({
                "question": question,
                "userName": user,
                "model": model,
                "language": language,
            });

            let response = client
                .post(format!("{}/stream", cli.api_url))
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Could not reach {}", cli.api_url))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                bail!("Request failed ({}): {}", status, text);
            }

            let mut stdout = std::io::stdout();
            let mut chunks = response.bytes_stream();
            while let Some(chunk) = chunks.next().await {
                stdout.write_all(&chunk?)?;
                stdout.flush()?;
            }
            println!();
        }

        Commands::Process => {
            let response = client
                .post(format!("{}/process_conversations", cli.api_url))
                .send()
                .await?;

            let status = response.status();
            let result: serde_json::Value = response.json().await?;
            if !status.is_success() {
                bail!(
                    "Processing failed ({}): {}",
                    status,
                    result["error"].as_str().unwrap_or("unknown error")
                );
            }
            println!("{}", result["message"].as_str().unwrap_or("Done"));
        }

        Commands::Memories { kind } => {
            let mut url = format!("{}/memory", cli.api_url);
            if let Some(kind) = kind {
                url.push_str(&format!("?kind={}", kind));
            }

            let memories = get_json(&client, &url).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&memories)?);
            } else {
                print_memories(&memories);
            }
        }

        Commands::Moods => {
            let moods = get_json(&client, &format!("{}/mood", cli.api_url)).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&moods)?);
            } else {
                print_moods(&moods);
            }
        }

        Commands::Summary => {
            let summaries = get_json(&client, &format!("{}/mood_summary", cli.api_url)).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                match summaries.as_array().and_then(|s| s.first()) {
                    Some(summary) => {
                        println!("{}", summary["date"].as_str().unwrap_or("today"));
                        println!();
                        println!("{}", summary["summary"].as_str().unwrap_or(""));
                        println!();
                        println!("Tips:");
                        println!("{}", summary["tips"].as_str().unwrap_or(""));
                    }
                    None => println!("No summary for today yet. Run `process` first."),
                }
            }
        }

        Commands::Models => {
            let result = get_json(&client, &format!("{}/models", cli.api_url)).await?;
            if let Some(models) = result["available_models"].as_array() {
                for model in models {
                    println!("{}", model.as_str().unwrap_or(""));
                }
            }
        }

        Commands::Status => {
            let health = get_json(&client, &format!("{}/health", cli.api_url)).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!("GemmaTalk Status");
                println!("================");
                println!("Status:   {}", health["status"].as_str().unwrap_or("unknown"));
                println!("Storage:  {}", health["storage"].as_str().unwrap_or("unknown"));
                println!("Version:  {}", health["version"].as_str().unwrap_or("unknown"));
                println!(
                    "Uptime:   {}",
                    format_duration(health["uptime_seconds"].as_u64().unwrap_or(0))
                );
                println!("Models:   {} loaded", health["cached_models"].as_u64().unwrap_or(0));

                if let Some(counts) = health["counts"].as_object() {
                    println!();
                    for (table, count) in counts {
                        println!("  {:<18} {}", table, count);
                    }
                }
            }
        }

        Commands::Export { output } => {
            let response = client
                .get(format!("{}/export_data", cli.api_url))
                .send()
                .await?;

            if !response.status().is_success() {
                bail!("Export failed: {}", response.status());
            }

            let data = response.text().await?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &data)
                        .with_context(|| format!("Could not write {:?}", path))?;
                    println!("Exported to {:?}", path);
                }
                None => {
                    print!("{}", data);
                }
            }
        }

        Commands::Clear { no_reinitialize } => {
            let response = client
                .delete(format!("{}/clear_data", cli.api_url))
                .query(&[("reinitialize", !no_reinitialize)])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                bail!("Clear failed ({}): {}", status, text);
            }

            let result: serde_json::Value = response.json().await?;
            println!("{}", result["message"].as_str().unwrap_or("Cleared"));
        }

        Commands::Config { output } => {
            let config = gemmatalk::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn get_json(client: &reqwest::Client, url: &str) -> anyhow::Result<serde_json::Value> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Could not reach {}", url))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        bail!("Request failed ({}): {}", status, text);
    }

    Ok(response.json().await?)
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}

fn print_memories(data: &serde_json::Value) {
    let rows = match data.as_array() {
        Some(rows) if !rows.is_empty() => rows,
        _ => {
            println!("No memories yet");
            return;
        }
    };

    println!("{:<8} {:>5}  {:<20} Memory", "Kind", "Id", "Title");
    println!("{}", "-".repeat(72));

    for row in rows {
        println!(
            "{:<8} {:>5}  {:<20} {}",
            row["kind"].as_str().unwrap_or(""),
            row["id"].as_i64().unwrap_or(0),
            truncate(row["title"].as_str().unwrap_or(""), 20),
            row["memory"].as_str().unwrap_or("")
        );
    }
}

fn print_moods(data: &serde_json::Value) {
    let rows = match data.as_array() {
        Some(rows) if !rows.is_empty() => rows,
        _ => {
            println!("No moods logged");
            return;
        }
    };

    for row in rows {
        let label = match row["mood"].as_u64() {
            Some(0) => "happy",
            Some(1) => "sad",
            Some(2) => "neutral",
            _ => "?",
        };
        println!("{}  {}", row["timestamp"].as_str().unwrap_or(""), label);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
