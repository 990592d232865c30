//! Backend health checks and corpus quality statistics.

use std::time::Duration;

use anyhow::Result;
use chrono::Local;

use carrel_core::backend::Backend;
use carrel_core::cache::ReadPolicy;
use carrel_core::models::{HealthResponse, QualityStats};

use crate::client::Client;

pub async fn run_health<B: Backend>(
    client: &mut Client<B>,
    watch: bool,
    poll_secs: u64,
) -> Result<()> {
    if !watch {
        let health = client.health(ReadPolicy::AllowStale).await?;
        print_health(client.base_url(), &health);
        return Ok(());
    }

    println!(
        "Watching {} every {}s (ctrl-c to stop)",
        client.base_url(),
        poll_secs
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(poll_secs));
    loop {
        ticker.tick().await;
        let stamp = Local::now().format("%H:%M:%S");
        match client.poll_health().await {
            Ok(health) => println!("{}  {}", stamp, watch_line(&health)),
            Err(err) => println!("{}  unreachable: {}", stamp, err),
        }
    }
}

pub async fn run_stats<B: Backend>(client: &mut Client<B>) -> Result<()> {
    let stats = client.stats(ReadPolicy::AllowStale).await?;
    print_stats(&stats);
    Ok(())
}

fn print_health(base_url: &str, health: &HealthResponse) {
    println!("Backend Health");
    println!("==============");
    println!();
    println!("  endpoint:  {}", base_url);
    println!("  status:    {}", health.status);
    println!();
    println!("  {:<10} {}", "chroma", health.chroma_status);
    println!("  {:<10} {}", "claude", health.claude_status);
    println!("  {:<10} {}", "voyage", health.voyage_status);
    println!();
    println!("  documents: {}", health.document_count);
}

fn watch_line(health: &HealthResponse) -> String {
    format!(
        "status={}  chroma={}  claude={}  voyage={}  documents={}",
        health.status,
        health.chroma_status,
        health.claude_status,
        health.voyage_status,
        health.document_count
    )
}

fn print_stats(stats: &QualityStats) {
    println!("Corpus Statistics");
    println!("=================");
    println!();
    println!("  {:<24} {:>6}", "Total documents", stats.total_documents);
    println!("  {:<24} {:>6.2}", "Average quality score", stats.average_score);
    println!("  {:<24} {:>6}", "Low quality", stats.low_quality_count);

    if !stats.score_distribution.is_empty() {
        println!();
        println!("Score Distribution");
        println!("{}", "-".repeat(32));
        for (bucket, count) in &stats.score_distribution {
            println!("  {:<24} {:>6}", bucket, count);
        }
    }

    if !stats.missing_fields.is_empty() {
        println!();
        println!("Missing Fields");
        println!("{}", "-".repeat(32));
        for (field, count) in &stats.missing_fields {
            println!("  {:<24} {:>6}", field, count);
        }
    }

    if !stats.documents_needing_review.is_empty() {
        println!();
        println!(
            "{} documents flagged for metadata review.",
            stats.documents_needing_review.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_line_is_single_line() {
        let health = HealthResponse {
            status: "ok".to_string(),
            chroma_status: "ok".to_string(),
            claude_status: "ok".to_string(),
            voyage_status: "degraded".to_string(),
            document_count: 12,
        };
        let line = watch_line(&health);
        assert!(!line.contains('\n'));
        assert!(line.contains("voyage=degraded"));
        assert!(line.contains("documents=12"));
    }
}
