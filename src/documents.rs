//! Document commands: listing, inspection, deletion, deep links.

use std::path::Path;

use anyhow::{Context, Result};

use carrel_core::backend::Backend;
use carrel_core::cache::ReadPolicy;
use carrel_core::citations;
use carrel_core::models::{DocStatus, DocumentListResponse, ReferenceEntry};

use crate::client::Client;

pub async fn run_list<B: Backend>(
    client: &mut Client<B>,
    page: u32,
    status: Option<String>,
    search: Option<String>,
) -> Result<()> {
    let status = match status {
        Some(s) => Some(s.parse::<DocStatus>()?),
        None => None,
    };
    let list = client
        .documents(page, status, search.as_deref(), ReadPolicy::AllowStale)
        .await?;
    print_document_table(&list);
    Ok(())
}

pub async fn run_show<B: Backend>(client: &mut Client<B>, id: &str) -> Result<()> {
    let doc = client.document(id).await?;

    println!("--- Document ---");
    println!("id:         {}", doc.id);
    println!("title:      {}", doc.title);
    if let Some(ref authors) = doc.authors {
        println!("authors:    {}", authors);
    }
    if let Some(year) = doc.year {
        println!("year:       {}", year);
    }
    if let Some(pages) = doc.page_count {
        println!("pages:      {}", pages);
    }
    println!("chunks:     {}", doc.chunk_count);
    println!("status:     {}", doc.status);
    if let Some(ref indexed_at) = doc.indexed_at {
        println!("indexed_at: {}", indexed_at);
    }
    println!(
        "pdf:        {}",
        citations::pdf_link(client.base_url(), &doc.id, None)
    );
    Ok(())
}

/// Delete a document, then refetch the listing so the next thing printed
/// can never be the pre-delete view.
pub async fn run_delete<B: Backend>(client: &mut Client<B>, id: &str) -> Result<()> {
    client.delete_document(id).await?;
    println!("Deleted document {}.", id);

    let list = client
        .documents(1, None, None, ReadPolicy::RequireFresh)
        .await?;
    println!("{} documents remain.", list.total);
    Ok(())
}

pub async fn run_summarize<B: Backend>(client: &mut Client<B>, id: &str) -> Result<()> {
    let summary = client.summarize_document(id).await?;
    println!("--- Summary ---");
    println!("{}", summary.summary);
    Ok(())
}

pub async fn run_refs<B: Backend>(client: &mut Client<B>, id: &str) -> Result<()> {
    let references = client.document_references(id).await?;
    if references.is_empty() {
        println!("No references extracted for {}.", id);
        return Ok(());
    }
    println!("References ({}):", references.len());
    for (i, entry) in references.iter().enumerate() {
        println!("  [{}] {}", i + 1, format_reference(entry));
    }
    Ok(())
}

/// Print the stable deep link for a document, optionally page-anchored.
pub fn run_link<B: Backend>(client: &Client<B>, id: &str, page: Option<u32>) {
    println!("{}", citations::pdf_link(client.base_url(), id, page));
}

pub async fn run_pdf<B: Backend>(client: &mut Client<B>, id: &str, out: &Path) -> Result<()> {
    let bytes = client.document_pdf(id).await?;
    std::fs::write(out, &bytes)
        .with_context(|| format!("Failed to write PDF to {}", out.display()))?;
    println!("Wrote {} bytes to {}.", bytes.len(), out.display());
    Ok(())
}

fn print_document_table(list: &DocumentListResponse) {
    let pages = if list.limit > 0 {
        (list.total + list.limit - 1) / list.limit
    } else {
        1
    };
    println!(
        "Documents (page {} of {}, {} total)",
        list.page,
        pages.max(1),
        list.total
    );

    if list.documents.is_empty() {
        println!("  (none)");
        return;
    }

    println!();
    println!(
        "  {:<36} {:<44} {:>4}  {:<8} {:>6}",
        "ID", "TITLE", "YEAR", "STATUS", "CHUNKS"
    );
    println!("  {}", "-".repeat(104));
    for doc in &list.documents {
        let year = doc.year.map(|y| y.to_string()).unwrap_or_default();
        println!(
            "  {:<36} {:<44} {:>4}  {:<8} {:>6}",
            doc.id,
            truncate(&doc.title, 44),
            year,
            doc.status,
            doc.chunk_count
        );
    }
}

fn format_reference(entry: &ReferenceEntry) -> String {
    let title = match &entry.title {
        Some(title) => title,
        None => {
            return entry
                .raw
                .clone()
                .unwrap_or_else(|| "(unparsed reference)".to_string());
        }
    };

    let mut line = if entry.authors.is_empty() {
        "Unknown".to_string()
    } else {
        entry.authors.join(", ")
    };
    if let Some(year) = entry.year {
        line.push_str(&format!(" ({})", year));
    }
    line.push_str(&format!(". {}.", title));
    if let Some(journal) = &entry.journal {
        line.push_str(&format!(" {}.", journal));
    }
    if let Some(doi) = &entry.doi {
        line.push_str(&format!(" doi:{}", doi));
    }
    line
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long document title", 10), "a very ...");
        assert_eq!(truncate("éééééééééééé", 6), "ééé...");
    }

    #[test]
    fn reference_rendering() {
        let parsed = ReferenceEntry {
            title: Some("Deep Residual Learning".to_string()),
            authors: vec!["He".to_string(), "Zhang".to_string()],
            year: Some(2016),
            journal: Some("CVPR".to_string()),
            doi: Some("10.1109/CVPR.2016.90".to_string()),
            raw: None,
        };
        assert_eq!(
            format_reference(&parsed),
            "He, Zhang (2016). Deep Residual Learning. CVPR. doi:10.1109/CVPR.2016.90"
        );

        let unparsed = ReferenceEntry {
            title: None,
            authors: Vec::new(),
            year: None,
            journal: None,
            doi: None,
            raw: Some("[3] some garbled entry".to_string()),
        };
        assert_eq!(format_reference(&unparsed), "[3] some garbled entry");
    }
}
