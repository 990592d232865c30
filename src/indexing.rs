//! Corpus indexing commands: index, reindex, reset, upload.
//!
//! Batch outcomes are reported in full: processed counts first, then each
//! per-file error. A partially failed batch is a normal result, not an
//! error exit.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use carrel_core::backend::Backend;
use carrel_core::models::{BatchIndexRequest, BatchIndexResponse, IndexRequest, ReindexRequest};

use crate::client::Client;

pub async fn run_index_file<B: Backend>(
    client: &mut Client<B>,
    path: &Path,
    title: Option<String>,
    authors: Vec<String>,
    year: Option<i32>,
) -> Result<()> {
    let request = IndexRequest {
        file_path: path.display().to_string(),
        title,
        authors: if authors.is_empty() {
            None
        } else {
            Some(authors)
        },
        year,
    };
    let response = client.index_file(&request).await?;
    if response.status == "already_indexed" {
        println!(
            "Already indexed: '{}' ({}).",
            response.title, response.document_id
        );
    } else {
        println!(
            "Indexed '{}' ({} chunks, id {}).",
            response.title, response.chunks_count, response.document_id
        );
    }
    Ok(())
}

pub async fn run_index_folder<B: Backend>(client: &mut Client<B>, path: &Path) -> Result<()> {
    let request = BatchIndexRequest {
        folder_path: path.display().to_string(),
    };
    let response = client.index_folder(&request).await?;
    print_batch_outcome(&response);
    Ok(())
}

pub async fn run_reindex<B: Backend>(client: &mut Client<B>, ids: Vec<String>) -> Result<()> {
    let request = ReindexRequest {
        document_ids: if ids.is_empty() { None } else { Some(ids) },
    };
    let response = client.reindex(&request).await?;
    print_batch_outcome(&response);
    Ok(())
}

pub async fn run_reset<B: Backend>(client: &mut Client<B>, yes: bool) -> Result<()> {
    if !yes {
        bail!("This deletes the entire index. Pass --yes to confirm.");
    }
    client.reset_index().await?;
    println!("Index reset.");
    Ok(())
}

/// Upload PDFs from the given paths. Directories are walked for `*.pdf`;
/// each file is uploaded individually so one failure never aborts the
/// rest.
pub async fn run_upload<B: Backend>(client: &mut Client<B>, paths: &[PathBuf]) -> Result<()> {
    let files = collect_pdfs(paths)?;
    if files.is_empty() {
        bail!("No PDF files found under the given paths");
    }

    let mut uploaded = 0usize;
    let mut failed = 0usize;
    for file in &files {
        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;

        match client.upload(&filename, bytes).await {
            Ok(response) => {
                uploaded += 1;
                println!("  uploaded {} ({} chunks)", filename, response.chunks_count);
            }
            Err(err) => {
                failed += 1;
                println!("  failed   {}: {}", filename, err);
            }
        }
    }

    println!();
    println!("Uploaded {} of {} files.", uploaded, files.len());
    if uploaded == 0 {
        bail!("All {} uploads failed", failed);
    }
    Ok(())
}

fn collect_pdfs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry?;
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() {
            if is_pdf(path) {
                files.push(path.clone());
            } else {
                bail!("{} is not a PDF file", path.display());
            }
        } else {
            bail!("{} does not exist", path.display());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn print_batch_outcome(response: &BatchIndexResponse) {
    println!("Processed {} documents.", response.processed);
    for doc in &response.documents {
        println!("  {} ({} chunks)", doc.title, doc.chunks_count);
    }
    if !response.errors.is_empty() {
        println!("{} errors:", response.errors.len());
        for error in &response.errors {
            println!("  - {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_pdfs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("nested/b.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let files = collect_pdfs(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_pdf(f)));
    }

    #[test]
    fn collect_pdfs_rejects_non_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"x").unwrap();
        assert!(collect_pdfs(&[path]).is_err());
    }

    #[test]
    fn collect_pdfs_rejects_missing_path() {
        assert!(collect_pdfs(&[PathBuf::from("./definitely-absent.pdf")]).is_err());
    }
}
