//! Project commands: CRUD, sources, sections, export.

use std::path::PathBuf;

use anyhow::{Context, Result};

use carrel_core::backend::Backend;
use carrel_core::cache::ReadPolicy;
use carrel_core::compose;
use carrel_core::models::{
    ExportRequest, ProjectCreate, ProjectDetail, ProjectSectionCreate, ProjectSectionUpdate,
    ProjectSourceCreate, ProjectSourceUpdate, ProjectStatus, ProjectUpdate, Relevance,
    SectionStatus,
};

use crate::client::Client;

pub async fn run_list<B: Backend>(client: &mut Client<B>, status: Option<String>) -> Result<()> {
    let status = match status {
        Some(s) => Some(s.parse::<ProjectStatus>()?),
        None => None,
    };
    let list = client.projects(status, ReadPolicy::AllowStale).await?;

    println!("Projects ({} total)", list.total);
    if list.projects.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    println!();
    println!(
        "  {:<36} {:<32} {:<12} {:>4} {:>4}  {}",
        "ID", "TITLE", "STATUS", "SRC", "SEC", "UPDATED"
    );
    println!("  {}", "-".repeat(108));
    for project in &list.projects {
        println!(
            "  {:<36} {:<32} {:<12} {:>4} {:>4}  {}",
            project.id,
            truncate(&project.title, 32),
            project.status,
            project.sources_count,
            project.sections_count,
            project.updated_at
        );
    }
    Ok(())
}

pub async fn run_create<B: Backend>(
    client: &mut Client<B>,
    title: String,
    description: Option<String>,
) -> Result<()> {
    let project = client
        .create_project(&ProjectCreate { title, description })
        .await?;
    println!("Created project '{}' ({}).", project.title, project.id);
    Ok(())
}

pub async fn run_show<B: Backend>(client: &mut Client<B>, id: &str) -> Result<()> {
    let project = client.project(id, ReadPolicy::AllowStale).await?;
    print_project(&project);
    Ok(())
}

pub async fn run_update<B: Backend>(
    client: &mut Client<B>,
    id: &str,
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
) -> Result<()> {
    let update = ProjectUpdate {
        title,
        description,
        status: match status {
            Some(s) => Some(s.parse::<ProjectStatus>()?),
            None => None,
        },
    };
    let project = client.update_project(id, &update).await?;
    println!("Updated project '{}' ({}).", project.title, project.status);
    Ok(())
}

/// Delete a project, then refetch the listing so stale counts are never
/// the next thing shown.
pub async fn run_delete<B: Backend>(client: &mut Client<B>, id: &str) -> Result<()> {
    client.delete_project(id).await?;
    println!("Deleted project {}.", id);

    let list = client.projects(None, ReadPolicy::RequireFresh).await?;
    println!("{} projects remain.", list.total);
    Ok(())
}

// === Sources ===

pub async fn run_source_add<B: Backend>(
    client: &mut Client<B>,
    project_id: &str,
    document_id: String,
    notes: Option<String>,
    relevance: &str,
) -> Result<()> {
    let request = ProjectSourceCreate {
        document_id,
        notes,
        relevance: relevance.parse::<Relevance>()?,
    };
    let source = client.add_source(project_id, &request).await?;
    println!(
        "Added source '{}' [{}] ({}).",
        source.document_title, source.relevance, source.id
    );
    Ok(())
}

pub async fn run_source_update<B: Backend>(
    client: &mut Client<B>,
    project_id: &str,
    source_id: &str,
    notes: Option<String>,
    highlights: Vec<String>,
    relevance: Option<String>,
) -> Result<()> {
    let update = ProjectSourceUpdate {
        notes,
        highlights: if highlights.is_empty() {
            None
        } else {
            Some(highlights)
        },
        relevance: match relevance {
            Some(r) => Some(r.parse::<Relevance>()?),
            None => None,
        },
    };
    let source = client.update_source(project_id, source_id, &update).await?;
    println!(
        "Updated source '{}' [{}].",
        source.document_title, source.relevance
    );
    Ok(())
}

pub async fn run_source_rm<B: Backend>(
    client: &mut Client<B>,
    project_id: &str,
    source_id: &str,
) -> Result<()> {
    client.remove_source(project_id, source_id).await?;
    println!("Removed source {}.", source_id);
    Ok(())
}

// === Sections ===

pub async fn run_section_add<B: Backend>(
    client: &mut Client<B>,
    project_id: &str,
    kind: String,
    title: Option<String>,
    content: Option<String>,
) -> Result<()> {
    let request = ProjectSectionCreate {
        section_type: kind,
        title,
        content,
    };
    let section = client.create_section(project_id, &request).await?;
    println!(
        "Added section {} at position {} ({} words).",
        section.id, section.section_order, section.word_count
    );
    Ok(())
}

pub async fn run_section_update<B: Backend>(
    client: &mut Client<B>,
    project_id: &str,
    section_id: &str,
    title: Option<String>,
    content: Option<String>,
    order: Option<u32>,
    status: Option<String>,
) -> Result<()> {
    let update = ProjectSectionUpdate {
        title,
        content,
        section_order: order,
        status: match status {
            Some(s) => Some(s.parse::<SectionStatus>()?),
            None => None,
        },
    };
    let section = client.update_section(project_id, section_id, &update).await?;
    println!(
        "Updated section {} [{}] ({} words).",
        section.id, section.status, section.word_count
    );
    Ok(())
}

pub async fn run_section_rm<B: Backend>(
    client: &mut Client<B>,
    project_id: &str,
    section_id: &str,
) -> Result<()> {
    client.delete_section(project_id, section_id).await?;
    println!("Removed section {}.", section_id);
    Ok(())
}

pub async fn run_section_reorder<B: Backend>(
    client: &mut Client<B>,
    project_id: &str,
    section_ids: Vec<String>,
) -> Result<()> {
    let changed = client.reorder_sections(project_id, &section_ids).await?;
    if changed == 0 {
        println!("Sections already in that order.");
    } else {
        println!("Reordered {} sections.", changed);
    }
    Ok(())
}

// === Export ===

pub async fn run_export<B: Backend>(
    client: &mut Client<B>,
    id: &str,
    format: &str,
    style: &str,
    no_bibliography: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let request = ExportRequest {
        format: format.parse()?,
        include_bibliography: !no_bibliography,
        citation_style: style.to_string(),
    };
    let payload = client.export_project(id, &request).await?;

    let out = out.unwrap_or_else(|| {
        PathBuf::from(
            payload
                .filename
                .clone()
                .unwrap_or_else(|| format!("{}.{}", id, request.format.extension())),
        )
    });
    std::fs::write(&out, &payload.bytes)
        .with_context(|| format!("Failed to write export to {}", out.display()))?;
    println!(
        "Exported to {} ({} bytes).",
        out.display(),
        payload.bytes.len()
    );
    Ok(())
}

fn print_project(project: &ProjectDetail) {
    println!("--- Project ---");
    println!("id:          {}", project.id);
    println!("title:       {}", project.title);
    println!("status:      {}", project.status);
    if let Some(ref description) = project.description {
        println!("description: {}", description);
    }
    println!("created_at:  {}", project.created_at);
    println!("updated_at:  {}", project.updated_at);

    println!();
    println!("Sources ({}):", project.sources.len());
    for source in &project.sources {
        let year = source
            .document_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n.d.".to_string());
        println!(
            "  [{:<8}] {} ({})  id={}",
            source.relevance, source.document_title, year, source.id
        );
        if let Some(ref notes) = source.notes {
            println!("             notes: {}", notes);
        }
    }

    println!();
    println!("Sections ({}):", project.sections.len());
    for section in compose::ordered_sections(project) {
        let title = section.title.as_deref().unwrap_or(&section.section_type);
        println!(
            "  {:>2}  [{:<6}] {} ({} words)",
            section.section_order, section.status, title, section.word_count
        );
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
