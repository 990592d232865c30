//! Project composition rules.
//!
//! Local invariants enforced before mutations are issued: a document may
//! back a project at most once, sections order by their explicit
//! `section_order` key, and reordering is expressed as a dense 0..n
//! assignment. `word_count` mirrors the backend's whitespace-split rule
//! so the client can show counts for content it has not round-tripped.

use crate::error::{ApiError, ApiResult};
use crate::models::{ProjectDetail, ProjectSectionInfo};

/// Reject attaching a document that already backs this project.
pub fn ensure_not_attached(project: &ProjectDetail, document_id: &str) -> ApiResult<()> {
    if project
        .sources
        .iter()
        .any(|source| source.document_id == document_id)
    {
        return Err(ApiError::DuplicateSource {
            project_id: project.id.clone(),
            document_id: document_id.to_string(),
        });
    }
    Ok(())
}

/// Sections in display order. Stable for equal `section_order` values, so
/// ties keep the backend's response order.
pub fn ordered_sections(project: &ProjectDetail) -> Vec<&ProjectSectionInfo> {
    let mut sections: Vec<&ProjectSectionInfo> = project.sections.iter().collect();
    sections.sort_by_key(|section| section.section_order);
    sections
}

/// Plan a reorder: `ids_in_new_order` must be a permutation of the given
/// sections. Assigns dense orders 0..n and returns only the
/// `(section_id, new_order)` pairs that actually change, each to be issued
/// as an explicit section update.
pub fn reorder_plan(
    sections: &[ProjectSectionInfo],
    ids_in_new_order: &[String],
) -> ApiResult<Vec<(String, u32)>> {
    if ids_in_new_order.len() != sections.len() {
        return Err(ApiError::InvalidInput(format!(
            "reorder must name all {} sections, got {}",
            sections.len(),
            ids_in_new_order.len()
        )));
    }

    let mut plan = Vec::new();
    let mut seen: Vec<&str> = Vec::with_capacity(ids_in_new_order.len());
    for (position, id) in ids_in_new_order.iter().enumerate() {
        if seen.contains(&id.as_str()) {
            return Err(ApiError::InvalidInput(format!(
                "section {} named twice in reorder",
                id
            )));
        }
        seen.push(id);

        let section = sections
            .iter()
            .find(|section| section.id == *id)
            .ok_or_else(|| {
                ApiError::InvalidInput(format!("unknown section {} in reorder", id))
            })?;

        let new_order = position as u32;
        if section.section_order != new_order {
            plan.push((section.id.clone(), new_order));
        }
    }
    Ok(plan)
}

/// The backend's word count rule: whitespace-separated tokens.
pub fn word_count(content: &str) -> u32 {
    content.split_whitespace().count() as u32
}
