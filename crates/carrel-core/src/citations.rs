//! Citation ranking, confidence tiers, and deep links.
//!
//! Pure functions over [`Source`] values: scores map onto display tiers at
//! fixed thresholds, and every cited document resolves to a stable link
//! into its PDF, anchored to the cited page when one is known.

use std::fmt;

use crate::models::Source;

/// Confidence tier derived from `relevance_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    High,
    MediumHigh,
    Medium,
    Low,
}

impl Tier {
    /// Thresholds: 0.8 and above is high, 0.6 medium-high, 0.4 medium,
    /// anything below is low.
    pub fn from_score(score: f64) -> Tier {
        if score >= 0.8 {
            Tier::High
        } else if score >= 0.6 {
            Tier::MediumHigh
        } else if score >= 0.4 {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::MediumHigh => "medium-high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A source resolved for display: its tier and deep link.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCitation {
    pub tier: Tier,
    pub href: String,
}

/// Link to a document's PDF, with a page anchor when a page is known.
pub fn pdf_link(base_url: &str, document_id: &str, page: Option<u32>) -> String {
    let mut href = format!(
        "{}/api/v1/documents/{}/pdf",
        base_url.trim_end_matches('/'),
        document_id
    );
    if let Some(page) = page {
        href.push_str(&format!("#page={}", page));
    }
    href
}

pub fn resolve(base_url: &str, source: &Source) -> ResolvedCitation {
    ResolvedCitation {
        tier: Tier::from_score(source.relevance_score),
        href: pdf_link(base_url, &source.document_id, source.page),
    }
}

/// Order sources by descending relevance. The sort is stable, so equal
/// scores keep their input order.
pub fn rank(sources: &mut [Source]) {
    sources.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, score: f64, page: Option<u32>) -> Source {
        Source {
            document_id: id.to_string(),
            title: format!("Paper {}", id),
            authors: None,
            year: Some(2021),
            page,
            section: None,
            relevance_score: score,
        }
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(Tier::from_score(0.95), Tier::High);
        assert_eq!(Tier::from_score(0.8), Tier::High);
        assert_eq!(Tier::from_score(0.79), Tier::MediumHigh);
        assert_eq!(Tier::from_score(0.6), Tier::MediumHigh);
        assert_eq!(Tier::from_score(0.59), Tier::Medium);
        assert_eq!(Tier::from_score(0.4), Tier::Medium);
        assert_eq!(Tier::from_score(0.39), Tier::Low);
        assert_eq!(Tier::from_score(0.0), Tier::Low);
    }

    #[test]
    fn link_carries_page_anchor() {
        assert_eq!(
            pdf_link("http://localhost:8000", "d1", Some(7)),
            "http://localhost:8000/api/v1/documents/d1/pdf#page=7"
        );
        assert_eq!(
            pdf_link("http://localhost:8000/", "d1", None),
            "http://localhost:8000/api/v1/documents/d1/pdf"
        );
    }

    #[test]
    fn resolve_combines_tier_and_link() {
        let cited = resolve("http://localhost:8000", &source("d2", 0.65, Some(3)));
        assert_eq!(cited.tier, Tier::MediumHigh);
        assert!(cited.href.ends_with("/documents/d2/pdf#page=3"));
    }

    #[test]
    fn rank_sorts_descending_and_is_stable() {
        let mut sources = vec![
            source("a", 0.5, None),
            source("b", 0.9, None),
            source("c", 0.5, None),
            source("d", 0.7, None),
        ];
        rank(&mut sources);
        let ids: Vec<&str> = sources.iter().map(|s| s.document_id.as_str()).collect();
        assert_eq!(ids, ["b", "d", "a", "c"]);
    }
}
