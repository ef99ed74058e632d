//! Renders retrieved evidence into the context block of the prompt.

use crate::types::{Evidence, SourceLabel, UNTITLED};

/// Builds the labelled context block for `evidence` retrieved from `source`.
///
/// Knowledge hits render only under a knowledge-base label and web results
/// only under [`SourceLabel::Web`]; any other pairing yields an empty string.
pub fn assemble(evidence: &Evidence, source: SourceLabel) -> String {
    match (source, evidence) {
        (SourceLabel::References | SourceLabel::Notes, Evidence::Knowledge(hits)) => hits
            .iter()
            .enumerate()
            .map(|(idx, hit)| {
                format!(
                    "Source {} ({}): [Title: {}]\n{}",
                    idx + 1,
                    source,
                    hit.title().unwrap_or(UNTITLED),
                    hit.content()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        (SourceLabel::Web, Evidence::Web(results)) => results
            .iter()
            .enumerate()
            .map(|(idx, result)| {
                format!(
                    "Web result {}: {}\n{}",
                    idx + 1,
                    result.title.as_deref().unwrap_or(UNTITLED),
                    result.snippet.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchHit, WebResult};
    use pretty_assertions::assert_eq;
    use serde_json::Map;

    #[test]
    fn knowledge_hits_are_numbered_and_labelled() {
        let evidence = Evidence::Knowledge(vec![
            SearchHit::new(0.8, "BSI Grundschutz", "Baustein OPS.1.1.2"),
            SearchHit::new(0.6, "NIST SP 800-53", "AC-2 Account Management"),
        ]);
        assert_eq!(
            assemble(&evidence, SourceLabel::References),
            "Source 1 (References): [Title: BSI Grundschutz]\nBaustein OPS.1.1.2\n\n\
             Source 2 (References): [Title: NIST SP 800-53]\nAC-2 Account Management"
        );
    }

    #[test]
    fn missing_metadata_uses_placeholder_title() {
        let hit = SearchHit {
            id: serde_json::Value::Null,
            score: 0.4,
            payload: Map::new(),
        };
        assert_eq!(
            assemble(&Evidence::Knowledge(vec![hit]), SourceLabel::Notes),
            "Source 1 (Notes): [Title: Untitled]\n"
        );
    }

    #[test]
    fn web_results_render_title_and_snippet() {
        let evidence = Evidence::Web(vec![
            WebResult {
                title: Some("OWASP Top 10".into()),
                link: Some("https://owasp.org".into()),
                snippet: Some("Broken access control".into()),
            },
            WebResult::default(),
        ]);
        assert_eq!(
            assemble(&evidence, SourceLabel::Web),
            "Web result 1: OWASP Top 10\nBroken access control\n\nWeb result 2: Untitled\n"
        );
    }

    #[test]
    fn mismatched_or_absent_source_is_empty() {
        let hits = Evidence::Knowledge(vec![SearchHit::new(0.9, "a", "b")]);
        let web = Evidence::Web(vec![WebResult::default()]);
        assert_eq!(assemble(&hits, SourceLabel::None), "");
        assert_eq!(assemble(&hits, SourceLabel::Web), "");
        assert_eq!(assemble(&web, SourceLabel::Notes), "");
    }

    #[test]
    fn assembly_is_deterministic() {
        let evidence = Evidence::Knowledge(vec![SearchHit::new(0.5, "t", "c")]);
        assert_eq!(
            assemble(&evidence, SourceLabel::Notes),
            assemble(&evidence, SourceLabel::Notes)
        );
    }
}
