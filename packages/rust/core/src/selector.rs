//! Model selection: which catalog models a run processes.

use hibou_shared::{HibouError, ModelRequest, Result};
use tracing::debug;

/// Resolve a model request against the catalog.
///
/// - `All` starts from catalog order; an explicit list keeps request order.
/// - Every requested identifier must exist in the catalog; all unknown ones are reported.
/// - Exclusions are removed afterwards. Exclusions naming unknown models are ignored.
pub fn select_models(
    request: &ModelRequest,
    exclusions: &[String],
    catalog: &[String],
) -> Result<Vec<String>> {
    let candidates: Vec<&String> = match request {
        ModelRequest::All => catalog.iter().collect(),
        ModelRequest::Explicit(ids) => {
            let unknown: Vec<String> = ids
                .iter()
                .filter(|id| !catalog.contains(id))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(HibouError::unknown_models(unknown));
            }
            ids.iter().collect()
        }
    };

    let mut selected: Vec<String> = Vec::with_capacity(candidates.len());
    for id in candidates {
        if exclusions.contains(id) {
            debug!(model = %id, "excluded");
            continue;
        }
        if !selected.contains(id) {
            selected.push(id.clone());
        }
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn all_minus_exclusions_keeps_catalog_order() {
        let selected =
            select_models(&ModelRequest::All, &ids("B D"), &ids("A B C D")).unwrap();
        assert_eq!(selected, ids("A C"));
    }

    #[test]
    fn all_follows_catalog_order_not_lexical_order() {
        let selected =
            select_models(&ModelRequest::All, &ids("B D"), &ids("D C B A")).unwrap();
        assert_eq!(selected, ids("C A"));
    }

    #[test]
    fn explicit_keeps_request_order() {
        let request = ModelRequest::parse("C A");
        let selected = select_models(&request, &[], &ids("A B C")).unwrap();
        assert_eq!(selected, ids("C A"));
    }

    #[test]
    fn explicit_minus_exclusions() {
        let request = ModelRequest::parse("A B C");
        let selected = select_models(&request, &ids("B"), &ids("A B C D")).unwrap();
        assert_eq!(selected, ids("A C"));
    }

    #[test]
    fn unknown_models_are_all_reported() {
        let request = ModelRequest::parse("A X Y");
        let err = select_models(&request, &[], &ids("A B")).unwrap_err();
        match err {
            HibouError::UnknownModel { models } => assert_eq!(models, ids("X Y")),
            other => panic!("expected UnknownModel, got {other:?}"),
        }
    }

    #[test]
    fn unknown_model_fails_even_when_excluded() {
        let request = ModelRequest::parse("X");
        assert!(select_models(&request, &ids("X"), &ids("A")).is_err());
    }

    #[test]
    fn excluding_everything_is_empty_not_error() {
        let selected = select_models(&ModelRequest::All, &ids("A B"), &ids("A B")).unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn exclusions_of_unknown_models_are_ignored() {
        let selected = select_models(&ModelRequest::All, &ids("Z"), &ids("A B")).unwrap();
        assert_eq!(selected, ids("A B"));
    }

    #[test]
    fn duplicate_catalog_entries_collapse() {
        let selected = select_models(&ModelRequest::All, &[], &ids("A B A")).unwrap();
        assert_eq!(selected, ids("A B"));
    }
}
