//! Placement intent validation and label expansion.
//!
//! Validation is structural: every clause needs a provider and exactly one
//! of cluster name / cluster label, all well-formed. Expansion runs when an
//! intent is attached to a deployment group: label clauses are replaced by
//! the explicit clusters they match, each checked against the clusters the
//! group's logical cloud permits. A stored intent therefore never depends on
//! live label matching.

use std::sync::LazyLock;

use fleetgrid_state::{AllOfClause, ClusterRef, PlacementIntent, SelectorClause, SelectorKind};
use regex::Regex;
use tracing::debug;

use crate::error::{PlacementError, PlacementResult};
use crate::labels::ClusterLabels;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]{0,126}[A-Za-z0-9])?$").expect("name pattern compiles")
});

/// Check one selector clause. `clause` names its position for error messages.
pub(crate) fn check_clause(sel: &SelectorClause, clause: &str) -> PlacementResult<()> {
    if sel.provider.is_empty() {
        return Err(PlacementError::MissingProvider {
            clause: clause.to_string(),
        });
    }
    check_name(&sel.provider, "provider", clause)?;

    let name = sel.cluster_name.as_deref().filter(|n| !n.is_empty());
    let label = sel.cluster_label.as_deref().filter(|l| !l.is_empty());
    match (name, label) {
        (Some(_), Some(_)) => Err(PlacementError::NameAndLabel {
            clause: clause.to_string(),
        }),
        (None, None) => Err(PlacementError::MissingSelector {
            clause: clause.to_string(),
        }),
        (Some(name), None) => check_name(name, "cluster name", clause),
        (None, Some(label)) => check_name(label, "cluster label", clause),
    }
}

fn check_name(value: &str, field: &'static str, clause: &str) -> PlacementResult<()> {
    if NAME_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err(PlacementError::InvalidName {
            clause: clause.to_string(),
            field,
            value: value.to_string(),
        })
    }
}

/// Validate every clause of an intent, nested ones included.
pub fn check_intent(intent: &PlacementIntent) -> PlacementResult<()> {
    for (i, clause) in intent.all_of.iter().enumerate() {
        check_clause(&clause.selector(), &format!("all_of[{i}]"))?;
        for (j, nested) in clause.any_of.iter().enumerate() {
            check_clause(nested, &format!("all_of[{i}].any_of[{j}]"))?;
        }
    }
    for (i, clause) in intent.any_of.iter().enumerate() {
        check_clause(clause, &format!("any_of[{i}]"))?;
    }
    Ok(())
}

/// Validate `intent` and rewrite it in place to explicit cluster names.
///
/// A label `all_of` clause becomes one `all_of` clause per matched cluster;
/// its nested alternation stays with the first of them. A label `any_of`
/// clause becomes one `any_of` clause per matched cluster. Every resulting
/// cluster must be in `permitted`, and a label matching nothing is rejected.
/// The selector tag records whether the intent was written with labels.
pub async fn validate_and_expand(
    intent: &mut PlacementIntent,
    logical_cloud: &str,
    permitted: &[ClusterRef],
    labels: &dyn ClusterLabels,
) -> PlacementResult<()> {
    check_intent(intent)?;
    let selector = if intent.uses_labels() {
        SelectorKind::Label
    } else {
        SelectorKind::Name
    };

    let expander = Expander {
        logical_cloud,
        permitted,
        labels,
    };

    let mut all_of = Vec::with_capacity(intent.all_of.len());
    for (i, clause) in intent.all_of.iter().enumerate() {
        let location = format!("all_of[{i}]");
        let expanded = expander.expand(&clause.selector(), &location).await?;

        let mut nested = Vec::new();
        for (j, alt) in clause.any_of.iter().enumerate() {
            let location = format!("{location}.any_of[{j}]");
            nested.extend(expander.expand(alt, &location).await?);
        }

        for (k, sel) in expanded.into_iter().enumerate() {
            let mut out = AllOfClause::from_selector(sel);
            if k == 0 {
                out.any_of = std::mem::take(&mut nested);
            }
            all_of.push(out);
        }
    }

    let mut any_of = Vec::with_capacity(intent.any_of.len());
    for (i, clause) in intent.any_of.iter().enumerate() {
        any_of.extend(expander.expand(clause, &format!("any_of[{i}]")).await?);
    }

    intent.all_of = all_of;
    intent.any_of = any_of;
    intent.selector = selector;
    debug!(
        logical_cloud,
        ?selector,
        all_of = intent.all_of.len(),
        any_of = intent.any_of.len(),
        "placement intent expanded"
    );
    Ok(())
}

struct Expander<'a> {
    logical_cloud: &'a str,
    permitted: &'a [ClusterRef],
    labels: &'a dyn ClusterLabels,
}

impl Expander<'_> {
    /// Expand one checked clause into name clauses.
    async fn expand(
        &self,
        sel: &SelectorClause,
        location: &str,
    ) -> PlacementResult<Vec<SelectorClause>> {
        let name = sel.cluster_name.as_deref().filter(|n| !n.is_empty());
        let label = sel.cluster_label.as_deref().filter(|l| !l.is_empty());
        let names = match (name, label) {
            (Some(name), _) => vec![name.to_string()],
            (None, Some(label)) => {
                let matched = self
                    .labels
                    .clusters_with_label(&sel.provider, label)
                    .await
                    .map_err(|source| PlacementError::LabelLookup {
                        clause: location.to_string(),
                        provider: sel.provider.clone(),
                        label: label.to_string(),
                        source,
                    })?;
                if matched.is_empty() {
                    return Err(PlacementError::NoLabelMatch {
                        clause: location.to_string(),
                        provider: sel.provider.clone(),
                        label: label.to_string(),
                    });
                }
                matched
            }
            (None, None) => Vec::new(),
        };

        names
            .into_iter()
            .map(|name| {
                let cluster = ClusterRef::new(sel.provider.clone(), name);
                if !self.permitted.contains(&cluster) {
                    return Err(PlacementError::NotInLogicalCloud {
                        cluster,
                        logical_cloud: self.logical_cloud.to_string(),
                    });
                }
                Ok(SelectorClause::by_name(&cluster.provider, &cluster.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::StaticLabels;

    fn cloud() -> Vec<ClusterRef> {
        vec![
            ClusterRef::new("aws", "edge1"),
            ClusterRef::new("aws", "edge2"),
            ClusterRef::new("aws", "core1"),
        ]
    }

    fn labels() -> StaticLabels {
        StaticLabels::new()
            .with_label("aws", "edge", &["edge1", "edge2"])
            .with_label("aws", "remote", &["far1"])
    }

    #[test]
    fn rejects_name_and_label_together() {
        let sel = SelectorClause {
            provider: "aws".to_string(),
            cluster_name: Some("edge1".to_string()),
            cluster_label: Some("edge".to_string()),
        };
        let err = check_clause(&sel, "all_of[0]").unwrap_err();
        assert!(matches!(err, PlacementError::NameAndLabel { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_clause_without_selector() {
        let sel = SelectorClause {
            provider: "aws".to_string(),
            cluster_name: Some(String::new()),
            cluster_label: None,
        };
        assert!(matches!(
            check_clause(&sel, "any_of[0]"),
            Err(PlacementError::MissingSelector { .. })
        ));
    }

    #[test]
    fn rejects_missing_provider_and_bad_names() {
        assert!(matches!(
            check_clause(&SelectorClause::by_name("", "edge1"), "x"),
            Err(PlacementError::MissingProvider { .. })
        ));
        assert!(matches!(
            check_clause(&SelectorClause::by_name("aws", "-edge"), "x"),
            Err(PlacementError::InvalidName { field: "cluster name", .. })
        ));
        assert!(check_clause(&SelectorClause::by_label("aws", "tier.edge_1"), "x").is_ok());
    }

    #[test]
    fn nested_clauses_are_checked() {
        let intent = PlacementIntent {
            all_of: vec![AllOfClause {
                any_of: vec![SelectorClause::default()],
                ..AllOfClause::by_name("aws", "edge1")
            }],
            ..Default::default()
        };
        let err = check_intent(&intent).unwrap_err();
        assert!(err.to_string().starts_with("all_of[0].any_of[0]"));
    }

    #[tokio::test]
    async fn expands_labels_to_permitted_names() {
        let mut intent = PlacementIntent {
            all_of: vec![AllOfClause::by_label("aws", "edge")],
            any_of: vec![SelectorClause::by_name("aws", "core1")],
            ..Default::default()
        };

        validate_and_expand(&mut intent, "lc", &cloud(), &labels())
            .await
            .unwrap();

        assert_eq!(
            intent.all_of,
            vec![
                AllOfClause::by_name("aws", "edge1"),
                AllOfClause::by_name("aws", "edge2"),
            ]
        );
        assert_eq!(intent.any_of, vec![SelectorClause::by_name("aws", "core1")]);
        assert_eq!(intent.selector, SelectorKind::Label);
        assert!(!intent.uses_labels());
    }

    #[tokio::test]
    async fn nested_alternation_stays_with_first_expansion() {
        let mut intent = PlacementIntent {
            all_of: vec![AllOfClause {
                any_of: vec![SelectorClause::by_label("aws", "edge")],
                ..AllOfClause::by_name("aws", "core1")
            }],
            ..Default::default()
        };

        validate_and_expand(&mut intent, "lc", &cloud(), &labels())
            .await
            .unwrap();

        assert_eq!(intent.all_of.len(), 1);
        assert_eq!(
            intent.all_of[0].any_of,
            vec![
                SelectorClause::by_name("aws", "edge1"),
                SelectorClause::by_name("aws", "edge2"),
            ]
        );
    }

    #[tokio::test]
    async fn rejects_cluster_outside_logical_cloud() {
        let mut intent = PlacementIntent {
            any_of: vec![SelectorClause::by_label("aws", "remote")],
            ..Default::default()
        };
        let err = validate_and_expand(&mut intent, "lc", &cloud(), &labels())
            .await
            .unwrap_err();
        match err {
            PlacementError::NotInLogicalCloud {
                cluster,
                logical_cloud,
            } => {
                assert_eq!(cluster, ClusterRef::new("aws", "far1"));
                assert_eq!(logical_cloud, "lc");
            }
            other => panic!("unexpected error: {other}"),
        }
        // Rejected intents are left untouched.
        assert_eq!(intent.any_of, vec![SelectorClause::by_label("aws", "remote")]);
    }

    #[tokio::test]
    async fn rejects_label_without_match() {
        let mut intent = PlacementIntent {
            all_of: vec![AllOfClause::by_label("aws", "gpu")],
            ..Default::default()
        };
        let err = validate_and_expand(&mut intent, "lc", &cloud(), &labels())
            .await
            .unwrap_err();
        assert!(matches!(err, PlacementError::NoLabelMatch { .. }));
    }

    #[tokio::test]
    async fn name_only_intent_is_tagged_name() {
        let mut intent = PlacementIntent {
            all_of: vec![AllOfClause::by_name("aws", "edge1")],
            selector: SelectorKind::Label,
            ..Default::default()
        };
        validate_and_expand(&mut intent, "lc", &cloud(), &labels())
            .await
            .unwrap();
        assert_eq!(intent.selector, SelectorKind::Name);
    }
}
