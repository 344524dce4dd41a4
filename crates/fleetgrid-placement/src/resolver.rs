//! Cluster selector resolution.
//!
//! Given a placement intent, the resolver decides:
//! 1. Which clusters must all receive the workload (mandatory groups)
//! 2. Which sets of clusters form an alternation (optional groups)
//!
//! Every cluster produced by an `all_of` clause, label matches included,
//! becomes its own single-cluster mandatory group, numbered 1, 2, … in
//! clause order. All top-level `any_of` clauses share one group number;
//! each clause still yields its own group, so a label match bundles every
//! matched cluster in that clause's group.

use fleetgrid_state::{ClusterGroup, ClusterRef, PlacementIntent, ResolvedClusterList, SelectorClause};
use tracing::debug;

use crate::error::{PlacementError, PlacementResult};
use crate::labels::ClusterLabels;
use crate::validate::check_intent;

/// Resolve an intent into mandatory and optional cluster groups.
///
/// The whole intent is checked before any lookup, so a malformed clause never
/// yields a partial result. An empty result is not an error here; callers
/// decide whether "no compatible clusters" is fatal.
///
/// `all_of` clauses carrying a nested alternation get one extra group number
/// each, allocated after every mandatory number and before the number shared
/// by the top-level `any_of` clauses.
pub async fn resolve(
    intent: &PlacementIntent,
    labels: &dyn ClusterLabels,
) -> PlacementResult<ResolvedClusterList> {
    check_intent(intent)?;

    let mut result = ResolvedClusterList::default();
    let mut group_number = 0u32;

    for (i, clause) in intent.all_of.iter().enumerate() {
        let clusters = resolve_selector(&clause.selector(), &format!("all_of[{i}]"), labels).await?;
        for cluster in clusters {
            group_number += 1;
            debug!(%cluster, group_number, "mandatory cluster resolved");
            result.mandatory.push(ClusterGroup {
                clusters: vec![cluster],
                group_number,
            });
        }
    }

    for (i, clause) in intent.all_of.iter().enumerate() {
        if clause.any_of.is_empty() {
            continue;
        }
        group_number += 1;
        for (j, nested) in clause.any_of.iter().enumerate() {
            let location = format!("all_of[{i}].any_of[{j}]");
            let clusters = resolve_selector(nested, &location, labels).await?;
            result.optional.push(ClusterGroup {
                clusters,
                group_number,
            });
        }
    }

    if !intent.any_of.is_empty() {
        group_number += 1;
        for (i, clause) in intent.any_of.iter().enumerate() {
            let clusters = resolve_selector(clause, &format!("any_of[{i}]"), labels).await?;
            debug!(count = clusters.len(), group_number, "optional clusters resolved");
            result.optional.push(ClusterGroup {
                clusters,
                group_number,
            });
        }
    }

    Ok(result)
}

async fn resolve_selector(
    sel: &SelectorClause,
    location: &str,
    labels: &dyn ClusterLabels,
) -> PlacementResult<Vec<ClusterRef>> {
    if let Some(name) = sel.cluster_name.as_deref().filter(|n| !n.is_empty()) {
        return Ok(vec![ClusterRef::new(sel.provider.as_str(), name)]);
    }
    let label = sel.cluster_label.as_deref().unwrap_or_default();
    let names = labels
        .clusters_with_label(&sel.provider, label)
        .await
        .map_err(|source| PlacementError::LabelLookup {
            clause: location.to_string(),
            provider: sel.provider.clone(),
            label: label.to_string(),
            source,
        })?;
    Ok(names
        .into_iter()
        .map(|name| ClusterRef::new(sel.provider.as_str(), name))
        .collect())
}
