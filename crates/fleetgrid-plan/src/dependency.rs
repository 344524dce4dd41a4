//! Inter-application dependency analysis.

use std::collections::BTreeSet;

use fleetgrid_state::Application;
use tracing::debug;

use crate::error::{PlanError, PlanResult};

/// Order applications so that every app follows the apps it depends on.
///
/// Among apps whose dependencies are already placed, declaration order wins.
/// A dependency on an app outside `apps` is rejected, as is any cycle
/// (self-dependency included); the cycle error names every app left unordered.
pub fn check_and_order(apps: &[Application]) -> PlanResult<Vec<String>> {
    let known: BTreeSet<&str> = apps.iter().map(|a| a.name.as_str()).collect();
    for app in apps {
        if let Some(missing) = app
            .dependency
            .keys()
            .find(|dep| !known.contains(dep.as_str()))
        {
            return Err(PlanError::UnknownDependency {
                app: app.name.clone(),
                dependency: missing.clone(),
            });
        }
    }

    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut order: Vec<String> = Vec::with_capacity(apps.len());

    while order.len() < apps.len() {
        let next = apps.iter().find(|app| {
            !placed.contains(app.name.as_str())
                && app.dependency.keys().all(|dep| placed.contains(dep.as_str()))
        });
        match next {
            Some(app) => {
                placed.insert(app.name.as_str());
                order.push(app.name.clone());
            }
            None => {
                let apps: Vec<String> = apps
                    .iter()
                    .filter(|a| !placed.contains(a.name.as_str()))
                    .map(|a| a.name.clone())
                    .collect();
                debug!(?apps, "dependency cycle detected");
                return Err(PlanError::DependencyCycle { apps });
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgrid_state::DependencyCondition;
    use std::collections::BTreeMap;

    fn app(name: &str, deps: &[&str]) -> Application {
        Application {
            name: name.to_string(),
            description: String::new(),
            content: format!("./{name}"),
            dependency: deps
                .iter()
                .map(|d| (d.to_string(), DependencyCondition::Ready))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn dependencies_come_first() {
        let apps = vec![app("web", &["api"]), app("api", &["db"]), app("db", &[])];
        assert_eq!(check_and_order(&apps).unwrap(), vec!["db", "api", "web"]);
    }

    #[test]
    fn independent_apps_keep_declaration_order() {
        let apps = vec![app("b", &[]), app("a", &[]), app("c", &["a"])];
        assert_eq!(check_and_order(&apps).unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn two_app_cycle_is_rejected() {
        let apps = vec![app("a", &["b"]), app("b", &["a"]), app("c", &[])];
        match check_and_order(&apps).unwrap_err() {
            PlanError::DependencyCycle { apps } => assert_eq!(apps, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let apps = vec![app("a", &["a"])];
        assert!(matches!(
            check_and_order(&apps),
            Err(PlanError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let apps = vec![app("a", &["ghost"])];
        let err = check_and_order(&apps).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("ghost"));
    }
}
