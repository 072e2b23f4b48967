//! Route assembly
//!
//! Folds the three route sets into the URL lists published for an
//! environment. Sets are visited in a fixed order (autogenerated, declared,
//! active/standby) and the first route of each non-empty set replaces the
//! primary, so the last non-empty set decides it.

use serde::{Deserialize, Serialize};

use crate::domain::route::RouteSet;

const URL_PREFIX: &str = "https://";

/// Published URLs of an environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSummary {
    /// Primary URL, empty when the environment has no routes
    pub primary: String,
    /// Every route and alternative name, primary included
    pub secondary: Vec<String>,
    /// Autogenerated routes and their alternative names
    pub autogenerated: Vec<String>,
}

fn url(domain: &str) -> String {
    format!("{}{}", URL_PREFIX, domain)
}

/// Assemble the published URLs from the three route sets.
pub fn assemble(autogenerated: &RouteSet, declared: &RouteSet, active_standby: &RouteSet) -> RouteSummary {
    let mut summary = RouteSummary::default();

    for set in [autogenerated, declared, active_standby] {
        if let Some(first) = set.routes.first() {
            summary.primary = url(&first.domain);
        }
        for route in &set.routes {
            summary.secondary.push(url(&route.domain));
            summary
                .secondary
                .extend(route.alternative_names.iter().map(|name| url(name)));
        }
    }

    for route in &autogenerated.routes {
        summary.autogenerated.push(url(&route.domain));
        summary
            .autogenerated
            .extend(route.alternative_names.iter().map(|name| url(name)));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hostname;
    use crate::domain::route::Route;

    fn set(domains: &[&str]) -> RouteSet {
        RouteSet::new(
            domains
                .iter()
                .map(|d| Route {
                    domain: d.to_string(),
                    ..Default::default()
                })
                .collect(),
        )
    }

    #[test]
    fn test_primary_from_last_non_empty_set() {
        let summary = assemble(&set(&["auto.example.com"]), &set(&["main.example.com"]), &set(&[]));
        assert_eq!(summary.primary, "https://main.example.com");

        let summary = assemble(
            &set(&["auto.example.com"]),
            &set(&["main.example.com"]),
            &set(&["active.example.com"]),
        );
        assert_eq!(summary.primary, "https://active.example.com");

        let summary = assemble(&set(&["auto.example.com"]), &set(&[]), &set(&[]));
        assert_eq!(summary.primary, "https://auto.example.com");
    }

    #[test]
    fn test_no_routes() {
        let summary = assemble(&set(&[]), &set(&[]), &set(&[]));
        assert_eq!(summary, RouteSummary::default());
        assert!(summary.primary.is_empty());
    }

    #[test]
    fn test_secondary_keeps_order_and_primary() {
        let mut declared = set(&["a.example.com", "b.example.com"]);
        declared.routes[0].alternative_names = vec!["www.a.example.com".to_string()];

        let summary = assemble(&set(&["auto.example.com"]), &declared, &set(&[]));
        assert_eq!(
            summary.secondary,
            vec![
                "https://auto.example.com",
                "https://a.example.com",
                "https://www.a.example.com",
                "https://b.example.com",
            ]
        );
        assert!(summary.secondary.contains(&summary.primary));
        assert_eq!(summary.autogenerated, vec!["https://auto.example.com"]);
    }

    #[test]
    fn test_autogenerated_alternative_names() {
        let mut auto = set(&["node.example.com"]);
        auto.routes[0].alternative_names = vec!["www.node.example.com".to_string()];
        let summary = assemble(&auto, &set(&[]), &set(&[]));
        assert_eq!(
            summary.autogenerated,
            vec!["https://node.example.com", "https://www.node.example.com"]
        );
    }

    #[test]
    fn test_single_autogenerated_service_end_to_end() {
        let generated = hostname::generate(
            "${service}-${project}-${environment}.example.com",
            "node",
            "example-project",
            "main",
        );
        let summary = assemble(&set(&[generated.domain.as_str()]), &set(&[]), &set(&[]));
        assert_eq!(summary.primary, "https://node-example-project-main.example.com");
        assert_eq!(summary.secondary, vec!["https://node-example-project-main.example.com"]);
        assert_eq!(summary.autogenerated, summary.secondary);
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = assemble(&set(&["a.example.com"]), &set(&[]), &set(&[]));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["primary"], "https://a.example.com");
        assert_eq!(json["secondary"][0], "https://a.example.com");
        assert_eq!(json["autogenerated"][0], "https://a.example.com");
    }
}
