//! Age and arity statistics over the modules of a dependency graph.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::depgraph::{DepGraph, Level};

const DAYS_PER_MONTH: i64 = 30;

/// Summary statistics of a dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepAnalysis {
    pub direct_dependency_count: usize,
    pub indirect_dependency_count: usize,

    /// Mean age in days of the selected versions that carry a timestamp
    pub mean_dep_age_days: i64,
    pub max_dep_age_days: i64,
    /// Number of dependencies per age in whole months
    pub dep_age_month_distribution: Vec<usize>,

    pub mean_inbound_arity: f64,
    pub max_inbound_arity: usize,
    /// Number of dependencies per count of consumers
    pub inbound_arity_distribution: Vec<usize>,
}

fn bump(distribution: &mut Vec<usize>, idx: usize) {
    if distribution.len() <= idx {
        distribution.resize(idx + 1, 0);
    }
    distribution[idx] += 1;
}

impl DepAnalysis {
    /// Computes the statistics of `graph` relative to `now`.
    pub fn new(graph: &DepGraph, now: DateTime<Utc>) -> Self {
        let main = graph.main_path();
        let modules = graph.modules();

        let direct = graph
            .successors(Level::Modules, main)
            .map(|s| s.len())
            .unwrap_or(0);
        let others = modules.iter().filter(|m| m.path() != main).count();

        let mut total_age = 0i64;
        let mut aged = 0i64;
        let mut max_age = 0i64;
        let mut ages = Vec::new();

        let mut total_arity = 0usize;
        let mut counted = 0usize;
        let mut max_arity = 0usize;
        let mut arities = Vec::new();

        for module in &modules {
            if let Some(timestamp) = module.timestamp() {
                let age = (now - timestamp).num_days().max(0);
                total_age += age;
                aged += 1;
                max_age = max_age.max(age);
                bump(&mut ages, (age / DAYS_PER_MONTH) as usize);
            }

            let arity = graph
                .predecessors(Level::Modules, module.path())
                .map(|p| p.len())
                .unwrap_or(0);
            if arity > 0 {
                total_arity += arity;
                counted += 1;
                max_arity = max_arity.max(arity);
                bump(&mut arities, arity);
            }
        }

        Self {
            direct_dependency_count: direct,
            indirect_dependency_count: others.saturating_sub(direct),
            mean_dep_age_days: if aged > 0 { total_age / aged } else { 0 },
            max_dep_age_days: max_age,
            dep_age_month_distribution: ages,
            mean_inbound_arity: if counted > 0 {
                total_arity as f64 / counted as f64
            } else {
                0.0
            },
            max_inbound_arity: max_arity,
            inbound_arity_distribution: arities,
        }
    }

    /// Serialises the statistics as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn human_days(days: i64) -> String {
    format!(
        "{} month(s) {} day(s)",
        days / DAYS_PER_MONTH,
        days % DAYS_PER_MONTH
    )
}

fn write_distribution(
    f: &mut fmt::Formatter<'_>,
    unit: &str,
    distribution: &[usize],
) -> fmt::Result {
    let total: usize = distribution.iter().sum();
    for (idx, count) in distribution.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        let share = *count as f64 * 100.0 / total as f64;
        writeln!(f, "  {:>4} {}: {:>4} ({:6.2} %)", idx, unit, count, share)?;
    }
    Ok(())
}

impl fmt::Display for DepAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dependency counts:")?;
        writeln!(f, "- Direct dependencies:   {}", self.direct_dependency_count)?;
        writeln!(f, "- Indirect dependencies: {}", self.indirect_dependency_count)?;
        writeln!(f)?;
        writeln!(f, "Age statistics:")?;
        writeln!(f, "- Mean age of dependencies: {}", human_days(self.mean_dep_age_days))?;
        writeln!(f, "- Maximum dependency age:   {}", human_days(self.max_dep_age_days))?;
        writeln!(f, "- Age distribution per month:")?;
        write_distribution(f, "month(s)", &self.dep_age_month_distribution)?;
        writeln!(f)?;
        writeln!(f, "Inbound arity statistics:")?;
        writeln!(f, "- Mean inbound arity of dependencies: {:.2}", self.mean_inbound_arity)?;
        writeln!(f, "- Maximum dependency inbound arity:   {}", self.max_inbound_arity)?;
        writeln!(f, "- Arity distribution:")?;
        write_distribution(f, "consumer(s)", &self.inbound_arity_distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depgraph::module_hash;
    use crate::parser::ModuleInfo;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn module(path: &str, age_days: i64) -> ModuleInfo {
        let mut info = ModuleInfo::new(path, "v1.0.0");
        info.time = Some(now() - Duration::days(age_days));
        info
    }

    fn sample() -> DepGraph {
        let mut graph = DepGraph::new(ModuleInfo::new("main", ""));
        graph.add_module(module("a", 10)).unwrap();
        graph.add_module(module("b", 40)).unwrap();
        graph.add_module(module("c", 70)).unwrap();
        for (src, dst) in [("main", "a"), ("main", "b"), ("a", "c"), ("b", "c")] {
            graph
                .graph_mut()
                .add_edge(&module_hash(src), &module_hash(dst))
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_counts() {
        let analysis = DepAnalysis::new(&sample(), now());

        assert_eq!(analysis.direct_dependency_count, 2);
        assert_eq!(analysis.indirect_dependency_count, 1);
    }

    #[test]
    fn test_age_statistics() {
        let analysis = DepAnalysis::new(&sample(), now());

        assert_eq!(analysis.mean_dep_age_days, 40);
        assert_eq!(analysis.max_dep_age_days, 70);
        assert_eq!(analysis.dep_age_month_distribution, vec![1, 1, 1]);
    }

    #[test]
    fn test_arity_statistics() {
        let analysis = DepAnalysis::new(&sample(), now());

        assert_eq!(analysis.max_inbound_arity, 2);
        assert!((analysis.mean_inbound_arity - 4.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(analysis.inbound_arity_distribution, vec![0, 2, 1]);
    }

    #[test]
    fn test_empty_graph() {
        let graph = DepGraph::new(ModuleInfo::new("main", ""));
        let analysis = DepAnalysis::new(&graph, now());

        assert_eq!(analysis.direct_dependency_count, 0);
        assert_eq!(analysis.indirect_dependency_count, 0);
        assert_eq!(analysis.mean_dep_age_days, 0);
        assert_eq!(analysis.mean_inbound_arity, 0.0);
        assert!(analysis.dep_age_month_distribution.is_empty());
    }

    #[test]
    fn test_display_and_json() {
        let analysis = DepAnalysis::new(&sample(), now());

        let text = analysis.to_string();
        assert!(text.contains("- Direct dependencies:   2"));
        assert!(text.contains("- Maximum dependency age:   2 month(s) 10 day(s)"));
        assert!(text.contains("- Mean inbound arity of dependencies: 1.33"));

        let json: serde_json::Value = serde_json::from_str(&analysis.to_json().unwrap()).unwrap();
        assert_eq!(json["direct_dependency_count"], 2);
        assert_eq!(json["inbound_arity_distribution"][2], 1);
    }
}
