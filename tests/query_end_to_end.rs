//! Builds a graph from `go list` style metadata and reduces it with queries.

use depscope::depgraph::{
    DepGraph, Error, Filter, Level, NonSharedModules, QueryFilter, Target, TargetModules,
};
use depscope::export::{export_to_string, ExportData, ExportFormat};
use depscope::parser::{parse_modules_str, parse_packages_str};
use depscope::query::parse;

const MODULES: &str = r#"
{"Path": "example.com/app", "Main": true}
{"Path": "example.com/lib", "Version": "v1.0.0", "Time": "2023-01-01T00:00:00Z"}
{"Path": "example.com/util", "Version": "v1.1.0", "Time": "2023-06-01T00:00:00Z"}
{"Path": "github.com/stretchr/testify", "Version": "v1.8.0"}
{"Path": "example.com/orphan", "Version": "v0.1.0"}
{"Path": "example.com/broken", "Error": {"Err": "module not found"}}
"#;

const PACKAGES: &str = r#"
{
    "ImportPath": "example.com/app",
    "Name": "main",
    "Module": {"Path": "example.com/app", "Main": true},
    "Imports": ["example.com/lib", "fmt"],
    "TestImports": ["github.com/stretchr/testify/assert"]
}
{
    "ImportPath": "example.com/app/internal",
    "Name": "internal",
    "Module": {"Path": "example.com/app", "Main": true},
    "Imports": ["example.com/util"]
}
{
    "ImportPath": "example.com/lib",
    "Name": "lib",
    "Module": {"Path": "example.com/lib", "Version": "v1.0.0"},
    "Imports": ["example.com/util", "example.com/util/sub", "strings"]
}
{
    "ImportPath": "example.com/util",
    "Name": "util",
    "Module": {"Path": "example.com/util", "Version": "v1.1.0"}
}
{
    "ImportPath": "example.com/util/sub",
    "Name": "sub",
    "Module": {"Path": "example.com/util", "Version": "v1.1.0"}
}
{
    "ImportPath": "github.com/stretchr/testify/assert",
    "Name": "assert",
    "Module": {"Path": "github.com/stretchr/testify", "Version": "v1.8.0"}
}
"#;

const MOD_GRAPH: &str = "\
example.com/app example.com/lib@v1.0.0
example.com/lib@v1.0.0 example.com/util@v1.1.0
example.com/lib@v0.9.0 example.com/util@v1.0.0
example.com/app github.com/other/thing@v1.0.0
";

const APP: &str = "example.com/app";
const LIB: &str = "example.com/lib";
const UTIL: &str = "example.com/util";
const TESTIFY: &str = "github.com/stretchr/testify";

fn build() -> DepGraph {
    let modules = parse_modules_str(MODULES).unwrap();
    let packages = parse_packages_str(PACKAGES).unwrap();
    DepGraph::build(&modules, &packages, Some(MOD_GRAPH)).unwrap()
}

fn evaluate(graph: &mut DepGraph, query: &str, level: Level) -> Vec<String> {
    let expr = parse(query).unwrap();
    graph
        .evaluate_and_prune(&expr, level)
        .unwrap()
        .into_iter()
        .collect()
}

fn module_names(graph: &DepGraph) -> Vec<&str> {
    graph.modules().iter().map(|m| m.path()).collect()
}

#[test]
fn test_build_rolls_up_package_imports() {
    let graph = build();

    assert_eq!(module_names(&graph), vec![APP, LIB, UTIL, TESTIFY]);
    assert_eq!(graph.packages().len(), 6);

    let app = graph.successors(Level::Modules, APP).unwrap();
    assert_eq!(app.names(), vec![LIB, UTIL, TESTIFY]);
    let lib = graph.successors(Level::Modules, LIB).unwrap();
    assert_eq!(lib.weight(&Level::Modules.hash(UTIL)), 2);
}

#[test]
fn test_build_marks_test_only_modules() {
    let graph = build();

    assert!(graph.get_module(TESTIFY).unwrap().is_test_only());
    assert!(!graph.get_module(LIB).unwrap().is_test_only());
    assert!(!graph.get_module(APP).unwrap().is_test_only());
}

#[test]
fn test_build_records_version_constraints() {
    let graph = build();

    let lib = graph.get_module(LIB).unwrap();
    let constraint = &lib.version_constraints[&Level::Modules.hash(UTIL)];
    assert_eq!(constraint.source, "v1.0.0");
    assert_eq!(constraint.target, "v1.1.0");

    let app = graph.get_module(APP).unwrap();
    assert_eq!(app.version_constraints.len(), 1);
}

#[test]
fn test_test_annotation() {
    let mut graph = build();

    assert!(evaluate(&mut graph, "github.com/...", Level::Modules).is_empty());
    assert_eq!(
        evaluate(&mut graph, "github.com/...:test", Level::Modules),
        vec![TESTIFY]
    );
}

#[test]
fn test_module_queries() {
    let mut graph = build();

    assert_eq!(
        evaluate(&mut graph, "rdeps(example.com/util, 1)", Level::Modules),
        vec![APP, LIB, UTIL]
    );
    assert_eq!(
        evaluate(&mut graph, "deps(example.com/app) - github.com/...:test", Level::Modules),
        vec![APP, LIB, UTIL]
    );
    assert_eq!(
        evaluate(&mut graph, "deps(example.com/lib) inter rdeps(example.com/util)", Level::Modules),
        vec![LIB, UTIL]
    );
}

#[test]
fn test_apply_module_query() {
    let graph = build();
    let filter = QueryFilter::parse("deps(example.com/lib)", Level::Modules).unwrap();

    let graph = filter.apply(graph).unwrap();
    assert_eq!(module_names(&graph), vec![LIB, UTIL]);
    assert_eq!(graph.main_module(), None);
    assert_eq!(graph.packages().len(), 3);
    assert_eq!(
        graph.graph().edge_weight(&Level::Modules.hash(LIB), &Level::Modules.hash(UTIL)),
        2
    );
}

#[test]
fn test_apply_package_query_prunes_empty_modules() {
    let mut graph = build();
    let expr = parse("rdeps(example.com/util/sub)").unwrap();

    let removed = graph.apply_query(&expr, Level::Packages).unwrap();
    assert_eq!(removed, 3);

    let packages: Vec<&str> = graph.packages().iter().map(|p| p.import_path()).collect();
    assert_eq!(
        packages,
        vec!["example.com/app", "example.com/lib", "example.com/util/sub"]
    );
    assert_eq!(module_names(&graph), vec![APP, LIB, UTIL]);
    assert_eq!(
        graph.graph().edge_weight(&Level::Modules.hash(LIB), &Level::Modules.hash(UTIL)),
        1
    );
}

#[test]
fn test_query_errors_are_reported() {
    let mut graph = build();

    assert!(matches!(
        QueryFilter::parse("deps(", Level::Modules),
        Err(Error::Parse(_))
    ));

    let expr = parse("deps(example.com/app, example.com/lib)").unwrap();
    let err = graph.evaluate_and_prune(&expr, Level::Modules).unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert!(err.to_string().starts_with("1-38:"));
}

#[test]
fn test_target_filter_keeps_blocking_chain() {
    let graph = build();
    let filter = TargetModules {
        targets: vec![Target::new(UTIL, Some("v1.0.0".to_string()))],
    };

    let graph = filter.apply(graph).unwrap();
    assert_eq!(module_names(&graph), vec![APP, LIB, UTIL]);
}

#[test]
fn test_non_shared_filter() {
    let graph = build();

    let graph = NonSharedModules::default().apply(graph).unwrap();
    assert_eq!(module_names(&graph), vec![APP, LIB, UTIL]);
}

#[test]
fn test_export_after_query() {
    let graph = build();
    let graph = QueryFilter::parse("example.com/...", Level::Modules)
        .unwrap()
        .apply(graph)
        .unwrap();

    let data = ExportData::new(&graph, Level::Modules);
    let csv = export_to_string(ExportFormat::Csv, &data).unwrap();
    assert_eq!(
        csv,
        "source,target,weight\n\
         example.com/app,example.com/lib,1\n\
         example.com/app,example.com/util,1\n\
         example.com/lib,example.com/util,2\n"
    );
}
