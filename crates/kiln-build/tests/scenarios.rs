//! Processing order and freshness scenarios on small module trees.

mod common;

use common::{Project, id, ids, roots};
use kiln_build::{BuildError, ModuleState, Pass};

#[test]
fn test_uniform_cycle_orders_by_discovery() {
    let project = Project::new();
    project.file("a.py", "import b\n").file("b.py", "import a\n");

    let (result, driver) = project.build(&["a"]);

    assert_eq!(result.stats.sccs, 1);
    assert_eq!(driver.ran(Pass::SemanticAnalysis), ids(&["b", "a"]));
    assert_eq!(driver.ran(Pass::TypeCheck), ids(&["b", "a"]));
    assert_eq!(result.rebuilt().collect::<Vec<_>>(), vec![&id("b"), &id("a")]);
}

#[test]
fn test_low_priority_edge_is_broken_first() {
    let project = Project::new();
    project
        .file("a.py", "import b\n")
        .file("b.py", "def f():\n    import a\n");

    let (result, driver) = project.build(&["b"]);

    // b is discovered first, but a's Medium edge to b outranks b's Low edge
    assert_eq!(result.stats.sccs, 1);
    assert_eq!(driver.ran(Pass::SemanticAnalysis), ids(&["b", "a"]));
}

#[test]
fn test_unchanged_interface_keeps_importer_fresh() {
    let project = Project::new();
    project
        .file("a.py", "import b\ndef main():\n    pass\n")
        .file("b.py", "def f():\n    return 1\n");
    project.build(&["a"]);

    project.file("b.py", "def f():\n    return 12345\n");
    let (result, driver) = project.build(&["a"]);

    assert_eq!(driver.parsed(), ids(&["b"]));
    assert_eq!(result.state("b"), Some(ModuleState::Rebuilt));
    assert_eq!(result.state("a"), Some(ModuleState::FreshQueued));
    assert_eq!(result.stats.metadata_only_writes, 1);
    assert!(result.module("a").is_none());

    let (result, driver) = project.build(&["a"]);
    assert!(driver.parsed().is_empty());
    assert_eq!(result.state("b"), Some(ModuleState::FreshQueued));
}

#[test]
fn test_changed_interface_rebuilds_importer() {
    let project = Project::new();
    project
        .file("a.py", "import b\n")
        .file("b.py", "def f():\n    return 1\n");
    project.build(&["a"]);

    project.file("b.py", "def f(x):\n    return x\n");
    let (result, driver) = project.build(&["a"]);

    assert_eq!(driver.parsed(), ids(&["b", "a"]));
    assert_eq!(result.state("a"), Some(ModuleState::Rebuilt));
    assert_eq!(result.stats.metadata_only_writes, 0);
}

#[test]
fn test_changed_interface_settles_after_one_rebuild() {
    let project = Project::new();
    project
        .file("a.py", "import b\n")
        .file("b.py", "def f():\n    return 1\n");
    project.build(&["a"]);

    project.file("b.py", "def f(x):\n    return x\n");
    let (_, driver) = project.build(&["a"]);
    assert_eq!(driver.parsed(), ids(&["b", "a"]));

    for _ in 0..2 {
        let (result, driver) = project.build(&["a"]);
        assert!(driver.parsed().is_empty());
        assert_eq!(result.state("a"), Some(ModuleState::FreshQueued));
        assert_eq!(result.state("b"), Some(ModuleState::FreshQueued));
    }
}

#[test]
fn test_missing_import_is_reported_until_resolved() {
    let project = Project::new();
    project.file("a.py", "import x\n");

    for _ in 0..2 {
        let (result, _) = project.build(&["a"]);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].module, Some(id("a")));
        assert_eq!(result.diagnostics[0].line, Some(1));
        assert_eq!(result.state("a"), Some(ModuleState::Rebuilt));
    }

    project.file("x.py", "def g():\n    pass\n");
    let (result, driver) = project.build(&["a"]);
    assert_eq!(driver.ran(Pass::SemanticAnalysis), ids(&["x", "a"]));
    assert_eq!(result.state("a"), Some(ModuleState::Rebuilt));
    assert!(result.diagnostics.is_empty());

    let (_, driver) = project.build(&["a"]);
    assert!(driver.parsed().is_empty());
}

#[test]
fn test_resolved_suppression_makes_cached_importer_stale() {
    let mut project = Project::new();
    project.config.ignore_missing_imports = true;
    project.file("a.py", "import x\n");

    let (result, _) = project.build(&["a"]);
    assert!(result.diagnostics.is_empty());

    let (result, driver) = project.build(&["a"]);
    assert!(driver.parsed().is_empty());
    assert_eq!(result.state("a"), Some(ModuleState::FreshQueued));

    project.file("x.py", "def g():\n    pass\n");
    let (result, driver) = project.build(&["a"]);
    assert_eq!(driver.parsed(), ids(&["x", "a"]));
    assert_eq!(result.state("a"), Some(ModuleState::Rebuilt));
}

#[test]
fn test_unlocatable_root_is_fatal() {
    let project = Project::new();
    project.file("a.py", "");

    let err = project.try_build(&roots(&["a", "missing"])).unwrap_err();
    assert!(matches!(err, BuildError::RootNotFound { module } if module == id("missing")));
}

#[test]
fn test_fresh_dependencies_are_loaded_before_stale_importer() {
    let project = Project::new();
    project
        .file("app.py", "import lib\nimport util\n")
        .file("lib.py", "def lib_fn():\n    pass\n")
        .file("util.py", "def util_fn():\n    pass\n");
    project.build(&["app"]);

    project.file("app.py", "import lib\nimport util\ndef main():\n    pass\n");
    let (result, driver) = project.build(&["app"]);

    assert_eq!(driver.parsed(), ids(&["app"]));
    assert_eq!(driver.loaded(), ids(&["util", "lib"]));
    assert_eq!(result.state("lib"), Some(ModuleState::FreshApplied));
    assert_eq!(result.state("app"), Some(ModuleState::Rebuilt));
    assert_eq!(
        result.modules.keys().collect::<Vec<_>>(),
        vec![&id("util"), &id("lib"), &id("app")]
    );
}
