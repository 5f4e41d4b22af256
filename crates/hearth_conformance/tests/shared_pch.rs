//! End-to-end tests for shared PCH pruning, selection and instancing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_cache::FileSetIndex;
use hearth_config::PchUsage;
use hearth_conformance::{make_config, Harness, SourceFile, SourceTree};
use hearth_pch::errors::{P301, P303};
use hearth_pch::{HeaderReachabilityAnalyzer, PchDecision};

const MODULES: &str = r#"
[modules.Core]
directory = "Engine/Core"

[modules.A]
directory = "Engine/A"
public_dependencies = ["Core"]
shared_pch = "Public/A.h"

[modules.B]
directory = "Engine/B"
public_dependencies = ["A", "Core"]
"#;

fn tree(a_includes: &[&str]) -> SourceTree {
    let tree = SourceTree::new();
    tree.add("/src/Engine/A/Public/A.h", SourceFile::including(a_includes).exporting())
        .add("/src/Engine/Core/Public/CoreTypes.h", SourceFile::default())
        .add("/src/Engine/B/Private/B.cpp", SourceFile::including(&["A.h"]));
    tree
}

fn shared_template(decision: &PchDecision) -> &str {
    match decision {
        PchDecision::Shared { template, .. } => template,
        other => panic!("expected a shared PCH, got {other:?}"),
    }
}

#[test]
fn unexported_dependency_is_pruned() {
    let harness = Harness::new(tree(&["CoreTypes.h"]));
    let result = harness.plan(&make_config("", MODULES));
    assert!(!result.has_code(P303));
    let plan = result.into_plan();

    let template = &plan.templates[0];
    assert_eq!(template.module, "A");
    assert!(template.complete);
    assert_eq!(template.dependencies, vec!["A".to_string()]);
    assert_eq!(shared_template(&plan.module("B").unwrap().pch), "A");
}

#[test]
fn unattributed_export_falls_back_to_full_set() {
    let tree = tree(&["CoreTypes.h", "../../Shared/CoreExports.h"]);
    tree.add("/src/Engine/Shared/CoreExports.h", SourceFile::default().exporting());
    let harness = Harness::new(tree);
    let result = harness.plan(&make_config("", MODULES));
    assert!(result.has_code(P303));
    let plan = result.into_plan();

    let template = &plan.templates[0];
    assert!(!template.complete);
    assert_eq!(template.dependencies, vec!["A".to_string(), "Core".to_string()]);
    // B is outside the full set, so it still shares A's PCH.
    assert_eq!(shared_template(&plan.module("B").unwrap().pch), "A");
}

#[test]
fn reflection_markup_counts_like_exports() {
    let tree = tree(&["CoreTypes.h"]);
    tree.add("/src/Engine/Core/Public/CoreTypes.h", SourceFile::default().reflected());
    let plan = Harness::new(tree).plan(&make_config("", MODULES)).into_plan();
    assert_eq!(
        plan.templates[0].dependencies,
        vec!["A".to_string(), "Core".to_string()]
    );
    assert!(plan.templates[0].complete);
}

#[test]
fn mutual_includes_terminate() {
    let tree = Arc::new(SourceTree::new());
    tree.add("/src/X/X.h", SourceFile::including(&["Y.h"]))
        .add("/src/X/Y.h", SourceFile::including(&["X.h"]));
    let files = FileSetIndex::new(tree.clone());
    let analyzer = HeaderReachabilityAnalyzer::new(&files, tree.as_ref(), "Linux");
    let found = analyzer.find_included_headers(Path::new("/src/X/X.h"), &[]);
    assert!(found.resolved.contains(Path::new("/src/X/Y.h")));
    assert!(found.unresolved.is_empty());
}

#[test]
fn compatible_consumers_share_one_instance() {
    let modules = format!(
        "{MODULES}\n[modules.C]\ndirectory = \"Engine/C\"\npublic_dependencies = [\"A\"]\n"
    );
    let tree = tree(&["CoreTypes.h"]);
    tree.add("/src/Engine/C/Private/C.cpp", SourceFile::including(&["A.h"]));
    let harness = Harness::new(tree);
    let plan = harness.plan(&make_config("", &modules)).into_plan();

    let instances = &plan.templates[0].instances;
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].consumers, vec!["B".to_string(), "C".to_string()]);

    let b = plan.module("B").unwrap().environment.pch_instance().unwrap();
    let c = plan.module("C").unwrap().environment.pch_instance().unwrap();
    assert!(Arc::ptr_eq(b, c));
    assert_eq!(harness.toolchain.compiles_of(&instances[0].wrapper).len(), 1);
}

#[test]
fn differing_flag_creates_distinct_variant() {
    let modules = format!(
        "{MODULES}\n[modules.C]\ndirectory = \"Engine/C\"\npublic_dependencies = [\"A\"]\nuse_rtti = true\n"
    );
    let plan = Harness::new(tree(&["CoreTypes.h"]))
        .plan(&make_config("", &modules))
        .into_plan();

    let wrappers: Vec<PathBuf> = plan.templates[0]
        .instances
        .iter()
        .map(|i| i.wrapper.clone())
        .collect();
    assert_eq!(wrappers.len(), 2);
    assert_ne!(wrappers[0], wrappers[1]);
    assert!(wrappers
        .iter()
        .any(|w| w.to_string_lossy().ends_with("SharedPCH.A.RTTI.Cpp20.h")));
}

#[test]
fn consumers_depend_on_instance_objects() {
    let harness = Harness::new(tree(&["CoreTypes.h"]));
    let plan = harness.plan(&make_config("", MODULES)).into_plan();
    let objects = &plan.templates[0].instances[0].objects;
    let b_compile = harness
        .toolchain
        .compiles_of(Path::new("/src/Engine/B/Private/B.cpp"))
        .pop()
        .unwrap();
    assert_eq!(b_compile.pch_action, "include");
    assert!(objects.iter().all(|o| b_compile.prerequisites.contains(o)));
}

#[test]
fn chained_instances_link_parents() {
    let body = r#"
[modules.Core]
directory = "Engine/Core"
shared_pch = "Public/CoreSharedPCH.h"

[modules.A]
directory = "Engine/A"
public_dependencies = ["Core"]
shared_pch = "Public/A.h"

[modules.B]
directory = "Engine/B"
public_dependencies = ["A", "Core"]
"#;
    let tree = tree(&["CoreTypes.h"]);
    tree.add(
        "/src/Engine/Core/Public/CoreSharedPCH.h",
        SourceFile::including(&["CoreTypes.h"]).exporting(),
    );
    let plan = Harness::new(tree)
        .plan(&make_config("chain_pchs = true", body))
        .into_plan();

    let names: Vec<&str> = plan.templates.iter().map(|t| t.module.as_str()).collect();
    assert_eq!(names, vec!["A", "Core"]);
    let a = &plan.templates[0].instances[0];
    let core = &plan.templates[1].instances[0];
    assert_eq!(a.parent.as_ref(), Some(&core.wrapper));
    assert_eq!(a.objects.len(), 2);

    let b = plan.module("B").unwrap();
    for object in &a.objects {
        assert!(b.link_inputs().contains(object));
    }
}

#[test]
fn optimization_override_demotes_without_error() {
    let modules = format!(
        "{MODULES}\n[modules.C]\ndirectory = \"Engine/C\"\npublic_dependencies = [\"A\", \"Core\"]\n\
         optimize_code = \"never\"\npch_usage = \"use_shared_pchs\"\n"
    );
    let harness = Harness::new(tree(&["CoreTypes.h"]));
    let session = harness.session(&make_config("", &modules));
    let plan = session.plan().unwrap();

    let c = session.graph().find("C").unwrap();
    assert_eq!(c.pch_usage(), PchUsage::NoPchs);
    assert_eq!(plan.module("C").unwrap().pch, PchDecision::None);
    assert!(session.sink().diagnostics().iter().any(|d| d.code == P301));
}

#[test]
fn optimization_override_keeps_private_pch() {
    let modules = format!(
        "{MODULES}\n[modules.C]\ndirectory = \"Engine/C\"\npublic_dependencies = [\"A\", \"Core\"]\n\
         optimize_code = \"never\"\npch_usage = \"use_shared_pchs\"\nprivate_pch = \"Private/CPCH.h\"\n"
    );
    let tree = tree(&["CoreTypes.h"]);
    tree.add("/src/Engine/C/Private/CPCH.h", SourceFile::default());
    let harness = Harness::new(tree);
    let session = harness.session(&make_config("", &modules));
    let plan = session.plan().unwrap();

    assert_eq!(session.graph().find("C").unwrap().pch_usage(), PchUsage::NoSharedPchs);
    assert!(matches!(plan.module("C").unwrap().pch, PchDecision::Private { .. }));
}
