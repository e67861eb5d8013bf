use reporadial::category::NodeCategory;
use reporadial::config::RadiusMode;
use reporadial::expand_state::Toggle;
use reporadial::provider::scan_local;
use reporadial::tree::NodeKind;
use reporadial::{Config, FileTree, PathRecord, RadialDiagram};
use std::fs;

fn scenario_records() -> Vec<PathRecord> {
    vec![
        PathRecord::blob("src/index.ts"),
        PathRecord::blob("src/utils/helper.ts"),
        PathRecord::blob("README.md"),
    ]
}

#[test]
fn test_scenario_end_to_end() {
    let tree = FileTree::from_records(&scenario_records());

    let src = tree.get_node("src").unwrap();
    assert_eq!(tree.node(src).unwrap().kind, NodeKind::Branch);
    let index = tree.get_node("src/index.ts").unwrap();
    assert_eq!(tree.node(index).unwrap().category, NodeCategory::Build);
    let readme = tree.get_node("README.md").unwrap();
    assert_eq!(tree.node(readme).unwrap().category, NodeCategory::Config);

    let mut diagram = RadialDiagram::render(tree, 1024.0, 768.0, &Config::default());
    assert_eq!(diagram.layout().nodes.len(), 6);
    assert_eq!(diagram.layout().links.len(), 5);

    let root = diagram.tree().get_root();
    assert_eq!(diagram.layout().get(root).unwrap().radius, 0.0);

    // every branch overlay bounds the leaves below it
    let helper = diagram.tree().get_node("src/utils/helper.ts").unwrap();
    let helper_pos = diagram.layout().get(helper).unwrap().position();
    let src_overlay = *diagram.overlay(src).unwrap();
    assert!(src_overlay.padded(1e-3).contains(helper_pos));

    assert_eq!(diagram.click(src), Toggle::Collapsed(2));
    diagram.finish_animation();
    assert_eq!(diagram.layout().nodes.len(), 3);
    assert_eq!(diagram.layout().links.len(), 2);
    assert!(diagram.overlay(src).unwrap().is_degenerate());

    assert_eq!(diagram.click(src), Toggle::Expanded(2));
    diagram.finish_animation();
    assert_eq!(diagram.nodes().count(), 6);
}

#[test]
fn test_wide_repository_starts_collapsed() {
    let mut records = Vec::new();
    for i in 0..25 {
        records.push(PathRecord::blob(format!("crate{i}/src/lib.rs")));
        records.push(PathRecord::blob(format!("crate{i}/Cargo.toml")));
    }
    let diagram = RadialDiagram::render(FileTree::from_records(&records), 800.0, 800.0, &Config::default());

    let tree = diagram.tree();
    for child in tree.children(tree.get_root()) {
        assert_eq!(tree.active_child_count(child), 0);
        assert!(!tree.node(child).unwrap().shelved_children().is_empty());
    }
    assert_eq!(diagram.links().count(), 25);
}

#[test]
fn test_config_drives_layout() {
    let config = Config::parse(
        r#"
        [layout]
        radius = "normalized"

        [animation]
        duration_ms = 0
        "#,
    )
    .unwrap();
    assert_eq!(config.layout.radius, RadiusMode::Normalized);

    let mut diagram = RadialDiagram::render(
        FileTree::from_records(&scenario_records()),
        600.0,
        400.0,
        &config,
    );
    // normalized: deepest ring sits on the canvas radius
    assert!((diagram.layout().extent() - 200.0).abs() < 1e-3);

    let src = diagram.tree().get_node("src").unwrap();
    diagram.click(src);
    assert!(!diagram.is_animating());
}

#[test]
fn test_local_checkout_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/bin")).unwrap();
    fs::create_dir_all(dir.path().join(".git")).unwrap();
    fs::create_dir_all(dir.path().join("empty")).unwrap();
    fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
    fs::write(dir.path().join("src/lib.rs"), "").unwrap();
    fs::write(dir.path().join("src/bin/tool.rs"), "").unwrap();
    fs::write(dir.path().join(".git/HEAD"), "").unwrap();

    let records = scan_local(dir.path()).unwrap();
    let tree = FileTree::from_records(&records);
    assert_eq!(tree.leaf_count(), 3);
    // Cargo.toml, src, src/lib.rs, src/bin, src/bin/tool.rs, empty
    assert_eq!(tree.node_count(), 6);
    assert!(tree.get_node(".git").is_none());

    let empty = tree.get_node("empty").unwrap();
    let diagram = RadialDiagram::render(tree, 500.0, 500.0, &Config::default());
    assert!(diagram.overlay(empty).unwrap().is_degenerate());
}

#[test]
fn test_empty_repository_renders_root_only() {
    let diagram = RadialDiagram::render(FileTree::from_records(&[]), 300.0, 300.0, &Config::default());
    assert_eq!(diagram.nodes().count(), 1);
    assert_eq!(diagram.links().count(), 0);
}
