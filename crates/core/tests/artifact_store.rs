use std::fs;

use acfg_core::artifacts::{
    has_triple, read_adjacency, read_features, read_label, remove_triple, write_triple,
    ArtifactError, ArtifactLayout,
};
use acfg_core::model::{AdjacencyRelation, AttributedCfg, FeatureMatrix, SampleId};
use tempfile::tempdir;

fn sample_cfg() -> AttributedCfg {
    let features = FeatureMatrix::new(vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
    let adjacency = AdjacencyRelation::from_edges(3, [(0, 2), (0, 1), (2, 0)]).expect("edges");
    AttributedCfg::new(features, adjacency).expect("shape")
}

#[test]
fn triple_is_written_with_expected_names_and_content() {
    let dir = tempdir().expect("tempdir");
    let layout = ArtifactLayout::new(dir.path());
    let id = SampleId::new("0A32eTdBKayjCWhZqDOQ");

    write_triple(&layout, &id, &sample_cfg(), "2").expect("write");

    assert!(dir.path().join("0A32eTdBKayjCWhZqDOQ.features.txt").is_file());
    assert!(dir.path().join("0A32eTdBKayjCWhZqDOQ.label.txt").is_file());
    assert!(dir.path().join("0A32eTdBKayjCWhZqDOQ.adjacent.npz").is_file());
    assert!(has_triple(&layout, &id));
    assert_eq!(
        fs::read_to_string(layout.adjacency_path(&id)).expect("adjacency"),
        "3 3 3\n0 1\n0 2\n2 0\n"
    );

    assert_eq!(read_label(&layout.label_path(&id)).expect("label"), "2");
    assert_eq!(read_features(&layout.features_path(&id)).expect("features"), sample_cfg().features);
    assert_eq!(read_adjacency(&layout.adjacency_path(&id)).expect("adj"), sample_cfg().adjacency);

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn failed_write_leaves_no_partial_triple() {
    let dir = tempdir().expect("tempdir");
    let layout = ArtifactLayout::new(dir.path().join("does-not-exist"));
    let id = SampleId::new("s");
    let err = write_triple(&layout, &id, &sample_cfg(), "1").unwrap_err();
    assert!(matches!(err, ArtifactError::Io { .. }));
    assert!(!has_triple(&layout, &id));
}

#[test]
fn readers_reject_malformed_artifacts() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("x.adjacent.npz");

    fs::write(&path, "2 2 1\n0 5\n").expect("write");
    assert!(matches!(read_adjacency(&path), Err(ArtifactError::Malformed { .. })));
    fs::write(&path, "2 2 2\n0 1\n").expect("write");
    assert!(matches!(read_adjacency(&path), Err(ArtifactError::Malformed { .. })));
    fs::write(&path, "2 3 0\n").expect("write");
    assert!(matches!(read_adjacency(&path), Err(ArtifactError::Malformed { .. })));

    let features = dir.path().join("x.features.txt");
    fs::write(&features, "1 2\n3\n").expect("write");
    assert!(matches!(read_features(&features), Err(ArtifactError::Malformed { line: 2, .. })));

    let label = dir.path().join("x.label.txt");
    fs::write(&label, "\n").expect("write");
    assert!(read_label(&label).is_err());
    fs::write(&label, "1\n2\n").expect("write");
    assert!(read_label(&label).is_err());
}

#[test]
fn remove_triple_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let layout = ArtifactLayout::new(dir.path());
    let id = SampleId::new("s");
    write_triple(&layout, &id, &sample_cfg(), "1").expect("write");

    let first = remove_triple(&layout, &id);
    assert_eq!((first.removed, first.already_absent), (3, 0));
    let second = remove_triple(&layout, &id);
    assert_eq!((second.removed, second.already_absent), (0, 3));
    assert!(second.failed.is_empty());
}
