use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{ArtifactError, ArtifactLayout};
use crate::model::{AdjacencyRelation, AttributedCfg, FeatureMatrix, SampleId};
use crate::util::staging_path;

/// Outcome of removing one sample's artifact triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub removed: usize,
    pub already_absent: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl RemovalReport {
    pub fn merge(&mut self, other: RemovalReport) {
        self.removed += other.removed;
        self.already_absent += other.already_absent;
        self.failed.extend(other.failed);
    }
}

pub fn render_features(features: &FeatureMatrix) -> String {
    let mut out = String::new();
    for row in features.rows() {
        let line: Vec<String> = row.iter().map(i64::to_string).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

pub fn render_adjacency(adjacency: &AdjacencyRelation) -> String {
    let n = adjacency.node_count();
    let mut out = format!("{n} {n} {}\n", adjacency.edge_count());
    for (row, col) in adjacency.edges() {
        out.push_str(&format!("{row} {col}\n"));
    }
    out
}

/// Persist the feature matrix, label, and adjacency for `id`.
///
/// All three files are staged first and then renamed into place. If anything
/// fails, every staged or already renamed file of this sample is removed again.
pub fn write_triple(
    layout: &ArtifactLayout,
    id: &SampleId,
    cfg: &AttributedCfg,
    label: &str,
) -> Result<(), ArtifactError> {
    let [features_path, label_path, adjacency_path] = layout.triple_paths(id);
    let bodies = [
        (features_path, render_features(&cfg.features)),
        (label_path, format!("{}\n", label.trim())),
        (adjacency_path, render_adjacency(&cfg.adjacency)),
    ];

    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(bodies.len());
    for (target, body) in &bodies {
        let tmp = staging_path(target);
        if let Err(source) = fs::write(&tmp, body) {
            let _ = fs::remove_file(&tmp);
            discard(staged.iter().map(|(tmp, _)| tmp.as_path()));
            return Err(ArtifactError::io(tmp, source));
        }
        staged.push((tmp, target.as_path()));
    }

    for (idx, (tmp, target)) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(tmp, target) {
            discard(staged[..idx].iter().map(|(_, target)| *target));
            discard(staged[idx..].iter().map(|(tmp, _)| tmp.as_path()));
            return Err(ArtifactError::io(*target, source));
        }
    }
    Ok(())
}

fn discard<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

/// True when all three artifacts of `id` exist.
pub fn has_triple(layout: &ArtifactLayout, id: &SampleId) -> bool {
    layout.triple_paths(id).iter().all(|p| p.is_file())
}

pub fn read_features(path: &Path) -> Result<FeatureMatrix, ArtifactError> {
    let body = fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
    let mut rows = Vec::new();
    let mut width: Option<usize> = None;
    for (idx, line) in body.lines().enumerate() {
        let row = line
            .split_whitespace()
            .map(|tok| tok.parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ArtifactError::malformed(path, idx + 1, format!("bad feature: {e}")))?;
        match width {
            Some(w) if w != row.len() => {
                return Err(ArtifactError::malformed(
                    path,
                    idx + 1,
                    format!("row has {} columns, expected {w}", row.len()),
                ));
            }
            _ => width = Some(row.len()),
        }
        rows.push(row);
    }
    Ok(FeatureMatrix::new(rows))
}

pub fn read_label(path: &Path) -> Result<String, ArtifactError> {
    let body = fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
    let mut values = body.lines().map(str::trim).filter(|l| !l.is_empty());
    match (values.next(), values.next()) {
        (Some(label), None) => Ok(label.to_string()),
        (None, _) => Err(ArtifactError::malformed(path, 1, "missing label value")),
        (Some(_), Some(_)) => Err(ArtifactError::malformed(path, 2, "expected a single label")),
    }
}

pub fn read_adjacency(path: &Path) -> Result<AdjacencyRelation, ArtifactError> {
    let body = fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
    let mut lines = body.lines().enumerate();
    let (_, header) = lines.next().ok_or_else(|| ArtifactError::malformed(path, 1, "empty"))?;
    let shape = parse_usizes(header).map_err(|r| ArtifactError::malformed(path, 1, r))?;
    let [rows, cols, nnz] = shape[..] else {
        return Err(ArtifactError::malformed(path, 1, "expected `rows cols nnz`"));
    };
    if rows != cols {
        return Err(ArtifactError::malformed(path, 1, format!("non-square shape {rows}x{cols}")));
    }

    let mut adjacency = AdjacencyRelation::new(rows);
    let mut seen = 0usize;
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let entry = parse_usizes(line).map_err(|r| ArtifactError::malformed(path, idx + 1, r))?;
        let [row, col] = entry[..] else {
            return Err(ArtifactError::malformed(path, idx + 1, "expected `row col`"));
        };
        adjacency
            .insert(row, col)
            .map_err(|e| ArtifactError::malformed(path, idx + 1, e.to_string()))?;
        seen += 1;
    }
    if seen != nnz {
        return Err(ArtifactError::malformed(
            path,
            1,
            format!("declared {nnz} entries but found {seen}"),
        ));
    }
    Ok(adjacency)
}

fn parse_usizes(line: &str) -> Result<Vec<usize>, String> {
    line.split_whitespace()
        .map(|tok| tok.parse::<usize>().map_err(|e| format!("bad integer '{tok}': {e}")))
        .collect()
}

/// Delete the artifact triple of `id`. Missing files are counted, not reported.
pub fn remove_triple(layout: &ArtifactLayout, id: &SampleId) -> RemovalReport {
    let mut report = RemovalReport::default();
    for path in layout.triple_paths(id) {
        match fs::remove_file(&path) {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => report.already_absent += 1,
            Err(e) => report.failed.push((path, e.to_string())),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_coordinate_listing_sorted() {
        let adj = AdjacencyRelation::from_edges(3, [(2, 0), (0, 1)]).unwrap();
        assert_eq!(render_adjacency(&adj), "3 3 2\n0 1\n2 0\n");
    }

    #[test]
    fn renders_feature_rows() {
        let features = FeatureMatrix::new(vec![vec![1, -2, 3], vec![0, 0, 7]]);
        assert_eq!(render_features(&features), "1 -2 3\n0 0 7\n");
    }

    #[test]
    fn parse_usizes_reports_bad_token() {
        let err = parse_usizes("1 x").unwrap_err();
        assert!(err.contains("'x'"));
    }
}
