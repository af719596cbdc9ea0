//! Text codec for the aggregated corpus file.
//!
//! ```text
//! <S>
//! <nodeCount> <label>
//! 1 <degree> <neighbor>... <feature>...
//! ...
//! ```
//! Line 1 is the number of samples. Each sample is a header line followed by
//! exactly `nodeCount` node lines. The leading `1` on a node line is a fixed tag.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::model::{AdjacencyRelation, FeatureMatrix};

/// Fixed tag opening every node line.
pub const NODE_TAG: u32 = 1;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Failed to read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed corpus at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub neighbors: Vec<usize>,
    pub features: Vec<i64>,
}

/// One sample's block in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphRecord {
    pub label: i64,
    pub nodes: Vec<NodeRecord>,
}

impl GraphRecord {
    /// Node `i` gets the `i`-th feature row and the targets of edges leaving `i`
    /// in ascending order.
    pub fn from_parts(label: i64, features: FeatureMatrix, adjacency: &AdjacencyRelation) -> Self {
        let neighbors = adjacency.neighbor_lists(features.node_count());
        let nodes = features
            .into_rows()
            .into_iter()
            .zip(neighbors)
            .map(|(features, neighbors)| NodeRecord { neighbors, features })
            .collect();
        Self { label, nodes }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.neighbors.len()).sum()
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{} {}", self.nodes.len(), self.label)?;
        for node in &self.nodes {
            write!(out, "{NODE_TAG} {}", node.neighbors.len())?;
            for n in &node.neighbors {
                write!(out, " {n}")?;
            }
            for f in &node.features {
                write!(out, " {f}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

pub fn write_corpus<W: Write>(out: &mut W, records: &[GraphRecord]) -> io::Result<()> {
    writeln!(out, "{}", records.len())?;
    for record in records {
        record.write_to(out)?;
    }
    Ok(())
}

pub fn render_corpus(records: &[GraphRecord]) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_corpus(&mut buf, records);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn read_corpus(path: &Path) -> Result<Vec<GraphRecord>, CorpusError> {
    let body = fs::read_to_string(path)
        .map_err(|source| CorpusError::Io { path: path.to_path_buf(), source })?;
    parse_corpus(&body)
}

/// Parse and validate a corpus: counts must agree, every neighbor must be a
/// node of its own sample, and nothing may follow the last sample.
pub fn parse_corpus(body: &str) -> Result<Vec<GraphRecord>, CorpusError> {
    let mut lines = body.lines().enumerate().map(|(idx, line)| (idx + 1, line));
    let mut next = |what: &str| {
        lines
            .next()
            .ok_or_else(|| CorpusError::Malformed { line: 0, reason: format!("missing {what}") })
    };

    let (line, head) = next("sample count")?;
    let count: usize = parse_token(head.trim(), line)?;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let (line, header) = next("sample header")?;
        let mut tokens = header.split_whitespace();
        let node_count: usize = parse_token(tokens.next().unwrap_or_default(), line)?;
        let label: i64 = parse_token(tokens.next().unwrap_or_default(), line)?;
        if tokens.next().is_some() {
            return Err(malformed(line, "header has more than two fields"));
        }

        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let (line, text) = next("node line")?;
            nodes.push(parse_node(text, line, node_count)?);
        }
        records.push(GraphRecord { label, nodes });
    }

    if let Some((line, _)) = lines.find(|(_, text)| !text.trim().is_empty()) {
        return Err(malformed(line, "content after the last sample"));
    }
    Ok(records)
}

fn parse_node(text: &str, line: usize, node_count: usize) -> Result<NodeRecord, CorpusError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let (tag, degree) = match tokens.as_slice() {
        [tag, degree, ..] => (*tag, *degree),
        _ => return Err(malformed(line, "node line needs a tag and a degree")),
    };
    if parse_token::<u32>(tag, line)? != NODE_TAG {
        return Err(malformed(line, format!("node tag must be {NODE_TAG}")));
    }
    let degree: usize = parse_token(degree, line)?;
    let rest = &tokens[2..];
    if rest.len() < degree {
        return Err(malformed(line, format!("degree {degree} but only {} values", rest.len())));
    }

    let neighbors = rest[..degree]
        .iter()
        .map(|tok| parse_token::<usize>(tok, line))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(bad) = neighbors.iter().find(|n| **n >= node_count) {
        return Err(malformed(line, format!("neighbor {bad} outside 0..{node_count}")));
    }
    let features = rest[degree..]
        .iter()
        .map(|tok| parse_token::<i64>(tok, line))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NodeRecord { neighbors, features })
}

fn parse_token<T>(tok: &str, line: usize) -> Result<T, CorpusError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    tok.parse::<T>().map_err(|e| malformed(line, format!("bad integer '{tok}': {e}")))
}

fn malformed(line: usize, reason: impl Into<String>) -> CorpusError {
    CorpusError::Malformed { line, reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_record() -> GraphRecord {
        let features = FeatureMatrix::new(vec![vec![5, 6], vec![7, 8]]);
        let adjacency = AdjacencyRelation::from_edges(2, [(0, 1)]).unwrap();
        GraphRecord::from_parts(1, features, &adjacency)
    }

    #[test]
    fn node_lines_carry_tag_degree_neighbors_and_features() {
        let text = render_corpus(&[two_node_record()]);
        assert_eq!(text, "1\n2 1\n1 1 1 5 6\n1 0 7 8\n");
    }

    #[test]
    fn parses_what_it_writes() {
        let record = two_node_record();
        let parsed = parse_corpus(&render_corpus(&[record.clone()])).unwrap();
        assert_eq!(parsed, vec![record]);
    }

    #[test]
    fn empty_corpus_is_a_single_zero_line() {
        assert_eq!(render_corpus(&[]), "0\n");
        assert!(parse_corpus("0\n").unwrap().is_empty());
    }

    #[test]
    fn rejects_out_of_range_neighbor() {
        let err = parse_corpus("1\n1 0\n1 1 3 9\n").unwrap_err();
        assert!(matches!(err, CorpusError::Malformed { line: 3, .. }), "{err}");
    }

    #[test]
    fn rejects_short_node_list_and_trailing_content() {
        assert!(parse_corpus("1\n2 0\n1 0 4\n").is_err());
        assert!(parse_corpus("1\n1 0\n1 0 4\n1 0 4\n").is_err());
        assert!(parse_corpus("2\n1 0\n1 0 4\n").is_err());
    }

    #[test]
    fn rejects_wrong_tag() {
        assert!(parse_corpus("1\n1 0\n2 0 4\n").is_err());
    }
}
