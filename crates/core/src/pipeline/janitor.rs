use tracing::{info, warn};

use crate::artifacts::{remove_triple, ArtifactLayout, RemovalReport};
use crate::model::SampleId;

/// Removes per-sample intermediates once the corpus is written.
pub struct ArtifactJanitor<'a> {
    layout: &'a ArtifactLayout,
}

impl<'a> ArtifactJanitor<'a> {
    pub fn new(layout: &'a ArtifactLayout) -> Self {
        Self { layout }
    }

    /// Best-effort removal of the triples of `ids`. Files that are already gone
    /// are counted as absent; other failures are reported and do not stop the
    /// sweep.
    pub fn sweep(&self, ids: &[SampleId]) -> RemovalReport {
        info!(
            samples = ids.len(),
            dir = %self.layout.root.display(),
            "removing temporary artifacts"
        );
        let mut report = RemovalReport::default();
        for id in ids {
            report.merge(remove_triple(self.layout, id));
        }
        for (path, reason) in &report.failed {
            warn!(path = %path.display(), "failed to remove artifact: {reason}");
        }
        info!(
            removed = report.removed,
            already_absent = report.already_absent,
            failed = report.failed.len(),
            "artifact cleanup finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sweep_counts_missing_files_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let id = SampleId::new("s1");
        fs::write(layout.features_path(&id), "1\n").unwrap();
        fs::write(layout.label_path(&id), "1\n").unwrap();

        let report = ArtifactJanitor::new(&layout).sweep(&[id.clone()]);
        assert_eq!(report.removed, 2);
        assert_eq!(report.already_absent, 1);
        assert!(report.failed.is_empty());
        assert!(!layout.features_path(&id).exists());

        let again = ArtifactJanitor::new(&layout).sweep(&[id]);
        assert_eq!(again.removed, 0);
        assert_eq!(again.already_absent, 3);
    }
}
