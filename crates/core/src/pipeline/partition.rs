use super::PipelineError;

/// Split `items` into at most `workers` contiguous batches.
///
/// Every batch holds `items.len() / workers` items except the last, which also
/// takes the remainder. With fewer items than workers each item gets its own
/// batch; empty batches are never produced.
pub fn partition_batches<T>(items: &[T], workers: usize) -> Result<Vec<&[T]>, PipelineError> {
    if workers == 0 {
        return Err(PipelineError::InvalidWorkerCount);
    }
    if items.is_empty() {
        return Ok(Vec::new());
    }
    if items.len() < workers {
        return Ok(items.chunks(1).collect());
    }

    let size = items.len() / workers;
    let (head, tail) = items.split_at(size * (workers - 1));
    let mut batches: Vec<&[T]> = head.chunks(size).collect();
    batches.push(tail);
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(total: usize, workers: usize) -> Vec<usize> {
        let items: Vec<usize> = (0..total).collect();
        partition_batches(&items, workers).unwrap().iter().map(|b| b.len()).collect()
    }

    #[test]
    fn last_batch_absorbs_remainder() {
        assert_eq!(sizes(10, 3), vec![3, 3, 4]);
        assert_eq!(sizes(11, 4), vec![2, 2, 2, 5]);
        assert_eq!(sizes(9, 3), vec![3, 3, 3]);
    }

    #[test]
    fn single_worker_takes_everything() {
        assert_eq!(sizes(7, 1), vec![7]);
    }

    #[test]
    fn fewer_items_than_workers_yields_singletons() {
        assert_eq!(sizes(2, 5), vec![1, 1]);
        assert!(sizes(0, 3).is_empty());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = partition_batches(&[1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidWorkerCount));
    }
}
