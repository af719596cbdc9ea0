use acfg_core::pipeline::{partition_batches, PipelineError};

#[test]
fn batches_concatenate_back_to_the_input() {
    for total in 0..40usize {
        let items: Vec<usize> = (0..total).collect();
        for workers in 1..12usize {
            let batches = partition_batches(&items, workers).expect("partition");
            assert!(batches.len() <= workers);
            assert_eq!(batches.len(), total.min(workers));
            assert!(batches.iter().all(|b| !b.is_empty()));
            let joined: Vec<usize> = batches.concat();
            assert_eq!(joined, items, "total={total} workers={workers}");
        }
    }
}

#[test]
fn ten_samples_over_three_workers() {
    let ids: Vec<String> = (0..10).map(|i| format!("id{i}")).collect();
    let batches = partition_batches(&ids, 3).expect("partition");
    let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![3, 3, 4]);
    assert_eq!(batches[0][0], "id0");
    assert_eq!(batches[2][3], "id9");
}

#[test]
fn zero_workers_rejected() {
    let items = vec![1];
    assert!(matches!(partition_batches(&items, 0), Err(PipelineError::InvalidWorkerCount)));
}
