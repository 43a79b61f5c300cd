use super::*;

#[test]
fn batch_accepts_uniform_vectors() {
    let batch = EmbeddingBatch::new(vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]], 2)
        .expect("uniform batch should validate");

    assert_eq!(batch.len(), 2);
    assert_eq!(batch.dimension(), 3);
    assert_eq!(batch.vectors()[1], vec![0.4, 0.5, 0.6]);
}

#[test]
fn batch_rejects_count_mismatch() {
    let result = EmbeddingBatch::new(vec![vec![0.1, 0.2]], 2);

    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[test]
fn batch_rejects_mixed_dimensions() {
    let result = EmbeddingBatch::new(vec![vec![0.1, 0.2], vec![0.3]], 2);

    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[test]
fn batch_rejects_empty_vectors() {
    let result = EmbeddingBatch::new(vec![Vec::new()], 1);

    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[test]
fn empty_batch() {
    let batch = EmbeddingBatch::new(Vec::new(), 0).expect("empty batch should validate");

    assert!(batch.is_empty());
    assert_eq!(batch.dimension(), 0);
    assert_eq!(batch, EmbeddingBatch::empty());
}

#[test]
fn single_vector_extraction() {
    let batch = EmbeddingBatch::new(vec![vec![1.0, 0.0]], 1).expect("should validate");
    assert_eq!(batch.into_single().expect("one vector"), vec![1.0, 0.0]);

    let batch = EmbeddingBatch::new(vec![vec![1.0], vec![2.0]], 2).expect("should validate");
    assert!(batch.into_single().is_err());

    assert!(EmbeddingBatch::empty().into_single().is_err());
}
