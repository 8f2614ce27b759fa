//! 批次划分
//!
//! 纯函数：相同输入和批次大小总是得到相同的批次序列。

use std::num::NonZeroUsize;

use crate::models::{Batch, MedicalImage};

/// 将有序影像集合切分为固定大小的有序批次
///
/// 第 `i` 批（0 开始）包含影像 `[i·b, min((i+1)·b, n))`，只有最后一批可能不满。
/// 空输入由调用方在调用前拒绝；空输入时这里返回空列表。
pub fn partition(run_id: &str, images: &[MedicalImage], batch_size: NonZeroUsize) -> Vec<Batch> {
    let chunks = images.chunks(batch_size.get());
    let total_batches = chunks.len() as u32;

    chunks
        .enumerate()
        .map(|(index, chunk)| {
            let batch_number = index as u32 + 1;
            Batch::new(
                format!("{}-batch-{}", run_id, batch_number),
                chunk.to_vec(),
                batch_number,
                total_batches,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchStatus;
    use chrono::Utc;

    fn images(n: usize) -> Vec<MedicalImage> {
        (0..n)
            .map(|i| {
                MedicalImage::new(
                    format!("img-{}", i),
                    format!("{}.png", i),
                    "image/png",
                    vec![1u8],
                    Utc::now(),
                )
            })
            .collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_partition_totality() {
        for n in 1..=45 {
            for b in [1, 2, 7, 20, 50] {
                let input = images(n);
                let batches = partition("run", &input, size(b));

                assert_eq!(batches.len(), n.div_ceil(b), "n={} b={}", n, b);
                assert!(batches.iter().all(|batch| !batch.images.is_empty()));
                assert!(batches.iter().all(|batch| batch.images.len() <= b));

                let flattened: Vec<String> = batches
                    .iter()
                    .flat_map(|batch| batch.images.iter().map(|img| img.id.clone()))
                    .collect();
                let original: Vec<String> = input.iter().map(|img| img.id.clone()).collect();
                assert_eq!(flattened, original);
            }
        }
    }

    #[test]
    fn test_numbering_and_initial_state() {
        let batches = partition("run-7", &images(45), size(20));
        let sizes: Vec<usize> = batches.iter().map(|b| b.images.len()).collect();
        assert_eq!(sizes, vec![20, 20, 5]);

        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.batch_number, i as u32 + 1);
            assert_eq!(batch.total_batches, 3);
            assert_eq!(batch.status(), BatchStatus::Pending);
        }
        assert_eq!(batches[2].id, "run-7-batch-3");
    }

    #[test]
    fn test_partition_is_deterministic() {
        let input = images(9);
        let first: Vec<String> = partition("r", &input, size(4)).into_iter().map(|b| b.id).collect();
        let second: Vec<String> = partition("r", &input, size(4)).into_iter().map(|b| b.id).collect();
        assert_eq!(first, second);
    }
}
