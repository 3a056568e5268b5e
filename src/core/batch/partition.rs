

use crate::core::error::{BulkOpsError, Result};


pub fn chunk_items<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<T>>> {
    if size == 0 {
        return Err(BulkOpsError::InvalidBatchSize(size));
    }

    Ok(items.chunks(size).map(<[T]>::to_vec).collect())
}


pub fn total_batches(len: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    len.div_ceil(size)
}


pub fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    if processed >= total {
        return 100;
    }
    // f64::round is half away from zero, matching the displayed percentages.
    ((processed as f64 / total as f64) * 100.0).round() as u8
}
