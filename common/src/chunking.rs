use crate::constants::{
    LARGE_CHUNK_SIZE, MEDIUM_CHUNK_SIZE, MEDIUM_FILE_LIMIT, SMALL_CHUNK_SIZE, SMALL_FILE_LIMIT,
};

/// Nominal chunk size for a file of `size_bytes`.
pub fn chunk_size_for(size_bytes: u64) -> u64 {
    if size_bytes < SMALL_FILE_LIMIT {
        SMALL_CHUNK_SIZE
    } else if size_bytes < MEDIUM_FILE_LIMIT {
        MEDIUM_CHUNK_SIZE
    } else {
        LARGE_CHUNK_SIZE
    }
}

/// Sizes of each chunk in order. Every chunk is `chunk_size` except possibly the last.
pub fn chunk_layout(size_bytes: u64, chunk_size: u64) -> Vec<u64> {
    if size_bytes == 0 || chunk_size == 0 {
        return Vec::new();
    }

    let count = size_bytes.div_ceil(chunk_size);
    (0..count)
        .map(|i| {
            let offset = i * chunk_size;
            chunk_size.min(size_bytes - offset)
        })
        .collect()
}
