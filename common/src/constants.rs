pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;
pub const GB: u64 = 1024 * MB;

// Chunking policy thresholds, evaluated on the total file size.
pub const SMALL_FILE_LIMIT: u64 = 10 * MB;
pub const MEDIUM_FILE_LIMIT: u64 = 100 * MB;

pub const SMALL_CHUNK_SIZE: u64 = 512 * KB;
pub const MEDIUM_CHUNK_SIZE: u64 = 2 * MB;
pub const LARGE_CHUNK_SIZE: u64 = 10 * MB;

// Upper bound on chunks in one transfer plan (about 1 TB at the largest chunk size).
pub const MAX_TRANSFER_CHUNKS: u64 = 100_000;

pub const MAX_MESSAGE_LEN: usize = 64 * 1024;
pub const MAX_DATAGRAM_LEN: usize = 512;
