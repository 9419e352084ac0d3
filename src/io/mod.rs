mod block_cache;
mod file_reader;
mod range_reader;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};
pub use file_reader::FileRangeReader;
pub use range_reader::{MemoryRangeReader, RangeReader};
