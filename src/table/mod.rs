//! The shared lock table.
//!
//! The table is a flat array of 44-byte records:
//!
//! ```text
//! +--------------------------------------+------------------+
//! | identifier (36 bytes of text)        | status (u64, BE) |
//! +--------------------------------------+------------------+
//! ```
//!
//! A record's position (`slot * 44`) is its only address; there is no
//! separate index or free list on disk. Status `0` is free, `1` is held, and
//! anything larger is a lease deadline in Unix milliseconds. The table length
//! is always a multiple of 44 and the only compaction is truncation to zero
//! once every slot is free.
//!
//! Every read-modify-write of the table happens under the whole-table
//! advisory lock, expressed as a [`TableLock`] guard.

mod file;
mod memory;
mod record;
mod scan;
mod store;


// Re-export public API
pub use file::FileTable;
pub use memory::MemoryTable;
pub use record::{LockRecord, RECORD_LEN, STATUS_FREE, STATUS_HELD, decode_records, slot_offset};
pub use scan::TableScan;
pub use store::{TableLock, TableStore};
