/// log2 of the number of bytes in a megabyte
pub const LOG_BYTES_IN_MBYTE: u8 = 20;
/// The number of bytes in a megabyte
pub const BYTES_IN_MBYTE: usize = 1 << LOG_BYTES_IN_MBYTE;

/// log2 of the number of bytes in a kilobyte
pub const LOG_BYTES_IN_KBYTE: u8 = 10;
/// The number of bytes in a kilobyte
pub const BYTES_IN_KBYTE: usize = 1 << LOG_BYTES_IN_KBYTE;

#[cfg(target_pointer_width = "32")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 2;
#[cfg(target_pointer_width = "64")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 3;
/// The number of bytes in an address
pub const BYTES_IN_ADDRESS: usize = 1 << LOG_BYTES_IN_ADDRESS;

/// log2 of the number of bytes in a word
pub const LOG_BYTES_IN_WORD: u8 = LOG_BYTES_IN_ADDRESS;
/// The number of bytes in a word
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

/// log2 of the number of bytes in a page
pub const LOG_BYTES_IN_PAGE: u8 = 12;
/// The number of bytes in a page
pub const BYTES_IN_PAGE: usize = 1 << LOG_BYTES_IN_PAGE;

/// log2 of the minimal object size in bytes. Every object carries at least its header word.
pub const LOG_MIN_OBJECT_SIZE: u8 = LOG_BYTES_IN_WORD;
/// The minimal object size in bytes
pub const MIN_OBJECT_SIZE: usize = 1 << LOG_MIN_OBJECT_SIZE;

/// Default log2 of the card stride. A card covers 512 bytes of heap.
pub const DEFAULT_LOG_BYTES_IN_CARD: u8 = 9;
/// The smallest card stride we accept (64 bytes).
pub const MIN_LOG_BYTES_IN_CARD: u8 = 6;
/// The largest card stride we accept (one page).
pub const MAX_LOG_BYTES_IN_CARD: u8 = LOG_BYTES_IN_PAGE;

// Cards never straddle a page boundary, and a side-table chunk (one card) always holds a whole
// number of words.
static_assertions::const_assert!(MAX_LOG_BYTES_IN_CARD <= LOG_BYTES_IN_PAGE);
static_assertions::const_assert!(MIN_LOG_BYTES_IN_CARD > LOG_BYTES_IN_WORD);
