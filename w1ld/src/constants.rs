//! Constant values of the w1ld machine.

/// Machine word.
///
/// Integers, pointers and instruction words are all one word wide.
pub type Word = i64;

/// Size of a machine word in bytes, which is also `sizeof(int)`
/// and the size of every pointer type.
pub const WORD_SIZE: usize = std::mem::size_of::<Word>();

/// Size of a `char` in bytes.
pub const CHAR_SIZE: usize = 1;

/// Default capacity in bytes of each segment (text, data, heap and stack).
///
/// Text capacity in instruction words is this divided by [`WORD_SIZE`].
pub const POOL_SIZE: usize = 256 * 1024;

/// Index of an instruction word in the text segment.
pub type TextAddr = usize;

/// Byte address into VM memory. Data, heap and stack share one address space.
pub type MemAddr = usize;

/// Text address of the startup stub (`PUSH; EXIT`) that `main` returns into.
pub const EXIT_STUB: TextAddr = 0;

/// The first data word is never handed out, so address 0 stays null.
pub const DATA_START: MemAddr = WORD_SIZE;

/// Maximum number of arguments forwarded by `printf`, including the format.
pub const PRINTF_MAX_ARGS: usize = 6;

/// First descriptor handed out by `open`. 0, 1 and 2 are the standard streams.
pub const FIRST_FD: Word = 3;
