//! Firmware console call convention.
//!
//! A console call is a single `ecall` with the extension selector in `a7`,
//! the function selector in `a6` and the character in `a0`. Nothing the call
//! returns is inspected by the caller.

/// Extension selector for the console service (`a7`).
pub const EXT_CONSOLE: u64 = 0;
/// Function selector for "put one character" (`a6`).
pub const FN_CONSOLE_PUTCHAR: u64 = 1;

/// Register carrying the extension selector (x17, `a7`).
pub const EXT_REGISTER: usize = 17;
/// Register carrying the function selector (x16, `a6`).
pub const FN_REGISTER: usize = 16;
/// Register carrying the character and, on return, the error code (x10, `a0`).
pub const ARG_REGISTER: usize = 10;
/// Register carrying the returned value (x11, `a1`).
pub const VALUE_REGISTER: usize = 11;

/// Error code returned in `a0` by a serviced call.
pub const SBI_SUCCESS: u64 = 0;

/// True when the selector pair names the console putchar service.
pub const fn is_console_putchar(ext: u64, func: u64) -> bool {
    ext == EXT_CONSOLE && func == FN_CONSOLE_PUTCHAR
}
