use crate::util::Address;
use std::io::{Error, Result};

/// Demand-zero mmap of an anonymous region, placed wherever the OS chooses.
/// The returned region is page aligned and reads as zero.
pub fn dzmmap_anywhere(size: usize) -> Result<Address> {
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_ANON | libc::MAP_PRIVATE | libc::MAP_NORESERVE;
    let ptr = unsafe { libc::mmap(std::ptr::null_mut(), size, prot, flags, -1, 0) };
    if ptr == libc::MAP_FAILED {
        Err(Error::last_os_error())
    } else {
        Ok(Address::from_mut_ptr(ptr))
    }
}

pub fn munmap(start: Address, size: usize) -> Result<()> {
    let result = unsafe { libc::munmap(start.to_mut_ptr(), size) };
    if result == -1 {
        Err(Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Zero a range of memory.
pub fn zero(start: Address, len: usize) {
    unsafe { std::ptr::write_bytes(start.to_mut_ptr::<u8>(), 0, len) }
}

/// Copy `len` bytes from `from` to `to`. The two ranges must not overlap.
///
/// # Safety
/// Both ranges must be mapped and the caller must own the destination range.
pub unsafe fn copy_nonoverlapping(from: Address, to: Address, len: usize) {
    debug_assert!(from + len <= to || to + len <= from);
    std::ptr::copy_nonoverlapping(from.to_ptr::<u8>(), to.to_mut_ptr::<u8>(), len)
}
