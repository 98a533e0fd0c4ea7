use core::{alloc::Layout, ptr::NonNull};
use std::alloc;

use bytesize::ByteSize;
use log::error;

use crate::{error::AllocError, traits::Allocator};

/// The platform allocator.
///
/// Grown regions are zeroed. Allocation failure is treated as fatal: it is logged and then
/// escalated through [`std::alloc::handle_alloc_error`]. Use [`TryGlobal`] to get the failure back
/// as an error instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

/// The platform allocator, reporting allocation failure as [`AllocError::OutOfMemory`].
///
/// Grown regions are zeroed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TryGlobal;

unsafe fn reallocate_zeroed(
    ptr: Option<NonNull<u8>>,
    old: Layout,
    new: Layout,
) -> Result<NonNull<u8>, AllocError> {
    debug_assert!(new.size() != 0);
    let raw = match ptr {
        None => alloc::alloc_zeroed(new),
        Some(ptr) => {
            let raw = alloc::realloc(ptr.as_ptr(), old, new.size());
            if !raw.is_null() && new.size() > old.size() {
                raw.add(old.size()).write_bytes(0, new.size() - old.size());
            }
            raw
        }
    };
    NonNull::new(raw).ok_or(AllocError::OutOfMemory)
}

unsafe impl<C: ?Sized> Allocator<C> for Global {
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old: Layout,
        new: Layout,
        _context: &C,
    ) -> Result<NonNull<u8>, AllocError> {
        match reallocate_zeroed(ptr, old, new) {
            Ok(ptr) => Ok(ptr),
            Err(_) => {
                error!(
                    "failed to reallocate from {} to {}",
                    ByteSize::b(old.size() as u64).to_string_as(true),
                    ByteSize::b(new.size() as u64).to_string_as(true)
                );
                alloc::handle_alloc_error(new)
            }
        }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout, _context: &C) {
        alloc::dealloc(ptr.as_ptr(), layout);
    }
}

unsafe impl<C: ?Sized> Allocator<C> for TryGlobal {
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old: Layout,
        new: Layout,
        _context: &C,
    ) -> Result<NonNull<u8>, AllocError> {
        reallocate_zeroed(ptr, old, new)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout, _context: &C) {
        alloc::dealloc(ptr.as_ptr(), layout);
    }
}
