use core::{alloc::Layout, ptr::NonNull};

use crate::error::AllocError;

/// A pluggable pair of operations that acquire, resize and release the storage of a container.
///
/// Every call receives the container's context `C` unchanged. The container never looks at the
/// context; hooks may use it to tag, pool or account for their allocations.
///
/// # Safety
///
/// Implementations must uphold the contracts documented on each method. Containers rely on
/// them to never read outside the block or lose its contents.
pub unsafe trait Allocator<C: ?Sized = ()> {
    /// Grows or shrinks a block, or allocates a new one when `ptr` is `None`.
    ///
    /// On success, the returned block holds at least `new.size()` bytes aligned to
    /// `new.align()`, and its first `min(old.size(), new.size())` bytes equal the original
    /// contents. The bytes in `[old.size(), new.size())` should be zeroed. Containers do not
    /// rely on this, but the hooks in this crate all do it.
    ///
    /// On failure, the original block is untouched and still owned by the caller.
    ///
    /// # Safety
    ///
    /// - `ptr` is `None` iff `old.size() == 0`, otherwise it was returned by this allocator
    ///   for a block of layout `old` and has not been released.
    /// - `new.size() > 0` and `new.align() == old.align()`.
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old: Layout,
        new: Layout,
        context: &C,
    ) -> Result<NonNull<u8>, AllocError>;

    /// Takes back a block.
    ///
    /// # Safety
    ///
    /// `ptr` was returned by this allocator for a block of `layout`, and is released at most once.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout, context: &C);
}

unsafe impl<A, C> Allocator<C> for &A
where
    A: Allocator<C> + ?Sized,
    C: ?Sized,
{
    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old: Layout,
        new: Layout,
        context: &C,
    ) -> Result<NonNull<u8>, AllocError> {
        (**self).reallocate(ptr, old, new, context)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout, context: &C) {
        (**self).release(ptr, layout, context)
    }
}
