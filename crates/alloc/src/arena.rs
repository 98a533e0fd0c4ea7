use core::{alloc::Layout, cell::RefCell, ptr::NonNull};
use std::alloc;

use bitvec::{order::Lsb0, slice::BitSlice, vec::BitVec};
use bytesize::ByteSize;
use log::{error, trace};

use crate::{error::AllocError, traits::Allocator};

/// The smallest page size an [`Arena`] accepts.
pub const MIN_PAGE_SIZE: usize = 16;

/// Returns the index of the first run of `pages` free pages.
fn find_run(used: &BitSlice<usize, Lsb0>, pages: usize) -> Option<usize> {
    let mut start = 0;
    while start + pages <= used.len() {
        match used[start..start + pages].last_one() {
            // skip past the last used page in the window
            Some(i) => start += i + 1,
            None => return Some(start),
        }
    }
    None
}

/// A non-global allocator that hands out runs of fixed-size pages from one contiguous region.
///
/// Runs can be individually freed and reused. A run shrinks in place, and grows in place when the
/// pages right behind it are free. Otherwise it moves.
///
/// Implements [`Allocator`] for any context, so a set of containers can share one region by
/// holding `&Arena`.
pub struct Arena {
    base: NonNull<u8>,
    layout: Layout,
    page_size: usize,
    page_count: usize,
    // 1 bit per page, guards against double-frees
    used: RefCell<BitVec<usize, Lsb0>>,
}

impl Arena {
    /// Constructs a new `Arena` with the specified page size and page count.
    ///
    /// # Panics
    ///
    /// Panics if
    /// - `page_size` is not a power of 2
    /// - `page_size` is smaller than [`MIN_PAGE_SIZE`]
    /// - `page_count` is zero
    /// - `page_size` * `page_count` exceeds `isize::MAX` bytes
    pub fn new(page_size: usize, page_count: usize) -> Self {
        assert!(page_size.is_power_of_two());
        assert!(page_size >= MIN_PAGE_SIZE);
        assert!(page_count > 0);
        let layout = page_size
            .checked_mul(page_count)
            .and_then(|size| Layout::from_size_align(size, page_size).ok())
            .unwrap_or_else(|| panic!("{page_count} pages of {page_size} B exceed isize::MAX"));

        // SAFETY: layout has a non-zero size
        let base = unsafe { alloc::alloc_zeroed(layout) };
        let Some(base) = NonNull::new(base) else {
            alloc::handle_alloc_error(layout)
        };

        Self {
            base,
            layout,
            page_size,
            page_count,
            used: RefCell::new(BitVec::repeat(false, page_count)),
        }
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Returns the number of pages currently handed out.
    pub fn used_pages(&self) -> usize {
        self.used.borrow().count_ones()
    }

    pub fn free_pages(&self) -> usize {
        self.page_count - self.used_pages()
    }

    /// Returns `true` if the allocator contains the pointer address.
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start && addr - start < self.layout.size()
    }

    /// Allocates memory.
    ///
    /// Returns a pointer to a zeroed run of pages that meets the size and alignment required by
    /// `layout`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the alignment exceeds the page size, if the request exceeds the whole
    /// region, or if no run of free pages is long enough.
    pub fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        assert!(layout.size() != 0, "we aren't ready to handle zero-sized requests");
        if layout.align() > self.page_size {
            return Err(AllocError::AlignmentTooLarge);
        }

        let pages = self.pages_for(layout.size());
        if pages > self.page_count {
            error!(
                "size requested is larger than the arena: {} > {}",
                ByteSize::b(layout.size() as u64).to_string_as(true),
                ByteSize::b(self.layout.size() as u64).to_string_as(true)
            );
            return Err(AllocError::RequestTooLarge);
        }

        let start = {
            let mut used = self.used.borrow_mut();
            let start = find_run(&used, pages).ok_or(AllocError::OutOfMemory)?;
            used[start..start + pages].fill(true);
            start
        };

        let ptr = self.page_ptr(start);
        // SAFETY: the run spans at least `layout.size()` bytes inside the region
        unsafe { ptr.as_ptr().write_bytes(0, layout.size()) };
        trace!("allocated pages {}..{}", start, start + pages);
        Ok(ptr)
    }

    /// Frees allocated memory.
    ///
    /// `size` must be the size the block was allocated (or last reallocated) with.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the pointer is invalid or any of its pages are not in use.
    pub fn deallocate(&self, ptr: NonNull<u8>, size: usize) -> Result<(), AllocError> {
        let start = self.page_of(ptr)?;
        let pages = self.pages_for(size).max(1);
        if start + pages > self.page_count {
            return Err(AllocError::PointerOutsideRange);
        }

        let mut used = self.used.borrow_mut();
        let run = &mut used[start..start + pages];
        if !run.all() {
            return Err(AllocError::BlockAlreadyFree);
        }
        run.fill(false);
        trace!("freed pages {}..{}", start, start + pages);
        Ok(())
    }

    /// Reallocates allocated memory.
    ///
    /// Shrinking frees the trailing pages and returns the same pointer. Growing claims the pages
    /// right behind the run if they are free, otherwise it allocates a new run, copies `old_size`
    /// bytes over and frees the old run. Either way, bytes in `[old_size, new_layout.size())`
    /// are zeroed.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the new layout cannot be satisfied, the pointer is invalid, or the
    /// pointee is already free.
    ///
    /// If `ptr` was valid, its pointee's contents remain unaltered.
    pub fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_layout: Layout,
    ) -> Result<NonNull<u8>, AllocError> {
        let new_size = new_layout.size();
        assert!(new_size != 0, "we aren't ready to handle zero-sized requests");
        if new_layout.align() > self.page_size {
            return Err(AllocError::AlignmentTooLarge);
        }

        let start = self.page_of(ptr)?;
        let old_pages = self.pages_for(old_size).max(1);
        let new_pages = self.pages_for(new_size);
        if start + old_pages > self.page_count {
            return Err(AllocError::PointerOutsideRange);
        }
        if new_pages > self.page_count {
            return Err(AllocError::RequestTooLarge);
        }

        {
            let mut used = self.used.borrow_mut();
            if !used[start..start + old_pages].all() {
                return Err(AllocError::BlockAlreadyFree);
            }

            if new_pages <= old_pages {
                used[start + new_pages..start + old_pages].fill(false);
                drop(used);
                // SAFETY: `[old_size, new_size)` lies inside the run that was kept
                unsafe { zero_tail(ptr, old_size, new_size) };
                return Ok(ptr);
            }

            let end = start + new_pages;
            if end <= self.page_count && used[start + old_pages..end].not_any() {
                used[start + old_pages..end].fill(true);
                drop(used);
                trace!("grew pages {}..{} in place to {}", start, start + old_pages, end);
                // SAFETY: the run now spans `new_pages` pages
                unsafe { zero_tail(ptr, old_size, new_size) };
                return Ok(ptr);
            }
        }

        // the new run comes back zeroed, so only the old contents need copying
        let new_ptr = self.allocate(new_layout)?;
        // SAFETY: runs never overlap, both span at least `old_size` bytes
        unsafe {
            new_ptr
                .as_ptr()
                .copy_from_nonoverlapping(ptr.as_ptr(), old_size.min(new_size));
        }
        self.used.borrow_mut()[start..start + old_pages].fill(false);
        Ok(new_ptr)
    }

    #[inline]
    fn pages_for(&self, bytes: usize) -> usize {
        bytes.div_ceil(self.page_size)
    }

    /// Returns the index of the page that `ptr` points to the start of.
    fn page_of(&self, ptr: NonNull<u8>) -> Result<usize, AllocError> {
        if !self.contains(ptr.as_ptr()) {
            return Err(AllocError::PointerOutsideRange);
        }
        let addr = ptr.as_ptr() as usize - self.base.as_ptr() as usize;
        if addr & (self.page_size - 1) != 0 {
            return Err(AllocError::PointerNotAligned);
        }
        Ok(addr >> self.page_size.trailing_zeros())
    }

    #[inline]
    fn page_ptr(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index < self.page_count);
        // SAFETY: index is in bounds, so the result stays inside the region
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(index * self.page_size)) }
    }
}

/// Zeroes `[from, to)` relative to `ptr`, if the range is non-empty.
unsafe fn zero_tail(ptr: NonNull<u8>, from: usize, to: usize) {
    if to > from {
        ptr.as_ptr().add(from).write_bytes(0, to - from);
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let used = self.used_pages();
        if used != 0 {
            error!("arena dropped with {} pages still in use", used);
        }
        // SAFETY: allocated in `new` with this layout
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}

unsafe impl<C: ?Sized> Allocator<C> for Arena {
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old: Layout,
        new: Layout,
        _context: &C,
    ) -> Result<NonNull<u8>, AllocError> {
        match ptr {
            None => self.allocate(new),
            Some(ptr) => Arena::reallocate(self, ptr, old.size(), new),
        }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout, _context: &C) {
        if let Err(err) = self.deallocate(ptr, layout.size()) {
            error!(
                "failed to release {} block: {}",
                ByteSize::b(layout.size() as u64).to_string_as(true),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(size: usize) -> Layout {
        Layout::from_size_align(size, 8).unwrap()
    }

    unsafe fn read<'a>(ptr: NonNull<u8>, len: usize) -> &'a [u8] {
        core::slice::from_raw_parts(ptr.as_ptr(), len)
    }

    #[test]
    #[should_panic]
    fn page_size_must_be_a_power_of_two() {
        Arena::new(48, 4);
    }

    #[test]
    #[should_panic]
    fn page_size_has_a_minimum() {
        Arena::new(8, 4);
    }

    #[test]
    fn allocations_are_zeroed_and_disjoint() {
        let arena = Arena::new(64, 8);
        let a = arena.allocate(bytes(100)).unwrap();
        let b = arena.allocate(bytes(10)).unwrap();
        assert_eq!(arena.used_pages(), 3);
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 128);
        unsafe {
            assert!(read(a, 100).iter().all(|&x| x == 0));
            assert!(read(b, 10).iter().all(|&x| x == 0));
        }
        arena.deallocate(a, 100).unwrap();
        arena.deallocate(b, 10).unwrap();
        assert_eq!(arena.free_pages(), 8);
    }

    #[test]
    fn freed_pages_are_reused_and_rezeroed() {
        let arena = Arena::new(32, 4);
        let a = arena.allocate(bytes(32)).unwrap();
        unsafe { a.as_ptr().write_bytes(0xFF, 32) };
        arena.deallocate(a, 32).unwrap();

        let b = arena.allocate(bytes(32)).unwrap();
        assert_eq!(a, b);
        unsafe { assert!(read(b, 32).iter().all(|&x| x == 0)) };
        arena.deallocate(b, 32).unwrap();
    }

    #[test]
    fn double_free_is_detected() {
        let arena = Arena::new(32, 4);
        let a = arena.allocate(bytes(16)).unwrap();
        arena.deallocate(a, 16).unwrap();
        assert_eq!(arena.deallocate(a, 16), Err(AllocError::BlockAlreadyFree));
    }

    #[test]
    fn foreign_and_misaligned_pointers_are_rejected() {
        let arena = Arena::new(32, 4);
        let a = arena.allocate(bytes(64)).unwrap();
        let inside = unsafe { NonNull::new_unchecked(a.as_ptr().add(3)) };
        assert_eq!(arena.deallocate(inside, 8), Err(AllocError::PointerNotAligned));

        let mut local = 0u8;
        let outside = NonNull::from(&mut local);
        assert_eq!(arena.deallocate(outside, 1), Err(AllocError::PointerOutsideRange));
        arena.deallocate(a, 64).unwrap();
    }

    #[test]
    fn exhaustion_and_oversized_requests() {
        let arena = Arena::new(16, 4);
        assert_eq!(arena.allocate(bytes(65)), Err(AllocError::RequestTooLarge));
        assert_eq!(
            arena.allocate(Layout::from_size_align(16, 32).unwrap()),
            Err(AllocError::AlignmentTooLarge)
        );

        let a = arena.allocate(bytes(48)).unwrap();
        assert_eq!(arena.allocate(bytes(32)), Err(AllocError::OutOfMemory));
        let b = arena.allocate(bytes(16)).unwrap();
        arena.deallocate(a, 48).unwrap();
        arena.deallocate(b, 16).unwrap();
    }

    #[test]
    fn grows_in_place_when_the_next_pages_are_free() {
        let arena = Arena::new(32, 8);
        let a = arena.allocate(bytes(20)).unwrap();
        unsafe { a.as_ptr().write_bytes(7, 20) };

        let grown = arena.reallocate(a, 20, bytes(90)).unwrap();
        assert_eq!(grown, a);
        assert_eq!(arena.used_pages(), 3);
        unsafe {
            let data = read(grown, 90);
            assert!(data[..20].iter().all(|&x| x == 7));
            assert!(data[20..].iter().all(|&x| x == 0));
        }
        arena.deallocate(grown, 90).unwrap();
    }

    #[test]
    fn moves_when_blocked() {
        let arena = Arena::new(32, 8);
        let a = arena.allocate(bytes(32)).unwrap();
        let b = arena.allocate(bytes(32)).unwrap();
        unsafe { a.as_ptr().write_bytes(9, 32) };

        let moved = arena.reallocate(a, 32, bytes(64)).unwrap();
        assert_ne!(moved, a);
        assert_eq!(arena.used_pages(), 3);
        unsafe {
            let data = read(moved, 64);
            assert!(data[..32].iter().all(|&x| x == 9));
            assert!(data[32..].iter().all(|&x| x == 0));
        }

        // the old run is free again
        let c = arena.allocate(bytes(32)).unwrap();
        assert_eq!(c, a);
        for (ptr, size) in [(b, 32), (c, 32), (moved, 64)] {
            arena.deallocate(ptr, size).unwrap();
        }
    }

    #[test]
    fn shrinking_releases_trailing_pages() {
        let arena = Arena::new(16, 8);
        let a = arena.allocate(bytes(64)).unwrap();
        unsafe { a.as_ptr().write_bytes(1, 64) };

        let shrunk = arena.reallocate(a, 64, bytes(20)).unwrap();
        assert_eq!(shrunk, a);
        assert_eq!(arena.used_pages(), 2);
        unsafe { assert!(read(shrunk, 20).iter().all(|&x| x == 1)) };

        // regrowing exposes zeroes, not the stale bytes
        let regrown = arena.reallocate(shrunk, 20, bytes(64)).unwrap();
        unsafe {
            let data = read(regrown, 64);
            assert!(data[..20].iter().all(|&x| x == 1));
            assert!(data[20..].iter().all(|&x| x == 0));
        }
        arena.deallocate(regrown, 64).unwrap();
    }

    #[test]
    fn hook_release_survives_bad_pointers() {
        let arena = Arena::new(16, 2);
        let a = arena.allocate(bytes(16)).unwrap();
        unsafe {
            Allocator::<()>::release(&arena, a, bytes(16), &());
            // logged, not fatal
            Allocator::<()>::release(&arena, a, bytes(16), &());
        }
        assert_eq!(arena.used_pages(), 0);
    }
}
