use core::{alloc::Layout, fmt::Debug, ptr::NonNull};

use bytesize::ByteSize;
use log::{debug, warn};

use crate::{error::AllocError, traits::Allocator};

/// Wraps an allocator hook and logs every call together with the container's context.
///
/// Useful for telling apart which container is responsible for which allocation, e.g. by giving
/// each one a name as its context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Traced<A>(pub A);

impl<A> Traced<A> {
    pub fn into_inner(self) -> A {
        self.0
    }
}

fn human(bytes: usize) -> String {
    ByteSize::b(bytes as u64).to_string_as(true)
}

unsafe impl<A, C> Allocator<C> for Traced<A>
where
    A: Allocator<C>,
    C: Debug + ?Sized,
{
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old: Layout,
        new: Layout,
        context: &C,
    ) -> Result<NonNull<u8>, AllocError> {
        debug!(
            "{:?}: reallocating {} -> {}",
            context,
            human(old.size()),
            human(new.size())
        );
        let result = self.0.reallocate(ptr, old, new, context);
        if let Err(err) = result {
            warn!("{:?}: reallocation to {} failed: {}", context, human(new.size()), err);
        }
        result
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout, context: &C) {
        debug!("{:?}: releasing {}", context, human(layout.size()));
        self.0.release(ptr, layout, context);
    }
}
