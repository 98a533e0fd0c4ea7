use core::{
    alloc::Layout,
    fmt,
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
    slice,
};

use log::trace;

use crate::{
    capacity::{self, RoundUp},
    error::{AllocError, Error},
    global::Global,
    size::Size,
    traits::Allocator,
};

/// Constructor-time configuration of a [`GrowVec`].
///
/// The size type is picked through the `S` type parameter.
#[derive(Clone, Copy, Debug)]
pub struct Config<S, A, C> {
    /// The hook that acquires, resizes and releases storage.
    pub alloc: A,
    /// Picks the capacity when an insert lands past the end of the storage.
    pub roundup: RoundUp<S>,
    /// Handed to every call of `alloc`. Never looked at by the vector itself.
    pub context: C,
}

impl<S: Size, A, C> Config<S, A, C> {
    /// Uses [`capacity::next_power_of_two`] as the round-up policy.
    pub fn new(alloc: A, context: C) -> Self {
        Self {
            alloc,
            roundup: capacity::next_power_of_two::<S>,
            context,
        }
    }
}

impl<S: Size, A: Default, C: Default> Default for Config<S, A, C> {
    fn default() -> Self {
        Self::new(A::default(), C::default())
    }
}

/// A contiguous growable array type with a pluggable allocator, growth policy and size type.
///
/// - `S` counts elements and slots. A narrower type makes the header smaller and caps the length.
/// - `A` acquires and releases the storage, see [`Allocator`].
/// - `C` is an opaque per-vector value passed to every call of `A`.
///
/// Appending doubles the capacity when full. Writing at an index past the end, see
/// [`insert`](Self::insert), grows through the configured round-up policy and fills the gap.
///
/// Storage is handed back to the allocator by [`release`](Self::release) or on drop.
pub struct GrowVec<T, S = usize, A = Global, C = ()>
where
    S: Size,
    A: Allocator<C>,
{
    ptr: NonNull<T>,
    len: S,
    cap: S,
    alloc: A,
    roundup: RoundUp<S>,
    context: C,
    _marker: PhantomData<T>,
}

unsafe impl<T, S, A, C> Send for GrowVec<T, S, A, C>
where
    T: Send,
    S: Size,
    A: Allocator<C> + Send,
    C: Send,
{
}

unsafe impl<T, S, A, C> Sync for GrowVec<T, S, A, C>
where
    T: Sync,
    S: Size,
    A: Allocator<C> + Sync,
    C: Sync,
{
}

impl<T> GrowVec<T> {
    /// Constructs a new, empty vector over the platform allocator.
    ///
    /// Does not allocate.
    pub const fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap: 0,
            alloc: Global,
            roundup: capacity::next_power_of_two::<usize>,
            context: (),
            _marker: PhantomData,
        }
    }
}

impl<T, S, A, C> Default for GrowVec<T, S, A, C>
where
    S: Size,
    A: Allocator<C> + Default,
    C: Default,
{
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl<T, S, A, C> GrowVec<T, S, A, C>
where
    S: Size,
    A: Allocator<C>,
{
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Constructs a new, empty vector. Does not allocate.
    pub fn with_config(config: Config<S, A, C>) -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: S::zero(),
            cap: S::zero(),
            alloc: config.alloc,
            roundup: config.roundup,
            context: config.context,
            _marker: PhantomData,
        }
    }

    /// Constructs a new, empty vector over `alloc` with a default context.
    pub fn new_in(alloc: A) -> Self
    where
        C: Default,
    {
        Self::with_config(Config::new(alloc, C::default()))
    }

    #[inline]
    pub fn len(&self) -> S {
        self.len
    }

    #[inline]
    pub fn capacity(&self) -> S {
        self.cap
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len.is_zero()
    }

    #[inline]
    pub fn context(&self) -> &C {
        &self.context
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Replaces the context, returning the old one.
    pub fn set_context(&mut self, context: C) -> C {
        mem::replace(&mut self.context, context)
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline]
    pub fn roundup(&self) -> RoundUp<S> {
        self.roundup
    }

    /// Returns a raw pointer to the storage. Dangling when the capacity is zero.
    ///
    /// Slots in `[len, capacity)` hold whatever the allocator left there.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[0, len)` is initialized
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len.to_usize()) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: `[0, len)` is initialized
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len.to_usize()) }
    }

    /// Appends an element, doubling the capacity if the vector is full.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the new capacity overflows `S` or the allocator fails. The vector is left
    /// unchanged.
    pub fn push(&mut self, value: T) -> Result<(), Error> {
        self.reserve_one()?;
        // SAFETY: `len < cap` after reserving
        unsafe { self.slot(self.len).write(value) };
        self.len = self.len + S::one();
        Ok(())
    }

    /// Appends `T::default()` and returns a reference to it, so the caller can fill it in place.
    ///
    /// # Errors
    ///
    /// Same as [`push`](Self::push).
    pub fn push_slot(&mut self) -> Result<&mut T, Error>
    where
        T: Default,
    {
        self.push(T::default())?;
        // SAFETY: just written
        Ok(unsafe { &mut *self.slot(self.len - S::one()) })
    }

    /// Removes the last element and returns it.
    ///
    /// # Panics
    ///
    /// Panics if the vector is empty.
    #[track_caller]
    pub fn pop(&mut self) -> T {
        match self.try_pop() {
            Some(value) => value,
            None => panic!("pop on empty vector"),
        }
    }

    /// Removes the last element and returns it, or `None` if the vector is empty.
    pub fn try_pop(&mut self) -> Option<T> {
        if self.len.is_zero() {
            return None;
        }
        self.len = self.len - S::one();
        // SAFETY: the slot was initialized and is no longer counted
        Some(unsafe { self.slot(self.len).read() })
    }

    /// Returns a reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `index >= len`.
    pub fn at(&self, index: S) -> Result<&T, Error> {
        self.check(index)?;
        // SAFETY: bounds checked
        Ok(unsafe { self.at_unchecked(index) })
    }

    /// Returns a mutable reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `index >= len`.
    pub fn at_mut(&mut self, index: S) -> Result<&mut T, Error> {
        self.check(index)?;
        // SAFETY: bounds checked
        Ok(unsafe { self.at_unchecked_mut(index) })
    }

    /// Returns a reference to the element at `index`, without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than [`len`](Self::len). Anything else is undefined behavior.
    #[inline]
    pub unsafe fn at_unchecked(&self, index: S) -> &T {
        debug_assert!(index < self.len);
        &*self.slot(index)
    }

    /// Returns a mutable reference to the element at `index`, without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than [`len`](Self::len). Anything else is undefined behavior.
    #[inline]
    pub unsafe fn at_unchecked_mut(&mut self, index: S) -> &mut T {
        debug_assert!(index < self.len);
        &mut *self.slot(index)
    }

    /// Writes `value` at `index`, growing the vector if needed.
    ///
    /// Gap slots between the old length and `index` are filled with `T::default()`.
    /// See [`insert_with`](Self::insert_with).
    ///
    /// # Errors
    ///
    /// Same as [`insert_with`](Self::insert_with).
    pub fn insert(&mut self, index: S, value: T) -> Result<(), Error>
    where
        T: Default,
    {
        self.insert_with(index, value, T::default)
    }

    /// Writes `value` at `index`, growing the vector if needed.
    ///
    /// - If `index >= capacity`, the storage grows to `roundup(index + 1)` slots.
    /// - If `index >= len`, every gap slot in `[len, index)` gets a value from `fill`, in order,
    ///   and the length becomes `index + 1`.
    /// - Otherwise the element at `index` is overwritten.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `index + 1` overflows `S` or the allocator fails. The vector is left
    /// unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the round-up policy returns less than `index + 1`.
    pub fn insert_with<F>(&mut self, index: S, value: T, mut fill: F) -> Result<(), Error>
    where
        F: FnMut() -> T,
    {
        if index >= self.cap {
            let need = index
                .checked_add(&S::one())
                .ok_or(AllocError::CapacityOverflow)?;
            let new_cap = (self.roundup)(need);
            assert!(
                new_cap >= need,
                "round-up policy returned {new_cap:?} for a request of {need:?}"
            );
            self.reallocate(new_cap)?;
        }

        if index < self.len {
            // SAFETY: in bounds, the old value is dropped by the assignment
            unsafe { *self.slot(index) = value };
            return Ok(());
        }

        while self.len < index {
            let gap = fill();
            // SAFETY: `len < index < cap`
            unsafe { self.slot(self.len).write(gap) };
            self.len = self.len + S::one();
        }
        // SAFETY: `index < cap`
        unsafe { self.slot(index).write(value) };
        self.len = index + S::one();
        Ok(())
    }

    /// Resizes the storage to exactly `capacity` slots. `0` releases the storage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShrinkBelowLength`] if `capacity < len`, or `Err` if the allocator fails.
    /// The vector is left unchanged.
    pub fn resize(&mut self, capacity: S) -> Result<(), Error> {
        if capacity < self.len {
            return Err(Error::ShrinkBelowLength {
                requested: capacity.to_usize(),
                len: self.len.to_usize(),
            });
        }
        self.reallocate(capacity)?;
        Ok(())
    }

    /// Replaces the contents with clones of `src`'s elements.
    ///
    /// Grows to at least `src.capacity()` slots first. This vector keeps its own allocator,
    /// round-up policy and context.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the allocator fails. The vector is left unchanged.
    pub fn copy_from<A2, C2>(&mut self, src: &GrowVec<T, S, A2, C2>) -> Result<(), Error>
    where
        T: Clone,
        A2: Allocator<C2>,
    {
        if self.cap < src.cap {
            self.reallocate(src.cap)?;
        }
        self.drop_elements();
        for item in src.as_slice() {
            // SAFETY: `len < src.len <= src.cap <= cap`
            unsafe { self.slot(self.len).write(item.clone()) };
            self.len = self.len + S::one();
        }
        Ok(())
    }

    /// Returns an independent copy with the same configuration and contents.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the allocator fails.
    pub fn try_clone(&self) -> Result<Self, Error>
    where
        T: Clone,
        A: Clone,
        C: Clone,
    {
        let mut copy = Self::with_config(Config {
            alloc: self.alloc.clone(),
            roundup: self.roundup,
            context: self.context.clone(),
        });
        copy.copy_from(self)?;
        Ok(copy)
    }

    /// Drops every element and hands the storage back to the allocator.
    ///
    /// The vector is empty afterwards and can be reused with the same configuration.
    pub fn release(&mut self) {
        self.drop_elements();
        self.release_storage();
    }

    #[inline]
    fn slot(&self, index: S) -> *mut T {
        // SAFETY: callers stay within `[0, cap)`
        unsafe { self.ptr.as_ptr().add(index.to_usize()) }
    }

    fn check(&self, index: S) -> Result<(), Error> {
        if index < self.len {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                index: index.to_usize(),
                len: self.len.to_usize(),
            })
        }
    }

    fn reserve_one(&mut self) -> Result<(), AllocError> {
        if self.len == self.cap {
            let new_cap = capacity::doubled(self.cap).ok_or(AllocError::CapacityOverflow)?;
            self.reallocate(new_cap)?;
        }
        Ok(())
    }

    fn layout_for(cap: S) -> Result<Layout, AllocError> {
        Layout::array::<T>(cap.to_usize()).map_err(|_| AllocError::CapacityOverflow)
    }

    fn current_layout(&self) -> Layout {
        // SAFETY: the same layout was validated when the storage was allocated
        unsafe {
            Layout::from_size_align_unchecked(
                mem::size_of::<T>() * self.cap.to_usize(),
                mem::align_of::<T>(),
            )
        }
    }

    /// Moves the storage to exactly `new_cap` slots. Leaves everything as is on failure.
    fn reallocate(&mut self, new_cap: S) -> Result<(), AllocError> {
        debug_assert!(new_cap >= self.len);
        if new_cap == self.cap {
            return Ok(());
        }
        if new_cap.is_zero() {
            self.release_storage();
            return Ok(());
        }
        if Self::IS_ZST {
            self.cap = new_cap;
            return Ok(());
        }

        let new_layout = Self::layout_for(new_cap)?;
        let old_layout = self.current_layout();
        let old_ptr = (!self.cap.is_zero()).then(|| self.ptr.cast::<u8>());
        // SAFETY: `old_ptr` and `old_layout` describe the current block, `new_layout` is non-empty
        let ptr = unsafe {
            self.alloc
                .reallocate(old_ptr, old_layout, new_layout, &self.context)?
        };
        trace!("capacity {:?} -> {:?}", self.cap, new_cap);
        self.ptr = ptr.cast();
        self.cap = new_cap;
        Ok(())
    }

    fn release_storage(&mut self) {
        if !Self::IS_ZST && !self.cap.is_zero() {
            let layout = self.current_layout();
            // SAFETY: the block came from this allocator and is forgotten right after
            unsafe {
                self.alloc
                    .release(self.ptr.cast(), layout, &self.context)
            };
        }
        self.ptr = NonNull::dangling();
        self.cap = S::zero();
    }

    fn drop_elements(&mut self) {
        let len = self.len.to_usize();
        // a panicking destructor leaks the rest instead of double-dropping
        self.len = S::zero();
        // SAFETY: `[0, len)` was initialized and is no longer counted
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), len)) };
    }
}

impl<T, S, A, C> Drop for GrowVec<T, S, A, C>
where
    S: Size,
    A: Allocator<C>,
{
    fn drop(&mut self) {
        self.release();
    }
}

impl<T, S, A, C> fmt::Debug for GrowVec<T, S, A, C>
where
    T: fmt::Debug,
    S: Size,
    A: Allocator<C>,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowVec")
            .field("len", &self.len)
            .field("capacity", &self.cap)
            .field("context", &self.context)
            .field("elements", &self.as_slice())
            .finish()
    }
}
