use {
  ::core::{mem::MaybeUninit, ptr::NonNull},
  ::std::collections::TryReserveError,
};

/// A fixed capacity run of element slots stored on the heap
///
/// The block never reallocates, so the address of every slot is fixed for the
/// lifetime of the block. Which slots are initialised must be tracked
/// externally; dropping a `Block` frees the allocation without running the
/// destructor of any element.
pub(crate) struct Block<E> {
  data: NonNull<MaybeUninit<E>>,
  capacity: usize,
}

// safety: a `Block` exclusively owns its slots, in the same way as a `Vec`.
unsafe impl<E: Send> Send for Block<E> {}
unsafe impl<E: Sync> Sync for Block<E> {}

impl<E> Block<E> {
  /// Allocates a block with room for exactly `capacity` elements
  ///
  /// Aborts on allocation failure, and panics on capacity overflow, the same
  /// as `Vec::with_capacity`.
  pub(crate) fn new(capacity: usize) -> Self {
    Self::from_vec(Vec::with_capacity(capacity), capacity)
  }

  /// Allocates a block with room for exactly `capacity` elements, returning
  /// an error if the allocator cannot satisfy the request
  pub(crate) fn try_new(capacity: usize) -> Result<Self, TryReserveError> {
    let mut data = Vec::new();
    data.try_reserve_exact(capacity)?;
    Ok(Self::from_vec(data, capacity))
  }

  fn from_vec(mut data: Vec<MaybeUninit<E>>, capacity: usize) -> Self {
    // safety:
    // - the vec has room for at least `capacity` elements
    // - the elements are MaybeUninit, so they need not be initialised
    unsafe { data.set_len(capacity) };

    // `into_boxed_slice` drops any excess capacity, so the allocation is
    // exactly `capacity` slots long. That is what `Drop` relies on.
    let leaked: &mut [MaybeUninit<E>] = Box::leak(data.into_boxed_slice());
    let data = NonNull::from(leaked).cast::<MaybeUninit<E>>();

    Block { data, capacity }
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  /// Write the value returned from a function into a slot
  ///
  /// Drop is not called for the existing value.
  ///
  /// # Safety
  ///
  /// - `element` must be less than the capacity
  #[inline]
  pub(crate) unsafe fn set_with(
    &mut self,
    element: usize,
    f: impl FnOnce() -> E,
  ) -> &mut E {
    debug_assert!(element < self.capacity);
    let slot: &mut MaybeUninit<E> = unsafe { self.data.add(element).as_mut() };
    slot.write(f())
  }

  /// Move the element out of a slot
  ///
  /// # Safety
  ///
  /// - `element` must be less than the capacity.
  /// - the element must be initialised.
  /// - after this call the slot is uninitialised.
  #[inline]
  pub(crate) unsafe fn take_element(&mut self, element: usize) -> E {
    debug_assert!(element < self.capacity);
    unsafe { self.data.add(element).as_ref().assume_init_read() }
  }

  /// A pointer to the element in slot `element`
  ///
  /// The pointer stays valid until the block is dropped, regardless of what
  /// happens to the `Block` value itself (it may be moved around freely).
  ///
  /// # Safety
  ///
  /// - `element` must be less than the capacity.
  #[inline]
  pub(crate) unsafe fn element_ptr(&self, element: usize) -> NonNull<E> {
    debug_assert!(element < self.capacity);
    unsafe { self.data.add(element).cast::<E>() }
  }

  /// # Safety
  ///
  /// - `element` must be less than the capacity.
  /// - the element must be initialised.
  #[inline]
  pub(crate) unsafe fn get(&self, element: usize) -> &E {
    unsafe { self.element_ptr(element).as_ref() }
  }

  /// # Safety
  ///
  /// - `element` must be less than the capacity.
  /// - the element must be initialised.
  #[inline]
  pub(crate) unsafe fn get_mut(&mut self, element: usize) -> &mut E {
    unsafe { self.element_ptr(element).as_mut() }
  }

  /// Drop in place all elements in the slots `start..=end`
  ///
  /// # Safety
  ///
  /// - `end` must be less than capacity.
  /// - `start <= end`
  /// - elements from `start..=end` must be initialised.
  /// - after calling this, elements from `start..=end` will be uninitialised.
  #[inline]
  pub(crate) unsafe fn drop_in_place(&mut self, start: usize, end: usize) {
    debug_assert!(end < self.capacity && start <= end);
    let len = end + 1 - start;
    unsafe {
      let first = self.element_ptr(start).as_ptr();
      ::core::ptr::drop_in_place(::core::ptr::slice_from_raw_parts_mut(
        first, len,
      ));
    }
  }
}

impl<E> Drop for Block<E> {
  fn drop(&mut self) {
    // safety: `data` came from a leaked `Box<[MaybeUninit<E>]>` of exactly
    // `capacity` slots, and is only reclaimed here.
    unsafe {
      let slice: *mut [MaybeUninit<E>] =
        ::core::ptr::slice_from_raw_parts_mut(self.data.as_ptr(), self.capacity);
      drop(Box::from_raw(slice));
    }
  }
}
