//! Iterator implementations
//!
//! The borrowing iterators walk the blocks with a cursor at each end, holding
//! the block number and the offset within that block. Stepping past the end
//! of a block moves the cursor to the start of the next one, so no index
//! mapping is done per element.

use {
  super::{block::Block, index_metadata, BlockVec, IndexMetadata},
  ::core::{iter::FusedIterator, marker::PhantomData},
};

/// A borrowing Iterator
///
/// An iterator that borrows each value of the `BlockVec` (from start to end).
/// Created using [`BlockVec::iter`].
///
/// This iterator also implements [`FusedIterator`], [`ExactSizeIterator`], &
/// [`DoubleEndedIterator`].
pub struct BlockVecIter<'s, E: 's> {
  block_vec: &'s BlockVec<E>,
  /// position of the next element yielded by `next`
  front: IndexMetadata,
  /// position of the next element yielded by `next_back`
  back: IndexMetadata,
  remaining: usize,
}

impl<'s, E> BlockVecIter<'s, E> {
  pub(crate) fn new(block_vec: &'s BlockVec<E>) -> Self {
    BlockVecIter {
      front: index_metadata(0),
      back: index_metadata(block_vec.len.saturating_sub(1)),
      remaining: block_vec.len,
      block_vec,
    }
  }
}

impl<'s, E> Clone for BlockVecIter<'s, E> {
  fn clone(&self) -> Self {
    BlockVecIter {
      block_vec: self.block_vec,
      front: self.front,
      back: self.back,
      remaining: self.remaining,
    }
  }
}

impl<'s, E> Iterator for BlockVecIter<'s, E> {
  type Item = &'s E;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }

    let position = self.front;
    self.remaining -= 1;
    self.front.advance();

    let block_vec: &'s BlockVec<E> = self.block_vec;
    // safety: `remaining` was non-zero, so `position` lies between the two
    // cursors; the element there is initialised and its block exists.
    let element = unsafe {
      block_vec
        .blocks
        .get_unchecked(position.block_n)
        .get(position.element)
    };
    Some(element)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<'s, E> FusedIterator for BlockVecIter<'s, E> {}

impl<'s, E> ExactSizeIterator for BlockVecIter<'s, E> {
  fn len(&self) -> usize {
    self.remaining
  }
}

impl<'s, E> DoubleEndedIterator for BlockVecIter<'s, E> {
  fn next_back(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }

    let position = self.back;
    self.remaining -= 1;
    // The back cursor is never moved before index 0.
    if self.remaining != 0 {
      self.back.retreat();
    }

    let block_vec: &'s BlockVec<E> = self.block_vec;
    // safety: as in `next`.
    let element = unsafe {
      block_vec
        .blocks
        .get_unchecked(position.block_n)
        .get(position.element)
    };
    Some(element)
  }
}

/// A mutably borrowing Iterator
///
/// An iterator that mutably borrows each value of the `BlockVec` (from start
/// to end). Created using [`BlockVec::iter_mut`].
///
/// This iterator also implements [`FusedIterator`], [`ExactSizeIterator`], &
/// [`DoubleEndedIterator`].
pub struct BlockVecIterMut<'s, E: 's> {
  // The blocks themselves are only ever read through this pointer. The
  // elements handed out live in the blocks' heap allocations, and each is
  // handed out at most once.
  blocks: *const Block<E>,
  front: IndexMetadata,
  back: IndexMetadata,
  remaining: usize,
  _lifetime: PhantomData<&'s mut BlockVec<E>>,
}

// safety: the iterator hands out unique `&mut E`s, like `slice::IterMut`.
unsafe impl<'s, E: Send> Send for BlockVecIterMut<'s, E> {}
unsafe impl<'s, E: Sync> Sync for BlockVecIterMut<'s, E> {}

impl<'s, E: 's> BlockVecIterMut<'s, E> {
  pub(crate) fn new(block_vec: &'s mut BlockVec<E>) -> Self {
    BlockVecIterMut {
      front: index_metadata(0),
      back: index_metadata(block_vec.len.saturating_sub(1)),
      remaining: block_vec.len,
      blocks: block_vec.blocks.as_ptr(),
      _lifetime: PhantomData,
    }
  }

  /// # Safety
  ///
  /// - the element at `position` must be initialised.
  /// - no other reference to that element may be live.
  unsafe fn element(&mut self, position: IndexMetadata) -> &'s mut E {
    // safety:
    // - the exclusive borrow of the `BlockVec` is held for `'s`, so the
    //   blocks are alive and not otherwise accessed.
    // - an initialised element implies its block exists.
    unsafe {
      let block: &Block<E> = &*self.blocks.add(position.block_n);
      block.element_ptr(position.element).as_mut()
    }
  }
}

impl<'s, E> Iterator for BlockVecIterMut<'s, E> {
  type Item = &'s mut E;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }

    let position = self.front;
    self.remaining -= 1;
    self.front.advance();

    // safety: `position` lies between the two cursors, so it is initialised
    // and has not been yielded before.
    Some(unsafe { self.element(position) })
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<'s, E> ExactSizeIterator for BlockVecIterMut<'s, E> {
  fn len(&self) -> usize {
    self.remaining
  }
}

impl<'s, E> FusedIterator for BlockVecIterMut<'s, E> {}

impl<'s, E> DoubleEndedIterator for BlockVecIterMut<'s, E> {
  fn next_back(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }

    let position = self.back;
    self.remaining -= 1;
    if self.remaining != 0 {
      self.back.retreat();
    }

    // safety: as in `next`.
    Some(unsafe { self.element(position) })
  }
}

/// A consuming Iterator
///
/// An iterator that moves each value out of the `BlockVec` (from start to
/// end). The BlockVec cannot be used after calling this. Created using
/// [`BlockVec::into_iter`].
///
/// This iterator also implements [`FusedIterator`], [`ExactSizeIterator`], &
/// [`DoubleEndedIterator`].
//
// # Safety
//
// Elements are moved out from the front as well as the back, so the usual
// `0..len` invariant can not hold. The inner `BlockVec` has its `len` set to
// zero, and the live elements are exactly `next..end`. When the iterator is
// dropped, the remaining elements are dropped here and the inner `BlockVec`
// then only frees its blocks.
pub struct BlockVecIntoIter<E> {
  block_vec: BlockVec<E>,
  // next index to read
  next: usize,
  // the last index to read + 1 (exclusive)
  end: usize,
}

impl<E> BlockVecIntoIter<E> {
  pub(crate) fn new(mut block_vec: BlockVec<E>) -> Self {
    let end = block_vec.len;
    block_vec.len = 0;
    BlockVecIntoIter {
      block_vec,
      next: 0,
      end,
    }
  }

  /// # Safety
  ///
  /// - `index` must be in `self.next..self.end`, and must be removed from
  ///   that range by the caller.
  unsafe fn take(&mut self, index: usize) -> E {
    let index_metadata = index_metadata(index);
    // safety: the element is live, so its block exists and the slot is
    // initialised. It is uninitialised afterwards.
    unsafe {
      self
        .block_vec
        .blocks
        .get_unchecked_mut(index_metadata.block_n)
        .take_element(index_metadata.element)
    }
  }
}

impl<E> Iterator for BlockVecIntoIter<E> {
  type Item = E;

  fn next(&mut self) -> Option<E> {
    if self.next >= self.end {
      return None;
    }

    let index = self.next;
    self.next += 1;
    // safety: `index` was in `next..end`, and has now been removed from it.
    Some(unsafe { self.take(index) })
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = self.end - self.next;
    (remaining, Some(remaining))
  }
}

impl<E> FusedIterator for BlockVecIntoIter<E> {}

impl<E> ExactSizeIterator for BlockVecIntoIter<E> {
  fn len(&self) -> usize {
    let (lower, _) = self.size_hint();
    lower
  }
}

impl<E> DoubleEndedIterator for BlockVecIntoIter<E> {
  fn next_back(&mut self) -> Option<E> {
    if self.next >= self.end {
      return None;
    }

    self.end -= 1;
    // safety: `end` was in `next..end`, and has now been removed from it.
    Some(unsafe { self.take(self.end) })
  }
}

impl<E> Drop for BlockVecIntoIter<E> {
  fn drop(&mut self) {
    if self.next < self.end {
      let (start, end) = (self.next, self.end);
      // If a destructor panics, the rest are leaked rather than dropped twice.
      self.next = self.end;
      // safety: the elements in `start..end` are the ones not yet moved out.
      unsafe { self.block_vec.drop_range(start, end) };
    }
    // `block_vec.len` is zero, so its own `Drop` only frees the blocks.
  }
}
