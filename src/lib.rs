#![doc = include_str!("../README.md")]

mod block;
pub mod error;
pub mod iter;

pub use self::error::{BlockVecError, Result};

use {
  self::{
    block::Block,
    iter::{BlockVecIntoIter, BlockVecIter, BlockVecIterMut},
  },
  ::core::{
    fmt,
    ops::{Index, IndexMut},
  },
};

/// The capacity of the first two blocks
pub const INITIAL_CAPACITY: usize = 16;

/// Each block after the second is this many times larger than the previous
pub const GROWTH_FACTOR: usize = 2;

/// The difference between `log2(index)` and the block number, for any index
/// outside of the first block.
const LOG_OFFSET: u32 = INITIAL_CAPACITY.ilog2() - 1;

// `index_to_block_n` reads the block number straight off the base-2 logarithm
// of the index, which is only valid for this growth schedule.
const _: () = assert!(GROWTH_FACTOR == 2);
const _: () = assert!(INITIAL_CAPACITY.is_power_of_two() && INITIAL_CAPACITY >= 2);

/// A heap allocated indexable array-like datastructure, that will grow without
/// moving existing elements
///
/// Elements are stored in a sequence of blocks with capacities `16`, `16`,
/// `32`, `64`, `128`, .. . When the last block is full a new one is allocated;
/// existing blocks are never copied, resized or reallocated. The address of an
/// element therefore never changes while it is in the `BlockVec`.
pub struct BlockVec<E> {
  /// Blocks in allocation order. Block `n` has the capacity given by
  /// `block_capacity(n)`.
  blocks: Vec<Block<E>>,
  /// Items from 0..len are initialised, but items from len.. are uninit or
  /// their blocks may not have been allocated yet.
  len: usize,
}

// Most of the unsafe code below relies on a couple of simple invariants:
//
// - `len` delimits the number of initialised elements.
//
// - each block has a fixed capacity based on its position, given by the
//   `block_capacity` function.
//
// - Elements are counted starting from the 0th block; filling every slot in
//   that block, in order; then moving to the 1st block, and so on. So every
//   block holding index `len - 1`, or an earlier index, exists.
//
//   The coordinates for the element at a particular index are given by the
//   function `index_metadata`. Alternatively the total range of indices
//   corresponding to a particular block is given by `block_index_range`.

/// The position of a logical index, as a block number and the offset of the
/// element within that block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct IndexMetadata {
  /// block number
  block_n: usize,
  /// block element (index into the block)
  element: usize,
}

impl IndexMetadata {
  /// Move to the position of the next logical index
  #[inline]
  fn advance(&mut self) {
    self.element += 1;
    if self.element == block_capacity(self.block_n) {
      self.block_n += 1;
      self.element = 0;
    }
  }

  /// Move to the position of the previous logical index
  ///
  /// Must not be called at index 0.
  #[inline]
  fn retreat(&mut self) {
    if self.element == 0 {
      self.block_n -= 1;
      self.element = block_capacity(self.block_n) - 1;
    } else {
      self.element -= 1;
    }
  }
}

/// The size of block number `n`
///
/// Counting from `n=0`, follows the pattern:
/// `16`, `16`, `32`, `64`, `128`, ..
#[inline]
fn block_capacity(n: usize) -> usize {
  if n == 0 {
    INITIAL_CAPACITY
  } else {
    INITIAL_CAPACITY << (n - 1)
  }
}

/// The range of indices (inclusive) corresponding to block number `n`
///
/// Counting from `n=0`, follows the pattern:
/// `(0, 15)`, `(16, 31)`, `(32, 63)`, `(64, 127)`, ..
#[inline]
fn block_index_range(n: usize) -> (usize, usize) {
  // Past the first block, the blocks before `n` add up to exactly the capacity
  // of block `n`.
  let capacity = block_capacity(n);
  let first = if n == 0 { 0 } else { capacity };
  (first, first + (capacity - 1))
}

/// Takes an `index` and returns the corresponding block number, `n`
///
/// This is effectively the inverse of `block_index_range`.
///
/// Follows the pattern:
/// `0..=15` -> `0`
/// `16..=31` -> `1`
/// `32..=63` -> `2`
/// `64..=127` -> `3`
#[inline]
fn index_to_block_n(index: usize) -> usize {
  if index < INITIAL_CAPACITY {
    0
  } else {
    (index.ilog2() - LOG_OFFSET) as usize
  }
}

/// Takes an index and returns the corresponding block number and the index of
/// the element within that block
#[inline]
fn index_metadata(index: usize) -> IndexMetadata {
  let block_n = index_to_block_n(index);
  let (first_index, _) = block_index_range(block_n);

  IndexMetadata {
    block_n,
    element: index - first_index,
  }
}

impl<E> BlockVec<E> {
  /// The maximum number of elements a `BlockVec` can hold
  pub const MAX_LEN: usize = usize::MAX;

  /// Constructs a new, empty `BlockVec<E>` with the first block allocated
  ///
  /// Aborts if the allocation fails, like `Vec::with_capacity`. See
  /// [`try_new`](Self::try_new) for a fallible version.
  pub fn new() -> Self {
    let mut block_vec = BlockVec {
      blocks: Vec::new(),
      len: 0,
    };
    block_vec.grow();
    block_vec
  }

  /// Constructs a new, empty `BlockVec<E>` with the first block allocated,
  /// returning an error if the allocation fails
  pub fn try_new() -> Result<Self> {
    let mut block_vec = BlockVec {
      blocks: Vec::new(),
      len: 0,
    };
    block_vec.try_grow()?;
    Ok(block_vec)
  }

  /// Constructs a `BlockVec` holding `n` clones of `value`
  pub fn from_elem(value: E, n: usize) -> Self
  where
    E: Clone,
  {
    let mut block_vec = BlockVec::new();
    block_vec.resize(n, value);
    block_vec
  }

  /// Returns the number of elements in the `BlockVec`
  pub fn len(&self) -> usize {
    self.len
  }

  /// Returns `true` if the `BlockVec` contains no elements
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Returns the total number of element slots across all allocated blocks
  ///
  /// This is the number of elements the `BlockVec` can hold without
  /// allocating. It is `0` after [`clear`](Self::clear).
  pub fn capacity(&self) -> usize {
    self
      .blocks
      .iter()
      .fold(0, |total: usize, block| total.saturating_add(block.capacity()))
  }

  /// Returns the number of allocated blocks
  pub fn block_count(&self) -> usize {
    self.blocks.len()
  }

  /// Allocate the next block in the growth schedule
  fn grow(&mut self) {
    let block_n = self.blocks.len();
    let capacity = block_capacity(block_n);
    tracing::trace!(block_n, capacity, "allocating block");
    self.blocks.push(Block::new(capacity));
  }

  /// Allocate the next block in the growth schedule, returning an error
  /// instead of aborting if the allocation fails
  fn try_grow(&mut self) -> Result<()> {
    let block_n = self.blocks.len();
    let capacity = block_capacity(block_n);
    tracing::trace!(block_n, capacity, "allocating block");
    let block = Block::try_new(capacity)
      .map_err(|source| BlockVecError::AllocationFailed { capacity, source })?;
    self.blocks.push(block);
    Ok(())
  }

  /// Reserves capacity for at least `additional` more elements
  ///
  /// Allocates whole blocks along the normal growth schedule; existing
  /// elements are never moved.
  ///
  /// # Panics
  ///
  /// Panics if the new capacity would exceed [`Self::MAX_LEN`].
  pub fn reserve(&mut self, additional: usize) {
    if additional == 0 {
      return;
    }
    let Some(new_min_len) = self.len.checked_add(additional) else {
      panic!(
        "capacity: {len} + {additional} would exceed maximum: {max_len}",
        len = self.len,
        max_len = Self::MAX_LEN
      );
    };

    let required_block_n = index_to_block_n(new_min_len - 1);
    while self.blocks.len() <= required_block_n {
      self.grow();
    }
  }

  /// Reserves capacity for at least `additional` more elements, returning an
  /// error instead of panicking or aborting
  ///
  /// On error, any blocks allocated by this call are released again, so the
  /// `BlockVec` is left exactly as it was.
  pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
    if additional == 0 {
      return Ok(());
    }
    let new_min_len = self.len.checked_add(additional).ok_or(
      BlockVecError::CapacityOverflow {
        max_len: Self::MAX_LEN,
      },
    )?;

    let required_block_n = index_to_block_n(new_min_len - 1);
    let block_count = self.blocks.len();
    while self.blocks.len() <= required_block_n {
      if let Err(err) = self.try_grow() {
        // the new blocks hold no live elements
        self.blocks.truncate(block_count);
        return Err(err);
      }
    }
    Ok(())
  }

  /// Clears the `BlockVec`, dropping all values and releasing every block
  ///
  /// The capacity is `0` afterwards; the next push allocates a fresh first
  /// block. All outstanding element pointers are invalidated.
  pub fn clear(&mut self) {
    self.truncate(0);
    let released = self.blocks.len();
    self.blocks.clear();
    tracing::trace!(released, "released blocks");
  }

  /// Shortens the `BlockVec`, keeping the first `len` elements and dropping
  /// the remaining
  ///
  /// If `len` is greater than or equal to the current length, this does
  /// nothing. No blocks are released.
  pub fn truncate(&mut self, len: usize) {
    if len >= self.len {
      return;
    }

    let end = self.len;
    // safety:
    // - Similarly to `Vec::truncate`, setting `self.len` before dropping
    //   allows leaking the elements if a `Drop` impl panics, rather than
    //   calling the destructor for some elements twice.
    // - the value of `self.len` promised the elements in `len..end` were
    //   initialised.
    self.len = len;
    unsafe { self.drop_range(len, end) };
  }

  /// Drop in place the elements at the indices `start..end`
  ///
  /// # Safety
  ///
  /// - `start < end`
  /// - the elements at `start..end` must be initialised, which implies their
  ///   blocks exist.
  /// - after calling this, those elements are uninitialised.
  unsafe fn drop_range(&mut self, start: usize, end: usize) {
    // first and last indices to remove (inclusive)
    let first_index_meta = index_metadata(start);
    let last_index_meta = index_metadata(end - 1);

    for n in first_index_meta.block_n..=last_index_meta.block_n {
      let first_element = if n == first_index_meta.block_n {
        first_index_meta.element
      } else {
        0
      };
      let last_element = if n == last_index_meta.block_n {
        last_index_meta.element
      } else {
        block_capacity(n) - 1
      };
      // safety: the caller promises the block exists and that
      // `first_element..=last_element` are initialised.
      unsafe {
        self
          .blocks
          .get_unchecked_mut(n)
          .drop_in_place(first_element, last_element);
      }
    }
  }

  /// Push a new element onto the end
  ///
  /// If the last block is full, the next block in the growth schedule is
  /// allocated first. Nothing already in the `BlockVec` is moved.
  ///
  /// # Panics
  ///
  /// Panics if the new length would exceed [`Self::MAX_LEN`].
  pub fn push(&mut self, value: E) {
    self.emplace_with(|| value);
  }

  /// Push a new element onto the end, returning an error instead of aborting
  /// if a new block cannot be allocated
  ///
  /// On error the `BlockVec` is left unchanged and `value` is dropped.
  pub fn try_push(&mut self, value: E) -> Result<()> {
    if self.len == Self::MAX_LEN {
      return Err(BlockVecError::CapacityOverflow {
        max_len: Self::MAX_LEN,
      });
    }

    let index_metadata = index_metadata(self.len);
    if index_metadata.block_n == self.blocks.len() {
      self.try_grow()?;
    }

    // safety: the block exists, and `index_metadata.element` is a valid
    // element index for it by construction.
    unsafe {
      self
        .blocks
        .get_unchecked_mut(index_metadata.block_n)
        .set_with(index_metadata.element, || value);
    }
    self.len += 1;
    Ok(())
  }

  /// Construct a new element directly in its slot at the end, returning a
  /// reference to it
  ///
  /// If `f` panics, the length is unchanged. The capacity may have grown,
  /// since a full last block is followed by a new one before `f` is called.
  ///
  /// # Panics
  ///
  /// Panics if the new length would exceed [`Self::MAX_LEN`].
  pub fn emplace_with(&mut self, f: impl FnOnce() -> E) -> &mut E {
    assert!(
      self.len < Self::MAX_LEN,
      "length: {len} would exceed maximum: {max_len}",
      len = self.len,
      max_len = Self::MAX_LEN
    );

    let index_metadata = index_metadata(self.len);
    // The block holding `len - 1` always exists, so at most one block can be
    // missing here.
    if index_metadata.block_n == self.blocks.len() {
      self.grow();
    }

    // safety: the block exists, and `index_metadata.element` is a valid
    // element index for it by construction.
    let element = unsafe {
      self
        .blocks
        .get_unchecked_mut(index_metadata.block_n)
        .set_with(index_metadata.element, f)
    };
    self.len += 1;
    element
  }

  /// Remove the last element and return it, or return `None` if empty
  ///
  /// Blocks are never released, so pushing again reuses the same slot.
  pub fn pop(&mut self) -> Option<E> {
    if self.is_empty() {
      return None;
    }

    // safety:
    // - `len` != 0
    // - the value of `len` promises that block & element exist.
    // - `len` is decremented, so further calls will not take a value from the
    //   now uninitialised memory.
    self.len -= 1;
    let index_metadata = index_metadata(self.len);
    let element = unsafe {
      self
        .blocks
        .get_unchecked_mut(index_metadata.block_n)
        .take_element(index_metadata.element)
    };

    Some(element)
  }

  /// Remove the last element and return it
  ///
  /// Returns [`BlockVecError::Empty`] if there are no elements.
  pub fn pop_back(&mut self) -> Result<E> {
    self.pop().ok_or(BlockVecError::Empty)
  }

  /// Get the element at the index
  pub fn get(&self, index: usize) -> Option<&E> {
    if index >= self.len {
      return None;
    }

    let index_metadata = index_metadata(index);

    // safety: the value of `self.len` tells us
    // - the block exists, and
    // - item at `index` exists and is initialised within that block.
    let element = unsafe {
      self
        .blocks
        .get_unchecked(index_metadata.block_n)
        .get(index_metadata.element)
    };

    Some(element)
  }

  /// Mutably get the element at the index
  pub fn get_mut(&mut self, index: usize) -> Option<&mut E> {
    if index >= self.len {
      return None;
    }

    let index_metadata = index_metadata(index);

    // safety: the value of `self.len` tells us
    // - the block exists, and
    // - item at `index` exists and is initialised within that block.
    let element = unsafe {
      self
        .blocks
        .get_unchecked_mut(index_metadata.block_n)
        .get_mut(index_metadata.element)
    };

    Some(element)
  }

  /// Get the element at the index, or [`BlockVecError::IndexOutOfBounds`]
  pub fn at(&self, index: usize) -> Result<&E> {
    let len = self.len;
    self
      .get(index)
      .ok_or(BlockVecError::IndexOutOfBounds { index, len })
  }

  /// Mutably get the element at the index, or
  /// [`BlockVecError::IndexOutOfBounds`]
  pub fn at_mut(&mut self, index: usize) -> Result<&mut E> {
    let len = self.len;
    self
      .get_mut(index)
      .ok_or(BlockVecError::IndexOutOfBounds { index, len })
  }

  /// The first element, or [`BlockVecError::Empty`]
  pub fn front(&self) -> Result<&E> {
    self.get(0).ok_or(BlockVecError::Empty)
  }

  /// The first element mutably, or [`BlockVecError::Empty`]
  pub fn front_mut(&mut self) -> Result<&mut E> {
    self.get_mut(0).ok_or(BlockVecError::Empty)
  }

  /// The most recently pushed element, or [`BlockVecError::Empty`]
  pub fn back(&self) -> Result<&E> {
    match self.len.checked_sub(1) {
      Some(last_index) => self.get(last_index).ok_or(BlockVecError::Empty),
      None => Err(BlockVecError::Empty),
    }
  }

  /// The most recently pushed element mutably, or [`BlockVecError::Empty`]
  pub fn back_mut(&mut self) -> Result<&mut E> {
    match self.len.checked_sub(1) {
      Some(last_index) => self.get_mut(last_index).ok_or(BlockVecError::Empty),
      None => Err(BlockVecError::Empty),
    }
  }

  /// Returns an iterator over each element of the collection
  pub fn iter(&self) -> BlockVecIter<'_, E> {
    BlockVecIter::new(self)
  }

  /// Returns an iterator that allows modifying each element of the collection
  pub fn iter_mut(&mut self) -> BlockVecIterMut<'_, E> {
    BlockVecIterMut::new(self)
  }

  /// Resizes the `BlockVec` in place
  ///
  /// If `new_len` is less than `len` then the `BlockVec` is truncated. If
  /// `new_len` is greater than `len` then it is extended by repeating the
  /// supplied value.
  pub fn resize(&mut self, new_len: usize, value: E)
  where
    E: Clone,
  {
    self.resize_with(new_len, || value.clone())
  }

  /// Resizes the `BlockVec` in place
  ///
  /// If `new_len` is less than `len` then the `BlockVec` is truncated. If
  /// `new_len` is greater than `len` then it is extended using the supplied
  /// closure to generate values.
  pub fn resize_with(&mut self, new_len: usize, mut f: impl FnMut() -> E) {
    if new_len <= self.len {
      self.truncate(new_len)
    } else {
      self.reserve(new_len - self.len);
      while self.len < new_len {
        self.emplace_with(&mut f);
      }
    }
  }
}

impl<E> Default for BlockVec<E> {
  fn default() -> Self {
    BlockVec::new()
  }
}

impl<E> Index<usize> for BlockVec<E> {
  type Output = E;

  fn index(&self, index: usize) -> &Self::Output {
    match self.get(index) {
      Some(element) => element,
      None => panic!(
        "index is out of bounds, index: {index}, len: {len}",
        len = self.len
      ),
    }
  }
}

impl<E> IndexMut<usize> for BlockVec<E> {
  fn index_mut(&mut self, index: usize) -> &mut Self::Output {
    let len = self.len;
    match self.get_mut(index) {
      Some(element) => element,
      None => panic!("index is out of bounds, index: {index}, len: {len}"),
    }
  }
}

impl<'s, E> IntoIterator for &'s BlockVec<E> {
  type Item = <BlockVecIter<'s, E> as Iterator>::Item;
  type IntoIter = BlockVecIter<'s, E>;

  /// Returns an iterator over each element of the collection
  fn into_iter(self) -> BlockVecIter<'s, E> {
    self.iter()
  }
}

impl<'s, E> IntoIterator for &'s mut BlockVec<E> {
  type Item = <BlockVecIterMut<'s, E> as Iterator>::Item;
  type IntoIter = BlockVecIterMut<'s, E>;

  /// Returns an iterator that allows modifying each element of the collection
  fn into_iter(self) -> BlockVecIterMut<'s, E> {
    self.iter_mut()
  }
}

impl<E> IntoIterator for BlockVec<E> {
  type Item = <BlockVecIntoIter<E> as Iterator>::Item;
  type IntoIter = BlockVecIntoIter<E>;

  /// Returns an iterator that moves each value out of the `BlockVec` (from
  /// start to end)
  ///
  /// The BlockVec cannot be used after calling this.
  fn into_iter(self) -> BlockVecIntoIter<E> {
    BlockVecIntoIter::new(self)
  }
}

impl<E> Extend<E> for BlockVec<E> {
  fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
    for item in iter {
      self.push(item)
    }
  }
}

impl<'a, E: Copy + 'a> Extend<&'a E> for BlockVec<E> {
  fn extend<I: IntoIterator<Item = &'a E>>(&mut self, iter: I) {
    for item in iter {
      self.push(*item)
    }
  }
}

impl<E> FromIterator<E> for BlockVec<E> {
  fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
    let mut block_vec = BlockVec::new();
    block_vec.extend(iter);
    block_vec
  }
}

impl<E, const N: usize> From<[E; N]> for BlockVec<E> {
  fn from(array: [E; N]) -> Self {
    let mut block_vec = BlockVec::new();
    block_vec.reserve(N);
    block_vec.extend(array);
    block_vec
  }
}

impl<E> Clone for BlockVec<E>
where
  E: Clone,
{
  /// Returns a copy of the BlockVec
  ///
  /// Only allocates as many blocks as are needed to store the elements, so
  /// the capacity of the new BlockVec may not match the capacity of the
  /// source.
  fn clone(&self) -> Self {
    let mut dest = BlockVec::new();
    dest.clone_from(self);
    dest
  }

  /// Copy assignment of `source` into `self`
  ///
  /// Reuses the blocks already allocated in `self`, and only allocates more
  /// if `source` needs them.
  fn clone_from(&mut self, source: &Self) {
    self.truncate(0);
    self.reserve(source.len);

    // `len` is bumped one element at a time, so if a `Clone` impl panics the
    // `Drop` impl only sees initialised elements.
    for element in source {
      self.emplace_with(|| element.clone());
    }
  }
}

impl<E: PartialEq> PartialEq for BlockVec<E> {
  fn eq(&self, other: &Self) -> bool {
    self.len == other.len && self.iter().eq(other.iter())
  }
}

impl<E: Eq> Eq for BlockVec<E> {}

impl<E: fmt::Debug> fmt::Debug for BlockVec<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.iter()).finish()
  }
}

impl<E> Drop for BlockVec<E> {
  fn drop(&mut self) {
    // drop-in-place all the elements; the blocks free their own allocations
    // when `blocks` is dropped.
    self.truncate(0);
  }
}
