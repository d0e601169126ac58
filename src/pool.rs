//! Growable block arena
//!
//! Values are pushed into fixed-capacity blocks. When a block fills, a new
//! one twice its size is added, so existing values never move and every
//! handle stays valid until the pool is dropped. The number of blocks is
//! capped at [`MAX_BLOCKS`].
//!
//! [`DataPool::into_list`] freezes the arena into a [`PoolList`] that
//! iterates values in allocation order.

use crate::error::{MmdbError, Result};

/// Maximum number of blocks a pool may grow to
pub const MAX_BLOCKS: usize = 32;

/// Handle to a value in a [`DataPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    block: u8,
    slot: u32,
}

/// Block arena with doubling growth
#[derive(Debug)]
pub struct DataPool<T> {
    blocks: Vec<Vec<T>>,
    /// Capacity of the newest block
    block_size: usize,
    next_block_size: usize,
}

impl<T> DataPool<T> {
    /// Create an empty pool whose first block holds `initial_size` values.
    ///
    /// # Errors
    ///
    /// [`MmdbError::OutOfMemory`] if `initial_size` is zero.
    pub fn new(initial_size: usize) -> Result<Self> {
        if initial_size == 0 {
            return Err(MmdbError::OutOfMemory(
                "pool block size must be nonzero".to_string(),
            ));
        }
        Ok(DataPool {
            blocks: Vec::new(),
            block_size: 0,
            next_block_size: initial_size,
        })
    }

    /// Store `value`, returning its handle.
    ///
    /// # Errors
    ///
    /// [`MmdbError::OutOfMemory`] when a new block is needed but the pool
    /// already has [`MAX_BLOCKS`] blocks, the block size overflows, or the
    /// allocation fails.
    pub fn alloc(&mut self, value: T) -> Result<NodeId> {
        let full = self
            .blocks
            .last()
            .map_or(true, |block| block.len() >= self.block_size);
        if full {
            self.add_block()?;
        }

        let block_index = self.blocks.len() - 1;
        let block = &mut self.blocks[block_index];
        let slot = block.len();
        block.push(value);
        Ok(NodeId {
            block: block_index as u8,
            slot: slot as u32,
        })
    }

    fn add_block(&mut self) -> Result<()> {
        if self.blocks.len() >= MAX_BLOCKS {
            return Err(MmdbError::OutOfMemory(format!(
                "pool exceeded {} blocks",
                MAX_BLOCKS
            )));
        }

        let size = self.next_block_size;
        let next = size
            .checked_mul(2)
            .ok_or_else(|| MmdbError::OutOfMemory("pool block size overflow".to_string()))?;

        let mut block = Vec::new();
        block.try_reserve_exact(size).map_err(|e| {
            MmdbError::OutOfMemory(format!(
                "cannot allocate pool block of {} values: {}",
                size, e
            ))
        })?;

        self.blocks.push(block);
        self.block_size = size;
        self.next_block_size = next;
        Ok(())
    }

    /// Borrow a value
    pub fn get(&self, id: NodeId) -> &T {
        &self.blocks[usize::from(id.block)][id.slot as usize]
    }

    /// Mutably borrow a value
    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.blocks[usize::from(id.block)][id.slot as usize]
    }

    /// Number of values stored
    pub fn len(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    /// True if nothing was allocated
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of blocks in use
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Freeze the pool into an allocation-ordered list
    pub fn into_list(self) -> PoolList<T> {
        let len = self.len();
        PoolList {
            blocks: self.blocks,
            len,
        }
    }
}

/// Values of a frozen [`DataPool`] in allocation order
#[derive(Debug)]
pub struct PoolList<T> {
    blocks: Vec<Vec<T>>,
    len: usize,
}

impl<T> PoolList<T> {
    /// Number of values
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the list is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of arena blocks backing the list
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Value at position `index` in allocation order
    pub fn get(&self, index: usize) -> Option<&T> {
        let mut remaining = index;
        for block in &self.blocks {
            if remaining < block.len() {
                return Some(&block[remaining]);
            }
            remaining -= block.len();
        }
        None
    }

    /// First value
    pub fn first(&self) -> Option<&T> {
        self.blocks.first().and_then(|b| b.first())
    }

    /// Iterate values in allocation order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.blocks.iter().flat_map(|b| b.iter())
    }
}

impl<'l, T> IntoIterator for &'l PoolList<T> {
    type Item = &'l T;
    type IntoIter = std::iter::Flatten<std::slice::Iter<'l, Vec<T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter().flatten()
    }
}
