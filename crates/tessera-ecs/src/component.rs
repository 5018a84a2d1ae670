/// Marker trait for types that can be stored as components.
pub trait Component: 'static + Send + Sync {}

/// Blanket implementation: any `'static + Send + Sync` type is a valid component.
impl<T: 'static + Send + Sync> Component for T {}

/// Sparse-set map from entity slot index to a value. O(1) insert/remove/lookup
/// and dense iteration.
pub struct SparseSet<T> {
    /// Maps entity index → dense index. `None` means the entity has no value.
    sparse: Vec<Option<usize>>,
    /// Packed values.
    dense: Vec<T>,
    /// Entity indices corresponding to each dense slot.
    entities: Vec<u32>,
}

impl<T> SparseSet<T> {
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Insert or replace the value for `index`, returning the stored value.
    /// The flag is `true` when the entry is new.
    pub fn insert(&mut self, index: u32, value: T) -> (&mut T, bool) {
        let idx = index as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, None);
        }
        let slot = self.sparse[idx];
        match slot {
            Some(dense_idx) => {
                self.dense[dense_idx] = value;
                (&mut self.dense[dense_idx], false)
            }
            None => {
                let dense_idx = self.dense.len();
                self.sparse[idx] = Some(dense_idx);
                self.dense.push(value);
                self.entities.push(index);
                (&mut self.dense[dense_idx], true)
            }
        }
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        let dense_idx = (*self.sparse.get(index as usize)?)?;
        Some(&self.dense[dense_idx])
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        let dense_idx = (*self.sparse.get(index as usize)?)?;
        Some(&mut self.dense[dense_idx])
    }

    /// Remove and return the value for `index`.
    pub fn take(&mut self, index: u32) -> Option<T> {
        let dense_idx = self.sparse.get_mut(index as usize)?.take()?;
        let value = self.dense.swap_remove(dense_idx);
        self.entities.swap_remove(dense_idx);
        // Re-point the entry that was moved into the hole.
        if let Some(&moved) = self.entities.get(dense_idx) {
            self.sparse[moved as usize] = Some(dense_idx);
        }
        Some(value)
    }

    pub fn contains(&self, index: u32) -> bool {
        matches!(self.sparse.get(index as usize), Some(Some(_)))
    }

    /// Iterate over all (entity_index, &value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    /// Iterate over all (entity_index, &mut value) pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.entities.iter().copied().zip(self.dense.iter_mut())
    }

    /// The dense array of all entity indices that have a value.
    pub fn entity_indices(&self) -> &[u32] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
