use std::{collections::HashMap, hash::Hash, mem};

use log::debug;

use crate::{
    error::{OptimErr, Result},
    ops::NumericOps,
};

/// Per parameter group update counters.
///
/// Updates without a key are counted under a single anonymous slot so they still
/// advance the learning rate schedule without persisting any buffers.
#[derive(Debug)]
pub struct UpdateCounts<K> {
    keyed: HashMap<K, usize>,
    anonymous: usize,
}

impl<K: Eq + Hash + Clone> UpdateCounts<K> {
    /// Creates a new empty `UpdateCounts`.
    pub fn new() -> Self {
        Self {
            keyed: HashMap::new(),
            anonymous: 0,
        }
    }

    /// Increments the counter of `key`.
    ///
    /// # Arguments
    /// * `key` - The parameter group, `None` for the anonymous slot.
    ///
    /// # Returns
    /// The counter value after the increment, always at least `1`.
    pub fn increment(&mut self, key: Option<&K>) -> usize {
        let Some(key) = key else {
            self.anonymous += 1;
            return self.anonymous;
        };

        if let Some(count) = self.keyed.get_mut(key) {
            *count += 1;
            return *count;
        }

        self.keyed.insert(key.clone(), 1);
        1
    }

    /// Returns how many updates `key` has seen, `0` if it was never updated.
    pub fn get(&self, key: Option<&K>) -> usize {
        match key {
            Some(key) => self.keyed.get(key).copied().unwrap_or(0),
            None => self.anonymous,
        }
    }

    /// Returns the largest counter across every slot, `0` if nothing was updated yet.
    pub fn max(&self) -> usize {
        self.keyed
            .values()
            .copied()
            .chain([self.anonymous])
            .max()
            .unwrap_or(0)
    }
}

impl<K: Eq + Hash + Clone> Default for UpdateCounts<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazily allocated per-key buffers of a single kind.
///
/// Once a buffer exists for a key its length is frozen, requests with any other
/// length are rejected.
#[derive(Debug)]
pub struct Buffers<K> {
    what: &'static str,
    slots: HashMap<K, Box<[f32]>>,
}

impl<K: Eq + Hash + Clone> Buffers<K> {
    /// Creates a new `Buffers`.
    ///
    /// # Arguments
    /// * `what` - The name of the buffer kind, used in logs and errors.
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            slots: HashMap::new(),
        }
    }

    /// Checks that the buffer of `key`, if any, holds `len` elements.
    ///
    /// # Returns
    /// A `SizeMismatch` error if an existing buffer has a different length.
    pub fn check_len(&self, key: &K, len: usize) -> Result<()> {
        match self.slots.get(key) {
            Some(buf) => OptimErr::check_len(self.what, len, buf.len()),
            None => Ok(()),
        }
    }

    /// Returns the buffer of `key`, allocating a zeroed one on first use.
    ///
    /// # Arguments
    /// * `key` - The parameter group.
    /// * `len` - The expected length of the buffer.
    /// * `ops` - Allocates the buffer when missing.
    ///
    /// # Returns
    /// The buffer or a `SizeMismatch` error if it exists with a different length.
    pub fn get_or_allocate<O: NumericOps>(
        &mut self,
        key: &K,
        len: usize,
        ops: &O,
    ) -> Result<&mut [f32]> {
        let what = self.what;
        let buf = self.slots.entry(key.clone()).or_insert_with(|| {
            debug!(what = what, len = len; "allocating optimizer buffer");
            ops.allocate(len)
        });

        OptimErr::check_len(what, len, buf.len())?;
        Ok(&mut **buf)
    }

    /// Returns the buffer of `key` if it was allocated.
    pub fn get(&self, key: &K) -> Option<&[f32]> {
        self.slots.get(key).map(|buf| &**buf)
    }

    /// Returns the amount of allocated buffers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns whether no buffer was allocated yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Optional running averages of the weights, one per parameter group.
#[derive(Debug)]
pub struct RunningAverages<K> {
    buffers: Option<Buffers<K>>,
}

impl<K: Eq + Hash + Clone> RunningAverages<K> {
    /// Creates a new `RunningAverages`.
    ///
    /// # Arguments
    /// * `track` - Whether averages should be kept at all.
    pub fn new(track: bool) -> Self {
        let buffers = track.then(|| Buffers::new("running average"));
        Self { buffers }
    }

    /// Returns whether this instance keeps averages.
    pub fn is_tracking(&self) -> bool {
        self.buffers.is_some()
    }

    /// Checks that the average of `key`, if any, holds `len` elements.
    pub fn check_len(&self, key: &K, len: usize) -> Result<()> {
        match &self.buffers {
            Some(buffers) => buffers.check_len(key, len),
            None => Ok(()),
        }
    }

    /// Folds the current `weights` into the average of `key`.
    ///
    /// Does nothing when averages aren't tracked.
    ///
    /// # Arguments
    /// * `key` - The parameter group.
    /// * `weights` - The freshly updated weights.
    /// * `nr_upd` - The update counter of `key`.
    /// * `ops` - The numeric kernels.
    pub fn update<O: NumericOps>(
        &mut self,
        key: &K,
        weights: &[f32],
        nr_upd: usize,
        ops: &O,
    ) -> Result<()> {
        let Some(buffers) = &mut self.buffers else {
            return Ok(());
        };

        let averages = buffers.get_or_allocate(key, weights.len(), ops)?;
        ops.update_averages(averages, weights, nr_upd);
        Ok(())
    }

    /// Returns the average of `key` if it's tracked.
    pub fn get(&self, key: &K) -> Option<&[f32]> {
        self.buffers.as_ref()?.get(key)
    }

    /// Exchanges the contents of `weights` and the average of `key`.
    ///
    /// Swapping twice restores the original weights.
    ///
    /// # Returns
    /// Whether a swap happened or a `SizeMismatch` error.
    pub fn swap(&mut self, key: &K, weights: &mut [f32]) -> Result<bool> {
        let Some(buffers) = &mut self.buffers else {
            return Ok(false);
        };

        let Some(averages) = buffers.slots.get_mut(key) else {
            return Ok(false);
        };

        OptimErr::check_len("running average", weights.len(), averages.len())?;

        averages
            .iter_mut()
            .zip(weights.iter_mut())
            .for_each(|(avg, w)| mem::swap(avg, w));

        Ok(true)
    }

    /// Returns the amount of averages allocated so far.
    pub fn len(&self) -> usize {
        self.buffers.as_ref().map_or(0, Buffers::len)
    }

    /// Returns whether no average was allocated yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
