//! A multiplicity list with logarithmic indexed access.
//!
//! Represents `{c_0 x v_0, c_1 x v_1, ...}` as if every value appeared with
//! its multiplicity in one flat list.  Backed by an implicit segment tree over
//! the groups whose internal nodes hold subtree multiplicity sums, giving
//! O(log n) positional reads, deletions, group boundary queries, and
//! restoration of deleted items by their stable group id.  Groups cannot be
//! added after construction.

/// See the module documentation.
#[derive(Debug)]
pub struct RepeaterList<T> {
    values: Vec<T>,
    amounts: Vec<usize>,
    /// Binary heap layout; `sums[base + i]` mirrors `amounts[i]`.
    sums: Vec<usize>,
    base: usize,
}

impl<T> RepeaterList<T> {
    pub fn new(groups: impl IntoIterator<Item = (T, usize)>) -> Self {
        let (values, amounts): (Vec<T>, Vec<usize>) = groups.into_iter().unzip();
        let base = amounts.len().next_power_of_two().max(1);
        let mut sums = vec![0usize; 2 * base];
        sums[base..base + amounts.len()].copy_from_slice(&amounts);
        for i in (1..base).rev() {
            sums[i] = sums[2 * i] + sums[2 * i + 1];
        }
        Self {
            values,
            amounts,
            sums,
            base,
        }
    }

    /// Total number of items, multiplicities included.
    pub fn len(&self) -> usize {
        self.sums[1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of groups, including fully erased ones.
    pub fn num_groups(&self) -> usize {
        self.values.len()
    }

    /// Locate the group holding position `pos`; returns the group index and
    /// the number of items preceding the group.
    fn locate(&self, pos: usize) -> (usize, usize) {
        assert!(pos < self.len(), "index {} out of bounds ({})", pos, self.len());
        let mut node = 1;
        let mut pos = pos;
        let mut before = 0;
        while node < self.base {
            let left = 2 * node;
            if pos < self.sums[left] {
                node = left;
            } else {
                pos -= self.sums[left];
                before += self.sums[left];
                node = left + 1;
            }
        }
        (node - self.base, before)
    }

    fn update_path(&mut self, group: usize, delta: isize) {
        let mut node = self.base + group;
        while node >= 1 {
            self.sums[node] = (self.sums[node] as isize + delta) as usize;
            node /= 2;
        }
    }

    /// The value at position `pos`.
    pub fn get(&self, pos: usize) -> &T {
        let (group, _) = self.locate(pos);
        &self.values[group]
    }

    /// Erase one item at position `pos`; returns the group id for later
    /// restoration.
    pub fn erase(&mut self, pos: usize) -> usize {
        let (group, _) = self.locate(pos);
        self.amounts[group] -= 1;
        self.update_path(group, -1);
        group
    }

    /// Erase the whole group containing position `pos`; returns the number of
    /// erased items.
    pub fn erase_group(&mut self, pos: usize) -> usize {
        let (group, _) = self.locate(pos);
        let removed = self.amounts[group];
        self.amounts[group] = 0;
        self.update_path(group, -(removed as isize));
        removed
    }

    /// First position of the group containing `pos`.
    pub fn group_start(&self, pos: usize) -> usize {
        let (_, before) = self.locate(pos);
        before
    }

    /// Last position of the group containing `pos`.
    pub fn group_end(&self, pos: usize) -> usize {
        let (group, before) = self.locate(pos);
        before + self.amounts[group] - 1
    }

    /// Restore one previously erased item of the given group.
    pub fn restore_item_of_group(&mut self, group_id: usize) {
        assert!(
            group_id < self.values.len(),
            "invalid group id {} ({} groups)",
            group_id,
            self.values.len()
        );
        self.amounts[group_id] += 1;
        self.update_path(group_id, 1);
    }

    /// Flatten into the represented sequence; test helper.
    #[cfg(test)]
    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut out = Vec::with_capacity(self.len());
        for (value, &amount) in self.values.iter().zip(&self.amounts) {
            out.extend(std::iter::repeat(value.clone()).take(amount));
        }
        out
    }
}
