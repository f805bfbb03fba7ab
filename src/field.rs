//! Ghosted local field storage and the two-slot double buffer.

use std::ops::{Index, IndexMut};

use crate::partition::{Partition, Side};

/// One rank's slice plus its two ghost cells.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalField {
    values: Vec<f64>,
}

impl LocalField {
    /// Zero-initialised field of `local_size` cells (ghosts included).
    pub fn zeros(local_size: usize) -> Self {
        Self {
            values: vec![0.0; local_size],
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Owned cells only.
    pub fn owned(&self) -> &[f64] {
        &self.values[1..self.values.len() - 1]
    }

    pub fn owned_mut(&mut self) -> &mut [f64] {
        let n = self.values.len();
        &mut self.values[1..n - 1]
    }

    pub fn ghost(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.values[0],
            Side::Right => self.values[self.values.len() - 1],
        }
    }

    pub fn set_ghost(&mut self, side: Side, value: f64) {
        let idx = match side {
            Side::Left => 0,
            Side::Right => self.values.len() - 1,
        };
        self.values[idx] = value;
    }

    /// Start-up hot region: rank 0 sets owned indices `1 .. local_data_size / 2`
    /// to `value`; every other rank stays zero.
    pub fn seed_hot_region(&mut self, partition: &Partition, value: f64) {
        if partition.rank != 0 {
            return;
        }
        for i in 1..partition.local_data_size / 2 {
            self.values[i] = value;
        }
    }

}

impl Index<usize> for LocalField {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.values[i]
    }
}

impl IndexMut<usize> for LocalField {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.values[i]
    }
}

/// Two exclusively owned field slots and the index of the "current" one.
///
/// Swapping toggles the index; no data is copied. The slot that is not
/// current is the "next" write target.
#[derive(Clone, Debug)]
pub struct DoubleBuffer {
    slots: [LocalField; 2],
    current: usize,
}

impl DoubleBuffer {
    /// Both slots zeroed.
    pub fn new(local_size: usize) -> Self {
        Self::from_current(LocalField::zeros(local_size))
    }

    /// `current` becomes slot 0, slot 1 is a zeroed field of the same length.
    pub fn from_current(current: LocalField) -> Self {
        let next = LocalField::zeros(current.len());
        Self {
            slots: [current, next],
            current: 0,
        }
    }

    pub fn current(&self) -> &LocalField {
        &self.slots[self.current]
    }

    pub fn next(&self) -> &LocalField {
        &self.slots[1 - self.current]
    }

    /// `(current, next)` borrowed mutably at once.
    pub fn split_mut(&mut self) -> (&mut LocalField, &mut LocalField) {
        let (a, b) = self.slots.split_at_mut(1);
        if self.current == 0 {
            (&mut a[0], &mut b[0])
        } else {
            (&mut b[0], &mut a[0])
        }
    }

    pub fn swap(&mut self) {
        self.current ^= 1;
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_region_only_on_rank_zero() {
        let p0 = Partition::new(20, 2, 0).unwrap();
        let mut f = LocalField::zeros(p0.local_size);
        f.seed_hot_region(&p0, 10.0);
        // local_data_size = 10 -> indices 1..5
        assert_eq!(f.owned(), &[10.0, 10.0, 10.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(f.ghost(Side::Left), 0.0);

        let p1 = Partition::new(20, 2, 1).unwrap();
        let mut g = LocalField::zeros(p1.local_size);
        g.seed_hot_region(&p1, 10.0);
        assert!(g.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn swap_toggles_roles_without_copying() {
        let mut buf = DoubleBuffer::from_current(LocalField::from_values(vec![0.0, 1.0, 2.0, 0.0]));
        buf.split_mut().1[1] = 7.0;
        buf.swap();
        assert_eq!(buf.current()[1], 7.0);
        assert_eq!(buf.next()[1], 1.0);
        buf.swap();
        assert_eq!(buf.current()[2], 2.0);
    }

    #[test]
    fn split_mut_follows_current() {
        let mut buf = DoubleBuffer::new(4);
        buf.swap();
        {
            let (cur, next) = buf.split_mut();
            cur[1] = 1.0;
            next[1] = 2.0;
        }
        assert_eq!(buf.current()[1], 1.0);
        assert_eq!(buf.next()[1], 2.0);
        assert_eq!(buf.current().as_slice(), &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn ghosts() {
        let mut f = LocalField::zeros(5);
        f.set_ghost(Side::Right, 3.5);
        f.set_ghost(Side::Left, -1.0);
        assert_eq!(f[4], 3.5);
        assert_eq!(f[0], -1.0);
        assert_eq!(f.ghost(Side::Right), 3.5);
    }
}
