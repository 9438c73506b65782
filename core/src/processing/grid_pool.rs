use ndarray::Array2;

/// Bounded pool of grid allocations recycled from evicted pies.
pub struct GridPool {
    grids: Vec<(Array2<f32>, Array2<u32>)>,
    max_capacity: usize,
}

impl GridPool {
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            grids: Vec::with_capacity(max_capacity),
            max_capacity,
        }
    }

    /// Takes a zeroed `side x side` grid pair, reusing pooled storage when a
    /// grid of the right shape is available.
    pub fn checkout(&mut self, side: usize) -> (Array2<f32>, Array2<u32>) {
        while let Some((mut values, mut counts)) = self.grids.pop() {
            if values.dim() == (side, side) && counts.dim() == (side, side) {
                values.fill(0.0);
                counts.fill(0);
                return (values, counts);
            }
        }
        (Array2::zeros((side, side)), Array2::zeros((side, side)))
    }

    /// Returns a grid pair for reuse; dropped once the pool is full.
    pub fn release(&mut self, values: Array2<f32>, counts: Array2<u32>) {
        if self.grids.len() < self.max_capacity {
            self.grids.push((values, counts));
        }
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn reset(&mut self) {
        self.grids.clear();
    }
}
