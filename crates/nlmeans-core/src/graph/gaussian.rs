use ndarray::Array2;

/// Normalized 2D Gaussian over `[0, size) x [0, size)` used to weigh the
/// offsets inside a patch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianKernel {
    size: usize,
    sigma: f32,
}

impl GaussianKernel {
    pub fn new(size: usize, sigma: f32) -> Self {
        Self { size, sigma }
    }

    /// Unnormalized weight, peaking at the integer center `(size - 1) / 2`.
    pub fn raw(&self, i: usize, j: usize) -> f32 {
        let center = ((self.size - 1) / 2) as f32;
        let di = i as f32 - center;
        let dj = j as f32 - center;
        (-(di * di + dj * dj) / (2.0 * self.sigma * self.sigma)).exp()
    }

    /// Sum of `raw` over the full domain.
    pub fn normalizer(&self) -> f32 {
        let mut sum = 0.0f32;
        for j in 0..self.size {
            for i in 0..self.size {
                sum += self.raw(i, j);
            }
        }
        sum
    }

    /// Normalized weight at `(i, j)`, recomputing the normalizer on every call.
    pub fn value(&self, i: usize, j: usize) -> f32 {
        self.raw(i, j) / self.normalizer()
    }

    /// The whole table, indexed `[[j, i]]`. Entries sum to 1.
    pub fn materialize(&self) -> Array2<f32> {
        let total = self.normalizer();
        Array2::from_shape_fn((self.size, self.size), |(j, i)| self.raw(i, j) / total)
    }
}

/// Read access to the Gaussian stage, either stored or recomputed on demand.
#[derive(Clone, Copy, Debug)]
pub enum KernelAccess<'a> {
    Table(&'a Array2<f32>),
    Inline(&'a GaussianKernel),
}

impl KernelAccess<'_> {
    pub fn at(&self, i: usize, j: usize) -> f32 {
        match self {
            Self::Table(table) => table[[j, i]],
            Self::Inline(kernel) => kernel.value(i, j),
        }
    }
}
