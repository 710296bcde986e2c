//! Shape of an array sample.

use smallvec::SmallVec;

/// Dimensions of an array sample, in elements.
///
/// Rank 0 means "one element". Most arrays are rank 1.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    dims: SmallVec<[usize; 4]>,
}

impl Dimensions {
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    pub fn d1(size: usize) -> Self {
        Self { dims: smallvec::smallvec![size] }
    }

    pub fn from_slice(sizes: &[usize]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.dims
    }

    /// Product of all sizes (1 for rank 0).
    pub fn num_points(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }
}

impl From<usize> for Dimensions {
    fn from(size: usize) -> Self {
        Self::d1(size)
    }
}

impl From<&[usize]> for Dimensions {
    fn from(sizes: &[usize]) -> Self {
        Self::from_slice(sizes)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar() {
        let d = Dimensions::scalar();
        assert_eq!(d.rank(), 0);
        assert!(d.is_scalar());
        assert_eq!(d.num_points(), 1);
        assert_eq!(d.to_string(), "[]");
    }

    #[test]
    fn test_shapes() {
        let d: Dimensions = 10.into();
        assert_eq!(d.rank(), 1);
        assert_eq!(d.num_points(), 10);

        let d = Dimensions::from_slice(&[640, 480]);
        assert_eq!(d.num_points(), 640 * 480);
        assert_eq!(d.to_string(), "[640 x 480]");

        assert_eq!(Dimensions::from_slice(&[4, 0, 2]).num_points(), 0);
    }
}
