//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Arithmetic mean of the values, or `None` if there are none.
pub fn mean<T>(values: &[T]) -> Option<T>
where
    T: Float
{
    if values.is_empty() {
        return None;
    }

    let sum = values.iter().fold(T::zero(), |acc, v| acc + *v);

    T::from(values.len()).map(|n| sum / n)
}

/// Difference between the largest and smallest value, or `None` if there
/// are no values.
pub fn spread<T>(values: &[T]) -> Option<T>
where
    T: Float
{
    let first = *values.first()?;

    let (min, max) = values.iter()
        .fold((first, first), |(min, max), v| (min.min(*v), max.max(*v)));

    Some(max - min)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 1f64), (0f64, 10f64), 0.5), 5.0);
        assert_eq!(lin_map((-1f64, 1f64), (0f64, 1f64), -1.0), 0.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&1.5f64, &-1.0, &1.0), 1.0);
        assert_eq!(clamp(&-1.5f64, &-1.0, &1.0), -1.0);
        assert_eq!(clamp(&0.25f64, &-1.0, &1.0), 0.25);
    }

    #[test]
    fn test_mean_spread() {
        assert_eq!(mean::<f64>(&[]), None);
        assert_eq!(spread::<f64>(&[]), None);

        assert_eq!(mean(&[1f64, 2.0, 3.0]), Some(2.0));
        assert_eq!(spread(&[3f64, -1.0, 2.0]), Some(4.0));
        assert_eq!(spread(&[7f64]), Some(0.0));
    }
}
