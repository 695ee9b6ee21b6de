//! Small shared helpers.

use std::cmp::Ordering;

/// Returns a total ordering for two floats, sorting any `NaN` after every
/// other value.
pub fn partial_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| {
        if a.is_nan() && b.is_nan() {
            Ordering::Equal
        } else if a.is_nan() {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    })
}

/// Returns the difference between the largest and smallest of the values, or
/// `None` if there are no values.
pub fn range<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let mut min = None;
    let mut max = None;

    for v in values {
        min = Some(min.map_or(v, |m: f64| m.min(v)));
        max = Some(max.map_or(v, |m: f64| m.max(v)));
    }

    Some(max? - min?)
}

/// Formats a number in scientific notation, right-aligned to at least `width`
/// characters for column output.
pub fn format_num(num: f64, width: usize) -> String {
    format!("{:>width$}", format!("{:.5e}", num), width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_cmp() {
        assert_eq!(Ordering::Less, partial_cmp(1.0, 2.0));
        assert_eq!(Ordering::Greater, partial_cmp(2.0, 1.0));
        assert_eq!(Ordering::Equal, partial_cmp(1.0, 1.0));
        assert_eq!(Ordering::Greater, partial_cmp(f64::NAN, f64::INFINITY));
        assert_eq!(Ordering::Less, partial_cmp(f64::NEG_INFINITY, f64::NAN));
        assert_eq!(Ordering::Equal, partial_cmp(f64::NAN, f64::NAN));
    }

    #[test]
    fn test_range() {
        assert_eq!(None, range([]));
        assert_eq!(Some(0.0), range([3.0]));
        assert_eq!(Some(4.5), range([1.0, -2.0, 2.5, 0.0]));
    }

    #[test]
    fn test_format_num() {
        assert_eq!("1.50000e2", format_num(150.0, 4));
        assert_eq!("  -1.50000e2", format_num(-150.0, 12));
    }
}
