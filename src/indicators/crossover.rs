/// Crossover detection between two aligned series
///
/// `a` crosses above `b` at `i` when `a[i-1] <= b[i-1]` and `a[i] > b[i]`.
/// Positions where any of the four values is undefined never cross.
pub fn crossed_above(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<bool> {
    crossings(a, b, |prev_a, prev_b, cur_a, cur_b| prev_a <= prev_b && cur_a > cur_b)
}

/// `a` crosses below `b` at `i` when `a[i-1] >= b[i-1]` and `a[i] < b[i]`
pub fn crossed_below(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<bool> {
    crossings(a, b, |prev_a, prev_b, cur_a, cur_b| prev_a >= prev_b && cur_a < cur_b)
}

fn crossings(
    a: &[Option<f64>],
    b: &[Option<f64>],
    crossed: impl Fn(f64, f64, f64, f64) -> bool,
) -> Vec<bool> {
    let n = a.len().min(b.len());
    let mut out = vec![false; n];

    for i in 1..n {
        if let (Some(pa), Some(pb), Some(ca), Some(cb)) = (a[i - 1], b[i - 1], a[i], b[i]) {
            out[i] = crossed(pa, pb, ca, cb);
        }
    }

    out
}

/// Lift a plain series into the optional form the crossover helpers take
pub fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|v| Some(*v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossed_above() {
        let a = defined(&[1.0, 2.0, 3.0, 4.0]);
        let b = defined(&[2.0, 2.0, 2.0, 2.0]);

        // Touching at index 1 does not cross; leaving upward at 2 does
        assert_eq!(crossed_above(&a, &b), vec![false, false, true, false]);
        assert_eq!(crossed_below(&a, &b), vec![false; 4]);
    }

    #[test]
    fn test_crossed_below() {
        let a = defined(&[3.0, 1.0, 3.0, 1.0]);
        let b = defined(&[2.0, 2.0, 2.0, 2.0]);

        assert_eq!(crossed_below(&a, &b), vec![false, true, false, true]);
        assert_eq!(crossed_above(&a, &b), vec![false, false, true, false]);
    }

    #[test]
    fn test_undefined_values_never_cross() {
        let a = vec![None, Some(3.0), Some(1.0)];
        let b = vec![Some(2.0), Some(2.0), None];

        assert_eq!(crossed_above(&a, &b), vec![false; 3]);
        assert_eq!(crossed_below(&a, &b), vec![false; 3]);
    }
}
