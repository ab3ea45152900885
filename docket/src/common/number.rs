use serde_json::Number;
use std::cmp::Ordering;

/// A JSON number compared exactly: integers are never rounded through `f64`,
/// so `9007199254740993` stays above `9007199254740992.0`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ExactNumber {
    Integer(i128),
    Float(f64),
}

impl ExactNumber {
    pub(crate) fn from_number(n: &Number) -> Option<ExactNumber> {
        if let Some(i) = n.as_i64() {
            return Some(ExactNumber::Integer(i as i128));
        }
        if let Some(u) = n.as_u64() {
            return Some(ExactNumber::Integer(u as i128));
        }
        n.as_f64().filter(|f| f.is_finite()).map(ExactNumber::Float)
    }
}

impl PartialEq for ExactNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ExactNumber {}

impl PartialOrd for ExactNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExactNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ExactNumber::Integer(a), ExactNumber::Integer(b)) => a.cmp(b),
            (ExactNumber::Float(a), ExactNumber::Float(b)) => fold_zero(*a).total_cmp(&fold_zero(*b)),
            (ExactNumber::Integer(a), ExactNumber::Float(b)) => cmp_integer_float(*a, *b),
            (ExactNumber::Float(a), ExactNumber::Integer(b)) => cmp_integer_float(*b, *a).reverse(),
        }
    }
}

fn fold_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

// 2^127 is exactly representable; every finite float inside (-2^127, 2^127)
// truncates to an i128 without loss.
const I128_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

fn cmp_integer_float(integer: i128, float: f64) -> Ordering {
    if float >= I128_BOUND {
        return Ordering::Less;
    }
    if float < -I128_BOUND {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    match integer.cmp(&(whole as i128)) {
        Ordering::Equal if float > whole => Ordering::Less,
        Ordering::Equal if float < whole => Ordering::Greater,
        ordering => ordering,
    }
}
