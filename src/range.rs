// Integer range lists used by the `*.within` and `*.any_within` checks,
// written in an index as `min:max` pairs separated by commas, for example
// `ka.req.container.run_as_user.within[100:110,200:220]`.
//
// A value is inside a RangeSpec only when it is inside every pair.

use std::collections::BTreeSet;

/// An ordered list of inclusive `(min, max)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSpec {
    ranges: Vec<(i64, i64)>,
}

impl RangeSpec {
    /// Parses a comma separated list of `min:max` pairs.
    ///
    /// Items without a `:` are ignored. Leading whitespace and a leading
    /// `+` are accepted on each bound; anything else that is not an integer
    /// makes the whole list invalid and returns `None`.
    pub fn parse(index: &str) -> Option<Self> {
        let mut ranges = Vec::new();

        for pair in index.split(',') {
            let Some((min, max)) = pair.split_once(':') else {
                continue;
            };
            let min = parse_bound(min)?;
            let max = parse_bound(max)?;
            ranges.push((min, max));
        }

        Some(RangeSpec { ranges })
    }

    /// Returns the parsed pairs.
    pub fn ranges(&self) -> &[(i64, i64)] {
        &self.ranges
    }

    /// True if `value` lies within every pair.
    pub fn contains(&self, value: i64) -> bool {
        self.ranges
            .iter()
            .all(|&(min, max)| value >= min && value <= max)
    }

    /// True if every value in the set lies within every pair.
    pub fn contains_all(&self, values: &BTreeSet<i64>) -> bool {
        values.iter().all(|&v| self.contains(v))
    }

    /// True if at least one value in the set lies within every pair.
    pub fn contains_any(&self, values: &BTreeSet<i64>) -> bool {
        values.iter().any(|&v| self.contains(v))
    }
}

fn parse_bound(bound: &str) -> Option<i64> {
    bound.trim_start().parse::<i64>().ok()
}
