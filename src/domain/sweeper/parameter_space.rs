use crate::domain::sweeper::combination::{Combination, ParamValue};

/// Named parameter ranges, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSpace {
    ranges: Vec<(String, Vec<ParamValue>)>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a range, or replaces the range of an already declared parameter.
    /// Duplicate values are dropped, first occurrence wins.
    pub fn with(mut self, name: impl Into<String>, values: impl IntoIterator<Item = ParamValue>) -> Self {
        let name = name.into();
        let mut unique: Vec<ParamValue> = Vec::new();
        for value in values {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }

        match self.ranges.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, range)) => *range = unique,
            None => self.ranges.push((name, unique)),
        }
        self
    }

    pub fn ranges(&self) -> &[(String, Vec<ParamValue>)] {
        &self.ranges
    }

    /// Number of combinations: the product of the range sizes.
    pub fn len(&self) -> usize {
        if self.ranges.is_empty() {
            return 0;
        }
        self.ranges.iter().map(|(_, values)| values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product; the first declared parameter varies slowest.
    pub fn combinations(&self) -> Vec<Combination> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut partials: Vec<Vec<(String, ParamValue)>> = vec![Vec::new()];
        for (name, values) in &self.ranges {
            partials = partials
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |value| {
                        let mut next = partial.clone();
                        next.push((name.clone(), value.clone()));
                        next
                    })
                })
                .collect();
        }
        partials.into_iter().map(Combination::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_parameter_varies_slowest() {
        let space = ParameterSpace::new().with("iteration", [1, 2].map(ParamValue::Int)).with("concurrency", [10, 50].map(ParamValue::Int));
        let order: Vec<(i64, i64)> =
            space.combinations().iter().map(|c| (c.get_int("iteration").unwrap(), c.get_int("concurrency").unwrap())).collect();
        assert_eq!(order, vec![(1, 10), (1, 50), (2, 10), (2, 50)]);
    }

    #[test]
    fn duplicate_values_are_collapsed() {
        let space = ParameterSpace::new().with("concurrency", [10, 10, 20].map(ParamValue::Int));
        assert_eq!(space.len(), 2);
    }

    #[test]
    fn empty_range_yields_nothing() {
        let space = ParameterSpace::new().with("iteration", [1].map(ParamValue::Int)).with("concurrency", Vec::new());
        assert!(space.combinations().is_empty());
    }
}
