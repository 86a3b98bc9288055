//! Named parameter values.
//!
//! Symbolic models and sampling engines both address their parameters by
//! name. A [`ParamMap`] keeps the insertion order, which is the order the
//! engine declares its parameters in.

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(f64),
    /// Row-major values with their shape.
    Array { dims: Vec<usize>, values: Vec<f64> },
}

impl ParamValue {
    pub fn array(dims: Vec<usize>, values: Vec<f64>) -> Self {
        debug_assert_eq!(dims.iter().product::<usize>(), values.len());
        ParamValue::Array { dims, values }
    }

    /// The shape of the value, empty for scalars.
    pub fn dims(&self) -> &[usize] {
        match self {
            ParamValue::Scalar(_) => &[],
            ParamValue::Array { dims, .. } => dims,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ParamValue::Scalar(_) => 1,
            ParamValue::Array { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            ParamValue::Scalar(val) => std::slice::from_ref(val),
            ParamValue::Array { values, .. } => values,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ParamValue::Scalar(val) => Some(*val),
            ParamValue::Array { .. } => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(values: Vec<f64>) -> Self {
        ParamValue::Array {
            dims: vec![values.len()],
            values,
        }
    }
}

/// Ordered mapping from parameter names to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    entries: Vec<(String, ParamValue)>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert a value, replacing an existing entry of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of scalar elements over all entries.
    pub fn num_elements(&self) -> usize {
        self.entries.iter().map(|(_, value)| value.len()).sum()
    }
}

impl<N: Into<String>, V: Into<ParamValue>> FromIterator<(N, V)> for ParamMap {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut map = ParamMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}
