//! Flattening between named parameters and flat vectors.
//!
//! An [`ArrayOrdering`] assigns each variable a contiguous slice of a flat
//! vector. A [`Bijection`] combines an ordering with a reference point, so
//! that variables outside the ordering keep their reference value when a
//! flat vector is mapped back.

use std::ops::Range;

use crate::error::{ModelError, Result};
use crate::params::{ParamMap, ParamValue};

/// Name and shape of a model variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    pub name: String,
    /// Empty for scalars.
    pub dims: Vec<usize>,
    /// Discrete variables can not be part of a flat continuous vector.
    pub continuous: bool,
}

impl VarInfo {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dims: vec![],
            continuous: true,
        }
    }

    pub fn array(name: impl Into<String>, dims: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            dims,
            continuous: true,
        }
    }

    pub fn discrete(mut self) -> Self {
        self.continuous = false;
        self
    }

    /// Number of scalar elements; a scalar has one.
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    var: VarInfo,
    range: Range<usize>,
}

/// Fixed assignment of variables to slices of a flat vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayOrdering {
    slots: Vec<Slot>,
    size: usize,
}

impl ArrayOrdering {
    /// Lay out `vars` back to back in the given order.
    pub fn new(vars: impl IntoIterator<Item = VarInfo>) -> Self {
        let mut size = 0;
        let slots = vars
            .into_iter()
            .map(|var| {
                let start = size;
                size += var.size();
                Slot {
                    var,
                    range: start..size,
                }
            })
            .collect();
        Self { slots, size }
    }

    /// Length of the flat vector.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn num_vars(&self) -> usize {
        self.slots.len()
    }

    pub fn vars(&self) -> impl ExactSizeIterator<Item = &VarInfo> {
        self.slots.iter().map(|slot| &slot.var)
    }

    pub fn range(&self, name: &str) -> Option<Range<usize>> {
        self.slots
            .iter()
            .find(|slot| slot.var.name == name)
            .map(|slot| slot.range.clone())
    }
}

/// Maps between a [`ParamMap`] and the flat vectors of an [`ArrayOrdering`].
#[derive(Debug, Clone)]
pub struct Bijection {
    ordering: ArrayOrdering,
    reference: ParamMap,
}

impl Bijection {
    pub fn new(ordering: ArrayOrdering, reference: ParamMap) -> Self {
        Self {
            ordering,
            reference,
        }
    }

    pub fn ordering(&self) -> &ArrayOrdering {
        &self.ordering
    }

    pub fn reference(&self) -> &ParamMap {
        &self.reference
    }

    /// Flatten the ordered variables of `point`.
    pub fn map(&self, point: &ParamMap) -> Result<Vec<f64>> {
        let mut out = vec![0f64; self.ordering.size()];
        for slot in self.ordering.slots.iter() {
            let value = point.get(&slot.var.name).ok_or_else(|| {
                ModelError::Backend(anyhow::anyhow!(
                    "Point is missing variable {}",
                    slot.var.name
                ))
            })?;
            if value.len() != slot.range.len() {
                return Err(ModelError::ParamCount {
                    expected: slot.range.len(),
                    found: value.len(),
                });
            }
            out[slot.range.clone()].copy_from_slice(value.as_slice());
        }
        Ok(out)
    }

    /// Rebuild a point from a flat vector. Variables that are not part of
    /// the ordering are taken from the reference point.
    pub fn rmap(&self, flat: &[f64]) -> Result<ParamMap> {
        if flat.len() != self.ordering.size() {
            return Err(ModelError::ParamCount {
                expected: self.ordering.size(),
                found: flat.len(),
            });
        }
        let mut point = self.reference.clone();
        for slot in self.ordering.slots.iter() {
            let values = &flat[slot.range.clone()];
            let value = if slot.var.dims.is_empty() {
                ParamValue::Scalar(values[0])
            } else {
                ParamValue::array(slot.var.dims.clone(), values.to_vec())
            };
            point.insert(slot.var.name.clone(), value);
        }
        Ok(point)
    }

    /// Wrap a function of points into a function of flat vectors.
    pub fn mapf<'a, T>(
        &'a self,
        func: impl Fn(&ParamMap) -> Result<T> + 'a,
    ) -> impl Fn(&[f64]) -> Result<T> + 'a {
        move |flat: &[f64]| func(&self.rmap(flat)?)
    }
}
