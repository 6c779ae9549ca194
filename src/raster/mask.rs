//! Named boolean masks over a raster's spatial extent

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Name of the mask registered at open time from the no-data sentinel
pub const NO_DATA_MASK: &str = "no_data";

/// Boolean masks keyed by caller-chosen names
///
/// Every mask covers the raster's (lines, columns) extent, so any registered
/// mask also shares the shape of every earlier one. Masks are stored verbatim.
#[derive(Debug, Clone)]
pub struct MaskRegistry {
    extent: (usize, usize),
    masks: BTreeMap<String, Array2<bool>>,
}

impl MaskRegistry {
    pub fn new(lines: usize, columns: usize) -> Self {
        Self {
            extent: (lines, columns),
            masks: BTreeMap::new(),
        }
    }

    /// Registers `mask` under `name`, replacing any previous mask of that name
    pub fn insert(&mut self, name: &str, mask: Array2<bool>) -> Result<()> {
        let shape = mask.dim();
        if shape != self.extent {
            return Err(Error::ShapeMismatch(format!(
                "mask '{}' has shape {:?}, raster extent is {:?}",
                name, shape, self.extent
            )));
        }
        self.masks.insert(name.to_string(), mask);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Array2<bool>> {
        self.masks
            .get(name)
            .ok_or_else(|| Error::UnknownMask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.masks.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Array2<bool>> {
        self.masks.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.masks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Selects the entries of `values` where the named mask is true, in
    /// row-major order
    pub fn apply<T: Clone>(&self, name: &str, values: &Array2<T>) -> Result<Array1<T>> {
        let mask = self.get(name)?;
        if mask.dim() != values.dim() {
            return Err(Error::ShapeMismatch(format!(
                "mask '{}' has shape {:?}, values have {:?}",
                name,
                mask.dim(),
                values.dim()
            )));
        }
        Ok(values
            .iter()
            .zip(mask.iter())
            .filter(|(_, keep)| **keep)
            .map(|(v, _)| v.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_insert_and_get() {
        let mut registry = MaskRegistry::new(2, 2);
        registry.insert("water", array![[true, false], [false, true]]).unwrap();
        assert!(registry.contains("water"));
        assert!(registry.get("water").unwrap()[[1, 1]]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["water"]);
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let mut registry = MaskRegistry::new(2, 2);
        let result = registry.insert("bad", Array2::from_elem((3, 2), true));
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overwrite_keeps_extent() {
        let mut registry = MaskRegistry::new(2, 2);
        registry.insert("water", Array2::from_elem((2, 2), true)).unwrap();
        assert!(registry.insert("water", Array2::from_elem((1, 1), false)).is_err());
        assert!(registry.get("water").unwrap().iter().all(|&m| m));

        registry.insert("water", Array2::from_elem((2, 2), false)).unwrap();
        assert!(registry.get("water").unwrap().iter().all(|&m| !m));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_mask() {
        let registry = MaskRegistry::new(2, 2);
        assert!(matches!(registry.get("missing"), Err(Error::UnknownMask(_))));
    }

    #[test]
    fn test_apply_row_major() {
        let mut registry = MaskRegistry::new(2, 3);
        registry
            .insert("m", array![[true, false, true], [false, true, true]])
            .unwrap();
        let values = array![[1, 2, 3], [4, 5, 6]];
        let selected = registry.apply("m", &values).unwrap();
        assert_eq!(selected.to_vec(), vec![1, 3, 5, 6]);
    }

    #[test]
    fn test_apply_shape_mismatch() {
        let mut registry = MaskRegistry::new(2, 2);
        registry.insert("m", Array2::from_elem((2, 2), true)).unwrap();
        let values = Array2::<u8>::zeros((2, 3));
        assert!(registry.apply("m", &values).is_err());
    }
}
