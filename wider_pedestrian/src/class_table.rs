//! Class name / index / category-id mappings.

use std::collections::HashMap;

use cocoindex::CocoCategory;

/// Reserved class index 0.
pub const BACKGROUND: &str = "__background__";

/// Ordered class list with the reserved background entry at index 0, plus
/// bijective mappings between class name, dense class index, and external
/// COCO category id. Built once at dataset construction; immutable.
#[derive(Debug, Clone)]
pub struct ClassTable {
    names: Vec<String>,
    index_by_name: HashMap<String, usize>,
    category_id_by_name: HashMap<String, i64>,
    index_by_category_id: HashMap<i64, usize>,
}

impl ClassTable {
    pub fn new(categories: &[CocoCategory]) -> Self {
        let mut names = Vec::with_capacity(categories.len() + 1);
        names.push(BACKGROUND.to_string());
        names.extend(categories.iter().map(|c| c.name.clone()));

        let index_by_name = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let category_id_by_name = categories
            .iter()
            .map(|c| (c.name.clone(), c.id))
            .collect();
        // Background occupies index 0, so category k maps to index k+1.
        let index_by_category_id = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i + 1))
            .collect();

        Self {
            names,
            index_by_name,
            category_id_by_name,
            index_by_category_id,
        }
    }

    /// Total class count, background included.
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }

    /// External category id for a class name (background has none).
    pub fn category_id(&self, name: &str) -> Option<i64> {
        self.category_id_by_name.get(name).copied()
    }

    /// Dense class index for an external category id.
    pub fn class_of_category(&self, category_id: i64) -> Option<usize> {
        self.index_by_category_id.get(&category_id).copied()
    }
}
