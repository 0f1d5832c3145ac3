use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::component::{ComponentDescriptor, EncodedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl CellKey {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

/// Turns a position into a cell key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyQuantizer {
    /// `round(v / precision)` per axis, unclamped.
    Precision(f64),
    /// Bit pattern of each coordinate, so only coincident points share a cell.
    Exact,
}

impl KeyQuantizer {
    pub fn key(&self, x: f64, y: f64, z: f64) -> CellKey {
        match *self {
            KeyQuantizer::Precision(precision) => CellKey::new(
                (x / precision).round() as i64,
                (y / precision).round() as i64,
                (z / precision).round() as i64,
            ),
            KeyQuantizer::Exact => {
                CellKey::new(x.to_bits() as i64, y.to_bits() as i64, z.to_bits() as i64)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub point_count: u64,
    sums: Vec<f64>,
}

impl Cell {
    fn new(component_count: usize) -> Self {
        Self {
            point_count: 0,
            sums: vec![0.0; component_count],
        }
    }

    pub fn add_value(&mut self, component_index: usize, value: f64) {
        self.sums[component_index] += value;
    }

    pub fn increment_point_count(&mut self) {
        self.point_count += 1;
    }

    /// Mean of one component over the points merged so far.
    pub fn mean(&self, component_index: usize) -> f64 {
        if self.point_count == 0 {
            0.0
        } else {
            self.sums[component_index] / self.point_count as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedCell {
    pub key: CellKey,
    pub point_count: u64,
    pub values: Vec<EncodedValue>,
}

/// Voxel grid of one scan. Cells keep their insertion order and are never removed.
#[derive(Debug, Clone)]
pub struct CellGrid {
    quantizer: KeyQuantizer,
    components: Vec<ComponentDescriptor>,
    index: HashMap<CellKey, usize>,
    cells: Vec<(CellKey, Cell)>,
}

impl CellGrid {
    pub fn new(components: Vec<ComponentDescriptor>, quantizer: KeyQuantizer) -> Self {
        Self {
            quantizer,
            components,
            index: HashMap::new(),
            cells: Vec::new(),
        }
    }

    pub fn components(&self) -> &[ComponentDescriptor] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get_or_create_cell(&mut self, x: f64, y: f64, z: f64) -> &mut Cell {
        let key = self.quantizer.key(x, y, z);
        let component_count = self.components.len();
        let cells = &mut self.cells;
        let slot = *self.index.entry(key).or_insert_with(|| {
            cells.push((key, Cell::new(component_count)));
            cells.len() - 1
        });
        &mut self.cells[slot].1
    }

    pub fn cell(&self, x: f64, y: f64, z: f64) -> Option<&Cell> {
        let key = self.quantizer.key(x, y, z);
        self.index.get(&key).map(|&slot| &self.cells[slot].1)
    }

    /// Adds one point: `values` holds one entry per component, in component order.
    pub fn add_point(&mut self, position: [f64; 3], values: &[f64]) {
        let cell = self.get_or_create_cell(position[0], position[1], position[2]);
        for (component_index, value) in values.iter().enumerate() {
            cell.add_value(component_index, *value);
        }
        cell.increment_point_count();
    }

    /// Averages and encodes every cell. The grid cannot grow afterwards.
    pub fn finalize(self) -> FinalizedGrid {
        let components = self.components;
        let cells = self
            .cells
            .into_iter()
            .map(|(key, cell)| EncodedCell {
                key,
                point_count: cell.point_count,
                values: components
                    .iter()
                    .enumerate()
                    .map(|(index, descriptor)| descriptor.encode(cell.mean(index)))
                    .collect(),
            })
            .collect();

        FinalizedGrid { components, cells }
    }
}

#[derive(Debug, Clone)]
pub struct FinalizedGrid {
    pub components: Vec<ComponentDescriptor>,
    pub cells: Vec<EncodedCell>,
}

impl FinalizedGrid {
    pub fn point_count(&self) -> u64 {
        self.cells.iter().map(|cell| cell.point_count).sum()
    }
}
