use core::fmt::Display;

use gojira_common::{dev_debug, util::BoundedIndex};

use crate::action::Action;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeymapError {
    OutOfBounds { layer: usize, row: usize, col: usize },
}

impl Display for KeymapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            KeymapError::OutOfBounds { layer, row, col } => {
                write!(f, "keymap position out of bounds: {}/{}/{}", layer, row, col)
            }
        }
    }
}

/// Layered grid of actions. Exactly one layer is active at a time,
/// and lookups made from the matrix always go through it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeymapTable<const LAYERS: usize, const ROWS: usize, const COLS: usize> {
    layers: [[[Action; COLS]; ROWS]; LAYERS],
    current_layer: BoundedIndex<LAYERS>,
}

impl<const LAYERS: usize, const ROWS: usize, const COLS: usize> KeymapTable<LAYERS, ROWS, COLS> {
    pub const fn new(layers: [[[Action; COLS]; ROWS]; LAYERS]) -> Self {
        Self { layers, current_layer: BoundedIndex::from_const::<0>() }
    }

    pub const fn empty() -> Self {
        Self::new([[[Action::None; COLS]; ROWS]; LAYERS])
    }

    fn check_bounds(layer: usize, row: usize, col: usize) -> Result<(), KeymapError> {
        if layer >= LAYERS || row >= ROWS || col >= COLS {
            Err(KeymapError::OutOfBounds { layer, row, col })
        } else {
            Ok(())
        }
    }

    pub fn get(&self, layer: usize, row: usize, col: usize) -> Result<Action, KeymapError> {
        Self::check_bounds(layer, row, col)?;
        Ok(self.layers[layer][row][col])
    }

    pub fn set(&mut self, layer: usize, row: usize, col: usize, action: Action) -> Result<(), KeymapError> {
        Self::check_bounds(layer, row, col)?;
        self.layers[layer][row][col] = action;
        Ok(())
    }

    /// Looks up a position on the active layer.
    pub fn lookup(&self, row: usize, col: usize) -> Result<Action, KeymapError> {
        self.get(self.current_layer.index(), row, col)
    }

    pub fn current_layer(&self) -> usize {
        self.current_layer.index()
    }

    /// Activates `requested` modulo the number of layers, returning
    /// the layer that ended up active.
    pub fn select_layer(&mut self, requested: u8) -> usize {
        self.current_layer = BoundedIndex::wrapping(requested as usize);
        dev_debug!("Layer {} requested, now on layer {}", requested, self.current_layer.index());
        self.current_layer.index()
    }

    pub fn set_current_layer(&mut self, layer: usize) -> Result<(), KeymapError> {
        self.current_layer = BoundedIndex::from_value(layer)
            .ok_or(KeymapError::OutOfBounds { layer, row: 0, col: 0 })?;
        Ok(())
    }

    /// Iterates every cell as `(layer, row, col, action)`, layers
    /// first, then rows, then columns.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, usize, Action)> + '_ {
        self.layers.iter().enumerate().flat_map(|(l, layer)| {
            layer.iter().enumerate().flat_map(move |(r, row)| {
                row.iter().enumerate().map(move |(c, action)| (l, r, c, *action))
            })
        })
    }

    pub fn layer_row(&self, layer: usize, row: usize) -> Option<&[Action; COLS]> {
        self.layers.get(layer)?.get(row)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::keycode::{KEY_A, KEY_ENTER};

    type Keymap = KeymapTable<5, 5, 5>;

    #[test]
    fn test_get_set_within_bounds() {
        let mut keymap = Keymap::empty();
        keymap.set(4, 4, 4, Action::key(KEY_A)).unwrap();
        assert_eq!(keymap.get(4, 4, 4), Ok(Action::key(KEY_A)));
        assert_eq!(keymap.get(0, 0, 0), Ok(Action::None));
    }

    #[test]
    fn test_dimension_itself_is_out_of_bounds() {
        let mut keymap = Keymap::empty();
        assert!(keymap.get(5, 0, 0).is_err());
        assert!(keymap.get(0, 5, 0).is_err());
        assert_eq!(
            keymap.set(0, 0, 5, Action::key(KEY_ENTER)),
            Err(KeymapError::OutOfBounds { layer: 0, row: 0, col: 5 })
        );
        assert!(keymap.cells().all(|(_, _, _, a)| a == Action::None));
    }

    #[test]
    fn test_layer_selection_wraps_around() {
        let mut keymap = Keymap::empty();
        assert_eq!(keymap.select_layer(7), 2);
        assert_eq!(keymap.current_layer(), 2);
        assert_eq!(keymap.select_layer(4), 4);
        assert_eq!(keymap.select_layer(5), 0);
    }

    #[test]
    fn test_lookup_uses_current_layer() {
        let mut keymap = Keymap::empty();
        keymap.set(1, 2, 3, Action::key(KEY_A)).unwrap();
        assert_eq!(keymap.lookup(2, 3), Ok(Action::None));
        keymap.set_current_layer(1).unwrap();
        assert_eq!(keymap.lookup(2, 3), Ok(Action::key(KEY_A)));
        assert!(keymap.set_current_layer(5).is_err());
        assert_eq!(keymap.current_layer(), 1);
    }

    #[test]
    fn test_cells_iteration_order() {
        let keymap = KeymapTable::<2, 2, 2>::empty();
        let positions: std::vec::Vec<_> = keymap.cells().map(|(l, r, c, _)| (l, r, c)).collect();
        assert_eq!(positions[0], (0, 0, 0));
        assert_eq!(positions[1], (0, 0, 1));
        assert_eq!(positions[2], (0, 1, 0));
        assert_eq!(positions[4], (1, 0, 0));
        assert_eq!(positions.len(), 8);
    }
}
