use serde::{Deserialize, Serialize};

// === Enums ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TileCategory {
    Plant,
    Farmland,
    Road,
    StoneRoad,
    PlantRoad,
    Sea,
    Residence,
}

impl TileCategory {
    pub fn is_road(self) -> bool {
        matches!(
            self,
            TileCategory::Road | TileCategory::StoneRoad | TileCategory::PlantRoad
        )
    }

    pub fn is_building(self) -> bool {
        matches!(self, TileCategory::Residence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Single,
    Row,
    Column,
}

// === Cell ===

/// One placed tile: `(tile_type_id, height_or_variant)`. Id 0 is empty.
///
/// Serializes as a two-element JSON array so persisted maps stay compatible
/// with the `[[id, variant], ...]` export layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCell(pub u32, pub i32);

impl GridCell {
    pub const EMPTY: GridCell = GridCell(0, 0);

    pub fn new(tile_id: u32, variant: i32) -> Self {
        GridCell(tile_id, variant)
    }

    pub fn tile_id(self) -> u32 {
        self.0
    }

    pub fn variant(self) -> i32 {
        self.1
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Opaque map metadata carried through save and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSize {
    pub width: u32,
    pub height: u32,
}

impl Default for MapSize {
    fn default() -> Self {
        MapSize {
            width: 20,
            height: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_serializes_as_pair() {
        let cell = GridCell::new(13, 2);
        assert_eq!(serde_json::to_string(&cell).unwrap(), "[13,2]");
        let back: GridCell = serde_json::from_str("[4,0]").unwrap();
        assert_eq!(back, GridCell::new(4, 0));
        assert!(serde_json::from_str::<GridCell>("[4]").is_err());
    }

    #[test]
    fn empty_cell() {
        assert!(GridCell::EMPTY.is_empty());
        assert!(GridCell::default().is_empty());
        assert!(!GridCell::new(1, 0).is_empty());
    }

    #[test]
    fn categories_use_kebab_names() {
        let c: TileCategory = serde_json::from_str("\"stone-road\"").unwrap();
        assert_eq!(c, TileCategory::StoneRoad);
        assert!(c.is_road());
        assert!(TileCategory::PlantRoad.is_road());
        assert!(!TileCategory::Sea.is_road());
        assert!(TileCategory::Residence.is_building());
    }

    #[test]
    fn fill_mode_defaults_to_single() {
        assert_eq!(FillMode::default(), FillMode::Single);
        let m: FillMode = serde_json::from_str("\"column\"").unwrap();
        assert_eq!(m, FillMode::Column);
    }
}
