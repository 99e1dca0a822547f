use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::simulation::ledger::Effects;
use crate::world::tile::TileCategory;

/// Per-instance biodiversity/culture contribution of a placed tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileValue {
    #[serde(default)]
    pub biodiversity: i64,
    #[serde(default)]
    pub culture: i64,
}

impl TileValue {
    pub fn new(biodiversity: i64, culture: i64) -> Self {
        TileValue {
            biodiversity,
            culture,
        }
    }
}

/// Timer-driven transformation: after `duration_ticks` simulated seconds the
/// tile becomes `target_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthSpec {
    pub target_id: u32,
    pub duration_ticks: u64,
    #[serde(default)]
    pub stages: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSpec {
    pub target_id: u32,
    pub reward: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileTypeDef {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub category: TileCategory,
    pub price: i64,
    #[serde(default)]
    pub value: TileValue,
    /// Extra carbon/biodiversity/culture deltas honoured by batch operations only.
    #[serde(default)]
    pub effects: Option<Effects>,
    #[serde(default)]
    pub growth: Option<GrowthSpec>,
    #[serde(default)]
    pub harvest: Option<HarvestSpec>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub hover_hint: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl TileTypeDef {
    pub fn is_road(&self) -> bool {
        self.category.is_road()
    }

    pub fn is_building(&self) -> bool {
        self.category.is_building()
    }

    /// Negative prices mark internal-only variants such as grown farmland.
    pub fn is_purchasable(&self) -> bool {
        self.price >= 0
    }

    pub fn grows(&self) -> bool {
        self.growth.is_some()
    }

    pub fn is_harvestable(&self) -> bool {
        self.harvest.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    ZeroId { name: String },
    DuplicateId(u32),
    UnknownGrowthTarget { tile: u32, target: u32 },
    UnknownHarvestTarget { tile: u32, target: u32 },
    ZeroGrowthDuration(u32),
    Empty,
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::ZeroId { name } => {
                write!(f, "tile '{}' has id 0; ids must be positive", name)
            }
            CatalogError::DuplicateId(id) => write!(f, "tile id {} is defined more than once", id),
            CatalogError::UnknownGrowthTarget { tile, target } => {
                write!(f, "tile {} grows into unknown tile {}", tile, target)
            }
            CatalogError::UnknownHarvestTarget { tile, target } => {
                write!(f, "tile {} harvests into unknown tile {}", tile, target)
            }
            CatalogError::ZeroGrowthDuration(id) => {
                write!(f, "tile {} has growth.duration_ticks = 0; must be > 0", id)
            }
            CatalogError::Empty => write!(f, "catalog defines no tiles"),
        }
    }
}

impl std::error::Error for CatalogError {}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tiles: Vec<TileTypeDef>,
}

/// Immutable tile registry keyed by id.
#[derive(Debug, Clone)]
pub struct TileCatalog {
    tiles: BTreeMap<u32, TileTypeDef>,
}

impl Default for TileCatalog {
    fn default() -> Self {
        TileCatalog::builtin()
    }
}

impl TileCatalog {
    pub fn from_defs(defs: Vec<TileTypeDef>) -> Result<Self, Vec<CatalogError>> {
        let errors = Self::check(&defs);
        if !errors.is_empty() {
            return Err(errors);
        }
        let tiles = defs.into_iter().map(|d| (d.id, d)).collect();
        Ok(TileCatalog { tiles })
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        Self::from_defs(file.tiles).map_err(|errors| {
            errors
                .iter()
                .map(|e| format!("{}: {}", source_path.display(), e))
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    fn check(defs: &[TileTypeDef]) -> Vec<CatalogError> {
        let mut errors = Vec::new();
        if defs.is_empty() {
            errors.push(CatalogError::Empty);
            return errors;
        }

        let mut seen = std::collections::HashSet::new();
        for def in defs {
            if def.id == 0 {
                errors.push(CatalogError::ZeroId {
                    name: def.name.clone(),
                });
            } else if !seen.insert(def.id) {
                errors.push(CatalogError::DuplicateId(def.id));
            }
        }

        for def in defs {
            if let Some(growth) = &def.growth {
                if !seen.contains(&growth.target_id) {
                    errors.push(CatalogError::UnknownGrowthTarget {
                        tile: def.id,
                        target: growth.target_id,
                    });
                }
                if growth.duration_ticks == 0 {
                    errors.push(CatalogError::ZeroGrowthDuration(def.id));
                }
            }
            if let Some(harvest) = &def.harvest
                && !seen.contains(&harvest.target_id)
            {
                errors.push(CatalogError::UnknownHarvestTarget {
                    tile: def.id,
                    target: harvest.target_id,
                });
            }
        }
        errors
    }

    pub fn get(&self, id: u32) -> Option<&TileTypeDef> {
        self.tiles.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.tiles.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileTypeDef> {
        self.tiles.values()
    }

    /// Resource delta for a tile id; unknown ids and 0 contribute nothing.
    pub fn value_of(&self, id: u32) -> TileValue {
        self.get(id).map(|d| d.value).unwrap_or_default()
    }

    pub fn effects_of(&self, id: u32) -> Effects {
        self.get(id).and_then(|d| d.effects).unwrap_or(Effects::NONE)
    }

    /// The 23 standard campus tiles.
    pub fn builtin() -> Self {
        let mut defs = Vec::with_capacity(23);
        let mut push = |id: u32, name: &str, image: &str, category, price, value, description: &str| {
            defs.push(TileTypeDef {
                id,
                name: name.to_string(),
                image: image.to_string(),
                category,
                price,
                value,
                effects: None,
                growth: None,
                harvest: None,
                is_final: false,
                hover_hint: None,
                description: description.to_string(),
            });
        };

        use TileCategory::*;
        let green = "Raises greenery and biodiversity";
        let build = "City building component";
        let water = "Improves the landscape and ecology";
        let housing = "Campus building";
        let road = "Improves traffic flow";

        push(1, "Lawn", "/images/plant-1.jpg", Plant, 10, TileValue::new(10, 5), green);
        push(2, "Farmland", "/images/farmland-1.png", Farmland, 60, TileValue::new(5, 5), "Grows into ripe farmland that can be harvested for carbon");
        push(3, "Ripe Farmland", "/images/farmland-2.png", Farmland, -1, TileValue::new(5, 5), "Harvest to earn carbon");
        push(4, "Shrub", "/images/plant-2.png", Plant, 60, TileValue::new(10, 5), green);
        push(5, "Grass Path", "/images/plant-road-1.jpg", PlantRoad, 80, TileValue::new(5, 3), build);
        push(6, "Stone Path", "/images/stone-road-1.png", StoneRoad, 100, TileValue::new(10, 5), build);
        push(7, "Stone Path (worn)", "/images/stone-road-2.jpg", StoneRoad, 90, TileValue::new(10, 5), build);
        push(8, "Lake", "/images/sea-1.jpg", Sea, 120, TileValue::new(40, 10), water);
        push(9, "Pond", "/images/sea-2.jpg", Sea, 85, TileValue::new(40, 10), water);
        push(10, "Dormitory", "/images/house-1.png", Residence, 300, TileValue::new(0, 15), housing);
        push(11, "Campus Store", "/images/buildings_processed/store.png", Residence, 250, TileValue::new(0, 15), housing);
        push(12, "Teaching Building", "/images/residence-1.png", Residence, 300, TileValue::new(0, 20), housing);

        let road_images = [
            "road-1-1.png", "road-1-2.png", "road-2-1.png", "road-2-2.png", "road-2-3.png",
            "road-2-4.jpg", "road-3-1.png", "road-3-2.png", "road-3-3.png", "road-3-4.jpg",
            "road-4.png",
        ];
        for (i, image) in road_images.iter().enumerate() {
            let id = 13 + i as u32;
            push(id, &format!("Road {}", i + 1), &format!("/images/{}", image), Road, 100, TileValue::new(0, 5), road);
        }

        if let Some(farmland) = defs.iter_mut().find(|d| d.id == 2) {
            farmland.growth = Some(GrowthSpec {
                target_id: 3,
                duration_ticks: 10,
                stages: vec![2, 3],
            });
        }
        if let Some(ripe) = defs.iter_mut().find(|d| d.id == 3) {
            ripe.is_final = true;
            ripe.harvest = Some(HarvestSpec {
                target_id: 2,
                reward: 100,
            });
            ripe.hover_hint = Some("Double-click to harvest".to_string());
        }

        let tiles = defs.into_iter().map(|d| (d.id, d)).collect();
        TileCatalog { tiles }
    }
}
