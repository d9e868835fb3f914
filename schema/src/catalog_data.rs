use crate::{AbilityDescriptor, ItemDescriptor, MoveDescriptor};
use serde::{Deserialize, Serialize};

/// On-disk layout of a rules catalog file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub moves: Vec<MoveDescriptor>,
    #[serde(default)]
    pub abilities: Vec<AbilityDescriptor>,
    #[serde(default)]
    pub items: Vec<ItemDescriptor>,
}

impl CatalogData {
    /// Compact binary form used when shipping a catalog between processes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AbilityEffect, MoveCategory, PokemonType};

    #[test]
    fn test_catalog_parses_from_ron_with_defaults() {
        let text = r#"(
            moves: [
                (name: "tackle", move_type: Normal, category: Physical, power: Some(40), accuracy: Some(100), max_pp: 35),
            ],
            abilities: [
                (name: "pressure", effect: ExtraPpCost),
            ],
        )"#;

        let data: CatalogData = ron::from_str(text).expect("catalog should parse");

        assert_eq!(data.moves.len(), 1);
        assert_eq!(data.moves[0].move_type, PokemonType::Normal);
        assert_eq!(data.moves[0].category, MoveCategory::Physical);
        assert_eq!(data.moves[0].priority, 0);
        assert!(data.moves[0].secondary.is_empty());
        assert_eq!(data.abilities[0].effect, AbilityEffect::ExtraPpCost);
        assert!(data.items.is_empty());
    }

    #[test]
    fn test_catalog_binary_form_survives_transport() {
        let data = CatalogData {
            moves: vec![MoveDescriptor::struggle()],
            abilities: vec![AbilityDescriptor::inert("none")],
            items: vec![],
        };

        let bytes = data.to_bytes().expect("encode");
        let decoded = CatalogData::from_bytes(&bytes).expect("decode");

        assert_eq!(decoded, data);
    }
}
