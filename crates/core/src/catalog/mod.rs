//! Room and upsell catalog plus the hotel knowledge base it is derived from.
//!
//! The knowledge base is loaded once at startup through a [`CatalogSource`];
//! the resulting [`Catalog`] is immutable and handed to the conversation
//! engine by reference.

pub mod loader;
pub mod retrieval;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::room::{Room, RoomId, Upsell};

pub use loader::DirectoryCatalogSource;
pub use retrieval::Retrieval;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub q: String,
    pub a: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub rooms: Vec<Room>,
    pub faqs: Vec<Faq>,
    pub upsells: Vec<Upsell>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read knowledge directory `{path}`: {source}")]
    ReadDirectory { path: std::path::PathBuf, source: std::io::Error },
}

pub trait CatalogSource: Send + Sync {
    fn load(&self) -> Result<KnowledgeBase, CatalogError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    rooms: Vec<Room>,
    upsells: Vec<Upsell>,
}

impl Catalog {
    pub fn new(rooms: Vec<Room>, upsells: Vec<Upsell>) -> Self {
        Self { rooms, upsells }
    }

    pub fn load<S>(source: &S) -> Result<Self, CatalogError>
    where
        S: CatalogSource + ?Sized,
    {
        Ok(Self::from_knowledge(&source.load()?))
    }

    pub fn from_knowledge(knowledge: &KnowledgeBase) -> Self {
        Self::new(knowledge.rooms.clone(), knowledge.upsells.clone())
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn upsells(&self) -> &[Upsell] {
        &self.upsells
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.iter().find(|room| &room.id == room_id)
    }

    /// Case-insensitive substring match of `fragment` against room ids and
    /// names. The first room in load order wins.
    pub fn find_room(&self, fragment: &str) -> Option<&Room> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.rooms.iter().find(|room| {
            room.id.0.to_lowercase().contains(&needle) || room.name.to_lowercase().contains(&needle)
        })
    }

    pub fn first_upsell(&self) -> Option<&Upsell> {
        self.upsells.first()
    }

    pub fn room_names(&self) -> Vec<&str> {
        self.rooms.iter().map(|room| room.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Catalog, CatalogError, CatalogSource, KnowledgeBase};
    use crate::domain::room::{Room, RoomId, Upsell, UpsellId};

    fn room(id: &str, name: &str, price: i64) -> Room {
        Room {
            id: RoomId(id.to_string()),
            name: name.to_string(),
            description: String::new(),
            price: Decimal::from(price),
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(
            vec![room("deluxe", "Deluxe Suite", 120), room("std", "Standard Double", 80)],
            vec![Upsell {
                id: UpsellId("breakfast".to_string()),
                name: "Breakfast".to_string(),
                price: Decimal::from(15),
            }],
        )
    }

    #[test]
    fn find_room_matches_name_fragment_case_insensitively() {
        let catalog = catalog();
        let found = catalog.find_room("deluxe").map(|room| room.name.as_str());
        assert_eq!(found, Some("Deluxe Suite"));
        assert_eq!(catalog.find_room("DOUBLE").map(|room| room.id.0.as_str()), Some("std"));
    }

    #[test]
    fn find_room_matches_id_and_prefers_load_order() {
        let catalog = Catalog::new(
            vec![room("suite-a", "Garden Suite", 150), room("suite-b", "Sea Suite", 200)],
            Vec::new(),
        );
        assert_eq!(catalog.find_room("suite").map(|room| room.id.0.as_str()), Some("suite-a"));
        assert_eq!(catalog.find_room("suite-b").map(|room| room.id.0.as_str()), Some("suite-b"));
    }

    #[test]
    fn find_room_rejects_blank_and_unknown_text() {
        let catalog = catalog();
        assert!(catalog.find_room("   ").is_none());
        assert!(catalog.find_room("penthouse").is_none());
    }

    #[test]
    fn first_upsell_is_none_for_empty_catalog() {
        assert!(Catalog::default().first_upsell().is_none());
        assert_eq!(catalog().first_upsell().map(|upsell| upsell.name.as_str()), Some("Breakfast"));
    }

    #[test]
    fn load_builds_catalog_from_source() {
        struct FixedSource;

        impl CatalogSource for FixedSource {
            fn load(&self) -> Result<KnowledgeBase, CatalogError> {
                Ok(KnowledgeBase {
                    rooms: vec![room("deluxe", "Deluxe Suite", 120)],
                    faqs: Vec::new(),
                    upsells: Vec::new(),
                })
            }
        }

        let catalog = Catalog::load(&FixedSource).expect("catalog loads");
        assert_eq!(catalog.room_names(), vec!["Deluxe Suite"]);
    }
}
