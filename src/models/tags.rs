//! Represents aroma tags in all their glory.

use sqlx::{query::Query, sqlite::SqliteArguments, Sqlite};
use uuid::Uuid;

use crate::database::InsertIntoTable;

pub type AromaIdent = Uuid;

/// The fixed taxonomy that aroma tags are grouped into.
///
/// `Imported` is where tags land when an archive mentions a name this journal
/// has never seen before.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    sqlx::Type,
)]
pub enum AromaCategory {
    Fruit,
    #[serde(rename = "Malt/Grain")]
    #[sqlx(rename = "Malt/Grain")]
    MaltGrain,
    Sweet,
    #[serde(rename = "Wood/Vanilla")]
    #[sqlx(rename = "Wood/Vanilla")]
    WoodVanilla,
    #[serde(rename = "Sherry/Wine")]
    #[sqlx(rename = "Sherry/Wine")]
    SherryWine,
    #[serde(rename = "Smoke/Peat")]
    #[sqlx(rename = "Smoke/Peat")]
    SmokePeat,
    #[serde(rename = "Spice/Herbal")]
    #[sqlx(rename = "Spice/Herbal")]
    SpiceHerbal,
    #[serde(rename = "Nut/Chocolate")]
    #[sqlx(rename = "Nut/Chocolate")]
    NutChocolate,
    #[serde(rename = "Off-notes")]
    #[sqlx(rename = "Off-notes")]
    OffNotes,
    Imported,
}

impl core::fmt::Display for AromaCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AromaCategory::Fruit => "Fruit",
            AromaCategory::MaltGrain => "Malt/Grain",
            AromaCategory::Sweet => "Sweet",
            AromaCategory::WoodVanilla => "Wood/Vanilla",
            AromaCategory::SherryWine => "Sherry/Wine",
            AromaCategory::SmokePeat => "Smoke/Peat",
            AromaCategory::SpiceHerbal => "Spice/Herbal",
            AromaCategory::NutChocolate => "Nut/Chocolate",
            AromaCategory::OffNotes => "Off-notes",
            AromaCategory::Imported => "Imported",
        };

        f.write_str(s)
    }
}

/// One of the three tasting phases. Scores, notes, and tags are attached to
/// each of them separately.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    sqlx::Type,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum SenseType {
    Nose,
    Palate,
    Finish,
}

impl SenseType {
    pub const ALL: [SenseType; 3] = [SenseType::Nose, SenseType::Palate, SenseType::Finish];
}

/// A named descriptor, like "Honey" or "Peat".
///
/// Tags are global. Any tasting can point at any of them.
#[derive(
    Clone, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize, sqlx::FromRow,
)]
pub struct AromaTag {
    /// A unique identifier.
    ///
    /// Always use this when referencing the tag from a tasting.
    pub id: AromaIdent,

    /// The name users see. It's unique by convention only.
    pub name: String,

    /// The section of the taxonomy this tag belongs to.
    pub category: AromaCategory,
}

impl AromaTag {
    /// Creates a brand-new tag with a fresh id.
    pub fn new(name: impl Into<String>, category: AromaCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category,
        }
    }
}

impl InsertIntoTable for AromaTag {
    fn make_insertion_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        // NOTE: if changing `AROMA_TAGS_TABLE`, also change this!
        sqlx::query(
            r#"
            INSERT INTO aroma_tags (id, name, category)
            VALUES ($1, $2, $3)
            ON CONFLICT(id) DO NOTHING;
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(self.category)
    }
}

/// A link between a tasting and one of its aroma tags, for one sense.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    sqlx::FromRow,
)]
pub struct TastingAroma {
    pub tasting_id: Uuid,
    pub aroma_id: AromaIdent,
    pub sense_type: SenseType,
}

impl TastingAroma {
    pub fn new(tasting_id: Uuid, aroma_id: AromaIdent, sense_type: SenseType) -> Self {
        Self {
            tasting_id,
            aroma_id,
            sense_type,
        }
    }
}

impl InsertIntoTable for TastingAroma {
    fn make_insertion_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        // the link is its own identity, so linking twice changes nothing
        sqlx::query(
            r#"
            INSERT INTO tasting_aromas (tasting_id, aroma_id, sense_type)
            VALUES ($1, $2, $3)
            ON CONFLICT(tasting_id, aroma_id, sense_type) DO NOTHING;
            "#,
        )
        .bind(self.tasting_id)
        .bind(self.aroma_id)
        .bind(self.sense_type)
    }
}

/// How often a tag has been used, across every tasting.
#[derive(Clone, Debug, PartialEq, PartialOrd, serde::Serialize, sqlx::FromRow)]
pub struct AromaTagCount {
    pub name: String,
    pub category: AromaCategory,
    pub count: i64,
}

/// The tags a fresh journal starts out with.
pub fn default_aroma_tags() -> Vec<AromaTag> {
    use AromaCategory::*;

    let taxonomy: [(AromaCategory, &[&str]); 9] = [
        (
            Fruit,
            &[
                "Green Apple",
                "Citrus",
                "Lemon",
                "Orange Peel",
                "Dried Fruit",
                "Tropical Fruit",
                "Berry",
                "Stone Fruit",
                "Banana",
                "Raisin",
            ],
        ),
        (
            MaltGrain,
            &["Malt", "Barley", "Cereal", "Biscuit", "Bread", "Toast"],
        ),
        (
            Sweet,
            &[
                "Honey",
                "Caramel",
                "Toffee",
                "Butterscotch",
                "Brown Sugar",
                "Maple Syrup",
            ],
        ),
        (
            WoodVanilla,
            &["Vanilla", "Oak", "Cedar", "Sandalwood", "Coconut"],
        ),
        (
            SherryWine,
            &["Sherry", "Red Wine", "Port", "Muscat", "Brandy"],
        ),
        (
            SmokePeat,
            &[
                "Peat", "Smoke", "Campfire", "Ash", "Iodine", "Maritime", "Tar",
            ],
        ),
        (
            SpiceHerbal,
            &[
                "Cinnamon",
                "Black Pepper",
                "Ginger",
                "Clove",
                "Nutmeg",
                "Mint",
                "Eucalyptus",
                "Liquorice",
            ],
        ),
        (
            NutChocolate,
            &[
                "Almond",
                "Walnut",
                "Hazelnut",
                "Dark Chocolate",
                "Cocoa",
                "Coffee",
            ],
        ),
        (
            OffNotes,
            &["Sulphur", "Rubber", "Cardboard", "Soapy", "Metallic"],
        ),
    ];

    taxonomy
        .into_iter()
        .flat_map(|(category, names)| {
            names
                .iter()
                .map(move |name| AromaTag::new(*name, category))
        })
        .collect()
}
