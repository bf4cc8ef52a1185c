//! Types that are really the bedrock of the journal.

pub mod tags;
pub mod tasting;
pub mod whisky;

pub use tags::{AromaCategory, AromaTag, AromaTagCount, SenseType, TastingAroma};
pub use tasting::TastingEntry;
pub use whisky::{Whisky, WhiskyWithTastings};
