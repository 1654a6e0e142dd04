pub mod cell;
pub mod glossary;
pub mod language;
pub mod loaders;

pub use cell::{failure_marker, CellId, CellOutput, CellStatus, CellUnit, FailedCell, OutputOrigin};
pub use glossary::TerminologyEntry;
pub use language::{Language, LanguagePair};
pub use loaders::{find_sheets, load_glossary, BilingualSheet};
