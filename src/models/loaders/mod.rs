pub mod glossary_loader;
pub mod sheet_loader;

pub use glossary_loader::load_glossary;
pub use sheet_loader::{detect_pair, find_sheets, header_language, BilingualSheet};
