// Adapters layer: concrete implementations for external systems (marketplace, files, database)

pub mod file_source;
pub mod marketplace;
pub mod report;
pub mod spreadsheet;
pub mod sqlite_store;
