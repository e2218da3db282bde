// CSV file I/O for the row engine

pub mod csv;
pub mod reader;

pub use crate::csv::CsvSource;
pub use reader::CsvReader;
