pub mod builder;
pub mod grid;
pub mod hybridization;
