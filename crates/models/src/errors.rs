use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("No file provided")]
    MissingFile,
    #[error("Name and address are required")]
    MissingFields,
}
