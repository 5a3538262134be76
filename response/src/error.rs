use thiserror::Error;

use crate::components::LoadError;
use crate::config::ConfigError;
use crate::grid::GridError;
use crate::resolver::NotFoundError;
use crate::srm::GridMismatchError;
use crate::units::UnitError;

/// Any failure while building a response product.
///
/// Every failure is terminal for the call; no partial product is returned.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    GridMismatch(#[from] GridMismatchError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown telescope position {0}")]
    UnknownPosition(u8),

    #[error("Invalid telescope chain: {0}")]
    InvalidChain(String),
}

pub type Result<T> = std::result::Result<T, ResponseError>;
