use crate::archive::error::ArchiveError;
use crate::frost::error::FrostApiError;
use crate::input::error::InputError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrostError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    FrostApi(#[from] FrostApiError),
}
