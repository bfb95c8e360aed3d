mod archive;
mod consolidate;
mod error;
mod frost;
mod input;
mod metadata;
mod pipeline;
mod types;
mod units;

pub use error::FrostError;
pub use pipeline::*;

pub use types::element::*;
pub use types::observation::*;
pub use types::reference_time::ReferenceTime;
pub use types::station::*;

pub use input::error::InputError;
pub use input::reader::*;

pub use consolidate::accumulator::*;
pub use consolidate::selector::*;

pub use units::converter::*;
pub use units::error::UnitError;
pub use units::unit::Unit;

pub use archive::attributes::AttributeTemplate;
pub use archive::error::ArchiveError;
pub use archive::frame::*;
pub use archive::merger::*;
pub use archive::store::*;

pub use metadata::*;

pub use frost::client::*;
pub use frost::download::*;
pub use frost::error::FrostApiError;
