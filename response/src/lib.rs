//! Instrument response composition for the FOXSI-4 X-ray telescopes.
//!
//! Calibration products for each part of a telescope (optic effective area,
//! filter and blanket transmissions, collimator aperture ratios, atmospheric
//! transmission, quantum efficiency, detector redistribution) are loaded
//! from local files with their physical units, aligned on a common photon
//! energy grid, and combined into telescope-level products:
//!
//! - **ARF**: effective area per photon energy bin (cm²)
//! - **RMF**: detector redistribution from photon energy to count channel
//! - **SRM**: the two combined, `SRM[a, b] = ARF[a] * RMF[a, b]`
//!
//! ```no_run
//! use response::{Assembler, ObservingConfig, ResponseConfig};
//! use response::components::AngleSelection;
//!
//! let config = ResponseConfig::load_from_file("response.json".as_ref())?;
//! let assembler = Assembler::from_config(&config);
//! let observing = ObservingConfig {
//!     off_axis: AngleSelection::arcmin(2.0),
//!     ..Default::default()
//! };
//! let product = assembler.build(2, &observing)?;
//! println!("{} photon bins", product.arf().grid().len());
//! # Ok::<(), response::ResponseError>(())
//! ```

pub mod assembler;
pub mod components;
pub mod config;
pub mod error;
pub mod grid;
pub mod product;
pub mod provenance;
pub mod quantity;
pub mod raw;
pub mod reconcile;
pub mod resolver;
pub mod srm;
pub mod telescope;
pub mod units;

pub use assembler::{assemble, Assembler};
pub use components::{ComponentKind, ComponentResponse, LoadError};
pub use config::{ConfigError, ResponseConfig};
pub use error::ResponseError;
pub use grid::{EnergyGrid, GridError};
pub use product::{Arf, ResponseMatrix, ResponseProduct};
pub use provenance::{Provenance, ProvenanceEntry};
pub use quantity::Quantity;
pub use reconcile::{EdgeFill, Extrapolation};
pub use resolver::{CalibrationResolver, DirectoryResolver, NotFoundError};
pub use srm::{compose, fold, GridMismatchError, MismatchReason};
pub use telescope::{ObservingConfig, TelescopeChain};
pub use units::{Unit, UnitError};
