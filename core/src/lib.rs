pub mod algorithm;
pub mod blender;
pub mod consumption;
mod context;
pub mod depth;
pub mod error;
pub mod events;
pub mod ffi;
pub mod gases;
pub mod gradient;
pub mod notation;
pub mod options;
pub mod profile;
pub mod search;
pub mod segments;
pub mod tanks;
pub mod tissues;
pub mod toxicity;

uniffi::setup_scaffolding!();

pub use algorithm::{AlgorithmParams, BuhlmannAlgorithm};
pub use blender::{BlendResult, GasBlender, TankFill};
pub use consumption::{Consumption, ConsumptionOptions};
pub use depth::{DepthConverter, Salinity};
pub use error::PlanError;
pub use events::{Event, EventOptions, EventType, ProfileEvents};
pub use gases::{Gas, Gases, StandardGases};
pub use options::{Options, SafetyStop};
pub use profile::{CalculatedProfile, Ceiling};
pub use segments::{Segment, Segments};
pub use tanks::Tank;
pub use tissues::{Tissue, Tissues};
pub use toxicity::OxygenToxicity;
