//! Result of one decompression computation.

use crate::events::Event;
use crate::segments::Segment;
use crate::tissues::{Tissue, Tissues, NUM_COMPARTMENTS};

/// Decompression ceiling sampled once per simulated second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ceiling {
    /// Runtime (s).
    pub time: f64,
    /// Depth (m), 0 when the diver may surface.
    pub depth: f64,
}

impl Ceiling {
    pub fn not_required(&self) -> bool {
        self.depth <= 0.0
    }
}

/// Compartment pressures above ambient for one simulated second (bar).
pub type TissueOverPressures = [f64; NUM_COMPARTMENTS];

/// Calculated profile, immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatedProfile {
    segments: Vec<Segment>,
    ceilings: Vec<Ceiling>,
    tissues: Vec<Tissue>,
    tissue_over_pressures: Vec<TissueOverPressures>,
    start_ascent_index: usize,
    errors: Vec<Event>,
}

impl CalculatedProfile {
    pub fn from_profile(
        segments: Vec<Segment>,
        ceilings: Vec<Ceiling>,
        tissues: &Tissues,
        tissue_over_pressures: Vec<TissueOverPressures>,
        start_ascent_index: usize,
    ) -> Self {
        Self {
            segments,
            ceilings,
            tissues: tissues.items().to_vec(),
            tissue_over_pressures,
            start_ascent_index,
            errors: Vec::new(),
        }
    }

    /// Profile of a plan which failed validation, carries only the user segments.
    pub fn from_errors(segments: Vec<Segment>, errors: Vec<Event>) -> Self {
        let start_ascent_index = segments.len();
        Self {
            segments,
            ceilings: Vec::new(),
            tissues: Vec::new(),
            tissue_over_pressures: Vec::new(),
            start_ascent_index,
            errors,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn ceilings(&self) -> &[Ceiling] {
        &self.ceilings
    }

    /// Final state of the 16 compartments, empty for failed plans.
    pub fn tissues(&self) -> &[Tissue] {
        &self.tissues
    }

    pub fn tissue_over_pressures(&self) -> &[TissueOverPressures] {
        &self.tissue_over_pressures
    }

    /// Index of the first segment added by the planner.
    pub fn start_ascent_index(&self) -> usize {
        self.start_ascent_index
    }

    pub fn errors(&self) -> &[Event] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Final tissues usable as the start of a repetitive dive.
    pub fn final_tissues(&self) -> Option<Tissues> {
        let items: [Tissue; NUM_COMPARTMENTS] = self.tissues.as_slice().try_into().ok()?;
        Some(Tissues::from_loaded(items))
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Runtime (s) at which the first ceiling appears.
    pub fn no_deco_end(&self) -> Option<f64> {
        self.ceilings.iter().find(|c| !c.not_required()).map(|c| c.time)
    }
}
