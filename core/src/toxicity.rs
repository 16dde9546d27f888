//! Oxygen toxicity of a profile.
//!
//! OTU use Erik Baker's closed form for a linear pressure change. CNS uses the
//! NOAA single dive exposure limits interpolated between the table rows.

use crate::depth::DepthConverter;
use crate::gases::GasMixtures;
use crate::options::Options;
use crate::segments::Segment;

/// ppO2 (bar) below which no toxicity accumulates.
const TOXICITY_THRESHOLD: f64 = 0.5;

/// Length (s) of the parts a segment is split into for CNS.
const CNS_STEP: f64 = 10.0;

/// Shortest CNS exposure limit (min).
const MIN_CNS_LIMIT: f64 = 1.0;

/// NOAA exposure limits as `(from ppO2, slope, intercept)`, limit = slope * ppO2 + intercept (min).
const CNS_LIMITS: [(f64, f64, f64); 7] = [
    (0.5, -1800.0, 1800.0),
    (0.6, -1500.0, 1620.0),
    (0.7, -1200.0, 1410.0),
    (0.8, -900.0, 1170.0),
    (0.9, -600.0, 900.0),
    (1.1, -300.0, 570.0),
    (1.5, -750.0, 1245.0),
];

#[derive(Debug, Clone, Copy)]
pub struct OxygenToxicity {
    converter: DepthConverter,
}

impl OxygenToxicity {
    pub fn new(options: &Options) -> Self {
        Self {
            converter: options.depth_converter(),
        }
    }

    /// Oxygen tolerance units of the whole profile.
    pub fn otu(&self, segments: &[Segment]) -> f64 {
        segments.iter().map(|s| self.segment_otu(s)).sum()
    }

    /// CNS oxygen clock of the whole profile (%).
    pub fn cns(&self, segments: &[Segment]) -> f64 {
        let fraction: f64 = segments.iter().map(|s| self.segment_cns(s)).sum();
        fraction * 100.0
    }

    fn ppo2(&self, segment: &Segment, depth: f64) -> f64 {
        GasMixtures::partial_pressure(self.converter.to_bar(depth), segment.gas().fo2())
    }

    fn segment_otu(&self, segment: &Segment) -> f64 {
        let minutes = segment.duration() / 60.0;
        let start = self.ppo2(segment, segment.start_depth());
        let end = self.ppo2(segment, segment.end_depth());
        let (low, high) = (start.min(end), start.max(end));
        if minutes <= 0.0 || high <= TOXICITY_THRESHOLD {
            return 0.0;
        }

        if high - low < 1e-9 {
            return minutes * ((high - TOXICITY_THRESHOLD) / TOXICITY_THRESHOLD).powf(5.0 / 6.0);
        }

        // only the time above the threshold counts
        let (low, minutes) = if low < TOXICITY_THRESHOLD {
            let above = minutes * (high - TOXICITY_THRESHOLD) / (high - low);
            (TOXICITY_THRESHOLD, above)
        } else {
            (low, minutes)
        };
        let exposure = |p: f64| ((p - TOXICITY_THRESHOLD) / TOXICITY_THRESHOLD).powf(11.0 / 6.0);
        3.0 / 11.0 * minutes / (high - low) * (exposure(high) - exposure(low))
    }

    fn segment_cns(&self, segment: &Segment) -> f64 {
        let mut elapsed = 0.0;
        let mut fraction = 0.0;
        while elapsed < segment.duration() {
            let step = CNS_STEP.min(segment.duration() - elapsed);
            let depth = segment.depth_at(elapsed + step / 2.0);
            let limit = cns_limit(self.ppo2(segment, depth));
            if let Some(limit) = limit {
                fraction += step / 60.0 / limit;
            }
            elapsed += step;
        }
        fraction
    }
}

/// Exposure limit (min) at the given ppO2, `None` when oxygen isn't toxic.
fn cns_limit(ppo2: f64) -> Option<f64> {
    if ppo2 <= TOXICITY_THRESHOLD {
        return None;
    }
    let (_, slope, intercept) = CNS_LIMITS
        .iter()
        .rev()
        .find(|(from, _, _)| ppo2 >= *from)
        .copied()
        .unwrap_or(CNS_LIMITS[0]);
    Some((slope * ppo2 + intercept).max(MIN_CNS_LIMIT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gases::StandardGases;

    fn toxicity() -> OxygenToxicity {
        OxygenToxicity::new(&Options::default())
    }

    fn depth_for_pressure(pressure: f64) -> f64 {
        Options::default().depth_converter().from_bar(pressure)
    }

    #[test]
    fn test_otu_at_one_bar_is_one_per_minute() {
        let depth = depth_for_pressure(2.0);
        let segment = Segment::flat(depth, StandardGases::EAN50, 3600.0).unwrap();
        let otu = toxicity().otu(&[segment]);
        assert!((otu - 60.0).abs() < 1e-6, "got {otu}");
    }

    #[test]
    fn test_no_toxicity_below_threshold() {
        let segment = Segment::flat(10.0, StandardGases::AIR, 3600.0).unwrap();
        assert_eq!(toxicity().otu(&[segment.clone()]), 0.0);
        assert_eq!(toxicity().cns(&[segment]), 0.0);
    }

    #[test]
    fn test_otu_of_linear_change_matches_integration() {
        let start = depth_for_pressure(1.4);
        let end = depth_for_pressure(1.1);
        let segment = Segment::new(start, end, StandardGases::OXYGEN, 600.0).unwrap();
        let otu = toxicity().otu(&[segment.clone()]);

        let steps = 6000;
        let converter = Options::default().depth_converter();
        let integrated: f64 = (0..steps)
            .map(|i| {
                let elapsed = (f64::from(i) + 0.5) * 600.0 / f64::from(steps);
                let ppo2 = converter.to_bar(segment.depth_at(elapsed));
                (600.0 / f64::from(steps) / 60.0) * ((ppo2 - 0.5) / 0.5).powf(5.0 / 6.0)
            })
            .sum();
        assert!((otu - integrated).abs() < 0.01, "closed form {otu}, integrated {integrated}");
    }

    #[test]
    fn test_otu_ascent_through_threshold() {
        let start = depth_for_pressure(1.0 / StandardGases::AIR.fo2());
        let segment = Segment::new(start, 0.0, StandardGases::AIR, 600.0).unwrap();
        let otu = toxicity().otu(&[segment]);
        assert!(otu > 0.0 && otu < 10.0, "got {otu}");
    }

    #[test]
    fn test_cns_limit_table() {
        assert_eq!(cns_limit(0.4), None);
        assert!((cns_limit(0.6).unwrap() - 720.0).abs() < 1e-9);
        assert!((cns_limit(1.0).unwrap() - 300.0).abs() < 1e-9);
        assert!((cns_limit(1.4).unwrap() - 150.0).abs() < 1e-9);
        assert!((cns_limit(1.6).unwrap() - 45.0).abs() < 1e-9);
        assert_eq!(cns_limit(3.0).unwrap(), MIN_CNS_LIMIT);
    }

    #[test]
    fn test_cns_full_exposure_at_limit() {
        let depth = depth_for_pressure(1.6);
        let segment = Segment::flat(depth, StandardGases::OXYGEN, 45.0 * 60.0).unwrap();
        let cns = toxicity().cns(&[segment]);
        assert!((cns - 100.0).abs() < 1e-6, "got {cns}");
    }
}
