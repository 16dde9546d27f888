//! Text notation for gases and profiles.
//!
//! # Gas names
//!
//! `Air`, `Oxygen` (or `O2`), `EAN32` (also `EANx32`, `Nitrox 32`),
//! `Trimix 18/45`, `Helitrox 21/35`, `Heliox 10/90`. Case insensitive.
//!
//! # Profiles
//!
//! Each segment is written as `start,end,duration;` (metres, metres, seconds),
//! segments separated by a space:
//!
//! ```
//! use deco_compute::gases::StandardGases;
//! use deco_compute::notation::{format_profile, parse_profile};
//!
//! let segments = parse_profile("0,10,30; 10,10,2370;", StandardGases::AIR).unwrap();
//! assert_eq!(format_profile(&segments), "0,10,30; 10,10,2370;");
//! ```

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, multispace0, u32 as decimal},
    combinator::{all_consuming, map, value},
    multi::many1,
    number::complete::double,
    sequence::{delimited, preceded, separated_pair, terminated},
    IResult, Parser,
};

use crate::error::PlanError;
use crate::gases::{Gas, StandardGases};
use crate::segments::Segment;

/// Parsed, not yet validated, gas name.
#[derive(Debug, Clone, Copy, PartialEq)]
enum GasSpec {
    Air,
    Oxygen,
    Nitrox(u32),
    Helium(u32, u32),
}

impl GasSpec {
    fn into_gas(self) -> Result<Gas, PlanError> {
        match self {
            GasSpec::Air => Ok(StandardGases::AIR),
            GasSpec::Oxygen => Ok(StandardGases::OXYGEN),
            GasSpec::Nitrox(o2) => Gas::new(percent(o2), 0.0),
            GasSpec::Helium(o2, he) => Gas::new(percent(o2), percent(he)),
        }
    }
}

fn percent(value: u32) -> f64 {
    f64::from(value) / 100.0
}

fn rounded_percent(fraction: f64) -> u32 {
    (fraction * 100.0).round() as u32
}

/// Canonical name of the gas.
pub fn gas_name(gas: &Gas) -> String {
    let o2 = rounded_percent(gas.fo2());
    let he = rounded_percent(gas.fhe());

    if he == 0 {
        if gas.composition_equals(&StandardGases::AIR) {
            return "Air".to_string();
        }
        if o2 == 100 {
            return "Oxygen".to_string();
        }
        return format!("EAN{o2}");
    }

    if o2 + he == 100 {
        format!("Heliox {o2}/{he}")
    } else if o2 >= 21 {
        format!("Helitrox {o2}/{he}")
    } else {
        format!("Trimix {o2}/{he}")
    }
}

/// Parse a gas name.
pub fn parse_gas(input: &str) -> Result<Gas, PlanError> {
    let trimmed = input.trim();
    let parsed: IResult<&str, GasSpec> = all_consuming(parse_gas_spec).parse(trimmed);
    match parsed {
        Ok((_, spec)) => spec.into_gas(),
        Err(_) => Err(PlanError::UnknownGas(trimmed.to_string())),
    }
}

fn parse_gas_spec(input: &str) -> IResult<&str, GasSpec> {
    alt((parse_air, parse_oxygen, parse_nitrox, parse_helium)).parse(input)
}

fn parse_air(input: &str) -> IResult<&str, GasSpec> {
    value(GasSpec::Air, tag_no_case("air")).parse(input)
}

fn parse_oxygen(input: &str) -> IResult<&str, GasSpec> {
    value(
        GasSpec::Oxygen,
        alt((tag_no_case("oxygen"), tag_no_case("o2"))),
    )
    .parse(input)
}

fn parse_nitrox(input: &str) -> IResult<&str, GasSpec> {
    let prefix = alt((
        tag_no_case("eanx"),
        tag_no_case("ean"),
        tag_no_case("nitrox"),
    ));
    map(preceded((prefix, multispace0), decimal), GasSpec::Nitrox).parse(input)
}

fn parse_helium(input: &str) -> IResult<&str, GasSpec> {
    let prefix = alt((
        tag_no_case("trimix"),
        tag_no_case("helitrox"),
        tag_no_case("heliox"),
        tag_no_case("tx"),
    ));
    map(
        preceded(
            (prefix, multispace0),
            separated_pair(decimal, char('/'), decimal),
        ),
        |(o2, he)| GasSpec::Helium(o2, he),
    )
    .parse(input)
}

/// Compact text form of the segments, e.g. `0,10,30; 10,10,2370;`.
pub fn format_profile(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| format!("{},{},{};", s.start_depth(), s.end_depth(), s.duration()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the compact text form, all segments breathing `gas`.
pub fn parse_profile(input: &str, gas: Gas) -> Result<Vec<Segment>, PlanError> {
    let parsed: IResult<&str, Vec<(f64, f64, f64)>> =
        all_consuming(many1(parse_segment)).parse(input);

    match parsed {
        Ok((_, items)) => items
            .into_iter()
            .map(|(start, end, duration)| Segment::new(start, end, gas, duration))
            .collect(),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(PlanError::ParseError {
            position: input.len() - e.input.len(),
            message: format!("unexpected input: '{}'", e.input.trim()),
        }),
        Err(nom::Err::Incomplete(_)) => Err(PlanError::ParseError {
            position: input.len(),
            message: "incomplete input".to_string(),
        }),
    }
}

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn parse_segment(input: &str) -> IResult<&str, (f64, f64, f64)> {
    let (input, (start, _, end, _, duration)) = terminated(
        (ws(double), char(','), ws(double), char(','), ws(double)),
        ws(char(';')),
    )
    .parse(input)?;
    Ok((input, (start, end, duration)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_names() {
        assert_eq!(gas_name(&StandardGases::AIR), "Air");
        assert_eq!(gas_name(&StandardGases::OXYGEN), "Oxygen");
        assert_eq!(gas_name(&StandardGases::EAN32), "EAN32");
        assert_eq!(gas_name(&StandardGases::TRIMIX_18_45), "Trimix 18/45");
        assert_eq!(gas_name(&StandardGases::TRIMIX_21_35), "Helitrox 21/35");
        assert_eq!(gas_name(&Gas::new(0.1, 0.9).unwrap()), "Heliox 10/90");
        assert_eq!(StandardGases::EAN50.to_string(), "EAN50");
    }

    #[test]
    fn test_parse_gas_names() {
        assert!(parse_gas("air").unwrap().composition_equals(&StandardGases::AIR));
        assert!(parse_gas("O2").unwrap().composition_equals(&StandardGases::OXYGEN));
        assert!(parse_gas(" EAN32 ").unwrap().composition_equals(&StandardGases::EAN32));
        assert!(parse_gas("Nitrox 50").unwrap().composition_equals(&StandardGases::EAN50));
        assert!(parse_gas("eanx36").unwrap().composition_equals(&StandardGases::EAN36));
        assert!(parse_gas("Trimix 18/45")
            .unwrap()
            .composition_equals(&StandardGases::TRIMIX_18_45));
        assert!(parse_gas("tx10/70")
            .unwrap()
            .composition_equals(&StandardGases::TRIMIX_10_70));
    }

    #[test]
    fn test_parse_gas_round_trips_names() {
        for gas in [
            StandardGases::AIR,
            StandardGases::EAN36,
            StandardGases::OXYGEN,
            StandardGases::TRIMIX_21_35,
        ] {
            let parsed = parse_gas(&gas_name(&gas)).unwrap();
            assert!(parsed.composition_equals(&gas), "{gas} did not round trip");
        }
    }

    #[test]
    fn test_parse_gas_errors() {
        assert_eq!(
            parse_gas("Kryptox"),
            Err(PlanError::UnknownGas("Kryptox".to_string()))
        );
        assert!(matches!(parse_gas("Trimix 60/60"), Err(PlanError::InvalidGas { .. })));
        assert!(parse_gas("EAN").is_err());
    }

    #[test]
    fn test_format_profile() {
        let segments = vec![
            Segment::new(0.0, 10.0, StandardGases::AIR, 30.0).unwrap(),
            Segment::flat(10.0, StandardGases::AIR, 2370.0).unwrap(),
            Segment::new(10.0, 3.0, StandardGases::AIR, 42.0).unwrap(),
        ];
        assert_eq!(format_profile(&segments), "0,10,30; 10,10,2370; 10,3,42;");
        assert_eq!(format_profile(&[]), "");
    }

    #[test]
    fn test_parse_profile() {
        let segments = parse_profile("0,21.5,60;21.5,21.5, 600; ", StandardGases::EAN32).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end_depth(), 21.5);
        assert_eq!(segments[1].duration(), 600.0);
        assert!(segments[1].gas().composition_equals(&StandardGases::EAN32));
    }

    #[test]
    fn test_parse_profile_errors() {
        let err = parse_profile("0,10,30; 10,10", StandardGases::AIR).unwrap_err();
        assert!(matches!(err, PlanError::ParseError { .. }), "got {err:?}");

        let err = parse_profile("0,10,-30;", StandardGases::AIR).unwrap_err();
        assert!(matches!(err, PlanError::InvalidSegment(_)), "got {err:?}");

        assert!(parse_profile("", StandardGases::AIR).is_err());
    }
}
