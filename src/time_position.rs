//! Parsing for the phase-position literal grammar (§6): `'beginning'`,
//! `'end'`, a non-negative integer of milliseconds, or a `"<n>%"`
//! percentage literal with `n` in `0..=100`.

use std::time::Duration;

use crate::error::{Location, StagehandError};

/// A parsed phase-position literal, not yet resolved against a
/// specific phase length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimePosition {
    /// The very start of the phase.
    Beginning,
    /// The very end of the phase.
    End,
    /// A fixed offset in milliseconds into the phase.
    Millis(u64),
    /// A percentage, `0..=100`, of the phase's length.
    Percent(f64),
}

impl TimePosition {
    /// Resolves this literal to a concrete offset within a phase of
    /// the given `length`. Raises [`StagehandError::InvalidPhasePosition`]
    /// if a numeric/percentage value falls outside the phase.
    pub fn resolve(self, length: Duration) -> Result<Duration, StagehandError> {
        match self {
            TimePosition::Beginning => Ok(Duration::ZERO),
            TimePosition::End => Ok(length),
            TimePosition::Millis(ms) => {
                let offset = Duration::from_millis(ms);
                if offset > length {
                    return Err(StagehandError::InvalidPhasePosition {
                        reason: format!(
                            "{ms}ms is past the end of a {}ms phase",
                            length.as_millis()
                        ),
                        location: Location::default(),
                    });
                }
                Ok(offset)
            }
            TimePosition::Percent(pct) => {
                if !(0.0..=100.0).contains(&pct) {
                    return Err(StagehandError::InvalidPhasePosition {
                        reason: format!("{pct}% is outside 0..=100"),
                        location: Location::default(),
                    });
                }
                Ok(Duration::from_secs_f64(length.as_secs_f64() * pct / 100.0))
            }
        }
    }
}

impl TryFrom<&str> for TimePosition {
    type Error = StagehandError;

    fn try_from(literal: &str) -> Result<Self, Self::Error> {
        match literal {
            "beginning" => return Ok(TimePosition::Beginning),
            "end" => return Ok(TimePosition::End),
            _ => {}
        }

        if let Some(pct) = literal.strip_suffix('%') {
            return pct
                .parse::<f64>()
                .map(TimePosition::Percent)
                .map_err(|_| invalid(literal));
        }

        literal
            .parse::<u64>()
            .map(TimePosition::Millis)
            .map_err(|_| invalid(literal))
    }
}

fn invalid(literal: &str) -> StagehandError {
    StagehandError::InvalidPhasePosition {
        reason: format!("\"{literal}\" is not 'beginning', 'end', an integer, or a percentage"),
        location: Location::default(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_all_four_forms() {
        assert_eq!(TimePosition::try_from("beginning").unwrap(), TimePosition::Beginning);
        assert_eq!(TimePosition::try_from("end").unwrap(), TimePosition::End);
        assert_eq!(TimePosition::try_from("150").unwrap(), TimePosition::Millis(150));
        assert_eq!(TimePosition::try_from("50%").unwrap(), TimePosition::Percent(50.0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(TimePosition::try_from("soon").is_err());
        assert!(TimePosition::try_from("-5").is_err());
        assert!(TimePosition::try_from("full%").is_err());
    }

    #[test]
    fn resolves_against_phase_length() {
        let length = Duration::from_millis(1000);
        assert_eq!(
            TimePosition::Beginning.resolve(length).unwrap(),
            Duration::ZERO
        );
        assert_eq!(TimePosition::End.resolve(length).unwrap(), length);
        assert_eq!(
            TimePosition::Millis(250).resolve(length).unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(
            TimePosition::Percent(50.0).resolve(length).unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn out_of_phase_values_are_errors() {
        let length = Duration::from_millis(1000);
        assert!(TimePosition::Millis(1001).resolve(length).is_err());
        assert!(TimePosition::Percent(101.0).resolve(length).is_err());
        assert!(TimePosition::Percent(-1.0).resolve(length).is_err());
    }
}
