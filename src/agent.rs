//! Agent state for the activity-driven model.
//!
//! Agents are index-addressed; the first `n_bots` indices of a simulation are
//! bots whose opinion never changes. Agents serialize to a single comma
//! separated record so that state can be written out and read back in.

use crate::error::{Result, SimulationError};

/// Per-agent state.
///
/// - `opinion`: scalar opinion x_i
/// - `activity`: activation probability a_i in [eps, 1]
/// - `reluctance`: resistance to change m_i > 0 (divides social influence)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub opinion: f64,
    pub activity: f64,
    pub reluctance: f64,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            opinion: 0.0,
            activity: 0.0,
            reluctance: 1.0,
        }
    }
}

impl Agent {
    /// Create a new agent.
    pub fn new(opinion: f64, activity: f64, reluctance: f64) -> Self {
        Self {
            opinion,
            activity,
            reluctance,
        }
    }

    /// Parse an agent from a record `opinion, activity[, reluctance]`.
    ///
    /// Reluctance defaults to 1.0 when the third field is absent.
    pub fn from_record(record: &str) -> Result<Self> {
        let fields: Vec<&str> = record.split(',').map(str::trim).collect();

        if fields.len() < 2 || fields.len() > 3 {
            return Err(SimulationError::ParseRecord(format!(
                "expected 2 or 3 comma separated fields, found {}",
                fields.len()
            )));
        }

        let opinion = parse_field(fields[0], "opinion")?;
        let activity = parse_field(fields[1], "activity")?;
        let reluctance = match fields.get(2) {
            Some(field) => parse_field(field, "reluctance")?,
            None => 1.0,
        };

        if reluctance <= 0.0 {
            return Err(SimulationError::ParseRecord(format!(
                "reluctance must be positive, got {reluctance}"
            )));
        }

        Ok(Self {
            opinion,
            activity,
            reluctance,
        })
    }

    /// Format the agent as `opinion, activity, reluctance`.
    ///
    /// Uses the shortest representation that parses back to the same value.
    pub fn to_record(&self) -> String {
        format!("{}, {}, {}", self.opinion, self.activity, self.reluctance)
    }

    /// Column names matching `to_record`.
    pub fn column_names() -> [&'static str; 3] {
        ["opinion", "activity", "reluctance"]
    }
}

fn parse_field(field: &str, name: &str) -> Result<f64> {
    field.parse::<f64>().map_err(|e| {
        SimulationError::ParseRecord(format!("invalid {name} '{field}': {e}"))
    })
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Agent(x={:.4}, a={:.4}, m={:.4})",
            self.opinion, self.activity, self.reluctance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_record_three_fields() {
        let agent = Agent::from_record("0.5, 0.1, 2.0").unwrap();
        assert_eq!(agent, Agent::new(0.5, 0.1, 2.0));
    }

    #[test]
    fn test_from_record_default_reluctance() {
        let agent = Agent::from_record("-0.25,0.3").unwrap();
        assert_eq!(agent.opinion, -0.25);
        assert_eq!(agent.activity, 0.3);
        assert_eq!(agent.reluctance, 1.0);
    }

    #[test]
    fn test_record_round_trip() {
        let agent = Agent::new(0.123456789012345, 0.0421, 1.75);
        let parsed = Agent::from_record(&agent.to_record()).unwrap();
        assert_eq!(parsed, agent);
    }

    #[test]
    fn test_malformed_records() {
        assert!(Agent::from_record("").is_err());
        assert!(Agent::from_record("0.5").is_err());
        assert!(Agent::from_record("0.5, abc").is_err());
        assert!(Agent::from_record("0.5, 0.1, 1.0, 4.0").is_err());
        assert!(Agent::from_record("0.5, 0.1, 0.0").is_err());
    }
}
