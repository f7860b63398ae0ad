//! Plain-text network and agent files.
//!
//! Both formats are comma separated, one record per line, with `#` starting a
//! comment line.
//!
//! Network records list the incoming edges of one agent:
//!
//! ```text
//! # idx_agent, n_neighbours_in, indices_neighbours_in[...], weights_in[...]
//! 0, 2, 1, 3, 0.5, 0.5
//! ```
//!
//! Agent records are `opinion, activity, reluctance`, one agent per line in
//! index order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::agent::Agent;
use crate::error::{Result, SimulationError};
use crate::network::{EdgeDirection, Network};

/// Lines holding records, with their 1-based line numbers.
fn records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, String)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    None
                } else {
                    Some(Ok((idx + 1, trimmed.to_string())))
                }
            }
            Err(e) => Some(Err(SimulationError::Io(e))),
        })
}

fn parse_error(line: usize, message: String) -> SimulationError {
    SimulationError::Parse { line, message }
}

/// Parse one network record into `(agent, neighbours, weights)`.
fn parse_network_record(line: usize, record: &str) -> Result<(usize, Vec<usize>, Vec<f64>)> {
    let fields: Vec<&str> = record.split(',').map(str::trim).collect();
    if fields.len() < 2 {
        return Err(parse_error(
            line,
            "expected at least an agent index and a neighbour count".to_string(),
        ));
    }

    let parse_index = |field: &str, what: &str| {
        field
            .parse::<usize>()
            .map_err(|e| parse_error(line, format!("invalid {what} '{field}': {e}")))
    };

    let agent = parse_index(fields[0], "agent index")?;
    let n_neighbours = parse_index(fields[1], "neighbour count")?;

    if fields.len() != 2 + 2 * n_neighbours {
        return Err(parse_error(
            line,
            format!(
                "agent {agent} declares {n_neighbours} neighbours but the record has {} fields",
                fields.len()
            ),
        ));
    }

    let neighbours = fields[2..2 + n_neighbours]
        .iter()
        .map(|field| parse_index(*field, "neighbour index"))
        .collect::<Result<Vec<usize>>>()?;
    let weights = fields[2 + n_neighbours..]
        .iter()
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|e| parse_error(line, format!("invalid weight '{field}': {e}")))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok((agent, neighbours, weights))
}

/// Read a network of incoming edges.
///
/// The agent count is one past the largest agent index; agents without a
/// record have no neighbours. Duplicate records are an error.
pub fn network_from_file<P: AsRef<Path>>(path: P) -> Result<Network> {
    let reader = BufReader::new(File::open(path)?);

    let mut neighbour_list: Vec<Vec<usize>> = Vec::new();
    let mut weight_list: Vec<Vec<f64>> = Vec::new();
    let mut seen: Vec<bool> = Vec::new();

    for record in records(reader) {
        let (line, record) = record?;
        let (agent, neighbours, weights) = parse_network_record(line, &record)?;

        if agent >= neighbour_list.len() {
            neighbour_list.resize(agent + 1, Vec::new());
            weight_list.resize(agent + 1, Vec::new());
            seen.resize(agent + 1, false);
        }
        if seen[agent] {
            return Err(parse_error(line, format!("duplicate record for agent {agent}")));
        }
        seen[agent] = true;
        neighbour_list[agent] = neighbours;
        weight_list[agent] = weights;
    }

    Network::from_adjacency(neighbour_list, weight_list, EdgeDirection::Incoming)
}

/// Write the network in its current orientation, one record per agent.
pub fn network_to_file<P: AsRef<Path>>(network: &Network, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    let direction = match network.direction() {
        EdgeDirection::Incoming => "in",
        EdgeDirection::Outgoing => "out",
    };
    writeln!(
        writer,
        "# idx_agent, n_neighbours_{direction}, indices_neighbours_{direction}[...], weights_{direction}[...]"
    )?;

    for idx in 0..network.n_agents() {
        let neighbours = network.neighbours(idx);
        write!(writer, "{idx}, {}", neighbours.len())?;
        for j in neighbours {
            write!(writer, ", {j}")?;
        }
        for w in network.weights(idx) {
            write!(writer, ", {w}")?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read agents, one record per non-comment line.
pub fn agents_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Agent>> {
    let reader = BufReader::new(File::open(path)?);

    records(reader)
        .map(|record| {
            let (line, record) = record?;
            Agent::from_record(&record).map_err(|e| e.at_line(line))
        })
        .collect()
}

/// Write agents with a column header.
pub fn agents_to_file<P: AsRef<Path>>(agents: &[Agent], path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    writeln!(writer, "# {}", Agent::column_names().join(", "))?;
    for agent in agents {
        writeln!(writer, "{}", agent.to_record())?;
    }

    writer.flush()?;
    Ok(())
}
