//! CSV instance loading.
//!
//! An instance is assembled from four tables: the depot, the customers with their
//! demands, the vehicle fleet and the cost parameters. Readers are generic over
//! [`Read`] so the tables can come from files or from memory.

use crate::error::{Result, SolverError};
use crate::instance::{CostParameters, CvrpInstance, Node};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Fuel efficiency in km/l used when the parameter table defines none
pub const DEFAULT_FUEL_EFFICIENCY: f64 = 8.0;
/// Average speed in km/h used when the caller does not supply one
pub const DEFAULT_SPEED_KMH: f64 = 25.0;

#[derive(Debug, Deserialize)]
struct DepotRecord {
    #[serde(rename = "StandardizedID")]
    id: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ClientRecord {
    #[serde(rename = "StandardizedID")]
    id: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Demand")]
    demand: f64,
}

#[derive(Debug, Deserialize)]
struct VehicleRecord {
    #[serde(rename = "Capacity")]
    capacity: f64,
}

#[derive(Debug, Deserialize)]
struct ParameterRecord {
    #[serde(rename = "Parameter")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
}

fn read_records<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut records = Vec::new();

    for record in reader.deserialize() {
        records.push(record?);
    }

    Ok(records)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        SolverError::Io(std::io::Error::new(e.kind(), format!("cannot open {}: {}", path.display(), e)))
    })
}

/// Read the depot table. Only the first row is used.
pub fn read_depot<R: Read>(reader: R) -> Result<Node> {
    let records: Vec<DepotRecord> = read_records(reader)?;
    let first = records
        .into_iter()
        .next()
        .ok_or_else(|| SolverError::InvalidInstance("depot table has no rows".to_string()))?;

    Ok(Node::depot(first.id, first.latitude, first.longitude))
}

/// Read the customer table, sorted by id
pub fn read_customers<R: Read>(reader: R) -> Result<Vec<Node>> {
    let records: Vec<ClientRecord> = read_records(reader)?;
    let mut customers: Vec<Node> = records
        .into_iter()
        .map(|r| Node::new(r.id, r.latitude, r.longitude, r.demand))
        .collect();
    customers.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(customers)
}

/// Read the fleet table and pick the homogeneous capacity
pub fn read_capacity<R: Read>(reader: R) -> Result<f64> {
    let records: Vec<VehicleRecord> = read_records(reader)?;
    let capacities: Vec<f64> = records.into_iter().map(|r| r.capacity).collect();
    select_homogeneous_capacity(&capacities)
}

/// Most frequent capacity of the fleet, ties going to the smallest value
pub fn select_homogeneous_capacity(capacities: &[f64]) -> Result<f64> {
    if capacities.is_empty() {
        return Err(SolverError::NoVehicles);
    }

    let mut sorted = capacities.to_vec();
    sorted.sort_by(f64::total_cmp);

    // (value, count) runs in ascending order of value
    let mut runs: Vec<(f64, usize)> = Vec::new();
    for &capacity in &sorted {
        match runs.last_mut() {
            Some((value, count)) if *value == capacity => *count += 1,
            _ => runs.push((capacity, 1)),
        }
    }

    let mut best = runs[0];
    for &run in &runs[1..] {
        // Strict comparison keeps the smallest value on ties
        if run.1 > best.1 {
            best = run;
        }
    }

    if runs.len() > 1 {
        log::warn!(
            "fleet has {} distinct capacities; using the most frequent one ({})",
            runs.len(),
            best.0
        );
    }

    Ok(best.0)
}

/// Read the `Parameter,Value` table into cost coefficients.
///
/// `C_fixed`, `C_dist`, `C_time` and `fuel_price` are required. Every parameter whose
/// name contains `fuel_efficiency` is averaged into the fuel efficiency.
pub fn read_parameters<R: Read>(reader: R, speed: f64) -> Result<CostParameters> {
    let records: Vec<ParameterRecord> = read_records(reader)?;
    let table: Vec<(String, String)> = records.into_iter().map(|r| (r.name, r.value)).collect();
    parse_parameters(&table, speed)
}

fn parse_value(name: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| SolverError::InvalidInstance(format!("parameter {} has non-numeric value {:?}", name, raw)))
}

/// Build cost coefficients from `(name, value)` pairs
pub fn parse_parameters(table: &[(String, String)], speed: f64) -> Result<CostParameters> {
    let lookup: HashMap<&str, &str> = table.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let required = |name: &str| -> Result<f64> {
        match lookup.get(name) {
            Some(raw) => parse_value(name, raw),
            None => Err(SolverError::MissingParameter(name.to_string())),
        }
    };

    let efficiencies = table
        .iter()
        .filter(|(name, _)| name.contains("fuel_efficiency"))
        .map(|(name, raw)| parse_value(name, raw))
        .collect::<Result<Vec<f64>>>()?;
    let fuel_efficiency = if efficiencies.is_empty() {
        DEFAULT_FUEL_EFFICIENCY
    } else {
        efficiencies.iter().sum::<f64>() / efficiencies.len() as f64
    };

    Ok(CostParameters {
        fixed_cost: required("C_fixed")?,
        distance_cost: required("C_dist")?,
        time_cost: required("C_time")?,
        fuel_price: required("fuel_price")?,
        fuel_efficiency,
        speed,
    })
}

/// Build an instance from four in-memory or on-disk tables
pub fn load_instance<D: Read, C: Read, V: Read, P: Read>(
    name: &str,
    depots: D,
    clients: C,
    vehicles: V,
    parameters: P,
    speed: f64,
) -> Result<CvrpInstance> {
    let depot = read_depot(depots)?;
    let customers = read_customers(clients)?;
    let capacity = read_capacity(vehicles)?;
    let costs = read_parameters(parameters, speed)?;

    let instance = CvrpInstance::new(name, depot, customers, capacity, costs)?;
    log::info!(
        "Loaded instance {}: {} customers, capacity {}",
        instance.name,
        instance.num_customers(),
        instance.capacity()
    );
    Ok(instance)
}

/// Locations of the four input tables
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceFiles {
    pub name: String,
    pub depots: PathBuf,
    pub clients: PathBuf,
    pub vehicles: PathBuf,
    pub parameters: PathBuf,
    /// Average speed in km/h
    pub speed: f64,
}

impl InstanceFiles {
    /// Explicit paths for each table
    pub fn new(
        depots: impl Into<PathBuf>,
        clients: impl Into<PathBuf>,
        vehicles: impl Into<PathBuf>,
        parameters: impl Into<PathBuf>,
    ) -> Self {
        let clients = clients.into();
        let name = clients
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cvrp".to_string());

        InstanceFiles {
            name,
            depots: depots.into(),
            clients,
            vehicles: vehicles.into(),
            parameters: parameters.into(),
            speed: DEFAULT_SPEED_KMH,
        }
    }

    /// Two-directory layout: the base directory holds `depots.csv`, the case
    /// directory holds `clients.csv`, `vehicles.csv` and `parameters_urban.csv`.
    pub fn from_dirs<B: AsRef<Path>, C: AsRef<Path>>(base_dir: B, case_dir: C) -> Self {
        let base = base_dir.as_ref();
        let case = case_dir.as_ref();

        InstanceFiles::new(
            base.join("depots.csv"),
            case.join("clients.csv"),
            case.join("vehicles.csv"),
            case.join("parameters_urban.csv"),
        )
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn load(&self) -> Result<CvrpInstance> {
        load_instance(
            &self.name,
            open(&self.depots)?,
            open(&self.clients)?,
            open(&self.vehicles)?,
            open(&self.parameters)?,
            self.speed,
        )
    }
}
