use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/*
=======================
Metrics and algorithms
=======================
*/

/// Whether higher values mean more or less similar genomes
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    /// Identity-style scores (ANI, AAI, intergenomic similarity)
    Identity,
    /// Dissimilarity scores (sketch distances)
    Distance,
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricFamily::Identity => write!(f, "identity"),
            MetricFamily::Distance => write!(f, "distance"),
        }
    }
}

/// Metrics that can be selected for pairwise fusion
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Mash,
    Ani,
    Aai,
    Viridic,
    #[value(name = "vcontact2")]
    Vcontact2,
}

impl Metric {
    /// Column and file name key of the metric
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Mash => "mash",
            Metric::Ani => "ani",
            Metric::Aai => "aai",
            Metric::Viridic => "viridic",
            Metric::Vcontact2 => "vcontact2",
        }
    }
    /// Algorithms contributing to the metric, in aggregation order
    pub fn tools(&self) -> &'static [Tool] {
        match self {
            Metric::Mash => &[Tool::Mash, Tool::Sourmash],
            Metric::Ani => &[Tool::Fastani, Tool::Skani],
            Metric::Aai => &[Tool::Comparem],
            Metric::Viridic => &[Tool::Viridic],
            Metric::Vcontact2 => &[Tool::Vcontact2],
        }
    }
    pub fn family(&self) -> MetricFamily {
        match self {
            Metric::Mash => MetricFamily::Distance,
            _ => MetricFamily::Identity,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// External comparison tools with a registered output parser
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Fastani,
    Skani,
    Mash,
    Sourmash,
    Comparem,
    Viridic,
    Vcontact2,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Fastani => "fastani",
            Tool::Skani => "skani",
            Tool::Mash => "mash",
            Tool::Sourmash => "sourmash",
            Tool::Comparem => "comparem",
            Tool::Viridic => "viridic",
            Tool::Vcontact2 => "vcontact2",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Tool {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fastani" => Ok(Tool::Fastani),
            "skani" => Ok(Tool::Skani),
            "mash" => Ok(Tool::Mash),
            "sourmash" => Ok(Tool::Sourmash),
            "comparem" => Ok(Tool::Comparem),
            "viridic" => Ok(Tool::Viridic),
            "vcontact2" => Ok(Tool::Vcontact2),
            other => Err(MetricsError::UnknownTool(other.to_string())),
        }
    }
}

/*
==================
K-mer parameters
==================
*/

/// K-mer size of a comparison, or the sentinel for parameter-free tools
///
/// Ordered by k-mer size with `Static` last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Kmer(u32),
    Static,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Kmer(k) => write!(f, "{k}"),
            Parameter::Static => write!(f, "static"),
        }
    }
}

impl FromStr for Parameter {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value == "static" {
            return Ok(Parameter::Static);
        }
        value
            .parse::<u32>()
            .map(Parameter::Kmer)
            .map_err(|_| MetricsError::InvalidParameter(value.to_string()))
    }
}

/// Accepted k-mer sizes for one side of the fusion; `None` accepts all
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct KmerSet(Option<BTreeSet<u32>>);

impl KmerSet {
    pub fn any() -> Self {
        Self(None)
    }
    pub fn from_sizes(sizes: &[u32]) -> Self {
        Self(Some(sizes.iter().copied().collect()))
    }
    /// Parameter-free records are always accepted
    pub fn accepts(&self, parameter: &Parameter) -> bool {
        match (parameter, &self.0) {
            (Parameter::Static, _) | (_, None) => true,
            (Parameter::Kmer(k), Some(sizes)) => sizes.contains(k),
        }
    }
    /// Sizes accepted by either set
    pub fn union(&self, other: &KmerSet) -> KmerSet {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => KmerSet(Some(a.union(b).copied().collect())),
            _ => KmerSet(None),
        }
    }
}

impl fmt::Display for KmerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => write!(f, "all"),
            Some(sizes) => {
                let sizes = sizes.iter().map(|k| k.to_string()).collect::<Vec<_>>();
                write!(f, "{}", sizes.join(","))
            }
        }
    }
}

impl FromStr for KmerSet {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sizes = BTreeSet::new();
        for value in s.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            match value.parse::<u32>() {
                Ok(k) if k > 0 => {
                    sizes.insert(k);
                }
                _ => return Err(MetricsError::InvalidKmerSet(s.to_string())),
            }
        }
        if sizes.is_empty() {
            return Err(MetricsError::InvalidKmerSet(s.to_string()));
        }
        Ok(Self(Some(sizes)))
    }
}

/*
===================
Genome pair record
===================
*/

/// Normalized pairwise measurement from one tool
#[derive(Debug, Clone, PartialEq)]
pub struct GenomePairRecord {
    pub genome_a: String,
    pub genome_b: String,
    pub value: f64,
    pub parameter: Parameter,
    pub algorithm: Tool,
    pub family: MetricFamily,
}

/// Uniqueness key of a record within a family table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub genome_a: String,
    pub genome_b: String,
    pub parameter: Parameter,
    pub algorithm: Tool,
}

impl GenomePairRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            genome_a: self.genome_a.clone(),
            genome_b: self.genome_b.clone(),
            parameter: self.parameter,
            algorithm: self.algorithm,
        }
    }
    /// Copy of the record with the value rounded to `digits` decimals
    pub fn rounded(&self, digits: i32) -> Self {
        Self {
            value: round_to(self.value, digits),
            ..self.clone()
        }
    }
}

/// Round half away from zero to a number of decimal digits
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
