// src/simulator/mod.rs: Remote simulation service boundary

pub mod http;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::errors::SweepError;

/// Parameters posted when creating a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSpec {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub case_type: String,
    pub mesh_quality: u32,
    pub clean_limit: u32,
    pub parallel: bool,
    pub cores: u32,
    pub background: String,
}

/// Parameters posted when adding a phyng to a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhyngSpec {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub phyng_type: String,
    pub dimensions: [f64; 3],
    pub location: [f64; 3],
    pub rotation: [f64; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions_in: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_in: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions_out: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_out: Option<[f64; 3]>,
}

/// A property value: a number, an `[x, y, z]` vector, or a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Scalar(f64),
    Vector([f64; 3]),
    Flag(bool),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Scalar(v) => write!(f, "{v}"),
            PropertyValue::Vector([x, y, z]) => write!(f, "[{x}, {y}, {z}]"),
            PropertyValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyngProperty {
    Temperature,
    Velocity,
}

impl PhyngProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            PhyngProperty::Temperature => "temperature",
            PhyngProperty::Velocity => "velocity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyngAction {
    TurnOn,
    Open,
    Close,
}

impl PhyngAction {
    /// The simulator exposes phyng actions as boolean property writes.
    pub fn as_property(self) -> (&'static str, bool) {
        match self {
            PhyngAction::TurnOn => ("enabled", true),
            PhyngAction::Open => ("open", true),
            PhyngAction::Close => ("open", false),
        }
    }
}

impl fmt::Display for PhyngAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhyngAction::TurnOn => "turnOn",
            PhyngAction::Open => "open",
            PhyngAction::Close => "close",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseAction {
    Setup,
    Run,
    Clean,
    Stop,
}

impl CaseAction {
    pub fn command(self) -> &'static str {
        match self {
            CaseAction::Setup => "setup",
            CaseAction::Run => "run",
            CaseAction::Clean => "clean",
            CaseAction::Stop => "stop",
        }
    }
}

/// Operations the sweep needs from the simulation service.
///
/// Create and add operations resolve the new resource before returning, so a
/// successful call means the handle is live. `case_action` distinguishes two
/// failure shapes: `Ok(Some(text))` is an error the service reported inline,
/// `Err(_)` means the request itself failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Simulator: Send + Sync {
    async fn list_cases(&self) -> Result<Vec<String>, SweepError>;

    async fn create_case(&self, spec: &CaseSpec) -> Result<(), SweepError>;

    async fn delete_case(&self, case: &str) -> Result<(), SweepError>;

    async fn add_phyng(&self, case: &str, spec: &PhyngSpec) -> Result<(), SweepError>;

    async fn write_property(
        &self,
        case: &str,
        phyng: &str,
        property: PhyngProperty,
        value: &PropertyValue,
    ) -> Result<(), SweepError>;

    async fn phyng_action(
        &self,
        case: &str,
        phyng: &str,
        action: PhyngAction,
    ) -> Result<(), SweepError>;

    async fn case_action(&self, case: &str, action: CaseAction)
        -> Result<Option<String>, SweepError>;
}
