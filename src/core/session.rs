// src/core/session.rs: Case creation, phyng population and configuration

use crate::infra::config::{Config, PhyngTemplate};
use crate::infra::errors::SweepError;
use crate::simulator::{
    CaseSpec, PhyngAction, PhyngProperty, PhyngSpec, PropertyValue, Simulator,
};

use super::backoff::{pause, Pacing};
use super::plan::{phyng_placements, Placement};
use super::types::{ActuatorKind, CaseSession, CaseState};

const WALLS: &str = "walls";
const BASE_HEATER: &str = "base_heater";
const BASE_WINDOW: &str = "base_window";

/// Builds cases on the simulator and fills them with phyngs.
pub struct SessionBuilder<'a> {
    sim: &'a dyn Simulator,
    config: &'a Config,
    pacing: &'a Pacing,
}

impl<'a> SessionBuilder<'a> {
    pub fn new(sim: &'a dyn Simulator, config: &'a Config, pacing: &'a Pacing) -> Self {
        Self {
            sim,
            config,
            pacing,
        }
    }

    /// Create a case from the template, overridden with mesh quality and cores.
    pub async fn create_case(
        &self,
        name: &str,
        mesh_quality: u32,
        cores: u32,
    ) -> Result<CaseSession, SweepError> {
        let template = &self.config.templates.case;
        let session = CaseSession::new(name, mesh_quality, cores);
        let spec = CaseSpec {
            name: session.name.clone(),
            case_type: template.case_type.clone(),
            mesh_quality,
            clean_limit: template.clean_limit,
            parallel: session.parallel,
            cores,
            background: template.background.clone(),
        };

        self.sim.create_case(&spec).await?;
        tracing::info!(case = name, mesh_quality, cores, "case created");
        pause(self.pacing.after_create).await;
        Ok(session)
    }

    /// Add one phyng from a template at the given placement.
    pub async fn add_phyng(
        &self,
        case: &mut CaseSession,
        name: &str,
        phyng_type: &str,
        template: &PhyngTemplate,
        placement: &Placement,
    ) -> Result<(), SweepError> {
        let spec = PhyngSpec {
            name: name.to_string(),
            phyng_type: phyng_type.to_string(),
            dimensions: template.dimensions,
            location: placement.location,
            rotation: template.rotation,
            material: template.material.clone(),
            dimensions_in: template.dimensions_in,
            location_in: placement.location_in,
            dimensions_out: template.dimensions_out,
            location_out: placement.location_out,
        };

        self.sim.add_phyng(&case.name, &spec).await?;
        case.phyngs.insert(name.to_string());
        case.state = CaseState::Populated;
        pause(self.pacing.after_phyng).await;
        Ok(())
    }

    /// Apply the operating parameters of `kind` to one phyng.
    ///
    /// Returns a description of the first failed write instead of an error so a
    /// half-configured phyng never aborts the trial.
    pub async fn configure_phyng(
        &self,
        case: &CaseSession,
        name: &str,
        kind: ActuatorKind,
    ) -> Option<String> {
        let template = self.config.templates.phyng(kind);
        match self.apply_operation(case, name, kind, template).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(case = %case.name, phyng = name, "configuration failed: {e}");
                Some(format!(
                    "Surface was not produced for {name}: {}",
                    e.remote_message()
                ))
            }
        }
    }

    async fn apply_operation(
        &self,
        case: &CaseSession,
        name: &str,
        kind: ActuatorKind,
        template: &PhyngTemplate,
    ) -> Result<(), SweepError> {
        if let Some(temperature) = template.temperature {
            self.write(case, name, PhyngProperty::Temperature, &PropertyValue::Scalar(temperature))
                .await?;
        }

        let action = match kind {
            ActuatorKind::Heaters => return Ok(()),
            ActuatorKind::Acs => PhyngAction::TurnOn,
            ActuatorKind::Windows | ActuatorKind::Doors => PhyngAction::Open,
        };

        if let Some(velocity) = &template.velocity {
            self.write(case, name, PhyngProperty::Velocity, velocity).await?;
        }
        self.sim.phyng_action(&case.name, name, action).await?;
        pause(self.pacing.after_write).await;
        Ok(())
    }

    async fn write(
        &self,
        case: &CaseSession,
        name: &str,
        property: PhyngProperty,
        value: &PropertyValue,
    ) -> Result<(), SweepError> {
        self.sim
            .write_property(&case.name, name, property, value)
            .await?;
        pause(self.pacing.after_write).await;
        Ok(())
    }

    /// Add the phyngs every trial needs besides the ones under test: walls, a
    /// heater unless heaters are under test, and an open window when doors are
    /// under test without windows so air can flow.
    pub async fn add_baseline(
        &self,
        case: &mut CaseSession,
        kinds: &[ActuatorKind],
    ) -> Result<(), SweepError> {
        let templates = &self.config.templates;

        if !case.has_phyng(WALLS) {
            let placement = Placement {
                location: templates.walls.location,
                location_in: None,
                location_out: None,
            };
            self.add_phyng(case, WALLS, "walls", &templates.walls, &placement)
                .await?;
        }

        if !kinds.contains(&ActuatorKind::Heaters) && !case.has_phyng(BASE_HEATER) {
            self.add_configured(case, BASE_HEATER, ActuatorKind::Heaters)
                .await?;
        }

        if kinds.contains(&ActuatorKind::Doors)
            && !kinds.contains(&ActuatorKind::Windows)
            && !case.has_phyng(BASE_WINDOW)
        {
            self.add_configured(case, BASE_WINDOW, ActuatorKind::Windows)
                .await?;
        }
        Ok(())
    }

    async fn add_configured(
        &self,
        case: &mut CaseSession,
        name: &str,
        kind: ActuatorKind,
    ) -> Result<(), SweepError> {
        let template = self.config.templates.phyng(kind);
        let placement = Placement {
            location: template.location,
            location_in: template.location_in,
            location_out: template.location_out,
        };
        self.add_phyng(case, name, kind.phyng_type(), template, &placement)
            .await?;
        if let Some(note) = self.configure_phyng(case, name, kind).await {
            case.notes.push(note);
        }
        Ok(())
    }

    /// Add and configure `count` phyngs of `kind`, spaced along the wall.
    pub async fn add_evaluated(
        &self,
        case: &mut CaseSession,
        kind: ActuatorKind,
        count: u32,
    ) -> Result<(), SweepError> {
        let template = self.config.templates.phyng(kind);
        for (i, placement) in phyng_placements(template, count).iter().enumerate() {
            let name = format!("{}{i}", kind.phyng_type());
            self.add_phyng(case, &name, kind.phyng_type(), template, placement)
                .await?;
            if let Some(note) = self.configure_phyng(case, &name, kind).await {
                case.notes.push(note);
            }
            case.evaluated += 1;
        }
        tracing::debug!(case = %case.name, %kind, count, "phyngs populated");
        Ok(())
    }

    /// Delete the case on the simulator. Failures are logged; the handle is gone either way.
    pub async fn release(&self, case: CaseSession) {
        match self.sim.delete_case(&case.name).await {
            Ok(()) => tracing::debug!(case = %case.name, "case deleted"),
            Err(e) => tracing::warn!(case = %case.name, "failed to delete case: {e}"),
        }
    }
}
