//! Declarative deployment plans.
//!
//! A plan is an ordered list of steps, loaded from TOML:
//!
//! ```toml
//! [[steps]]
//! contract = "TokenFactory"
//!
//! [[steps]]
//! contract = "CustomToken"
//! section = "TOKEN"
//! args = ["Test Token", "TST", { section = "TOKEN_FACTORY", field = "ADDRESS" }]
//! ```

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{DeployError, DeployResult},
    step::DeploymentStep,
};

/// Ordered deployment steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    #[serde(default)]
    pub steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    pub fn new(steps: impl IntoIterator<Item = DeploymentStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    /// The factory deployment: `GovernanceFactory`, then `TokenFactory`.
    pub fn builtin() -> Self {
        Self::new([
            DeploymentStep::new("GovernanceFactory"),
            DeploymentStep::new("TokenFactory"),
        ])
    }

    /// Load and validate a plan from a TOML file.
    pub fn load_from_file(path: &Path) -> DeployResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DeployError::InvalidPlan(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| DeployError::InvalidPlan(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> DeployResult<Self> {
        let plan: Self =
            toml::from_str(content).map_err(|e| DeployError::InvalidPlan(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Reject empty plans, unnamed contracts and sections written twice.
    pub fn validate(&self) -> DeployResult<()> {
        if self.steps.is_empty() {
            return Err(DeployError::InvalidPlan("plan has no steps".to_string()));
        }

        let mut sections = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.contract.trim().is_empty() {
                return Err(DeployError::InvalidPlan(format!(
                    "step {index} has no contract name"
                )));
            }

            let section = step.section_name();
            if !sections.insert(section.clone()) {
                return Err(DeployError::InvalidPlan(format!(
                    "section `{section}` is written by more than one step"
                )));
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
