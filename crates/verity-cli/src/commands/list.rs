//! List command - print the scenarios a `run` with the same flags would execute

use crate::config::{RunArgs, RunConfig};
use crate::scenarios::{catalogue, select};
use crate::Result;

/// Scenario names in execution order
pub fn names(config: &RunConfig) -> Result<Vec<String>> {
    let picked = select(catalogue(config), &config.only, &config.skip)?;
    Ok(picked.iter().map(|s| s.name().to_string()).collect())
}

/// Run the list command
pub fn run(args: RunArgs) -> Result<()> {
    let config = RunConfig::try_from(args)?;
    for name in names(&config)? {
        println!("{name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{ARGOCD_METRICS, OPERATOR_DEPLOYMENT, SCENARIO_NAMES};

    #[test]
    fn lists_everything_by_default() {
        assert_eq!(names(&RunConfig::default()).unwrap(), SCENARIO_NAMES);
    }

    #[test]
    fn honours_filters() {
        let config = RunConfig {
            only: vec![ARGOCD_METRICS.to_string(), OPERATOR_DEPLOYMENT.to_string()],
            ..RunConfig::default()
        };
        assert_eq!(names(&config).unwrap(), [OPERATOR_DEPLOYMENT, ARGOCD_METRICS]);
    }
}
