//! `barrage plan`: print the stage plan a profile derives.

use crate::commands::{PlanArgs, PlanFormat};
use crate::error::{CliError, CliResult};
use barrage::derive_plan_named;

/// Render the plan for a profile name and peak
pub fn render_plan(test_type: &str, peak: u32, format: PlanFormat) -> CliResult<String> {
    if peak == 0 {
        return Err(CliError::config("peak concurrency must be positive"));
    }
    let plan = derive_plan_named(test_type, peak)?;
    match format {
        PlanFormat::Text => Ok(format!(
            "{} test, peak {peak} VUs (max {} VUs)\n{plan}",
            test_type.trim().to_lowercase(),
            plan.max_target()
        )),
        PlanFormat::Json => serde_json::to_string_pretty(&plan)
            .map_err(|e| CliError::run(format!("failed to serialize plan: {e}"))),
    }
}

/// Execute the plan command
pub fn execute_plan(args: &PlanArgs) -> CliResult<()> {
    println!("{}", render_plan(&args.test, args.peak, args.format)?);
    Ok(())
}
