//! Report command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::ReportArgs;
use cubrir::{merge_profiles, CoverProfile};

/// Execute the report command: parse an existing merged profile and print
/// the coverage report line (or the summary as JSON).
pub fn execute_report(config: &CliConfig, args: &ReportArgs) -> CliResult<()> {
    let raw = std::fs::read_to_string(&args.profile)?;
    let label = args
        .coverpkg
        .first()
        .cloned()
        .unwrap_or_else(|| args.profile.display().to_string());

    let profile = CoverProfile::parse(label, &raw)?;
    let merged = merge_profiles(vec![profile])?;

    let scope: Vec<String> = if args.coverpkg.is_empty() {
        merged.package_ids().map(str::to_string).collect()
    } else {
        args.coverpkg.clone()
    };
    let summary = merged.scope_summary(&scope);

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|err| CliError::config(err.to_string()))?;
        println!("{json}");
    } else if !config.verbosity.is_quiet() {
        println!("{}", summary.report_line());
    }
    Ok(())
}
