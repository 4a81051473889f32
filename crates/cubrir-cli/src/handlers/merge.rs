//! Merge command handler

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::MergeArgs;
use cubrir::{aggregate, route, OutputPlacement, WorkerOutput};

/// Execute the merge command: aggregate the given worker profiles as one
/// package run, route the merged profile, print the coverage report line.
pub fn execute_merge(config: &CliConfig, args: &MergeArgs) -> CliResult<()> {
    let mut outputs = Vec::with_capacity(args.profiles.len());
    for path in &args.profiles {
        // A crashed worker leaves an empty file; aggregate() discards it
        // with a warning rather than failing the run
        let raw = std::fs::read_to_string(path)?;
        outputs.push(WorkerOutput::new(args.package.clone(), raw));
    }

    let result = aggregate(&outputs, &args.coverpkg)?;
    for warning in result.warnings() {
        warn_line(config, warning);
    }

    let mut placement =
        OutputPlacement::in_package_dir(&args.package_dir).with_append(args.append);
    if let Some(dir) = &args.outputdir {
        placement = placement.with_output_dir(dir);
    }
    if let Some(name) = &args.coverprofile {
        // A shared output dir names files after the package when more than
        // one package is in scope, so two packages cannot clobber each
        // other under the same custom name
        if args.outputdir.is_none() || args.coverpkg.len() <= 1 {
            placement = placement.with_file_name(name.clone());
        } else {
            warn_line(
                config,
                "ignoring --coverprofile: multiple packages share the output directory",
            );
        }
    }

    let dest = route(&result.combined_profile(), &placement)?;
    tracing::debug!(dest = %dest.display(), "routed merged profile");

    if !config.verbosity.is_quiet() {
        println!("{}", result.report_line());
    }
    if config.verbosity.is_verbose() {
        println!("merged profile written to {}", dest.display());
    }
    Ok(())
}

fn warn_line(config: &CliConfig, message: &str) {
    if config.color.should_color() {
        eprintln!("{}", console::style(format!("warning: {message}")).yellow());
    } else {
        eprintln!("warning: {message}");
    }
}
