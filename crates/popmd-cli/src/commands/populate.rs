use crate::cli::PopulateArgs;
use crate::config::{AppConfig, build_config};
use crate::error::{CliError, Result};
use crate::output;
use crate::utils::progress::CliProgressHandler;
use popmd::comm::Communicator;
use popmd::comm::threaded::ThreadComm;
use popmd::core::models::store::ParticleStore;
use popmd::engine::context::PopulateContext;
use popmd::engine::progress::ProgressReporter;
use popmd::workflows::populate::{self, PopulateReport, PopulateWarning};
use tracing::{info, warn};

/// Final per-rank stores (in rank order) and the report every rank agreed on.
pub struct RunOutcome {
    pub stores: Vec<ParticleStore>,
    pub report: PopulateReport,
}

pub fn run(args: PopulateArgs, show_progress: bool) -> Result<()> {
    let config = build_config(&args)?;
    info!(
        "Populating with '{}' placement on {} rank(s).",
        config.populate.placement.name(),
        config.ranks
    );

    let progress = if show_progress {
        CliProgressHandler::new()
    } else {
        CliProgressHandler::hidden()
    };
    let outcome = execute(&config, &progress)?;
    let report = &outcome.report;

    for warning in &report.warnings {
        match warning {
            PopulateWarning::Shortfall {
                inserted,
                requested,
            } => println!(
                "Warning: only inserted {} particles out of {}",
                inserted, requested
            ),
            PopulateWarning::MultipleTemplateSets { template, sets } => println!(
                "Warning: template '{}' holds {} molecules, only the first was used",
                template, sets
            ),
        }
    }

    println!(
        "Created {} atoms ({} molecules) in {:.3} s",
        report.atoms_created,
        report.molecules_created,
        report.elapsed.as_secs_f64()
    );
    if report.migrated > 0 {
        println!("  {} atoms migrated to their owning rank", report.migrated);
    }
    if report.special_rebuild {
        println!("  Special neighbor lists need to be rebuilt from the new bonds");
    }

    if let Some(path) = &config.output {
        let records = output::collect_records(&outcome.stores);
        output::write_csv(path, &records)?;
        println!("Wrote {} atoms to {}", records.len(), path.display());
    }
    Ok(())
}

/// Runs the populate workflow on `config.ranks` in-process ranks.
///
/// Only rank 0 reports progress. If any rank fails, the error of the lowest failing rank is
/// returned.
pub fn execute(config: &AppConfig, progress: &CliProgressHandler) -> Result<RunOutcome> {
    let results = ThreadComm::launch(config.ranks, |comm| {
        let reporter = if comm.is_root() {
            ProgressReporter::with_callback(progress.callback())
        } else {
            ProgressReporter::new()
        };
        let ctx = PopulateContext::new(
            comm,
            &config.domain,
            &config.decomposition,
            &config.lattice,
            &reporter,
        );
        let mut store = ParticleStore::new(config.atom_types, config.style);
        let report = populate::run(&ctx, &mut store, None, &config.populate);
        (store, report)
    });

    let mut stores = Vec::with_capacity(results.len());
    let mut root_report = None;
    for (rank, (store, report)) in results.into_iter().enumerate() {
        let report = report.map_err(|e| {
            warn!(rank, "Rank failed: {}", e);
            CliError::Populate(e)
        })?;
        if rank == 0 {
            root_report = Some(report);
        }
        stores.push(store);
    }
    let report = root_report
        .ok_or_else(|| CliError::Argument("The run needs at least one rank.".to_string()))?;
    Ok(RunOutcome { stores, report })
}
