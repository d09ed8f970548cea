use itertools::{Itertools, MinMaxResult};
use rayon::prelude::*;

use model::cli;
use model::observation::Recorder;
use model::{RunStatus, Simulation, Snapshot};

/// Run independent replicates of one parameter set in parallel, one seed per
/// replicate, and print the final snapshot of each.
fn main() -> Result<(), String> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let (p, settings) = cli::parameters_from_args().map_err(|e| e.to_string())?;
    println!("# Sweeping {} seeds from {}", settings.runs, p.seed);

    let outcomes: Vec<(u64, Result<(RunStatus, Option<Snapshot>), String>)> = (0..settings.runs as u64)
        .into_par_iter()
        .map(|k| {
            let mut replicate = p.clone();
            replicate.seed = p.seed.wrapping_add(k);
            let seed = replicate.seed;
            let outcome = Simulation::setup(replicate)
                .map_err(|e| e.to_string())
                .and_then(|mut s| {
                    let mut recorder = Recorder::default();
                    let status = s.run(&mut recorder).map_err(|e| e.to_string())?;
                    Ok((status, recorder.snapshots.pop()))
                });
            (seed, outcome)
        })
        .collect();

    let mut largest = Vec::new();
    for (seed, outcome) in outcomes.iter() {
        match outcome {
            Ok((status, Some(last))) => {
                largest.push(last.largest_institution);
                let line = serde_json::json!({ "seed": seed, "status": status, "final": last });
                println!("{}", line);
            }
            Ok((status, None)) => println!("# seed {}: {:?} without snapshots", seed, status),
            Err(e) => println!("# seed {}: {}", seed, e),
        }
    }
    match largest.iter().minmax() {
        MinMaxResult::NoElements => {}
        MinMaxResult::OneElement(l) => println!("# largest institution: {}", l),
        MinMaxResult::MinMax(lo, hi) => println!("# largest institution: {}..{}", lo, hi),
    }
    Ok(())
}
