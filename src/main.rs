use model::cli;
use model::error::CollectorError;
use model::observation::{ResultsCollector, Snapshot};
use model::Simulation;

/// Prints every `log_every`-th snapshot as one line of JSON on stdout.
struct JsonLines {
    log_every: u32,
}

impl ResultsCollector for JsonLines {
    fn record(&mut self, snapshot: &Snapshot) -> Result<(), CollectorError> {
        if self.log_every == 0 || snapshot.iteration % self.log_every != 0 {
            return Ok(());
        }
        let line = serde_json::to_string(snapshot).map_err(|e| CollectorError(e.to_string()))?;
        println!("{}", line);
        Ok(())
    }
}

fn main() -> Result<(), String> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let (p, settings) = cli::parameters_from_args().map_err(|e| e.to_string())?;
    println!("# Parameters: {}", serde_json::to_string(&p).map_err(|e| e.to_string())?);

    let mut s = Simulation::setup(p).map_err(|e| e.to_string())?;
    println!("# Initialized");

    let mut out = JsonLines {
        log_every: settings.log_every,
    };
    let status = s.run(&mut out).map_err(|e| e.to_string())?;
    println!("# {:?} after {} iterations", status, s.iteration());
    Ok(())
}
