use std::fs;

use crate::error::ConfigError;
use crate::Parameters;

/// Options of the binaries that are not model parameters.
#[derive(Debug, Clone)]
pub struct Settings {
    /// JSON file with a full or partial parameter set.
    pub config: String,
    /// Print every this many snapshots.
    pub log_every: u32,
    /// Independent runs with consecutive seeds, for sweeps.
    pub runs: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            config: String::new(),
            log_every: 1,
            runs: 8,
        }
    }
}

pub fn parse_args<'a>(p: &'a mut Parameters, settings: &'a mut Settings) -> argparse::ArgumentParser<'a> {
    let mut parser = argparse::ArgumentParser::new();
    parser.set_description("Run an institutional Axelrod simulation");
    parser.refer(&mut settings.config).add_option(
        &["--config"],
        argparse::Store,
        "JSON file with parameters; flags given on the command line take precedence",
    );
    parser.refer(&mut settings.log_every).add_option(
        &["--log-every"],
        argparse::Store,
        "print every this many snapshots",
    );
    parser.refer(&mut settings.runs).add_option(
        &["--runs"],
        argparse::Store,
        "number of independent runs in a sweep, with seeds counting up from --seed",
    );
    parser.refer(&mut p.rows).add_option(&["--rows"], argparse::Store, "grid rows");
    parser.refer(&mut p.cols).add_option(&["--cols"], argparse::Store, "grid columns");
    parser.refer(&mut p.radius).add_option(
        &["--radius"],
        argparse::Store,
        "neighbourhood radius",
    );
    parser.refer(&mut p.neighbourhood).add_option(
        &["--neighbourhood"],
        argparse::Store,
        "neighbourhood shape: von-neumann or moore",
    );
    parser.refer(&mut p.features).add_option(
        &["--features"],
        argparse::Store,
        "number of cultural features",
    );
    parser.refer(&mut p.traits).add_option(
        &["--traits"],
        argparse::Store,
        "number of traits per feature",
    );
    parser.refer(&mut p.iterations).add_option(
        &["--iterations"],
        argparse::Store,
        "number of iterations (checkpoints) to simulate",
    );
    parser.refer(&mut p.checkpoint).add_option(
        &["--checkpoint"],
        argparse::Store,
        "batches of one step per agent in each iteration",
    );
    parser.refer(&mut p.mutation).add_option(
        &["--mutation"],
        argparse::Store,
        "probability that the acting agent mutates a feature",
    );
    parser.refer(&mut p.selection_error).add_option(
        &["--selection-error"],
        argparse::Store,
        "probability of deciding on interaction against homophily",
    );
    parser.refer(&mut p.alpha).add_option(
        &["--alpha"],
        argparse::Store,
        "weight of a shared institution on interaction",
    );
    parser.refer(&mut p.beta).add_option(
        &["--beta"],
        argparse::Store,
        "institutional resilience",
    );
    parser.refer(&mut p.alpha_switch).add_option(
        &["--alpha-switch"],
        argparse::Store,
        "scale of the institution switching probability",
    );
    parser.refer(&mut p.beta_switch).add_option(
        &["--beta-switch"],
        argparse::Store,
        "exponent of the population pull when switching",
    );
    parser.refer(&mut p.resilience_exponent).add_option(
        &["--resilience-exponent"],
        argparse::Store,
        "exponent of the resistance ratio",
    );
    parser.refer(&mut p.policy).add_option(
        &["--policy"],
        argparse::Store,
        "experiment variant: axelrod, selection-error, multiplicative, institutional, resilient, population-resilient, reverting or secession",
    );
    parser.refer(&mut p.consensus_every).add_option(
        &["--consensus-every"],
        argparse::Store,
        "hold a vote every this many iterations (0: never)",
    );
    parser.refer(&mut p.tally).add_option(
        &["--tally"],
        argparse::Store,
        "voting rule: all-features or single-feature",
    );
    parser.refer(&mut p.seed).add_option(&["--seed"], argparse::Store, "random seed");
    parser.refer(&mut p.verify_rings).add_option(
        &["--verify-rings"],
        argparse::StoreTrue,
        "check all institution rings at every checkpoint",
    );
    parser
}

/// Parse the command line into parameters. With `--config`, the file is
/// loaded first and the command line is applied on top of it.
pub fn parameters_from_args() -> Result<(Parameters, Settings), ConfigError> {
    let mut p = Parameters::default();
    let mut settings = Settings::default();
    parse_args(&mut p, &mut settings).parse_args_or_exit();
    if !settings.config.is_empty() {
        let text = fs::read_to_string(&settings.config).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        p = Parameters::from_json(&text)?;
        parse_args(&mut p, &mut settings).parse_args_or_exit();
    }
    p.validate()?;
    Ok((p, settings))
}
