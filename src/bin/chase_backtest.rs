use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use t20_chase::eval::{self, Prob2};
use t20_chase::historical_dataset;
use t20_chase::win_model;

const DEFAULT_HOLDOUT: f64 = 0.2;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_BINS: usize = 10;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = parse_path_arg(&args, "--db").unwrap_or_else(historical_dataset::default_db_path);
    let holdout = parse_f64_arg(&args, "--holdout")
        .unwrap_or(DEFAULT_HOLDOUT)
        .clamp(0.05, 0.5);
    let seed = parse_u64_arg(&args, "--seed").unwrap_or(DEFAULT_SEED);
    let bins = parse_u64_arg(&args, "--bins").unwrap_or(DEFAULT_BINS as u64) as usize;

    let conn = historical_dataset::open_db(&db_path)
        .with_context(|| format!("open history db {}", db_path.display()))?;
    let mut examples = historical_dataset::load_training_examples(&conn)?;
    examples.retain(|e| e.features.passes_invariants());
    if examples.len() < 10 {
        return Err(anyhow!(
            "only {} usable examples in {}; run build_dataset first",
            examples.len(),
            db_path.display()
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    examples.shuffle(&mut rng);
    let holdout_n = ((examples.len() as f64 * holdout).round() as usize)
        .clamp(1, examples.len() - 1);
    let (held, train) = examples.split_at(holdout_n);

    println!(
        "Backtest: {} train / {} holdout (seed {seed})",
        train.len(),
        held.len()
    );
    let model = win_model::train(train).context("fit backtest model")?;
    println!(
        "Fit: {} iterations, train log-loss {:.4}",
        model.artifact().iters_run,
        model.artifact().train_log_loss
    );

    let mut preds = Vec::with_capacity(held.len());
    let mut outcomes = Vec::with_capacity(held.len());
    for example in held {
        let (win, loss) = model
            .predict(&example.features)
            .context("score holdout example")?;
        preds.push(Prob2 { win, loss });
        outcomes.push(example.result);
    }

    let metrics = eval::evaluate_probs(&preds, &outcomes);
    println!(
        "Holdout: brier={:.4} log_loss={:.4} accuracy={:.3}",
        metrics.brier, metrics.log_loss, metrics.accuracy
    );

    println!("Calibration ({bins} bins):");
    for bin in eval::calibration_bins(&preds, &outcomes, bins) {
        if bin.count == 0 {
            continue;
        }
        println!(
            "  {:.2}-{:.2} n={:<6} pred={:.3} actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }

    Ok(())
}

fn parse_path_arg(args: &[String], name: &str) -> Option<PathBuf> {
    parse_string_arg(args, name).map(PathBuf::from)
}

fn parse_f64_arg(args: &[String], name: &str) -> Option<f64> {
    parse_string_arg(args, name).and_then(|raw| raw.parse::<f64>().ok())
}

fn parse_u64_arg(args: &[String], name: &str) -> Option<u64> {
    parse_string_arg(args, name).and_then(|raw| raw.parse::<u64>().ok())
}

fn parse_string_arg(args: &[String], name: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
