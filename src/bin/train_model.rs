use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use t20_chase::eval::{self, Prob2};
use t20_chase::historical_dataset;
use t20_chase::vocab::{self, Vocabulary};
use t20_chase::win_model;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = parse_path_arg(&args, "--db").unwrap_or_else(historical_dataset::default_db_path);
    let model_out = parse_path_arg(&args, "--out").unwrap_or_else(win_model::default_model_path);
    let team_out = parse_path_arg(&args, "--team-out").unwrap_or_else(vocab::team_vocab_path);
    let city_out = parse_path_arg(&args, "--city-out").unwrap_or_else(vocab::city_vocab_path);

    let conn = historical_dataset::open_db(&db_path)
        .with_context(|| format!("open history db {}", db_path.display()))?;
    let examples = historical_dataset::load_training_examples(&conn)?;
    if examples.is_empty() {
        return Err(anyhow!(
            "no training examples in {}; run build_dataset first",
            db_path.display()
        ));
    }

    let mut model = win_model::train(&examples).context("fit win model")?;
    model.set_source(Some(format!("training_examples:{}", db_path.display())));

    let artifact = model.artifact();
    let dropped = examples.len() - artifact.train_samples;
    println!("Training complete");
    println!("Examples: {} ({} dropped by invariant filter)", examples.len(), dropped);
    println!(
        "Iterations: {}/{}",
        artifact.iters_run,
        win_model::MAX_ITERS
    );
    println!("Train log-loss: {:.4}", artifact.train_log_loss);

    // In-sample scoring, same rows the fit saw.
    let kept: Vec<_> = examples
        .iter()
        .filter(|e| e.features.passes_invariants())
        .collect();
    let mut preds = Vec::with_capacity(kept.len());
    let mut outcomes = Vec::with_capacity(kept.len());
    for example in &kept {
        let (win, loss) = model
            .predict(&example.features)
            .context("score training example")?;
        preds.push(Prob2 { win, loss });
        outcomes.push(example.result);
    }
    let metrics = eval::evaluate_probs(&preds, &outcomes);
    println!(
        "In-sample: brier={:.4} log_loss={:.4} accuracy={:.3}",
        metrics.brier, metrics.log_loss, metrics.accuracy
    );

    win_model::save_model(&model_out, &model)?;
    println!("Model written: {}", model_out.display());

    // Selection vocabularies come from the unfiltered example set, not just
    // the rows the fit kept.
    let teams = Vocabulary::from_values(examples.iter().map(|e| e.features.batting_team.as_str()));
    let cities = Vocabulary::from_values(examples.iter().map(|e| e.features.city.as_str()));
    vocab::save_vocabulary(&team_out, &teams, Some("training_data".to_string()))?;
    vocab::save_vocabulary(&city_out, &cities, Some("training_data".to_string()))?;
    println!(
        "Vocabularies written: {} ({} teams), {} ({} cities)",
        team_out.display(),
        teams.len(),
        city_out.display(),
        cities.len()
    );

    Ok(())
}

fn parse_path_arg(args: &[String], name: &str) -> Option<PathBuf> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(PathBuf::from(next.trim()));
        }
    }
    None
}
