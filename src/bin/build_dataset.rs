use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use t20_chase::historical_dataset;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = parse_path_arg(&args, "--db").unwrap_or_else(historical_dataset::default_db_path);
    let season = parse_string_arg(&args, "--season")
        .unwrap_or_else(|| historical_dataset::DEFAULT_SEASON_FILTER.to_string());

    let mut conn = historical_dataset::open_db(&db_path)
        .with_context(|| format!("open history db {}", db_path.display()))?;
    historical_dataset::validate_schema(&conn)?;

    let matches = historical_dataset::load_matches(&conn, &season)?;
    if matches.is_empty() {
        return Err(anyhow!(
            "no matches in {} match season filter '{season}'",
            db_path.display()
        ));
    }
    let deliveries = historical_dataset::load_deliveries(&conn)?;
    if deliveries.is_empty() {
        return Err(anyhow!("deliveries table in {} is empty", db_path.display()));
    }

    let (examples, summary) = historical_dataset::build_training_examples(&matches, &deliveries);
    let stored = historical_dataset::store_training_examples(&mut conn, &examples)?;

    println!("Dataset build complete");
    println!("DB: {}", db_path.display());
    println!("Season filter: {season}");
    println!("Matches in scope: {}", summary.matches_in_scope);
    println!("Deliveries scanned: {}", summary.deliveries_total);
    println!("Examples stored: {stored}");
    if summary.rows_dropped > 0 {
        println!(
            "Rows dropped (missing city/winner or out-of-scope match): {}",
            summary.rows_dropped
        );
    }

    Ok(())
}

fn parse_path_arg(args: &[String], name: &str) -> Option<PathBuf> {
    parse_string_arg(args, name).map(PathBuf::from)
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
