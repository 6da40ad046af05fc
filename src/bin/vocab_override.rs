use std::path::PathBuf;

use anyhow::Result;

use t20_chase::vocab;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let team_out = parse_path_arg(&args, "--team-out").unwrap_or_else(vocab::team_vocab_path);
    let city_out = parse_path_arg(&args, "--city-out").unwrap_or_else(vocab::city_vocab_path);

    let teams = vocab::curated_teams();
    let cities = vocab::curated_cities();
    vocab::save_vocabulary(&team_out, &teams, Some("curated_override".to_string()))?;
    vocab::save_vocabulary(&city_out, &cities, Some("curated_override".to_string()))?;

    println!(
        "team vocabulary written: {} ({} teams)",
        team_out.display(),
        teams.len()
    );
    println!(
        "city vocabulary written: {} ({} cities)",
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
