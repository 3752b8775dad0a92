use anyhow::{Context, Result};
use meal_combo::catalog::CsvCatalog;
use meal_combo::cli::parse_args;
use meal_combo::config::EngineConfig;
use meal_combo::household::InMemoryHousehold;
use meal_combo::optim::nutri_eval::evaluate;
use meal_combo::optim::ComboGenerator;
use tokio::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = parse_args();
    let config = EngineConfig::load(cli.config.as_deref())?;

    let household_raw = fs::read_to_string(&cli.household)
        .await
        .with_context(|| format!("Failed to read household file {:?}", cli.household))?;
    let household = InMemoryHousehold::from_json_str(&household_raw)
        .with_context(|| format!("Failed to parse household file {:?}", cli.household))?;
    let catalog = CsvCatalog::new(cli.catalog.clone());

    let household_ids: Vec<u64> = household.members.iter().map(|m| m.id).collect();
    let request = cli.to_request(&household_ids);

    let generator = ComboGenerator::new(config, &catalog, &household, &household, &household);
    let combos = generator.generate(&request)?;

    for combo in &combos {
        let report = evaluate(&combo.nutrients, &combo.need_nutrients);
        info!(
            combo = %combo.combo_name,
            mse = report.mse,
            in_range = report.in_range_count(),
            tracked = report.nutrients.len(),
            "nutrient evaluation"
        );
    }

    println!("{}", serde_json::to_string_pretty(&combos)?);
    Ok(())
}
