use pvp_battle::battle::runner::BehaviorProvider;
use pvp_battle::persistence::InMemoryPpStore;
use pvp_battle::{
    Battle, BattleConfig, BattleRunner, BattleServices, CachedCatalog, CatalogView, ChoiceSource,
    HeuristicAI, Roster, RosterTemplate, ScoringAI, StaticCatalog, TurnRng,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEMO_ROSTERS: &str = include_str!("../data/demo_rosters.ron");

/// Plays one AI-vs-AI battle between the demo rosters and prints the log.
/// An optional first argument names a RON config file.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => BattleConfig::load(Path::new(&path))?,
        None => BattleConfig::default(),
    };
    config.apply_env();

    let catalog = CatalogView::new(Arc::new(CachedCatalog::new(
        StaticCatalog::builtin()?,
        config.timing.catalog_ttl,
    )));

    let templates: Vec<RosterTemplate> = ron::from_str(DEMO_ROSTERS)?;
    let mut rosters = templates.iter().map(Roster::from_template);
    let (Some(first), Some(second)) = (rosters.next(), rosters.next()) else {
        return Err("demo data needs two rosters".into());
    };
    let battle = Battle::new("demo".to_string(), first, second, &catalog)?;

    let services = BattleServices::new(catalog.clone(), config.rules.clone());
    let sources = [0, 1].map(|_| {
        ChoiceSource::automated(
            Arc::new(BehaviorProvider::new(ScoringAI::new(catalog.clone()))),
            HeuristicAI::new(catalog.clone()),
            &config.timing,
        )
    });
    let mut runner = BattleRunner::new(battle, services, sources, TurnRng::new_random());
    let outcome = runner.run(&InMemoryPpStore::new()).await?;

    for line in runner.log() {
        println!("{}", line);
    }
    println!();
    match outcome.winner {
        Some(side) => println!(
            "{} wins after {} turns.",
            runner.battle().trainer_name(side),
            outcome.turns
        ),
        None => println!("Draw after {} turns.", outcome.turns),
    }
    Ok(())
}
