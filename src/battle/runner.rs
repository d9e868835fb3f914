//! Async drivers. `BattleRunner` plays one battle end to end against two
//! choice sources; `BattleManager` hosts many battles fed by external
//! submissions, one resolution at a time per battle.
use crate::battle::ai::{Behavior, HeuristicAI};
use crate::battle::engine::{
    forfeit_suspended_turn, resolve_turn, resume_turn, start_battle, BattleServices, Continuation,
    TurnOutcome, TurnReport,
};
use crate::battle::state::{Battle, BattleOutcome, BattleSnapshot, GameState, TurnAction, TurnRng};
use crate::config::TimingConfig;
use crate::errors::{BattleEngineError, BattleStateError, DecisionError};
use crate::persistence::PpStore;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// An external source of automated decisions.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(&self, side: usize, view: Arc<Battle>) -> Result<TurnAction, DecisionError>;
}

/// Runs a synchronous [`Behavior`] on the blocking pool.
pub struct BehaviorProvider<B> {
    behavior: Arc<B>,
}

impl<B: Behavior + 'static> BehaviorProvider<B> {
    pub fn new(behavior: B) -> Self {
        Self {
            behavior: Arc::new(behavior),
        }
    }
}

#[async_trait]
impl<B: Behavior + 'static> DecisionProvider for BehaviorProvider<B> {
    async fn decide(&self, side: usize, view: Arc<Battle>) -> Result<TurnAction, DecisionError> {
        let behavior = Arc::clone(&self.behavior);
        tokio::task::spawn_blocking(move || behavior.decide_action(side, &view))
            .await
            .map_err(|err| DecisionError::Internal(err.to_string()))
    }
}

/// Where one side's choices come from.
pub enum ChoiceSource {
    /// A person on the other end of a channel, bounded by a turn timer.
    Human {
        choices: Mutex<mpsc::Receiver<TurnAction>>,
        turn_timer: Duration,
    },
    /// A provider bounded by a randomised think budget, with a heuristic
    /// fallback.
    Automated {
        provider: Arc<dyn DecisionProvider>,
        fallback: Arc<dyn Behavior>,
        think_min: Duration,
        think_max: Duration,
    },
}

impl ChoiceSource {
    pub fn human(choices: mpsc::Receiver<TurnAction>, timing: &TimingConfig) -> Self {
        ChoiceSource::Human {
            choices: Mutex::new(choices),
            turn_timer: timing.turn_timer,
        }
    }

    pub fn automated(
        provider: Arc<dyn DecisionProvider>,
        fallback: HeuristicAI,
        timing: &TimingConfig,
    ) -> Self {
        ChoiceSource::Automated {
            provider,
            fallback: Arc::new(fallback),
            think_min: timing.think_budget_min,
            think_max: timing.think_budget_max.max(timing.think_budget_min),
        }
    }

    /// Obtain `side`'s next choice. Never fails: a silent human forfeits, a
    /// slow or failing provider is replaced by the fallback.
    pub async fn choose(&self, side: usize, battle: &Battle) -> TurnAction {
        match self {
            ChoiceSource::Human {
                choices,
                turn_timer,
            } => {
                let mut receiver = choices.lock().await;
                match tokio::time::timeout(*turn_timer, receiver.recv()).await {
                    Ok(Some(action)) => action,
                    Ok(None) => {
                        warn!(battle_id = %battle.battle_id, side, error = %DecisionError::ChannelClosed(side), "defaulting to forfeit");
                        TurnAction::Forfeit
                    }
                    Err(_) => {
                        warn!(battle_id = %battle.battle_id, side, error = %DecisionError::Timeout(side), "turn timer expired; defaulting to forfeit");
                        TurnAction::Forfeit
                    }
                }
            }
            ChoiceSource::Automated {
                provider,
                fallback,
                think_min,
                think_max,
            } => {
                let budget = think_budget(*think_min, *think_max);
                let view = Arc::new(battle.clone());
                match tokio::time::timeout(budget, provider.decide(side, view)).await {
                    Ok(Ok(action)) => action,
                    Ok(Err(err)) => {
                        warn!(battle_id = %battle.battle_id, side, error = %err, "decision failed; using heuristic");
                        fallback.decide_action(side, battle)
                    }
                    Err(_) => {
                        warn!(battle_id = %battle.battle_id, side, ?budget, error = %DecisionError::Timeout(side), "using heuristic");
                        fallback.decide_action(side, battle)
                    }
                }
            }
        }
    }
}

fn think_budget(min: Duration, max: Duration) -> Duration {
    let (low, high) = (min.as_millis() as u64, max.as_millis() as u64);
    if high <= low {
        return min;
    }
    Duration::from_millis(rand::rng().random_range(low..=high))
}

async fn choose_if(
    source: &ChoiceSource,
    side: usize,
    needed: bool,
    battle: &Battle,
) -> Option<TurnAction> {
    if needed {
        Some(source.choose(side, battle).await)
    } else {
        None
    }
}

/// Drives a single battle to completion.
pub struct BattleRunner {
    battle: Battle,
    services: BattleServices,
    sources: [ChoiceSource; 2],
    rng: TurnRng,
    log: Vec<String>,
}

impl BattleRunner {
    pub fn new(
        battle: Battle,
        services: BattleServices,
        sources: [ChoiceSource; 2],
        rng: TurnRng,
    ) -> Self {
        Self {
            battle,
            services,
            sources,
            rng,
            log: Vec::new(),
        }
    }

    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    /// Every plain log line produced so far.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Load stored PP, play until a terminal state, then save PP back.
    pub async fn run(&mut self, pp_store: &dyn PpStore) -> Result<BattleOutcome, BattleEngineError> {
        for side in 0..2 {
            let roster_id = self.battle.rosters[side].id.clone();
            if let Some(stored) = pp_store.load_pp(&roster_id).await? {
                self.battle
                    .pp
                    .apply_stored(side, &self.battle.rosters[side], &stored);
            }
        }

        let report = start_battle(&mut self.battle, &self.services.env())?;
        self.log.extend(report.lines);

        let outcome = loop {
            if let Some(outcome) = self.battle.outcome() {
                break outcome;
            }
            self.play_turn().await?;
        };

        for side in 0..2 {
            let roster = &self.battle.rosters[side];
            let pp = self.battle.pp.to_roster_pp(side, roster);
            pp_store.save_pp(&roster.id, &pp).await?;
        }
        info!(
            battle_id = %self.battle.battle_id,
            winner = ?outcome.winner,
            turns = outcome.turns,
            "battle finished"
        );
        Ok(outcome)
    }

    async fn play_turn(&mut self) -> Result<(), BattleEngineError> {
        let needed = match self.battle.game_state {
            GameState::WaitingForActions => vec![0, 1],
            state => state.sides_needing_replacement(),
        };
        let (first, second) = tokio::join!(
            choose_if(&self.sources[0], 0, needed.contains(&0), &self.battle),
            choose_if(&self.sources[1], 1, needed.contains(&1), &self.battle),
        );
        for (side, choice) in [first, second].into_iter().enumerate() {
            if let Some(action) = choice {
                self.battle.submit_action(side, action)?;
            }
        }

        let env = self.services.env();
        let mut outcome = resolve_turn(&mut self.battle, &env, &mut self.rng)?;
        loop {
            match outcome {
                TurnOutcome::Completed(report) => {
                    self.log.extend(report.lines);
                    return Ok(());
                }
                TurnOutcome::AwaitingSwitch(continuation) => {
                    let side = continuation.side;
                    let choice = self.sources[side].choose(side, &self.battle).await;
                    outcome =
                        resume_turn(&mut self.battle, continuation, choice, &env, &mut self.rng)?;
                }
            }
        }
    }
}

struct ManagedBattle {
    battle: Battle,
    rng: TurnRng,
    pending: Option<Continuation>,
}

/// Hosts many independent battles. Each sits behind its own mutex so two
/// submissions for the same battle never resolve concurrently.
pub struct BattleManager {
    services: BattleServices,
    battles: RwLock<HashMap<String, Arc<Mutex<ManagedBattle>>>>,
}

impl BattleManager {
    pub fn new(services: BattleServices) -> Self {
        Self {
            services,
            battles: RwLock::new(HashMap::new()),
        }
    }

    /// Register a battle and send out both leads.
    pub async fn create_battle(
        &self,
        mut battle: Battle,
        seed: Option<u64>,
    ) -> Result<TurnReport, BattleEngineError> {
        let id = battle.battle_id.clone();
        let mut battles = self.battles.write().await;
        if battles.contains_key(&id) {
            return Err(BattleStateError::DuplicateBattle(id).into());
        }
        let report = start_battle(&mut battle, &self.services.env())?;
        let rng = seed.map_or_else(TurnRng::new_random, TurnRng::from_seed);
        battles.insert(
            id,
            Arc::new(Mutex::new(ManagedBattle {
                battle,
                rng,
                pending: None,
            })),
        );
        Ok(report)
    }

    async fn entry(&self, battle_id: &str) -> Result<Arc<Mutex<ManagedBattle>>, BattleEngineError> {
        self.battles
            .read()
            .await
            .get(battle_id)
            .cloned()
            .ok_or_else(|| BattleStateError::UnknownBattle(battle_id.to_string()).into())
    }

    /// Queue a side's choice. Resolves and returns the outcome once every
    /// required choice is in; while a pivot is pending, the pivoting side's
    /// submission is its switch choice.
    pub async fn submit_action(
        &self,
        battle_id: &str,
        side: usize,
        action: TurnAction,
    ) -> Result<Option<TurnOutcome>, BattleEngineError> {
        let entry = self.entry(battle_id).await?;
        let mut guard = entry.lock().await;
        let managed = &mut *guard;
        let env = self.services.env();

        let outcome = if let Some(continuation) = managed.pending.take() {
            if continuation.side == side {
                resume_turn(&mut managed.battle, continuation, action, &env, &mut managed.rng)?
            } else if action == TurnAction::Forfeit {
                forfeit_suspended_turn(&mut managed.battle, continuation, side, &env)?
            } else {
                let waiting = continuation.side;
                managed.pending = Some(continuation);
                return Err(BattleStateError::UnexpectedContinuation(waiting).into());
            }
        } else {
            managed.battle.submit_action(side, action)?;
            if !managed.battle.ready_for_turn_resolution() {
                debug!(battle_id, side, "choice queued");
                return Ok(None);
            }
            resolve_turn(&mut managed.battle, &env, &mut managed.rng)?
        };

        if let TurnOutcome::AwaitingSwitch(continuation) = &outcome {
            managed.pending = Some(continuation.clone());
        }
        Ok(Some(outcome))
    }

    pub async fn snapshot(&self, battle_id: &str) -> Result<BattleSnapshot, BattleEngineError> {
        let entry = self.entry(battle_id).await?;
        let guard = entry.lock().await;
        Ok(BattleSnapshot::capture(&guard.battle))
    }

    pub async fn outcome(&self, battle_id: &str) -> Result<Option<BattleOutcome>, BattleEngineError> {
        let entry = self.entry(battle_id).await?;
        let guard = entry.lock().await;
        Ok(guard.battle.outcome())
    }

    /// Drop a battle, returning its final state.
    pub async fn remove(&self, battle_id: &str) -> Result<Battle, BattleEngineError> {
        let entry = self
            .battles
            .write()
            .await
            .remove(battle_id)
            .ok_or_else(|| BattleStateError::UnknownBattle(battle_id.to_string()))?;
        let guard = entry.lock().await;
        Ok(guard.battle.clone())
    }

    pub async fn battle_count(&self) -> usize {
        self.battles.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::ai::ScoringAI;
    use crate::battle::tests::common::{
        create_test_battle, create_test_battle_with_rosters, test_catalog, test_services,
        TestCombatantBuilder,
    };
    use crate::persistence::InMemoryPpStore;
    use pretty_assertions::assert_eq;

    struct SlowProvider;

    #[async_trait]
    impl DecisionProvider for SlowProvider {
        async fn decide(&self, _side: usize, _view: Arc<Battle>) -> Result<TurnAction, DecisionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(TurnAction::Forfeit)
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl DecisionProvider for BrokenProvider {
        async fn decide(&self, _side: usize, _view: Arc<Battle>) -> Result<TurnAction, DecisionError> {
            Err(DecisionError::Internal("model unavailable".to_string()))
        }
    }

    fn timing(min_ms: u64, max_ms: u64) -> TimingConfig {
        TimingConfig {
            turn_timer: Duration::from_secs(30),
            think_budget_min: Duration::from_millis(min_ms),
            think_budget_max: Duration::from_millis(max_ms),
            ..TimingConfig::default()
        }
    }

    fn ai_source(timing: &TimingConfig) -> ChoiceSource {
        ChoiceSource::automated(
            Arc::new(BehaviorProvider::new(ScoringAI::new(test_catalog()))),
            HeuristicAI::new(test_catalog()),
            timing,
        )
    }

    fn duel() -> Battle {
        create_test_battle(
            TestCombatantBuilder::new("pikachu")
                .with_moves(&["tackle", "body-slam"])
                .build(),
            TestCombatantBuilder::new("eevee")
                .with_moves(&["tackle", "body-slam"])
                .build(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_falls_back_to_heuristic() {
        let battle = duel();
        let source = ChoiceSource::automated(
            Arc::new(SlowProvider),
            HeuristicAI::new(test_catalog()),
            &timing(100, 200),
        );

        let action = source.choose(0, &battle).await;

        assert_eq!(action, TurnAction::use_move("body-slam"));
    }

    #[tokio::test]
    async fn test_failing_provider_falls_back_to_heuristic() {
        let battle = duel();
        let source = ChoiceSource::automated(
            Arc::new(BrokenProvider),
            HeuristicAI::new(test_catalog()),
            &timing(100, 200),
        );

        assert_eq!(source.choose(1, &battle).await, TurnAction::use_move("body-slam"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_human_forfeits_when_timer_expires() {
        let config = timing(500, 500);
        let (_keep_open, receiver) = mpsc::channel(1);
        let mut runner = BattleRunner::new(
            duel(),
            test_services(),
            [ChoiceSource::human(receiver, &config), ai_source(&config)],
            TurnRng::from_seed(3),
        );

        let outcome = runner.run(&InMemoryPpStore::new()).await.unwrap();

        assert_eq!(outcome.forfeited_by, Some(0));
        assert_eq!(outcome.winner, Some(1));
        assert_eq!(outcome.turns, 1);
    }

    #[tokio::test]
    async fn test_ai_battle_runs_to_completion_and_saves_pp() {
        let config = timing(2_000, 2_000);
        let battle = create_test_battle_with_rosters(
            vec![
                TestCombatantBuilder::new("pikachu").with_moves(&["tackle"]).build(),
                TestCombatantBuilder::new("raichu").with_moves(&["tackle"]).build(),
            ],
            vec![TestCombatantBuilder::new("eevee").with_moves(&["tackle"]).build()],
        );
        let store = InMemoryPpStore::new();
        let mut runner = BattleRunner::new(
            battle,
            test_services(),
            [ai_source(&config), ai_source(&config)],
            TurnRng::from_seed(11),
        );

        let outcome = runner.run(&store).await.unwrap();

        assert!(outcome.winner.is_some());
        assert!(outcome.turns >= 1);
        assert!(runner.log().iter().any(|line| line.contains("used Tackle")));
        let saved = store.load_pp("p2").await.unwrap().unwrap();
        assert!(saved.slots[0].current[0] < saved.slots[0].max[0]);
    }

    #[tokio::test]
    async fn test_manager_resolves_once_both_sides_submit() {
        let manager = BattleManager::new(test_services());
        manager.create_battle(duel(), Some(5)).await.unwrap();

        let first = manager
            .submit_action("test_battle", 0, TurnAction::use_move("tackle"))
            .await
            .unwrap();
        let second = manager
            .submit_action("test_battle", 1, TurnAction::use_move("tackle"))
            .await
            .unwrap();

        assert!(first.is_none());
        assert!(matches!(second, Some(TurnOutcome::Completed(_))));
        let snapshot = manager.snapshot("test_battle").await.unwrap();
        assert_eq!(snapshot.battle.turn_number, 2);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_resolve_a_single_turn() {
        let manager = Arc::new(BattleManager::new(test_services()));
        manager.create_battle(duel(), Some(5)).await.unwrap();

        let (a, b) = tokio::join!(
            manager.submit_action("test_battle", 0, TurnAction::use_move("tackle")),
            manager.submit_action("test_battle", 1, TurnAction::use_move("tackle")),
        );
        let resolved = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|outcome| outcome.is_some())
            .count();

        assert_eq!(resolved, 1);
        let snapshot = manager.snapshot("test_battle").await.unwrap();
        assert_eq!(snapshot.battle.turn_number, 2);
    }

    fn pivot_duel() -> Battle {
        create_test_battle_with_rosters(
            vec![
                TestCombatantBuilder::new("scizor")
                    .with_speed(200)
                    .with_moves(&["u-turn"])
                    .build(),
                TestCombatantBuilder::new("raichu").build(),
            ],
            vec![TestCombatantBuilder::new("eevee").build()],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_human_forfeit_during_pivot_ends_the_battle() {
        let config = timing(100, 100);
        let (sender, receiver) = mpsc::channel(4);
        sender.try_send(TurnAction::use_move("u-turn")).unwrap();
        sender.try_send(TurnAction::Forfeit).unwrap();
        let mut runner = BattleRunner::new(
            pivot_duel(),
            test_services(),
            [ChoiceSource::human(receiver, &config), ai_source(&config)],
            TurnRng::from_seed(3),
        );

        let outcome = runner.run(&InMemoryPpStore::new()).await.unwrap();

        assert_eq!(outcome.forfeited_by, Some(0));
        assert_eq!(outcome.winner, Some(1));
        assert_eq!(outcome.turns, 1);
        assert_eq!(runner.battle().rosters[0].active, 0);
    }

    #[tokio::test]
    async fn test_manager_accepts_opponent_forfeit_while_pivot_pending() {
        let manager = BattleManager::new(test_services());
        manager.create_battle(pivot_duel(), Some(5)).await.unwrap();
        manager
            .submit_action("test_battle", 0, TurnAction::use_move("u-turn"))
            .await
            .unwrap();
        let suspended = manager
            .submit_action("test_battle", 1, TurnAction::use_move("tackle"))
            .await
            .unwrap();
        assert!(matches!(suspended, Some(TurnOutcome::AwaitingSwitch(_))));

        assert!(matches!(
            manager
                .submit_action("test_battle", 1, TurnAction::use_move("tackle"))
                .await,
            Err(BattleEngineError::BattleState(BattleStateError::UnexpectedContinuation(0)))
        ));
        let ended = manager
            .submit_action("test_battle", 1, TurnAction::Forfeit)
            .await
            .unwrap();

        assert!(matches!(ended, Some(TurnOutcome::Completed(_))));
        let outcome = manager.outcome("test_battle").await.unwrap().unwrap();
        assert_eq!(outcome.forfeited_by, Some(1));
        assert_eq!(outcome.winner, Some(0));
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_battles_are_rejected() {
        let manager = BattleManager::new(test_services());
        manager.create_battle(duel(), None).await.unwrap();

        assert!(matches!(
            manager.create_battle(duel(), None).await,
            Err(BattleEngineError::BattleState(BattleStateError::DuplicateBattle(_)))
        ));
        assert!(matches!(
            manager.outcome("missing").await,
            Err(BattleEngineError::BattleState(BattleStateError::UnknownBattle(_)))
        ));
        assert_eq!(manager.battle_count().await, 1);
    }
}
