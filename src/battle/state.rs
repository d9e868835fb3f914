use crate::battle::conditions::VolatileKind;
use crate::battle::field::FieldState;
use crate::battle::pp_ledger::PpLedger;
use crate::battle::side::SideState;
use crate::battle::transform::TransformationKind;
use crate::catalog::CatalogView;
use crate::combatant::{Combatant, StatusCondition};
use crate::errors::{BattleStateError, PersistenceError};
use crate::roster::Roster;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schema::{GlobalEffect, Hazard, ProtectionKind, Screen, StatType, Terrain, Weather};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy)]
pub enum GameState {
    WaitingForActions,
    TurnInProgress,
    AwaitingPivotSwitch { side: usize }, // A pivot move connected; that side picks a replacement mid-turn
    WaitingForPlayer1Replacement, // Side 0 needs to send out a new combatant after a faint
    WaitingForPlayer2Replacement, // Side 1 needs to send out a new combatant after a faint
    WaitingForBothReplacements,   // Both sides need to send out new combatants after faints
    Player1Win,
    Player2Win,
    Draw,
}

impl GameState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GameState::Player1Win | GameState::Player2Win | GameState::Draw
        )
    }

    pub fn is_replacement_phase(self) -> bool {
        matches!(
            self,
            GameState::WaitingForPlayer1Replacement
                | GameState::WaitingForPlayer2Replacement
                | GameState::WaitingForBothReplacements
        )
    }

    /// Sides that owe a replacement choice in this state.
    pub fn sides_needing_replacement(self) -> Vec<usize> {
        match self {
            GameState::WaitingForPlayer1Replacement => vec![0],
            GameState::WaitingForPlayer2Replacement => vec![1],
            GameState::WaitingForBothReplacements => vec![0, 1],
            _ => Vec::new(),
        }
    }
}

/// A side's chosen action for one turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    UseMove { move_name: String },
    Switch { slot: usize },
    UseItem { item: String, target_slot: usize },
    Forfeit,
}

impl TurnAction {
    pub fn use_move(name: &str) -> Self {
        TurnAction::UseMove {
            move_name: name.to_string(),
        }
    }
}

impl std::fmt::Display for TurnAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnAction::UseMove { move_name } => write!(f, "use {}", move_name),
            TurnAction::Switch { slot } => write!(f, "switch to slot {}", slot),
            TurnAction::UseItem { item, target_slot } => {
                write!(f, "use {} on slot {}", item, target_slot)
            }
            TurnAction::Forfeit => write!(f, "forfeit"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFailureReason {
    IsAsleep,
    IsFrozen,
    IsParalyzed,
    IsFlinching,
    MustRecharge,
    IsTaunted,
    IsTrapped,
    AlreadyActive,
    NoTarget,
    SubstituteTooWeak,
    Generic,
}

/// Source of indirect damage, used for log wording.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualSource {
    LeechSeed,
    Binding,
    Hazard(Hazard),
    Weather(Weather),
    Recoil,
    Confusion,
    ProtectionContact(ProtectionKind),
    Aftermath,
    Substitute,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum BattleEvent {
    // Turn Management
    TurnStarted {
        turn_number: u32,
    },
    TurnEnded,

    // Switching
    CombatantSwitched {
        side: usize,
        old_name: String,
        new_name: String,
    },
    CombatantSentOut {
        side: usize,
        name: String,
    },
    PivotPending {
        side: usize,
        name: String,
    },
    SwitchPrevented {
        side: usize,
        name: String,
    },

    // Moves
    MoveUsed {
        side: usize,
        name: String,
        move_name: String,
    },
    MoveMissed {
        side: usize,
        name: String,
    },
    ActionFailed {
        side: usize,
        name: String,
        reason: ActionFailureReason,
    },
    NoEffect {
        target_name: String,
    },
    CriticalHit,
    AttackTypeEffectiveness {
        multiplier: f64,
    },
    ChargingStarted {
        side: usize,
        name: String,
        move_name: String,
    },

    // Damage and Healing
    DamageDealt {
        side: usize,
        target_name: String,
        damage: u16,
        remaining_hp: u16,
    },
    SubstituteDamaged {
        side: usize,
        name: String,
        damage: u16,
    },
    SubstituteBroke {
        side: usize,
        name: String,
    },
    ResidualDamage {
        side: usize,
        name: String,
        source: ResidualSource,
        damage: u16,
    },
    CombatantHealed {
        side: usize,
        name: String,
        amount: u16,
        new_hp: u16,
    },
    CombatantFainted {
        side: usize,
        name: String,
    },

    // Status Effects
    StatusApplied {
        side: usize,
        name: String,
        status: StatusCondition,
    },
    StatusRemoved {
        side: usize,
        name: String,
        status: StatusCondition,
    },
    StatusDamage {
        side: usize,
        name: String,
        status: StatusCondition,
        damage: u16,
        remaining_hp: u16,
    },
    VolatileApplied {
        side: usize,
        name: String,
        kind: VolatileKind,
    },
    VolatileExpired {
        side: usize,
        name: String,
        kind: VolatileKind,
    },

    // Stat Changes
    StatStageChanged {
        side: usize,
        name: String,
        stat: StatType,
        old_stage: i8,
        new_stage: i8,
    },
    StatChangeBlocked {
        side: usize,
        name: String,
        stat: StatType,
    },

    // Protection
    ProtectedItself {
        side: usize,
        name: String,
    },
    ProtectionBlocked {
        side: usize,
        name: String,
    },
    MoveReflected {
        side: usize,
        name: String,
        move_name: String,
    },

    // Side conditions
    HazardSet {
        side: usize,
        hazard: Hazard,
        layers: u8,
    },
    HazardsCleared {
        side: usize,
        hazards: Vec<Hazard>,
    },
    ScreenSet {
        side: usize,
        screen: Screen,
    },
    ScreenExpired {
        side: usize,
        screen: Screen,
    },

    // Field conditions
    WeatherStarted {
        weather: Weather,
    },
    WeatherContinues {
        weather: Weather,
    },
    WeatherEnded {
        weather: Weather,
    },
    TerrainStarted {
        terrain: Terrain,
    },
    TerrainEnded {
        terrain: Terrain,
    },
    GlobalEffectStarted {
        effect: GlobalEffect,
    },
    GlobalEffectEnded {
        effect: GlobalEffect,
    },

    // Timers
    DelayedAttackRegistered {
        side: usize,
        name: String,
        move_name: String,
    },
    DelayedAttackLanded {
        side: usize,
        target_name: String,
        move_name: String,
    },
    WishMade {
        side: usize,
        name: String,
    },
    WishGranted {
        side: usize,
        user_name: String,
    },

    // Abilities, items and transformations
    AbilityActivated {
        side: usize,
        name: String,
        ability: String,
    },
    ItemUsed {
        side: usize,
        item: String,
        target_name: String,
    },
    Transformed {
        side: usize,
        name: String,
        kind: TransformationKind,
    },
    TransformationCancelled {
        side: usize,
        kind: TransformationKind,
    },
    TransformationReverted {
        side: usize,
        name: String,
        kind: TransformationKind,
    },
    FormChanged {
        side: usize,
        name: String,
    },

    // Battle End
    PlayerForfeited {
        side: usize,
    },
    PlayerDefeated {
        side: usize,
    },
    BattleEnded {
        winner: Option<usize>,
    },
}

impl BattleEvent {
    /// Formats the event into a plain log line using battle context.
    /// Returns None for silent events that should not produce user-visible text.
    pub fn format(&self, battle: &Battle) -> Option<String> {
        match self {
            // === Turn Management Events ===
            BattleEvent::TurnStarted { turn_number } => {
                Some(format!("=== Turn {} ===", turn_number))
            }
            BattleEvent::TurnEnded => None,

            // === Switching Events ===
            BattleEvent::CombatantSwitched {
                side,
                old_name,
                new_name,
            } => Some(format!(
                "{} withdrew {} and sent out {}!",
                battle.trainer_name(*side),
                display_name(old_name),
                display_name(new_name)
            )),
            BattleEvent::CombatantSentOut { side, name } => Some(format!(
                "{} sent out {}!",
                battle.trainer_name(*side),
                display_name(name)
            )),
            BattleEvent::PivotPending { side, name } => Some(format!(
                "{} went back to {}!",
                display_name(name),
                battle.trainer_name(*side)
            )),
            BattleEvent::SwitchPrevented { name, .. } => {
                Some(format!("{} can't escape!", display_name(name)))
            }

            // === Move Events ===
            BattleEvent::MoveUsed {
                side,
                name,
                move_name,
            } => Some(format!(
                "{}'s {} used {}!",
                battle.trainer_name(*side),
                display_name(name),
                display_name(move_name)
            )),
            BattleEvent::MoveMissed { name, .. } => {
                Some(format!("{}'s attack missed!", display_name(name)))
            }
            BattleEvent::ActionFailed { name, reason, .. } => {
                Some(Self::format_action_failure(&display_name(name), *reason))
            }
            BattleEvent::NoEffect { target_name } => Some(format!(
                "It doesn't affect {}...",
                display_name(target_name)
            )),
            BattleEvent::CriticalHit => Some("A critical hit!".to_string()),
            BattleEvent::AttackTypeEffectiveness { multiplier } => match *multiplier {
                m if m > 1.0 => Some("It's super effective!".to_string()),
                m if m < 1.0 && m > 0.0 => Some("It's not very effective...".to_string()),
                _ => None, // Neutral hits are silent, immunity is reported as NoEffect
            },
            BattleEvent::ChargingStarted {
                name, move_name, ..
            } => Some(format!(
                "{} is charging up {}!",
                display_name(name),
                display_name(move_name)
            )),

            // === Damage and Healing Events ===
            BattleEvent::DamageDealt {
                target_name,
                damage,
                ..
            } => Some(format!(
                "{} took {} damage!",
                display_name(target_name),
                damage
            )),
            BattleEvent::SubstituteDamaged { name, .. } => Some(format!(
                "The substitute took damage for {}!",
                display_name(name)
            )),
            BattleEvent::SubstituteBroke { name, .. } => {
                Some(format!("{}'s substitute faded!", display_name(name)))
            }
            BattleEvent::ResidualDamage {
                name,
                source,
                damage,
                ..
            } => Some(format!(
                "{} is hurt by {}! ({} damage)",
                display_name(name),
                Self::format_residual_source(source),
                damage
            )),
            BattleEvent::CombatantHealed { name, amount, .. } => Some(format!(
                "{} recovered {} HP!",
                display_name(name),
                amount
            )),
            BattleEvent::CombatantFainted { name, .. } => {
                Some(format!("{} fainted!", display_name(name)))
            }

            // === Status Events ===
            BattleEvent::StatusApplied { name, status, .. } => Some(format!(
                "{} {}",
                display_name(name),
                Self::format_status_applied(status)
            )),
            BattleEvent::StatusRemoved { name, status, .. } => Some(format!(
                "{} {}",
                display_name(name),
                Self::format_status_removed(status)
            )),
            BattleEvent::StatusDamage {
                name,
                status,
                damage,
                ..
            } => Some(format!(
                "{} is hurt by its {}! ({} damage)",
                display_name(name),
                Self::format_status(status),
                damage
            )),
            BattleEvent::VolatileApplied { name, kind, .. } => match kind {
                VolatileKind::Protected | VolatileKind::Flinched => None,
                _ => Some(format!("{} is affected by {}!", display_name(name), kind)),
            },
            BattleEvent::VolatileExpired { name, kind, .. } => {
                Some(format!("{}'s {} wore off.", display_name(name), kind))
            }

            // === Stat Change Events ===
            BattleEvent::StatStageChanged {
                name,
                stat,
                old_stage,
                new_stage,
                ..
            } => {
                let stat_name = Self::format_stat_type(stat);
                match (new_stage - old_stage).signum() {
                    1 => Some(format!("{}'s {} rose!", display_name(name), stat_name)),
                    -1 => Some(format!("{}'s {} fell!", display_name(name), stat_name)),
                    _ => None,
                }
            }
            BattleEvent::StatChangeBlocked { name, stat, .. } => Some(format!(
                "{}'s {} won't go any further!",
                display_name(name),
                Self::format_stat_type(stat)
            )),

            // === Protection Events ===
            BattleEvent::ProtectedItself { name, .. } => {
                Some(format!("{} protected itself!", display_name(name)))
            }
            BattleEvent::ProtectionBlocked { name, .. } => Some(format!(
                "{} protected itself from the attack!",
                display_name(name)
            )),
            BattleEvent::MoveReflected {
                name, move_name, ..
            } => Some(format!(
                "{} bounced {} back!",
                display_name(name),
                display_name(move_name)
            )),

            // === Side Condition Events ===
            BattleEvent::HazardSet { side, hazard, .. } => Some(format!(
                "{} was laid around {}'s side!",
                hazard,
                battle.trainer_name(*side)
            )),
            BattleEvent::HazardsCleared { side, hazards } => {
                if hazards.is_empty() {
                    return None;
                }
                let names: Vec<String> = hazards.iter().map(|h| h.to_string()).collect();
                Some(format!(
                    "{} cleared from {}'s side!",
                    names.join(" and "),
                    battle.trainer_name(*side)
                ))
            }
            BattleEvent::ScreenSet { side, screen } => Some(format!(
                "{} raised {}!",
                battle.trainer_name(*side),
                screen
            )),
            BattleEvent::ScreenExpired { side, screen } => Some(format!(
                "{}'s {} wore off.",
                battle.trainer_name(*side),
                screen
            )),

            // === Field Events ===
            BattleEvent::WeatherStarted { weather } => Some(format!("The {} began!", weather)),
            BattleEvent::WeatherContinues { weather } => {
                Some(format!("The {} continues.", weather))
            }
            BattleEvent::WeatherEnded { weather } => Some(format!("The {} subsided.", weather)),
            BattleEvent::TerrainStarted { terrain } => {
                Some(format!("{} spread across the battlefield!", terrain))
            }
            BattleEvent::TerrainEnded { terrain } => Some(format!("The {} faded.", terrain)),
            BattleEvent::GlobalEffectStarted { effect } => Some(format!("{} took hold!", effect)),
            BattleEvent::GlobalEffectEnded { effect } => Some(format!("{} wore off.", effect)),

            // === Timer Events ===
            BattleEvent::DelayedAttackRegistered {
                name, move_name, ..
            } => Some(format!(
                "{} foresaw an attack with {}!",
                display_name(name),
                display_name(move_name)
            )),
            BattleEvent::DelayedAttackLanded {
                target_name,
                move_name,
                ..
            } => Some(format!(
                "{} took the {} attack!",
                display_name(target_name),
                display_name(move_name)
            )),
            BattleEvent::WishMade { name, .. } => {
                Some(format!("{} made a wish!", display_name(name)))
            }
            BattleEvent::WishGranted { user_name, .. } => {
                Some(format!("{}'s wish came true!", display_name(user_name)))
            }

            // === Ability, Item and Transformation Events ===
            BattleEvent::AbilityActivated { name, ability, .. } => Some(format!(
                "[{}'s {}]",
                display_name(name),
                display_name(ability)
            )),
            BattleEvent::ItemUsed {
                side,
                item,
                target_name,
            } => Some(format!(
                "{} used {} on {}!",
                battle.trainer_name(*side),
                display_name(item),
                display_name(target_name)
            )),
            BattleEvent::Transformed { name, kind, .. } => Some(format!(
                "{} {}!",
                display_name(name),
                kind.activation_text()
            )),
            BattleEvent::TransformationCancelled { .. } => None,
            BattleEvent::TransformationReverted { name, .. } => {
                Some(format!("{} returned to normal.", display_name(name)))
            }
            BattleEvent::FormChanged { name, .. } => {
                Some(format!("{} changed form!", display_name(name)))
            }

            // === Battle End Events ===
            BattleEvent::PlayerForfeited { side } => Some(format!(
                "{} forfeited the match.",
                battle.trainer_name(*side)
            )),
            BattleEvent::PlayerDefeated { side } => Some(format!(
                "{} is out of usable combatants!",
                battle.trainer_name(*side)
            )),
            BattleEvent::BattleEnded { winner } => match winner {
                Some(side) => Some(format!(
                    "{} has won the battle!",
                    battle.trainer_name(*side)
                )),
                None => Some("The battle ended in a draw!".to_string()),
            },
        }
    }

    // --- Private Helper Functions ---

    fn format_action_failure(name: &str, reason: ActionFailureReason) -> String {
        match reason {
            ActionFailureReason::IsAsleep => format!("{} is fast asleep.", name),
            ActionFailureReason::IsFrozen => format!("{} is frozen solid!", name),
            ActionFailureReason::IsParalyzed => format!("{} is fully paralyzed!", name),
            ActionFailureReason::IsFlinching => format!("{} flinched and couldn't move!", name),
            ActionFailureReason::MustRecharge => format!("{} must recharge!", name),
            ActionFailureReason::IsTaunted => {
                format!("{} can't use that move after the taunt!", name)
            }
            ActionFailureReason::IsTrapped => format!("{} can't escape!", name),
            ActionFailureReason::AlreadyActive => "But it's already in effect!".to_string(),
            ActionFailureReason::NoTarget => "But there was no target...".to_string(),
            ActionFailureReason::SubstituteTooWeak => {
                format!("{} is too weak to make a substitute!", name)
            }
            ActionFailureReason::Generic => "But it failed!".to_string(),
        }
    }

    fn format_residual_source(source: &ResidualSource) -> String {
        match source {
            ResidualSource::LeechSeed => "leech seed".to_string(),
            ResidualSource::Binding => "the bind".to_string(),
            ResidualSource::Hazard(hazard) => hazard.to_string(),
            ResidualSource::Weather(weather) => format!("the {}", weather),
            ResidualSource::Recoil => "recoil".to_string(),
            ResidualSource::Confusion => "its own confusion".to_string(),
            ResidualSource::ProtectionContact(kind) => kind.to_string(),
            ResidualSource::Aftermath => "the aftermath".to_string(),
            ResidualSource::Substitute => "making a substitute".to_string(),
        }
    }

    fn format_status(status: &StatusCondition) -> &'static str {
        match status {
            StatusCondition::Sleep { .. } => "sleep",
            StatusCondition::Burn => "burn",
            StatusCondition::Paralysis => "paralysis",
            StatusCondition::Poison | StatusCondition::BadlyPoisoned { .. } => "poison",
            StatusCondition::Freeze => "freeze",
        }
    }

    fn format_status_applied(status: &StatusCondition) -> &'static str {
        match status {
            StatusCondition::Sleep { .. } => "fell asleep!",
            StatusCondition::Burn => "was burned!",
            StatusCondition::Paralysis => "is paralyzed! It may be unable to move!",
            StatusCondition::Poison => "was poisoned!",
            StatusCondition::BadlyPoisoned { .. } => "was badly poisoned!",
            StatusCondition::Freeze => "was frozen solid!",
        }
    }

    fn format_status_removed(status: &StatusCondition) -> String {
        match status {
            StatusCondition::Sleep { .. } => "woke up!".to_string(),
            StatusCondition::Freeze => "thawed out!".to_string(),
            _ => format!("was cured of its {}!", Self::format_status(status)),
        }
    }

    fn format_stat_type(stat: &StatType) -> &'static str {
        match stat {
            StatType::Hp => "HP",
            StatType::Attack => "Attack",
            StatType::Defense => "Defense",
            StatType::SpecialAttack => "Special Attack",
            StatType::SpecialDefense => "Special Defense",
            StatType::Speed => "Speed",
            StatType::Accuracy => "accuracy",
            StatType::Evasion => "evasiveness",
        }
    }
}

/// Catalog-style name to display form: "quick-attack" becomes "Quick Attack".
pub fn display_name(name: &str) -> String {
    name.split(|c| c == '-' || c == '_' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Event bus for collecting and managing battle events.
///
/// ```rust,ignore
/// let lines = event_bus.lines(&battle);   // Plain log lines for a collaborator
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBus {
    events: Vec<BattleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: BattleEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    pub fn extend(&mut self, other: EventBus) {
        self.events.extend(other.events);
    }

    pub fn into_events(self) -> Vec<BattleEvent> {
        self.events
    }

    /// Formatted lines for every non-silent event, in order.
    pub fn lines(&self, battle: &Battle) -> Vec<String> {
        self.events.iter().filter_map(|e| e.format(battle)).collect()
    }

    /// Return true if the event bus contains no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Return the number of events in the bus.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl std::fmt::Display for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for event in &self.events {
            writeln!(f, "  {:?}", event)?;
        }
        Ok(())
    }
}

/// Source of every random roll in a turn. Tests script the outcomes; live
/// battles draw from a seeded generator.
#[derive(Debug, Clone)]
pub enum TurnRng {
    Scripted { outcomes: Vec<u8>, index: usize },
    Seeded(StdRng),
}

impl TurnRng {
    pub fn new_for_test(outcomes: Vec<u8>) -> Self {
        TurnRng::Scripted { outcomes, index: 0 }
    }

    pub fn new_random() -> Self {
        TurnRng::Seeded(StdRng::from_rng(&mut rand::rng()))
    }

    pub fn from_seed(seed: u64) -> Self {
        TurnRng::Seeded(StdRng::seed_from_u64(seed))
    }

    /// A roll in 1..=100.
    pub fn next_outcome(&mut self, reason: &str) -> u8 {
        let outcome = match self {
            TurnRng::Scripted { outcomes, index } => match outcomes.get(*index) {
                Some(value) => {
                    *index += 1;
                    *value
                }
                None => {
                    warn!(reason, "scripted rng exhausted; using 50");
                    50
                }
            },
            TurnRng::Seeded(rng) => rng.random_range(1..=100),
        };
        trace!(outcome, reason, "rng consumed");
        outcome
    }

    /// True with `percent` chance. Certain and impossible rolls consume nothing.
    pub fn chance(&mut self, percent: u8, reason: &str) -> bool {
        if percent >= 100 {
            return true;
        }
        if percent == 0 {
            return false;
        }
        self.next_outcome(reason) <= percent
    }

    /// Map one roll onto `low..=high`.
    pub fn next_range(&mut self, low: u32, high: u32, reason: &str) -> u32 {
        if high <= low {
            return low;
        }
        let outcome = self.next_outcome(reason).clamp(1, 100) as u32;
        low + ((outcome - 1) * (high - low + 1)) / 100
    }

    /// Uniform coin flip.
    pub fn coin_flip(&mut self, reason: &str) -> bool {
        self.next_outcome(reason) <= 50
    }
}

/// Final result of a finished battle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleOutcome {
    pub winner: Option<usize>,
    pub turns: u32,
    pub forfeited_by: Option<usize>,
}

/// Aggregate root for one battle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Battle {
    pub battle_id: String,
    pub rosters: [Roster; 2],
    pub sides: [SideState; 2],
    pub field: FieldState,
    pub pp: PpLedger,
    pub turn_number: u32,
    pub game_state: GameState,
    pub action_queue: [Option<TurnAction>; 2],
    pub pending_transformations: [Option<TransformationKind>; 2],
    pub forfeited_by: Option<usize>,
}

impl Battle {
    pub fn new(
        battle_id: String,
        roster1: Roster,
        roster2: Roster,
        catalog: &CatalogView,
    ) -> Result<Self, BattleStateError> {
        roster1.validate(0)?;
        roster2.validate(1)?;
        let rosters = [roster1, roster2];
        let pp = PpLedger::from_rosters(&rosters, catalog);

        Ok(Self {
            battle_id,
            rosters,
            sides: [SideState::new(), SideState::new()],
            field: FieldState::new(),
            pp,
            turn_number: 1,
            game_state: GameState::WaitingForActions,
            action_queue: [None, None],
            pending_transformations: [None, None],
            forfeited_by: None,
        })
    }

    pub fn trainer_name(&self, side: usize) -> &str {
        self.rosters
            .get(side)
            .map(|r| r.trainer_name.as_str())
            .unwrap_or("Unknown trainer")
    }

    pub fn active(&self, side: usize) -> Option<&Combatant> {
        self.rosters.get(side)?.active()
    }

    pub fn active_mut(&mut self, side: usize) -> Option<&mut Combatant> {
        self.rosters.get_mut(side)?.active_mut()
    }

    pub fn active_slot(&self, side: usize) -> usize {
        self.rosters.get(side).map_or(0, |r| r.active)
    }

    /// Display name of a side's active combatant.
    pub fn active_name(&self, side: usize) -> String {
        self.active(side)
            .map(|c| c.name().to_string())
            .unwrap_or_default()
    }

    pub fn is_over(&self) -> bool {
        self.game_state.is_terminal()
    }

    pub fn winner(&self) -> Option<usize> {
        match self.game_state {
            GameState::Player1Win => Some(0),
            GameState::Player2Win => Some(1),
            _ => None,
        }
    }

    /// Summary of a finished battle, `None` while it is still running.
    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.is_over().then(|| BattleOutcome {
            winner: self.winner(),
            turns: self.turn_number.saturating_sub(1),
            forfeited_by: self.forfeited_by,
        })
    }

    /// Queue a side's choice for the next resolution. A later submission
    /// replaces an earlier one until the turn resolves.
    pub fn submit_action(
        &mut self,
        side: usize,
        action: TurnAction,
    ) -> Result<(), BattleStateError> {
        if side > 1 {
            return Err(BattleStateError::InvalidSide(side));
        }
        if self.is_over() {
            return Err(BattleStateError::BattleOver);
        }
        if let GameState::AwaitingPivotSwitch { side } = self.game_state {
            return Err(BattleStateError::UnexpectedContinuation(side));
        }
        self.action_queue[side] = Some(action);
        Ok(())
    }

    /// Ask for a one-shot transformation alongside this turn's action.
    pub fn request_transformation(
        &mut self,
        side: usize,
        kind: TransformationKind,
    ) -> Result<(), BattleStateError> {
        if side > 1 {
            return Err(BattleStateError::InvalidSide(side));
        }
        if self.is_over() {
            return Err(BattleStateError::BattleOver);
        }
        self.pending_transformations[side] = Some(kind);
        Ok(())
    }

    pub fn ready_for_turn_resolution(&self) -> bool {
        match self.game_state {
            GameState::WaitingForActions => {
                self.action_queue[0].is_some() && self.action_queue[1].is_some()
            }
            state if state.is_replacement_phase() => {
                self.action_queue.contains(&Some(TurnAction::Forfeit))
                    || state
                        .sides_needing_replacement()
                        .iter()
                        .all(|side| self.action_queue[*side].is_some())
            }
            _ => false,
        }
    }
}

/// Serialized form of a whole battle, used for persistence and replay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattleSnapshot {
    pub format_version: u16,
    pub battle: Battle,
}

impl BattleSnapshot {
    pub const FORMAT_VERSION: u16 = 1;

    pub fn capture(battle: &Battle) -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            battle: battle.clone(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let snapshot: Self = postcard::from_bytes(bytes)?;
        if snapshot.format_version != Self::FORMAT_VERSION {
            return Err(PersistenceError::Serialization(format!(
                "unsupported snapshot version {}",
                snapshot.format_version
            )));
        }
        Ok(snapshot)
    }
}
