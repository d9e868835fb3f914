//! Damage collaborator. The move executor depends only on [`DamageCalculator`];
//! the standard implementation follows the usual level/power/stat formula.
use crate::battle::field::FieldState;
use crate::battle::side::SideState;
use crate::battle::state::TurnRng;
use crate::battle::stats::{effective_attack, effective_defense};
use crate::catalog::CatalogView;
use crate::combatant::{Combatant, StatusCondition};
use crate::errors::DamageError;
use schema::{MoveCategory, MoveDescriptor, Screen};

/// Odds of a critical hit, in percent (about 1 in 24).
const CRITICAL_HIT_CHANCE: u8 = 4;

pub struct DamageContext<'a> {
    pub attacker: &'a Combatant,
    pub defender: &'a Combatant,
    pub descriptor: &'a MoveDescriptor,
    pub defender_side: &'a SideState,
    pub field: &'a FieldState,
    pub catalog: &'a CatalogView,
    /// Confusion self-hits never crit and ignore screens.
    pub self_inflicted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    pub damage: u16,
    pub effectiveness: f64,
    pub critical: bool,
}

pub trait DamageCalculator: Send + Sync {
    fn calculate(
        &self,
        ctx: &DamageContext,
        rng: &mut TurnRng,
    ) -> Result<DamageOutcome, DamageError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDamageCalculator;

impl DamageCalculator for StandardDamageCalculator {
    fn calculate(
        &self,
        ctx: &DamageContext,
        rng: &mut TurnRng,
    ) -> Result<DamageOutcome, DamageError> {
        let descriptor = ctx.descriptor;
        let Some(power) = descriptor.power.filter(|p| *p > 0) else {
            return Ok(DamageOutcome {
                damage: 0,
                effectiveness: 1.0,
                critical: false,
            });
        };
        if descriptor.category == MoveCategory::Status {
            return Err(DamageError::Collaborator(format!(
                "{} is a status move",
                descriptor.name
            )));
        }

        let effectiveness = descriptor
            .move_type
            .effectiveness_against(&ctx.defender.types) as f64;
        if effectiveness == 0.0 {
            return Ok(DamageOutcome {
                damage: 0,
                effectiveness,
                critical: false,
            });
        }

        let critical = !ctx.self_inflicted && rng.chance(CRITICAL_HIT_CHANCE, "critical hit");
        let random_factor = rng.next_range(85, 100, "damage roll") as f64 / 100.0;

        let attack =
            effective_attack(ctx.attacker, descriptor.category, ctx.catalog, ctx.field) as f64;
        let defense = effective_defense(ctx.defender, descriptor.category) as f64;
        let level = ctx.attacker.level as f64;

        let power = power as f64;

        let base = ((2.0 * level / 5.0 + 2.0) * power * attack / defense) / 50.0 + 2.0;
        let mut damage = base;

        if critical {
            damage *= 1.5;
        }
        damage *= random_factor;
        if ctx.attacker.stab_types().contains(&descriptor.move_type) {
            damage *= 1.5;
        }
        damage *= effectiveness;

        if descriptor.category == MoveCategory::Physical
            && matches!(ctx.attacker.status, Some(StatusCondition::Burn))
        {
            damage *= 0.5;
        }

        if !critical && !ctx.self_inflicted && screen_applies(ctx.defender_side, descriptor.category) {
            damage *= 0.5;
        }

        damage *= ctx.field.weather_damage_modifier(descriptor.move_type) as f64;

        Ok(DamageOutcome {
            damage: (damage.floor() as u32).clamp(1, u16::MAX as u32) as u16,
            effectiveness,
            critical,
        })
    }
}

fn screen_applies(side: &SideState, category: MoveCategory) -> bool {
    side.has_screen(Screen::AuroraVeil)
        || match category {
            MoveCategory::Physical => side.has_screen(Screen::Reflect),
            MoveCategory::Special => side.has_screen(Screen::LightScreen),
            MoveCategory::Status => false,
        }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{predictable_rng, test_catalog, TestCombatantBuilder};
    use pretty_assertions::assert_eq;
    use schema::{PokemonType, Weather};

    fn outcome(
        attacker: &Combatant,
        defender: &Combatant,
        move_name: &str,
        side: &SideState,
        field: &FieldState,
    ) -> DamageOutcome {
        let catalog = test_catalog();
        let descriptor = catalog.move_descriptor(move_name);
        let ctx = DamageContext {
            attacker,
            defender,
            descriptor: &descriptor,
            defender_side: side,
            field,
            catalog: &catalog,
            self_inflicted: false,
        };
        StandardDamageCalculator
            .calculate(&ctx, &mut predictable_rng())
            .expect("damage")
    }

    #[test]
    fn test_stab_and_screens() {
        let attacker = TestCombatantBuilder::new("snorlax").build();
        let defender = TestCombatantBuilder::new("blissey").build();
        let field = FieldState::new();
        let mut side = SideState::new();

        let open = outcome(&attacker, &defender, "tackle", &side, &field);
        assert!(!open.critical);
        assert_eq!(open.effectiveness, 1.0);

        side.set_screen(Screen::Reflect, 5);
        let screened = outcome(&attacker, &defender, "tackle", &side, &field);
        assert!(screened.damage < open.damage);
        assert_eq!(screened.damage, (open.damage as f64 * 0.5).floor() as u16);
    }

    #[test]
    fn test_immunity_deals_nothing() {
        let attacker = TestCombatantBuilder::new("snorlax").build();
        let defender = TestCombatantBuilder::new("gengar")
            .with_types(vec![PokemonType::Ghost])
            .build();

        let result = outcome(&attacker, &defender, "tackle", &SideState::new(), &FieldState::new());
        assert_eq!(result.damage, 0);
        assert_eq!(result.effectiveness, 0.0);
    }

    #[test]
    fn test_rain_boosts_water() {
        let attacker = TestCombatantBuilder::new("vaporeon").build();
        let defender = TestCombatantBuilder::new("snorlax").build();
        let mut field = FieldState::new();

        let dry = outcome(&attacker, &defender, "surf", &SideState::new(), &field);
        field.set_weather(Weather::Rain, 5);
        let wet = outcome(&attacker, &defender, "surf", &SideState::new(), &field);

        assert!(wet.damage > dry.damage);
    }
}
