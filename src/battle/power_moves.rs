//! Move conversion for the transformations that change what a move does.
//! A held Z-Crystal turns one attack of its type into a Z-move; a dynamaxed
//! combatant's attacks become Max Moves and its status moves become Max Guard.
use crate::battle::conditions::VolatileKind;
use crate::catalog::CatalogView;
use crate::combatant::Combatant;
use schema::{
    EffectTarget, ItemEffect, MoveCategory, MoveClass, MoveDescriptor, MoveFlags, MoveTarget,
    PokemonType, ProtectionKind, SecondaryEffect, StatType, Terrain, Weather, UNIVERSAL_MOVE,
};
use std::sync::Arc;

pub const MAX_GUARD: &str = "Max Guard";

/// Z-move power from the base move's power.
pub fn z_move_power(base_power: u16) -> u16 {
    match base_power {
        0..=55 => 100,
        56..=65 => 120,
        66..=75 => 140,
        76..=85 => 160,
        86..=99 => 175,
        100..=109 => 180,
        110..=119 => 185,
        120..=129 => 190,
        130..=139 => 195,
        _ => 200,
    }
}

/// Max Move power: one and a half times the base, or base + 70 for very
/// weak moves, capped at 130. Moves without a listed power get 90.
pub fn max_move_power(base_power: Option<u16>) -> u16 {
    let Some(base) = base_power else {
        return 90;
    };
    let power = if base >= 10 { base * 3 / 2 } else { base + 70 };
    power.min(130)
}

pub fn z_move_name(move_type: PokemonType) -> &'static str {
    match move_type {
        PokemonType::Normal | PokemonType::Typeless => "Breakneck Blitz",
        PokemonType::Fire => "Inferno Overdrive",
        PokemonType::Water => "Hydro Vortex",
        PokemonType::Electric => "Gigavolt Havoc",
        PokemonType::Grass => "Bloom Doom",
        PokemonType::Ice => "Subzero Slammer",
        PokemonType::Fighting => "All-Out Pummeling",
        PokemonType::Poison => "Acid Downpour",
        PokemonType::Ground => "Tectonic Rage",
        PokemonType::Flying => "Supersonic Skystrike",
        PokemonType::Psychic => "Shattered Psyche",
        PokemonType::Bug => "Savage Spin-Out",
        PokemonType::Rock => "Continental Crush",
        PokemonType::Ghost => "Never-Ending Nightmare",
        PokemonType::Dragon => "Devastating Drake",
        PokemonType::Dark => "Black Hole Eclipse",
        PokemonType::Steel => "Corkscrew Crash",
        PokemonType::Fairy => "Twinkle Tackle",
    }
}

pub fn max_move_name(move_type: PokemonType) -> &'static str {
    match move_type {
        PokemonType::Normal | PokemonType::Typeless => "Max Strike",
        PokemonType::Fire => "Max Flare",
        PokemonType::Water => "Max Geyser",
        PokemonType::Electric => "Max Lightning",
        PokemonType::Grass => "Max Overgrowth",
        PokemonType::Ice => "Max Hailstorm",
        PokemonType::Fighting => "Max Knuckle",
        PokemonType::Poison => "Max Ooze",
        PokemonType::Ground => "Max Quake",
        PokemonType::Flying => "Max Airstream",
        PokemonType::Psychic => "Max Mindstorm",
        PokemonType::Bug => "Max Flutterby",
        PokemonType::Rock => "Max Rockfall",
        PokemonType::Ghost => "Max Phantasm",
        PokemonType::Dragon => "Max Wyrmwind",
        PokemonType::Dark => "Max Darkness",
        PokemonType::Steel => "Max Steelspike",
        PokemonType::Fairy => "Max Starfall",
    }
}

/// The rider a Max Move of this type carries after it hits.
pub fn max_move_effect(move_type: PokemonType) -> Option<SecondaryEffect> {
    let raise = |stat| SecondaryEffect::StatChange {
        target: EffectTarget::User,
        stat,
        stages: 1,
        chance: 100,
    };
    let lower = |stat| SecondaryEffect::StatChange {
        target: EffectTarget::Target,
        stat,
        stages: -1,
        chance: 100,
    };
    let effect = match move_type {
        PokemonType::Fire => SecondaryEffect::SetWeather(Weather::Sun),
        PokemonType::Water => SecondaryEffect::SetWeather(Weather::Rain),
        PokemonType::Ice => SecondaryEffect::SetWeather(Weather::Snow),
        PokemonType::Rock => SecondaryEffect::SetWeather(Weather::Sandstorm),
        PokemonType::Electric => SecondaryEffect::SetTerrain(Terrain::Electric),
        PokemonType::Grass => SecondaryEffect::SetTerrain(Terrain::Grassy),
        PokemonType::Psychic => SecondaryEffect::SetTerrain(Terrain::Psychic),
        PokemonType::Fairy => SecondaryEffect::SetTerrain(Terrain::Misty),
        PokemonType::Fighting => raise(StatType::Attack),
        PokemonType::Poison => raise(StatType::SpecialAttack),
        PokemonType::Ground => raise(StatType::SpecialDefense),
        PokemonType::Flying => raise(StatType::Speed),
        PokemonType::Steel => raise(StatType::Defense),
        PokemonType::Bug => lower(StatType::SpecialAttack),
        PokemonType::Ghost => lower(StatType::Defense),
        PokemonType::Dragon => lower(StatType::Attack),
        PokemonType::Dark => lower(StatType::SpecialDefense),
        PokemonType::Normal => lower(StatType::Speed),
        PokemonType::Typeless => return None,
    };
    Some(effect)
}

/// Type of the Z-Crystal `combatant` holds, if any.
pub fn crystal_type(combatant: &Combatant, catalog: &CatalogView) -> Option<PokemonType> {
    let item = combatant.item.as_deref()?;
    match &catalog.item(item).effect {
        ItemEffect::ZCrystal { move_type } => Some(*move_type),
        _ => None,
    }
}

/// The Z-move `base` becomes under a crystal of `crystal` type. Only
/// attacks of the crystal's own type convert.
pub fn z_move(base: &MoveDescriptor, crystal: PokemonType) -> Option<MoveDescriptor> {
    if base.name == UNIVERSAL_MOVE || !base.is_damaging() || base.move_type != crystal {
        return None;
    }
    Some(MoveDescriptor {
        name: z_move_name(base.move_type).to_string(),
        power: Some(z_move_power(base.power.unwrap_or(0))),
        accuracy: None,
        target: MoveTarget::Opponent,
        class: MoveClass::Standard,
        flags: MoveFlags {
            contact: base.flags.contact,
            ..MoveFlags::default()
        },
        secondary: Vec::new(),
        ..base.clone()
    })
}

/// The Max Move `base` becomes while its user is dynamaxed.
pub fn max_move(base: &MoveDescriptor) -> Option<MoveDescriptor> {
    if base.name == UNIVERSAL_MOVE || base.class == MoveClass::Inert {
        return None;
    }
    if base.is_status() {
        return Some(MoveDescriptor {
            name: MAX_GUARD.to_string(),
            move_type: PokemonType::Normal,
            category: MoveCategory::Status,
            power: None,
            accuracy: None,
            priority: 4,
            target: MoveTarget::User,
            class: MoveClass::Protection(ProtectionKind::Plain),
            flags: MoveFlags::default(),
            secondary: Vec::new(),
            ..base.clone()
        });
    }
    Some(MoveDescriptor {
        name: max_move_name(base.move_type).to_string(),
        power: Some(max_move_power(base.power)),
        accuracy: None,
        target: MoveTarget::Opponent,
        class: MoveClass::Standard,
        flags: MoveFlags::default(),
        secondary: max_move_effect(base.move_type).into_iter().collect(),
        ..base.clone()
    })
}

/// What `base` actually does for `user` this action. `z_powered` is the
/// Z-power the user just spent on this move.
pub fn convert(
    user: &Combatant,
    base: Arc<MoveDescriptor>,
    z_powered: bool,
    catalog: &CatalogView,
) -> Arc<MoveDescriptor> {
    if z_powered {
        if let Some(z) = crystal_type(user, catalog).and_then(|crystal| z_move(&base, crystal)) {
            return Arc::new(z);
        }
    }
    if user.has_volatile(VolatileKind::Dynamaxed) {
        if let Some(max) = max_move(&base) {
            return Arc::new(max);
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::conditions::VolatileCondition;
    use crate::battle::tests::common::{test_catalog, TestCombatantBuilder};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(40, 100)]
    #[case(55, 100)]
    #[case(70, 140)]
    #[case(90, 175)]
    #[case(100, 180)]
    #[case(120, 190)]
    #[case(150, 200)]
    fn test_z_move_power_table(#[case] base: u16, #[case] expected: u16) {
        assert_eq!(z_move_power(base), expected);
    }

    #[rstest]
    #[case(Some(40), 60)]
    #[case(Some(90), 130)]
    #[case(Some(5), 75)]
    #[case(None, 90)]
    fn test_max_move_power(#[case] base: Option<u16>, #[case] expected: u16) {
        assert_eq!(max_move_power(base), expected);
    }

    #[test]
    fn test_z_move_needs_a_matching_attack() {
        let catalog = test_catalog();
        let thunderbolt = catalog.move_descriptor("thunderbolt");
        let tackle = catalog.move_descriptor("tackle");

        let z = z_move(&thunderbolt, PokemonType::Electric).expect("electric attack converts");
        assert_eq!(z.name, "Gigavolt Havoc");
        assert_eq!(z.power, Some(175));
        assert!(z.secondary.is_empty());
        assert_eq!(z_move(&tackle, PokemonType::Electric), None);
        assert_eq!(z_move(&catalog.move_descriptor("protect"), PokemonType::Normal), None);
    }

    #[test]
    fn test_max_moves_and_max_guard() {
        let catalog = test_catalog();
        let strike = max_move(&catalog.move_descriptor("tackle")).expect("tackle converts");
        assert_eq!(strike.name, "Max Strike");
        assert_eq!(strike.power, Some(60));
        assert_eq!(
            strike.secondary,
            vec![SecondaryEffect::StatChange {
                target: EffectTarget::Target,
                stat: StatType::Speed,
                stages: -1,
                chance: 100,
            }]
        );

        let flare = max_move(&catalog.move_descriptor("flamethrower")).expect("converts");
        assert_eq!(flare.secondary, vec![SecondaryEffect::SetWeather(Weather::Sun)]);

        let guard = max_move(&catalog.move_descriptor("protect")).expect("converts");
        assert_eq!(guard.name, MAX_GUARD);
        assert_eq!(guard.class, MoveClass::Protection(ProtectionKind::Plain));
        assert_eq!(max_move(&MoveDescriptor::struggle()), None);
    }

    #[test]
    fn test_convert_only_when_powered() {
        let catalog = test_catalog();
        let mut pikachu = TestCombatantBuilder::new("pikachu")
            .with_item("electrium-z")
            .build();
        let thunderbolt = catalog.move_descriptor("thunderbolt");

        assert_eq!(convert(&pikachu, thunderbolt.clone(), false, &catalog).name, "thunderbolt");
        assert_eq!(
            convert(&pikachu, thunderbolt.clone(), true, &catalog).name,
            "Gigavolt Havoc"
        );

        pikachu.add_volatile(VolatileCondition::Dynamaxed { turns_remaining: 3 });
        assert_eq!(convert(&pikachu, thunderbolt, false, &catalog).name, "Max Lightning");
    }
}
