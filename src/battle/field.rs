//! Battle-wide conditions shared by both sides: weather, terrain and the
//! counter-based global effects.
use schema::{GlobalEffect, Terrain, Weather};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of trying to start a field condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChange {
    Started,
    AlreadyActive,
    /// A persistent weather refuses to be replaced by a normal one.
    BlockedByPersistent,
    /// Toggle effects (Trick Room) end when started again.
    Ended,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FieldState {
    pub weather: Option<Weather>,
    /// Zero for persistent weather, which has no counter.
    pub weather_turns: u8,
    /// Side whose ability holds a persistent weather in place.
    pub weather_owner: Option<usize>,
    pub terrain: Option<Terrain>,
    pub terrain_turns: u8,
    pub global_effects: HashMap<GlobalEffect, u8>,
}

impl FieldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, effect: GlobalEffect) -> bool {
        self.global_effects.contains_key(&effect)
    }

    pub fn has_persistent_weather(&self) -> bool {
        self.weather.is_some_and(|w| w.is_persistent())
    }

    /// Start a turn-limited weather.
    pub fn set_weather(&mut self, weather: Weather, turns: u8) -> FieldChange {
        if self.weather == Some(weather) {
            return FieldChange::AlreadyActive;
        }
        if self.has_persistent_weather() {
            return FieldChange::BlockedByPersistent;
        }
        self.weather = Some(weather);
        self.weather_turns = turns;
        self.weather_owner = None;
        FieldChange::Started
    }

    /// Start a persistent weather held by `owner`. Persistent weathers replace each other.
    pub fn set_persistent_weather(&mut self, weather: Weather, owner: usize) -> FieldChange {
        if self.weather == Some(weather) {
            self.weather_owner = Some(owner);
            return FieldChange::AlreadyActive;
        }
        self.weather = Some(weather);
        self.weather_turns = 0;
        self.weather_owner = Some(owner);
        FieldChange::Started
    }

    pub fn clear_weather(&mut self) -> Option<Weather> {
        self.weather_turns = 0;
        self.weather_owner = None;
        self.weather.take()
    }

    pub fn set_terrain(&mut self, terrain: Terrain, turns: u8) -> FieldChange {
        if self.terrain == Some(terrain) {
            return FieldChange::AlreadyActive;
        }
        self.terrain = Some(terrain);
        self.terrain_turns = turns;
        FieldChange::Started
    }

    /// Start a global effect. Trick Room toggles off when used while active.
    pub fn set_global(&mut self, effect: GlobalEffect, turns: u8) -> FieldChange {
        if self.is_active(effect) {
            if effect == GlobalEffect::TrickRoom {
                self.global_effects.remove(&effect);
                return FieldChange::Ended;
            }
            return FieldChange::AlreadyActive;
        }
        self.global_effects.insert(effect, turns);
        FieldChange::Started
    }

    /// Decrement the weather counter. Returns the weather if it just ended.
    pub fn tick_weather(&mut self) -> Option<Weather> {
        let weather = self.weather?;
        if weather.is_persistent() || self.weather_turns == 0 {
            return None;
        }
        self.weather_turns -= 1;
        if self.weather_turns == 0 {
            self.weather = None;
            return Some(weather);
        }
        None
    }

    pub fn tick_terrain(&mut self) -> Option<Terrain> {
        let terrain = self.terrain?;
        self.terrain_turns = self.terrain_turns.saturating_sub(1);
        if self.terrain_turns == 0 {
            self.terrain = None;
            return Some(terrain);
        }
        None
    }

    /// Decrement global effect counters, returning those that expired.
    pub fn tick_globals(&mut self) -> Vec<GlobalEffect> {
        let mut expired = Vec::new();
        self.global_effects.retain(|effect, turns| {
            *turns = turns.saturating_sub(1);
            if *turns == 0 {
                expired.push(*effect);
                false
            } else {
                true
            }
        });
        expired.sort_by_key(|e| e.to_string());
        expired
    }

    /// Damage multiplier weather applies to a move of the given type.
    pub fn weather_damage_modifier(&self, move_type: schema::PokemonType) -> f32 {
        use schema::PokemonType;
        match (self.weather, move_type) {
            (Some(w), PokemonType::Water) if w.is_rain() => 1.5,
            (Some(w), PokemonType::Fire) if w.is_rain() => 0.5,
            (Some(w), PokemonType::Fire) if w.is_sun() => 1.5,
            (Some(w), PokemonType::Water) if w.is_sun() => 0.5,
            _ => 1.0,
        }
    }
}
