//! Read-only rules catalog: move, ability and item descriptors by name.
//!
//! The engine reaches the catalog only through [`CatalogView`], which turns
//! lookup misses into documented safe defaults so a turn never aborts on
//! unknown content.
use crate::battle::field::FieldState;
use crate::combatant::Combatant;
use crate::errors::{CatalogError, CatalogResult};
use schema::{
    AbilityDescriptor, AbilityEffect, CatalogData, GlobalEffect, ItemDescriptor, ItemEffect,
    MoveDescriptor, UNIVERSAL_MOVE,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.ron");

/// Lookup interface for catalog data. Implementations must be pure: the same
/// name always yields the same descriptor for the lifetime of an entry.
pub trait RulesCatalog: Send + Sync {
    fn lookup_move(&self, name: &str) -> CatalogResult<Arc<MoveDescriptor>>;
    fn lookup_ability(&self, name: &str) -> CatalogResult<Arc<AbilityDescriptor>>;
    fn lookup_item(&self, name: &str) -> CatalogResult<Arc<ItemDescriptor>>;
}

/// Lowercase, hyphen-separated form used as the lookup key.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c })
        .filter(|c| *c != '\'')
        .collect()
}

/// In-memory catalog built from [`CatalogData`].
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    moves: HashMap<String, Arc<MoveDescriptor>>,
    abilities: HashMap<String, Arc<AbilityDescriptor>>,
    items: HashMap<String, Arc<ItemDescriptor>>,
}

impl StaticCatalog {
    pub fn from_data(data: CatalogData) -> Self {
        let moves = data
            .moves
            .into_iter()
            .map(|m| (normalize_name(&m.name), Arc::new(m)))
            .collect();
        let abilities = data
            .abilities
            .into_iter()
            .map(|a| (normalize_name(&a.name), Arc::new(a)))
            .collect();
        let items = data
            .items
            .into_iter()
            .map(|i| (normalize_name(&i.name), Arc::new(i)))
            .collect();

        Self {
            moves,
            abilities,
            items,
        }
    }

    pub fn from_ron_str(text: &str) -> CatalogResult<Self> {
        let data: CatalogData =
            ron::from_str(text).map_err(|e| CatalogError::Malformed(e.to_string()))?;
        Ok(Self::from_data(data))
    }

    /// The catalog shipped with the crate.
    pub fn builtin() -> CatalogResult<Self> {
        Self::from_ron_str(BUILTIN_CATALOG)
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }
}

impl RulesCatalog for StaticCatalog {
    fn lookup_move(&self, name: &str) -> CatalogResult<Arc<MoveDescriptor>> {
        self.moves
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| CatalogError::UnknownMove(name.to_string()))
    }

    fn lookup_ability(&self, name: &str) -> CatalogResult<Arc<AbilityDescriptor>> {
        self.abilities
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| CatalogError::UnknownAbility(name.to_string()))
    }

    fn lookup_item(&self, name: &str) -> CatalogResult<Arc<ItemDescriptor>> {
        self.items
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| CatalogError::UnknownItem(name.to_string()))
    }
}

struct CacheEntry<T> {
    value: Arc<T>,
    stored_at: Instant,
}

struct CacheTable<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T> CacheTable<T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str, ttl: Duration) -> Option<Arc<T>> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < ttl)
            .map(|entry| entry.value.clone())
    }

    fn insert(&self, key: String, value: Arc<T>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key,
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

/// Read-through cache in front of another catalog with an explicit TTL.
/// Misses are not cached.
pub struct CachedCatalog<C: RulesCatalog> {
    inner: C,
    ttl: Duration,
    moves: CacheTable<MoveDescriptor>,
    abilities: CacheTable<AbilityDescriptor>,
    items: CacheTable<ItemDescriptor>,
}

impl<C: RulesCatalog> CachedCatalog<C> {
    pub fn new(inner: C, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            moves: CacheTable::new(),
            abilities: CacheTable::new(),
            items: CacheTable::new(),
        }
    }

    /// Drop one cached name from every table.
    pub fn invalidate(&self, name: &str) {
        let key = normalize_name(name);
        self.moves.remove(&key);
        self.abilities.remove(&key);
        self.items.remove(&key);
    }

    pub fn invalidate_all(&self) {
        self.moves.clear();
        self.abilities.clear();
        self.items.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.moves.len() + self.abilities.len() + self.items.len()
    }
}

impl<C: RulesCatalog> RulesCatalog for CachedCatalog<C> {
    fn lookup_move(&self, name: &str) -> CatalogResult<Arc<MoveDescriptor>> {
        let key = normalize_name(name);
        if let Some(hit) = self.moves.get(&key, self.ttl) {
            return Ok(hit);
        }
        let value = self.inner.lookup_move(name)?;
        self.moves.insert(key, value.clone());
        Ok(value)
    }

    fn lookup_ability(&self, name: &str) -> CatalogResult<Arc<AbilityDescriptor>> {
        let key = normalize_name(name);
        if let Some(hit) = self.abilities.get(&key, self.ttl) {
            return Ok(hit);
        }
        let value = self.inner.lookup_ability(name)?;
        self.abilities.insert(key, value.clone());
        Ok(value)
    }

    fn lookup_item(&self, name: &str) -> CatalogResult<Arc<ItemDescriptor>> {
        let key = normalize_name(name);
        if let Some(hit) = self.items.get(&key, self.ttl) {
            return Ok(hit);
        }
        let value = self.inner.lookup_item(name)?;
        self.items.insert(key, value.clone());
        Ok(value)
    }
}

/// Engine-facing catalog handle. Never fails: unknown names resolve to
/// inert descriptors and are logged.
#[derive(Clone)]
pub struct CatalogView {
    inner: Arc<dyn RulesCatalog>,
}

impl std::fmt::Debug for CatalogView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogView").finish_non_exhaustive()
    }
}

impl CatalogView {
    pub fn new(inner: Arc<dyn RulesCatalog>) -> Self {
        Self { inner }
    }

    pub fn raw(&self) -> &dyn RulesCatalog {
        self.inner.as_ref()
    }

    pub fn move_descriptor(&self, name: &str) -> Arc<MoveDescriptor> {
        match self.inner.lookup_move(name) {
            Ok(descriptor) => descriptor,
            Err(err) if normalize_name(name) == UNIVERSAL_MOVE => {
                debug!(error = %err, "catalog has no universal move; using built-in");
                Arc::new(MoveDescriptor::struggle())
            }
            Err(err) => {
                warn!(error = %err, "move lookup missed; treating as a no-effect status move");
                Arc::new(MoveDescriptor::inert(name))
            }
        }
    }

    pub fn ability_effect(&self, name: &str) -> AbilityEffect {
        match self.inner.lookup_ability(name) {
            Ok(descriptor) => descriptor.effect.clone(),
            Err(err) => {
                warn!(error = %err, "ability lookup missed; treating as no effect");
                AbilityEffect::None
            }
        }
    }

    pub fn item(&self, name: &str) -> Arc<ItemDescriptor> {
        match self.inner.lookup_item(name) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(error = %err, "item lookup missed; treating as no effect");
                Arc::new(ItemDescriptor::inert(name))
            }
        }
    }

    /// Effect of the ability the combatant currently has.
    pub fn active_ability(&self, combatant: &Combatant) -> AbilityEffect {
        self.ability_effect(&combatant.ability)
    }

    /// Effect of the combatant's held item, suppressed under Magic Room.
    pub fn held_item_effect(&self, combatant: &Combatant, field: &FieldState) -> ItemEffect {
        if field.is_active(GlobalEffect::MagicRoom) {
            return ItemEffect::None;
        }
        match &combatant.item {
            Some(item) => self.item(item).effect.clone(),
            None => ItemEffect::None,
        }
    }

    /// Max PP for a move, zero when uncapped or unknown.
    pub fn max_pp(&self, name: &str) -> u8 {
        self.inner.lookup_move(name).map(|m| m.max_pp).unwrap_or(0)
    }
}
