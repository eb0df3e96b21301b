use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

/// Trait for defining how to merge concurrent updates for a specific field.
pub trait Reducer<T>: Send + Sync {
    fn reduce(&self, current: T, update: T) -> T;
}

/// Reducer that overwrites the current value with the update (Last-Write-Wins).
pub struct Replace;
impl<T> Reducer<T> for Replace {
    fn reduce(&self, _current: T, update: T) -> T {
        update
    }
}

/// Reducer that appends the update to the current value (for Vec<T>).
pub struct Append;
impl<T> Reducer<Vec<T>> for Append {
    fn reduce(&self, mut current: Vec<T>, mut update: Vec<T>) -> Vec<T> {
        current.append(&mut update);
        current
    }
}

/// Top-level dictionary union. Keys in the update override existing keys;
/// nested values are replaced, never merged recursively.
pub struct ShallowMerge;
impl<K: Eq + Hash, V> Reducer<HashMap<K, V>> for ShallowMerge {
    fn reduce(&self, mut current: HashMap<K, V>, update: HashMap<K, V>) -> HashMap<K, V> {
        current.extend(update);
        current
    }
}

impl<K: Ord, V> Reducer<BTreeMap<K, V>> for ShallowMerge {
    fn reduce(&self, mut current: BTreeMap<K, V>, update: BTreeMap<K, V>) -> BTreeMap<K, V> {
        current.extend(update);
        current
    }
}

/// Reducer that computes the union of the current and update sets (for HashSet<T>).
pub struct Union;
impl<T: Eq + Hash> Reducer<HashSet<T>> for Union {
    fn reduce(&self, mut current: HashSet<T>, update: HashSet<T>) -> HashSet<T> {
        current.extend(update);
        current
    }
}

/// Merge policy declared for one state key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReducerKind {
    Replace,
    Append,
    ShallowMerge,
    Union,
}

/// One declared key of a state schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub reducer: ReducerKind,
}

pub trait StateSchema:
    Serialize + DeserializeOwned + Clone + Default + Send + Sync + std::fmt::Debug + 'static
{
    type Update: Serialize + DeserializeOwned + Clone + Default + Send + Sync + std::fmt::Debug + 'static;

    fn apply(current: &Self, update: Self::Update) -> Self;

    /// Declared keys and their reducers. Empty for hand-written schemas.
    fn fields() -> &'static [FieldSpec] {
        &[]
    }

    /// Keys without a declared reducer fall back to `Replace`.
    fn reducer_for(key: &str) -> ReducerKind {
        Self::fields()
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.reducer)
            .unwrap_or(ReducerKind::Replace)
    }

    /// Keys written by a partial update. Hand-written schemas that do not
    /// track this report none.
    fn update_keys(_update: &Self::Update) -> Vec<&'static str> {
        Vec::new()
    }

    /// Human-readable representation for tracing/debugging.
    /// Override for custom formatting; default uses JSON serialization.
    fn trace_repr(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "<unserializable>".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound = "S: StateSchema")]
pub struct GraphState<S: StateSchema> {
    pub data: S,
}

impl<S: StateSchema> GraphState<S> {
    pub fn new(data: S) -> Self {
        Self { data }
    }

    pub fn apply_update(self, update: StateUpdate<S>) -> Self {
        Self {
            data: S::apply(&self.data, update.data),
        }
    }

    pub fn apply(self, update: StateUpdate<S>) -> Self {
        self.apply_update(update)
    }
}

impl<S: StateSchema> Default for GraphState<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "S: StateSchema")]
pub struct StateUpdate<S: StateSchema> {
    pub data: S::Update,
}

impl<S: StateSchema> StateUpdate<S> {
    pub fn new(data: S::Update) -> Self {
        Self { data }
    }

    /// An update that writes no key.
    pub fn empty() -> Self {
        Self {
            data: S::Update::default(),
        }
    }

    pub fn keys(&self) -> Vec<&'static str> {
        S::update_keys(&self.data)
    }
}

impl<S: StateSchema> Default for StateUpdate<S> {
    fn default() -> Self {
        Self::empty()
    }
}
