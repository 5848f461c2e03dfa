use crate::value::MValue;
use rustc_hash::FxHasher;
use smol_str::SmolStr;
use std::collections::HashSet;
use std::hash::BuildHasherDefault;

pub type FastMap<K, V> = std::collections::HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FastHashSet<T> = HashSet<T, BuildHasherDefault<FxHasher>>;

/// Name → value projection of a record's arguments.
pub type FieldMap = FastMap<SmolStr, MValue>;
