//! Item kind identity (spec §3 "Item kind").

use std::fmt;

/// The canonical identity of an item stack's contents, ignoring count.
///
/// `nbt_hash` only participates in equality when `nbt_sensitive` is
/// set on *both* sides being compared; [`ItemKind::new`] normalizes
/// this at construction time (zeroing the hash when the flag is
/// unset) so a plain `#[derive(PartialEq, Eq, Hash)]` already gives
/// the spec's "two items with different NBT collapse to the same kind
/// if the NBT flag is absent on both" rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKind {
    pub namespace: String,
    pub item_id: String,
    pub metadata: u16,
    pub nbt_sensitive: bool,
    nbt_hash: Option<u64>,
}

impl ItemKind {
    /// Builds a kind, normalizing `nbt_hash` to `None` when the stack
    /// isn't NBT-sensitive.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        item_id: impl Into<String>,
        metadata: u16,
        nbt_sensitive: bool,
        nbt_hash: Option<u64>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            item_id: item_id.into(),
            metadata,
            nbt_sensitive,
            nbt_hash: if nbt_sensitive { nbt_hash } else { None },
        }
    }

    /// The canonical string key used on the wire and in config files,
    /// e.g. `minecraft:torch#0` or `minecraft:potion#0n1234abcd` for an
    /// NBT-sensitive kind.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        match self.nbt_hash {
            Some(hash) => format!(
                "{}:{}#{}n{hash:x}",
                self.namespace, self.item_id, self.metadata
            ),
            None => format!("{}:{}#{}", self.namespace, self.item_id, self.metadata),
        }
    }

    /// Parses the inverse of [`Self::canonical_key`]: `ns:id#meta` or
    /// `ns:id#metanHASH`. Used by the recipe-file and routing-config
    /// loaders, which reference items by this wire/text form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (namespace, rest) = s.split_once(':')?;
        let (item_id, suffix) = rest.split_once('#')?;
        let (metadata_str, hash_str) = match suffix.find('n') {
            Some(i) => (&suffix[..i], Some(&suffix[i + 1..])),
            None => (suffix, None),
        };
        let metadata: u16 = metadata_str.parse().ok()?;
        let nbt_hash = match hash_str {
            Some(h) => Some(u64::from_str_radix(h, 16).ok()?),
            None => None,
        };
        Some(Self::new(namespace, item_id, metadata, nbt_hash.is_some(), nbt_hash))
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_key())
    }
}

/// Static attributes of a kind, looked up once and cached alongside
/// index entries (spec §3 "label and max stack size").
#[derive(Debug, Clone)]
pub struct ItemAttributes {
    pub max_stack_size: u32,
    pub label: String,
    pub max_damage: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_nbt_sensitive_kinds_with_different_hashes_collapse() {
        let a = ItemKind::new("minecraft", "torch", 0, false, Some(1));
        let b = ItemKind::new("minecraft", "torch", 0, false, Some(2));
        assert_eq!(a, b);
    }

    #[test]
    fn nbt_sensitive_kinds_with_different_hashes_differ() {
        let a = ItemKind::new("minecraft", "potion", 0, true, Some(1));
        let b = ItemKind::new("minecraft", "potion", 0, true, Some(2));
        assert_ne!(a, b);
    }

    #[test]
    fn canonical_key_round_trips_through_display() {
        let kind = ItemKind::new("minecraft", "stick", 0, false, None);
        assert_eq!(kind.to_string(), "minecraft:stick#0");
    }

    #[test]
    fn parse_round_trips_canonical_key_with_and_without_nbt_hash() {
        let plain = ItemKind::new("minecraft", "stick", 0, false, None);
        assert_eq!(ItemKind::parse(&plain.canonical_key()), Some(plain));

        let nbt = ItemKind::new("minecraft", "potion", 0, true, Some(0x1234abcd));
        assert_eq!(ItemKind::parse(&nbt.canonical_key()), Some(nbt));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(ItemKind::parse("not-a-kind"), None);
        assert_eq!(ItemKind::parse("minecraft:stick"), None);
    }
}
