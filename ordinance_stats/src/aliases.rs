use std::collections::HashMap;

use log::debug;

/// Maps a canonical jurisdiction name to the historical names it replaced.
///
/// A province that was renamed (for example on becoming a special autonomous
/// province) keeps its old records under the old label. Filtering on the
/// canonical name goes through [`AliasRegistry::resolve_names`] so the history
/// is not split across two labels.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AliasRegistry {
    aliases: HashMap<String, Vec<String>>,
}

impl AliasRegistry {
    pub fn new() -> AliasRegistry {
        AliasRegistry::default()
    }

    /// The registry for Korean provinces renamed into special autonomous provinces.
    pub fn builtin() -> AliasRegistry {
        AliasRegistry::new()
            .with_alias("강원특별자치도", "강원도")
            .with_alias("제주특별자치도", "제주도")
    }

    pub fn with_alias(mut self, canonical: &str, alias: &str) -> AliasRegistry {
        let e = self.aliases.entry(canonical.to_string()).or_default();
        if alias != canonical && !e.iter().any(|a| a == alias) {
            e.push(alias.to_string());
        }
        self
    }

    /// The canonical name followed by its aliases, in registration order.
    pub fn resolve_names(&self, canonical: &str) -> Vec<String> {
        let mut res = vec![canonical.to_string()];
        if let Some(aliases) = self.aliases.get(canonical) {
            res.extend(aliases.iter().cloned());
        }
        debug!("resolve_names: {:?} -> {:?}", canonical, res);
        res
    }

    /// The canonical name a label is grouped under. Unknown labels are their own canonical name.
    pub fn canonical_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a == name))
            .map(|(canonical, _)| canonical.as_str())
            .unwrap_or(name)
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_canonical_and_aliases() {
        let reg = AliasRegistry::builtin();
        assert_eq!(
            reg.resolve_names("강원특별자치도"),
            vec!["강원특별자치도".to_string(), "강원도".to_string()]
        );
    }

    #[test]
    fn unknown_name_resolves_to_itself() {
        let reg = AliasRegistry::builtin();
        assert_eq!(reg.resolve_names("서울특별시"), vec!["서울특별시".to_string()]);
        assert_eq!(reg.canonical_of("서울특별시"), "서울특별시");
    }

    #[test]
    fn alias_maps_back_to_canonical() {
        let reg = AliasRegistry::new()
            .with_alias("North", "Old North")
            .with_alias("North", "Older North")
            .with_alias("North", "Old North");
        assert_eq!(reg.canonical_of("Older North"), "North");
        assert_eq!(reg.resolve_names("North").len(), 3);
    }
}
