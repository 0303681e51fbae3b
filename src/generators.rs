//! The effect-generator bank contract: looks up a `(category, effect
//! name)` pair to an [`EffectGenerator`] plus its config-merge rules
//! (§6 "Generator bank contract"). Concrete presets (the actual
//! `~fade-in`, `~pulse`, ... families) are out of scope here — only the
//! lookup and merge contract a consumer's bank must satisfy.

use std::collections::HashMap;

use crate::clip::{ClipModifiers, EffectGenerator};
use crate::error::{Location, Result, StagehandError};

/// When a bank entry's generator is invoked, given [`ComputeNow`]
/// semantics already govern per-direction caching (§4.2); this governs
/// whether the *author-facing* config merge itself is redone on every
/// play or reused after the first (§6 `effectCompositionFrequency`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionFrequency {
    /// Merge config once, at first play, and reuse it after.
    OnFirstPlayOnly,
    /// Re-merge config on every play.
    EveryPlay,
}

/// A patch applied on top of a clip's modifiers during config merge
/// (§6 "Generator bank contract" — `config`/`immutableConfig`/`defaultConfig`).
#[derive(Debug, Clone, Default)]
pub struct ClipConfigPatch {
    /// Overrides `commits_styles` if set.
    pub commits_styles: Option<bool>,
    /// Overrides `commit_styles_forcefully` if set.
    pub commit_styles_forcefully: Option<bool>,
}

impl ClipConfigPatch {
    fn apply_to(&self, modifiers: &mut ClipModifiers) {
        if let Some(v) = self.commits_styles {
            modifiers.commits_styles = v;
        }
        if let Some(v) = self.commit_styles_forcefully {
            modifiers.commit_styles_forcefully = v;
        }
    }
}

/// One bank entry: the generator itself plus the three config layers it
/// may supply (§6).
pub struct GeneratorEntry {
    /// The effect generator, in one of the four supported shapes.
    pub generator: EffectGenerator,
    /// Applied after the clip-class defaults and the bank's
    /// `defaultConfig`, before the author's own config.
    pub config: Option<ClipConfigPatch>,
    /// Applied before everything else, beneath the clip class's own defaults.
    pub default_config: Option<ClipConfigPatch>,
    /// Applied last, after the author's own config, and cannot be
    /// overridden by it.
    pub immutable_config: Option<ClipConfigPatch>,
    /// Whether this entry's config merge is redone on every play.
    pub composition_frequency: CompositionFrequency,
}

impl std::fmt::Debug for GeneratorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorEntry")
            .field("generator", &self.generator)
            .field("composition_frequency", &self.composition_frequency)
            .finish_non_exhaustive()
    }
}

/// The external generator-bank contract (§6, consumed not rendered):
/// resolves an effect name, scoped to a clip category, to a
/// [`GeneratorEntry`].
pub trait EffectBank: std::fmt::Debug {
    /// Looks up the entry for `(category_name, effect_name)`.
    fn lookup(&self, category_name: &'static str, effect_name: &str) -> Option<&GeneratorEntry>;
}

/// A simple `HashMap`-backed [`EffectBank`] keyed by
/// `(category_name, effect_name)`.
#[derive(Debug, Default)]
pub struct StaticEffectBank {
    entries: HashMap<(&'static str, String), GeneratorEntry>,
}

impl StaticEffectBank {
    /// Builds an empty bank.
    pub fn new() -> Self {
        StaticEffectBank { entries: HashMap::new() }
    }

    /// Registers (or replaces) the entry for `(category_name, effect_name)`.
    pub fn register(&mut self, category_name: &'static str, effect_name: impl Into<String>, entry: GeneratorEntry) {
        self.entries.insert((category_name, effect_name.into()), entry);
    }
}

impl EffectBank for StaticEffectBank {
    fn lookup(&self, category_name: &'static str, effect_name: &str) -> Option<&GeneratorEntry> {
        self.entries.get(&(category_name, effect_name.to_string()))
    }
}

/// Merges a bank entry's config layers onto `base` in the precedence
/// order from §6: clip-class defaults (already baked into `base`) ←
/// bank `defaultConfig` ← bank `config` ← author config ← bank
/// `immutableConfig` (applied last, so it always wins).
pub fn merge_config(base: ClipModifiers, entry: &GeneratorEntry, author: Option<&ClipConfigPatch>) -> ClipModifiers {
    let mut modifiers = base;
    if let Some(patch) = &entry.default_config {
        patch.apply_to(&mut modifiers);
    }
    if let Some(patch) = &entry.config {
        patch.apply_to(&mut modifiers);
    }
    if let Some(patch) = author {
        patch.apply_to(&mut modifiers);
    }
    if let Some(patch) = &entry.immutable_config {
        patch.apply_to(&mut modifiers);
    }
    modifiers
}

/// Resolves `(category_name, effect_name)` against `bank`, raising
/// [`StagehandError::UnknownEffect`] if the bank has no entry (§7).
pub fn resolve<'a>(bank: &'a dyn EffectBank, category_name: &'static str, effect_name: &str) -> Result<&'a GeneratorEntry> {
    bank.lookup(category_name, effect_name).ok_or_else(|| StagehandError::UnknownEffect {
        reason: format!("no generator registered for {category_name} effect \"{effect_name}\""),
        location: Location::default(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::rc::Rc;

    fn generator() -> EffectGenerator {
        EffectGenerator::Keyframes(Rc::new(|_args| (vec![], None)))
    }

    #[test]
    fn unregistered_effect_is_unknown() {
        let bank = StaticEffectBank::new();
        let result = resolve(&bank, "Emphasis", "~pulse");
        assert!(matches!(result, Err(StagehandError::UnknownEffect { .. })));
    }

    #[test]
    fn registered_effect_resolves() {
        let mut bank = StaticEffectBank::new();
        bank.register(
            "Emphasis",
            "~pulse",
            GeneratorEntry {
                generator: generator(),
                config: None,
                default_config: None,
                immutable_config: None,
                composition_frequency: CompositionFrequency::OnFirstPlayOnly,
            },
        );
        assert!(resolve(&bank, "Emphasis", "~pulse").is_ok());
    }

    #[test]
    fn immutable_config_overrides_author_config() {
        let entry = GeneratorEntry {
            generator: generator(),
            config: None,
            default_config: Some(ClipConfigPatch { commits_styles: Some(false), commit_styles_forcefully: None }),
            immutable_config: Some(ClipConfigPatch { commits_styles: Some(true), commit_styles_forcefully: None }),
            composition_frequency: CompositionFrequency::EveryPlay,
        };
        let author = ClipConfigPatch { commits_styles: Some(false), commit_styles_forcefully: None };

        let merged = merge_config(ClipModifiers::default(), &entry, Some(&author));
        assert!(merged.commits_styles, "immutable_config must win over author config");
    }

    #[test]
    fn default_config_applies_beneath_author_config() {
        let entry = GeneratorEntry {
            generator: generator(),
            config: None,
            default_config: Some(ClipConfigPatch { commits_styles: Some(true), commit_styles_forcefully: None }),
            immutable_config: None,
            composition_frequency: CompositionFrequency::OnFirstPlayOnly,
        };
        let author = ClipConfigPatch { commits_styles: Some(false), commit_styles_forcefully: None };

        let merged = merge_config(ClipModifiers::default(), &entry, Some(&author));
        assert!(!merged.commits_styles, "author config must win over defaultConfig");
    }
}
