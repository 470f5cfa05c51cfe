//! Dense, total policy table.

use serde::{Deserialize, Serialize};
use tracing::debug;

use audiofocus_ipc::{AudioScene, StreamDescriptor, VolumeType};

use crate::error::PolicyError;
use crate::outcome::Outcome;
use crate::rules::{built_in_rules, PolicyRule};

const VOLUME_TYPES: usize = 4;
const SCENES: usize = 4;
const TABLE_SIZE: usize = VOLUME_TYPES * VOLUME_TYPES * SCENES;

/// Lookup key of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyKey {
    /// Volume type of the requesting stream.
    pub incoming: VolumeType,

    /// Volume type of the active stream.
    pub active: VolumeType,

    /// Current scene.
    pub scene: AudioScene,
}

impl PolicyKey {
    /// Every key of the table.
    pub fn all() -> impl Iterator<Item = PolicyKey> {
        VolumeType::ALL.iter().flat_map(|&incoming| {
            VolumeType::ALL.iter().flat_map(move |&active| {
                AudioScene::ALL.iter().map(move |&scene| PolicyKey {
                    incoming,
                    active,
                    scene,
                })
            })
        })
    }

    fn index(self) -> usize {
        (volume_index(self.incoming) * VOLUME_TYPES + volume_index(self.active)) * SCENES
            + scene_index(self.scene)
    }
}

fn volume_index(volume_type: VolumeType) -> usize {
    match volume_type {
        VolumeType::Ringtone => 0,
        VolumeType::Media => 1,
        VolumeType::VoiceCall => 2,
        VolumeType::VoiceAssistant => 3,
    }
}

fn scene_index(scene: AudioScene) -> usize {
    match scene {
        AudioScene::Default => 0,
        AudioScene::Ringing => 1,
        AudioScene::PhoneCall => 2,
        AudioScene::VoiceChat => 3,
    }
}

/// Where a table entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A rule limited to the key's scene.
    SceneRule,

    /// A rule applying to every scene.
    AnySceneRule,

    /// The declared fallback.
    Fallback,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    outcome: Outcome,
    resolution: Resolution,
}

/// Policy table mapping `(incoming, active, scene)` to an outcome.
///
/// Every key has an entry; a table cannot be constructed otherwise.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: Vec<Entry>,
}

impl PolicyTable {
    /// The built-in rule set with the ALLOW/SHARE fallback.
    pub fn built_in() -> Self {
        Self::with_fallback(&built_in_rules(), Outcome::ALLOW_SHARE)
    }

    /// Build from rules; keys no rule covers resolve to `fallback`.
    ///
    /// Later rules override earlier ones with the same key.
    pub fn with_fallback(rules: &[PolicyRule], fallback: Outcome) -> Self {
        let entries = PolicyKey::all()
            .map(|key| {
                resolve(rules, key).unwrap_or(Entry {
                    outcome: fallback,
                    resolution: Resolution::Fallback,
                })
            })
            .collect::<Vec<_>>();

        let fallbacks = entries
            .iter()
            .filter(|e| e.resolution == Resolution::Fallback)
            .count();
        debug!(rules = rules.len(), fallbacks, "Policy table built");

        Self { entries }
    }

    /// Build from rules that must cover every key on their own.
    pub fn strict(rules: &[PolicyRule]) -> Result<Self, PolicyError> {
        let mut entries = Vec::with_capacity(TABLE_SIZE);

        for key in PolicyKey::all() {
            let entry = resolve(rules, key).ok_or(PolicyError::PolicyGap {
                incoming: key.incoming,
                active: key.active,
                scene: key.scene,
            })?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Decide the outcome of `requesting` competing with `active` in `scene`.
    pub fn decide(
        &self,
        requesting: &StreamDescriptor,
        active: &StreamDescriptor,
        scene: AudioScene,
    ) -> Outcome {
        self.lookup(PolicyKey {
            incoming: requesting.volume_type,
            active: active.volume_type,
            scene,
        })
        .0
    }

    /// Outcome and provenance for a key.
    pub fn lookup(&self, key: PolicyKey) -> (Outcome, Resolution) {
        let entry = self.entries[key.index()];
        (entry.outcome, entry.resolution)
    }

    /// Iterate every key with its outcome.
    pub fn iter(&self) -> impl Iterator<Item = (PolicyKey, Outcome, Resolution)> + '_ {
        PolicyKey::all().map(move |key| {
            let (outcome, resolution) = self.lookup(key);
            (key, outcome, resolution)
        })
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::built_in()
    }
}

fn resolve(rules: &[PolicyRule], key: PolicyKey) -> Option<Entry> {
    let matching = |scene: Option<AudioScene>| {
        rules
            .iter()
            .rev()
            .find(|r| r.incoming == key.incoming && r.active == key.active && r.scene == scene)
    };

    if let Some(rule) = matching(Some(key.scene)) {
        return Some(Entry {
            outcome: rule.outcome,
            resolution: Resolution::SceneRule,
        });
    }

    matching(None).map(|rule| Entry {
        outcome: rule.outcome,
        resolution: Resolution::AnySceneRule,
    })
}

fn default_fallback() -> Option<Outcome> {
    Some(Outcome::ALLOW_SHARE)
}

fn default_extend() -> bool {
    true
}

/// Serializable policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Apply `rules` on top of the built-in rules instead of replacing them.
    #[serde(default = "default_extend")]
    pub extend_built_in: bool,

    /// Additional or overriding rules.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,

    /// Outcome for uncovered keys; `null` requires a total rule set.
    #[serde(default = "default_fallback")]
    pub fallback: Option<Outcome>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            extend_built_in: true,
            rules: Vec::new(),
            fallback: default_fallback(),
        }
    }
}

impl PolicyConfig {
    /// Build the table this configuration describes.
    pub fn build(&self) -> Result<PolicyTable, PolicyError> {
        check_conflicts(&self.rules)?;

        let mut rules = if self.extend_built_in {
            built_in_rules()
        } else {
            Vec::new()
        };
        rules.extend(self.rules.iter().copied());

        match self.fallback {
            Some(fallback) => Ok(PolicyTable::with_fallback(&rules, fallback)),
            None => PolicyTable::strict(&rules),
        }
    }
}

fn check_conflicts(rules: &[PolicyRule]) -> Result<(), PolicyError> {
    for (i, a) in rules.iter().enumerate() {
        let conflict = rules[i + 1..].iter().any(|b| {
            a.incoming == b.incoming
                && a.active == b.active
                && a.scene == b.scene
                && a.outcome != b.outcome
        });

        if conflict {
            return Err(PolicyError::ConflictingRules {
                incoming: a.incoming,
                active: a.active,
                scene: a.scene,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{ActionTarget, Treatment};
    use audiofocus_ipc::{ContentType, InterruptForceType, StreamUsage};

    fn descriptor(volume_type: VolumeType) -> StreamDescriptor {
        let (usage, content_type) = match volume_type {
            VolumeType::Media => (StreamUsage::Media, ContentType::Music),
            VolumeType::VoiceCall => (StreamUsage::VoiceCommunication, ContentType::Speech),
            VolumeType::Ringtone => (StreamUsage::NotificationRingtone, ContentType::Ringtone),
            VolumeType::VoiceAssistant => (StreamUsage::VoiceAssistant, ContentType::Speech),
        };
        StreamDescriptor::new(usage, content_type, volume_type)
    }

    #[test]
    fn test_key_indices_are_a_bijection() {
        let mut seen = vec![false; TABLE_SIZE];
        for key in PolicyKey::all() {
            assert!(!seen[key.index()], "duplicate index for {:?}", key);
            seen[key.index()] = true;
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn test_built_in_table_is_total_with_explicit_fallback() {
        let table = PolicyTable::built_in();
        assert_eq!(table.iter().count(), TABLE_SIZE);

        for (key, outcome, resolution) in table.iter() {
            if resolution == Resolution::Fallback {
                assert_eq!(outcome, Outcome::ALLOW_SHARE, "fallback for {:?}", key);
            }
        }
    }

    #[test]
    fn test_built_in_rules_cover_every_pair_without_fallback() {
        // Without a fallback every key must be reachable through a rule
        let table = PolicyTable::strict(&built_in_rules()).unwrap();
        for (key, _, resolution) in table.iter() {
            assert_ne!(resolution, Resolution::Fallback, "{:?}", key);
        }
    }

    #[test]
    fn test_fixed_rules() {
        let table = PolicyTable::built_in();
        let media = descriptor(VolumeType::Media);
        let call = descriptor(VolumeType::VoiceCall);
        let ring = descriptor(VolumeType::Ringtone);

        assert_eq!(
            table.decide(&call, &media, AudioScene::Default),
            Outcome::on_active(Treatment::Pause, InterruptForceType::Force)
        );
        assert_eq!(
            table.decide(&ring, &media, AudioScene::Ringing),
            Outcome::on_active(Treatment::Duck, InterruptForceType::Force)
        );
        assert_eq!(
            table.decide(&media, &media, AudioScene::Default),
            Outcome::ALLOW_SHARE
        );

        let media_vs_call = table.decide(&media, &call, AudioScene::Default);
        assert_eq!(media_vs_call.treatment, Treatment::Pause);
        assert_eq!(media_vs_call.target, ActionTarget::Incoming);
        assert!(media_vs_call.is_forced());
    }

    #[test]
    fn test_scene_rule_overrides_any_scene_rule() {
        let table = PolicyTable::built_in();
        let key = |scene| PolicyKey {
            incoming: VolumeType::Ringtone,
            active: VolumeType::Media,
            scene,
        };

        let (default_outcome, default_resolution) = table.lookup(key(AudioScene::Default));
        assert_eq!(default_resolution, Resolution::AnySceneRule);
        assert_eq!(default_outcome.force_type, InterruptForceType::Share);

        let (ringing_outcome, ringing_resolution) = table.lookup(key(AudioScene::Ringing));
        assert_eq!(ringing_resolution, Resolution::SceneRule);
        assert_eq!(ringing_outcome.force_type, InterruptForceType::Force);
    }

    #[test]
    fn test_decide_is_deterministic() {
        let a = PolicyTable::built_in();
        let b = PolicyTable::built_in();

        for key in PolicyKey::all() {
            let incoming = descriptor(key.incoming);
            let active = descriptor(key.active);
            let first = a.decide(&incoming, &active, key.scene);
            assert_eq!(first, a.decide(&incoming, &active, key.scene));
            assert_eq!(first, b.decide(&incoming, &active, key.scene));
        }
    }

    #[test]
    fn test_strict_reports_policy_gap() {
        let rules = vec![PolicyRule::any_scene(
            VolumeType::Media,
            VolumeType::Media,
            Outcome::ALLOW_SHARE,
        )];

        let err = PolicyTable::strict(&rules).unwrap_err();
        assert!(matches!(err, PolicyError::PolicyGap { .. }));
    }

    #[test]
    fn test_config_overrides_built_in_rule() {
        let json = r#"{
            "rules": [
                {"incoming": "media", "active": "media",
                 "outcome": {"treatment": "pause", "force_type": "force"}}
            ]
        }"#;
        let config: PolicyConfig = serde_json::from_str(json).unwrap();
        let table = config.build().unwrap();

        let media = descriptor(VolumeType::Media);
        assert_eq!(
            table.decide(&media, &media, AudioScene::VoiceChat),
            Outcome::on_active(Treatment::Pause, InterruptForceType::Force)
        );
    }

    #[test]
    fn test_config_without_fallback_must_be_total() {
        let json = r#"{"extend_built_in": false, "fallback": null, "rules": []}"#;
        let config: PolicyConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.build(), Err(PolicyError::PolicyGap { .. })));
    }

    #[test]
    fn test_config_rejects_conflicting_rules() {
        let config = PolicyConfig {
            rules: vec![
                PolicyRule::any_scene(VolumeType::Media, VolumeType::Media, Outcome::ALLOW_SHARE),
                PolicyRule::any_scene(
                    VolumeType::Media,
                    VolumeType::Media,
                    Outcome::on_active(Treatment::Stop, InterruptForceType::Force),
                ),
            ],
            ..PolicyConfig::default()
        };

        assert!(matches!(
            config.build(),
            Err(PolicyError::ConflictingRules { .. })
        ));
    }
}
