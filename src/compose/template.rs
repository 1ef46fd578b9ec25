//! Song templates: one slot per line, each either repeating an earlier line
//! or describing the line to look for.
//!
//! Templates are read from JSON. A template is an array of slots:
//!
//! ```json
//! [
//!   { "syllables": 4, "last": { "rhyme": "A" } },
//!   { "syllables": 8, "first": { "rhyme": "Q" }, "last": { "rhyme": "A" } },
//!   { "syllables": 9, "last": { "same_as": 1 } },
//!   { "repeat": 0 }
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::models::Position;

/// How the word at one line boundary is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WordRule {
    #[default]
    Any,
    /// Word comes from the pool assigned to this rhyme group.
    Rhyme(String),
    /// Word repeats the same boundary word of an earlier slot.
    SameAs(usize),
}

/// Everything a template says about one boundary word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WordSlotRepr", into = "WordSlotRepr")]
pub struct WordSlot {
    pub rule: WordRule,
    pub exclude: Vec<String>,
    pub include_only: Vec<String>,
    /// Required estimated syllable count of the word itself.
    pub syllables: Option<u32>,
}

impl WordSlot {
    pub fn rhyme(tag: &str) -> Self {
        Self {
            rule: WordRule::Rhyme(tag.to_string()),
            ..Self::default()
        }
    }

    pub fn same_as(slot: usize) -> Self {
        Self {
            rule: WordRule::SameAs(slot),
            ..Self::default()
        }
    }

    /// Rhyme group tag, if the rule is a rhyme.
    pub fn tag(&self) -> Option<&str> {
        match &self.rule {
            WordRule::Rhyme(tag) => Some(tag.as_str()),
            _ => None,
        }
    }
}

/// On-disk shape of a `WordSlot`; `rhyme` and `same_as` are exclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WordSlotRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rhyme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    same_as: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    include_only: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    syllables: Option<u32>,
}

impl TryFrom<WordSlotRepr> for WordSlot {
    type Error = String;

    fn try_from(repr: WordSlotRepr) -> Result<Self, Self::Error> {
        let rule = match (repr.rhyme, repr.same_as) {
            (Some(_), Some(_)) => {
                return Err("a word cannot both rhyme and repeat an earlier word".to_string())
            }
            (Some(tag), None) => WordRule::Rhyme(tag),
            (None, Some(slot)) => WordRule::SameAs(slot),
            (None, None) => WordRule::Any,
        };
        Ok(Self {
            rule,
            exclude: repr.exclude,
            include_only: repr.include_only,
            syllables: repr.syllables,
        })
    }
}

impl From<WordSlot> for WordSlotRepr {
    fn from(slot: WordSlot) -> Self {
        let (rhyme, same_as) = match slot.rule {
            WordRule::Any => (None, None),
            WordRule::Rhyme(tag) => (Some(tag), None),
            WordRule::SameAs(index) => (None, Some(index)),
        };
        Self {
            rhyme,
            same_as,
            exclude: slot.exclude,
            include_only: slot.include_only,
            syllables: slot.syllables,
        }
    }
}

/// A slot that is looked up in the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotSpec {
    /// Target syllable count of the whole line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syllables: Option<u32>,
    #[serde(default)]
    pub first: WordSlot,
    #[serde(default)]
    pub last: WordSlot,
}

impl SlotSpec {
    pub fn word(&self, position: Position) -> &WordSlot {
        match position {
            Position::First => &self.first,
            Position::Last => &self.last,
        }
    }
}

/// One line of a song template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LineSlotRepr", into = "LineSlotRepr")]
pub enum LineSlot {
    /// Reuse the line chosen for an earlier slot verbatim.
    Repeat { repeat: usize },
    Spec(SlotSpec),
}

/// JSON form of a slot. A repeat object carries nothing but `repeat`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LineSlotRepr {
    Repeat(RepeatRepr),
    Spec(SlotSpec),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepeatRepr {
    repeat: usize,
}

impl From<LineSlotRepr> for LineSlot {
    fn from(repr: LineSlotRepr) -> Self {
        match repr {
            LineSlotRepr::Repeat(RepeatRepr { repeat }) => Self::Repeat { repeat },
            LineSlotRepr::Spec(spec) => Self::Spec(spec),
        }
    }
}

impl From<LineSlot> for LineSlotRepr {
    fn from(slot: LineSlot) -> Self {
        match slot {
            LineSlot::Repeat { repeat } => Self::Repeat(RepeatRepr { repeat }),
            LineSlot::Spec(spec) => Self::Spec(spec),
        }
    }
}

/// Ordered slots making up a song.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongTemplate {
    pub slots: Vec<LineSlot>,
}

impl SongTemplate {
    pub fn new(slots: Vec<LineSlot>) -> Self {
        Self { slots }
    }

    /// Parse the JSON array form of a template. Structure only; call
    /// [`SongTemplate::validate`] before walking it.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reject templates no corpus could ever satisfy: no slots, references
    /// that do not point strictly backwards, or blank rhyme tags.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.slots.is_empty() {
            return Err(TemplateError::Empty);
        }

        for (slot, line_slot) in self.slots.iter().enumerate() {
            match line_slot {
                LineSlot::Repeat { repeat } => {
                    if *repeat >= slot {
                        return Err(TemplateError::ForwardReference {
                            slot,
                            target: *repeat,
                        });
                    }
                }
                LineSlot::Spec(spec) => {
                    for position in Position::ALL {
                        match &spec.word(position).rule {
                            WordRule::Rhyme(tag) if tag.trim().is_empty() => {
                                return Err(TemplateError::EmptyTag { slot });
                            }
                            WordRule::SameAs(target) if *target >= slot => {
                                return Err(TemplateError::ForwardReference {
                                    slot,
                                    target: *target,
                                });
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_slot_shape() {
        let template = SongTemplate::from_json(
            r#"[
                { "syllables": 4, "first": { "include_only": ["if"] }, "last": { "rhyme": "A" } },
                { "first": { "rhyme": "Q" }, "last": { "same_as": 0, "syllables": 1 } },
                { "repeat": 1 },
                {}
            ]"#,
        )
        .unwrap();

        assert_eq!(template.len(), 4);
        let LineSlot::Spec(first) = &template.slots[0] else {
            panic!("expected a lookup slot");
        };
        assert_eq!(first.syllables, Some(4));
        assert_eq!(first.first.include_only, vec!["if".to_string()]);
        assert_eq!(first.last.tag(), Some("A"));

        let LineSlot::Spec(second) = &template.slots[1] else {
            panic!("expected a lookup slot");
        };
        assert_eq!(second.first.rule, WordRule::Rhyme("Q".into()));
        assert_eq!(second.last.rule, WordRule::SameAs(0));
        assert_eq!(second.last.syllables, Some(1));

        assert_eq!(template.slots[2], LineSlot::Repeat { repeat: 1 });
        assert_eq!(template.slots[3], LineSlot::Spec(SlotSpec::default()));
        assert!(template.validate().is_ok());
    }

    #[test]
    fn rhyme_and_back_reference_are_exclusive() {
        let err = SongTemplate::from_json(r#"[{ "last": { "rhyme": "A", "same_as": 0 } }]"#);
        assert!(err.is_err());
    }

    #[test]
    fn repeat_slots_carry_nothing_else() {
        let mixed = SongTemplate::from_json(
            r#"[{ "last": { "rhyme": "A" } }, { "repeat": 0, "last": { "rhyme": "A" } }]"#,
        );
        assert!(mixed.is_err());

        let stray = SongTemplate::from_json(r#"[{}, { "repeat": 0, "syllables": 5 }]"#);
        assert!(stray.is_err());
    }

    #[test]
    fn serializes_back_to_the_same_shape() {
        let template = SongTemplate::new(vec![
            LineSlot::Spec(SlotSpec {
                syllables: Some(6),
                first: WordSlot::default(),
                last: WordSlot::rhyme("B"),
            }),
            LineSlot::Repeat { repeat: 0 },
        ]);
        let json = serde_json::to_string(&template).unwrap();
        assert_eq!(
            json,
            r#"[{"syllables":6,"first":{},"last":{"rhyme":"B"}},{"repeat":0}]"#
        );
    }

    #[test]
    fn validation_catches_unwalkable_templates() {
        assert_eq!(SongTemplate::default().validate(), Err(TemplateError::Empty));

        let forward = SongTemplate::new(vec![LineSlot::Repeat { repeat: 0 }]);
        assert_eq!(
            forward.validate(),
            Err(TemplateError::ForwardReference { slot: 0, target: 0 })
        );

        let word_forward = SongTemplate::new(vec![
            LineSlot::Spec(SlotSpec::default()),
            LineSlot::Spec(SlotSpec {
                first: WordSlot::same_as(2),
                ..SlotSpec::default()
            }),
        ]);
        assert_eq!(
            word_forward.validate(),
            Err(TemplateError::ForwardReference { slot: 1, target: 2 })
        );

        let blank = SongTemplate::new(vec![LineSlot::Spec(SlotSpec {
            last: WordSlot::rhyme(" "),
            ..SlotSpec::default()
        })]);
        assert_eq!(blank.validate(), Err(TemplateError::EmptyTag { slot: 0 }));
    }
}
