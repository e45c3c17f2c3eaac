use indexmap::IndexMap;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a recorded trial. Backends emit these as strings or numbers.
pub type TrialId = String;
/// Identifier of a single function activation within a trial.
pub type ActivationId = String;
/// Node index, unique within a trial dataset.
pub type NodeIndex = i64;

// ────────────────────────────────────────────────────────────────────────────
// TrialGraphData – the dataset handed over by the host
// ────────────────────────────────────────────────────────────────────────────

/// A complete trial (or trial diff) dataset: hierarchy, edges and the
/// per-trial duration bounds used for coloring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialGraphData {
    #[serde(default)]
    pub root: Option<TrialNodeData>,
    #[serde(default)]
    pub edges: Vec<TrialEdgeData>,
    #[serde(default)]
    pub min_duration: IndexMap<TrialId, f64>,
    #[serde(default)]
    pub max_duration: IndexMap<TrialId, f64>,
    #[serde(default)]
    pub colors: IndexMap<TrialId, ColorClass>,
}

impl TrialGraphData {
    /// Parse a dataset from its JSON representation.
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let data: TrialGraphData = serde_json::from_str(text)?;
        Ok(data)
    }

    /// Load a dataset from a JSON file.
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Open {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Trial ids in the order they first appear in the dataset.
    pub fn trial_ids(&self) -> Vec<TrialId> {
        let mut out: Vec<TrialId> = Vec::new();
        let mut push = |t: &TrialId| {
            if !out.contains(t) {
                out.push(t.clone());
            }
        };
        if let Some(root) = &self.root {
            for t in &root.trial_ids {
                push(t);
            }
        }
        for t in self.min_duration.keys() {
            push(t);
        }
        for t in self.colors.keys() {
            push(t);
        }
        out
    }

    /// The pair shown when no trials are named: the first two trials, or the
    /// first one twice when the dataset holds a single trial.
    pub fn default_trials(&self) -> Option<(TrialId, TrialId)> {
        let mut ids = self.trial_ids().into_iter();
        let t1 = ids.next()?;
        let t2 = ids.next().unwrap_or_else(|| t1.clone());
        Some((t1, t2))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Nodes
// ────────────────────────────────────────────────────────────────────────────

/// One function activation group in the trial tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialNodeData {
    pub index: NodeIndex,
    /// Display label. May contain a `<br>` separating a bold header line.
    pub name: String,
    /// Duration in nanoseconds per trial.
    #[serde(default)]
    pub duration: IndexMap<TrialId, f64>,
    #[serde(default, deserialize_with = "de_id_list")]
    pub trial_ids: Vec<TrialId>,
    #[serde(default, deserialize_with = "de_activation_map")]
    pub activations: IndexMap<TrialId, Vec<ActivationId>>,
    /// Pre-rendered HTML tooltip per trial.
    #[serde(default)]
    pub tooltip: IndexMap<TrialId, String>,
    #[serde(default)]
    pub parent_index: Option<NodeIndex>,
    #[serde(default)]
    pub children_index: i64,
    #[serde(default, deserialize_with = "de_children")]
    pub children: Vec<TrialNodeData>,
}

impl TrialNodeData {
    /// Convenience constructor for a single-trial node without children.
    pub fn new(index: NodeIndex, name: impl Into<String>, trial: impl Into<TrialId>) -> Self {
        Self {
            index,
            name: name.into(),
            duration: IndexMap::new(),
            trial_ids: vec![trial.into()],
            activations: IndexMap::new(),
            tooltip: IndexMap::new(),
            parent_index: None,
            children_index: 0,
            children: Vec::new(),
        }
    }

    /// The trial this node is colored and classified by.
    pub fn primary_trial(&self) -> Option<&TrialId> {
        self.trial_ids.first()
    }

    /// Split the display name into a bold header and a second line when the
    /// name embeds a `<br>` marker.
    pub fn name_lines(&self) -> Option<(&str, &str)> {
        let mut parts = self.name.split("<br>");
        let first = parts.next()?;
        let second = parts.next()?;
        Some((first, second))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Edges
// ────────────────────────────────────────────────────────────────────────────

/// Relationship drawn between two activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Synthetic entry edge into the root.
    Initial,
    Call,
    Return,
    Sequence,
    /// Any other relationship emitted by the backend.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialEdgeData {
    pub source: NodeIndex,
    pub target: NodeIndex,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Occurrence count per trial.
    #[serde(default)]
    pub count: IndexMap<TrialId, u64>,
}

impl TrialEdgeData {
    /// Edge id used to match edges across render passes.
    pub fn id(&self) -> String {
        format!("{}-{}", self.source, self.target)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Color classes
// ────────────────────────────────────────────────────────────────────────────

/// Trial membership class of a node in a diff view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ColorClass {
    /// Shared by both trials (or single-trial view).
    #[default]
    Neutral,
    /// Present only in the first trial.
    First,
    /// Present only in the second trial.
    Second,
}

impl From<u8> for ColorClass {
    fn from(v: u8) -> Self {
        match v {
            1 => ColorClass::First,
            2 => ColorClass::Second,
            _ => ColorClass::Neutral,
        }
    }
}

impl From<ColorClass> for u8 {
    fn from(c: ColorClass) -> Self {
        match c {
            ColorClass::Neutral => 0,
            ColorClass::First => 1,
            ColorClass::Second => 2,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Activation details (tooltip cache entries)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationData {
    #[serde(deserialize_with = "de_id")]
    pub id: ActivationId,
    pub name: String,
    /// Content hash of the source file; empty when there is none.
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub line: i64,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub finish: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub return_value: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient id deserialization
// ────────────────────────────────────────────────────────────────────────────

/// Accepts a JSON string or number and yields its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Id(String);

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct IdVisitor;
        impl<'de> Visitor<'de> for IdVisitor {
            type Value = Id;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or number id")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
                Ok(Id(v.to_string()))
            }
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Id, E> {
                Ok(Id(v.to_string()))
            }
            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Id, E> {
                Ok(Id(v.to_string()))
            }
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Id, E> {
                Ok(Id(v.to_string()))
            }
        }
        d.deserialize_any(IdVisitor)
    }
}

/// Accepts a single id or a list of ids.
struct IdList(Vec<String>);

impl<'de> Deserialize<'de> for IdList {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct ListVisitor;
        impl<'de> Visitor<'de> for ListVisitor {
            type Value = IdList;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an id or a list of ids")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<IdList, E> {
                Ok(IdList(vec![v.to_string()]))
            }
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<IdList, E> {
                Ok(IdList(vec![v.to_string()]))
            }
            fn visit_i64<E: de::Error>(self, v: i64) -> Result<IdList, E> {
                Ok(IdList(vec![v.to_string()]))
            }
            fn visit_unit<E: de::Error>(self) -> Result<IdList, E> {
                Ok(IdList(Vec::new()))
            }
            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<IdList, A::Error> {
                let mut out = Vec::new();
                while let Some(Id(v)) = seq.next_element::<Id>()? {
                    out.push(v);
                }
                Ok(IdList(out))
            }
        }
        d.deserialize_any(ListVisitor)
    }
}

fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Id::deserialize(d).map(|id| id.0)
}

fn de_id_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    IdList::deserialize(d).map(|l| l.0)
}

fn de_activation_map<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<IndexMap<TrialId, Vec<ActivationId>>, D::Error> {
    let raw: Option<IndexMap<String, IdList>> = Option::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.0))
        .collect())
}

fn de_children<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<TrialNodeData>, D::Error> {
    let raw: Option<Vec<TrialNodeData>> = Option::deserialize(d)?;
    Ok(raw.unwrap_or_default())
}
