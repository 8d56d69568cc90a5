use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const AXIS_COUNT: usize = 11;
pub const SCORE_MIN: i64 = 0;
pub const SCORE_MAX: i64 = 100;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const GRADE_MIN: i64 = 0;
pub const GRADE_MAX: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("grade {0} is outside 0..=5")]
    GradeOutOfRange(i64),
    #[error("capability axis `{0}` is missing")]
    MissingAxis(&'static str),
    #[error("capability axis `{axis}` is not numeric: {value}")]
    NonNumericAxis { axis: &'static str, value: String },
    #[error("capability axis `{axis}` out of range: {value}")]
    AxisOutOfRange { axis: &'static str, value: i64 },
    #[error("unknown assessment type: {0}")]
    UnknownAssessmentType(String),
    #[error("unknown mastery status: {0}")]
    UnknownMasteryStatus(String),
    #[error("`{0}` must not be empty")]
    EmptyField(&'static str),
}

pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

/// One of the eleven dimensions of a learner's capability profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    GeometricReasoning,
    AlgebraicManipulation,
    AnalyticalReasoning,
    Optimization,
    ApproachPivoting,
    SelfDiagnosis,
    ConceptualKnowledge,
    ProceduralKnowledge,
    RetrievalSpeed,
    CalculationAccuracy,
    DifficultyTolerance,
}

impl Axis {
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::GeometricReasoning,
        Axis::AlgebraicManipulation,
        Axis::AnalyticalReasoning,
        Axis::Optimization,
        Axis::ApproachPivoting,
        Axis::SelfDiagnosis,
        Axis::ConceptualKnowledge,
        Axis::ProceduralKnowledge,
        Axis::RetrievalSpeed,
        Axis::CalculationAccuracy,
        Axis::DifficultyTolerance,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Storage and wire key, shared with the analysis payload format.
    pub const fn key(self) -> &'static str {
        match self {
            Axis::GeometricReasoning => "axis1_geo",
            Axis::AlgebraicManipulation => "axis1_alg",
            Axis::AnalyticalReasoning => "axis1_ana",
            Axis::Optimization => "axis2_opt",
            Axis::ApproachPivoting => "axis2_piv",
            Axis::SelfDiagnosis => "axis2_dia",
            Axis::ConceptualKnowledge => "axis3_con",
            Axis::ProceduralKnowledge => "axis3_pro",
            Axis::RetrievalSpeed => "axis3_ret",
            Axis::CalculationAccuracy => "axis4_acc",
            Axis::DifficultyTolerance => "axis4_gri",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.key() == key)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Unvalidated per-event capability evidence. Values may fall outside
/// [0, 100]; they are clamped when turned into [`AxisScores`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEstimate {
    values: [i64; AXIS_COUNT],
}

impl RawEstimate {
    pub fn new(values: [i64; AXIS_COUNT]) -> Self {
        Self { values }
    }

    pub fn uniform(value: i64) -> Self {
        Self {
            values: [value; AXIS_COUNT],
        }
    }

    pub fn get(&self, axis: Axis) -> i64 {
        self.values[axis.index()]
    }

    pub fn with(mut self, axis: Axis, value: i64) -> Self {
        self.values[axis.index()] = value;
        self
    }

    pub fn clamped(&self) -> AxisScores {
        let mut scores = [0u8; AXIS_COUNT];
        for (slot, value) in scores.iter_mut().zip(self.values.iter()) {
            *slot = clamp_score(*value);
        }
        AxisScores(scores)
    }

    /// Parses the string-keyed payload produced by the analysis provider.
    /// Every axis must be present and numeric; fractional values round half
    /// away from zero.
    pub fn from_json(payload: &serde_json::Value) -> Result<Self, ValidationError> {
        let mut values = [0i64; AXIS_COUNT];
        for axis in Axis::ALL {
            let value = payload
                .get(axis.key())
                .ok_or(ValidationError::MissingAxis(axis.key()))?;
            values[axis.index()] = json_integer(axis, value)?;
        }
        Ok(Self { values })
    }
}

impl From<AxisScores> for RawEstimate {
    fn from(scores: AxisScores) -> Self {
        let mut values = [0i64; AXIS_COUNT];
        for axis in Axis::ALL {
            values[axis.index()] = i64::from(scores.get(axis));
        }
        Self { values }
    }
}

fn json_integer(axis: Axis, value: &serde_json::Value) -> Result<i64, ValidationError> {
    let non_numeric = || ValidationError::NonNumericAxis {
        axis: axis.key(),
        value: value.to_string(),
    };

    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v.round() as i64),
        _ => Err(non_numeric()),
    }
}

pub fn clamp_score(value: i64) -> u8 {
    value.clamp(SCORE_MIN, SCORE_MAX) as u8
}

/// Integer division rounding ties away from zero. `den` must be positive.
pub fn div_round(num: i64, den: i64) -> i64 {
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        -((-num + half) / den)
    }
}

/// Eleven capability scores, each guaranteed to lie in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisScores([u8; AXIS_COUNT]);

impl AxisScores {
    /// Strict constructor for values read back from storage.
    pub fn try_new(values: [i64; AXIS_COUNT]) -> Result<Self, ValidationError> {
        let mut scores = [0u8; AXIS_COUNT];
        for axis in Axis::ALL {
            let value = values[axis.index()];
            if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                return Err(ValidationError::AxisOutOfRange {
                    axis: axis.key(),
                    value,
                });
            }
            scores[axis.index()] = value as u8;
        }
        Ok(Self(scores))
    }

    pub fn get(&self, axis: Axis) -> u8 {
        self.0[axis.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, u8)> + '_ {
        Axis::ALL.into_iter().map(move |axis| (axis, self.get(axis)))
    }

    pub fn geometric_reasoning(&self) -> u8 {
        self.get(Axis::GeometricReasoning)
    }

    pub fn algebraic_manipulation(&self) -> u8 {
        self.get(Axis::AlgebraicManipulation)
    }

    pub fn analytical_reasoning(&self) -> u8 {
        self.get(Axis::AnalyticalReasoning)
    }

    pub fn optimization(&self) -> u8 {
        self.get(Axis::Optimization)
    }

    pub fn approach_pivoting(&self) -> u8 {
        self.get(Axis::ApproachPivoting)
    }

    pub fn self_diagnosis(&self) -> u8 {
        self.get(Axis::SelfDiagnosis)
    }

    pub fn conceptual_knowledge(&self) -> u8 {
        self.get(Axis::ConceptualKnowledge)
    }

    pub fn procedural_knowledge(&self) -> u8 {
        self.get(Axis::ProceduralKnowledge)
    }

    pub fn retrieval_speed(&self) -> u8 {
        self.get(Axis::RetrievalSpeed)
    }

    pub fn calculation_accuracy(&self) -> u8 {
        self.get(Axis::CalculationAccuracy)
    }

    pub fn difficulty_tolerance(&self) -> u8 {
        self.get(Axis::DifficultyTolerance)
    }
}

impl Serialize for AxisScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(AXIS_COUNT))?;
        for (axis, value) in self.iter() {
            map.serialize_entry(axis.key(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AxisScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = AxisScores;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of eleven capability axes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<AxisScores, A::Error> {
                let mut values: [Option<i64>; AXIS_COUNT] = [None; AXIS_COUNT];
                while let Some(key) = access.next_key::<String>()? {
                    let axis = Axis::from_key(&key)
                        .ok_or_else(|| de::Error::unknown_field(&key, &[]))?;
                    values[axis.index()] = Some(access.next_value()?);
                }
                let mut out = [0i64; AXIS_COUNT];
                for axis in Axis::ALL {
                    out[axis.index()] = values[axis.index()]
                        .ok_or_else(|| de::Error::missing_field(axis.key()))?;
                }
                AxisScores::try_new(out).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

/// Immutable capability snapshot; one per assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityVector {
    pub id: String,
    pub assessment_id: String,
    pub learner_id: String,
    pub created_at: DateTime<Utc>,
    pub scores: AxisScores,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentType {
    Manual,
    CoachManual,
    AiAnalysis,
}

impl AssessmentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            AssessmentType::Manual => "MANUAL",
            AssessmentType::CoachManual => "COACH_MANUAL",
            AssessmentType::AiAnalysis => "AI_ANALYSIS",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "MANUAL" => Ok(AssessmentType::Manual),
            "COACH_MANUAL" => Ok(AssessmentType::CoachManual),
            "AI_ANALYSIS" => Ok(AssessmentType::AiAnalysis),
            other => Err(ValidationError::UnknownAssessmentType(other.to_string())),
        }
    }
}

/// Caller-supplied description of why a vector is being produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentDraft {
    pub assessment_type: AssessmentType,
    pub source_ref: Option<String>,
    pub notes: Option<String>,
    pub model_version: Option<String>,
    pub reason_code: Option<String>,
}

impl AssessmentDraft {
    pub fn new(assessment_type: AssessmentType) -> Self {
        Self {
            assessment_type,
            source_ref: None,
            notes: None,
            model_version: None,
            reason_code: None,
        }
    }

    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub learner_id: String,
    pub assessment_type: AssessmentType,
    pub source_ref: Option<String>,
    pub notes: Option<String>,
    pub model_version: Option<String>,
    pub reason_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MasteryStatus {
    InProgress,
    Mastered,
}

impl MasteryStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            MasteryStatus::InProgress => "IN_PROGRESS",
            MasteryStatus::Mastered => "MASTERED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "IN_PROGRESS" => Ok(MasteryStatus::InProgress),
            "MASTERED" => Ok(MasteryStatus::Mastered),
            other => Err(ValidationError::UnknownMasteryStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMastery {
    pub learner_id: String,
    pub concept_id: String,
    pub mastery_score: u8,
    pub status: MasteryStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Recall quality on the SM-2 0..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Grade(u8);

impl Grade {
    pub const PASSING: u8 = 3;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if !(GRADE_MIN..=GRADE_MAX).contains(&value) {
            return Err(ValidationError::GradeOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_successful_recall(self) -> bool {
        self.0 >= Self::PASSING
    }
}

impl TryFrom<i64> for Grade {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCard {
    pub id: String,
    pub learner_id: String,
    pub source_ref: String,
    pub question: String,
    pub answer: String,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub next_review_date: NaiveDate,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewCard {
    pub fn is_due(&self, on: NaiveDate) -> bool {
        self.next_review_date <= on
    }
}

/// `date + days`, saturating at the last representable date.
pub fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}
