//! Learning plan model
//!
//! A plan is an ordered list of steps; list position is presentation order
//! and every step carries its own 1-based `step` number, which must match
//! its position.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Video attached to a learning step or task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub title: String,
    /// Source URL
    pub url: String,
    /// Cover image URL
    pub cover: String,
    /// Display duration ("7:25"), never parsed
    pub duration: String,
}

/// Progress status of a learning step
///
/// Older plans use localized labels; they decode to the same three states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[serde(alias = "当前进行")]
    Current,
    #[serde(alias = "已完成")]
    Completed,
    #[serde(alias = "待完成")]
    Pending,
}

/// Kind of exercise a step or task asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Quiz,
    Coding,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::Quiz => "quiz",
            WorkType::Coding => "coding",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// One step of a learning plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningStep {
    /// 1-based position within the plan
    pub step: u32,
    pub title: String,
    pub description: String,
    /// Animation hint for the UI
    #[serde(default)]
    pub animation_type: String,
    pub status: StepStatus,
    #[serde(rename = "type")]
    pub work_type: WorkType,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_keyword: Option<String>,
    /// Stage of the course this step belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default)]
    pub videos: Vec<Video>,
}

/// Learning plan as delivered by the external service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLearningPlan")]
pub struct LearningPlan {
    plan: Vec<LearningStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    introduction: Option<Value>,
}

/// Wire shape before step numbering is checked
#[derive(Deserialize)]
struct RawLearningPlan {
    plan: Vec<LearningStep>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    introduction: Option<Value>,
}

impl TryFrom<RawLearningPlan> for LearningPlan {
    type Error = Error;

    fn try_from(raw: RawLearningPlan) -> Result<Self> {
        let mut plan = LearningPlan::new(raw.plan)?;
        plan.title = raw.title;
        plan.description = raw.description;
        plan.introduction = raw.introduction;
        Ok(plan)
    }
}

impl LearningPlan {
    /// Build a plan from ordered steps
    ///
    /// Fails if the plan is empty or if `steps[i].step != i + 1`.
    pub fn new(steps: Vec<LearningStep>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::Validation("plan has no steps".to_string()));
        }

        for (index, step) in steps.iter().enumerate() {
            let expected = index as u32 + 1;
            if step.step != expected {
                return Err(Error::Validation(format!(
                    "step at position {} is numbered {} (expected {})",
                    index + 1,
                    step.step,
                    expected
                )));
            }
        }

        Ok(Self {
            plan: steps,
            title: None,
            description: None,
            introduction: None,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn steps(&self) -> &[LearningStep] {
        &self.plan
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Full course introduction, kept opaque
    pub fn introduction(&self) -> Option<&Value> {
        self.introduction.as_ref()
    }

    /// The step currently in progress, if any
    pub fn current_step(&self) -> Option<&LearningStep> {
        self.plan.iter().find(|s| s.status == StepStatus::Current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step_json(n: u32, status: &str) -> Value {
        json!({
            "step": n,
            "title": format!("Step {}", n),
            "description": "Learn things",
            "animation_type": "none",
            "status": status,
            "type": "quiz",
            "difficulty": "beginner",
            "videos": [{
                "title": "Intro",
                "url": "https://example.com/v",
                "cover": "https://example.com/c.jpg",
                "duration": "7:25"
            }]
        })
    }

    #[test]
    fn test_decodes_well_formed_plan() {
        let plan: LearningPlan = serde_json::from_value(json!({
            "plan": [step_json(1, "current"), step_json(2, "pending")],
            "title": "Rust basics"
        }))
        .unwrap();

        assert_eq!(plan.steps().len(), 2);
        assert_eq!(plan.title(), Some("Rust basics"));
        assert_eq!(plan.current_step().map(|s| s.step), Some(1));
        assert_eq!(plan.steps()[0].videos[0].duration, "7:25");
    }

    #[test]
    fn test_localized_status_aliases() {
        let plan: LearningPlan = serde_json::from_value(json!({
            "plan": [step_json(1, "当前进行"), step_json(2, "待完成"), step_json(3, "已完成")]
        }))
        .unwrap();

        let statuses: Vec<StepStatus> = plan.steps().iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Current, StepStatus::Pending, StepStatus::Completed]
        );

        // Aliases are normalized on the way out
        let out = serde_json::to_value(&plan).unwrap();
        assert_eq!(out["plan"][0]["status"], "current");
    }

    #[test]
    fn test_rejects_out_of_order_steps() {
        let err = serde_json::from_value::<LearningPlan>(json!({
            "plan": [step_json(1, "current"), step_json(3, "pending")]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_rejects_non_array_steps() {
        assert!(serde_json::from_value::<LearningPlan>(json!({"plan": "nope"})).is_err());
        assert!(serde_json::from_value::<LearningPlan>(json!({"plan": []})).is_err());
        assert!(serde_json::from_value::<LearningPlan>(json!({})).is_err());
    }

    #[test]
    fn test_optional_fields_omitted_on_serialize() {
        let plan: LearningPlan =
            serde_json::from_value(json!({"plan": [step_json(1, "current")]})).unwrap();
        let out = serde_json::to_value(&plan).unwrap();
        assert!(out.get("title").is_none());
        assert!(out.get("introduction").is_none());
        assert!(out["plan"][0].get("stage").is_none());
    }
}
