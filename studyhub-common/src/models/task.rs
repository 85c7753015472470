//! Task content model and task-generation wire types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::plan::{Difficulty, Video, WorkType};
use crate::{Error, Result};

/// Slide shown before the exercise
///
/// The external service emits either a structured slide or a single
/// markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlidePayload {
    Slide { title: String, content: Vec<String> },
    Markdown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Choice,
}

/// Multiple-choice question; `answer` is always one of `options`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub answer: String,
}

impl QuizQuestion {
    fn validate(&self) -> Result<()> {
        if !self.options.iter().any(|o| o == &self.answer) {
            return Err(Error::Validation(format!(
                "answer '{}' is not one of the options for question '{}'",
                self.answer, self.question
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingTask {
    pub title: String,
    pub description: String,
    pub starter_code: String,
    /// Reference solution
    pub answer: String,
}

/// The exercise itself: quiz questions or a coding task, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskBody {
    Quiz(Vec<QuizQuestion>),
    Coding(CodingTask),
}

/// Generated task content for one learning step
///
/// On the wire the exercise is `questions` (quiz) or `task` (coding) next to
/// a `type` tag. Decoding keeps the field that matches the tag and drops the
/// other one; a missing matching field is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTaskContent", into = "RawTaskContent")]
pub struct TaskContent {
    pub difficulty: Difficulty,
    pub slide: SlidePayload,
    pub body: TaskBody,
    pub videos: Vec<Video>,
    /// Web search results attached by the service, kept opaque
    pub web_res: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct RawTaskContent {
    #[serde(rename = "type")]
    work_type: WorkType,
    difficulty: Difficulty,
    ppt_slide: SlidePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    questions: Option<Vec<QuizQuestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task: Option<CodingTask>,
    #[serde(default)]
    videos: Vec<Video>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    web_res: Option<Value>,
}

impl TryFrom<RawTaskContent> for TaskContent {
    type Error = Error;

    fn try_from(raw: RawTaskContent) -> Result<Self> {
        let body = match raw.work_type {
            WorkType::Quiz => {
                let questions = raw
                    .questions
                    .filter(|q| !q.is_empty())
                    .ok_or_else(|| Error::Validation("quiz task has no questions".to_string()))?;
                for question in &questions {
                    question.validate()?;
                }
                TaskBody::Quiz(questions)
            }
            WorkType::Coding => TaskBody::Coding(raw.task.ok_or_else(|| {
                Error::Validation("coding task is missing 'task'".to_string())
            })?),
        };

        Ok(Self {
            difficulty: raw.difficulty,
            slide: raw.ppt_slide,
            body,
            videos: raw.videos,
            web_res: raw.web_res,
        })
    }
}

impl From<TaskContent> for RawTaskContent {
    fn from(content: TaskContent) -> Self {
        let work_type = content.work_type();
        let (questions, task) = match content.body {
            TaskBody::Quiz(questions) => (Some(questions), None),
            TaskBody::Coding(task) => (None, Some(task)),
        };

        Self {
            work_type,
            difficulty: content.difficulty,
            ppt_slide: content.slide,
            questions,
            task,
            videos: content.videos,
            web_res: content.web_res,
        }
    }
}

impl TaskContent {
    pub fn work_type(&self) -> WorkType {
        match self.body {
            TaskBody::Quiz(_) => WorkType::Quiz,
            TaskBody::Coding(_) => WorkType::Coding,
        }
    }

    pub fn questions(&self) -> Option<&[QuizQuestion]> {
        match &self.body {
            TaskBody::Quiz(questions) => Some(questions),
            TaskBody::Coding(_) => None,
        }
    }

    pub fn coding_task(&self) -> Option<&CodingTask> {
        match &self.body {
            TaskBody::Coding(task) => Some(task),
            TaskBody::Quiz(_) => None,
        }
    }
}

/// Task generation request forwarded to the external service
///
/// Unknown fields are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGenerateRequest {
    pub step: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub animation_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "type")]
    pub work_type: WorkType,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_keyword: Option<String>,
    #[serde(default)]
    pub videos: Vec<Video>,
    /// User id; serialized as `null` when unknown
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_steps_context: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_mock: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGenerateResponse {
    pub success: bool,
    pub task: TaskContent,
}
