//! Learning plan and task content models
//!
//! These are the payloads exchanged with the external processing service:
//! plans arrive through the plan-update callback, task content through the
//! task-generation proxy or the callback. Both are validated while decoding,
//! so a value of these types is always structurally well formed.

pub mod plan;
pub mod task;

pub use plan::{Difficulty, LearningPlan, LearningStep, StepStatus, Video, WorkType};
pub use task::{
    CodingTask, QuestionKind, QuizQuestion, SlidePayload, TaskBody, TaskContent,
    TaskGenerateRequest, TaskGenerateResponse,
};
