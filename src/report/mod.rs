// Report module - Allure result model, live entities and persistence

pub mod model;
pub mod status;
pub mod store;
pub mod writer;

pub use model::{
    Attachment, Label, Link, Parameter, Stage, Status, StatusDetails, StepResult, TestResult,
    TestResultContainer,
};
pub use store::{EntityRef, EntityStore, ExecutableItem};
pub use writer::{AttachmentSource, MemoryWriter, QueuedWriter, ReportWriter};
