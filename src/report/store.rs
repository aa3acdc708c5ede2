// Live report entities, owned by the reporter until they are sealed and written

use std::collections::HashMap;

use uuid::Uuid;

use crate::report::model::{
    Attachment, FixtureResult, Label, Link, Parameter, Stage, Status, StatusDetails, StepResult,
    TestResult, TestResultContainer,
};

/// Handle stored in run-tree nodes. Opaque to the tree itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Root,
    Group(Uuid),
    Test(Uuid),
    Hook(Uuid),
    /// Hook recorded before any suite was open
    GlobalHook(Uuid),
    Step(Uuid),
}

impl EntityRef {
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Self::Root => None,
            Self::Group(id)
            | Self::Test(id)
            | Self::Hook(id)
            | Self::GlobalHook(id)
            | Self::Step(id) => Some(*id),
        }
    }
}

/// Shared body of tests, fixtures and steps
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableItem {
    pub name: String,
    pub status: Option<Status>,
    pub status_details: Option<StatusDetails>,
    pub stage: Stage,
    pub steps: Vec<Uuid>,
    pub attachments: Vec<Attachment>,
    pub parameters: Vec<Parameter>,
    pub start: u128,
    pub stop: Option<u128>,
}

impl ExecutableItem {
    pub fn new(name: impl Into<String>, start: u128) -> Self {
        Self {
            name: name.into(),
            status: None,
            status_details: None,
            stage: Stage::Running,
            steps: Vec::new(),
            attachments: Vec::new(),
            parameters: Vec::new(),
            start,
            stop: None,
        }
    }

    pub fn has_terminal_status(&self) -> bool {
        matches!(
            self.status,
            Some(Status::Passed | Status::Failed | Status::Broken | Status::Skipped)
        )
    }
}

#[derive(Debug, Clone)]
pub struct TestEntity {
    pub uuid: Uuid,
    pub history_id: String,
    pub full_name: String,
    pub description: Option<String>,
    pub labels: Vec<Label>,
    pub links: Vec<Link>,
    pub item: ExecutableItem,
}

#[derive(Debug, Clone)]
pub struct GroupEntity {
    pub uuid: Uuid,
    pub name: String,
    pub children: Vec<Uuid>,
    pub befores: Vec<Uuid>,
    pub afters: Vec<Uuid>,
    pub start: u128,
    pub stop: Option<u128>,
    /// Created on demand for a test with no enclosing suite
    pub synthetic: bool,
}

/// Arena of every entity that has not been sealed yet
#[derive(Debug, Default)]
pub struct EntityStore {
    groups: HashMap<Uuid, GroupEntity>,
    tests: HashMap<Uuid, TestEntity>,
    items: HashMap<Uuid, ExecutableItem>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_group(&mut self, name: impl Into<String>, start: u128, synthetic: bool) -> Uuid {
        let uuid = Uuid::new_v4();
        self.groups.insert(
            uuid,
            GroupEntity {
                uuid,
                name: name.into(),
                children: Vec::new(),
                befores: Vec::new(),
                afters: Vec::new(),
                start,
                stop: None,
                synthetic,
            },
        );
        uuid
    }

    pub fn start_test(
        &mut self,
        name: impl Into<String>,
        full_name: impl Into<String>,
        history_id: impl Into<String>,
        start: u128,
    ) -> Uuid {
        let uuid = Uuid::new_v4();
        self.tests.insert(
            uuid,
            TestEntity {
                uuid,
                history_id: history_id.into(),
                full_name: full_name.into(),
                description: None,
                labels: Vec::new(),
                links: Vec::new(),
                item: ExecutableItem::new(name, start),
            },
        );
        uuid
    }

    /// Fixture or step body
    pub fn start_item(&mut self, name: impl Into<String>, start: u128) -> Uuid {
        let uuid = Uuid::new_v4();
        self.items.insert(uuid, ExecutableItem::new(name, start));
        uuid
    }

    pub fn group(&self, uuid: Uuid) -> Option<&GroupEntity> {
        self.groups.get(&uuid)
    }

    pub fn group_mut(&mut self, uuid: Uuid) -> Option<&mut GroupEntity> {
        self.groups.get_mut(&uuid)
    }

    pub fn test(&self, uuid: Uuid) -> Option<&TestEntity> {
        self.tests.get(&uuid)
    }

    pub fn test_mut(&mut self, uuid: Uuid) -> Option<&mut TestEntity> {
        self.tests.get_mut(&uuid)
    }

    pub fn item(&self, uuid: Uuid) -> Option<&ExecutableItem> {
        self.items.get(&uuid)
    }

    pub fn item_mut(&mut self, uuid: Uuid) -> Option<&mut ExecutableItem> {
        self.items.get_mut(&uuid)
    }

    /// Executable body behind a handle; groups and the root have none
    pub fn executable(&self, handle: EntityRef) -> Option<&ExecutableItem> {
        match handle {
            EntityRef::Test(id) => self.tests.get(&id).map(|t| &t.item),
            EntityRef::Hook(id) | EntityRef::GlobalHook(id) | EntityRef::Step(id) => {
                self.items.get(&id)
            }
            EntityRef::Root | EntityRef::Group(_) => None,
        }
    }

    pub fn executable_mut(&mut self, handle: EntityRef) -> Option<&mut ExecutableItem> {
        match handle {
            EntityRef::Test(id) => self.tests.get_mut(&id).map(|t| &mut t.item),
            EntityRef::Hook(id) | EntityRef::GlobalHook(id) | EntityRef::Step(id) => {
                self.items.get_mut(&id)
            }
            EntityRef::Root | EntityRef::Group(_) => None,
        }
    }

    /// Append `step` to the body behind `parent`. Returns false when the parent is gone.
    pub fn attach_step(&mut self, parent: EntityRef, step: Uuid) -> bool {
        match self.executable_mut(parent) {
            Some(item) => {
                item.steps.push(step);
                true
            }
            None => false,
        }
    }

    /// Copy an item and all its descendant steps under fresh ids
    pub fn deep_clone_item(&mut self, uuid: Uuid) -> Option<Uuid> {
        let mut copy = self.items.get(&uuid)?.clone();
        let children = std::mem::take(&mut copy.steps);
        copy.steps = children
            .iter()
            .filter_map(|child| self.deep_clone_item(*child))
            .collect();
        let id = Uuid::new_v4();
        self.items.insert(id, copy);
        Some(id)
    }

    /// Serializable form of an item and its step tree
    pub fn step_result(&self, uuid: Uuid) -> Option<StepResult> {
        let item = self.items.get(&uuid)?;
        Some(self.build_step(item))
    }

    fn build_step(&self, item: &ExecutableItem) -> StepResult {
        StepResult {
            name: item.name.clone(),
            status: item.status,
            status_details: item.status_details.clone(),
            stage: item.stage,
            steps: item
                .steps
                .iter()
                .filter_map(|id| self.step_result(*id))
                .collect(),
            attachments: item.attachments.clone(),
            parameters: item.parameters.clone(),
            start: item.start,
            stop: item.stop,
        }
    }

    pub fn test_result(&self, uuid: Uuid) -> Option<TestResult> {
        let test = self.tests.get(&uuid)?;
        let body = self.build_step(&test.item);
        Some(TestResult {
            uuid: test.uuid.to_string(),
            history_id: test.history_id.clone(),
            full_name: test.full_name.clone(),
            name: body.name,
            status: body.status,
            status_details: body.status_details,
            stage: body.stage,
            description: test.description.clone(),
            labels: test.labels.clone(),
            links: test.links.clone(),
            parameters: body.parameters,
            steps: body.steps,
            attachments: body.attachments,
            start: body.start,
            stop: body.stop,
        })
    }

    pub fn container(&self, uuid: Uuid) -> Option<TestResultContainer> {
        let group = self.groups.get(&uuid)?;
        let fixtures = |ids: &[Uuid]| -> Vec<FixtureResult> {
            ids.iter().filter_map(|id| self.step_result(*id)).collect()
        };
        Some(TestResultContainer {
            uuid: group.uuid.to_string(),
            name: group.name.clone(),
            children: group.children.iter().map(|c| c.to_string()).collect(),
            befores: fixtures(&group.befores),
            afters: fixtures(&group.afters),
            start: group.start,
            stop: group.stop,
        })
    }

    /// Drop an item and its step tree
    pub fn remove_item(&mut self, uuid: Uuid) {
        if let Some(item) = self.items.remove(&uuid) {
            for child in item.steps {
                self.remove_item(child);
            }
        }
    }

    pub fn remove_test(&mut self, uuid: Uuid) {
        if let Some(test) = self.tests.remove(&uuid) {
            for child in test.item.steps {
                self.remove_item(child);
            }
        }
    }

    pub fn remove_group(&mut self, uuid: Uuid) {
        if let Some(group) = self.groups.remove(&uuid) {
            for fixture in group.befores.into_iter().chain(group.afters) {
                self.remove_item(fixture);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.tests.is_empty() && self.items.is_empty()
    }
}
