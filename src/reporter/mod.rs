// Reporter - reconciles lifecycle events into report entities
//
// One event at a time, in producer order. Missing context (no open test, hook
// or step) is logged and ignored; nothing here may abort the test run.

pub mod events;
pub mod tree;

use std::collections::HashSet;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use once_cell::sync::Lazy;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::report::model::{self, Attachment, Label, Link, Parameter, Status, StatusDetails};
use crate::report::status::{
    group_labels, is_suite_label, resolve_labels, set_known_status, set_status,
};
use crate::report::store::{EntityRef, EntityStore};
use crate::report::writer::{AttachmentSource, ReportWriter};
use crate::time::at_or_now;

pub use events::LifecycleEvent;
pub use tree::{Node, NodeId, NodeKind, RunTree};

/// Queue identity used when events arrive outside any spec
pub const DEFAULT_IDENTITY: &str = "default";

static HOST: Lazy<String> = Lazy::new(|| {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Before,
    After,
    BeforeEach,
    AfterEach,
}

impl HookKind {
    /// Classify a hook from its title, e.g. `"before each" hook for "works"`
    pub fn classify(title: &str) -> Self {
        let title = title.to_ascii_lowercase();
        if title.contains("before each") {
            Self::BeforeEach
        } else if title.contains("after each") {
            Self::AfterEach
        } else if title.contains("after") {
            Self::After
        } else {
            Self::Before
        }
    }

    pub fn is_per_test(&self) -> bool {
        matches!(self, Self::BeforeEach | Self::AfterEach)
    }

    pub fn is_after(&self) -> bool {
        matches!(self, Self::After | Self::AfterEach)
    }
}

#[derive(Debug, Clone)]
pub struct ReporterOptions {
    /// Name of the group created for a test that arrives outside any suite
    pub default_suite: String,
    /// Labels every test starts with; runtime labels override them
    pub default_labels: Vec<Label>,
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self {
            default_suite: "Root suite".to_string(),
            default_labels: vec![
                Label::new("framework", "cypress"),
                Label::new("language", "javascript"),
            ],
        }
    }
}

impl ReporterOptions {
    pub fn with_environment_labels(mut self) -> Self {
        self.default_labels.push(Label::new("host", HOST.as_str()));
        self.default_labels
            .push(Label::new("thread", std::process::id().to_string()));
        self
    }
}

/// Event reconciler. Owns the run tree and every live entity; sealed entities
/// go to the writer and are dropped.
pub struct Reporter<W: ReportWriter> {
    tree: RunTree<EntityRef>,
    store: EntityStore,
    writer: W,
    options: ReporterOptions,
    spec: Option<String>,
    /// Runtime labels of the open test
    labels: Vec<Label>,
    /// Steps that stand in for per-test hooks, innermost last
    folded_hooks: Vec<NodeId>,
    /// Tests written for the open spec
    spec_tests: Vec<String>,
    bound_global_hooks: HashSet<Uuid>,
}

impl<W: ReportWriter> Reporter<W> {
    pub fn new(writer: W, options: ReporterOptions) -> Self {
        Self {
            tree: RunTree::new(EntityRef::Root),
            store: EntityStore::new(),
            writer,
            options,
            spec: None,
            labels: Vec::new(),
            folded_hooks: Vec::new(),
            spec_tests: Vec::new(),
            bound_global_hooks: HashSet::new(),
        }
    }

    pub fn tree(&self) -> &RunTree<EntityRef> {
        &self.tree
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    pub fn identity(&self) -> &str {
        self.spec.as_deref().unwrap_or(DEFAULT_IDENTITY)
    }

    pub fn handle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::SpecStarted { spec, at } => self.spec_started(&spec, at_or_now(at)),
            LifecycleEvent::SpecEnded { video, at } => {
                self.spec_ended(video.as_deref(), at_or_now(at))
            }
            LifecycleEvent::SuiteStarted { title, at } => {
                self.suite_started(&title, at_or_now(at));
            }
            LifecycleEvent::SuiteEnded { at } => self.suite_ended(at_or_now(at)),
            LifecycleEvent::HookStarted { title, at } => self.hook_started(&title, at_or_now(at)),
            LifecycleEvent::HookEnded {
                status,
                message,
                trace,
                at,
            } => self.hook_ended(
                status.as_deref(),
                events::details(message, trace),
                at_or_now(at),
            ),
            LifecycleEvent::TestStarted { title, retry, at } => {
                self.test_started(&title, retry, at_or_now(at))
            }
            LifecycleEvent::TestEnded {
                status,
                message,
                trace,
                at,
            } => self.test_ended(&status, events::details(message, trace), at_or_now(at)),
            LifecycleEvent::TestPending { title, at } => self.test_pending(&title, at_or_now(at)),
            LifecycleEvent::StepStarted { name, at } => self.step_started(&name, at_or_now(at)),
            LifecycleEvent::StepEnded {
                status,
                message,
                trace,
                at,
            } => self.step_ended(
                status.as_deref(),
                events::details(message, trace),
                at_or_now(at),
            ),
            LifecycleEvent::EndAllSteps { status, at } => {
                self.end_all_steps(status.as_deref().unwrap_or("passed"), at_or_now(at))
            }
            LifecycleEvent::Label { name, value } => self.label(&name, &value),
            LifecycleEvent::Link {
                url,
                name,
                link_type,
            } => self.link(Link {
                url,
                name,
                link_type,
            }),
            LifecycleEvent::Parameter { name, value } => self.parameter(&name, &value),
            LifecycleEvent::Description { text } => self.description(&text),
            LifecycleEvent::Attachment {
                name,
                content,
                content_type,
            } => self.attachment(&name, &content, &content_type),
            LifecycleEvent::Screenshot { path, name } => self.screenshot(&path, name.as_deref()),
            LifecycleEvent::RunEnded { at } => self.run_ended(at_or_now(at)),
        }
    }

    // ---- specs ----

    pub fn spec_started(&mut self, spec: &str, at: u128) {
        if self.spec.is_some() {
            debug!("Spec started while another is open; closing it");
            self.spec_ended(None, at);
        }
        self.spec = Some(spec.to_string());
        self.spec_tests.clear();
    }

    /// Close everything still open, attach the recording and release the spec's queue
    pub fn spec_ended(&mut self, video: Option<&Path>, at: u128) {
        self.close_open_entities(at);
        self.flush_global_hooks(at);

        let identity = self.identity().to_string();
        if let Some(video) = video {
            if self.spec_tests.is_empty() {
                debug!("No tests to attach {} to", video.display());
            } else {
                self.writer.attach_video(&identity, video, &self.spec_tests);
            }
        }
        self.writer.finish_identity(&identity);
        self.spec_tests.clear();
        self.spec = None;
    }

    pub fn run_ended(&mut self, at: u128) {
        if self.spec.is_some() {
            self.spec_ended(None, at);
            return;
        }
        self.close_open_entities(at);
        self.flush_global_hooks(at);
        // containers may have been written under the default identity without any test
        self.writer.finish_identity(DEFAULT_IDENTITY);
        self.spec_tests.clear();
    }

    fn close_open_entities(&mut self, at: u128) {
        if self.tree.current_test().is_some() {
            warn!("Test still open at the end of the spec");
            self.test_ended(
                "broken",
                Some(StatusDetails::message("Test did not finish before the spec ended")),
                at,
            );
        }
        self.folded_hooks.clear();
        while self.tree.current_hook().is_some() {
            self.end_current_hook("broken", None, at);
        }
        while self.tree.current_suite().is_some() {
            self.suite_ended(at);
        }
    }

    /// Write global hooks that never bound to a suite and drop every record
    fn flush_global_hooks(&mut self, at: u128) -> usize {
        let root = self.tree.root();
        let records: Vec<(NodeId, Uuid, String)> = self
            .tree
            .children(root)
            .iter()
            .filter_map(|id| {
                let node = self.tree.node(*id)?;
                match node.handle {
                    EntityRef::GlobalHook(record) => Some((*id, record, node.label.clone())),
                    _ => None,
                }
            })
            .collect();

        let identity = self.identity().to_string();
        let mut written = 0;
        for (node, record, title) in records {
            if !self.bound_global_hooks.remove(&record) {
                let group = self.store.start_group(title.clone(), at, true);
                if let Some(copy) = self.store.deep_clone_item(record)
                    && let Some(entity) = self.store.group_mut(group)
                {
                    if HookKind::classify(&title).is_after() {
                        entity.afters.push(copy);
                    } else {
                        entity.befores.push(copy);
                    }
                    entity.stop = Some(at);
                }
                if let Some(container) = self.store.container(group) {
                    self.writer.write_container(&identity, &container);
                    written += 1;
                }
                self.store.remove_group(group);
            }
            self.store.remove_item(record);
            self.tree.remove(node);
        }
        written
    }

    // ---- suites ----

    fn current_group(&self) -> Option<Uuid> {
        let suite = self.tree.current_suite()?;
        match self.tree.handle(suite) {
            Some(EntityRef::Group(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn suite_started(&mut self, title: &str, at: u128) -> Uuid {
        self.open_group(title, at, false)
    }

    fn open_group(&mut self, title: &str, at: u128, synthetic: bool) -> Uuid {
        let group = self.store.start_group(title, at, synthetic);
        if let Some(parent) = self.current_group()
            && let Some(parent) = self.store.group_mut(parent)
        {
            parent.children.push(group);
        }
        self.tree.add_suite(title, EntityRef::Group(group));
        debug!("Suite '{}' started", title);
        self.bind_pending_hooks();
        group
    }

    /// Attach every global hook recorded above the current suite to its group,
    /// as a copy carrying the hook's steps and final status. Returns how many
    /// hooks were bound.
    pub fn bind_pending_hooks(&mut self) -> usize {
        let Some(group) = self.current_group() else {
            return 0;
        };

        let mut bound = 0;
        for hook in self.tree.find_hooks_for_current_suite() {
            let Some(node) = self.tree.node(hook) else {
                continue;
            };
            let EntityRef::GlobalHook(record) = node.handle else {
                continue;
            };
            let kind = HookKind::classify(&node.label);
            let Some(copy) = self.store.deep_clone_item(record) else {
                continue;
            };
            if let Some(entity) = self.store.group_mut(group) {
                if kind.is_after() {
                    entity.afters.push(copy);
                } else {
                    entity.befores.push(copy);
                }
                self.bound_global_hooks.insert(record);
                bound += 1;
            }
        }
        if bound > 0 {
            debug!("Bound {} global hook(s) to the current suite", bound);
        }
        bound
    }

    pub fn suite_ended(&mut self, at: u128) {
        let Some(suite) = self.tree.current_suite() else {
            debug!("Suite end without an open suite");
            return;
        };
        if let Some(test) = self.tree.current_test()
            && self.tree.is_descendant(test, suite)
        {
            self.test_ended(
                "broken",
                Some(StatusDetails::message("Suite ended before the test finished")),
                at,
            );
        }
        while let Some(hook) = self.tree.current_hook() {
            if !self.tree.is_descendant(hook, suite) {
                break;
            }
            self.end_current_hook("broken", None, at);
        }

        if let Some(group) = self.current_group() {
            if let Some(entity) = self.store.group_mut(group) {
                entity.stop = Some(at);
            }
            if let Some(container) = self.store.container(group) {
                let identity = self.identity().to_string();
                self.writer.write_container(&identity, &container);
            }
            self.store.remove_group(group);
        }
        self.tree.end_suite();
        self.tree.remove(suite);
    }

    // ---- hooks ----

    pub fn hook_started(&mut self, title: &str, at: u128) {
        let kind = HookKind::classify(title);
        if kind.is_per_test() && self.tree.current_test().is_some() {
            if let Some(step) = self.open_step(title, at) {
                self.folded_hooks.push(step);
            }
            return;
        }

        let fixture = self.store.start_item(title, at);
        match self.current_group() {
            Some(group) => {
                if let Some(entity) = self.store.group_mut(group) {
                    if kind.is_after() {
                        entity.afters.push(fixture);
                    } else {
                        entity.befores.push(fixture);
                    }
                }
                self.tree.add_hook(title, EntityRef::Hook(fixture));
            }
            None => {
                debug!("Recording global hook '{}'", title);
                self.tree.add_hook(title, EntityRef::GlobalHook(fixture));
            }
        }
    }

    pub fn hook_ended(&mut self, status: Option<&str>, details: Option<StatusDetails>, at: u128) {
        let status = status.unwrap_or("passed");

        // A folded per-test hook is newer than any open hook node
        if let Some(&folded) = self.folded_hooks.last()
            && self
                .tree
                .current_hook()
                .is_none_or(|hook| self.tree.arrived_before(hook, folded))
        {
            self.folded_hooks.pop();
            let open = self
                .tree
                .current_step()
                .is_some_and(|step| step == folded || self.tree.is_descendant(step, folded));
            if !open {
                return;
            }
            while let Some(step) = self.tree.current_step() {
                let is_folded = step == folded;
                let step_details = if is_folded { details.clone() } else { None };
                self.finish_step(step, Some(status), step_details, at);
                self.tree.end_step();
                if is_folded {
                    break;
                }
            }
            return;
        }

        self.end_current_hook(status, details, at);
    }

    fn end_current_hook(&mut self, status: &str, details: Option<StatusDetails>, at: u128) {
        let Some(hook) = self.tree.current_hook() else {
            debug!("Hook end without an open hook");
            return;
        };
        self.close_steps_under(hook, status, at);
        if let Some(handle) = self.tree.handle(hook).copied()
            && let Some(item) = self.store.executable_mut(handle)
        {
            set_status(item, status, details);
            item.stop = Some(at);
        }
        self.tree.end_hook();
    }

    // ---- tests ----

    pub fn test_started(&mut self, title: &str, retry: u32, at: u128) {
        if self.tree.current_test().is_some() {
            warn!("Test '{}' started while another test is open", title);
            self.test_ended(
                "broken",
                Some(StatusDetails::message("Test did not finish before the next one started")),
                at,
            );
        }
        if self.tree.current_suite().is_none() {
            let name = self.options.default_suite.clone();
            self.open_group(&name, at, true);
        }

        let suites = self.suite_chain();
        let mut path: Vec<&str> = suites.iter().map(String::as_str).collect();
        path.push(title);
        let full_name = match &self.spec {
            Some(spec) => format!("{}#{}", spec, path.join(" ")),
            None => path.join(" "),
        };
        let history_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, full_name.as_bytes()).to_string();

        let test = self.store.start_test(title, full_name, history_id, at);
        if let Some(entity) = self.store.test_mut(test) {
            entity.labels = group_labels(&suites);
        }
        if let Some(group) = self.current_group()
            && let Some(entity) = self.store.group_mut(group)
        {
            entity.children.push(test);
        }
        self.tree.add_test(title, EntityRef::Test(test));
        self.labels.clear();
        if retry > 0 {
            debug!("Test '{}' retry #{}", title, retry);
        }
    }

    /// Names of the open, non-synthetic suites, outermost first
    fn suite_chain(&self) -> Vec<String> {
        let Some(suite) = self.tree.current_suite() else {
            return Vec::new();
        };
        let mut chain = self.tree.ancestors(suite, |node| node.kind == NodeKind::Suite);
        chain.reverse();
        chain.push(suite);
        chain
            .into_iter()
            .filter_map(|id| match self.tree.handle(id) {
                Some(EntityRef::Group(group)) => self.store.group(*group),
                _ => None,
            })
            .filter(|group| !group.synthetic)
            .map(|group| group.name.clone())
            .collect()
    }

    pub fn test_ended(&mut self, status: &str, details: Option<StatusDetails>, at: u128) {
        let Some(node) = self.tree.current_test() else {
            debug!("Test end without an open test");
            return;
        };
        let Some(EntityRef::Test(test)) = self.tree.handle(node).copied() else {
            return;
        };

        self.close_steps_under(node, status, at);
        self.folded_hooks
            .retain(|step| !self.tree.is_descendant(*step, node));

        let mut buffer = self.options.default_labels.clone();
        if let Some(spec) = &self.spec {
            buffer.push(Label::new("package", spec.clone()));
        }
        buffer.extend(
            self.labels
                .drain(..)
                .filter(|label| !is_suite_label(&label.name)),
        );
        let resolved = resolve_labels(&buffer);

        if let Some(entity) = self.store.test_mut(test) {
            set_status(&mut entity.item, status, details);
            entity.item.stop = Some(at);
            let suite_labels = std::mem::take(&mut entity.labels);
            entity.labels = resolved;
            entity.labels.extend(suite_labels);
        }

        if let Some(result) = self.store.test_result(test) {
            let identity = self.identity().to_string();
            self.writer.write_result(&identity, &result);
            self.spec_tests.push(result.uuid);
        }
        self.store.remove_test(test);
        self.tree.end_test();
        self.tree.remove(node);
    }

    /// A test that never ran
    pub fn test_pending(&mut self, title: &str, at: u128) {
        self.test_started(title, 0, at);
        self.test_ended("skipped", None, at);
    }

    // ---- steps ----

    fn open_step(&mut self, name: &str, at: u128) -> Option<NodeId> {
        let parent = self
            .tree
            .current_step()
            .or(self.tree.current_test())
            .or(self.tree.current_hook())?;
        let parent_handle = self.tree.handle(parent).copied()?;
        let step = self.store.start_item(name, at);
        if !self.store.attach_step(parent_handle, step) {
            self.store.remove_item(step);
            return None;
        }
        self.tree.add_step(name, EntityRef::Step(step))
    }

    pub fn step_started(&mut self, name: &str, at: u128) {
        if self.open_step(name, at).is_none() {
            debug!("Step '{}' has no open test, hook or step", name);
        }
    }

    pub fn step_ended(&mut self, status: Option<&str>, details: Option<StatusDetails>, at: u128) {
        let Some(step) = self.tree.current_step() else {
            debug!("Step end without an open step");
            return;
        };
        self.finish_step(step, status, details, at);
        self.tree.end_step();
    }

    /// Close every open step in the current context
    pub fn end_all_steps(&mut self, status: &str, at: u128) {
        while let Some(step) = self.tree.current_step() {
            self.finish_step(step, Some(status), None, at);
            self.tree.end_step();
        }
    }

    fn close_steps_under(&mut self, owner: NodeId, status: &str, at: u128) {
        while let Some(step) = self.tree.current_step() {
            if !self.tree.is_descendant(step, owner) {
                break;
            }
            self.finish_step(step, Some(status), None, at);
            self.tree.end_step();
        }
    }

    /// Seal one step: resolve its status, push it into a still-open last child,
    /// and mark it broken when a child failed and its own outcome was not set.
    fn finish_step(
        &mut self,
        node: NodeId,
        raw: Option<&str>,
        details: Option<StatusDetails>,
        at: u128,
    ) {
        let Some(EntityRef::Step(step)) = self.tree.handle(node).copied() else {
            return;
        };
        let Some(item) = self.store.item(step) else {
            return;
        };

        let raw = raw.unwrap_or("passed");
        let decided = item.has_terminal_status();
        let (status, details) = match Status::parse(raw) {
            Some(Status::Unknown) | None => (
                item.status.unwrap_or(Status::Passed),
                Some(StatusDetails::message(format!("Unexpected step status: {}", raw))),
            ),
            Some(status) => (status, details),
        };
        let unexpected = !matches!(Status::parse(raw), Some(s) if s != Status::Unknown);

        self.propagate_to_last_child(step, status, at);

        let failed_child = self.store.item(step).and_then(|item| {
            item.steps
                .iter()
                .filter_map(|child| self.store.item(*child))
                .find(|child| child.status.is_some_and(|s| s.is_failure()))
                .map(|child| child.status_details.clone())
        });

        let Some(item) = self.store.item_mut(step) else {
            return;
        };
        if !decided {
            let (status, details) = match failed_child {
                Some(child_details) => (
                    Status::Broken,
                    details
                        .or(child_details)
                        .or_else(|| Some(StatusDetails::message("A nested step failed"))),
                ),
                None => (status, details),
            };
            set_known_status(item, status, details.clone());
            if unexpected {
                item.status_details = details;
            }
        }
        item.stop = Some(at);
    }

    /// Give the last child (recursively) the parent's status if it never got one.
    ///
    /// Every event path seals open children before their parent, so today this
    /// only touches a child that was sealed without a status.
    fn propagate_to_last_child(&mut self, step: Uuid, status: Status, at: u128) {
        let mut cursor = self.store.item(step).and_then(|item| item.steps.last().copied());
        while let Some(child) = cursor {
            let Some(item) = self.store.item_mut(child) else {
                break;
            };
            if item.has_terminal_status() {
                break;
            }
            set_known_status(item, status, None);
            item.stop.get_or_insert(at);
            cursor = item.steps.last().copied();
        }
    }

    // ---- runtime metadata ----

    fn open_test_uuid(&self) -> Option<Uuid> {
        let node = self.tree.current_test()?;
        match self.tree.handle(node) {
            Some(EntityRef::Test(id)) => Some(*id),
            _ => None,
        }
    }

    /// Innermost open step, test or hook
    fn current_executable(&self) -> Option<EntityRef> {
        let node = self
            .tree
            .current_step()
            .or(self.tree.current_test())
            .or(self.tree.current_hook())?;
        self.tree.handle(node).copied()
    }

    pub fn label(&mut self, name: &str, value: &str) {
        if self.tree.current_test().is_none() {
            debug!("Label '{}' outside a test", name);
            return;
        }
        self.labels.push(Label::new(name, value));
    }

    pub fn link(&mut self, link: Link) {
        match self.open_test_uuid().and_then(|id| self.store.test_mut(id)) {
            Some(test) => test.links.push(link),
            None => debug!("Link '{}' outside a test", link.url),
        }
    }

    pub fn parameter(&mut self, name: &str, value: &str) {
        match self
            .current_executable()
            .and_then(|handle| self.store.executable_mut(handle))
        {
            Some(item) => item.parameters.push(Parameter {
                name: name.to_string(),
                value: value.to_string(),
            }),
            None => debug!("Parameter '{}' outside a test", name),
        }
    }

    pub fn description(&mut self, text: &str) {
        if let Some(test) = self.open_test_uuid().and_then(|id| self.store.test_mut(id)) {
            test.description = Some(text.to_string());
        }
    }

    /// Inline attachment; `content` is base64
    pub fn attachment(&mut self, name: &str, content: &str, content_type: &str) {
        let bytes = match BASE64.decode(content) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Attachment '{}' dropped: {}", name, e);
                return;
            }
        };
        let file_name = model::attachment_file_name(
            &Uuid::new_v4().to_string(),
            model::extension_for(content_type),
        );
        self.add_attachment(
            Attachment {
                name: name.to_string(),
                source: file_name,
                content_type: content_type.to_string(),
            },
            AttachmentSource::Content(bytes),
        );
    }

    /// Copy a screenshot into the results and attach it to the innermost open entity
    pub fn screenshot(&mut self, path: &Path, name: Option<&str>) {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_string();
        let name = name
            .map(str::to_string)
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "screenshot".to_string());
        let file_name = model::attachment_file_name(&Uuid::new_v4().to_string(), &extension);
        self.add_attachment(
            Attachment {
                name,
                source: file_name,
                content_type: model::content_type_for(&extension).to_string(),
            },
            AttachmentSource::File(path.to_path_buf()),
        );
    }

    fn add_attachment(&mut self, attachment: Attachment, source: AttachmentSource) {
        let Some(item) = self
            .current_executable()
            .and_then(|handle| self.store.executable_mut(handle))
        else {
            debug!("Attachment '{}' outside a test", attachment.name);
            return;
        };
        let file_name = attachment.source.clone();
        item.attachments.push(attachment);
        let identity = self.identity().to_string();
        self.writer.write_attachment(&identity, &file_name, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_kind_classify() {
        assert_eq!(HookKind::classify("\"before all\" hook"), HookKind::Before);
        assert_eq!(
            HookKind::classify("\"before each\" hook for \"works\""),
            HookKind::BeforeEach
        );
        assert_eq!(HookKind::classify("\"after all\" hook"), HookKind::After);
        assert_eq!(HookKind::classify("\"after each\" hook"), HookKind::AfterEach);
        assert_eq!(HookKind::classify("setup"), HookKind::Before);
        assert!(HookKind::AfterEach.is_per_test());
        assert!(!HookKind::After.is_per_test());
    }

    #[test]
    fn test_environment_labels() {
        let options = ReporterOptions::default().with_environment_labels();
        assert!(options.default_labels.iter().any(|l| l.name == "host"));
        assert!(options.default_labels.iter().any(|l| l.name == "thread"));
    }
}
