use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::api::jobspec_dto::{
    AttributesDto, FileDto, JobMetaDto, JobspecDto, OutputDto, ResourceDto, SystemAttributesDto, TaskCountDto, TaskDto,
};
use crate::domain::jobspec::{EmbeddedFile, Jobspec, SUPPORTED_VERSION};
use crate::domain::transform::timefmt::ceil_div;
use crate::error::ValidationError;

/// Label given to the slot resource when building a jobspec from a request.
pub const TASK_SLOT_LABEL: &str = "task";

/// Name of the embedded file holding a job's batch script.
pub const SCRIPT_FILE: &str = "script";

/// Mode of the embedded batch script: a regular file, `rwx` for the owner.
pub const SCRIPT_FILE_MODE: u32 = 0o100700;

const ACCOUNT_KEY: &str = "account";
const PRIORITY_KEY: &str = "priority";
const BEGIN_TIME_KEY: &str = "begin-time";
const DEPENDENCIES_KEY: &str = "dependencies";
const MEMORY_KEY: &str = "memory-per-task";
const CONSTRAINTS_KEY: &str = "constraints";

/// Scheduler independent urgency, mapped onto each scheduler's own scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Normal, Priority::High, Priority::Urgent];

    /// Value of this level on a scheduler scale given as `[low, normal, high, urgent]`.
    pub fn to_scale(self, scale: &[i64; 4]) -> i64 {
        scale[self as usize]
    }

    /// The level whose scale value is closest to `value`; ties go to the lower level.
    pub fn from_scale(value: i64, scale: &[i64; 4]) -> Priority {
        Priority::ALL.iter().copied().min_by_key(|level| (scale[*level as usize] - value).unsigned_abs()).unwrap_or(Priority::Normal)
    }

    pub fn parse(text: &str) -> Option<Priority> {
        match text.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{}", text)
    }
}

/// The fields of a `JobRequest`, used to describe what a target format can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobField {
    JobName,
    Account,
    NumNodes,
    NumTasks,
    CpusPerTask,
    GpusPerTask,
    MemoryPerTask,
    Constraints,
    WallTime,
    Queue,
    OutputFile,
    ErrorFile,
    ContainerImage,
    Command,
    Exclusive,
    WorkingDirectory,
    Environment,
    Priority,
    BeginTime,
    DependsOn,
    Attributes,
    Files,
    Script,
}

impl JobField {
    pub const ALL: [JobField; 23] = [
        JobField::JobName,
        JobField::Account,
        JobField::NumNodes,
        JobField::NumTasks,
        JobField::CpusPerTask,
        JobField::GpusPerTask,
        JobField::MemoryPerTask,
        JobField::Constraints,
        JobField::WallTime,
        JobField::Queue,
        JobField::OutputFile,
        JobField::ErrorFile,
        JobField::ContainerImage,
        JobField::Command,
        JobField::Exclusive,
        JobField::WorkingDirectory,
        JobField::Environment,
        JobField::Priority,
        JobField::BeginTime,
        JobField::DependsOn,
        JobField::Attributes,
        JobField::Files,
        JobField::Script,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobField::JobName => "job_name",
            JobField::Account => "account",
            JobField::NumNodes => "num_nodes",
            JobField::NumTasks => "num_tasks",
            JobField::CpusPerTask => "cpus_per_task",
            JobField::GpusPerTask => "gpus_per_task",
            JobField::MemoryPerTask => "mem_per_task",
            JobField::Constraints => "constraints",
            JobField::WallTime => "wall_time",
            JobField::Queue => "queue",
            JobField::OutputFile => "output_file",
            JobField::ErrorFile => "error_file",
            JobField::ContainerImage => "container_image",
            JobField::Command => "command",
            JobField::Exclusive => "exclusive",
            JobField::WorkingDirectory => "working_directory",
            JobField::Environment => "environment",
            JobField::Priority => "priority",
            JobField::BeginTime => "begin_time",
            JobField::DependsOn => "depends_on",
            JobField::Attributes => "attributes",
            JobField::Files => "files",
            JobField::Script => "script",
        }
    }
}

impl fmt::Display for JobField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Flat, scheduler agnostic job description the translation tables read and write.
///
/// A jobspec is converted into a request before export and built back from one on import;
/// both directions lose whatever the other side cannot express.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobRequest {
    pub job_name: Option<String>,
    pub account: Option<String>,
    pub num_nodes: Option<u64>,

    /// Total task count across all nodes.
    pub num_tasks: Option<u64>,
    pub cpus_per_task: Option<u64>,
    pub gpus_per_task: Option<u64>,

    /// Megabytes.
    pub mem_per_task: Option<u64>,

    /// Node features the job must run on, e.g. `skylake`.
    pub constraints: Vec<String>,

    /// Seconds.
    pub wall_time: Option<u64>,
    pub queue: Option<String>,
    pub output_file: Option<String>,
    pub error_file: Option<String>,
    pub container_image: Option<String>,
    pub command: Vec<String>,
    pub exclusive: bool,
    pub working_directory: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub priority: Option<Priority>,

    /// Earliest start, epoch seconds UTC.
    pub begin_time: Option<i64>,
    pub depends_on: Vec<String>,
    pub attributes: BTreeMap<String, String>,

    /// Embedded payloads other than the batch script.
    pub files: BTreeMap<String, EmbeddedFile>,
    pub script: Option<String>,
}

impl JobRequest {
    pub fn is_set(&self, field: JobField) -> bool {
        match field {
            JobField::JobName => self.job_name.is_some(),
            JobField::Account => self.account.is_some(),
            JobField::NumNodes => self.num_nodes.is_some(),
            JobField::NumTasks => self.num_tasks.is_some(),
            JobField::CpusPerTask => self.cpus_per_task.is_some(),
            JobField::GpusPerTask => self.gpus_per_task.is_some(),
            JobField::MemoryPerTask => self.mem_per_task.is_some(),
            JobField::Constraints => !self.constraints.is_empty(),
            JobField::WallTime => self.wall_time.is_some(),
            JobField::Queue => self.queue.is_some(),
            JobField::OutputFile => self.output_file.is_some(),
            JobField::ErrorFile => self.error_file.is_some(),
            JobField::ContainerImage => self.container_image.is_some(),
            JobField::Command => !self.command.is_empty(),
            JobField::Exclusive => self.exclusive,
            JobField::WorkingDirectory => self.working_directory.is_some(),
            JobField::Environment => !self.environment.is_empty(),
            JobField::Priority => self.priority.is_some(),
            JobField::BeginTime => self.begin_time.is_some(),
            JobField::DependsOn => !self.depends_on.is_empty(),
            JobField::Attributes => !self.attributes.is_empty(),
            JobField::Files => !self.files.is_empty(),
            JobField::Script => self.script.is_some(),
        }
    }

    /// Tasks per node, rounded up. One node when none was requested.
    pub fn tasks_per_node(&self) -> u64 {
        ceil_div(self.num_tasks.unwrap_or(1), self.num_nodes.unwrap_or(1).max(1))
    }

    /// Flattens a validated jobspec. Counts are read off the first task's slot: tasks are slot
    /// instances times `per_slot`, cores and gpus are those inside one slot divided among its
    /// tasks.
    pub fn from_jobspec(jobspec: &Jobspec) -> JobRequest {
        let tree = &jobspec.resources;
        let system = &jobspec.attributes.system;
        let mut request = JobRequest::default();

        let node_key = tree.walk().into_iter().find(|key| tree.node(*key).typ == "node");
        if let Some(node_key) = node_key {
            request.num_nodes = Some(tree.total_count(node_key));
            request.exclusive = tree.node(node_key).exclusive;
        }

        if let Some(task) = jobspec.tasks.first() {
            request.command = task.command.clone();

            if let Some(slot) = jobspec.slot_of(task) {
                let per_slot = task.per_slot.max(1);
                request.num_tasks = Some(tree.total_count(slot).saturating_mul(per_slot));
                request.exclusive |= tree.node(slot).exclusive;

                let cores = tree.count_within(slot, "core");
                if cores > 0 {
                    request.cpus_per_task = Some((cores / per_slot).max(1));
                }
                let gpus = tree.count_within(slot, "gpu");
                if gpus > 0 {
                    request.gpus_per_task = Some((gpus / per_slot).max(1));
                }
            }
        }

        request.wall_time = system.duration;
        request.queue = system.queue.clone();
        request.working_directory = system.cwd.clone();
        request.container_image = system.container.clone();
        request.environment = system.environment.clone();
        request.job_name = system.job_name.clone();
        request.output_file = system.stdout.clone();
        request.error_file = system.stderr.clone();

        for (name, file) in &system.files {
            if name == SCRIPT_FILE {
                request.script = Some(file.data.clone());
            } else {
                request.files.insert(name.clone(), file.clone());
            }
        }

        // A script-only job runs its script through the broker; that command is not user input.
        if request.script.is_some() && request.command == broker_command() {
            request.command.clear();
        }

        request.account = system.extra.get(ACCOUNT_KEY).and_then(|v| v.as_str()).map(str::to_string);
        request.priority = system.extra.get(PRIORITY_KEY).and_then(|v| v.as_str()).and_then(Priority::parse);
        request.begin_time = system.extra.get(BEGIN_TIME_KEY).and_then(|v| v.as_i64());
        request.depends_on = system
            .extra
            .get(DEPENDENCIES_KEY)
            .and_then(|v| v.as_array())
            .map(|ids| ids.iter().filter_map(|id| id.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        request.mem_per_task = system.extra.get(MEMORY_KEY).and_then(|v| v.as_u64());
        request.constraints = system
            .extra
            .get(CONSTRAINTS_KEY)
            .and_then(|v| v.as_array())
            .map(|names| names.iter().filter_map(|name| name.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        request.attributes = jobspec
            .attributes
            .user
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect();

        request
    }

    /// Builds and validates a jobspec: `node(N) { slot(tasks/N) { core(c), gpu(g) } }`, or the
    /// slot at the root when no node count was requested.
    pub fn to_jobspec(&self) -> Result<Jobspec, ValidationError> {
        let cores = self.cpus_per_task.unwrap_or(1).max(1);
        let mut slot_children = vec![ResourceDto { typ: "core".to_string(), count: to_i64(cores), with: Vec::new(), label: None, exclusive: None }];
        if let Some(gpus) = self.gpus_per_task.filter(|gpus| *gpus > 0) {
            slot_children.push(ResourceDto { typ: "gpu".to_string(), count: to_i64(gpus), with: Vec::new(), label: None, exclusive: None });
        }

        let exclusive = if self.exclusive { Some(true) } else { None };
        let resources = match self.num_nodes {
            Some(nodes) => {
                let slot = ResourceDto {
                    typ: "slot".to_string(),
                    count: to_i64(self.tasks_per_node()),
                    with: slot_children,
                    label: Some(TASK_SLOT_LABEL.to_string()),
                    exclusive: None,
                };
                vec![ResourceDto { typ: "node".to_string(), count: to_i64(nodes), with: vec![slot], label: None, exclusive }]
            }
            None => vec![ResourceDto {
                typ: "slot".to_string(),
                count: to_i64(self.num_tasks.unwrap_or(1)),
                with: slot_children,
                label: Some(TASK_SLOT_LABEL.to_string()),
                exclusive,
            }],
        };

        let command = if self.command.is_empty() && self.script.is_some() { broker_command() } else { self.command.clone() };

        let mut files: BTreeMap<String, FileDto> = self
            .files
            .iter()
            .map(|(name, file)| (name.clone(), FileDto { mode: file.mode, encoding: file.encoding.clone(), data: file.data.clone() }))
            .collect();
        if let Some(script) = &self.script {
            files.insert(SCRIPT_FILE.to_string(), FileDto { mode: SCRIPT_FILE_MODE, encoding: "utf-8".to_string(), data: script.clone() });
        }

        let mut extra = BTreeMap::new();
        if let Some(account) = &self.account {
            extra.insert(ACCOUNT_KEY.to_string(), serde_json::Value::from(account.clone()));
        }
        if let Some(priority) = self.priority {
            extra.insert(PRIORITY_KEY.to_string(), serde_json::Value::from(priority.to_string()));
        }
        if let Some(begin) = self.begin_time {
            extra.insert(BEGIN_TIME_KEY.to_string(), serde_json::Value::from(begin));
        }
        if !self.depends_on.is_empty() {
            extra.insert(DEPENDENCIES_KEY.to_string(), serde_json::Value::from(self.depends_on.clone()));
        }
        if let Some(memory) = self.mem_per_task {
            extra.insert(MEMORY_KEY.to_string(), serde_json::Value::from(memory));
        }
        if !self.constraints.is_empty() {
            extra.insert(CONSTRAINTS_KEY.to_string(), serde_json::Value::from(self.constraints.clone()));
        }

        let output = if self.output_file.is_some() || self.error_file.is_some() {
            Some(OutputDto { stdout: self.output_file.clone(), stderr: self.error_file.clone() })
        } else {
            None
        };

        let dto = JobspecDto {
            version: SUPPORTED_VERSION,
            resources,
            tasks: vec![TaskDto { command, slot: TASK_SLOT_LABEL.to_string(), count: TaskCountDto { per_slot: 1 } }],
            attributes: AttributesDto {
                system: SystemAttributesDto {
                    duration: self.wall_time.map(to_i64),
                    requires: BTreeMap::new(),
                    files,
                    queue: self.queue.clone(),
                    cwd: self.working_directory.clone(),
                    container: self.container_image.clone(),
                    environment: self.environment.clone(),
                    job: self.job_name.clone().map(|name| JobMetaDto { name: Some(name) }),
                    output,
                    extra,
                },
                user: self.attributes.iter().map(|(key, value)| (key.clone(), serde_json::Value::from(value.clone()))).collect(),
            },
        };

        Jobspec::try_from(dto)
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Command that runs the embedded script inside a job's own broker instance.
fn broker_command() -> Vec<String> {
    vec!["flux".to_string(), "broker".to_string(), format!("{{{{tmpdir}}}}/{}", SCRIPT_FILE)]
}

const NAME_ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "daring", "eager", "fuzzy", "gentle", "hidden", "icy", "jolly", "keen", "lucky", "misty", "nimble", "quiet",
    "rapid", "silent", "tidy", "vivid", "witty",
];

const NAME_NOUNS: &[&str] = &[
    "badger", "comet", "dolphin", "falcon", "glacier", "harbor", "island", "lantern", "meadow", "nebula", "otter", "pebble", "quasar",
    "river", "sparrow", "thunder", "valley", "walrus", "yak", "zephyr",
];

/// A readable random job name such as `misty-otter-0421`.
pub fn generate_job_name() -> String {
    let mut rng = rand::rng();
    let adjective = NAME_ADJECTIVES.choose(&mut rng).copied().unwrap_or("quiet");
    let noun = NAME_NOUNS.choose(&mut rng).copied().unwrap_or("otter");
    format!("{}-{}-{:04}", adjective, noun, rng.random_range(0..10000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_scale_lookup() {
        let scale = [10, 50, 100, 200];
        assert_eq!(Priority::High.to_scale(&scale), 100);
        assert_eq!(Priority::from_scale(120, &scale), Priority::High);
        assert_eq!(Priority::from_scale(-5, &scale), Priority::Low);
    }

    #[test]
    fn test_generated_name_shape() {
        let name = generate_job_name();
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_request_to_jobspec_and_back() {
        let request = JobRequest {
            num_nodes: Some(2),
            num_tasks: Some(8),
            cpus_per_task: Some(2),
            wall_time: Some(3600),
            command: vec!["hostname".to_string()],
            priority: Some(Priority::High),
            mem_per_task: Some(2048),
            constraints: vec!["skylake".to_string()],
            ..Default::default()
        };

        let jobspec = request.to_jobspec().unwrap();
        let counts = jobspec.count_resources();
        assert_eq!(counts.get("node"), Some(&2));
        assert_eq!(counts.get("slot"), Some(&8));
        assert_eq!(counts.get("core"), Some(&16));

        let back = JobRequest::from_jobspec(&jobspec);
        assert_eq!(back, request);
    }

    #[test]
    fn test_script_only_request_runs_broker() {
        let request = JobRequest { script: Some("#!/bin/bash\nhostname\n".to_string()), ..Default::default() };
        let jobspec = request.to_jobspec().unwrap();

        assert_eq!(jobspec.tasks[0].command, broker_command());
        assert_eq!(jobspec.attributes.system.files.get(SCRIPT_FILE).map(|f| f.mode), Some(SCRIPT_FILE_MODE));
        assert_eq!(JobRequest::from_jobspec(&jobspec).command, Vec::<String>::new());
    }
}
