pub mod counter;
pub mod resource_tree;
pub mod validation;

use std::collections::BTreeMap;

use crate::api::jobspec_dto::{
    AttributesDto, FileDto, JobMetaDto, JobspecDto, OutputDto, RequirementDto, SystemAttributesDto, TaskCountDto, TaskDto,
};
use crate::domain::jobspec::resource_tree::{ResourceKey, ResourceTree};
use crate::error::{Error, ParseError, Result, ValidationError};

/// The only jobspec schema version this crate understands.
pub const SUPPORTED_VERSION: i64 = 1;

/// A validated, scheduler-agnostic job description.
///
/// Built only through `TryFrom<JobspecDto>`, which runs every validation rule; after that
/// nothing in the crate mutates it. The matcher and the translators read it and produce new
/// artifacts.
#[derive(Debug, Clone)]
pub struct Jobspec {
    pub version: i64,
    pub resources: ResourceTree,
    pub tasks: Vec<Task>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub command: Vec<String>,

    /// Label of the resource each instance of this task is placed into.
    pub slot: String,

    /// Instances of the command per matched slot.
    pub per_slot: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes {
    pub system: SystemAttributes,
    pub user: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemAttributes {
    /// Wall-clock limit in seconds.
    pub duration: Option<u64>,

    /// Requirements keyed by subsystem type (`software`, ...).
    pub requires: BTreeMap<String, Vec<Requirement>>,

    /// Embedded payloads, e.g. the batch script a job was created from.
    pub files: BTreeMap<String, EmbeddedFile>,

    pub queue: Option<String>,
    pub cwd: Option<String>,
    pub container: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub job_name: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,

    /// System attributes without a dedicated field, kept as found.
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A requirement against a non-containment subsystem, e.g. `{name: curl, type: binary}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub name: String,
    pub typ: Option<String>,

    /// Additional attributes a matching subsystem node must carry with equal values.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedFile {
    /// POSIX mode bits, e.g. `0o100700`.
    pub mode: u32,
    pub encoding: String,
    pub data: String,
}

impl Jobspec {
    /// Parses and validates a JSON or YAML document. YAML is a superset of JSON, so a single
    /// parser handles both.
    pub fn from_document(text: &str) -> Result<Self> {
        let dto: JobspecDto = serde_yaml::from_str(text).map_err(ParseError::Yaml)?;
        Ok(Jobspec::try_from(dto)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let dto: JobspecDto = serde_json::from_str(text).map_err(ParseError::Json)?;
        Ok(Jobspec::try_from(dto)?)
    }

    pub fn to_dto(&self) -> JobspecDto {
        JobspecDto::from(self)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.to_dto()).map_err(|e| Error::ParseError(ParseError::Yaml(e)))
    }

    /// Per-type totals across the whole resource tree.
    pub fn count_resources(&self) -> BTreeMap<String, u64> {
        counter::count_resources(&self.resources)
    }

    /// The resource a task is placed into. Validation guarantees exactly one exists.
    pub fn slot_of(&self, task: &Task) -> Option<ResourceKey> {
        self.resources.labeled(&task.slot).first().copied()
    }

    pub fn requirements(&self, subsystem_type: &str) -> &[Requirement] {
        self.attributes.system.requires.get(subsystem_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl TryFrom<JobspecDto> for Jobspec {
    type Error = ValidationError;

    fn try_from(dto: JobspecDto) -> std::result::Result<Self, Self::Error> {
        // Phase 1: Build the arena so validation can use the same lookups the matcher uses.
        let resources = ResourceTree::from_dtos(&dto.resources);

        // Phase 2: Validate everything, reporting all problems together.
        validation::validate(&dto, &resources)?;

        // Phase 3: Convert the remaining sections. Signs were checked in phase 2.
        let tasks = dto
            .tasks
            .into_iter()
            .map(|task| Task { command: task.command, slot: task.slot, per_slot: u64::try_from(task.count.per_slot).unwrap_or(1) })
            .collect();

        let system = dto.attributes.system;
        let requires = system
            .requires
            .into_iter()
            .map(|(subsystem, entries)| {
                let requirements =
                    entries.into_iter().map(|entry| Requirement { name: entry.name, typ: entry.typ, attributes: entry.attributes }).collect();
                (subsystem, requirements)
            })
            .collect();

        let files = system
            .files
            .into_iter()
            .map(|(name, file)| (name, EmbeddedFile { mode: file.mode, encoding: file.encoding, data: file.data }))
            .collect();

        let (stdout, stderr) = match system.output {
            Some(output) => (output.stdout, output.stderr),
            None => (None, None),
        };

        let system = SystemAttributes {
            duration: system.duration.and_then(|duration| u64::try_from(duration).ok()),
            requires,
            files,
            queue: system.queue,
            cwd: system.cwd,
            container: system.container,
            environment: system.environment,
            job_name: system.job.and_then(|job| job.name),
            stdout,
            stderr,
            extra: system.extra,
        };

        Ok(Jobspec { version: dto.version, resources, tasks, attributes: Attributes { system, user: dto.attributes.user } })
    }
}

impl From<&Jobspec> for JobspecDto {
    fn from(job: &Jobspec) -> Self {
        let system = &job.attributes.system;

        let output = if system.stdout.is_some() || system.stderr.is_some() {
            Some(OutputDto { stdout: system.stdout.clone(), stderr: system.stderr.clone() })
        } else {
            None
        };

        JobspecDto {
            version: job.version,
            resources: job.resources.to_dtos(),
            tasks: job
                .tasks
                .iter()
                .map(|task| TaskDto {
                    command: task.command.clone(),
                    slot: task.slot.clone(),
                    count: TaskCountDto { per_slot: i64::try_from(task.per_slot).unwrap_or(i64::MAX) },
                })
                .collect(),
            attributes: AttributesDto {
                system: SystemAttributesDto {
                    duration: system.duration.map(|duration| i64::try_from(duration).unwrap_or(i64::MAX)),
                    requires: system
                        .requires
                        .iter()
                        .map(|(subsystem, requirements)| {
                            let entries = requirements
                                .iter()
                                .map(|r| RequirementDto { name: r.name.clone(), typ: r.typ.clone(), attributes: r.attributes.clone() })
                                .collect();
                            (subsystem.clone(), entries)
                        })
                        .collect(),
                    files: system
                        .files
                        .iter()
                        .map(|(name, file)| {
                            (name.clone(), FileDto { mode: file.mode, encoding: file.encoding.clone(), data: file.data.clone() })
                        })
                        .collect(),
                    queue: system.queue.clone(),
                    cwd: system.cwd.clone(),
                    container: system.container.clone(),
                    environment: system.environment.clone(),
                    job: system.job_name.clone().map(|name| JobMetaDto { name: Some(name) }),
                    output,
                    extra: system.extra.clone(),
                },
                user: job.attributes.user.clone(),
            },
        }
    }
}
