use std::collections::BTreeMap;

use crate::api::manifest_dto::{ContainerDto, EnvVarDto, JobManifestDto, JobSpecDto, ObjectMetaDto, PodSpecDto, PodTemplateDto, ResourceRequirementsDto};
use crate::domain::directive::shell_words::{join_words, split_words};
use crate::domain::transform::request::{JobField, JobRequest};
use crate::domain::transform::{TransformFormat, Transformer};
use crate::error::{ParseError, Result, TranslationError};

/// Label Kueue reads to place a Job into a queue.
pub const QUEUE_LABEL: &str = "kueue.x-k8s.io/queue-name";

pub const GPU_RESOURCE: &str = "nvidia.com/gpu";

const SHELL: [&str; 2] = ["/bin/bash", "-c"];

const SUPPORTED_FIELDS: [JobField; 11] = [
    JobField::JobName,
    JobField::NumNodes,
    JobField::NumTasks,
    JobField::CpusPerTask,
    JobField::GpusPerTask,
    JobField::WallTime,
    JobField::Queue,
    JobField::ContainerImage,
    JobField::Command,
    JobField::WorkingDirectory,
    JobField::Environment,
];

/// `batch/v1` Job manifests. One pod per requested node; each pod gets the cores of all tasks
/// that would share a node.
pub struct KubernetesTransformer;

/// Lowercase alphanumerics and dashes, as Kubernetes object names require.
fn object_name(name: &str) -> String {
    let cleaned: String = name.to_ascii_lowercase().chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '-' }).collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() { "job".to_string() } else { trimmed.chars().take(63).collect() }
}

/// Parses a CPU quantity (`2`, `1.5`, `500m`) and rounds it up to whole cores.
fn parse_cpu_quantity(quantity: &str) -> Option<u64> {
    let quantity = quantity.trim();
    let cores = match quantity.strip_suffix('m') {
        Some(milli) => milli.parse::<f64>().ok()? / 1000.0,
        None => quantity.parse::<f64>().ok()?,
    };
    if cores <= 0.0 { None } else { Some(cores.ceil() as u64) }
}

impl Transformer for KubernetesTransformer {
    fn format(&self) -> TransformFormat {
        TransformFormat::Kubernetes
    }

    fn supported_fields(&self) -> Vec<JobField> {
        SUPPORTED_FIELDS.to_vec()
    }

    fn render(&self, request: &JobRequest) -> Result<String> {
        let image = request.container_image.clone().ok_or(TranslationError::MissingField { format: "kubernetes", field: "container_image" })?;
        let name = object_name(request.job_name.as_deref().unwrap_or("job"));

        let tasks_per_pod = request.tasks_per_node();
        let mut limits = BTreeMap::new();
        limits.insert("cpu".to_string(), tasks_per_pod.saturating_mul(request.cpus_per_task.unwrap_or(1)).to_string());
        let requests = limits.clone();
        if let Some(gpus) = request.gpus_per_task.filter(|gpus| *gpus > 0) {
            limits.insert(GPU_RESOURCE.to_string(), tasks_per_pod.saturating_mul(gpus).to_string());
        }

        let (command, args) = if request.command.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (SHELL.iter().map(|s| s.to_string()).collect(), vec![join_words(&request.command)])
        };

        let mut labels = BTreeMap::new();
        if let Some(queue) = &request.queue {
            labels.insert(QUEUE_LABEL.to_string(), queue.clone());
        }

        let pods = i64::try_from(request.num_nodes.unwrap_or(1)).unwrap_or(i64::MAX);
        let manifest = JobManifestDto {
            api_version: "batch/v1".to_string(),
            kind: "Job".to_string(),
            metadata: ObjectMetaDto { name: name.clone(), labels },
            spec: JobSpecDto {
                backoff_limit: 0,
                completions: pods,
                parallelism: pods,
                active_deadline_seconds: request.wall_time.and_then(|seconds| i64::try_from(seconds).ok()),
                template: PodTemplateDto {
                    spec: PodSpecDto {
                        restart_policy: "Never".to_string(),
                        containers: vec![ContainerDto {
                            name,
                            image,
                            command,
                            args,
                            working_dir: request.working_directory.clone(),
                            env: request.environment.iter().map(|(k, v)| EnvVarDto { name: k.clone(), value: v.clone() }).collect(),
                            resources: ResourceRequirementsDto { limits, requests },
                        }],
                    },
                },
            },
        };

        serde_yaml::to_string(&manifest).map_err(|e| ParseError::Yaml(e).into())
    }

    /// Reads a Job manifest back. The manifest has no notion of tasks: the pod count becomes
    /// both `num_nodes` and `num_tasks`, and the CPU limit of one pod becomes `cpus_per_task`,
    /// so a request rendered with several tasks per node does not survive the round trip.
    fn parse(&self, text: &str) -> Result<JobRequest> {
        let manifest: JobManifestDto = serde_yaml::from_str(text).map_err(ParseError::Yaml)?;
        let container = manifest
            .spec
            .template
            .spec
            .containers
            .first()
            .ok_or(TranslationError::MissingField { format: "kubernetes", field: "spec.template.spec.containers" })?;

        let mut request = JobRequest::default();
        request.job_name = Some(manifest.metadata.name.clone()).filter(|name| !name.is_empty());
        request.queue = manifest.metadata.labels.get(QUEUE_LABEL).cloned();
        request.container_image = Some(container.image.clone()).filter(|image| !image.is_empty());
        request.working_directory = container.working_dir.clone();
        request.environment = container.env.iter().map(|var| (var.name.clone(), var.value.clone())).collect();
        request.wall_time = manifest.spec.active_deadline_seconds.and_then(|seconds| u64::try_from(seconds).ok());

        let is_shell = container.command.len() == 2 && (container.command[0].ends_with("sh")) && container.command[1] == "-c";
        request.command = if is_shell && container.args.len() == 1 {
            split_words(&container.args[0])
        } else {
            container.command.iter().chain(container.args.iter()).cloned().collect()
        };

        let pods = u64::try_from(manifest.spec.parallelism.max(1)).unwrap_or(1);
        request.num_nodes = Some(pods);
        request.num_tasks = Some(pods);
        request.cpus_per_task = container.resources.limits.get("cpu").or(container.resources.requests.get("cpu")).and_then(|q| parse_cpu_quantity(q));
        request.gpus_per_task = container.resources.limits.get(GPU_RESOURCE).and_then(|q| q.parse::<u64>().ok()).filter(|gpus| *gpus > 0);

        Ok(request)
    }
}
