use lazy_static::lazy_static;

use crate::domain::directive::PBS_SYNTAX;
use crate::domain::directive::grammar::{Arity, OptionGrammar, OptionSpec};
use crate::domain::transform::TransformFormat;
use crate::domain::transform::batch::{BatchScriptTransformer, OptionMapping, grammar_for, parse_count, parse_pair_list, render_pair_list, some};
use crate::domain::transform::request::{JobField, JobRequest, Priority};
use crate::domain::transform::timefmt::{
    PBS_BEGIN_FORMAT, format_epoch, format_memory, format_pbs_time, parse_epoch, parse_memory_mb, parse_pbs_time,
};

/// `-p` priorities for `[low, normal, high, urgent]`, PBS accepts -1024..1023.
pub const PRIORITY_SCALE: [i64; 4] = [-500, 0, 500, 1000];

/// `-l` lines: the chunk request, the walltime and exclusive placement. Constraints become
/// boolean host resources of the chunk, `:skylake=true`.
fn render_resources(request: &JobRequest) -> Vec<String> {
    let mut lines = Vec::new();

    let chunk_fields =
        [JobField::NumNodes, JobField::NumTasks, JobField::CpusPerTask, JobField::GpusPerTask, JobField::MemoryPerTask, JobField::Constraints];
    if chunk_fields.iter().any(|field| request.is_set(*field)) {
        let tasks_per_node = request.tasks_per_node();
        let mut select = format!(
            "select={}:ncpus={}:mpiprocs={}",
            request.num_nodes.unwrap_or(1),
            tasks_per_node.saturating_mul(request.cpus_per_task.unwrap_or(1)),
            tasks_per_node
        );
        if let Some(gpus) = request.gpus_per_task {
            select.push_str(&format!(":ngpus={}", tasks_per_node.saturating_mul(gpus)));
        }
        if let Some(memory) = request.mem_per_task {
            select.push_str(&format!(":mem={}b", format_memory(tasks_per_node.saturating_mul(memory)).to_ascii_lowercase()));
        }
        for constraint in &request.constraints {
            select.push_str(&format!(":{}=true", constraint));
        }
        lines.push(select);
    }
    if let Some(wall_time) = request.wall_time {
        lines.push(format!("walltime={}", format_pbs_time(wall_time)));
    }
    if request.exclusive {
        lines.push("place=excl".to_string());
    }
    lines
}

/// Reads `select=N:ncpus=C:mpiprocs=M:ngpus=G:mem=S`, Torque style `nodes=N:ppn=P`, `walltime=`
/// and `place=excl`. Several resources may share one `-l`, separated by commas. Chunk parts set
/// to `true` and bare Torque node properties are read as constraints.
fn apply_resources(request: &mut JobRequest, value: &str) -> Result<(), String> {
    for resource in value.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        let (key, rest) = resource.split_once('=').ok_or_else(|| format!("expected RESOURCE=VALUE, got '{}'", resource))?;

        match key {
            "select" | "nodes" => {
                let mut parts = rest.split(':');
                let nodes = parse_count(parts.next().unwrap_or_default())?;

                let mut per_node_tasks = 1;
                let mut ncpus = None;
                let mut ngpus = None;
                let mut memory = None;
                for part in parts {
                    let Some((name, amount)) = part.split_once('=') else {
                        if key == "nodes" && !part.is_empty() {
                            request.constraints.push(part.to_string());
                            continue;
                        }
                        return Err(format!("expected NAME=COUNT, got '{}'", part));
                    };
                    match name {
                        "mpiprocs" | "ppn" => per_node_tasks = parse_count(amount)?,
                        "ncpus" => ncpus = Some(parse_count(amount)?),
                        "ngpus" => ngpus = Some(parse_count(amount)?),
                        "mem" => memory = Some(parse_memory_mb(amount)?),
                        _ if amount.eq_ignore_ascii_case("true") => request.constraints.push(name.to_string()),
                        _ => {}
                    }
                }

                let tasks =
                    nodes.checked_mul(per_node_tasks).ok_or_else(|| format!("{} chunks of {} tasks is out of range", nodes, per_node_tasks))?;
                request.num_nodes = Some(nodes);
                request.num_tasks = Some(tasks);
                if let Some(ncpus) = ncpus {
                    request.cpus_per_task = Some((ncpus / per_node_tasks).max(1));
                }
                if let Some(ngpus) = ngpus {
                    request.gpus_per_task = Some((ngpus / per_node_tasks).max(1));
                }
                if let Some(memory) = memory {
                    request.mem_per_task = Some((memory / per_node_tasks).max(1));
                }
            }
            "walltime" => request.wall_time = Some(parse_pbs_time(rest)?),
            "place" => request.exclusive |= rest.split(':').any(|p| p == "excl" || p == "exclhost"),
            _ => {}
        }
    }
    Ok(())
}

lazy_static! {
    pub static ref PBS_TABLE: Vec<OptionMapping> = vec![
        OptionMapping {
            fields: &[JobField::JobName],
            spec: OptionSpec::short("N", Arity::Value),
            render: |r| some(&r.job_name),
            apply: |r, v| {
                r.job_name = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Account],
            spec: OptionSpec::short("A", Arity::Value),
            render: |r| some(&r.account),
            apply: |r, v| {
                r.account = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[
                JobField::NumNodes,
                JobField::NumTasks,
                JobField::CpusPerTask,
                JobField::GpusPerTask,
                JobField::MemoryPerTask,
                JobField::Constraints,
                JobField::WallTime,
                JobField::Exclusive,
            ],
            spec: OptionSpec::short("l", Arity::Value),
            render: render_resources,
            apply: apply_resources,
        },
        OptionMapping {
            fields: &[JobField::Queue],
            spec: OptionSpec::short("q", Arity::Value),
            render: |r| some(&r.queue),
            apply: |r, v| {
                r.queue = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::OutputFile],
            spec: OptionSpec::short("o", Arity::Value),
            render: |r| some(&r.output_file),
            apply: |r, v| {
                r.output_file = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::ErrorFile],
            spec: OptionSpec::short("e", Arity::Value),
            render: |r| some(&r.error_file),
            apply: |r, v| {
                r.error_file = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Environment],
            spec: OptionSpec::short("v", Arity::Value),
            render: |r| render_pair_list("", r),
            apply: |r, v| {
                r.environment.extend(parse_pair_list(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Priority],
            spec: OptionSpec::short("p", Arity::Value),
            render: |r| r.priority.map(|p| p.to_scale(&PRIORITY_SCALE).to_string()).into_iter().collect(),
            apply: |r, v| {
                let priority: i64 = v.trim().parse().map_err(|_| "expected an integer priority".to_string())?;
                r.priority = Some(Priority::from_scale(priority, &PRIORITY_SCALE));
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::BeginTime],
            spec: OptionSpec::short("a", Arity::Value),
            render: |r| r.begin_time.and_then(|t| format_epoch(t, PBS_BEGIN_FORMAT)).into_iter().collect(),
            apply: |r, v| {
                r.begin_time = Some(parse_epoch(v, PBS_BEGIN_FORMAT)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::DependsOn],
            spec: OptionSpec::short("W", Arity::Value),
            render: |r| if r.depends_on.is_empty() { Vec::new() } else { vec![format!("depend=afterok:{}", r.depends_on.join(":"))] },
            apply: |r, v| {
                // Other `-W` attributes are accepted and ignored.
                if let Some(depend) = v.strip_prefix("depend=") {
                    for condition in depend.split(',') {
                        let (_, ids) = condition.split_once(':').ok_or_else(|| "expected depend=TYPE:JOBID".to_string())?;
                        r.depends_on.extend(ids.split(':').filter(|id| !id.is_empty()).map(str::to_string));
                    }
                }
                Ok(())
            },
        },
    ];
    pub static ref PBS_GRAMMAR: OptionGrammar = grammar_for("qsub", &PBS_TABLE);
}

pub fn transformer() -> BatchScriptTransformer {
    BatchScriptTransformer { format: TransformFormat::Pbs, syntax: PBS_SYNTAX, table: &PBS_TABLE, grammar: &PBS_GRAMMAR, launcher: "mpiexec" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_chunk_round_trip() {
        let request = JobRequest { num_nodes: Some(2), num_tasks: Some(8), cpus_per_task: Some(2), gpus_per_task: Some(1), ..Default::default() };
        let lines = render_resources(&request);
        assert_eq!(lines, vec!["select=2:ncpus=8:mpiprocs=4:ngpus=4"]);

        let mut parsed = JobRequest::default();
        apply_resources(&mut parsed, &lines[0]).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_torque_nodes_and_walltime() {
        let mut parsed = JobRequest::default();
        apply_resources(&mut parsed, "nodes=3:ppn=2,walltime=01:30:00").unwrap();
        assert_eq!(parsed.num_nodes, Some(3));
        assert_eq!(parsed.num_tasks, Some(6));
        assert_eq!(parsed.wall_time, Some(5400));
    }

    #[test]
    fn test_memory_and_features_in_chunk() {
        let request = JobRequest {
            num_nodes: Some(2),
            num_tasks: Some(4),
            mem_per_task: Some(4096),
            constraints: vec!["skylake".to_string()],
            ..Default::default()
        };
        let lines = render_resources(&request);
        assert_eq!(lines, vec!["select=2:ncpus=2:mpiprocs=2:mem=8gb:skylake=true"]);

        let mut parsed = JobRequest::default();
        apply_resources(&mut parsed, &lines[0]).unwrap();
        assert_eq!(parsed.mem_per_task, Some(4096));
        assert_eq!(parsed.constraints, vec!["skylake"]);

        let mut torque = JobRequest::default();
        apply_resources(&mut torque, "nodes=1:ppn=4:bigmem").unwrap();
        assert_eq!(torque.constraints, vec!["bigmem"]);
    }

    #[test]
    fn test_oversized_chunk_is_rejected() {
        let mut parsed = JobRequest::default();
        let error = apply_resources(&mut parsed, "select=9999999999:mpiprocs=9999999999").unwrap_err();
        assert!(error.contains("out of range"), "{}", error);
    }

    #[test]
    fn test_render_saturates_chunk_counts() {
        let request =
            JobRequest { num_nodes: Some(1), num_tasks: Some(u64::MAX), cpus_per_task: Some(4), gpus_per_task: Some(2), ..Default::default() };
        let lines = render_resources(&request);
        assert_eq!(lines[0], format!("select=1:ncpus={}:mpiprocs={}:ngpus={}", u64::MAX, u64::MAX, u64::MAX));
    }
}
