use lazy_static::lazy_static;

use crate::domain::directive::LSF_SYNTAX;
use crate::domain::directive::grammar::{Arity, OptionGrammar, OptionSpec};
use crate::domain::transform::TransformFormat;
use crate::domain::transform::batch::{
    BatchScriptTransformer, OptionMapping, flag, grammar_for, parse_count, parse_pair_list, render_pair_list, some, some_count,
};
use crate::domain::transform::request::{JobField, JobRequest, Priority};
use crate::domain::transform::timefmt::{LSF_BEGIN_FORMAT, format_epoch, format_lsf_time, parse_epoch, parse_lsf_time, parse_memory_mb};

/// `-sp` user priorities for `[low, normal, high, urgent]`.
pub const PRIORITY_SCALE: [i64; 4] = [10, 50, 100, 200];

/// One `-R` string: `select[a && b] rusage[mem=MB] affinity[core(N)]`.
fn render_requirement(request: &JobRequest) -> Vec<String> {
    let mut sections = Vec::new();
    if !request.constraints.is_empty() {
        sections.push(format!("select[{}]", request.constraints.join(" && ")));
    }
    if let Some(memory) = request.mem_per_task {
        sections.push(format!("rusage[mem={}]", memory));
    }
    if let Some(cores) = request.cpus_per_task {
        sections.push(format!("affinity[core({})]", cores));
    }
    if sections.is_empty() { Vec::new() } else { vec![sections.join(" ")] }
}

/// Text between the brackets of `name[...]`.
fn section<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    let start = value.find(&format!("{}[", name))? + name.len() + 1;
    let rest = &value[start..];
    rest.find(']').map(|end| &rest[..end])
}

/// Reads the core count out of `affinity[core(N)]`, memory out of `rusage[mem=N]` and the bare
/// feature names of `select[...]`. Other resource requirement strings are accepted and ignored.
fn apply_requirement(request: &mut JobRequest, value: &str) -> Result<(), String> {
    if let Some(start) = value.find("core(") {
        let rest = &value[start + "core(".len()..];
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        request.cpus_per_task = Some(parse_count(&rest[..end])?);
    }
    if let Some(usage) = section(value, "rusage") {
        if let Some(memory) = usage.split([',', ':']).find_map(|part| part.trim().strip_prefix("mem=")) {
            request.mem_per_task = Some(parse_memory_mb(memory)?);
        }
    }
    if let Some(select) = section(value, "select") {
        let features = select
            .split("&&")
            .map(str::trim)
            .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        request.constraints.extend(features.map(str::to_string));
    }
    Ok(())
}

/// `done(12) && ended(13)` -> 12, 13
fn apply_dependency(request: &mut JobRequest, value: &str) -> Result<(), String> {
    let mut found = false;
    for (open, _) in value.match_indices('(') {
        let rest = &value[open + 1..];
        let id = rest.split(')').next().unwrap_or_default().trim();
        if !id.is_empty() {
            request.depends_on.push(id.trim_matches('"').to_string());
            found = true;
        }
    }
    if found { Ok(()) } else { Err("expected a condition such as done(JOBID)".to_string()) }
}

lazy_static! {
    pub static ref LSF_TABLE: Vec<OptionMapping> = vec![
        OptionMapping {
            fields: &[JobField::JobName],
            spec: OptionSpec::short("J", Arity::Value),
            render: |r| some(&r.job_name),
            apply: |r, v| {
                r.job_name = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Account],
            spec: OptionSpec::short("P", Arity::Value),
            render: |r| some(&r.account),
            apply: |r, v| {
                r.account = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::NumNodes],
            spec: OptionSpec::short("nnodes", Arity::Value),
            render: |r| some_count(r.num_nodes),
            apply: |r, v| {
                r.num_nodes = Some(parse_count(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::NumTasks],
            spec: OptionSpec::short("n", Arity::Value),
            render: |r| some_count(r.num_tasks),
            apply: |r, v| {
                r.num_tasks = Some(parse_count(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::CpusPerTask, JobField::MemoryPerTask, JobField::Constraints],
            spec: OptionSpec::short("R", Arity::Value),
            render: render_requirement,
            apply: apply_requirement,
        },
        OptionMapping {
            fields: &[JobField::GpusPerTask],
            spec: OptionSpec::short("gpu", Arity::Value),
            render: |r| r.gpus_per_task.map(|g| format!("num={}", g)).into_iter().collect(),
            apply: |r, v| {
                let count = v.split(':').find_map(|part| part.strip_prefix("num=")).ok_or_else(|| "expected num=COUNT".to_string())?;
                r.gpus_per_task = Some(parse_count(count)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::WallTime],
            spec: OptionSpec::short("W", Arity::Value),
            render: |r| r.wall_time.map(format_lsf_time).into_iter().collect(),
            apply: |r, v| {
                r.wall_time = Some(parse_lsf_time(v)?);
                Ok(())
            },
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
            fields: &[JobField::Exclusive],
            spec: OptionSpec::short("x", Arity::Flag),
            render: |r| flag(r.exclusive),
            apply: |r, _| {
                r.exclusive = true;
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::WorkingDirectory],
            spec: OptionSpec::short("cwd", Arity::Value),
            render: |r| some(&r.working_directory),
            apply: |r, v| {
                r.working_directory = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Environment],
            spec: OptionSpec::short("env", Arity::Value),
            render: |r| render_pair_list("all,", r),
            apply: |r, v| {
                r.environment.extend(parse_pair_list(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Priority],
            spec: OptionSpec::short("sp", Arity::Value),
            render: |r| r.priority.map(|p| p.to_scale(&PRIORITY_SCALE).to_string()).into_iter().collect(),
            apply: |r, v| {
                let priority: i64 = v.trim().parse().map_err(|_| "expected an integer priority".to_string())?;
                r.priority = Some(Priority::from_scale(priority, &PRIORITY_SCALE));
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::BeginTime],
            spec: OptionSpec::short("b", Arity::Value),
            render: |r| r.begin_time.and_then(|t| format_epoch(t, LSF_BEGIN_FORMAT)).into_iter().collect(),
            apply: |r, v| {
                r.begin_time = Some(parse_epoch(v, LSF_BEGIN_FORMAT)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::DependsOn],
            spec: OptionSpec::short("w", Arity::Value),
            render: |r| {
                if r.depends_on.is_empty() {
                    return Vec::new();
                }
                let conditions: Vec<String> = r.depends_on.iter().map(|id| format!("done({})", id)).collect();
                vec![conditions.join(" && ")]
            },
            apply: apply_dependency,
        },
    ];
    pub static ref LSF_GRAMMAR: OptionGrammar = grammar_for("bsub", &LSF_TABLE);
}

pub fn transformer() -> BatchScriptTransformer {
    BatchScriptTransformer { format: TransformFormat::Lsf, syntax: LSF_SYNTAX, table: &LSF_TABLE, grammar: &LSF_GRAMMAR, launcher: "jsrun" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_conditions() {
        let mut request = JobRequest::default();
        apply_dependency(&mut request, "done(12) && ended(\"13\")").unwrap();
        assert_eq!(request.depends_on, vec!["12", "13"]);
        assert!(apply_dependency(&mut request, "whenever").is_err());
    }

    #[test]
    fn test_affinity_core_count() {
        let mut request = JobRequest::default();
        apply_requirement(&mut request, "span[ptile=4] affinity[core(3)]").unwrap();
        assert_eq!(request.cpus_per_task, Some(3));
    }

    #[test]
    fn test_requirement_string_round_trip() {
        let request = JobRequest {
            cpus_per_task: Some(2),
            mem_per_task: Some(4096),
            constraints: vec!["skylake".to_string(), "ib".to_string()],
            ..Default::default()
        };
        let lines = render_requirement(&request);
        assert_eq!(lines, vec!["select[skylake && ib] rusage[mem=4096] affinity[core(2)]"]);

        let mut parsed = JobRequest::default();
        apply_requirement(&mut parsed, &lines[0]).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_select_expressions_are_not_features() {
        let mut request = JobRequest::default();
        apply_requirement(&mut request, "select[type==X86_64 && gpu] rusage[mem=2G]").unwrap();
        assert_eq!(request.constraints, vec!["gpu"]);
        assert_eq!(request.mem_per_task, Some(2048));
    }
}
