use lazy_static::lazy_static;

use crate::domain::directive::SLURM_SYNTAX;
use crate::domain::directive::grammar::{Arity, OptionGrammar, OptionSpec};
use crate::domain::transform::TransformFormat;
use crate::domain::transform::batch::{
    BatchScriptTransformer, OptionMapping, flag, grammar_for, parse_count, parse_pair_list, render_pair_list, some, some_count,
};
use crate::domain::transform::request::{JobField, Priority};
use crate::domain::transform::timefmt::{
    SLURM_BEGIN_FORMAT, format_epoch, format_memory, format_slurm_time, parse_epoch, parse_memory_mb, parse_slurm_time,
};

/// `--nice` values for `[low, normal, high, urgent]`. Lower is more urgent; negative values
/// need operator rights on most sites.
pub const NICE_SCALE: [i64; 4] = [1000, 0, -100, -1000];

lazy_static! {
    pub static ref SLURM_TABLE: Vec<OptionMapping> = vec![
        OptionMapping {
            fields: &[JobField::JobName],
            spec: OptionSpec::both("job-name", "J", Arity::Value),
            render: |r| some(&r.job_name),
            apply: |r, v| {
                r.job_name = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Account],
            spec: OptionSpec::both("account", "A", Arity::Value),
            render: |r| some(&r.account),
            apply: |r, v| {
                r.account = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::NumNodes],
            spec: OptionSpec::both("nodes", "N", Arity::Value),
            render: |r| some_count(r.num_nodes),
            apply: |r, v| {
                // Ranges such as `2-4` request the minimum.
                let minimum = v.split('-').next().unwrap_or(v);
                r.num_nodes = Some(parse_count(minimum)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::NumTasks],
            spec: OptionSpec::both("ntasks", "n", Arity::Value),
            render: |r| some_count(r.num_tasks),
            apply: |r, v| {
                r.num_tasks = Some(parse_count(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::CpusPerTask],
            spec: OptionSpec::both("cpus-per-task", "c", Arity::Value),
            render: |r| some_count(r.cpus_per_task),
            apply: |r, v| {
                r.cpus_per_task = Some(parse_count(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::GpusPerTask],
            spec: OptionSpec::long("gpus-per-task", Arity::Value),
            render: |r| some_count(r.gpus_per_task),
            apply: |r, v| {
                // `--gpus-per-task=a100:2` names a model before the count.
                let count = v.rsplit(':').next().unwrap_or(v);
                r.gpus_per_task = Some(parse_count(count)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::MemoryPerTask],
            spec: OptionSpec::long("mem-per-cpu", Arity::Value),
            render: |r| r.mem_per_task.map(format_memory).into_iter().collect(),
            apply: |r, v| {
                r.mem_per_task = Some(parse_memory_mb(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Constraints],
            spec: OptionSpec::both("constraint", "C", Arity::Value),
            render: |r| if r.constraints.is_empty() { Vec::new() } else { vec![r.constraints.join("&")] },
            apply: |r, v| {
                // `a&b`, `a,b` and `a|b` all keep every named feature.
                r.constraints.extend(v.split(['&', ',', '|']).map(str::trim).filter(|c| !c.is_empty()).map(str::to_string));
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::WallTime],
            spec: OptionSpec::both("time", "t", Arity::Value),
            render: |r| r.wall_time.map(format_slurm_time).into_iter().collect(),
            apply: |r, v| {
                r.wall_time = Some(parse_slurm_time(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Queue],
            spec: OptionSpec::both("partition", "p", Arity::Value),
            render: |r| some(&r.queue),
            apply: |r, v| {
                r.queue = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::OutputFile],
            spec: OptionSpec::both("output", "o", Arity::Value),
            render: |r| some(&r.output_file),
            apply: |r, v| {
                r.output_file = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::ErrorFile],
            spec: OptionSpec::both("error", "e", Arity::Value),
            render: |r| some(&r.error_file),
            apply: |r, v| {
                r.error_file = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Exclusive],
            spec: OptionSpec::long("exclusive", Arity::Flag),
            render: |r| flag(r.exclusive),
            apply: |r, _| {
                r.exclusive = true;
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::WorkingDirectory],
            spec: OptionSpec::both("chdir", "D", Arity::Value),
            render: |r| some(&r.working_directory),
            apply: |r, v| {
                r.working_directory = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Environment],
            spec: OptionSpec::long("export", Arity::Value),
            render: |r| render_pair_list("ALL,", r),
            apply: |r, v| {
                r.environment.extend(parse_pair_list(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Priority],
            spec: OptionSpec::long("nice", Arity::Value),
            render: |r| r.priority.map(|p| p.to_scale(&NICE_SCALE).to_string()).into_iter().collect(),
            apply: |r, v| {
                let nice: i64 = v.trim().parse().map_err(|_| "expected an integer nice value".to_string())?;
                r.priority = Some(Priority::from_scale(nice, &NICE_SCALE));
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::BeginTime],
            spec: OptionSpec::both("begin", "b", Arity::Value),
            render: |r| r.begin_time.and_then(|t| format_epoch(t, SLURM_BEGIN_FORMAT)).into_iter().collect(),
            apply: |r, v| {
                r.begin_time = Some(parse_epoch(v, SLURM_BEGIN_FORMAT)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::DependsOn],
            spec: OptionSpec::both("dependency", "d", Arity::Value),
            render: |r| if r.depends_on.is_empty() { Vec::new() } else { vec![format!("afterok:{}", r.depends_on.join(":"))] },
            apply: |r, v| {
                // `afterok:1:2,afterany:3` -> 1, 2, 3
                for condition in v.split([',', '?']) {
                    let (_, ids) = condition.split_once(':').ok_or_else(|| "expected TYPE:JOBID[:JOBID...]".to_string())?;
                    r.depends_on.extend(ids.split(':').filter(|id| !id.is_empty()).map(str::to_string));
                }
                Ok(())
            },
        },
    ];
    pub static ref SLURM_GRAMMAR: OptionGrammar = grammar_for("sbatch", &SLURM_TABLE);
}

pub fn transformer() -> BatchScriptTransformer {
    BatchScriptTransformer { format: TransformFormat::Slurm, syntax: SLURM_SYNTAX, table: &SLURM_TABLE, grammar: &SLURM_GRAMMAR, launcher: "srun" }
}
