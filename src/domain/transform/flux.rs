use lazy_static::lazy_static;

use crate::domain::directive::FLUX_SYNTAX;
use crate::domain::directive::grammar::{Arity, OptionGrammar, OptionSpec};
use crate::domain::transform::TransformFormat;
use crate::domain::transform::batch::{BatchScriptTransformer, OptionMapping, flag, grammar_for, parse_count, parse_pair, some, some_count};
use crate::domain::transform::request::{JobField, Priority};
use crate::domain::transform::timefmt::{FLUX_BEGIN_FORMAT, format_epoch, format_fsd, parse_epoch, parse_fsd};

/// Flux urgency for `[low, normal, high, urgent]`; 16 is the default, 31 the maximum.
pub const URGENCY_SCALE: [i64; 4] = [8, 16, 24, 31];

lazy_static! {
    pub static ref FLUX_TABLE: Vec<OptionMapping> = vec![
        OptionMapping {
            fields: &[JobField::JobName],
            spec: OptionSpec::long("job-name", Arity::Value),
            render: |r| some(&r.job_name),
            apply: |r, v| {
                r.job_name = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::NumNodes],
            spec: OptionSpec::both("nodes", "N", Arity::Value),
            render: |r| some_count(r.num_nodes),
            apply: |r, v| {
                r.num_nodes = Some(parse_count(v)?);
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
            spec: OptionSpec::both("cores-per-task", "c", Arity::Value),
            render: |r| some_count(r.cpus_per_task),
            apply: |r, v| {
                r.cpus_per_task = Some(parse_count(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::GpusPerTask],
            spec: OptionSpec::both("gpus-per-task", "g", Arity::Value),
            render: |r| some_count(r.gpus_per_task),
            apply: |r, v| {
                r.gpus_per_task = Some(parse_count(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::WallTime],
            spec: OptionSpec::both("time-limit", "t", Arity::Value),
            render: |r| r.wall_time.map(format_fsd).into_iter().collect(),
            apply: |r, v| {
                r.wall_time = Some(parse_fsd(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Constraints],
            spec: OptionSpec::long("requires", Arity::Value),
            render: |r| if r.constraints.is_empty() { Vec::new() } else { vec![r.constraints.join("&")] },
            apply: |r, v| {
                // `--requires=skylake&ib`, also spelled with `and` or commas.
                let names = v.split(['&', ',']).flat_map(|part| part.split(" and ")).map(str::trim).filter(|name| !name.is_empty());
                r.constraints.extend(names.map(str::to_string));
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Queue],
            spec: OptionSpec::both("queue", "q", Arity::Value),
            render: |r| some(&r.queue),
            apply: |r, v| {
                r.queue = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Account],
            spec: OptionSpec::both("bank", "B", Arity::Value),
            render: |r| some(&r.account),
            apply: |r, v| {
                r.account = Some(v.to_string());
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
            spec: OptionSpec::long("cwd", Arity::Value),
            render: |r| some(&r.working_directory),
            apply: |r, v| {
                r.working_directory = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Environment],
            spec: OptionSpec::long("env", Arity::Value),
            render: |r| r.environment.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
            apply: |r, v| {
                let (key, value) = parse_pair(v)?;
                r.environment.insert(key, value);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Priority],
            spec: OptionSpec::long("urgency", Arity::Value),
            render: |r| r.priority.map(|p| p.to_scale(&URGENCY_SCALE).to_string()).into_iter().collect(),
            apply: |r, v| {
                let urgency: i64 = v.trim().parse().map_err(|_| "expected an integer urgency".to_string())?;
                r.priority = Some(Priority::from_scale(urgency, &URGENCY_SCALE));
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::BeginTime],
            spec: OptionSpec::long("begin-time", Arity::Value),
            render: |r| r.begin_time.and_then(|t| format_epoch(t, FLUX_BEGIN_FORMAT)).into_iter().collect(),
            apply: |r, v| {
                r.begin_time = Some(parse_epoch(v, FLUX_BEGIN_FORMAT)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::DependsOn],
            spec: OptionSpec::long("dependency", Arity::Value),
            render: |r| r.depends_on.iter().map(|id| format!("afterok:{}", id)).collect(),
            apply: |r, v| {
                let (_, id) = v.split_once(':').ok_or_else(|| "expected TYPE:JOBID".to_string())?;
                r.depends_on.push(id.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::Attributes],
            spec: OptionSpec::both("setattr", "S", Arity::Value),
            render: |r| r.attributes.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
            apply: |r, v| {
                // A bare key is set to 1, like `flux batch --setattr=key`.
                let (key, value) = v.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())).unwrap_or((v.to_string(), "1".to_string()));
                r.attributes.insert(key, value);
                Ok(())
            },
        },
    ];
    pub static ref FLUX_GRAMMAR: OptionGrammar = grammar_for("flux batch", &FLUX_TABLE);
}

pub fn transformer() -> BatchScriptTransformer {
    BatchScriptTransformer { format: TransformFormat::Flux, syntax: FLUX_SYNTAX, table: &FLUX_TABLE, grammar: &FLUX_GRAMMAR, launcher: "flux run" }
}
