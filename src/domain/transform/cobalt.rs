use lazy_static::lazy_static;

use crate::domain::directive::COBALT_SYNTAX;
use crate::domain::directive::grammar::{Arity, OptionGrammar, OptionSpec};
use crate::domain::transform::TransformFormat;
use crate::domain::transform::batch::{BatchScriptTransformer, OptionMapping, grammar_for, parse_count, parse_pair, some, some_count};
use crate::domain::transform::request::JobField;
use crate::domain::transform::timefmt::{format_epoch, format_pbs_time, parse_cobalt_time, parse_epoch};

/// `--at` start times, written without a zone and read as UTC.
pub const COBALT_BEGIN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// Cobalt hands out whole nodes and has no priority, memory or feature options.
lazy_static! {
    pub static ref COBALT_TABLE: Vec<OptionMapping> = vec![
        OptionMapping {
            fields: &[JobField::JobName],
            spec: OptionSpec::short("O", Arity::Value),
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
            fields: &[JobField::Queue],
            spec: OptionSpec::short("q", Arity::Value),
            render: |r| some(&r.queue),
            apply: |r, v| {
                r.queue = Some(v.to_string());
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::NumNodes],
            spec: OptionSpec::short("n", Arity::Value),
            render: |r| some_count(r.num_nodes),
            apply: |r, v| {
                r.num_nodes = Some(parse_count(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::NumTasks],
            spec: OptionSpec::long("proccount", Arity::Value),
            render: |r| some_count(r.num_tasks),
            apply: |r, v| {
                r.num_tasks = Some(parse_count(v)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::WallTime],
            spec: OptionSpec::short("t", Arity::Value),
            render: |r| r.wall_time.map(format_pbs_time).into_iter().collect(),
            apply: |r, v| {
                r.wall_time = Some(parse_cobalt_time(v)?);
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
            // One variable per line; `:` separates variables and may also appear in values.
            render: |r| r.environment.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
            apply: |r, v| {
                let (key, value) = parse_pair(v)?;
                r.environment.insert(key, value);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::BeginTime],
            spec: OptionSpec::long("at", Arity::Value),
            render: |r| r.begin_time.and_then(|t| format_epoch(t, COBALT_BEGIN_FORMAT)).into_iter().collect(),
            apply: |r, v| {
                r.begin_time = Some(parse_epoch(v, COBALT_BEGIN_FORMAT)?);
                Ok(())
            },
        },
        OptionMapping {
            fields: &[JobField::DependsOn],
            spec: OptionSpec::long("dependencies", Arity::Value),
            render: |r| if r.depends_on.is_empty() { Vec::new() } else { vec![r.depends_on.join(":")] },
            apply: |r, v| {
                r.depends_on.extend(v.split(':').map(str::trim).filter(|id| !id.is_empty()).map(str::to_string));
                Ok(())
            },
        },
    ];
    pub static ref COBALT_GRAMMAR: OptionGrammar = grammar_for("qsub", &COBALT_TABLE);
}

pub fn transformer() -> BatchScriptTransformer {
    BatchScriptTransformer {
        format: TransformFormat::Cobalt,
        syntax: COBALT_SYNTAX,
        table: &COBALT_TABLE,
        grammar: &COBALT_GRAMMAR,
        launcher: "aprun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transform::Transformer;
    use crate::domain::transform::request::JobRequest;

    #[test]
    fn test_minutes_and_clock_wall_times() {
        let script = "#!/bin/bash\n#COBALT -n 2\n#COBALT -t 90\naprun -n 8 ./app\n";
        let request = transformer().parse(script).unwrap();
        assert_eq!(request.wall_time, Some(5400));
        assert_eq!(request.num_nodes, Some(2));
        assert_eq!(request.command, vec!["./app"]);

        let request = JobRequest { wall_time: Some(5400), ..Default::default() };
        assert!(transformer().render(&request).unwrap().contains("#COBALT -t 01:30:00\n"));
    }

    #[test]
    fn test_environment_values_keep_colons() {
        let script = "#!/bin/bash\n#COBALT --env PATH=/opt/bin:/usr/bin\n#COBALT --env OMP_NUM_THREADS=4\n./app\n";
        let request = transformer().parse(script).unwrap();
        assert_eq!(request.environment.get("PATH").map(String::as_str), Some("/opt/bin:/usr/bin"));
        assert_eq!(request.environment.get("OMP_NUM_THREADS").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_unsupported_fields_are_gaps() {
        let request = JobRequest { mem_per_task: Some(1024), exclusive: true, num_nodes: Some(1), ..Default::default() };
        let gaps: Vec<JobField> = transformer().gaps(&request).iter().map(|gap| gap.field).collect();
        assert_eq!(gaps, vec![JobField::MemoryPerTask, JobField::Exclusive]);
    }
}
