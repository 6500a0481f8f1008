use crate::domain::directive::grammar::{Arity, OptionGrammar, OptionSpec};
use crate::domain::directive::shell_words::{join_words, quote_word, split_words};
use crate::domain::directive::{
    COBALT_SYNTAX, DirectiveSyntax, FLUX_SYNTAX, LSF_SYNTAX, LineKind, PBS_SYNTAX, SLURM_SYNTAX, reject, validate_script,
};
use crate::domain::transform::request::{JobField, JobRequest};
use crate::domain::transform::{TransformFormat, Transformer};
use crate::error::Result;

/// One row of a scheduler table: which request fields an option carries and how to convert.
///
/// `render` returns one value per directive line to emit (an empty string for a set flag);
/// `apply` receives the option value (empty for flags) and reports unusable values.
pub struct OptionMapping {
    pub fields: &'static [JobField],
    pub spec: OptionSpec,
    pub render: fn(&JobRequest) -> Vec<String>,
    pub apply: fn(&mut JobRequest, &str) -> std::result::Result<(), String>,
}

/// Builds the directive grammar of a table; option `i` of the grammar is row `i` of the table.
pub fn grammar_for(program: &'static str, table: &[OptionMapping]) -> OptionGrammar {
    OptionGrammar::new(program, table.iter().map(|mapping| mapping.spec).collect())
}

/// Fields carried by the script body rather than by directives.
const BODY_FIELDS: [JobField; 3] = [JobField::Command, JobField::ContainerImage, JobField::Script];

/// Commands that start parallel work and wrap the real command line.
const LAUNCHERS: [&str; 5] = ["srun", "mpiexec", "mpirun", "jsrun", "aprun"];

const CONTAINER_RUNTIMES: [&str; 2] = ["singularity", "apptainer"];

/// A batch-script format: directive marker, option table and the launcher used for the
/// command line. Flux, Slurm, PBS, LSF and Cobalt differ only in these.
pub struct BatchScriptTransformer {
    pub format: TransformFormat,
    pub syntax: DirectiveSyntax,
    pub table: &'static [OptionMapping],
    pub grammar: &'static OptionGrammar,

    /// Prefix of the rendered command line, e.g. `srun`.
    pub launcher: &'static str,
}

impl BatchScriptTransformer {
    fn directive_line(&self, spec: &OptionSpec, value: &str) -> String {
        let arguments = match (spec.arity, spec.long, spec.short) {
            (Arity::Flag, Some(long), _) => format!("--{}", long),
            (Arity::Flag, None, Some(short)) => format!("-{}", short),
            (Arity::Value, Some(long), _) => format!("--{}={}", long, quote_word(value)),
            (Arity::Value, None, Some(short)) => format!("-{} {}", short, quote_word(value)),
            (_, None, None) => String::new(),
        };
        self.syntax.line(&arguments)
    }

    fn command_line(&self, request: &JobRequest) -> Option<String> {
        if request.command.is_empty() {
            return None;
        }

        let mut line = self.launcher.to_string();
        if let Some(image) = &request.container_image {
            line.push_str(&format!(" singularity exec {}", quote_word(image)));
        }
        line.push(' ');
        line.push_str(&join_words(&request.command));
        Some(line)
    }
}

impl Transformer for BatchScriptTransformer {
    fn format(&self) -> TransformFormat {
        self.format
    }

    fn supported_fields(&self) -> Vec<JobField> {
        let mut fields: Vec<JobField> = self.table.iter().flat_map(|mapping| mapping.fields.iter().copied()).collect();
        fields.extend(BODY_FIELDS);
        fields.sort();
        fields.dedup();
        fields
    }

    fn render(&self, request: &JobRequest) -> Result<String> {
        let mut lines = vec!["#!/bin/bash".to_string()];

        for mapping in self.table {
            for value in (mapping.render)(request) {
                lines.push(self.directive_line(&mapping.spec, &value));
            }
        }
        lines.push(String::new());

        match self.command_line(request) {
            Some(command) => lines.push(command),
            None => {
                if let Some(script) = &request.script {
                    lines.extend(script_body(script));
                }
            }
        }

        Ok(lines.join("\n") + "\n")
    }

    fn parse(&self, text: &str) -> Result<JobRequest> {
        let directives = validate_script(text, &self.syntax, self.grammar)?;

        let mut request = JobRequest::default();
        let mut errors = Vec::new();
        for option in &directives.options {
            let mapping = &self.table[option.index];
            let value = option.value.as_deref().unwrap_or_default();
            if let Err(e) = (mapping.apply)(&mut request, value) {
                errors.push(format!("argument {}: invalid value '{}': {}", option.spec.display_name(), value, e));
            }
        }
        if !errors.is_empty() {
            return Err(reject(text, &self.syntax, self.grammar, errors).into());
        }

        let launched = directives.commands.iter().find(|line| starts_with_launcher(line));
        let command_line = match (launched, directives.commands.as_slice()) {
            (Some(line), _) => Some(line),
            (None, [only]) => Some(only),
            _ => None,
        };
        if let Some(line) = command_line {
            let (image, command) = unwrap_command(&split_words(line));
            request.container_image = image.or(request.container_image);
            request.command = command;
        }

        request.script = Some(text.to_string());
        log::debug!("Parsed {} batch script with {} directive(s)", self.format, directives.options.len());
        Ok(request)
    }
}

/// Body lines of an embedded script: everything except the shebang and directive lines of any
/// known scheduler.
fn script_body(script: &str) -> Vec<String> {
    script
        .lines()
        .enumerate()
        .filter(|(index, line)| !(*index == 0 && line.starts_with("#!")))
        .filter(|(_, line)| {
            [FLUX_SYNTAX, SLURM_SYNTAX, PBS_SYNTAX, LSF_SYNTAX, COBALT_SYNTAX].iter().all(|syntax| syntax.classify(line) == LineKind::Plain)
        })
        .map(|(_, line)| line.to_string())
        .collect()
}

fn starts_with_launcher(line: &str) -> bool {
    let words = split_words(line);
    match words.first().map(String::as_str) {
        Some("flux") => matches!(words.get(1).map(String::as_str), Some("run") | Some("submit")),
        Some(first) => LAUNCHERS.contains(&first),
        None => false,
    }
}

/// Strips a launcher and a container runtime from a command line.
///
/// Launcher options are skipped; an option without `=` followed by a number is taken to
/// consume that number (`srun -n 4 app`). Returns the container image, if any, and the
/// remaining command.
pub fn unwrap_command(words: &[String]) -> (Option<String>, Vec<String>) {
    let mut rest: &[String] = words;

    let launcher_len = match rest.first().map(String::as_str) {
        Some("flux") if matches!(rest.get(1).map(String::as_str), Some("run") | Some("submit")) => 2,
        Some(first) if LAUNCHERS.contains(&first) => 1,
        _ => 0,
    };
    if launcher_len > 0 {
        rest = skip_options(&rest[launcher_len..]);
    }

    let mut image = None;
    if let [runtime, exec, tail @ ..] = rest {
        if CONTAINER_RUNTIMES.contains(&runtime.as_str()) && exec == "exec" {
            let tail = skip_options(tail);
            if let [found, command @ ..] = tail {
                image = Some(found.clone());
                rest = command;
            }
        }
    }

    (image, rest.to_vec())
}

fn skip_options(words: &[String]) -> &[String] {
    let mut i = 0;
    while i < words.len() && words[i].starts_with('-') {
        let takes_value = !words[i].contains('=') && words.get(i + 1).is_some_and(|next| next.parse::<f64>().is_ok());
        i += if takes_value { 2 } else { 1 };
    }
    &words[i.min(words.len())..]
}

/// Parses a positive count.
pub fn parse_count(value: &str) -> std::result::Result<u64, String> {
    match value.trim().parse::<u64>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err("expected a positive integer".to_string()),
    }
}

/// Parses `KEY=VALUE`.
pub fn parse_pair(value: &str) -> std::result::Result<(String, String), String> {
    value.split_once('=').map(|(k, v)| (k.trim().to_string(), v.to_string())).ok_or_else(|| "expected KEY=VALUE".to_string())
}

/// Parses comma separated `KEY=VALUE` pairs, skipping the `ALL`/`NONE` keywords schedulers use
/// to control environment propagation.
pub fn parse_pair_list(value: &str) -> std::result::Result<Vec<(String, String)>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty() && !item.eq_ignore_ascii_case("all") && !item.eq_ignore_ascii_case("none"))
        .map(parse_pair)
        .collect()
}

pub fn render_pair_list(prefix: &str, request: &JobRequest) -> Vec<String> {
    if request.environment.is_empty() {
        return Vec::new();
    }
    let pairs: Vec<String> = request.environment.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    vec![format!("{}{}", prefix, pairs.join(","))]
}

pub fn some(value: &Option<String>) -> Vec<String> {
    value.iter().cloned().collect()
}

pub fn some_count(value: Option<u64>) -> Vec<String> {
    value.iter().map(u64::to_string).collect()
}

pub fn flag(set: bool) -> Vec<String> {
    if set { vec![String::new()] } else { Vec::new() }
}
