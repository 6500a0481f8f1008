pub mod grammar;
pub mod shell_words;

use std::fmt;

use crate::domain::directive::grammar::{OptionGrammar, ParsedOption};
use crate::domain::directive::shell_words::split_words;

/// How a scheduler marks option lines inside a batch script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveSyntax {
    /// Marker token including the hash, e.g. `#FLUX` or `#SBATCH`.
    pub marker: &'static str,

    /// Flux only accepts the typed spelling `#FLUX:`; the bare marker is an error there.
    pub requires_colon: bool,
}

pub const FLUX_SYNTAX: DirectiveSyntax = DirectiveSyntax { marker: "#FLUX", requires_colon: true };
pub const SLURM_SYNTAX: DirectiveSyntax = DirectiveSyntax { marker: "#SBATCH", requires_colon: false };
pub const PBS_SYNTAX: DirectiveSyntax = DirectiveSyntax { marker: "#PBS", requires_colon: false };
pub const LSF_SYNTAX: DirectiveSyntax = DirectiveSyntax { marker: "#BSUB", requires_colon: false };
pub const COBALT_SYNTAX: DirectiveSyntax = DirectiveSyntax { marker: "#COBALT", requires_colon: false };

/// Classification of a single script line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// A well formed directive carrying these arguments.
    Typed(&'a str),

    /// The marker without the required colon.
    Informal,

    /// Not a directive: shebang, comment, blank or command.
    Plain,
}

impl DirectiveSyntax {
    pub fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix(self.marker) else {
            return LineKind::Plain;
        };

        if self.requires_colon {
            if let Some(arguments) = rest.strip_prefix(':') {
                return LineKind::Typed(arguments.trim());
            }
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return LineKind::Informal;
            }
            return LineKind::Plain;
        }

        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return LineKind::Typed(rest.trim());
        }
        LineKind::Plain
    }

    /// Formats one directive line, e.g. `#FLUX: --nodes=2` or `#SBATCH --nodes=2`.
    pub fn line(&self, arguments: &str) -> String {
        if self.requires_colon {
            format!("{}: {}", self.marker, arguments)
        } else {
            format!("{} {}", self.marker, arguments)
        }
    }

    /// The hint given for informal lines, `#FLUX directives need to be FLUX:`.
    pub fn informal_hint(&self) -> String {
        format!("{} directives need to be {}:", self.marker, self.marker.trim_start_matches('#'))
    }
}

/// A directive line written with the informal marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-based.
    pub line_number: usize,
    pub text: String,
}

/// Every problem found in a batch script, reported together.
///
/// Its `Display` is the diagnostic printed by `jobmatch validate`: usage text, argument
/// errors, the original script and the malformed directive lines, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveReport {
    pub program: String,
    pub usage: String,
    pub unrecognized: Vec<String>,
    pub argument_errors: Vec<String>,
    pub informal_lines: Vec<MalformedLine>,
    pub informal_hint: String,
    pub script: String,
}

impl DirectiveReport {
    fn new(syntax: &DirectiveSyntax, grammar: &OptionGrammar, script: &str) -> Self {
        DirectiveReport {
            program: grammar.program.to_string(),
            usage: grammar.usage(),
            unrecognized: Vec::new(),
            argument_errors: Vec::new(),
            informal_lines: Vec::new(),
            informal_hint: syntax.informal_hint(),
            script: script.to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.unrecognized.is_empty() && self.argument_errors.is_empty() && self.informal_lines.is_empty()
    }

    pub fn has_argument_problems(&self) -> bool {
        !self.unrecognized.is_empty() || !self.argument_errors.is_empty()
    }
}

impl fmt::Display for DirectiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_argument_problems() {
            writeln!(f, "{}", self.usage)?;
            for error in &self.argument_errors {
                writeln!(f, "{}: error: {}", self.program, error)?;
            }
            if !self.unrecognized.is_empty() {
                writeln!(f, "{}: error: unrecognized arguments: {}", self.program, self.unrecognized.join(" "))?;
            }
        }

        writeln!(f, "\n{}", self.script.trim_end())?;

        if !self.informal_lines.is_empty() {
            writeln!(f, "\n{}", self.informal_hint)?;
            for line in &self.informal_lines {
                writeln!(f, "  line {}: {}", line.line_number, line.text)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for DirectiveReport {}

/// The accepted directives of a script plus its verbatim text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDirectives {
    pub options: Vec<ParsedOption>,

    /// The whole script, kept verbatim as the job payload.
    pub script: String,

    /// Lines that are neither directives, comments nor blank, in order.
    pub commands: Vec<String>,
}

/// Scans `script`, collects typed directive arguments in file order and parses them with
/// `grammar`. Informal markers and unrecognized arguments are gathered into one report;
/// neither stops the scan.
pub fn validate_script(script: &str, syntax: &DirectiveSyntax, grammar: &OptionGrammar) -> Result<BatchDirectives, DirectiveReport> {
    let mut report = DirectiveReport::new(syntax, grammar, script);
    let mut arguments: Vec<String> = Vec::new();
    let mut commands = Vec::new();

    for (index, line) in script.lines().enumerate() {
        match syntax.classify(line) {
            LineKind::Typed(args) => arguments.extend(split_words(args)),
            LineKind::Informal => report.informal_lines.push(MalformedLine { line_number: index + 1, text: line.to_string() }),
            LineKind::Plain => {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    commands.push(trimmed.to_string());
                }
            }
        }
    }

    let outcome = grammar.parse(&arguments);
    report.unrecognized = outcome.unrecognized;
    report.argument_errors = outcome.errors;

    if !report.is_valid() {
        log::debug!(
            "Batch script rejected: {} unrecognized argument(s), {} argument error(s), {} informal directive(s)",
            report.unrecognized.len(),
            report.argument_errors.len(),
            report.informal_lines.len()
        );
        return Err(report);
    }

    Ok(BatchDirectives { options: outcome.options, script: script.to_string(), commands })
}

/// Report for directives that parsed but whose values could not be applied, e.g. `-N two`.
pub fn reject(script: &str, syntax: &DirectiveSyntax, grammar: &OptionGrammar, errors: Vec<String>) -> DirectiveReport {
    let mut report = DirectiveReport::new(syntax, grammar, script);
    report.argument_errors = errors;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::grammar::{Arity, OptionSpec};

    fn grammar() -> OptionGrammar {
        OptionGrammar::new("flux batch", vec![OptionSpec::both("nodes", "N", Arity::Value), OptionSpec::both("ntasks", "n", Arity::Value)])
    }

    #[test]
    fn test_classify_flux_lines() {
        assert_eq!(FLUX_SYNTAX.classify("#FLUX: -N2"), LineKind::Typed("-N2"));
        assert_eq!(FLUX_SYNTAX.classify("#FLUX -n8"), LineKind::Informal);
        assert_eq!(FLUX_SYNTAX.classify("#FLUXY"), LineKind::Plain);
        assert_eq!(FLUX_SYNTAX.classify("echo hi"), LineKind::Plain);
    }

    #[test]
    fn test_classify_marker_without_colon() {
        assert_eq!(SLURM_SYNTAX.classify("#SBATCH --nodes=2"), LineKind::Typed("--nodes=2"));
        assert_eq!(SLURM_SYNTAX.classify("#SBATCHX"), LineKind::Plain);
    }

    #[test]
    fn test_valid_script_keeps_commands() {
        let script = "#!/bin/bash\n#FLUX: -N2\n#FLUX: --ntasks=4\n\n# setup\nhostname\n";
        let directives = validate_script(script, &FLUX_SYNTAX, &grammar()).unwrap();

        assert_eq!(directives.options.len(), 2);
        assert_eq!(directives.commands, vec!["hostname"]);
        assert_eq!(directives.script, script);
    }

    #[test]
    fn test_report_lists_hint_and_line() {
        let script = "#!/bin/bash\n#FLUX -n8\n";
        let report = validate_script(script, &FLUX_SYNTAX, &grammar()).unwrap_err();
        let text = report.to_string();

        assert!(text.contains("#FLUX directives need to be FLUX:"));
        assert!(text.contains("line 2: #FLUX -n8"));
        assert!(!text.contains("usage:"));
    }
}
