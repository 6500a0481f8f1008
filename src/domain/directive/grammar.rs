/// Whether an option consumes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Flag,
    Value,
}

/// One accepted scheduler option. `short` is written without the leading dash and may be
/// longer than one character (LSF uses `-sp`, for example).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub long: Option<&'static str>,
    pub short: Option<&'static str>,
    pub arity: Arity,
}

impl OptionSpec {
    pub const fn long(name: &'static str, arity: Arity) -> Self {
        OptionSpec { long: Some(name), short: None, arity }
    }

    pub const fn short(name: &'static str, arity: Arity) -> Self {
        OptionSpec { long: None, short: Some(name), arity }
    }

    pub const fn both(long: &'static str, short: &'static str, arity: Arity) -> Self {
        OptionSpec { long: Some(long), short: Some(short), arity }
    }

    /// The preferred spelling, used in diagnostics: `--nodes` or `-N`.
    pub fn display_name(&self) -> String {
        match (self.long, self.short) {
            (Some(long), _) => format!("--{}", long),
            (None, Some(short)) => format!("-{}", short),
            (None, None) => String::new(),
        }
    }

    fn metavar(&self) -> String {
        self.long.or(self.short).unwrap_or("value").replace('-', "_").to_uppercase()
    }

    fn usage_fragment(&self) -> String {
        let name = match (self.long, self.short) {
            (_, Some(short)) => format!("-{}", short),
            (Some(long), None) => format!("--{}", long),
            (None, None) => return String::new(),
        };

        match self.arity {
            Arity::Flag => format!("[{}]", name),
            Arity::Value => format!("[{} {}]", name, self.metavar()),
        }
    }
}

/// An option recognized in an argument vector, identified by its index in the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOption {
    pub index: usize,
    pub spec: OptionSpec,

    /// `None` for flags.
    pub value: Option<String>,
}

/// Result of parsing an argument vector. Parsing never stops early: every argument is looked
/// at, and all problems are collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub options: Vec<ParsedOption>,

    /// Arguments the grammar does not know, verbatim.
    pub unrecognized: Vec<String>,

    /// Known options used incorrectly, e.g. a value option without a value.
    pub errors: Vec<String>,
}

impl ParseOutcome {
    pub fn is_clean(&self) -> bool {
        self.unrecognized.is_empty() && self.errors.is_empty()
    }
}

/// The whitelist of options a scheduler's batch directives may carry.
#[derive(Debug, Clone)]
pub struct OptionGrammar {
    pub program: &'static str,
    pub options: Vec<OptionSpec>,
}

impl OptionGrammar {
    pub fn new(program: &'static str, options: Vec<OptionSpec>) -> Self {
        OptionGrammar { program, options }
    }

    /// Single line usage text in the familiar `usage: prog [-N NODES] [--exclusive]` form.
    pub fn usage(&self) -> String {
        let fragments: Vec<String> = self.options.iter().map(OptionSpec::usage_fragment).filter(|f| !f.is_empty()).collect();
        format!("usage: {} {}", self.program, fragments.join(" "))
    }

    fn find_long(&self, name: &str) -> Option<usize> {
        self.options.iter().position(|spec| spec.long == Some(name))
    }

    /// Longest short name that prefixes `text`, so `-sp 10` is not taken for `-s p`.
    fn find_short(&self, text: &str) -> Option<(usize, usize)> {
        self.options
            .iter()
            .enumerate()
            .filter_map(|(index, spec)| spec.short.filter(|short| text.starts_with(*short)).map(|short| (index, short.len())))
            .max_by_key(|(_, len)| *len)
    }

    pub fn parse(&self, args: &[String]) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            i += 1;

            if let Some(body) = arg.strip_prefix("--") {
                let (name, inline) = match body.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (body, None),
                };

                let Some(index) = self.find_long(name) else {
                    outcome.unrecognized.push(arg.clone());
                    continue;
                };
                let spec = self.options[index];

                match (spec.arity, inline) {
                    (Arity::Flag, None) => outcome.options.push(ParsedOption { index, spec, value: None }),
                    (Arity::Flag, Some(value)) => {
                        outcome.errors.push(format!("argument --{}: ignored explicit argument '{}'", name, value));
                    }
                    (Arity::Value, Some(value)) => outcome.options.push(ParsedOption { index, spec, value: Some(value) }),
                    (Arity::Value, None) => match args.get(i) {
                        Some(value) if !value.starts_with('-') || value.len() == 1 => {
                            i += 1;
                            outcome.options.push(ParsedOption { index, spec, value: Some(value.clone()) });
                        }
                        _ => outcome.errors.push(format!("argument --{}: expected one argument", name)),
                    },
                }
            } else if let Some(body) = arg.strip_prefix('-').filter(|body| !body.is_empty()) {
                let Some((index, len)) = self.find_short(body) else {
                    outcome.unrecognized.push(arg.clone());
                    continue;
                };
                let spec = self.options[index];
                let rest = &body[len..];

                match spec.arity {
                    Arity::Flag if rest.is_empty() => outcome.options.push(ParsedOption { index, spec, value: None }),
                    Arity::Flag => outcome.unrecognized.push(arg.clone()),
                    Arity::Value if !rest.is_empty() => {
                        let value = rest.strip_prefix('=').unwrap_or(rest).to_string();
                        outcome.options.push(ParsedOption { index, spec, value: Some(value) });
                    }
                    Arity::Value => match args.get(i) {
                        Some(value) if !value.starts_with('-') || value.len() == 1 || value.parse::<f64>().is_ok() => {
                            i += 1;
                            outcome.options.push(ParsedOption { index, spec, value: Some(value.clone()) });
                        }
                        _ => outcome.errors.push(format!("argument -{}: expected one argument", &body[..len])),
                    },
                }
            } else {
                outcome.unrecognized.push(arg.clone());
            }
        }

        outcome
    }
}
