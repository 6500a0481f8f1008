pub mod batch;
pub mod cobalt;
pub mod flux;
pub mod jobspec;
pub mod kubernetes;
pub mod lsf;
pub mod pbs;
pub mod request;
pub mod slurm;
pub mod timefmt;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::domain::directive::{COBALT_SYNTAX, FLUX_SYNTAX, LSF_SYNTAX, LineKind, PBS_SYNTAX, SLURM_SYNTAX};
use crate::domain::transform::request::{JobField, JobRequest, generate_job_name};
use crate::error::{Result, TranslationError};

/// Formats the translation layer reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformFormat {
    Jobspec,
    Flux,
    Slurm,
    Pbs,
    Lsf,
    Cobalt,
    Kubernetes,
}

impl TransformFormat {
    pub const ALL: [TransformFormat; 7] = [
        TransformFormat::Jobspec,
        TransformFormat::Flux,
        TransformFormat::Slurm,
        TransformFormat::Pbs,
        TransformFormat::Lsf,
        TransformFormat::Cobalt,
        TransformFormat::Kubernetes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformFormat::Jobspec => "jobspec",
            TransformFormat::Flux => "flux",
            TransformFormat::Slurm => "slurm",
            TransformFormat::Pbs => "pbs",
            TransformFormat::Lsf => "lsf",
            TransformFormat::Cobalt => "cobalt",
            TransformFormat::Kubernetes => "kubernetes",
        }
    }

    /// Guesses the format of a document from its directive markers or manifest kind, falling
    /// back to the file extension for canonical documents.
    pub fn detect(path: &Path, text: &str) -> Option<TransformFormat> {
        for line in text.lines() {
            if FLUX_SYNTAX.classify(line) != LineKind::Plain {
                return Some(TransformFormat::Flux);
            }
            if SLURM_SYNTAX.classify(line) != LineKind::Plain {
                return Some(TransformFormat::Slurm);
            }
            if PBS_SYNTAX.classify(line) != LineKind::Plain {
                return Some(TransformFormat::Pbs);
            }
            if LSF_SYNTAX.classify(line) != LineKind::Plain {
                return Some(TransformFormat::Lsf);
            }
            if COBALT_SYNTAX.classify(line) != LineKind::Plain {
                return Some(TransformFormat::Cobalt);
            }
        }

        let trimmed: Vec<&str> = text.lines().map(str::trim).collect();
        if trimmed.contains(&"kind: Job") || trimmed.iter().any(|line| line.starts_with("\"kind\": \"Job\"")) {
            return Some(TransformFormat::Kubernetes);
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") | Some("yaml") | Some("yml") => Some(TransformFormat::Jobspec),
            _ => None,
        }
    }
}

impl FromStr for TransformFormat {
    type Err = TranslationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jobspec" | "canonical" => Ok(TransformFormat::Jobspec),
            "flux" => Ok(TransformFormat::Flux),
            "slurm" => Ok(TransformFormat::Slurm),
            "pbs" => Ok(TransformFormat::Pbs),
            "lsf" => Ok(TransformFormat::Lsf),
            "cobalt" => Ok(TransformFormat::Cobalt),
            "kubernetes" | "k8s" => Ok(TransformFormat::Kubernetes),
            other => Err(TranslationError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for TransformFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A request field that the target format cannot express and that was dropped on export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationGap {
    pub format: TransformFormat,
    pub field: JobField,
}

impl fmt::Display for TranslationGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} has no equivalent for '{}', the value was dropped", self.format, self.field)
    }
}

/// An exported artifact plus everything that did not make it across.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub artifact: String,
    pub gaps: Vec<TranslationGap>,
}

/// One scheduler-native representation.
///
/// `parse` followed by `render` is not the identity: each format only carries the fields listed
/// by `supported_fields`, everything else is dropped and reported by `convert` as a gap.
pub trait Transformer: Send + Sync {
    fn format(&self) -> TransformFormat;

    fn supported_fields(&self) -> Vec<JobField>;

    fn render(&self, request: &JobRequest) -> Result<String>;

    fn parse(&self, text: &str) -> Result<JobRequest>;

    fn gaps(&self, request: &JobRequest) -> Vec<TranslationGap> {
        let supported = self.supported_fields();
        JobField::ALL
            .iter()
            .filter(|field| request.is_set(**field) && !supported.contains(*field))
            .map(|field| TranslationGap { format: self.format(), field: *field })
            .collect()
    }

    /// Renders `request`, naming the job if it has no name, and warns about dropped fields.
    fn convert(&self, request: &JobRequest) -> Result<Translation> {
        let mut request = request.clone();
        if request.job_name.is_none() {
            request.job_name = Some(generate_job_name());
        }

        let gaps = self.gaps(&request);
        for gap in &gaps {
            log::warn!("{}", gap);
        }

        Ok(Translation { artifact: self.render(&request)?, gaps })
    }
}

pub fn get_transformer(format: TransformFormat) -> Box<dyn Transformer> {
    match format {
        TransformFormat::Jobspec => Box::new(jobspec::JobspecTransformer),
        TransformFormat::Flux => Box::new(flux::transformer()),
        TransformFormat::Slurm => Box::new(slurm::transformer()),
        TransformFormat::Pbs => Box::new(pbs::transformer()),
        TransformFormat::Lsf => Box::new(lsf::transformer()),
        TransformFormat::Cobalt => Box::new(cobalt::transformer()),
        TransformFormat::Kubernetes => Box::new(kubernetes::KubernetesTransformer),
    }
}

/// Reads `text` as `from` and writes it as `to`.
pub fn translate(text: &str, from: TransformFormat, to: TransformFormat) -> Result<Translation> {
    let request = get_transformer(from).parse(text)?;
    log::debug!("Translating {} -> {}", from, to);
    get_transformer(to).convert(&request)
}
