use crate::domain::jobspec::Jobspec;
use crate::domain::transform::request::{JobField, JobRequest};
use crate::domain::transform::{TransformFormat, Transformer};
use crate::error::Result;

/// The canonical document itself, written as YAML. Carries every request field.
pub struct JobspecTransformer;

impl Transformer for JobspecTransformer {
    fn format(&self) -> TransformFormat {
        TransformFormat::Jobspec
    }

    fn supported_fields(&self) -> Vec<JobField> {
        JobField::ALL.to_vec()
    }

    fn render(&self, request: &JobRequest) -> Result<String> {
        request.to_jobspec()?.to_yaml()
    }

    fn parse(&self, text: &str) -> Result<JobRequest> {
        let jobspec = Jobspec::from_document(text)?;
        Ok(JobRequest::from_jobspec(&jobspec))
    }
}
