use crate::api::jobspec_dto::JobspecDto;
use crate::domain::jobspec::SUPPORTED_VERSION;
use crate::domain::jobspec::resource_tree::ResourceTree;
use crate::error::{ValidationError, ValidationIssue};

/// Runs every jobspec check and returns all problems at once.
///
/// The checks run in a fixed order so reports are stable:
/// 1. schema version
/// 2. resource types and counts
/// 3. task slots resolve to exactly one labeled resource
/// 4. requirement entries carry a name
/// 5. duration is not negative
///
/// Labels are looked up by walking down from the roots, and the tree is built from them, so a
/// slot that resolves is always reachable.
pub fn validate(dto: &JobspecDto, tree: &ResourceTree) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    check_version(dto, &mut issues);
    check_resources(tree, &mut issues);
    check_task_slots(dto, tree, &mut issues);
    check_requirements(dto, &mut issues);
    check_duration(dto, &mut issues);

    if issues.is_empty() {
        return Ok(());
    }

    log::debug!("Jobspec validation found {} problem(s)", issues.len());
    Err(ValidationError { issues })
}

fn check_version(dto: &JobspecDto, issues: &mut Vec<ValidationIssue>) {
    if dto.version != SUPPORTED_VERSION {
        issues.push(ValidationIssue::new(
            "version",
            format!("unsupported jobspec version {}, only version {} is supported", dto.version, SUPPORTED_VERSION),
        ));
    }
}

fn check_resources(tree: &ResourceTree, issues: &mut Vec<ValidationIssue>) {
    for key in tree.walk() {
        let node = tree.node(key);

        if node.typ.trim().is_empty() {
            issues.push(ValidationIssue::new(format!("{}.type", node.path), "resource type must not be empty"));
        }
        if node.count < 1 {
            issues.push(ValidationIssue::new(format!("{}.count", node.path), "resource count must be at least 1"));
        }
    }
}

fn check_task_slots(dto: &JobspecDto, tree: &ResourceTree, issues: &mut Vec<ValidationIssue>) {
    for (i, task) in dto.tasks.iter().enumerate() {
        let path = format!("tasks[{}].slot", i);

        if task.slot.trim().is_empty() {
            issues.push(ValidationIssue::new(path, "task must name the label of the resource it runs in"));
        } else {
            match tree.labeled(&task.slot).len() {
                0 => issues.push(ValidationIssue::new(
                    path,
                    format!("slot '{}' does not match any resource label; the slot resource must carry `label: {}`", task.slot, task.slot),
                )),
                1 => {}
                n => issues.push(ValidationIssue::new(path, format!("slot label '{}' is ambiguous, {} resources carry it", task.slot, n))),
            }
        }

        if task.count.per_slot < 1 {
            issues.push(ValidationIssue::new(format!("tasks[{}].count.per_slot", i), "per_slot must be at least 1"));
        }
    }
}

fn check_requirements(dto: &JobspecDto, issues: &mut Vec<ValidationIssue>) {
    for (subsystem, requirements) in &dto.attributes.system.requires {
        for (i, requirement) in requirements.iter().enumerate() {
            if requirement.name.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    format!("attributes.system.requires.{}[{}].name", subsystem, i),
                    "requirement must have a non-empty name",
                ));
            }
        }
    }
}

fn check_duration(dto: &JobspecDto, issues: &mut Vec<ValidationIssue>) {
    if let Some(duration) = dto.attributes.system.duration {
        if duration < 0 {
            issues.push(ValidationIssue::new("attributes.system.duration", "duration must not be negative"));
        }
    }
}
