use std::path::Path;

use jobmatch::domain::jobspec::Jobspec;
use jobmatch::domain::transform::kubernetes::KubernetesTransformer;
use jobmatch::domain::transform::request::{JobField, JobRequest, Priority};
use jobmatch::domain::transform::{TransformFormat, Transformer, get_transformer, translate};
use jobmatch::error::{Error, TranslationError};

const NEW_YEAR_2026: i64 = 1767225600;

fn two_node_jobspec() -> Jobspec {
    let document = r#"
version: 1
resources:
  - type: node
    count: 2
    with:
      - type: slot
        count: 2
        label: task
        with:
          - type: core
            count: 2
tasks:
  - command: ["app", "--input", "input.txt"]
    slot: task
attributes:
  system:
    duration: 3600
    queue: pbatch
    files:
      input.txt:
        mode: 33188
        data: "1 2 3"
"#;
    Jobspec::from_document(document).unwrap()
}

fn training_request() -> JobRequest {
    JobRequest {
        job_name: Some("Train_Run".to_string()),
        num_nodes: Some(2),
        num_tasks: Some(8),
        cpus_per_task: Some(2),
        gpus_per_task: Some(1),
        wall_time: Some(600),
        queue: Some("gpu-queue".to_string()),
        container_image: Some("ghcr.io/example/trainer:1.0".to_string()),
        command: vec!["python".to_string(), "train.py".to_string(), "--epochs".to_string(), "3".to_string()],
        ..JobRequest::default()
    }
}

#[test]
fn test_jobspec_slurm_jobspec_drops_embedded_files() {
    let request = JobRequest::from_jobspec(&two_node_jobspec());
    assert_eq!(request.num_nodes, Some(2));
    assert_eq!(request.num_tasks, Some(4));
    assert_eq!(request.cpus_per_task, Some(2));

    let slurm = get_transformer(TransformFormat::Slurm);
    let translation = slurm.convert(&request).unwrap();
    let gaps: Vec<JobField> = translation.gaps.iter().map(|gap| gap.field).collect();
    assert_eq!(gaps, vec![JobField::Files]);

    let script = &translation.artifact;
    assert!(script.starts_with("#!/bin/bash\n"));
    assert!(script.contains("#SBATCH --nodes=2\n"));
    assert!(script.contains("#SBATCH --ntasks=4\n"));
    assert!(script.contains("#SBATCH --time=01:00:00\n"));
    assert!(script.contains("#SBATCH --partition=pbatch\n"));
    assert!(script.contains("srun app --input input.txt\n"));

    let back = slurm.parse(script).unwrap().to_jobspec().unwrap();
    assert!(!back.attributes.system.files.contains_key("input.txt"));
    assert!(back.attributes.system.files.contains_key("script"));
    assert_eq!(back.attributes.system.duration, Some(3600));
    assert_eq!(back.attributes.system.queue.as_deref(), Some("pbatch"));
    assert_eq!(back.tasks[0].command, vec!["app", "--input", "input.txt"]);
    assert_eq!(back.count_resources().get("core"), Some(&8));
}

#[test]
fn test_manifest_synthesis() {
    let manifest = KubernetesTransformer.render(&training_request()).unwrap();
    let value: serde_yaml::Value = serde_yaml::from_str(&manifest).unwrap();

    assert_eq!(value["apiVersion"].as_str(), Some("batch/v1"));
    assert_eq!(value["kind"].as_str(), Some("Job"));
    assert_eq!(value["metadata"]["name"].as_str(), Some("train-run"));
    assert_eq!(value["metadata"]["labels"]["kueue.x-k8s.io/queue-name"].as_str(), Some("gpu-queue"));

    let spec = &value["spec"];
    assert_eq!(spec["completions"].as_i64(), Some(2));
    assert_eq!(spec["parallelism"].as_i64(), Some(2));
    assert_eq!(spec["backoffLimit"].as_i64(), Some(0));
    assert_eq!(spec["activeDeadlineSeconds"].as_i64(), Some(600));

    let container = &spec["template"]["spec"]["containers"][0];
    assert_eq!(spec["template"]["spec"]["restartPolicy"].as_str(), Some("Never"));
    assert_eq!(container["image"].as_str(), Some("ghcr.io/example/trainer:1.0"));
    assert_eq!(container["command"][0].as_str(), Some("/bin/bash"));
    assert_eq!(container["command"][1].as_str(), Some("-c"));
    assert_eq!(container["args"][0].as_str(), Some("python train.py --epochs 3"));

    // 8 tasks on 2 pods, 2 cores each
    assert_eq!(container["resources"]["limits"]["cpu"].as_str(), Some("8"));
    assert_eq!(container["resources"]["requests"]["cpu"].as_str(), Some("8"));
    assert_eq!(container["resources"]["limits"]["nvidia.com/gpu"].as_str(), Some("4"));
}

#[test]
fn test_manifest_requires_image() {
    let request = JobRequest { container_image: None, ..training_request() };
    let result = KubernetesTransformer.render(&request);

    assert!(matches!(
        result,
        Err(Error::TranslationError(TranslationError::MissingField { format: "kubernetes", field: "container_image" }))
    ));
}

#[test]
fn test_manifest_reports_dropped_fields() {
    let request = JobRequest { account: Some("physics".to_string()), exclusive: true, ..training_request() };
    let translation = KubernetesTransformer.convert(&request).unwrap();

    let gaps: Vec<JobField> = translation.gaps.iter().map(|gap| gap.field).collect();
    assert_eq!(gaps, vec![JobField::Account, JobField::Exclusive]);
}

#[test]
fn test_manifest_parse_recovers_request() {
    let manifest = KubernetesTransformer.render(&training_request()).unwrap();
    let request = KubernetesTransformer.parse(&manifest).unwrap();

    assert_eq!(request.num_nodes, Some(2));
    assert_eq!(request.queue.as_deref(), Some("gpu-queue"));
    assert_eq!(request.wall_time, Some(600));
    assert_eq!(request.command, vec!["python", "train.py", "--epochs", "3"]);
}

#[test]
fn test_wall_time_in_each_dialect() {
    let request = JobRequest { wall_time: Some(90061), command: vec!["app".to_string()], ..JobRequest::default() };

    let slurm = get_transformer(TransformFormat::Slurm).render(&request).unwrap();
    assert!(slurm.contains("#SBATCH --time=1-01:01:01\n"), "{}", slurm);

    let pbs = get_transformer(TransformFormat::Pbs).render(&request).unwrap();
    assert!(pbs.contains("#PBS -l walltime=25:01:01\n"), "{}", pbs);

    // LSF rounds up to whole minutes.
    let lsf = get_transformer(TransformFormat::Lsf).render(&request).unwrap();
    assert!(lsf.contains("#BSUB -W 25:02\n"), "{}", lsf);

    let flux = get_transformer(TransformFormat::Flux).render(&request).unwrap();
    assert!(flux.contains("#FLUX: "), "{}", flux);
}

#[test]
fn test_priority_maps_onto_each_scale() {
    let request = JobRequest { priority: Some(Priority::High), command: vec!["app".to_string()], ..JobRequest::default() };

    let slurm = get_transformer(TransformFormat::Slurm);
    let script = slurm.render(&request).unwrap();
    assert!(script.contains("#SBATCH --nice=-100\n"), "{}", script);
    assert_eq!(slurm.parse(&script).unwrap().priority, Some(Priority::High));

    let pbs = get_transformer(TransformFormat::Pbs);
    let script = pbs.render(&request).unwrap();
    assert!(script.contains("#PBS -p 500\n"), "{}", script);
    assert_eq!(pbs.parse(&script).unwrap().priority, Some(Priority::High));

    let lsf = get_transformer(TransformFormat::Lsf);
    let script = lsf.render(&request).unwrap();
    assert!(script.contains("#BSUB -sp 100\n"), "{}", script);
    assert_eq!(lsf.parse(&script).unwrap().priority, Some(Priority::High));
}

#[test]
fn test_begin_time_is_utc() {
    let request = JobRequest { begin_time: Some(NEW_YEAR_2026), command: vec!["app".to_string()], ..JobRequest::default() };

    let slurm = get_transformer(TransformFormat::Slurm);
    let script = slurm.render(&request).unwrap();
    assert!(script.contains("#SBATCH --begin=2026-01-01T00:00:00\n"), "{}", script);
    assert_eq!(slurm.parse(&script).unwrap().begin_time, Some(NEW_YEAR_2026));
}

#[test]
fn test_translate_slurm_to_pbs() {
    let script = "#!/bin/bash\n#SBATCH -N 2\n#SBATCH -n 4\n#SBATCH -c 2\n#SBATCH --job-name=solver\n\nsrun ./solver --steps 10\n";
    let translation = translate(script, TransformFormat::Slurm, TransformFormat::Pbs).unwrap();

    assert!(translation.artifact.contains("#PBS -N solver\n"));
    assert!(translation.artifact.contains("#PBS -l select=2:ncpus=4:mpiprocs=2\n"));
    assert!(translation.artifact.contains("mpiexec ./solver --steps 10\n"));
}

#[test]
fn test_translate_rejects_bad_source_directives() {
    let script = "#!/bin/bash\n#SBATCH --noodles\nsrun app\n";
    let result = translate(script, TransformFormat::Slurm, TransformFormat::Flux);
    assert!(matches!(result, Err(Error::DirectiveError(_))));
}

#[test]
fn test_detect_format() {
    let script = Path::new("job.sh");
    assert_eq!(TransformFormat::detect(script, "#!/bin/bash\n#SBATCH -N 1\nhostname\n"), Some(TransformFormat::Slurm));
    assert_eq!(TransformFormat::detect(script, "#!/bin/bash\n#FLUX: -N1\nhostname\n"), Some(TransformFormat::Flux));
    assert_eq!(TransformFormat::detect(script, "#!/bin/bash\n#PBS -q debug\nhostname\n"), Some(TransformFormat::Pbs));
    assert_eq!(TransformFormat::detect(script, "#!/bin/bash\n#BSUB -q debug\nhostname\n"), Some(TransformFormat::Lsf));
    assert_eq!(TransformFormat::detect(script, "#!/bin/bash\n#COBALT -n 2\naprun hostname\n"), Some(TransformFormat::Cobalt));
    assert_eq!(TransformFormat::detect(Path::new("job.yaml"), "apiVersion: batch/v1\nkind: Job\n"), Some(TransformFormat::Kubernetes));
    assert_eq!(TransformFormat::detect(Path::new("job.yaml"), "version: 1\n"), Some(TransformFormat::Jobspec));
    assert_eq!(TransformFormat::detect(script, "#!/bin/bash\nhostname\n"), None);
}

#[test]
fn test_format_names() {
    assert_eq!("k8s".parse::<TransformFormat>().unwrap(), TransformFormat::Kubernetes);
    assert_eq!("SLURM".parse::<TransformFormat>().unwrap(), TransformFormat::Slurm);
    assert_eq!("cobalt".parse::<TransformFormat>().unwrap(), TransformFormat::Cobalt);
    assert!(matches!("torque".parse::<TransformFormat>(), Err(TranslationError::UnknownFormat(_))));
}

fn argument_errors(result: Result<JobRequest, Error>) -> Vec<String> {
    match result {
        Err(Error::DirectiveError(report)) => report.argument_errors,
        other => panic!("Expected a directive error, got {:?}", other),
    }
}

#[test]
fn test_oversized_wall_times_are_argument_errors() {
    let slurm = get_transformer(TransformFormat::Slurm).parse("#!/bin/bash\n#SBATCH --time=999999999999999-0\nsrun app\n");
    let errors = argument_errors(slurm);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("argument --time: invalid value '999999999999999-0'"), "{:?}", errors);
    assert!(errors[0].contains("out of range"), "{:?}", errors);

    let pbs = get_transformer(TransformFormat::Pbs).parse("#!/bin/bash\n#PBS -l walltime=99999999999999999:00:00\nmpiexec app\n");
    assert!(argument_errors(pbs)[0].contains("out of range"));

    let lsf = get_transformer(TransformFormat::Lsf).parse("#!/bin/bash\n#BSUB -W 999999999999999999\njsrun app\n");
    assert!(argument_errors(lsf)[0].starts_with("argument -W"));
}

#[test]
fn test_oversized_pbs_chunk_is_an_argument_error() {
    let script = "#!/bin/bash\n#PBS -l select=9999999999:mpiprocs=9999999999\nmpiexec app\n";
    let errors = argument_errors(get_transformer(TransformFormat::Pbs).parse(script));
    assert!(errors[0].starts_with("argument -l: invalid value"), "{:?}", errors);
    assert!(errors[0].contains("out of range"), "{:?}", errors);
}

#[test]
fn test_manifest_limits_saturate() {
    let request = JobRequest { num_nodes: None, num_tasks: Some(u64::MAX), cpus_per_task: Some(4), ..training_request() };
    let manifest = KubernetesTransformer.render(&request).unwrap();
    let value: serde_yaml::Value = serde_yaml::from_str(&manifest).unwrap();

    let limits = &value["spec"]["template"]["spec"]["containers"][0]["resources"]["limits"];
    let saturated = u64::MAX.to_string();
    assert_eq!(limits["cpu"].as_str(), Some(saturated.as_str()));
    assert_eq!(limits["nvidia.com/gpu"].as_str(), Some(saturated.as_str()));
}

#[test]
fn test_memory_and_constraints_in_each_dialect() {
    let request = JobRequest {
        mem_per_task: Some(4096),
        constraints: vec!["skylake".to_string(), "ib".to_string()],
        command: vec!["app".to_string()],
        ..JobRequest::default()
    };

    let slurm = get_transformer(TransformFormat::Slurm);
    let script = slurm.render(&request).unwrap();
    assert!(script.contains("#SBATCH --mem-per-cpu=4G\n"), "{}", script);
    assert!(script.contains("#SBATCH --constraint='skylake&ib'\n"), "{}", script);
    let parsed = slurm.parse(&script).unwrap();
    assert_eq!(parsed.mem_per_task, Some(4096));
    assert_eq!(parsed.constraints, request.constraints);

    let pbs = get_transformer(TransformFormat::Pbs);
    let script = pbs.render(&request).unwrap();
    assert!(script.contains("#PBS -l select=1:ncpus=1:mpiprocs=1:mem=4gb:skylake=true:ib=true\n"), "{}", script);
    let parsed = pbs.parse(&script).unwrap();
    assert_eq!(parsed.mem_per_task, Some(4096));
    assert_eq!(parsed.constraints, request.constraints);

    let lsf = get_transformer(TransformFormat::Lsf);
    let script = lsf.render(&request).unwrap();
    assert!(script.contains("#BSUB -R 'select[skylake && ib] rusage[mem=4096]'\n"), "{}", script);
    let parsed = lsf.parse(&script).unwrap();
    assert_eq!(parsed.mem_per_task, Some(4096));
    assert_eq!(parsed.constraints, request.constraints);

    let flux = get_transformer(TransformFormat::Flux).convert(&request).unwrap();
    assert_eq!(flux.gaps.iter().map(|gap| gap.field).collect::<Vec<_>>(), vec![JobField::MemoryPerTask]);

    let cobalt = get_transformer(TransformFormat::Cobalt).convert(&request).unwrap();
    assert_eq!(cobalt.gaps.iter().map(|gap| gap.field).collect::<Vec<_>>(), vec![JobField::MemoryPerTask, JobField::Constraints]);
}

#[test]
fn test_memory_and_constraints_survive_the_jobspec() {
    let request = JobRequest { mem_per_task: Some(512), constraints: vec!["bigmem".to_string()], ..training_request() };
    let jobspec = request.to_jobspec().unwrap();
    let back = JobRequest::from_jobspec(&jobspec);
    assert_eq!(back.mem_per_task, Some(512));
    assert_eq!(back.constraints, vec!["bigmem"]);
}

#[test]
fn test_cobalt_script_round_trip() {
    let request = JobRequest {
        job_name: Some("climate".to_string()),
        account: Some("Catalyst".to_string()),
        queue: Some("debug-cache-quad".to_string()),
        num_nodes: Some(4),
        num_tasks: Some(256),
        wall_time: Some(1800),
        begin_time: Some(NEW_YEAR_2026),
        depends_on: vec!["101".to_string(), "102".to_string()],
        command: vec!["./climate".to_string(), "--config".to_string(), "run.nml".to_string()],
        ..JobRequest::default()
    };

    let cobalt = get_transformer(TransformFormat::Cobalt);
    let script = cobalt.render(&request).unwrap();
    assert!(script.starts_with("#!/bin/bash\n#COBALT -O climate\n#COBALT -A Catalyst\n"), "{}", script);
    assert!(script.contains("#COBALT -n 4\n#COBALT --proccount=256\n#COBALT -t 00:30:00\n"), "{}", script);
    assert!(script.contains("#COBALT --at=2026-01-01T00:00:00\n#COBALT --dependencies=101:102\n"), "{}", script);
    assert!(script.ends_with("\naprun ./climate --config run.nml\n"), "{}", script);

    let parsed = cobalt.parse(&script).unwrap();
    assert_eq!(JobRequest { script: None, ..parsed }, request);
}

#[test]
fn test_translate_cobalt_to_slurm() {
    let script = "#!/bin/bash\n#COBALT -n 2\n#COBALT --proccount 8\n#COBALT -t 60\n#COBALT -q debug\n\n\
                  aprun -n 8 -N 4 singularity exec lammps.sif lmp -in in.lj\n";
    let translation = translate(script, TransformFormat::Cobalt, TransformFormat::Slurm).unwrap();

    assert!(translation.artifact.contains("#SBATCH --nodes=2\n"), "{}", translation.artifact);
    assert!(translation.artifact.contains("#SBATCH --ntasks=8\n"));
    assert!(translation.artifact.contains("#SBATCH --time=01:00:00\n"));
    assert!(translation.artifact.contains("#SBATCH --partition=debug\n"));
    assert!(translation.artifact.contains("srun singularity exec lammps.sif lmp -in in.lj\n"));
}
