//! Job submission through the `torchx` CLI.
//!
//! Commands are built as argument vectors and executed without a shell, so
//! project names, images and namespaces are passed through verbatim.

use crate::config::JobDefaults;
use crate::error::{TrainingError, TrainingResult};
use crate::experiment::ExperimentName;
use crate::layout::{validate_segment, ProjectLayout};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const TORCHX_PROGRAM: &str = "torchx";
pub const SCHEDULER: &str = "kubernetes_mcad";
pub const VOLUME_MOUNT: &str = "type=volume,src=data,dst=/data";

const TRAIN_SCRIPT: &str = "mmsegmentation/tools/train.py";
const TEST_SCRIPT: &str = "mmsegmentation/tools/test.py";
const INFER_SCRIPT: &str = "mmsegmentation/tools/geospatial_batch_inference.py";

/// Identifier printed by the scheduler for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Train,
    Test,
    Infer,
}

impl JobKind {
    #[must_use]
    pub fn script(self) -> &'static str {
        match self {
            Self::Train => TRAIN_SCRIPT,
            Self::Test => TEST_SCRIPT,
            Self::Infer => INFER_SCRIPT,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Train => "train",
            Self::Test => "test",
            Self::Infer => "infer",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub kind: JobKind,
    pub layout: ProjectLayout,
    pub experiment: ExperimentName,
    pub namespace: String,
    pub image: String,
    pub num_gpus: u32,
    pub memory_mb: u32,
    /// Checkpoint file inside the experiment directory (test/infer).
    pub checkpoint: String,
    /// Band selection passed to inference, e.g. `[2,1,0,3]`.
    pub bands: String,
}

impl JobRequest {
    /// Request populated from configured defaults. Training asks for more
    /// memory than testing and inference.
    #[must_use]
    pub fn new(
        kind: JobKind,
        layout: ProjectLayout,
        experiment: ExperimentName,
        namespace: impl Into<String>,
        defaults: &JobDefaults,
    ) -> Self {
        let memory_mb = match kind {
            JobKind::Train => defaults.train_memory_mb,
            JobKind::Test | JobKind::Infer => defaults.eval_memory_mb,
        };
        Self {
            kind,
            layout,
            experiment,
            namespace: namespace.into(),
            image: defaults.image.clone(),
            num_gpus: defaults.num_gpus,
            memory_mb,
            checkpoint: defaults.checkpoint.clone(),
            bands: defaults.bands.clone(),
        }
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(TrainingError::Submit("namespace is required".to_string()));
        }
        if self.image.trim().is_empty() {
            return Err(TrainingError::Submit("image is required".to_string()));
        }
        if self.memory_mb == 0 {
            return Err(TrainingError::Submit("memory_mb must be >= 1".to_string()));
        }
        if self.kind != JobKind::Train {
            validate_segment(&self.checkpoint)
                .map_err(|e| TrainingError::Submit(format!("checkpoint {e}")))?;
        }
        if self.kind == JobKind::Infer && self.bands.trim().is_empty() {
            return Err(TrainingError::Submit("bands are required for inference".to_string()));
        }
        Ok(())
    }
}

/// Repository part of an image reference, i.e. without the tag.
#[must_use]
pub fn image_repo(image: &str) -> &str {
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => repo,
        _ => image,
    }
}

/// A fully built `torchx` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorchxCommand {
    program: String,
    args: Vec<String>,
}

impl TorchxCommand {
    #[must_use]
    pub fn for_request(request: &JobRequest) -> Self {
        let mut args: Vec<String> = [
            "run",
            "--workspace",
            "",
            "--scheduler",
            SCHEDULER,
            "--scheduler_args",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(format!("namespace={},image_repo={}", request.namespace, image_repo(&request.image)));
        args.extend(["dist.ddp", "-j", "1x1", "--image"].map(String::from));
        args.push(request.image.clone());
        args.push("--gpu".to_string());
        args.push(request.num_gpus.to_string());
        args.push("--memMB".to_string());
        args.push(request.memory_mb.to_string());
        args.extend(["--mount", VOLUME_MOUNT, "--script", request.kind.script(), "--"].map(String::from));
        args.extend(script_args(request));

        Self { program: TORCHX_PROGRAM.to_string(), args }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Human-readable rendering, one option per line.
    #[must_use]
    pub fn preview(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            if arg.starts_with("--") {
                out.push_str("\n     ");
            } else {
                out.push(' ');
            }
            out.push_str(&quote_arg(arg));
        }
        out
    }
}

fn script_args(request: &JobRequest) -> Vec<String> {
    let layout = &request.layout;
    let exp = &request.experiment;
    let exp_dir = layout.container_experiment_dir(exp);
    let exp_config = format!("{exp_dir}/{exp}_config.py");
    let checkpoint = format!("{exp_dir}/{}", request.checkpoint);

    match request.kind {
        JobKind::Train => vec![
            layout.container_config_path(exp),
            "--launcher".to_string(),
            "pytorch".to_string(),
            "--cfg-options".to_string(),
            "find_unused_parameters=True".to_string(),
            "--no-validate".to_string(),
        ],
        JobKind::Test => vec![
            exp_config,
            checkpoint,
            "--eval".to_string(),
            "mIoU".to_string(),
            "--work-dir".to_string(),
            exp_dir,
        ],
        JobKind::Infer => {
            let project_dir = layout.container_project_dir();
            vec![
                "-config".to_string(),
                exp_config,
                "-ckpt".to_string(),
                checkpoint,
                "-input".to_string(),
                format!("{project_dir}/inference/"),
                "-output".to_string(),
                format!("{project_dir}/inference/pred/{exp}/"),
                "-bands".to_string(),
                request.bands.clone(),
            ]
        }
    }
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg.chars().all(|c| c.is_ascii_alphanumeric() || "-_./=,:[]@+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> TrainingResult<CommandOutput>;
}

/// Runs commands as child processes and waits for them to exit.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> TrainingResult<CommandOutput> {
        let output = tokio::process::Command::new(program).args(args).output().await.map_err(|e| {
            TrainingError::Submit(format!("failed to start `{program}`: {e}"))
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Extract the job identifier from the scheduler's standard output.
pub fn parse_job_id(stdout: &[u8]) -> TrainingResult<JobHandle> {
    let text = String::from_utf8_lossy(stdout);
    let id = text.trim_end_matches(['\n', '\r']);
    if id.trim().is_empty() {
        return Err(TrainingError::Submit("scheduler printed no job identifier".to_string()));
    }
    Ok(JobHandle(id.to_string()))
}

/// Build and run the command for `request`, returning the job handle.
pub async fn submit(runner: &dyn CommandRunner, request: &JobRequest) -> TrainingResult<JobHandle> {
    request.validate()?;
    let command = TorchxCommand::for_request(request);
    debug!(command = %command.preview(), "submitting job");

    let output = runner.run(command.program(), command.args()).await?;
    if !output.success {
        let code = output.code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        return Err(TrainingError::Submit(format!(
            "`{}` exited with {code}\nstdout:\n{}\nstderr:\n{}",
            command.program(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        )));
    }

    let handle = parse_job_id(&output.stdout)?;
    info!(kind = %request.kind, experiment = %request.experiment, job = %handle, "job submitted");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ProjectName;
    use std::sync::Mutex;

    struct FakeRunner {
        output: CommandOutput,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl FakeRunner {
        fn new(success: bool, stdout: &str, stderr: &str) -> Self {
            Self {
                output: CommandOutput {
                    success,
                    code: Some(if success { 0 } else { 1 }),
                    stdout: stdout.as_bytes().to_vec(),
                    stderr: stderr.as_bytes().to_vec(),
                },
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, program: &str, args: &[String]) -> TrainingResult<CommandOutput> {
            self.calls.lock().unwrap().push((program.to_string(), args.to_vec()));
            Ok(self.output.clone())
        }
    }

    fn request(kind: JobKind) -> JobRequest {
        JobRequest::new(
            kind,
            ProjectLayout::new("/opt/app-root/src/data/", ProjectName::new("floods").unwrap()),
            ExperimentName::parse("floods-exp-20240501-1230").unwrap(),
            "geo-team",
            &JobDefaults::default(),
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    const PREFIX: [&str; 16] = [
        "run",
        "--workspace",
        "",
        "--scheduler",
        "kubernetes_mcad",
        "--scheduler_args",
        "namespace=geo-team,image_repo=quay.io/bedwards-ibm/mmsegmentation-geo",
        "dist.ddp",
        "-j",
        "1x1",
        "--image",
        "quay.io/bedwards-ibm/mmsegmentation-geo:latest",
        "--gpu",
        "1",
        "--memMB",
        "MEM",
    ];

    fn prefix(mem: &str) -> Vec<String> {
        PREFIX.iter().map(|s| if *s == "MEM" { mem.to_string() } else { (*s).to_string() }).collect()
    }

    #[test]
    fn test_train_command() {
        let cmd = TorchxCommand::for_request(&request(JobKind::Train));
        let mut expected = prefix("26000");
        expected.extend(strings(&[
            "--mount",
            "type=volume,src=data,dst=/data",
            "--script",
            "mmsegmentation/tools/train.py",
            "--",
            "/data/floods/configs/floods-exp-20240501-1230_config.py",
            "--launcher",
            "pytorch",
            "--cfg-options",
            "find_unused_parameters=True",
            "--no-validate",
        ]));
        assert_eq!(cmd.program(), "torchx");
        assert_eq!(cmd.args(), expected.as_slice());
    }

    #[test]
    fn test_test_command() {
        let cmd = TorchxCommand::for_request(&request(JobKind::Test));
        let dir = "/data/floods/fine-tune-checkpoints/floods-exp-20240501-1230";
        let mut expected = prefix("8000");
        expected.extend(strings(&[
            "--mount",
            "type=volume,src=data,dst=/data",
            "--script",
            "mmsegmentation/tools/test.py",
            "--",
        ]));
        expected.push(format!("{dir}/floods-exp-20240501-1230_config.py"));
        expected.push(format!("{dir}/latest.pth"));
        expected.extend(strings(&["--eval", "mIoU", "--work-dir", dir]));
        assert_eq!(cmd.args(), expected.as_slice());
    }

    #[test]
    fn test_infer_command() {
        let mut req = request(JobKind::Infer);
        req.checkpoint = "iter_500.pth".to_string();
        let cmd = TorchxCommand::for_request(&req);
        let args = cmd.args();
        let tail = &args[args.len() - 10..];
        let dir = "/data/floods/fine-tune-checkpoints/floods-exp-20240501-1230";

        assert_eq!(args[15], "8000");
        assert!(args.contains(&"mmsegmentation/tools/geospatial_batch_inference.py".to_string()));
        assert_eq!(
            tail,
            &[
                "-config".to_string(),
                format!("{dir}/floods-exp-20240501-1230_config.py"),
                "-ckpt".to_string(),
                format!("{dir}/iter_500.pth"),
                "-input".to_string(),
                "/data/floods/inference/".to_string(),
                "-output".to_string(),
                "/data/floods/inference/pred/floods-exp-20240501-1230/".to_string(),
                "-bands".to_string(),
                "[2,1,0,3]".to_string(),
            ]
        );
    }

    #[test]
    fn test_metacharacters_stay_single_arguments() {
        let mut req = request(JobKind::Train);
        req.namespace = "ns; rm -rf /".to_string();
        let cmd = TorchxCommand::for_request(&req);
        assert_eq!(cmd.args()[6], "namespace=ns; rm -rf /,image_repo=quay.io/bedwards-ibm/mmsegmentation-geo");
        assert!(cmd.preview().contains("'namespace=ns; rm -rf /,image_repo="));
    }

    #[test]
    fn test_image_repo() {
        assert_eq!(image_repo("quay.io/org/img:latest"), "quay.io/org/img");
        assert_eq!(image_repo("registry:5000/org/img"), "registry:5000/org/img");
        assert_eq!(image_repo("img"), "img");
    }

    #[test]
    fn test_preview_breaks_on_options() {
        let preview = TorchxCommand::for_request(&request(JobKind::Train)).preview();
        assert!(preview.starts_with("torchx run\n     --workspace ''\n     --scheduler kubernetes_mcad"));
        assert!(preview.ends_with("\n     --no-validate"));
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id(b"job-123\n").unwrap(), JobHandle("job-123".to_string()));
        assert_eq!(parse_job_id(b"kubernetes_mcad://geo/job-9\r\n").unwrap().0, "kubernetes_mcad://geo/job-9");
        assert!(parse_job_id(b"\n").is_err());
    }

    #[tokio::test]
    async fn test_submit_returns_handle() {
        let runner = FakeRunner::new(true, "job-123\n", "");
        let handle = submit(&runner, &request(JobKind::Train)).await.unwrap();

        assert_eq!(handle.0, "job-123");
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "torchx");
    }

    #[tokio::test]
    async fn test_submit_failure_carries_output() {
        let runner = FakeRunner::new(false, "partial", "no such namespace");
        let err = submit(&runner, &request(JobKind::Test)).await.unwrap_err().to_string();
        assert!(err.contains("no such namespace"));
        assert!(err.contains("partial"));
    }

    #[tokio::test]
    async fn test_submit_validates_before_running() {
        let runner = FakeRunner::new(true, "job-1\n", "");
        let mut req = request(JobKind::Test);
        req.checkpoint = "../escape.pth".to_string();
        assert!(submit(&runner, &req).await.is_err());
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
