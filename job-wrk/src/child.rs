//! The per-task child process: its own execution logic, and the
//! supervisor that spawns and waits on it from the worker main process.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use job_shr::retry::with_retry;
use log::{debug, error, info};
use specifications::codec::{CodecRegistry, Value};
use specifications::dataset::{shmem_id_for, DatasetId};
use specifications::job::JobId;
use specifications::task::Entrypoint;
use tokio::process::Command;

use crate::entrypoints::{invoke_callable, invoke_module, TaskInput};
use crate::environment;
use crate::errors::WrkError;
use crate::payload::{TaskPayload, TaskResult};
use crate::shmem::Segment;

const OPEN_SEGMENT_ATTEMPTS: u32 = 5;
const OPEN_SEGMENT_BACKOFF: Duration = Duration::from_millis(20);


/***** CHILD-SIDE *****/
/// Runs the task described by the payload at `payload_path` to completion,
/// printing a [`TaskResult`] to stdout and returning the process exit code.
/// Called only from the "run one task" subcommand.
pub async fn run_as_child(payload_path: &Path) -> i32 {
    let payload = match std::fs::read(payload_path).ok().and_then(|b| serde_json::from_slice::<TaskPayload>(&b).ok()) {
        Some(p) => p,
        None => {
            println!("could not read or parse task payload at {}", payload_path.display());
            return 1;
        }
    };

    match execute(&payload).await {
        Ok(output) => {
            let result = TaskResult { output };
            println!("{}", serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string()));
            0
        }
        Err(err) => {
            println!("{err}");
            1
        }
    }
}

/// Executes one task: installs its environment, decodes its dynamic
/// inputs, invokes its entrypoint, and (if it declares an output) encodes
/// and publishes the result as a new shared-memory segment.
async fn execute(payload: &TaskPayload) -> Result<Option<(DatasetId, usize)>, WrkError> {
    let task = &payload.task;
    let codecs = CodecRegistry::with_defaults();

    let _env = environment::install(&task.environment, payload.install_bin.as_deref()).await?;

    let mut dynamic = HashMap::new();
    for (param, dataset_id) in task.dataset_inputs_kw.iter().map(|(k, v)| (k.clone(), v)).chain(task.dataset_inputs_ps.iter().map(|(k, v)| (k.to_string(), v))) {
        let class = task
            .classes_inputs_kw
            .get(&param)
            .or_else(|| param.parse::<u32>().ok().and_then(|p| task.classes_inputs_ps.get(&p)))
            .ok_or_else(|| WrkError::Task(format!("no declared class for input '{param}'")))?;
        let len = *payload
            .known_lengths
            .get(dataset_id)
            .ok_or_else(|| WrkError::UnknownDataset(dataset_id.to_string()))?;

        let shm_id = shmem_id_for(payload.job_id.as_str(), dataset_id);
        let segment = with_retry(OPEN_SEGMENT_ATTEMPTS, OPEN_SEGMENT_BACKOFF, || async { Segment::open(&shm_id) }).await?;
        let bytes = segment.read(len)?;
        let value = codecs.decode(class, &bytes).map_err(|e| WrkError::Task(format!("decoding input '{param}': {e}")))?;
        dynamic.insert(param, value);
    }

    let input = TaskInput { dynamic, static_params: task.static_params_kw.clone() };
    let value: Value = match &task.entrypoint {
        Entrypoint::Module(module) => invoke_module(module, &input)?,
        Entrypoint::Callable(blob) => invoke_callable(blob, &input)?,
    };

    match &task.output_name {
        Some(output_name) => {
            let bytes = codecs.encode(&task.output_class, &value).map_err(|e| WrkError::Task(format!("encoding output: {e}")))?;
            let shm_id = shmem_id_for(payload.job_id.as_str(), output_name);
            let mut segment = Segment::create(&shm_id, bytes.len())?;
            segment.write(&bytes)?;
            Ok(Some((output_name.clone(), bytes.len())))
        }
        None => Ok(None),
    }
}


/***** SUPERVISOR-SIDE *****/
/// Spawns a fresh child process (the worker binary re-invoked with
/// `--run-task`) to run one task, waits for it, and reports what it
/// produced. On a non-zero exit, reads the child's captured stdout for a
/// reported exception string; if the child produced nothing parseable,
/// reports "unable to diagnose".
pub async fn spawn_and_wait(
    self_exe: &Path,
    job_id: &JobId,
    task: &specifications::task::Task,
    known_lengths: &HashMap<DatasetId, usize>,
    install_bin: Option<&str>,
) -> Result<Option<(DatasetId, usize)>, WrkError> {
    let payload = TaskPayload { job_id: job_id.clone(), task: task.clone(), known_lengths: known_lengths.clone(), install_bin: install_bin.map(str::to_string) };
    let payload_file = tempfile::NamedTempFile::new().map_err(|e| WrkError::Resource(format!("creating task payload file: {e}")))?;
    let payload_json = serde_json::to_vec(&payload).map_err(|e| WrkError::Resource(format!("serializing task payload: {e}")))?;
    std::fs::write(payload_file.path(), &payload_json).map_err(|e| WrkError::Resource(format!("writing task payload: {e}")))?;

    debug!("spawning child for task '{}'", task.name);
    let child = Command::new(self_exe)
        .arg("--run-task")
        .arg(payload_file.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| WrkError::Task(format!("spawning child for task '{}': {e}", task.name)))?;

    // `wait_with_output` does not block the event loop; it drains stdout
    // concurrently with waiting for the exit status to resolve.
    let output = child.wait_with_output().await.map_err(|e| WrkError::Task(format!("waiting for task '{}': {e}", task.name)))?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let status = output.status;

    if !status.success() {
        let diagnosis = stdout.lines().last().filter(|l| !l.is_empty()).unwrap_or("unable to diagnose");
        error!("task '{}' exited with {status}: {diagnosis}", task.name);
        return Err(WrkError::Task(diagnosis.to_string()));
    }

    let result: TaskResult = stdout
        .lines()
        .last()
        .and_then(|line| serde_json::from_str(line).ok())
        .ok_or_else(|| WrkError::Task(format!("task '{}' exited 0 but reported no parseable result", task.name)))?;
    info!("task '{}' finished", task.name);
    Ok(result.output)
}


#[cfg(test)]
mod tests {
    use specifications::task::TaskEnvironment;

    use super::*;

    fn reader_task(output_name: &str) -> specifications::task::Task {
        let mut static_params_kw = HashMap::new();
        static_params_kw.insert("value".to_string(), serde_json::json!(42));
        specifications::task::Task {
            name: "reader".into(),
            static_params_kw,
            static_params_ps: HashMap::new(),
            dataset_inputs_ps: HashMap::new(),
            dataset_inputs_kw: HashMap::new(),
            classes_inputs_kw: HashMap::new(),
            classes_inputs_ps: HashMap::new(),
            entrypoint: Entrypoint::Module("builtin.reader".into()),
            output_name: Some(DatasetId::new(output_name)),
            output_class: "int".into(),
            environment: TaskEnvironment::default(),
            host: None,
        }
    }

    #[tokio::test]
    async fn execute_publishes_output_to_shared_memory() {
        let job_id = JobId::generate();
        let payload = TaskPayload { job_id: job_id.clone(), task: reader_task("a"), known_lengths: HashMap::new(), install_bin: None };

        let (dataset_id, len) = execute(&payload).await.unwrap().expect("reader declares an output");
        assert_eq!(dataset_id, DatasetId::new("a"));

        let shm_id = shmem_id_for(job_id.as_str(), &dataset_id);
        let segment = Segment::open(&shm_id).unwrap();
        let bytes = segment.read(len).unwrap();
        assert_eq!(CodecRegistry::with_defaults().decode("int", &bytes).unwrap(), Value::Int(42));
        crate::shmem::unlink(&shm_id).unwrap();
    }

    #[tokio::test]
    async fn execute_errors_when_a_dynamic_input_is_missing_from_known_lengths() {
        let mut task = reader_task("a");
        task.dataset_inputs_kw.insert("input".to_string(), DatasetId::new("ghost"));
        task.classes_inputs_kw.insert("input".to_string(), "int".to_string());
        task.entrypoint = Entrypoint::Module("builtin.writer".into());

        let payload = TaskPayload { job_id: JobId::generate(), task, known_lengths: HashMap::new(), install_bin: None };
        assert!(matches!(execute(&payload).await, Err(WrkError::UnknownDataset(_))));
    }
}
