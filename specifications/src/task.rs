//! The task/DAG model: the user-facing template (`TaskDefinition` +
//! `TaskDAGBuilder`) used to collect parameters, and the materialized,
//! ready-to-schedule `TaskDAG` built from it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetId;
use crate::typesystem::convert;

mod base64_vec {
    use base64::{decode, encode};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> { encode(bytes).serialize(s) }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        decode(&s).map_err(serde::de::Error::custom)
    }
}


/***** LIBRARY *****/
/// Describes one user-supplied parameter's expected class tag (see
/// [`crate::typesystem::convert`]) and its default literal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskParameter {
    pub clazz: String,
    #[serde(default)]
    pub default: String,
}

/// The pip-installable packages a task's entrypoint needs on the worker.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskEnvironment {
    #[serde(default)]
    pub packages: Vec<String>,
}

impl TaskEnvironment {
    pub fn merge(&self, other: &Self) -> Self {
        Self { packages: self.packages.iter().chain(other.packages.iter()).cloned().collect() }
    }
}

/// The catalog entry for a task kind: what parameters it needs from the
/// user, what dynamic (dataset-sourced) inputs it needs from other tasks,
/// and what it produces. Used to generate input forms and to validate a
/// [`TaskDAGBuilder`] before it is materialized into a [`TaskDAG`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// `python_module.submodules.function_name`, resolved by the worker's
    /// entrypoint registry.
    pub entrypoint: String,
    pub user_params: HashMap<String, TaskParameter>,
    pub output_class: String,
    #[serde(default)]
    pub dynamic_param_classes: HashMap<String, String>,
    #[serde(default)]
    pub environment: TaskEnvironment,
}

impl TaskDefinition {
    /// A short human-readable signature, e.g. `(int,str) -> ndarray`.
    pub fn signature_repr(&self) -> String {
        let dparams: Vec<&str> = self.dynamic_param_classes.values().map(String::as_str).collect();
        format!("({}) -> {}", dparams.join(","), self.output_class)
    }
}

/// A resolved entrypoint for a materialized [`Task`]: either a dotted module
/// path resolved against the worker's registry, or an inline, serialized
/// callable body shipped with the job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Entrypoint {
    Module(String),
    Callable(#[serde(with = "base64_vec")] Vec<u8>),
}

/// An atomic computation within a [`TaskDAG`], built from user input
/// (validated via a [`TaskDefinition`]) and ready to hand to a worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// The task's name within the DAG.
    pub name: String,
    pub static_params_kw: HashMap<String, serde_json::Value>,
    pub static_params_ps: HashMap<u32, serde_json::Value>,
    pub dataset_inputs_ps: HashMap<u32, DatasetId>,
    pub dataset_inputs_kw: HashMap<String, DatasetId>,
    pub classes_inputs_kw: HashMap<String, String>,
    pub classes_inputs_ps: HashMap<u32, String>,
    pub entrypoint: Entrypoint,
    pub output_name: Option<DatasetId>,
    pub output_class: String,
    pub environment: TaskEnvironment,
    /// Pins this task to a specific worker host by id, for multi-host
    /// scheduling (see `job_sched::partition`). `None` leaves the task free
    /// to land on any host with spare capacity.
    #[serde(default)]
    pub host: Option<String>,
}

/// A complete, schedulable computation: its tasks in topological (i.e.
/// computable) order, and the dataset the job's caller ultimately wants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDAG {
    pub tasks: Vec<Task>,
    pub output_id: Option<DatasetId>,
}

impl TaskDAG {
    /// Validates the dataset wiring between tasks without needing access to
    /// the task catalog: every dynamic input names a dataset that some
    /// earlier task actually produces, with a matching class tag, and (if
    /// set) `output_id` names a dataset some task produces.
    ///
    /// Collects every violation rather than stopping at the first one. This
    /// is the subset of validation a component holding only a materialized
    /// DAG (no catalog) can run, e.g. the controller at `submit_dag` time.
    pub fn validate_structure(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut produced: HashMap<&str, (usize, &str)> = HashMap::new();

        for (i, task) in self.tasks.iter().enumerate() {
            if let Some(out) = &task.output_name { produced.insert(out.as_str(), (i, task.output_class.as_str())); }
        }

        for (i, task) in self.tasks.iter().enumerate() {
            for (param, dataset_id) in task.dataset_inputs_kw.iter().map(|(k, v)| (k.clone(), v)).chain(
                task.dataset_inputs_ps.iter().map(|(k, v)| (k.to_string(), v)),
            ) {
                let Some(&(that_i, that_class)) = produced.get(dataset_id.as_str()) else {
                    errors.push(format!("task {} needs dataset {dataset_id} which no task produces", task.name));
                    continue;
                };
                if that_i >= i {
                    errors.push(format!("task {} needs dataset {dataset_id} which is not produced before it runs", task.name));
                }
                let declared = task.classes_inputs_kw.get(&param).cloned().or_else(|| {
                    param.parse::<u32>().ok().and_then(|p| task.classes_inputs_ps.get(&p).cloned())
                });
                match declared {
                    None => errors.push(format!("task {} does not declare a class for input {param}", task.name)),
                    Some(declared) if declared != that_class => {
                        errors.push(format!("task {} needs input {param} to be {declared} but its source produces {that_class}", task.name));
                    }
                    _ => {}
                }
            }
        }

        if let Some(output_id) = &self.output_id {
            if !produced.contains_key(output_id.as_str()) {
                errors.push(format!("output_id {output_id} is not produced by any task in the dag"));
            }
        }

        errors
    }

    /// Validates the DAG against the catalog entries it was built from:
    /// [`Self::validate_structure`] plus checking that every task supplies
    /// all of its definition's declared user parameters.
    pub fn validate(&self, definitions: &HashMap<String, TaskDefinition>) -> Vec<String> {
        let mut errors = self.validate_structure();

        for task in &self.tasks {
            let Some(defin) = definitions.get(&task.name) else {
                errors.push(format!("task {} has no known task definition", task.name));
                continue;
            };

            let mut missing: Vec<&str> = defin
                .user_params
                .keys()
                .filter(|p| !task.static_params_kw.contains_key(p.as_str()))
                .map(String::as_str)
                .collect();
            missing.sort_unstable();
            if !missing.is_empty() {
                errors.push(format!("task {} is missing user params {}", task.name, missing.join(", ")));
            }
        }

        errors
    }
}

/// Used to build a parameter input form and, once the user has filled in
/// `dynamic_task_inputs`, a [`TaskDAG`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDAGBuilder {
    /// Tasks in (some) topological order, paired with their catalog
    /// definitions.
    pub tasks: Vec<(String, TaskDefinition)>,
    /// `task_name -> { param_name -> producing_task_name }`.
    pub dynamic_task_inputs: HashMap<String, HashMap<String, String>>,
    pub final_output_at: String,
    /// `task_name -> pinned host id`, for multi-host scheduling. A task
    /// absent here is left free to land on any host with spare capacity.
    #[serde(default)]
    pub task_hosts: HashMap<String, String>,
}

impl TaskDAGBuilder {
    /// Validates that every dynamic input names a task that both exists and
    /// precedes its consumer, that its class tag matches the producer's
    /// output class, and that no declared dynamic input is left unfilled.
    /// Collects every violation rather than stopping at the first one.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut task_order: HashMap<&str, usize> = HashMap::new();

        for (i, (name, _)) in self.tasks.iter().enumerate() {
            if let Some(first) = task_order.get(name.as_str()) {
                errors.push(format!("task {name} first seen at position {first} but repeated at {i}"));
            } else {
                task_order.insert(name.as_str(), i);
            }
        }

        for (this_n, dynputs) in &self.dynamic_task_inputs {
            let Some(&this_i) = task_order.get(this_n.as_str()) else { continue };
            let this_t = &self.tasks[this_i].1;

            for (param, provider) in dynputs {
                let Some(&that_i) = task_order.get(provider.as_str()) else {
                    errors.push(format!("task {this_n} is supposed to received param {param} from {provider} but no such task is known"));
                    continue;
                };
                let that_t = &self.tasks[that_i].1;

                if that_i >= this_i {
                    errors.push(format!("task {this_n} needs param {param} from {provider} which does not come before in the schedule"));
                }
                match this_t.dynamic_param_classes.get(param) {
                    None => errors.push(format!("task {this_n} does not declare input {param} yet template fills it")),
                    Some(this_c) if this_c != &that_t.output_class => {
                        errors.push(format!("task {this_n} needs param {param} to be {this_c} but {provider} outputs {}", that_t.output_class));
                    }
                    _ => {}
                }
            }

            let mut missing: Vec<&str> = this_t
                .dynamic_param_classes
                .keys()
                .filter(|p| !dynputs.contains_key(p.as_str()))
                .map(String::as_str)
                .collect();
            missing.sort_unstable();
            if !missing.is_empty() {
                errors.push(format!("task {this_n} is missing dynamic inputs {}", missing.join(", ")));
            }
        }

        errors
    }

    /// Converts every user-supplied literal into a typed JSON value via
    /// [`convert`] and assembles the materialized [`TaskDAG`]. A user
    /// parameter the caller did not supply is never silently defaulted in
    /// (a `TaskParameter`'s `default` is form-prefill data for the client,
    /// not a materialize-time fallback) — it is instead reported as a
    /// missing user param, the same defect [`TaskDAG::validate`] would
    /// catch given a definitions catalog. Callers should still call
    /// [`Self::validate`] first; this additionally surfaces any
    /// per-parameter conversion failure.
    pub fn materialize(&self, user_literals: &HashMap<String, HashMap<String, String>>) -> Result<TaskDAG, Vec<String>> {
        let mut errors = Vec::new();
        let mut tasks = Vec::with_capacity(self.tasks.len());

        for (name, defin) in &self.tasks {
            let literals = user_literals.get(name);
            let mut static_params_kw = HashMap::new();
            let mut missing: Vec<&str> = Vec::new();
            for (pname, pdef) in &defin.user_params {
                match literals.and_then(|l| l.get(pname)) {
                    Some(literal) => match convert(&pdef.clazz, literal) {
                        Ok(v) => { static_params_kw.insert(pname.clone(), v); }
                        Err(e) => errors.push(format!("task {name} param {pname}: {e}")),
                    },
                    None => missing.push(pname.as_str()),
                }
            }
            missing.sort_unstable();
            if !missing.is_empty() {
                errors.push(format!("task {name} is missing user params {}", missing.join(", ")));
            }

            let dynputs = self.dynamic_task_inputs.get(name).cloned().unwrap_or_default();
            let dataset_inputs_kw: HashMap<String, DatasetId> =
                dynputs.into_iter().map(|(param, provider)| (param, DatasetId::new(provider))).collect();
            let classes_inputs_kw = defin.dynamic_param_classes.clone();

            // A task's output dataset is addressed by the task's own name.
            let output_name = Some(DatasetId::new(name.clone()));

            tasks.push(Task {
                name: name.clone(),
                static_params_kw,
                static_params_ps: HashMap::new(),
                dataset_inputs_ps: HashMap::new(),
                dataset_inputs_kw,
                classes_inputs_kw,
                classes_inputs_ps: HashMap::new(),
                entrypoint: Entrypoint::Module(defin.entrypoint.clone()),
                output_name: output_name.clone(),
                output_class: defin.output_class.clone(),
                environment: defin.environment.clone(),
                host: self.task_hosts.get(name).cloned(),
            });
        }

        if !errors.is_empty() { return Err(errors); }

        let output_id = Some(DatasetId::new(self.final_output_at.clone()));
        Ok(TaskDAG { tasks, output_id })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn def(entrypoint: &str, output_class: &str) -> TaskDefinition {
        TaskDefinition { entrypoint: entrypoint.into(), user_params: HashMap::new(), output_class: output_class.into(), dynamic_param_classes: HashMap::new(), environment: TaskEnvironment::default() }
    }

    #[test]
    fn builder_detects_repeated_task_name() {
        let b = TaskDAGBuilder {
            tasks: vec![("a".into(), def("m.a", "int")), ("a".into(), def("m.a", "int"))],
            dynamic_task_inputs: HashMap::new(),
            final_output_at: "a".into(),
            task_hosts: HashMap::new(),
        };
        let errs = b.validate();
        assert!(errs.iter().any(|e| e.contains("repeated")));
    }

    #[test]
    fn builder_detects_out_of_order_dependency() {
        let mut dyn_inputs = HashMap::new();
        let mut a_inputs = HashMap::new();
        a_inputs.insert("x".to_string(), "b".to_string());
        dyn_inputs.insert("a".to_string(), a_inputs);

        let mut a_def = def("m.a", "int");
        a_def.dynamic_param_classes.insert("x".into(), "int".into());

        let b = TaskDAGBuilder {
            tasks: vec![("a".into(), a_def), ("b".into(), def("m.b", "int"))],
            dynamic_task_inputs: dyn_inputs,
            final_output_at: "b".into(),
            task_hosts: HashMap::new(),
        };
        let errs = b.validate();
        assert!(errs.iter().any(|e| e.contains("does not come before")));
    }

    #[test]
    fn builder_detects_missing_dynamic_input() {
        let mut a_def = def("m.a", "int");
        a_def.dynamic_param_classes.insert("x".into(), "int".into());

        let b = TaskDAGBuilder {
            tasks: vec![("a".into(), a_def)],
            dynamic_task_inputs: HashMap::new(),
            final_output_at: "a".into(),
            task_hosts: HashMap::new(),
        };
        let errs = b.validate();
        assert!(errs.iter().any(|e| e.contains("missing dynamic inputs")));
    }

    #[test]
    fn materialize_reports_a_missing_required_user_param_instead_of_defaulting_it() {
        let mut a_def = def("m.a", "int");
        a_def.user_params.insert("threshold".into(), TaskParameter { clazz: "int".into(), default: "0".into() });

        let b = TaskDAGBuilder {
            tasks: vec![("a".into(), a_def)],
            dynamic_task_inputs: HashMap::new(),
            final_output_at: "a".into(),
            task_hosts: HashMap::new(),
        };
        let errs = b.materialize(&HashMap::new()).unwrap_err();
        assert!(errs.iter().any(|e| e.contains("a") && e.contains("missing user params") && e.contains("threshold")));
    }

    #[test]
    fn materialize_accepts_a_supplied_required_user_param() {
        let mut a_def = def("m.a", "int");
        a_def.user_params.insert("threshold".into(), TaskParameter { clazz: "int".into(), default: "0".into() });

        let b = TaskDAGBuilder {
            tasks: vec![("a".into(), a_def)],
            dynamic_task_inputs: HashMap::new(),
            final_output_at: "a".into(),
            task_hosts: HashMap::new(),
        };
        let mut literals = HashMap::new();
        let mut a_literals = HashMap::new();
        a_literals.insert("threshold".to_string(), "5".to_string());
        literals.insert("a".to_string(), a_literals);

        let dag = b.materialize(&literals).unwrap();
        assert_eq!(dag.tasks[0].static_params_kw.get("threshold"), Some(&serde_json::json!(5)));
    }

    #[test]
    fn dag_validate_collects_all_errors_not_just_first() {
        let task = Task {
            name: "a".into(),
            static_params_kw: HashMap::new(),
            static_params_ps: HashMap::new(),
            dataset_inputs_ps: HashMap::new(),
            dataset_inputs_kw: HashMap::new(),
            classes_inputs_kw: HashMap::new(),
            classes_inputs_ps: HashMap::new(),
            entrypoint: Entrypoint::Module("m.a".into()),
            output_name: None,
            output_class: "int".into(),
            environment: TaskEnvironment::default(),
            host: None,
        };
        let mut defin = def("m.a", "int");
        defin.user_params.insert("p".into(), TaskParameter { clazz: "int".into(), default: "".into() });

        let mut definitions = HashMap::new();
        definitions.insert("a".to_string(), defin);
        let dag = TaskDAG { tasks: vec![task], output_id: Some(DatasetId::new("nope")) };

        let errs = dag.validate(&definitions);
        assert!(errs.iter().any(|e| e.contains("missing user params")));
        assert!(errs.iter().any(|e| e.contains("not produced")));
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn dag_validate_catches_missing_producer_misorder_and_class_mismatch_together() {
        let mut b_inputs_kw = HashMap::new();
        b_inputs_kw.insert("x".to_string(), DatasetId::new("a"));
        b_inputs_kw.insert("y".to_string(), DatasetId::new("ghost"));
        let mut b_classes_kw = HashMap::new();
        b_classes_kw.insert("x".to_string(), "str".to_string());

        let a = Task {
            name: "a".into(),
            static_params_kw: HashMap::new(),
            static_params_ps: HashMap::new(),
            dataset_inputs_ps: HashMap::new(),
            dataset_inputs_kw: HashMap::new(),
            classes_inputs_kw: HashMap::new(),
            classes_inputs_ps: HashMap::new(),
            entrypoint: Entrypoint::Module("m.a".into()),
            output_name: Some(DatasetId::new("a")),
            output_class: "int".into(),
            environment: TaskEnvironment::default(),
            host: None,
        };
        let b = Task {
            name: "b".into(),
            static_params_kw: HashMap::new(),
            static_params_ps: HashMap::new(),
            dataset_inputs_ps: HashMap::new(),
            dataset_inputs_kw: b_inputs_kw,
            classes_inputs_kw: b_classes_kw,
            classes_inputs_ps: HashMap::new(),
            entrypoint: Entrypoint::Module("m.b".into()),
            output_name: Some(DatasetId::new("b")),
            output_class: "str".into(),
            environment: TaskEnvironment::default(),
            host: None,
        };
        // `b` is listed before `a`, so even the real producer is out of order.
        let dag = TaskDAG { tasks: vec![b, a], output_id: None };
        let errs = dag.validate_structure();

        assert!(errs.iter().any(|e| e.contains("ghost") && e.contains("no task produces")));
        assert!(errs.iter().any(|e| e.contains("not produced before it runs")));
        assert!(errs.iter().any(|e| e.contains("to be str but its source produces int")));
    }
}
