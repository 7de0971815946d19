use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use circuitgen_core::{CircuitGenError, DesignEntity, LlmClient, PromptSettings, Result};
use circuitgen_engine::{DesignExpander, ExpandOptions, PromptLibrary};
use circuitgen_registry::{ModelRegistry, ModelStore};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Replies keyed by a needle in the prompt. Unscripted prompts fail the
/// call so a test cannot silently take an unexpected path.
struct ScriptedClient {
    script: Vec<(&'static str, String)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(script: Vec<(&'static str, &str)>) -> Self {
        Self {
            script: script
                .into_iter()
                .map(|(needle, reply)| (needle, reply.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn get_answer(&self, prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push(prompt.to_string());
        for (needle, reply) in &self.script {
            if prompt.contains(needle) {
                return Ok(reply.clone());
            }
        }
        Err(CircuitGenError::Client(format!(
            "unscripted prompt: {prompt}"
        )))
    }
}

struct SlowClient;

#[async_trait]
impl LlmClient for SlowClient {
    fn model_name(&self) -> &str {
        "slow"
    }

    async fn get_answer(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(String::new())
    }
}

/// Templates carry a distinct verb per operation so scripted needles can
/// tell a decomposition request for `X` from a generation request for `X`.
fn write_prompt_files(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("topcircuit_generate.md"),
        "DECOMPOSE [Model]: [Description]\nInputs: [InputNode]\nOutputs: [OutputNode]\n",
    )
    .unwrap();
    fs::write(
        dir.join("circuit_generate.md"),
        "GENERATE [Model]: [Description]\nInputs: [InputNode]\nOutputs: [OutputNode]\n",
    )
    .unwrap();
    fs::write(
        dir.join("check_problems.md"),
        "TESTBENCH [Model]\nCode:\n[ModelCode]\n",
    )
    .unwrap();
    fs::write(dir.join("submodule_connect.md"), "CONNECT [Model]\n").unwrap();
}

fn harness(client: Arc<dyn LlmClient>, options: ExpandOptions) -> (DesignExpander, TempDir) {
    let tmp = TempDir::new().unwrap();
    write_prompt_files(&tmp.path().join("prompts"));
    let store = ModelStore::new(
        tmp.path().join("model_json"),
        tmp.path().join("modules"),
        "py",
    );
    let registry = Arc::new(ModelRegistry::new(store));
    let prompts = PromptLibrary::from_settings(&PromptSettings {
        dir: tmp.path().join("prompts"),
        ..Default::default()
    });
    (
        DesignExpander::new(client, registry, prompts, options),
        tmp,
    )
}

fn seed_root(expander: &DesignExpander) {
    expander.registry().put(DesignEntity::new(
        "TopAmp",
        "Two-stage amplifier",
        vec!["Vin".into(), "VDD".into(), "GND".into()],
        vec!["Vout".into()],
    ));
}

const TOP_DECOMPOSITION: &str = "\
The amplifier splits into two stages.

## Module 1
Model: StageA
Description: Input gain stage
Input Nodes: Vin, VDD, GND
Output Nodes: Vmid

## Module 2
Model: StageB
Description: Output buffer stage
Input Nodes: Vmid, VDD, GND
Output Nodes: Vout
";

const LEAF_REPLY_A: &str = "\
Reasoning about the stage.

## NetList Code
```python
circuit.R('load', 'Vmid', 'VDD', 10e3)
```

## Parameter_Explanation
```markdown
Rload sets the stage gain.
```
";

const LEAF_REPLY_B: &str = "\
## NetList Code
```python
circuit.M('1', 'Vout', 'Vmid', 'GND', 'GND', model='NMOS')
```
";

const CONNECT_REPLY: &str = "\
## NetList Code
```python
top = SubCircuit('TopAmp', 'Vin', 'Vout', 'VDD', 'GND')
```
";

#[tokio::test]
async fn root_request_expands_to_resolved_leaves() {
    let client = Arc::new(ScriptedClient::new(vec![
        ("DECOMPOSE TopAmp", TOP_DECOMPOSITION),
        ("DECOMPOSE StageA", "StageA is already elementary."),
        ("DECOMPOSE StageB", "StageB is already elementary."),
        ("GENERATE StageA", LEAF_REPLY_A),
        ("GENERATE StageB", LEAF_REPLY_B),
        ("CONNECT TopAmp", CONNECT_REPLY),
    ]));
    let (expander, tmp) = harness(client.clone(), ExpandOptions::default());
    seed_root(&expander);

    expander.expand("TopAmp").await.unwrap();

    let registry = expander.registry();
    let top = registry.get("TopAmp").unwrap();
    assert!(top.is_composite());
    assert_eq!(top.sub_model_names, vec!["StageA", "StageB"]);
    assert!(top.implementation.as_deref().unwrap().contains("SubCircuit"));

    let stage_a = registry.get("StageA").unwrap();
    assert!(stage_a.is_resolved_leaf());
    assert_eq!(stage_a.input_ports, vec!["Vin", "VDD", "GND"]);
    assert_eq!(
        stage_a.parameter_description.as_deref(),
        Some("Rload sets the stage gain.")
    );

    // StageB carried no parameter segment; that is not an error.
    let stage_b = registry.get("StageB").unwrap();
    assert!(stage_b.implementation.is_some());
    assert!(stage_b.parameter_description.is_none());

    // One decomposition per entity, one generation per leaf, one connection.
    assert_eq!(client.call_count(), 6);

    // Every entity is persisted and every implementation written out.
    for name in ["TopAmp", "StageA", "StageB"] {
        assert!(tmp.path().join("model_json").join(format!("{name}.json")).is_file());
        assert!(tmp.path().join("modules").join(format!("{name}.py")).is_file());
    }
    let code = fs::read_to_string(tmp.path().join("modules/StageA.py")).unwrap();
    assert_eq!(code, "circuit.R('load', 'Vmid', 'VDD', 10e3)");
}

#[tokio::test]
async fn resolved_entities_are_never_regenerated() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let (expander, _tmp) = harness(client.clone(), ExpandOptions::default());

    let mut done = DesignEntity::new("BiasCell", "Bias generator", vec!["VDD".into()], vec!["Vbias".into()]);
    done.implementation = Some("circuit.I('bias', 'VDD', 'Vbias', 1e-5)".into());
    expander.registry().put(done);

    expander.expand("BiasCell").await.unwrap();
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn unknown_root_is_an_error() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let (expander, _tmp) = harness(client, ExpandOptions::default());

    let err = expander.expand("Ghost").await.unwrap_err();
    assert!(matches!(err, CircuitGenError::EntityNotFound(name) if name == "Ghost"));
}

#[tokio::test]
async fn cyclic_declarations_are_reported_with_the_path() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let (expander, _tmp) = harness(client.clone(), ExpandOptions::default());

    let mut a = DesignEntity::named("OscCore");
    a.sub_model_names = vec!["FeedbackNet".into()];
    let mut b = DesignEntity::named("FeedbackNet");
    b.sub_model_names = vec!["OscCore".into()];
    expander.registry().put(a);
    expander.registry().put(b);

    let err = expander.expand("OscCore").await.unwrap_err();
    match err {
        CircuitGenError::CycleDetected(path) => {
            assert_eq!(path, "OscCore -> FeedbackNet -> OscCore");
        }
        other => panic!("expected CycleDetected, got {other}"),
    }
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn depth_limit_bounds_the_walk() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let options = ExpandOptions {
        max_depth: 2,
        ..Default::default()
    };
    let (expander, _tmp) = harness(client, options);

    let mut a = DesignEntity::named("L0");
    a.sub_model_names = vec!["L1".into()];
    let mut b = DesignEntity::named("L1");
    b.sub_model_names = vec!["L2".into()];
    expander.registry().put(a);
    expander.registry().put(b);
    expander.registry().put(DesignEntity::named("L2"));

    let err = expander.expand("L0").await.unwrap_err();
    assert!(matches!(
        err,
        CircuitGenError::DepthExceeded { entity, max: 2 } if entity == "L2"
    ));
}

#[tokio::test]
async fn cancelled_token_aborts_before_any_call() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (expander, _tmp) = harness(client.clone(), ExpandOptions::default());
    let expander = expander.with_cancellation(cancel);
    seed_root(&expander);

    let err = expander.expand("TopAmp").await.unwrap_err();
    assert!(matches!(err, CircuitGenError::Cancelled));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_llm_call_times_out() {
    let options = ExpandOptions {
        call_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let (expander, _tmp) = harness(Arc::new(SlowClient), options);
    seed_root(&expander);

    let before = expander.registry().get("TopAmp").unwrap();
    let err = expander.expand("TopAmp").await.unwrap_err();
    assert!(matches!(err, CircuitGenError::Timeout(_)));
    assert_eq!(expander.registry().get("TopAmp").unwrap(), before);
}

#[tokio::test]
async fn failed_client_call_leaves_the_registry_untouched() {
    // Decomposition finds no sub-modules; the generation prompt is left
    // unscripted so the client call itself fails.
    let client = Arc::new(ScriptedClient::new(vec![(
        "DECOMPOSE TopAmp",
        "No sub-modules are needed.",
    )]));
    let (expander, tmp) = harness(client, ExpandOptions::default());
    seed_root(&expander);
    let before = expander.registry().get("TopAmp").unwrap();

    let err = expander.expand("TopAmp").await.unwrap_err();
    assert!(matches!(err, CircuitGenError::Client(_)));
    assert_eq!(expander.registry().get("TopAmp").unwrap(), before);
    assert!(!tmp.path().join("modules").exists());
}

#[tokio::test]
async fn failed_regeneration_keeps_the_prior_implementation() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let (expander, _tmp) = harness(client, ExpandOptions::default());

    let mut leaf = DesignEntity::new(
        "StageA",
        "Input gain stage",
        vec!["Vin".into()],
        vec!["Vmid".into()],
    );
    leaf.implementation = Some("circuit.R('load', 'Vmid', 'VDD', 10e3)".into());
    leaf.parameter_description = Some("Rload sets the stage gain.".into());
    expander.registry().put(leaf.clone());

    let err = expander.regenerate_leaf("StageA").await.unwrap_err();
    assert!(matches!(err, CircuitGenError::Client(_)));
    assert_eq!(expander.registry().get("StageA").unwrap(), leaf);
}

#[tokio::test]
async fn missing_implementation_segment_leaves_the_leaf_unresolved() {
    let client = Arc::new(ScriptedClient::new(vec![
        ("DECOMPOSE TopAmp", "No sub-modules are needed."),
        ("GENERATE TopAmp", "Sorry, here is prose without any fenced code."),
    ]));
    let (expander, _tmp) = harness(client, ExpandOptions::default());
    seed_root(&expander);

    let err = expander.expand("TopAmp").await.unwrap_err();
    match err {
        CircuitGenError::Extraction { entity, leader } => {
            assert_eq!(entity, "TopAmp");
            assert_eq!(leader, "NetList Code");
        }
        other => panic!("expected Extraction, got {other}"),
    }
    assert!(expander.registry().get("TopAmp").unwrap().implementation.is_none());
}

#[tokio::test]
async fn testbench_items_are_written_per_ordinal() {
    const TEST_REPLY: &str = "\
## Test_Item 1
Checks the DC operating point.
```python
run_dc_sweep()
```
```markdown
Expect Vout near VDD/2.
```

## Test_Item 2
```python
run_ac_analysis()
```
";
    let client = Arc::new(ScriptedClient::new(vec![("TESTBENCH StageA", TEST_REPLY)]));
    let (expander, tmp) = harness(client, ExpandOptions::default());

    let mut leaf = DesignEntity::new("StageA", "Input gain stage", vec!["Vin".into()], vec!["Vmid".into()]);
    leaf.implementation = Some("circuit.R('load', 'Vmid', 'VDD', 10e3)".into());
    expander.registry().put(leaf);

    let paths = expander.generate_tests("StageA").await.unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("StageA_Test01.py"));
    assert!(paths[1].ends_with("StageA_Test02.py"));
    assert_eq!(
        fs::read_to_string(tmp.path().join("modules/StageA_Test01.py")).unwrap(),
        "run_dc_sweep()"
    );

    let entity = expander.registry().get("StageA").unwrap();
    assert_eq!(entity.tests.len(), 2);
    assert_eq!(
        entity.tests[0].description.as_deref(),
        Some("Expect Vout near VDD/2.")
    );
    assert!(entity.tests[1].description.is_none());
}

#[tokio::test]
async fn regenerate_rejects_composites_and_redoes_leaves() {
    const REGENERATED: &str = "\
## NetList Code
```python
circuit.R('load', 'Vmid', 'VDD', 22e3)
```
";
    let client = Arc::new(ScriptedClient::new(vec![("GENERATE StageA", REGENERATED)]));
    let (expander, _tmp) = harness(client, ExpandOptions::default());

    let mut composite = DesignEntity::named("TopAmp");
    composite.sub_model_names = vec!["StageA".into()];
    expander.registry().put(composite);
    let err = expander.regenerate_leaf("TopAmp").await.unwrap_err();
    assert!(matches!(err, CircuitGenError::InvalidOperation(_)));

    let mut leaf = DesignEntity::new("StageA", "Input gain stage", vec!["Vin".into()], vec!["Vmid".into()]);
    leaf.implementation = Some("circuit.R('load', 'Vmid', 'VDD', 10e3)".into());
    expander.registry().put(leaf);

    expander.regenerate_leaf("StageA").await.unwrap();
    let entity = expander.registry().get("StageA").unwrap();
    assert_eq!(
        entity.implementation.as_deref(),
        Some("circuit.R('load', 'Vmid', 'VDD', 22e3)")
    );
}
