use std::sync::Arc;
use std::time::Duration;

use circuitgen_core::{CircuitGenError, DesignEntity, LlmClient, Result, Settings};
use circuitgen_parser as parser;
use circuitgen_registry::ModelRegistry;
use futures::future::BoxFuture;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompts::{append_sub_model_summaries, PromptKind, PromptLibrary};
use crate::template;

/// Knobs for one expansion run.
#[derive(Debug, Clone)]
pub struct ExpandOptions {
    /// Segment leader for generated implementations.
    pub implementation_leader: String,
    /// Segment leader for parameter descriptions.
    pub parameter_leader: String,
    /// Fence tag for test code in testbench replies.
    pub code_tag: String,
    /// Fence tag for test descriptions in testbench replies.
    pub doc_tag: String,
    /// Upper bound on recursion depth.
    pub max_depth: usize,
    /// Orchestrator-level bound on one LLM call. `from_settings` sizes this
    /// to cover the client's whole retry budget (every attempt plus the
    /// backoff between them), so in-client retries are never cut short.
    pub call_timeout: Duration,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            implementation_leader: "NetList Code".to_string(),
            parameter_leader: "Parameter_Explanation".to_string(),
            code_tag: "python".to_string(),
            doc_tag: "markdown".to_string(),
            max_depth: 8,
            call_timeout: Duration::from_secs(180),
        }
    }
}

impl ExpandOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        // llm.timeout_secs bounds one HTTP request; the client retries up to
        // max_retries times with 1s, 2s, 4s, ... backoff in between.
        let attempts = u64::from(settings.llm.max_retries) + 1;
        let backoff_secs = (1u64 << settings.llm.max_retries.min(16)) - 1;
        let budget_secs = settings
            .llm
            .timeout_secs
            .saturating_mul(attempts)
            .saturating_add(backoff_secs);
        Self {
            implementation_leader: settings.expansion.implementation_leader.clone(),
            parameter_leader: settings.expansion.parameter_leader.clone(),
            code_tag: settings.expansion.code_tag.clone(),
            doc_tag: settings.expansion.doc_tag.clone(),
            max_depth: settings.expansion.max_depth,
            call_timeout: Duration::from_secs(budget_secs),
        }
    }
}

/// Recursive design-expansion orchestrator.
///
/// Walks a root entity down the decomposition state machine: request
/// sub-model declarations, register them, recurse into each, and generate
/// implementations at the leaves. The LLM call is the sole suspension point;
/// every node entry checks the cancellation token, the in-progress path
/// guards against cycles, and `max_depth` bounds runaway graphs.
pub struct DesignExpander {
    client: Arc<dyn LlmClient>,
    registry: Arc<ModelRegistry>,
    prompts: PromptLibrary,
    options: ExpandOptions,
    cancel: CancellationToken,
}

impl DesignExpander {
    pub fn new(
        client: Arc<dyn LlmClient>,
        registry: Arc<ModelRegistry>,
        prompts: PromptLibrary,
        options: ExpandOptions,
    ) -> Self {
        Self {
            client,
            registry,
            prompts,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token so a caller can abort a deep expansion.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Expand `name` until every reachable entity is materialized or an
    /// error stops the walk. Already-resolved entities short-circuit; lookup
    /// never regenerates.
    pub async fn expand(&self, name: &str) -> Result<()> {
        let mut path = Vec::new();
        self.expand_inner(name.to_string(), &mut path).await
    }

    fn expand_inner<'a>(
        &'a self,
        name: String,
        path: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(CircuitGenError::Cancelled);
            }
            if path.iter().any(|seen| seen == &name) {
                let mut cycle = path.clone();
                cycle.push(name);
                return Err(CircuitGenError::CycleDetected(cycle.join(" -> ")));
            }
            if path.len() >= self.options.max_depth {
                return Err(CircuitGenError::DepthExceeded {
                    entity: name,
                    max: self.options.max_depth,
                });
            }

            let entity = self
                .registry
                .get(&name)
                .ok_or_else(|| CircuitGenError::EntityNotFound(name.clone()))?;
            if entity.implementation.is_some() {
                debug!("`{}` is already materialized, skipping", name);
                return Ok(());
            }

            path.push(name);
            let result = self.expand_entity(&entity, path).await;
            path.pop();
            result
        })
    }

    async fn expand_entity(
        &self,
        entity: &DesignEntity,
        path: &mut Vec<String>,
    ) -> Result<()> {
        let sub_names = if entity.sub_model_names.is_empty() {
            self.decompose(entity).await?
        } else {
            entity.sub_model_names.clone()
        };

        if sub_names.is_empty() {
            return self.generate_leaf(&entity.name).await;
        }

        for sub_name in &sub_names {
            self.expand_inner(sub_name.clone(), path).await?;
        }
        self.connect_sub_models(&entity.name, &sub_names).await
    }

    /// Requirement parsing: ask the model to split the entity into
    /// sub-model declarations and register each one. An empty declaration
    /// list means the entity is a leaf.
    async fn decompose(&self, entity: &DesignEntity) -> Result<Vec<String>> {
        let template_text = self.prompts.load(PromptKind::Decomposition)?;
        let prompt = template::render(&template_text, &entity.prompt_bindings());
        info!("requesting decomposition of `{}`", entity.name);
        let response = self.call_llm(&prompt).await?;

        let declared = parser::extract_sub_model_declarations(&response);
        if declared.is_empty() {
            debug!(
                "no Module sections in the reply for `{}`; treating it as a leaf",
                entity.name
            );
            return Ok(Vec::new());
        }

        let sub_names: Vec<String> = declared.iter().map(|sub| sub.name.clone()).collect();
        for sub in declared {
            let sub_name = sub.name.clone();
            if !self.registry.put(sub) {
                debug!("`{}` was already registered, merged", sub_name);
            }
        }

        let mut update = DesignEntity::named(entity.name.clone());
        update.sub_model_names = sub_names.clone();
        self.registry.put(update);
        self.registry.persist(&entity.name)?;
        for sub_name in &sub_names {
            self.registry.persist(sub_name)?;
        }

        info!("`{}` decomposed into {:?}", entity.name, sub_names);
        Ok(sub_names)
    }

    /// Leaf generation: extract the implementation segment (required) and
    /// the parameter description (optional), then persist and write the
    /// module file. A missing implementation segment is a retryable
    /// extraction miss; the entity stays in its pre-transition state.
    async fn generate_leaf(&self, name: &str) -> Result<()> {
        let entity = self
            .registry
            .get(name)
            .ok_or_else(|| CircuitGenError::EntityNotFound(name.to_string()))?;
        info!("generating circuit for leaf `{}`", name);
        let (implementation, parameter_description) =
            self.request_leaf_artifacts(&entity).await?;

        let mut update = DesignEntity::named(name.to_string());
        update.implementation = Some(implementation);
        update.parameter_description = parameter_description;
        self.registry.put(update);
        self.registry.persist(name)?;
        let module_path = self.registry.write_implementation(name)?;
        info!("resolved leaf `{}` -> {}", name, module_path.display());
        Ok(())
    }

    /// One generation round trip with no registry writes: render, call,
    /// extract. Callers apply the returned fields only after this succeeds.
    async fn request_leaf_artifacts(
        &self,
        entity: &DesignEntity,
    ) -> Result<(String, Option<String>)> {
        let template_text = self.prompts.load(PromptKind::Generation)?;
        let prompt = template::render(&template_text, &entity.prompt_bindings());
        let response = self.call_llm(&prompt).await?;

        let implementation = parser::extract_segment(&response, &self.options.implementation_leader)
            .ok_or_else(|| CircuitGenError::Extraction {
                entity: entity.name.clone(),
                leader: self.options.implementation_leader.clone(),
            })?;
        let parameter_description =
            parser::extract_segment(&response, &self.options.parameter_leader);
        if parameter_description.is_none() {
            debug!(
                "no `{}` segment for `{}`",
                self.options.parameter_leader, entity.name
            );
        }
        Ok((
            implementation.text,
            parameter_description.map(|segment| segment.text),
        ))
    }

    /// Connection step for a composite whose children are all materialized.
    /// The interconnection record is optional: a reply without an
    /// implementation segment only warns.
    async fn connect_sub_models(&self, name: &str, sub_names: &[String]) -> Result<()> {
        let entity = self
            .registry
            .get(name)
            .ok_or_else(|| CircuitGenError::EntityNotFound(name.to_string()))?;
        let subs: Vec<DesignEntity> = sub_names
            .iter()
            .filter_map(|sub_name| self.registry.get(sub_name))
            .collect();

        let template_text = self.prompts.load(PromptKind::Connection)?;
        let prompt = append_sub_model_summaries(
            &template::render(&template_text, &entity.prompt_bindings()),
            &subs,
        );
        info!("connecting {} sub-models of `{}`", subs.len(), name);
        let response = self.call_llm(&prompt).await?;

        match parser::extract_segment(&response, &self.options.implementation_leader) {
            Some(segment) => {
                let mut update = DesignEntity::named(name.to_string());
                update.implementation = Some(segment.text);
                self.registry.put(update);
                self.registry.persist(name)?;
                self.registry.write_implementation(name)?;
                info!("composed `{}` from {} sub-models", name, subs.len());
            }
            None => warn!(
                "connection reply for `{}` carried no `{}` segment; interconnection left unrecorded",
                name, self.options.implementation_leader
            ),
        }
        Ok(())
    }

    /// Testbench generation for one entity. Items are merged into the
    /// entity (absent slots only) and their code written to per-item files.
    pub async fn generate_tests(&self, name: &str) -> Result<Vec<std::path::PathBuf>> {
        let entity = self
            .registry
            .get(name)
            .ok_or_else(|| CircuitGenError::EntityNotFound(name.to_string()))?;
        if !entity.tests.is_empty() {
            debug!(
                "`{}` already carries {} test items, skipping generation",
                name,
                entity.tests.len()
            );
            return self.registry.write_test_artifacts(name);
        }

        let template_text = self.prompts.load(PromptKind::Testbench)?;
        let prompt = template::render(&template_text, &entity.prompt_bindings());
        info!("requesting testbench items for `{}`", name);
        let response = self.call_llm(&prompt).await?;

        let items =
            parser::extract_test_items(&response, &self.options.code_tag, &self.options.doc_tag);
        if items.is_empty() {
            return Err(CircuitGenError::Extraction {
                entity: name.to_string(),
                leader: "Test_Item".to_string(),
            });
        }

        let mut update = DesignEntity::named(name.to_string());
        update.tests = items;
        self.registry.put(update);
        self.registry.persist(name)?;
        let paths = self.registry.write_test_artifacts(name)?;
        info!("wrote {} testbench files for `{}`", paths.len(), name);
        Ok(paths)
    }

    /// Explicit regeneration: the only path allowed to discard a previously
    /// generated implementation. Composites are rejected; their content
    /// comes from the connection step. The old fields are dropped only once
    /// the replacement has been extracted, so a failed call leaves the
    /// entity in its prior state.
    pub async fn regenerate_leaf(&self, name: &str) -> Result<()> {
        let mut entity = self
            .registry
            .get(name)
            .ok_or_else(|| CircuitGenError::EntityNotFound(name.to_string()))?;
        if entity.is_composite() {
            return Err(CircuitGenError::InvalidOperation(format!(
                "`{}` is a composite; only leaves are regenerated directly",
                name
            )));
        }

        info!("regenerating leaf `{}`", name);
        let (implementation, parameter_description) =
            self.request_leaf_artifacts(&entity).await?;

        entity.implementation = Some(implementation);
        entity.parameter_description = parameter_description;
        self.registry.replace(entity);
        self.registry.persist(name)?;
        let module_path = self.registry.write_implementation(name)?;
        info!("resolved leaf `{}` -> {}", name, module_path.display());
        Ok(())
    }

    /// The sole suspension point: a single LLM call, bounded by the
    /// configured timeout and abortable through the cancellation token.
    async fn call_llm(&self, prompt: &str) -> Result<String> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CircuitGenError::Cancelled),
            outcome = timeout(self.options.call_timeout, self.client.get_answer(prompt)) => {
                match outcome {
                    Ok(reply) => reply,
                    Err(_) => Err(CircuitGenError::Timeout(format!(
                        "LLM call exceeded {:?} (model {})",
                        self.options.call_timeout,
                        self.client.model_name()
                    ))),
                }
            }
        }
    }
}
