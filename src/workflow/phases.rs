//! The three phase bodies: understanding, generation, validation.
//!
//! Operators without mutual data dependency run as a structured concurrent
//! group with a single join; phases see a consistent snapshot of their
//! inputs and complete fully before the next phase begins.

use tokio_util::sync::CancellationToken;

use crate::error::{Result, SkillfabError};
use crate::jobs::model::{
    HitlAction, HitlPayload, HitlResponse, JobId, JobInputs, Progress, UnderstandingSummary,
    ValidationSummary,
};
use crate::lm::module::LmModule;
use crate::lm::operators::{generation, tuning, understanding, validation};
use crate::lm::operators::generation::DraftContent;
use crate::metrics::weights::{
    composite_for_style, needs_refinement, SkillStyle, MAX_REFINEMENTS, MAX_REVISIONS,
    MAX_TUNING_ITERATIONS, MIN_IMPROVEMENT,
};

use super::engine::phases_output::AcceptedDraft;
use super::engine::WorkflowEngine;

impl WorkflowEngine {
    /// Publish a checkpoint and suspend until the response arrives.
    async fn checkpoint(
        &self,
        id: JobId,
        payload: HitlPayload,
        token: &CancellationToken,
    ) -> Result<HitlResponse> {
        self.hitl.publish_prompt(id, payload).await?;
        self.hitl.await_response(id, token).await
    }

    // =========================================================================
    // Phase 1 — Understanding & Planning
    // =========================================================================

    pub(super) async fn phase_understanding(
        &self,
        id: JobId,
        inputs: &JobInputs,
        token: &CancellationToken,
    ) -> Result<UnderstandingSummary> {
        self.check_cancelled(token)?;
        let task = inputs.task_description.as_str();
        let context = inputs.user_context.as_deref().unwrap_or("");
        let existing = self.existing_paths().await?.join("\n");

        // The four analysis operators are independent; dispatch them as one
        // concurrent group and join the full barrier.
        let (requirements, intent, placement, dependencies) = tokio::join!(
            understanding::gather_requirements(
                &self.operators.gather_requirements,
                &self.lm,
                task,
                context,
            ),
            understanding::analyze_intent(&self.operators.analyze_intent, &self.lm, task),
            understanding::find_taxonomy_path(
                &self.operators.find_taxonomy_path,
                &self.lm,
                task,
                &existing,
            ),
            understanding::analyze_dependencies(
                &self.operators.analyze_dependencies,
                &self.lm,
                task,
                &existing,
            ),
        );
        let requirements = requirements?;
        let intent = intent?;
        let placement = placement?;
        let dependencies = dependencies?;
        self.check_cancelled(token)?;

        self.set_progress(id, Progress::at("understanding", 0.2, "synthesizing the plan"))
            .await?;
        let mut plan = understanding::synthesize_plan(
            &self.operators.synthesize_plan,
            &self.lm,
            &requirements,
            &intent,
            &placement,
            &dependencies,
            "",
        )
        .await?;
        self.check_cancelled(token)?;

        // Substantial ambiguities raise a clarify checkpoint, but only when
        // the question generator actually produced questions.
        let blocking: Vec<String> = requirements
            .blocking_ambiguities()
            .into_iter()
            .map(str::to_string)
            .collect();
        if !blocking.is_empty() {
            let questions = understanding::generate_clarifying_questions(
                &self.operators.clarifying_questions,
                &self.lm,
                task,
                &blocking,
            )
            .await?;
            self.check_cancelled(token)?;

            if !questions.is_empty() {
                let response = self
                    .checkpoint(id, HitlPayload::Clarify { questions }, token)
                    .await?;
                match response.action {
                    HitlAction::Cancel => return Err(SkillfabError::Cancelled),
                    HitlAction::Proceed | HitlAction::Revise => {
                        let answers = response.feedback.unwrap_or_default();
                        self.store
                            .update(id, {
                                let answers = answers.clone();
                                move |job| {
                                    job.state.clarifications = Some(answers);
                                    Ok(())
                                }
                            })
                            .await?;
                        // Merge the answers and re-run SynthesizePlan only.
                        plan = understanding::synthesize_plan(
                            &self.operators.synthesize_plan,
                            &self.lm,
                            &requirements,
                            &intent,
                            &placement,
                            &dependencies,
                            &answers,
                        )
                        .await?;
                    }
                }
            }
        }

        let summary = UnderstandingSummary {
            requirements,
            intent,
            placement,
            dependencies,
            plan,
        };

        if self.config.confirm_plan {
            let response = self
                .checkpoint(
                    id,
                    HitlPayload::Confirm {
                        summary: summary.plan.summary.clone(),
                    },
                    token,
                )
                .await?;
            if response.action == HitlAction::Cancel {
                return Err(SkillfabError::Cancelled);
            }
        }

        let stored = summary.clone();
        self.store
            .update(id, move |job| {
                job.state.understanding = Some(stored);
                job.progress = Progress::at("understanding", 0.35, "plan ready");
                Ok(())
            })
            .await?;
        Ok(summary)
    }

    // =========================================================================
    // Phase 2 — Content Generation
    // =========================================================================

    /// The style content is generated in: explicit request, then the plan's
    /// hint, then the comprehensive default.
    fn generation_style(inputs: &JobInputs, summary: &UnderstandingSummary) -> SkillStyle {
        inputs
            .style
            .or(summary.plan.style)
            .unwrap_or(SkillStyle::Comprehensive)
    }

    /// Generate a draft with the given module (no checkpoints). Used by the
    /// main path and by the tuner's held-out re-evaluation.
    pub(super) async fn generate_draft(
        &self,
        inputs: &JobInputs,
        summary: &UnderstandingSummary,
        module: &LmModule,
    ) -> Result<DraftContent> {
        let style = Self::generation_style(inputs, summary);
        generation::generate_skill_content(
            module,
            &self.lm,
            &summary.plan.summary,
            &summary.plan.outline,
            style,
            summary.placement.path.as_str(),
            &summary.placement.path.skill_name(),
        )
        .await
    }

    pub(super) async fn phase_generation(
        &self,
        id: JobId,
        inputs: &JobInputs,
        summary: &UnderstandingSummary,
        token: &CancellationToken,
    ) -> Result<(DraftContent, LmModule)> {
        self.check_cancelled(token)?;
        self.set_progress(id, Progress::at("generation", 0.45, "drafting the skill"))
            .await?;

        let module = self.operators.generate_content.clone();
        let mut draft = self.generate_draft(inputs, summary, &module).await?;

        // Optional preview loop, bounded by the revision budget.
        if self.config.preview_checkpoint {
            loop {
                self.check_cancelled(token)?;
                let response = self
                    .checkpoint(
                        id,
                        HitlPayload::Preview {
                            name: draft.name.clone(),
                            description: draft.description.clone(),
                            body: draft.body.clone(),
                        },
                        token,
                    )
                    .await?;
                match response.action {
                    HitlAction::Cancel => return Err(SkillfabError::Cancelled),
                    HitlAction::Proceed => break,
                    HitlAction::Revise => {
                        let exhausted = self
                            .store
                            .update(id, |job| {
                                if job.state.revision_count >= MAX_REVISIONS {
                                    return Ok(true);
                                }
                                job.state.revision_count += 1;
                                Ok(false)
                            })
                            .await?;
                        if exhausted {
                            tracing::warn!(job_id = %id, "revision budget exhausted, proceeding");
                            break;
                        }
                        let feedback = response.feedback.unwrap_or_default();
                        let revised = generation::incorporate_feedback(
                            &self.operators.incorporate_feedback,
                            &self.lm,
                            &draft.body,
                            &feedback,
                        )
                        .await?;
                        draft.body = revised.body;
                    }
                }
            }
        }

        let stored = draft.clone();
        self.store
            .update(id, move |job| {
                job.state.draft = Some(stored);
                job.progress = Progress::at("generation", 0.6, "draft ready");
                Ok(())
            })
            .await?;
        Ok((draft, module))
    }

    // =========================================================================
    // Phase 3 — Validation & Refinement
    // =========================================================================

    /// Resolve the weighting style: explicit in the request, otherwise
    /// detected from the draft.
    async fn weighting_style(
        &self,
        inputs: &JobInputs,
        draft: &DraftContent,
    ) -> Result<SkillStyle> {
        if let Some(style) = inputs.style {
            return Ok(style);
        }
        let detection =
            validation::detect_skill_style(&self.operators.detect_style, &self.lm, &draft.body)
                .await?;
        tracing::debug!(
            style = %detection.style,
            confidence = detection.confidence,
            "detected skill style"
        );
        Ok(detection.style)
    }

    /// Run the two evaluators concurrently and fold in the composite.
    async fn evaluate(
        &self,
        summary: &UnderstandingSummary,
        draft: &DraftContent,
        style: SkillStyle,
    ) -> Result<ValidationSummary> {
        let (compliance, quality) = tokio::join!(
            validation::validate_compliance(
                &self.operators.validate_compliance,
                &self.lm,
                &draft.name,
                &draft.description,
                &draft.body,
            ),
            validation::assess_quality(
                &self.operators.assess_quality,
                &self.lm,
                &draft.body,
                &summary.plan.summary,
            ),
        );
        let compliance = compliance?;
        let quality = quality?;

        let composite = composite_for_style(style, &quality.scores);
        let pass = compliance.pass && !needs_refinement(composite);
        Ok(ValidationSummary {
            compliance,
            quality,
            style,
            composite,
            pass,
        })
    }

    /// Issues for the refiner, compliance-first.
    fn issues_for_refinement(validation: &ValidationSummary) -> Vec<String> {
        let mut issues = validation.compliance.critical_issues.clone();
        issues.extend(validation.compliance.warnings.iter().cloned());
        let scores = &validation.quality.scores;
        for (metric, value) in [
            ("skill_quality", scores.skill_quality),
            ("semantic_f1", scores.semantic_f1),
            ("entity_f1", scores.entity_f1),
            ("readability", scores.readability),
            ("coverage", scores.coverage),
        ] {
            if needs_refinement(value) {
                issues.push(format!("{} scored {:.2}", metric, value));
            }
        }
        issues
    }

    pub(super) async fn phase_validation(
        &self,
        id: JobId,
        inputs: &JobInputs,
        summary: &UnderstandingSummary,
        mut draft: DraftContent,
        mut generate_module: LmModule,
        token: &CancellationToken,
    ) -> Result<AcceptedDraft> {
        self.check_cancelled(token)?;
        self.set_progress(id, Progress::at("validation", 0.7, "validating the draft"))
            .await?;

        let style = self.weighting_style(inputs, &draft).await?;
        let mut current = self.evaluate(summary, &draft, style).await?;

        loop {
            self.check_cancelled(token)?;
            if current.pass {
                return Ok(AcceptedDraft {
                    draft,
                    validation: current,
                });
            }

            let budget_left = self
                .store
                .update(id, |job| Ok(job.state.refinement_count < MAX_REFINEMENTS))
                .await?;

            if budget_left {
                self.store
                    .update(id, |job| {
                        job.state.refinement_count += 1;
                        job.progress =
                            Progress::at("validation", 0.75, "refining the draft");
                        Ok(())
                    })
                    .await?;

                let issues = Self::issues_for_refinement(&current);
                let refined = validation::refine_skill(
                    &self.operators.refine_skill,
                    &self.lm,
                    &draft.body,
                    &issues,
                )
                .await?;
                self.check_cancelled(token)?;

                let mut refined_draft = draft.clone();
                refined_draft.body = refined.body;
                let next = self.evaluate(summary, &refined_draft, style).await?;
                let improvement = next.composite - current.composite;

                if improvement >= MIN_IMPROVEMENT {
                    tracing::info!(
                        job_id = %id,
                        improvement,
                        composite = next.composite,
                        "refinement accepted"
                    );
                    self.store
                        .update(id, move |job| {
                            job.state.improvement = Some(improvement);
                            Ok(())
                        })
                        .await?;
                    draft = refined_draft;
                    current = next;
                    continue;
                }

                // Refinement stalled: hand the operator to the tuner.
                if let Some((module, tuned_draft, tuned_validation)) = self
                    .run_tuner(id, inputs, summary, &generate_module, &draft, &current, style, token)
                    .await?
                {
                    generate_module = module;
                    draft = tuned_draft;
                    current = tuned_validation;
                    continue;
                }
            }

            // Budget exhausted (or tuning rejected): the user decides.
            let response = self
                .checkpoint(
                    id,
                    HitlPayload::Validate {
                        report: current.clone(),
                    },
                    token,
                )
                .await?;
            match response.action {
                HitlAction::Cancel => return Err(SkillfabError::Cancelled),
                HitlAction::Proceed => {
                    return Ok(AcceptedDraft {
                        draft,
                        validation: current,
                    });
                }
                HitlAction::Revise => {
                    let feedback = response.feedback.unwrap_or_default();
                    let revised = generation::incorporate_feedback(
                        &self.operators.incorporate_feedback,
                        &self.lm,
                        &draft.body,
                        &feedback,
                    )
                    .await?;
                    draft.body = revised.body;
                    current = self.evaluate(summary, &draft, style).await?;
                }
            }
        }
    }

    // =========================================================================
    // Signature tuning
    // =========================================================================

    /// One tuning iteration for the content generator.
    ///
    /// Returns the tuned module with its regenerated draft and validation
    /// when the candidate is accepted (held-out improvement of at least
    /// `MIN_IMPROVEMENT`); `None` otherwise. Every evaluated candidate is
    /// recorded in the signature history.
    #[allow(clippy::too_many_arguments)]
    async fn run_tuner(
        &self,
        id: JobId,
        inputs: &JobInputs,
        summary: &UnderstandingSummary,
        generate_module: &LmModule,
        draft: &DraftContent,
        current: &ValidationSummary,
        style: SkillStyle,
        token: &CancellationToken,
    ) -> Result<Option<(LmModule, DraftContent, ValidationSummary)>> {
        let budget_left = self
            .store
            .update(id, |job| {
                if job.state.tuning_count >= MAX_TUNING_ITERATIONS {
                    return Ok(false);
                }
                job.state.tuning_count += 1;
                Ok(true)
            })
            .await?;
        if !budget_left {
            return Ok(None);
        }

        self.set_progress(id, Progress::at("validation", 0.8, "tuning the generator"))
            .await?;
        let signature = generate_module.signature().clone();
        let issues = Self::issues_for_refinement(current);

        let analysis = tuning::analyze_failures(
            &self.operators.failure_analyzer,
            &self.lm,
            &signature.instruction,
            &draft.body,
            &issues,
        )
        .await?;
        self.check_cancelled(token)?;

        let proposal = tuning::propose_signature(
            &self.operators.signature_proposer,
            &self.lm,
            &signature.instruction,
            &analysis,
        )
        .await?;
        self.check_cancelled(token)?;

        if tuning::candidate_is_degenerate(&signature, &proposal.instruction) {
            tracing::info!(job_id = %id, "tuner candidate rejected: degenerate");
            return Ok(None);
        }

        let verdict = tuning::validate_signature(
            &self.operators.signature_validator,
            &self.lm,
            &signature,
            &proposal.instruction,
        )
        .await?;
        if !verdict.valid {
            tracing::info!(
                job_id = %id,
                problems = ?verdict.problems,
                "tuner candidate rejected by validator"
            );
            let candidate = signature.with_instruction(&proposal.instruction);
            let mut registry = self.registry.lock().await;
            registry.record(&candidate, None);
            let _ = registry.save().await;
            return Ok(None);
        }
        self.check_cancelled(token)?;

        // Held-out re-evaluation: regenerate with the candidate and score it
        // against the same plan.
        let candidate = signature.with_instruction(&proposal.instruction);
        let tuned_module = generate_module.with_signature(candidate.clone());
        let tuned_draft = self.generate_draft(inputs, summary, &tuned_module).await?;
        let tuned_validation = self.evaluate(summary, &tuned_draft, style).await?;
        let improvement = tuned_validation.composite - current.composite;

        {
            let mut registry = self.registry.lock().await;
            registry.record(&candidate, Some(tuned_validation.composite));
            let _ = registry.save().await;
        }

        if improvement >= MIN_IMPROVEMENT {
            tracing::info!(
                job_id = %id,
                improvement,
                version = candidate.version,
                "tuned signature accepted"
            );
            Ok(Some((tuned_module, tuned_draft, tuned_validation)))
        } else {
            tracing::info!(
                job_id = %id,
                improvement,
                "tuned signature rejected: insufficient held-out improvement"
            );
            Ok(None)
        }
    }
}
