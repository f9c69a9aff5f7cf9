//! End-to-end behaviour of `PipelineExecutor` against a scripted generator.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::*;
use pipeline::{
    BriefHints, CandidateSlot, GenerationError, GuardrailStatus, Identity, MemoryProfile, Mode,
    PresentationOrder, RequestError, RunRequestInput, RunStore, Stage, UserId,
};

const SCENARIO_A: &str =
    "Thank my team for a great year, keep it under 3 minutes, audience: 50 engineers";

fn brief(text: &str) -> RunRequestInput {
    RunRequestInput {
        brief: text.into(),
        ..Default::default()
    }
}

fn user(id: &str) -> Identity {
    Identity::User(UserId::new(id).unwrap())
}

#[tokio::test]
async fn scenario_a_all_stages_succeed() {
    let generator = Arc::new(happy_generator(r#"{"winner": 2, "reason": "More vivid."}"#));
    let executor = executor(generator.clone(), seeded_config(1));

    let result = executor.submit(brief(SCENARIO_A)).await.unwrap();

    let final_text = result.final_text.as_deref().unwrap();
    assert!(!final_text.trim().is_empty());
    let pair = result.candidates.as_ref().unwrap();
    assert_ne!(pair.first(), pair.second());
    assert!(!pair.first().is_empty() && !pair.second().is_empty());
    let verdict = result.verdict.as_ref().unwrap();
    assert!([1, 2].contains(&verdict.winner.number()));
    assert_eq!(result.winner, Some(verdict.winner));
    let guardrail = result.guardrail.as_ref().unwrap();
    assert!(matches!(
        guardrail.status,
        GuardrailStatus::Ok | GuardrailStatus::Edited | GuardrailStatus::Flagged
    ));
    assert_eq!(result.mode, Mode::Generate);
    assert!(result.plan.is_some());

    let stages: Vec<Stage> = result.trace.entries().iter().map(|e| e.stage).collect();
    assert_eq!(stages.first(), Some(&Stage::Input));
    for stage in [
        Stage::Normalizer,
        Stage::Presets,
        Stage::Planner,
        Stage::Drafter,
        Stage::Judge,
        Stage::Guardrail,
        Stage::Editor,
    ] {
        assert!(stages.contains(&stage), "missing {stage} entry");
    }
}

#[tokio::test]
async fn scenario_b_empty_brief_is_rejected_before_any_stage() {
    let generator = Arc::new(ScriptedGenerator::new());
    let executor = executor(generator.clone(), seeded_config(1));

    let rejected = executor.submit(brief("")).await.unwrap_err();

    assert_eq!(rejected.error, RequestError::EmptyBrief);
    assert_eq!(rejected.trace.len(), 1);
    assert_eq!(rejected.trace.entries()[0].stage, Stage::Input);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn scenario_c_one_empty_draft_is_terminal() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .reply(Stage::Normalizer, INTENT_JSON)
            .reply(Stage::Planner, PLAN_JSON)
            .reply(Stage::Drafter, DRAFT_A)
            .reply(Stage::Drafter, "   "),
    );
    let executor = executor(generator.clone(), seeded_config(1));
    let request = RunRequestInput {
        user_id: Some("u-42".into()),
        ..brief(SCENARIO_A)
    };

    let result = executor.submit(request).await.unwrap();

    assert_eq!(result.final_text, None);
    assert!(result.candidates.is_none());
    assert!(result.verdict.is_none());
    let last = result.trace.last().unwrap();
    assert_eq!(last.stage.as_str(), "drafter");
    assert!(generator.requests_for(Stage::Judge).is_empty());
}

#[tokio::test]
async fn judge_choice_maps_back_to_the_drafted_candidate_in_both_orders() {
    let mut orders_seen = HashSet::new();
    for seed in 0..32 {
        let generator = Arc::new(happy_generator(r#"{"winner": 1, "reason": "first shown"}"#));
        let executor = executor(generator, seeded_config(seed));

        let result = executor.submit(brief(SCENARIO_A)).await.unwrap();

        let verdict = result.verdict.unwrap();
        let expected = match verdict.order {
            PresentationOrder::AsDrafted => CandidateSlot::First,
            PresentationOrder::Swapped => CandidateSlot::Second,
        };
        assert_eq!(verdict.winner, expected, "seed {seed}");
        let pair = result.candidates.unwrap();
        assert_eq!(result.final_text.as_deref(), Some(pair.get(expected)));
        orders_seen.insert(verdict.order);
    }
    assert_eq!(orders_seen.len(), 2);
}

#[tokio::test]
async fn guardrail_removal_of_a_must_avoid_phrase_is_edited() {
    let draft = "We shipped, despite the layoffs, on time.";
    let generator = Arc::new(
        ScriptedGenerator::new()
            .reply(Stage::Normalizer, INTENT_JSON)
            .reply(Stage::Planner, PLAN_JSON)
            .reply(Stage::Drafter, draft)
            .reply(Stage::Drafter, draft)
            .reply(Stage::Judge, r#"{"winner": 1, "reason": "same"}"#)
            .handle(Stage::Guardrail, |req| {
                let cleaned = payload_text(req).replace(" despite the layoffs,", "");
                Ok(serde_json::json!({ "status": "ok", "resultingText": cleaned }).to_string())
            })
            .handle(Stage::Editor, |req| Ok(payload_text(req))),
    );
    let executor = executor(generator.clone(), seeded_config(3));
    let request = RunRequestInput {
        hints: BriefHints {
            must_avoid: vec!["layoffs".into()],
            ..Default::default()
        },
        ..brief(SCENARIO_A)
    };

    let result = executor.submit(request).await.unwrap();

    let guardrail = result.guardrail.unwrap();
    assert_eq!(guardrail.status, GuardrailStatus::Edited);
    assert_eq!(guardrail.text, "We shipped, on time.");
    assert_eq!(result.final_text.as_deref(), Some("We shipped, on time."));
    let plan = result.plan.unwrap();
    assert!(plan.constraints.must_avoid.iter().any(|p| p == "layoffs"));
    assert!(generator.requests_for(Stage::Guardrail)[0]
        .payload
        .contains("layoffs"));
}

#[tokio::test]
async fn editor_cannot_bring_back_a_phrase_the_guardrail_removed() {
    let draft = "We shipped together, despite the layoffs.";
    let generator = Arc::new(
        ScriptedGenerator::new()
            .reply(Stage::Normalizer, INTENT_JSON)
            .reply(Stage::Planner, PLAN_JSON)
            .reply(Stage::Drafter, draft)
            .reply(Stage::Drafter, draft)
            .reply(Stage::Judge, r#"{"winner": 1, "reason": "same"}"#)
            .reply(
                Stage::Guardrail,
                r#"{"status": "ok", "resultingText": "We shipped together."}"#,
            )
            .reply(Stage::Editor, "We shipped together, right after the layoffs."),
    );
    let executor = executor(generator.clone(), seeded_config(3));
    let request = RunRequestInput {
        hints: BriefHints {
            must_avoid: vec!["layoffs".into()],
            ..Default::default()
        },
        ..brief(SCENARIO_A)
    };

    let result = executor.submit(request).await.unwrap();

    assert_eq!(result.guardrail.unwrap().status, GuardrailStatus::Edited);
    assert_eq!(result.final_text.as_deref(), Some("We shipped together."));
    let editor_payload: serde_json::Value =
        serde_json::from_str(&generator.requests_for(Stage::Editor)[0].payload).unwrap();
    assert_eq!(editor_payload["constraints"]["mustAvoid"][0], "layoffs");
    assert!(result
        .trace
        .for_stage(Stage::Editor)
        .any(|e| e.message.starts_with("polish discarded")));
}

#[tokio::test]
async fn guardrail_failure_passes_the_selected_text_through() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .reply(Stage::Normalizer, INTENT_JSON)
            .reply(Stage::Planner, PLAN_JSON)
            .reply(Stage::Drafter, DRAFT_A)
            .reply(Stage::Drafter, DRAFT_B)
            .reply(Stage::Judge, r#"{"winner": 1, "reason": "ok"}"#)
            .fail(Stage::Guardrail, GenerationError::Timeout(std::time::Duration::from_secs(30)))
            .handle(Stage::Editor, |req| Ok(payload_text(req))),
    );
    let executor = executor(generator, seeded_config(5));

    let result = executor.submit(brief(SCENARIO_A)).await.unwrap();

    let verdict = result.verdict.unwrap();
    let pair = result.candidates.unwrap();
    let guardrail = result.guardrail.unwrap();
    assert_eq!(guardrail.text, pair.get(verdict.winner));
    assert_eq!(guardrail.status, GuardrailStatus::Ok);
    assert!(guardrail.skipped);
    assert_eq!(result.final_text.as_deref(), Some(pair.get(verdict.winner)));
}

#[tokio::test]
async fn every_degradable_failure_still_delivers_a_text() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .fail(Stage::Normalizer, GenerationError::EmptyResponse)
            .reply(Stage::Planner, "I'd rather not.")
            .reply(Stage::Drafter, DRAFT_A)
            .reply(Stage::Drafter, DRAFT_B)
            .reply(Stage::Judge, "option three, obviously")
            .fail(Stage::Guardrail, GenerationError::Transport("reset".into()))
            .fail(Stage::Editor, GenerationError::RateLimited { retry_after: None }),
    );
    let executor = executor(generator, seeded_config(9));

    let result = executor.submit(brief(SCENARIO_A)).await.unwrap();

    assert_eq!(result.final_text.as_deref(), Some(DRAFT_A));
    let verdict = result.verdict.unwrap();
    assert!(verdict.defaulted);
    assert_eq!(verdict.winner, CandidateSlot::First);
    assert!(result.plan.unwrap().pillars.is_empty());
}

#[tokio::test]
async fn start_over_phrase_forces_generate_mode() {
    let generator = Arc::new(happy_generator(r#"{"winner": 1}"#));
    let executor = executor(generator.clone(), seeded_config(2));
    let request = RunRequestInput {
        previous_text: Some("Our old speech.".into()),
        previous_instruction: Some("Thank the team".into()),
        ..brief("Please Start Again: a toast for Sam's retirement")
    };

    let result = executor.submit(request).await.unwrap();

    assert_eq!(result.mode, Mode::Generate);
    assert!(generator.requests_for(Stage::Refiner).is_empty());
    assert!(result.candidates.is_some());
}

#[tokio::test]
async fn refine_failure_returns_the_prior_text_unchanged() {
    let prior = "  Friends,\n\n  what a year.\t\n";
    let generator = Arc::new(
        ScriptedGenerator::new().fail(Stage::Refiner, GenerationError::Transport("eof".into())),
    );
    let executor = executor(generator.clone(), seeded_config(2));
    let request = RunRequestInput {
        previous_text: Some(prior.into()),
        previous_instruction: Some("Thank the team".into()),
        ..brief("Make it a little shorter")
    };

    let result = executor.submit(request).await.unwrap();

    assert_eq!(result.mode, Mode::Refine);
    assert_eq!(result.final_text.as_deref(), Some(prior));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn persistence_failure_does_not_change_success() {
    let store = Arc::new(RecordingStore {
        fail_saves: true,
        ..Default::default()
    });
    let generator = Arc::new(happy_generator(r#"{"winner": 2}"#));
    let executor = executor(generator, seeded_config(4))
        .with_run_store(store.clone())
        .with_memory_store(store.clone());
    let request = RunRequestInput {
        user_id: Some("u-7".into()),
        ..brief(SCENARIO_A)
    };

    let result = executor.submit(request).await.unwrap();

    assert!(result.is_success());
    assert!(result
        .trace
        .for_stage(Stage::Persistence)
        .any(|e| e.message.starts_with("save failed")));
    assert!(store.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn memory_profile_feeds_the_planner_and_is_updated() {
    let store = Arc::new(RecordingStore::default());
    let identity = user("u-9");
    store.profiles.lock().unwrap().insert(
        identity.to_string(),
        MemoryProfile {
            tone_preferences: vec!["playful".into()],
            runs_count: 4,
            ..Default::default()
        },
    );
    let generator = Arc::new(happy_generator(r#"{"winner": 1}"#));
    let executor = executor(generator.clone(), seeded_config(6))
        .with_run_store(store.clone())
        .with_memory_store(store.clone());
    let request = RunRequestInput {
        user_id: Some("u-9".into()),
        ..brief(SCENARIO_A)
    };

    let result = executor.submit(request).await.unwrap();

    assert!(result.is_success());
    let planner_payload = &generator.requests_for(Stage::Planner)[0].payload;
    assert!(planner_payload.contains("playful"));
    let profile = store.profiles.lock().unwrap()[&identity.to_string()].clone();
    assert_eq!(profile.runs_count, 5);
    assert!(profile.tone_preferences.contains(&"warm".to_string()));

    let history = store.recent(&identity, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].run_id, result.run_id);
    assert!(history[0].candidates.is_some());
}

#[tokio::test]
async fn saved_run_takes_feedback_against_its_verdict() {
    let store = Arc::new(RecordingStore::default());
    let generator = Arc::new(happy_generator(r#"{"winner": 2, "reason": "Tighter."}"#));
    let executor = executor(generator, seeded_config(11)).with_run_store(store.clone());

    let result = executor.submit(brief(SCENARIO_A)).await.unwrap();
    let winner = result.winner.unwrap();
    let other = match winner {
        CandidateSlot::First => CandidateSlot::Second,
        CandidateSlot::Second => CandidateSlot::First,
    };

    let agree = store.record_feedback(result.run_id, winner).await.unwrap();
    let disagree = store.record_feedback(result.run_id, other).await.unwrap();

    assert!(agree.agreement);
    assert!(!disagree.agreement);
    assert_eq!(disagree.judge_winner, winner);
    assert_eq!(store.feedback.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn memory_load_failure_is_not_fatal() {
    let store = Arc::new(RecordingStore {
        fail_loads: true,
        ..Default::default()
    });
    let generator = Arc::new(happy_generator(r#"{"winner": 1}"#));
    let executor = executor(generator, seeded_config(8)).with_memory_store(store);
    let request = RunRequestInput {
        anon_id: Some("anon-1".into()),
        ..brief(SCENARIO_A)
    };

    let result = executor.submit(request).await.unwrap();

    assert!(result.is_success());
    assert!(result
        .trace
        .for_stage(Stage::Memory)
        .any(|e| e.message.starts_with("profile load failed")));
}
