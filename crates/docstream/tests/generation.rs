mod common;

use common::{events_for, progress_events, Recorder, ScriptedGenerator};
use docstream::{
  ArtifactConfig, ArtifactKind, ArtifactRef, ArtifactStatus, Error, FailureReason,
  GenerationConfig, JobId, Orchestrator, OverallStatus, ProgressEvent, RunOutcome,
};
use std::time::Duration;

fn all_succeed() -> Orchestrator {
  Orchestrator::builder()
    .generator(
      ArtifactKind::Report,
      ScriptedGenerator::succeed("reports/claim-1.pdf").steps(&[20, 60]),
    )
    .generator(
      ArtifactKind::Estimate,
      ScriptedGenerator::succeed("estimates/claim-1.pdf").steps(&[50]),
    )
    .generator(
      ArtifactKind::PhotoCompilation,
      ScriptedGenerator::succeed("photos/claim-1.pdf"),
    )
    .generator(
      ArtifactKind::PhotoArchive,
      ScriptedGenerator::succeed("photos/claim-1.zip").steps(&[10, 40, 90]),
    )
    .build()
    .unwrap()
}

fn assert_well_ordered(events: &[ProgressEvent]) {
  for (idx, event) in events.iter().enumerate() {
    assert_eq!(event.seq(), idx as u64 + 1);
  }

  for kind in ArtifactKind::ALL {
    let mut last = 0;
    for event in progress_events(events).iter().filter(|e| e.kind == kind) {
      if event.status == ArtifactStatus::Processing {
        assert!(event.progress >= last, "{} went back to {}", kind, event.progress);
        last = event.progress;
      }
      if event.status.is_terminal() {
        assert!(event.artifact_ref.is_some() != event.failure_reason.is_some());
      } else {
        assert!(event.artifact_ref.is_none() && event.failure_reason.is_none());
      }
    }
  }
}

#[docstream_test::test]
async fn test_all_succeed() {
  let run = all_succeed().run(JobId::new("claim-1")).unwrap();
  let (events, outcome) = run.collect().await.unwrap();

  assert_well_ordered(&events);

  let report: Vec<_> = events_for(&events, ArtifactKind::Report)
    .into_iter()
    .map(|event| match event {
      ProgressEvent::Progress(event) => (event.status, event.progress),
      other => panic!("Unexpected event {:?}", other),
    })
    .collect();
  assert_eq!(
    report,
    vec![
      (ArtifactStatus::Processing, 0),
      (ArtifactStatus::Processing, 20),
      (ArtifactStatus::Processing, 60),
      (ArtifactStatus::Succeeded, 100),
    ]
  );

  // Kinds run one after another, in configured order
  let order: Vec<_> = events.iter().filter_map(|e| e.kind()).collect();
  let mut deduped = order.clone();
  deduped.dedup();
  assert_eq!(deduped, ArtifactKind::ALL.to_vec());

  match events.last().unwrap() {
    ProgressEvent::Summary(summary) => {
      assert_eq!(summary.overall_status, OverallStatus::Complete);
      assert_eq!(summary.overall_progress, 100);
    }
    other => panic!("Expected a summary, got {:?}", other),
  }
  assert_eq!(events.iter().filter(|e| e.is_summary()).count(), 1);

  let state = match outcome {
    RunOutcome::Completed(state) => state,
    other => panic!("Unexpected outcome {:?}", other),
  };
  assert_eq!(state.overall_status, OverallStatus::Complete);
  assert_eq!(
    state.artifact(ArtifactKind::PhotoArchive).unwrap().artifact_ref,
    Some(ArtifactRef::new("photos/claim-1.zip"))
  );
}

#[docstream_test::test]
async fn test_failure_isolation() {
  let estimate = Recorder::default();
  let orchestrator = Orchestrator::builder()
    .generator(ArtifactKind::Report, ScriptedGenerator::succeed("r"))
    .generator(
      ArtifactKind::Estimate,
      ScriptedGenerator::fail("pricing service unavailable")
        .steps(&[30])
        .record(&estimate),
    )
    .generator(ArtifactKind::PhotoCompilation, ScriptedGenerator::succeed("c"))
    .generator(ArtifactKind::PhotoArchive, ScriptedGenerator::succeed("a"))
    .build()
    .unwrap();

  let (events, outcome) = orchestrator
    .run(JobId::new("claim-2"))
    .unwrap()
    .collect()
    .await
    .unwrap();

  assert_well_ordered(&events);
  assert_eq!(estimate.calls(), 1);

  let state = outcome.into_state();
  assert_eq!(state.overall_status, OverallStatus::PartialFailure);
  assert_eq!(state.overall_progress, 75);

  let failed = state.artifact(ArtifactKind::Estimate).unwrap();
  assert_eq!(failed.status, ArtifactStatus::Failed);
  assert_eq!(failed.progress, 30);
  assert_eq!(failed.message, "pricing service unavailable");
  assert_eq!(
    failed.failure_reason,
    Some(FailureReason::generator("pricing service unavailable"))
  );

  for kind in [
    ArtifactKind::Report,
    ArtifactKind::PhotoCompilation,
    ArtifactKind::PhotoArchive,
  ] {
    assert_eq!(
      state.artifact(kind).unwrap().status,
      ArtifactStatus::Succeeded
    );
  }

  // Overall progress drops when a partly done artifact fails
  let overall: Vec<_> = progress_events(&events)
    .iter()
    .filter(|e| e.kind == ArtifactKind::Estimate)
    .map(|e| e.overall_progress)
    .collect();
  assert_eq!(overall, vec![25, 32, 25]);
}

#[docstream_test::test]
async fn test_everything_fails() {
  let orchestrator = Orchestrator::builder()
    .config(
      GenerationConfig::builder()
        .kind(ArtifactKind::Report)
        .kind(ArtifactKind::Estimate)
        .build()
        .unwrap(),
    )
    .generator(ArtifactKind::Report, ScriptedGenerator::reject("template missing"))
    .generator(ArtifactKind::Estimate, ScriptedGenerator::fail("no line items"))
    .build()
    .unwrap();

  let (events, outcome) = orchestrator
    .run(JobId::new("claim-3"))
    .unwrap()
    .collect()
    .await
    .unwrap();

  let state = outcome.into_state();
  assert_eq!(state.overall_status, OverallStatus::Failed);
  assert_eq!(state.overall_progress, 0);
  assert_eq!(
    state.artifact(ArtifactKind::Report).unwrap().failure_reason,
    Some(FailureReason::generator(
      Error::error("template missing").to_string()
    ))
  );

  // Processing(0) then Failed, for both kinds, then the summary
  assert_eq!(events.len(), 5);
  assert!(events[4].is_summary());
}

#[docstream_test::test]
async fn test_fast_path_without_progress() {
  let orchestrator = Orchestrator::builder()
    .config(
      GenerationConfig::builder()
        .kind(ArtifactKind::PhotoArchive)
        .build()
        .unwrap(),
    )
    .generator(ArtifactKind::PhotoArchive, ScriptedGenerator::succeed("a.zip"))
    .build()
    .unwrap();

  let (events, _) = orchestrator
    .run(JobId::new("claim-4"))
    .unwrap()
    .collect()
    .await
    .unwrap();

  let statuses: Vec<_> = progress_events(&events)
    .iter()
    .map(|e| (e.status, e.progress, e.overall_progress))
    .collect();
  assert_eq!(
    statuses,
    vec![
      (ArtifactStatus::Processing, 0, 0),
      (ArtifactStatus::Succeeded, 100, 100),
    ]
  );
}

#[docstream_test::test]
async fn test_progress_regression_is_internal_failure() {
  let report = Recorder::default();
  let orchestrator = Orchestrator::builder()
    .config(
      GenerationConfig::builder()
        .kind(ArtifactKind::Report)
        .kind(ArtifactKind::Estimate)
        .build()
        .unwrap(),
    )
    .generator(
      ArtifactKind::Report,
      ScriptedGenerator::succeed("r")
        .steps(&[50, 20])
        .delay(Duration::from_millis(5))
        .record(&report),
    )
    .generator(ArtifactKind::Estimate, ScriptedGenerator::succeed("e"))
    .build()
    .unwrap();

  let (events, outcome) = orchestrator
    .run(JobId::new("claim-5"))
    .unwrap()
    .collect()
    .await
    .unwrap();

  assert_well_ordered(&events);

  let state = outcome.into_state();
  let failed = state.artifact(ArtifactKind::Report).unwrap();
  assert_eq!(failed.status, ArtifactStatus::Failed);
  assert_eq!(failed.progress, 50);
  assert_eq!(
    failed.failure_reason,
    Some(FailureReason::internal(
      "Invalid transition of `report` from processing to processing: progress decreased from 50 to 20"
    ))
  );

  // The job carries on
  assert_eq!(
    state.artifact(ArtifactKind::Estimate).unwrap().status,
    ArtifactStatus::Succeeded
  );
  assert_eq!(state.overall_status, OverallStatus::PartialFailure);
}

#[docstream_test::test]
async fn test_generator_without_result() {
  let orchestrator = Orchestrator::builder()
    .config(
      GenerationConfig::builder()
        .kind(ArtifactKind::Estimate)
        .build()
        .unwrap(),
    )
    .generator(
      ArtifactKind::Estimate,
      ScriptedGenerator::drop_sender().steps(&[40]),
    )
    .build()
    .unwrap();

  let (_, outcome) = orchestrator
    .run(JobId::new("claim-6"))
    .unwrap()
    .collect()
    .await
    .unwrap();

  let estimate = outcome.state().artifact(ArtifactKind::Estimate).unwrap();
  assert_eq!(
    estimate.failure_reason,
    Some(FailureReason::internal("generator ended without a result"))
  );
}

#[docstream_test::test]
async fn test_weighted_progress() {
  let config = GenerationConfig::try_from(
    r#"
artifacts:
  - kind: report
    weight: 40
  - kind: estimate
    weight: 30
  - kind: photo-archive
    weight: 30
"#,
  )
  .unwrap();

  let orchestrator = Orchestrator::builder()
    .config(config)
    .generator(ArtifactKind::Report, ScriptedGenerator::succeed("r"))
    .generator(ArtifactKind::Estimate, ScriptedGenerator::fail("boom"))
    .generator(
      ArtifactKind::PhotoArchive,
      ScriptedGenerator::succeed("a").steps(&[50]),
    )
    .build()
    .unwrap();

  let (events, outcome) = orchestrator
    .run(JobId::new("claim-7"))
    .unwrap()
    .collect()
    .await
    .unwrap();

  // Report done, estimate failed, archive half way
  let halfway = progress_events(&events)
    .into_iter()
    .find(|e| e.kind == ArtifactKind::PhotoArchive && e.progress == 50)
    .unwrap();
  assert_eq!(halfway.overall_progress, 55);
  assert_eq!(halfway.overall_status, OverallStatus::Processing);

  assert_eq!(outcome.state().overall_progress, 70);
  assert_eq!(outcome.state().overall_status, OverallStatus::PartialFailure);
}

#[docstream_test::test]
async fn test_run_subset_of_kinds() {
  let run = all_succeed()
    .run_kinds(
      JobId::new("claim-8"),
      &[ArtifactKind::PhotoArchive, ArtifactKind::Report],
    )
    .unwrap();
  let (events, outcome) = run.collect().await.unwrap();

  let order: Vec<_> = events.iter().filter_map(|e| e.kind()).collect();
  assert_eq!(order.first(), Some(&ArtifactKind::PhotoArchive));
  assert_eq!(order.last(), Some(&ArtifactKind::Report));
  assert_eq!(
    outcome.state().kinds(),
    vec![ArtifactKind::PhotoArchive, ArtifactKind::Report]
  );
  assert_eq!(outcome.state().artifacts[0].weight, 50);
}

#[docstream_test::test]
async fn test_configuration_errors() {
  let err = Orchestrator::builder()
    .generator(ArtifactKind::Report, ScriptedGenerator::succeed("r"))
    .build()
    .unwrap_err();
  assert_eq!(
    err,
    Error::config_error("No generator registered for `estimate`")
  );

  let orchestrator = all_succeed();
  assert_eq!(
    orchestrator.run_kinds(JobId::new("claim-9"), &[]).unwrap_err(),
    Error::config_error("At least one artifact kind is required")
  );
}

#[docstream_test::test(paused)]
async fn test_bounded_parallelism() {
  let recorder = Recorder::default();
  let generator = |name: &str| {
    ScriptedGenerator::succeed(name)
      .steps(&[50])
      .delay(Duration::from_secs(1))
      .record(&recorder)
  };

  let orchestrator = Orchestrator::builder()
    .config(
      GenerationConfig::builder()
        .artifact(ArtifactConfig::new(ArtifactKind::Report))
        .artifact(ArtifactConfig::new(ArtifactKind::Estimate))
        .artifact(ArtifactConfig::new(ArtifactKind::PhotoCompilation))
        .artifact(ArtifactConfig::new(ArtifactKind::PhotoArchive))
        .max_concurrency(2)
        .build()
        .unwrap(),
    )
    .generator(ArtifactKind::Report, generator("r"))
    .generator(ArtifactKind::Estimate, generator("e"))
    .generator(ArtifactKind::PhotoCompilation, generator("c"))
    .generator(ArtifactKind::PhotoArchive, generator("a"))
    .build()
    .unwrap();

  let started = tokio::time::Instant::now();
  let (events, outcome) = orchestrator
    .run(JobId::new("claim-10"))
    .unwrap()
    .collect()
    .await
    .unwrap();

  assert_eq!(recorder.calls(), 4);
  assert_eq!(recorder.max_running(), 2);
  assert!(started.elapsed() < Duration::from_secs(8));
  assert_well_ordered(&events);
  assert_eq!(outcome.state().overall_status, OverallStatus::Complete);
}

#[docstream_test::test]
async fn test_slow_consumer() {
  let orchestrator = Orchestrator::builder()
    .config(
      GenerationConfig::builder()
        .kind(ArtifactKind::Report)
        .kind(ArtifactKind::Estimate)
        .channel_capacity(1)
        .build()
        .unwrap(),
    )
    .generator(
      ArtifactKind::Report,
      ScriptedGenerator::succeed("r").steps(&[10, 20, 30, 40, 50, 60, 70, 80, 90]),
    )
    .generator(
      ArtifactKind::Estimate,
      ScriptedGenerator::succeed("e").steps(&[25, 50, 75]),
    )
    .build()
    .unwrap();

  let mut run = orchestrator.run(JobId::new("claim-11")).unwrap();

  let mut events = Vec::new();
  while let Some(event) = tokio_stream::StreamExt::next(&mut run.events).await {
    tokio::time::sleep(Duration::from_millis(2)).await;
    events.push(event);
  }

  // Nothing is dropped or reordered while the consumer lags
  assert_eq!(events.len(), 11 + 5 + 1);
  assert_well_ordered(&events);
  assert!(run.outcome.await.unwrap().state().is_terminal());
}
