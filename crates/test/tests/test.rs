use std::time::Duration;

#[docstream_test::test]
fn sync_test() -> Result<(), ()> {
  log::info!("Hello, world!");
  log::warn!("Hello, world!");
  log::error!("Hello, world!");
  log::debug!("Hello, world!");
  log::trace!("Hello, world!");

  Ok(())
}

#[docstream_test::test]
async fn async_test() -> Result<(), ()> {
  log::info!("Hello, world!");
  log::trace!("Hello, world!");

  Ok(())
}

#[docstream_test::test(paused)]
async fn paused_clock_advances() {
  let started = tokio::time::Instant::now();
  tokio::time::sleep(Duration::from_secs(3600)).await;

  assert!(started.elapsed() >= Duration::from_secs(3600));
}

#[docstream_test::test(debug)]
async fn with_level() {
  log::debug!("debug level");
}
