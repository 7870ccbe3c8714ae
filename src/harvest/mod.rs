//! Incremental virtualized-list harvester.
//!
//! One run: extract → merge → evaluate → advance → settle, until the
//! convergence monitor stops it. An optional pagination phase then walks
//! "next page" controls, repeating the same sweep on each page against the
//! same ledger.

pub mod advance;
pub mod convergence;
pub mod extract;
pub mod ledger;
pub mod sink;
pub mod target;

use crate::core::config::HarvestSettings;
use crate::core::types::{
    AdvanceReport, ContainerRef, ConvergeReason, EmptyReason, ExhaustReason, HarvestReport, Outcome,
    TargetCount,
};
use crate::scraping::virtualization::looks_virtualized;
use crate::scraping::RenderSurface;
use advance::{AdvanceDriver, PageTurn};
use convergence::{ConvergenceMonitor, Limits, Verdict};
use extract::RowExtractor;
use ledger::Ledger;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use advance::DEFAULT_NEXT_PAGE_SELECTORS;
pub use sink::{JsonFileSink, ResultSink};

/// What one sweep over the current page ended with.
#[derive(Debug, Clone, Copy)]
struct SweepEnd {
    outcome: Outcome,
    /// Run-wide total, including attempts spent before this sweep.
    attempts: u64,
    target: Option<TargetCount>,
}

#[derive(Debug, Clone)]
pub struct Harvester {
    settings: HarvestSettings,
    extractor: RowExtractor,
    driver: AdvanceDriver,
}

impl Harvester {
    pub fn new(settings: HarvestSettings) -> Self {
        let driver = AdvanceDriver::new(settings.wheel_delta);
        Self {
            settings,
            extractor: RowExtractor::new(),
            driver,
        }
    }

    pub fn with_driver(mut self, driver: AdvanceDriver) -> Self {
        self.driver = driver;
        self
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Harvest every row of `container`. Never fails: partial and empty
    /// results come back as a report with the matching [`Outcome`].
    pub async fn run(&self, surface: &dyn RenderSurface, container: &ContainerRef) -> HarvestReport {
        let started = Instant::now();
        let mut ledger = Ledger::new(self.settings.key_strategy);

        let present = match surface
            .wait_for_selector(&container.selector, self.settings.row_wait_timeout)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!("waiting for container '{}' failed: {}", container, e);
                false
            }
        };
        if !present {
            warn!("❌ Container '{}' never appeared", container);
            return self.report(
                container,
                Outcome::Empty(EmptyReason::ContainerMissing),
                Vec::new(),
                ledger,
                None,
                0,
                0,
                false,
                started,
            );
        }

        let headers = surface.column_headers(container).await.unwrap_or_else(|e| {
            debug!("column headers unavailable: {}", e);
            Vec::new()
        });
        let virtualized = match surface.container_classes(container).await {
            Ok(classes) => looks_virtualized(classes.as_slice()),
            Err(_) => false,
        };
        info!(
            "📊 Harvesting '{}' ({} columns, virtualized: {})",
            container,
            headers.len(),
            virtualized
        );

        let first = self.sweep(surface, container, &mut ledger, started, None, 0).await;
        let mut outcome = first.outcome;
        let mut attempts = first.attempts;
        let mut target = first.target;
        let mut pages = 0u32;

        let keep_paging = self.settings.paginate
            && outcome.is_converged()
            && outcome != Outcome::Converged(ConvergeReason::TargetReached);
        if keep_paging {
            while pages < self.settings.page_ceiling {
                match self.driver.next_page(surface).await {
                    PageTurn::Turned => {}
                    PageTurn::Disabled | PageTurn::Absent => break,
                }
                if attempts >= self.settings.attempt_ceiling {
                    warn!("⏱️ Attempt ceiling reached before page {}; stopping", pages + 2);
                    outcome = Outcome::Exhausted(ExhaustReason::Attempts);
                    break;
                }
                pages += 1;
                surface.wait_millis(self.settings.page_settle.as_millis() as u64).await;

                let before = ledger.len();
                let end = self
                    .sweep(surface, container, &mut ledger, started, target, attempts)
                    .await;
                attempts = end.attempts;
                target = end.target.or(target);
                let added = ledger.len() - before;
                info!("📄 Page {}: +{} rows ({} total)", pages + 1, added, ledger.len());

                if end.outcome.is_exhausted() {
                    outcome = end.outcome;
                    break;
                }
                if added == 0 {
                    break;
                }
                if end.outcome == Outcome::Converged(ConvergeReason::TargetReached) {
                    outcome = end.outcome;
                    break;
                }
            }
        }

        if ledger.is_empty() {
            outcome = Outcome::Empty(EmptyReason::NoRowsObserved);
        }

        self.report(
            container,
            outcome,
            headers,
            ledger,
            target,
            attempts,
            pages,
            virtualized,
            started,
        )
    }

    /// The virtual-scroll loop over whatever page is currently shown.
    async fn sweep(
        &self,
        surface: &dyn RenderSurface,
        container: &ContainerRef,
        ledger: &mut Ledger,
        started: Instant,
        known_target: Option<TargetCount>,
        prior_attempts: u64,
    ) -> SweepEnd {
        let mut monitor = ConvergenceMonitor::new(Limits::from(&self.settings), started)
            .with_prior_attempts(prior_attempts);
        monitor.observe_target(known_target);
        let mut last: AdvanceReport = self.driver.position(surface, container).await;

        loop {
            monitor.begin_attempt();

            let rows = self.extractor.extract(surface, container, ledger).await;
            let inserted = ledger.merge(rows);
            monitor.record_merge(inserted, ledger.len());
            monitor.observe_target(target::read_target(surface).await);

            let progress = monitor.progress();
            match progress.target {
                Some(t) => info!(
                    "attempt {}: +{} rows, {}/{} collected",
                    progress.attempts,
                    inserted,
                    ledger.len(),
                    t.total
                ),
                None => info!(
                    "attempt {}: +{} rows, {} collected",
                    progress.attempts,
                    inserted,
                    ledger.len()
                ),
            }

            let outcome = match monitor.evaluate(ledger.len(), &last) {
                Verdict::Continue => None,
                Verdict::Converged(ConvergeReason::FullyRendered) => {
                    // `last` predates the settle pause; rows may have brought a scroller with them.
                    let fresh = self.driver.position(surface, container).await;
                    if fresh.scrollable {
                        debug!("scroll range appeared after rendering; continuing");
                        last = fresh;
                        None
                    } else {
                        Some(Outcome::Converged(ConvergeReason::FullyRendered))
                    }
                }
                Verdict::Converged(reason) => Some(Outcome::Converged(reason)),
                Verdict::Exhausted(reason) => Some(Outcome::Exhausted(reason)),
                Verdict::Stalled => self.recheck_stall(surface, container, &mut monitor, ledger.len()).await,
            };
            if let Some(outcome) = outcome {
                let progress = monitor.progress();
                return SweepEnd {
                    outcome,
                    attempts: progress.attempts,
                    target: progress.target,
                };
            }

            last = self
                .driver
                .advance(surface, container, monitor.should_escalate())
                .await;
            self.settle(surface).await;
        }
    }

    /// At the scroll ceiling with no growth: look at the advertised count
    /// and the scroll range once more before calling it the end.
    async fn recheck_stall(
        &self,
        surface: &dyn RenderSurface,
        container: &ContainerRef,
        monitor: &mut ConvergenceMonitor,
        ledger_len: usize,
    ) -> Option<Outcome> {
        let fresh = target::read_target(surface).await;
        monitor.observe_target(fresh);
        if monitor.target_reached(ledger_len) {
            return Some(Outcome::Converged(ConvergeReason::TargetReached));
        }
        if matches!(fresh, Some(t) if t.shown >= t.total) {
            info!("ℹ️ Page reports everything shown; stopping");
            return Some(Outcome::Converged(ConvergeReason::EndOfContent));
        }
        if !self.driver.can_advance(surface, container).await {
            info!("ℹ️ Reached the end of the scroll range with no new rows; stopping");
            return Some(Outcome::Converged(ConvergeReason::EndOfContent));
        }
        debug!("stall re-check found more scroll range; continuing");
        monitor.resume_after_stall();
        None
    }

    /// Fixed settle pause, then wait out any visible loading indicator.
    async fn settle(&self, surface: &dyn RenderSurface) {
        surface.wait_millis(self.settings.settle.as_millis() as u64).await;

        if !matches!(surface.loading_visible().await, Ok(true)) {
            return;
        }
        debug!("loading indicator visible; waiting for it to clear");
        let deadline = Instant::now() + self.settings.loading_timeout;
        while Instant::now() < deadline {
            surface.wait_millis(250).await;
            match surface.loading_visible().await {
                Ok(true) => continue,
                _ => return,
            }
        }
        debug!(
            "loading indicator still visible after {}ms",
            self.settings.loading_timeout.as_millis()
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        container: &ContainerRef,
        outcome: Outcome,
        headers: Vec<String>,
        ledger: Ledger,
        target: Option<TargetCount>,
        attempts: u64,
        pages: u32,
        virtualized: bool,
        started: Instant,
    ) -> HarvestReport {
        let report = HarvestReport {
            run_id: uuid::Uuid::new_v4(),
            container: container.selector.clone(),
            outcome,
            headers,
            rows: ledger.into_rows(),
            target,
            attempts,
            pages,
            virtualized,
            elapsed_ms: started.elapsed().as_millis() as u64,
            finished_at: chrono::Utc::now().to_rfc3339(),
        };

        match report.completion_pct() {
            Some(pct) => info!(
                "✅ {}: {} rows, {:.1}% of advertised {}",
                report.outcome,
                report.row_count(),
                pct,
                report.target.map(|t| t.total).unwrap_or_default()
            ),
            None => info!("✅ {}: {} rows", report.outcome, report.row_count()),
        }
        report
    }
}
