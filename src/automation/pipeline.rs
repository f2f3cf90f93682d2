//! The coordinate-share pipeline: one fixed sequence of locate-then-act
//! states, run for each target in order.
//!
//! A state that cannot find its template abandons the current target and the
//! run moves on to the next one. `Err` values (OS faults, failed
//! preconditions) end the whole run; the targets handled before that stay
//! counted in the [`RunSummary`].

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::automation::detection::{MatchParams, MatchResult, Matcher, ScaleRange};
use crate::automation::interaction::{delay_ms, ActionExecutor};
use crate::core::coords::{centered_roi, Point, Rect};
use crate::core::frame::CaptureFrame;
use crate::core::platform::{GameWindow, InputDevice};
use crate::core::target_parser::Target;
use crate::core::worker::Severity;
use crate::error::{AutomationError, Result};
use crate::settings::{AppSettings, Timings};

/// Scales tried by the verification step, in order.
pub const VERIFY_LADDER: [f64; 3] = [1.0, 0.95, 1.05];

const ACTION_ATTEMPTS: u32 = 3;
const FIELD_MARGIN: i32 = 10;
const REPOSITION_GAP: i32 = 60;
const REPOSITION_MIN_X: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    LocateCoordEntry,
    FillCoordinates,
    PressGo,
    OpenPanel,
    LocateAction,
    VerifyIdentity,
    Reposition,
    ReopenPanel,
    LocateShare,
    LocateAllianceChannel,
    ConfirmShare,
    Done,
}

impl PipelineState {
    pub const FIRST: PipelineState = PipelineState::LocateCoordEntry;

    /// Successor on success. `Done` is terminal.
    pub fn next(self) -> PipelineState {
        use PipelineState::*;
        match self {
            LocateCoordEntry => FillCoordinates,
            FillCoordinates => PressGo,
            PressGo => OpenPanel,
            OpenPanel => LocateAction,
            LocateAction => VerifyIdentity,
            VerifyIdentity => Reposition,
            Reposition => ReopenPanel,
            ReopenPanel => LocateShare,
            LocateShare => LocateAllianceChannel,
            LocateAllianceChannel => ConfirmShare,
            ConfirmShare => Done,
            Done => Done,
        }
    }

    pub fn label(self) -> &'static str {
        use PipelineState::*;
        match self {
            LocateCoordEntry => "Coordinate tab",
            FillCoordinates => "Fill coordinates",
            PressGo => "Go",
            OpenPanel => "Open panel",
            LocateAction => "Attack prompt",
            VerifyIdentity => "Verify boss",
            Reposition => "Reposition",
            ReopenPanel => "Reopen panel",
            LocateShare => "Share",
            LocateAllianceChannel => "Alliance chat",
            ConfirmShare => "Confirm share",
            Done => "Done",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where inside the window a step searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchArea {
    Window,
    /// Centered rectangle, `fraction` of the window per axis, at least
    /// `floor` pixels.
    Centered { fraction: f32, floor: i32 },
}

impl SearchArea {
    pub fn resolve(&self, width: u32, height: u32) -> Option<Rect> {
        match *self {
            SearchArea::Window => None,
            SearchArea::Centered { fraction, floor } => {
                Some(centered_roi(width as i32, height as i32, fraction, floor))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchMode {
    /// Exhaustive multi-scale search, best candidate wins.
    Full(MatchParams),
    /// Single-scale passes over cached templates, first hit wins.
    FastLadder { threshold: f32, ladder: Vec<f64> },
}

impl SearchMode {
    pub fn threshold(&self) -> f32 {
        match self {
            SearchMode::Full(params) => params.threshold,
            SearchMode::FastLadder { threshold, .. } => *threshold,
        }
    }
}

/// What a step does with its match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    ClickCenter,
    /// Click inside the left and right ends of the match and type X and Y.
    FillCoordinates { margin: i32 },
    /// Click `gap` pixels left of the match (never left of `min_x`), at its
    /// vertical center.
    ClickLeftOf { gap: i32, min_x: i32 },
}

/// Declarative description of one locate-then-act step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    pub label: String,
    pub templates: Vec<String>,
    pub search: SearchMode,
    pub area: SearchArea,
    pub attempts: u32,
    pub action: StepAction,
}

impl StepSpec {
    fn new(label: &str, templates: &[&str], search: SearchMode) -> Self {
        Self {
            label: label.to_string(),
            templates: templates.iter().map(|s| s.to_string()).collect(),
            search,
            area: SearchArea::Window,
            attempts: 1,
            action: StepAction::ClickCenter,
        }
    }

    fn in_area(mut self, area: SearchArea) -> Self {
        self.area = area;
        self
    }

    fn with_action(mut self, action: StepAction) -> Self {
        self.action = action;
        self
    }

    fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }
}

/// What to do right before a target is abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FailureRecovery {
    #[default]
    Skip,
    /// Click this template (e.g. an empty patch of world map) if visible,
    /// to dismiss whatever is open, then skip.
    ClickTemplate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub coord_tab: StepSpec,
    pub coord_field: StepSpec,
    pub go_button: StepSpec,
    pub action: StepSpec,
    pub verify: StepSpec,
    pub share: StepSpec,
    pub alliance: StepSpec,
    pub confirm: StepSpec,
    pub timings: Timings,
    pub recovery: FailureRecovery,
    /// Save the frame here when the attack prompt never shows up.
    pub debug_capture_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        let strict = settings.strict_threshold;
        let relaxed = settings.relaxed_threshold;
        let click_scales = ScaleRange::new(0.95, 1.05, 0.05);
        let click = |threshold| SearchMode::Full(MatchParams::new(threshold, click_scales, false));
        let verify_pool: Vec<&str> = settings.verify_pool.iter().map(String::as_str).collect();

        Self {
            coord_tab: StepSpec::new(
                "Coordinate tab",
                &["CoordTab.png", "CoordTab2.png"],
                click(relaxed),
            ),
            coord_field: StepSpec::new(
                "Coordinate fields",
                &["coordsXY.png"],
                SearchMode::Full(MatchParams::new(
                    strict,
                    ScaleRange::new(0.90, 1.10, 0.05),
                    false,
                )),
            )
            .with_action(StepAction::FillCoordinates { margin: FIELD_MARGIN }),
            go_button: StepSpec::new("Go button", &["GoButton.png"], click(strict)),
            action: StepSpec::new(
                "Attack prompt",
                &["Attack_alt.png"],
                SearchMode::Full(MatchParams::new(0.80, ScaleRange::new(0.85, 1.20, 0.05), true)),
            )
            .in_area(SearchArea::Centered { fraction: 0.45, floor: 200 })
            .with_attempts(ACTION_ATTEMPTS),
            verify: StepSpec::new(
                "Boss overlay",
                &verify_pool,
                SearchMode::FastLadder {
                    threshold: 0.80,
                    ladder: VERIFY_LADDER.to_vec(),
                },
            )
            .in_area(SearchArea::Centered { fraction: 0.42, floor: 220 })
            .with_action(StepAction::ClickLeftOf {
                gap: REPOSITION_GAP,
                min_x: REPOSITION_MIN_X,
            }),
            share: StepSpec::new(
                "Share button",
                &["ShareButton.png", "ShareButton_alt.png"],
                click(relaxed),
            ),
            alliance: StepSpec::new("Alliance chat", &["AllianceChat.png"], click(relaxed)),
            confirm: StepSpec::new("Confirm share", &["ConfirmShare.png"], click(strict)),
            timings: settings.timings,
            recovery: FailureRecovery::Skip,
            debug_capture_dir: None,
        }
    }

    pub fn steps(&self) -> [&StepSpec; 8] {
        [
            &self.coord_tab,
            &self.coord_field,
            &self.go_button,
            &self.action,
            &self.verify,
            &self.share,
            &self.alliance,
            &self.confirm,
        ]
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(&AppSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    TargetStarted,
    Succeeded,
    Failed,
    Shared,
    Skipped,
    Stopped,
    Aborted,
    Finished,
}

/// One line of run progress for the front end.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Zero-based target index; `None` for run-level events.
    pub target_index: Option<usize>,
    pub total: usize,
    /// Targets finished so far (shared or skipped).
    pub completed: usize,
    pub state: Option<PipelineState>,
    pub outcome: StepOutcome,
    pub score: Option<f32>,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub shared: usize,
    pub skipped: usize,
    pub stopped: bool,
    /// Reason the run ended early on a fault.
    pub aborted: Option<String>,
}

impl RunSummary {
    pub fn describe(&self) -> String {
        let mut text = format!(
            "{}/{} targets processed ({} shared, {} skipped)",
            self.processed, self.total, self.shared, self.skipped
        );
        if self.stopped {
            text.push_str(", stopped by user");
        }
        if let Some(reason) = &self.aborted {
            text.push_str(&format!(", aborted: {}", reason));
        }
        text
    }
}

enum Transition {
    Next,
    Skip,
}

enum TargetOutcome {
    Shared,
    Skipped(PipelineState),
    Stopped,
}

/// Per-target scratch state.
struct TargetRun {
    index: usize,
    target: Target,
    verified: Option<Rect>,
}

struct Located {
    result: MatchResult,
    origin: Point,
    frame: CaptureFrame,
}

type Observer<'a> = dyn FnMut(&ProgressEvent) + 'a;

struct Reporter<'a, 'b> {
    observer: &'a mut Observer<'b>,
    total: usize,
    completed: usize,
}

impl Reporter<'_, '_> {
    fn emit(
        &mut self,
        target_index: Option<usize>,
        state: Option<PipelineState>,
        outcome: StepOutcome,
        score: Option<f32>,
        severity: Severity,
        message: String,
    ) {
        match severity {
            Severity::Info => tracing::info!("{}", message),
            Severity::Warn => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
        let event = ProgressEvent {
            target_index,
            total: self.total,
            completed: self.completed,
            state,
            outcome,
            score,
            message,
            severity,
        };
        (self.observer)(&event);
    }

    fn step(
        &mut self,
        run: &TargetRun,
        state: PipelineState,
        ok: bool,
        score: Option<f32>,
        message: String,
    ) {
        let (outcome, severity) = if ok {
            (StepOutcome::Succeeded, Severity::Info)
        } else {
            (StepOutcome::Failed, Severity::Warn)
        };
        self.emit(Some(run.index), Some(state), outcome, score, severity, message);
    }

    fn run_level(&mut self, outcome: StepOutcome, severity: Severity, message: String) {
        self.emit(None, None, outcome, None, severity, message);
    }
}

/// Drives one attached window through the share sequence.
pub struct SharePipeline<W, I> {
    window: W,
    executor: ActionExecutor<I>,
    matcher: Matcher,
    config: PipelineConfig,
}

impl<W: GameWindow, I: InputDevice> SharePipeline<W, I> {
    pub fn new(window: W, input: I, jitter: i32, matcher: Matcher, config: PipelineConfig) -> Self {
        let executor = ActionExecutor::new(input, jitter, config.timings);
        Self::with_executor(window, executor, matcher, config)
    }

    pub fn with_executor(
        window: W,
        executor: ActionExecutor<I>,
        matcher: Matcher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            window,
            executor,
            matcher,
            config,
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn executor(&self) -> &ActionExecutor<I> {
        &self.executor
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Images folder exists and every step has at least one template file.
    pub fn check_preconditions(&self) -> Result<()> {
        let store = self.matcher.store();
        if !store.dir().is_dir() {
            return Err(AutomationError::ImagesDirMissing(store.dir().to_path_buf()));
        }
        for spec in self.config.steps() {
            let names: Vec<&str> = spec.templates.iter().map(String::as_str).collect();
            let missing = store.missing(&names);
            if missing.len() == names.len() {
                let first = names.first().copied().unwrap_or(spec.label.as_str());
                return Err(AutomationError::TemplateMissing(store.path_of(first)));
            }
        }
        Ok(())
    }

    /// Process `targets` in order. `running` is checked between targets and
    /// between states; clearing it stops the run.
    pub fn run<F>(
        &mut self,
        targets: &[Target],
        running: &AtomicBool,
        mut observer: F,
    ) -> RunSummary
    where
        F: FnMut(&ProgressEvent),
    {
        let mut reporter = Reporter {
            observer: &mut observer,
            total: targets.len(),
            completed: 0,
        };
        let mut summary = RunSummary {
            total: targets.len(),
            ..RunSummary::default()
        };

        if let Err(e) = self.check_preconditions() {
            reporter.run_level(StepOutcome::Aborted, Severity::Error, e.to_string());
            summary.aborted = Some(e.to_string());
            return summary;
        }
        if targets.is_empty() {
            reporter.run_level(
                StepOutcome::Finished,
                Severity::Info,
                "No targets to process".into(),
            );
            return summary;
        }
        if !self.window.focus() {
            reporter.run_level(
                StepOutcome::Failed,
                Severity::Warn,
                "Could not bring the game window to the foreground".into(),
            );
        }

        for (index, target) in targets.iter().enumerate() {
            if !running.load(Ordering::SeqCst) {
                summary.stopped = true;
                break;
            }
            reporter.emit(
                Some(index),
                None,
                StepOutcome::TargetStarted,
                None,
                Severity::Info,
                format!(
                    "-- [{}/{}] Target #{} @ ({},{}) --",
                    index + 1,
                    targets.len(),
                    index + 1,
                    target.x,
                    target.y
                ),
            );

            let mut run = TargetRun {
                index,
                target: *target,
                verified: None,
            };
            match self.run_target(&mut run, running, &mut reporter) {
                Ok(TargetOutcome::Shared) => {
                    summary.processed += 1;
                    summary.shared += 1;
                    reporter.completed = summary.processed;
                    reporter.emit(
                        Some(index),
                        Some(PipelineState::Done),
                        StepOutcome::Shared,
                        None,
                        Severity::Info,
                        format!("OK: Target #{} shared", index + 1),
                    );
                    delay_ms(self.config.timings.after_target);
                }
                Ok(TargetOutcome::Skipped(state)) => {
                    summary.processed += 1;
                    summary.skipped += 1;
                    reporter.completed = summary.processed;
                    reporter.emit(
                        Some(index),
                        Some(state),
                        StepOutcome::Skipped,
                        None,
                        Severity::Warn,
                        format!("Target #{} skipped at {}", index + 1, state),
                    );
                }
                Ok(TargetOutcome::Stopped) => {
                    summary.stopped = true;
                    break;
                }
                Err(e) => {
                    reporter.run_level(
                        StepOutcome::Aborted,
                        Severity::Error,
                        format!("Run aborted: {}", e),
                    );
                    summary.aborted = Some(e.to_string());
                    break;
                }
            }
        }

        if summary.stopped {
            reporter.run_level(
                StepOutcome::Stopped,
                Severity::Warn,
                format!("Stopped: {}", summary.describe()),
            );
        } else if summary.aborted.is_none() {
            reporter.run_level(
                StepOutcome::Finished,
                Severity::Info,
                format!("Finished: {}", summary.describe()),
            );
        }
        summary
    }

    fn run_target(
        &mut self,
        run: &mut TargetRun,
        running: &AtomicBool,
        reporter: &mut Reporter<'_, '_>,
    ) -> Result<TargetOutcome> {
        let mut state = PipelineState::FIRST;
        while state != PipelineState::Done {
            if !running.load(Ordering::SeqCst) {
                return Ok(TargetOutcome::Stopped);
            }
            match self.execute(state, run, reporter)? {
                Transition::Next => state = state.next(),
                Transition::Skip => {
                    self.recover()?;
                    return Ok(TargetOutcome::Skipped(state));
                }
            }
        }
        Ok(TargetOutcome::Shared)
    }

    fn execute(
        &mut self,
        state: PipelineState,
        run: &mut TargetRun,
        reporter: &mut Reporter<'_, '_>,
    ) -> Result<Transition> {
        use PipelineState::*;
        let timings = self.config.timings;
        match state {
            LocateCoordEntry => {
                let spec = self.config.coord_tab.clone();
                self.locate_and_click(&spec, state, run, reporter, timings.after_coord_tab)
            }
            FillCoordinates => self.fill_coordinates(run, reporter),
            PressGo => {
                let spec = self.config.go_button.clone();
                let next = self.locate_and_click(&spec, state, run, reporter, timings.after_click)?;
                if matches!(next, Transition::Next) {
                    delay_ms(timings.after_go);
                }
                Ok(next)
            }
            OpenPanel => self.click_center(state, run, reporter, timings.after_open_panel),
            LocateAction => self.locate_action(run, reporter),
            VerifyIdentity => self.verify_identity(run, reporter),
            Reposition => self.reposition(run, reporter),
            ReopenPanel => self.click_center(state, run, reporter, timings.after_reopen),
            LocateShare => {
                let spec = self.config.share.clone();
                self.locate_and_click(&spec, state, run, reporter, timings.after_share)
            }
            LocateAllianceChannel => {
                let spec = self.config.alliance.clone();
                self.locate_and_click(&spec, state, run, reporter, timings.after_alliance)
            }
            ConfirmShare => {
                let spec = self.config.confirm.clone();
                self.locate_and_click(&spec, state, run, reporter, timings.after_click)
            }
            Done => Ok(Transition::Next),
        }
    }

    /// Capture the window and search it for `spec`'s templates.
    fn locate(&self, spec: &StepSpec) -> Result<Located> {
        let frame = self.window.capture()?;
        let origin = self
            .window
            .bounds()
            .map(|b| b.top_left())
            .unwrap_or_else(|| frame.origin());
        if frame.is_empty() {
            tracing::warn!("Empty capture while looking for {}", spec.label);
            return Ok(Located {
                result: MatchResult::not_found(),
                origin,
                frame,
            });
        }

        let region = spec.area.resolve(frame.width(), frame.height());
        let result = match &spec.search {
            SearchMode::Full(params) => {
                self.matcher.locate(&frame, region, &spec.templates, params)
            }
            SearchMode::FastLadder { threshold, ladder } => {
                self.matcher
                    .locate_fast_ladder(&frame, region, &spec.templates, *threshold, ladder)
            }
        };
        Ok(Located { result, origin, frame })
    }

    fn locate_and_click(
        &mut self,
        spec: &StepSpec,
        state: PipelineState,
        run: &TargetRun,
        reporter: &mut Reporter<'_, '_>,
        settle: u64,
    ) -> Result<Transition> {
        let located = self.locate(spec)?;
        let result = &located.result;
        if !result.found {
            reporter.step(
                run,
                state,
                false,
                Some(result.score),
                format!(
                    "{} not found (best score={:.3}). Skipping target.",
                    spec.label, result.score
                ),
            );
            return Ok(Transition::Skip);
        }

        self.executor.click_match(located.origin, result.rect)?;
        reporter.step(
            run,
            state,
            true,
            Some(result.score),
            format!(
                "{}: clicked {} (score={:.3})",
                spec.label,
                result.template_name(),
                result.score
            ),
        );
        delay_ms(settle);
        Ok(Transition::Next)
    }

    fn fill_coordinates(
        &mut self,
        run: &TargetRun,
        reporter: &mut Reporter<'_, '_>,
    ) -> Result<Transition> {
        let state = PipelineState::FillCoordinates;
        let spec = self.config.coord_field.clone();
        let located = self.locate(&spec)?;
        let result = &located.result;
        if !result.found {
            reporter.step(
                run,
                state,
                false,
                Some(result.score),
                format!(
                    "{} not found (best score={:.3}). Skipping target.",
                    spec.label, result.score
                ),
            );
            return Ok(Transition::Skip);
        }

        let margin = match spec.action {
            StepAction::FillCoordinates { margin } => margin,
            _ => FIELD_MARGIN,
        };
        let rect = result.rect;
        let mid_y = rect.y + rect.height / 2;
        let x_field = Point::new(rect.x + margin, mid_y);
        let y_field = Point::new(rect.right() - margin, mid_y);

        self.executor
            .fill_field(located.origin, x_field, &run.target.x.to_string())?;
        self.executor
            .fill_field(located.origin, y_field, &run.target.y.to_string())?;
        reporter.step(
            run,
            state,
            true,
            Some(result.score),
            format!("Entered X={} Y={}", run.target.x, run.target.y),
        );
        Ok(Transition::Next)
    }

    fn click_center(
        &mut self,
        state: PipelineState,
        run: &TargetRun,
        reporter: &mut Reporter<'_, '_>,
        settle: u64,
    ) -> Result<Transition> {
        let Some(bounds) = self.window.bounds().filter(|b| !b.is_empty()) else {
            reporter.step(
                run,
                state,
                false,
                None,
                "Window bounds unavailable. Skipping target.".into(),
            );
            return Ok(Transition::Skip);
        };
        self.executor.click_window_center(bounds)?;
        reporter.step(run, state, true, None, format!("{}: clicked window center", state));
        delay_ms(settle);
        Ok(Transition::Next)
    }

    fn locate_action(
        &mut self,
        run: &TargetRun,
        reporter: &mut Reporter<'_, '_>,
    ) -> Result<Transition> {
        let state = PipelineState::LocateAction;
        let spec = self.config.action.clone();
        let retry = self.config.timings.attack_retry;

        let mut last: Option<Located> = None;
        for attempt in 1..=spec.attempts {
            let located = self.locate(&spec)?;
            let score = located.result.score;
            if located.result.found {
                self.executor.click_match(located.origin, located.result.rect)?;
                reporter.step(
                    run,
                    state,
                    true,
                    Some(score),
                    format!("{} try {}: clicked (score={:.3})", spec.label, attempt, score),
                );
                delay_ms(self.config.timings.after_click);
                return Ok(Transition::Next);
            }

            reporter.step(
                run,
                state,
                false,
                Some(score),
                format!("{} try {}: best score={:.3}", spec.label, attempt, score),
            );
            delay_ms(retry);
            if let Some(bounds) = self.window.bounds().filter(|b| !b.is_empty()) {
                self.executor.click_window_center(bounds)?;
            }
            delay_ms(retry);
            last = Some(located);
        }

        if let (Some(dir), Some(located)) = (&self.config.debug_capture_dir, &last) {
            save_debug_frame(dir, &located.frame);
        }
        reporter.step(
            run,
            state,
            false,
            last.as_ref().map(|l| l.result.score),
            format!("{} not found after {} tries. Skipping target.", spec.label, spec.attempts),
        );
        Ok(Transition::Skip)
    }

    fn verify_identity(
        &mut self,
        run: &mut TargetRun,
        reporter: &mut Reporter<'_, '_>,
    ) -> Result<Transition> {
        let state = PipelineState::VerifyIdentity;
        let spec = self.config.verify.clone();
        let located = self.locate(&spec)?;
        let result = located.result;
        if !result.found {
            reporter.step(
                run,
                state,
                false,
                Some(result.score),
                format!(
                    "Not a desired boss (closest {} score={:.3}). Skipping target.",
                    result.template_name(),
                    result.score
                ),
            );
            return Ok(Transition::Skip);
        }

        run.verified = Some(result.rect);
        reporter.step(
            run,
            state,
            true,
            Some(result.score),
            format!("Verified via {} (score={:.3})", result.template_name(), result.score),
        );
        Ok(Transition::Next)
    }

    fn reposition(
        &mut self,
        run: &TargetRun,
        reporter: &mut Reporter<'_, '_>,
    ) -> Result<Transition> {
        let state = PipelineState::Reposition;
        let Some(rect) = run.verified else {
            return Ok(Transition::Skip);
        };
        let (gap, min_x) = match self.config.verify.action {
            StepAction::ClickLeftOf { gap, min_x } => (gap, min_x),
            _ => (REPOSITION_GAP, REPOSITION_MIN_X),
        };
        let Some(bounds) = self.window.bounds() else {
            reporter.step(
                run,
                state,
                false,
                None,
                "Window bounds unavailable. Skipping target.".into(),
            );
            return Ok(Transition::Skip);
        };

        let point = Point::new((rect.x - gap).max(min_x), rect.y + rect.height / 2);
        self.executor.click_frame_point(bounds.top_left(), point)?;
        reporter.step(run, state, true, None, "Clicked left of the boss panel".into());
        delay_ms(self.config.timings.after_reposition);
        Ok(Transition::Next)
    }

    /// Optional corrective action before a target is abandoned.
    fn recover(&mut self) -> Result<()> {
        let FailureRecovery::ClickTemplate(name) = &self.config.recovery else {
            return Ok(());
        };
        let spec = StepSpec::new(
            "Recovery",
            &[name.as_str()],
            SearchMode::Full(MatchParams::new(
                self.config.share.search.threshold(),
                ScaleRange::new(0.95, 1.05, 0.05),
                false,
            )),
        );
        let located = self.locate(&spec)?;
        if located.result.found {
            tracing::info!("Recovery click on {}", name);
            self.executor.click_match(located.origin, located.result.rect)?;
            delay_ms(self.config.timings.after_click);
        }
        Ok(())
    }
}

fn save_debug_frame(dir: &std::path::Path, frame: &CaptureFrame) {
    if frame.is_empty() {
        return;
    }
    let path = dir.join(format!(
        "_debug_attack_fail_{}.png",
        chrono::Local::now().format("%H%M%S")
    ));
    match frame.image().save(&path) {
        Ok(()) => tracing::warn!("Attack prompt not found. Saved debug shot: {}", path.display()),
        Err(e) => tracing::warn!("Failed to save debug shot {}: {}", path.display(), e),
    }
}
