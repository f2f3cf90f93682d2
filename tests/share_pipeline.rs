use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use evony_cdb::automation::interaction::ActionExecutor;
use evony_cdb::automation::pipeline::{FailureRecovery, PipelineState, StepOutcome};
use evony_cdb::core::coords::Rect;
use evony_cdb::core::platform::{GameWindow, InputDevice};
use evony_cdb::settings::Timings;
use evony_cdb::{
    parse_targets, AppSettings, AutomationError, CaptureFrame, Matcher, PipelineConfig,
    ProgressEvent, Result, RunSummary, SharePipeline, Target, TemplateStore,
};
use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ORIGIN: (i32, i32) = (1000, 500);
const FRAME_W: u32 = 240;
const FRAME_H: u32 = 200;
const BACKGROUND: u8 = 90;

/// (file name, size, frame-local placement, noise seed)
const COORD_TAB: (&str, (u32, u32), (u32, u32), u64) = ("CoordTab.png", (12, 10), (5, 5), 1);
const COORD_FIELD: (&str, (u32, u32), (u32, u32), u64) = ("coordsXY.png", (40, 10), (60, 5), 2);
const GO: (&str, (u32, u32), (u32, u32), u64) = ("GoButton.png", (12, 10), (200, 5), 3);
const ATTACK: (&str, (u32, u32), (u32, u32), u64) = ("Attack_alt.png", (12, 10), (110, 90), 4);
const BOSS: (&str, (u32, u32), (u32, u32), u64) = ("Azazel.png", (12, 10), (100, 150), 5);
const SHARE: (&str, (u32, u32), (u32, u32), u64) = ("ShareButton.png", (12, 10), (5, 180), 6);
const ALLIANCE: (&str, (u32, u32), (u32, u32), u64) = ("AllianceChat.png", (12, 10), (60, 180), 7);
const CONFIRM: (&str, (u32, u32), (u32, u32), u64) = ("ConfirmShare.png", (12, 10), (200, 180), 8);
const GRASS: (&str, (u32, u32), (u32, u32), u64) = ("WorldMapGrass.png", (12, 10), (150, 40), 9);

type Piece = (&'static str, (u32, u32), (u32, u32), u64);

const ALL: [Piece; 9] = [COORD_TAB, COORD_FIELD, GO, ATTACK, BOSS, SHARE, ALLIANCE, CONFIRM, GRASS];

fn noise(size: (u32, u32), seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(size.0, size.1, |_, _| Luma([rng.gen()]))
}

fn write_templates(dir: &Path) {
    for (name, size, _, seed) in ALL {
        noise(size, seed).save(dir.join(name)).unwrap();
    }
}

/// Game screen showing `visible` pieces on a flat background.
fn scene(visible: &[Piece]) -> RgbImage {
    let mut gray = GrayImage::from_pixel(FRAME_W, FRAME_H, Luma([BACKGROUND]));
    for &(_, size, (x, y), seed) in visible {
        image::imageops::replace(&mut gray, &noise(size, seed), x as i64, y as i64);
    }
    RgbImage::from_fn(FRAME_W, FRAME_H, |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

struct FakeWindow {
    image: RgbImage,
}

impl GameWindow for FakeWindow {
    fn bounds(&self) -> Option<Rect> {
        Some(Rect::new(ORIGIN.0, ORIGIN.1, FRAME_W as i32, FRAME_H as i32))
    }

    fn capture(&self) -> Result<CaptureFrame> {
        Ok(CaptureFrame::new(
            self.image.clone(),
            evony_cdb::core::coords::Point::new(ORIGIN.0, ORIGIN.1),
        ))
    }

    fn focus(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Input {
    Move(i32, i32),
    Down,
    Up,
    SelectAll,
    Delete,
    Type(String),
}

#[derive(Default)]
struct FakeInput {
    events: Vec<Input>,
    fail_typing: bool,
}

impl FakeInput {
    fn clicks(&self) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        let mut at = None;
        for event in &self.events {
            match event {
                Input::Move(x, y) => at = Some((*x, *y)),
                Input::Down => out.extend(at),
                _ => {}
            }
        }
        out
    }

    fn typed(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Input::Type(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl InputDevice for FakeInput {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.events.push(Input::Move(x, y));
        Ok(())
    }
    fn left_down(&mut self) -> Result<()> {
        self.events.push(Input::Down);
        Ok(())
    }
    fn left_up(&mut self) -> Result<()> {
        self.events.push(Input::Up);
        Ok(())
    }
    fn select_all(&mut self) -> Result<()> {
        self.events.push(Input::SelectAll);
        Ok(())
    }
    fn delete(&mut self) -> Result<()> {
        self.events.push(Input::Delete);
        Ok(())
    }
    fn type_text(&mut self, text: &str) -> Result<()> {
        if self.fail_typing {
            return Err(AutomationError::Os("keyboard hook rejected input".into()));
        }
        self.events.push(Input::Type(text.to_string()));
        Ok(())
    }
}

fn config(dir: &Path) -> PipelineConfig {
    let settings = AppSettings {
        images_dir: dir.to_path_buf(),
        timings: Timings::instant(),
        verify_pool: vec!["Azazel.png".to_string(), "Warlord6.png".to_string()],
        ..AppSettings::default()
    };
    PipelineConfig::from_settings(&settings)
}

fn pipeline(
    dir: &Path,
    visible: &[Piece],
    config: PipelineConfig,
    input: FakeInput,
) -> SharePipeline<FakeWindow, FakeInput> {
    let store = Arc::new(TemplateStore::new(dir));
    let executor = ActionExecutor::seeded(input, 0, config.timings, 11);
    SharePipeline::with_executor(
        FakeWindow {
            image: scene(visible),
        },
        executor,
        Matcher::new(store),
        config,
    )
}

fn run_collecting(
    pipeline: &mut SharePipeline<FakeWindow, FakeInput>,
    targets: &[Target],
) -> (RunSummary, Vec<ProgressEvent>) {
    let running = AtomicBool::new(true);
    let mut events = Vec::new();
    let summary = pipeline.run(targets, &running, |e| events.push(e.clone()));
    (summary, events)
}

fn screen(x: i32, y: i32) -> (i32, i32) {
    (ORIGIN.0 + x, ORIGIN.1 + y)
}

const TARGETS: [Target; 2] = [Target { x: 460, y: 589 }, Target { x: -12, y: 34 }];

#[test]
fn shares_every_target_when_all_steps_match() {
    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());
    let visible = [COORD_TAB, COORD_FIELD, GO, ATTACK, BOSS, SHARE, ALLIANCE, CONFIRM];
    let mut p = pipeline(dir.path(), &visible, config(dir.path()), FakeInput::default());

    let (summary, events) = run_collecting(&mut p, &TARGETS);

    assert_eq!(summary.total, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.shared, 2);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.stopped);
    assert!(summary.aborted.is_none());

    let input = p.executor().input();
    assert_eq!(input.typed(), vec!["460", "589", "-12", "34"]);

    let clicks = input.clicks();
    assert_eq!(clicks.len(), 22);
    let center = screen(FRAME_W as i32 / 2, FRAME_H as i32 / 2);
    assert_eq!(
        &clicks[..11],
        &[
            screen(11, 10),  // coordinate tab
            screen(70, 10),  // X field
            screen(90, 10),  // Y field
            screen(206, 10), // go
            center,          // open panel
            screen(116, 95), // attack
            screen(40, 155), // left of the boss overlay
            center,          // reopen panel
            screen(11, 185), // share
            screen(66, 185), // alliance chat
            screen(206, 185) // confirm
        ]
    );
    assert_eq!(&clicks[..11], &clicks[11..]);

    let shared: Vec<_> = events
        .iter()
        .filter(|e| e.outcome == StepOutcome::Shared)
        .map(|e| (e.target_index, e.completed))
        .collect();
    assert_eq!(shared, vec![(Some(0), 1), (Some(1), 2)]);
    assert_eq!(events.last().unwrap().outcome, StepOutcome::Finished);
}

#[test]
fn missing_attack_prompt_skips_target_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());
    let visible = [COORD_TAB, COORD_FIELD, GO, BOSS, SHARE, ALLIANCE, CONFIRM];
    let mut p = pipeline(dir.path(), &visible, config(dir.path()), FakeInput::default());

    let (summary, events) = run_collecting(&mut p, &TARGETS);

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.shared, 0);
    assert!(summary.aborted.is_none());

    let skipped: Vec<_> = events
        .iter()
        .filter(|e| e.outcome == StepOutcome::Skipped)
        .map(|e| (e.target_index, e.state))
        .collect();
    assert_eq!(
        skipped,
        vec![
            (Some(0), Some(PipelineState::LocateAction)),
            (Some(1), Some(PipelineState::LocateAction)),
        ]
    );

    // Three tries, each followed by a nudge in the window center
    let tries = events
        .iter()
        .filter(|e| {
            e.state == Some(PipelineState::LocateAction) && e.outcome == StepOutcome::Failed
        })
        .filter(|e| e.target_index == Some(0))
        .count();
    assert_eq!(tries, 4);

    let center = screen(FRAME_W as i32 / 2, FRAME_H as i32 / 2);
    let clicks = p.executor().input().clicks();
    assert_eq!(clicks.len(), 16);
    assert_eq!(&clicks[4..8], &[center, center, center, center]);
    assert!(events
        .iter()
        .all(|e| e.state != Some(PipelineState::VerifyIdentity)));
}

#[test]
fn unverified_boss_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());
    let visible = [COORD_TAB, COORD_FIELD, GO, ATTACK, SHARE, ALLIANCE, CONFIRM];
    let mut p = pipeline(dir.path(), &visible, config(dir.path()), FakeInput::default());

    let (summary, events) = run_collecting(&mut p, &TARGETS[..1]);

    assert_eq!(summary.skipped, 1);
    let failed = events
        .iter()
        .find(|e| {
            e.state == Some(PipelineState::VerifyIdentity) && e.outcome == StepOutcome::Failed
        })
        .unwrap();
    assert!(failed.score.unwrap() < 0.80);
    assert!(failed.message.contains("Not a desired boss"));
}

#[test]
fn recovery_and_debug_capture_run_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());
    let shots = tempfile::tempdir().unwrap();

    let mut cfg = config(dir.path());
    cfg.recovery = FailureRecovery::ClickTemplate(GRASS.0.to_string());
    cfg.debug_capture_dir = Some(shots.path().to_path_buf());
    let visible = [COORD_TAB, COORD_FIELD, GO, GRASS];
    let mut p = pipeline(dir.path(), &visible, cfg, FakeInput::default());

    let (summary, _) = run_collecting(&mut p, &TARGETS[..1]);

    assert_eq!(summary.skipped, 1);
    assert_eq!(p.executor().input().clicks().last(), Some(&screen(156, 45)));

    let saved: Vec<_> = std::fs::read_dir(shots.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].starts_with("_debug_attack_fail_"));
}

#[test]
fn zero_targets_is_a_trivial_run() {
    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());
    let mut p = pipeline(dir.path(), &[], config(dir.path()), FakeInput::default());

    let (summary, events) = run_collecting(&mut p, &[]);

    assert_eq!(summary, RunSummary::default());
    assert!(p.executor().input().events.is_empty());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, StepOutcome::Finished);
}

#[test]
fn cleared_running_flag_stops_before_and_during_targets() {
    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());
    let visible = [COORD_TAB, COORD_FIELD, GO, ATTACK, BOSS, SHARE, ALLIANCE, CONFIRM];

    let mut p = pipeline(dir.path(), &visible, config(dir.path()), FakeInput::default());
    let running = AtomicBool::new(false);
    let summary = p.run(&TARGETS, &running, |_| {});
    assert!(summary.stopped);
    assert_eq!(summary.processed, 0);
    assert!(p.executor().input().events.is_empty());

    let mut p = pipeline(dir.path(), &visible, config(dir.path()), FakeInput::default());
    let running = AtomicBool::new(true);
    let summary = p.run(&TARGETS, &running, |e| {
        if e.state == Some(PipelineState::LocateCoordEntry) && e.outcome == StepOutcome::Succeeded {
            running.store(false, Ordering::SeqCst);
        }
    });
    assert!(summary.stopped);
    assert_eq!(summary.processed, 0);
    assert_eq!(p.executor().input().clicks(), vec![screen(11, 10)]);
}

#[test]
fn os_fault_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());
    let visible = [COORD_TAB, COORD_FIELD, GO, ATTACK, BOSS, SHARE, ALLIANCE, CONFIRM];
    let input = FakeInput {
        fail_typing: true,
        ..FakeInput::default()
    };
    let mut p = pipeline(dir.path(), &visible, config(dir.path()), input);

    let (summary, events) = run_collecting(&mut p, &TARGETS);

    assert_eq!(summary.processed, 0);
    assert!(summary.aborted.unwrap().contains("keyboard hook rejected input"));
    assert!(events.iter().all(|e| e.target_index != Some(1)));
    assert_eq!(events.last().unwrap().outcome, StepOutcome::Aborted);
}

#[test]
fn missing_templates_fail_preconditions() {
    let empty = tempfile::tempdir().unwrap();
    let mut p = pipeline(empty.path(), &[], config(empty.path()), FakeInput::default());
    let err = p.check_preconditions().unwrap_err();
    assert!(matches!(err, AutomationError::TemplateMissing(_)));

    let (summary, events) = run_collecting(&mut p, &TARGETS);
    assert_eq!(summary.processed, 0);
    assert!(summary.aborted.unwrap().starts_with("Missing template"));
    assert_eq!(events.len(), 1);
    assert!(p.executor().input().events.is_empty());

    let gone = empty.path().join("nope");
    let p = pipeline(&gone, &[], config(&gone), FakeInput::default());
    assert!(matches!(
        p.check_preconditions(),
        Err(AutomationError::ImagesDirMissing(_))
    ));
}

#[test]
fn duplicate_coordinates_are_processed_once() {
    let targets = parse_targets("Lv5 Pan (xy: 100 200)\nLv5 Pan (xy: 100 200)");
    assert_eq!(targets, vec![Target { x: 100, y: 200 }]);

    let dir = tempfile::tempdir().unwrap();
    write_templates(dir.path());
    let visible = [COORD_TAB, COORD_FIELD, GO, ATTACK, BOSS, SHARE, ALLIANCE, CONFIRM];
    let mut p = pipeline(dir.path(), &visible, config(dir.path()), FakeInput::default());

    let (summary, _) = run_collecting(&mut p, &targets);
    assert_eq!(summary.total, 1);
    assert_eq!(summary.shared, 1);
    assert_eq!(p.executor().input().typed(), vec!["100", "200"]);
}
