use std::sync::Arc;

use crate::automation::detection::Matcher;
use crate::automation::interaction::ActionExecutor;
use crate::automation::pipeline::{PipelineConfig, SharePipeline};
use crate::automation::templates::TemplateStore;
use crate::core::coords::Rect;
use crate::core::platform::{normalize_process_name, GameWindow, InputDevice, WindowLocator};
use crate::error::{AutomationError, Result};
use crate::settings::AppSettings;

/// An attached game window plus everything a run needs around it.
pub struct AutomationContext<W> {
    pub window: W,
    store: Arc<TemplateStore>,
    settings: AppSettings,
}

impl<W: GameWindow> AutomationContext<W> {
    /// Resolve the configured process to its main window and focus it.
    pub fn attach<L>(locator: &L, settings: &AppSettings, store: Arc<TemplateStore>) -> Result<Self>
    where
        L: WindowLocator<Window = W>,
    {
        let name = normalize_process_name(&settings.process_name);
        if name.is_empty() {
            return Err(AutomationError::EmptyProcessName);
        }
        let window = locator.attach(&name)?;
        if !window.focus() {
            tracing::warn!("Attached to {} but could not focus its window", name);
        }
        Ok(Self {
            window,
            store,
            settings: settings.clone(),
        })
    }

    pub fn window_rect(&self) -> Option<Rect> {
        self.window.bounds()
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    /// Pipeline over this window driven by `input`.
    pub fn into_pipeline<I: InputDevice>(self, input: I) -> SharePipeline<W, I> {
        let config = PipelineConfig::from_settings(&self.settings);
        let executor = ActionExecutor::new(input, self.settings.click_jitter, config.timings);
        SharePipeline::with_executor(self.window, executor, Matcher::new(self.store), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::CaptureFrame;
    use std::cell::Cell;

    struct StubWindow {
        focused: Cell<bool>,
    }

    impl GameWindow for StubWindow {
        fn bounds(&self) -> Option<Rect> {
            Some(Rect::new(10, 20, 640, 480))
        }
        fn capture(&self) -> Result<CaptureFrame> {
            Ok(CaptureFrame::empty())
        }
        fn focus(&self) -> bool {
            self.focused.set(true);
            true
        }
    }

    struct StubLocator {
        known: &'static str,
    }

    impl WindowLocator for StubLocator {
        type Window = StubWindow;

        fn attach(&self, process_name: &str) -> Result<StubWindow> {
            if process_name.eq_ignore_ascii_case(self.known) {
                Ok(StubWindow {
                    focused: Cell::new(false),
                })
            } else {
                Err(AutomationError::ProcessNotFound(process_name.to_string()))
            }
        }
    }

    fn store() -> Arc<TemplateStore> {
        Arc::new(TemplateStore::preloaded(Vec::<(&str, image::GrayImage)>::new()))
    }

    #[test]
    fn test_attach_strips_exe_and_focuses() {
        let locator = StubLocator { known: "Evony" };
        let ctx = AutomationContext::attach(&locator, &AppSettings::default(), store()).unwrap();
        assert!(ctx.window.focused.get());
        assert_eq!(ctx.window_rect(), Some(Rect::new(10, 20, 640, 480)));
    }

    #[test]
    fn test_attach_errors() {
        let locator = StubLocator { known: "Evony" };
        let mut settings = AppSettings::default();

        settings.process_name = "  ".into();
        assert!(matches!(
            AutomationContext::attach(&locator, &settings, store()),
            Err(AutomationError::EmptyProcessName)
        ));

        settings.process_name = "chrome.exe".into();
        match AutomationContext::attach(&locator, &settings, store()) {
            Err(AutomationError::ProcessNotFound(name)) => assert_eq!(name, "chrome"),
            _ => panic!("expected ProcessNotFound"),
        }
    }
}
